//! LSP Sync Layer
//!
//! Translates between the editor's character offsets and LSP positions (0-based line, UTF-16
//! character), and between local [`ChangeSet`]s and LSP `contentChanges` arrays.
//!
//! Both directions walk their input with a *running* document snapshot: every record is
//! positioned against the document produced by the records before it, never against the
//! original.

use script_editor_core::{ChangeSet, ChangeSpec, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// LSP Position (based on UTF-16 code units)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct LspPosition {
    /// Line number (0-based)
    pub line: u32,
    /// Character offset (UTF-16 code units, 0-based)
    pub character: u32,
}

impl LspPosition {
    /// Create a new LSP position (UTF-16 based).
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Parse a `Position`-shaped JSON value. Values beyond `u32::MAX` saturate.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            line: u32::try_from(value.get("line")?.as_u64()?).unwrap_or(u32::MAX),
            character: u32::try_from(value.get("character")?.as_u64()?).unwrap_or(u32::MAX),
        })
    }
}

/// LSP Range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LspRange {
    /// Range start position (inclusive).
    pub start: LspPosition,
    /// Range end position (exclusive).
    pub end: LspPosition,
}

impl LspRange {
    /// Create a new LSP range.
    pub fn new(start: LspPosition, end: LspPosition) -> Self {
        Self { start, end }
    }

    /// Parse a `Range`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            start: LspPosition::from_value(value.get("start")?)?,
            end: LspPosition::from_value(value.get("end")?)?,
        })
    }
}

/// One record of a `textDocument/didChange` `contentChanges` array.
///
/// `range == None` replaces the entire document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    /// Replaced range, or `None` for a full-document replacement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<LspRange>,
    /// Replacement text.
    pub text: String,
}

impl ContentChange {
    /// A full-document replacement.
    pub fn full(text: impl Into<String>) -> Self {
        Self {
            range: None,
            text: text.into(),
        }
    }

    /// A ranged replacement.
    pub fn incremental(range: LspRange, text: impl Into<String>) -> Self {
        Self {
            range: Some(range),
            text: text.into(),
        }
    }

    /// Parse a `TextDocumentContentChangeEvent`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        let text = value.get("text")?.as_str()?.to_string();
        let range = match value.get("range") {
            None | Some(Value::Null) => None,
            Some(range) => Some(LspRange::from_value(range)?),
        };
        Some(Self { range, text })
    }
}

/// LSP coordinate converter
///
/// Handles conversions between character offsets and UTF-16 code unit offsets within a line.
pub struct LspCoordinateConverter;

impl LspCoordinateConverter {
    /// Convert UTF-8 string to UTF-16 code unit count
    pub fn utf8_to_utf16_len(text: &str) -> usize {
        text.encode_utf16().count()
    }

    /// Convert character offset to UTF-16 code unit offset
    pub fn char_offset_to_utf16(text: &str, char_offset: usize) -> usize {
        text.chars().take(char_offset).map(char::len_utf16).sum()
    }

    /// Convert UTF-16 code unit offset to character offset
    ///
    /// An offset pointing into the middle of a surrogate pair rounds up to the next character.
    /// Offsets past the end of `text` clamp to its character length.
    pub fn utf16_to_char_offset(text: &str, utf16_offset: usize) -> usize {
        let mut current_utf16 = 0;
        let mut char_count = 0;

        for ch in text.chars() {
            if current_utf16 >= utf16_offset {
                break;
            }
            current_utf16 += ch.len_utf16();
            char_count += 1;
        }

        char_count
    }
}

/// Convert a character offset into an LSP position.
///
/// `offset` is clamped to `[0, doc.len()]`, so the end of the document is a valid input.
pub fn offset_to_position(doc: &Document, offset: usize) -> LspPosition {
    let offset = offset.min(doc.len());
    let line = doc.line_at(offset);

    let in_text = (offset - line.from).min(line.len());
    // Offsets inside a multi-character line break (`\r|\n`) count one unit per break char.
    let in_break = offset - line.from - in_text;
    let character = LspCoordinateConverter::char_offset_to_utf16(&line.text, in_text) + in_break;

    LspPosition::new((line.number - 1) as u32, character as u32)
}

/// Convert an LSP position into a character offset.
///
/// The line is looked up 1-based (`position.line + 1`) and clamps to the nearest existing line.
/// A character past the end of the line spills over into the following text, and the result is
/// clamped to `[0, doc.len()]`.
pub fn position_to_offset(doc: &Document, position: LspPosition) -> usize {
    let line = doc.line((position.line as usize).saturating_add(1));
    let character = position.character as usize;

    let text_utf16 = LspCoordinateConverter::utf8_to_utf16_len(&line.text);
    let in_line = if character <= text_utf16 {
        LspCoordinateConverter::utf16_to_char_offset(&line.text, character)
    } else {
        line.len() + (character - text_utf16)
    };

    (line.from + in_line).min(doc.len())
}

/// Convert an LSP range into `(from, to)` character offsets, *without* reordering them.
///
/// Callers that must reject inverted ranges compare the two values themselves.
pub fn range_to_offsets(doc: &Document, range: &LspRange) -> (usize, usize) {
    (
        position_to_offset(doc, range.start),
        position_to_offset(doc, range.end),
    )
}

/// Convert `from..to` character offsets into an LSP range.
pub fn offsets_to_range(doc: &Document, from: usize, to: usize) -> LspRange {
    LspRange::new(offset_to_position(doc, from), offset_to_position(doc, to))
}

/// Translate a local change set into `contentChanges` records.
///
/// `before` must be the document the change set was applied to.
pub fn server_changes(before: &Document, changes: &ChangeSet) -> Vec<ContentChange> {
    let mut running = before.clone();
    let mut out = Vec::with_capacity(changes.regions().len());

    for region in changes.iter_changes() {
        let from = region.from_b;
        let to = from + region.deleted_len();

        out.push(ContentChange::incremental(
            offsets_to_range(&running, from, to),
            region.inserted.clone(),
        ));
        running = running.replace(from, to, &region.inserted);
    }

    out
}

/// Translate server `contentChanges` into local edits.
///
/// The returned specs are *sequential*: each one is relative to the document produced by the
/// specs before it (see [`ChangeSet::from_sequential`]).
pub fn client_changes(doc: &Document, content_changes: &[ContentChange]) -> Vec<ChangeSpec> {
    let mut running = doc.clone();
    let mut out = Vec::with_capacity(content_changes.len());

    for change in content_changes {
        let spec = match &change.range {
            Some(range) => {
                let (from, to) = range_to_offsets(&running, range);
                ChangeSpec::replace(from.min(to), from.max(to), change.text.clone())
            }
            None => ChangeSpec::replace(0, running.len(), change.text.clone()),
        };
        running = running.replace(spec.from, spec.to, &spec.insert);
        out.push(spec);
    }

    out
}

/// Apply `contentChanges` to a document, in order.
pub fn apply_content_changes(doc: &Document, content_changes: &[ContentChange]) -> Document {
    client_changes(doc, content_changes)
        .iter()
        .fold(doc.clone(), |running, spec| {
            running.replace(spec.from, spec.to, &spec.insert)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_to_utf16_len() {
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("hello"), 5);
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("你好"), 2);
        assert_eq!(LspCoordinateConverter::utf8_to_utf16_len("👋"), 2);
    }

    #[test]
    fn test_utf16_to_char_offset_rounds_up_inside_surrogate_pair() {
        let text = "a👋b";
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 1), 1);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 2), 2);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 3), 2);
        assert_eq!(LspCoordinateConverter::utf16_to_char_offset(text, 4), 3);
    }

    #[test]
    fn test_offset_to_position_with_emoji() {
        let doc = Document::from_text("x\n👋y");
        assert_eq!(offset_to_position(&doc, 3), LspPosition::new(1, 2));
        assert_eq!(offset_to_position(&doc, 4), LspPosition::new(1, 3));
    }

    #[test]
    fn test_end_of_document() {
        let doc = Document::from_text("ab\ncd\n");
        assert_eq!(offset_to_position(&doc, doc.len()), LspPosition::new(2, 0));
        assert_eq!(offset_to_position(&doc, 999), LspPosition::new(2, 0));
    }

    #[test]
    fn test_position_to_offset_clamps_line() {
        let doc = Document::from_text("ab\ncd");
        assert_eq!(position_to_offset(&doc, LspPosition::new(99, 1)), 4);
        assert_eq!(position_to_offset(&doc, LspPosition::new(1, 99)), doc.len());
    }

    #[test]
    fn test_character_past_line_end_spills_into_next_line() {
        let doc = Document::from_text("ab\ncd");
        assert_eq!(position_to_offset(&doc, LspPosition::new(0, 3)), 3);
    }

    #[test]
    fn test_crlf_interior_round_trips() {
        let doc = Document::from_text("ab\r\ncd");
        let position = offset_to_position(&doc, 3);
        assert_eq!(position, LspPosition::new(0, 3));
        assert_eq!(position_to_offset(&doc, position), 3);
    }

    #[test]
    fn test_server_changes_use_running_snapshot() {
        let doc = Document::from_text("aaa\nbbb\nccc");
        let changes = ChangeSet::of(
            doc.len(),
            [
                ChangeSpec::insert(0, "x\n"),
                ChangeSpec::replace(8, 11, "C"),
            ],
        )
        .unwrap();

        let records = server_changes(&doc, &changes);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].range,
            Some(LspRange::new(LspPosition::new(0, 0), LspPosition::new(0, 0)))
        );
        // The second region sits one line lower once the first insertion is applied.
        assert_eq!(
            records[1].range,
            Some(LspRange::new(LspPosition::new(3, 0), LspPosition::new(3, 3)))
        );
        assert_eq!(
            apply_content_changes(&doc, &records).to_string(),
            "x\naaa\nbbb\nC"
        );
    }

    #[test]
    fn test_full_replacement_record() {
        let doc = Document::from_text("old");
        let specs = client_changes(&doc, &[ContentChange::full("new text")]);
        assert_eq!(specs, vec![ChangeSpec::replace(0, 3, "new text")]);
    }

    #[test]
    fn test_content_change_json_shape() {
        let full = serde_json::to_value(ContentChange::full("x")).unwrap();
        assert_eq!(full, serde_json::json!({ "text": "x" }));

        let parsed = ContentChange::from_value(&serde_json::json!({
            "range": { "start": { "line": 0, "character": 1 }, "end": { "line": 0, "character": 2 } },
            "text": "y",
        }))
        .unwrap();
        assert_eq!(
            parsed.range,
            Some(LspRange::new(LspPosition::new(0, 1), LspPosition::new(0, 2)))
        );
    }
}
