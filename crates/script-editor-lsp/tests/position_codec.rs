use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use script_editor_core::{ChangeSet, ChangeSpec, Document};
use script_editor_lsp::{
    LspPosition, LspRange, apply_content_changes, client_changes, offset_to_position, position_to_offset,
    server_changes,
};

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-z ]",
            1 => Just("\n".to_string()),
            1 => Just("\r\n".to_string()),
            1 => Just("\r".to_string()),
            1 => Just("\u{2028}".to_string()),
            1 => Just("\u{000C}".to_string()),
            1 => Just("é".to_string()),
            1 => Just("👋".to_string()),
            1 => Just("你".to_string()),
        ],
        0..60,
    )
    .prop_map(|parts| parts.concat())
}

/// Non-overlapping edits, increasing offsets, against a document of `len` chars.
fn edits_strategy(len: usize) -> impl Strategy<Value = Vec<ChangeSpec>> {
    prop::collection::vec((0..=len, 0..=len, "[xyz\n👋]{0,4}"), 0..6).prop_map(move |raw| {
        let mut points = raw
            .into_iter()
            .map(|(a, b, text)| (a.min(b), a.max(b), text))
            .collect::<Vec<_>>();
        points.sort_by_key(|(from, to, _)| (*from, *to));

        let mut out = Vec::<ChangeSpec>::new();
        let mut last_end = 0;
        for (from, to, text) in points {
            if out.is_empty() || from > last_end {
                last_end = to;
                out.push(ChangeSpec::replace(from, to, text));
            }
        }
        out
    })
}

proptest! {
    #[test]
    fn offsets_round_trip(text in text_strategy(), seed in any::<prop::sample::Index>()) {
        let doc = Document::from_text(&text);
        let offset = seed.index(doc.len() + 1);

        let position = offset_to_position(&doc, offset);
        prop_assert_eq!(position_to_offset(&doc, position), offset);
    }

    #[test]
    fn positions_round_trip(text in text_strategy(), line_seed in any::<prop::sample::Index>(), char_seed in any::<prop::sample::Index>()) {
        let doc = Document::from_text(&text);
        let line = doc.line(line_seed.index(doc.lines()) + 1);

        // A character boundary inside the line text, in UTF-16 units.
        let boundary = char_seed.index(line.len() + 1);
        let character = line.text.chars().take(boundary).map(char::len_utf16).sum::<usize>();
        let position = LspPosition::new((line.number - 1) as u32, character as u32);

        prop_assert_eq!(offset_to_position(&doc, position_to_offset(&doc, position)), position);
    }

    #[test]
    fn server_changes_replay_to_the_edited_document(
        (text, edits) in text_strategy().prop_flat_map(|text| {
            let len = text.chars().count();
            (Just(text), edits_strategy(len))
        })
    ) {
        let doc = Document::from_text(&text);
        let changes = ChangeSet::of(doc.len(), edits).unwrap();
        let expected = changes.apply(&doc);

        let records = server_changes(&doc, &changes);
        prop_assert_eq!(records.len(), changes.regions().len());
        prop_assert_eq!(apply_content_changes(&doc, &records), expected.clone());

        let local = ChangeSet::from_sequential(&doc, &client_changes(&doc, &records)).unwrap();
        prop_assert_eq!(local.apply(&doc), expected);
    }
}

#[test]
fn position_past_last_line_clamps() {
    let doc = Document::from_text("one\ntwo\nthree");
    assert_eq!(position_to_offset(&doc, LspPosition::new(42, 0)), 8);
    assert_eq!(position_to_offset(&doc, LspPosition::new(42, 99)), doc.len());
}

#[test]
fn end_of_document_after_trailing_newline() {
    let doc = Document::from_text("a\n");
    assert_eq!(offset_to_position(&doc, 2), LspPosition::new(1, 0));
    assert_eq!(position_to_offset(&doc, LspPosition::new(1, 0)), 2);
}

#[test]
fn later_regions_use_positions_after_earlier_ones() {
    let doc = Document::from_text("ab\ncd\nef");
    let changes = ChangeSet::of(
        doc.len(),
        [ChangeSpec::insert(0, "1\n2\n"), ChangeSpec::delete(6, 8)],
    )
    .unwrap();

    let records = server_changes(&doc, &changes);
    let second = records[1].range.unwrap();
    assert_eq!(second.start, LspPosition::new(4, 0));
    assert_eq!(second.end, LspPosition::new(4, 2));
    assert_eq!(apply_content_changes(&doc, &records).to_string(), "1\n2\nab\ncd\n");
}

#[test]
fn unicode_separators_stay_on_their_line() {
    let doc = Document::from_text("a\u{2028}b\u{000C}c\rd");
    assert_eq!(offset_to_position(&doc, 4), LspPosition::new(0, 4));
    assert_eq!(offset_to_position(&doc, 6), LspPosition::new(1, 0));

    let changes = ChangeSet::of(doc.len(), [ChangeSpec::insert(4, "x")]).unwrap();
    let records = server_changes(&doc, &changes);
    assert_eq!(records[0].range.unwrap().start, LspPosition::new(0, 4));
}

#[test]
fn oversized_positions_clamp_instead_of_wrapping() {
    let doc = Document::from_text("ab\ncd\nef");
    let range = LspRange::from_value(&json!({
        "start": { "line": 4_294_967_296_u64, "character": 0 },
        "end": { "line": 0, "character": 4_294_967_297_u64 },
    }))
    .unwrap();

    assert_eq!(range.start, LspPosition::new(u32::MAX, 0));
    assert_eq!(position_to_offset(&doc, range.start), 6);
    assert_eq!(position_to_offset(&doc, range.end), doc.len());
}
