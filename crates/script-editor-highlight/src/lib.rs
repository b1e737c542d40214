//! `script-editor-highlight` - Regex-based highlighting for the script editor.
//!
//! The same [`Highlighter`] serves two consumers: the editing surface (token classes as a
//! decoration layer) and the markup renderer, which tokenizes fenced code blocks written in the
//! active language.

use regex::Regex;
use script_editor_core::processing::ProcessingEdit;
use script_editor_core::{
    Decoration, DecorationKind, DecorationLayerId, DecorationPlacement, DecorationRange, Document,
};

/// A highlighted token, in character offsets into the highlighted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    /// Start offset (inclusive).
    pub from: usize,
    /// End offset (exclusive).
    pub to: usize,
    /// Token class (`"keyword"`, `"string"`, ...).
    pub class: String,
}

/// Something that splits source text into classed tokens.
///
/// Spans must be sorted and non-overlapping.
pub trait Highlighter: Send + Sync {
    /// Tokenize `code`.
    fn highlight(&self, code: &str) -> Vec<HighlightSpan>;
}

/// A single regex highlighting rule.
#[derive(Debug, Clone)]
pub struct RegexRule {
    regex: Regex,
    class: String,
    capture_group: Option<usize>,
}

impl RegexRule {
    /// Compile a rule that tags every match with `class`.
    pub fn new(pattern: &str, class: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            class: class.into(),
            capture_group: None,
        })
    }

    /// Highlight only a capture group of each match.
    ///
    /// Example (function name):
    /// - pattern: `\bfunction\s+([A-Za-z_$][\w$]*)`
    /// - capture_group: `1` (the name)
    pub fn with_capture_group(mut self, group: usize) -> Self {
        self.capture_group = Some(group);
        self
    }

    /// Token class assigned by this rule.
    pub fn class(&self) -> &str {
        &self.class
    }
}

/// A simple regex-based syntax highlighter.
///
/// Rules run line by line. When matches overlap, the leftmost wins, then the earlier rule.
#[derive(Debug, Clone)]
pub struct RegexHighlighter {
    rules: Vec<RegexRule>,
}

impl RegexHighlighter {
    /// Build a highlighter from ordered rules.
    pub fn new(rules: Vec<RegexRule>) -> Self {
        Self { rules }
    }

    /// The rules, in priority order.
    pub fn rules(&self) -> &[RegexRule] {
        &self.rules
    }

    /// Run all rules over the whole document and return spans (char offsets).
    pub fn highlight_document(&self, doc: &Document) -> Vec<HighlightSpan> {
        let mut candidates = Vec::new();

        for number in 1..=doc.lines() {
            let line = doc.line(number);
            for (priority, rule) in self.rules.iter().enumerate() {
                if let Some(group) = rule.capture_group {
                    for caps in rule.regex.captures_iter(&line.text) {
                        let Some(m) = caps.get(group) else {
                            continue;
                        };
                        if let Some(span) = span_from_match(line.from, &line.text, m, &rule.class)
                        {
                            candidates.push((priority, span));
                        }
                    }
                } else {
                    for m in rule.regex.find_iter(&line.text) {
                        if let Some(span) = span_from_match(line.from, &line.text, m, &rule.class)
                        {
                            candidates.push((priority, span));
                        }
                    }
                }
            }
        }

        candidates.sort_by_key(|(priority, span)| (span.from, *priority));

        let mut spans: Vec<HighlightSpan> = Vec::with_capacity(candidates.len());
        for (_, span) in candidates {
            if spans.last().is_some_and(|last| span.from < last.to) {
                continue;
            }
            spans.push(span);
        }
        spans
    }

    /// Highlight a document into a decoration layer replacement.
    pub fn syntax_edit(&self, doc: &Document, layer: DecorationLayerId) -> ProcessingEdit {
        let decorations = self
            .highlight_document(doc)
            .into_iter()
            .map(|span| Decoration {
                range: DecorationRange::new(span.from, span.to),
                placement: DecorationPlacement::Before,
                kind: DecorationKind::Highlight,
                text: Some(span.class),
                tooltip: None,
                data_json: None,
            })
            .collect();
        ProcessingEdit::ReplaceDecorations { layer, decorations }
    }

    /// A small JavaScript-like grammar for the editor's script language.
    pub fn script_default() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            RegexRule::new(r"//.*$", "comment")?,
            RegexRule::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|`(?:\\.|[^`\\])*`"#, "string")?,
            RegexRule::new(
                r"\b(?:async|await|break|case|catch|class|const|continue|default|do|else|export|extends|for|function|if|import|in|instanceof|let|new|of|return|switch|this|throw|try|typeof|var|while|yield)\b",
                "keyword",
            )?,
            RegexRule::new(r"\b(?:true|false|null|undefined)\b", "atom")?,
            RegexRule::new(r"\b(?:0[xX][0-9a-fA-F]+|\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)\b", "number")?,
            RegexRule::new(r"\bfunction\s+([A-Za-z_$][\w$]*)", "def")?.with_capture_group(1),
        ]))
    }

    /// A small JSON grammar (strings, numbers, booleans, null).
    pub fn json_default() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            RegexRule::new(r#""(?:\\.|[^"\\])*""#, "string")?,
            RegexRule::new(r"-?(?:0|[1-9]\d*)(?:\.\d+)?(?:[eE][+-]?\d+)?", "number")?,
            RegexRule::new(r"\b(?:true|false|null)\b", "atom")?,
        ]))
    }
}

impl Highlighter for RegexHighlighter {
    fn highlight(&self, code: &str) -> Vec<HighlightSpan> {
        self.highlight_document(&Document::from_text(code))
    }
}

fn span_from_match(
    line_start_offset: usize,
    line_text: &str,
    m: regex::Match<'_>,
    class: &str,
) -> Option<HighlightSpan> {
    if m.start() >= m.end() || m.end() > line_text.len() {
        return None;
    }

    let start_col = line_text[..m.start()].chars().count();
    let end_col = start_col + m.as_str().chars().count();

    Some(HighlightSpan {
        from: line_start_offset + start_col,
        to: line_start_offset + end_col,
        class: class.to_string(),
    })
}
