//! Document color support: inline swatches after color literals.

use crate::lsp_sync::{LspRange, range_to_offsets};
use script_editor_core::processing::ProcessingEdit;
use script_editor_core::{
    Decoration, DecorationKind, DecorationLayerId, DecorationPlacement, DecorationRange,
    EditorState, Extension, TransactionSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An LSP `Color` (channels in `0..=1`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LspColor {
    /// Red channel.
    pub red: f64,
    /// Green channel.
    pub green: f64,
    /// Blue channel.
    pub blue: f64,
    /// Alpha channel.
    pub alpha: f64,
}

/// An LSP `ColorInformation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorInformation {
    /// Range of the color literal.
    pub range: LspRange,
    /// The color.
    pub color: LspColor,
}

impl ColorInformation {
    /// Parse a `ColorInformation`-shaped JSON value.
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            range: LspRange::from_value(value.get("range")?)?,
            color: serde_json::from_value(value.get("color")?.clone()).ok()?,
        })
    }
}

/// Parse a `textDocument/documentColor` response.
pub fn color_information_from_value(value: &Value) -> Vec<ColorInformation> {
    value
        .as_array()
        .map(|infos| {
            infos
                .iter()
                .filter_map(ColorInformation::from_value)
                .collect()
        })
        .unwrap_or_default()
}

/// CSS color for `color`: `rgb(R G B / A%)` with 0-255 channels.
pub fn css_color(color: &LspColor) -> String {
    let channel = |value: f64| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    let alpha = (color.alpha.clamp(0.0, 1.0) * 100.0).round() as u8;
    format!(
        "rgb({} {} {} / {}%)",
        channel(color.red),
        channel(color.green),
        channel(color.blue),
        alpha
    )
}

/// Document color integration for one surface.
#[derive(Debug, Clone, Copy)]
pub struct DocumentColorSupport {
    layer: DecorationLayerId,
}

impl Default for DocumentColorSupport {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentColorSupport {
    /// Swatches on [`DecorationLayerId::DOCUMENT_COLORS`].
    pub fn new() -> Self {
        Self {
            layer: DecorationLayerId::DOCUMENT_COLORS,
        }
    }

    /// The decoration layer this integration owns.
    pub fn layer(&self) -> DecorationLayerId {
        self.layer
    }

    /// The state slots this integration needs.
    pub fn load(&self) -> Vec<Extension> {
        vec![Extension::DecorationLayer(self.layer)]
    }

    /// Replace every swatch with one per `infos` entry, anchored at the end of its range.
    pub fn set_colors(&self, state: &EditorState, infos: &[ColorInformation]) -> TransactionSpec {
        let doc = state.doc();
        let decorations = infos
            .iter()
            .map(|info| {
                let (start, end) = range_to_offsets(doc, &info.range);
                Decoration {
                    range: DecorationRange::point(start.max(end)),
                    placement: DecorationPlacement::After,
                    kind: DecorationKind::ColorSwatch,
                    text: Some(css_color(&info.color)),
                    tooltip: None,
                    data_json: serde_json::to_string(&info.color).ok(),
                }
            })
            .collect();

        TransactionSpec::effects([ProcessingEdit::ReplaceDecorations {
            layer: self.layer,
            decorations,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_css_color() {
        let color = LspColor {
            red: 1.0,
            green: 0.5,
            blue: 0.0,
            alpha: 0.25,
        };
        assert_eq!(css_color(&color), "rgb(255 128 0 / 25%)");
    }

    #[test]
    fn test_swatch_at_range_end_replaces_layer() {
        let support = DocumentColorSupport::new();
        let state = EditorState::new("a = '#ff0000';\nb = '#00f';").with_extensions(support.load());
        let infos = color_information_from_value(&json!([
            {
                "range": { "start": { "line": 1, "character": 5 }, "end": { "line": 1, "character": 9 } },
                "color": { "red": 0, "green": 0, "blue": 1, "alpha": 1 },
            },
            {
                "range": { "start": { "line": 0, "character": 5 }, "end": { "line": 0, "character": 12 } },
                "color": { "red": 1, "green": 0, "blue": 0, "alpha": 1 },
            },
        ]));

        let state = state.update(support.set_colors(&state, &infos)).unwrap().state().clone();
        let swatches = state.decorations(support.layer());
        assert_eq!(swatches.len(), 2);
        assert_eq!(swatches[0].range, DecorationRange::point(12));
        assert_eq!(swatches[0].text.as_deref(), Some("rgb(255 0 0 / 100%)"));
        assert_eq!(swatches[1].range, DecorationRange::point(24));

        let state = state.update(support.set_colors(&state, &[])).unwrap().state().clone();
        assert!(state.decorations(support.layer()).is_empty());
    }
}
