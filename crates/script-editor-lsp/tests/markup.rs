use pretty_assertions::assert_eq;
use script_editor_core::Document;
use script_editor_highlight::RegexHighlighter;
use script_editor_lsp::{MarkupRenderer, SchemeResolver, hover_from_value};
use serde_json::json;
use std::sync::Arc;

fn renderer() -> MarkupRenderer {
    MarkupRenderer::new("javascript")
        .with_alias("js")
        .with_highlighter(Arc::new(RegexHighlighter::script_default().unwrap()))
        .with_resolver(Arc::new(SchemeResolver::new("myscheme://", |uri: &str| {
            uri.strip_prefix("myscheme://")
                .map(|path| format!("https://cdn.example/{path}"))
        })))
}

#[test]
fn hover_markdown_resolves_file_references() {
    let doc = Document::from_text("draw(img)");
    let hover = hover_from_value(
        &doc,
        &json!({ "contents": {
            "kind": "markdown",
            "value": "See [docs](myscheme://guide.md) or [web](https://x.dev/a).\n\n<img src=\"myscheme://a.png\">",
        } }),
        2,
    )
    .unwrap();
    assert_eq!((hover.from, hover.to), (2, 2));

    let html = renderer().render(&hover.contents, None);
    assert_eq!(
        html,
        "<p>See <a href=\"https://cdn.example/guide.md\">docs</a> or <a href=\"https://x.dev/a\">web</a>.</p>\n\
         <p><img src=\"https://cdn.example/a.png\"></p>"
    );
}

#[test]
fn hover_signature_is_highlighted() {
    let doc = Document::from_text("let a");
    let hover = hover_from_value(
        &doc,
        &json!({ "contents": [{ "language": "javascript", "value": "let a: number" }] }),
        4,
    )
    .unwrap();

    let html = renderer().render(&hover.contents, None);
    assert!(html.starts_with("<pre><code class=\"language-javascript\">"));
    assert!(html.contains("<span class=\"tok-keyword\">let</span>"));
}

#[test]
fn empty_hover_contents_are_no_hover() {
    let doc = Document::from_text("x");
    assert!(hover_from_value(&doc, &json!({ "contents": "" }), 0).is_none());
    assert!(hover_from_value(&doc, &json!(null), 0).is_none());
}
