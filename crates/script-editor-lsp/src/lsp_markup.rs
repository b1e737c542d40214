//! Markup rendering (hover contents, completion documentation).
//!
//! Server markup is either plain text or a restricted markdown subset. Markdown is converted to
//! an HTML fragment by an ordered list of regex rules:
//!
//! 1. fenced code blocks and inline code are cut out (fences in the active language are tokenized
//!    with the injected [`Highlighter`])
//! 2. resource references whose URI starts with the resolver's scheme are rewritten, outside code
//! 3. block rules: headers, horizontal rules, blockquotes, lists
//! 4. inline rules: images, links, bold, italic, strikethrough
//! 5. paragraphs, last, so block content is never wrapped in `<p>`
//!
//! Raw HTML inside markdown passes through untouched.

use regex::{Captures, Regex};
use script_editor_highlight::Highlighter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// `MarkupKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupKind {
    /// `plaintext`
    PlainText,
    /// `markdown`
    Markdown,
}

/// `MarkupContent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupContent {
    /// Content kind.
    pub kind: MarkupKind,
    /// Content text.
    pub value: String,
}

impl MarkupContent {
    /// Plain text content.
    pub fn plaintext(value: impl Into<String>) -> Self {
        Self {
            kind: MarkupKind::PlainText,
            value: value.into(),
        }
    }

    /// Markdown content.
    pub fn markdown(value: impl Into<String>) -> Self {
        Self {
            kind: MarkupKind::Markdown,
            value: value.into(),
        }
    }

    /// Parse hover/documentation contents.
    ///
    /// Accepts `MarkupContent`, a `MarkedString` (string or `{ language, value }`) and arrays of
    /// `MarkedString`, which are joined as markdown paragraphs.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::markdown(text.clone())),
            Value::Array(parts) => {
                let parts = parts
                    .iter()
                    .filter_map(Self::from_value)
                    .map(|part| part.value)
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>();
                (!parts.is_empty()).then(|| Self::markdown(parts.join("\n\n")))
            }
            Value::Object(obj) => {
                let text = obj.get("value")?.as_str()?;
                if let Some(language) = obj.get("language").and_then(Value::as_str) {
                    return Some(Self::markdown(format!("```{language}\n{text}\n```")));
                }
                match obj.get("kind").and_then(Value::as_str) {
                    Some("markdown") => Some(Self::markdown(text)),
                    _ => Some(Self::plaintext(text)),
                }
            }
            _ => None,
        }
    }

    /// Returns `true` if there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Resolves resource references that use a custom URI scheme.
///
/// Resolution is synchronous: [`FileReferenceResolver::url`] runs inside
/// [`MarkupRenderer::render`], once per reference. Hosts whose lookups are asynchronous resolve
/// ahead of time and answer from a cache, returning `None` for anything not resolved yet.
pub trait FileReferenceResolver: Send + Sync {
    /// The scheme prefix this resolver handles (e.g. `"myscheme://"`).
    fn scheme(&self) -> &str;

    /// Resolve `uri` into a URL the host can load. `None` leaves the reference unchanged.
    fn url(&self, uri: &str) -> Option<String>;
}

/// A [`FileReferenceResolver`] built from a scheme and a closure.
pub struct SchemeResolver<F> {
    scheme: String,
    url: F,
}

impl<F> SchemeResolver<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    /// Create a resolver for `scheme`.
    pub fn new(scheme: impl Into<String>, url: F) -> Self {
        Self {
            scheme: scheme.into(),
            url,
        }
    }
}

impl<F> FileReferenceResolver for SchemeResolver<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn scheme(&self) -> &str {
        &self.scheme
    }

    fn url(&self, uri: &str) -> Option<String> {
        (self.url)(uri)
    }
}

impl<F> fmt::Debug for SchemeResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeResolver")
            .field("scheme", &self.scheme)
            .finish()
    }
}

macro_rules! rule {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new($pattern).unwrap_or_else(|err| panic!("invalid markup rule: {err}"))
        });
    };
}

rule!(ATTR_REF, r#"\b(src|href)(\s*=\s*)(["'])([^"']*)(["'])"#);
rule!(PAREN_REF, r"\(([^()\s]+)\)");
rule!(FENCE, r"(?ms)^[ \t]*```[ \t]*([\w+#.-]*)[^\n]*\n(.*?)^[ \t]*```[ \t]*$");
rule!(INLINE_CODE, r"`([^`\n]+)`");
rule!(HEADER, r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*#*[ \t]*$");
rule!(HR, r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$");
rule!(BLOCKQUOTE, r"(?m)(?:^>[ \t]?.*(?:\n|$))+");
rule!(BLOCKQUOTE_MARK, r"(?m)^>[ \t]?");
rule!(UNORDERED_LIST, r"(?m)(?:^[ \t]*[-*+][ \t]+.*(?:\n|$))+");
rule!(UNORDERED_ITEM, r"(?m)^[ \t]*[-*+][ \t]+(.*)$");
rule!(ORDERED_LIST, r"(?m)(?:^[ \t]*\d+\.[ \t]+.*(?:\n|$))+");
rule!(ORDERED_ITEM, r"(?m)^[ \t]*\d+\.[ \t]+(.*)$");
rule!(IMAGE, r#"!\[([^\]]*)\]\(([^()\s]+)(?:\s+"([^"]*)")?\)"#);
rule!(LINK, r#"\[([^\]]+)\]\(([^()\s]+)(?:\s+"([^"]*)")?\)"#);
rule!(BOLD, r"\*\*([^*\n]+)\*\*|__([^_\n]+)__");
rule!(ITALIC, r"\*([^*\n]+)\*|\b_([^_\n]+)_\b");
rule!(STRIKE, r"~~([^~\n]+)~~");
rule!(PARAGRAPH_BREAK, r"\n[ \t]*\n");
rule!(PLACEHOLDER, "[\u{E000}\u{E002}](\\d+)[\u{E001}\u{E003}]");

const BLOCK_TAGS: [&str; 7] = ["<h", "<ul", "<ol", "<blockquote", "<hr", "<pre", "\u{E000}"];

/// Escape `&`, `<`, `>`, `"` and `'`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders [`MarkupContent`] into HTML fragments.
#[derive(Clone)]
pub struct MarkupRenderer {
    language: String,
    aliases: Vec<String>,
    highlighter: Option<Arc<dyn Highlighter>>,
    resolver: Option<Arc<dyn FileReferenceResolver>>,
}

impl fmt::Debug for MarkupRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkupRenderer")
            .field("language", &self.language)
            .field("aliases", &self.aliases)
            .field("highlighter", &self.highlighter.is_some())
            .field("resolver", &self.resolver.as_ref().map(|r| r.scheme()))
            .finish()
    }
}

impl MarkupRenderer {
    /// A renderer for the active language `language`.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            aliases: Vec::new(),
            highlighter: None,
            resolver: None,
        }
    }

    /// Another fence label that counts as the active language (e.g. `js`).
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Tokenize active-language code with `highlighter`.
    pub fn with_highlighter(mut self, highlighter: Arc<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    /// Rewrite scheme references with `resolver`.
    pub fn with_resolver(mut self, resolver: Arc<dyn FileReferenceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// The active language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Render `content`, preceded by `detail` as a code block when given.
    pub fn render(&self, content: &MarkupContent, detail: Option<&str>) -> String {
        let mut out = String::new();

        if let Some(detail) = detail.filter(|d| !d.trim().is_empty()) {
            out.push_str("<pre class=\"detail\"><code>");
            out.push_str(&self.highlight_code(detail));
            out.push_str("</code></pre>");
        }

        match content.kind {
            MarkupKind::PlainText => {
                if !content.value.is_empty() {
                    out.push_str("<pre>");
                    out.push_str(&escape_html(&content.value));
                    out.push_str("</pre>");
                }
            }
            MarkupKind::Markdown => out.push_str(&self.markdown_to_html(&content.value)),
        }

        out
    }

    /// Rewrite `src=`/`href=` attributes and `(...)` references that start with the resolver's
    /// scheme. Everything else passes through unchanged.
    pub fn resolve_references(&self, text: &str) -> String {
        let Some(resolver) = &self.resolver else {
            return text.to_string();
        };
        let scheme = resolver.scheme();
        let resolve = |uri: &str| {
            if uri.starts_with(scheme) {
                resolver.url(uri)
            } else {
                None
            }
        };

        let text = ATTR_REF.replace_all(text, |caps: &Captures| match resolve(&caps[4]) {
            Some(url) => format!("{}{}{}{}{}", &caps[1], &caps[2], &caps[3], url, &caps[5]),
            None => caps[0].to_string(),
        });

        PAREN_REF
            .replace_all(&text, |caps: &Captures| match resolve(&caps[1]) {
                Some(url) => format!("({url})"),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    fn is_active_language(&self, label: &str) -> bool {
        label.eq_ignore_ascii_case(&self.language)
            || self.aliases.iter().any(|a| label.eq_ignore_ascii_case(a))
    }

    fn highlight_code(&self, code: &str) -> String {
        let Some(highlighter) = &self.highlighter else {
            return escape_html(code);
        };

        let chars = code.chars().collect::<Vec<_>>();
        let mut out = String::with_capacity(code.len() * 2);
        let mut cursor = 0;

        for span in highlighter.highlight(code) {
            if span.from < cursor || span.to > chars.len() || span.from >= span.to {
                continue;
            }
            out.push_str(&escape_html(
                &chars[cursor..span.from].iter().collect::<String>(),
            ));
            out.push_str("<span class=\"tok-");
            out.push_str(&escape_html(&span.class));
            out.push_str("\">");
            out.push_str(&escape_html(
                &chars[span.from..span.to].iter().collect::<String>(),
            ));
            out.push_str("</span>");
            cursor = span.to;
        }
        out.push_str(&escape_html(&chars[cursor..].iter().collect::<String>()));
        out
    }

    fn markdown_to_html(&self, markdown: &str) -> String {
        let mut stash = Vec::<String>::new();

        let text = markdown.replace("\r\n", "\n");

        let text = FENCE.replace_all(&text, |caps: &Captures| {
            let label = &caps[1];
            let code = caps[2].strip_suffix('\n').unwrap_or(&caps[2]);
            let body = if self.is_active_language(label) {
                self.highlight_code(code)
            } else {
                escape_html(code)
            };
            let class = if label.is_empty() {
                String::new()
            } else {
                format!(" class=\"language-{}\"", escape_html(label))
            };
            let html = format!("<pre><code{class}>{body}</code></pre>");
            format!("\n\n{}\n\n", stash_block(&mut stash, html))
        });

        let text = INLINE_CODE.replace_all(&text, |caps: &Captures| {
            stash_inline(&mut stash, format!("<code>{}</code>", escape_html(&caps[1])))
        });

        let text = self.resolve_references(&text);

        let text = HEADER.replace_all(&text, |caps: &Captures| {
            let level = caps[1].len();
            format!("\n\n<h{level}>{}</h{level}>\n\n", &caps[2])
        });

        let text = HR.replace_all(&text, "\n\n<hr>\n\n");

        let text = BLOCKQUOTE.replace_all(&text, |caps: &Captures| {
            let inner = BLOCKQUOTE_MARK.replace_all(caps[0].trim_end(), "");
            format!("\n\n<blockquote>{inner}</blockquote>\n\n")
        });

        let text = UNORDERED_LIST.replace_all(&text, |caps: &Captures| {
            let items = UNORDERED_ITEM.replace_all(caps[0].trim_end(), "<li>$1</li>");
            format!("\n\n<ul>{}</ul>\n\n", items.replace('\n', ""))
        });

        let text = ORDERED_LIST.replace_all(&text, |caps: &Captures| {
            let items = ORDERED_ITEM.replace_all(caps[0].trim_end(), "<li>$1</li>");
            format!("\n\n<ol>{}</ol>\n\n", items.replace('\n', ""))
        });

        let text = IMAGE.replace_all(&text, |caps: &Captures| {
            let title = caps
                .get(3)
                .map(|t| format!(" title=\"{}\"", escape_html(t.as_str())))
                .unwrap_or_default();
            format!(
                "<img src=\"{}\" alt=\"{}\"{title}>",
                escape_html(&caps[2]),
                escape_html(&caps[1])
            )
        });

        let text = LINK.replace_all(&text, |caps: &Captures| {
            let title = caps
                .get(3)
                .map(|t| format!(" title=\"{}\"", escape_html(t.as_str())))
                .unwrap_or_default();
            format!("<a href=\"{}\"{title}>{}</a>", escape_html(&caps[2]), &caps[1])
        });

        let text = BOLD.replace_all(&text, |caps: &Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            format!("<strong>{inner}</strong>")
        });

        let text = ITALIC.replace_all(&text, |caps: &Captures| {
            let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            format!("<em>{inner}</em>")
        });

        let text = STRIKE.replace_all(&text, "<del>$1</del>");

        let html = PARAGRAPH_BREAK
            .split(&text)
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| {
                if BLOCK_TAGS.iter().any(|tag| block.starts_with(tag)) {
                    block.to_string()
                } else {
                    format!("<p>{block}</p>")
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        PLACEHOLDER
            .replace_all(&html, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| stash.get(index))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

fn stash_block(stash: &mut Vec<String>, html: String) -> String {
    stash.push(html);
    format!("\u{E000}{}\u{E001}", stash.len() - 1)
}

fn stash_inline(stash: &mut Vec<String>, html: String) -> String {
    stash.push(html);
    format!("\u{E002}{}\u{E003}", stash.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use script_editor_highlight::RegexHighlighter;

    fn cdn_resolver() -> Arc<dyn FileReferenceResolver> {
        Arc::new(SchemeResolver::new("myscheme://", |uri: &str| {
            Some(uri.replace("myscheme://", "https://cdn/"))
        }))
    }

    #[test]
    fn test_plaintext_is_escaped() {
        let renderer = MarkupRenderer::new("javascript");
        let html = renderer.render(&MarkupContent::plaintext("a < b && c"), None);
        assert_eq!(html, "<pre>a &lt; b &amp;&amp; c</pre>");
    }

    #[test]
    fn test_block_rules_run_before_paragraphs() {
        let renderer = MarkupRenderer::new("javascript");
        let html = renderer.render(
            &MarkupContent::markdown("# Title\nSome **bold** text\n\n- one\n- two\n\n---"),
            None,
        );
        assert_eq!(
            html,
            "<h1>Title</h1>\n<p>Some <strong>bold</strong> text</p>\n<ul><li>one</li><li>two</li></ul>\n<hr>"
        );
    }

    #[test]
    fn test_fence_in_active_language_is_tokenized() {
        let highlighter = Arc::new(RegexHighlighter::script_default().unwrap());
        let renderer = MarkupRenderer::new("javascript")
            .with_alias("js")
            .with_highlighter(highlighter);

        let html = renderer.render(
            &MarkupContent::markdown("```js\nlet a = 1;\n```\n\n```text\nlet b\n```"),
            None,
        );
        assert!(html.contains(
            "<pre><code class=\"language-js\"><span class=\"tok-keyword\">let</span> a = <span class=\"tok-number\">1</span>;</code></pre>"
        ));
        assert!(html.contains("<pre><code class=\"language-text\">let b</code></pre>"));
        assert!(!html.contains("<p><pre>"));
    }

    #[test]
    fn test_inline_code_is_protected_from_emphasis() {
        let renderer = MarkupRenderer::new("javascript");
        let html = renderer.render(&MarkupContent::markdown("use `a*b*c` here"), None);
        assert_eq!(html, "<p>use <code>a*b*c</code> here</p>");
    }

    #[test]
    fn test_scheme_references_are_rewritten() {
        let renderer = MarkupRenderer::new("javascript").with_resolver(cdn_resolver());

        let html = renderer.render(&MarkupContent::markdown("![alt](myscheme://asset.png)"), None);
        assert!(html.contains("src=\"https://cdn/asset.png\""));

        let html = renderer.render(&MarkupContent::markdown("![alt](other://asset.png)"), None);
        assert!(html.contains("src=\"other://asset.png\""));
    }

    #[test]
    fn test_code_samples_keep_scheme_references() {
        let renderer = MarkupRenderer::new("javascript").with_resolver(cdn_resolver());
        let html = renderer.render(
            &MarkupContent::markdown(
                "Load (myscheme://a.png) with `load(myscheme://b.png)`\n\n```text\nfetch(myscheme://c.png)\n```",
            ),
            None,
        );
        assert!(html.contains("(https://cdn/a.png)"));
        assert!(html.contains("<code>load(myscheme://b.png)</code>"));
        assert!(html.contains("fetch(myscheme://c.png)"));
    }

    #[test]
    fn test_resolver_runs_once_per_reference() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let renderer = MarkupRenderer::new("javascript").with_resolver(Arc::new(
            SchemeResolver::new("myscheme://", move |uri: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                uri.strip_suffix(".png").map(|stem| format!("{stem}.webp"))
            }),
        ));

        let html = renderer.render(
            &MarkupContent::markdown("![a](myscheme://a.png) ![b](myscheme://b.gif)"),
            None,
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(html.contains("src=\"myscheme://a.webp\""));
        assert!(html.contains("src=\"myscheme://b.gif\""));
    }

    #[test]
    fn test_html_attributes_are_rewritten() {
        let renderer = MarkupRenderer::new("javascript").with_resolver(cdn_resolver());
        let text = renderer.resolve_references("<img src=\"myscheme://a.png\"> <a href='x://b'>");
        assert_eq!(text, "<img src=\"https://cdn/a.png\"> <a href='x://b'>");
    }

    #[test]
    fn test_detail_renders_first() {
        let renderer = MarkupRenderer::new("javascript");
        let html = renderer.render(&MarkupContent::markdown("Docs"), Some("(x: number) => void"));
        assert_eq!(
            html,
            "<pre class=\"detail\"><code>(x: number) =&gt; void</code></pre><p>Docs</p>"
        );
    }

    #[test]
    fn test_marked_string_array() {
        let content = MarkupContent::from_value(&serde_json::json!([
            { "language": "javascript", "value": "const a" },
            "plain words",
        ]))
        .unwrap();
        assert_eq!(content.kind, MarkupKind::Markdown);
        assert_eq!(content.value, "```javascript\nconst a\n```\n\nplain words");
    }
}
