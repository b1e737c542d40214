//! Completion support.
//!
//! - [`CompletionSupport`] holds the surface's single completion provider and wraps every query in
//!   a debounce-and-cancel adapter: the source only runs after the debounce delay, and the query
//!   resolves to `None` as soon as the document version moves.
//! - [`LspCompletionSource`] is the protocol-backed provider (`textDocument/completion`).
//! - [`completion_result_from_value`] maps a server response into [`CompletionOption`]s.
//!
//! Supported item shapes:
//! - effective insert text is `textEdit.newText ?? insertText ?? label`
//! - snippet-shaped inserts (`insertTextFormat == 2`) are downgraded to plain text
//! - `additionalTextEdits` are applied together with the main insertion

use crate::error::LspError;
use crate::lsp_connection::{Connection, SourceId};
use crate::lsp_markup::{MarkupContent, MarkupRenderer};
use crate::lsp_sync::offset_to_position;
use crate::lsp_text_edits::{text_edits_from_value, text_edits_to_changes};
use crate::options::LanguageClientOptions;
use async_trait::async_trait;
use script_editor_core::{
    Assoc, ChangeSet, ChangeSpec, EditorState, Selection, TransactionSpec, UserEvent,
};
use serde_json::{Value, json};
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

/// `CompletionTriggerKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompletionTriggerKind {
    /// Typed an identifier, or invoked explicitly.
    Invoked = 1,
    /// Typed one of the server's trigger characters.
    TriggerCharacter = 2,
    /// Re-triggered because the previous list was incomplete.
    TriggerForIncompleteCompletions = 3,
}

/// The trigger reported to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTrigger {
    /// Trigger kind.
    pub kind: CompletionTriggerKind,
    /// The trigger character, for [`CompletionTriggerKind::TriggerCharacter`].
    pub character: Option<String>,
}

impl CompletionTrigger {
    fn invoked() -> Self {
        Self {
            kind: CompletionTriggerKind::Invoked,
            character: None,
        }
    }

    fn character(character: impl Into<String>) -> Self {
        Self {
            kind: CompletionTriggerKind::TriggerCharacter,
            character: Some(character.into()),
        }
    }

    /// The `CompletionContext` JSON sent with the request.
    pub fn to_value(&self) -> Value {
        let mut context = json!({ "triggerKind": self.kind as u8 });
        if let Some(character) = &self.character {
            context["triggerCharacter"] = Value::String(character.clone());
        }
        context
    }
}

/// A completion query.
#[derive(Debug, Clone)]
pub struct CompletionContext {
    /// State the query was issued against.
    pub state: EditorState,
    /// Cursor offset.
    pub pos: usize,
    /// Whether the user asked for completion explicitly.
    pub explicit: bool,
    abort: Option<watch::Receiver<i32>>,
}

impl CompletionContext {
    /// A query at `pos` against `state`.
    pub fn new(state: EditorState, pos: usize, explicit: bool) -> Self {
        Self {
            state,
            pos,
            explicit,
            abort: None,
        }
    }

    /// Abort when the observed document version differs from the query's.
    ///
    /// Usually [`script_editor_core::EditorSurface::version_receiver`].
    pub fn with_abort(mut self, versions: watch::Receiver<i32>) -> Self {
        self.abort = Some(versions);
        self
    }

    /// Returns `true` if the document moved on since the query was issued.
    pub fn is_aborted(&self) -> bool {
        self.abort
            .as_ref()
            .is_some_and(|rx| *rx.borrow() != self.state.document_version())
    }

    /// The character immediately before the cursor.
    pub fn char_before(&self) -> Option<char> {
        self.pos
            .checked_sub(1)
            .and_then(|offset| self.state.doc().char_at(offset))
    }

    /// The word (Unicode letters, digits and `_`) ending at the cursor, as `(from, text)`.
    pub fn match_before(&self) -> Option<(usize, String)> {
        let doc = self.state.doc();
        let pos = self.pos.min(doc.len());
        let mut from = pos;
        while from > 0
            && doc
                .char_at(from - 1)
                .is_some_and(|ch| ch.is_alphanumeric() || ch == '_')
        {
            from -= 1;
        }
        (from < pos).then(|| (from, doc.slice_to_string(from, pos)))
    }

    async fn aborted(&self) {
        let issued = self.state.document_version();
        if let Some(mut rx) = self.abort.clone() {
            let changed = rx.wait_for(|version| *version != issued).await.is_ok();
            if changed {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

/// Decide the trigger reported to the server.
///
/// - `TriggerCharacter` if the character before the cursor is a trigger character
/// - `TriggerCharacter` (`"\n"`) if completion was invoked explicitly right after a text
///   insertion and the server lists the line break as a trigger
/// - `Invoked` otherwise
pub fn completion_trigger(ctx: &CompletionContext, trigger_characters: &[String]) -> CompletionTrigger {
    if let Some(before) = ctx.char_before() {
        let before = before.to_string();
        if trigger_characters.contains(&before) {
            return CompletionTrigger::character(before);
        }
    }

    let after_input = ctx.state.last_user_event().is_some_and(UserEvent::is_input);
    if ctx.explicit && after_input && trigger_characters.iter().any(|t| t == "\n") {
        return CompletionTrigger::character("\n");
    }

    CompletionTrigger::invoked()
}

/// Predicate deciding whether a result can be reused while typing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidFor {
    trigger_characters: Vec<String>,
}

impl ValidFor {
    /// Valid while the last typed character is not one of `trigger_characters`.
    pub fn new(trigger_characters: Vec<String>) -> Self {
        Self { trigger_characters }
    }

    /// Check the text typed since the result's `from`.
    pub fn is_valid(&self, typed: &str) -> bool {
        match typed.chars().last() {
            Some(last) => !self
                .trigger_characters
                .iter()
                .any(|t| t.chars().eq(std::iter::once(last))),
            None => true,
        }
    }
}

/// A completion option shown to the user.
#[derive(Clone)]
pub struct CompletionOption {
    /// Label.
    pub label: String,
    /// Detail (`labelDetails.description ?? detail`).
    pub detail: Option<String>,
    /// Kind name (`"function"`, `"typeParameter"`, ...).
    pub kind: Option<String>,
    /// Ranking boost; `-index` in server order.
    pub boost: i32,
    /// `sortText`, if the server provided one.
    pub sort_text: Option<String>,
    /// `filterText`, if the server provided one.
    pub filter_text: Option<String>,
    /// Effective insert text.
    pub insert_text: String,
    /// Request a new completion after applying.
    pub retrigger: bool,
    additional_edits: Vec<crate::lsp_text_edits::LspTextEdit>,
    item_detail: Option<String>,
    documentation: Option<MarkupContent>,
    rendered: OnceLock<Option<String>>,
    renderer: Arc<MarkupRenderer>,
}

impl fmt::Debug for CompletionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionOption")
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("boost", &self.boost)
            .field("insert_text", &self.insert_text)
            .field("retrigger", &self.retrigger)
            .finish_non_exhaustive()
    }
}

/// The outcome of applying a [`CompletionOption`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionApplication {
    /// The transaction to dispatch.
    pub spec: TransactionSpec,
    /// Whether completion should be requested again afterwards.
    pub retrigger: bool,
}

impl CompletionOption {
    /// Rendered documentation, computed on first access.
    pub fn documentation_html(&self) -> Option<&str> {
        self.rendered
            .get_or_init(|| {
                let documentation = self.documentation.as_ref()?;
                trace!(label = %self.label, "rendering completion documentation");
                Some(
                    self.renderer
                        .render(documentation, self.item_detail.as_deref()),
                )
            })
            .as_deref()
    }

    /// Returns `true` once the documentation has been rendered.
    pub fn documentation_rendered(&self) -> bool {
        self.rendered.get().is_some()
    }

    /// Replace `from..to` with the insert text, together with any `additionalTextEdits`.
    ///
    /// The cursor lands after the inserted text. Additional edits that overlap the main
    /// insertion are dropped.
    pub fn apply(&self, state: &EditorState, from: usize, to: usize) -> CompletionApplication {
        let len = state.doc().len();
        let (from, to) = (from.min(len), to.min(len));
        let main = ChangeSpec::replace(from, to, self.insert_text.clone());

        let mut changes = vec![main.clone()];
        changes.extend(text_edits_to_changes(state.doc(), &self.additional_edits));

        let set = match ChangeSet::of(len, changes.clone()) {
            Ok(set) => set,
            Err(err) => {
                debug!(%err, label = %self.label, "dropping additional completion edits");
                changes = vec![main.clone()];
                ChangeSet::of(len, [main])
                    .unwrap_or_else(|_| ChangeSet::empty(len))
            }
        };

        let cursor = set.map_pos(to, Assoc::After);
        CompletionApplication {
            spec: TransactionSpec::new()
                .with_changes(changes)
                .with_selection(Selection::cursor(cursor))
                .with_user_event(UserEvent::Other("input.complete".to_string())),
            retrigger: self.retrigger,
        }
    }
}

/// A completion result.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    /// Start of the replaced range.
    pub from: usize,
    /// End of the replaced range.
    pub to: usize,
    /// Options, in display order.
    pub options: Vec<CompletionOption>,
    /// Reuse predicate while typing continues.
    pub valid_for: Option<ValidFor>,
    /// The server may return more items for a longer prefix.
    pub is_incomplete: bool,
}

/// A completion provider.
#[async_trait]
pub trait CompletionSource: Send + Sync {
    /// Produce completions for `ctx`. `Ok(None)` means "nothing to offer".
    async fn complete(&self, ctx: &CompletionContext) -> Result<Option<CompletionResult>, LspError>;
}

/// Map a numeric `CompletionItemKind` to its name.
pub fn completion_kind_name(kind: u64) -> Option<&'static str> {
    const NAMES: [&str; 25] = [
        "text",
        "method",
        "function",
        "constructor",
        "field",
        "variable",
        "class",
        "interface",
        "module",
        "property",
        "unit",
        "value",
        "enum",
        "keyword",
        "snippet",
        "color",
        "file",
        "reference",
        "folder",
        "enummember",
        "constant",
        "struct",
        "event",
        "operator",
        "typeparameter",
    ];
    let name = NAMES.get(usize::try_from(kind).ok()?.checked_sub(1)?)?;
    Some(match *name {
        "typeparameter" => "typeParameter",
        other => other,
    })
}

/// Map a `textDocument/completion` response.
///
/// `from..to` is the range options replace. Items are stably sorted by `sortText` (missing
/// `sortText` sorts as `""`). Returns `None` for `null` or an empty item list.
pub fn completion_result_from_value(
    value: &Value,
    from: usize,
    to: usize,
    trigger_characters: &[String],
    renderer: &Arc<MarkupRenderer>,
) -> Option<CompletionResult> {
    let (items, is_incomplete) = match value {
        Value::Array(items) => (items.as_slice(), false),
        Value::Object(list) => (
            list.get("items")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            list.get("isIncomplete")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        ),
        _ => return None,
    };
    if items.is_empty() {
        return None;
    }

    let mut items = items
        .iter()
        .filter(|item| item.get("label").and_then(Value::as_str).is_some())
        .collect::<Vec<_>>();
    items.sort_by(|a, b| sort_text(a).cmp(sort_text(b)));

    let options = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| completion_option_from_value(item, index, renderer))
        .collect::<Vec<_>>();
    if options.is_empty() {
        return None;
    }

    Some(CompletionResult {
        from,
        to,
        options,
        valid_for: (!trigger_characters.is_empty())
            .then(|| ValidFor::new(trigger_characters.to_vec())),
        is_incomplete,
    })
}

fn sort_text(item: &Value) -> &str {
    item.get("sortText").and_then(Value::as_str).unwrap_or("")
}

fn completion_option_from_value(
    item: &Value,
    index: usize,
    renderer: &Arc<MarkupRenderer>,
) -> Option<CompletionOption> {
    let label = item.get("label")?.as_str()?.to_string();
    let is_snippet = item.get("insertTextFormat").and_then(Value::as_u64) == Some(2);

    let raw_insert = item
        .get("textEdit")
        .and_then(|edit| edit.get("newText"))
        .and_then(Value::as_str)
        .or_else(|| item.get("insertText").and_then(Value::as_str))
        .unwrap_or(&label);
    let insert_text = if is_snippet {
        snippet_to_plain_text(raw_insert)
    } else {
        raw_insert.to_string()
    };

    let item_detail = item.get("detail").and_then(Value::as_str).map(str::to_string);
    let detail = item
        .get("labelDetails")
        .and_then(|d| d.get("description"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| item_detail.clone());

    Some(CompletionOption {
        detail,
        kind: item
            .get("kind")
            .and_then(Value::as_u64)
            .and_then(completion_kind_name)
            .map(str::to_string),
        boost: -(i32::try_from(index).unwrap_or(i32::MAX)),
        sort_text: item.get("sortText").and_then(Value::as_str).map(str::to_string),
        filter_text: item
            .get("filterText")
            .and_then(Value::as_str)
            .map(str::to_string),
        insert_text,
        retrigger: item
            .get("command")
            .and_then(|c| c.get("command"))
            .and_then(Value::as_str)
            == Some("editor.action.triggerSuggest"),
        additional_edits: item
            .get("additionalTextEdits")
            .map(text_edits_from_value)
            .unwrap_or_default(),
        item_detail,
        documentation: item.get("documentation").and_then(MarkupContent::from_value),
        rendered: OnceLock::new(),
        renderer: renderer.clone(),
        label,
    })
}

/// Downgrade snippet syntax to the text it would insert.
///
/// - `${1:foo}` -> `foo` (nested placeholders expand recursively)
/// - `${1|a,b|}` -> `a`
/// - `$1`, `${1}`, `$0`, `$VAR`, `${VAR}` -> ``
/// - `\$` -> `$`
pub fn snippet_to_plain_text(snippet: &str) -> String {
    let chars = snippet.chars().collect::<Vec<_>>();
    let mut pos = 0;
    expand_snippet(&chars, &mut pos, false)
}

fn expand_snippet(chars: &[char], pos: &mut usize, nested: bool) -> String {
    let mut out = String::new();
    while let Some(&ch) = chars.get(*pos) {
        *pos += 1;
        match ch {
            '\\' => {
                if let Some(&escaped) = chars.get(*pos) {
                    out.push(escaped);
                    *pos += 1;
                }
            }
            '}' if nested => return out,
            '$' => out.push_str(&expand_tabstop(chars, pos)),
            other => out.push(other),
        }
    }
    out
}

fn expand_tabstop(chars: &[char], pos: &mut usize) -> String {
    let braced = chars.get(*pos) == Some(&'{');
    if braced {
        *pos += 1;
    }

    let start = *pos;
    while chars
        .get(*pos)
        .is_some_and(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
    {
        *pos += 1;
    }
    if *pos == start {
        // A lone `$`.
        if braced {
            *pos -= 1;
        }
        return "$".to_string();
    }
    if !braced {
        return String::new();
    }

    match chars.get(*pos) {
        Some(':') => {
            *pos += 1;
            expand_snippet(chars, pos, true)
        }
        Some('|') => {
            *pos += 1;
            let mut choice = String::new();
            let mut first_done = false;
            while let Some(&ch) = chars.get(*pos) {
                *pos += 1;
                match ch {
                    '|' => break,
                    ',' => first_done = true,
                    other if !first_done => choice.push(other),
                    _ => {}
                }
            }
            skip_past_brace(chars, pos);
            choice
        }
        _ => {
            skip_past_brace(chars, pos);
            String::new()
        }
    }
}

fn skip_past_brace(chars: &[char], pos: &mut usize) {
    while let Some(&ch) = chars.get(*pos) {
        *pos += 1;
        if ch == '}' {
            break;
        }
    }
}

type Slot = Option<(SourceId, Arc<dyn CompletionSource>)>;

/// The surface's completion provider slot.
///
/// Clones share the slot. A query in flight keeps its own reference to the provider, so
/// unregistering never disturbs it.
#[derive(Clone)]
pub struct CompletionSupport {
    slot: Arc<Mutex<Slot>>,
    next_id: Arc<AtomicU64>,
    debounce: Duration,
}

impl fmt::Debug for CompletionSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSupport")
            .field("debounce", &self.debounce)
            .field("has_source", &self.has_source())
            .finish()
    }
}

impl Default for CompletionSupport {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl CompletionSupport {
    /// An empty slot with the given debounce delay.
    pub fn new(debounce: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(0)),
            debounce,
        }
    }

    /// An empty slot using the client's configured debounce delay.
    pub fn from_options(options: &LanguageClientOptions) -> Self {
        Self::new(options.completion_debounce())
    }

    /// The debounce delay.
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Install `source`, replacing the current provider.
    pub fn register(&self, source: Arc<dyn CompletionSource>) -> SourceId {
        let id = SourceId::next(&self.next_id);
        if let Ok(mut slot) = self.slot.lock() {
            if let Some((previous, _)) = slot.replace((id, source)) {
                debug!(?previous, ?id, "replacing completion source");
            }
        }
        id
    }

    /// Remove the provider registered as `id`. Returns `false` if it is not the current one.
    pub fn unregister(&self, id: SourceId) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    /// Returns `true` if a provider is installed.
    pub fn has_source(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Run the debounced query against the current provider.
    ///
    /// Resolves to `None` when there is no provider, the document changes before the result
    /// arrives, the provider fails, or it has nothing to offer.
    pub async fn complete(&self, ctx: &CompletionContext) -> Option<CompletionResult> {
        let source = self
            .slot
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|(_, source)| source.clone()))?;

        debounce_completion(source, ctx, self.debounce).await
    }
}

async fn debounce_completion(
    source: Arc<dyn CompletionSource>,
    ctx: &CompletionContext,
    delay: Duration,
) -> Option<CompletionResult> {
    let run = async {
        tokio::time::sleep(delay).await;
        source.complete(ctx).await
    };

    tokio::select! {
        biased;
        _ = ctx.aborted() => {
            debug!(version = ctx.state.document_version(), "completion cancelled by edit");
            None
        }
        result = run => match result {
            Ok(Some(result)) if !result.options.is_empty() => Some(result),
            Ok(_) => None,
            Err(err) => {
                warn!(%err, "completion request failed");
                None
            }
        },
    }
}

/// The protocol-backed completion provider.
pub struct LspCompletionSource {
    connection: Arc<dyn Connection>,
    uri: String,
    trigger_characters: Vec<String>,
    renderer: Arc<MarkupRenderer>,
}

impl fmt::Debug for LspCompletionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LspCompletionSource")
            .field("uri", &self.uri)
            .field("trigger_characters", &self.trigger_characters)
            .finish_non_exhaustive()
    }
}

impl LspCompletionSource {
    /// A provider for the document `uri`.
    pub fn new(
        connection: Arc<dyn Connection>,
        uri: impl Into<String>,
        trigger_characters: Vec<String>,
        renderer: Arc<MarkupRenderer>,
    ) -> Self {
        Self {
            connection,
            uri: uri.into(),
            trigger_characters,
            renderer,
        }
    }
}

#[async_trait]
impl CompletionSource for LspCompletionSource {
    async fn complete(&self, ctx: &CompletionContext) -> Result<Option<CompletionResult>, LspError> {
        let trigger = completion_trigger(ctx, &self.trigger_characters);
        let word = ctx.match_before();

        if !ctx.explicit && word.is_none() && trigger.kind == CompletionTriggerKind::Invoked {
            return Ok(None);
        }

        let params = json!({
            "textDocument": { "uri": self.uri },
            "position": offset_to_position(ctx.state.doc(), ctx.pos),
            "context": trigger.to_value(),
        });
        let response = self
            .connection
            .send_request("textDocument/completion", params)
            .await?;

        let from = word.map_or(ctx.pos, |(from, _)| from);
        Ok(completion_result_from_value(
            &response,
            from,
            ctx.pos,
            &self.trigger_characters,
            &self.renderer,
        ))
    }
}
