//! Document identity and version stamps.
//!
//! Every asynchronous result is tagged with the document version it was requested for. Before a
//! result touches the editing surface, the stamp is compared with the surface's current version
//! and stale results are dropped.

use script_editor_core::EditorState;
use serde_json::{Value, json};
use tracing::debug;

/// The synchronization target: a document URI and the version last sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    /// Document URI.
    pub uri: String,
    /// Version last announced to the server.
    pub version: i32,
}

impl DocumentIdentity {
    /// Create an identity.
    pub fn new(uri: impl Into<String>, version: i32) -> Self {
        Self {
            uri: uri.into(),
            version,
        }
    }

    /// `TextDocumentIdentifier` JSON.
    pub fn text_document(&self) -> Value {
        json!({ "uri": self.uri })
    }

    /// `VersionedTextDocumentIdentifier` JSON.
    pub fn versioned_text_document(&self) -> Value {
        json!({ "uri": self.uri, "version": self.version })
    }
}

/// Read the document version of a state.
pub fn document_version(state: &EditorState) -> i32 {
    state.document_version()
}

/// The document version captured when a request was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VersionStamp(i32);

impl VersionStamp {
    /// Capture the version of `state`.
    pub fn of(state: &EditorState) -> Self {
        Self(state.document_version())
    }

    /// The captured version.
    pub fn version(self) -> i32 {
        self.0
    }

    /// Returns `true` if `state` still has the captured version.
    pub fn is_current(self, state: &EditorState) -> bool {
        self.0 == state.document_version()
    }
}

/// A value tagged with the document version it was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Version at issue time.
    pub stamp: VersionStamp,
    /// The value.
    pub value: T,
}

impl<T> Versioned<T> {
    /// Tag `value` with the version of `state`.
    pub fn new(state: &EditorState, value: T) -> Self {
        Self {
            stamp: VersionStamp::of(state),
            value,
        }
    }

    /// Transform the value, keeping the stamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            stamp: self.stamp,
            value: f(self.value),
        }
    }

    /// The value if it is still current for `state`, otherwise `None`.
    pub fn into_current(self, state: &EditorState) -> Option<T> {
        if self.stamp.is_current(state) {
            Some(self.value)
        } else {
            debug!(
                issued = self.stamp.version(),
                current = state.document_version(),
                "dropping stale result"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use script_editor_core::{ChangeSpec, TransactionSpec};

    #[test]
    fn test_stale_value_is_dropped() {
        let state = EditorState::new("a").with_document_version(3);
        let result = Versioned::new(&state, "folds");
        assert_eq!(result.stamp.version(), 3);

        let next = state
            .update(TransactionSpec::new().with_changes([ChangeSpec::insert(1, "b")]))
            .unwrap();

        assert_eq!(result.clone().into_current(&state), Some("folds"));
        assert_eq!(result.into_current(next.state()), None);
    }

    #[test]
    fn test_identity_json() {
        let identity = DocumentIdentity::new("file:///a.js", 2);
        assert_eq!(
            identity.versioned_text_document(),
            json!({ "uri": "file:///a.js", "version": 2 })
        );
    }
}
