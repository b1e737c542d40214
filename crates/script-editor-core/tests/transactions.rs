use pretty_assertions::assert_eq;
use proptest::prelude::*;
use script_editor_core::{
    ChangeSpec, Decoration, DecorationKind, DecorationLayerId, DecorationPlacement,
    DecorationRange, EditorState, EditorSurface, Extension, FoldRange, ProcessingEdit, Selection,
    TransactionSpec, UserEvent,
};

proptest! {
    #[test]
    fn version_counts_document_changing_transactions(
        initial in -5i32..1000,
        steps in prop::collection::vec(prop::option::of("[a-z]{1,3}"), 0..20),
    ) {
        let mut surface = EditorSurface::new(EditorState::new("seed").with_document_version(initial));
        let mut mutations = 0;

        for step in steps {
            let spec = match step {
                Some(text) => {
                    mutations += 1;
                    TransactionSpec::new().with_changes([ChangeSpec::insert(0, text)])
                }
                None => TransactionSpec::new().with_selection(Selection::cursor(1)),
            };
            surface.dispatch(spec).unwrap();
        }

        prop_assert_eq!(surface.state().document_version(), initial + mutations);
        prop_assert_eq!(*surface.version_receiver().borrow(), initial + mutations);
    }
}

#[test]
fn test_effect_only_transaction_keeps_version() {
    let mut surface = EditorSurface::new(
        EditorState::new("a\nb\nc\n")
            .with_extensions([Extension::FoldRanges])
            .with_document_version(4),
    );

    let tr = surface
        .apply_processing_edits([ProcessingEdit::ReplaceFoldRanges {
            ranges: vec![FoldRange::new(0, 3)],
        }])
        .unwrap();

    assert!(!tr.doc_changed());
    assert_eq!(surface.state().document_version(), 4);
    assert_eq!(surface.state().fold_ranges(), &[FoldRange::new(0, 3)]);
}

#[test]
fn test_decoration_layers_are_replaced_wholesale() {
    let layer = DecorationLayerId::DOCUMENT_COLORS;
    let swatch = |at: usize, css: &str| Decoration {
        range: DecorationRange::point(at),
        placement: DecorationPlacement::After,
        kind: DecorationKind::ColorSwatch,
        text: Some(css.to_string()),
        tooltip: None,
        data_json: None,
    };

    let state = EditorState::new("red blue").with_extensions([Extension::DecorationLayer(layer)]);
    let state = state
        .update(TransactionSpec::effects([ProcessingEdit::ReplaceDecorations {
            layer,
            decorations: vec![swatch(8, "b"), swatch(3, "a")],
        }]))
        .unwrap()
        .state()
        .clone();
    assert_eq!(
        state
            .decorations(layer)
            .iter()
            .map(|d| d.range.from)
            .collect::<Vec<_>>(),
        vec![3, 8]
    );

    let state = state
        .update(TransactionSpec::effects([ProcessingEdit::ReplaceDecorations {
            layer,
            decorations: vec![swatch(1, "c")],
        }]))
        .unwrap()
        .state()
        .clone();
    assert_eq!(state.decorations(layer).len(), 1);

    let state = state
        .update(TransactionSpec::effects([ProcessingEdit::ClearDecorations { layer }]))
        .unwrap()
        .state()
        .clone();
    assert!(state.decorations(layer).is_empty());
}

#[test]
fn test_sequential_spec_dispatches_as_one_transaction() {
    let mut surface = EditorSurface::new(EditorState::new("one two"));
    let doc = surface.state().doc().clone();

    let spec = TransactionSpec::sequential(
        &doc,
        &[ChangeSpec::replace(4, 7, "2"), ChangeSpec::replace(0, 3, "1")],
    )
    .unwrap()
    .with_user_event(UserEvent::Other("lsp.apply".to_string()));

    surface.dispatch(spec).unwrap();
    assert_eq!(surface.state().doc().to_string(), "1 2");
    assert_eq!(surface.state().document_version(), 1);
}
