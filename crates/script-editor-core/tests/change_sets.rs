use proptest::prelude::*;
use script_editor_core::{Assoc, ChangeSet, ChangeSpec, Document};

fn edit_strategy() -> impl Strategy<Value = (usize, usize, String)> {
    (0usize..64, 0usize..8, "[a-z\n你👋]{0,4}")
}

/// Resolve raw edits against a running document so every edit is in range.
fn clamp_sequential(doc: &Document, raw: &[(usize, usize, String)]) -> Vec<ChangeSpec> {
    let mut running = doc.clone();
    let mut specs = Vec::new();
    for (at, del, text) in raw {
        let from = (*at).min(running.len());
        let to = (from + del).min(running.len());
        specs.push(ChangeSpec::replace(from, to, text.clone()));
        running = running.replace(from, to, text);
    }
    specs
}

proptest! {
    #[test]
    fn sequential_specs_apply_like_replaying_them(
        text in "[a-z \n]{0,48}",
        raw in prop::collection::vec(edit_strategy(), 0..6),
    ) {
        let doc = Document::from_text(&text);
        let specs = clamp_sequential(&doc, &raw);

        let mut expected = doc.clone();
        for spec in &specs {
            expected = expected.replace(spec.from, spec.to, &spec.insert);
        }

        let changes = ChangeSet::from_sequential(&doc, &specs).unwrap();
        prop_assert_eq!(changes.len_after(), expected.len());
        prop_assert_eq!(changes.apply(&doc).to_string(), expected.to_string());
    }

    #[test]
    fn mapped_positions_stay_in_bounds(
        text in "[a-z\n]{0,48}",
        raw in prop::collection::vec(edit_strategy(), 0..6),
        pos in 0usize..64,
    ) {
        let doc = Document::from_text(&text);
        let specs = clamp_sequential(&doc, &raw);
        let changes = ChangeSet::from_sequential(&doc, &specs).unwrap();

        let pos = pos.min(doc.len());
        prop_assert!(changes.map_pos(pos, Assoc::Before) <= changes.len_after());
        prop_assert!(changes.map_pos(pos, Assoc::Before) <= changes.map_pos(pos, Assoc::After));
    }
}

#[test]
fn test_regions_report_both_coordinate_systems() {
    let doc = Document::from_text("alpha beta gamma");
    let changes = ChangeSet::of(
        doc.len(),
        [ChangeSpec::replace(0, 5, "a"), ChangeSpec::replace(11, 16, "g")],
    )
    .unwrap();

    let regions = changes.iter_changes().collect::<Vec<_>>();
    assert_eq!((regions[1].from_a, regions[1].to_a), (11, 16));
    assert_eq!((regions[1].from_b, regions[1].to_b), (7, 8));
    assert_eq!(changes.apply(&doc).to_string(), "a beta g");
}

#[test]
fn test_to_specs_round_trips() {
    let specs = vec![ChangeSpec::insert(0, "x"), ChangeSpec::delete(3, 4)];
    let changes = ChangeSet::of(5, specs.clone()).unwrap();
    assert_eq!(changes.to_specs(), specs);
}
