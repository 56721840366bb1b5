//! End-to-end editing scenarios through the public API.

use mapedit::editor::{Editor, LinkEnd, DEFAULT_SNAP_TOLERANCE_M};
use mapedit::geom::{Feature, FeatureId, Geometry, LonLat};
use mapedit::store::{ProviderConfig, Query, QueryResult};

fn point(lon: f64, lat: f64) -> Feature {
    Feature::new(Geometry::Point(LonLat::new(lon, lat)))
}

fn line(coords: &[(f64, f64)]) -> Feature {
    Feature::new(Geometry::LineString(
        coords
            .iter()
            .map(|&(lon, lat)| LonLat::new(lon, lat))
            .collect(),
    ))
}

fn editor() -> Editor {
    let mut editor = Editor::new();
    editor.add_provider(ProviderConfig::new("layer"));
    editor
}

#[test]
fn radius_search_finds_added_neighbors() {
    let mut editor = editor();
    let center = LonLat::new(13.4, 52.5);

    let store = editor.provider_mut("layer").unwrap();
    assert_eq!(store.search(&Query::radius(center, 100.0)).count(), 0);

    // Two points within 100 m of the center, one well outside.
    store.add_feature(point(13.4005, 52.5), None).unwrap();
    store.add_feature(point(13.4, 52.5006), None).unwrap();
    store.add_feature(point(13.41, 52.51), None).unwrap();

    assert_eq!(store.search(&Query::radius(center, 100.0)).count(), 2);
}

#[test]
fn id_lookup_misses_preserve_slots() {
    let editor = editor();
    let result = editor.provider("layer").unwrap().search(&Query::Ids(vec![
        FeatureId::from("-1"),
        FeatureId::from("-2"),
    ]));
    match result {
        QueryResult::Many(slots) => assert_eq!(slots, vec![None, None]),
        other => panic!("expected Many, got {:?}", other.count()),
    }
}

#[test]
fn endpoint_snap_merges_two_links_into_one() {
    let mut editor = editor();
    let a = editor
        .provider_mut("layer")
        .unwrap()
        .add_feature(line(&[(13.400, 52.500), (13.401, 52.500)]), None)
        .unwrap();
    editor
        .provider_mut("layer")
        .unwrap()
        .add_feature(line(&[(13.401001, 52.500), (13.402, 52.500)]), None)
        .unwrap();
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 2);

    editor
        .snap_link("layer", &a, LinkEnd::End, DEFAULT_SNAP_TOLERANCE_M)
        .unwrap();
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 1);

    // One undo restores both links.
    assert!(editor.undo());
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 2);
}

#[test]
fn crossing_split_turns_two_links_into_four() {
    let mut editor = editor();
    let a = editor
        .provider_mut("layer")
        .unwrap()
        .add_feature(line(&[(13.400, 52.500), (13.402, 52.500)]), None)
        .unwrap();
    let b = editor
        .provider_mut("layer")
        .unwrap()
        .add_feature(line(&[(13.401, 52.499), (13.401, 52.501)]), None)
        .unwrap();

    let outcome = editor.split_crossing("layer", &a, &b).unwrap();
    assert_eq!(outcome.added.len(), 2);
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 4);

    assert!(editor.undo());
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 2);
}

#[test]
fn batch_groups_mutations_into_one_undo_step() {
    let mut editor = editor();

    editor.batch(|editor| {
        let id = editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(13.4, 52.5), None)
            .unwrap();
        editor
            .provider_mut("layer")
            .unwrap()
            .add_feature(point(13.5, 52.5), None)
            .unwrap();
        editor.provider_mut("layer").unwrap().modify_feature(&id, |f| {
            f.geometry = Geometry::Point(LonLat::new(13.45, 52.5));
        });
    });

    assert_eq!(editor.undo_steps(), 1);
    assert!(editor.undo());
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 0);
    assert!(editor.redo());
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 2);
}

#[test]
fn undo_redo_restore_exact_state_for_every_step() {
    let mut editor = editor();
    let store = editor.provider_mut("layer").unwrap();

    let a = store.add_feature(point(13.4, 52.5).prop("name", "a"), None).unwrap();
    store.modify_feature(&a, |f| {
        f.geometry = Geometry::Point(LonLat::new(13.41, 52.51));
        f.properties.insert("name".into(), "a2".into());
    });
    let b = store.add_feature(point(9.0, 48.0), None).unwrap();
    store.remove_feature(&b);

    let snapshot_after = |editor: &Editor, id: &FeatureId| {
        editor
            .provider("layer")
            .unwrap()
            .search(&Query::Id(id.clone()))
            .features()
            .pop()
    };

    // Walk back to the start and forward again; each redo must land on the
    // exact state the original step produced.
    let final_a = snapshot_after(&editor, &a);
    while editor.undo() {}
    assert_eq!(editor.provider("layer").unwrap().feature_count(), 0);
    while editor.redo() {}
    assert_eq!(snapshot_after(&editor, &a), final_a);
    assert!(snapshot_after(&editor, &b).is_none());
}

#[test]
fn feature_ids_stay_unique() {
    let mut editor = editor();
    let store = editor.provider_mut("layer").unwrap();
    let mut ids = std::collections::HashSet::new();
    for i in 0..50 {
        let id = store
            .add_feature(point(13.0 + f64::from(i) * 0.001, 52.5), None)
            .unwrap();
        assert!(ids.insert(id), "duplicate id assigned");
    }
    assert_eq!(store.feature_count(), 50);
}
