//! Integration tests: page JSON → store → item operations → JSON.
//!
//! Exercises the full `nc-core` pipeline against a fixture page holding
//! one item of every variant.

use nc_core::error::CanvasError;
use nc_core::id::ItemId;
use nc_core::model::*;
use nc_core::store::{MemoryStore, PageKey, PageStore};
use nc_core::table::CellPos;
use pretty_assertions::assert_eq;

fn key() -> PageKey {
    PageKey::new("notebook", "physics", "week-3")
}

fn load() -> MemoryStore {
    let mut store = MemoryStore::with_single_page(key());
    store
        .load_items_json(&key(), include_str!("fixtures/mixed_page.json"))
        .expect("fixture should load");
    store
}

#[test]
fn every_variant_loads_and_validates() {
    let store = load();
    let page = store.active_page().unwrap();
    let types: Vec<&str> = page.items.iter().map(CanvasItem::type_name).collect();
    assert_eq!(
        types,
        ["text", "sticky", "sticky", "table", "todo", "image", "audio", "drawing"]
    );
    for item in page.items.iter() {
        item.validate().unwrap();
    }
}

#[test]
fn both_sticky_color_forms_survive_a_save() {
    let store = load();
    let json = store.items_json(&key()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[1]["color"], "yellow");
    assert_eq!(value[2]["color"], "#fde68a");
    assert_eq!(value[2]["textColor"], "#1f2937");
}

#[test]
fn save_and_reload_is_lossless() {
    let store = load();
    let json = store.items_json(&key()).unwrap();

    let mut other = MemoryStore::with_single_page(key());
    other.load_items_json(&key(), &json).unwrap();
    assert_eq!(
        other.active_page().unwrap().items.as_ref(),
        store.active_page().unwrap().items.as_ref()
    );
}

#[test]
fn table_add_row_through_store_update() {
    let mut store = load();
    let id = ItemId::intern("table_1");
    let mut table = store.active_page().unwrap().item(id).unwrap().clone();
    table.as_table_mut().unwrap().add_row(1);

    let updated = store
        .update_canvas_item(&key(), id, &ItemPatch::content(table.kind.clone()))
        .unwrap();
    let t = updated.as_table().unwrap();
    assert_eq!(t.rows, 4);
    assert_eq!(t.cells[1], vec![String::new(); 3]);
    assert_eq!(t.cells[2][2], " ");
    // The styled cell moved down with its row.
    assert!(t.cell_styles.contains_key("3-2"));
    assert_eq!(t.style_for(CellPos::new(3, 2)).italic, Some(true));
}

#[test]
fn moving_drawing_keeps_strokes_inside_bounds() {
    let mut store = load();
    let id = ItemId::intern("drawing_1");
    let moved = store
        .update_canvas_item(&key(), id, &ItemPatch::position(110.0, 60.0))
        .unwrap();
    let d = moved.as_drawing().unwrap();
    assert_eq!(d.paths, "M 110 60 L 120 60 L 120 70");
    assert_eq!(d.mask_paths[0].path, "M 118 58 L 122 62");
}

#[test]
fn malformed_page_is_rejected() {
    let mut store = MemoryStore::with_single_page(key());
    let bad = r#"[{"id":"t","type":"table","x":0,"y":0,"width":10,"height":10,
                   "rows":2,"cols":2,"cells":[["a","b"]]}]"#;
    assert!(store.load_items_json(&key(), bad).is_err());
    assert!(store.active_page().unwrap().items.is_empty());
}

#[test]
fn repeated_id_in_page_json_is_rejected() {
    let mut fixture: Vec<serde_json::Value> =
        serde_json::from_str(include_str!("fixtures/mixed_page.json")).unwrap();
    let sticky = fixture
        .iter()
        .find(|v| v["id"] == "sticky_1")
        .cloned()
        .unwrap();
    fixture.push(sticky);
    let json = serde_json::to_string(&fixture).unwrap();

    let mut store = load();
    let err = store.load_items_json(&key(), &json).unwrap_err();
    assert!(matches!(err, CanvasError::DuplicateItem(id) if id == ItemId::intern("sticky_1")));
    // The previously loaded page is left as it was.
    assert_eq!(store.active_page().unwrap().items.len(), fixture.len() - 1);
}
