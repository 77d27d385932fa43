//! Page store: the notebook → section → page tree that owns canvas items.
//!
//! The canvas core addresses items only through a `PageKey` triple plus an
//! `ItemId`. `PageStore` is the seam the editor depends on; `MemoryStore`
//! is the in-process implementation.
//!
//! Each mutation replaces the page's item list with a fresh `Rc<Vec<_>>`
//! (copy-on-write), so a host can detect change with `Rc::ptr_eq`.

use crate::error::{CanvasError, CanvasResult};
use crate::id::ItemId;
use crate::model::{CanvasItem, ItemKind, ItemPatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::rc::Rc;

/// Address of one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageKey {
    pub notebook_id: String,
    pub section_id: String,
    pub page_id: String,
}

impl PageKey {
    pub fn new(
        notebook_id: impl Into<String>,
        section_id: impl Into<String>,
        page_id: impl Into<String>,
    ) -> Self {
        Self {
            notebook_id: notebook_id.into(),
            section_id: section_id.into(),
            page_id: page_id.into(),
        }
    }
}

impl std::fmt::Display for PageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.notebook_id, self.section_id, self.page_id)
    }
}

/// A page and its canvas items.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub canvas_items: Rc<Vec<CanvasItem>>,
}

impl Page {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            canvas_items: Rc::new(Vec::new()),
        }
    }

    pub fn item(&self, id: ItemId) -> Option<&CanvasItem> {
        self.canvas_items.iter().find(|i| i.id == id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// The active page as seen by the canvas core.
#[derive(Debug, Clone)]
pub struct ActivePage {
    pub key: PageKey,
    pub items: Rc<Vec<CanvasItem>>,
}

impl ActivePage {
    pub fn item(&self, id: ItemId) -> Option<&CanvasItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

/// Item CRUD consumed by the canvas core.
pub trait PageStore {
    /// The page currently shown, re-read on every call.
    fn active_page(&self) -> Option<ActivePage>;

    /// Items of an arbitrary page.
    fn page_items(&self, key: &PageKey) -> Option<Rc<Vec<CanvasItem>>>;

    fn add_canvas_item(&mut self, key: &PageKey, item: CanvasItem) -> CanvasResult<()>;

    fn update_canvas_item(
        &mut self,
        key: &PageKey,
        id: ItemId,
        patch: &ItemPatch,
    ) -> CanvasResult<CanvasItem>;

    fn delete_canvas_item(&mut self, key: &PageKey, id: ItemId) -> CanvasResult<CanvasItem>;

    /// Text items only.
    fn add_tag_to_item(&mut self, key: &PageKey, id: ItemId, tag: &str) -> CanvasResult<bool>;

    /// Text items only.
    fn remove_tag_from_item(&mut self, key: &PageKey, id: ItemId, tag: &str)
    -> CanvasResult<bool>;
}

/// In-memory notebook tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStore {
    pub notebooks: Vec<Notebook>,
    #[serde(default)]
    pub active: Option<PageKey>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding one notebook/section/page, already active.
    pub fn with_single_page(key: PageKey) -> Self {
        let mut store = Self::new();
        store.ensure_page(&key);
        store.active = Some(key);
        store
    }

    /// Create the notebook, section, and page of `key` as needed.
    pub fn ensure_page(&mut self, key: &PageKey) -> &mut Page {
        let nb_idx = match self.notebooks.iter().position(|n| n.id == key.notebook_id) {
            Some(i) => i,
            None => {
                self.notebooks.push(Notebook {
                    id: key.notebook_id.clone(),
                    ..Notebook::default()
                });
                self.notebooks.len() - 1
            }
        };
        let notebook = &mut self.notebooks[nb_idx];
        let sec_idx = match notebook.sections.iter().position(|s| s.id == key.section_id) {
            Some(i) => i,
            None => {
                notebook.sections.push(Section {
                    id: key.section_id.clone(),
                    ..Section::default()
                });
                notebook.sections.len() - 1
            }
        };
        let section = &mut notebook.sections[sec_idx];
        let page_idx = match section.pages.iter().position(|p| p.id == key.page_id) {
            Some(i) => i,
            None => {
                section.pages.push(Page::new(key.page_id.clone(), ""));
                section.pages.len() - 1
            }
        };
        &mut section.pages[page_idx]
    }

    pub fn set_active(&mut self, key: Option<PageKey>) -> CanvasResult<()> {
        if let Some(k) = &key {
            if self.page(k).is_none() {
                return Err(CanvasError::PageNotFound(k.to_string()));
            }
        }
        self.active = key;
        Ok(())
    }

    pub fn page(&self, key: &PageKey) -> Option<&Page> {
        self.notebooks
            .iter()
            .find(|n| n.id == key.notebook_id)?
            .sections
            .iter()
            .find(|s| s.id == key.section_id)?
            .pages
            .iter()
            .find(|p| p.id == key.page_id)
    }

    fn page_mut(&mut self, key: &PageKey) -> CanvasResult<&mut Page> {
        self.notebooks
            .iter_mut()
            .find(|n| n.id == key.notebook_id)
            .and_then(|n| n.sections.iter_mut().find(|s| s.id == key.section_id))
            .and_then(|s| s.pages.iter_mut().find(|p| p.id == key.page_id))
            .ok_or_else(|| CanvasError::PageNotFound(key.to_string()))
    }

    /// Replace a page's items from JSON (`CanvasItem[]`). Every item must
    /// validate and ids must be unique; on error the page is untouched.
    pub fn load_items_json(&mut self, key: &PageKey, json: &str) -> CanvasResult<()> {
        let items: Vec<CanvasItem> = serde_json::from_str(json)?;
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            if !seen.insert(item.id) {
                return Err(CanvasError::DuplicateItem(item.id));
            }
        }
        self.ensure_page(key).canvas_items = Rc::new(items);
        Ok(())
    }

    pub fn items_json(&self, key: &PageKey) -> CanvasResult<String> {
        let page = self
            .page(key)
            .ok_or_else(|| CanvasError::PageNotFound(key.to_string()))?;
        Ok(serde_json::to_string(page.canvas_items.as_ref())?)
    }

    /// Copy-on-write edit of one page's item list.
    fn edit_items<T>(
        &mut self,
        key: &PageKey,
        edit: impl FnOnce(&mut Vec<CanvasItem>) -> CanvasResult<T>,
    ) -> CanvasResult<T> {
        let page = self.page_mut(key)?;
        let mut items = page.canvas_items.as_ref().clone();
        let out = edit(&mut items)?;
        page.canvas_items = Rc::new(items);
        Ok(out)
    }

    fn edit_text(
        &mut self,
        key: &PageKey,
        id: ItemId,
        edit: impl FnOnce(&mut crate::model::TextData) -> bool,
    ) -> CanvasResult<bool> {
        self.edit_items(key, |items| {
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or(CanvasError::ItemNotFound(id))?;
            match &mut item.kind {
                ItemKind::Text(text) => Ok(edit(text)),
                _ => Err(CanvasError::NotATextItem(id)),
            }
        })
    }
}

impl PageStore for MemoryStore {
    fn active_page(&self) -> Option<ActivePage> {
        let key = self.active.clone()?;
        let items = self.page(&key)?.canvas_items.clone();
        Some(ActivePage { key, items })
    }

    fn page_items(&self, key: &PageKey) -> Option<Rc<Vec<CanvasItem>>> {
        self.page(key).map(|p| p.canvas_items.clone())
    }

    fn add_canvas_item(&mut self, key: &PageKey, item: CanvasItem) -> CanvasResult<()> {
        self.edit_items(key, |items| {
            if items.iter().any(|i| i.id == item.id) {
                return Err(CanvasError::DuplicateItem(item.id));
            }
            log::trace!("add {} {} to {key}", item.type_name(), item.id);
            items.push(item);
            Ok(())
        })
    }

    fn update_canvas_item(
        &mut self,
        key: &PageKey,
        id: ItemId,
        patch: &ItemPatch,
    ) -> CanvasResult<CanvasItem> {
        self.edit_items(key, |items| {
            let slot = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or(CanvasError::ItemNotFound(id))?;
            let updated = patch.apply_to(slot);
            updated.validate()?;
            *slot = updated.clone();
            Ok(updated)
        })
    }

    fn delete_canvas_item(&mut self, key: &PageKey, id: ItemId) -> CanvasResult<CanvasItem> {
        self.edit_items(key, |items| {
            let idx = items
                .iter()
                .position(|i| i.id == id)
                .ok_or(CanvasError::ItemNotFound(id))?;
            Ok(items.remove(idx))
        })
    }

    fn add_tag_to_item(&mut self, key: &PageKey, id: ItemId, tag: &str) -> CanvasResult<bool> {
        self.edit_text(key, id, |text| text.add_tag(tag))
    }

    fn remove_tag_from_item(
        &mut self,
        key: &PageKey,
        id: ItemId,
        tag: &str,
    ) -> CanvasResult<bool> {
        self.edit_text(key, id, |text| text.remove_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::model::{StickyData, TextData};

    fn key() -> PageKey {
        PageKey::new("nb", "sec", "page")
    }

    fn sticky(id: &str) -> CanvasItem {
        CanvasItem::new(
            ItemId::intern(id),
            Bounds::new(0.0, 0.0, 150.0, 100.0),
            ItemKind::Sticky(StickyData::default()),
        )
    }

    #[test]
    fn crud_is_copy_on_write() {
        let mut store = MemoryStore::with_single_page(key());
        let before = store.active_page().unwrap().items;
        store.add_canvas_item(&key(), sticky("a")).unwrap();
        let after = store.active_page().unwrap().items;
        assert!(!Rc::ptr_eq(&before, &after));
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut store = MemoryStore::with_single_page(key());
        store.add_canvas_item(&key(), sticky("dup")).unwrap();
        assert!(matches!(
            store.add_canvas_item(&key(), sticky("dup")),
            Err(CanvasError::DuplicateItem(_))
        ));
    }

    #[test]
    fn update_validates_result() {
        let mut store = MemoryStore::with_single_page(key());
        store.add_canvas_item(&key(), sticky("u")).unwrap();
        let id = ItemId::intern("u");
        let moved = store
            .update_canvas_item(&key(), id, &ItemPatch::position(40.0, 50.0))
            .unwrap();
        assert_eq!((moved.x, moved.y), (40.0, 50.0));
        assert!(
            store
                .update_canvas_item(&key(), id, &ItemPatch::size(f64::NAN, 10.0))
                .is_err()
        );
        assert_eq!(store.active_page().unwrap().item(id).unwrap().x, 40.0);
    }

    #[test]
    fn tags_only_on_text_items() {
        let mut store = MemoryStore::with_single_page(key());
        let text = CanvasItem::new(
            ItemId::intern("txt"),
            Bounds::new(0.0, 0.0, 150.0, 60.0),
            ItemKind::Text(TextData::default()),
        );
        store.add_canvas_item(&key(), text).unwrap();
        store.add_canvas_item(&key(), sticky("not_text")).unwrap();

        assert!(store.add_tag_to_item(&key(), ItemId::intern("txt"), "idea").unwrap());
        assert!(!store.add_tag_to_item(&key(), ItemId::intern("txt"), "idea").unwrap());
        assert!(matches!(
            store.add_tag_to_item(&key(), ItemId::intern("not_text"), "idea"),
            Err(CanvasError::NotATextItem(_))
        ));
        assert!(store.remove_tag_from_item(&key(), ItemId::intern("txt"), "idea").unwrap());
    }

    #[test]
    fn missing_page_and_item_errors() {
        let mut store = MemoryStore::new();
        assert!(store.active_page().is_none());
        assert!(matches!(
            store.add_canvas_item(&key(), sticky("x")),
            Err(CanvasError::PageNotFound(_))
        ));
        assert!(store.set_active(Some(key())).is_err());
        store.ensure_page(&key());
        assert!(matches!(
            store.delete_canvas_item(&key(), ItemId::intern("nope")),
            Err(CanvasError::ItemNotFound(_))
        ));
    }
}
