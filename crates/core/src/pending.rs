//! The client-held list of report items not yet submitted.
//!
//! Mutations are UI-driven and single-threaded; the store's only
//! discipline is that its view is re-rendered after every mutation, so
//! the rendered list never shows an intermediate state.

use crate::report::ReportItem;

/// Rendering seam: receives the full current list after any mutation.
pub trait ItemListView: Send + Sync {
    fn item_list_changed(&self, items: &[ReportItem]);
}

/// View that renders nothing.
pub struct NullView;

impl ItemListView for NullView {
    fn item_list_changed(&self, _items: &[ReportItem]) {}
}

/// Ordered, mutable collection of pending report items.
pub struct PendingItemStore {
    items: Vec<ReportItem>,
    view: Box<dyn ItemListView>,
}

impl PendingItemStore {
    pub fn new() -> Self {
        Self::with_view(Box::new(NullView))
    }

    /// Attach a rendering view that is notified after every mutation.
    pub fn with_view(view: Box<dyn ItemListView>) -> Self {
        Self {
            items: Vec::new(),
            view,
        }
    }

    /// Append an item and re-render.
    pub fn add(&mut self, item: ReportItem) {
        self.items.push(item);
        self.view.item_list_changed(&self.items);
    }

    /// Remove the item at `index` and re-render. Later items shift down
    /// by one, so callers must not cache indices across a removal.
    pub fn remove_at(&mut self, index: usize) -> Option<ReportItem> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.view.item_list_changed(&self.items);
        Some(removed)
    }

    /// Drop all items and re-render.
    pub fn clear(&mut self) {
        self.items.clear();
        self.view.item_list_changed(&self.items);
    }

    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total photo count across all pending items.
    pub fn total_photo_count(&self) -> usize {
        self.items.iter().map(ReportItem::photo_count).sum()
    }
}

impl Default for PendingItemStore {
    fn default() -> Self {
        Self::new()
    }
}
