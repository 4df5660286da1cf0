use gallery_core::GalleryItem;

use crate::sync::merge_sorted;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_YIELD_EVERY: usize = 200;
const DEFAULT_PROXIMITY: usize = 50;

/// Render seam between the list model and whatever materializes it (a
/// terminal, a DOM, a recording fake in tests). The model guarantees
/// `append` is only ever called with items not yet materialized.
pub trait ListPresenter {
    fn clear(&mut self);
    fn append(&mut self, items: &[GalleryItem]);
    fn remove(&mut self, name: &str);
}

/// Filtered, incrementally rendered view over the full item set.
///
/// Invariants: `filtered` is the subsequence of `items` matching the
/// current search term, `rendered <= filtered.len()`, and `items` holds
/// no duplicate names.
pub struct VirtualList {
    items: Vec<GalleryItem>,
    filtered: Vec<GalleryItem>,
    rendered: usize,
    search: String,
    batch_size: usize,
    yield_every: usize,
    proximity: usize,
}

impl VirtualList {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            filtered: Vec::new(),
            rendered: 0,
            search: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            yield_every: DEFAULT_YIELD_EVERY,
            proximity: DEFAULT_PROXIMITY,
        }
    }

    pub fn with_batching(mut self, batch_size: usize, yield_every: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.yield_every = yield_every.max(1);
        self
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn filtered(&self) -> &[GalleryItem] {
        &self.filtered
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    /// Replaces the backing set wholesale, keeping the active search
    /// term, and renders the first batch from scratch.
    pub async fn set_items<P: ListPresenter>(&mut self, items: Vec<GalleryItem>, presenter: &mut P) {
        self.items = merge_sorted(items);
        self.reset_view(presenter).await;
    }

    /// Case-insensitive substring filter over item names; the empty term
    /// selects everything.
    pub async fn set_search_term<P: ListPresenter>(&mut self, term: &str, presenter: &mut P) {
        self.search = term.to_string();
        self.reset_view(presenter).await;
    }

    async fn reset_view<P: ListPresenter>(&mut self, presenter: &mut P) {
        self.refilter();
        self.rendered = 0;
        presenter.clear();
        self.render_more(presenter).await;
    }

    /// Materializes the next batch of the filtered view. No-op once
    /// everything is rendered. Yields back to the scheduler every
    /// `yield_every` items so a huge batch cannot monopolize the thread.
    pub async fn render_more<P: ListPresenter>(&mut self, presenter: &mut P) {
        if self.rendered >= self.filtered.len() {
            return;
        }
        let end = (self.rendered + self.batch_size).min(self.filtered.len());
        while self.rendered < end {
            let stop = (self.rendered + self.yield_every).min(end);
            presenter.append(&self.filtered[self.rendered..stop]);
            self.rendered = stop;
            if self.rendered < end {
                tokio::task::yield_now().await;
            }
        }
    }

    /// Scroll-proximity hook: true when the visible position is close
    /// enough to the end of the materialized prefix that more should be
    /// rendered.
    pub fn near_end(&self, visible_index: usize) -> bool {
        self.rendered < self.filtered.len()
            && visible_index + self.proximity >= self.rendered
    }

    /// Drops one item from the set, the filtered view, and (when it was
    /// already materialized) the presenter, without a full re-render.
    pub fn remove<P: ListPresenter>(&mut self, name: &str, presenter: &mut P) {
        self.items.retain(|item| item.name != name);
        if let Some(position) = self.filtered.iter().position(|item| item.name == name) {
            self.filtered.remove(position);
            if position < self.rendered {
                self.rendered -= 1;
                presenter.remove(name);
            }
        }
    }

    fn refilter(&mut self) {
        if self.search.is_empty() {
            self.filtered = self.items.clone();
        } else {
            let needle = self.search.to_lowercase();
            self.filtered = self
                .items
                .iter()
                .filter(|item| item.name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
        }
    }
}

impl Default for VirtualList {
    fn default() -> Self {
        Self::new()
    }
}
