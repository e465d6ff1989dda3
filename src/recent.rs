//! Most-recently-opened tracking for the catalog, kept in memory per run.

#[derive(Debug, Clone)]
pub struct RecentBooks {
    capacity: usize,
    entries: Vec<u32>,
}

impl RecentBooks {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Moves `book_id` to the front, evicting the oldest entry when full.
    pub fn record(&mut self, book_id: u32) {
        self.entries.retain(|&id| id != book_id);
        self.entries.insert(0, book_id);
        self.entries.truncate(self.capacity);
    }

    /// Ids in most-recently-opened order.
    pub fn ids(&self) -> &[u32] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
