//! In-memory view state: the comparison being shown and the last list page.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Comparison, ComparisonSummary, ListFilter, Page};

#[derive(Debug, Default)]
struct StoreState {
    current: Option<Comparison>,
    page: Option<Page<ComparisonSummary>>,
    filter: ListFilter,
}

/// Thread-safe holder for what a client is currently displaying.
#[derive(Debug, Default)]
pub struct ComparisonStore {
    state: RwLock<StoreState>,
}

impl ComparisonStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn current(&self) -> Option<Comparison> {
        self.read().current.clone()
    }

    pub fn set_current(&self, comparison: Comparison) {
        self.write().current = Some(comparison);
    }

    pub fn clear_current(&self) {
        self.write().current = None;
    }

    pub fn page(&self) -> Option<Page<ComparisonSummary>> {
        self.read().page.clone()
    }

    /// Filter used for the last list fetch; reused on refresh.
    pub fn filter(&self) -> ListFilter {
        self.read().filter.clone()
    }

    pub fn set_page(&self, filter: ListFilter, page: Page<ComparisonSummary>) {
        let mut state = self.write();
        state.filter = filter;
        state.page = Some(page);
    }

    /// Forget a deleted comparison.
    ///
    /// Clears the current result if it is `id` and drops the row from the
    /// cached page. Returns whether the current result was cleared.
    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.write();
        if let Some(page) = state.page.as_mut() {
            let before = page.items.len();
            page.items.retain(|item| item.id != id);
            if page.items.len() < before {
                page.total = page.total.saturating_sub(1);
            }
        }
        if state.current.as_ref().is_some_and(|c| c.id == id) {
            state.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::comparison;
    use crate::models::ComparisonStatus;

    fn page_of(ids: &[&str]) -> Page<ComparisonSummary> {
        let items: Vec<_> = ids
            .iter()
            .map(|id| ComparisonSummary::from(&comparison(id, ComparisonStatus::Completed)))
            .collect();
        Page {
            total: items.len() as u64,
            items,
            page: 1,
            limit: 20,
        }
    }

    #[test]
    fn test_starts_empty() {
        let store = ComparisonStore::new();
        assert!(store.current().is_none());
        assert!(store.page().is_none());
        assert_eq!(store.filter(), ListFilter::default());
    }

    #[test]
    fn test_remove_current() {
        let store = ComparisonStore::new();
        store.set_current(comparison("a", ComparisonStatus::Completed));
        store.set_page(ListFilter::default(), page_of(&["a", "b"]));

        assert!(store.remove("a"));
        assert!(store.current().is_none());
        let page = store.page().unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, "b");
    }

    #[test]
    fn test_remove_other_keeps_current() {
        let store = ComparisonStore::new();
        store.set_current(comparison("a", ComparisonStatus::Completed));
        store.set_page(ListFilter::default(), page_of(&["a", "b"]));

        assert!(!store.remove("b"));
        assert_eq!(store.current().unwrap().id, "a");
        assert_eq!(store.page().unwrap().items.len(), 1);

        // Unknown ids change nothing.
        assert!(!store.remove("zzz"));
        assert_eq!(store.page().unwrap().total, 1);
    }

    #[test]
    fn test_set_page_remembers_filter() {
        let store = ComparisonStore::new();
        let filter = ListFilter {
            status: Some(ComparisonStatus::Failed),
            ..ListFilter::default()
        };
        store.set_page(filter.clone(), page_of(&[]));
        assert_eq!(store.filter(), filter);
    }
}
