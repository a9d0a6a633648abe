//! Application state shared across handlers.

use std::sync::Arc;

use crate::db::MarketStore;
use crate::services::orders::OrderService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The store is injected so the same router runs
/// against `PostgreSQL` in production and memory in tests.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn MarketStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { store }),
        }
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &dyn MarketStore {
        self.inner.store.as_ref()
    }

    /// Order engine bound to this state's store.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.store())
    }
}
