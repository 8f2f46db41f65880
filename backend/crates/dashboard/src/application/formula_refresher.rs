//! Formula Refresher
//!
//! Plugs the document store into the coalescing queue: the deferred
//! operation for a project key is a formula refresh with the latest
//! access token seen for that project.

use std::sync::Arc;

use platform::coalesce::{CoalescingQueue, QueueConfig, Recompute, RecomputeError};

use crate::domain::repository::DocumentStore;

/// Queue that debounces formula refreshes per project
pub type FormulaQueue<D> = CoalescingQueue<FormulaRefresher<D>>;

pub struct FormulaRefresher<D> {
    store: Arc<D>,
}

impl<D> FormulaRefresher<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<D>) -> Self {
        Self { store }
    }

    /// Build the formula queue around this refresher
    pub fn into_queue(self, config: QueueConfig) -> FormulaQueue<D> {
        CoalescingQueue::new(config, Arc::new(self))
    }
}

impl<D> Recompute for FormulaRefresher<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    async fn recompute(&self, key: &str, credential: &str) -> Result<(), RecomputeError> {
        self.store
            .refresh_formulas(credential, key)
            .await
            .map_err(RecomputeError::from)
    }
}
