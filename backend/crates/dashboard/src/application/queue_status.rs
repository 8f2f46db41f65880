//! Formula Queue Status Use Case
//!
//! Read-only operational view of the formula queue. Admins only.

use std::collections::HashMap;
use std::sync::Arc;

use platform::coalesce::{PendingSnapshot, QueueStats};

use crate::application::config::DashboardConfig;
use crate::application::formula_refresher::FormulaQueue;
use crate::domain::entities::Session;
use crate::domain::repository::DocumentStore;
use crate::error::{DashboardError, DashboardResult};

pub struct QueueStatusOutput {
    pub depth: usize,
    pub armed: bool,
    pub flushing: bool,
    pub pending: Vec<PendingSnapshot>,
    pub last_completed: HashMap<String, i64>,
    pub stats: QueueStats,
    pub limiter_buckets: usize,
}

pub struct QueueStatusUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    formula_queue: FormulaQueue<D>,
    config: Arc<DashboardConfig>,
}

impl<D> QueueStatusUseCase<D>
where
    D: DocumentStore + Send + Sync + 'static,
{
    pub fn new(formula_queue: FormulaQueue<D>, config: Arc<DashboardConfig>) -> Self {
        Self {
            formula_queue,
            config,
        }
    }

    pub fn execute(
        &self,
        session: &Session,
        limiter_buckets: usize,
    ) -> DashboardResult<QueueStatusOutput> {
        if !self.config.is_admin(&session.email) {
            tracing::warn!(
                user_id = %session.user_id,
                "Non-admin requested formula queue status"
            );
            return Err(DashboardError::Forbidden);
        }

        Ok(QueueStatusOutput {
            depth: self.formula_queue.depth(),
            armed: self.formula_queue.is_armed(),
            flushing: self.formula_queue.is_flushing(),
            pending: self.formula_queue.pending(),
            last_completed: self.formula_queue.last_completed(),
            stats: self.formula_queue.stats(),
            limiter_buckets,
        })
    }
}
