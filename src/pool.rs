// src/pool.rs
//! Fixed-size batch pool: items run concurrently within a batch, batches run
//! one after another. At most `batch_size` futures are in flight at a time.

use std::future::Future;

use futures::future::join_all;
use tracing::trace;

pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPool {
    batch_size: usize,
}

impl Default for BatchPool {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchPool {
    /// A zero size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Sizes of the batches `items` inputs would be split into.
    pub fn plan(&self, items: usize) -> Vec<usize> {
        (0..items)
            .step_by(self.batch_size)
            .map(|start| (items - start).min(self.batch_size))
            .collect()
    }

    /// Run `f` over `items`; results keep input order.
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, mut f: F) -> Vec<R>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = R>,
    {
        let total = items.len();
        let mut out = Vec::with_capacity(total);
        let mut pending = items.into_iter().peekable();
        let mut batch_no = 0usize;

        while pending.peek().is_some() {
            let batch: Vec<Fut> = pending.by_ref().take(self.batch_size).map(&mut f).collect();
            batch_no += 1;
            trace!(target: "verify", batch_no, size = batch.len(), total, "running batch");
            out.extend(join_all(batch).await);
        }
        out
    }
}
