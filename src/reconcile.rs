use serde::Serialize;
use thiserror::Error;

use crate::pool::EntityPool;
use crate::world::{CreationFailure, PhysicsWorld};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("target count {0} is outside 0..={1}")]
    InvalidTarget(i64, usize),
    #[error("pool ran dry at {reached} while shrinking toward {target}")]
    Desync { reached: usize, target: usize },
    #[error("stopped at {reached} while growing toward {target}: {source}")]
    Creation {
        reached: usize,
        target: usize,
        #[source]
        source: CreationFailure,
    },
}

/// What one `apply` call did to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub from: usize,
    pub to: usize,
    pub grown: usize,
    pub shrunk: usize,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.grown == 0 && self.shrunk == 0
    }
}

/// Drives a pool to a target size one entity at a time.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    max_count: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            max_count: usize::MAX,
        }
    }

    /// Targets above `max_count` are rejected like negative ones.
    pub fn with_max_count(max_count: usize) -> Self {
        Self { max_count }
    }

    pub fn apply<W: PhysicsWorld>(
        &self,
        pool: &mut EntityPool<W>,
        target: i64,
    ) -> Result<Reconciliation, ReconcileError> {
        let target = usize::try_from(target)
            .ok()
            .filter(|&target| target <= self.max_count)
            .ok_or(ReconcileError::InvalidTarget(target, self.max_count))?;
        let from = pool.count();
        let mut grown = 0;
        let mut shrunk = 0;

        while pool.count() < target {
            pool.grow().map_err(|source| ReconcileError::Creation {
                reached: pool.count(),
                target,
                source,
            })?;
            grown += 1;
        }

        while pool.count() > target {
            pool.shrink().map_err(|_| ReconcileError::Desync {
                reached: pool.count(),
                target,
            })?;
            shrunk += 1;
        }

        Ok(Reconciliation {
            from,
            to: pool.count(),
            grown,
            shrunk,
        })
    }
}
