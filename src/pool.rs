//! Live set of pool-managed entities.

use thiserror::Error;
use tracing::debug;

use crate::world::{CreationFailure, FrameSummary, PhysicsWorld, SpawnSpec, Steppable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot shrink an empty pool")]
pub struct EmptyPool;

/// Ordered entity handles plus the world they live in.
///
/// `grow`/`shrink` are the only way entities enter or leave the world, so
/// `count()` always matches what the world holds for this pool. Each call
/// either completes fully or leaves the pool untouched.
#[derive(Debug)]
pub struct EntityPool<W: PhysicsWorld> {
    world: W,
    spawn: SpawnSpec,
    entities: Vec<W::Handle>,
}

impl<W: PhysicsWorld> EntityPool<W> {
    pub fn new(world: W, spawn: SpawnSpec) -> Self {
        Self {
            world,
            spawn,
            entities: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Handles in creation order.
    pub fn entities(&self) -> &[W::Handle] {
        &self.entities
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn grow(&mut self) -> Result<W::Handle, CreationFailure> {
        let spec = self.spawn;
        self.grow_with(&spec)
    }

    /// Like `grow`, but with a one-off spawn spec.
    pub fn grow_with(&mut self, spec: &SpawnSpec) -> Result<W::Handle, CreationFailure> {
        let handle = self.world.create_entity(spec)?;
        self.world.add(&handle);
        self.entities.push(handle.clone());
        debug!(?handle, count = self.entities.len(), "pool grew");
        Ok(handle)
    }

    /// Removes the most recently added entity.
    pub fn shrink(&mut self) -> Result<W::Handle, EmptyPool> {
        let handle = self.entities.pop().ok_or(EmptyPool)?;
        self.world.remove(&handle);
        debug!(?handle, count = self.entities.len(), "pool shrank");
        Ok(handle)
    }
}

impl<W: PhysicsWorld + Steppable> EntityPool<W> {
    pub fn step(&mut self, dt: f64) -> FrameSummary {
        self.world.step(dt)
    }
}
