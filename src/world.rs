use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

const GRAVITY: f64 = 980.0;
const FLOOR_Y: f64 = 580.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    Circle { radius: f64 },
    Polygon { sides: u32, radius: f64 },
    Rectangle { width: f64, height: f64 },
}

impl Shape {
    /// Distance from the body's centre to its lowest point.
    pub fn half_height(&self) -> f64 {
        match *self {
            Shape::Circle { radius } | Shape::Polygon { radius, .. } => radius,
            Shape::Rectangle { height, .. } => height / 2.0,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        match *self {
            Shape::Circle { radius } => radius <= 0.0,
            Shape::Polygon { sides, radius } => sides < 3 || radius <= 0.0,
            Shape::Rectangle { width, height } => width <= 0.0 || height <= 0.0,
        }
    }
}

/// Where and what to spawn when the pool grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub shape: Shape,
    pub x: f64,
    pub y: f64,
}

impl SpawnSpec {
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Self {
            shape: Shape::Circle { radius },
            x,
            y,
        }
    }

    pub fn polygon(x: f64, y: f64, sides: u32, radius: f64) -> Self {
        Self {
            shape: Shape::Polygon { sides, radius },
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("entity creation failed: {reason}")]
pub struct CreationFailure {
    pub reason: String,
}

impl CreationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The physics/render side of the demo. The pool only ever talks to the
/// world through these three calls and never looks inside a handle.
pub trait PhysicsWorld {
    type Handle: Clone + fmt::Debug;

    fn create_entity(&mut self, spec: &SpawnSpec) -> Result<Self::Handle, CreationFailure>;
    fn add(&mut self, handle: &Self::Handle);
    fn remove(&mut self, handle: &Self::Handle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSummary {
    pub tick: u64,
    pub bodies: usize,
}

/// Worlds that advance on their own clock.
pub trait Steppable {
    fn step(&mut self, dt: f64) -> FrameSummary;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Body {
    pub shape: Shape,
    pub x: f64,
    pub y: f64,
    pub vy: f64,
}

/// In-memory world used by the headless client.
#[derive(Debug, Default)]
pub struct SimWorld {
    next_id: u64,
    tick: u64,
    created: BTreeMap<EntityId, Body>,
    live: BTreeMap<EntityId, Body>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn body_count(&self) -> usize {
        self.live.len()
    }

    pub fn body(&self, id: EntityId) -> Option<&Body> {
        self.live.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.live.contains_key(&id)
    }

    pub fn body_ids(&self) -> Vec<EntityId> {
        self.live.keys().copied().collect()
    }
}

impl PhysicsWorld for SimWorld {
    type Handle = EntityId;

    fn create_entity(&mut self, spec: &SpawnSpec) -> Result<EntityId, CreationFailure> {
        if spec.shape.is_degenerate() {
            return Err(CreationFailure::new(format!(
                "degenerate shape {:?}",
                spec.shape
            )));
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.created.insert(
            id,
            Body {
                shape: spec.shape,
                x: spec.x,
                y: spec.y,
                vy: 0.0,
            },
        );
        Ok(id)
    }

    fn add(&mut self, handle: &EntityId) {
        match self.created.remove(handle) {
            Some(body) => {
                self.live.insert(*handle, body);
            }
            None => warn!(entity = %handle, "add for an entity that was never created"),
        }
    }

    fn remove(&mut self, handle: &EntityId) {
        if self.live.remove(handle).is_none() {
            warn!(entity = %handle, "remove for an entity that is not in the world");
        }
    }
}

impl Steppable for SimWorld {
    fn step(&mut self, dt: f64) -> FrameSummary {
        self.tick += 1;
        for body in self.live.values_mut() {
            let floor = FLOOR_Y - body.shape.half_height();
            body.vy += GRAVITY * dt;
            body.y += body.vy * dt;
            if body.y >= floor {
                body.y = floor;
                body.vy = 0.0;
            }
        }
        FrameSummary {
            tick: self.tick,
            bodies: self.live.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_entities_only_count_once_added() {
        let mut world = SimWorld::new();
        let id = world
            .create_entity(&SpawnSpec::circle(400.0, 50.0, 20.0))
            .unwrap();
        assert_eq!(world.body_count(), 0);

        world.add(&id);
        assert!(world.contains(id));
        assert_eq!(world.body_count(), 1);

        world.remove(&id);
        assert!(!world.contains(id));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut world = SimWorld::new();
        let spec = SpawnSpec::circle(0.0, 0.0, 1.0);
        let first = world.create_entity(&spec).unwrap();
        world.add(&first);
        world.remove(&first);
        let second = world.create_entity(&spec).unwrap();
        assert!(second > first);
    }

    #[test]
    fn degenerate_shapes_are_refused() {
        let mut world = SimWorld::new();
        let err = world
            .create_entity(&SpawnSpec::polygon(0.0, 0.0, 2, 10.0))
            .unwrap_err();
        assert!(err.reason.contains("degenerate"));
    }

    #[test]
    fn bodies_fall_and_rest_on_the_floor() {
        let mut world = SimWorld::new();
        let id = world
            .create_entity(&SpawnSpec::circle(400.0, 50.0, 20.0))
            .unwrap();
        world.add(&id);

        let frame = world.step(1.0 / 60.0);
        assert_eq!(frame, FrameSummary { tick: 1, bodies: 1 });
        assert!(world.body(id).unwrap().y > 50.0);

        for _ in 0..600 {
            world.step(1.0 / 60.0);
        }
        let body = world.body(id).unwrap();
        assert_eq!(body.y, FLOOR_Y - 20.0);
        assert_eq!(body.vy, 0.0);
    }
}
