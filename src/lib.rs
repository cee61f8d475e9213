pub mod client;
pub mod config;
pub mod engine;
pub mod pool;
pub mod protocol;
pub mod reconcile;
pub mod server;
pub mod session;
pub mod transport;
pub mod world;

pub use config::{Config, ConfigLoader};
pub use pool::{EmptyPool, EntityPool};
pub use reconcile::{ReconcileError, Reconciler, Reconciliation};
pub use session::{Frame, FrameOutcome, Session};
pub use world::{CreationFailure, PhysicsWorld, SimWorld, SpawnSpec};
