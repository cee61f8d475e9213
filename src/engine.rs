use std::time::Duration;

use tracing::info;

use crate::session::{lock, SharedPool};
use crate::world::{FrameSummary, PhysicsWorld, Steppable};

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub tick_hz: u32,
    /// Log a frame summary every this many ticks; 0 disables it.
    pub frame_log_interval: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            frame_log_interval: 120,
        }
    }
}

impl EngineSettings {
    pub fn dt(&self) -> f64 {
        1.0 / f64::from(self.tick_hz.max(1))
    }
}

/// Steps the world on its own clock, next to the session.
///
/// Each tick holds the pool lock for the whole step, so a tick sees the pool
/// either before or after a grow/shrink, never halfway through one.
pub struct Engine<W: PhysicsWorld + Steppable> {
    pool: SharedPool<W>,
    settings: EngineSettings,
}

impl<W: PhysicsWorld + Steppable> Engine<W> {
    pub fn new(pool: SharedPool<W>, settings: EngineSettings) -> Self {
        Self { pool, settings }
    }

    pub fn tick(&self) -> FrameSummary {
        let frame = lock(&self.pool).step(self.settings.dt());
        let interval = self.settings.frame_log_interval;
        if interval > 0 && frame.tick % interval == 0 {
            info!(tick = frame.tick, bodies = frame.bodies, "frame");
        }
        frame
    }

    pub fn run_with_hook(&self, ticks: u64, mut hook: impl FnMut(FrameSummary)) {
        for _ in 0..ticks {
            hook(self.tick());
        }
    }

    /// Ticks at `tick_hz` until the task is dropped.
    pub async fn run(self) {
        let mut clock = tokio::time::interval(Duration::from_secs_f64(self.settings.dt()));
        clock.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            clock.tick().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::pool::EntityPool;
    use crate::reconcile::Reconciler;
    use crate::world::{SimWorld, SpawnSpec};

    fn shared() -> SharedPool<SimWorld> {
        Arc::new(Mutex::new(EntityPool::new(
            SimWorld::new(),
            SpawnSpec::circle(400.0, 50.0, 20.0),
        )))
    }

    #[test]
    fn hook_sees_every_tick() {
        let engine = Engine::new(shared(), EngineSettings::default());
        let mut ticks = Vec::new();
        engine.run_with_hook(4, |frame| ticks.push(frame.tick));
        assert_eq!(ticks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn frames_track_reconciled_bodies() {
        let pool = shared();
        let engine = Engine::new(Arc::clone(&pool), EngineSettings::default());

        Reconciler::new().apply(&mut *lock(&pool), 3).unwrap();
        assert_eq!(engine.tick().bodies, 3);

        Reconciler::new().apply(&mut *lock(&pool), 1).unwrap();
        assert_eq!(engine.tick().bodies, 1);
    }

    #[tokio::test]
    async fn run_keeps_ticking_in_the_background() {
        let pool = shared();
        let engine = Engine::new(
            Arc::clone(&pool),
            EngineSettings {
                tick_hz: 10,
                frame_log_interval: 0,
            },
        );
        let task = tokio::spawn(engine.run());
        tokio::time::sleep(Duration::from_millis(550)).await;
        task.abort();

        assert!(lock(&pool).world().tick() >= 3);
    }
}
