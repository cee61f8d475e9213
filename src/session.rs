use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::pool::EntityPool;
use crate::protocol::{self, DecodeError};
use crate::reconcile::{ReconcileError, Reconciler, Reconciliation};
use crate::world::PhysicsWorld;

/// The pool as seen by both the session and the stepping loop.
pub type SharedPool<W> = Arc<Mutex<EntityPool<W>>>;

pub(crate) fn lock<W: PhysicsWorld>(pool: &SharedPool<W>) -> MutexGuard<'_, EntityPool<W>> {
    pool.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A raw frame handed over by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Closed,
}

impl Frame {
    fn payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(text) => Some(text.as_bytes()),
            Frame::Binary(bytes) => Some(bytes),
            Frame::Closed => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Debug)]
pub enum FrameOutcome {
    Applied(Reconciliation),
    Ignored,
    Rejected(SessionError),
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub applied: u64,
    pub ignored: u64,
    pub rejected: u64,
}

/// Drains inbound frames one at a time into the reconciler.
pub struct Session<W: PhysicsWorld> {
    pool: SharedPool<W>,
    reconciler: Reconciler,
    target: Option<usize>,
    stats: SessionStats,
}

impl<W: PhysicsWorld> Session<W> {
    pub fn new(pool: EntityPool<W>) -> Self {
        Self {
            pool: Arc::new(Mutex::new(pool)),
            reconciler: Reconciler::new(),
            target: None,
            stats: SessionStats::default(),
        }
    }

    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.reconciler = Reconciler::with_max_count(max_count);
        self
    }

    pub fn shared(&self) -> SharedPool<W> {
        Arc::clone(&self.pool)
    }

    /// Last valid count announced by the server.
    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn count(&self) -> usize {
        lock(&self.pool).count()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn handle(&mut self, frame: Frame) -> FrameOutcome {
        let Some(payload) = frame.payload() else {
            return FrameOutcome::Closed;
        };
        self.stats.frames += 1;
        debug!(frame = %String::from_utf8_lossy(payload), "frame received");

        let outcome = match protocol::decode(payload) {
            Ok(message) => match message.count {
                Some(target) => self.apply(target),
                None => FrameOutcome::Ignored,
            },
            Err(err) => FrameOutcome::Rejected(err.into()),
        };

        match &outcome {
            FrameOutcome::Applied(step) => {
                self.stats.applied += 1;
                if !step.is_noop() {
                    info!(
                        from = step.from,
                        to = step.to,
                        grown = step.grown,
                        shrunk = step.shrunk,
                        "pool reconciled"
                    );
                }
            }
            FrameOutcome::Ignored => {
                self.stats.ignored += 1;
                debug!("frame carried no count");
            }
            FrameOutcome::Rejected(err) => {
                self.stats.rejected += 1;
                match err {
                    SessionError::Decode(_)
                    | SessionError::Reconcile(ReconcileError::InvalidTarget(..)) => {
                        warn!(error = %err, "frame dropped");
                    }
                    SessionError::Reconcile(_) => {
                        error!(error = %err, count = self.count(), "reconciliation stopped early");
                    }
                }
            }
            FrameOutcome::Closed => {}
        }
        outcome
    }

    fn apply(&mut self, target: i64) -> FrameOutcome {
        let mut pool = lock(&self.pool);
        match self.reconciler.apply(&mut *pool, target) {
            Ok(step) => {
                self.target = Some(step.to);
                FrameOutcome::Applied(step)
            }
            Err(err) => {
                if let ReconcileError::Creation { target, .. } | ReconcileError::Desync { target, .. } =
                    &err
                {
                    self.target = Some(*target);
                }
                FrameOutcome::Rejected(err.into())
            }
        }
    }

    /// Processes frames until the transport closes or the queue is dropped.
    pub async fn run(mut self, mut frames: mpsc::Receiver<Frame>) -> SessionStats {
        while let Some(frame) = frames.recv().await {
            if let FrameOutcome::Closed = self.handle(frame) {
                info!("transport closed");
                break;
            }
        }
        info!(
            frames = self.stats.frames,
            applied = self.stats.applied,
            rejected = self.stats.rejected,
            count = self.count(),
            "session finished"
        );
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::testing::RecordingWorld;
    use crate::world::SpawnSpec;

    fn session() -> Session<RecordingWorld> {
        Session::new(EntityPool::new(
            RecordingWorld::default(),
            SpawnSpec::circle(400.0, 50.0, 20.0),
        ))
    }

    fn text(payload: &str) -> Frame {
        Frame::Text(payload.to_string())
    }

    #[test]
    fn binary_frames_are_decoded_like_text() {
        let mut session = session();
        let outcome = session.handle(Frame::Binary(br#"{"count":2}"#.to_vec()));
        assert!(matches!(outcome, FrameOutcome::Applied(_)));
        assert_eq!(session.count(), 2);
    }

    #[test]
    fn bad_frames_keep_the_previous_target() {
        let mut session = session();
        session.handle(text(r#"{"count":2}"#));

        let outcome = session.handle(text("not json"));
        assert!(matches!(
            outcome,
            FrameOutcome::Rejected(SessionError::Decode(_))
        ));
        let outcome = session.handle(text(r#"{"count":-4}"#));
        assert!(matches!(
            outcome,
            FrameOutcome::Rejected(SessionError::Reconcile(ReconcileError::InvalidTarget(-4, _)))
        ));

        assert_eq!(session.target(), Some(2));
        assert_eq!(session.count(), 2);
        assert_eq!(session.stats().rejected, 2);
    }

    #[test]
    fn oversized_counts_are_dropped() {
        let mut session = session().with_max_count(10);
        session.handle(text(r#"{"count":3}"#));

        let outcome = session.handle(text(r#"{"count":9223372036854775807}"#));
        assert!(matches!(
            outcome,
            FrameOutcome::Rejected(SessionError::Reconcile(ReconcileError::InvalidTarget(_, 10)))
        ));
        assert_eq!(session.count(), 3);
        assert_eq!(session.target(), Some(3));
    }

    #[test]
    fn creation_failure_is_reported_and_the_next_frame_resumes() {
        let mut session = Session::new(EntityPool::new(
            RecordingWorld::failing_after(1),
            SpawnSpec::circle(0.0, 0.0, 1.0),
        ));
        let outcome = session.handle(text(r#"{"count":3}"#));
        assert!(matches!(
            outcome,
            FrameOutcome::Rejected(SessionError::Reconcile(ReconcileError::Creation { .. }))
        ));
        assert_eq!(session.count(), 1);
        assert_eq!(session.target(), Some(3));

        let outcome = session.handle(text(r#"{"count":0}"#));
        assert!(matches!(outcome, FrameOutcome::Applied(_)));
        assert_eq!(session.count(), 0);
    }

    #[tokio::test]
    async fn run_stops_on_close_and_reports_stats() {
        let session = session();
        let shared = session.shared();
        let (tx, rx) = mpsc::channel(8);
        for frame in [
            text(r#"{"count":3}"#),
            text("{}"),
            text("oops"),
            Frame::Closed,
            text(r#"{"count":9}"#),
        ] {
            tx.send(frame).await.unwrap();
        }

        let stats = session.run(rx).await;
        assert_eq!(
            stats,
            SessionStats {
                frames: 3,
                applied: 1,
                ignored: 1,
                rejected: 1,
            }
        );
        assert_eq!(lock(&shared).count(), 3);
    }
}
