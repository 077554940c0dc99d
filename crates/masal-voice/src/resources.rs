//! Active resource registry — bookkeeping for everything a global `stop()`
//! must be able to destroy.
//!
//! Two kinds of resource are tracked while live: playing audio sinks and
//! pending timers (the local-synthesis watchdog). Tracking is scoped: both
//! `track_*` methods return a [`ResourceGuard`] that untracks on drop, so
//! every exit path — success, error, cancellation — deregisters exactly
//! once without relying on convention.
//!
//! `stop_all()` additionally sweeps a set of registered *ambient* stoppables
//! (the shared playback sink, the local speech engine). Some audio can be
//! started by collaborators outside the registry's direct knowledge; the
//! sweep stops those too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::playback::AudioSink;

// ── Force-stop sweep ───────────────────────────────────────────────

/// Anything `stop_all()` silences unconditionally, tracked or not.
pub trait ForceStop: Send + Sync {
    /// Stop immediately. Must be idempotent and safe when already stopped.
    fn force_stop(&self);
}

/// [`ForceStop`] wrapper for a shared audio sink.
pub struct SinkSweeper(pub Arc<dyn AudioSink>);

impl ForceStop for SinkSweeper {
    fn force_stop(&self) {
        self.0.stop();
    }
}

// ── Tracked resources ──────────────────────────────────────────────

enum TrackedResource {
    /// A currently-playing audio sink.
    Sink(Arc<dyn AudioSink>),
    /// A pending timer, cancelled (not merely abandoned) on stop.
    Timer(CancellationToken),
}

/// Scoped tracking handle. Dropping the guard untracks the resource.
pub struct ResourceGuard {
    registry: Arc<ActiveResourceRegistry>,
    id: u64,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.registry.untrack(self.id);
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Set of all currently-playing audio resources and pending timers created
/// by the orchestrator.
#[derive(Default)]
pub struct ActiveResourceRegistry {
    tracked: Mutex<HashMap<u64, TrackedResource>>,
    sweepers: Mutex<Vec<Arc<dyn ForceStop>>>,
    next_id: AtomicU64,
}

impl ActiveResourceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ambient stoppable swept by every [`stop_all`](Self::stop_all).
    pub fn register_sweeper(&self, sweeper: Arc<dyn ForceStop>) {
        self.sweepers.lock().unwrap().push(sweeper);
    }

    /// Track a playing sink until the returned guard drops.
    #[must_use]
    pub fn track_sink(self: &Arc<Self>, sink: Arc<dyn AudioSink>) -> ResourceGuard {
        self.track(TrackedResource::Sink(sink))
    }

    /// Track a pending timer until the returned guard drops.
    #[must_use]
    pub fn track_timer(self: &Arc<Self>, token: CancellationToken) -> ResourceGuard {
        self.track(TrackedResource::Timer(token))
    }

    /// Stop and forget everything.
    ///
    /// Idempotent and order-independent: every tracked sink is stopped,
    /// every tracked timer cancelled, and every registered sweeper fired —
    /// in that order, but each step tolerates already-stopped targets.
    /// The registry is empty afterwards.
    pub fn stop_all(&self) {
        let drained: Vec<TrackedResource> = {
            let mut tracked = self.tracked.lock().unwrap();
            tracked.drain().map(|(_, r)| r).collect()
        };

        let count = drained.len();
        for resource in drained {
            match resource {
                TrackedResource::Sink(sink) => sink.stop(),
                TrackedResource::Timer(token) => token.cancel(),
            }
        }

        let sweepers: Vec<Arc<dyn ForceStop>> = self.sweepers.lock().unwrap().clone();
        for sweeper in sweepers {
            sweeper.force_stop();
        }

        if count > 0 {
            tracing::debug!(stopped = count, "Active resources force-stopped");
        }
    }

    /// Number of currently tracked resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.lock().unwrap().len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.lock().unwrap().is_empty()
    }

    fn track(self: &Arc<Self>, resource: TrackedResource) -> ResourceGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tracked.lock().unwrap().insert(id, resource);
        ResourceGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    fn untrack(&self, id: u64) {
        self.tracked.lock().unwrap().remove(&id);
    }
}
