//! Exploration playback.
//!
//! [`PlaybackRun`] is the state machine for one route. [`PlaybackEngine`]
//! owns at most one run at a time and drives it on a tokio timer: a fixed
//! delay before each trace step, cancellable at any step boundary through a
//! `watch` channel.
//!
//! Starting a new route always stops the previous driver task and tears its
//! primitives down before the new run draws anything, so two playbacks never
//! overlap on the surface.

mod run;

pub use run::{PlaybackPhase, PlaybackRun};

use civic_types::Route;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::surface::{lock, MapSurface, Palette, SharedSurface, SurfaceError};

/// Called with the route once its playback settles.
pub type RouteCallback = Arc<dyn Fn(&Route) + Send + Sync>;

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Nothing was playing.
    Idle,
    Settled,
    Cancelled { steps_applied: usize },
}

struct ActivePlayback {
    run: Arc<Mutex<PlaybackRun>>,
    cancel_tx: watch::Sender<bool>,
    /// `None` once the driver has been awaited.
    task: Option<JoinHandle<()>>,
}

impl ActivePlayback {
    /// Signal the driver and wait until it can no longer touch the surface.
    async fn stop(&mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "playback driver panicked");
                }
            }
        }
    }
}

pub struct PlaybackEngine<S: MapSurface + Send + 'static> {
    surface: SharedSurface<S>,
    palette: Palette,
    step_delay: Duration,
    on_route_found: Option<RouteCallback>,
    current: Option<ActivePlayback>,
}

impl<S: MapSurface + Send + 'static> PlaybackEngine<S> {
    pub fn new(surface: SharedSurface<S>, palette: Palette, step_delay: Duration) -> Self {
        Self {
            surface,
            palette,
            step_delay,
            on_route_found: None,
            current: None,
        }
    }

    pub fn on_route_found(mut self, callback: impl Fn(&Route) + Send + Sync + 'static) -> Self {
        self.on_route_found = Some(Arc::new(callback));
        self
    }

    pub fn surface(&self) -> &SharedSurface<S> {
        &self.surface
    }

    /// Phase of the current run, `Idle` when there is none.
    pub fn phase(&self) -> PlaybackPhase {
        self.current
            .as_ref()
            .map(|active| lock(&active.run).phase())
            .unwrap_or(PlaybackPhase::Idle)
    }

    /// Keys the current run has registered so far, in creation order.
    pub fn created(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(|active| lock(&active.run).created().to_vec())
            .unwrap_or_default()
    }

    /// Replace whatever is playing with `route`.
    ///
    /// The previous run is stopped and torn down first (its skeleton is kept
    /// when `route` reveals the same graph). Returns how the previous run
    /// ended.
    pub async fn start(&mut self, route: Route) -> PlaybackOutcome {
        let mut next = PlaybackRun::new(Arc::new(route), self.palette.clone());

        let previous = match self.current.take() {
            Some(mut active) => {
                active.stop().await;
                let mut prev = lock(&active.run);
                let mut surface = lock(&self.surface);
                next.adopt_skeleton(&mut prev);
                Self::finish(&mut prev, &mut *surface)
            }
            None => PlaybackOutcome::Idle,
        };

        tracing::info!(
            algorithm = next.route().algorithm(),
            steps = next.route().steps().len(),
            delay_ms = self.step_delay.as_millis() as u64,
            "starting playback"
        );

        let run = Arc::new(Mutex::new(next));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(drive(
            Arc::clone(&run),
            Arc::clone(&self.surface),
            self.step_delay,
            cancel_rx,
            self.on_route_found.clone(),
        ));
        self.current = Some(ActivePlayback {
            run,
            cancel_tx,
            task: Some(task),
        });
        previous
    }

    /// Stop the current run and remove everything it drew.
    pub async fn cancel(&mut self) -> PlaybackOutcome {
        let Some(mut active) = self.current.take() else {
            return PlaybackOutcome::Idle;
        };
        active.stop().await;
        let mut run = lock(&active.run);
        let mut surface = lock(&self.surface);
        Self::finish(&mut run, &mut *surface)
    }

    /// Wait for the current run to settle (or stop on a surface failure)
    /// without tearing it down.
    pub async fn wait(&mut self) -> PlaybackOutcome {
        let Some(active) = self.current.as_mut() else {
            return PlaybackOutcome::Idle;
        };
        if let Some(task) = active.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "playback driver ended abnormally");
            }
        }
        let run = lock(&active.run);
        match run.phase() {
            PlaybackPhase::Settled => PlaybackOutcome::Settled,
            _ => PlaybackOutcome::Cancelled {
                steps_applied: run.steps_applied(),
            },
        }
    }

    /// Unmount: stop and remove everything.
    pub async fn shutdown(mut self) -> PlaybackOutcome {
        let outcome = self.cancel().await;
        tracing::debug!(?outcome, "playback engine shut down");
        outcome
    }

    fn finish(run: &mut PlaybackRun, surface: &mut S) -> PlaybackOutcome {
        let outcome = match run.phase() {
            PlaybackPhase::Settled => PlaybackOutcome::Settled,
            _ => PlaybackOutcome::Cancelled {
                steps_applied: run.steps_applied(),
            },
        };
        if run.phase() == PlaybackPhase::Settled {
            run.teardown(surface);
        } else {
            run.cancel(surface);
        }
        outcome
    }
}

/// Dropping the engine unmounts it: the driver is stopped and everything the
/// current run drew is removed, same as [`PlaybackEngine::cancel`].
impl<S: MapSurface + Send + 'static> Drop for PlaybackEngine<S> {
    fn drop(&mut self) {
        let Some(active) = self.current.take() else {
            return;
        };
        let _ = active.cancel_tx.send(true);
        if let Some(task) = &active.task {
            task.abort();
        }
        // A driver mid-advance finishes under the locks first; once the run
        // is cancelled or torn down, `advance` draws nothing more.
        let mut run = lock(&active.run);
        let mut surface = lock(&self.surface);
        let outcome = Self::finish(&mut run, &mut *surface);
        tracing::debug!(?outcome, "playback engine dropped without shutdown");
    }
}

/// Driver task: advance the run, sleeping `delay` before every trace step.
async fn drive<S: MapSurface + Send + 'static>(
    run: Arc<Mutex<PlaybackRun>>,
    surface: SharedSurface<S>,
    delay: Duration,
    mut cancel_rx: watch::Receiver<bool>,
    on_route_found: Option<RouteCallback>,
) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }

        let phase = lock(&run).phase();
        if phase.is_terminal() {
            return;
        }
        if matches!(phase, PlaybackPhase::AnimatingTrace { .. }) {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx.changed() => return,
            }
            if *cancel_rx.borrow() {
                return;
            }
        }

        let result = {
            let mut run = lock(&run);
            let mut surface = lock(&surface);
            run.advance(&mut *surface)
        };

        match result {
            Ok(PlaybackPhase::Settled) => {
                let route = Arc::clone(lock(&run).route());
                tracing::info!(
                    algorithm = route.algorithm(),
                    distance_m = route.total_distance_m(),
                    "playback settled"
                );
                if let Some(callback) = &on_route_found {
                    callback(&route);
                }
                return;
            }
            Ok(_) => {}
            Err(SurfaceError::NotReady) => {
                tracing::debug!("surface not ready, playback waiting");
                tokio::select! {
                    _ = tokio::time::sleep(delay.max(Duration::from_millis(10))) => {}
                    _ = cancel_rx.changed() => return,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "playback stopped by surface error");
                return;
            }
        }
    }
}
