//! Surface reconciler: keeps the primitives on a surface in step with a
//! logical collection keyed by stable id.
//!
//! A pass runs in two phases, always in this order:
//! 1. add: every feature without a tracked primitive is registered;
//! 2. remove: every tracked primitive whose id is absent from the collection
//!    is removed.
//!
//! Primitives whose id is present before and after a pass are never touched,
//! so re-running a pass with the same collection makes no surface calls.
//! Adding before removing means a persisting feature is never briefly
//! missing from the map.

use civic_types::Geometry;
use std::collections::HashSet;
use std::sync::Arc;

use crate::surface::{
    lock, LayerStyle, MapSurface, Palette, PrimitiveHandle, PrimitiveRegistry, SharedSurface,
};

/// Anything the reconciler can put on a surface.
pub trait SurfaceFeature {
    /// Stable logical id. Two features with the same key are the same thing.
    fn key(&self) -> &str;

    /// Geometry to register, or `None` when the feature is degenerate (for
    /// example a ring that cannot be closed). Degenerate features are skipped.
    fn geometry(&self) -> Option<Geometry>;

    fn style(&self, palette: &Palette) -> LayerStyle;
}

/// Counts from one applied pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Degenerate features left off the surface.
    pub skipped: usize,
    /// Features the surface refused.
    pub failed: usize,
}

impl ReconcileReport {
    /// True when the pass made no surface mutations.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(ReconcileReport),
    /// The surface was still loading; the pass runs on the next
    /// [`SurfaceReconciler::on_surface_ready`].
    Deferred,
}

pub struct SurfaceReconciler<F> {
    registry: PrimitiveRegistry,
    palette: Palette,
    pending: Option<Arc<[F]>>,
}

impl<F: SurfaceFeature> SurfaceReconciler<F> {
    /// `component` names the id namespace (e.g. "zones", "markers").
    pub fn new(component: &str, palette: Palette) -> Self {
        Self {
            registry: PrimitiveRegistry::new(component),
            palette,
            pending: None,
        }
    }

    /// Converge the surface to exactly `features`.
    ///
    /// On a surface that is not ready nothing is registered; the collection is
    /// kept (replacing any earlier deferred one) for `on_surface_ready`.
    pub fn reconcile<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        features: Arc<[F]>,
    ) -> ReconcileOutcome {
        if !surface.is_ready() {
            tracing::debug!(
                owner = %self.registry.owner(),
                features = features.len(),
                "surface not ready, deferring reconciliation"
            );
            self.pending = Some(features);
            return ReconcileOutcome::Deferred;
        }
        self.pending = None;
        ReconcileOutcome::Applied(self.apply(surface, &features))
    }

    /// Same as [`reconcile`](Self::reconcile) against a shared surface.
    pub fn reconcile_shared<S: MapSurface>(
        &mut self,
        surface: &SharedSurface<S>,
        features: Arc<[F]>,
    ) -> ReconcileOutcome {
        let mut guard = lock(surface);
        self.reconcile(&mut *guard, features)
    }

    /// Ready event: run the deferred pass, once. Returns `None` when there was
    /// nothing pending or the surface is still not ready.
    pub fn on_surface_ready<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
    ) -> Option<ReconcileReport> {
        let features = self.pending.take()?;
        if !surface.is_ready() {
            self.pending = Some(features);
            return None;
        }
        Some(self.apply(surface, &features))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn apply<S: MapSurface + ?Sized>(&mut self, surface: &mut S, features: &[F]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut present: HashSet<&str> = HashSet::with_capacity(features.len());

        for feature in features {
            let key = feature.key();
            if !present.insert(key) {
                // Repeated id within one collection: first occurrence wins.
                continue;
            }
            if self.registry.contains(key) {
                report.unchanged += 1;
                continue;
            }
            let Some(geometry) = feature.geometry() else {
                tracing::debug!(key, "skipping feature with degenerate geometry");
                report.skipped += 1;
                continue;
            };
            let style = feature.style(&self.palette);
            match self.registry.register(surface, key, &geometry, &style) {
                Ok(_) => report.added += 1,
                Err(e) => {
                    tracing::warn!(key, error = %e, "surface rejected primitive");
                    report.failed += 1;
                }
            }
        }

        let stale: Vec<String> = self
            .registry
            .keys()
            .into_iter()
            .filter(|key| !present.contains(key))
            .map(str::to_string)
            .collect();
        for key in &stale {
            if self.registry.remove(surface, key) {
                report.removed += 1;
            }
        }

        tracing::debug!(
            owner = %self.registry.owner(),
            added = report.added,
            removed = report.removed,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "reconciled"
        );
        report
    }

    /// Remove every tracked primitive and drop any deferred pass. Safe to call
    /// any number of times.
    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        self.pending = None;
        let removed = self.registry.teardown(surface);
        if removed > 0 {
            tracing::debug!(owner = %self.registry.owner(), removed, "reconciler torn down");
        }
        removed
    }

    /// The surface was destroyed (and may be recreated): forget what was on
    /// it so the next pass registers everything again.
    pub fn forget_surface(&mut self) -> usize {
        self.pending = None;
        self.registry.forget()
    }

    pub fn tracked_keys(&self) -> Vec<&str> {
        self.registry.keys()
    }

    pub fn handles(&self) -> Vec<&PrimitiveHandle> {
        self.registry.handles()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

impl<F> Drop for SurfaceReconciler<F> {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            tracing::debug!(
                owner = %self.registry.owner(),
                remaining = self.registry.len(),
                "reconciler dropped without teardown"
            );
        }
    }
}
