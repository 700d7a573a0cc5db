//! Typed handles for primitives registered on a surface.

use civic_types::Geometry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::{LayerStyle, MapSurface, SurfaceError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(String);

impl LayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Namespace of one component instance on the surface.
///
/// Every tag is unique (random per instance), so ids minted by two owners
/// can never collide even when their logical keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnerTag(Arc<str>);

impl OwnerTag {
    pub fn new(component: &str) -> Self {
        let instance = Uuid::new_v4().simple().to_string();
        Self(format!("{}.{}", component, &instance[..12]).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque receipt for one registered source + layer pair.
///
/// Only this crate can mint handles; UI code receives them read-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimitiveHandle {
    owner: OwnerTag,
    key: String,
    source: SourceId,
    layer: LayerId,
    seq: u64,
}

impl PrimitiveHandle {
    /// Logical id this primitive represents (zone id, step key, ...).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &OwnerTag {
        &self.owner
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.layer
    }

    /// Remove the layer, then its source. Already-missing parts count as
    /// removed, so calling this twice is harmless.
    pub(crate) fn remove<S: MapSurface + ?Sized>(&self, surface: &mut S) {
        if let Err(e) = surface.remove_layer(&self.layer) {
            if !e.is_missing() {
                tracing::warn!(layer = %self.layer, error = %e, "failed to remove layer");
            }
        }
        if let Err(e) = surface.remove_source(&self.source) {
            if !e.is_missing() {
                tracing::warn!(source = %self.source, error = %e, "failed to remove source");
            }
        }
    }
}

/// Primitives created by one owner, keyed by logical id, in creation order.
#[derive(Debug)]
pub struct PrimitiveRegistry {
    owner: OwnerTag,
    handles: HashMap<String, PrimitiveHandle>,
    next_seq: u64,
}

impl PrimitiveRegistry {
    pub fn new(component: &str) -> Self {
        Self::with_owner(OwnerTag::new(component))
    }

    pub fn with_owner(owner: OwnerTag) -> Self {
        Self {
            owner,
            handles: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn owner(&self) -> &OwnerTag {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PrimitiveHandle> {
        self.handles.get(key)
    }

    /// Handles in the order they were registered.
    pub fn handles(&self) -> Vec<&PrimitiveHandle> {
        let mut handles: Vec<&PrimitiveHandle> = self.handles.values().collect();
        handles.sort_by_key(|h| h.seq);
        handles
    }

    pub fn keys(&self) -> Vec<&str> {
        self.handles().into_iter().map(|h| h.key()).collect()
    }

    /// Add a source + layer for `key`. On failure nothing stays on the surface
    /// and nothing is recorded.
    pub fn register<S: MapSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        key: &str,
        geometry: &Geometry,
        style: &LayerStyle,
    ) -> Result<&PrimitiveHandle, SurfaceError> {
        if self.handles.contains_key(key) {
            return Err(SurfaceError::DuplicateSource(key.to_string()));
        }
        let source = SourceId(format!("{}/{}/source", self.owner, key));
        let layer = LayerId(format!("{}/{}/layer", self.owner, key));

        surface.add_source(&source, geometry)?;
        if let Err(e) = surface.add_layer(&layer, &source, style) {
            if let Err(rollback) = surface.remove_source(&source) {
                tracing::warn!(source = %source, error = %rollback, "rollback of source failed");
            }
            return Err(e);
        }

        let handle = PrimitiveHandle {
            owner: self.owner.clone(),
            key: key.to_string(),
            source,
            layer,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        Ok(self.handles.entry(key.to_string()).or_insert(handle))
    }

    /// Remove one primitive from the surface and from the registry.
    pub fn remove<S: MapSurface + ?Sized>(&mut self, surface: &mut S, key: &str) -> bool {
        match self.handles.remove(key) {
            Some(handle) => {
                handle.remove(surface);
                true
            }
            None => false,
        }
    }

    /// Take a handle out of the registry without touching the surface.
    pub(crate) fn detach(&mut self, key: &str) -> Option<PrimitiveHandle> {
        self.handles.remove(key)
    }

    /// Track a handle detached from another registry. Its surface ids keep the
    /// original owner tag.
    pub(crate) fn adopt(&mut self, mut handle: PrimitiveHandle) {
        handle.seq = self.next_seq;
        self.next_seq += 1;
        self.handles.insert(handle.key.clone(), handle);
    }

    /// Remove every primitive, newest first. Idempotent.
    pub fn teardown<S: MapSurface + ?Sized>(&mut self, surface: &mut S) -> usize {
        let mut handles: Vec<PrimitiveHandle> = self.handles.drain().map(|(_, h)| h).collect();
        handles.sort_by_key(|h| std::cmp::Reverse(h.seq));
        for handle in &handles {
            handle.remove(surface);
        }
        handles.len()
    }

    /// Drop all bookkeeping without surface calls (the surface is gone).
    pub fn forget(&mut self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        count
    }
}
