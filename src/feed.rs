//! Layer feed: fetch → map → publish, with memoized render projections.
//!
//! ```text
//! Uninitialized ──refresh──► Loading ──ok──► Ready
//!                               │
//!                               └──err──► Error   (stays until the next refresh)
//! ```
//!
//! A refresh builds a complete [`FeedSnapshot`] off to the side and swaps it
//! in with one pointer write, so readers see either the old collections or
//! the new ones, never a mix. Concurrent refreshes are not deduplicated:
//! whichever response resolves last is what stays published.

use civic_types::{DomainEntity, RadiusTable, ValidationError, Zone};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::descriptor::{CircleDescriptor, MarkerDescriptor, SelectHandler};
use crate::fetch::{EntitySource, FetchError};
use crate::mapper;

#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    Uninitialized,
    Loading,
    Ready,
    Error(FetchError),
}

impl FeedState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// One published generation of entities and the zones derived from them.
#[derive(Debug)]
pub struct FeedSnapshot<E> {
    generation: u64,
    entities: Arc<[E]>,
    zones: Arc<[Zone]>,
    rejected: Vec<ValidationError>,
}

impl<E> FeedSnapshot<E> {
    fn empty() -> Self {
        Self {
            generation: 0,
            entities: Arc::from(Vec::new()),
            zones: Arc::from(Vec::new()),
            rejected: Vec::new(),
        }
    }

    /// 0 before the first successful refresh, then 1, 2, ...
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entities(&self) -> &Arc<[E]> {
        &self.entities
    }

    pub fn zones(&self) -> &Arc<[Zone]> {
        &self.zones
    }

    pub fn skipped(&self) -> usize {
        self.rejected.len()
    }

    pub fn rejected(&self) -> &[ValidationError] {
        &self.rejected
    }
}

/// Cached projection plus the identities it was computed from.
struct Memo<U: ?Sized, T> {
    upstream: Arc<U>,
    value: Arc<[T]>,
}

struct FeedInner<E> {
    state: FeedState,
    snapshot: Arc<FeedSnapshot<E>>,
    generation: u64,
    markers: Option<(Memo<[E], MarkerDescriptor<E>>, SelectHandler<E>)>,
    circles: Option<Memo<[Zone], CircleDescriptor>>,
}

pub struct LayerFeed<E, S> {
    source: S,
    radii: RadiusTable,
    segments: usize,
    on_select: SelectHandler<E>,
    inner: Mutex<FeedInner<E>>,
}

impl<E: DomainEntity, S: EntitySource> LayerFeed<E, S> {
    /// `on_select` is wrapped here, once; every marker this feed ever
    /// produces shares that one callback.
    pub fn new(
        source: S,
        radii: RadiusTable,
        segments: usize,
        on_select: impl Fn(&E) + Send + Sync + 'static,
    ) -> Self {
        Self::with_handler(source, radii, segments, SelectHandler::new(on_select))
    }

    pub fn with_handler(
        source: S,
        radii: RadiusTable,
        segments: usize,
        on_select: SelectHandler<E>,
    ) -> Self {
        Self {
            source,
            radii,
            segments,
            on_select,
            inner: Mutex::new(FeedInner {
                state: FeedState::Uninitialized,
                snapshot: Arc::new(FeedSnapshot::empty()),
                generation: 0,
                markers: None,
                circles: None,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, FeedInner<E>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn select_handler(&self) -> &SelectHandler<E> {
        &self.on_select
    }

    pub fn state(&self) -> FeedState {
        self.inner().state.clone()
    }

    pub fn snapshot(&self) -> Arc<FeedSnapshot<E>> {
        Arc::clone(&self.inner().snapshot)
    }

    pub fn skipped(&self) -> usize {
        self.inner().snapshot.skipped()
    }

    /// Fetch and publish a new generation.
    ///
    /// On failure the previous snapshot stays published and the state becomes
    /// `Error` until the next refresh.
    pub async fn refresh(&self) -> Result<Arc<FeedSnapshot<E>>, FetchError> {
        self.inner().state = FeedState::Loading;
        tracing::debug!(kind = E::KIND, source = %self.source.describe(), "refreshing feed");

        // No lock is held while the fetch is in flight.
        let fetched = self.source.fetch().await;

        let raw = match fetched {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(kind = E::KIND, code = e.code(), error = %e, "feed refresh failed");
                self.inner().state = FeedState::Error(e.clone());
                return Err(e);
            }
        };

        let batch = mapper::to_entities::<E>(&raw);
        let zones = mapper::to_zones(&batch.items, &self.radii, self.segments);

        let mut inner = self.inner();
        inner.generation += 1;
        let snapshot = Arc::new(FeedSnapshot {
            generation: inner.generation,
            entities: Arc::from(batch.items),
            zones: Arc::from(zones),
            rejected: batch.errors,
        });
        inner.snapshot = Arc::clone(&snapshot);
        inner.state = FeedState::Ready;
        drop(inner);

        tracing::info!(
            kind = E::KIND,
            generation = snapshot.generation,
            entities = snapshot.entities.len(),
            skipped = snapshot.skipped(),
            "feed ready"
        );
        Ok(snapshot)
    }

    /// Marker descriptors for the current entities.
    ///
    /// Returns the same `Arc` for as long as neither the published entity
    /// collection nor the select handler changes.
    pub fn markers(&self) -> Arc<[MarkerDescriptor<E>]> {
        let mut inner = self.inner();
        let entities = Arc::clone(&inner.snapshot.entities);
        if let Some((memo, handler)) = &inner.markers {
            if Arc::ptr_eq(&memo.upstream, &entities) && handler.ptr_eq(&self.on_select) {
                return Arc::clone(&memo.value);
            }
        }
        let value: Arc<[MarkerDescriptor<E>]> =
            Arc::from(mapper::to_marker_descriptors(&entities, &self.on_select));
        inner.markers = Some((
            Memo {
                upstream: entities,
                value: Arc::clone(&value),
            },
            self.on_select.clone(),
        ));
        value
    }

    /// Circle descriptors for the current zones, memoized like [`markers`](Self::markers).
    pub fn circles(&self) -> Arc<[CircleDescriptor]> {
        let mut inner = self.inner();
        let zones = Arc::clone(&inner.snapshot.zones);
        if let Some(memo) = &inner.circles {
            if Arc::ptr_eq(&memo.upstream, &zones) {
                return Arc::clone(&memo.value);
            }
        }
        let value: Arc<[CircleDescriptor]> = Arc::from(mapper::to_circle_descriptors(&zones));
        inner.circles = Some(Memo {
            upstream: zones,
            value: Arc::clone(&value),
        });
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use civic_types::Incident;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    use crate::fetch::StaticSource;

    fn incidents(ids: &[u32]) -> Vec<serde_json::Value> {
        ids.iter()
            .map(|id| json!({"id": id, "lat": 37.5, "lng": 127.0, "severity": "high", "kind": "hazard"}))
            .collect()
    }

    fn feed(items: Vec<serde_json::Value>) -> LayerFeed<Incident, StaticSource> {
        LayerFeed::new(StaticSource::new(items), RadiusTable::default(), 16, |_| {})
    }

    struct Failing;

    #[async_trait]
    impl EntitySource for Failing {
        fn describe(&self) -> String {
            "failing".into()
        }

        async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
            Err(FetchError::Http {
                url: "http://x/incidents".into(),
                status: 503,
            })
        }
    }

    /// Each fetch waits on the next gate, so tests choose resolution order.
    struct Gated {
        gates: Mutex<VecDeque<oneshot::Receiver<Vec<serde_json::Value>>>>,
        started: AtomicUsize,
    }

    #[async_trait]
    impl EntitySource for Gated {
        fn describe(&self) -> String {
            "gated".into()
        }

        async fn fetch(&self) -> Result<Vec<serde_json::Value>, FetchError> {
            let gate = self.gates.lock().unwrap().pop_front();
            self.started.fetch_add(1, Ordering::SeqCst);
            match gate {
                Some(rx) => rx.await.map_err(|e| FetchError::Transport {
                    url: "gated".into(),
                    message: e.to_string(),
                }),
                None => Ok(Vec::new()),
            }
        }
    }

    #[tokio::test]
    async fn test_states_progress_to_ready() {
        let feed = feed(incidents(&[1, 2]));
        assert_eq!(feed.state(), FeedState::Uninitialized);
        assert!(feed.markers().is_empty());

        let snapshot = feed.refresh().await.unwrap();
        assert_eq!(feed.state(), FeedState::Ready);
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.entities().len(), 2);
        assert_eq!(snapshot.zones().len(), 2);
    }

    #[tokio::test]
    async fn test_projection_is_referentially_stable() {
        let feed = feed(incidents(&[1, 2, 3]));
        feed.refresh().await.unwrap();

        let a = feed.markers();
        let b = feed.markers();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&feed.circles(), &feed.circles()));

        // A new generation is a new upstream collection.
        feed.refresh().await.unwrap();
        assert!(!Arc::ptr_eq(&a, &feed.markers()));
    }

    #[tokio::test]
    async fn test_markers_share_the_feed_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let feed: LayerFeed<Incident, _> = LayerFeed::new(
            StaticSource::new(incidents(&[1, 2])),
            RadiusTable::default(),
            16,
            move |_: &Incident| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        feed.refresh().await.unwrap();
        let before = feed.markers();
        before[0].select();
        before[1].select();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // A refresh re-derives markers but the callback stays the same one.
        feed.refresh().await.unwrap();
        feed.markers()[0].select();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_items_are_counted_not_fatal() {
        let mut items = incidents(&[1, 2]);
        items.push(json!({"id": 9, "lat": 999, "lng": 127.0}));
        let feed = feed(items);
        feed.refresh().await.unwrap();
        assert_eq!(feed.skipped(), 1);
        assert_eq!(feed.snapshot().entities().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_enters_error_state() {
        let feed: LayerFeed<Incident, _> =
            LayerFeed::new(Failing, RadiusTable::default(), 16, |_| {});
        let err = feed.refresh().await.unwrap_err();
        assert_eq!(err.code(), "HTTP_STATUS");
        assert_eq!(feed.state().error(), Some(&err));
        assert_eq!(feed.snapshot().generation(), 0);
    }

    #[tokio::test]
    async fn test_last_response_to_resolve_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let source = Gated {
            gates: Mutex::new(VecDeque::from([first_rx, second_rx])),
            started: AtomicUsize::new(0),
        };
        let feed: Arc<LayerFeed<Incident, Gated>> = Arc::new(LayerFeed::new(
            source,
            RadiusTable::default(),
            16,
            |_| {},
        ));

        let first = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        while feed.source().started.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }
        let second = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        while feed.source().started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        second_tx.send(incidents(&[2, 2, 2])).unwrap();
        second.await.unwrap().unwrap();
        first_tx.send(incidents(&[1])).unwrap();
        first.await.unwrap().unwrap();

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.entities().len(), 1);
        assert_eq!(snapshot.entities()[0].id().as_str(), "1");
        assert_eq!(snapshot.generation(), 2);
    }
}
