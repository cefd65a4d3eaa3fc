use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::{
    error::FeedError,
    notify::{Notification, Notifier},
};

#[derive(Debug, Clone, PartialEq)]
pub enum FeedState<T> {
    Loading,
    Resolved(Vec<T>),
    Failed(FeedError),
}

impl<T> FeedState<T> {
    pub fn data(&self) -> &[T] {
        match self {
            FeedState::Resolved(data) => data,
            FeedState::Loading | FeedState::Failed(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            FeedState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FeedState::Loading)
    }

    pub fn has_data(&self) -> bool {
        !self.data().is_empty()
    }
}

type FeedQuery<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

/// Deliveries are last-write-wins: a slow refresh that lands after a newer one overwrites it.
pub struct FeedSubscription<T> {
    inner: Arc<FeedInner<T>>,
}

impl<T> Clone for FeedSubscription<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct FeedInner<T> {
    name: &'static str,
    query: FeedQuery<T>,
    state: watch::Sender<FeedState<T>>,
    notifier: Notifier,
    issued: AtomicU64,
    in_flight: AtomicUsize,
    torn_down: AtomicBool,
}

impl<T> FeedSubscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: &'static str, notifier: Notifier, query: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
    {
        let (state, _) = watch::channel(FeedState::Loading);
        Self {
            inner: Arc::new(FeedInner {
                name,
                query: Arc::new(move || query().boxed()),
                state,
                notifier,
                issued: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                torn_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState<T>> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> FeedState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn refresh_count(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }

    /// Re-issues the query and publishes its outcome. Safe to call while an earlier refresh
    /// is still pending.
    pub async fn refresh(&self) -> FeedState<T> {
        if self.is_torn_down() {
            return self.current();
        }
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = InFlight::enter(&self.inner.in_flight);
        debug!(feed = self.inner.name, seq, "feed refresh issued");

        let result = (self.inner.query)().await;

        drop(in_flight);
        self.deliver(seq, result)
    }

    pub fn teardown(&self) {
        self.inner.torn_down.store(true, Ordering::SeqCst);
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }

    fn deliver(&self, seq: u64, result: Result<Vec<T>>) -> FeedState<T> {
        if self.is_torn_down() {
            debug!(feed = self.inner.name, seq, "dropping feed result after teardown");
            return self.current();
        }
        let next = match result {
            Ok(data) => {
                debug!(feed = self.inner.name, seq, records = data.len(), "feed resolved");
                FeedState::Resolved(data)
            }
            Err(err) => {
                warn!(feed = self.inner.name, seq, error = %format!("{err:#}"), "feed failed");
                self.inner
                    .notifier
                    .publish(Notification::error(format!("Error loading {}", self.inner.name)));
                FeedState::Failed(FeedError::new(self.inner.name, format!("{err:#}")))
            }
        };
        self.inner.state.send_replace(next.clone());
        next
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tests/feed_tests.rs"]
mod tests;
