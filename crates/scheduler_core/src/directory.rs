use std::sync::Arc;

use shared::protocol::PatientRecord;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::{
    error::{service_message, FeedError},
    feed::{FeedState, FeedSubscription},
    notify::{self, Notification, Notifier},
    service::SchedulingService,
};

pub struct PatientDirectory {
    service: Arc<dyn SchedulingService>,
    feed: FeedSubscription<PatientRecord>,
    notifier: Notifier,
    view: Mutex<DirectoryView>,
}

struct DirectoryView {
    feed_rx: watch::Receiver<FeedState<PatientRecord>>,
    search: Option<FeedState<PatientRecord>>,
    term: String,
}

impl PatientDirectory {
    pub fn new(service: Arc<dyn SchedulingService>, notifier: Notifier) -> Self {
        let feed = {
            let service = Arc::clone(&service);
            FeedSubscription::new("patients", notifier.clone(), move || {
                let service = Arc::clone(&service);
                async move { service.list_active_patients(false).await }
            })
        };
        let feed_rx = feed.subscribe();
        Self {
            service,
            feed,
            notifier,
            view: Mutex::new(DirectoryView {
                feed_rx,
                search: None,
                term: String::new(),
            }),
        }
    }

    pub async fn start(service: Arc<dyn SchedulingService>, notifier: Notifier) -> Self {
        let directory = Self::new(service, notifier);
        directory.feed.refresh().await;
        directory
    }

    pub fn feed(&self) -> &FeedSubscription<PatientRecord> {
        &self.feed
    }

    pub async fn search_term(&self) -> String {
        self.view.lock().await.term.clone()
    }

    // Whichever of the feed delivery and the last search landed most recently.
    pub async fn patients(&self) -> FeedState<PatientRecord> {
        let mut view = self.view.lock().await;
        if view.feed_rx.has_changed().unwrap_or(false) {
            view.feed_rx.borrow_and_update();
            view.search = None;
        }
        match &view.search {
            Some(result) => result.clone(),
            None => view.feed_rx.borrow().clone(),
        }
    }

    pub async fn has_patients(&self) -> bool {
        self.patients().await.has_data()
    }

    /// Blank terms fall back to refreshing the base feed; anything else replaces the displayed
    /// collection with the search result.
    pub async fn search(&self, term: &str) -> FeedState<PatientRecord> {
        let term = term.trim();
        {
            let mut view = self.view.lock().await;
            view.term = term.to_string();
            if term.is_empty() {
                view.search = None;
            }
        }
        if term.is_empty() {
            self.feed.refresh().await;
            return self.patients().await;
        }

        let result = match self.service.search_patients(term).await {
            Ok(found) => {
                info!(term, matches = found.len(), "patient search resolved");
                FeedState::Resolved(found)
            }
            Err(err) => {
                let message = service_message(&err);
                warn!(term, error = %message, "patient search failed");
                self.notifier
                    .publish(Notification::error(notify::MSG_SEARCH_FAILED));
                FeedState::Failed(FeedError::new("patient search", message))
            }
        };

        let mut view = self.view.lock().await;
        view.feed_rx.borrow_and_update();
        view.search = Some(result.clone());
        result
    }

    pub async fn refresh(&self) -> FeedState<PatientRecord> {
        self.feed.refresh().await;
        self.patients().await
    }

    pub fn request_new_patient(&self) {
        self.notifier
            .publish(Notification::info(notify::MSG_NEW_PATIENT));
    }
}

#[cfg(test)]
#[path = "tests/directory_tests.rs"]
mod tests;
