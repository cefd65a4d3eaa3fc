pub mod confirm;
pub mod controller;
pub mod directory;
pub mod error;
pub mod feed;
pub mod form;
pub mod mutation;
pub mod notify;
pub mod projection;
pub mod service;

pub use confirm::{Confirm, FixedConfirm};
pub use controller::{ModalState, RowAction, WorkflowController};
pub use directory::PatientDirectory;
pub use error::{FeedError, MutationError, ValidationError, WorkflowError};
pub use feed::{FeedState, FeedSubscription};
pub use form::{AppointmentForm, FormField, DEFAULT_DURATION_MINUTES};
pub use mutation::{CancelOutcome, MutationExecutor};
pub use notify::{Notification, Notifier, Severity};
pub use projection::{DisplayRow, PickOption};
pub use service::{HttpSchedulingService, SchedulingService};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
