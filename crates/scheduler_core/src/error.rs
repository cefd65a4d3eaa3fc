use shared::error::ApiException;
use thiserror::Error;

use crate::form::FormField;

/// Client-side form rejection. Never reaches the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", describe_fields(.0))]
    MissingFields(Vec<FormField>),
    #[error("invalid duration {0:?}: expected a positive whole number of minutes")]
    InvalidDuration(String),
    #[error("invalid appointment date-time {0:?}")]
    InvalidDateTime(String),
}

fn describe_fields(fields: &[FormField]) -> String {
    fields
        .iter()
        .map(|field| field.label())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load {feed}: {message}")]
pub struct FeedError {
    pub feed: String,
    pub message: String,
}

impl FeedError {
    pub fn new(feed: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            feed: feed.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{action} failed: {message}")]
    Command {
        action: &'static str,
        message: String,
    },
}

impl MutationError {
    pub fn user_message(&self) -> String {
        match self {
            MutationError::Validation(ValidationError::MissingFields(_)) => {
                crate::notify::MSG_MISSING_FIELDS.to_string()
            }
            MutationError::Validation(err) => err.to_string(),
            MutationError::Command { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("the appointment form is not open")]
    ModalClosed,
    #[error("an appointment submission is already in flight")]
    SubmissionInFlight,
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Extracts the server-provided message from a service failure, falling back to the
/// error chain's display text for transport failures.
pub fn service_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiException>() {
        Some(api) => api.message.clone(),
        None => format!("{err:#}"),
    }
}
