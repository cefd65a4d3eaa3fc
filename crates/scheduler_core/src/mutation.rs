use std::sync::Arc;

use shared::{domain::AppointmentId, protocol::AppointmentRecord};
use tracing::{info, warn};

use crate::{
    confirm::Confirm,
    error::{service_message, MutationError},
    feed::FeedSubscription,
    form::AppointmentForm,
    notify::{self, Notification, Notifier},
    service::SchedulingService,
};

pub const CANCEL_PROMPT: &str = "Are you sure you want to cancel this appointment?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Declined,
    Cancelled,
}

pub struct MutationExecutor {
    service: Arc<dyn SchedulingService>,
    confirm: Arc<dyn Confirm>,
    appointments: FeedSubscription<AppointmentRecord>,
    notifier: Notifier,
}

impl MutationExecutor {
    pub fn new(
        service: Arc<dyn SchedulingService>,
        confirm: Arc<dyn Confirm>,
        appointments: FeedSubscription<AppointmentRecord>,
        notifier: Notifier,
    ) -> Self {
        Self {
            service,
            confirm,
            appointments,
            notifier,
        }
    }

    /// Validates the draft, issues the create command and, only once the service has
    /// acknowledged it, runs `on_created` and then refreshes the appointments feed.
    pub async fn create_appointment<F>(
        &self,
        form: &AppointmentForm,
        on_created: F,
    ) -> Result<AppointmentRecord, MutationError>
    where
        F: FnOnce(&AppointmentRecord) + Send,
    {
        let request = match form.to_request() {
            Ok(request) => request,
            Err(err) => {
                let err = MutationError::from(err);
                self.notifier
                    .publish(Notification::error(err.user_message()));
                return Err(err);
            }
        };

        let created = match self.service.create_appointment(request).await {
            Ok(created) => created,
            Err(err) => {
                let message = service_message(&err);
                warn!(error = %message, "create appointment failed");
                self.notifier.publish(Notification::error(message.clone()));
                return Err(MutationError::Command {
                    action: "create appointment",
                    message,
                });
            }
        };

        info!(appointment_id = %created.id, "appointment created");
        self.notifier
            .publish(Notification::success(notify::MSG_CREATED));
        on_created(&created);
        self.appointments.refresh().await;
        Ok(created)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<CancelOutcome, MutationError> {
        if !self.confirm.confirm(CANCEL_PROMPT).await {
            info!(%appointment_id, "cancel declined");
            return Ok(CancelOutcome::Declined);
        }

        if let Err(err) = self.service.cancel_appointment(appointment_id).await {
            let message = service_message(&err);
            warn!(%appointment_id, error = %message, "cancel appointment failed");
            self.notifier.publish(Notification::error(format!(
                "{}: {message}",
                notify::MSG_CANCEL_FAILED
            )));
            return Err(MutationError::Command {
                action: "cancel appointment",
                message,
            });
        }

        info!(%appointment_id, "appointment cancelled");
        self.notifier
            .publish(Notification::success(notify::MSG_CANCELLED));
        self.appointments.refresh().await;
        Ok(CancelOutcome::Cancelled)
    }
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
