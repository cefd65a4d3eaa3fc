use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak,
};

use shared::{
    domain::{AppointmentId, PatientId, ProviderId},
    protocol::{AppointmentRecord, PatientRecord, ProviderRecord},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    confirm::Confirm,
    error::WorkflowError,
    feed::{FeedState, FeedSubscription},
    form::{AppointmentForm, FormField},
    mutation::{CancelOutcome, MutationExecutor},
    notify::{Notification, Notifier},
    projection::{
        index_patients, index_providers, patient_options, project_rows, provider_options,
        DisplayRow, PickOption,
    },
    service::SchedulingService,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalState {
    Closed,
    Open(AppointmentForm),
}

impl ModalState {
    pub fn is_open(&self) -> bool {
        matches!(self, ModalState::Open(_))
    }

    pub fn form(&self) -> Option<&AppointmentForm> {
        match self {
            ModalState::Open(form) => Some(form),
            ModalState::Closed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Cancel,
}

impl RowAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cancel" => Some(RowAction::Cancel),
            _ => None,
        }
    }
}

pub struct WorkflowController {
    appointments: FeedSubscription<AppointmentRecord>,
    patients: FeedSubscription<PatientRecord>,
    providers: FeedSubscription<ProviderRecord>,
    executor: MutationExecutor,
    notifier: Notifier,
    modal: StdMutex<ModalState>,
    submitting: AtomicBool,
    modal_open: watch::Sender<bool>,
    rows: watch::Sender<Vec<DisplayRow>>,
    projector: Mutex<Option<JoinHandle<()>>>,
}

impl WorkflowController {
    pub fn new(
        service: Arc<dyn SchedulingService>,
        confirm: Arc<dyn Confirm>,
        notifier: Notifier,
    ) -> Arc<Self> {
        let appointments = {
            let service = Arc::clone(&service);
            FeedSubscription::new("appointments", notifier.clone(), move || {
                let service = Arc::clone(&service);
                async move { service.list_upcoming_appointments().await }
            })
        };
        let patients = {
            let service = Arc::clone(&service);
            FeedSubscription::new("patients", notifier.clone(), move || {
                let service = Arc::clone(&service);
                async move { service.list_active_patients(true).await }
            })
        };
        let providers = {
            let service = Arc::clone(&service);
            FeedSubscription::new("providers", notifier.clone(), move || {
                let service = Arc::clone(&service);
                async move { service.list_active_providers().await }
            })
        };
        let executor =
            MutationExecutor::new(service, confirm, appointments.clone(), notifier.clone());
        let (modal_open, _) = watch::channel(false);
        let (rows, _) = watch::channel(Vec::new());

        Arc::new(Self {
            appointments,
            patients,
            providers,
            executor,
            notifier,
            modal: StdMutex::new(ModalState::Closed),
            submitting: AtomicBool::new(false),
            modal_open,
            rows,
            projector: Mutex::new(None),
        })
    }

    /// A failing feed does not hold up the others.
    pub async fn start(
        service: Arc<dyn SchedulingService>,
        confirm: Arc<dyn Confirm>,
        notifier: Notifier,
    ) -> Arc<Self> {
        let controller = Self::new(service, confirm, notifier);
        let projector = controller.spawn_projector();
        *controller.projector.lock().await = Some(projector);
        futures::join!(
            controller.appointments.refresh(),
            controller.patients.refresh(),
            controller.providers.refresh(),
        );
        info!(
            appointments = controller.appointments.current().data().len(),
            "scheduling workflow started"
        );
        controller
    }

    fn spawn_projector(self: &Arc<Self>) -> JoinHandle<()> {
        let mut appointments = self.appointments.subscribe();
        let mut patients = self.patients.subscribe();
        let mut providers = self.providers.subscribe();
        let controller: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    res = appointments.changed() => res,
                    res = patients.changed() => res,
                    res = providers.changed() => res,
                };
                if changed.is_err() {
                    break;
                }
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                let rows = controller.display_rows();
                debug!(rows = rows.len(), "rows re-projected");
                controller.rows.send_replace(rows);
            }
        })
    }

    pub async fn shutdown(&self) {
        self.appointments.teardown();
        self.patients.teardown();
        self.providers.teardown();
        if let Some(projector) = self.projector.lock().await.take() {
            projector.abort();
        }
    }

    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    pub fn subscribe_rows(&self) -> watch::Receiver<Vec<DisplayRow>> {
        self.rows.subscribe()
    }

    pub fn subscribe_modal(&self) -> watch::Receiver<bool> {
        self.modal_open.subscribe()
    }

    pub fn appointments(&self) -> &FeedSubscription<AppointmentRecord> {
        &self.appointments
    }

    pub fn patients(&self) -> &FeedSubscription<PatientRecord> {
        &self.patients
    }

    pub fn providers(&self) -> &FeedSubscription<ProviderRecord> {
        &self.providers
    }

    pub fn display_rows(&self) -> Vec<DisplayRow> {
        let appointments = self.appointments.current();
        let patients = self.patients.current();
        let providers = self.providers.current();
        project_rows(
            appointments.data(),
            &index_patients(patients.data()),
            &index_providers(providers.data()),
        )
    }

    pub fn has_appointments(&self) -> bool {
        self.appointments.current().has_data()
    }

    pub fn patient_options(&self) -> Vec<PickOption<PatientId>> {
        patient_options(self.patients.current().data())
    }

    pub fn provider_options(&self) -> Vec<PickOption<ProviderId>> {
        provider_options(self.providers.current().data())
    }

    pub fn modal_state(&self) -> ModalState {
        self.modal().clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    fn modal(&self) -> MutexGuard<'_, ModalState> {
        self.modal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_modal(&self) {
        let mut modal = self.modal();
        if !modal.is_open() {
            *modal = ModalState::Open(AppointmentForm::default());
            self.modal_open.send_replace(true);
        }
    }

    pub fn close_modal(&self) {
        *self.modal() = ModalState::Closed;
        self.modal_open.send_replace(false);
    }

    pub fn field_change(
        &self,
        field: FormField,
        value: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        match &mut *self.modal() {
            ModalState::Open(form) => {
                form.set_field(field, value);
                Ok(())
            }
            ModalState::Closed => Err(WorkflowError::ModalClosed),
        }
    }

    /// The modal closes once the create is acknowledged, before the feed refresh. A failed
    /// submit leaves the draft open for retry.
    pub async fn submit(&self) -> Result<AppointmentRecord, WorkflowError> {
        let form = self.modal().form().cloned().ok_or(WorkflowError::ModalClosed)?;
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(WorkflowError::SubmissionInFlight);
        }
        let _guard = SubmissionGuard(&self.submitting);

        let created = self
            .executor
            .create_appointment(&form, |_| self.close_modal())
            .await?;
        Ok(created)
    }

    pub async fn row_action(
        &self,
        action: RowAction,
        row: &DisplayRow,
    ) -> Result<CancelOutcome, WorkflowError> {
        match action {
            RowAction::Cancel => self.cancel_appointment(&row.id).await,
        }
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &AppointmentId,
    ) -> Result<CancelOutcome, WorkflowError> {
        Ok(self.executor.cancel_appointment(appointment_id).await?)
    }

    pub async fn refresh(&self) -> FeedState<AppointmentRecord> {
        self.appointments.refresh().await
    }
}

/// Clears the in-flight flag even if the submitting future is dropped mid-await.
struct SubmissionGuard<'a>(&'a AtomicBool);

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
