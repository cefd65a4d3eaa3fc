use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{AppointmentId, AppointmentStatus, PatientId, PatientStatus, ProviderId},
    error::{ApiException, ErrorCode},
    protocol::{AppointmentRecord, CreateAppointmentRequest, PatientRecord, ProviderRecord},
};
use tokio::sync::{broadcast, oneshot};

use crate::{notify::Notification, service::SchedulingService};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListAppointments,
    ListPatients { for_scheduling: bool },
    ListProviders,
    Search(String),
    Create(CreateAppointmentRequest),
    Cancel(AppointmentId),
}

/// Scripted in-memory service. Each operation answers with its configured outcome and every
/// call is recorded.
pub(crate) struct FakeService {
    pub appointments: Mutex<Result<Vec<AppointmentRecord>, String>>,
    pub patients: Mutex<Result<Vec<PatientRecord>, String>>,
    pub providers: Mutex<Result<Vec<ProviderRecord>, String>>,
    pub search_results: Mutex<Result<Vec<PatientRecord>, String>>,
    pub create_result: Mutex<Result<AppointmentRecord, String>>,
    pub cancel_result: Mutex<Result<(), String>>,
    pub create_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub appointments_gate: Mutex<Option<oneshot::Receiver<()>>>,
    pub calls: Mutex<Vec<Call>>,
}

impl Default for FakeService {
    fn default() -> Self {
        Self {
            appointments: Mutex::new(Ok(Vec::new())),
            patients: Mutex::new(Ok(Vec::new())),
            providers: Mutex::new(Ok(Vec::new())),
            search_results: Mutex::new(Ok(Vec::new())),
            create_result: Mutex::new(Ok(appointment("A-new", "P1", "V1"))),
            cancel_result: Mutex::new(Ok(())),
            create_gate: Mutex::new(None),
            appointments_gate: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeService {
    pub fn scenario() -> Self {
        let service = Self::default();
        *service.appointments.lock().expect("lock") = Ok(vec![appointment("A1", "P1", "V1")]);
        *service.patients.lock().expect("lock") = Ok(vec![patient("P1", "Jane Doe")]);
        *service.providers.lock().expect("lock") =
            Ok(vec![provider("V1", "Dr. Smith", Some("Cardiology"))]);
        service
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn appointment_loads(&self) -> usize {
        self.count(|call| matches!(call, Call::ListAppointments))
    }

    pub fn create_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::Create(_)))
    }

    pub fn cancel_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::Cancel(_)))
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("lock").push(call);
    }
}

fn scripted<T: Clone>(slot: &Mutex<Result<T, String>>) -> Result<T> {
    slot.lock()
        .expect("lock")
        .clone()
        .map_err(|message| anyhow!(message))
}

#[async_trait]
impl SchedulingService for FakeService {
    async fn list_upcoming_appointments(&self) -> Result<Vec<AppointmentRecord>> {
        self.record(Call::ListAppointments);
        let gate = self.appointments_gate.lock().expect("lock").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        scripted(&self.appointments)
    }

    async fn list_active_patients(&self, for_scheduling: bool) -> Result<Vec<PatientRecord>> {
        self.record(Call::ListPatients { for_scheduling });
        scripted(&self.patients)
    }

    async fn list_active_providers(&self) -> Result<Vec<ProviderRecord>> {
        self.record(Call::ListProviders);
        scripted(&self.providers)
    }

    async fn search_patients(&self, term: &str) -> Result<Vec<PatientRecord>> {
        self.record(Call::Search(term.to_string()));
        scripted(&self.search_results)
    }

    async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentRecord> {
        self.record(Call::Create(request));
        let gate = self.create_gate.lock().expect("lock").take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let outcome = self.create_result.lock().expect("lock").clone();
        outcome.map_err(|message| ApiException::new(ErrorCode::Validation, message).into())
    }

    async fn cancel_appointment(&self, appointment_id: &AppointmentId) -> Result<()> {
        self.record(Call::Cancel(appointment_id.clone()));
        let outcome = self.cancel_result.lock().expect("lock").clone();
        outcome.map_err(|message| ApiException::new(ErrorCode::Conflict, message).into())
    }
}

pub(crate) fn appointment(id: &str, patient_id: &str, provider_id: &str) -> AppointmentRecord {
    AppointmentRecord {
        id: AppointmentId::new(id),
        name: format!("APT-{id}"),
        scheduled_at: Utc
            .with_ymd_and_hms(2024, 1, 10, 9, 0, 0)
            .single()
            .expect("valid date"),
        duration_minutes: 30,
        status: AppointmentStatus::Scheduled,
        notes: String::new(),
        patient_id: PatientId::new(patient_id),
        provider_id: ProviderId::new(provider_id),
    }
}

pub(crate) fn patient(id: &str, name: &str) -> PatientRecord {
    let (first_name, last_name) = name.split_once(' ').unwrap_or((name, ""));
    PatientRecord {
        id: PatientId::new(id),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        name: name.to_string(),
        email: None,
        phone: None,
        blood_type: None,
        status: PatientStatus::Active,
    }
}

pub(crate) fn provider(id: &str, name: &str, specialty: Option<&str>) -> ProviderRecord {
    ProviderRecord {
        id: ProviderId::new(id),
        name: name.to_string(),
        specialty: specialty.map(str::to_string),
    }
}

pub(crate) fn drain(rx: &mut broadcast::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(notification) = rx.try_recv() {
        out.push(notification);
    }
    out
}
