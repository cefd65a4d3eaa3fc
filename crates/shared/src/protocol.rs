use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AppointmentId, AppointmentStatus, PatientId, PatientStatus, ProviderId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: AppointmentId,
    /// Human-facing appointment number, e.g. `APT-0042`.
    #[serde(default)]
    pub name: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: PatientId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Display name as maintained by the service.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub status: PatientStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: ProviderId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub term: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePatientsQuery {
    pub for_scheduling: bool,
}
