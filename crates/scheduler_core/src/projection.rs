use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{
    domain::{AppointmentId, AppointmentStatus, PatientId, ProviderId},
    protocol::{AppointmentRecord, PatientRecord, ProviderRecord},
};

pub type PatientIndex<'a> = HashMap<&'a PatientId, &'a PatientRecord>;
pub type ProviderIndex<'a> = HashMap<&'a ProviderId, &'a ProviderRecord>;

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub id: AppointmentId,
    pub name: String,
    pub patient_id: PatientId,
    pub provider_id: ProviderId,
    pub patient_name: String,
    pub provider_name: String,
    pub specialty: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub notes: String,
}

pub fn index_patients(patients: &[PatientRecord]) -> PatientIndex<'_> {
    patients.iter().map(|patient| (&patient.id, patient)).collect()
}

pub fn index_providers(providers: &[ProviderRecord]) -> ProviderIndex<'_> {
    providers
        .iter()
        .map(|provider| (&provider.id, provider))
        .collect()
}

/// Builds one row per appointment, in input order. A relation missing from its index yields
/// empty name/specialty fields instead of dropping the row.
pub fn project_rows(
    appointments: &[AppointmentRecord],
    patients: &PatientIndex<'_>,
    providers: &ProviderIndex<'_>,
) -> Vec<DisplayRow> {
    appointments
        .iter()
        .map(|appt| {
            let patient = patients.get(&appt.patient_id);
            let provider = providers.get(&appt.provider_id);
            DisplayRow {
                id: appt.id.clone(),
                name: appt.name.clone(),
                patient_id: appt.patient_id.clone(),
                provider_id: appt.provider_id.clone(),
                patient_name: patient.map(|p| p.name.clone()).unwrap_or_default(),
                provider_name: provider.map(|v| v.name.clone()).unwrap_or_default(),
                specialty: provider
                    .and_then(|v| v.specialty.clone())
                    .unwrap_or_default(),
                scheduled_at: appt.scheduled_at,
                duration_minutes: appt.duration_minutes,
                status: appt.status,
                notes: appt.notes.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickOption<V> {
    pub label: String,
    pub value: V,
}

pub fn patient_options(patients: &[PatientRecord]) -> Vec<PickOption<PatientId>> {
    patients
        .iter()
        .map(|patient| PickOption {
            label: format!(
                "{} ({} {})",
                patient.name, patient.first_name, patient.last_name
            ),
            value: patient.id.clone(),
        })
        .collect()
}

pub fn provider_options(providers: &[ProviderRecord]) -> Vec<PickOption<ProviderId>> {
    providers
        .iter()
        .map(|provider| {
            let label = match provider.specialty.as_deref() {
                Some(specialty) if !specialty.is_empty() => {
                    format!("{} - {}", provider.name, specialty)
                }
                _ => provider.name.clone(),
            };
            PickOption {
                label,
                value: provider.id.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/projection_tests.rs"]
mod tests;
