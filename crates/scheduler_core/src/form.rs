use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use shared::{
    domain::{PatientId, ProviderId},
    protocol::CreateAppointmentRequest,
};

use crate::error::ValidationError;

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Patient,
    Provider,
    DateTime,
    Duration,
    Notes,
}

impl FormField {
    pub const REQUIRED: [FormField; 3] = [FormField::Patient, FormField::Provider, FormField::DateTime];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Patient => "patient",
            FormField::Provider => "provider",
            FormField::DateTime => "date & time",
            FormField::Duration => "duration",
            FormField::Notes => "notes",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentForm {
    pub patient_id: Option<PatientId>,
    pub provider_id: Option<ProviderId>,
    pub scheduled_at: Option<String>,
    pub duration_minutes: String,
    pub notes: String,
}

impl Default for AppointmentForm {
    fn default() -> Self {
        Self {
            patient_id: None,
            provider_id: None,
            scheduled_at: None,
            duration_minutes: DEFAULT_DURATION_MINUTES.to_string(),
            notes: String::new(),
        }
    }
}

impl AppointmentForm {
    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Patient => self.patient_id = non_empty(value).map(PatientId),
            FormField::Provider => self.provider_id = non_empty(value).map(ProviderId),
            FormField::DateTime => self.scheduled_at = non_empty(value),
            FormField::Duration => self.duration_minutes = value,
            FormField::Notes => self.notes = value,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn missing_fields(&self) -> Vec<FormField> {
        FormField::REQUIRED
            .into_iter()
            .filter(|field| match field {
                FormField::Patient => self.patient_id.is_none(),
                FormField::Provider => self.provider_id.is_none(),
                FormField::DateTime => self.scheduled_at.is_none(),
                FormField::Duration | FormField::Notes => false,
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingFields(missing))
        }
    }

    /// Builds the create command payload. Fails without side effects if the draft is incomplete
    /// or a value cannot be converted.
    pub fn to_request(&self) -> Result<CreateAppointmentRequest, ValidationError> {
        self.validate()?;
        let (Some(patient_id), Some(provider_id), Some(raw_at)) = (
            self.patient_id.clone(),
            self.provider_id.clone(),
            self.scheduled_at.as_deref(),
        ) else {
            return Err(ValidationError::MissingFields(self.missing_fields()));
        };

        Ok(CreateAppointmentRequest {
            patient_id,
            provider_id,
            scheduled_at: parse_date_time(raw_at)?,
            duration_minutes: parse_duration(&self.duration_minutes)?,
            notes: self.notes.clone(),
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Accepts RFC 3339 or a zone-less `YYYY-MM-DDTHH:MM[:SS]`, which is read as UTC.
pub fn parse_date_time(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    LOCAL_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidDateTime(raw.to_string()))
}

/// Leading-integer conversion: `"45"` and `"45.5"` both give 45. Blank input falls back to
/// the default duration.
pub fn parse_duration(raw: &str) -> Result<u32, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_DURATION_MINUTES);
    }
    let digits_end = trimmed
        .char_indices()
        .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && (*ch == '+' || *ch == '-'))))
        .map(|(idx, _)| idx)
        .unwrap_or(trimmed.len());
    match trimmed[..digits_end].parse::<i64>() {
        Ok(minutes) if minutes > 0 => {
            u32::try_from(minutes).map_err(|_| ValidationError::InvalidDuration(raw.to_string()))
        }
        _ => Err(ValidationError::InvalidDuration(raw.to_string())),
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
