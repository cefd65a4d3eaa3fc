use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::AppointmentId,
    error::{ApiError, ApiException},
    protocol::{
        ActivePatientsQuery, AppointmentRecord, CreateAppointmentRequest, PatientRecord,
        PatientSearchQuery, ProviderRecord,
    },
};
use tracing::debug;
use url::Url;

#[async_trait]
pub trait SchedulingService: Send + Sync {
    async fn list_upcoming_appointments(&self) -> Result<Vec<AppointmentRecord>>;
    async fn list_active_patients(&self, for_scheduling: bool) -> Result<Vec<PatientRecord>>;
    async fn list_active_providers(&self) -> Result<Vec<ProviderRecord>>;
    async fn search_patients(&self, term: &str) -> Result<Vec<PatientRecord>>;
    async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentRecord>;
    async fn cancel_appointment(&self, appointment_id: &AppointmentId) -> Result<()>;
}

pub struct HttpSchedulingService {
    http: Client,
    base_url: Url,
}

impl HttpSchedulingService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid service url {base_url:?}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("service url {base_url} cannot be used as a base"));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path {path:?}"))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let res = self.http.get(url).send().await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }
}

/// Turns a non-success response into an error, keeping the service's own message when the
/// body is an [`ApiError`].
async fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(api) => Err(ApiException::from(api).into()),
        Err(_) => Err(anyhow!("service responded with {status}: {body}")),
    }
}

#[async_trait]
impl SchedulingService for HttpSchedulingService {
    async fn list_upcoming_appointments(&self) -> Result<Vec<AppointmentRecord>> {
        self.get_json(self.endpoint("appointments/upcoming")?).await
    }

    async fn list_active_patients(&self, for_scheduling: bool) -> Result<Vec<PatientRecord>> {
        let url = self.endpoint("patients/active")?;
        debug!(%url, for_scheduling, "GET");
        let res = self
            .http
            .get(url)
            .query(&ActivePatientsQuery { for_scheduling })
            .send()
            .await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    async fn list_active_providers(&self) -> Result<Vec<ProviderRecord>> {
        self.get_json(self.endpoint("providers/active")?).await
    }

    async fn search_patients(&self, term: &str) -> Result<Vec<PatientRecord>> {
        let url = self.endpoint("patients/search")?;
        debug!(%url, term, "GET");
        let res = self
            .http
            .get(url)
            .query(&PatientSearchQuery {
                term: term.to_string(),
            })
            .send()
            .await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentRecord> {
        let url = self.endpoint("appointments")?;
        debug!(%url, "POST");
        let res = self.http.post(url).json(&request).send().await?;
        let res = check_status(res).await?;
        Ok(res.json().await?)
    }

    async fn cancel_appointment(&self, appointment_id: &AppointmentId) -> Result<()> {
        let mut url = self.endpoint("appointments/")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("service url cannot carry path segments"))?
            .pop_if_empty()
            .push(appointment_id.as_str())
            .push("cancel");
        debug!(%url, "POST");
        let res = self.http.post(url).send().await?;
        check_status(res).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
