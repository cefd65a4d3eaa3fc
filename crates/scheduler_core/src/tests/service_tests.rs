use super::*;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::error::ErrorCode;
use tokio::{net::TcpListener, sync::Mutex};

use crate::{
    error::service_message,
    test_support::{appointment, patient, provider},
};

#[derive(Clone, Default)]
struct ServerState {
    scheduling_flags: Arc<Mutex<Vec<bool>>>,
    search_terms: Arc<Mutex<Vec<String>>>,
    created: Arc<Mutex<Vec<CreateAppointmentRequest>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

#[derive(Deserialize)]
struct ActiveQuery {
    for_scheduling: bool,
}

#[derive(Deserialize)]
struct SearchQuery {
    term: String,
}

async fn upcoming() -> Json<Vec<AppointmentRecord>> {
    Json(vec![appointment("A1", "P1", "V1")])
}

async fn active_patients(
    State(state): State<ServerState>,
    Query(query): Query<ActiveQuery>,
) -> Json<Vec<PatientRecord>> {
    state.scheduling_flags.lock().await.push(query.for_scheduling);
    Json(vec![patient("P1", "Jane Doe")])
}

async fn active_providers() -> Json<Vec<ProviderRecord>> {
    Json(vec![provider("V1", "Dr. Smith", Some("Cardiology"))])
}

async fn search(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<PatientRecord>> {
    state.search_terms.lock().await.push(query.term);
    Json(vec![patient("P2", "John Roe")])
}

async fn create(
    State(state): State<ServerState>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<Json<AppointmentRecord>, (StatusCode, Json<ApiError>)> {
    if request.notes == "reject" {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiError::new(
                ErrorCode::Validation,
                "Provider is not available at that time",
            )),
        ));
    }
    let mut created = appointment(
        "A9",
        request.patient_id.as_str(),
        request.provider_id.as_str(),
    );
    created.scheduled_at = request.scheduled_at;
    created.duration_minutes = request.duration_minutes;
    state.created.lock().await.push(request);
    Ok(Json(created))
}

async fn cancel(State(state): State<ServerState>, Path(id): Path<String>) -> StatusCode {
    if id == "gone" {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.cancelled.lock().await.push(id);
    StatusCode::NO_CONTENT
}

async fn spawn_scheduling_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/appointments/upcoming", get(upcoming))
        .route("/api/appointments", post(create))
        .route("/api/appointments/:id/cancel", post(cancel))
        .route("/api/patients/active", get(active_patients))
        .route("/api/patients/search", get(search))
        .route("/api/providers/active", get(active_providers))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), state))
}

fn client(url: &str) -> HttpSchedulingService {
    HttpSchedulingService::new(url, Duration::from_secs(5)).expect("client")
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(HttpSchedulingService::new("not a url", Duration::from_secs(1)).is_err());
    assert!(HttpSchedulingService::new("mailto:desk@example.com", Duration::from_secs(1)).is_err());

    let service = client("http://127.0.0.1:9/api");
    assert_eq!(service.base_url().as_str(), "http://127.0.0.1:9/api/");
}

#[tokio::test]
async fn reads_all_feeds() {
    let (url, state) = spawn_scheduling_server().await.expect("spawn server");
    let service = client(&url);

    let appointments = service.list_upcoming_appointments().await.expect("appointments");
    assert_eq!(appointments[0].id.as_str(), "A1");

    let patients = service.list_active_patients(true).await.expect("patients");
    assert_eq!(patients[0].name, "Jane Doe");
    service.list_active_patients(false).await.expect("patients");
    assert_eq!(*state.scheduling_flags.lock().await, vec![true, false]);

    let providers = service.list_active_providers().await.expect("providers");
    assert_eq!(providers[0].specialty.as_deref(), Some("Cardiology"));
}

#[tokio::test]
async fn search_passes_the_term_through() {
    let (url, state) = spawn_scheduling_server().await.expect("spawn server");
    let service = client(&url);

    let found = service.search_patients("Roe & co").await.expect("search");
    assert_eq!(found[0].name, "John Roe");
    assert_eq!(*state.search_terms.lock().await, vec!["Roe & co".to_string()]);
}

#[tokio::test]
async fn create_posts_the_request_body() {
    let (url, state) = spawn_scheduling_server().await.expect("spawn server");
    let service = client(&url);
    let request = CreateAppointmentRequest {
        patient_id: shared::domain::PatientId::new("P1"),
        provider_id: shared::domain::ProviderId::new("V1"),
        scheduled_at: appointment("A0", "P1", "V1").scheduled_at,
        duration_minutes: 45,
        notes: "first visit".to_string(),
    };

    let created = service
        .create_appointment(request.clone())
        .await
        .expect("create");
    assert_eq!(created.duration_minutes, 45);
    assert_eq!(*state.created.lock().await, vec![request]);
}

#[tokio::test]
async fn rejected_create_keeps_the_server_message() {
    let (url, _state) = spawn_scheduling_server().await.expect("spawn server");
    let service = client(&url);
    let request = CreateAppointmentRequest {
        patient_id: shared::domain::PatientId::new("P1"),
        provider_id: shared::domain::ProviderId::new("V1"),
        scheduled_at: appointment("A0", "P1", "V1").scheduled_at,
        duration_minutes: 30,
        notes: "reject".to_string(),
    };

    let err = service
        .create_appointment(request)
        .await
        .expect_err("must be rejected");
    let api = err.downcast_ref::<ApiException>().expect("api exception");
    assert!(matches!(api.code, ErrorCode::Validation));
    assert_eq!(service_message(&err), "Provider is not available at that time");
}

#[tokio::test]
async fn cancel_targets_the_appointment_path() {
    let (url, state) = spawn_scheduling_server().await.expect("spawn server");
    let service = client(&url);

    service
        .cancel_appointment(&AppointmentId::new("A1"))
        .await
        .expect("cancel");
    assert_eq!(*state.cancelled.lock().await, vec!["A1".to_string()]);

    let err = service
        .cancel_appointment(&AppointmentId::new("gone"))
        .await
        .expect_err("server error");
    assert!(err.downcast_ref::<ApiException>().is_none());
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let service = client(&format!("http://{addr}"));
    let err = service
        .list_upcoming_appointments()
        .await
        .expect_err("nothing listening");
    assert!(err.downcast_ref::<ApiException>().is_none());
}
