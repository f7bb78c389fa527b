use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{LeaveApplication, LeaveId, Registration, UserId};
use super::repository::{LeaveStore, RepositoryError};
use super::service::{LeaveWorkflowError, LeaveWorkflowService};
use super::validation::{Decision, DecisionKind};
use crate::workflows::export::{authority_export_rows, export_csv, ExportError};
use crate::workflows::letter::{LetterComposer, LetterFields};

/// Shared handler state.
pub struct LeaveApiState<S> {
    pub service: Arc<LeaveWorkflowService<S>>,
    pub letters: Arc<LetterComposer>,
}

impl<S> Clone for LeaveApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            letters: Arc::clone(&self.letters),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: DecisionKind,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub pending_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ActingOptionsQuery {
    pub department: String,
    pub exclude_user_id: Option<String>,
}

/// Router builder exposing the leave workflow over HTTP.
pub fn leave_router<S>(
    service: Arc<LeaveWorkflowService<S>>,
    letters: Arc<LetterComposer>,
) -> Router
where
    S: LeaveStore + 'static,
{
    let state = LeaveApiState { service, letters };
    Router::new()
        .route("/api/v1/auth/register", post(register_handler::<S>))
        .route("/api/v1/auth/login", post(login_handler::<S>))
        .route("/api/v1/auth/logout", post(logout_handler::<S>))
        .route("/api/v1/session", get(session_handler::<S>))
        .route(
            "/api/v1/users/:user_id/leaves",
            get(user_leaves_handler::<S>).post(submit_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/authority/leaves",
            get(authority_board_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/authority/export",
            get(authority_export_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/authority/leaves/:leave_id/decision",
            post(stage_decision_handler::<S>),
        )
        .route("/api/v1/users/:user_id/duties", get(duties_handler::<S>))
        .route(
            "/api/v1/users/:user_id/duties/:leave_id/decision",
            post(duty_decision_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/notifications",
            get(notifications_handler::<S>),
        )
        .route(
            "/api/v1/users/:user_id/notifications/read",
            post(mark_read_handler::<S>),
        )
        .route(
            "/api/v1/directory/acting-options",
            get(acting_options_handler::<S>),
        )
        .route("/api/v1/letters/compose", post(compose_letter_handler::<S>))
        .route("/api/v1/admin/reset", post(reset_handler::<S>))
        .with_state(state)
}

fn error_response(err: LeaveWorkflowError) -> Response {
    let status = match &err {
        LeaveWorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LeaveWorkflowError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LeaveWorkflowError::NotVisible => StatusCode::FORBIDDEN,
        LeaveWorkflowError::Transition(_)
        | LeaveWorkflowError::Repository(RepositoryError::Stale { .. })
        | LeaveWorkflowError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LeaveWorkflowError::UnknownUser(_)
        | LeaveWorkflowError::UnknownLeave(_)
        | LeaveWorkflowError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LeaveWorkflowError::Credentials(_) | LeaveWorkflowError::Repository(_) => {
            error!(error = %err, "leave workflow failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, LeaveWorkflowError>,
) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => error_response(err),
    }
}

fn join_failure(err: tokio::task::JoinError) -> Response {
    error!(error = %err, "blocking credential task failed");
    let payload = json!({
        "error": "internal error",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
}

pub(crate) async fn register_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Json(registration): Json<Registration>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.register(registration)).await {
        Ok(result) => respond(StatusCode::CREATED, result),
        Err(err) => join_failure(err),
    }
}

pub(crate) async fn login_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Json(login): Json<LoginRequest>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let service = Arc::clone(&state.service);
    match tokio::task::spawn_blocking(move || service.login(&login.email, &login.password)).await {
        Ok(result) => respond(StatusCode::OK, result),
        Err(err) => join_failure(err),
    }
}

pub(crate) async fn logout_handler<S>(State(state): State<LeaveApiState<S>>) -> Response
where
    S: LeaveStore + 'static,
{
    match state.service.logout() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn session_handler<S>(State(state): State<LeaveApiState<S>>) -> Response
where
    S: LeaveStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .current_user()
            .map(|user| json!({ "user": user })),
    )
}

pub(crate) async fn submit_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
    Json(application): Json<LeaveApplication>,
) -> Response
where
    S: LeaveStore + 'static,
{
    respond(
        StatusCode::CREATED,
        state.service.submit(&UserId(user_id), application),
    )
}

pub(crate) async fn user_leaves_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
{
    respond(StatusCode::OK, state.service.leaves_for_user(&UserId(user_id)))
}

pub(crate) async fn authority_board_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
    Query(query): Query<BoardQuery>,
) -> Response
where
    S: LeaveStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .authority_board(&UserId(user_id), query.date, query.pending_only),
    )
}

pub(crate) async fn authority_export_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let board = match state
        .service
        .authority_board(&UserId(user_id), query.date, false)
    {
        Ok(board) => board,
        Err(err) => return error_response(err),
    };

    match export_csv(&authority_export_rows(&board.leaves)) {
        Ok(body) => {
            let disposition =
                format!("attachment; filename=\"Received_Leaves_{}.csv\"", board.date);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response()
        }
        Err(ExportError::Empty) => StatusCode::NO_CONTENT.into_response(),
        Err(other) => {
            error!(error = %other, "authority export failed");
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn stage_decision_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path((user_id, leave_id)): Path<(String, String)>,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let decision = match Decision::from_parts(request.decision, request.reason) {
        Ok(decision) => decision,
        Err(err) => return error_response(err.into()),
    };
    respond(
        StatusCode::OK,
        state
            .service
            .decide_stage(&UserId(user_id), &LeaveId(leave_id), decision),
    )
}

pub(crate) async fn duties_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let user_id = UserId(user_id);
    let result = state.service.pending_duties(&user_id).and_then(|duties| {
        let requests = state.service.acting_requests_for(&user_id)?;
        let pending_count = duties.iter().map(|duty| duty.periods.len()).sum::<usize>();
        Ok(json!({
            "pendingCount": pending_count,
            "duties": duties,
            "requests": requests,
        }))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn duty_decision_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path((user_id, leave_id)): Path<(String, String)>,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let decision = match Decision::from_parts(request.decision, request.reason) {
        Ok(decision) => decision,
        Err(err) => return error_response(err.into()),
    };
    respond(
        StatusCode::OK,
        state
            .service
            .update_acting_status(&UserId(user_id), &LeaveId(leave_id), decision),
    )
}

pub(crate) async fn notifications_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let user_id = UserId(user_id);
    let result = state.service.notifications_for(&user_id).map(|notifications| {
        let unread = notifications.iter().filter(|n| !n.is_read).count();
        json!({
            "unread": unread,
            "notifications": notifications,
        })
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn mark_read_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LeaveStore + 'static,
{
    respond(
        StatusCode::OK,
        state
            .service
            .mark_all_read(&UserId(user_id))
            .map(|updated| json!({ "updated": updated })),
    )
}

pub(crate) async fn acting_options_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Query(query): Query<ActingOptionsQuery>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let exclude = query.exclude_user_id.map(UserId);
    respond(
        StatusCode::OK,
        state
            .service
            .acting_staff_options(&query.department, exclude.as_ref()),
    )
}

pub(crate) async fn compose_letter_handler<S>(
    State(state): State<LeaveApiState<S>>,
    Json(fields): Json<LetterFields>,
) -> Response
where
    S: LeaveStore + 'static,
{
    let letter = state.letters.compose(&fields).await;
    (StatusCode::OK, Json(json!({ "letter": letter }))).into_response()
}

pub(crate) async fn reset_handler<S>(State(state): State<LeaveApiState<S>>) -> Response
where
    S: LeaveStore + 'static,
{
    match state.service.reset() {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
