use std::sync::Arc;

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, instrument, warn};

use super::blob_store::BlobStore;
use super::domain::{AssessmentUpload, ReviewInput, ValidationError, MAX_UPLOAD_BYTES};
use super::record_store::RecordStore;
use super::service::{AssessmentService, ServiceError};

/// Headroom for multipart boundaries and the email field on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Largest review body read once the caller is authorized.
const REVIEW_BODY_LIMIT: usize = 64 * 1024;

/// Shared handler state: the service plus the admin secret guarding `/review`.
pub struct PortalState<R, B> {
    service: Arc<AssessmentService<R, B>>,
    admin_secret: Arc<str>,
}

impl<R, B> Clone for PortalState<R, B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            admin_secret: Arc::clone(&self.admin_secret),
        }
    }
}

impl<R, B> PortalState<R, B> {
    pub fn new(service: Arc<AssessmentService<R, B>>, admin_secret: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            admin_secret: admin_secret.into(),
        }
    }

    /// Byte-exact match against the configured secret. An empty secret never authorizes.
    fn authorized(&self, headers: &HeaderMap) -> bool {
        if self.admin_secret.is_empty() {
            return false;
        }
        headers
            .get(AUTHORIZATION)
            .is_some_and(|value| value.as_bytes() == self.admin_secret.as_bytes())
    }
}

/// Router builder exposing the submission and review endpoints.
pub fn portal_router<R, B>(state: PortalState<R, B>) -> Router
where
    R: RecordStore + 'static,
    B: BlobStore + 'static,
{
    Router::new()
        .route(
            "/submit",
            post(submit_handler::<R, B>)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(
                    MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES,
                )),
        )
        .route("/review", any(review_handler::<R, B>))
        .with_state(state)
}

/// What a failing downstream call was doing, used to pick the client-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SubmitAssessment,
    ListSubmissions,
    SubmitReview,
}

impl Operation {
    const fn failure_message(self) -> &'static str {
        match self {
            Operation::SubmitAssessment => "Failed to submit assessment",
            Operation::ListSubmissions => "Failed to fetch submissions",
            Operation::SubmitReview => "Failed to submit review",
        }
    }
}

/// Client-facing failure. Messages are fixed per kind; store and transport
/// details are logged, never returned.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Applicant not found with this email")]
    ApplicantNotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{}", .0.failure_message())]
    Downstream(Operation),
}

impl ApiError {
    pub fn from_service(operation: Operation, err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(err) => ApiError::Validation(err),
            ServiceError::ApplicantNotFound => ApiError::ApplicantNotFound,
            other => {
                error!(?operation, error = %other, "downstream failure");
                ApiError::Downstream(operation)
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::ApplicantNotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Downstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.to_string() });
        (self.status(), Json(payload)).into_response()
    }
}

pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[instrument(skip_all)]
pub(crate) async fn submit_handler<R, B>(
    State(state): State<PortalState<R, B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response
where
    R: RecordStore + 'static,
    B: BlobStore + 'static,
{
    let (email, upload) = match read_submission_form(multipart).await {
        Ok(form) => form,
        Err(err) => {
            warn!(error = %err, "rejected submission form");
            return ApiError::from(err).into_response();
        }
    };

    match state.service.submit(&email, upload).await {
        Ok(_) => {
            let payload = json!({
                "success": true,
                "message": "Assessment submitted successfully",
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => ApiError::from_service(Operation::SubmitAssessment, err).into_response(),
    }
}

async fn read_submission_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(String, AssessmentUpload), ValidationError> {
    let mut multipart = multipart.map_err(|_| ValidationError::MalformedUpload)?;
    let mut email: Option<String> = None;
    let mut upload: Option<AssessmentUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("email") => {
                email = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = read_file_field(field).await?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                upload = Some(AssessmentUpload::new(file_name, bytes)?);
            }
            _ => {}
        }
    }

    let email = email
        .filter(|email| !email.trim().is_empty())
        .ok_or(ValidationError::MissingEmail)?;
    let upload = upload.ok_or(ValidationError::MissingFile)?;
    Ok((email, upload))
}

async fn read_file_field(
    mut field: axum::extract::multipart::Field<'_>,
) -> Result<Vec<u8>, ValidationError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ValidationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::FileTooLarge
    } else {
        ValidationError::MalformedUpload
    }
}

#[instrument(skip_all, fields(%method))]
pub(crate) async fn review_handler<R, B>(
    State(state): State<PortalState<R, B>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response
where
    R: RecordStore + 'static,
    B: BlobStore + 'static,
{
    if !state.authorized(&headers) {
        warn!("review request with missing or wrong secret");
        return ApiError::Unauthorized.into_response();
    }

    match method {
        Method::GET => match state.service.list_submissions().await {
            Ok(submissions) => {
                (StatusCode::OK, Json(json!({ "submissions": submissions }))).into_response()
            }
            Err(err) => ApiError::from_service(Operation::ListSubmissions, err).into_response(),
        },
        Method::POST => {
            let body = match axum::body::to_bytes(body, REVIEW_BODY_LIMIT).await {
                Ok(body) => body,
                Err(_) => return ApiError::from(ValidationError::MalformedJson).into_response(),
            };
            let input = match parse_review(&body) {
                Ok(input) => input,
                Err(err) => return ApiError::from(err).into_response(),
            };
            match state.service.review(input).await {
                Ok(()) => {
                    let payload = json!({
                        "success": true,
                        "message": "Review submitted successfully",
                    });
                    (StatusCode::OK, Json(payload)).into_response()
                }
                Err(err) => ApiError::from_service(Operation::SubmitReview, err).into_response(),
            }
        }
        _ => ApiError::MethodNotAllowed.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    #[serde(default)]
    page_id: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    feedback: Option<String>,
}

pub(crate) fn parse_review(body: &[u8]) -> Result<ReviewInput, ValidationError> {
    let request: ReviewRequest =
        serde_json::from_slice(body).map_err(|_| ValidationError::MalformedJson)?;

    let (Some(page_id), Some(score), Some(feedback)) =
        (request.page_id, request.score, request.feedback)
    else {
        return Err(ValidationError::MissingReviewFields);
    };
    if score.is_null() {
        return Err(ValidationError::MissingReviewFields);
    }

    let score = integer_score(&score).ok_or(ValidationError::ScoreOutOfRange)?;
    ReviewInput::new(page_id, score, feedback)
}

fn integer_score(value: &Value) -> Option<i64> {
    let Value::Number(number) = value else {
        return None;
    };
    number.as_i64().or_else(|| {
        number
            .as_f64()
            .filter(|raw| raw.fract() == 0.0 && raw.abs() < 1e6)
            .map(|raw| raw as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_body_requires_every_field() {
        assert_eq!(
            parse_review(br#"{"score": 5, "feedback": "ok"}"#),
            Err(ValidationError::MissingReviewFields)
        );
        assert_eq!(
            parse_review(br#"{"pageId": "p1", "feedback": "ok"}"#),
            Err(ValidationError::MissingReviewFields)
        );
        assert_eq!(
            parse_review(br#"{"pageId": "p1", "score": null, "feedback": "ok"}"#),
            Err(ValidationError::MissingReviewFields)
        );
        assert_eq!(
            parse_review(br#"{"pageId": "p1", "score": 5, "feedback": ""}"#),
            Err(ValidationError::MissingReviewFields)
        );
    }

    #[test]
    fn review_body_rejects_non_integer_or_out_of_range_scores() {
        for body in [
            br#"{"pageId": "p1", "score": 11, "feedback": "ok"}"#.as_slice(),
            br#"{"pageId": "p1", "score": 0, "feedback": "ok"}"#.as_slice(),
            br#"{"pageId": "p1", "score": 7.5, "feedback": "ok"}"#.as_slice(),
            br#"{"pageId": "p1", "score": "7", "feedback": "ok"}"#.as_slice(),
        ] {
            assert_eq!(parse_review(body), Err(ValidationError::ScoreOutOfRange));
        }
    }

    #[test]
    fn review_body_accepts_integral_scores() {
        let input = parse_review(br#"{"pageId": "p1", "score": 7.0, "feedback": "ok"}"#)
            .expect("integral float accepted");
        assert_eq!(input.score.get(), 7);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        assert_eq!(parse_review(b"{not json"), Err(ValidationError::MalformedJson));
        assert_eq!(parse_review(b""), Err(ValidationError::MalformedJson));
    }

    #[test]
    fn downstream_errors_hide_internal_detail() {
        let err = ApiError::from_service(
            Operation::SubmitReview,
            ServiceError::RecordStore(crate::submissions::RecordStoreError::Transport(
                "dns failure for api.notion.com".to_string(),
            )),
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Failed to submit review");
    }
}
