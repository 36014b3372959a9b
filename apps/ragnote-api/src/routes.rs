use axum::{
	Form, Json, Router,
	body::Bytes,
	extract::{Path, Query, State, rejection::FormRejection},
	http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
	response::{Html, IntoResponse, Redirect, Response},
	routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use tower_http::{
	cors::{Any, CorsLayer},
	trace::TraceLayer,
};

use crate::state::AppState;
use ragnote_service::{CreateNoteRequest, Error as ServiceError, ListResponse, QueryRequest};

pub const MODEL_USED_HEADER: HeaderName = HeaderName::from_static("x-model-used");
pub const METHOD_OVERRIDE_HEADER: HeaderName =
	HeaderName::from_static("x-http-method-override");

const NOTES_PAGE: &str = include_str!("../assets/notes.html");
const QUERY_PAGE: &str = include_str!("../assets/ui.html");
const WRITE_PAGE: &str = include_str!("../assets/write.html");
const NO_OUTPUT_MESSAGE: &str = "We were unable to generate output";

pub fn router(state: AppState) -> Router {
	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods(Any)
		.allow_headers(Any)
		.expose_headers([MODEL_USED_HEADER]);

	Router::new()
		.route("/health", get(health))
		.route("/", get(query_page))
		.route("/write", get(write_page))
		.route("/notes", get(notes_page).post(create_note))
		.route("/notes.json", get(list_notes))
		.route("/notes/{id}", delete(delete_note).post(override_note))
		.route("/api/query", get(query))
		.layer(cors)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn query_page() -> Html<&'static str> {
	Html(QUERY_PAGE)
}

async fn write_page() -> Html<&'static str> {
	Html(WRITE_PAGE)
}

async fn notes_page() -> Html<&'static str> {
	Html(NOTES_PAGE)
}

async fn list_notes(State(state): State<AppState>) -> Result<Json<ListResponse>, ApiError> {
	let response = state.service.list_notes().await?;

	Ok(Json(response))
}

/// Any body that is not a JSON object with a non-blank `text` is treated as missing text.
async fn create_note(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
	let payload = serde_json::from_slice::<CreateNoteRequest>(&body).unwrap_or_default();
	let response = state.service.create_note(payload).await?;

	tracing::debug!(job_id = %response.job_id, "Note accepted.");

	Ok((StatusCode::CREATED, "Created note").into_response())
}

async fn delete_note(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Redirect, ApiError> {
	let id = parse_note_id(&id)?;

	state.service.delete_note(id).await?;

	Ok(Redirect::to("/notes"))
}

/// HTML forms can only POST, so deletes arrive as `POST /notes/{id}` with an override.
async fn override_note(
	State(state): State<AppState>,
	Path(id): Path<String>,
	headers: HeaderMap,
	form: Result<Form<MethodOverride>, FormRejection>,
) -> Result<Redirect, ApiError> {
	// Header-only overrides carry no form body.
	let form = form.map(|Form(form)| form).unwrap_or_default();

	match method_override(&headers, &form) {
		Some(method) if method.eq_ignore_ascii_case("DELETE") =>
			delete_note(State(state), Path(id)).await,
		Some(method) => Err(ApiError::json(
			StatusCode::METHOD_NOT_ALLOWED,
			"METHOD_NOT_ALLOWED",
			format!("Method override {method:?} is not supported."),
		)),
		None => Err(ApiError::json(
			StatusCode::METHOD_NOT_ALLOWED,
			"METHOD_NOT_ALLOWED",
			"POST to a note requires a method override.",
		)),
	}
}

async fn query(
	State(state): State<AppState>,
	Query(params): Query<QueryRequest>,
) -> Result<Response, ApiError> {
	let response = state.service.query(params).await?;
	let model_used = HeaderValue::from_str(&response.model_id).map_err(|_| {
		ApiError::json(
			StatusCode::INTERNAL_SERVER_ERROR,
			"INTERNAL_ERROR",
			"Model identifier is not a valid header value.",
		)
	})?;
	let headers = [
		(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
		(MODEL_USED_HEADER, model_used),
	];

	Ok((headers, response.answer).into_response())
}

fn parse_note_id(raw: &str) -> Result<i64, ApiError> {
	raw.trim().parse::<i64>().map_err(|_| {
		ApiError::json(
			StatusCode::BAD_REQUEST,
			"INVALID_REQUEST",
			format!("Note id {raw:?} is not a number."),
		)
	})
}

#[derive(Debug, Default, Deserialize)]
struct MethodOverride {
	#[serde(rename = "_method")]
	method: Option<String>,
}

/// The header wins over a `_method` form field.
fn method_override(headers: &HeaderMap, form: &MethodOverride) -> Option<String> {
	if let Some(value) = headers.get(&METHOD_OVERRIDE_HEADER)
		&& let Ok(value) = value.to_str()
	{
		return Some(value.trim().to_string());
	}

	form.method.as_deref().map(|method| method.trim().to_string())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	plain_text: bool,
}
impl ApiError {
	fn json(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), plain_text: false }
	}

	fn plain(status: StatusCode, message: impl Into<String>) -> Self {
		Self { status, error_code: String::new(), message: message.into(), plain_text: true }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => Self::plain(StatusCode::BAD_REQUEST, message),
			ServiceError::NoCompletion { model_id } => {
				tracing::error!(%model_id, "Chat backend returned no usable output.");

				Self::plain(StatusCode::INTERNAL_SERVER_ERROR, NO_OUTPUT_MESSAGE)
			},
			ServiceError::NotFound { message } =>
				Self::json(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Upstream provider failed.");

				Self::json(StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR", message)
			},
			ServiceError::Qdrant { message } => {
				tracing::error!(error = %message, "Vector index failed.");

				Self::json(StatusCode::INTERNAL_SERVER_ERROR, "VECTOR_INDEX_ERROR", message)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Note store failed.");

				Self::json(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Internal storage error.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.plain_text {
			return (self.status, self.message).into_response();
		}

		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use axum::{body::Body, extract::FromRequest, http::Request};

	async fn decode_form(body: &'static str) -> MethodOverride {
		let request = Request::builder()
			.method("POST")
			.uri("/notes/7")
			.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
			.body(Body::from(body))
			.expect("Failed to build request.");
		let Form(form) = Form::<MethodOverride>::from_request(request, &())
			.await
			.expect("Failed to decode form.");

		form
	}

	#[tokio::test]
	async fn override_header_beats_form_field() {
		let mut headers = HeaderMap::new();

		headers.insert(METHOD_OVERRIDE_HEADER, HeaderValue::from_static("DELETE"));

		let form = decode_form("_method=PUT").await;

		assert_eq!(method_override(&headers, &form).as_deref(), Some("DELETE"));
	}

	#[tokio::test]
	async fn override_is_read_from_a_percent_encoded_form() {
		let headers = HeaderMap::new();

		assert_eq!(
			method_override(&headers, &decode_form("confirm=yes&_method=%44ELETE").await)
				.as_deref(),
			Some("DELETE")
		);
		assert_eq!(method_override(&headers, &decode_form("confirm=yes").await), None);
		assert_eq!(method_override(&headers, &MethodOverride::default()), None);
	}

	#[tokio::test]
	async fn empty_completions_are_plain_text_500s() {
		let response = ApiError::from(ServiceError::NoCompletion { model_id: "m".to_string() })
			.into_response();

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

		let body = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("Failed to read response body.");

		assert_eq!(&body[..], NO_OUTPUT_MESSAGE.as_bytes());
	}

	#[test]
	fn upstream_failures_are_internal_errors() {
		let provider = ApiError::from(ServiceError::Provider { message: "timeout".to_string() });
		let qdrant = ApiError::from(ServiceError::Qdrant { message: "unavailable".to_string() });

		assert_eq!(provider.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(provider.error_code, "PROVIDER_ERROR");
		assert_eq!(qdrant.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(qdrant.error_code, "VECTOR_INDEX_ERROR");
	}

	#[test]
	fn storage_errors_hide_details() {
		let err = ApiError::from(ServiceError::Storage { message: "password=hunter2".to_string() });

		assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(err.message, "Internal storage error.");
	}

	#[test]
	fn note_ids_must_be_numeric() {
		assert_eq!(parse_note_id("42").ok(), Some(42));
		assert!(parse_note_id("abc").is_err());
	}
}
