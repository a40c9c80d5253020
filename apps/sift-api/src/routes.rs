use axum::{
	Json, Router,
	extract::{Request, State, rejection::JsonRejection},
	http::{
		HeaderMap, HeaderValue, Method, StatusCode, Uri,
		header::{HOST, USER_AGENT},
	},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::Instrument;
use uuid::Uuid;

use crate::state::AppState;
use sift_service::{Document, Error, SearchRequest, TopMatch};

const DEFAULT_TOP_K: i64 = 10;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(health))
		.route("/search", post(search))
		.layer(middleware::from_fn(access_log))
		.with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub message: &'static str,
	pub method: String,
	#[serde(rename = "status-code")]
	pub status_code: u16,
	pub timestamp: String,
	pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
	pub query: DocumentBody,
	#[serde(default)]
	pub documents: Vec<DocumentBody>,
	#[serde(default = "default_top_k")]
	pub top_k: i64,
	#[serde(default)]
	pub docs_only: bool,
}

/// A document as sent by clients: a bare id, or an object with an optional text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentBody {
	Bare(UidBody),
	Object {
		uid: UidBody,
		#[serde(default)]
		text: Option<String>,
	},
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UidBody {
	Int(i64),
	Text(String),
}

#[derive(Debug, Serialize)]
pub struct TopMatchBody {
	pub uid: String,
	pub score: f32,
}
impl From<TopMatch> for TopMatchBody {
	fn from(value: TopMatch) -> Self {
		Self { uid: value.uid.to_string(), score: value.score }
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}

	fn invalid(message: impl Into<String>, field: impl Into<String>) -> Self {
		Self::new(
			StatusCode::UNPROCESSABLE_ENTITY,
			"invalid_request",
			message,
			Some(vec![field.into()]),
		)
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let (status, code, fields) = match &err {
			Error::InvalidRequest { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request", None),
			Error::QueryUnresolvable { .. } => (
				StatusCode::UNPROCESSABLE_ENTITY,
				"query_unresolvable",
				Some(vec!["query".to_string()]),
			),
			Error::Resolver { .. } => (StatusCode::BAD_GATEWAY, "resolver_unavailable", None),
			Error::Encoder(_) => (StatusCode::SERVICE_UNAVAILABLE, "encoder_unavailable", None),
			Error::Index(_) => (StatusCode::INTERNAL_SERVER_ERROR, "index_error", None),
			Error::Unscored { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "unscored_document", None),
			Error::Compute { .. } | Error::Provider { .. } =>
				(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
		};

		if status.is_server_error() {
			tracing::error!(error = %err, "Search failed.");
		}

		Self::new(status, code, err.to_string(), fields)
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self::new(rejection.status(), "invalid_request", rejection.body_text(), None)
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

async fn health(
	method: Method,
	uri: Uri,
	headers: HeaderMap,
) -> Result<Json<HealthResponse>, ApiError> {
	let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
		ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", err.to_string(), None)
	})?;
	let host = headers.get(HOST).and_then(|value| value.to_str().ok()).unwrap_or("localhost");

	Ok(Json(HealthResponse {
		message: "OK",
		method: method.to_string(),
		status_code: StatusCode::OK.as_u16(),
		timestamp,
		url: format!("http://{host}{uri}"),
	}))
}

async fn search(
	State(state): State<AppState>,
	payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<Vec<TopMatchBody>>, ApiError> {
	let Json(payload) = payload?;
	let request = into_request(payload)?;
	let matches = state.service.search(request).await?;

	Ok(Json(matches.into_iter().map(TopMatchBody::from).collect()))
}

fn into_request(body: SearchBody) -> Result<SearchRequest, ApiError> {
	if body.top_k <= 0 {
		return Err(ApiError::invalid("top_k must be greater than 0.", "top_k"));
	}

	let top_k = usize::try_from(body.top_k)
		.map_err(|_| ApiError::invalid("top_k is out of range.", "top_k"))?;
	let query = into_document(body.query, "query")?;
	let documents = body
		.documents
		.into_iter()
		.enumerate()
		.map(|(i, document)| into_document(document, &format!("documents[{i}]")))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(SearchRequest { query, documents, top_k, docs_only: body.docs_only })
}

fn into_document(body: DocumentBody, path: &str) -> Result<Document, ApiError> {
	match body {
		DocumentBody::Bare(uid) => Ok(Document::ById(parse_uid(uid, path)?)),
		DocumentBody::Object { uid, text: None } => Ok(Document::ById(parse_uid(uid, path)?)),
		DocumentBody::Object { uid, text: Some(text) } =>
			Ok(Document::WithText { uid: parse_uid(uid, path)?, text }),
	}
}

fn parse_uid(uid: UidBody, path: &str) -> Result<i64, ApiError> {
	match uid {
		UidBody::Int(value) => Ok(value),
		UidBody::Text(raw) => raw.trim().parse().map_err(|_| {
			ApiError::invalid(format!("uid {raw:?} is not a 64-bit integer."), format!("{path}.uid"))
		}),
	}
}

async fn access_log(request: Request, next: Next) -> Response {
	let request_id = Uuid::new_v4();
	let method = request.method().clone();
	let path = request.uri().path().to_string();
	let user_agent = request
		.headers()
		.get(USER_AGENT)
		.and_then(|value| value.to_str().ok())
		.unwrap_or("-")
		.to_string();
	let span = tracing::info_span!("request", %request_id);
	let mut response = next.run(request).instrument(span.clone()).await;
	let status = response.status().as_u16();

	span.in_scope(|| tracing::info!(%method, %path, status, %user_agent, "Request completed."));

	if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
		response.headers_mut().insert("x-request-id", value);
	}

	response
}

fn default_top_k() -> i64 {
	DEFAULT_TOP_K
}
