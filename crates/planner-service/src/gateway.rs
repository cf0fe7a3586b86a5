//! HTTP gateway to the published objects.
//!
//! The gateway resolves objects through the naming directory and forwards
//! invocations into the broker queue. It never dispatches requests itself:
//! a reply is produced once the host pumps the server, and the HTTP request
//! waits until then.

use axum::{
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	Router,
};
use planner_broker::{InvocationError, NameComponent, NamingDirectory, NamingError, ServantError};
use planner_config::GatewayConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
	/// Directory the objects are resolved in.
	pub naming: Arc<dyn NamingDirectory>,
	/// Context the objects are bound under.
	pub context: NameComponent,
}

impl GatewayState {
	pub fn new(naming: Arc<dyn NamingDirectory>, context: NameComponent) -> Self {
		Self { naming, context }
	}
}

/// Error body returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
}

/// Gateway errors with their HTTP status mapping.
#[derive(Debug)]
pub enum GatewayError {
	NotFound(String),
	BadRequest(String),
	UnprocessableEntity(String),
	ServiceUnavailable(String),
	InternalServerError(String),
}

impl GatewayError {
	pub fn status_code(&self) -> StatusCode {
		match self {
			GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
			GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
			GatewayError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
			GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			GatewayError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message) = match self {
			GatewayError::NotFound(m) => ("NOT_FOUND", m),
			GatewayError::BadRequest(m) => ("BAD_REQUEST", m),
			GatewayError::UnprocessableEntity(m) => ("OPERATION_FAILED", m),
			GatewayError::ServiceUnavailable(m) => ("SERVICE_UNAVAILABLE", m),
			GatewayError::InternalServerError(m) => ("INTERNAL_ERROR", m),
		};
		ErrorResponse {
			error: error.to_string(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for GatewayError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let response = self.to_error_response();
		write!(f, "{}: {}", response.error, response.message)
	}
}

impl std::error::Error for GatewayError {}

impl From<NamingError> for GatewayError {
	fn from(err: NamingError) -> Self {
		match err {
			NamingError::NotFound(_) => GatewayError::NotFound(err.to_string()),
			NamingError::InvalidName(_) | NamingError::AlreadyBound(_) => {
				GatewayError::BadRequest(err.to_string())
			},
		}
	}
}

impl From<InvocationError> for GatewayError {
	fn from(err: InvocationError) -> Self {
		match err {
			InvocationError::ObjectNotExist(_) => GatewayError::NotFound(err.to_string()),
			InvocationError::ShutDown => GatewayError::ServiceUnavailable(err.to_string()),
			InvocationError::NoReply => GatewayError::InternalServerError(err.to_string()),
			InvocationError::Servant(ServantError::Failed(_)) => {
				GatewayError::UnprocessableEntity(err.to_string())
			},
			InvocationError::Servant(_) => GatewayError::BadRequest(err.to_string()),
		}
	}
}

impl IntoResponse for GatewayError {
	fn into_response(self) -> Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}

/// Builds the gateway router.
pub fn router(state: GatewayState) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/objects", get(handle_list_objects))
				.route("/objects/{id}/{kind}/{operation}", post(handle_invoke)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(state)
}

/// Serves the gateway until the listener fails.
pub async fn start_gateway(config: GatewayConfig, state: GatewayState) -> Result<(), std::io::Error> {
	let app = router(state);

	let bind_address = format!("{}:{}", config.host, config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Planner gateway starting on {}", bind_address);

	axum::serve(listener, app).await
}

/// Handles GET /api/objects requests.
async fn handle_list_objects(
	State(state): State<GatewayState>,
) -> Result<Json<Vec<NameComponent>>, GatewayError> {
	let names = state.naming.list(std::slice::from_ref(&state.context))?;
	Ok(Json(names))
}

/// Handles POST /api/objects/{id}/{kind}/{operation} requests.
///
/// The body is the JSON argument object of the operation.
async fn handle_invoke(
	Path((id, kind, operation)): Path<(String, String, String)>,
	State(state): State<GatewayState>,
	Json(args): Json<Value>,
) -> Result<Json<Value>, GatewayError> {
	let name = [state.context.clone(), NameComponent::new(id, kind)];
	let object = state.naming.resolve(&name)?;

	tracing::debug!(object = %name[1], operation = %operation, "Forwarding invocation");
	match object.invoke(operation.as_str(), args).await {
		Ok(reply) => Ok(Json(reply)),
		Err(e) => {
			tracing::warn!(object = %name[1], operation = %operation, error = %e, "Invocation failed");
			Err(GatewayError::from(e))
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::serial;
	use crate::Server;
	use axum::body::Body;
	use axum::http::Request;
	use planner_config::Config;
	use planner_core::Planner;
	use serde_json::json;
	use std::sync::Mutex;
	use tower::ServiceExt;

	fn serving() -> (Server, Router) {
		let planner = Arc::new(Mutex::new(Planner::new()));
		let mut server = Server::new(planner, &[], &Config::default()).unwrap();
		server.start_serving().unwrap();
		let state = GatewayState::new(server.naming().unwrap(), server.naming_context());
		(server, router(state))
	}

	fn invoke(path: &str, body: Value) -> Request<Body> {
		Request::builder()
			.method("POST")
			.uri(path)
			.header("content-type", "application/json")
			.body(Body::from(body.to_string()))
			.unwrap()
	}

	async fn body_json(response: Response) -> Value {
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	/// Sends `request` while pumping the server until the response is ready.
	async fn pumped(server: &Server, app: &Router, request: Request<Body>) -> Response {
		let task = tokio::spawn(app.clone().oneshot(request));
		while !task.is_finished() {
			server.poll().unwrap();
			tokio::task::yield_now().await;
		}
		task.await.unwrap().unwrap()
	}

	#[tokio::test]
	async fn test_invoke_through_gateway() {
		let _serial = serial();
		let (server, app) = serving();

		let response = pumped(
			&server,
			&app,
			invoke(
				"/api/objects/Robot/Object/createRobot",
				json!({"name": "car", "configSize": 3}),
			),
		)
		.await;
		assert_eq!(response.status(), StatusCode::OK);

		let response = pumped(
			&server,
			&app,
			invoke("/api/objects/Robot/Object/getConfigSize", Value::Null),
		)
		.await;
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_json(response).await, json!(3));
	}

	#[tokio::test]
	async fn test_servant_errors_mapped() {
		let _serial = serial();
		let (server, app) = serving();

		let response = pumped(
			&server,
			&app,
			invoke("/api/objects/Robot/Object/getRobotName", Value::Null),
		)
		.await;
		assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
		let body = body_json(response).await;
		assert_eq!(body["error"], "OPERATION_FAILED");

		let response = pumped(
			&server,
			&app,
			invoke("/api/objects/Robot/Object/fly", Value::Null),
		)
		.await;
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_unknown_object() {
		let _serial = serial();
		let (_server, app) = serving();

		let response = app
			.oneshot(invoke("/api/objects/Planner/Object/solve", Value::Null))
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
		assert_eq!(body_json(response).await["error"], "NOT_FOUND");
	}

	#[tokio::test]
	async fn test_list_objects() {
		let _serial = serial();
		let (_server, app) = serving();

		let response = app
			.oneshot(
				Request::builder()
					.uri("/api/objects")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(
			body_json(response).await,
			json!([
				{"id": "Obstacle", "kind": "Object"},
				{"id": "Problem", "kind": "Object"},
				{"id": "Robot", "kind": "Object"},
			])
		);
	}
}
