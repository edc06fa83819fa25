//! HTTP adapter over the [`Gateway`].
//!
//! Each ingest request runs on its own task, so a client that disconnects
//! mid-request does not cancel backend calls already under way.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use conduit_core::{IngestError, RequestContext, StreamId, TenantId};
use conduit_gateway::{BodySource, Gateway, IngestReport, IngestRequest};
use http::header::{ALLOW, CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Body;
use serde::Serialize;

use crate::health::{HealthCheck, Readiness};
use crate::routes::{self, Route, REQUEST_ID_HEADER};

/// Response body type.
pub type ResponseBody = Full<Bytes>;

/// HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Serves the ingestion surface and the probes.
pub struct IngestService {
    gateway: Arc<Gateway>,
    health: HealthCheck,
    readiness: Readiness,
    request_timeout: Duration,
}

impl std::fmt::Debug for IngestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestService")
            .field("health", &self.health)
            .field("readiness", &self.readiness)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl IngestService {
    /// Creates a service over `gateway`.
    pub fn new(gateway: Arc<Gateway>, health: HealthCheck, readiness: Readiness) -> Self {
        Self {
            gateway,
            health,
            readiness,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Bounds how long a request waits for its message to be processed.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Readiness probe shared with the accept loop.
    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Handles one request.
    pub async fn handle<B>(self: Arc<Self>, req: Request<B>) -> Result<HttpResponse, Infallible>
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let path = req.uri().path().to_owned();
        let method = req.method().clone();

        let response = match routes::match_route(&method, &path) {
            Route::Ingest { tenant, stream } => self.ingest(req, tenant, stream).await,
            Route::Health => json_response(StatusCode::OK, &self.health.status()),
            Route::Ready => {
                let status = self.readiness.status();
                let code = if status.ready {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(code, &status)
            }
            Route::MethodNotAllowed { allow } => {
                let mut response = plain_error(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "METHOD_NOT_ALLOWED",
                    "Method not allowed",
                );
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(allow));
                response
            }
            Route::NotFound => plain_error(StatusCode::NOT_FOUND, "NOT_FOUND", "Not found"),
        };

        tracing::debug!(%method, %path, status = response.status().as_u16(), "request handled");
        Ok(response)
    }

    async fn ingest<B>(&self, req: Request<B>, tenant: &str, stream: &str) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send + Unpin + 'static,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let context = RequestContext::new();
        let request_id = context.request_id().to_string();

        let ids = TenantId::new(tenant).and_then(|t| StreamId::new(stream).map(|s| (t, s)));
        let (tenant, stream) = match ids {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!(request_id = %request_id, error = %e, "malformed identifier");
                // The body was never read.
                return error_response(&IngestError::bad_request(e.to_string()), &request_id, false);
            }
        };

        let (parts, body) = req.into_parts();
        let mut request = IngestRequest::new(tenant, stream).with_context(context);
        if let Some(credential) = routes::credential(&parts.headers) {
            request = request.with_credential(credential);
        }
        if let Some(content_type) = routes::content_type(&parts.headers) {
            request = request.with_content_type(content_type);
        }

        let gateway = Arc::clone(&self.gateway);
        let task = tokio::spawn(async move {
            let mut source = BodySource::new(body);
            gateway.ingest(request, &mut source).await
        });

        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(report)) => report_response(&report),
            Ok(Err(join)) => {
                tracing::error!(request_id = %request_id, error = %join, "ingest task failed");
                error_response(&IngestError::internal("ingest task failed"), &request_id, false)
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                    "ingest timed out, processing continues in the background"
                );
                error_response(
                    &IngestError::infrastructure("request timed out"),
                    &request_id,
                    false,
                )
            }
        }
    }
}

/// Maps a finished ingest to its HTTP response.
pub fn report_response(report: &IngestReport) -> HttpResponse {
    let request_id = report.request_id.to_string();
    match &report.result {
        Ok(_) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            set_request_id(&mut response, &request_id);
            if !report.body_drained {
                response
                    .headers_mut()
                    .insert(CONNECTION, HeaderValue::from_static("close"));
            }
            response
        }
        Err(err) => error_response(err, &request_id, report.body_drained),
    }
}

/// Renders `err` as a JSON envelope. Without a drained body the connection
/// cannot be reused.
fn error_response(err: &IngestError, request_id: &str, body_drained: bool) -> HttpResponse {
    let envelope = err.to_envelope(Some(request_id));
    let mut response = json_response(err.status_code(), &envelope);
    set_request_id(&mut response, request_id);
    if !body_drained {
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

fn plain_error(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message,
        }
    });
    json_response(status, &body)
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> HttpResponse {
    let body = serde_json::to_vec(value).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response body");
        br#"{"error":{"code":"INTERNAL_ERROR","message":"Internal server error"}}"#.to_vec()
    });

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn set_request_id(response: &mut HttpResponse, request_id: &str) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}
