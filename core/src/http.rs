//! HTTP transport types and the `Transport` seam.
//!
//! # Design
//! Requests and responses are plain data. `TtRssClient` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network;
//! something implementing `Transport` performs the round-trip in between.
//! `Session` is generic over that seam, so tests can swap the network for a
//! closure and production code uses `UreqTransport`.
//!
//! Every call against the API is a POST to one endpoint, so there is no
//! method field.

use std::time::Duration;

use crate::error::ApiError;

/// Default bound on a single round-trip. `updateFeed` refreshes a feed
/// synchronously on the server, so this is deliberately generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A POST request described as plain data.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// An HTTP response described as plain data.
///
/// Constructed by a `Transport` after executing an `HttpRequest`, then
/// passed to `TtRssClient::parse`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Executes one request/response round-trip.
///
/// Implementations must return non-2xx responses as `Ok` data; only
/// failures to complete the exchange at all are `Err`.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<F> Transport for F
where
    F: Fn(HttpRequest) -> Result<HttpResponse, ApiError>,
{
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Build a transport whose every call fails with `ApiError::Timeout`
    /// once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let mut builder = self.agent.post(&request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let mut response = builder.send(request.body.as_bytes()).map_err(map_ureq_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.body_mut().read_to_string().map_err(map_ureq_error)?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn map_ureq_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Timeout(_) => ApiError::Timeout,
        other => ApiError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_transports() {
        let transport = |req: HttpRequest| {
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: req.body,
            })
        };
        let response = transport
            .execute(HttpRequest {
                url: "http://localhost/api/".to_string(),
                headers: Vec::new(),
                body: "echo".to_string(),
            })
            .unwrap();
        assert_eq!(response.body, "echo");
    }

    #[test]
    fn connection_refused_is_a_transport_error() {
        // Port 9 (discard) is closed on any sane test host.
        let transport = UreqTransport::with_timeout(Duration::from_secs(2));
        let err = transport
            .execute(HttpRequest {
                url: "http://127.0.0.1:9/api/".to_string(),
                headers: Vec::new(),
                body: "{}".to_string(),
            })
            .unwrap_err();
        assert!(err.is_transport(), "unexpected error: {err:?}");
    }

    #[test]
    fn silent_server_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            // Hold the connection open without ever answering.
            let (_stream, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(3));
        });

        let transport = UreqTransport::with_timeout(Duration::from_millis(300));
        let started = std::time::Instant::now();
        let err = transport
            .execute(HttpRequest {
                url: format!("http://{addr}/api/"),
                headers: Vec::new(),
                body: "{}".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout), "unexpected error: {err:?}");
        assert!(err.is_transport());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
