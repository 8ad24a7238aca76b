//! HTTP client abstraction.
//!
//! The orchestrator only needs one request: a GET of the peer's export
//! endpoint with a timeout. The client is a trait so tests can route that
//! request in process ([`LoopbackClient`]) while production uses
//! [`ReqwestClient`].

use crate::error::PullError;
use std::io::Read;
use std::time::Duration;

/// A response as seen by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers, names lowercase.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The content type, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body as lossy UTF-8, cut to `max` characters.
    pub fn body_excerpt(&self, max: usize) -> String {
        String::from_utf8_lossy(&self.body).chars().take(max).collect()
    }
}

/// HTTP client abstraction.
///
/// Implementations must enforce `timeout` on the whole exchange and report
/// connection failures and timeouts as [`PullError::Network`]. Non-2xx
/// responses are returned, not turned into errors.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, PullError>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, PullError> {
        (**self).get(url, timeout)
    }
}

/// Blocking client built on `reqwest`.
///
/// Must not be called from inside an async context; the server runs pulls
/// on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    max_body_bytes: u64,
}

impl ReqwestClient {
    /// Default cap on archive size (1 GiB).
    pub const DEFAULT_MAX_BODY_BYTES: u64 = 1 << 30;

    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the TLS backend or resolver cannot start.
    pub fn new() -> Result<Self, PullError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("drawmirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PullError::network(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            max_body_bytes: Self::DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Sets the largest body accepted.
    pub fn with_max_body_bytes(mut self, max: u64) -> Self {
        self.max_body_bytes = max;
        self
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, PullError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| classify(url, &e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let mut body = Vec::new();
        response
            .take(self.max_body_bytes + 1)
            .read_to_end(&mut body)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    PullError::timeout(format!("{url}: reading body: {e}"))
                } else {
                    PullError::network(format!("{url}: reading body: {e}"))
                }
            })?;
        if body.len() as u64 > self.max_body_bytes {
            return Err(PullError::Remote {
                status,
                message: format!("response larger than {} bytes", self.max_body_bytes),
            });
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(url: &str, err: &reqwest::Error) -> PullError {
    if err.is_timeout() {
        PullError::timeout(format!("{url}: {err}"))
    } else {
        PullError::network(format!("{url}: {err}"))
    }
}

/// A client for orchestrators that only apply archives already in hand.
///
/// Every request fails with a network error; nothing is set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl HttpClient for OfflineClient {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, PullError> {
        Err(PullError::network(format!("{url}: offline client makes no requests")))
    }
}

/// Trait for servers that can answer loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a GET of `path`.
    fn handle_get(&self, path: &str) -> HttpResponse;
}

/// A client that routes requests straight into a [`LoopbackServer`].
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a client connected to `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// The wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, PullError> {
        Ok(self.server.handle_get(path_of(url)))
    }
}

/// Strips scheme and authority from a URL.
fn path_of(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.find('/').map_or("/", |i| &rest[i..])
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl LoopbackServer for Echo {
        fn handle_get(&self, path: &str) -> HttpResponse {
            HttpResponse::new(200, path.as_bytes().to_vec()).with_header("Content-Type", "text/plain")
        }
    }

    #[test]
    fn loopback_routes_path() {
        let client = LoopbackClient::new(Echo);
        let response = client
            .get("http://peer:3002/export-data", Duration::from_secs(1))
            .unwrap();
        assert_eq!(response.body, b"/export-data");
        assert_eq!(response.content_type(), Some("text/plain"));
    }

    #[test]
    fn offline_client_never_connects() {
        let err = OfflineClient
            .get("http://peer:3002/export-data", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, PullError::Network { timed_out: false, .. }));
    }

    #[test]
    fn path_extraction() {
        assert_eq!(path_of("http://a:1/x/y"), "/x/y");
        assert_eq!(path_of("http://a:1"), "/");
        assert_eq!(path_of("/already"), "/already");
    }

    #[test]
    fn response_helpers() {
        let response = HttpResponse::new(503, b"overloaded, try later".to_vec())
            .with_header("X-Thing", "1");
        assert!(!response.is_success());
        assert_eq!(response.header("x-thing"), Some("1"));
        assert_eq!(response.body_excerpt(10), "overloaded");
    }

    #[test]
    fn reqwest_refused_connection_is_network_error() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = ReqwestClient::new().unwrap();
        let err = client
            .get(&format!("http://127.0.0.1:{port}/export-data"), Duration::from_secs(2))
            .unwrap_err();
        assert!(matches!(err, PullError::Network { .. }), "{err}");
    }
}
