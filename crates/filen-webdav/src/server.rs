//! HTTP server lifecycle: Basic auth, CORS, and the accept loop.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dav_server::body::Body;
use dav_server::{fakels::FakeLs, DavHandler};
use http::header::{HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::filesystem::FilenDavFs;

/// Every WebDAV verb the server accepts, advertised on preflight.
const ALLOWED_METHODS: &str =
    "OPTIONS, GET, HEAD, POST, PUT, DELETE, COPY, MOVE, MKCOL, PROPFIND, PROPPATCH, LOCK, UNLOCK";

/// Headers a browser client may read from responses.
const EXPOSED_HEADERS: &str = "DAV, ETag, Content-Range, Content-Length, WWW-Authenticate";

/// Request headers accepted on cross-origin calls.
const ALLOWED_HEADERS: &str =
    "Authorization, Content-Type, Depth, Destination, Overwrite, If, Lock-Token, X-Requested-With";

/// Configuration for the WebDAV server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind (0 = auto-assign).
    pub port: u16,
    pub bind_address: std::net::IpAddr,
    /// Basic auth credentials.
    pub username: String,
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            username: "filen".to_string(),
            password: "filen-webdav".to_string(),
        }
    }
}

/// A running WebDAV server instance.
pub struct WebDavServer {
    /// The actual bound address.
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl WebDavServer {
    /// Bind and start serving. Returns as soon as the listener is live.
    pub async fn start(fs: FilenDavFs, config: ServerConfig) -> Result<Self, std::io::Error> {
        let addr = SocketAddr::new(config.bind_address, config.port);
        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, "starting WebDAV server");

        let dav_handler = DavHandler::builder()
            .filesystem(Box::new(fs))
            .locksystem(FakeLs::new())
            .build_handler();

        let guard = Arc::new(AccessGuard {
            handler: dav_handler,
            username: config.username,
            password: config.password,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_handle = tokio::spawn(async move {
            tokio::select! {
                () = run_server(listener, guard) => {
                    debug!("server loop ended");
                }
                _ = shutdown_rx => {
                    info!("received shutdown signal");
                }
            }
        });

        Ok(Self {
            addr: actual_addr,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
        info!("WebDAV server stopped");
    }

    fn stop_sync(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            handle.abort();
        }
    }
}

impl Drop for WebDavServer {
    fn drop(&mut self) {
        self.stop_sync();
    }
}

/// Shared per-request state: the DAV handler plus the expected credentials.
struct AccessGuard {
    handler: DavHandler,
    username: String,
    password: String,
}

impl AccessGuard {
    /// Check the `Authorization: Basic` header against the configured
    /// credentials.
    fn authorized(&self, req: &Request<Incoming>) -> bool {
        let Some(value) = req.headers().get(http::header::AUTHORIZATION) else {
            return false;
        };
        let Ok(value) = value.to_str() else {
            return false;
        };
        let Some(encoded) = value.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = BASE64.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((user, pass)) => user == self.username && pass == self.password,
            None => false,
        }
    }

    async fn respond(&self, req: Request<Incoming>) -> Response<Body> {
        let origin = req.headers().get(http::header::ORIGIN).cloned();

        // CORS preflight: answer before authentication so browsers can even
        // attempt credentialed requests.
        if req.method() == Method::OPTIONS
            && req.headers().contains_key("access-control-request-method")
        {
            debug!("answering CORS preflight");
            let mut resp = Response::builder()
                .status(StatusCode::OK)
                .body(Body::empty())
                .expect("static response");
            apply_cors(resp.headers_mut(), origin.as_ref());
            return resp;
        }

        if !self.authorized(&req) {
            let mut resp = Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header(
                    http::header::WWW_AUTHENTICATE,
                    "Basic realm=\"filen-webdav\"",
                )
                .body(Body::empty())
                .expect("static response");
            apply_cors(resp.headers_mut(), origin.as_ref());
            return resp;
        }

        let mut resp = self.handler.handle(req).await;
        apply_cors(resp.headers_mut(), origin.as_ref());
        resp
    }
}

/// Decorate a response with the CORS contract: echo the request origin
/// (never `*` - credentials are in play), allow the DAV method set, and
/// expose the headers clients need for ranges and caching.
fn apply_cors(headers: &mut http::HeaderMap, origin: Option<&HeaderValue>) {
    if let Some(origin) = origin {
        headers.insert(
            HeaderName::from_static("access-control-allow-origin"),
            origin.clone(),
        );
        headers.insert(
            HeaderName::from_static("access-control-allow-credentials"),
            HeaderValue::from_static("true"),
        );
    }
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        HeaderName::from_static("access-control-expose-headers"),
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
}

/// Accept loop: one task per connection.
async fn run_server(listener: TcpListener, guard: Arc<AccessGuard>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let guard = guard.clone();
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);
                    let service = service_fn(move |req: Request<Incoming>| {
                        let guard = guard.clone();
                        async move { Ok::<_, Infallible>(guard.respond(req).await) }
                    });

                    if let Err(e) = auto::Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        warn!(peer = %peer_addr, error = %e, "HTTP connection error");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.username, "filen");
        assert_eq!(config.password, "filen-webdav");
    }

    #[test]
    fn cors_echoes_origin_and_never_wildcards() {
        let mut headers = http::HeaderMap::new();
        let origin = HeaderValue::from_static("http://localhost:3000");
        apply_cors(&mut headers, Some(&origin));

        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            headers.get("access-control-allow-credentials").unwrap(),
            "true"
        );
        assert_eq!(
            headers.get("access-control-expose-headers").unwrap(),
            EXPOSED_HEADERS
        );
        assert!(headers
            .get("access-control-allow-methods")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("PROPFIND"));
    }

    #[test]
    fn cors_without_origin_skips_origin_headers() {
        let mut headers = http::HeaderMap::new();
        apply_cors(&mut headers, None);
        assert!(headers.get("access-control-allow-origin").is_none());
        assert!(headers.get("access-control-allow-credentials").is_none());
        assert!(headers.get("access-control-allow-methods").is_some());
    }
}
