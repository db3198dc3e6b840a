// HTTP listener and request loop.
//
// Architecture: one worker thread owns the `tiny_http::Server` and the `App`.
// It polls `recv_timeout` so it can notice shutdown between requests, reads
// each request body (anything over `MAX_BODY_BYTES` is refused with 413),
// hands an `Incoming` to `App::handle`, and writes the `Reply` back.
// Requests are handled strictly one at a time.
//
// Shutdown: `ServerHandle::stop` clears the `keep_running` flag and joins the
// worker, which exits after at most one poll interval.

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tunesmith_music::output::{OutputError, OutputStore};

use crate::config::ServerConfig;
use crate::routes::{App, Incoming, Reply};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_BODY_BYTES: u64 = 64 * 1024;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("listener has no IP address")]
    NoIpAddress,
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Handle returned by `start_server` to control the running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join_worker();
    }

    /// Block until the worker thread exits.
    pub fn wait(mut self) {
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if self.thread.take().is_some_and(|h| h.join().is_err()) {
            error!("server thread panicked");
        }
    }
}

/// Create the output directory, bind the listener and start serving on a
/// background thread. Returns the handle and the actual bound address (port
/// 0 lets the OS pick).
pub fn start_server(config: ServerConfig) -> Result<(ServerHandle, SocketAddr), StartError> {
    let store = OutputStore::open(&config.output_dir)?;
    let bind = format!("{}:{}", config.bind_address, config.port);
    let server = Server::http(&bind).map_err(|e| StartError::Bind {
        addr: bind.clone(),
        source: std::io::Error::other(e),
    })?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or(StartError::NoIpAddress)?;
    info!(
        "serving on http://{addr}, writing to {}",
        store.dir().display()
    );

    let app = App::new(store, config.service_name, config.track_name);
    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();
    let thread = thread::spawn(move || {
        run_server(server, app, keep_running_clone);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn run_server(server: Server, app: App, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => serve_one(&app, request),
            Ok(None) => {}
            Err(e) => {
                error!("accept failed: {e}");
                break;
            }
        }
    }
    debug!("server loop exited");
}

fn serve_one(app: &App, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let content_type = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Content-Type"))
        .map(|h| h.value.as_str().to_string());

    let reply = dispatch(
        app,
        method.clone(),
        &url,
        content_type.as_deref(),
        request.as_reader(),
    );
    debug!("{method} {url} -> {}", reply.status);

    if let Err(e) = request.respond(to_response(reply)) {
        warn!("failed to send response for {url}: {e}");
    }
}

/// Read the request body and route it. Bodies over `MAX_BODY_BYTES` get 413
/// without being routed.
fn dispatch(
    app: &App,
    method: Method,
    url: &str,
    content_type: Option<&str>,
    body: impl Read,
) -> Reply {
    match read_body(body, MAX_BODY_BYTES) {
        Ok(Some(body)) => app.handle(&Incoming {
            method,
            url,
            content_type,
            body: &body,
        }),
        Ok(None) => {
            warn!("rejecting {method} {url}: body exceeds {MAX_BODY_BYTES} bytes");
            Reply::text(413, "Payload Too Large")
        }
        Err(e) => {
            error!("failed to read request body: {e}");
            Reply::text(500, format!("Error: {e}"))
        }
    }
}

/// Read at most `limit` bytes; `None` when the body is longer.
fn read_body(reader: impl Read, limit: u64) -> std::io::Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    reader.take(limit + 1).read_to_end(&mut body)?;
    Ok((body.len() as u64 <= limit).then_some(body))
}

fn to_response(reply: Reply) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    for (name, value) in reply.headers {
        match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            Ok(header) => response.add_header(header),
            Err(()) => warn!("dropping invalid header {name}: {value:?}"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer went away",
            ))
        }
    }

    fn app() -> (tempfile::TempDir, App) {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path()).unwrap();
        (tmp, App::new(store, "svc".into(), "track".into()))
    }

    #[test]
    fn test_read_body_limit() {
        let exact = vec![b'a'; 16];
        assert_eq!(read_body(Cursor::new(&exact), 16).unwrap(), Some(exact.clone()));
        assert_eq!(read_body(Cursor::new(vec![b'a'; 17]), 16).unwrap(), None);
        assert_eq!(read_body(Cursor::new(Vec::new()), 16).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_oversized_body_is_413() {
        let (_tmp, app) = app();
        let body = vec![b'x'; MAX_BODY_BYTES as usize + 1];
        let reply = dispatch(
            &app,
            Method::Post,
            "/generate",
            Some("application/x-www-form-urlencoded"),
            Cursor::new(body),
        );
        assert_eq!(reply.status, 413);
        assert!(reply.header("Content-Type").unwrap().starts_with("text/plain"));
    }

    #[test]
    fn test_body_read_failure_is_500_text() {
        let (_tmp, app) = app();
        let reply = dispatch(&app, Method::Post, "/generate", None, FailingReader);
        assert_eq!(reply.status, 500);
        assert!(reply.header("Content-Type").unwrap().starts_with("text/plain"));
        assert!(String::from_utf8(reply.body).unwrap().starts_with("Error: "));
    }

    #[test]
    fn test_small_body_is_routed() {
        let (_tmp, app) = app();
        let reply = dispatch(&app, Method::Get, "/health", None, Cursor::new(Vec::new()));
        assert_eq!(reply.status, 200);
    }
}
