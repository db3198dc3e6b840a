// Request routing and handlers.
//
// `App::handle` maps an `Incoming` request (method, path, content type, body)
// to a `Reply` (status, headers, body). It never touches the socket, so the
// handlers are unit-tested directly; `server.rs` does the tiny_http plumbing.
//
// Routes:
// - `GET /`                      fixed HTML form
// - `POST /generate`             form or JSON params -> JSON render summary
// - `GET /download/<file>`       artifact bytes as an attachment
// - `GET /static/output/<file>`  artifact bytes, inline
// - `GET /health`                service status JSON
//
// Unknown paths get 404, known paths with the wrong method get 405. Handler
// failures become 500 with a plain-text `Error: <message>` body.

use chrono::Local;
use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tiny_http::Method;
use tunesmith_music::output::{ArtifactKind, OutputError, OutputStore};
use tunesmith_music::render::{self, RenderError, Rendered};
use tunesmith_music::request::{GenerationRequest, RawParams};
use tunesmith_prng::{EntropyError, TuneRng};

use crate::form;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// URL prefix under which artifacts are served inline.
pub const STATIC_OUTPUT_PREFIX: &str = "/static/output/";
const DOWNLOAD_PREFIX: &str = "/download/";

const LIBRARIES: [&str; 3] = ["tiny_http", "midly", "hound"];

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to seed random generator: {0}")]
    Entropy(#[from] EntropyError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// A request as the router sees it.
#[derive(Debug, Clone)]
pub struct Incoming<'a> {
    pub method: Method,
    /// Request target, possibly with a query string.
    pub url: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type.to_string())],
            body: body.into(),
        }
    }

    pub(crate) fn text(status: u16, body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(200, "application/json", body),
            Err(e) => Self::text(500, format!("Error: {e}")),
        }
    }

    fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Body of a successful `POST /generate`.
#[derive(Debug, Serialize)]
struct GenerateResponse<'a> {
    mood: &'static str,
    genre: &'static str,
    tempo: u16,
    style: &'static str,
    melody: &'a [i32],
    audio_file: String,
    midi_file: String,
    wav_available: bool,
    timestamp: String,
    defaults_applied: &'a [&'static str],
}

#[derive(Debug, Serialize)]
struct Health<'a> {
    status: &'static str,
    service: &'a str,
    libraries: [&'static str; 3],
}

enum Route<'a> {
    Index,
    Generate,
    Health,
    Download(&'a str),
    StaticOutput(&'a str),
}

impl<'a> Route<'a> {
    fn match_path(path: &'a str) -> Option<Self> {
        match path {
            "/" => Some(Route::Index),
            "/generate" => Some(Route::Generate),
            "/health" => Some(Route::Health),
            _ => path
                .strip_prefix(DOWNLOAD_PREFIX)
                .map(Route::Download)
                .or_else(|| path.strip_prefix(STATIC_OUTPUT_PREFIX).map(Route::StaticOutput)),
        }
    }

    fn method(&self) -> Method {
        match self {
            Route::Generate => Method::Post,
            _ => Method::Get,
        }
    }
}

pub struct App {
    store: OutputStore,
    service_name: String,
    track_name: String,
}

impl App {
    pub fn new(store: OutputStore, service_name: String, track_name: String) -> Self {
        Self {
            store,
            service_name,
            track_name,
        }
    }

    pub fn store(&self) -> &OutputStore {
        &self.store
    }

    pub fn handle(&self, req: &Incoming<'_>) -> Reply {
        let path = req.url.split(['?', '#']).next().unwrap_or_default();
        let Some(route) = Route::match_path(path) else {
            return Reply::text(404, "Not Found");
        };

        // HEAD is answered like GET; tiny_http drops the body.
        let allowed = route.method();
        let method_ok =
            req.method == allowed || (allowed == Method::Get && req.method == Method::Head);
        if !method_ok {
            return Reply::text(405, "Method Not Allowed")
                .with_header("Allow", allowed.to_string());
        }

        match route {
            Route::Index => Reply::new(200, "text/html; charset=utf-8", INDEX_HTML),
            Route::Generate => self.generate(req),
            Route::Health => self.health(),
            Route::Download(name) => self.download(&form::percent_decode(name)),
            Route::StaticOutput(name) => self
                .serve(&form::percent_decode(name))
                .unwrap_or_else(|reply| reply),
        }
    }

    fn health(&self) -> Reply {
        Reply::json(&Health {
            status: "healthy",
            service: &self.service_name,
            libraries: LIBRARIES,
        })
    }

    fn generate(&self, req: &Incoming<'_>) -> Reply {
        let raw = parse_params(req.content_type, req.body);
        let resolution = GenerationRequest::resolve(&raw);
        if !resolution.defaults_applied.is_empty() {
            info!("defaults applied for {:?}", resolution.defaults_applied);
        }

        match self.render(&resolution.request) {
            Ok(rendered) => Reply::json(&GenerateResponse {
                mood: rendered.request.mood.name(),
                genre: rendered.request.genre.name(),
                tempo: rendered.request.tempo,
                style: rendered.request.style.name(),
                melody: rendered.melody.notes(),
                audio_file: static_url(rendered.audio_file()),
                midi_file: static_url(&rendered.midi_file),
                wav_available: rendered.wav_file.is_some(),
                timestamp: rendered
                    .generated_at
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
                defaults_applied: &resolution.defaults_applied,
            }),
            Err(e) => {
                error!("generate failed: {e}");
                Reply::text(500, format!("Error: {e}"))
            }
        }
    }

    fn render(&self, request: &GenerationRequest) -> Result<Rendered, RouteError> {
        let mut rng = TuneRng::from_entropy()?;
        Ok(render::render(
            request,
            &self.store,
            &self.track_name,
            Local::now(),
            &mut rng,
        )?)
    }

    fn download(&self, name: &str) -> Reply {
        match self.serve(name) {
            Ok(reply) => reply.with_header(
                "Content-Disposition",
                format!("attachment; filename=\"{name}\""),
            ),
            Err(reply) => reply,
        }
    }

    /// Read an artifact; the error side is the reply to send instead.
    fn serve(&self, name: &str) -> Result<Reply, Reply> {
        let content_type = ArtifactKind::from_file_name(name)
            .map_or("application/octet-stream", ArtifactKind::content_type);
        match self.store.read(name) {
            Ok(bytes) => Ok(Reply::new(200, content_type, bytes)),
            Err(OutputError::NotFound(_) | OutputError::InvalidName(_)) => {
                Err(Reply::text(404, "Not Found"))
            }
            Err(e) => {
                let e = RouteError::from(e);
                error!("serving {name:?} failed: {e}");
                Err(Reply::text(500, format!("Error: {e}")))
            }
        }
    }
}

fn static_url(name: &str) -> String {
    format!("{STATIC_OUTPUT_PREFIX}{name}")
}

/// Decode generation parameters from a form or JSON body. A JSON body that
/// does not parse is treated as empty so every field falls back to its
/// default.
fn parse_params(content_type: Option<&str>, body: &[u8]) -> RawParams {
    let is_json = content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"));
    if is_json {
        if body.iter().all(u8::is_ascii_whitespace) {
            return RawParams::default();
        }
        return serde_json::from_slice(body).unwrap_or_else(|e| {
            warn!("ignoring malformed JSON body: {e}");
            RawParams::default()
        });
    }
    RawParams::from_pairs(form::parse(&String::from_utf8_lossy(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> (tempfile::TempDir, App) {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path().join("output")).unwrap();
        let app = App::new(store, "Test Service".into(), "Test Melody".into());
        (tmp, app)
    }

    fn get(url: &str) -> Incoming<'_> {
        Incoming {
            method: Method::Get,
            url,
            content_type: None,
            body: b"",
        }
    }

    fn post<'a>(url: &'a str, content_type: &'a str, body: &'a [u8]) -> Incoming<'a> {
        Incoming {
            method: Method::Post,
            url,
            content_type: Some(content_type),
            body,
        }
    }

    fn json_body(reply: &Reply) -> serde_json::Value {
        serde_json::from_slice(&reply.body).unwrap()
    }

    #[test]
    fn test_index_serves_form() {
        let (_tmp, app) = app();
        let reply = app.handle(&get("/"));
        assert_eq!(reply.status, 200);
        assert!(reply.header("content-type").unwrap().starts_with("text/html"));
        let html = String::from_utf8(reply.body).unwrap();
        assert!(html.contains("action=\"/generate\""));
        // The player always gets `audio_file`, which is the MIDI URL when
        // no WAV was produced.
        assert!(html.contains(r#"<audio controls src="${r.audio_file}">"#));
    }

    #[test]
    fn test_health() {
        let (_tmp, app) = app();
        let reply = app.handle(&get("/health?verbose=1"));
        assert_eq!(reply.status, 200);
        let body = json_body(&reply);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "Test Service");
        assert_eq!(body["libraries"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_path_and_wrong_method() {
        let (_tmp, app) = app();
        assert_eq!(app.handle(&get("/nope")).status, 404);

        let reply = app.handle(&get("/generate"));
        assert_eq!(reply.status, 405);
        assert_eq!(reply.header("Allow"), Some("POST"));

        let reply = app.handle(&post("/health", "text/plain", b""));
        assert_eq!(reply.status, 405);
    }

    #[test]
    fn test_generate_from_form() {
        let (_tmp, app) = app();
        let reply = app.handle(&post(
            "/generate",
            "application/x-www-form-urlencoded",
            b"mood=sad&genre=rock&tempo=90&style=complex",
        ));
        assert_eq!(reply.status, 200);
        let body = json_body(&reply);
        assert_eq!(body["mood"], "sad");
        assert_eq!(body["genre"], "rock");
        assert_eq!(body["tempo"], 90);
        assert_eq!(body["style"], "complex");
        assert_eq!(body["melody"].as_array().unwrap().len(), 16);
        assert_eq!(body["wav_available"], true);
        assert!(body["defaults_applied"].as_array().unwrap().is_empty());

        let midi = body["midi_file"].as_str().unwrap();
        let audio = body["audio_file"].as_str().unwrap();
        assert!(midi.starts_with("/static/output/music_") && midi.ends_with(".mid"));
        assert!(audio.starts_with("/static/output/music_") && audio.ends_with(".wav"));
        assert_eq!(body["timestamp"].as_str().unwrap().len(), "2024-01-01 00:00:00".len());

        let served = app.handle(&get(midi));
        assert_eq!(served.status, 200);
        assert_eq!(served.header("Content-Type"), Some("audio/midi"));
        assert!(served.body.starts_with(b"MThd"));
        assert_eq!(served.header("Content-Disposition"), None);
    }

    #[test]
    fn test_generate_from_json_with_defaults() {
        let (_tmp, app) = app();
        let reply = app.handle(&post(
            "/generate",
            "application/json; charset=utf-8",
            br#"{"mood": "melancholy", "tempo": 250}"#,
        ));
        assert_eq!(reply.status, 200);
        let body = json_body(&reply);
        assert_eq!(body["mood"], "happy");
        assert_eq!(body["genre"], "pop");
        assert_eq!(body["tempo"], 120);
        assert_eq!(body["style"], "simple");
        let applied: Vec<&str> = body["defaults_applied"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(applied, ["mood", "genre", "tempo", "style"]);
    }

    #[test]
    fn test_malformed_json_falls_back_to_defaults() {
        assert_eq!(
            parse_params(Some("application/json"), b"{not json").mood,
            None
        );
        let raw = parse_params(Some("application/json"), br#"{"tempo": 95}"#);
        assert_eq!(raw.tempo.as_deref(), Some("95"));
        let raw = parse_params(None, b"genre=jazz");
        assert_eq!(raw.genre.as_deref(), Some("jazz"));
    }

    #[test]
    fn test_download_sets_attachment() {
        let (_tmp, app) = app();
        app.store().write("music_20240101_000000.wav", b"RIFF").unwrap();

        let reply = app.handle(&get("/download/music_20240101_000000.wav"));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("Content-Type"), Some("audio/wav"));
        assert_eq!(
            reply.header("Content-Disposition"),
            Some("attachment; filename=\"music_20240101_000000.wav\"")
        );
        assert_eq!(reply.body, b"RIFF");
    }

    #[test]
    fn test_missing_and_traversal_are_not_found() {
        let (_tmp, app) = app();
        assert_eq!(app.handle(&get("/download/missing.mid")).status, 404);
        assert_eq!(app.handle(&get("/download/..%2Fsecret")).status, 404);
        assert_eq!(app.handle(&get("/static/output/../Cargo.toml")).status, 404);
        assert_eq!(app.handle(&get("/static/output/")).status, 404);
    }

    #[test]
    fn test_head_is_accepted_for_get_routes() {
        let (_tmp, app) = app();
        let head = Incoming {
            method: Method::Head,
            ..get("/health")
        };
        assert_eq!(app.handle(&head).status, 200);
    }

    #[test]
    fn test_generate_write_failure_is_500() {
        let (_tmp, app) = app();
        std::fs::remove_dir_all(app.store().dir()).unwrap();

        let reply = app.handle(&post(
            "/generate",
            "application/x-www-form-urlencoded",
            b"mood=calm",
        ));
        assert_eq!(reply.status, 500);
        assert!(reply.header("Content-Type").unwrap().starts_with("text/plain"));
        let body = String::from_utf8(reply.body).unwrap();
        assert!(body.starts_with("Error: "), "unexpected body {body:?}");
    }
}
