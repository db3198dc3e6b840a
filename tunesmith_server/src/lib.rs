// tunesmith_server: HTTP front end for the melody generator.
//
// Serves a fixed HTML form, accepts generation requests (form or JSON
// bodies), renders them through `tunesmith_music`, and serves the resulting
// MIDI and WAV files back by name.
//
// Module overview:
// - `config.rs`:  `ServerConfig`, loaded from an optional JSON file.
// - `form.rs`:    urlencoded body and path-segment decoding.
// - `routes.rs`:  Route table and handlers. Pure request -> reply mapping,
//                 independent of the socket layer.
// - `server.rs`:  tiny_http listener, the single worker loop, and the
//                 `ServerHandle` used to stop it.
//
// The server can run as a standalone binary (`main.rs`) or be embedded via
// the library API (`start_server`), which the smoke test uses.

pub mod config;
pub mod form;
pub mod routes;
pub mod server;

pub use server::start_server;
