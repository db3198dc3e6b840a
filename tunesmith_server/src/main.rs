// CLI entry point for the tunesmith web server.
//
// Loads `ServerConfig` from `--config` (if given), applies flag overrides,
// and serves until the process is killed. See `server.rs` for the request
// loop and `routes.rs` for the endpoints.
//
// Usage:
//   tunesmith [OPTIONS]
//     --config <FILE>       JSON config file (fields optional)
//     --bind <ADDR>         Listen address (default: 127.0.0.1)
//     --port <PORT>         Listen port (default: 5000)
//     --output-dir <DIR>    Artifact directory (default: static/output)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tunesmith_server::config::ServerConfig;
use tunesmith_server::start_server;

#[derive(Parser, Debug)]
#[command(name = "tunesmith", about = "Serve the melody generator over HTTP")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, tunesmith_server::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Args::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (handle, addr) = match start_server(config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("tunesmith listening on http://{addr}");
    println!("Press Ctrl+C to stop.");
    handle.wait();
    ExitCode::SUCCESS
}
