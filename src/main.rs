mod backup;
mod error;
mod ipc;
mod marks_file;
mod record;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::store::StudentStore;

/// Student marks sidecar: newline-delimited JSON requests on stdin,
/// one JSON response per line on stdout.
#[derive(Parser, Debug)]
#[command(name = "studentd", version, about = "Student marks record store")]
struct Cli {
    /// Student marks file to open at startup
    #[arg(long, env = "STUDENTD_FILE")]
    file: Option<PathBuf>,

    /// Start with an empty collection when the file does not exist yet
    #[arg(long, env = "STUDENTD_CREATE_IF_MISSING")]
    create_if_missing: bool,

    /// Default log filter; RUST_LOG takes precedence
    #[arg(long, default_value = "studentd=info")]
    log_filter: String,
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries responses; logs must stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn open_initial_store(cli: &Cli) -> Option<StudentStore> {
    let path = cli.file.as_ref()?;
    let opened = if cli.create_if_missing {
        StudentStore::open_or_empty(path)
    } else {
        StudentStore::open(path)
    };
    match opened {
        Ok(store) => Some(store),
        Err(e) => {
            // The client sees `no_store` and can retry with store.open.
            tracing::error!(error = %e, "could not open student file at startup");
            None
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);

    let mut state = ipc::AppState {
        store: open_initial_store(&cli),
    };
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "studentd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "bad request json");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed, exiting");
}
