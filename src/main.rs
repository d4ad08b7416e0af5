mod config;
mod db;
mod error;
mod ipc;
mod manager;
mod model;
mod rules;

use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn setup_tracing() {
    // Stdout belongs to the protocol.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn initial_state(cfg: &config::Config) -> ipc::AppState {
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        clock: cfg.clock(),
        session: manager::PlacementManager::new(cfg.per_page),
    };

    if let Some(path) = &cfg.workspace {
        match db::open_db(path) {
            Ok(conn) => {
                info!(workspace = %path.display(), "workspace opened");
                state.workspace = Some(path.clone());
                state.db = Some(conn);
            }
            Err(e) => error!(workspace = %path.display(), error = ?e, "failed to open workspace"),
        }
    }

    if let (Some(email), Some(conn)) = (&cfg.user_email, state.db.as_ref()) {
        if let Err(e) = state.session.initialize(conn, email) {
            warn!(error = %e, "session init at startup failed");
        }
    }

    state
}

fn main() {
    let cfg = config::Config::parse();
    setup_tracing();
    info!(today = %cfg.clock().today(), per_page = cfg.per_page, "pkld starting");

    let mut state = initial_state(&cfg);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                let resp = ipc::err("", "bad_json", e.to_string(), None);
                if let Err(e) = write_line(&mut stdout, &resp.to_string()) {
                    warn!(error = %e, "stdout closed, shutting down");
                    break;
                }
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let line = serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string());
        if let Err(e) = write_line(&mut stdout, &line) {
            warn!(error = %e, "stdout closed, shutting down");
            break;
        }
    }
}

fn write_line(out: &mut impl Write, line: &str) -> io::Result<()> {
    writeln!(out, "{}", line)?;
    out.flush()
}
