use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_PER_PAGE: u32 = 10;

/// Internship placement sidecar. Speaks line-delimited JSON on stdin/stdout.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Workspace directory to open at startup
    #[arg(long, env = "PKLD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Pin "today" (YYYY-MM-DD) instead of reading the system clock
    #[arg(long, env = "PKLD_TODAY")]
    pub today: Option<NaiveDate>,

    /// Default number of placements per list page
    #[arg(long, env = "PKLD_PER_PAGE", default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,

    /// Email of the authenticated user to start the session with
    #[arg(long, env = "PKLD_USER_EMAIL")]
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    fixed: Option<NaiveDate>,
}

impl Clock {
    pub fn system() -> Self {
        Self { fixed: None }
    }

    pub fn fixed(today: NaiveDate) -> Self {
        Self { fixed: Some(today) }
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed.unwrap_or_else(|| Local::now().date_naive())
    }
}

impl Config {
    pub fn clock(&self) -> Clock {
        match self.today {
            Some(d) => Clock::fixed(d),
            None => Clock::system(),
        }
    }
}
