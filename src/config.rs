//! Runtime configuration, sourced from the environment with builder-style
//! overrides for tests.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_BACKEND_PROGRAM: &str = "claude";
const DEFAULT_ITERATION_DELAY: Duration = Duration::from_secs(3);
const DEFAULT_IDLE_EVENT_DEADLINE: Duration = Duration::from_secs(180);

/// Which backend implementation to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Spawn the backend CLI subprocess.
    Cli { program: String },
    /// In-process scripted backend, for local smoke runs.
    Mock,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Workspace directory; doubles as the tool sandbox root.
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    /// Pause between idle turns.
    pub iteration_delay: Duration,
    /// Maximum silence between stream events before a turn counts as stalled.
    pub idle_event_deadline: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            backend: BackendKind::Cli {
                program: DEFAULT_BACKEND_PROGRAM.to_string(),
            },
            iteration_delay: DEFAULT_ITERATION_DELAY,
            idle_event_deadline: DEFAULT_IDLE_EVENT_DEADLINE,
        }
    }
}

impl AgentConfig {
    /// Reads configuration from `HANGOUT_*` environment variables, falling
    /// back to defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(data_dir) = env::var("HANGOUT_DATA_DIR") {
            if !data_dir.trim().is_empty() {
                config.data_dir = PathBuf::from(data_dir);
            }
        }
        match env::var("HANGOUT_BACKEND").as_deref() {
            Ok("mock") => config.backend = BackendKind::Mock,
            Ok(program) if !program.trim().is_empty() => {
                config.backend = BackendKind::Cli {
                    program: program.to_string(),
                };
            }
            _ => {}
        }
        if let Some(delay) = duration_from_env("HANGOUT_ITERATION_DELAY_SECS") {
            config.iteration_delay = delay;
        }
        if let Some(deadline) = duration_from_env("HANGOUT_IDLE_TIMEOUT_SECS") {
            config.idle_event_deadline = deadline;
        }

        config
    }

    /// File holding the persisted session identifier.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("session_id")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("agent.log")
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_iteration_delay(mut self, delay: Duration) -> Self {
        self.iteration_delay = delay;
        self
    }

    pub fn with_idle_event_deadline(mut self, deadline: Duration) -> Self {
        self.idle_event_deadline = deadline;
        self
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn duration_from_env(name: &str) -> Option<Duration> {
    parse_seconds(&env::var(name).ok()?)
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    match raw.trim().parse::<f64>() {
        // `inf` parses as a positive f64 but would panic in
        // `Duration::from_secs_f64`; treat it like any other bad value.
        Ok(seconds) if seconds.is_finite() && seconds > 0.0 => {
            Duration::try_from_secs_f64(seconds).ok()
        }
        _ => None,
    }
}
