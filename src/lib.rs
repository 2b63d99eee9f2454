//! Resilient session controller for a long-running conversational agent.
//!
//! The agent drives a stateful backend one turn at a time, persisting the
//! session identity across restarts and recovering from stalled streams and
//! context overflows with a bounded compact-then-restart ladder. Every
//! side-effecting tool request passes through a policy gate before it runs.

pub mod actions;
pub mod config;
pub mod controller;
pub mod images;
pub mod logging;
pub mod policy;
pub mod prompts;
pub mod supervisor;
pub mod turn;

pub use actions::{ActionProvider, ActionRegistry};
pub use config::{AgentConfig, BackendKind};
pub use controller::{SessionController, TurnError};
pub use images::ImageFetcher;
pub use policy::PolicyGate;
pub use supervisor::{Supervisor, SupervisorOptions};
pub use turn::{TurnExecutor, TurnOutcome, OVERFLOW_MARKER};
