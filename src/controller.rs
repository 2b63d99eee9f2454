//! Session lifecycle: connect, run turns, and recover from overflow and
//! stalls without ever looping unboundedly.
//!
//! The recovery ladder for one logical turn is fixed: at most one
//! compaction attempt and at most one session restart. Whatever the final
//! attempt produces is the turn's result.

use std::sync::Arc;
use std::time::Duration;

use agent_backend::{Backend, BackendConnection, QueryError, SessionId};
use session_store::{SessionStore, SessionStoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::actions::ActionRegistry;
use crate::policy::PolicyGate;
use crate::prompts::COMPACT_PROMPT;
use crate::turn::{TurnExecutor, TurnOutcome};

/// Errors surfaced from one logical turn, recovery included.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("failed to persist session identity: {0}")]
    Persist(#[from] SessionStoreError),
}

/// Owns the backend connection, the persisted session identity, and the
/// policy machinery a turn needs.
pub struct SessionController {
    backend: Arc<dyn Backend>,
    store: SessionStore,
    gate: PolicyGate,
    actions: ActionRegistry,
    idle_deadline: Duration,
    session_id: Option<SessionId>,
    connection: Option<Box<dyn BackendConnection>>,
}

impl SessionController {
    /// Loads any persisted session identity and prepares a controller. No
    /// connection is made until the first turn runs.
    pub fn new(
        backend: Arc<dyn Backend>,
        store: SessionStore,
        gate: PolicyGate,
        actions: ActionRegistry,
        idle_deadline: Duration,
    ) -> Result<Self, SessionStoreError> {
        let session_id = store.load()?;
        match &session_id {
            Some(id) => info!(session = %id, "resuming persisted session"),
            None => info!("no persisted session found"),
        }

        Ok(Self {
            backend,
            store,
            gate,
            actions,
            idle_deadline,
            session_id,
            connection: None,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    /// Runs one logical turn, applying the overflow recovery ladder.
    ///
    /// On overflow the controller compacts and retries the prompt once. If
    /// compaction itself fails, it restarts the session from scratch and
    /// retries once more. A prompt that still overflows after the last
    /// permitted attempt is accepted as-is; the overflow will resurface on
    /// the next turn against a compacted or fresh session.
    pub async fn run_turn(&mut self, prompt: &str) -> Result<(), TurnError> {
        let mut compacted = false;
        let mut restarted = false;

        loop {
            let outcome = match self.execute_once(prompt).await {
                Ok(outcome) => outcome,
                Err(error) if error.is_stalled() => {
                    warn!(%error, "turn stalled; tearing down the connection");
                    self.abort_connection().await;
                    return Err(error.into());
                }
                Err(error) => {
                    error!(%error, "turn failed");
                    return Err(error.into());
                }
            };
            self.persist_outcome(&outcome)?;

            if !outcome.overflow {
                return Ok(());
            }
            if compacted || restarted {
                info!("overflow persists after recovery; deferring to the next turn");
                return Ok(());
            }

            compacted = true;
            match self.compact().await {
                Ok(()) => {
                    info!("compaction succeeded; retrying the prompt");
                }
                Err(error) => {
                    warn!(%error, "compaction failed; restarting the session");
                    self.restart().await?;
                    restarted = true;
                }
            }
        }
    }

    /// Interrupts and closes any live connection. Called on shutdown.
    pub async fn shutdown(&mut self) {
        self.abort_connection().await;
    }

    async fn execute_once(&mut self, prompt: &str) -> Result<TurnOutcome, QueryError> {
        if self.connection.is_none() {
            let resume = self.session_id.as_deref();
            debug!(resume = resume.is_some(), "opening backend connection");
            self.connection = Some(self.backend.connect(resume).await?);
        }
        let connection = self
            .connection
            .as_deref_mut()
            .ok_or_else(|| QueryError::connect("connection unavailable"))?;

        let executor = TurnExecutor::new(&self.gate, &self.actions, self.idle_deadline);
        executor.execute(connection, prompt).await
    }

    async fn compact(&mut self) -> Result<(), TurnError> {
        let outcome = self.execute_once(COMPACT_PROMPT).await?;
        if outcome.session_id.is_none() {
            return Err(QueryError::backend("compaction produced no terminal result").into());
        }
        self.persist_outcome(&outcome)?;
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), TurnError> {
        info!("starting a fresh session");
        // Clear the persisted identity before reconnecting so a crash
        // mid-restart cannot resume the overflowed session.
        self.store.clear()?;
        self.session_id = None;
        self.abort_connection().await;
        self.connection = Some(self.backend.connect(None).await?);
        Ok(())
    }

    fn persist_outcome(&mut self, outcome: &TurnOutcome) -> Result<(), TurnError> {
        let Some(session_id) = &outcome.session_id else {
            return Ok(());
        };

        if let Err(source) = self.store.save(session_id) {
            error!(%source, "failed to persist session identity; resume state may be stale");
            return Err(source.into());
        }
        self.session_id = Some(session_id.clone());
        Ok(())
    }

    async fn abort_connection(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        if let Err(error) = connection.interrupt().await {
            debug!(%error, "interrupt failed during teardown");
        }
        if let Err(error) = connection.close().await {
            debug!(%error, "close failed during teardown");
        }
    }
}
