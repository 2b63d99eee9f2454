//! Top-level loop: initialize once, then run idle turns forever with a
//! fixed pause, until a shutdown request arrives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::controller::{SessionController, TurnError};

/// Prompts and pacing for the supervisor loop.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub init_prompt: String,
    pub idle_prompt: String,
    pub iteration_delay: Duration,
}

/// Drives the controller until cancellation.
pub struct Supervisor {
    controller: SessionController,
    options: SupervisorOptions,
    shutdown: CancellationToken,
}

impl Supervisor {
    #[must_use]
    pub fn new(
        controller: SessionController,
        options: SupervisorOptions,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            controller,
            options,
            shutdown,
        }
    }

    /// Runs until the shutdown token fires. Only the initialization turn is
    /// allowed to end the loop with an error; steady-state iteration
    /// failures are logged and the loop continues.
    pub async fn run(mut self) -> Result<(), TurnError> {
        if !self.controller.has_session() {
            info!("fresh start; running initialization turn");
            let init_prompt = self.options.init_prompt.clone();
            if let Err(error) = self.run_cancellable(&init_prompt).await {
                self.controller.shutdown().await;
                return Err(error);
            }
        }

        let idle_prompt = self.options.idle_prompt.clone();
        let mut iteration: u64 = 0;
        while !self.shutdown.is_cancelled() {
            iteration += 1;
            info!(iteration, "running idle turn");
            if let Err(error) = self.run_cancellable(&idle_prompt).await {
                error!(iteration, %error, "iteration failed; continuing");
            }
            if self.shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(self.options.iteration_delay) => {}
            }
        }

        info!("shutting down");
        self.controller.shutdown().await;
        Ok(())
    }

    /// Runs one turn, abandoning it promptly if shutdown is requested. The
    /// dropped turn's connection is interrupted in the final teardown.
    async fn run_cancellable(&mut self, prompt: &str) -> Result<(), TurnError> {
        tokio::select! {
            () = self.shutdown.cancelled() => Ok(()),
            result = self.controller.run_turn(prompt) => result,
        }
    }
}
