use std::error::Error;
use std::sync::Arc;

use agent_backend::Backend;
use agent_backend_cli::{CliBackend, CliBackendConfig};
use agent_backend_mock::{ScriptedBackend, ScriptedTurn};
use hangout_agent::{
    prompts, ActionRegistry, AgentConfig, BackendKind, ImageFetcher, PolicyGate,
    SessionController, Supervisor, SupervisorOptions,
};
use session_store::SessionStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let config = AgentConfig::from_env();

    std::fs::create_dir_all(config.data_dir())?;
    hangout_agent::logging::init(&config.log_file())?;
    info!(data_dir = %config.data_dir().display(), "starting hangout agent");

    let store = SessionStore::new(config.session_file());
    let gate = PolicyGate::new(config.data_dir())?;
    let mut actions = ActionRegistry::new();
    actions.register(Box::new(ImageFetcher::new()?));

    let backend = backend_from_config(&config);
    let controller = SessionController::new(
        backend,
        store,
        gate,
        actions,
        config.idle_event_deadline,
    )?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let options = SupervisorOptions {
        init_prompt: prompts::INIT_PROMPT.to_string(),
        idle_prompt: prompts::IDLE_PROMPT.to_string(),
        iteration_delay: config.iteration_delay,
    };
    Supervisor::new(controller, options, shutdown).run().await?;
    info!("goodbye");
    Ok(())
}

fn backend_from_config(config: &AgentConfig) -> Arc<dyn Backend> {
    match &config.backend {
        BackendKind::Mock => Arc::new(ScriptedBackend::new(vec![
            ScriptedTurn::new()
                .text("hello from the mock backend")
                .result("mock-session-1"),
            ScriptedTurn::new().text("still here").result("mock-session-1"),
            ScriptedTurn::new().text("signing off").result("mock-session-1"),
        ])),
        BackendKind::Cli { program } => {
            let cli_config = CliBackendConfig::new(program.as_str())
                .with_system_prompt(prompts::SYSTEM_PROMPT)
                .with_allowed_tools(
                    ["Read", "Write", "Glob", "Bash", "WebFetch", "WebSearch"]
                        .map(str::to_string),
                )
                .with_cwd(config.data_dir());
            Arc::new(CliBackend::new(cli_config))
        }
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    wait_for_signal().await;
    info!("shutdown signal received");
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(source) => {
            error!(%source, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
