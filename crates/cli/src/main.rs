mod cli;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use linewire_context::ContextStore;
use linewire_core::Settings;
use linewire_delegate::DelegateInvoker;
use linewire_methods::assistant::{self, AssistantContext};
use linewire_methods::database::{self, ConnectionDescriptor, Database};
use linewire_methods::echo;
use linewire_rpc::{MethodRegistry, RpcServer, StdioTransport, StopReason};
use tracing::{info, warn};

use crate::cli::{CliArgs, Profile};

#[tokio::main]
async fn main() -> Result<()> {
    linewire_core::load_dotenv();
    let args = CliArgs::parse();

    // Logs go to stderr; stdout carries only protocol lines.
    let filter = match args.log_level.as_deref() {
        Some(level) => tracing_subscriber::EnvFilter::try_new(level)
            .with_context(|| format!("invalid --log-level '{level}'"))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut settings =
        Settings::load(args.config.as_deref()).context("failed to load configuration")?;
    apply_profile_overrides(&mut settings, &args.profile);
    settings.validate().context("invalid configuration")?;
    settings.log_summary();

    let registry = build_registry(&args.profile, &settings)?;
    info!(
        profile = args.profile.name(),
        methods = registry.len(),
        pid = std::process::id(),
        "Ready for JSON-RPC requests on stdin"
    );

    let mut server = RpcServer::new(Arc::new(registry))
        .with_name(settings.server.name.clone())
        .with_echo_marker(settings.server.echo_marker.clone());
    let mut transport = StdioTransport::stdio();
    let summary = server
        .run_until(&mut transport, shutdown_signal())
        .await
        .context("stdio transport failed")?;

    info!(reason = ?summary.reason, "Server stopped");
    if summary.reason == StopReason::Interrupted {
        // A pending stdin read cannot be cancelled and keeps the runtime
        // alive. Responses are already flushed.
        std::process::exit(0);
    }
    Ok(())
}

/// Command-line flags win over file and environment settings.
fn apply_profile_overrides(settings: &mut Settings, profile: &Profile) {
    if let Profile::Assistant {
        context_dir,
        delegate,
        timeout_secs,
    } = profile
    {
        if let Some(dir) = context_dir {
            settings.context.dir = dir.clone();
        }
        if let Some(program) = delegate {
            settings.delegate.program = program.clone();
        }
        if let Some(secs) = timeout_secs {
            settings.delegate.timeout_secs = *secs;
        }
    }
}

fn build_registry(profile: &Profile, settings: &Settings) -> Result<MethodRegistry> {
    let registry = match profile {
        Profile::Echo { connection } => {
            info!(connection_supplied = connection.is_some(), "Starting echo responder");
            echo::registry(&settings.server.name)?
        }
        Profile::Sqlite { connection } => {
            let descriptor = ConnectionDescriptor::parse(connection)?;
            info!(
                database = %descriptor.path.display(),
                options = ?descriptor.option_keys(),
                "Starting SQLite responder"
            );
            let db = Database::open(&descriptor)
                .with_context(|| format!("failed to open {}", descriptor.path.display()))?;
            database::registry(db)?
        }
        Profile::Assistant { .. } => {
            let store = ContextStore::open(&settings.context.dir)
                .context("failed to open context store")?;
            let invoker = DelegateInvoker::new(&settings.delegate);
            info!(
                context_dir = %settings.context.dir.display(),
                delegate = %invoker.program(),
                "Starting assistant responder"
            );
            assistant::registry(AssistantContext::new(store, invoker), &settings.server.name)?
        }
    };
    Ok(registry)
}

/// Resolves on Ctrl-C. If the handler cannot be installed the server keeps
/// running until end of input.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}
