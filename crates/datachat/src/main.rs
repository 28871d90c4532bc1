//! DataChat - ask natural-language questions against your data connections.

mod chat;
mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConnectionCommand, CreateArgs};
use datachat_core::logging::{init_logging, LogConfig};
use datachat_core::services::registry::fetch_all;
use datachat_core::{
    ChatConsole, ClientConfig, ConnectionAdmin, ConnectionDraft, ConnectionFilter, DataChatError,
    DatabaseType, HttpBackend, Notice, Result,
};
use std::process::ExitCode;
use std::sync::Arc;

/// Environment variable carrying the credential for `connection create`.
const ENV_CREDENTIAL: &str = "DATACHAT_CREDENTIAL";

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", Notice::from_error(&e));
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging before anything talks to the backend
    let _logging_guard = init_logging(LogConfig::for_client(&config));

    tracing::info!(backend = %config.backend_url, "Starting DataChat");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create tokio runtime");
            eprintln!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::warn!(error = %e, category = e.category(), "Command failed");
            eprintln!("{}", Notice::from_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ClientConfig::load_from(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => ClientConfig::load()?,
    };
    if let Some(url) = &cli.backend {
        config.backend_url = url.trim().to_string();
    }
    config.validate()?;
    Ok(config)
}

async fn run(command: Commands, config: ClientConfig) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(config)?);

    match command {
        Commands::Connections { all, name } => {
            let mut filter = ConnectionFilter::default();
            if let Some(name) = name {
                filter = filter.name(name);
            }
            if !all {
                filter.enabled = Some(true);
            }
            let page_size = backend.config().page_size;
            let connections = fetch_all(backend.as_ref(), &filter, page_size).await?;
            // The backend may ignore the enabled filter.
            let connections: Vec<_> =
                connections.into_iter().filter(|c| all || c.enabled).collect();
            chat::print_connections(&connections);
            Ok(())
        }
        Commands::Connection(command) => manage_connection(backend.as_ref(), command).await,
        Commands::Ask { connection, query } => {
            let mut console = open_console(backend, connection).await?;
            let result = chat::ask(&mut console, &query.join(" ")).await;
            console.teardown();
            result
        }
        Commands::Chat { connection } => {
            let mut console = open_console(backend, connection).await?;
            chat::run_repl(&mut console).await
        }
    }
}

async fn open_console(backend: Arc<HttpBackend>, connection: Option<i64>) -> Result<ChatConsole> {
    let mut console = ChatConsole::with_backend(backend);
    console.load_connections().await;
    chat::print_notices(&mut console);
    if let Some(id) = connection {
        console.select_connection(id)?;
    }
    Ok(console)
}

async fn manage_connection(admin: &dyn ConnectionAdmin, command: ConnectionCommand) -> Result<()> {
    match command {
        ConnectionCommand::Create(args) => {
            let draft = draft_from_args(args)?;
            let created = admin.create_connection(&draft).await?;
            eprintln!("{}", Notice::success(format!("Created connection {}", created.id)));
            chat::print_connections(&[created]);
        }
        ConnectionCommand::Update { id, args } => {
            let draft = draft_from_args(args)?;
            let updated = admin.update_connection(id, &draft).await?;
            eprintln!("{}", Notice::success(format!("Updated connection {}", updated.id)));
            chat::print_connections(&[updated]);
        }
        ConnectionCommand::Enable { id } => {
            let updated = admin.set_enabled(id, true).await?;
            eprintln!("{}", Notice::success(format!("Enabled connection {}", updated.id)));
        }
        ConnectionCommand::Disable { id } => {
            let updated = admin.set_enabled(id, false).await?;
            eprintln!("{}", Notice::success(format!("Disabled connection {}", updated.id)));
        }
        ConnectionCommand::Delete { ids } => {
            admin.delete_connections(&ids).await?;
            eprintln!("{}", Notice::success(format!("Deleted {} connection(s)", ids.len())));
        }
    }
    Ok(())
}

fn draft_from_args(args: CreateArgs) -> Result<ConnectionDraft> {
    let db_type = DatabaseType::parse(&args.db_type).ok_or_else(|| {
        DataChatError::validation(format!(
            "Unknown database type '{}'; expected one of: {}",
            args.db_type,
            DatabaseType::ALL.map(|t| t.as_str()).join(", ")
        ))
    })?;

    let mut draft = ConnectionDraft::new(args.name, db_type, args.host, args.database)
        .with_username(args.user)
        .with_enabled(!args.disabled);
    if let Some(port) = args.port {
        draft = draft.with_port(port);
    }
    if let Some(description) = args.description {
        draft = draft.with_description(description);
    }
    if let Ok(credential) = std::env::var(ENV_CREDENTIAL) {
        draft = draft.with_credential(credential);
    }
    Ok(draft)
}
