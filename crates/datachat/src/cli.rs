//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "datachat")]
#[command(version)]
#[command(about = "Ask natural-language questions against your data connections", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL, overrides the config file
    #[arg(long, global = true)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List connections (enabled only unless --all)
    Connections {
        /// Include disabled connections
        #[arg(long)]
        all: bool,
        /// Only names containing this text
        #[arg(long)]
        name: Option<String>,
    },
    /// Manage a connection
    #[command(subcommand)]
    Connection(ConnectionCommand),
    /// Ask one question and stream the answer
    Ask {
        /// Connection id (defaults to the first enabled one)
        #[arg(long, short)]
        connection: Option<i64>,
        /// The question
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Interactive chat
    Chat {
        /// Connection id (defaults to the first enabled one)
        #[arg(long, short)]
        connection: Option<i64>,
    },
}

#[derive(Subcommand)]
pub enum ConnectionCommand {
    /// Create a connection; the credential is read from DATACHAT_CREDENTIAL
    Create(CreateArgs),
    /// Replace a connection's settings; the credential is read as for create
    Update {
        id: i64,
        #[command(flatten)]
        args: CreateArgs,
    },
    /// Enable a connection
    Enable { id: i64 },
    /// Disable a connection
    Disable { id: i64 },
    /// Delete one or more connections
    Delete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,
    /// mysql, postgresql, sqlite, clickhouse or snowflake
    #[arg(long = "type")]
    pub db_type: String,
    /// Hostname, or the file path for sqlite
    #[arg(long)]
    pub host: String,
    /// Defaults to the type's usual port
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, default_value = "")]
    pub user: String,
    #[arg(long)]
    pub database: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Create it disabled
    #[arg(long)]
    pub disabled: bool,
}
