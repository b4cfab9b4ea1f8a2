use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Line-delimited JSON-RPC server over stdin/stdout.
///
/// Reads one request per line, writes one response per line, and logs to
/// stderr. Exits 0 at end of input or on Ctrl-C.
#[derive(Parser, Debug)]
#[command(name = "linewire", version, about = "Line-delimited JSON-RPC server over stdio")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/linewire/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "linewire_rpc=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub profile: Profile,
}

#[derive(Subcommand, Debug)]
pub enum Profile {
    /// Acknowledge `query` and any other method
    Echo {
        /// Connection string supplied by the launcher (never echoed)
        connection: Option<String>,
    },

    /// Serve database/query, database/execute and database/schema
    Sqlite {
        /// sqlite:///<path>[?key=value&...]
        connection: String,
    },

    /// Serve the delegate and context methods, plain and as MCP tools
    Assistant {
        /// Context store directory
        #[arg(long)]
        context_dir: Option<PathBuf>,

        /// Delegate executable looked up on PATH
        #[arg(long)]
        delegate: Option<String>,

        /// Delegate timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Echo { .. } => "echo",
            Profile::Sqlite { .. } => "sqlite",
            Profile::Assistant { .. } => "assistant",
        }
    }
}
