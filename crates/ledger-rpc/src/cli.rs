use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ledger-rpc: send JSON-RPC calls and batches to a ledger node.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// JSON-RPC endpoint URL.
    #[arg(
        long,
        default_value = "https://api.mainnet-beta.solana.com",
        env = "LEDGER_RPC_URL"
    )]
    pub rpc_url: String,

    /// RPC username (optional; not needed for token-in-URL providers).
    #[arg(long, env = "LEDGER_RPC_USER")]
    pub rpc_user: Option<String>,

    /// RPC password (optional; not needed for token-in-URL providers).
    #[arg(long, env = "LEDGER_RPC_PASS")]
    pub rpc_pass: Option<String>,

    /// File holding `username:password`, used when user/pass are not given.
    #[arg(long, env = "LEDGER_RPC_COOKIE_FILE")]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Maximum outbound HTTP requests per second. A batch counts as one.
    #[arg(long, env = "LEDGER_RPC_REQUESTS_PER_SECOND")]
    pub rpc_requests_per_second: Option<u32>,

    /// TCP connect timeout in seconds.
    #[arg(long, default_value = "10")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds.
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Split batches into payloads of at most this many calls.
    #[arg(long)]
    pub batch_chunk_size: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Call a single method and print its result.
    Call {
        /// Method name, e.g. `getBlockHeight`.
        method: String,

        /// Positional params, each parsed as JSON (bare words become strings).
        params: Vec<String>,
    },

    /// Send several calls in one payload and print one outcome per call.
    Batch {
        /// JSON array of `[method, [params...]]` pairs, or `@path` to read it
        /// from a file.
        calls: String,
    },
}
