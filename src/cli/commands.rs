use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "loopgate", version, about = "Local AI streaming relay server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve,

    /// Print the chat transcript
    Log,

    /// Manage the encrypted wallet blob
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
}

#[derive(Subcommand)]
pub enum WalletAction {
    /// Create a fresh encrypted wallet blob at the configured path
    Init {
        /// Starting balance in sats
        #[arg(short, long, default_value_t = 0)]
        balance: u64,
    },

    /// Decrypt and print the wallet contents
    Show,
}
