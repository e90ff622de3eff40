pub mod commands;

use crate::cli::commands::{Commands, WalletAction};
use crate::config::AppConfig;
use crate::transcript::TranscriptStore;
use crate::wallet::{WalletSnapshot, WalletVault};

pub async fn run_cli(command: Commands, config_path: String) {
    let config = AppConfig::load(&config_path).expect("Failed to load config");

    match command {
        Commands::Serve => {
            panic!("Serve command should be intercepted by main.rs to boot actix-web");
        }
        Commands::Log => {
            let store = TranscriptStore::open(&config.transcript.dir).expect("Transcript error");
            match store.read_all() {
                Ok(text) if text.is_empty() => println!("No chat log found."),
                Ok(text) => print!("{text}"),
                Err(e) => eprintln!("Error: {e}"),
            }
        }
        Commands::Wallet { action } => {
            let vault = WalletVault::new(&config.wallet);
            match action {
                WalletAction::Init { balance } => {
                    let snapshot = WalletSnapshot {
                        balance,
                        channels: Vec::new(),
                    };
                    match vault.seal_snapshot(&snapshot) {
                        Ok(()) => println!(
                            "Wallet created at {} with {} sats",
                            config.wallet.path, balance
                        ),
                        Err(e) => eprintln!("Error: {e}"),
                    }
                }
                WalletAction::Show => match vault.open_snapshot() {
                    Ok(snapshot) => {
                        println!("Balance: {} sats", snapshot.balance);
                        if snapshot.channels.is_empty() {
                            println!("No channels.");
                        } else {
                            println!("{:<20} | {}", "Peer", "Capacity (sat)");
                            for channel in snapshot.channels {
                                println!("{:<20} | {}", channel.peer, channel.capacity_sat);
                            }
                        }
                    }
                    Err(e) => eprintln!("Error: {e}"),
                },
            }
        }
    }
}
