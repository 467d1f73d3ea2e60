//! Transaction gateway operator CLI.
//!
//! ```text
//!   tx-gateway [--config FILE] build <chain> <to> <amount> [--token ADDR]
//!   tx-gateway [--config FILE] broadcast <chain> <signed-tx-hex>
//!   tx-gateway [--config FILE] chains [--all]
//!   tx-gateway [--config FILE] provider
//! ```
//!
//! Every command prints a JSON document on stdout. Logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use tx_gateway::config::load_config;
use tx_gateway::observability::{logging, metrics};
use tx_gateway::payments::{Amount, PaymentGateway, PaymentRequest};

#[derive(Parser)]
#[command(name = "tx-gateway")]
#[command(about = "Build and relay multi-chain payment transactions", long_about = None)]
struct Cli {
    /// TOML config file; defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an unsigned transfer
    Build {
        chain: String,
        to: String,
        amount: String,
        /// ERC-20 contract for token transfers
        #[arg(long)]
        token: Option<String>,
        /// Token decimals, when known
        #[arg(long)]
        token_decimals: Option<u8>,
        /// Sender address (defaults to the configured one)
        #[arg(long)]
        from: Option<String>,
        /// Mark the result as a preview
        #[arg(long)]
        preview: bool,
    },
    /// Broadcast a signed transaction and wait for its receipt
    Broadcast { chain: String, signed_tx: String },
    /// List chains
    Chains {
        /// Include chains without an RPC endpoint
        #[arg(long)]
        all: bool,
    },
    /// Show provider information
    Provider,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = PaymentGateway::from_config(&config)?;

    let success = match cli.command {
        Commands::Build {
            chain,
            to,
            amount,
            token,
            token_decimals,
            from,
            preview,
        } => {
            let request = PaymentRequest {
                chain,
                to,
                amount: Amount::Text(amount),
                token_address: token,
                token_decimals,
                from,
            };
            let response = if preview {
                gateway.build_payment_preview(request).await
            } else {
                gateway.build_payment(request).await
            };
            print_json(&response)?;
            response.success
        }
        Commands::Broadcast { chain, signed_tx } => {
            let response = gateway.broadcast_signed_transaction(&chain, &signed_tx).await;
            print_json(&response)?;
            response.success
        }
        Commands::Chains { all } => {
            let chains: Vec<_> = if all {
                gateway.registry().all().cloned().collect()
            } else {
                gateway.supported_chains()
            };
            print_json(&chains)?;
            true
        }
        Commands::Provider => {
            print_json(&gateway.provider_info())?;
            true
        }
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
