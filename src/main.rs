//! Crowdfunding client CLI.
//!
//! Plays the view role: parses a command, hands the intent to the
//! `CampaignClient` and prints the outcome as JSON.
//!
//! ```text
//! crowdfund-client [--config FILE] [--keypair FILE] <command>
//!
//!   address                      derived address of the wallet's campaign
//!   create <NAME> <DESCRIPTION>  create the wallet's campaign
//!   donate <ADDRESS> <LAMPORTS>  donate to a campaign
//!   withdraw <ADDRESS> <LAMPORTS> withdraw from a campaign the wallet administers
//!   list                         list every campaign owned by the program
//!   show <ADDRESS>               show one campaign
//! ```
//!
//! Ctrl-C while a transaction is confirming abandons the wait and prints the
//! `abandoned` outcome; the transaction itself may still land. Ctrl-C at any
//! other time, or a second Ctrl-C, exits with status 130.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crowdfund_client::config::{load_config, ClientConfig};
use crowdfund_client::ledger::{JsonRpcClient, LocalKeypair, Pubkey, SigningAgent};
use crowdfund_client::lifecycle::signals::abandon_on_ctrl_c;
use crowdfund_client::observability::{logging, metrics};
use crowdfund_client::{AbandonSignal, CampaignClient, CampaignError, SubmissionOutcome};

#[derive(Parser)]
#[command(name = "crowdfund-client")]
#[command(about = "Create, fund and withdraw from on-chain crowdfunding campaigns", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keypair file; overrides `wallet.keypair_path`.
    #[arg(short, long)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derived address of this wallet's campaign
    Address,
    /// Create this wallet's campaign
    Create { name: String, description: String },
    /// Donate lamports to a campaign
    Donate { address: String, amount: u64 },
    /// Withdraw lamports from a campaign this wallet administers
    Withdraw { address: String, amount: u64 },
    /// List all campaigns
    List,
    /// Show a single campaign
    Show { address: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    logging::init_logging(&config.observability).map_err(|e| e.to_string())?;
    tracing::info!(
        rpc_url = %config.ledger.rpc_url,
        program_id = %config.program.program_id,
        commitment = config.ledger.commitment.as_str(),
        "crowdfund-client v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let signer = load_signer(&cli, &config)?;
    tracing::info!(wallet = %signer.pubkey(), "Signing agent loaded");

    let transport = Arc::new(JsonRpcClient::new(config.ledger.clone())?);
    let abandon = AbandonSignal::new();
    let _interrupt = abandon_on_ctrl_c(abandon.clone());
    let client = CampaignClient::from_config(&config, transport, Arc::new(signer), abandon)?;

    match cli.command {
        Commands::Address => {
            let address = client.campaign_address()?;
            print_json(&serde_json::json!({
                "wallet": client.requester(),
                "campaign": address,
            }))?;
            Ok(true)
        }
        Commands::Create { name, description } => {
            let outcome = client.create_campaign(&name, &description).await;
            report(outcome)
        }
        Commands::Donate { address, amount } => {
            let address = parse_address(&address)?;
            let outcome = client.donate(address, amount).await;
            report(outcome)
        }
        Commands::Withdraw { address, amount } => {
            let address = parse_address(&address)?;
            let outcome = client.withdraw(address, amount).await;
            report(outcome)
        }
        Commands::List => {
            let campaigns = client.list_campaigns().await?;
            let skipped = client.repository().last_decode_errors();
            print_json(&serde_json::json!({
                "campaigns": campaigns,
                "decode_errors": skipped,
            }))?;
            Ok(true)
        }
        Commands::Show { address } => {
            let address = parse_address(&address)?;
            client.list_campaigns().await?;
            let campaign = client.campaign(&address)?;
            print_json(&campaign)?;
            Ok(true)
        }
    }
}

fn load_signer(cli: &Cli, config: &ClientConfig) -> Result<LocalKeypair, Box<dyn std::error::Error>> {
    let path = cli
        .keypair
        .clone()
        .or_else(|| config.wallet.keypair_path.as_ref().map(PathBuf::from));
    let keypair = match path {
        Some(path) => LocalKeypair::from_file(Path::new(&path))?,
        None => LocalKeypair::from_env()?,
    };
    Ok(keypair)
}

fn parse_address(raw: &str) -> Result<Pubkey, CampaignError> {
    Pubkey::from_str(raw).map_err(|e| CampaignError::InvalidInstruction(format!("bad campaign address: {}", e)))
}

/// Print a submission result. Local precondition failures are printed the
/// same way as node outcomes so the caller sees one shape.
fn report(result: Result<SubmissionOutcome, CampaignError>) -> Result<bool, Box<dyn std::error::Error>> {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(cause) => SubmissionOutcome::Rejected { cause, attempts: 0 },
    };
    print_json(&outcome)?;
    Ok(outcome.is_confirmed())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
