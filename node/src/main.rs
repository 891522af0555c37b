use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use nexus_execution::Memory;
use nexus_node::{replay, Config};
use tracing::info;

fn main() {
    if let Err(err) = main_result() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn main_result() -> Result<()> {
    // Parse arguments
    let matches = Command::new("nexus-replay")
        .about("Replay signed Nexus transactions against an in-memory state.")
        .arg(Arg::new("config").long("config").required(true))
        .arg(Arg::new("transactions").long("transactions").required(true))
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Execute the transactions without applying their changes")
                .action(ArgAction::SetTrue),
        )
        .get_matches();
    let dry_run = matches.get_flag("dry-run");

    // Load config
    let config_file = matches
        .get_one::<String>("config")
        .context("missing --config")?;
    let config_file = std::fs::read_to_string(config_file)
        .with_context(|| format!("Could not read config file {config_file}"))?;
    let config: Config =
        serde_yaml::from_str(&config_file).context("Could not parse config file")?;
    let config = config.validate().context("Invalid config")?;

    // Configure logging
    let subscriber = tracing_subscriber::fmt().with_max_level(config.log_level);
    if config.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    info!(
        network = ?config.engine.network,
        client_mode = config.engine.client_mode,
        genesis_registers = config.genesis_registers.len(),
        "loaded config file"
    );

    // Seed state
    let mut state = Memory::default();
    replay::seed(&mut state, &config.genesis_registers)?;

    // Load transactions
    let transactions_file = matches
        .get_one::<String>("transactions")
        .context("missing --transactions")?;
    let input = std::fs::read_to_string(transactions_file)
        .with_context(|| format!("Could not read transactions file {transactions_file}"))?;
    let transactions = replay::decode_transactions(&input, config.max_transactions)?;
    info!(transactions = transactions.len(), "loaded transactions");

    let summary = replay::replay(&mut state, config.engine, transactions, dry_run)?;
    info!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        dropped = summary.dropped,
        cost = summary.cost,
        entries = state.len(),
        "replay complete"
    );
    Ok(())
}
