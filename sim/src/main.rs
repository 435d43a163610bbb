// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Command line utility for exercising the Ledger keyring against a simulated device

use std::{io::Write, path::Path, time::Duration};

use clap::Parser;
use log::{debug, info, LevelFilter};
use serde::{de::DeserializeOwned, Serialize};

use ledger_keyring::{Keyring, KeyringState, Transaction};
use ledger_keyring_sim::{SimConnector, SimDevice, DEFAULT_MNEMONIC};

/// Simulated Ledger keyring utility
///
/// Keyring state is loaded from and written back to the `--state` file.
#[derive(Clone, PartialEq, Debug, Parser)]
struct Options {
    /// Mnemonic held by the simulated device
    #[clap(long, env = "SIM_MNEMONIC", default_value = DEFAULT_MNEMONIC, hide_env_values = true)]
    mnemonic: String,

    /// Keyring state file (JSON)
    #[clap(long, default_value = "keyring.json")]
    state: String,

    /// Derivation base for new state files
    #[clap(long)]
    hd_path: Option<String>,

    /// Simulated device latency
    #[clap(long, default_value = "0")]
    latency_ms: u64,

    /// Subcommand to execute
    #[clap(subcommand)]
    cmd: Actions,

    /// Enable verbose logging
    #[clap(long, default_value = "info")]
    log_level: LevelFilter,
}

#[derive(Clone, PartialEq, Debug, Parser)]
#[non_exhaustive]
enum Actions {
    /// List held accounts
    Accounts,

    /// Derive and add accounts
    Add {
        /// Number of accounts to add
        #[clap(long, default_value = "1")]
        count: usize,
    },

    /// Sign a legacy transaction
    SignTx {
        /// Signing account
        #[clap(long)]
        account: String,

        /// Unsigned transaction file (JSON)
        #[clap(long)]
        input: String,

        /// Signed transaction output file (JSON)
        #[clap(long)]
        output: String,
    },

    /// Sign a hex encoded personal message
    SignPersonal {
        /// Signing account
        #[clap(long)]
        account: String,

        /// Hex encoded message
        #[clap(long)]
        message: String,
    },

    /// Print the persisted keyring state
    Serialize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Options::parse();

    // Setup logging
    let mut c = simplelog::ConfigBuilder::new();
    c.add_filter_ignore_str("ethers_signers");

    simplelog::SimpleLogger::init(args.log_level, c.build())?;

    // Load or create keyring state
    let state = match Path::new(&args.state).is_file() {
        true => read_input::<KeyringState>(&args.state).await?,
        false => match &args.hd_path {
            Some(p) => KeyringState::with_path(p),
            None => KeyringState::default(),
        },
    };

    debug!("Using keyring state: {:?}", state);

    // Device is connected on first use
    let connector =
        SimConnector::new(&args.mnemonic).with_latency(Duration::from_millis(args.latency_ms));
    let keyring = Keyring::<SimDevice>::lazy(connector, &state);

    execute(&keyring, args.cmd, &mut std::io::stdout()).await?;

    // Persist updated state
    write_output(&args.state, &keyring.serialize()).await?;

    Ok(())
}

/// Execute a command with the provided keyring, writing results to `out`
async fn execute(
    k: &Keyring<SimDevice>,
    cmd: Actions,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    debug!("Executing command: {:?}", cmd);

    match cmd {
        Actions::Accounts => {
            for (i, a) in k.get_accounts().iter().enumerate() {
                writeln!(out, "{}: {}", i, a)?;
            }
        }
        Actions::Add { count } => {
            info!("adding {} accounts", count);

            for a in k.add_accounts(count).await? {
                writeln!(out, "{}", a)?;
            }
        }
        Actions::SignTx {
            account,
            input,
            output,
        } => {
            let tx: Transaction = read_input(&input).await?;

            info!("signing transaction for {} (chain: {})", account, tx.chain_id);

            let signed = k.sign_transaction(&account, &tx).await?;

            debug!("raw: 0x{}", hex::encode(signed.rlp()));

            write_output(&output, &signed).await?;

            writeln!(out, "{:?}", signed.hash())?;
        }
        Actions::SignPersonal { account, message } => {
            info!("signing personal message for {}", account);

            let signature = k.sign_personal_message(&account, &message).await?;

            writeln!(out, "{}", signature)?;
        }
        Actions::Serialize => {
            writeln!(out, "{}", k.serialize().to_json()?)?;
        }
    }

    Ok(())
}

/// Helper to read input files where required
async fn read_input<T: DeserializeOwned>(file_name: &str) -> anyhow::Result<T> {
    debug!("Reading input from '{}'", file_name);

    let s = tokio::fs::read_to_string(file_name).await?;

    // Determine format from file name
    let p = Path::new(file_name);

    // Decode based on input extension
    let v = match p.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&s)?,
        _ => return Err(anyhow::anyhow!("unsupported input file format")),
    };

    Ok(v)
}

/// Helper to write output files
async fn write_output(file_name: &str, value: &impl Serialize) -> anyhow::Result<()> {
    debug!("Writing output to '{}'", file_name);

    // Determine format from file name
    let p = Path::new(file_name);
    match p.extension().and_then(|e| e.to_str()) {
        Some("json") => {
            let s = serde_json::to_string_pretty(value)?;
            tokio::fs::write(p, s).await?;
        }
        _ => return Err(anyhow::anyhow!("unsupported output file format")),
    }

    Ok(())
}
