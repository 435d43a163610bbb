use std::str::FromStr;

use log::LevelFilter;
use simplelog::SimpleLogger;

use ledger_keyring::{ethers_core::types::U256, Device, Keyring, KeyringState, Transaction};
use ledger_keyring_sim::{Probe, SimDevice};

/// Mnemonic held by the simulated device
pub const MNEMONIC: &str = "duck deal pretty pen thunder economy wide common goose fit engine main aisle curtain choose cube claim snake enroll detect brief history float unit";

/// Mnemonic for a different physical device
#[allow(unused)]
pub const OTHER_MNEMONIC: &str = ledger_keyring_sim::DEFAULT_MNEMONIC;

pub const TESTNET_PATH: &str = "m/44'/1'/0'";

/// Address not derivable by either device
#[allow(unused)]
pub const BAD_ACCOUNT: &str = "0x1234567890123456789012345678901234567890";

/// Setup logging, level from `LOG_LEVEL` (defaults to debug)
pub fn setup_logging() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_ignore_str("ethers_signers")
        .build();

    let _ = SimpleLogger::init(log_level, log_cfg);
}

/// Setup a keyring on the testnet path holding `accounts`
pub fn setup(accounts: &[&str]) -> (Keyring<SimDevice>, Probe) {
    setup_with(SimDevice::new(MNEMONIC), accounts)
}

/// Setup a keyring around the provided device
#[allow(unused)]
pub fn setup_with(device: SimDevice, accounts: &[&str]) -> (Keyring<SimDevice>, Probe) {
    setup_logging();

    let probe = device.probe();
    let state = KeyringState {
        hd_path: TESTNET_PATH.to_string(),
        accounts: accounts.iter().map(|a| a.to_string()).collect(),
    };

    let k = Keyring::new(device, &state);

    (k, probe)
}

/// Addresses derived directly from a device holding `mnemonic`
#[allow(unused)]
pub async fn derive_accounts(mnemonic: &str, n: usize) -> Vec<String> {
    let mut d = SimDevice::new(mnemonic);
    let mut accounts = vec![];

    for i in 0..n {
        let a = d
            .get_address(&format!("{TESTNET_PATH}/{i}"))
            .await
            .expect("address derivation failed");
        accounts.push(a);
    }

    accounts
}

/// Ropsten transaction
#[allow(unused)]
pub fn tx_params() -> Transaction {
    Transaction {
        nonce: U256::zero(),
        gas_price: U256::from(0x09184e72a000u64),
        gas_limit: U256::from(0x2710u64),
        to: Some(Default::default()),
        value: U256::zero(),
        data: hex::decode(
            "7f7465737432000000000000000000000000000000000000000000000000000000600057",
        )
        .unwrap()
        .into(),
        chain_id: 3,
    }
}
