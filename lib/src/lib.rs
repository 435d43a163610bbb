// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Ledger Ethereum keyring
//!
//! Exposes a fixed set of accounts derived from a single hardware
//! signing device as if they were locally held keys, private key
//! material never leaves the device.
//!
//! Device access is serialised per keyring ([SessionLock]), the attached
//! device is checked against the stored index-0 account before each
//! operation, and every signature is recovered and compared with the
//! requested account before it is returned.

/// Device collaborator interface
pub mod device;
pub use device::{Device, WireSignature};

/// Transport acquisition for lazily connected devices
pub mod transport;
pub use transport::Connect;

mod error;
pub use error::{DeviceError, Error};

pub mod path;
pub use path::DerivationPath;

pub mod store;
pub use store::{AccountStore, KeyringState};

mod lock;
pub use lock::{SessionGuard, SessionLock};

mod derive;
pub use derive::AddressDeriver;

mod identity;
pub use identity::verify_attached_device;

pub mod signature;
pub use signature::DeviceSignature;

pub mod tx;
pub use tx::{SignedTransaction, Transaction};

mod keyring;
pub use keyring::{Keyring, Operation};

/// Re-export `ethers-core` for consumers
pub use ethers_core;
