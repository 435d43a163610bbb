// Copyright (c) 2022-2023 The MobileCoin Foundation

use crate::Operation;

/// Ledger keyring error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested address is not held by this keyring
    #[error("Unknown address {0}")]
    UnknownAddress(String),

    /// Index-0 address reported by the attached device does not match the stored account
    #[error("Incorrect Ledger device attached - expected device containing account {expected}, but found {actual}")]
    DeviceMismatch { expected: String, actual: String },

    /// Signature recovered to a different address than requested
    #[error("Signature is for {actual} but expected {expected} - is the correct Ledger device attached?")]
    SignatureOwnership { expected: String, actual: String },

    /// Operation not offered by this device class
    #[error("{0} is not supported on this device (private keys never leave the device and the firmware does not expose this signing mode)")]
    Unsupported(Operation),

    /// Failure reported by the device or transport
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// Requested accounts would exceed the non-hardened index range
    #[error("Cannot add {count} accounts from index {start}, beyond the derivation index range")]
    AccountLimit { start: usize, count: usize },

    /// Malformed BIP-32 derivation path
    #[error("Invalid derivation path '{0}'")]
    InvalidPath(String),

    /// Message payload is not valid hex
    #[error("Invalid message payload: {0}")]
    InvalidMessage(hex::FromHexError),

    /// Signature components could not be decoded or recovered
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    /// Persisted keyring state could not be encoded or decoded
    #[error("Invalid keyring state: {0}")]
    State(#[from] serde_json::Error),
}

/// Opaque device / transport failure, passed through without retry
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// No device could be reached
    #[error("No device available")]
    Unavailable,

    /// User rejected the on-device prompt
    #[error("Operation rejected by user")]
    UserDenied,

    /// Request timeout
    #[error("Timeout waiting for device response")]
    RequestTimeout,

    /// Unexpected response from the device
    #[error("Unexpected device response")]
    UnexpectedResponse,

    /// Device refused the derivation path
    #[error("Device rejected derivation path '{0}'")]
    InvalidPath(String),

    /// Underlying transport error
    #[error("Transport error {0}")]
    Transport(anyhow::Error),
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidMessage(e)
    }
}

impl From<ethers_core::types::SignatureError> for Error {
    fn from(e: ethers_core::types::SignatureError) -> Self {
        Error::MalformedSignature(format!("{e}"))
    }
}
