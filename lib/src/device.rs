// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device collaborator interface
//!
//! This is the request/response surface of an Ethereum signing device,
//! abstract over the underlying transport and APDU encoding.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::DeviceError;

/// Signature as returned over the wire, hex strings without `0x` prefix
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSignature {
    pub v: String,
    pub r: String,
    pub s: String,
}

/// Ethereum signing device.
///
/// Devices are stateful and slow, callers must serialise access
/// (see [SessionLock][crate::SessionLock]).
#[async_trait]
pub trait Device: Send {
    /// Fetch the address for the provided BIP-32 path
    async fn get_address(&mut self, path: &str) -> Result<String, DeviceError>;

    /// Sign a hex encoded RLP transaction (requires confirmation on the device)
    async fn sign_transaction(
        &mut self,
        path: &str,
        tx_hex: &str,
    ) -> Result<WireSignature, DeviceError>;

    /// Sign a hex encoded personal message, the device applies the EIP-191 prefix.
    ///
    /// `v` is returned offset by 27.
    async fn sign_personal_message(
        &mut self,
        path: &str,
        message_hex: &str,
    ) -> Result<WireSignature, DeviceError>;
}
