// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Device signature decoding and normalisation
//!
//! [WireSignature] hex strings are decoded exactly once into a
//! fixed-width [DeviceSignature], which is then either applied to a
//! transaction ([DeviceSignature::to_eip155]) or packed as a personal
//! message signature ([DeviceSignature::to_personal]).

use std::str::FromStr;

use ethers_core::types::{Address, Signature, U256};

use crate::{device::WireSignature, Error};

/// Offset applied to recovery ids by legacy / personal signing
const V_OFFSET: u64 = 27;

/// EIP-155 recovery id offset
const EIP155_OFFSET: u64 = 35;

/// Decoded device signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u64,
}

impl TryFrom<&WireSignature> for DeviceSignature {
    type Error = Error;

    fn try_from(w: &WireSignature) -> Result<Self, Self::Error> {
        Ok(Self {
            r: decode_word(&w.r)?,
            s: decode_word(&w.s)?,
            v: decode_v(&w.v)?,
        })
    }
}

impl DeviceSignature {
    /// Pack as a personal message signature, `0x || r || s || (v - 27)`
    pub fn to_personal(&self) -> Result<String, Error> {
        let v = self
            .v
            .checked_sub(V_OFFSET)
            .filter(|v| *v <= u8::MAX as u64)
            .ok_or_else(|| Error::MalformedSignature(format!("unexpected v: {}", self.v)))?;

        Ok(format!(
            "0x{}{}{:02x}",
            hex::encode(self.r),
            hex::encode(self.s),
            v
        ))
    }

    /// Build a transaction signature, reconstructing the full EIP-155 `v` for `chain_id`
    pub fn to_eip155(&self, chain_id: u64) -> Result<Signature, Error> {
        Ok(Signature {
            r: U256::from_big_endian(&self.r),
            s: U256::from_big_endian(&self.s),
            v: eip155_v(self.v, chain_id)?,
        })
    }
}

/// Resolve the full transaction `v` from the value reported by the device.
///
/// Ledger devices only return the low byte of `v`, so for larger chain ids
/// the parity is recovered modulo 256.
pub fn eip155_v(device_v: u64, chain_id: u64) -> Result<u64, Error> {
    let invalid = || {
        Error::MalformedSignature(format!(
            "v {device_v} does not match chain id {chain_id}"
        ))
    };

    // Unprotected legacy transaction
    if chain_id == 0 {
        return match device_v {
            27 | 28 => Ok(device_v),
            _ => Err(invalid()),
        };
    }

    let base = chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(EIP155_OFFSET))
        .ok_or_else(invalid)?;

    let parity = match device_v.checked_sub(base) {
        Some(p @ 0..=1) => p,
        _ if device_v <= u8::MAX as u64 => (device_v as u8).wrapping_sub(base as u8) as u64,
        _ => return Err(invalid()),
    };

    match parity {
        0 | 1 => Ok(base + parity),
        _ => Err(invalid()),
    }
}

/// Recover the signer of a personal message from a packed signature
pub fn recover_personal(message: &[u8], signature: &str) -> Result<Address, Error> {
    let sig = Signature::from_str(signature)?;
    let address = sig.recover(message.to_vec())?;

    Ok(address)
}

/// Lowercase `0x` prefixed address, as reported in ownership errors
pub fn to_lower_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Strip a leading `0x` from a hex string
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn decode_word(s: &str) -> Result<[u8; 32], Error> {
    let h = strip_hex_prefix(s);
    if h.is_empty() || h.len() > 64 {
        return Err(Error::MalformedSignature(format!(
            "invalid component length: '{s}'"
        )));
    }

    // Devices may omit leading zeros
    let padded = format!("{h:0>64}");

    let mut b = [0u8; 32];
    hex::decode_to_slice(padded, &mut b)
        .map_err(|e| Error::MalformedSignature(format!("invalid component '{s}': {e}")))?;

    Ok(b)
}

fn decode_v(s: &str) -> Result<u64, Error> {
    let h = strip_hex_prefix(s);
    if h.is_empty() || !h.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::MalformedSignature(format!("invalid v: '{s}'")));
    }

    u64::from_str_radix(h, 16).map_err(|e| Error::MalformedSignature(format!("invalid v '{s}': {e}")))
}
