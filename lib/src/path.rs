// Copyright (c) 2022-2023 The MobileCoin Foundation

//! BIP-32 derivation paths for keyring accounts

use std::fmt::Display;

use crate::Error;

/// Default Ledger derivation base (shared by MEW, Parity, Geth and Ledger Live legacy)
pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'";

/// Hardened index flag
pub const HARDENED: u32 = 1 << 31;

/// Immutable derivation base to which account indices are appended.
///
/// The base is held as provided, the device rejects malformed paths on use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivationPath {
    base: String,
}

impl DerivationPath {
    /// Create a path from a base such as `m/44'/60'/0'`, empty selects the default
    pub fn new(base: &str) -> Self {
        match base.is_empty() {
            true => Self::default(),
            false => Self {
                base: base.to_string(),
            },
        }
    }

    /// Base path as provided at construction
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full path for the account at `index`
    pub fn derive(&self, index: usize) -> String {
        format!("{}/{}", self.base, index)
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        Self {
            base: DEFAULT_HD_PATH.to_string(),
        }
    }
}

impl From<&str> for DerivationPath {
    fn from(base: &str) -> Self {
        Self::new(base)
    }
}

impl Display for DerivationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base)
    }
}

/// Split a path into BIP-32 indices, setting [HARDENED] on `'` components.
///
/// The leading `m` is optional, as with the Ledger path splitter.
pub fn components(path: &str) -> Result<Vec<u32>, Error> {
    let invalid = || Error::InvalidPath(path.to_string());

    if path.is_empty() {
        return Err(invalid());
    }

    let rest = match path {
        "m" => None,
        p => Some(p.strip_prefix("m/").unwrap_or(p)),
    };

    let mut indices = vec![];
    for p in rest.into_iter().flat_map(|r| r.split('/')) {
        let (digits, hardened) = match p.strip_suffix('\'') {
            Some(d) => (d, true),
            None => (p, false),
        };

        // Reject signs / whitespace that `parse` would otherwise accept
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let index = digits.parse::<u32>().map_err(|_| invalid())?;
        if index & HARDENED != 0 {
            return Err(invalid());
        }

        indices.push(match hardened {
            true => index | HARDENED,
            false => index,
        });
    }

    // BIP-32 depth is encoded as a single byte
    if indices.len() > u8::MAX as usize {
        return Err(invalid());
    }

    Ok(indices)
}
