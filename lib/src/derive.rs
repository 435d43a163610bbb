// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Address derivation via the attached device

use log::debug;

use crate::{DerivationPath, Device, Error};

/// Derives account addresses along a fixed base path.
///
/// Each call queries the device, results are never cached so callers can
/// detect device substitution.
pub struct AddressDeriver<'a, D: Device> {
    device: &'a mut D,
    path: &'a DerivationPath,
}

impl<'a, D: Device> AddressDeriver<'a, D> {
    pub fn new(device: &'a mut D, path: &'a DerivationPath) -> Self {
        Self { device, path }
    }

    /// Fetch the address at `index` under the base path
    pub async fn derive_address(&mut self, index: usize) -> Result<String, Error> {
        let path = self.path.derive(index);

        debug!("Requesting address for path: {}", path);

        let address = self.device.get_address(&path).await?;

        debug!("Derived address {} for path: {}", address, path);

        Ok(address)
    }
}
