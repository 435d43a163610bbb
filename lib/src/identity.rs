// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Attached device identity check
//!
//! Compares the device's index-0 address with the first stored account.
//! The device may still be swapped between this check and a subsequent
//! signing request, post-signature recovery is the authoritative check.

use log::{debug, warn};

use crate::{derive::AddressDeriver, Device, Error};

/// Verify the attached device derives `anchor` at index 0.
///
/// No-op when the store is empty (`anchor` is `None`), addresses are
/// compared case-insensitively.
pub async fn verify_attached_device<D: Device>(
    deriver: &mut AddressDeriver<'_, D>,
    anchor: Option<&str>,
) -> Result<(), Error> {
    let expected = match anchor {
        Some(a) => a,
        None => {
            debug!("No accounts held, skipping device identity check");
            return Ok(());
        }
    };

    let actual = deriver.derive_address(0).await?;

    if !actual.eq_ignore_ascii_case(expected) {
        warn!(
            "Device identity mismatch (expected: {}, actual: {})",
            expected, actual
        );

        return Err(Error::DeviceMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Device identity verified for account {}", expected);

    Ok(())
}
