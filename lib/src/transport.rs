// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Transport acquisition and the memoised device session

use async_trait::async_trait;
use log::debug;

use crate::{Device, DeviceError, Error};

/// Connect trait for default transports, invoked on first device use
#[async_trait]
pub trait Connect<D: Device>: Send + Sync {
    /// Open a device session
    async fn connect(&self) -> Result<D, DeviceError>;
}

/// Device session owned by a keyring.
///
/// Either created with an injected device or connected lazily through a
/// [Connect] implementation, once connected the device is kept for the
/// session lifetime and never recreated.
pub struct Session<D: Device> {
    device: Option<D>,
    connector: Option<Box<dyn Connect<D>>>,
}

impl<D: Device> Session<D> {
    /// Create a session around an already open device
    pub fn with_device(device: D) -> Self {
        Self {
            device: Some(device),
            connector: None,
        }
    }

    /// Create a session that connects on first use
    pub fn lazy(connector: impl Connect<D> + 'static) -> Self {
        Self {
            device: None,
            connector: Some(Box::new(connector)),
        }
    }

    /// Fetch the session device, connecting if required
    pub async fn device(&mut self) -> Result<&mut D, Error> {
        if self.device.is_none() {
            let connector = self.connector.as_ref().ok_or(DeviceError::Unavailable)?;

            debug!("Connecting default transport");
            let d = connector.connect().await?;

            self.device = Some(d);
        }

        self.device
            .as_mut()
            .ok_or(Error::Device(DeviceError::Unavailable))
    }
}
