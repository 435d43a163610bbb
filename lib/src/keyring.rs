// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Hardware keyring exposing device-derived accounts
//!
//! All device-touching operations are serialised through a
//! [SessionLock], verify the attached device identity, and check that
//! returned signatures recover to the requested account before they are
//! handed back to the caller.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ethers_core::types::Address;
use log::{debug, warn};

use crate::{
    derive::AddressDeriver,
    identity::verify_attached_device,
    signature::{recover_personal, strip_hex_prefix, to_lower_hex, DeviceSignature},
    store::{AccountStore, KeyringState},
    transport::{Connect, Session},
    tx::{SignedTransaction, Transaction},
    path::HARDENED,
    DerivationPath, Device, DeviceError, Error, SessionLock,
};

/// Keyring operations, used for logging and unsupported operation errors
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "camelCase")]
#[non_exhaustive]
pub enum Operation {
    AddAccounts,
    SignTransaction,
    SignPersonalMessage,
    SignMessage,
    SignTypedData,
    ExportAccount,
}

/// Ledger keyring over a [Device]
pub struct Keyring<D: Device> {
    session: SessionLock<Session<D>>,
    store: RwLock<AccountStore>,
}

/// Account position and derivation base for a request
struct Target {
    path: DerivationPath,
    anchor: Option<String>,
    index: usize,
}

impl<D: Device> Keyring<D> {
    /// Keyring type tag
    pub const TYPE: &'static str = "Ledger Hardware Keyring";

    /// Create a keyring using an injected device
    pub fn new(device: D, state: &KeyringState) -> Self {
        Self::with_session(Session::with_device(device), state)
    }

    /// Create a keyring that connects to a device on first use
    pub fn lazy(connector: impl Connect<D> + 'static, state: &KeyringState) -> Self {
        Self::with_session(Session::lazy(connector), state)
    }

    fn with_session(session: Session<D>, state: &KeyringState) -> Self {
        let store = AccountStore::from_state(state);

        debug!(
            "Loaded keyring with {} accounts (path: {})",
            store.len(),
            store.path()
        );

        Self {
            session: SessionLock::new(session),
            store: RwLock::new(store),
        }
    }

    /// Persisted keyring state
    pub fn serialize(&self) -> KeyringState {
        self.store().to_state()
    }

    /// Replace the account store with persisted state
    pub fn deserialize(&mut self, state: &KeyringState) {
        let store = AccountStore::from_state(state);

        debug!(
            "Restored keyring with {} accounts (path: {})",
            store.len(),
            store.path()
        );

        *self
            .store
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner) = store;
    }

    /// Base derivation path
    pub fn hd_path(&self) -> DerivationPath {
        self.store().path().clone()
    }

    /// Copy of the held accounts in derivation order.
    ///
    /// This reads committed state only and does not wait on the session.
    pub fn get_accounts(&self) -> Vec<String> {
        self.store().accounts()
    }

    /// Derive and add the next account
    pub async fn add_account(&self) -> Result<String, Error> {
        let mut added = self.add_accounts(1).await?;
        added
            .pop()
            .ok_or(Error::Device(DeviceError::UnexpectedResponse))
    }

    /// Derive and append `n` accounts, returning only the new accounts.
    ///
    /// Accounts are committed once all derivations succeed.
    pub async fn add_accounts(&self, n: usize) -> Result<Vec<String>, Error> {
        let mut session = self.session.acquire(Operation::AddAccounts).await;

        let Target {
            path,
            anchor,
            index: start,
        } = self.next_target();

        // Account indices are non-hardened BIP-32 components
        let end = start
            .checked_add(n)
            .filter(|end| *end <= HARDENED as usize)
            .ok_or(Error::AccountLimit { start, count: n })?;

        let device = session.device().await?;
        let mut deriver = AddressDeriver::new(device, &path);

        verify_attached_device(&mut deriver, anchor.as_deref()).await?;

        let mut added = vec![];
        for i in start..end {
            added.push(deriver.derive_address(i).await?);
        }

        self.store_mut().append(&added);

        debug!("Added {} accounts from index {}", added.len(), start);

        Ok(added)
    }

    /// Sign a transaction with the device key for `address`.
    ///
    /// Returns a new signed transaction, the provided transaction is not modified.
    pub async fn sign_transaction(
        &self,
        address: &str,
        tx: &Transaction,
    ) -> Result<SignedTransaction, Error> {
        let target = self.resolve(address)?;

        let mut session = self.session.acquire(Operation::SignTransaction).await;
        let device = session.device().await?;

        let mut deriver = AddressDeriver::new(&mut *device, &target.path);
        verify_attached_device(&mut deriver, target.anchor.as_deref()).await?;

        // Encoding carries the chain id in the signature fields (EIP-155)
        let payload = hex::encode(tx.rlp());
        let path = target.path.derive(target.index);

        debug!(
            "Requesting transaction signature for {} (path: {}, chain: {})",
            address, path, tx.chain_id
        );

        let wire = device.sign_transaction(&path, &payload).await?;
        let sig = DeviceSignature::try_from(&wire)?;

        let signed = tx.clone().into_signed(sig.to_eip155(tx.chain_id)?);

        check_owner(address, &signed.sender()?)?;

        Ok(signed)
    }

    /// Sign a hex encoded personal message (EIP-191) with the device key for `address`.
    ///
    /// Returns the packed signature `0x || r || s || v`.
    pub async fn sign_personal_message(&self, address: &str, message: &str) -> Result<String, Error> {
        let target = self.resolve(address)?;

        let message_hex = strip_hex_prefix(message);
        let data = hex::decode(message_hex)?;

        let mut session = self.session.acquire(Operation::SignPersonalMessage).await;
        let device = session.device().await?;

        let mut deriver = AddressDeriver::new(&mut *device, &target.path);
        verify_attached_device(&mut deriver, target.anchor.as_deref()).await?;

        let path = target.path.derive(target.index);

        debug!(
            "Requesting personal message signature for {} (path: {}, {} bytes)",
            address,
            path,
            data.len()
        );

        let wire = device.sign_personal_message(&path, message_hex).await?;
        let signature = DeviceSignature::try_from(&wire)?.to_personal()?;

        check_owner(address, &recover_personal(&data, &signature)?)?;

        Ok(signature)
    }

    /// Raw hash signing, not supported by the device
    pub async fn sign_message(&self, _address: &str, _data: &str) -> Result<String, Error> {
        Err(Error::Unsupported(Operation::SignMessage))
    }

    /// Typed data signing, not supported by the device
    pub async fn sign_typed_data(
        &self,
        _address: &str,
        _typed_data: &serde_json::Value,
    ) -> Result<String, Error> {
        Err(Error::Unsupported(Operation::SignTypedData))
    }

    /// Private keys never leave the device
    pub async fn export_account(&self, _address: &str) -> Result<String, Error> {
        Err(Error::Unsupported(Operation::ExportAccount))
    }

    /// Resolve the store index and derivation base for `address`
    fn resolve(&self, address: &str) -> Result<Target, Error> {
        let s = self.store();

        let index = s.find_index(address)?;

        Ok(Target {
            path: s.path().clone(),
            anchor: s.anchor().map(str::to_string),
            index,
        })
    }

    /// Derivation base and the index of the next account to be added
    fn next_target(&self) -> Target {
        let s = self.store();

        Target {
            path: s.path().clone(),
            anchor: s.anchor().map(str::to_string),
            index: s.len(),
        }
    }

    fn store(&self) -> RwLockReadGuard<'_, AccountStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_mut(&self) -> RwLockWriteGuard<'_, AccountStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Check a recovered signer matches the requested account
fn check_owner(expected: &str, signer: &Address) -> Result<(), Error> {
    let actual = to_lower_hex(signer);

    if !actual.eq_ignore_ascii_case(expected) {
        warn!(
            "Signature ownership mismatch (expected: {}, actual: {})",
            expected, actual
        );

        return Err(Error::SignatureOwnership {
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}
