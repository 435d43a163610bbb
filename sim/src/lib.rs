// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Software Ledger Ethereum device
//!
//! Derives BIP-32 keys from a BIP-39 mnemonic and answers [Device] requests
//! the way the Ledger Ethereum application does (checksummed addresses,
//! single-byte EIP-155 `v`, personal `v` offset by 27). Every request is
//! recorded on a shared [Probe] so tests can assert on device traffic.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers_core::{
    k256::ecdsa::SigningKey,
    utils::{hash_message, keccak256, rlp::Rlp, secret_key_to_address, to_checksum},
};
use ethers_signers::{coins_bip39::English, MnemonicBuilder};
use log::debug;
use zeroize::Zeroizing;

use ledger_keyring::{path::components, Connect, Device, DeviceError, WireSignature};

/// Well-known development mnemonic
pub const DEFAULT_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Request received by a simulated device
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    GetAddress { path: String },
    SignTransaction { path: String, tx_hex: String },
    SignPersonalMessage { path: String, message_hex: String },
}

impl Request {
    /// Check whether this request asks the device for a signature
    pub fn is_signing(&self) -> bool {
        !matches!(self, Request::GetAddress { .. })
    }
}

/// Shared view of simulated device activity
#[derive(Clone, Debug, Default)]
pub struct Probe {
    inner: Arc<ProbeInner>,
}

#[derive(Debug, Default)]
struct ProbeInner {
    requests: Mutex<Vec<Request>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    connects: AtomicUsize,
    deny: AtomicBool,
    address_queries: AtomicUsize,
    address_fault: Mutex<Option<usize>>,
    connect_fails: AtomicBool,
}

/// Marks a request in progress until dropped
struct Active<'a>(&'a ProbeInner);

impl<'a> Drop for Active<'a> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Probe {
    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<Request> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of signing requests received
    pub fn signing_requests(&self) -> usize {
        self.requests().iter().filter(|r| r.is_signing()).count()
    }

    /// Highest number of concurrently executing requests observed
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of connection attempts made through a [SimConnector]
    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Reject signing requests as if the user declined on-device
    pub fn set_user_denies(&self, deny: bool) {
        self.inner.deny.store(deny, Ordering::SeqCst);
    }

    /// Time out the `n`th address query (from zero) made after this call
    pub fn fail_address_query(&self, n: usize) {
        let at = self.inner.address_queries.load(Ordering::SeqCst) + n;

        *self
            .inner
            .address_fault
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    /// Fail connection attempts as if no device were attached
    pub fn set_connect_fails(&self, fail: bool) {
        self.inner.connect_fails.store(fail, Ordering::SeqCst);
    }

    /// Forget recorded requests
    pub fn clear(&self) {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn begin(&self, req: Request) -> Result<Active<'_>, DeviceError> {
        let signing = req.is_signing();

        let address_fault = match signing {
            true => false,
            false => {
                let n = self.inner.address_queries.fetch_add(1, Ordering::SeqCst);
                let fault = self
                    .inner
                    .address_fault
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                *fault == Some(n)
            }
        };

        self.inner
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);

        let n = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.max_in_flight.fetch_max(n, Ordering::SeqCst);
        let active = Active(&self.inner);

        if signing && self.inner.deny.load(Ordering::SeqCst) {
            return Err(DeviceError::UserDenied);
        }

        if address_fault {
            return Err(DeviceError::RequestTimeout);
        }

        Ok(active)
    }
}

/// Simulated Ledger Ethereum device
pub struct SimDevice {
    mnemonic: Zeroizing<String>,
    /// Mnemonic used for signatures when emulating a device swapped mid-session
    signing_mnemonic: Option<Zeroizing<String>>,
    keys: HashMap<(bool, String), SigningKey>,
    latency: Duration,
    probe: Probe,
}

impl SimDevice {
    /// Create a device holding the provided mnemonic
    pub fn new(mnemonic: &str) -> Self {
        Self {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            signing_mnemonic: None,
            keys: HashMap::new(),
            latency: Duration::ZERO,
            probe: Probe::default(),
        }
    }

    /// Delay applied to every request
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Record requests to an existing probe
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Report addresses from the device mnemonic but sign with another
    pub fn sign_with(mut self, mnemonic: &str) -> Self {
        self.signing_mnemonic = Some(Zeroizing::new(mnemonic.to_string()));
        self
    }

    /// Probe for this device
    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }

    /// Fetch (or derive) the key for `path`
    fn key(&mut self, path: &str, signing: bool) -> Result<SigningKey, DeviceError> {
        let invalid = || DeviceError::InvalidPath(path.to_string());

        components(path).map_err(|_| invalid())?;

        // Derivation expects an explicit root
        let full_path = match path.starts_with('m') {
            true => path.to_string(),
            false => format!("m/{path}"),
        };

        let id = (signing, path.to_string());
        if let Some(k) = self.keys.get(&id) {
            return Ok(k.clone());
        }

        let phrase = match (signing, &self.signing_mnemonic) {
            (true, Some(m)) => m,
            _ => &self.mnemonic,
        };

        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase.as_str())
            .derivation_path(&full_path)
            .map_err(|_| invalid())?
            .build()
            .map_err(|e| DeviceError::Transport(anyhow::anyhow!("key derivation failed: {e}")))?;

        let key = wallet.signer().clone();
        self.keys.insert(id, key.clone());

        Ok(key)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Sign a prehashed payload, returning `(r, s, parity)`
fn sign_hash(key: &SigningKey, hash: &[u8]) -> Result<(String, String, u64), DeviceError> {
    let (sig, recid) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| DeviceError::Transport(anyhow::anyhow!("signing failed: {e}")))?;

    let b = sig.to_bytes();

    Ok((
        hex::encode(&b[..32]),
        hex::encode(&b[32..]),
        recid.to_byte() as u64,
    ))
}

/// Chain id from an RLP transaction payload, `0` when unprotected
fn chain_id(raw: &[u8]) -> Result<u64, DeviceError> {
    let invalid = |e| DeviceError::Transport(anyhow::anyhow!("invalid transaction payload: {e:?}"));

    let rlp = Rlp::new(raw);
    match rlp.item_count().map_err(invalid)? {
        6 => Ok(0),
        9 => rlp.val_at::<u64>(6).map_err(invalid),
        n => Err(DeviceError::Transport(anyhow::anyhow!(
            "unexpected transaction field count: {n}"
        ))),
    }
}

#[async_trait]
impl Device for SimDevice {
    async fn get_address(&mut self, path: &str) -> Result<String, DeviceError> {
        let probe = self.probe.clone();
        let _active = probe.begin(Request::GetAddress {
            path: path.to_string(),
        })?;

        self.delay().await;

        let key = self.key(path, false)?;
        let address = to_checksum(&secret_key_to_address(&key), None);

        debug!("sim: address {} for path {}", address, path);

        Ok(address)
    }

    async fn sign_transaction(
        &mut self,
        path: &str,
        tx_hex: &str,
    ) -> Result<WireSignature, DeviceError> {
        let probe = self.probe.clone();
        let _active = probe.begin(Request::SignTransaction {
            path: path.to_string(),
            tx_hex: tx_hex.to_string(),
        })?;

        self.delay().await;

        let raw = hex::decode(tx_hex)
            .map_err(|e| DeviceError::Transport(anyhow::anyhow!("invalid payload hex: {e}")))?;
        let chain_id = chain_id(&raw)?;

        let key = self.key(path, true)?;
        let (r, s, parity) = sign_hash(&key, &keccak256(&raw))?;

        // The device only reports the low byte of v
        let v = match chain_id {
            0 => 27 + parity,
            c => c.wrapping_mul(2).wrapping_add(35 + parity) & 0xff,
        };

        debug!("sim: signed transaction for path {} (chain: {})", path, chain_id);

        Ok(WireSignature {
            v: format!("{v:02x}"),
            r,
            s,
        })
    }

    async fn sign_personal_message(
        &mut self,
        path: &str,
        message_hex: &str,
    ) -> Result<WireSignature, DeviceError> {
        let probe = self.probe.clone();
        let _active = probe.begin(Request::SignPersonalMessage {
            path: path.to_string(),
            message_hex: message_hex.to_string(),
        })?;

        self.delay().await;

        let message = hex::decode(message_hex)
            .map_err(|e| DeviceError::Transport(anyhow::anyhow!("invalid payload hex: {e}")))?;

        let key = self.key(path, true)?;
        let (r, s, parity) = sign_hash(&key, hash_message(&message).as_bytes())?;

        debug!("sim: signed personal message for path {}", path);

        Ok(WireSignature {
            v: format!("{:02x}", 27 + parity),
            r,
            s,
        })
    }
}

/// Opens [SimDevice]s on demand, all sharing one [Probe]
#[derive(Clone)]
pub struct SimConnector {
    mnemonic: Zeroizing<String>,
    latency: Duration,
    probe: Probe,
}

impl SimConnector {
    pub fn new(mnemonic: &str) -> Self {
        Self {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            latency: Duration::ZERO,
            probe: Probe::default(),
        }
    }

    /// Delay applied to every request on connected devices
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Probe shared by connected devices
    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

#[async_trait]
impl Connect<SimDevice> for SimConnector {
    async fn connect(&self) -> Result<SimDevice, DeviceError> {
        self.probe.inner.connects.fetch_add(1, Ordering::SeqCst);

        if self.probe.inner.connect_fails.load(Ordering::SeqCst) {
            debug!("sim: no device attached");
            return Err(DeviceError::Unavailable);
        }

        debug!("sim: device connected");

        Ok(SimDevice::new(&self.mnemonic)
            .with_latency(self.latency)
            .with_probe(self.probe.clone()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn addresses_are_deterministic() {
        let mut a = SimDevice::new(DEFAULT_MNEMONIC);
        let mut b = SimDevice::new(DEFAULT_MNEMONIC);

        let a0 = a.get_address("m/44'/60'/0'/0").await.unwrap();
        assert_eq!(a0, b.get_address("m/44'/60'/0'/0").await.unwrap());
        assert_ne!(a0, a.get_address("m/44'/60'/0'/1").await.unwrap());

        // Checksummed output
        assert!(a0.starts_with("0x"));
        assert_eq!(a0.len(), 42);
        assert_ne!(a0, a0.to_lowercase());
    }

    #[tokio::test]
    async fn rejects_invalid_paths() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);

        for p in ["m/44'/x'/0'/0", "", "m/44'//0"] {
            let r = d.get_address(p).await;
            assert!(matches!(r, Err(DeviceError::InvalidPath(_))), "{p}");
        }
    }

    #[tokio::test]
    async fn root_prefix_is_optional() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);

        assert_eq!(
            d.get_address("44'/60'/0'/0").await.unwrap(),
            d.get_address("m/44'/60'/0'/0").await.unwrap()
        );
    }

    #[tokio::test]
    async fn address_query_fault() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);
        let probe = d.probe();

        d.get_address("m/44'/1'/0'/0").await.unwrap();
        probe.fail_address_query(1);

        assert!(d.get_address("m/44'/1'/0'/0").await.is_ok());
        assert!(matches!(
            d.get_address("m/44'/1'/0'/1").await,
            Err(DeviceError::RequestTimeout)
        ));
        assert!(d.get_address("m/44'/1'/0'/1").await.is_ok());

        // Failed queries are still recorded
        assert_eq!(probe.requests().len(), 4);
        assert_eq!(probe.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn records_requests() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);
        let probe = d.probe();

        d.get_address("m/44'/1'/0'/0").await.unwrap();
        d.sign_personal_message("m/44'/1'/0'/0", "deadbeef")
            .await
            .unwrap();

        assert_eq!(
            probe.requests(),
            vec![
                Request::GetAddress {
                    path: "m/44'/1'/0'/0".to_string()
                },
                Request::SignPersonalMessage {
                    path: "m/44'/1'/0'/0".to_string(),
                    message_hex: "deadbeef".to_string(),
                },
            ]
        );
        assert_eq!(probe.signing_requests(), 1);
        assert_eq!(probe.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn user_denial() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);
        d.probe().set_user_denies(true);

        let r = d.sign_personal_message("m/44'/1'/0'/0", "00").await;
        assert!(matches!(r, Err(DeviceError::UserDenied)));

        // Address queries need no approval
        assert!(d.get_address("m/44'/1'/0'/0").await.is_ok());
    }

    #[tokio::test]
    async fn eip155_v_low_byte() {
        let mut d = SimDevice::new(DEFAULT_MNEMONIC);

        // EIP-155 reference payload, chain id 1
        let tx = "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080";
        let sig = d.sign_transaction("m/44'/60'/0'/0", tx).await.unwrap();

        let v = u64::from_str_radix(&sig.v, 16).unwrap();
        assert!(v == 37 || v == 38, "unexpected v: {v}");
        assert_eq!(sig.r.len(), 64);
        assert_eq!(sig.s.len(), 64);
    }
}
