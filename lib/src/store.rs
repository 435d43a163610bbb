// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Ordered store of derived accounts and its persisted form

use serde::{Deserialize, Deserializer, Serialize};

use crate::{path::DEFAULT_HD_PATH, DerivationPath, Error};

/// Persisted keyring state, `{ "hdPath": .., "accounts": [..] }`.
///
/// Missing, `null` or empty fields decode to the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringState {
    #[serde(default = "default_hd_path", deserialize_with = "hd_path_or_default")]
    pub hd_path: String,
    #[serde(default, deserialize_with = "accounts_or_default")]
    pub accounts: Vec<String>,
}

fn default_hd_path() -> String {
    DEFAULT_HD_PATH.to_string()
}

fn hd_path_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let p = Option::<String>::deserialize(d)?;
    Ok(p.filter(|p| !p.is_empty()).unwrap_or_else(default_hd_path))
}

fn accounts_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let a = Option::<Vec<String>>::deserialize(d)?;
    Ok(a.unwrap_or_default())
}

impl Default for KeyringState {
    fn default() -> Self {
        Self {
            hd_path: default_hd_path(),
            accounts: vec![],
        }
    }
}

impl KeyringState {
    /// Create an empty state for the provided base path
    pub fn with_path(hd_path: &str) -> Self {
        Self {
            hd_path: hd_path.to_string(),
            accounts: vec![],
        }
    }

    /// Decode state from JSON
    pub fn from_json(s: &str) -> Result<Self, Error> {
        let v = serde_json::from_str(s)?;
        Ok(v)
    }

    /// Encode state to JSON
    pub fn to_json(&self) -> Result<String, Error> {
        let s = serde_json::to_string(self)?;
        Ok(s)
    }
}

/// Accounts in derivation order, index 0 anchors device identity checks
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct AccountStore {
    path: DerivationPath,
    accounts: Vec<String>,
}

impl AccountStore {
    /// Rebuild a store from persisted state, an empty `hdPath` selects the default
    pub fn from_state(state: &KeyringState) -> Self {
        Self {
            path: DerivationPath::new(&state.hd_path),
            accounts: state.accounts.clone(),
        }
    }

    /// Persisted form of this store
    pub fn to_state(&self) -> KeyringState {
        KeyringState {
            hd_path: self.path.base().to_string(),
            accounts: self.accounts.clone(),
        }
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Index-0 account, if any
    pub fn anchor(&self) -> Option<&str> {
        self.accounts.first().map(String::as_str)
    }

    /// Copy of the current accounts
    pub fn accounts(&self) -> Vec<String> {
        self.accounts.clone()
    }

    /// Position of an address by exact match
    pub fn find_index(&self, address: &str) -> Result<usize, Error> {
        self.accounts
            .iter()
            .position(|a| a == address)
            .ok_or_else(|| Error::UnknownAddress(address.to_string()))
    }

    /// Append newly derived accounts
    pub fn append(&mut self, accounts: &[String]) {
        self.accounts.extend_from_slice(accounts);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const A0: &str = "0x86852EB424cA6E58920462729627Ee490B67df8d";
    const A1: &str = "0x4d495554Ceaba671bA56f435cAC3306d85035E30";

    #[test]
    fn state_round_trip() {
        let state = KeyringState {
            hd_path: "m/44'/1'/0'".to_string(),
            accounts: vec![A0.to_string(), A1.to_string()],
        };

        let store = AccountStore::from_state(&state);
        assert_eq!(store.to_state(), state);

        let json = state.to_json().unwrap();
        assert_eq!(
            json,
            format!(r#"{{"hdPath":"m/44'/1'/0'","accounts":["{A0}","{A1}"]}}"#)
        );
        assert_eq!(KeyringState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let state = KeyringState::from_json("{}").unwrap();
        assert_eq!(state, KeyringState::default());

        let state = KeyringState::from_json(r#"{"accounts":["0x01"]}"#).unwrap();
        assert_eq!(state.hd_path, DEFAULT_HD_PATH);
        assert_eq!(state.accounts, vec!["0x01".to_string()]);

        let store = AccountStore::from_state(&KeyringState::with_path(""));
        assert_eq!(store.path(), &DerivationPath::default());
        assert!(store.is_empty());
    }

    #[test]
    fn null_fields_use_defaults() {
        let state = KeyringState::from_json(r#"{"hdPath":null,"accounts":null}"#).unwrap();
        assert_eq!(state, KeyringState::default());

        let state = KeyringState::from_json(r#"{"hdPath":"","accounts":[]}"#).unwrap();
        assert_eq!(state.hd_path, DEFAULT_HD_PATH);
    }

    #[test]
    fn path_without_root_round_trips() {
        let state = KeyringState {
            hd_path: "44'/60'/0'".to_string(),
            accounts: vec![A0.to_string()],
        };

        let store = AccountStore::from_state(&state);
        assert_eq!(store.path().base(), "44'/60'/0'");
        assert_eq!(store.to_state(), state);
    }

    #[test]
    fn find_index_exact_match() {
        let mut store = AccountStore::default();
        store.append(&[A0.to_string(), A1.to_string()]);

        assert_eq!(store.anchor(), Some(A0));
        assert_eq!(store.find_index(A0).unwrap(), 0);
        assert_eq!(store.find_index(A1).unwrap(), 1);

        // No case folding or fuzzy matching
        let lower = A1.to_lowercase();
        assert!(matches!(
            store.find_index(&lower),
            Err(Error::UnknownAddress(a)) if a == lower
        ));
    }

    #[test]
    fn accounts_are_copied() {
        let mut store = AccountStore::default();
        store.append(&[A0.to_string()]);

        let mut a = store.accounts();
        a.push(A1.to_string());

        assert_eq!(store.accounts(), vec![A0.to_string()]);
        assert_eq!(store.len(), 1);
    }
}
