// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Legacy (EIP-155) transaction encoding for device signing

use ethers_core::{
    types::{Address, Bytes, Signature, H256, U256},
    utils::{keccak256, rlp::RlpStream},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Unsigned legacy transaction
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    /// Recipient, `None` for contract creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
    /// EIP-155 chain id, `0` for an unprotected transaction
    #[serde(default)]
    pub chain_id: u64,
}

/// Transaction with a device signature applied
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub signature: Signature,
}

impl Transaction {
    /// RLP encoding signed by the device.
    ///
    /// With a chain id the signature fields carry `(chain_id, 0, 0)` for replay
    /// protection, otherwise the six-field pre-EIP-155 form is used.
    pub fn rlp(&self) -> Vec<u8> {
        let mut s = match self.chain_id {
            0 => RlpStream::new_list(6),
            _ => RlpStream::new_list(9),
        };

        self.rlp_fields(&mut s);

        if self.chain_id != 0 {
            s.append(&self.chain_id);
            s.append(&0u8);
            s.append(&0u8);
        }

        s.out().to_vec()
    }

    /// Hash over [Transaction::rlp], used for sender recovery
    pub fn sighash(&self) -> H256 {
        keccak256(self.rlp()).into()
    }

    /// Attach a signature, producing a new signed transaction
    pub fn into_signed(self, signature: Signature) -> SignedTransaction {
        SignedTransaction {
            tx: self,
            signature,
        }
    }

    fn rlp_fields(&self, s: &mut RlpStream) {
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        match &self.to {
            Some(to) => s.append(to),
            None => s.append_empty_data(),
        };
        s.append(&self.value);
        s.append(&self.data.as_ref().to_vec());
    }
}

impl SignedTransaction {
    /// Signed RLP encoding for broadcast
    pub fn rlp(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(9);

        self.tx.rlp_fields(&mut s);
        s.append(&self.signature.v);
        s.append(&self.signature.r);
        s.append(&self.signature.s);

        s.out().to_vec()
    }

    /// Transaction hash
    pub fn hash(&self) -> H256 {
        keccak256(self.rlp()).into()
    }

    /// Recover the sending address from the signature
    pub fn sender(&self) -> Result<Address, Error> {
        let address = self.signature.recover(self.tx.sighash())?;
        Ok(address)
    }
}
