//! Token transfer transactions
//!
//! Content is a JSON object with the closed field set
//! `{inputs, outputs, metadata}`, where `inputs` and `outputs` map address text
//! to amounts. A normal transaction is signed by every input address, one
//! RCD/signature pair each. A coinbase transaction spends only from the
//! reserved coinbase address and is signed by the issuer; it mints its outputs.

use crate::content::{decode_object, raw_metadata, take_field, take_metadata};
use crate::errors::TransactionError;
use crate::ext_ids::validate_ext_ids;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, BTreeSet};
use tally_core::{Address, Entry};

const FIELDS: &[&str] = &["inputs", "outputs", "metadata"];

/// A decoded transfer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transaction {
    /// Amounts debited, by address
    pub inputs: BTreeMap<Address, u64>,
    /// Amounts credited, by address
    pub outputs: BTreeMap<Address, u64>,
    /// Free-form metadata as the JSON text it was written with
    pub metadata: Option<String>,
}

#[derive(Serialize)]
struct TransactionContent<'a> {
    inputs: &'a BTreeMap<Address, u64>,
    outputs: &'a BTreeMap<Address, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Box<RawValue>>,
}

impl Transaction {
    /// Create a transaction from input and output lists
    pub fn new(
        inputs: impl IntoIterator<Item = (Address, u64)>,
        outputs: impl IntoIterator<Item = (Address, u64)>,
    ) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
            metadata: None,
        }
    }

    /// Create a coinbase transaction minting into `outputs`
    pub fn coinbase(outputs: impl IntoIterator<Item = (Address, u64)>) -> Self {
        let outputs: BTreeMap<Address, u64> = outputs.into_iter().collect();
        let total = outputs.values().fold(0u64, |acc, v| acc.saturating_add(*v));
        Self {
            inputs: BTreeMap::from([(Address::coinbase(), total)]),
            outputs,
            metadata: None,
        }
    }

    /// Whether this transaction mints from the coinbase address
    pub fn is_coinbase(&self) -> bool {
        self.inputs.contains_key(&Address::coinbase())
    }

    /// Total amount moved
    pub fn total(&self) -> Result<u64, TransactionError> {
        sum(self.outputs.values())
    }

    /// Number of RCD/signature pairs the entry must carry
    pub fn required_signers(&self) -> usize {
        if self.is_coinbase() {
            1
        } else {
            self.inputs.len()
        }
    }

    /// Decode entry content and check the transfer rules
    pub fn decode(content: &[u8]) -> Result<Self, TransactionError> {
        let mut object = decode_object(content, FIELDS)?;
        let tx = Self {
            inputs: take_field(&mut object, "inputs")?.unwrap_or_default(),
            outputs: take_field(&mut object, "outputs")?.unwrap_or_default(),
            metadata: take_metadata(&mut object),
        };
        tx.validate_data()?;
        Ok(tx)
    }

    /// Encode into entry content, the inverse of [`Transaction::decode`].
    /// Metadata is written verbatim and must not be `null`.
    pub fn encode(&self) -> Result<Vec<u8>, TransactionError> {
        self.validate_data()?;
        let metadata = self
            .metadata
            .as_deref()
            .map(raw_metadata)
            .transpose()
            .map_err(TransactionError::InvalidMetadata)?;
        let content = TransactionContent {
            inputs: &self.inputs,
            outputs: &self.outputs,
            metadata,
        };
        serde_json::to_vec(&content).map_err(|e| TransactionError::InvalidMetadata(e.to_string()))
    }

    /// Check the transfer rules that do not depend on signatures
    pub fn validate_data(&self) -> Result<(), TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        let inputs = sum(self.inputs.values())?;
        let outputs = sum(self.outputs.values())?;
        if inputs != outputs {
            return Err(TransactionError::Unbalanced { inputs, outputs });
        }
        if self.is_coinbase() && self.inputs.len() != 1 {
            return Err(TransactionError::MixedCoinbase);
        }
        if let Some(address) = self.inputs.keys().find(|a| self.outputs.contains_key(a)) {
            return Err(TransactionError::Overlap(*address));
        }
        Ok(())
    }
}

/// Validate a transaction entry.
///
/// Coinbase transactions must be signed by `issuer` alone; all others by
/// exactly the set of input addresses, in any order.
pub fn validate_transaction(
    entry: &Entry,
    issuer: &Address,
) -> Result<Transaction, TransactionError> {
    let tx = Transaction::decode(&entry.content)?;
    let signers = validate_ext_ids(entry, tx.required_signers())?;

    if tx.is_coinbase() {
        if signers.first() != Some(issuer) {
            return Err(TransactionError::InvalidIssuer);
        }
        return Ok(tx);
    }

    let signers: BTreeSet<&Address> = signers.iter().collect();
    let inputs: BTreeSet<&Address> = tx.inputs.keys().collect();
    if signers != inputs {
        return Err(TransactionError::SignerMismatch);
    }
    Ok(tx)
}

fn sum<'a>(mut amounts: impl Iterator<Item = &'a u64>) -> Result<u64, TransactionError> {
    amounts.try_fold(0u64, |acc, amount| {
        acc.checked_add(*amount).ok_or(TransactionError::Overflow)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(seed: u8) -> Address {
        Address::from_public_key(&[seed; 32])
    }

    #[test]
    fn decode_roundtrip() {
        let tx = Transaction::new([(address(1), 10)], [(address(2), 4), (address(3), 6)]);
        assert_eq!(Transaction::decode(&tx.encode().unwrap()).unwrap(), tx);
    }

    #[test]
    fn unbalanced_is_rejected() {
        let tx = Transaction::new([(address(1), 10)], [(address(2), 9)]);
        assert_eq!(
            tx.validate_data(),
            Err(TransactionError::Unbalanced {
                inputs: 10,
                outputs: 9
            })
        );
    }

    #[test]
    fn overflow_is_rejected() {
        let tx = Transaction::new(
            [(address(1), u64::MAX), (address(2), 1)],
            [(address(3), 0)],
        );
        assert_eq!(tx.validate_data(), Err(TransactionError::Overflow));
    }

    #[test]
    fn overlap_is_rejected() {
        let tx = Transaction::new([(address(1), 5)], [(address(1), 5)]);
        assert_eq!(tx.validate_data(), Err(TransactionError::Overlap(address(1))));
    }

    #[test]
    fn coinbase_must_stand_alone() {
        let mut tx = Transaction::coinbase([(address(2), 5)]);
        assert!(tx.validate_data().is_ok());
        assert_eq!(tx.required_signers(), 1);
        tx.inputs.insert(address(1), 0);
        assert_eq!(tx.validate_data(), Err(TransactionError::MixedCoinbase));
    }

    #[test]
    fn empty_maps_are_rejected() {
        assert_eq!(
            Transaction::decode(br#"{"outputs":{}}"#),
            Err(TransactionError::NoInputs)
        );
    }

    #[test]
    fn bad_address_is_a_field_error() {
        let err = Transaction::decode(br#"{"inputs":{"xyz":1},"outputs":{}}"#).unwrap_err();
        assert!(err.to_string().starts_with("\"inputs\": "));
    }

    #[test]
    fn metadata_is_written_verbatim() {
        let mut tx = Transaction::new([(address(1), 3)], [(address(2), 3)]);
        tx.metadata = Some(r#"{"z":null,"a":1}"#.to_string());
        assert_eq!(Transaction::decode(&tx.encode().unwrap()).unwrap(), tx);

        tx.metadata = Some("null".to_string());
        assert_eq!(
            tx.encode(),
            Err(TransactionError::InvalidMetadata("must not be null".to_string()))
        );
    }
}
