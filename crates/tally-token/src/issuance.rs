//! Token issuance declarations
//!
//! The issuance is the entry that turns a tracked chain into a live token. Its
//! content is a JSON object with the closed field set
//! `{type, supply, symbol, name, metadata}` and it must be signed by the
//! issuer's key alone.

use crate::content::{decode_object, raw_metadata, take_field, take_metadata};
use crate::errors::IssuanceError;
use crate::ext_ids::validate_ext_ids;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tally_core::{Address, Entry};

/// Token standard tag recognized by this follower
pub const TOKEN_STANDARD: &str = "FAT-0";

/// Supply sentinel meaning the token can be minted without bound
pub const UNLIMITED_SUPPLY: i64 = -1;

const FIELDS: &[&str] = &["type", "supply", "symbol", "name", "metadata"];

/// A decoded issuance declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    /// Token standard tag
    #[serde(rename = "type")]
    pub token_type: String,
    /// Maximum supply, or -1 for unbounded
    pub supply: i64,
    /// Ticker symbol
    pub symbol: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Free-form metadata as the JSON text it was written with
    pub metadata: Option<String>,
}

#[derive(Serialize)]
struct IssuanceContent<'a> {
    #[serde(rename = "type")]
    token_type: &'a str,
    supply: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Box<RawValue>>,
}

impl Issuance {
    /// Create an issuance for the recognized standard
    pub fn new(supply: i64) -> Self {
        Self {
            token_type: TOKEN_STANDARD.to_string(),
            supply,
            symbol: None,
            name: None,
            metadata: None,
        }
    }

    /// Set the symbol
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the metadata JSON text. Surrounding whitespace is dropped.
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        let metadata = metadata.into();
        self.metadata = Some(metadata.trim().to_string());
        self
    }

    /// Maximum mintable amount, `None` when unbounded
    pub fn max_supply(&self) -> Option<u64> {
        u64::try_from(self.supply).ok()
    }

    /// Decode entry content. A missing `type` decodes as `""` and a missing
    /// `supply` as `0`, both of which then fail validation.
    pub fn decode(content: &[u8]) -> Result<Self, IssuanceError> {
        let mut object = decode_object(content, FIELDS)?;
        let issuance = Self {
            token_type: take_field(&mut object, "type")?.unwrap_or_default(),
            supply: take_field(&mut object, "supply")?.unwrap_or_default(),
            symbol: take_field(&mut object, "symbol")?,
            name: take_field(&mut object, "name")?,
            metadata: take_metadata(&mut object),
        };
        issuance.validate_data()?;
        Ok(issuance)
    }

    /// Encode into entry content, the inverse of [`Issuance::decode`].
    ///
    /// Metadata is written verbatim and must be a JSON value other than
    /// `null`.
    pub fn encode(&self) -> Result<Vec<u8>, IssuanceError> {
        self.validate_data()?;
        let metadata = self
            .metadata
            .as_deref()
            .map(raw_metadata)
            .transpose()
            .map_err(IssuanceError::InvalidMetadata)?;
        let content = IssuanceContent {
            token_type: &self.token_type,
            supply: self.supply,
            symbol: self.symbol.as_deref(),
            name: self.name.as_deref(),
            metadata,
        };
        serde_json::to_vec(&content).map_err(|e| IssuanceError::InvalidMetadata(e.to_string()))
    }

    /// Check `type` and `supply`
    pub fn validate_data(&self) -> Result<(), IssuanceError> {
        if self.token_type != TOKEN_STANDARD {
            return Err(IssuanceError::InvalidType(self.token_type.clone()));
        }
        if self.supply != UNLIMITED_SUPPLY && self.supply <= 0 {
            return Err(IssuanceError::InvalidSupply(self.supply));
        }
        Ok(())
    }
}

/// Validate an issuance entry against the issuer's address.
///
/// Content is decoded first, then the ExtIDs must carry exactly one
/// RCD/signature pair and its address must be `issuer`.
pub fn validate_issuance(entry: &Entry, issuer: &Address) -> Result<Issuance, IssuanceError> {
    let issuance = Issuance::decode(&entry.content)?;
    let signers = validate_ext_ids(entry, 1)?;
    if signers.first() != Some(issuer) {
        return Err(IssuanceError::InvalidIssuer);
    }
    Ok(issuance)
}
