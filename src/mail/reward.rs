//! Reward payloads attached to mail.
//!
//! The stored form is `{"props":[{"id":<resource type>,"cnt":<amount>}]}`,
//! or an empty string for mail without a reward.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error decoding or validating a reward payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardFormatError {
    /// The payload is not valid reward JSON.
    #[error("malformed reward payload: {0}")]
    Malformed(String),

    /// A reward entry has a negative amount.
    #[error("negative amount {amount} for resource type {resource_type}")]
    NegativeAmount {
        /// Resource type of the offending entry.
        resource_type: i32,
        /// The negative amount.
        amount: i64,
    },

    /// Merging duplicate entries overflowed.
    #[error("amount overflow for resource type {0}")]
    Overflow(i32),
}

/// A single (resource type, amount) delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardItem {
    /// Resource type identifier.
    pub resource_type: i32,
    /// Amount to credit (never negative).
    pub amount: i64,
}

impl RewardItem {
    /// Create a new reward item.
    pub fn new(resource_type: i32, amount: i64) -> Self {
        Self {
            resource_type,
            amount,
        }
    }
}

/// A normalized reward: no duplicate resource types, no negative or zero
/// amounts, first-seen order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reward {
    items: Vec<RewardItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RewardPayload {
    #[serde(default)]
    props: Vec<PropEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropEntry {
    id: i32,
    cnt: i64,
}

impl Reward {
    /// An empty reward.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a reward from items, validating and normalizing them.
    pub fn new(items: impl IntoIterator<Item = RewardItem>) -> Result<Self, RewardFormatError> {
        let mut merged: Vec<RewardItem> = Vec::new();
        for item in items {
            if item.amount < 0 {
                return Err(RewardFormatError::NegativeAmount {
                    resource_type: item.resource_type,
                    amount: item.amount,
                });
            }
            match merged
                .iter_mut()
                .find(|m| m.resource_type == item.resource_type)
            {
                Some(existing) => {
                    existing.amount = existing
                        .amount
                        .checked_add(item.amount)
                        .ok_or(RewardFormatError::Overflow(item.resource_type))?;
                }
                None => merged.push(item),
            }
        }
        merged.retain(|item| item.amount > 0);
        Ok(Self { items: merged })
    }

    /// Decode a stored payload. An empty or whitespace-only payload is an
    /// empty reward.
    pub fn parse(payload: &str) -> Result<Self, RewardFormatError> {
        if payload.trim().is_empty() {
            return Ok(Self::empty());
        }
        let decoded: RewardPayload = serde_json::from_str(payload)
            .map_err(|e| RewardFormatError::Malformed(e.to_string()))?;
        Self::new(
            decoded
                .props
                .into_iter()
                .map(|p| RewardItem::new(p.id, p.cnt)),
        )
    }

    /// Encode for storage. Empty rewards encode as an empty string.
    pub fn to_payload(&self) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let payload = RewardPayload {
            props: self
                .items
                .iter()
                .map(|i| PropEntry {
                    id: i.resource_type,
                    cnt: i.amount,
                })
                .collect(),
        };
        // A Vec of integer pairs always serializes.
        serde_json::to_string(&payload).unwrap_or_default()
    }

    /// The normalized items.
    pub fn items(&self) -> &[RewardItem] {
        &self.items
    }

    /// Whether there is nothing to credit.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
