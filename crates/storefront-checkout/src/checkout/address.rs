//! Address types.
//!
//! The address book is another system; checkout consumes saved addresses
//! through it and snapshots them onto orders as value objects, so later
//! edits to the saved address never rewrite order history.

use crate::ids::{AddressId, UserId};
use serde::{Deserialize, Serialize};

/// A saved address as returned by the address book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressRecord {
    /// Unique address identifier.
    pub id: AddressId,
    /// User who owns this address.
    pub owner: UserId,
    /// Recipient name.
    pub recipient: String,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// State/province code (e.g., "CA").
    pub state: Option<String>,
    /// Postal/ZIP code.
    pub postal_code: String,
    /// Country name.
    pub country: String,
}

impl AddressRecord {
    /// Create a new address record.
    pub fn new(
        id: AddressId,
        owner: UserId,
        recipient: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id,
            owner,
            recipient: recipient.into(),
            street: street.into(),
            city: city.into(),
            state: None,
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    /// Set the state/province code.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Check the record has enough to ship to.
    pub fn is_complete(&self) -> bool {
        !self.recipient.is_empty()
            && !self.street.is_empty()
            && !self.city.is_empty()
            && !self.postal_code.is_empty()
            && !self.country.is_empty()
    }
}

/// A point-in-time copy of an address stored on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderAddress {
    /// Recipient name.
    pub recipient: String,
    /// Street line.
    pub street: String,
    /// City.
    pub city: String,
    /// State/province code.
    pub state: Option<String>,
    /// Postal/ZIP code.
    pub postal_code: String,
    /// Country name.
    pub country: String,
}

impl OrderAddress {
    /// Snapshot a saved address. Drops the id and owner on purpose: the
    /// order keeps a copy, not a reference.
    pub fn snapshot(record: &AddressRecord) -> Self {
        Self {
            recipient: record.recipient.clone(),
            street: record.street.clone(),
            city: record.city.clone(),
            state: record.state.clone(),
            postal_code: record.postal_code.clone(),
            country: record.country.clone(),
        }
    }

    /// Format as a single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.street.clone(), self.city.clone()];
        if let Some(ref state) = self.state {
            parts.push(state.clone());
        }
        parts.push(self.postal_code.clone());
        parts.push(self.country.clone());
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> AddressRecord {
        AddressRecord::new(
            AddressId::new("addr-1"),
            UserId::new("user-1"),
            "Jane Smith",
            "456 Oak Ave",
            "Los Angeles",
            "90001",
            "United States",
        )
        .with_state("CA")
    }

    #[test]
    fn test_address_complete() {
        assert!(record().is_complete());

        let mut incomplete = record();
        incomplete.street = String::new();
        assert!(!incomplete.is_complete());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut rec = record();
        let snap = OrderAddress::snapshot(&rec);

        rec.street = "789 Elm St".to_string();
        assert_eq!(snap.street, "456 Oak Ave");
    }

    #[test]
    fn test_one_line_format() {
        let snap = OrderAddress::snapshot(&record());
        let line = snap.one_line();
        assert!(line.contains("Los Angeles"));
        assert!(line.contains("CA"));
    }
}
