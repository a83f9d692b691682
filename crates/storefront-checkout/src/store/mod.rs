//! Storage traits and in-memory implementations.
//!
//! The catalog, address book, and payment gateway are external
//! collaborators consumed through narrow traits; carts and orders are
//! owned here. The in-memory implementations are `Send + Sync` and model
//! the same discipline a relational store would: per-product optimistic
//! version checks on stock rows, single active cart per identity.

mod memory;

use crate::catalog::ProductRecord;
use crate::checkout::AddressRecord;
use crate::error::CommerceError;
use crate::ids::{AddressId, ProductId};
use crate::money::Money;

pub use memory::{CartStore, InMemoryAddressBook, InMemoryCatalog, MockGateway, OrderStore};

/// Read access to the product catalog.
pub trait ProductCatalog: Send + Sync {
    /// Fetch a product with its current price and stock counters.
    fn product(&self, id: &ProductId) -> Result<ProductRecord, CommerceError>;
}

/// Stock ledger operations.
///
/// Every mutation must be guarded against concurrent reservation of the
/// same product; two simultaneous checkouts against the last unit must
/// not both succeed.
pub trait StockLedger: Send + Sync {
    /// Read-only availability check.
    fn can_reserve(&self, id: &ProductId, quantity: i64) -> Result<bool, CommerceError>;

    /// Place a hold on stock. Fails with `InsufficientStock` when
    /// availability is short.
    fn reserve(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError>;

    /// Return held stock to the pool. Never fails: an over-release or a
    /// missing product is logged as an accounting mismatch and otherwise
    /// ignored, so cancellations always complete.
    fn release(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError>;

    /// Convert held stock into a permanent decrement. Fails with
    /// `FulfillExceedsReserved` when the hold is smaller than requested.
    fn fulfill(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError>;
}

/// Read access to saved addresses.
pub trait AddressBook: Send + Sync {
    /// Fetch a saved address.
    fn address(&self, id: &AddressId) -> Result<AddressRecord, CommerceError>;
}

/// Payment gateway, treated as a black box.
pub trait PaymentGateway: Send + Sync {
    /// Create a gateway-side payment order for the amount due.
    fn create_payment_order(&self, amount: Money) -> Result<String, CommerceError>;

    /// Verify a gateway callback signature.
    fn verify_payment(
        &self,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, CommerceError>;
}
