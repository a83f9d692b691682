//! Commerce error types.

use crate::cart::ValidationIssue;
use thiserror::Error;

/// Errors that can occur in cart and checkout operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Cart not found.
    #[error("Cart not found: {0}")]
    CartNotFound(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Address not found.
    #[error("Address not found: {0}")]
    AddressNotFound(String),

    /// Item not in cart.
    #[error("Item not in cart: {0}")]
    ItemNotInCart(String),

    /// Cart is not in a modifiable status.
    #[error("Cart {cart_id} is {status} and cannot be modified")]
    CartNotModifiable { cart_id: String, status: String },

    /// Product exists but is not purchasable.
    #[error("Product not available for purchase: {0}")]
    ProductUnavailable(String),

    /// Requested quantity exceeds available stock.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Fulfillment requested for more units than are reserved.
    #[error("Cannot fulfill {requested} units of {product_id}: only {reserved} reserved")]
    FulfillExceedsReserved {
        product_id: String,
        requested: i64,
        reserved: i64,
    },

    /// Stock row changed under an optimistic update and retries ran out.
    #[error("Stock for {0} changed concurrently, retry the operation")]
    StaleStock(String),

    /// Invalid order status transition.
    #[error("Invalid order transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Invalid quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity exceeds maximum allowed per line item.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// A required field was blank.
    #[error("{field} must not be blank")]
    BlankField { field: &'static str },

    /// Resource does not belong to the requesting customer.
    #[error("{resource} does not belong to the requesting customer")]
    OwnershipMismatch { resource: &'static str },

    /// Checkout aborted by cart validation; every issue is enumerated so the
    /// client can render specific remediation.
    #[error("Checkout blocked by {} validation error(s)", .0.len())]
    CheckoutBlocked(Vec<ValidationIssue>),

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// Currency mismatch.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::SerializationError(e.to_string())
    }
}
