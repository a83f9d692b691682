//! Cart validation report types.
//!
//! Validation aggregates every problem instead of failing on the first one,
//! so a client can highlight all of them at once.

use crate::ids::{CartItemId, ProductId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a validation issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    /// Product no longer exists in the catalog.
    ProductMissing,
    /// Product exists but is not purchasable.
    ProductInactive,
    /// Requested quantity exceeds available stock.
    InsufficientStock,
    /// Catalog price drifted from the captured unit price.
    PriceChanged,
    /// Cart has no items.
    EmptyCart,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::ProductMissing => "product_missing",
            IssueCode::ProductInactive => "product_inactive",
            IssueCode::InsufficientStock => "insufficient_stock",
            IssueCode::PriceChanged => "price_changed",
            IssueCode::EmptyCart => "empty_cart",
        }
    }
}

/// One enumerable validation problem, tied to a line item where possible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    /// Issue code for programmatic handling.
    pub code: IssueCode,
    /// Affected cart item.
    pub item_id: Option<CartItemId>,
    /// Affected product.
    pub product_id: Option<ProductId>,
    /// Human-readable remediation hint.
    pub message: String,
}

impl ValidationIssue {
    /// Create an issue for a specific line item.
    pub fn for_item(
        code: IssueCode,
        item_id: CartItemId,
        product_id: ProductId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            item_id: Some(item_id),
            product_id: Some(product_id),
            message: message.into(),
        }
    }

    /// Create a cart-level issue.
    pub fn cart_level(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            item_id: None,
            product_id: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

/// Aggregated result of validating a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CartValidation {
    /// Errors: checkout-blocking problems.
    pub errors: Vec<ValidationIssue>,
    /// Warnings: surfaced but not blocking.
    pub warnings: Vec<ValidationIssue>,
    /// Whether validation mutated the cart (price refresh).
    pub has_changes: bool,
}

impl CartValidation {
    /// Whether the cart can proceed to checkout.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_validation_is_valid() {
        let v = CartValidation::default();
        assert!(v.is_valid());
        assert!(!v.has_changes);
    }

    #[test]
    fn test_errors_invalidate() {
        let mut v = CartValidation::default();
        v.errors.push(ValidationIssue::cart_level(
            IssueCode::EmptyCart,
            "cart has no items",
        ));
        assert!(!v.is_valid());
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut v = CartValidation::default();
        v.warnings.push(ValidationIssue::cart_level(
            IssueCode::PriceChanged,
            "price refreshed",
        ));
        assert!(v.is_valid());
    }
}
