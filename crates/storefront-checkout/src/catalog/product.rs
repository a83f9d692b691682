//! External product view.
//!
//! The catalog itself (categories, search, media) is another system; the
//! checkout engine only consumes this snapshot of a product: current price,
//! active flag, and stock counters.

use crate::catalog::StockLevel;
use crate::error::CommerceError;
use crate::ids::ProductId;
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// A product as seen by the cart and checkout paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRecord {
    /// Unique product identifier.
    pub id: ProductId,
    /// Stock keeping unit.
    pub sku: String,
    /// Product name.
    pub name: String,
    /// Brand name.
    pub brand: Option<String>,
    /// Whether the product is purchasable.
    pub active: bool,
    /// Current unit price.
    pub price: Money,
    /// Price per centimetre for variable-dimension products
    /// (e.g., fabric cut to length). None for fixed-price products.
    pub price_per_cm: Option<Money>,
    /// Stock counters.
    pub stock: StockLevel,
}

impl ProductRecord {
    /// Create a new active product with the given stock on hand.
    pub fn new(
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        on_hand: i64,
    ) -> Self {
        Self {
            id,
            sku: sku.into(),
            name: name.into(),
            brand: None,
            active: true,
            price,
            price_per_cm: None,
            stock: StockLevel::new(on_hand),
        }
    }

    /// Set the brand.
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Make this a variable-dimension product priced per centimetre.
    pub fn with_price_per_cm(mut self, per_cm: Money) -> Self {
        self.price_per_cm = Some(per_cm);
        self
    }

    /// Check if the product can be added to a cart.
    pub fn is_available(&self) -> bool {
        self.active
    }

    /// Resolve the unit price for a purchase, accounting for custom length.
    ///
    /// For variable-dimension products the unit price is
    /// `price_per_cm * length`; fixed products ignore the length.
    pub fn unit_price_for(&self, custom_length_cm: Option<i64>) -> Result<Money, CommerceError> {
        match (custom_length_cm, self.price_per_cm) {
            (Some(length), Some(per_cm)) => {
                if length <= 0 {
                    return Err(CommerceError::InvalidQuantity(length));
                }
                per_cm.try_multiply(length).ok_or(CommerceError::Overflow)
            }
            _ => Ok(self.price),
        }
    }
}
