//! Cart aggregate and line items.

use crate::catalog::ProductRecord;
use crate::error::CommerceError;
use crate::ids::{CartId, CartItemId, ProductId, SessionId, UserId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: i64 = 9999;

/// Cart lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CartStatus {
    /// Cart accepts mutations.
    #[default]
    Active,
    /// Cart was converted to an order or merged away. Terminal.
    CheckedOut,
    /// No activity past the inactivity window.
    Abandoned,
    /// Past the absolute TTL.
    Expired,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartStatus::Active => "active",
            CartStatus::CheckedOut => "checked_out",
            CartStatus::Abandoned => "abandoned",
            CartStatus::Expired => "expired",
        }
    }

    /// Only Active carts accept item and discount mutations.
    pub fn is_modifiable(&self) -> bool {
        matches!(self, CartStatus::Active)
    }
}

/// Who a cart belongs to.
///
/// A cart is keyed by either an authenticated user or an anonymous
/// session/device pair, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CartIdentity {
    /// Authenticated user's cart.
    User(UserId),
    /// Anonymous guest cart.
    Guest {
        session_id: SessionId,
        device_fingerprint: String,
    },
}

impl CartIdentity {
    /// Create a guest identity.
    pub fn guest(session_id: SessionId, device_fingerprint: impl Into<String>) -> Self {
        Self::Guest {
            session_id,
            device_fingerprint: device_fingerprint.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, CartIdentity::User(_))
    }

    /// Owning user, if authenticated.
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            CartIdentity::User(id) => Some(id),
            CartIdentity::Guest { .. } => None,
        }
    }

    /// Check whether a guest identity matches a session id or a device
    /// fingerprint. Either one is enough: the merge resolver collects
    /// carts created before and after a session rotation.
    pub fn matches_guest(&self, session_id: &SessionId, device_fingerprint: &str) -> bool {
        match self {
            CartIdentity::Guest {
                session_id: sid,
                device_fingerprint: fp,
            } => sid == session_id || fp == device_fingerprint,
            CartIdentity::User(_) => false,
        }
    }
}

/// A line item in the cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartItem {
    /// Unique line item identifier.
    pub id: CartItemId,
    /// Product being purchased.
    pub product_id: ProductId,
    /// Quantity, always positive.
    pub quantity: i64,
    /// Catalog unit price at the moment of add. Only refreshed by cart
    /// validation when the catalog price has drifted.
    pub unit_price: Money,
    /// Custom cut length for variable-dimension products.
    pub custom_length_cm: Option<i64>,
    /// Unit price derived from the custom length, when applicable.
    pub calculated_unit_price: Option<Money>,
    /// Gift wrapping requested.
    pub is_gift: bool,
    /// Gift note.
    pub gift_message: Option<String>,
    /// Item-level discount.
    pub discount_amount: Money,
}

impl CartItem {
    fn new(
        product: &ProductRecord,
        quantity: i64,
        custom_length_cm: Option<i64>,
    ) -> Result<Self, CommerceError> {
        let calculated_unit_price = match (custom_length_cm, product.price_per_cm) {
            (Some(_), Some(_)) => Some(product.unit_price_for(custom_length_cm)?),
            _ => None,
        };
        Ok(Self {
            id: CartItemId::generate(),
            product_id: product.id.clone(),
            quantity,
            unit_price: product.price,
            custom_length_cm,
            calculated_unit_price,
            is_gift: false,
            gift_message: None,
            discount_amount: Money::zero(product.price.currency),
        })
    }

    /// The price a unit actually sells at: the length-derived price for
    /// variable-dimension items, the captured catalog price otherwise.
    pub fn effective_unit_price(&self) -> Money {
        self.calculated_unit_price.unwrap_or(self.unit_price)
    }

    /// Line total before cart-level components.
    pub fn line_total(&self) -> Result<Money, CommerceError> {
        self.effective_unit_price()
            .try_multiply(self.quantity)
            .ok_or(CommerceError::Overflow)
    }

    /// Whether this line is for the given product and dimension variant.
    pub fn matches(&self, product_id: &ProductId, custom_length_cm: Option<i64>) -> bool {
        &self.product_id == product_id && self.custom_length_cm == custom_length_cm
    }

    /// Mark as a gift.
    pub fn set_gift(&mut self, message: Option<String>) {
        self.is_gift = true;
        self.gift_message = message;
    }
}

/// A shopping cart.
///
/// The discount/tax/shipping/total fields are a cached quote, refreshed by
/// the service layer after every mutation; the items are the source of
/// truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    /// Unique cart identifier.
    pub id: CartId,
    /// Owner: authenticated user or guest session/device pair.
    pub identity: CartIdentity,
    /// Lifecycle status.
    pub status: CartStatus,
    /// Items, unique by product + dimension variant.
    pub items: Vec<CartItem>,
    /// Applied discount code, if any. Unknown codes are kept with a zero
    /// amount rather than rejected.
    pub discount_code: Option<String>,
    /// Cached discount amount.
    pub discount_amount: Money,
    /// Cached tax amount.
    pub tax_amount: Money,
    /// Cached shipping amount.
    pub shipping_amount: Money,
    /// Cached grand total.
    pub total_amount: Money,
    /// Cart currency.
    pub currency: Currency,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of the last mutation.
    pub last_activity_at: i64,
    /// Unix timestamp past which the cart expires.
    pub expires_at: i64,
}

impl Cart {
    /// Create a new active cart.
    pub fn new(identity: CartIdentity, currency: Currency, ttl_secs: i64) -> Self {
        let now = current_timestamp();
        Self {
            id: CartId::generate(),
            identity,
            status: CartStatus::Active,
            items: Vec::new(),
            discount_code: None,
            discount_amount: Money::zero(currency),
            tax_amount: Money::zero(currency),
            shipping_amount: Money::zero(currency),
            total_amount: Money::zero(currency),
            currency,
            created_at: now,
            last_activity_at: now,
            expires_at: now + ttl_secs,
        }
    }

    fn ensure_modifiable(&self) -> Result<(), CommerceError> {
        if self.status.is_modifiable() {
            Ok(())
        } else {
            Err(CommerceError::CartNotModifiable {
                cart_id: self.id.to_string(),
                status: self.status.as_str().to_string(),
            })
        }
    }

    /// Add a product to the cart, merging with an existing line for the
    /// same product + dimension variant by summing quantities.
    ///
    /// The unit price is captured from the product's current price at the
    /// moment of add.
    pub fn add_item(
        &mut self,
        product: &ProductRecord,
        quantity: i64,
        custom_length_cm: Option<i64>,
    ) -> Result<CartItemId, CommerceError> {
        self.ensure_modifiable()?;
        if !product.is_available() {
            return Err(CommerceError::ProductUnavailable(product.id.to_string()));
        }
        if quantity <= 0 {
            return Err(CommerceError::InvalidQuantity(quantity));
        }

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.matches(&product.id, custom_length_cm))
        {
            let merged = existing
                .quantity
                .checked_add(quantity)
                .ok_or(CommerceError::Overflow)?;
            if merged > MAX_QUANTITY_PER_ITEM {
                return Err(CommerceError::QuantityExceedsLimit(
                    merged,
                    MAX_QUANTITY_PER_ITEM,
                ));
            }
            existing.quantity = merged;
            let id = existing.id.clone();
            self.touch();
            return Ok(id);
        }

        if quantity > MAX_QUANTITY_PER_ITEM {
            return Err(CommerceError::QuantityExceedsLimit(
                quantity,
                MAX_QUANTITY_PER_ITEM,
            ));
        }

        let item = CartItem::new(product, quantity, custom_length_cm)?;
        let id = item.id.clone();
        self.items.push(item);
        self.touch();
        Ok(id)
    }

    /// Set an item's quantity directly (not additive).
    ///
    /// A non-positive quantity removes the item; that is not an error.
    pub fn update_quantity(
        &mut self,
        item_id: &CartItemId,
        quantity: i64,
    ) -> Result<(), CommerceError> {
        self.ensure_modifiable()?;
        if quantity <= 0 {
            return self.remove_item(item_id);
        }
        if quantity > MAX_QUANTITY_PER_ITEM {
            return Err(CommerceError::QuantityExceedsLimit(
                quantity,
                MAX_QUANTITY_PER_ITEM,
            ));
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| &i.id == item_id)
            .ok_or_else(|| CommerceError::ItemNotInCart(item_id.to_string()))?;
        item.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Remove an item.
    pub fn remove_item(&mut self, item_id: &CartItemId) -> Result<(), CommerceError> {
        self.ensure_modifiable()?;
        let len_before = self.items.len();
        self.items.retain(|i| &i.id != item_id);
        if self.items.len() == len_before {
            return Err(CommerceError::ItemNotInCart(item_id.to_string()));
        }
        self.touch();
        Ok(())
    }

    /// Empty the cart. Status and discount code are untouched.
    pub fn clear(&mut self) -> Result<(), CommerceError> {
        self.ensure_modifiable()?;
        self.items.clear();
        self.touch();
        Ok(())
    }

    /// Record a discount code and its computed amount.
    pub fn set_discount(&mut self, code: impl Into<String>, amount: Money) -> Result<(), CommerceError> {
        self.ensure_modifiable()?;
        self.discount_code = Some(code.into());
        self.discount_amount = amount;
        self.touch();
        Ok(())
    }

    /// Clear the discount code and amount.
    pub fn clear_discount(&mut self) -> Result<(), CommerceError> {
        self.ensure_modifiable()?;
        self.discount_code = None;
        self.discount_amount = Money::zero(self.currency);
        self.touch();
        Ok(())
    }

    /// Sum of line totals.
    pub fn subtotal(&self) -> Result<Money, CommerceError> {
        let mut total = Money::zero(self.currency);
        for item in &self.items {
            total = total
                .try_add(&item.line_total()?)
                .ok_or(CommerceError::Overflow)?;
        }
        Ok(total)
    }

    /// Total unit count across lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Check if cart has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an item by ID.
    pub fn item(&self, item_id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.id == item_id)
    }

    /// Get a mutable item by ID.
    pub fn item_mut(&mut self, item_id: &CartItemId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| &i.id == item_id)
    }

    /// Whether the absolute TTL has passed.
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }

    /// Whether the cart has been inactive past the given window.
    pub fn is_stale(&self, now: i64, abandon_after_secs: i64) -> bool {
        now > self.last_activity_at + abandon_after_secs
    }

    /// Terminal transition after a successful checkout or a merge.
    pub fn mark_checked_out(&mut self) {
        self.status = CartStatus::CheckedOut;
        self.touch();
    }

    /// Sweep transition for inactive carts. Stamps the sweep's clock so
    /// scheduled runs stay deterministic.
    pub fn mark_abandoned(&mut self, now: i64) {
        self.status = CartStatus::Abandoned;
        self.last_activity_at = now;
    }

    /// Sweep transition for carts past their TTL.
    pub fn mark_expired(&mut self, now: i64) {
        self.status = CartStatus::Expired;
        self.last_activity_at = now;
    }

    /// Update the activity timestamp.
    pub fn touch(&mut self) {
        self.last_activity_at = current_timestamp();
    }
}

/// Get current Unix timestamp.
fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
