//! Identity-keyed cart operations over the stores.
//!
//! The [`Cart`](crate::cart::Cart) aggregate owns the item rules; this
//! service resolves products, enforces the one-active-cart-per-identity
//! rule through the store, and keeps the cached pricing fields fresh after
//! every mutation.

use crate::cart::cart::{Cart, CartIdentity, CartStatus};
use crate::cart::pricing::{self, PaymentMethod, Quote, RateCard, ShippingMethod};
use crate::cart::validation::{CartValidation, IssueCode, ValidationIssue};
use crate::cart::MergeReport;
use crate::config::CommerceConfig;
use crate::error::CommerceError;
use crate::ids::{CartId, CartItemId, ProductId, SessionId, UserId};
use crate::store::{CartStore, ProductCatalog};
use std::sync::Arc;
use tracing::{debug, info};

/// Store-backed cart operations.
pub struct CartService {
    carts: Arc<CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    rates: RateCard,
    config: CommerceConfig,
}

impl CartService {
    pub fn new(
        carts: Arc<CartStore>,
        catalog: Arc<dyn ProductCatalog>,
        rates: RateCard,
        config: CommerceConfig,
    ) -> Self {
        Self {
            carts,
            catalog,
            rates,
            config,
        }
    }

    /// The backing cart store.
    pub fn carts(&self) -> &Arc<CartStore> {
        &self.carts
    }

    /// The product catalog.
    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.catalog
    }

    /// The rate tables used for pricing.
    pub fn rates(&self) -> &RateCard {
        &self.rates
    }

    /// The identity's Active cart, created on first touch.
    pub fn fetch_or_create(&self, identity: CartIdentity) -> Cart {
        if let CartIdentity::User(user_id) = &identity {
            let owner = user_id.clone();
            return self.carts.get_or_create_for_user(user_id, || {
                Cart::new(
                    CartIdentity::User(owner),
                    self.config.currency,
                    self.config.cart_ttl_secs,
                )
            });
        }
        match self.carts.active_for(&identity) {
            Some(cart) => cart,
            None => {
                let cart = Cart::new(identity, self.config.currency, self.config.cart_ttl_secs);
                self.carts.insert(cart.clone());
                cart
            }
        }
    }

    /// Add a product to a cart.
    pub fn add_item(
        &self,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: i64,
        custom_length_cm: Option<i64>,
    ) -> Result<Cart, CommerceError> {
        let product = self.catalog.product(product_id)?;
        self.carts.with_mut(cart_id, |cart| {
            cart.add_item(&product, quantity, custom_length_cm)?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Set a line item's quantity; non-positive removes it.
    pub fn update_quantity(
        &self,
        cart_id: &CartId,
        item_id: &CartItemId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            cart.update_quantity(item_id, quantity)?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Remove a line item.
    pub fn remove_item(&self, cart_id: &CartId, item_id: &CartItemId) -> Result<Cart, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            cart.remove_item(item_id)?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Empty a cart.
    pub fn clear(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            cart.clear()?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Apply a discount code. Unknown codes are kept with a zero amount;
    /// they never block the cart.
    pub fn apply_discount(&self, cart_id: &CartId, code: &str) -> Result<Cart, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            let subtotal = cart.subtotal()?;
            let amount = match self.rates.resolve_discount(code) {
                Some(value) => value.amount_for(&subtotal),
                None => {
                    debug!(cart = %cart_id, code, "unknown discount code, applying zero");
                    crate::money::Money::zero(cart.currency)
                }
            };
            cart.set_discount(code.trim().to_uppercase(), amount)?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Remove any applied discount code.
    pub fn remove_discount(&self, cart_id: &CartId) -> Result<Cart, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            cart.clear_discount()?;
            refresh_cached(&self.rates, cart)
        })?;
        self.carts.get(cart_id)
    }

    /// Price the cart for a checkout context and refresh the cached
    /// amounts so the order later carries exactly these numbers.
    pub fn quote(
        &self,
        cart_id: &CartId,
        region: Option<&str>,
        shipping_method: Option<ShippingMethod>,
        payment_method: Option<PaymentMethod>,
    ) -> Result<Quote, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            let subtotal = cart.subtotal()?;
            let quote = pricing::quote(
                &self.rates,
                subtotal,
                region,
                shipping_method,
                cart.discount_code.as_deref(),
                payment_method,
            )?;
            cache_quote(cart, &quote);
            Ok(quote)
        })
    }

    /// Validate a cart against the live catalog.
    ///
    /// Problems are aggregated, never short-circuited: availability and
    /// stock shortfalls are errors, price drift is a warning. Drifted
    /// prices are refreshed in place — validation is the one read-path
    /// call that may write, and the report's `has_changes` says it did.
    pub fn validate(&self, cart_id: &CartId) -> Result<CartValidation, CommerceError> {
        self.carts.with_mut(cart_id, |cart| {
            if cart.status != CartStatus::Active {
                return Err(CommerceError::CartNotModifiable {
                    cart_id: cart_id.to_string(),
                    status: cart.status.as_str().to_string(),
                });
            }

            let mut report = CartValidation::default();
            if cart.is_empty() {
                report
                    .errors
                    .push(ValidationIssue::cart_level(IssueCode::EmptyCart, "Cart has no items"));
            }

            for item in &mut cart.items {
                let product = match self.catalog.product(&item.product_id) {
                    Ok(product) => product,
                    Err(_) => {
                        report.errors.push(ValidationIssue::for_item(
                            IssueCode::ProductMissing,
                            item.id.clone(),
                            item.product_id.clone(),
                            "Product is no longer sold; remove it from the cart",
                        ));
                        continue;
                    }
                };

                if !product.is_available() {
                    report.errors.push(ValidationIssue::for_item(
                        IssueCode::ProductInactive,
                        item.id.clone(),
                        item.product_id.clone(),
                        format!("{} is currently unavailable", product.name),
                    ));
                    continue;
                }

                if !product.stock.can_reserve(item.quantity) {
                    let available = product.stock.available().max(0);
                    report.errors.push(ValidationIssue::for_item(
                        IssueCode::InsufficientStock,
                        item.id.clone(),
                        item.product_id.clone(),
                        format!(
                            "Only {available} of {} in stock; reduce quantity to {available}",
                            product.name
                        ),
                    ));
                }

                // Price drift: warn and silently commit the correction.
                if item.unit_price != product.price {
                    report.warnings.push(ValidationIssue::for_item(
                        IssueCode::PriceChanged,
                        item.id.clone(),
                        item.product_id.clone(),
                        format!(
                            "Price of {} changed from {} to {}",
                            product.name,
                            item.unit_price.display(),
                            product.price.display()
                        ),
                    ));
                    item.unit_price = product.price;
                    report.has_changes = true;
                }
                if item.custom_length_cm.is_some() {
                    let recalculated = product.unit_price_for(item.custom_length_cm)?;
                    if item.calculated_unit_price != Some(recalculated) {
                        report.warnings.push(ValidationIssue::for_item(
                            IssueCode::PriceChanged,
                            item.id.clone(),
                            item.product_id.clone(),
                            format!("Cut-length price of {} was refreshed", product.name),
                        ));
                        item.calculated_unit_price = Some(recalculated);
                        report.has_changes = true;
                    }
                }
            }

            if report.has_changes {
                refresh_cached(&self.rates, cart)?;
            }
            Ok(report)
        })
    }

    /// Merge every Active guest cart matching the session or device
    /// fingerprint into the user's cart. Called once at login.
    pub fn merge_at_login(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        device_fingerprint: &str,
    ) -> Result<MergeReport, CommerceError> {
        let target = self.fetch_or_create(CartIdentity::User(user_id.clone()));
        let guests = self
            .carts
            .active_guest_carts(session_id, device_fingerprint);

        let mut merged_carts = 0;
        let mut merged_items = 0;
        for guest in &guests {
            if let Some(carried) = self.carts.absorb(&target.id, &guest.id)? {
                merged_carts += 1;
                merged_items += carried;
            }
        }

        if merged_items > 0 {
            self.carts
                .with_mut(&target.id, |cart| refresh_cached(&self.rates, cart))?;
        }
        if merged_carts > 0 {
            info!(
                user = %user_id,
                merged_carts,
                merged_items,
                "guest carts merged at login"
            );
        }

        Ok(MergeReport {
            target_cart_id: target.id,
            merged_carts,
            merged_items,
        })
    }
}

/// Recompute the cached pricing fields from the cart's own state.
///
/// Uses the default region and shipping method; `CartService::quote`
/// overwrites the cache with checkout-context numbers.
fn refresh_cached(rates: &RateCard, cart: &mut Cart) -> Result<(), CommerceError> {
    let subtotal = cart.subtotal()?;
    let quote = pricing::quote(
        rates,
        subtotal,
        None,
        None,
        cart.discount_code.as_deref(),
        None,
    )?;
    cache_quote(cart, &quote);
    Ok(())
}

fn cache_quote(cart: &mut Cart, quote: &Quote) {
    cart.discount_amount = quote.discount_total;
    cart.tax_amount = quote.tax_total;
    cart.shipping_amount = quote.shipping_total;
    cart.total_amount = quote.grand_total;
}
