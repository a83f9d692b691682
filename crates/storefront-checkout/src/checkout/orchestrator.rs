//! Checkout orchestration.
//!
//! Turns an Active cart into an immutable order: re-validate, check
//! address ownership, reserve stock item by item, snapshot, persist,
//! retire the cart. Any failure along the way releases every reservation
//! made during the attempt, so a failed checkout is a no-op.

use crate::cart::{Cart, CartService, PaymentMethod, Quote, ShippingMethod};
use crate::checkout::{AddressRecord, Order, OrderAddress, OrderItem, OrderStatus};
use crate::error::CommerceError;
use crate::ids::{AddressId, CartId, OrderId, ProductId, UserId};
use crate::money::Money;
use crate::store::{AddressBook, OrderStore, StockLedger};
use std::sync::Arc;
use tracing::info;

/// Everything checkout needs from the caller.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Cart to convert.
    pub cart_id: CartId,
    /// Authenticated customer.
    pub user_id: UserId,
    /// Saved billing address.
    pub billing_address_id: AddressId,
    /// Saved shipping address.
    pub shipping_address_id: AddressId,
    /// Shipping method; defaults to standard.
    pub shipping_method: Option<ShippingMethod>,
    /// How the customer will pay.
    pub payment_method: PaymentMethod,
}

/// The checkout orchestrator.
pub struct Checkout {
    cart_service: CartService,
    orders: Arc<OrderStore>,
    ledger: Arc<dyn StockLedger>,
    addresses: Arc<dyn AddressBook>,
}

impl Checkout {
    pub fn new(
        cart_service: CartService,
        orders: Arc<OrderStore>,
        ledger: Arc<dyn StockLedger>,
        addresses: Arc<dyn AddressBook>,
    ) -> Self {
        Self {
            cart_service,
            orders,
            ledger,
            addresses,
        }
    }

    /// Convert a cart into an order.
    ///
    /// Either the order is created with every item reserved, or nothing
    /// happened: no order row, no net reservation change, cart still
    /// Active.
    pub fn place_order(&self, req: &CheckoutRequest) -> Result<Order, CommerceError> {
        let carts = self.cart_service.carts();

        // Re-validate; the aggregated error list goes back to the client.
        // This also refreshes drifted prices before anything is priced.
        let validation = self.cart_service.validate(&req.cart_id)?;
        if !validation.is_valid() {
            return Err(CommerceError::CheckoutBlocked(validation.errors));
        }

        let cart = carts.get(&req.cart_id)?;
        if cart.identity.user_id() != Some(&req.user_id) {
            return Err(CommerceError::OwnershipMismatch { resource: "cart" });
        }

        let billing = self.addresses.address(&req.billing_address_id)?;
        let shipping = self.addresses.address(&req.shipping_address_id)?;
        if billing.owner != req.user_id || shipping.owner != req.user_id {
            return Err(CommerceError::OwnershipMismatch { resource: "address" });
        }

        let order_number = Order::generate_order_number();

        // Price in the real checkout context and cache it on the cart, so
        // the order carries exactly the numbers the customer saw.
        let quote = self.cart_service.quote(
            &req.cart_id,
            shipping.state.as_deref(),
            req.shipping_method,
            Some(req.payment_method),
        )?;
        let cart = carts.get(&req.cart_id)?;

        // Reserve in insertion order; the first shortfall aborts the whole
        // attempt and backs out every hold taken so far.
        let mut reserved: Vec<(ProductId, i64)> = Vec::new();
        for item in &cart.items {
            if let Err(e) = self.ledger.reserve(&item.product_id, item.quantity) {
                self.release_all(&reserved);
                return Err(e);
            }
            reserved.push((item.product_id.clone(), item.quantity));
        }

        match self.finalize(req, &cart, &quote, order_number, &billing, &shipping) {
            Ok(order) => Ok(order),
            Err(e) => {
                self.release_all(&reserved);
                Err(e)
            }
        }
    }

    /// Snapshot, persist, and retire the cart. Runs only after every
    /// reservation succeeded; the caller compensates if this fails.
    fn finalize(
        &self,
        req: &CheckoutRequest,
        cart: &Cart,
        quote: &Quote,
        order_number: String,
        billing: &AddressRecord,
        shipping: &AddressRecord,
    ) -> Result<Order, CommerceError> {
        let catalog = self.cart_service.catalog();

        let mut items = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = catalog.product(&item.product_id)?;
            items.push(OrderItem::snapshot(item, &product)?);
        }

        let subtotal = Money::try_sum(items.iter().map(|i| &i.line_total), cart.currency)
            .ok_or(CommerceError::Overflow)?;
        let total = subtotal
            .try_subtract(&quote.discount_total)
            .and_then(|t| t.try_add(&quote.tax_total))
            .and_then(|t| t.try_add(&quote.shipping_total))
            .ok_or(CommerceError::Overflow)?;

        let now = current_timestamp();
        let mut order = Order {
            id: OrderId::generate(),
            order_number,
            user_id: req.user_id.clone(),
            status: OrderStatus::OrderRaised,
            items,
            subtotal,
            discount_amount: quote.discount_total,
            tax_amount: quote.tax_total,
            shipping_amount: quote.shipping_total,
            total_amount: total,
            currency: cart.currency,
            billing_address: OrderAddress::snapshot(billing),
            shipping_address: OrderAddress::snapshot(shipping),
            payment_method: req.payment_method,
            payment_transaction_id: None,
            status_history: Vec::new(),
            created_at: now,
            updated_at: now,
            delivered_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        };
        order.record_status(None, Some("Order placed".to_string()), None, true);
        debug_assert!(order.totals_consistent());

        self.orders.insert(order.clone());
        if let Err(e) = self
            .cart_service
            .carts()
            .with_mut(&req.cart_id, |c| {
                c.mark_checked_out();
                Ok(())
            })
        {
            self.orders.remove(&order.id);
            return Err(e);
        }

        info!(
            order = %order.order_number,
            cart = %req.cart_id,
            items = order.items.len(),
            total_cents = order.total_amount.amount_cents,
            "checkout complete"
        );
        Ok(order)
    }

    /// Back out reservations from a failed attempt, newest first.
    fn release_all(&self, reserved: &[(ProductId, i64)]) {
        for (product_id, quantity) in reserved.iter().rev() {
            // Release is best-effort by contract; mismatches are logged
            // inside the ledger.
            let _ = self.ledger.release(product_id, *quantity);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartIdentity, CartStatus, RateCard};
    use crate::catalog::ProductRecord;
    use crate::config::CommerceConfig;
    use crate::money::Currency;
    use crate::store::{CartStore, InMemoryAddressBook, InMemoryCatalog, ProductCatalog};

    struct Fixture {
        checkout: Checkout,
        catalog: Arc<InMemoryCatalog>,
        addresses: Arc<InMemoryAddressBook>,
        orders: Arc<OrderStore>,
        user: UserId,
        cart_id: CartId,
    }

    fn fixture(stock: &[(&str, i64, i64)]) -> Fixture {
        let catalog = Arc::new(InMemoryCatalog::new());
        for (id, price, on_hand) in stock {
            catalog.insert(ProductRecord::new(
                ProductId::new(*id),
                format!("SKU-{id}"),
                format!("Product {id}"),
                Money::new(*price, Currency::USD),
                *on_hand,
            ));
        }

        let addresses = Arc::new(InMemoryAddressBook::new());
        let user = UserId::new("user-1");
        for addr in ["addr-bill", "addr-ship"] {
            addresses.insert(
                AddressRecord::new(
                    AddressId::new(addr),
                    user.clone(),
                    "Jane Smith",
                    "456 Oak Ave",
                    "Los Angeles",
                    "90001",
                    "United States",
                )
                .with_state("CA"),
            );
        }

        let carts = Arc::new(CartStore::new());
        let cart_service = CartService::new(
            carts,
            catalog.clone() as Arc<dyn ProductCatalog>,
            RateCard::default(),
            CommerceConfig::default(),
        );
        let cart = cart_service.fetch_or_create(CartIdentity::User(user.clone()));
        let cart_id = cart.id.clone();

        let orders = Arc::new(OrderStore::new());
        let checkout = Checkout::new(
            cart_service,
            orders.clone(),
            catalog.clone() as Arc<dyn StockLedger>,
            addresses.clone() as Arc<dyn AddressBook>,
        );

        Fixture {
            checkout,
            catalog,
            addresses,
            orders,
            user,
            cart_id,
        }
    }

    fn request(f: &Fixture) -> CheckoutRequest {
        CheckoutRequest {
            cart_id: f.cart_id.clone(),
            user_id: f.user.clone(),
            billing_address_id: AddressId::new("addr-bill"),
            shipping_address_id: AddressId::new("addr-ship"),
            shipping_method: None,
            payment_method: PaymentMethod::Card,
        }
    }

    fn add(f: &Fixture, product: &str, qty: i64) {
        f.checkout
            .cart_service
            .add_item(&f.cart_id, &ProductId::new(product), qty, None)
            .unwrap();
    }

    #[test]
    fn test_successful_checkout() {
        let f = fixture(&[("p1", 2500, 10), ("p2", 1200, 5)]);
        add(&f, "p1", 2);
        add(&f, "p2", 1);

        let order = f.checkout.place_order(&request(&f)).unwrap();

        assert_eq!(order.status, OrderStatus::OrderRaised);
        assert!(order.order_number.starts_with("ORD-"));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.subtotal.amount_cents, 6200);
        assert!(order.totals_consistent());
        assert_eq!(order.status_history.len(), 1);

        // Stock held, cart retired.
        let p1 = f.catalog.product(&ProductId::new("p1")).unwrap();
        assert_eq!(p1.stock.reserved, 2);
        let cart = f.checkout.cart_service.carts().get(&f.cart_id).unwrap();
        assert_eq!(cart.status, CartStatus::CheckedOut);
    }

    #[test]
    fn test_order_snapshots_survive_product_edits() {
        let f = fixture(&[("p1", 2500, 10)]);
        add(&f, "p1", 1);
        let order = f.checkout.place_order(&request(&f)).unwrap();

        f.catalog
            .set_price(&ProductId::new("p1"), Money::new(9900, Currency::USD))
            .unwrap();

        let stored = f.orders.get(&order.id).unwrap();
        assert_eq!(stored.items[0].unit_price.amount_cents, 2500);
        assert_eq!(stored.items[0].name, "Product p1");
    }

    #[test]
    fn test_tax_uses_shipping_address_region() {
        let f = fixture(&[("p1", 2500, 10)]);
        add(&f, "p1", 4); // subtotal 100.00, CA tax 7.25%

        let order = f.checkout.place_order(&request(&f)).unwrap();
        assert_eq!(order.tax_amount.amount_cents, 725);
    }

    #[test]
    fn test_insufficient_stock_blocks_before_reservation() {
        let f = fixture(&[("p1", 1000, 10), ("p2", 1000, 1)]);
        add(&f, "p1", 2);
        add(&f, "p2", 5);

        let err = f.checkout.place_order(&request(&f)).unwrap_err();
        // validate() reports the shortfall as a blocked checkout with an
        // enumerable issue list.
        match err {
            CommerceError::CheckoutBlocked(issues) => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].message.contains("reduce quantity to 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(f.orders.is_empty());
        let cart = f.checkout.cart_service.carts().get(&f.cart_id).unwrap();
        assert_eq!(cart.status, CartStatus::Active);
    }

    #[test]
    fn test_partial_reservation_rolls_back() {
        // Two cut-length lines of the same fabric each pass per-line
        // validation (5 in stock, 3 each) but cannot both be reserved.
        // Item 3 fails mid-loop; items 1 and 2 must be released again.
        let f = fixture(&[("p1", 1000, 10), ("fabric", 0, 5)]);
        let per_cm = Money::new(10, Currency::USD);
        let mut fabric = f.catalog.product(&ProductId::new("fabric")).unwrap();
        fabric.price = Money::new(1000, Currency::USD);
        fabric = fabric.with_price_per_cm(per_cm);
        f.catalog.insert(fabric);

        add(&f, "p1", 2);
        f.checkout
            .cart_service
            .add_item(&f.cart_id, &ProductId::new("fabric"), 3, Some(100))
            .unwrap();
        f.checkout
            .cart_service
            .add_item(&f.cart_id, &ProductId::new("fabric"), 3, Some(200))
            .unwrap();

        let err = f.checkout.place_order(&request(&f)).unwrap_err();
        assert!(matches!(err, CommerceError::InsufficientStock { .. }));

        // No order, no net reservation change, cart still Active.
        assert!(f.orders.is_empty());
        for id in ["p1", "fabric"] {
            let p = f.catalog.product(&ProductId::new(id)).unwrap();
            assert_eq!(p.stock.reserved, 0, "product {id} still holds stock");
        }
        let cart = f.checkout.cart_service.carts().get(&f.cart_id).unwrap();
        assert_eq!(cart.status, CartStatus::Active);
    }

    #[test]
    fn test_missing_address_rejected() {
        let f = fixture(&[("p1", 1000, 10)]);
        add(&f, "p1", 1);

        let mut req = request(&f);
        req.billing_address_id = AddressId::new("addr-missing");
        assert!(matches!(
            f.checkout.place_order(&req),
            Err(CommerceError::AddressNotFound(_))
        ));
    }

    #[test]
    fn test_foreign_address_rejected() {
        let f = fixture(&[("p1", 1000, 10)]);
        add(&f, "p1", 1);

        // An address owned by someone else is an ownership error.
        f.addresses.insert(AddressRecord::new(
            AddressId::new("addr-foreign"),
            UserId::new("user-2"),
            "Mallory",
            "1 Elm St",
            "Springfield",
            "00000",
            "United States",
        ));
        let mut req = request(&f);
        req.shipping_address_id = AddressId::new("addr-foreign");
        assert!(matches!(
            f.checkout.place_order(&req),
            Err(CommerceError::OwnershipMismatch {
                resource: "address"
            })
        ));

        // Nothing was reserved by the rejected attempt.
        let p1 = f.catalog.product(&ProductId::new("p1")).unwrap();
        assert_eq!(p1.stock.reserved, 0);
        assert!(f.orders.is_empty());
    }

    #[test]
    fn test_empty_cart_blocked() {
        let f = fixture(&[("p1", 1000, 10)]);
        let err = f.checkout.place_order(&request(&f)).unwrap_err();
        assert!(matches!(err, CommerceError::CheckoutBlocked(_)));
    }

    #[test]
    fn test_checked_out_cart_cannot_checkout_again() {
        let f = fixture(&[("p1", 1000, 10)]);
        add(&f, "p1", 1);
        f.checkout.place_order(&request(&f)).unwrap();

        let err = f.checkout.place_order(&request(&f)).unwrap_err();
        assert!(matches!(err, CommerceError::CartNotModifiable { .. }));
    }
}
