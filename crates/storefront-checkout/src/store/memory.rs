//! In-memory stores.

use crate::cart::{Cart, CartIdentity, CartStatus};
use crate::catalog::{ProductRecord, StockLevel};
use crate::checkout::{AddressRecord, Order};
use crate::error::CommerceError;
use crate::ids::{AddressId, CartId, OrderId, ProductId, SessionId, UserId};
use crate::money::Money;
use crate::store::{AddressBook, PaymentGateway, ProductCatalog, StockLedger};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::warn;

/// Bounded retries for optimistic stock updates.
const STOCK_RETRY_LIMIT: u32 = 5;

/// In-memory product catalog doubling as the stock ledger.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, ProductRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product.
    pub fn insert(&self, product: ProductRecord) {
        self.products
            .write()
            .expect("catalog lock poisoned")
            .insert(product.id.clone(), product);
    }

    /// Overwrite a product's price (catalog-side edit).
    pub fn set_price(&self, id: &ProductId, price: Money) -> Result<(), CommerceError> {
        let mut products = self.products.write().expect("catalog lock poisoned");
        let product = products
            .get_mut(id)
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))?;
        product.price = price;
        Ok(())
    }

    /// Deactivate a product (catalog-side edit).
    pub fn deactivate(&self, id: &ProductId) -> Result<(), CommerceError> {
        let mut products = self.products.write().expect("catalog lock poisoned");
        let product = products
            .get_mut(id)
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))?;
        product.active = false;
        Ok(())
    }

    /// Optimistic stock update: read a copy of the counters, apply the
    /// mutation to it, then commit only if the version is unchanged.
    /// A stale version is retried up to the limit, then surfaced as a
    /// first-class `StaleStock` result.
    fn update_stock<T>(
        &self,
        id: &ProductId,
        mut apply: impl FnMut(&mut StockLevel) -> Result<T, CommerceError>,
    ) -> Result<T, CommerceError> {
        for _ in 0..STOCK_RETRY_LIMIT {
            let (mut stock, seen_version) = {
                let products = self.products.read().expect("catalog lock poisoned");
                let product = products
                    .get(id)
                    .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))?;
                (product.stock.clone(), product.stock.version)
            };

            let out = apply(&mut stock)?;

            let mut products = self.products.write().expect("catalog lock poisoned");
            let product = products
                .get_mut(id)
                .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))?;
            if product.stock.version == seen_version {
                product.stock = stock;
                return Ok(out);
            }
            // Someone else committed in between; reload and retry.
        }
        Err(CommerceError::StaleStock(id.to_string()))
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product(&self, id: &ProductId) -> Result<ProductRecord, CommerceError> {
        self.products
            .read()
            .expect("catalog lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| CommerceError::ProductNotFound(id.to_string()))
    }
}

impl StockLedger for InMemoryCatalog {
    fn can_reserve(&self, id: &ProductId, quantity: i64) -> Result<bool, CommerceError> {
        Ok(self.product(id)?.stock.can_reserve(quantity))
    }

    fn reserve(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError> {
        self.update_stock(id, |stock| {
            if stock.reserve(quantity) {
                Ok(())
            } else {
                Err(CommerceError::InsufficientStock {
                    product_id: id.to_string(),
                    requested: quantity,
                    available: stock.available(),
                })
            }
        })
    }

    fn release(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError> {
        let unmatched = match self.update_stock(id, |stock| Ok(stock.release(quantity))) {
            Ok(unmatched) => unmatched,
            Err(e) => {
                // Release must never block a cancellation; log and move on.
                warn!(product = %id, quantity, error = %e, "stock release skipped");
                return Ok(());
            }
        };
        if unmatched > 0 {
            warn!(
                product = %id,
                quantity,
                unmatched,
                "released more than was reserved"
            );
        }
        Ok(())
    }

    fn fulfill(&self, id: &ProductId, quantity: i64) -> Result<(), CommerceError> {
        self.update_stock(id, |stock| {
            if stock.fulfill(quantity) {
                Ok(())
            } else {
                Err(CommerceError::FulfillExceedsReserved {
                    product_id: id.to_string(),
                    requested: quantity,
                    reserved: stock.reserved,
                })
            }
        })
    }
}

/// In-memory address book.
#[derive(Default)]
pub struct InMemoryAddressBook {
    addresses: RwLock<HashMap<AddressId, AddressRecord>>,
}

impl InMemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an address.
    pub fn insert(&self, address: AddressRecord) {
        self.addresses
            .write()
            .expect("address lock poisoned")
            .insert(address.id.clone(), address);
    }
}

impl AddressBook for InMemoryAddressBook {
    fn address(&self, id: &AddressId) -> Result<AddressRecord, CommerceError> {
        self.addresses
            .read()
            .expect("address lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| CommerceError::AddressNotFound(id.to_string()))
    }
}

/// In-memory cart store.
///
/// Enforces the single-active-cart-per-identity rule at the store level.
#[derive(Default)]
pub struct CartStore {
    carts: RwLock<HashMap<CartId, Cart>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cart.
    pub fn insert(&self, cart: Cart) {
        self.carts
            .write()
            .expect("cart lock poisoned")
            .insert(cart.id.clone(), cart);
    }

    /// Fetch a cart by id.
    pub fn get(&self, id: &CartId) -> Result<Cart, CommerceError> {
        self.carts
            .read()
            .expect("cart lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| CommerceError::CartNotFound(id.to_string()))
    }

    /// Mutate a cart under the store lock and return the updated copy.
    pub fn with_mut<T>(
        &self,
        id: &CartId,
        f: impl FnOnce(&mut Cart) -> Result<T, CommerceError>,
    ) -> Result<T, CommerceError> {
        let mut carts = self.carts.write().expect("cart lock poisoned");
        let cart = carts
            .get_mut(id)
            .ok_or_else(|| CommerceError::CartNotFound(id.to_string()))?;
        f(cart)
    }

    /// The single Active cart for an identity, if present.
    pub fn active_for(&self, identity: &CartIdentity) -> Option<Cart> {
        self.carts
            .read()
            .expect("cart lock poisoned")
            .values()
            .find(|c| c.status == CartStatus::Active && &c.identity == identity)
            .cloned()
    }

    /// All Active guest carts matching a session id or device fingerprint.
    pub fn active_guest_carts(
        &self,
        session_id: &SessionId,
        device_fingerprint: &str,
    ) -> Vec<Cart> {
        self.carts
            .read()
            .expect("cart lock poisoned")
            .values()
            .filter(|c| {
                c.status == CartStatus::Active
                    && c.identity.matches_guest(session_id, device_fingerprint)
            })
            .cloned()
            .collect()
    }

    /// The user's Active cart, created on demand.
    pub fn get_or_create_for_user(
        &self,
        user_id: &UserId,
        make: impl FnOnce() -> Cart,
    ) -> Cart {
        let identity = CartIdentity::User(user_id.clone());
        let mut carts = self.carts.write().expect("cart lock poisoned");
        if let Some(existing) = carts
            .values()
            .find(|c| c.status == CartStatus::Active && c.identity == identity)
        {
            return existing.clone();
        }
        let cart = make();
        carts.insert(cart.id.clone(), cart.clone());
        cart
    }

    /// Absorb a guest cart into a target cart under one lock, so a racing
    /// item add and a merge on the same carts serialize.
    ///
    /// Returns `Some(items_carried)` if the donor was Active, `None` if it
    /// had already been retired (repeat merges are no-ops).
    pub fn absorb(
        &self,
        target_id: &CartId,
        donor_id: &CartId,
    ) -> Result<Option<usize>, CommerceError> {
        let mut carts = self.carts.write().expect("cart lock poisoned");
        let mut donor = carts
            .remove(donor_id)
            .ok_or_else(|| CommerceError::CartNotFound(donor_id.to_string()))?;
        let target = match carts.get_mut(target_id) {
            Some(target) => target,
            None => {
                carts.insert(donor_id.clone(), donor);
                return Err(CommerceError::CartNotFound(target_id.to_string()));
            }
        };

        let was_active = donor.status == CartStatus::Active;
        let carried = crate::cart::absorb_guest_cart(target, &mut donor);
        carts.insert(donor_id.clone(), donor);
        Ok(was_active.then_some(carried))
    }

    /// Remove a cart outright (sweep).
    pub fn remove(&self, id: &CartId) -> bool {
        self.carts
            .write()
            .expect("cart lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Project over every cart (read-only scan).
    pub fn scan<T>(&self, f: impl Fn(&Cart) -> Option<T>) -> Vec<T> {
        self.carts
            .read()
            .expect("cart lock poisoned")
            .values()
            .filter_map(f)
            .collect()
    }
}

/// In-memory order store.
#[derive(Default)]
pub struct OrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a new order.
    pub fn insert(&self, order: Order) {
        self.orders
            .write()
            .expect("order lock poisoned")
            .insert(order.id.clone(), order);
    }

    /// Fetch an order by id.
    pub fn get(&self, id: &OrderId) -> Result<Order, CommerceError> {
        self.orders
            .read()
            .expect("order lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))
    }

    /// Mutate an order under the store lock.
    pub fn with_mut<T>(
        &self,
        id: &OrderId,
        f: impl FnOnce(&mut Order) -> Result<T, CommerceError>,
    ) -> Result<T, CommerceError> {
        let mut orders = self.orders.write().expect("order lock poisoned");
        let order = orders
            .get_mut(id)
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))?;
        f(order)
    }

    /// Remove an order (compensating rollback during checkout).
    pub fn remove(&self, id: &OrderId) -> bool {
        self.orders
            .write()
            .expect("order lock poisoned")
            .remove(id)
            .is_some()
    }

    /// All orders for a user, newest first.
    pub fn orders_for_user(&self, user_id: &UserId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .expect("order lock poisoned")
            .values()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.read().expect("order lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payment gateway stub for tests and local wiring.
#[derive(Default)]
pub struct MockGateway {
    sequence: AtomicU64,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentGateway for MockGateway {
    fn create_payment_order(&self, _amount: Money) -> Result<String, CommerceError> {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        Ok(format!("gw_order_{n}"))
    }

    fn verify_payment(
        &self,
        _gateway_order_id: &str,
        _payment_id: &str,
        signature: &str,
    ) -> Result<bool, CommerceError> {
        Ok(!signature.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use std::sync::Arc;

    fn catalog_with(id: &str, on_hand: i64) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductRecord::new(
            ProductId::new(id),
            format!("SKU-{id}"),
            format!("Product {id}"),
            Money::new(1000, Currency::USD),
            on_hand,
        ));
        catalog
    }

    #[test]
    fn test_reserve_and_release_roundtrip() {
        let catalog = catalog_with("p1", 5);
        let id = ProductId::new("p1");

        catalog.reserve(&id, 3).unwrap();
        assert_eq!(catalog.product(&id).unwrap().stock.reserved, 3);

        catalog.release(&id, 3).unwrap();
        assert_eq!(catalog.product(&id).unwrap().stock.reserved, 0);
    }

    #[test]
    fn test_reserve_insufficient_reports_availability() {
        let catalog = catalog_with("p1", 2);
        let id = ProductId::new("p1");

        let err = catalog.reserve(&id, 3).unwrap_err();
        match err {
            CommerceError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_release_never_fails() {
        let catalog = catalog_with("p1", 2);
        let id = ProductId::new("p1");

        // Over-release and missing product both succeed quietly.
        catalog.release(&id, 10).unwrap();
        catalog.release(&ProductId::new("ghost"), 1).unwrap();
    }

    #[test]
    fn test_fulfill_requires_reservation() {
        let catalog = catalog_with("p1", 5);
        let id = ProductId::new("p1");

        catalog.reserve(&id, 2).unwrap();
        assert!(matches!(
            catalog.fulfill(&id, 3),
            Err(CommerceError::FulfillExceedsReserved { .. })
        ));
        catalog.fulfill(&id, 2).unwrap();

        let stock = catalog.product(&id).unwrap().stock;
        assert_eq!(stock.on_hand, 3);
        assert_eq!(stock.reserved, 0);
    }

    #[test]
    fn test_concurrent_reservation_of_last_units() {
        let catalog = Arc::new(catalog_with("p1", 2));
        let id = ProductId::new("p1");

        // One checkout wants both units, another wants one; at most one
        // can win and reserved must end at <= 2.
        let a = {
            let catalog = Arc::clone(&catalog);
            let id = id.clone();
            std::thread::spawn(move || catalog.reserve(&id, 2))
        };
        let b = {
            let catalog = Arc::clone(&catalog);
            let id = id.clone();
            std::thread::spawn(move || catalog.reserve(&id, 1))
        };

        let results = [a.join().unwrap(), b.join().unwrap()];
        let stock = catalog.product(&id).unwrap().stock;

        // Exactly one reservation wins; the counters never oversell.
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(stock.reserved <= 2);
        assert!(stock.available() >= 0);
    }

    #[test]
    fn test_cart_store_single_active_per_user() {
        let store = CartStore::new();
        let user = UserId::new("user-1");

        let first = store.get_or_create_for_user(&user, || {
            Cart::new(CartIdentity::User(user.clone()), Currency::USD, 3600)
        });
        let second = store.get_or_create_for_user(&user, || {
            Cart::new(CartIdentity::User(user.clone()), Currency::USD, 3600)
        });

        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_guest_cart_lookup_by_session_or_fingerprint() {
        let store = CartStore::new();
        let by_session = Cart::new(
            CartIdentity::guest(SessionId::new("sess-1"), "fp-a"),
            Currency::USD,
            3600,
        );
        let by_fingerprint = Cart::new(
            CartIdentity::guest(SessionId::new("sess-2"), "fp-b"),
            Currency::USD,
            3600,
        );
        store.insert(by_session);
        store.insert(by_fingerprint);

        let found = store.active_guest_carts(&SessionId::new("sess-1"), "fp-b");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_order_store_roundtrip() {
        let store = OrderStore::new();
        assert!(store.is_empty());
        assert!(matches!(
            store.get(&OrderId::new("nope")),
            Err(CommerceError::OrderNotFound(_))
        ));
    }
}
