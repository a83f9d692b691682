//! End-to-end checkout scenarios across the cart, ledger, and order
//! services.

use std::sync::Arc;
use storefront_checkout::prelude::*;

struct Shop {
    cart_service: CartService,
    checkout: Checkout,
    order_service: OrderService,
    catalog: Arc<InMemoryCatalog>,
    addresses: Arc<InMemoryAddressBook>,
    orders: Arc<OrderStore>,
}

fn shop(stock: &[(&str, i64, i64)]) -> Shop {
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
    let carts = Arc::new(CartStore::new());
    let orders = Arc::new(OrderStore::new());

    let cart_service = CartService::new(
        carts.clone(),
        catalog.clone() as Arc<dyn ProductCatalog>,
        RateCard::default(),
        CommerceConfig::default(),
    );
    let checkout = Checkout::new(
        CartService::new(
            carts.clone(),
            catalog.clone() as Arc<dyn ProductCatalog>,
            RateCard::default(),
            CommerceConfig::default(),
        ),
        orders.clone(),
        catalog.clone() as Arc<dyn StockLedger>,
        addresses.clone() as Arc<dyn AddressBook>,
    );
    let order_service = OrderService::new(orders.clone(), catalog.clone() as Arc<dyn StockLedger>);

    Shop {
        cart_service,
        checkout,
        order_service,
        catalog,
        addresses,
        orders,
    }
}

fn saved_address(shop: &Shop, id: &str, owner: &UserId, state: &str) -> AddressId {
    let address_id = AddressId::new(id);
    shop.addresses.insert(
        AddressRecord::new(
            address_id.clone(),
            owner.clone(),
            "Jane Smith",
            "456 Oak Ave",
            "Los Angeles",
            "90001",
            "United States",
        )
        .with_state(state),
    );
    address_id
}

fn checkout_request(shop: &Shop, user: &UserId, cart_id: &CartId) -> CheckoutRequest {
    let billing = saved_address(shop, &format!("bill-{user}"), user, "CA");
    let shipping = saved_address(shop, &format!("ship-{user}"), user, "CA");
    CheckoutRequest {
        cart_id: cart_id.clone(),
        user_id: user.clone(),
        billing_address_id: billing,
        shipping_address_id: shipping,
        shipping_method: None,
        payment_method: PaymentMethod::Card,
    }
}

#[test]
fn guest_to_delivered_journey() {
    let shop = shop(&[("lamp", 2500, 10), ("rug", 7500, 4)]);
    let user = UserId::new("user-1");
    let session = SessionId::new("sess-1");

    // Guest browses and fills a cart.
    let guest_cart = shop
        .cart_service
        .fetch_or_create(CartIdentity::guest(session.clone(), "fp-1"));
    shop.cart_service
        .add_item(&guest_cart.id, &ProductId::new("lamp"), 2, None)
        .unwrap();

    // The user already had one lamp in their cart from a previous visit.
    let user_cart = shop
        .cart_service
        .fetch_or_create(CartIdentity::User(user.clone()));
    shop.cart_service
        .add_item(&user_cart.id, &ProductId::new("lamp"), 1, None)
        .unwrap();
    shop.cart_service
        .add_item(&user_cart.id, &ProductId::new("rug"), 1, None)
        .unwrap();

    // Login merges the guest cart additively: 1 + 2 lamps.
    let report = shop
        .cart_service
        .merge_at_login(&user, &session, "fp-1")
        .unwrap();
    assert_eq!(report.merged_carts, 1);
    let cart = shop.cart_service.carts().get(&report.target_cart_id).unwrap();
    let lamp_line = cart
        .items
        .iter()
        .find(|i| i.product_id == ProductId::new("lamp"))
        .unwrap();
    assert_eq!(lamp_line.quantity, 3);

    // Apply a discount and place the order.
    shop.cart_service
        .apply_discount(&cart.id, "SAVE10")
        .unwrap();
    let request = checkout_request(&shop, &user, &cart.id);
    let order = shop.checkout.place_order(&request).unwrap();

    // Subtotal 3*25.00 + 75.00 = 150.00; 10% off; CA tax 7.25%; free
    // shipping above the threshold.
    assert_eq!(order.subtotal.amount_cents, 15000);
    assert_eq!(order.discount_amount.amount_cents, 1500);
    assert_eq!(order.tax_amount.amount_cents, 1088); // 7.25% of 150.00
    assert_eq!(order.shipping_amount.amount_cents, 0);
    assert_eq!(
        order.total_amount.amount_cents,
        15000 - 1500 + 1088
    );
    assert!(order.totals_consistent());

    // Stock is held for the order.
    let lamp = shop.catalog.product(&ProductId::new("lamp")).unwrap();
    assert_eq!(lamp.stock.reserved, 3);

    // Pay through the gateway and deliver.
    let gateway = MockGateway::new();
    let gateway_order = gateway.create_payment_order(order.total_amount).unwrap();
    assert!(gateway
        .verify_payment(&gateway_order, "pay_1", "sig")
        .unwrap());
    shop.order_service
        .process_payment(&order.id, &gateway_order)
        .unwrap();
    let delivered = shop.order_service.deliver(&order.id).unwrap();

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.status_history.len(), 3);

    // Delivery converted the holds into real decrements.
    let lamp = shop.catalog.product(&ProductId::new("lamp")).unwrap();
    assert_eq!(lamp.stock.on_hand, 7);
    assert_eq!(lamp.stock.reserved, 0);
}

#[test]
fn concurrent_checkouts_cannot_oversell() {
    let shop = Arc::new(shop(&[("gem", 5000, 2)]));

    // Two customers race for the last two units: one wants both, the
    // other wants one. At most one checkout can win.
    let mut handles = Vec::new();
    for (name, qty) in [("user-a", 2), ("user-b", 1)] {
        let shop = Arc::clone(&shop);
        handles.push(std::thread::spawn(move || {
            let user = UserId::new(name);
            let cart = shop
                .cart_service
                .fetch_or_create(CartIdentity::User(user.clone()));
            shop.cart_service
                .add_item(&cart.id, &ProductId::new("gem"), qty, None)
                .unwrap();
            let request = checkout_request(&shop, &user, &cart.id);
            shop.checkout.place_order(&request).map(|o| (qty, o))
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

    assert_eq!(winners.len(), 1, "exactly one checkout may succeed");
    let (winner_qty, _) = winners[0];
    let stock = shop.catalog.product(&ProductId::new("gem")).unwrap().stock;
    assert_eq!(stock.reserved, *winner_qty);
    assert!(stock.available() >= 0);
    assert_eq!(shop.orders.len(), 1);
}

#[test]
fn cancel_restores_availability_exactly() {
    let shop = shop(&[("chair", 8000, 6)]);
    let user = UserId::new("user-1");
    let cart = shop
        .cart_service
        .fetch_or_create(CartIdentity::User(user.clone()));
    shop.cart_service
        .add_item(&cart.id, &ProductId::new("chair"), 4, None)
        .unwrap();

    let available_before = shop
        .catalog
        .product(&ProductId::new("chair"))
        .unwrap()
        .stock
        .available();

    let request = checkout_request(&shop, &user, &cart.id);
    let order = shop.checkout.place_order(&request).unwrap();
    shop.order_service
        .process_payment(&order.id, "txn-9")
        .unwrap();
    shop.order_service
        .cancel(&order.id, "changed my mind", Some("user-1".to_string()))
        .unwrap();

    let stock = shop.catalog.product(&ProductId::new("chair")).unwrap().stock;
    assert_eq!(stock.available(), available_before);
    assert_eq!(stock.on_hand, 6);
    assert_eq!(stock.reserved, 0);
}

#[test]
fn skipping_payment_cannot_deliver() {
    let shop = shop(&[("desk", 12000, 3)]);
    let user = UserId::new("user-1");
    let cart = shop
        .cart_service
        .fetch_or_create(CartIdentity::User(user.clone()));
    shop.cart_service
        .add_item(&cart.id, &ProductId::new("desk"), 1, None)
        .unwrap();

    let request = checkout_request(&shop, &user, &cart.id);
    let order = shop.checkout.place_order(&request).unwrap();

    let err = shop.order_service.deliver(&order.id).unwrap_err();
    assert!(matches!(err, CommerceError::InvalidTransition { .. }));
    assert_eq!(
        shop.order_service.get(&order.id).unwrap().status,
        OrderStatus::OrderRaised
    );
}

#[test]
fn failed_checkout_is_a_noop() {
    let shop = shop(&[("fabric", 0, 5)]);
    let mut fabric = shop.catalog.product(&ProductId::new("fabric")).unwrap();
    fabric.price = Money::new(1000, Currency::USD);
    let fabric = fabric.with_price_per_cm(Money::new(20, Currency::USD));
    shop.catalog.insert(fabric);

    let user = UserId::new("user-1");
    let cart = shop
        .cart_service
        .fetch_or_create(CartIdentity::User(user.clone()));
    // Two cut-length lines pass per-line validation but jointly exceed
    // the 5 units in stock.
    shop.cart_service
        .add_item(&cart.id, &ProductId::new("fabric"), 3, Some(100))
        .unwrap();
    shop.cart_service
        .add_item(&cart.id, &ProductId::new("fabric"), 3, Some(150))
        .unwrap();

    let request = checkout_request(&shop, &user, &cart.id);
    let err = shop.checkout.place_order(&request).unwrap_err();
    assert!(matches!(err, CommerceError::InsufficientStock { .. }));

    let stock = shop.catalog.product(&ProductId::new("fabric")).unwrap().stock;
    assert_eq!(stock.reserved, 0);
    assert!(shop.orders.is_empty());
    let cart = shop.cart_service.carts().get(&cart.id).unwrap();
    assert_eq!(cart.status, CartStatus::Active);
    // The customer can fix the cart and try again.
    shop.cart_service
        .update_quantity(&cart.id, &cart.items[1].id, 2)
        .unwrap();
    assert!(shop.checkout.place_order(&request).is_ok());
}
