//! Cart-to-order checkout engine for Storefront.
//!
//! This crate owns the one genuinely tricky part of the storefront
//! backend: moving a mutable, concurrently-modified cart through
//! validation, stock reservation, and pricing into an immutable order.
//!
//! - **Catalog**: external product view, stock counters with reservations
//! - **Cart**: identity-keyed aggregate, pricing components, validation,
//!   guest-to-user merge at login
//! - **Checkout**: atomic cart-to-order conversion, order status state
//!   machine with append-only history
//! - **Store**: collaborator traits and in-memory implementations
//! - **Sweep**: scheduled cart lifecycle maintenance
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_checkout::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! let carts = Arc::new(CartStore::new());
//! let cart_service = CartService::new(
//!     carts.clone(),
//!     catalog.clone(),
//!     RateCard::default(),
//!     CommerceConfig::default(),
//! );
//!
//! let cart = cart_service.fetch_or_create(CartIdentity::User(user_id));
//! cart_service.add_item(&cart.id, &product_id, 2, None)?;
//! cart_service.apply_discount(&cart.id, "SAVE10")?;
//!
//! let checkout = Checkout::new(cart_service, orders, catalog, addresses);
//! let order = checkout.place_order(&request)?;
//! println!("placed {}", order.order_number);
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub mod config;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod store;
pub mod sweep;

pub use config::CommerceConfig;
pub use error::CommerceError;
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::CommerceConfig;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Catalog
    pub use crate::catalog::{ProductRecord, StockLevel};

    // Cart
    pub use crate::cart::{
        Cart, CartIdentity, CartItem, CartService, CartStatus, CartValidation, ComponentKind,
        DiscountValue, IssueCode, MergeReport, PaymentComponent, PaymentMethod, Quote, RateCard,
        ShippingMethod, ValidationIssue,
    };

    // Checkout
    pub use crate::checkout::{
        AddressRecord, Checkout, CheckoutRequest, Order, OrderAddress, OrderItem, OrderService,
        OrderStatus, StatusChange,
    };

    // Store
    pub use crate::store::{
        AddressBook, CartStore, InMemoryAddressBook, InMemoryCatalog, MockGateway, OrderStore,
        PaymentGateway, ProductCatalog, StockLedger,
    };

    // Sweep
    pub use crate::sweep::{CartSweeper, SweepReport};
}
