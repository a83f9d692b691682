//! Shopping cart module.
//!
//! Contains the cart aggregate, the payment-component calculator, cart
//! validation, and the guest-to-user merge resolver.

mod cart;
mod merge;
mod pricing;
mod service;
mod validation;

pub use cart::{Cart, CartIdentity, CartItem, CartStatus, MAX_QUANTITY_PER_ITEM};
pub use merge::{absorb_guest_cart, MergeReport};
pub use pricing::{
    quote, ComponentKind, DiscountValue, PaymentComponent, PaymentMethod, Quote, RateCard,
    ShippingMethod,
};
pub use service::CartService;
pub use validation::{CartValidation, IssueCode, ValidationIssue};
