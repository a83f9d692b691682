//! Checkout module.
//!
//! Contains address snapshots, orders with their status state machine,
//! the checkout orchestrator, and order status operations.

mod address;
mod orchestrator;
mod order;
mod service;

pub use address::{AddressRecord, OrderAddress};
pub use orchestrator::{Checkout, CheckoutRequest};
pub use order::{Order, OrderItem, OrderStatus, StatusChange};
pub use service::OrderService;
