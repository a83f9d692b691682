//! Order types and the order status state machine.
//!
//! An order is an immutable snapshot of a cart at checkout time; only the
//! status and tracking fields move afterwards, and every move appends a
//! status-history entry.

use crate::cart::{CartItem, PaymentMethod};
use crate::catalog::ProductRecord;
use crate::checkout::OrderAddress;
use crate::error::CommerceError;
use crate::ids::{OrderId, OrderItemId, ProductId, UserId};
use crate::money::{Currency, Money};
use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting payment.
    #[default]
    OrderRaised,
    /// Payment captured.
    PaymentDone,
    /// Order delivered. Terminal.
    Delivered,
    /// Order cancelled. Terminal, reachable only from non-terminal states.
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::OrderRaised => "order_raised",
            OrderStatus::PaymentDone => "payment_done",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::OrderRaised => "Order Raised",
            OrderStatus::PaymentDone => "Payment Done",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Check if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Check if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::OrderRaised | OrderStatus::PaymentDone)
    }
}

/// One append-only status history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    /// Status after the change.
    pub status: OrderStatus,
    /// Status before the change. None for the creation entry.
    pub previous_status: Option<OrderStatus>,
    /// Unix timestamp of the change.
    pub changed_at: i64,
    /// Free-form note (e.g., cancellation reason).
    pub notes: Option<String>,
    /// Who triggered the change, when known.
    pub changed_by: Option<String>,
    /// Whether the change came from the system rather than a person.
    pub system_generated: bool,
}

/// A line item snapshotted onto an order.
///
/// Carries its own copy of product name/brand/sku/price so the order
/// survives later product edits or deletion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Unique order item identifier.
    pub id: OrderItemId,
    /// Product this line was sold from.
    pub product_id: ProductId,
    /// SKU at time of order.
    pub sku: String,
    /// Product name at time of order.
    pub name: String,
    /// Brand at time of order.
    pub brand: Option<String>,
    /// Quantity ordered.
    pub quantity: i64,
    /// Unit price the customer paid.
    pub unit_price: Money,
    /// Line total.
    pub line_total: Money,
    /// Custom cut length, if any.
    pub custom_length_cm: Option<i64>,
    /// Gift wrapping requested.
    pub is_gift: bool,
    /// Gift note.
    pub gift_message: Option<String>,
}

impl OrderItem {
    /// Snapshot a cart item against the product it was sold from.
    pub fn snapshot(item: &CartItem, product: &ProductRecord) -> Result<Self, CommerceError> {
        Ok(Self {
            id: OrderItemId::generate(),
            product_id: item.product_id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            quantity: item.quantity,
            unit_price: item.effective_unit_price(),
            line_total: item.line_total()?,
            custom_length_cm: item.custom_length_cm,
            is_gift: item.is_gift,
            gift_message: item.gift_message.clone(),
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique order identifier.
    pub id: OrderId,
    /// Human-readable order number (`ORD-` + 10 digits).
    pub order_number: String,
    /// Customer who placed the order.
    pub user_id: UserId,
    /// Order status.
    pub status: OrderStatus,
    /// Snapshotted items.
    pub items: Vec<OrderItem>,
    /// Sum of line totals.
    pub subtotal: Money,
    /// Discount carried from the cart.
    pub discount_amount: Money,
    /// Tax carried from the cart.
    pub tax_amount: Money,
    /// Shipping carried from the cart.
    pub shipping_amount: Money,
    /// Grand total: subtotal - discount + tax + shipping.
    pub total_amount: Money,
    /// Order currency.
    pub currency: Currency,
    /// Billing address snapshot.
    pub billing_address: OrderAddress,
    /// Shipping address snapshot.
    pub shipping_address: OrderAddress,
    /// Payment method chosen at checkout.
    pub payment_method: PaymentMethod,
    /// Gateway transaction id, once payment is processed.
    pub payment_transaction_id: Option<String>,
    /// Append-only status history.
    pub status_history: Vec<StatusChange>,
    /// Unix timestamp of creation.
    pub created_at: i64,
    /// Unix timestamp of last update.
    pub updated_at: i64,
    /// Unix timestamp of delivery, once delivered.
    pub delivered_at: Option<i64>,
    /// Unix timestamp of cancellation, once cancelled.
    pub cancelled_at: Option<i64>,
    /// Why the order was cancelled.
    pub cancellation_reason: Option<String>,
}

impl Order {
    /// Generate an order number: `ORD-` plus a 10-digit suffix from the
    /// current time in seconds fused with a process-local sequence, so
    /// numbers stay unique and sortable under concurrent checkouts.
    pub fn generate_order_number() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};

        static SEQUENCE: AtomicU64 = AtomicU64::new(0);

        let ts = current_timestamp() as u64;
        let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let suffix = (ts.saturating_mul(100) + seq % 100) % 10_000_000_000;
        format!("ORD-{suffix:010}")
    }

    /// Total unit count.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Check the creation invariant:
    /// `total = subtotal - discount + tax + shipping`.
    pub fn totals_consistent(&self) -> bool {
        self.subtotal
            .try_subtract(&self.discount_amount)
            .and_then(|t| t.try_add(&self.tax_amount))
            .and_then(|t| t.try_add(&self.shipping_amount))
            .map(|t| t == self.total_amount)
            .unwrap_or(false)
    }

    /// Append a status history entry and bump the update timestamp.
    pub fn record_status(
        &mut self,
        previous: Option<OrderStatus>,
        notes: Option<String>,
        changed_by: Option<String>,
        system_generated: bool,
    ) {
        let now = current_timestamp();
        self.status_history.push(StatusChange {
            status: self.status,
            previous_status: previous,
            changed_at: now,
            notes,
            changed_by,
            system_generated,
        });
        self.updated_at = now;
    }

    fn invalid_transition(&self, to: OrderStatus) -> CommerceError {
        CommerceError::InvalidTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    /// Record a captured payment. Only valid from OrderRaised; calling it
    /// twice fails rather than silently succeeding.
    pub fn process_payment(&mut self, transaction_id: &str) -> Result<(), CommerceError> {
        if self.status != OrderStatus::OrderRaised {
            return Err(self.invalid_transition(OrderStatus::PaymentDone));
        }
        if transaction_id.trim().is_empty() {
            return Err(CommerceError::BlankField {
                field: "transaction_id",
            });
        }
        let previous = self.status;
        self.status = OrderStatus::PaymentDone;
        self.payment_transaction_id = Some(transaction_id.trim().to_string());
        self.record_status(
            Some(previous),
            Some(format!("Payment captured ({})", transaction_id.trim())),
            None,
            true,
        );
        Ok(())
    }

    /// Mark the order delivered. Only valid from PaymentDone.
    pub fn deliver(&mut self) -> Result<(), CommerceError> {
        if self.status != OrderStatus::PaymentDone {
            return Err(self.invalid_transition(OrderStatus::Delivered));
        }
        let previous = self.status;
        self.status = OrderStatus::Delivered;
        self.delivered_at = Some(current_timestamp());
        self.record_status(Some(previous), None, None, true);
        Ok(())
    }

    /// Cancel the order with a reason. Only valid from OrderRaised or
    /// PaymentDone; the caller is responsible for releasing reserved stock.
    pub fn cancel(
        &mut self,
        reason: &str,
        cancelled_by: Option<String>,
    ) -> Result<(), CommerceError> {
        if !self.status.can_cancel() {
            return Err(self.invalid_transition(OrderStatus::Cancelled));
        }
        if reason.trim().is_empty() {
            return Err(CommerceError::BlankField { field: "reason" });
        }
        let previous = self.status;
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(current_timestamp());
        self.cancellation_reason = Some(reason.trim().to_string());
        self.record_status(
            Some(previous),
            Some(reason.trim().to_string()),
            cancelled_by,
            false,
        );
        Ok(())
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
