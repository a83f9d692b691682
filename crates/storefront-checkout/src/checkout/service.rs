//! Order status transitions over the stores.
//!
//! The [`Order`](crate::checkout::Order) aggregate enforces the state
//! machine; this service applies transitions under the store lock and
//! settles stock holds with the ledger: fulfillment on delivery, release
//! on cancellation.

use crate::checkout::Order;
use crate::error::CommerceError;
use crate::ids::{OrderId, UserId};
use crate::store::{OrderStore, StockLedger};
use std::sync::Arc;
use tracing::{info, warn};

/// Store-backed order operations.
pub struct OrderService {
    orders: Arc<OrderStore>,
    ledger: Arc<dyn StockLedger>,
}

impl OrderService {
    pub fn new(orders: Arc<OrderStore>, ledger: Arc<dyn StockLedger>) -> Self {
        Self { orders, ledger }
    }

    /// Fetch an order.
    pub fn get(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.orders.get(order_id)
    }

    /// All orders for a customer, newest first.
    pub fn orders_for_user(&self, user_id: &UserId) -> Vec<Order> {
        self.orders.orders_for_user(user_id)
    }

    /// Record a captured payment. Fails with `InvalidTransition` unless the
    /// order is awaiting payment; calling it twice surfaces the workflow
    /// bug instead of silently succeeding.
    pub fn process_payment(
        &self,
        order_id: &OrderId,
        transaction_id: &str,
    ) -> Result<Order, CommerceError> {
        self.orders
            .with_mut(order_id, |order| order.process_payment(transaction_id))?;
        let order = self.orders.get(order_id)?;
        info!(order = %order.order_number, transaction = transaction_id, "payment recorded");
        Ok(order)
    }

    /// Mark an order delivered and convert its stock holds into permanent
    /// decrements. A fulfillment mismatch is logged, not raised: the goods
    /// already shipped, only the ledger accounting is off.
    pub fn deliver(&self, order_id: &OrderId) -> Result<Order, CommerceError> {
        self.orders.with_mut(order_id, |order| {
            order.deliver()?;
            for item in &order.items {
                if let Err(e) = self.ledger.fulfill(&item.product_id, item.quantity) {
                    warn!(
                        order = %order.order_number,
                        product = %item.product_id,
                        quantity = item.quantity,
                        error = %e,
                        "fulfillment accounting mismatch"
                    );
                }
            }
            Ok(())
        })?;
        let order = self.orders.get(order_id)?;
        info!(order = %order.order_number, "order delivered");
        Ok(order)
    }

    /// Cancel an order and release every reserved unit back to the pool.
    /// The release is best-effort and can never block the cancellation.
    pub fn cancel(
        &self,
        order_id: &OrderId,
        reason: &str,
        cancelled_by: Option<String>,
    ) -> Result<Order, CommerceError> {
        self.orders.with_mut(order_id, |order| {
            order.cancel(reason, cancelled_by)?;
            for item in &order.items {
                let _ = self.ledger.release(&item.product_id, item.quantity);
            }
            Ok(())
        })?;
        let order = self.orders.get(order_id)?;
        info!(order = %order.order_number, reason, "order cancelled");
        Ok(order)
    }
}
