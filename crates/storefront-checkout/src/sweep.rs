//! Stale cart sweeping.
//!
//! The sweep is driven by an external scheduler, off the request path; it
//! takes the current time as an argument so runs are deterministic and
//! testable. Policy: Active carts go Abandoned after the inactivity
//! window, Active or Abandoned carts go Expired past their TTL, and
//! non-Active carts are deleted after the retention window.

use crate::cart::CartStatus;
use crate::config::CommerceConfig;
use crate::ids::CartId;
use crate::store::CartStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// What one sweep run did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SweepReport {
    /// Active carts marked Abandoned.
    pub abandoned: usize,
    /// Carts marked Expired.
    pub expired: usize,
    /// Carts deleted after the retention window.
    pub deleted: usize,
}

/// Periodic cart lifecycle maintenance.
pub struct CartSweeper {
    carts: Arc<CartStore>,
    config: CommerceConfig,
}

impl CartSweeper {
    pub fn new(carts: Arc<CartStore>, config: CommerceConfig) -> Self {
        Self { carts, config }
    }

    /// Active carts whose absolute TTL has passed.
    pub fn find_expired(&self, now: i64) -> Vec<CartId> {
        self.carts.scan(|cart| {
            (cart.status == CartStatus::Active && cart.is_expired(now)).then(|| cart.id.clone())
        })
    }

    /// Active carts past the inactivity window.
    pub fn find_stale(&self, now: i64) -> Vec<CartId> {
        self.carts.scan(|cart| {
            (cart.status == CartStatus::Active
                && cart.is_stale(now, self.config.abandon_after_secs))
            .then(|| cart.id.clone())
        })
    }

    /// Run one sweep pass.
    pub fn sweep(&self, now: i64) -> SweepReport {
        let mut report = SweepReport::default();

        // Expiry wins over abandonment when both apply.
        let to_expire = self.carts.scan(|cart| {
            (matches!(cart.status, CartStatus::Active | CartStatus::Abandoned)
                && cart.is_expired(now))
            .then(|| cart.id.clone())
        });
        for id in to_expire {
            if self
                .carts
                .with_mut(&id, |cart| {
                    cart.mark_expired(now);
                    Ok(())
                })
                .is_ok()
            {
                report.expired += 1;
            }
        }

        let to_abandon = self.find_stale(now);
        for id in to_abandon {
            if self
                .carts
                .with_mut(&id, |cart| {
                    cart.mark_abandoned(now);
                    Ok(())
                })
                .is_ok()
            {
                report.abandoned += 1;
            }
        }

        let to_delete = self.carts.scan(|cart| {
            (cart.status != CartStatus::Active
                && now > cart.last_activity_at + self.config.retention_secs)
            .then(|| cart.id.clone())
        });
        for id in to_delete {
            if self.carts.remove(&id) {
                report.deleted += 1;
            }
        }

        if report != SweepReport::default() {
            info!(
                abandoned = report.abandoned,
                expired = report.expired,
                deleted = report.deleted,
                "cart sweep complete"
            );
        }
        report
    }
}
