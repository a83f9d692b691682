//! Lifecycle and limit configuration.
//!
//! Monetary knobs (tax rates, shipping rates, discount codes, payment fees)
//! live in the [`RateCard`](crate::cart::RateCard); this struct holds the
//! scalar limits and timers. Deserializable so a host can load it from a
//! config file.

use crate::money::Currency;
use serde::{Deserialize, Serialize};

/// Configuration for the cart lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommerceConfig {
    /// Currency carts and orders are priced in.
    pub currency: Currency,
    /// Absolute cart TTL in seconds; past it the cart is Expired.
    pub cart_ttl_secs: i64,
    /// Inactivity window in seconds; past it an Active cart is Abandoned.
    pub abandon_after_secs: i64,
    /// Retention window for non-Active carts before the sweep deletes them.
    pub retention_secs: i64,
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: Currency::USD,
            cart_ttl_secs: 30 * 24 * 3600,
            abandon_after_secs: 7 * 24 * 3600,
            retention_secs: 90 * 24 * 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CommerceConfig::default();
        assert_eq!(config.currency, Currency::USD);
        assert!(config.cart_ttl_secs > config.abandon_after_secs);
    }
}
