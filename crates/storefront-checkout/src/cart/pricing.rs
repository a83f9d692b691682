//! Payment component calculation.
//!
//! Pure functions turning a subtotal plus checkout context into itemized
//! components (tax, shipping, discount, fee) and totals. The lookup tables
//! live in a [`RateCard`] so a host can load its own rates.

use crate::error::CommerceError;
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shipping methods with flat rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
    Overnight,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
            ShippingMethod::Overnight => "overnight",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "Standard Shipping",
            ShippingMethod::Express => "Express Shipping",
            ShippingMethod::Overnight => "Overnight Shipping",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" => Some(ShippingMethod::Standard),
            "express" => Some(ShippingMethod::Express),
            "overnight" => Some(ShippingMethod::Overnight),
            _ => None,
        }
    }
}

/// Payment methods accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    NetBanking,
    CashOnDelivery,
    InternationalCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::NetBanking => "net_banking",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::InternationalCard => "international_card",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Upi => "UPI",
            PaymentMethod::NetBanking => "Net Banking",
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
            PaymentMethod::InternationalCard => "International Card",
        }
    }
}

/// Kind of payment component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Tax,
    Shipping,
    Discount,
    Fee,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Tax => "tax",
            ComponentKind::Shipping => "shipping",
            ComponentKind::Discount => "discount",
            ComponentKind::Fee => "fee",
        }
    }
}

/// One itemized contributor to the final total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentComponent {
    /// Component kind.
    pub kind: ComponentKind,
    /// Component amount.
    pub amount: Money,
    /// Short display label (e.g., "Free Shipping").
    pub label: String,
    /// Longer description for the order summary.
    pub description: Option<String>,
}

/// Value of a discount code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DiscountValue {
    /// Percentage off the subtotal (0.0 - 100.0).
    Percentage(f64),
    /// Fixed amount off, in cents.
    Flat(i64),
}

impl DiscountValue {
    /// Discount amount for a subtotal. Flat discounts never exceed it.
    pub fn amount_for(&self, subtotal: &Money) -> Money {
        match self {
            DiscountValue::Percentage(percent) => subtotal.percentage(*percent),
            DiscountValue::Flat(cents) => {
                Money::new((*cents).min(subtotal.amount_cents), subtotal.currency)
            }
        }
    }
}

/// Rate tables for tax, shipping, discounts, and payment fees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateCard {
    /// Tax rate (percent) by state/province code.
    pub tax_rates: HashMap<String, f64>,
    /// Rate applied when the region has no entry.
    pub default_tax_rate: f64,
    /// Subtotals at or above this ship free.
    pub free_shipping_threshold_cents: i64,
    /// Flat rate for standard shipping.
    pub standard_shipping_cents: i64,
    /// Flat rate for express shipping.
    pub express_shipping_cents: i64,
    /// Flat rate for overnight shipping.
    pub overnight_shipping_cents: i64,
    /// Discount code table.
    pub discount_codes: HashMap<String, DiscountValue>,
    /// Flat cash-on-delivery surcharge.
    pub cod_fee_cents: i64,
    /// Percentage surcharge for international cards.
    pub international_card_fee_percent: f64,
}

impl Default for RateCard {
    fn default() -> Self {
        let mut tax_rates = HashMap::new();
        tax_rates.insert("CA".to_string(), 7.25);
        tax_rates.insert("NY".to_string(), 8.875);
        tax_rates.insert("TX".to_string(), 6.25);
        tax_rates.insert("WA".to_string(), 6.5);

        let mut discount_codes = HashMap::new();
        discount_codes.insert("SAVE10".to_string(), DiscountValue::Percentage(10.0));
        discount_codes.insert("SAVE20".to_string(), DiscountValue::Percentage(20.0));
        discount_codes.insert("WELCOME15".to_string(), DiscountValue::Flat(1500));

        Self {
            tax_rates,
            default_tax_rate: 5.0,
            free_shipping_threshold_cents: 7500,
            standard_shipping_cents: 599,
            express_shipping_cents: 1299,
            overnight_shipping_cents: 2499,
            discount_codes,
            cod_fee_cents: 500,
            international_card_fee_percent: 2.5,
        }
    }
}

impl RateCard {
    /// Tax rate for a region. Returns the rate and the matched region code,
    /// or the named default when the region is unknown or absent.
    pub fn tax_rate_for(&self, region: Option<&str>) -> (f64, Option<String>) {
        match region {
            Some(code) => {
                let code = code.to_uppercase();
                match self.tax_rates.get(&code) {
                    Some(rate) => (*rate, Some(code)),
                    // Unknown region: explicit default-rate branch.
                    None => (self.default_tax_rate, None),
                }
            }
            None => (self.default_tax_rate, None),
        }
    }

    /// Resolve a discount code.
    ///
    /// Unknown codes resolve to None and yield a zero discount downstream.
    /// That is a deliberate policy: a bad code must not block checkout.
    pub fn resolve_discount(&self, code: &str) -> Option<&DiscountValue> {
        self.discount_codes.get(code.trim().to_uppercase().as_str())
    }

    /// Flat shipping rate for a method.
    pub fn shipping_rate(&self, method: ShippingMethod) -> i64 {
        match method {
            ShippingMethod::Standard => self.standard_shipping_cents,
            ShippingMethod::Express => self.express_shipping_cents,
            ShippingMethod::Overnight => self.overnight_shipping_cents,
        }
    }
}

/// An itemized pricing breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    /// Sum of line totals.
    pub subtotal: Money,
    /// Discount applied at cart level.
    pub discount_total: Money,
    /// Tax on the subtotal.
    pub tax_total: Money,
    /// Shipping charge.
    pub shipping_total: Money,
    /// Payment-method surcharge. Charged on top of the order total by the
    /// gateway; not part of `grand_total`.
    pub fee_total: Money,
    /// Order-facing total: subtotal - discount + tax + shipping.
    pub grand_total: Money,
    /// Components for display. Zero-amount tax/shipping are surfaced
    /// (e.g., a "Free Shipping" badge); zero discounts and fees are not.
    pub components: Vec<PaymentComponent>,
}

impl Quote {
    /// The amount the payment gateway charges: order total plus fee.
    pub fn amount_due(&self) -> Money {
        self.grand_total
            .try_add(&self.fee_total)
            .unwrap_or(self.grand_total)
    }
}

/// Compute the payment components for a checkout context.
///
/// Pure: same inputs, same quote. Rounds each component half-up to the
/// cent.
pub fn quote(
    card: &RateCard,
    subtotal: Money,
    region: Option<&str>,
    shipping_method: Option<ShippingMethod>,
    discount_code: Option<&str>,
    payment_method: Option<PaymentMethod>,
) -> Result<Quote, CommerceError> {
    let currency = subtotal.currency;
    let mut components = Vec::new();

    // Discount: unknown codes fall through to zero, suppressed from display.
    let discount_total = match discount_code.and_then(|c| card.resolve_discount(c)) {
        Some(value) => value.amount_for(&subtotal),
        None => Money::zero(currency),
    };
    if discount_total.is_positive() {
        components.push(PaymentComponent {
            kind: ComponentKind::Discount,
            amount: discount_total,
            label: format!("Discount ({})", discount_code.unwrap_or_default().trim().to_uppercase()),
            description: None,
        });
    }

    // Tax on the subtotal, by region with a named default.
    let (rate, matched_region) = card.tax_rate_for(region);
    let tax_total = subtotal.percentage(rate);
    components.push(PaymentComponent {
        kind: ComponentKind::Tax,
        amount: tax_total,
        label: "Tax".to_string(),
        description: Some(match matched_region {
            Some(code) => format!("{code} @ {rate}%"),
            None => format!("default rate {rate}%"),
        }),
    });

    // Shipping: free above the threshold, flat rate by method otherwise.
    let method = shipping_method.unwrap_or_default();
    let shipping_total = if subtotal.amount_cents >= card.free_shipping_threshold_cents {
        Money::zero(currency)
    } else {
        Money::new(card.shipping_rate(method), currency)
    };
    components.push(PaymentComponent {
        kind: ComponentKind::Shipping,
        amount: shipping_total,
        label: if shipping_total.is_zero() {
            "Free Shipping".to_string()
        } else {
            method.display_name().to_string()
        },
        description: None,
    });

    let grand_total = subtotal
        .try_subtract(&discount_total)
        .and_then(|t| t.try_add(&tax_total))
        .and_then(|t| t.try_add(&shipping_total))
        .ok_or(CommerceError::Overflow)?;

    // Payment-method surcharge on the amount being charged.
    let fee_total = match payment_method {
        Some(PaymentMethod::CashOnDelivery) => Money::new(card.cod_fee_cents, currency),
        Some(PaymentMethod::InternationalCard) => {
            grand_total.percentage(card.international_card_fee_percent)
        }
        _ => Money::zero(currency),
    };
    if fee_total.is_positive() {
        components.push(PaymentComponent {
            kind: ComponentKind::Fee,
            amount: fee_total,
            label: format!(
                "{} Fee",
                payment_method.unwrap_or_default().display_name()
            ),
            description: None,
        });
    }

    Ok(Quote {
        subtotal,
        discount_total,
        tax_total,
        shipping_total,
        fee_total,
        grand_total,
        components,
    })
}
