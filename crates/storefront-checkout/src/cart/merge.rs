//! Guest-to-user cart merging.
//!
//! Invoked once at login: every Active guest cart matching the session or
//! device fingerprint is absorbed into the user's cart, then retired so it
//! can never be merged twice.

use crate::cart::cart::{Cart, CartItem, CartStatus, MAX_QUANTITY_PER_ITEM};
use crate::ids::{CartId, CartItemId};
use serde::{Deserialize, Serialize};

/// Summary of a login-time merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeReport {
    /// The user cart everything was merged into.
    pub target_cart_id: CartId,
    /// Guest carts absorbed.
    pub merged_carts: usize,
    /// Line items carried over (merged or copied).
    pub merged_items: usize,
}

/// Absorb a guest cart's items into the target cart.
///
/// Quantities for the same product + dimension variant are summed, never
/// replaced; replacing would silently lose items. New lines are copied
/// with their gift flag, message, and item discount intact. The donor is
/// marked CheckedOut afterwards, which is what makes a repeat merge a
/// no-op.
///
/// Returns the number of items carried over; 0 if the donor was not
/// Active (already merged, expired, or checked out).
pub fn absorb_guest_cart(target: &mut Cart, donor: &mut Cart) -> usize {
    if donor.status != CartStatus::Active {
        return 0;
    }

    let mut carried = 0;
    for item in donor.items.drain(..) {
        carried += 1;
        if let Some(existing) = target
            .items
            .iter_mut()
            .find(|i| i.matches(&item.product_id, item.custom_length_cm))
        {
            existing.quantity = existing
                .quantity
                .saturating_add(item.quantity)
                .min(MAX_QUANTITY_PER_ITEM);
        } else {
            target.items.push(copy_item(item));
        }
    }

    donor.mark_checked_out();
    target.touch();
    carried
}

/// Copy a guest line item into the target cart under a fresh id.
fn copy_item(item: CartItem) -> CartItem {
    CartItem {
        id: CartItemId::generate(),
        ..item
    }
}
