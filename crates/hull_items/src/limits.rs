//! Slot and maximum enforcement
//!
//! Pure decisions over an inventory and the catalog. Automatic grants are
//! truncated to fit; strict grants are refused with a [`GrantError`].

use hull_core::{PlayerId, Ship};

use crate::catalog::Catalog;
use crate::error::GrantError;
use crate::inventory::Inventory;
use crate::item::{Item, ItemId, ItemTypeId};

/// Slots of an item type still free on a hull
///
/// Items with a negative delta for the type add capacity.
pub fn free_item_type_spots(
    catalog: &Catalog,
    inventory: &Inventory,
    item_type: ItemTypeId,
) -> i32 {
    let Some(ty) = catalog.item_type(item_type) else {
        return 0;
    };

    let mut free = ty.max;
    for entry in inventory.iter() {
        let Some(item) = catalog.item(entry.item) else {
            continue;
        };
        for usage in item.item_types.iter().filter(|u| u.item_type == item_type) {
            free = free.saturating_sub(entry.count.saturating_mul(usage.delta));
        }
    }
    free
}

/// Largest part of `amount` that respects the item max and every item type
///
/// Returns 0 when nothing may be added. Non-positive requests are not
/// applied by automatic grants and come back as 0.
pub fn admissible_amount(
    catalog: &Catalog,
    inventory: &Inventory,
    item_id: ItemId,
    item: &Item,
    amount: i32,
    player: PlayerId,
) -> i32 {
    let mut amount = amount;

    if item.max != 0 {
        let current = inventory.count(item_id);
        if current.saturating_add(amount) > item.max {
            log::trace!(
                "{}: asked to add {} of item {}, but that exceeds the max by {}. truncating.",
                player,
                amount,
                item.name,
                current.saturating_add(amount) - item.max
            );
            amount = item.max - current;
        }
    }

    if amount <= 0 {
        return 0;
    }

    for usage in &item.item_types {
        if usage.delta <= 0 {
            continue;
        }
        let free = free_item_type_spots(catalog, inventory, usage.item_type);
        let needed = usage.delta.saturating_mul(amount);
        if free - needed < 0 {
            let fits = free.max(0) / usage.delta;
            log::trace!(
                "{}: asked to add {} of item {}, but that exceeds available {} by {}. truncating.",
                player,
                amount,
                item.name,
                catalog.item_type(usage.item_type).map_or("?", |t| t.name.as_str()),
                needed - free
            );
            amount = fits;
            if amount <= 0 {
                return 0;
            }
        }
    }

    amount
}

/// Strict admission of a grant of `count` copies
pub fn check_grant(
    catalog: &Catalog,
    inventory: &Inventory,
    item_id: ItemId,
    item: &Item,
    ship: Ship,
    count: i32,
) -> Result<(), GrantError> {
    let would_have = inventory.count(item_id).saturating_add(count);
    if item.max != 0 && would_have > item.max {
        return Err(GrantError::ExceedsMax {
            item: item.name.clone(),
            would_have,
            max: item.max,
        });
    }

    if !item.can_hold_on_ship(ship) {
        return Err(GrantError::ShipNotAllowed {
            item: item.name.clone(),
            ship,
        });
    }

    for usage in &item.item_types {
        let free = free_item_type_spots(catalog, inventory, usage.item_type);
        if free - usage.delta.saturating_mul(count) < 0 {
            let item_type = catalog
                .item_type(usage.item_type)
                .map_or_else(String::new, |t| t.name.clone());
            return Err(GrantError::NotEnoughSlots { item_type });
        }
    }

    Ok(())
}
