//! Item, property, event and item type definitions

use hull_core::{Handle, Ship};
use serde::{Deserialize, Serialize};

/// Handle to an item in the arena catalog
pub type ItemId = Handle<Item>;

/// Handle to an item type in the arena catalog
pub type ItemTypeId = Handle<ItemType>;

/// Ship mask allowing every ship
pub const ALL_SHIPS: u8 = 0xFF;

/// A named numeric contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property name (not unique; the first match per source wins)
    pub name: String,
    /// Contributed value
    pub value: i32,
    /// Replace the accumulated value instead of adding to it
    #[serde(default)]
    pub absolute: bool,
    /// Apply once regardless of the item count
    #[serde(default)]
    pub ignore_count: bool,
}

impl Property {
    /// Create an additive property
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
            absolute: false,
            ignore_count: false,
        }
    }

    /// Create a property that overrides the accumulated value
    pub fn absolute(name: impl Into<String>, value: i32) -> Self {
        Self {
            absolute: true,
            ..Self::new(name, value)
        }
    }

    /// Apply once regardless of count
    pub fn with_ignore_count(mut self) -> Self {
        self.ignore_count = true;
        self
    }

    /// Contribution of this property for `count` copies of its item
    pub fn contribution(&self, count: i32) -> i32 {
        if self.ignore_count {
            self.value
        } else {
            self.value.saturating_mul(count)
        }
    }
}

/// First property named `name` in a list
pub fn first_named<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name == name)
}

/// Action performed when an event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Message only
    #[default]
    NoAction,
    /// Remove `data` of the item itself
    RemoveItem,
    /// Remove `data` of the item's ammo
    RemoveItemAmmo,
    /// Grant prize `data % 100`, `|data / 100|` times
    Prize,
    /// Set the entry's data field
    SetInventoryData,
    /// Increment the entry's data field
    IncrementInventoryData,
    /// Decrement the entry's data field, firing "datazero" at zero
    DecrementInventoryData,
    /// Send the player to spectator mode
    Spec,
    /// Reset the player's ship after the enter delay
    ShipReset,
    /// Notify observers with callback id `data`
    Callback,
    /// Deliver the message arena-wide
    ArenaMessage,
    /// Set the player's bounty to `data`
    SetBounty,
    /// Suppress prize `data` for the player
    IgnorePrize,
    /// Add `data` to the player's bounty
    AddBounty,
}

impl EventAction {
    /// Whether the action operates on an inventory entry
    pub fn needs_entry(self) -> bool {
        matches!(
            self,
            Self::RemoveItem
                | Self::RemoveItemAmmo
                | Self::SetInventoryData
                | Self::IncrementInventoryData
                | Self::DecrementInventoryData
        )
    }
}

/// A scripted event attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEvent {
    /// Event name ("add", "del", "init", "kill", ...)
    pub name: String,
    /// Action to run
    #[serde(default)]
    pub action: EventAction,
    /// Action parameter
    #[serde(default)]
    pub data: i32,
    /// Optional message shown when the event fires
    #[serde(default)]
    pub message: String,
}

impl ItemEvent {
    pub fn new(name: impl Into<String>, action: EventAction, data: i32) -> Self {
        Self {
            name: name.into(),
            action,
            data,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// Slot class with a per-hull capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub name: String,
    /// Slot capacity per hull
    pub max: i32,
}

impl ItemType {
    pub fn new(name: impl Into<String>, max: i32) -> Self {
        Self {
            name: name.into(),
            max,
        }
    }
}

/// Slot usage of an item for one item type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTypeEntry {
    pub item_type: ItemTypeId,
    /// Slots used per copy; negative values free slots
    pub delta: i32,
}

/// Catalog definition of an item
#[derive(Debug, Clone)]
pub struct Item {
    /// Display name
    pub name: String,
    /// One-line description
    pub short_desc: String,
    /// Full description
    pub long_desc: String,
    pub buy_price: i32,
    pub sell_price: i32,
    /// Experience required to buy
    pub exp_required: i32,
    /// Bit mask of ships that may carry the item
    pub ships_allowed: u8,
    /// Maximum count per hull (0 = unlimited)
    pub max: i32,
    /// Companion ammo item
    pub ammo: Option<ItemId>,
    /// Ammo count required for the item to contribute
    pub min_ammo: i32,
    /// Contribute only while ammo is at least `min_ammo`
    pub needs_ammo: bool,
    /// Persist count changes lazily
    pub delay_status_write: bool,
    /// Item influences ship settings
    pub affects_sets: bool,
    /// Resend ship settings when the count changes on the current hull
    pub resend_sets: bool,
    pub properties: Vec<Property>,
    pub item_types: Vec<ItemTypeEntry>,
    pub events: Vec<ItemEvent>,
    /// Items consuming this item as ammo, filled in by the catalog builder
    pub(crate) ammo_users: Vec<ItemId>,
}

impl Item {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_desc: String::new(),
            long_desc: String::new(),
            buy_price: 0,
            sell_price: 0,
            exp_required: 0,
            ships_allowed: ALL_SHIPS,
            max: 0,
            ammo: None,
            min_ammo: 1,
            needs_ammo: false,
            delay_status_write: false,
            affects_sets: false,
            resend_sets: false,
            properties: Vec::new(),
            item_types: Vec::new(),
            events: Vec::new(),
            ammo_users: Vec::new(),
        }
    }

    pub fn with_description(mut self, short: impl Into<String>, long: impl Into<String>) -> Self {
        self.short_desc = short.into();
        self.long_desc = long.into();
        self
    }

    pub fn with_prices(mut self, buy: i32, sell: i32) -> Self {
        self.buy_price = buy;
        self.sell_price = sell;
        self
    }

    pub fn with_max(mut self, max: i32) -> Self {
        self.max = max;
        self
    }

    pub fn with_ships(mut self, mask: u8) -> Self {
        self.ships_allowed = mask;
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_event(mut self, event: ItemEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_item_type(mut self, item_type: ItemTypeId, delta: i32) -> Self {
        self.item_types.push(ItemTypeEntry { item_type, delta });
        self
    }

    /// Consume `ammo`; contribute only while holding at least `min_ammo` of it
    pub fn with_ammo(mut self, ammo: ItemId, min_ammo: i32) -> Self {
        self.ammo = Some(ammo);
        self.min_ammo = min_ammo;
        self.needs_ammo = true;
        self
    }

    pub fn with_resend_sets(mut self) -> Self {
        self.affects_sets = true;
        self.resend_sets = true;
        self
    }

    pub fn with_delayed_write(mut self) -> Self {
        self.delay_status_write = true;
        self
    }

    /// Items that consume this one as ammo
    pub fn ammo_users(&self) -> &[ItemId] {
        &self.ammo_users
    }

    /// Whether `ship` may carry this item
    pub fn can_hold_on_ship(&self, ship: Ship) -> bool {
        ship.allowed_by(self.ships_allowed)
    }

    /// Events named `name`, in definition order
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ItemEvent> {
        self.events.iter().filter(move |e| e.name == name)
    }
}

/// Named group of items for listing and lookup
#[derive(Debug, Clone, Default)]
pub struct Category {
    pub name: String,
    pub description: String,
    pub items: Vec<ItemId>,
    /// Hidden from player listings
    pub hidden: bool,
}
