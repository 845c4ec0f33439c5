//! # hull_items - Ship Hull Item Engine
//!
//! Tracks the items installed on every hull a player owns, derives named
//! numeric properties from them and runs the scripted events items carry.
//!
//! # Features
//!
//! - Per-arena item catalog with generational handles, loadable from TOML
//! - Per-hull inventories with an auxiliary data field per item
//! - Cached property sums kept coherent with every inventory change
//! - Ammo gating: items short on ammo contribute nothing
//! - Event cascades through a bounded FIFO work queue
//! - Slot and maximum enforcement for automatic and strict grants
//! - Observer notifications delivered after the store lock is released
//! - In-memory collaborators for tests and storage-less hosts
//!
//! # Example
//!
//! ```ignore
//! use hull_items::prelude::*;
//!
//! let db = Arc::new(MemoryDatabase::new(Catalog::from_toml_str(CATALOG, 0)?));
//! let game = Arc::new(RecordingGame::new());
//! let timers = Arc::new(TickTimers::new());
//! let services = Services::new(db.clone(), game.clone(), game.clone(), timers);
//! let engine = ItemsEngine::new(services, EngineConfig::default());
//!
//! let blaster = engine.item_by_name("Blaster").unwrap();
//! engine.add_item_check_limits(player, blaster, HullSelector::Ship(0), 5)?;
//! let guns = engine.property_sum(player, HullSelector::Ship(0), "gunlevel", 0);
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hooks;
pub mod hull;
pub mod inventory;
pub mod item;
pub mod limits;
pub mod memory;
pub mod services;
pub mod session;

pub mod prelude {
    pub use crate::cache::{CacheEntry, PropertyCache};
    pub use crate::catalog::{Catalog, CatalogBuilder, CatalogDef};
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Grant, HullSelector, ItemsEngine};
    pub use crate::error::{CatalogError, ConfigError, GrantError, ItemsError, Result};
    pub use crate::hooks::{GrantAdviser, GrantRequest, ItemNotification, SubscriberId};
    pub use crate::hull::{HullStore, PlayerShips, ShipHull};
    pub use crate::inventory::{Inventory, InventoryEntry};
    pub use crate::item::{
        Category, EventAction, Item, ItemEvent, ItemId, ItemType, ItemTypeId, Property,
    };
    pub use crate::memory::{MemoryDatabase, RecordingGame, RecordingSpawner, TickTimers};
    pub use crate::services::{
        Database, Game, ItemUpdate, Mainloop, PlayerInfo, Selfpos, Services, Spawner, TimerKey,
    };
    pub use crate::session::ItemDelta;
    pub use hull_core::{HullKey, PlayerId, Ship};
}

pub use prelude::*;
