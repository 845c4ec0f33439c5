//! Collaborator interfaces consumed by the engine
//!
//! The engine never owns game state beyond what the [`Database`] hands it.
//! Everything else it touches (prizes, chat, bounty, client settings,
//! timers) goes through these traits so a host can plug in its own
//! implementations. In-memory versions live in [`crate::memory`].

use std::sync::Arc;

use hull_core::{HullKey, PlayerId, Ship};
use parking_lot::MutexGuard;

use crate::catalog::Catalog;
use crate::hull::HullStore;
use crate::item::{ItemId, Property};

/// A persisted inventory change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemUpdate {
    pub item: ItemId,
    pub count: i32,
    pub data: i32,
    /// The item asked for lazy persistence
    pub delay_write: bool,
}

/// Owner of hull data, the catalog and the lock guarding both
pub trait Database: Send + Sync {
    /// Lock the arena's hull store
    fn lock(&self) -> MutexGuard<'_, HullStore>;

    /// Current item catalog
    fn catalog(&self) -> Arc<Catalog>;

    /// Base properties of a ship
    fn ship_property_list(&self, ship: Ship) -> Vec<Property>;

    /// Persist an item count change
    fn update_item_on_hull(&self, player: PlayerId, hull: HullKey, update: ItemUpdate);

    /// Persist an inventory data change
    fn update_inventory(&self, player: PlayerId, hull: HullKey, update: ItemUpdate);
}

/// Public state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Current ship; `None` while spectating
    pub ship: Option<Ship>,
    pub freq: i32,
    pub bounty: i32,
    /// Server-controlled player
    pub fake: bool,
}

/// Game-side operations on players
pub trait Game: Send + Sync {
    fn player(&self, player: PlayerId) -> Option<PlayerInfo>;

    /// Grant `count` copies of a prize
    fn give_prize(&self, player: PlayerId, prize: i32, count: i32);

    /// Force the player into spectator mode
    fn set_spectator(&self, player: PlayerId);

    /// Respawn the player's ship in place
    fn ship_reset(&self, player: PlayerId);

    fn send_message(&self, player: PlayerId, message: &str);

    fn send_arena_message(&self, message: &str);
}

/// Position and bounty side channel
pub trait Selfpos: Send + Sync {
    fn set_bounty(&self, player: PlayerId, bounty: i32);
}

/// Client ship settings
pub trait Spawner: Send + Sync {
    /// Push recalculated ship settings to the player
    fn resend_overrides(&self, player: PlayerId);

    /// Suppress the next occurrence of a prize for the player
    fn ignore_prize(&self, player: PlayerId, prize: i32);
}

/// Identity of a pending timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    ShipReset(PlayerId),
}

/// Deferred work run by the mainloop
pub type TimerTask = Box<dyn FnOnce() + Send>;

/// Timer scheduling
pub trait Mainloop: Send + Sync {
    /// Run `task` after `delay` ticks
    fn set_timer(&self, key: TimerKey, delay: u32, task: TimerTask);

    /// Cancel every pending timer with `key`
    fn clear_timer(&self, key: TimerKey);
}

/// Collaborators wired into an engine instance
#[derive(Clone)]
pub struct Services {
    pub database: Arc<dyn Database>,
    pub game: Arc<dyn Game>,
    pub selfpos: Arc<dyn Selfpos>,
    /// Optional; actions needing it are logged and skipped when absent
    pub spawner: Option<Arc<dyn Spawner>>,
    pub mainloop: Arc<dyn Mainloop>,
}

impl Services {
    pub fn new(
        database: Arc<dyn Database>,
        game: Arc<dyn Game>,
        selfpos: Arc<dyn Selfpos>,
        mainloop: Arc<dyn Mainloop>,
    ) -> Self {
        Self {
            database,
            game,
            selfpos,
            spawner: None,
            mainloop,
        }
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = Some(spawner);
        self
    }
}
