//! In-memory collaborators
//!
//! Reference implementations of the service traits. They keep everything
//! in process and record what the engine asked of them, which makes them
//! suitable for tests and for hosts without persistent storage.

use std::collections::HashMap;
use std::sync::Arc;

use hull_core::{HullKey, PlayerId, Ship};
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::catalog::Catalog;
use crate::hull::{HullStore, ShipHull};
use crate::item::Property;
use crate::services::{
    Database, Game, ItemUpdate, Mainloop, PlayerInfo, Selfpos, Spawner, TimerKey, TimerTask,
};

/// Kind of a recorded persistence call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    ItemCount,
    InventoryData,
}

/// A recorded persistence call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedWrite {
    pub kind: WriteKind,
    pub player: PlayerId,
    pub hull: HullKey,
    pub update: ItemUpdate,
}

/// Database keeping hulls in memory
pub struct MemoryDatabase {
    store: Mutex<HullStore>,
    catalog: RwLock<Arc<Catalog>>,
    ship_properties: RwLock<HashMap<Ship, Vec<Property>>>,
    writes: Mutex<Vec<PersistedWrite>>,
}

impl MemoryDatabase {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            store: Mutex::new(HullStore::new()),
            catalog: RwLock::new(Arc::new(catalog)),
            ship_properties: RwLock::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Replace the catalog; existing hulls are emptied since their handles went stale
    pub fn set_catalog(&self, catalog: Catalog) {
        *self.catalog.write() = Arc::new(catalog);
        let mut store = self.store.lock();
        for ships in store.players_mut() {
            for hull in ships.hulls_mut() {
                *hull = ShipHull::new(hull.key(), hull.base_properties().to_vec());
            }
        }
    }

    /// Set the base properties used for hulls of `ship`
    pub fn set_ship_properties(&self, ship: Ship, properties: Vec<Property>) {
        self.ship_properties.write().insert(ship, properties);
    }

    /// Mark a player's ships as loaded
    pub fn load_player(&self, player: PlayerId) {
        self.store.lock().player_entry(player).loaded = true;
    }

    /// Drop a player's hull data
    pub fn unload_player(&self, player: PlayerId) {
        self.store.lock().remove_player(player);
    }

    /// Give a player a hull for (ship, shipset) seeded with the ship's base properties
    pub fn add_ship(&self, player: PlayerId, ship: Ship, shipset: u8) -> HullKey {
        let key = HullKey::new(ship, shipset);
        let base = self.ship_property_list(ship);
        self.store.lock().player_entry(player).insert_hull(ShipHull::new(key, base));
        key
    }

    /// Remove a hull
    pub fn remove_ship(&self, player: PlayerId, key: HullKey) -> bool {
        self.store
            .lock()
            .player_mut(player)
            .and_then(|ships| ships.remove_hull(key))
            .is_some()
    }

    /// Switch a player's active shipset
    pub fn set_shipset(&self, player: PlayerId, shipset: u8) {
        self.store.lock().player_entry(player).shipset = shipset;
    }

    /// Every persistence call so far
    pub fn writes(&self) -> Vec<PersistedWrite> {
        self.writes.lock().clone()
    }

    /// Take the recorded persistence calls
    pub fn drain_writes(&self) -> Vec<PersistedWrite> {
        std::mem::take(&mut *self.writes.lock())
    }

    fn record(&self, kind: WriteKind, player: PlayerId, hull: HullKey, update: ItemUpdate) {
        self.writes.lock().push(PersistedWrite {
            kind,
            player,
            hull,
            update,
        });
    }
}

impl Database for MemoryDatabase {
    fn lock(&self) -> MutexGuard<'_, HullStore> {
        self.store.lock()
    }

    fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    fn ship_property_list(&self, ship: Ship) -> Vec<Property> {
        self.ship_properties.read().get(&ship).cloned().unwrap_or_default()
    }

    fn update_item_on_hull(&self, player: PlayerId, hull: HullKey, update: ItemUpdate) {
        self.record(WriteKind::ItemCount, player, hull, update);
    }

    fn update_inventory(&self, player: PlayerId, hull: HullKey, update: ItemUpdate) {
        self.record(WriteKind::InventoryData, player, hull, update);
    }
}

/// A call the engine made on the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCall {
    Prize { player: PlayerId, prize: i32, count: i32 },
    Spectator(PlayerId),
    ShipReset(PlayerId),
    Message { player: PlayerId, text: String },
    ArenaMessage(String),
    SetBounty { player: PlayerId, bounty: i32 },
}

/// Game and selfpos recording every call
///
/// Player state is set up by the host; `set_bounty` and `set_spectator`
/// update it as the real game would.
#[derive(Default)]
pub struct RecordingGame {
    players: RwLock<HashMap<PlayerId, PlayerInfo>>,
    calls: Mutex<Vec<GameCall>>,
}

impl RecordingGame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a player in `ship` on `freq`
    pub fn enter(&self, player: PlayerId, ship: Ship, freq: i32) {
        self.players.write().insert(
            player,
            PlayerInfo {
                ship: Some(ship),
                freq,
                bounty: 0,
                fake: false,
            },
        );
    }

    pub fn set_player(&self, player: PlayerId, info: PlayerInfo) {
        self.players.write().insert(player, info);
    }

    pub fn calls(&self) -> Vec<GameCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn push(&self, call: GameCall) {
        self.calls.lock().push(call);
    }
}

impl Game for RecordingGame {
    fn player(&self, player: PlayerId) -> Option<PlayerInfo> {
        self.players.read().get(&player).copied()
    }

    fn give_prize(&self, player: PlayerId, prize: i32, count: i32) {
        self.push(GameCall::Prize { player, prize, count });
    }

    fn set_spectator(&self, player: PlayerId) {
        if let Some(info) = self.players.write().get_mut(&player) {
            info.ship = None;
        }
        self.push(GameCall::Spectator(player));
    }

    fn ship_reset(&self, player: PlayerId) {
        self.push(GameCall::ShipReset(player));
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        self.push(GameCall::Message {
            player,
            text: message.to_string(),
        });
    }

    fn send_arena_message(&self, message: &str) {
        self.push(GameCall::ArenaMessage(message.to_string()));
    }
}

impl Selfpos for RecordingGame {
    fn set_bounty(&self, player: PlayerId, bounty: i32) {
        if let Some(info) = self.players.write().get_mut(&player) {
            info.bounty = bounty;
        }
        self.push(GameCall::SetBounty { player, bounty });
    }
}

/// A call the engine made on the spawner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnerCall {
    ResendOverrides(PlayerId),
    IgnorePrize { player: PlayerId, prize: i32 },
}

/// Spawner recording every call
#[derive(Default)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<SpawnerCall>>,
}

impl RecordingSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SpawnerCall> {
        self.calls.lock().clone()
    }
}

impl Spawner for RecordingSpawner {
    fn resend_overrides(&self, player: PlayerId) {
        self.calls.lock().push(SpawnerCall::ResendOverrides(player));
    }

    fn ignore_prize(&self, player: PlayerId, prize: i32) {
        self.calls.lock().push(SpawnerCall::IgnorePrize { player, prize });
    }
}

struct PendingTimer {
    key: TimerKey,
    due: u64,
    task: TimerTask,
}

/// Tick-driven timer queue
///
/// Timers run from [`TickTimers::advance`] on the calling thread, after the
/// queue lock is released.
#[derive(Default)]
pub struct TickTimers {
    now: Mutex<u64>,
    pending: Mutex<Vec<PendingTimer>>,
}

impl TickTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick
    pub fn now(&self) -> u64 {
        *self.now.lock()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Move time forward, running every timer that came due; returns how many ran
    pub fn advance(&self, ticks: u64) -> usize {
        let now = {
            let mut now = self.now.lock();
            *now += ticks;
            *now
        };

        let due: Vec<PendingTimer> = {
            let mut pending = self.pending.lock();
            let (due, waiting) = std::mem::take(&mut *pending)
                .into_iter()
                .partition(|t| t.due <= now);
            *pending = waiting;
            due
        };

        let ran = due.len();
        for timer in due {
            log::debug!("running timer {:?} at tick {}", timer.key, now);
            (timer.task)();
        }
        ran
    }
}

impl Mainloop for TickTimers {
    fn set_timer(&self, key: TimerKey, delay: u32, task: TimerTask) {
        let due = self.now() + u64::from(delay);
        self.pending.lock().push(PendingTimer { key, due, task });
    }

    fn clear_timer(&self, key: TimerKey) {
        self.pending.lock().retain(|t| t.key != key);
    }
}
