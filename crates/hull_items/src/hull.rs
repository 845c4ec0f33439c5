//! Ship hulls and the per-arena hull store

use std::collections::HashMap;

use hull_core::{HullKey, PlayerId, Ship};

use crate::cache::{self, PropertyCache};
use crate::catalog::Catalog;
use crate::inventory::Inventory;
use crate::item::Property;

/// One persisted (ship, shipset) loadout of a player
#[derive(Debug, Clone)]
pub struct ShipHull {
    key: HullKey,
    /// Base stats of the ship, the first contributor of every property
    base_properties: Vec<Property>,
    pub inventory: Inventory,
    pub cache: PropertyCache,
}

impl ShipHull {
    pub fn new(key: HullKey, base_properties: Vec<Property>) -> Self {
        Self {
            key,
            base_properties,
            inventory: Inventory::new(),
            cache: PropertyCache::new(),
        }
    }

    pub fn key(&self) -> HullKey {
        self.key
    }

    pub fn ship(&self) -> Ship {
        self.key.ship
    }

    pub fn base_properties(&self) -> &[Property] {
        &self.base_properties
    }

    /// Replace the base property list and rebuild the cache against it
    pub fn reload_base_properties(&mut self, catalog: &Catalog, properties: Vec<Property>) {
        self.base_properties = properties;
        self.recalculate(catalog);
    }

    /// Cached property sum, computing and storing it on a miss
    pub fn property_sum(&mut self, catalog: &Catalog, name: &str, default: i32) -> i32 {
        if let Some(entry) = self.cache.get(name) {
            return entry.resolve(default);
        }
        let entry = cache::compute(catalog, &self.base_properties, &self.inventory, name);
        self.cache.insert(name, entry);
        entry.resolve(default)
    }

    /// Recompute every cached property
    pub fn recalculate(&mut self, catalog: &Catalog) {
        self.cache.rebuild(catalog, &self.base_properties, &self.inventory);
    }

    pub fn has_items(&self) -> bool {
        !self.inventory.is_empty()
    }
}

/// All hulls of one player
#[derive(Debug, Clone, Default)]
pub struct PlayerShips {
    /// Hull data has finished loading
    pub loaded: bool,
    /// Active shipset
    pub shipset: u8,
    hulls: HashMap<HullKey, ShipHull>,
}

impl PlayerShips {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hull(&self, key: HullKey) -> Option<&ShipHull> {
        self.hulls.get(&key)
    }

    pub fn hull_mut(&mut self, key: HullKey) -> Option<&mut ShipHull> {
        self.hulls.get_mut(&key)
    }

    /// Install a hull, replacing any hull with the same key
    pub fn insert_hull(&mut self, hull: ShipHull) -> Option<ShipHull> {
        self.hulls.insert(hull.key(), hull)
    }

    pub fn remove_hull(&mut self, key: HullKey) -> Option<ShipHull> {
        self.hulls.remove(&key)
    }

    pub fn hulls(&self) -> impl Iterator<Item = &ShipHull> {
        self.hulls.values()
    }

    pub fn hulls_mut(&mut self) -> impl Iterator<Item = &mut ShipHull> {
        self.hulls.values_mut()
    }
}

/// Hull data of every player in an arena, guarded by the database lock
#[derive(Debug, Default)]
pub struct HullStore {
    players: HashMap<PlayerId, PlayerShips>,
}

impl HullStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, player: PlayerId) -> Option<&PlayerShips> {
        self.players.get(&player)
    }

    pub fn player_mut(&mut self, player: PlayerId) -> Option<&mut PlayerShips> {
        self.players.get_mut(&player)
    }

    /// Entry for a player, created empty and unloaded if missing
    pub fn player_entry(&mut self, player: PlayerId) -> &mut PlayerShips {
        self.players.entry(player).or_default()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut PlayerShips> {
        self.players.values_mut()
    }

    pub fn remove_player(&mut self, player: PlayerId) -> Option<PlayerShips> {
        self.players.remove(&player)
    }

    pub fn ships_loaded(&self, player: PlayerId) -> bool {
        self.players.get(&player).is_some_and(|p| p.loaded)
    }

    pub fn current_shipset(&self, player: PlayerId) -> Option<u8> {
        self.players.get(&player).map(|p| p.shipset)
    }

    pub fn hull(&self, player: PlayerId, key: HullKey) -> Option<&ShipHull> {
        self.players.get(&player)?.hull(key)
    }

    pub fn hull_mut(&mut self, player: PlayerId, key: HullKey) -> Option<&mut ShipHull> {
        self.players.get_mut(&player)?.hull_mut(key)
    }
}
