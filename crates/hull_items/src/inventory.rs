//! Per-hull item multiset

use crate::item::{Item, ItemId};

/// One installed item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryEntry {
    pub item: ItemId,
    /// Installed copies (always > 0 while the entry exists)
    pub count: i32,
    /// Auxiliary per-item value driven by inventory data events
    pub data: i32,
}

/// Installed items of one hull
///
/// A count of zero is never stored; setting it removes the entry.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for an item
    pub fn get(&self, item: ItemId) -> Option<&InventoryEntry> {
        self.entries.iter().find(|e| e.item == item)
    }

    pub fn get_mut(&mut self, item: ItemId) -> Option<&mut InventoryEntry> {
        self.entries.iter_mut().find(|e| e.item == item)
    }

    /// Installed count of an item (0 when absent)
    pub fn count(&self, item: ItemId) -> i32 {
        self.get(item).map_or(0, |e| e.count)
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.get(item).is_some()
    }

    /// Set count and data, returning the previous count
    pub fn set(&mut self, item: ItemId, count: i32, data: i32) -> i32 {
        let position = self.entries.iter().position(|e| e.item == item);
        match (position, count > 0) {
            (Some(i), true) => {
                let entry = &mut self.entries[i];
                let old = entry.count;
                entry.count = count;
                entry.data = data;
                old
            }
            (Some(i), false) => self.entries.remove(i).count,
            (None, true) => {
                self.entries.push(InventoryEntry { item, count, data });
                0
            }
            (None, false) => 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &InventoryEntry> {
        self.entries.iter()
    }

    /// Snapshot of installed item handles
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.entries.iter().map(|e| e.item).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `item` is ammo-gated and currently short on ammo
    pub fn starves(&self, item: &Item) -> bool {
        match item.ammo {
            Some(ammo) if item.needs_ammo => self.count(ammo) < item.min_ammo,
            _ => false,
        }
    }
}
