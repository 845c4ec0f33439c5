//! Memoized property sums
//!
//! Every hull keeps a [`PropertyCache`] mapping property names to their
//! aggregate over the hull's base properties and installed items. Sources
//! contribute the first property of a given name only. Items short on ammo
//! contribute nothing.

use std::collections::{HashMap, HashSet};

use crate::catalog::Catalog;
use crate::inventory::Inventory;
use crate::item::{first_named, Item, Property};

/// Aggregate for one property name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// Summed contributions
    pub value: i32,
    /// At least one contribution was absolute; caller defaults are void
    pub absolute: bool,
}

impl CacheEntry {
    fn accumulate(&mut self, property: &Property, count: i32) {
        self.value = self.value.saturating_add(property.contribution(count));
        self.absolute |= property.absolute;
    }

    /// Final value given a caller default
    pub fn resolve(&self, default: i32) -> i32 {
        if self.absolute {
            self.value
        } else {
            self.value.saturating_add(default)
        }
    }
}

/// Per-hull property cache
#[derive(Debug, Clone, Default)]
pub struct PropertyCache {
    entries: HashMap<String, CacheEntry>,
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<CacheEntry> {
        self.entries.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Apply a count change of `delta` copies of `item` to the cached entries
    ///
    /// Only entries already cached are touched. Entries fed by absolute or
    /// count-ignoring properties are dropped and recomputed on next read.
    pub fn patch_item(&mut self, item: &Item, delta: i32) {
        if delta == 0 {
            return;
        }
        let mut seen = HashSet::new();
        for property in &item.properties {
            if !seen.insert(property.name.as_str()) {
                continue;
            }
            if property.absolute || property.ignore_count {
                self.entries.remove(&property.name);
            } else if let Some(entry) = self.entries.get_mut(&property.name) {
                entry.value = entry.value.saturating_add(property.value.saturating_mul(delta));
            }
        }
    }

    /// Recompute every property known on the hull
    ///
    /// Existing entries are zeroed in place so names with no remaining
    /// contributors stay cached at zero.
    pub fn rebuild(&mut self, catalog: &Catalog, base: &[Property], inventory: &Inventory) {
        for entry in self.entries.values_mut() {
            *entry = CacheEntry::default();
        }

        let mut seen = HashSet::new();
        for property in base {
            if seen.insert(property.name.as_str()) {
                self.entries
                    .entry(property.name.clone())
                    .or_default()
                    .accumulate(property, 1);
            }
        }

        for entry in inventory.iter() {
            let Some(item) = catalog.item(entry.item) else {
                continue;
            };
            if inventory.starves(item) {
                continue;
            }
            seen.clear();
            for property in &item.properties {
                if seen.insert(property.name.as_str()) {
                    self.entries
                        .entry(property.name.clone())
                        .or_default()
                        .accumulate(property, entry.count);
                }
            }
        }
    }
}

/// Compute one property from scratch
pub fn compute(
    catalog: &Catalog,
    base: &[Property],
    inventory: &Inventory,
    name: &str,
) -> CacheEntry {
    let mut sum = CacheEntry::default();

    if let Some(property) = first_named(base, name) {
        sum.accumulate(property, 1);
    }

    for entry in inventory.iter() {
        let Some(item) = catalog.item(entry.item) else {
            continue;
        };
        if inventory.starves(item) {
            continue;
        }
        if let Some(property) = first_named(&item.properties, name) {
            sum.accumulate(property, entry.count);
        }
    }

    sum
}
