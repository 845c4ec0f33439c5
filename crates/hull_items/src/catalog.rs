//! Per-arena item catalog
//!
//! The catalog owns every [`Item`], [`ItemType`] and [`Category`] of an arena.
//! Inventories refer to definitions through [`ItemId`] / [`ItemTypeId`]
//! handles stamped with the catalog generation; a handle from an older
//! generation never resolves.
//!
//! Catalogs are assembled with a [`CatalogBuilder`] or loaded from TOML:
//!
//! ```ignore
//! [[item_types]]
//! name = "Guns"
//! max = 2
//!
//! [[items]]
//! name = "Cannon"
//! ammo = "Ammo Pack"
//! min_ammo = 5
//! properties = [{ name = "firerate", value = 10 }]
//! item_types = [{ name = "Guns" }]
//!
//! [[items.events]]
//! name = "kill"
//! action = "remove_item_ammo"
//! data = 1
//! ```

use std::collections::HashSet;
use std::path::Path;

use hull_core::{Handle, Ship};
use serde::Deserialize;

use crate::error::CatalogError;
use crate::item::{
    Category, Item, ItemEvent, ItemId, ItemType, ItemTypeEntry, ItemTypeId, Property, ALL_SHIPS,
};

/// Immutable item catalog of one arena
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    generation: u8,
    items: Vec<Item>,
    item_types: Vec<ItemType>,
    categories: Vec<Category>,
}

impl Catalog {
    /// Start building a catalog for `generation`
    pub fn builder(generation: u8) -> CatalogBuilder {
        CatalogBuilder::new(generation)
    }

    /// Parse a TOML catalog document
    pub fn from_toml_str(source: &str, generation: u8) -> Result<Self, CatalogError> {
        let def: CatalogDef = toml::from_str(source)?;
        def.build(generation)
    }

    /// Load a TOML catalog file
    pub fn load(path: impl AsRef<Path>, generation: u8) -> Result<Self, CatalogError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source, generation)
    }

    /// Generation stamped into this catalog's handles
    pub fn generation(&self) -> u8 {
        self.generation
    }

    /// Resolve an item handle
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        if id.is_null() || id.generation() != self.generation {
            return None;
        }
        self.items.get(id.index() as usize)
    }

    /// Resolve an item type handle
    pub fn item_type(&self, id: ItemTypeId) -> Option<&ItemType> {
        if id.is_null() || id.generation() != self.generation {
            return None;
        }
        self.item_types.get(id.index() as usize)
    }

    /// Iterate all items with their handles
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        let generation = self.generation;
        self.items
            .iter()
            .enumerate()
            .map(move |(i, item)| (Handle::new(i as u32, generation), item))
    }

    /// Iterate all item types with their handles
    pub fn item_types(&self) -> impl Iterator<Item = (ItemTypeId, &ItemType)> {
        let generation = self.generation;
        self.item_types
            .iter()
            .enumerate()
            .map(move |(i, ty)| (Handle::new(i as u32, generation), ty))
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Case-insensitive exact name lookup
    pub fn item_by_name(&self, name: &str) -> Option<ItemId> {
        self.items()
            .find(|(_, item)| item.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    /// Case-insensitive prefix lookup; only an unambiguous prefix resolves
    pub fn item_by_partial_name(&self, prefix: &str) -> Option<ItemId> {
        let mut matches = self
            .items()
            .filter(|(_, item)| starts_with_ignore_case(&item.name, prefix));
        match (matches.next(), matches.next()) {
            (Some((id, _)), None) => Some(id),
            _ => None,
        }
    }

    /// Case-insensitive item type lookup
    pub fn item_type_by_name(&self, name: &str) -> Option<ItemTypeId> {
        self.item_types()
            .find(|(_, ty)| ty.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Incremental catalog construction
#[derive(Debug)]
pub struct CatalogBuilder {
    generation: u8,
    items: Vec<Item>,
    item_types: Vec<ItemType>,
    categories: Vec<Category>,
}

impl CatalogBuilder {
    pub fn new(generation: u8) -> Self {
        Self {
            generation,
            items: Vec::new(),
            item_types: Vec::new(),
            categories: Vec::new(),
        }
    }

    /// Add an item type, returning its handle
    pub fn add_item_type(&mut self, item_type: ItemType) -> ItemTypeId {
        self.item_types.push(item_type);
        Handle::new((self.item_types.len() - 1) as u32, self.generation)
    }

    /// Add an item, returning its handle
    pub fn add_item(&mut self, item: Item) -> ItemId {
        self.items.push(item);
        Handle::new((self.items.len() - 1) as u32, self.generation)
    }

    /// Mutable access to an item added earlier
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        if id.generation() != self.generation {
            return None;
        }
        self.items.get_mut(id.index() as usize)
    }

    pub fn add_category(&mut self, category: Category) {
        self.categories.push(category);
    }

    /// Validate references and link ammo back-references
    pub fn build(mut self) -> Result<Catalog, CatalogError> {
        let max = Handle::<Item>::MAX_INDEX;
        if self.items.len() as u64 > max as u64 || self.item_types.len() as u64 > max as u64 {
            return Err(CatalogError::TooManyEntries(max));
        }

        check_unique("item", self.items.iter().map(|i| i.name.as_str()))?;
        check_unique("item type", self.item_types.iter().map(|t| t.name.as_str()))?;

        let resolves = |id: ItemId, len: usize| {
            id.generation() == self.generation && (id.index() as usize) < len
        };

        let item_len = self.items.len();
        for item in &self.items {
            if let Some(ammo) = item.ammo {
                if !resolves(ammo, item_len) {
                    return Err(CatalogError::UnknownItem {
                        owner: item.name.clone(),
                        name: format!("{:?}", ammo),
                    });
                }
            }
            for entry in &item.item_types {
                let ok = entry.item_type.generation() == self.generation
                    && (entry.item_type.index() as usize) < self.item_types.len();
                if !ok {
                    return Err(CatalogError::UnknownItemType {
                        owner: item.name.clone(),
                        name: format!("{:?}", entry.item_type),
                    });
                }
            }
        }

        for item in &mut self.items {
            item.ammo_users.clear();
        }
        let links: Vec<(ItemId, ItemId)> = (0..item_len)
            .filter_map(|i| {
                let user = Handle::new(i as u32, self.generation);
                self.items[i].ammo.map(|ammo| (ammo, user))
            })
            .collect();
        for (ammo, user) in links {
            self.items[ammo.index() as usize].ammo_users.push(user);
        }

        log::debug!(
            "built catalog generation {}: {} items, {} item types, {} categories",
            self.generation,
            self.items.len(),
            self.item_types.len(),
            self.categories.len()
        );

        Ok(Catalog {
            generation: self.generation,
            items: self.items,
            item_types: self.item_types,
            categories: self.categories,
        })
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// TOML document describing a catalog
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogDef {
    pub item_types: Vec<ItemTypeDef>,
    pub items: Vec<ItemDef>,
    pub categories: Vec<CategoryDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemTypeDef {
    pub name: String,
    pub max: i32,
}

/// Slot usage by item type name
#[derive(Debug, Clone, Deserialize)]
pub struct ItemTypeUseDef {
    pub name: String,
    #[serde(default = "default_delta")]
    pub delta: i32,
}

fn default_delta() -> i32 {
    1
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemDef {
    pub name: String,
    pub short_desc: String,
    pub long_desc: String,
    pub buy_price: i32,
    pub sell_price: i32,
    pub exp_required: i32,
    /// Allowed ships by index (0-7); all ships when absent
    pub ships: Option<Vec<i32>>,
    pub max: i32,
    /// Ammo item name
    pub ammo: Option<String>,
    pub min_ammo: Option<i32>,
    /// Defaults to true when `ammo` is set
    pub needs_ammo: Option<bool>,
    pub delay_status_write: bool,
    pub affects_sets: bool,
    pub resend_sets: bool,
    pub properties: Vec<Property>,
    pub item_types: Vec<ItemTypeUseDef>,
    pub events: Vec<ItemEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryDef {
    pub name: String,
    pub description: String,
    pub items: Vec<String>,
    pub hidden: bool,
}

impl CatalogDef {
    /// Resolve names into handles and build the catalog
    pub fn build(self, generation: u8) -> Result<Catalog, CatalogError> {
        let mut builder = CatalogBuilder::new(generation);

        for def in &self.item_types {
            builder.add_item_type(ItemType::new(def.name.clone(), def.max));
        }
        let type_id = |builder: &CatalogBuilder, name: &str| {
            builder
                .item_types
                .iter()
                .position(|t| t.name.eq_ignore_ascii_case(name))
                .map(|i| Handle::new(i as u32, generation))
        };

        // First pass: items without ammo links
        let mut ammo_refs = Vec::new();
        for def in self.items {
            let mut item = Item::new(def.name);
            item.short_desc = def.short_desc;
            item.long_desc = def.long_desc;
            item.buy_price = def.buy_price;
            item.sell_price = def.sell_price;
            item.exp_required = def.exp_required;
            item.max = def.max;
            item.delay_status_write = def.delay_status_write;
            item.affects_sets = def.affects_sets || def.resend_sets;
            item.resend_sets = def.resend_sets;
            item.properties = def.properties;
            item.events = def.events;
            item.min_ammo = def.min_ammo.unwrap_or(1);
            item.needs_ammo = def.needs_ammo.unwrap_or(def.ammo.is_some());

            if let Some(ships) = def.ships {
                let mut mask = 0u8;
                for raw in ships {
                    let ship = Ship::new(raw).ok_or_else(|| CatalogError::InvalidShip {
                        owner: item.name.clone(),
                        ship: raw,
                    })?;
                    mask |= ship.mask_bit();
                }
                item.ships_allowed = mask;
            } else {
                item.ships_allowed = ALL_SHIPS;
            }

            for usage in def.item_types {
                let item_type = type_id(&builder, &usage.name).ok_or_else(|| {
                    CatalogError::UnknownItemType {
                        owner: item.name.clone(),
                        name: usage.name.clone(),
                    }
                })?;
                item.item_types.push(ItemTypeEntry {
                    item_type,
                    delta: usage.delta,
                });
            }

            let id = builder.add_item(item);
            if let Some(ammo) = def.ammo {
                ammo_refs.push((id, ammo));
            }
        }

        // Second pass: ammo may reference items defined later
        for (user, ammo_name) in ammo_refs {
            let ammo = find_item(&builder, &ammo_name, generation).ok_or_else(|| {
                CatalogError::UnknownItem {
                    owner: builder.items[user.index() as usize].name.clone(),
                    name: ammo_name.clone(),
                }
            })?;
            if let Some(item) = builder.item_mut(user) {
                item.ammo = Some(ammo);
            }
        }

        for def in self.categories {
            let mut items = Vec::with_capacity(def.items.len());
            for name in &def.items {
                let id = find_item(&builder, name, generation).ok_or_else(|| {
                    CatalogError::UnknownItem {
                        owner: format!("category {}", def.name),
                        name: name.clone(),
                    }
                })?;
                items.push(id);
            }
            builder.add_category(Category {
                name: def.name,
                description: def.description,
                items,
                hidden: def.hidden,
            });
        }

        builder.build()
    }
}

fn find_item(builder: &CatalogBuilder, name: &str, generation: u8) -> Option<ItemId> {
    builder
        .items
        .iter()
        .position(|i| i.name.eq_ignore_ascii_case(name))
        .map(|i| Handle::new(i as u32, generation))
}
