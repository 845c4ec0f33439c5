//! Public engine surface
//!
//! Every entry point validates its inputs, locks the hull store once, runs
//! its work (and any cascade it causes) inside a [`Session`], releases the
//! lock, performs the deferred collaborator calls and then delivers
//! notifications.
//!
//! Hulls are addressed with a [`HullSelector`]: a ship on the player's
//! current shipset, an explicit (ship, shipset) pair, or a [`HullKey`].
//! Raw indices are validated and rejected with an error log.

use std::sync::Arc;

use hull_core::{HullKey, PlayerId, Ship};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{GrantError, Result};
use crate::hooks::{GrantAdviser, GrantRequest, Hooks, ItemNotification, SubscriberId};
use crate::hull::HullStore;
use crate::item::{Item, ItemId, ItemTypeId};
use crate::limits;
use crate::services::Services;
use crate::session::{ItemDelta, Session, Work};

/// Which hull of a player an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HullSelector {
    /// Ship index (0-7) on the player's current shipset
    Ship(i32),
    /// Ship index and shipset index
    ShipSet(i32, i32),
    /// An explicit hull
    Hull(HullKey),
}

impl From<HullKey> for HullSelector {
    fn from(key: HullKey) -> Self {
        Self::Hull(key)
    }
}

impl From<Ship> for HullSelector {
    fn from(ship: Ship) -> Self {
        Self::Ship(ship.index() as i32)
    }
}

/// A validated selector
#[derive(Debug, Clone, Copy)]
struct Target {
    ship: Ship,
    shipset: Option<u8>,
}

/// Which missing preconditions are worth an error log
#[derive(Debug, Clone, Copy)]
struct Checks {
    log_unloaded: bool,
    log_missing_hull: bool,
}

impl Checks {
    const STRICT: Self = Self {
        log_unloaded: true,
        log_missing_hull: true,
    };
    const EVENT: Self = Self {
        log_unloaded: true,
        log_missing_hull: false,
    };
    const QUIET: Self = Self {
        log_unloaded: false,
        log_missing_hull: false,
    };
}

/// A strict item grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub granter: Option<PlayerId>,
    pub target: PlayerId,
    pub item: ItemId,
    /// Defaults to the target's current ship
    pub ship: Option<Ship>,
    /// Defaults to the target's current shipset
    pub shipset: Option<i32>,
    pub count: i32,
    /// Skip max, ship, slot and adviser checks
    pub ignore_limits: bool,
}

impl Grant {
    pub fn new(target: PlayerId, item: ItemId, count: i32) -> Self {
        Self {
            granter: None,
            target,
            item,
            ship: None,
            shipset: None,
            count,
            ignore_limits: false,
        }
    }

    pub fn by(mut self, granter: PlayerId) -> Self {
        self.granter = Some(granter);
        self
    }

    pub fn on_ship(mut self, ship: Ship) -> Self {
        self.ship = Some(ship);
        self
    }

    pub fn on_shipset(mut self, shipset: i32) -> Self {
        self.shipset = Some(shipset);
        self
    }

    pub fn ignoring_limits(mut self) -> Self {
        self.ignore_limits = true;
        self
    }
}

/// Item, property and event engine of one arena
pub struct ItemsEngine {
    services: Services,
    config: EngineConfig,
    hooks: Hooks,
}

impl ItemsEngine {
    pub fn new(services: Services, config: EngineConfig) -> Self {
        Self {
            services,
            config,
            hooks: Hooks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<Catalog> {
        self.services.database.catalog()
    }

    /// Case-insensitive exact item lookup
    pub fn item_by_name(&self, name: &str) -> Option<ItemId> {
        self.catalog().item_by_name(name)
    }

    /// Case-insensitive unique-prefix item lookup
    pub fn item_by_partial_name(&self, prefix: &str) -> Option<ItemId> {
        self.catalog().item_by_partial_name(prefix)
    }

    /// Subscribe to item notifications
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&ItemNotification) + Send + Sync + 'static,
    {
        self.hooks.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hooks.unsubscribe(id)
    }

    pub fn add_grant_adviser(&self, adviser: Arc<dyn GrantAdviser>) {
        self.hooks.add_adviser(adviser);
    }

    fn target(&self, player: PlayerId, selector: HullSelector, op: &str) -> Option<Target> {
        let max = self.config.max_shipsets;
        match selector {
            HullSelector::Ship(raw) => match Ship::new(raw) {
                Some(ship) => Some(Target {
                    ship,
                    shipset: None,
                }),
                None => {
                    log::error!("{}: asked to {} on ship {}", player, op, raw);
                    None
                }
            },
            HullSelector::ShipSet(raw_ship, raw_set) => match Ship::new(raw_ship) {
                Some(ship) if (0..i32::from(max)).contains(&raw_set) => Some(Target {
                    ship,
                    shipset: Some(raw_set as u8),
                }),
                _ => {
                    log::error!(
                        "{}: asked to {} on ship {} (shipset {})",
                        player,
                        op,
                        raw_ship,
                        raw_set
                    );
                    None
                }
            },
            HullSelector::Hull(key) => {
                if key.shipset < max {
                    Some(Target {
                        ship: key.ship,
                        shipset: Some(key.shipset),
                    })
                } else {
                    log::error!("{}: asked to {} on {}", player, op, key);
                    None
                }
            }
        }
    }

    fn locate(
        &self,
        store: &HullStore,
        player: PlayerId,
        target: Target,
        op: &str,
        checks: Checks,
    ) -> Option<HullKey> {
        if !store.ships_loaded(player) {
            if checks.log_unloaded {
                log::error!(
                    "{}: asked to {} for a player with unloaded ships",
                    player,
                    op
                );
            }
            return None;
        }

        let shipset = match target.shipset {
            Some(shipset) => shipset,
            None => store.current_shipset(player)?,
        };
        let key = HullKey::new(target.ship, shipset);

        if store.hull(player, key).is_none() {
            if checks.log_missing_hull {
                log::error!("{}: asked to {} on unowned {}", player, op, key);
            }
            return None;
        }
        Some(key)
    }

    /// Run `body` against a located hull under the lock and drain its
    /// cascade, then perform deferred calls and deliver notifications
    fn with_hull<R>(
        &self,
        player: PlayerId,
        selector: HullSelector,
        op: &str,
        checks: Checks,
        body: impl FnOnce(&mut Session<'_>, HullKey) -> R,
    ) -> Option<(R, Result<()>)> {
        let target = self.target(player, selector, op)?;
        let catalog = self.catalog();

        let (value, finished) = {
            let mut store = self.services.database.lock();
            let key = self.locate(&store, player, target, op, checks)?;
            let mut session =
                Session::new(&mut store, &catalog, &self.services, &self.config, player);
            let value = body(&mut session, key);
            (value, session.finish())
        };

        for effect in finished.effects {
            effect.run(&self.services, &self.config);
        }
        self.hooks.dispatch(&finished.notifications);
        Some((value, finished.result))
    }

    /// Installed count of an item; 0 on bad input
    pub fn item_count(&self, player: PlayerId, item: ItemId, selector: HullSelector) -> i32 {
        self.with_hull(player, selector, "get item count", Checks::STRICT, |s, key| {
            if s.catalog.item(item).is_none() {
                log::error!("{}: asked for count of unknown item {:?}", player, item);
                return 0;
            }
            s.store
                .hull(player, key)
                .map_or(0, |h| h.inventory.count(item))
        })
        .map_or(0, |(count, _)| count)
    }

    /// Add (or with a negative amount remove) copies of an item
    ///
    /// Follow-up events run before this returns. A cascade stopped by the
    /// step bound is reported as an error; the mutation itself stands.
    pub fn add_item(
        &self,
        player: PlayerId,
        item: ItemId,
        selector: HullSelector,
        amount: i32,
    ) -> Result<ItemDelta> {
        self.with_hull(player, selector, "add item", Checks::STRICT, |s, key| {
            if s.catalog.item(item).is_none() {
                log::error!("{}: asked to add unknown item {:?}", player, item);
                return ItemDelta::default();
            }
            s.add_item(key, item, amount)
        })
        .map_or(Ok(ItemDelta::default()), |(delta, result)| {
            result.map(|()| delta)
        })
    }

    /// Add as many copies as the item max and slot capacities allow
    pub fn add_item_check_limits(
        &self,
        player: PlayerId,
        item: ItemId,
        selector: HullSelector,
        amount: i32,
    ) -> Result<ItemDelta> {
        self.with_hull(player, selector, "add item", Checks::STRICT, |s, key| {
            let catalog = s.catalog;
            let Some(definition) = catalog.item(item) else {
                log::error!("{}: asked to add unknown item {:?}", player, item);
                return ItemDelta::default();
            };
            if amount == 0 {
                log::trace!("{}: asked to add 0 of item {}", player, definition.name);
            }
            let Some(hull) = s.store.hull(player, key) else {
                return ItemDelta::default();
            };
            let current = hull.inventory.count(item);
            let admitted = limits::admissible_amount(
                catalog,
                &hull.inventory,
                item,
                definition,
                amount,
                player,
            );
            if admitted > 0 {
                s.add_item(key, item, admitted)
            } else {
                ItemDelta {
                    previous: current,
                    current,
                }
            }
        })
        .map_or(Ok(ItemDelta::default()), |(delta, result)| {
            result.map(|()| delta)
        })
    }

    /// Sum of a property on a hull plus `default`, unless an absolute
    /// property voids it
    pub fn property_sum(
        &self,
        player: PlayerId,
        selector: HullSelector,
        name: &str,
        default: i32,
    ) -> i32 {
        if self.target(player, selector, "get property").is_none() {
            return 0;
        }
        if name.is_empty() {
            log::error!("{}: asked to get props for an empty name", player);
            return 0;
        }
        self.with_hull(player, selector, "get property", Checks::QUIET, |s, key| {
            let catalog = s.catalog;
            s.store
                .hull_mut(player, key)
                .map_or(0, |hull| hull.property_sum(catalog, name, default))
        })
        .map_or(0, |(sum, _)| sum)
    }

    /// Fire an event on every item of a hull
    pub fn trigger_event(
        &self,
        player: PlayerId,
        selector: HullSelector,
        event: &str,
    ) -> Result<()> {
        if self.services.game.player(player).is_some_and(|info| info.fake) {
            return Ok(());
        }
        if name_missing(player, event) {
            return Ok(());
        }
        self.with_hull(player, selector, "trigger event", Checks::EVENT, |s, key| {
            s.enqueue(Work::Trigger {
                hull: key,
                item: None,
                event: event.to_string(),
            });
        })
        .map_or(Ok(()), |(_, result)| result)
    }

    /// Fire an event on one item, even if the hull does not hold it
    pub fn trigger_event_on_item(
        &self,
        player: PlayerId,
        item: ItemId,
        selector: HullSelector,
        event: &str,
    ) -> Result<()> {
        if name_missing(player, event) {
            return Ok(());
        }
        self.with_hull(player, selector, "trigger item event", Checks::EVENT, |s, key| {
            if s.catalog.item(item).is_none() {
                log::error!(
                    "{}: asked to trigger item event on unknown item {:?}",
                    player,
                    item
                );
                return;
            }
            s.enqueue(Work::Trigger {
                hull: key,
                item: Some(item),
                event: event.to_string(),
            });
        })
        .map_or(Ok(()), |(_, result)| result)
    }

    /// Free slots of an item type on a hull
    pub fn free_item_type_spots(
        &self,
        player: PlayerId,
        item_type: ItemTypeId,
        selector: HullSelector,
    ) -> i32 {
        self.with_hull(player, selector, "get item type slots", Checks::STRICT, |s, key| {
            if s.catalog.item_type(item_type).is_none() {
                log::error!(
                    "{}: asked for slots of unknown item type {:?}",
                    player,
                    item_type
                );
                return 0;
            }
            s.store.hull(player, key).map_or(0, |hull| {
                limits::free_item_type_spots(s.catalog, &hull.inventory, item_type)
            })
        })
        .map_or(0, |(free, _)| free)
    }

    /// Whether a hull holds any item
    pub fn has_items_left(&self, player: PlayerId, selector: HullSelector) -> bool {
        self.with_hull(player, selector, "check items left", Checks::STRICT, |s, key| {
            s.store
                .hull(player, key)
                .is_some_and(|hull| hull.has_items())
        })
        .is_some_and(|(left, _)| left)
    }

    /// Reload a hull's base properties and recompute its whole cache
    pub fn recalculate_entire_cache(&self, player: PlayerId, selector: HullSelector) {
        self.with_hull(player, selector, "recalc entire cache", Checks::STRICT, |s, key| {
            let catalog = s.catalog;
            let base = s.services.database.ship_property_list(key.ship);
            if let Some(hull) = s.store.hull_mut(player, key) {
                hull.reload_base_properties(catalog, base);
            }
        });
    }

    /// Apply a grant with full admission checks
    ///
    /// Advisers are consulted without the store locked, and the limits are
    /// checked again once it is re-taken. When the grant lands on the
    /// player's current hull, "add" (or "del") fires once per unit.
    pub fn grant_item(&self, grant: &Grant) -> std::result::Result<ItemDelta, GrantError> {
        let player = grant.target;
        let catalog = self.catalog();
        let item = catalog.item(grant.item).ok_or(GrantError::UnknownItem)?;

        let request = {
            let store = self.services.database.lock();
            if !store.ships_loaded(player) {
                return Err(GrantError::ShipsNotLoaded(player));
            }
            let ship = match grant.ship {
                Some(ship) => ship,
                None => self
                    .services
                    .game
                    .player(player)
                    .and_then(|info| info.ship)
                    .ok_or(GrantError::InSpectator(player))?,
            };
            let max_shipsets = self.config.max_shipsets;
            let shipset = match grant.shipset {
                Some(raw) if (0..i32::from(max_shipsets)).contains(&raw) => raw as u8,
                Some(raw) => {
                    return Err(GrantError::InvalidShipset {
                        shipset: raw + 1,
                        max: max_shipsets,
                    })
                }
                None => store.current_shipset(player).unwrap_or(0),
            };
            if grant.count == 0 {
                return Err(GrantError::BadCount);
            }

            let hull = store
                .hull(player, HullKey::new(ship, shipset))
                .ok_or(GrantError::NoHull { player, ship })?;
            if !grant.ignore_limits {
                let inventory = &hull.inventory;
                limits::check_grant(&catalog, inventory, grant.item, item, ship, grant.count)?;
            }

            GrantRequest {
                granter: grant.granter,
                target: player,
                item: grant.item,
                ship,
                shipset,
                count: grant.count,
            }
        };

        if !grant.ignore_limits && !self.hooks.approve(&request) {
            return Err(GrantError::Refused);
        }

        let key = HullKey::new(request.ship, request.shipset);
        let (applied, cascade) = self
            .with_hull(player, key.into(), "grant item", Checks::STRICT, |s, key| {
                apply_grant(s, key, grant, item)
            })
            .ok_or(GrantError::NoHull {
                player,
                ship: request.ship,
            })?;

        let delta = applied?;
        cascade?;
        Ok(delta)
    }

    /// Fire kill, teamkill and death events for a kill
    pub fn handle_kill(&self, killer: PlayerId, killed: PlayerId) -> Result<()> {
        let game = &self.services.game;
        let mut result = Ok(());

        if killer != killed {
            let infos = (game.player(killer), game.player(killed));
            if let (Some(killer_info), Some(killed_info)) = infos {
                if let Some(ship) = killer_info.ship {
                    let event = if killer_info.freq == killed_info.freq {
                        "teamkill"
                    } else {
                        "kill"
                    };
                    result = self.trigger_event(killer, ship.into(), event);
                }
            }
        }

        if let Some(ship) = game.player(killed).and_then(|info| info.ship) {
            let death = self.trigger_event(killed, ship.into(), "death");
            result = result.and(death);
        }
        result
    }
}

/// Second phase of a strict grant, under the re-taken lock
fn apply_grant(
    s: &mut Session<'_>,
    key: HullKey,
    grant: &Grant,
    item: &Item,
) -> std::result::Result<ItemDelta, GrantError> {
    let player = grant.target;

    // The store was unlocked while advisers ran
    if !grant.ignore_limits {
        let hull = s.store.hull(player, key).ok_or(GrantError::NoHull {
            player,
            ship: key.ship,
        })?;
        limits::check_grant(
            s.catalog,
            &hull.inventory,
            grant.item,
            item,
            key.ship,
            grant.count,
        )?;
    }

    let delta = s.add_item(key, grant.item, grant.count);
    if s.current_hull() == Some(key) {
        let event = if grant.count > 0 { "add" } else { "del" };
        for _ in 0..grant.count.unsigned_abs() {
            s.enqueue(Work::Trigger {
                hull: key,
                item: Some(grant.item),
                event: event.to_string(),
            });
        }
    }
    log::debug!(
        "{}: granted {} of item {} on {}",
        player,
        grant.count,
        item.name,
        key
    );
    Ok(delta)
}

fn name_missing(player: PlayerId, event: &str) -> bool {
    if event.is_empty() {
        log::error!("{}: asked to trigger an event with an empty name", player);
        return true;
    }
    false
}
