//! Locked-store context threaded through one public engine call
//!
//! A [`Session`] holds the locked [`HullStore`], the catalog snapshot and the
//! collaborators. Follow-up work produced while handling the call (init,
//! add and del events, deferred inventory deltas) goes through a FIFO work
//! queue drained before the lock is released. Every unit of work counts
//! against `max_cascade_steps`.
//!
//! Calls into the game, bounty and spawner collaborators are recorded as
//! [`Effect`]s and performed only after the lock is released, so a host may
//! call back into the engine from any of them.

use std::collections::VecDeque;

use hull_core::{HullKey, PlayerId};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{ItemsError, Result};
use crate::hooks::ItemNotification;
use crate::hull::HullStore;
use crate::item::ItemId;
use crate::services::{ItemUpdate, Services};

/// Count of an item before and after a mutation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemDelta {
    pub previous: i32,
    pub current: i32,
}

impl ItemDelta {
    /// Net change actually applied
    pub fn applied(&self) -> i32 {
        self.current - self.previous
    }

    /// The item is no longer present on the hull
    pub fn is_empty(&self) -> bool {
        self.current == 0
    }
}

/// Pending follow-up work
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Work {
    /// Fire an event on the whole hull, or on a single item
    Trigger {
        hull: HullKey,
        item: Option<ItemId>,
        event: String,
    },
    /// Remove `count` of an item (negative adds), then fire del/add per unit
    Apply { hull: HullKey, item: ItemId, count: i32 },
}

/// Collaborator call performed once the store is unlocked
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Effect {
    Message { player: PlayerId, text: String },
    ArenaMessage(String),
    Prize { player: PlayerId, prize: i32, count: i32 },
    Spectator(PlayerId),
    /// Arm (or re-arm) the coalesced ship reset timer
    ShipReset(PlayerId),
    SetBounty { player: PlayerId, bounty: i32 },
    /// Add to the bounty current at the time the effect runs
    AddBounty { player: PlayerId, amount: i32 },
    ResendOverrides(PlayerId),
    IgnorePrize { player: PlayerId, prize: i32 },
}

/// Outcome of a drained session
pub(crate) struct Finished {
    pub(crate) result: Result<()>,
    pub(crate) effects: Vec<Effect>,
    pub(crate) notifications: Vec<ItemNotification>,
}

pub(crate) struct Session<'a> {
    pub(crate) store: &'a mut HullStore,
    pub(crate) catalog: &'a Catalog,
    pub(crate) services: &'a Services,
    pub(crate) config: &'a EngineConfig,
    pub(crate) player: PlayerId,
    queue: VecDeque<Work>,
    steps: usize,
    effects: Vec<Effect>,
    notifications: Vec<ItemNotification>,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        store: &'a mut HullStore,
        catalog: &'a Catalog,
        services: &'a Services,
        config: &'a EngineConfig,
        player: PlayerId,
    ) -> Self {
        Self {
            store,
            catalog,
            services,
            config,
            player,
            queue: VecDeque::new(),
            steps: 0,
            effects: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub(crate) fn notify(&mut self, notification: ItemNotification) {
        self.notifications.push(notification);
    }

    pub(crate) fn defer(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub(crate) fn enqueue(&mut self, work: Work) {
        self.queue.push_back(work);
    }

    /// Count one unit of work against the cascade bound
    pub(crate) fn step(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.config.max_cascade_steps {
            return Err(ItemsError::CascadeLimit {
                player: self.player,
                limit: self.config.max_cascade_steps,
            });
        }
        Ok(())
    }

    /// Drain the work queue
    pub(crate) fn run(&mut self) -> Result<()> {
        while let Some(work) = self.queue.pop_front() {
            let result = match self.step() {
                Ok(()) => self.execute(work),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                log::error!(
                    "{}: {}; dropping {} queued work items",
                    self.player,
                    err,
                    self.queue.len()
                );
                self.queue.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    fn execute(&mut self, work: Work) -> Result<()> {
        match work {
            Work::Trigger { hull, item, event } => self.run_trigger(hull, item, &event),
            Work::Apply { hull, item, count } => {
                self.apply_removal(hull, item, count);
                Ok(())
            }
        }
    }

    /// Drain remaining work and hand back the deferred calls and notifications
    pub(crate) fn finish(mut self) -> Finished {
        let result = self.run();
        Finished {
            result,
            effects: self.effects,
            notifications: self.notifications,
        }
    }

    fn apply_removal(&mut self, hull: HullKey, item: ItemId, count: i32) {
        self.add_item(hull, item, -count);

        let event = if count > 0 { "del" } else { "add" };
        for _ in 0..count.unsigned_abs() {
            self.enqueue(Work::Trigger {
                hull,
                item: Some(item),
                event: event.to_string(),
            });
        }
    }

    /// Current ship and shipset of the session player, if in a ship
    pub(crate) fn current_hull(&self) -> Option<HullKey> {
        let ship = self.services.game.player(self.player)?.ship?;
        let shipset = self.store.current_shipset(self.player)?;
        Some(HullKey::new(ship, shipset))
    }

    /// Change an item's count on a hull, keeping the cache coherent
    pub(crate) fn add_item(&mut self, key: HullKey, item_id: ItemId, amount: i32) -> ItemDelta {
        let catalog = self.catalog;
        let player = self.player;

        let Some(item) = catalog.item(item_id) else {
            log::error!("{}: asked to add unknown item {:?}", player, item_id);
            return ItemDelta::default();
        };
        let Some(hull) = self.store.hull_mut(player, key) else {
            log::error!(
                "{}: asked to add item {} to missing hull {}",
                player,
                item.name,
                key
            );
            return ItemDelta::default();
        };

        if amount == 0 {
            log::trace!("{}: asked to add 0 of item {}", player, item.name);
        }

        let (old_count, data) = hull
            .inventory
            .get(item_id)
            .map_or((0, 0), |e| (e.count, e.data));
        let do_init = old_count == 0 && amount != 0;

        let mut count = old_count.saturating_add(amount);
        if count < 0 {
            log::error!(
                "{}: asked to set item {} count to {}. Setting to 0.",
                player,
                item.name,
                count
            );
            count = 0;
        }

        if item.ammo.is_none() {
            hull.cache.patch_item(item, count - old_count);
        } else {
            hull.cache.clear();
        }
        hull.inventory.set(item_id, count, data);

        self.services.database.update_item_on_hull(
            player,
            key,
            ItemUpdate {
                item: item_id,
                count,
                data,
                delay_write: item.delay_status_write,
            },
        );

        if count != old_count {
            self.notify(ItemNotification::ItemCountChanged {
                player,
                hull: key,
                item: item_id,
                count,
                old_count,
            });
        }

        for &user_id in item.ammo_users() {
            let Some(user) = catalog.item(user_id) else {
                continue;
            };
            if !user.needs_ammo {
                continue;
            }
            let Some(hull) = self.store.hull_mut(player, key) else {
                break;
            };
            if !hull.inventory.contains(user_id) {
                continue;
            }
            hull.recalculate(catalog);

            if old_count < user.min_ammo && count >= user.min_ammo {
                self.notify(ItemNotification::AmmoAdded {
                    player,
                    hull: key,
                    user: user_id,
                });
            } else if old_count >= user.min_ammo && count < user.min_ammo {
                self.notify(ItemNotification::AmmoRemoved {
                    player,
                    hull: key,
                    user: user_id,
                });
            }
        }

        if item.resend_sets && count != old_count && self.current_hull() == Some(key) {
            self.defer(Effect::ResendOverrides(player));
        }

        self.notify(ItemNotification::ItemsChanged { player, hull: key });

        if do_init {
            self.enqueue(Work::Trigger {
                hull: key,
                item: Some(item_id),
                event: "init".to_string(),
            });
        }

        ItemDelta {
            previous: old_count,
            current: count,
        }
    }
}
