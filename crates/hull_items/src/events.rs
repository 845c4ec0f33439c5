//! Event execution
//!
//! A trigger scans the hull (or a single item) for events with the given
//! name and runs their actions. Inventory removals are collected during the
//! scan and queued afterwards, so the scan never observes its own
//! mutations. Data decrements reaching zero run the entry's "datazero"
//! events inline. Actions reaching outside the engine are deferred as
//! [`Effect`]s.

use hull_core::{HullKey, PlayerId};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::hooks::ItemNotification;
use crate::item::{EventAction, Item, ItemEvent, ItemId};
use crate::services::{ItemUpdate, Services, TimerKey};
use crate::session::{Effect, Session, Work};

/// Decode a prize action parameter into (prize, count)
pub fn decode_prize(code: i32) -> (i32, i32) {
    let prize = code % 100;
    let count = (code / 100).abs().max(1);
    (prize, count)
}

impl Session<'_> {
    /// Run a trigger; `item` restricts it to one item, which may be absent
    pub(crate) fn run_trigger(
        &mut self,
        key: HullKey,
        item: Option<ItemId>,
        event: &str,
    ) -> Result<()> {
        let catalog = self.catalog;
        let Some(hull) = self.store.hull(self.player, key) else {
            return Ok(());
        };

        // (item, held) pairs to scan
        let targets: Vec<(ItemId, bool)> = match item {
            Some(id) => vec![(id, hull.inventory.contains(id))],
            None => hull.inventory.item_ids().into_iter().map(|id| (id, true)).collect(),
        };

        log::debug!(
            "{}: trigger '{}' on {} ({} items)",
            self.player,
            event,
            key,
            targets.len()
        );

        let mut removals = Vec::new();
        let mut result = Ok(());
        'scan: for (item_id, held) in targets {
            let Some(definition) = catalog.item(item_id) else {
                log::error!(
                    "{}: trigger '{}' on unknown item {:?}",
                    self.player,
                    event,
                    item_id
                );
                continue;
            };
            if self.starved(key, definition) {
                continue;
            }
            for item_event in definition.events_named(event) {
                let entry = held.then_some(item_id);
                let ran = self.run_event(key, definition, entry, item_event, &mut removals);
                if let Err(err) = ran {
                    result = Err(err);
                    break 'scan;
                }
            }
        }

        for (item_id, count) in removals {
            self.enqueue(Work::Apply {
                hull: key,
                item: item_id,
                count,
            });
        }

        self.notify(ItemNotification::EventTriggered {
            player: self.player,
            hull: key,
            item,
            event: event.to_string(),
        });

        result
    }

    fn starved(&self, key: HullKey, item: &Item) -> bool {
        self.store
            .hull(self.player, key)
            .is_some_and(|hull| hull.inventory.starves(item))
    }

    /// Run one event; `entry` is the held item's handle, `None` for virtual events
    fn run_event(
        &mut self,
        key: HullKey,
        item: &Item,
        entry: Option<ItemId>,
        event: &ItemEvent,
        removals: &mut Vec<(ItemId, i32)>,
    ) -> Result<()> {
        let player = self.player;

        if !event.message.is_empty() {
            let text = event.message.clone();
            if event.action == EventAction::ArenaMessage {
                self.defer(Effect::ArenaMessage(text));
            } else {
                self.defer(Effect::Message { player, text });
            }
        }

        if event.action.needs_entry() && entry.is_none() {
            log::error!(
                "{}: item {} tried to run {:?} without an inventory entry",
                player,
                item.name,
                event.action
            );
            return Ok(());
        }

        match event.action {
            EventAction::NoAction | EventAction::ArenaMessage => {}
            EventAction::RemoveItem => {
                if let Some(id) = entry {
                    removals.push((id, event.data));
                }
            }
            EventAction::RemoveItemAmmo => match item.ammo {
                Some(ammo) => removals.push((ammo, event.data)),
                None => log::error!("{}: item {} has no ammo to remove", player, item.name),
            },
            EventAction::Prize => {
                let (prize, count) = decode_prize(event.data);
                self.defer(Effect::Prize {
                    player,
                    prize,
                    count,
                });
            }
            EventAction::SetInventoryData => {
                if let Some(id) = entry {
                    self.write_data(key, id, |_| event.data);
                }
            }
            EventAction::IncrementInventoryData => {
                if let Some(id) = entry {
                    self.write_data(key, id, |data| data.saturating_add(1));
                }
            }
            EventAction::DecrementInventoryData => {
                if let Some(id) = entry {
                    let data = self.write_data(key, id, |data| (data - 1).max(0));
                    if data == Some(0) {
                        for zero_event in item.events_named("datazero") {
                            self.step()?;
                            self.run_event(key, item, entry, zero_event, removals)?;
                        }
                    }
                }
            }
            EventAction::Spec => self.defer(Effect::Spectator(player)),
            EventAction::ShipReset => self.defer(Effect::ShipReset(player)),
            EventAction::Callback => self.notify(ItemNotification::EventAction {
                player,
                id: event.data,
            }),
            EventAction::SetBounty => self.defer(Effect::SetBounty {
                player,
                bounty: event.data,
            }),
            EventAction::AddBounty => self.defer(Effect::AddBounty {
                player,
                amount: event.data,
            }),
            EventAction::IgnorePrize => self.defer(Effect::IgnorePrize {
                player,
                prize: event.data,
            }),
        }
        Ok(())
    }

    /// Rewrite an entry's data field and persist it; returns the new value
    fn write_data(
        &mut self,
        key: HullKey,
        item_id: ItemId,
        update: impl FnOnce(i32) -> i32,
    ) -> Option<i32> {
        let entry = self.store.hull_mut(self.player, key)?.inventory.get_mut(item_id)?;
        entry.data = update(entry.data);
        let written = ItemUpdate {
            item: item_id,
            count: entry.count,
            data: entry.data,
            delay_write: false,
        };
        self.services.database.update_inventory(self.player, key, written);
        Some(written.data)
    }
}

impl Effect {
    /// Perform the call; the hull store must not be locked
    pub(crate) fn run(self, services: &Services, config: &EngineConfig) {
        match self {
            Effect::Message { player, text } => services.game.send_message(player, &text),
            Effect::ArenaMessage(text) => services.game.send_arena_message(&text),
            Effect::Prize {
                player,
                prize,
                count,
            } => services.game.give_prize(player, prize, count),
            Effect::Spectator(player) => services.game.set_spectator(player),
            Effect::ShipReset(player) => schedule_ship_reset(services, config, player),
            Effect::SetBounty { player, bounty } => services.selfpos.set_bounty(player, bounty),
            Effect::AddBounty { player, amount } => add_bounty(services, config, player, amount),
            Effect::ResendOverrides(player) => match &services.spawner {
                Some(spawner) => spawner.resend_overrides(player),
                None => log::warn!("{}: no spawner to resend ship settings", player),
            },
            Effect::IgnorePrize { player, prize } => match &services.spawner {
                Some(spawner) => spawner.ignore_prize(player, prize),
                None => log::error!("{}: no spawner for ignore prize action", player),
            },
        }
    }
}

fn schedule_ship_reset(services: &Services, config: &EngineConfig, player: PlayerId) {
    let delay = config.ship_reset_delay();
    let game = services.game.clone();
    let mainloop = &services.mainloop;

    mainloop.clear_timer(TimerKey::ShipReset(player));
    mainloop.set_timer(
        TimerKey::ShipReset(player),
        delay,
        Box::new(move || game.ship_reset(player)),
    );
    log::debug!("{}: ship reset in {} ticks", player, delay);
}

fn add_bounty(services: &Services, config: &EngineConfig, player: PlayerId, amount: i32) {
    let Some(info) = services.game.player(player) else {
        return;
    };
    let Some(ship) = info.ship else {
        return;
    };
    let bounty = info
        .bounty
        .saturating_add(amount)
        .max(config.initial_bounty(ship));
    if bounty != info.bounty {
        services.selfpos.set_bounty(player, bounty);
    }
}
