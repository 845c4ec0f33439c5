//! Engine tests for hull_items
//!
//! Scenarios run end to end against the in-memory database, game, spawner
//! and timers.

use std::sync::Arc;

use hull_items::cache;
use hull_items::memory::{GameCall, SpawnerCall, WriteKind};
use hull_items::prelude::*;
use parking_lot::Mutex;

const PLAYER: PlayerId = PlayerId(1);

fn warbird() -> Ship {
    Ship::new(0).unwrap()
}

fn javelin() -> Ship {
    Ship::new(1).unwrap()
}

struct Harness {
    engine: Arc<ItemsEngine>,
    db: Arc<MemoryDatabase>,
    game: Arc<RecordingGame>,
    spawner: Arc<RecordingSpawner>,
    timers: Arc<TickTimers>,
    notes: Arc<Mutex<Vec<ItemNotification>>>,
    hull: HullKey,
}

impl Harness {
    fn new(catalog: Catalog) -> Self {
        Self::build(catalog, Vec::new(), EngineConfig::default())
    }

    fn build(catalog: Catalog, base: Vec<Property>, config: EngineConfig) -> Self {
        let db = Arc::new(MemoryDatabase::new(catalog));
        db.set_ship_properties(warbird(), base);
        db.load_player(PLAYER);
        let hull = db.add_ship(PLAYER, warbird(), 0);

        let game = Arc::new(RecordingGame::new());
        game.enter(PLAYER, warbird(), 0);

        let spawner = Arc::new(RecordingSpawner::new());
        let timers = Arc::new(TickTimers::new());
        let services = Services::new(db.clone(), game.clone(), game.clone(), timers.clone())
            .with_spawner(spawner.clone());
        let engine = Arc::new(ItemsEngine::new(services, config));

        let notes = Arc::new(Mutex::new(Vec::new()));
        let sink = notes.clone();
        engine.subscribe(move |n| sink.lock().push(n.clone()));

        Self {
            engine,
            db,
            game,
            spawner,
            timers,
            notes,
            hull,
        }
    }

    fn item(&self, name: &str) -> ItemId {
        self.engine.item_by_name(name).unwrap()
    }

    /// Add to the current warbird hull
    fn add(&self, name: &str, amount: i32) -> ItemDelta {
        self.engine
            .add_item(PLAYER, self.item(name), HullSelector::Ship(0), amount)
            .unwrap()
    }

    fn add_limited(&self, name: &str, amount: i32) -> ItemDelta {
        self.engine
            .add_item_check_limits(PLAYER, self.item(name), HullSelector::Ship(0), amount)
            .unwrap()
    }

    fn trigger(&self, event: &str) {
        self.engine
            .trigger_event(PLAYER, HullSelector::Ship(0), event)
            .unwrap();
    }

    fn count(&self, name: &str) -> i32 {
        self.engine
            .item_count(PLAYER, self.item(name), HullSelector::Ship(0))
    }

    fn prop(&self, name: &str, default: i32) -> i32 {
        self.engine
            .property_sum(PLAYER, HullSelector::Ship(0), name, default)
    }

    /// Property value computed from scratch, bypassing the cache
    fn recompute(&self, name: &str) -> i32 {
        let catalog = self.engine.catalog();
        let store = self.db.lock();
        let hull = store.hull(PLAYER, self.hull).unwrap();
        cache::compute(&catalog, hull.base_properties(), &hull.inventory, name).resolve(0)
    }

    fn data(&self, name: &str) -> Option<i32> {
        let item = self.item(name);
        let store = self.db.lock();
        let hull = store.hull(PLAYER, self.hull).unwrap();
        hull.inventory.get(item).map(|entry| entry.data)
    }

    fn messages(&self) -> Vec<String> {
        self.game
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GameCall::Message { text, .. } | GameCall::ArenaMessage(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn ammo_added(&self) -> usize {
        self.notes
            .lock()
            .iter()
            .filter(|n| matches!(n, ItemNotification::AmmoAdded { .. }))
            .count()
    }
}

fn message_event(name: &str, text: &str) -> ItemEvent {
    ItemEvent::new(name, EventAction::NoAction, 0).with_message(text)
}

#[test]
fn test_blaster_truncated_to_max() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Blaster")
            .with_max(3)
            .with_property(Property::new("gunlevel", 1))
            .with_event(message_event("init", "Blaster online")),
    );
    let h = Harness::new(builder.build().unwrap());

    let delta = h.add_limited("Blaster", 5);

    assert_eq!(
        delta,
        ItemDelta {
            previous: 0,
            current: 3
        }
    );
    assert_eq!(h.count("Blaster"), 3);
    assert_eq!(h.prop("gunlevel", 0), 3);
    // init fires once, on the 0 -> n transition
    assert_eq!(h.messages(), vec!["Blaster online".to_string()]);

    // Already at max: nothing more is admitted
    assert_eq!(h.add_limited("Blaster", 1).applied(), 0);
    assert_eq!(h.count("Blaster"), 3);
}

fn ammo_catalog() -> Catalog {
    let mut builder = Catalog::builder(0);
    let ammo = builder.add_item(Item::new("Ammo Pack"));
    builder.add_item(
        Item::new("Cannon")
            .with_ammo(ammo, 5)
            .with_property(Property::new("firerate", 10))
            .with_event(message_event("kill", "boom")),
    );
    builder.build().unwrap()
}

#[test]
fn test_ammo_gating_and_single_notification() {
    let h = Harness::new(ammo_catalog());
    let cannon = h.item("Cannon");

    h.add("Cannon", 1);
    assert_eq!(h.prop("firerate", 0), 0);

    h.add("Ammo Pack", 4);
    assert_eq!(h.prop("firerate", 0), 0);
    assert_eq!(h.ammo_added(), 0);

    h.add("Ammo Pack", 1);
    assert_eq!(h.prop("firerate", 0), 10);
    assert_eq!(h.ammo_added(), 1);

    // More ammo does not re-notify
    h.add("Ammo Pack", 3);
    assert_eq!(h.ammo_added(), 1);

    h.add("Ammo Pack", -4);
    assert_eq!(h.prop("firerate", 0), 0);
    let removed = h
        .notes
        .lock()
        .iter()
        .filter(|n| matches!(n, ItemNotification::AmmoRemoved { user, .. } if *user == cannon))
        .count();
    assert_eq!(removed, 1);
}

#[test]
fn test_starved_item_events_suppressed() {
    let h = Harness::new(ammo_catalog());
    h.add("Cannon", 1);

    h.trigger("kill");
    assert!(h.messages().is_empty());

    h.add("Ammo Pack", 5);
    h.trigger("kill");
    assert_eq!(h.messages(), vec!["boom".to_string()]);
}

#[test]
fn test_cache_coherent_across_mutations() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Gun")
            .with_property(Property::new("gunlevel", 1))
            .with_property(Property::new("speed", -5)),
    );
    builder.add_item(
        Item::new("Armor").with_property(Property::new("armor", 3).with_ignore_count()),
    );
    builder.add_item(
        Item::new("Thruster")
            .with_property(Property::new("speed", 20))
            .with_property(Property::new("speed", 1000)),
    );
    let base = vec![Property::new("speed", 100), Property::new("armor", 1)];
    let h = Harness::build(builder.build().unwrap(), base, EngineConfig::default());
    let names = ["gunlevel", "speed", "armor"];

    let steps: [(&str, i32); 7] = [
        ("Gun", 2),
        ("Armor", 4),
        ("Thruster", 1),
        ("Gun", -1),
        ("Armor", -4),
        ("Thruster", 3),
        ("Gun", -5),
    ];
    for (name, amount) in steps {
        // Warm the cache, mutate, then compare against a recompute
        for prop in names {
            h.prop(prop, 0);
        }
        h.add(name, amount);
        for prop in names {
            assert_eq!(
                h.prop(prop, 0),
                h.recompute(prop),
                "{prop} after {name} {amount}"
            );
        }
    }

    // Gun was clamped at zero: 100 + 4 * 20
    assert_eq!(h.prop("speed", 0), 180);
    assert_eq!(h.prop("armor", 0), 1);
}

#[test]
fn test_recalculate_entire_cache_reloads_base() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Gun").with_property(Property::new("gunlevel", 1)));
    let h = Harness::build(
        builder.build().unwrap(),
        vec![Property::new("gunlevel", 2)],
        EngineConfig::default(),
    );

    h.add("Gun", 1);
    assert_eq!(h.prop("gunlevel", 0), 3);

    h.db
        .set_ship_properties(warbird(), vec![Property::new("gunlevel", 5)]);
    assert_eq!(h.prop("gunlevel", 0), 3);

    h.engine
        .recalculate_entire_cache(PLAYER, HullSelector::Ship(0));
    assert_eq!(h.prop("gunlevel", 0), 6);
}

#[test]
fn test_absolute_property_voids_default() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Fixed Shield").with_property(Property::absolute("shield", 50)));
    let h = Harness::build(
        builder.build().unwrap(),
        vec![Property::new("shield", 10)],
        EngineConfig::default(),
    );

    assert_eq!(h.prop("shield", 100), 110);

    h.add("Fixed Shield", 1);
    assert_eq!(h.prop("shield", 100), 60);
    assert_eq!(h.prop("shield", 0), 60);
}

#[test]
fn test_limit_truncation_respects_every_cap() {
    let mut builder = Catalog::builder(0);
    let guns = builder.add_item_type(ItemType::new("Guns", 5));
    builder.add_item(Item::new("Heavy Gun").with_item_type(guns, 2));
    builder.add_item(Item::new("Light Gun").with_max(3).with_item_type(guns, 1));
    let h = Harness::new(builder.build().unwrap());

    let steps = [
        ("Light Gun", 2),
        ("Heavy Gun", 4),
        ("Light Gun", 5),
        ("Heavy Gun", 1),
        ("Light Gun", 1),
    ];
    for (name, amount) in steps {
        h.add_limited(name, amount);

        let free = h
            .engine
            .free_item_type_spots(PLAYER, guns, HullSelector::Ship(0));
        assert!(free >= 0, "slots overdrawn: {free}");
        assert!(h.count("Light Gun") <= 3);
    }

    // Only one heavy gun fit in three free slots; the last light gun took the final one
    assert_eq!(h.count("Light Gun"), 3);
    assert_eq!(h.count("Heavy Gun"), 1);
    assert_eq!(
        h.engine
            .free_item_type_spots(PLAYER, guns, HullSelector::Ship(0)),
        0
    );
}

/// Two items whose "del" event removes one of the other
fn mutual_del_catalog() -> Catalog {
    let del = || ItemEvent::new("del", EventAction::RemoveItemAmmo, 1);
    let mut builder = Catalog::builder(0);
    let a = builder.add_item(Item::new("A").with_event(del()));
    let b = builder.add_item(Item::new("B").with_event(del()));
    // Each uses the other as ammo without being gated by it
    builder.item_mut(a).unwrap().ammo = Some(b);
    builder.item_mut(b).unwrap().ammo = Some(a);
    builder.build().unwrap()
}

#[test]
fn test_mutual_del_cascade_terminates() {
    let h = Harness::new(mutual_del_catalog());
    h.add("A", 1);
    h.add("B", 1);

    let a = h.item("A");
    let result = h
        .engine
        .trigger_event_on_item(PLAYER, a, HullSelector::Ship(0), "del");

    // B goes; its own "del" then has no entry to act from
    assert!(result.is_ok());
    assert_eq!(h.count("A"), 1);
    assert_eq!(h.count("B"), 0);
}

#[test]
fn test_mutual_del_cascade_with_spares() {
    let h = Harness::new(mutual_del_catalog());
    h.add("A", 2);
    h.add("B", 2);

    let a = h.item("A");
    let result = h
        .engine
        .trigger_event_on_item(PLAYER, a, HullSelector::Ship(0), "del");

    assert!(result.is_ok());
    assert_eq!(h.count("A"), 1);
    assert_eq!(h.count("B"), 0);
}

#[test]
fn test_self_feeding_loop_hits_step_bound() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Loop").with_event(ItemEvent::new("add", EventAction::RemoveItem, -1)),
    );
    let config = EngineConfig::default().with_max_cascade_steps(64);
    let h = Harness::build(builder.build().unwrap(), Vec::new(), config);
    let looping = h.item("Loop");

    h.add("Loop", 1);
    let result = h
        .engine
        .trigger_event_on_item(PLAYER, looping, HullSelector::Ship(0), "add");

    assert_eq!(
        result,
        Err(ItemsError::CascadeLimit {
            player: PLAYER,
            limit: 64
        })
    );
    // Every other step adds one copy
    assert_eq!(h.count("Loop"), 33);

    // The engine stays usable afterwards
    assert_eq!(h.add("Loop", -33).current, 0);
}

#[test]
fn test_cascade_overrun_reaches_add_and_grant_callers() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Loop")
            .with_event(ItemEvent::new("init", EventAction::RemoveItem, -1))
            .with_event(ItemEvent::new("add", EventAction::RemoveItem, -1)),
    );
    let config = EngineConfig::default().with_max_cascade_steps(16);
    let h = Harness::build(builder.build().unwrap(), Vec::new(), config);
    let looping = h.item("Loop");
    let overrun = ItemsError::CascadeLimit {
        player: PLAYER,
        limit: 16,
    };

    // init feeds the add loop; the bound stops it eight copies later
    let added = h
        .engine
        .add_item(PLAYER, looping, HullSelector::Ship(0), 1);
    assert_eq!(added, Err(overrun.clone()));
    assert_eq!(h.count("Loop"), 9);

    let limited = h
        .engine
        .add_item_check_limits(PLAYER, looping, HullSelector::Ship(0), 0);
    assert!(limited.is_ok());

    let granted = h.engine.grant_item(&Grant::new(PLAYER, looping, 1));
    assert_eq!(granted, Err(GrantError::Cascade(overrun)));
    assert_eq!(h.count("Loop"), 18);
}

#[test]
fn test_datazero_removes_depleted_item() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Charge")
            .with_event(ItemEvent::new("init", EventAction::SetInventoryData, 2))
            .with_event(ItemEvent::new("use", EventAction::DecrementInventoryData, 0))
            .with_event(
                ItemEvent::new("datazero", EventAction::RemoveItem, 1)
                    .with_message("Charge depleted"),
            ),
    );
    let h = Harness::new(builder.build().unwrap());

    h.add("Charge", 1);

    h.trigger("use");
    assert_eq!(h.count("Charge"), 1);
    assert!(h.messages().is_empty());

    h.trigger("use");
    assert_eq!(h.count("Charge"), 0);
    assert_eq!(h.messages(), vec!["Charge depleted".to_string()]);

    let data_writes: Vec<i32> = h
        .db
        .writes()
        .into_iter()
        .filter(|w| w.kind == WriteKind::InventoryData)
        .map(|w| w.update.data)
        .collect();
    assert_eq!(data_writes, vec![2, 1, 0]);
}

#[test]
fn test_increment_inventory_data() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Tally").with_event(ItemEvent::new(
            "kill",
            EventAction::IncrementInventoryData,
            0,
        )),
    );
    let h = Harness::new(builder.build().unwrap());
    let tally = h.item("Tally");

    h.add("Tally", 1);
    assert_eq!(h.data("Tally"), Some(0));

    h.trigger("kill");
    h.trigger("kill");
    assert_eq!(h.data("Tally"), Some(2));

    let writes: Vec<(i32, bool)> = h
        .db
        .writes()
        .into_iter()
        .filter(|w| w.kind == WriteKind::InventoryData)
        .map(|w| (w.update.data, w.update.delay_write))
        .collect();
    assert_eq!(writes, vec![(1, false), (2, false)]);

    // Data survives count changes
    h.add("Tally", 2);
    assert_eq!(h.data("Tally"), Some(2));

    // Without an entry there is nothing to increment
    h.add("Tally", -3);
    h.engine
        .trigger_event_on_item(PLAYER, tally, HullSelector::Ship(0), "kill")
        .unwrap();
    assert_eq!(h.data("Tally"), None);
}

#[test]
fn test_prize_decoding() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Prizer")
            .with_event(ItemEvent::new("spawn", EventAction::Prize, 305))
            .with_event(ItemEvent::new("spawn", EventAction::Prize, 12)),
    );
    let h = Harness::new(builder.build().unwrap());
    h.add("Prizer", 1);

    h.trigger("spawn");

    assert_eq!(
        h.game.calls(),
        vec![
            GameCall::Prize {
                player: PLAYER,
                prize: 5,
                count: 3
            },
            GameCall::Prize {
                player: PLAYER,
                prize: 12,
                count: 1
            },
        ]
    );
}

#[test]
fn test_ship_reset_coalesces() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Phoenix").with_event(ItemEvent::new("death", EventAction::ShipReset, 0)),
    );
    let config = EngineConfig::default().with_enter_delay(200);
    let h = Harness::build(builder.build().unwrap(), Vec::new(), config);
    h.add("Phoenix", 1);

    h.trigger("death");
    h.timers.advance(10);
    h.trigger("death");
    assert_eq!(h.timers.pending(), 1);

    h.timers.advance(149);
    assert!(h.game.calls().is_empty());

    h.timers.advance(1);
    assert_eq!(h.game.calls(), vec![GameCall::ShipReset(PLAYER)]);
}

#[test]
fn test_add_bounty_floors_at_initial_bounty() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Hunter")
            .with_event(ItemEvent::new("bump", EventAction::AddBounty, 5))
            .with_event(ItemEvent::new("drain", EventAction::AddBounty, -100)),
    );
    let config = EngineConfig::default().with_initial_bounty(warbird(), 20);
    let h = Harness::build(builder.build().unwrap(), Vec::new(), config);
    h.add("Hunter", 1);

    for event in ["bump", "bump", "drain", "drain"] {
        h.trigger(event);
    }

    let bounties: Vec<i32> = h
        .game
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            GameCall::SetBounty { bounty, .. } => Some(bounty),
            _ => None,
        })
        .collect();
    assert_eq!(bounties, vec![20, 25, 20]);
}

#[test]
fn test_kill_teamkill_and_death_events() {
    let killer = PlayerId(2);
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Trophy")
            .with_event(message_event("kill", "kill"))
            .with_event(message_event("teamkill", "teamkill"))
            .with_event(message_event("death", "death")),
    );
    let h = Harness::new(builder.build().unwrap());
    let trophy = h.item("Trophy");

    h.db.load_player(killer);
    h.db.add_ship(killer, javelin(), 0);
    h.game.enter(killer, javelin(), 1);
    h.add("Trophy", 1);
    h.engine
        .add_item(killer, trophy, HullSelector::Ship(1), 1)
        .unwrap();

    h.engine.handle_kill(killer, PLAYER).unwrap();
    assert_eq!(
        h.game.calls(),
        vec![
            GameCall::Message {
                player: killer,
                text: "kill".into()
            },
            GameCall::Message {
                player: PLAYER,
                text: "death".into()
            },
        ]
    );

    h.game.clear_calls();
    h.game.enter(killer, javelin(), 0);
    h.engine.handle_kill(killer, PLAYER).unwrap();
    assert_eq!(h.messages(), vec!["teamkill".to_string(), "death".to_string()]);

    // Suicide only fires death
    h.game.clear_calls();
    h.engine.handle_kill(PLAYER, PLAYER).unwrap();
    assert_eq!(h.messages(), vec!["death".to_string()]);
}

#[test]
fn test_virtual_item_events() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Beacon")
            .with_event(ItemEvent::new("ping", EventAction::RemoveItem, 1).with_message("ping"))
            .with_event(ItemEvent::new("ping", EventAction::Callback, 42)),
    );
    let h = Harness::new(builder.build().unwrap());
    let beacon = h.item("Beacon");

    h.engine
        .trigger_event_on_item(PLAYER, beacon, HullSelector::Ship(0), "ping")
        .unwrap();

    // The message goes out; the removal has no entry and is skipped
    assert_eq!(h.messages(), vec!["ping".to_string()]);
    assert_eq!(h.count("Beacon"), 0);

    let notes = h.notes.lock();
    assert!(notes.contains(&ItemNotification::EventAction {
        player: PLAYER,
        id: 42
    }));
    assert!(notes.contains(&ItemNotification::EventTriggered {
        player: PLAYER,
        hull: h.hull,
        item: Some(beacon),
        event: "ping".into(),
    }));
    assert!(!notes
        .iter()
        .any(|n| matches!(n, ItemNotification::ItemCountChanged { .. })));
}

#[test]
fn test_spawner_actions() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Engine")
            .with_resend_sets()
            .with_event(ItemEvent::new("spawn", EventAction::IgnorePrize, 7)),
    );
    let h = Harness::new(builder.build().unwrap());
    let engine_item = h.item("Engine");
    h.db.add_ship(PLAYER, warbird(), 1);

    h.add("Engine", 1);
    // Not the current shipset: no resend
    h.engine
        .add_item(PLAYER, engine_item, HullSelector::ShipSet(0, 1), 1)
        .unwrap();
    // Count unchanged: no resend
    h.add("Engine", 0);
    h.trigger("spawn");

    assert_eq!(
        h.spawner.calls(),
        vec![
            SpawnerCall::ResendOverrides(PLAYER),
            SpawnerCall::IgnorePrize {
                player: PLAYER,
                prize: 7
            },
        ]
    );
}

/// Game that reads engine state back from inside its own callbacks
struct ReadBackGame {
    inner: RecordingGame,
    engine: Mutex<Option<Arc<ItemsEngine>>>,
    seen: Mutex<Vec<i32>>,
}

impl ReadBackGame {
    fn read_back(&self) {
        let engine = self.engine.lock().clone();
        if let Some(engine) = engine {
            let shield = engine.property_sum(PLAYER, HullSelector::Ship(0), "shield", 0);
            self.seen.lock().push(shield);
        }
    }
}

impl Game for ReadBackGame {
    fn player(&self, player: PlayerId) -> Option<PlayerInfo> {
        self.inner.player(player)
    }

    fn give_prize(&self, player: PlayerId, prize: i32, count: i32) {
        self.read_back();
        self.inner.give_prize(player, prize, count);
    }

    fn set_spectator(&self, player: PlayerId) {
        self.read_back();
        self.inner.set_spectator(player);
    }

    fn ship_reset(&self, player: PlayerId) {
        self.inner.ship_reset(player);
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        self.read_back();
        self.inner.send_message(player, message);
    }

    fn send_arena_message(&self, message: &str) {
        self.inner.send_arena_message(message);
    }
}

#[test]
fn test_collaborators_may_call_back_into_engine() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Ejector")
            .with_property(Property::new("shield", 7))
            .with_event(ItemEvent::new("death", EventAction::Prize, 3).with_message("ejected"))
            .with_event(ItemEvent::new("death", EventAction::Spec, 0)),
    );
    let db = Arc::new(MemoryDatabase::new(builder.build().unwrap()));
    db.load_player(PLAYER);
    db.add_ship(PLAYER, warbird(), 0);

    let game = Arc::new(ReadBackGame {
        inner: RecordingGame::new(),
        engine: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    game.inner.enter(PLAYER, warbird(), 0);
    let selfpos = Arc::new(RecordingGame::new());
    let timers = Arc::new(TickTimers::new());
    let services = Services::new(db.clone(), game.clone(), selfpos, timers);
    let engine = Arc::new(ItemsEngine::new(services, EngineConfig::default()));
    *game.engine.lock() = Some(engine.clone());

    let ejector = engine.item_by_name("Ejector").unwrap();
    engine
        .add_item(PLAYER, ejector, HullSelector::Ship(0), 1)
        .unwrap();
    engine
        .trigger_event(PLAYER, HullSelector::Ship(0), "death")
        .unwrap();

    // Message, prize and spectator each saw the settled hull
    assert_eq!(*game.seen.lock(), vec![7, 7, 7]);
    assert_eq!(
        game.inner.calls(),
        vec![
            GameCall::Message {
                player: PLAYER,
                text: "ejected".into()
            },
            GameCall::Prize {
                player: PLAYER,
                prize: 3,
                count: 1
            },
            GameCall::Spectator(PLAYER),
        ]
    );

    game.engine.lock().take();
}

struct DenyAll;

impl GrantAdviser for DenyAll {
    fn can_grant_item(&self, _request: &GrantRequest) -> bool {
        false
    }
}

#[test]
fn test_strict_grant() {
    let mut builder = Catalog::builder(0);
    builder.add_item(
        Item::new("Mine")
            .with_max(4)
            .with_event(message_event("add", "armed"))
            .with_event(message_event("del", "disarmed")),
    );
    builder.add_item(Item::new("Rack").with_ships(javelin().mask_bit()));
    let h = Harness::new(builder.build().unwrap());
    let mine = h.item("Mine");
    let rack = h.item("Rack");

    let delta = h
        .engine
        .grant_item(&Grant::new(PLAYER, mine, 3).by(PlayerId(9)))
        .unwrap();
    assert_eq!(delta.current, 3);
    assert_eq!(h.messages(), vec!["armed"; 3]);

    assert_eq!(
        h.engine.grant_item(&Grant::new(PLAYER, mine, 2)),
        Err(GrantError::ExceedsMax {
            item: "Mine".into(),
            would_have: 5,
            max: 4
        })
    );
    assert!(matches!(
        h.engine.grant_item(&Grant::new(PLAYER, rack, 1)),
        Err(GrantError::ShipNotAllowed { .. })
    ));
    assert_eq!(
        h.engine.grant_item(&Grant::new(PLAYER, mine, 0)),
        Err(GrantError::BadCount)
    );
    assert_eq!(
        h.engine
            .grant_item(&Grant::new(PLAYER, mine, 1).on_shipset(3)),
        Err(GrantError::InvalidShipset { shipset: 4, max: 3 })
    );

    h.game.clear_calls();
    h.engine
        .grant_item(&Grant::new(PLAYER, mine, -1))
        .unwrap();
    assert_eq!(h.messages(), vec!["disarmed".to_string()]);

    // Advisers can veto; ignoring limits skips them and the max
    h.engine.add_grant_adviser(Arc::new(DenyAll));
    assert_eq!(
        h.engine.grant_item(&Grant::new(PLAYER, mine, 1)),
        Err(GrantError::Refused)
    );
    let forced = h
        .engine
        .grant_item(&Grant::new(PLAYER, mine, 5).ignoring_limits())
        .unwrap();
    assert_eq!(forced.current, 7);
}

/// Adviser that installs items itself while the store is unlocked
struct StockingAdviser {
    engine: Mutex<Option<Arc<ItemsEngine>>>,
}

impl GrantAdviser for StockingAdviser {
    fn can_grant_item(&self, request: &GrantRequest) -> bool {
        let engine = self.engine.lock().take();
        if let Some(engine) = engine {
            let hull = HullKey::new(request.ship, request.shipset);
            engine
                .add_item(request.target, request.item, hull.into(), 3)
                .unwrap();
        }
        true
    }
}

#[test]
fn test_grant_rechecks_limits_after_advisers() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Mine").with_max(4));
    let h = Harness::new(builder.build().unwrap());
    let mine = h.item("Mine");

    h.engine.add_grant_adviser(Arc::new(StockingAdviser {
        engine: Mutex::new(Some(h.engine.clone())),
    }));

    // Passes the first check at 0 + 2, but the adviser brought the hull to 3
    assert_eq!(
        h.engine.grant_item(&Grant::new(PLAYER, mine, 2)),
        Err(GrantError::ExceedsMax {
            item: "Mine".into(),
            would_have: 5,
            max: 4
        })
    );
    assert_eq!(h.count("Mine"), 3);
}

#[test]
fn test_grant_preconditions() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Mine"));
    let h = Harness::new(builder.build().unwrap());
    let mine = h.item("Mine");

    let stranger = PlayerId(5);
    assert_eq!(
        h.engine.grant_item(&Grant::new(stranger, mine, 1)),
        Err(GrantError::ShipsNotLoaded(stranger))
    );

    h.game.set_spectator(PLAYER);
    assert_eq!(
        h.engine.grant_item(&Grant::new(PLAYER, mine, 1)),
        Err(GrantError::InSpectator(PLAYER))
    );

    // An explicit ship without a hull
    assert_eq!(
        h.engine
            .grant_item(&Grant::new(PLAYER, mine, 1).on_ship(javelin())),
        Err(GrantError::NoHull {
            player: PLAYER,
            ship: javelin()
        })
    );

    // Spectators can still be granted items on an owned hull, without events
    let delta = h
        .engine
        .grant_item(&Grant::new(PLAYER, mine, 2).on_ship(warbird()))
        .unwrap();
    assert_eq!(delta.current, 2);
}

#[test]
fn test_bad_preconditions_are_harmless() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Gun").with_property(Property::new("gunlevel", 1)));
    let h = Harness::new(builder.build().unwrap());
    let gun = h.item("Gun");
    let engine = &h.engine;

    assert_eq!(
        engine.add_item(PLAYER, gun, HullSelector::Ship(8), 1),
        Ok(ItemDelta::default())
    );
    assert_eq!(engine.item_count(PLAYER, gun, HullSelector::Ship(-1)), 0);
    assert_eq!(engine.item_count(PLAYER, gun, HullSelector::ShipSet(0, 3)), 0);
    assert_eq!(engine.property_sum(PLAYER, HullSelector::Ship(0), "", 5), 0);
    assert_eq!(engine.property_sum(PLAYER, HullSelector::Ship(1), "gunlevel", 5), 0);
    assert_eq!(engine.property_sum(PlayerId(99), HullSelector::Ship(0), "gunlevel", 5), 0);
    assert!(!engine.has_items_left(PLAYER, HullSelector::Ship(1)));
    assert!(engine
        .trigger_event(PLAYER, HullSelector::Ship(1), "kill")
        .is_ok());

    // Stale handles from an older catalog do not resolve
    let mut next = Catalog::builder(1);
    next.add_item(Item::new("Gun"));
    h.db.set_catalog(next.build().unwrap());
    assert_eq!(
        engine.add_item(PLAYER, gun, HullSelector::Ship(0), 1),
        Ok(ItemDelta::default())
    );
    assert!(!engine.has_items_left(PLAYER, HullSelector::Ship(0)));
}

#[test]
fn test_negative_count_clamped() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Gun").with_property(Property::new("gunlevel", 1)));
    let h = Harness::new(builder.build().unwrap());

    h.add("Gun", 2);
    let delta = h.add("Gun", -5);

    assert_eq!(
        delta,
        ItemDelta {
            previous: 2,
            current: 0
        }
    );
    assert!(!h.engine.has_items_left(PLAYER, HullSelector::Ship(0)));
    assert_eq!(h.prop("gunlevel", 0), 0);
}

#[test]
fn test_fake_players_ignore_hull_triggers() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Trophy").with_event(message_event("kill", "kill")));
    let h = Harness::new(builder.build().unwrap());
    h.add("Trophy", 1);

    h.game.set_player(
        PLAYER,
        PlayerInfo {
            ship: Some(warbird()),
            freq: 0,
            bounty: 0,
            fake: true,
        },
    );
    h.trigger("kill");
    assert!(h.messages().is_empty());
}

#[test]
fn test_notifications_delivered_after_unlock() {
    let mut builder = Catalog::builder(0);
    builder.add_item(Item::new("Gun"));
    let h = Harness::new(builder.build().unwrap());

    // Handlers may call back into the engine
    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = h.engine.clone();
    let sink = seen.clone();
    h.engine.subscribe(move |n| {
        if let ItemNotification::ItemCountChanged { player, item, .. } = n {
            sink.lock()
                .push(engine.item_count(*player, *item, HullSelector::Ship(0)));
        }
    });

    h.add("Gun", 2);
    assert_eq!(*seen.lock(), vec![2]);

    let changed: Vec<(i32, i32)> = h
        .notes
        .lock()
        .iter()
        .filter_map(|n| match n {
            ItemNotification::ItemCountChanged {
                count, old_count, ..
            } => Some((*count, *old_count)),
            _ => None,
        })
        .collect();
    assert_eq!(changed, vec![(2, 0)]);
}

#[test]
fn test_toml_catalog_end_to_end() {
    let catalog = Catalog::from_toml_str(
        r#"
        [[item_types]]
        name = "Guns"
        max = 2

        [[items]]
        name = "Cannon"
        ammo = "Ammo Pack"
        min_ammo = 5
        properties = [{ name = "firerate", value = 10 }]
        item_types = [{ name = "Guns" }]

        [[items]]
        name = "Ammo Pack"
        delay_status_write = true

        [[categories]]
        name = "Weapons"
        items = ["Cannon", "Ammo Pack"]
        "#,
        0,
    )
    .unwrap();
    let config =
        EngineConfig::from_toml_str("max_cascade_steps = 32\n[kill]\nenter_delay = 100").unwrap();
    let h = Harness::build(catalog, Vec::new(), config);

    assert_eq!(h.engine.item_by_partial_name("can"), Some(h.item("Cannon")));
    let ammo = h.item("ammo pack");
    h.add_limited("Cannon", 3);
    h.add("Ammo Pack", 5);

    assert_eq!(h.count("Cannon"), 2);
    assert_eq!(h.prop("firerate", 0), 20);

    let delayed = h
        .db
        .writes()
        .into_iter()
        .filter(|w| w.kind == WriteKind::ItemCount && w.update.item == ammo)
        .all(|w| w.update.delay_write);
    assert!(delayed);
}
