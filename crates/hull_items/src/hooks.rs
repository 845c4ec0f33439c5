//! Observer notifications and grant advisers
//!
//! Notifications are collected while the hull store is locked and delivered
//! once it is released, so handlers may call back into the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hull_core::{HullKey, PlayerId, Ship};
use parking_lot::RwLock;

use crate::item::ItemId;

/// Something observable happened to a player's items
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemNotification {
    /// Any inventory change on a hull
    ItemsChanged { player: PlayerId, hull: HullKey },
    /// An item's count changed
    ItemCountChanged {
        player: PlayerId,
        hull: HullKey,
        item: ItemId,
        count: i32,
        old_count: i32,
    },
    /// An ammo-gated item gained enough ammo to contribute
    AmmoAdded { player: PlayerId, hull: HullKey, user: ItemId },
    /// An ammo-gated item dropped below its minimum ammo
    AmmoRemoved { player: PlayerId, hull: HullKey, user: ItemId },
    /// An event trigger ran; `item` is set for item-scoped triggers
    EventTriggered {
        player: PlayerId,
        hull: HullKey,
        item: Option<ItemId>,
        event: String,
    },
    /// A callback action fired
    EventAction { player: PlayerId, id: i32 },
}

impl ItemNotification {
    pub fn player(&self) -> PlayerId {
        match self {
            Self::ItemsChanged { player, .. }
            | Self::ItemCountChanged { player, .. }
            | Self::AmmoAdded { player, .. }
            | Self::AmmoRemoved { player, .. }
            | Self::EventTriggered { player, .. }
            | Self::EventAction { player, .. } => *player,
        }
    }
}

/// Handler type for notifications
pub type NotificationHandler = Arc<dyn Fn(&ItemNotification) + Send + Sync>;

/// Subscription identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A strict grant about to be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantRequest {
    /// Player issuing the grant, if any
    pub granter: Option<PlayerId>,
    pub target: PlayerId,
    pub item: ItemId,
    pub ship: Ship,
    pub shipset: u8,
    pub count: i32,
}

/// Veto point for strict grants
pub trait GrantAdviser: Send + Sync {
    /// Return false to refuse the grant
    fn can_grant_item(&self, request: &GrantRequest) -> bool;
}

/// Registry of observers and advisers
#[derive(Default)]
pub struct Hooks {
    subscribers: RwLock<Vec<(SubscriberId, NotificationHandler)>>,
    advisers: RwLock<Vec<Arc<dyn GrantAdviser>>>,
    next_id: AtomicU64,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every notification
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&ItemNotification) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn add_adviser(&self, adviser: Arc<dyn GrantAdviser>) {
        self.advisers.write().push(adviser);
    }

    /// Deliver notifications in order
    pub fn dispatch(&self, notifications: &[ItemNotification]) {
        if notifications.is_empty() {
            return;
        }
        // Handlers may subscribe or unsubscribe while running
        let handlers: Vec<NotificationHandler> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for notification in notifications {
            for handler in &handlers {
                handler(notification);
            }
        }
    }

    /// Ask every adviser; any refusal denies the grant
    pub fn approve(&self, request: &GrantRequest) -> bool {
        let advisers: Vec<Arc<dyn GrantAdviser>> = self.advisers.read().clone();
        let mut approved = true;
        for adviser in advisers {
            if !adviser.can_grant_item(request) {
                approved = false;
            }
        }
        approved
    }
}
