//! Error types for the item engine

use hull_core::{PlayerId, Ship};
use thiserror::Error;

/// Engine errors surfaced to callers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ItemsError {
    /// An event cascade ran past the configured step bound
    #[error("event cascade for {player} exceeded {limit} steps; remaining work dropped")]
    CascadeLimit { player: PlayerId, limit: usize },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ItemsError>;

/// Catalog construction and parsing errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Two definitions share a name
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    /// A definition references an item that does not exist
    #[error("Item '{owner}' references unknown item '{name}'")]
    UnknownItem { owner: String, name: String },

    /// A definition references an item type that does not exist
    #[error("Item '{owner}' references unknown item type '{name}'")]
    UnknownItemType { owner: String, name: String },

    /// Ship index outside 0-7
    #[error("Item '{owner}' lists invalid ship {ship}")]
    InvalidShip { owner: String, ship: i32 },

    /// Catalog grew past the handle index space
    #[error("Catalog exceeds the maximum of {0} entries")]
    TooManyEntries(u32),
}

/// Engine configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Reasons a strict item grant is refused
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("{0} has no ships loaded")]
    ShipsNotLoaded(PlayerId),

    #[error("{0} is spectating")]
    InSpectator(PlayerId),

    #[error("shipset {shipset} is out of range (1 to {max})")]
    InvalidShipset { shipset: i32, max: u8 },

    #[error("grant count must not be zero")]
    BadCount,

    #[error("unknown item")]
    UnknownItem,

    #[error("{player} does not own a hull for {ship}")]
    NoHull { player: PlayerId, ship: Ship },

    #[error("{would_have} would exceed the max of {max} for item {item}")]
    ExceedsMax { item: String, would_have: i32, max: i32 },

    #[error("item {item} not allowed on {ship}")]
    ShipNotAllowed { item: String, ship: Ship },

    #[error("not enough free {item_type} spots")]
    NotEnoughSlots { item_type: String },

    #[error("grant refused by adviser")]
    Refused,

    /// The grant was applied but its follow-up events overran the step bound
    #[error(transparent)]
    Cascade(#[from] ItemsError),
}
