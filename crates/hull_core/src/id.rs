//! Player, ship and hull identifiers

use std::fmt;

/// Identifies a connected player within an arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// One of the eight flyable ships (0 = warbird ... 7 = shark)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ship(u8);

impl Ship {
    /// Number of flyable ships
    pub const COUNT: usize = 8;

    /// Validate a raw ship index
    pub fn new(index: i32) -> Option<Self> {
        if (0..Self::COUNT as i32).contains(&index) {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Index in `0..8`
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit for this ship in an 8-bit ship mask
    #[inline]
    pub const fn mask_bit(self) -> u8 {
        1 << self.0
    }

    /// Whether `mask` allows this ship
    #[inline]
    pub const fn allowed_by(self, mask: u8) -> bool {
        mask & self.mask_bit() != 0
    }

    /// Iterate every ship
    pub fn all() -> impl Iterator<Item = Ship> {
        (0..Self::COUNT as u8).map(Ship)
    }
}

impl fmt::Display for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ship {}", self.0 + 1)
    }
}

/// Identifies one hull of a player: a (ship, shipset) pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HullKey {
    pub ship: Ship,
    pub shipset: u8,
}

impl HullKey {
    pub const fn new(ship: Ship, shipset: u8) -> Self {
        Self { ship, shipset }
    }
}

impl fmt::Display for HullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (shipset {})", self.ship, self.shipset + 1)
    }
}
