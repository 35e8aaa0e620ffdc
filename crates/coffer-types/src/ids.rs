//! Type-safe identifiers for ledger subjects.
//!
//! A ledger subject is either a player, identified by a [`PlayerId`]
//! (a 128-bit UUID), or a non-player account such as a guild bank or a
//! town treasury, identified by a free-form string. [`AccountId`] is the
//! tagged union of the two. Storage code keys purely on the encoded form
//! and never needs to know which variant it was handed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of a [`PlayerId`] in its persisted binary form.
pub const PLAYER_ID_LEN: usize = 16;

/// Unique identifier for a player, as resolved by the host game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random identifier (UUID v4), mostly useful in tests
    /// and seed data. Real player ids come from the game server.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }

    /// Big-endian 16-byte encoding (most significant bits first).
    pub const fn to_bytes(self) -> [u8; PLAYER_ID_LEN] {
        *self.0.as_bytes()
    }

    /// Decode a player id from its 16-byte storage form.
    ///
    /// Returns `None` if the slice is not exactly 16 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(Self)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<PlayerId> for Uuid {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

/// Identifier of a ledger subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AccountId {
    /// A player account keyed by the player's UUID.
    Player(PlayerId),
    /// A non-player account (bank, guild, shop) keyed by a string.
    NonPlayer(String),
}

impl AccountId {
    /// Build a player account identifier.
    pub const fn player(id: PlayerId) -> Self {
        Self::Player(id)
    }

    /// Build a non-player account identifier.
    pub fn non_player(id: impl Into<String>) -> Self {
        Self::NonPlayer(id.into())
    }

    /// Whether this identifies a player account.
    pub const fn is_player(&self) -> bool {
        matches!(self, Self::Player(_))
    }

    /// The player id, if this is a player account.
    pub const fn as_player(&self) -> Option<PlayerId> {
        match self {
            Self::Player(id) => Some(*id),
            Self::NonPlayer(_) => None,
        }
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player:{id}"),
            Self::NonPlayer(id) => write!(f, "account:{id}"),
        }
    }
}

impl From<PlayerId> for AccountId {
    fn from(id: PlayerId) -> Self {
        Self::Player(id)
    }
}

impl From<Uuid> for AccountId {
    fn from(id: Uuid) -> Self {
        Self::Player(PlayerId(id))
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::NonPlayer(id.to_owned())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self::NonPlayer(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_bytes_roundtrip() {
        let id = PlayerId::new();
        let bytes = id.to_bytes();
        assert_eq!(PlayerId::from_slice(&bytes), Some(id));
    }

    #[test]
    fn player_id_bytes_are_big_endian() {
        let id = PlayerId(Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff));
        let bytes = id.to_bytes();
        assert_eq!(bytes.first(), Some(&0x00));
        assert_eq!(bytes.get(1), Some(&0x11));
        assert_eq!(bytes.last(), Some(&0xff));
    }

    #[test]
    fn short_slice_is_rejected() {
        assert!(PlayerId::from_slice(&[1, 2, 3]).is_none());
    }

    #[test]
    fn account_variants() {
        let player = PlayerId::new();
        assert!(AccountId::from(player).is_player());
        assert_eq!(AccountId::from(player).as_player(), Some(player));
        assert!(!AccountId::from("guild_a").is_player());
        assert_eq!(AccountId::non_player("guild_a").to_string(), "account:guild_a");
    }

    #[test]
    fn account_serde_is_tagged() {
        let json = serde_json::to_string(&AccountId::non_player("bank")).ok();
        assert_eq!(json.as_deref(), Some(r#"{"kind":"non_player","id":"bank"}"#));
    }
}
