//! Enumeration types for the Coffer ledger.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Account permissions
// ---------------------------------------------------------------------------

/// A capability a player can hold over a non-player account.
///
/// Grants are stored by ordinal, so the discriminants below are part of the
/// on-disk format and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    /// May read the account balance.
    Balance,
    /// May withdraw from the account.
    Withdraw,
    /// May deposit into the account.
    Deposit,
    /// May grant and revoke permissions of other players.
    ModifyPermissions,
}

impl PermissionKind {
    /// Every permission kind, in ordinal order.
    pub const ALL: [Self; 4] = [
        Self::Balance,
        Self::Withdraw,
        Self::Deposit,
        Self::ModifyPermissions,
    ];

    /// The persisted ordinal of this kind.
    pub const fn ordinal(self) -> i64 {
        match self {
            Self::Balance => 0,
            Self::Withdraw => 1,
            Self::Deposit => 2,
            Self::ModifyPermissions => 3,
        }
    }

    /// Decode a persisted ordinal. Unknown values yield `None`.
    pub const fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Balance),
            1 => Some(Self::Withdraw),
            2 => Some(Self::Deposit),
            3 => Some(Self::ModifyPermissions),
            _ => None,
        }
    }
}

impl core::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Balance => "balance",
            Self::Withdraw => "withdraw",
            Self::Deposit => "deposit",
            Self::ModifyPermissions => "modify_permissions",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// How an economy transaction affects a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Add a non-negative amount.
    Deposit,
    /// Subtract a non-negative amount. Overdraft is allowed.
    Withdrawal,
    /// Replace the balance with the given amount.
    Set,
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Set => "set",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_roundtrip() {
        for kind in PermissionKind::ALL {
            assert_eq!(PermissionKind::from_ordinal(kind.ordinal()), Some(kind));
        }
    }

    #[test]
    fn ordinals_are_stable() {
        assert_eq!(PermissionKind::Balance.ordinal(), 0);
        assert_eq!(PermissionKind::Withdraw.ordinal(), 1);
        assert_eq!(PermissionKind::Deposit.ordinal(), 2);
        assert_eq!(PermissionKind::ModifyPermissions.ordinal(), 3);
    }

    #[test]
    fn unknown_ordinal_is_none() {
        assert_eq!(PermissionKind::from_ordinal(4), None);
        assert_eq!(PermissionKind::from_ordinal(-1), None);
    }
}
