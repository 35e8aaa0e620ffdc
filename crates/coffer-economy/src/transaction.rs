//! Typed economy transactions.
//!
//! An [`EconomyTransaction`] says what should happen to one balance: add to
//! it, subtract from it, or overwrite it. The [`EconomyTransactionBuilder`]
//! validates the amount before a transaction can exist, so the facade only
//! has to resolve the currency and dispatch.

use coffer_types::{PlayerId, TransactionKind};
use rust_decimal::Decimal;

use crate::EconomyError;

// ---------------------------------------------------------------------------
// Initiator
// ---------------------------------------------------------------------------

/// Who caused a transaction. Carried for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Initiator {
    /// The server itself (plugins, scheduled jobs, console).
    #[default]
    Server,
    /// A player acting through a command or UI.
    Player(PlayerId),
}

impl core::fmt::Display for Initiator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Player(id) => write!(f, "player:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A validated balance change in one currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EconomyTransaction {
    kind: TransactionKind,
    currency: String,
    amount: Decimal,
    initiator: Initiator,
    reason: Option<String>,
}

/// What a transaction does to the stored balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// Add this (possibly negative) delta atomically.
    Change(Decimal),
    /// Overwrite with this amount.
    Set(Decimal),
}

impl EconomyTransaction {
    /// Start building a transaction of `kind` in `currency`.
    pub fn builder(kind: TransactionKind, currency: impl Into<String>) -> EconomyTransactionBuilder {
        EconomyTransactionBuilder::new(kind, currency)
    }

    /// A server-initiated deposit.
    ///
    /// # Errors
    ///
    /// See [`EconomyTransactionBuilder::build`].
    pub fn deposit(currency: impl Into<String>, amount: Decimal) -> Result<Self, EconomyError> {
        Self::builder(TransactionKind::Deposit, currency).amount(amount).build()
    }

    /// A server-initiated withdrawal.
    ///
    /// # Errors
    ///
    /// See [`EconomyTransactionBuilder::build`].
    pub fn withdrawal(currency: impl Into<String>, amount: Decimal) -> Result<Self, EconomyError> {
        Self::builder(TransactionKind::Withdrawal, currency).amount(amount).build()
    }

    /// A server-initiated overwrite.
    ///
    /// # Errors
    ///
    /// See [`EconomyTransactionBuilder::build`].
    pub fn set(currency: impl Into<String>, amount: Decimal) -> Result<Self, EconomyError> {
        Self::builder(TransactionKind::Set, currency).amount(amount).build()
    }

    /// The transaction kind.
    pub const fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// Identifier of the currency affected.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The amount as given (never negative for deposits and withdrawals).
    pub const fn amount(&self) -> Decimal {
        self.amount
    }

    /// Who caused the transaction.
    pub const fn initiator(&self) -> Initiator {
        self.initiator
    }

    /// Free-form reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// The effect on the stored balance.
    pub fn effect(&self) -> BalanceEffect {
        match self.kind {
            TransactionKind::Deposit => BalanceEffect::Change(self.amount),
            TransactionKind::Withdrawal => {
                let mut delta = self.amount;
                delta.set_sign_negative(!self.amount.is_zero());
                BalanceEffect::Change(delta)
            }
            TransactionKind::Set => BalanceEffect::Set(self.amount),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`EconomyTransaction`] values.
///
/// # Examples
///
/// ```
/// use coffer_economy::EconomyTransaction;
/// use coffer_economy::transaction::Initiator;
/// use coffer_types::{PlayerId, TransactionKind};
/// use rust_decimal::Decimal;
///
/// let tx = EconomyTransaction::builder(TransactionKind::Withdrawal, "gold")
///     .amount(Decimal::new(350, 2))
///     .initiator(Initiator::Player(PlayerId::new()))
///     .reason("shop purchase")
///     .build();
///
/// assert!(tx.is_ok());
/// ```
#[derive(Debug)]
pub struct EconomyTransactionBuilder {
    kind: TransactionKind,
    currency: String,
    amount: Option<Decimal>,
    initiator: Initiator,
    reason: Option<String>,
}

impl EconomyTransactionBuilder {
    /// Start building a transaction of `kind` in `currency`.
    pub fn new(kind: TransactionKind, currency: impl Into<String>) -> Self {
        Self {
            kind,
            currency: currency.into(),
            amount: None,
            initiator: Initiator::Server,
            reason: None,
        }
    }

    /// Set the amount.
    #[must_use]
    pub const fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set who caused the transaction.
    #[must_use]
    pub const fn initiator(mut self, initiator: Initiator) -> Self {
        self.initiator = initiator;
        self
    }

    /// Attach a human-readable reason.
    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Validate inputs and produce an [`EconomyTransaction`].
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidTransaction`] if the currency is empty,
    /// the amount is missing, or a deposit or withdrawal amount is negative.
    pub fn build(self) -> Result<EconomyTransaction, EconomyError> {
        if self.currency.is_empty() {
            return Err(EconomyError::InvalidTransaction(
                "currency identifier must not be empty".to_owned(),
            ));
        }
        let amount = self
            .amount
            .ok_or_else(|| EconomyError::InvalidTransaction("amount is required".to_owned()))?;

        let directional = matches!(
            self.kind,
            TransactionKind::Deposit | TransactionKind::Withdrawal
        );
        if directional && amount.is_sign_negative() && !amount.is_zero() {
            return Err(EconomyError::InvalidTransaction(format!(
                "{} amount must not be negative, got {amount}",
                self.kind
            )));
        }

        Ok(EconomyTransaction {
            kind: self.kind,
            currency: self.currency,
            amount,
            initiator: self.initiator,
            reason: self.reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_adds() {
        let tx = EconomyTransaction::deposit("gold", Decimal::new(1000, 2)).ok();
        assert_eq!(
            tx.map(|t| t.effect()),
            Some(BalanceEffect::Change(Decimal::new(1000, 2)))
        );
    }

    #[test]
    fn withdrawal_subtracts() {
        let tx = EconomyTransaction::withdrawal("gold", Decimal::new(350, 2)).ok();
        assert_eq!(
            tx.map(|t| t.effect()),
            Some(BalanceEffect::Change(Decimal::new(-350, 2)))
        );
    }

    #[test]
    fn zero_withdrawal_is_zero_delta() {
        let tx = EconomyTransaction::withdrawal("gold", Decimal::ZERO).ok();
        assert_eq!(tx.map(|t| t.effect()), Some(BalanceEffect::Change(Decimal::ZERO)));
    }

    #[test]
    fn set_overwrites_and_may_be_negative() {
        let tx = EconomyTransaction::set("gold", Decimal::new(-5, 0)).ok();
        assert_eq!(
            tx.map(|t| t.effect()),
            Some(BalanceEffect::Set(Decimal::new(-5, 0)))
        );
    }

    #[test]
    fn negative_deposit_rejected() {
        let result = EconomyTransaction::deposit("gold", Decimal::new(-1, 0));
        assert!(matches!(result, Err(EconomyError::InvalidTransaction(_))));
    }

    #[test]
    fn negative_withdrawal_rejected() {
        let result = EconomyTransaction::withdrawal("gold", Decimal::new(-1, 2));
        assert!(matches!(result, Err(EconomyError::InvalidTransaction(_))));
    }

    #[test]
    fn missing_amount_rejected() {
        let result = EconomyTransaction::builder(TransactionKind::Deposit, "gold").build();
        assert!(matches!(result, Err(EconomyError::InvalidTransaction(_))));
    }

    #[test]
    fn empty_currency_rejected() {
        let result = EconomyTransaction::deposit("", Decimal::ONE);
        assert!(matches!(result, Err(EconomyError::InvalidTransaction(_))));
    }

    #[test]
    fn initiator_and_reason_are_optional() {
        let player = PlayerId::new();
        let tx = EconomyTransaction::builder(TransactionKind::Deposit, "gold")
            .amount(Decimal::ONE)
            .initiator(Initiator::Player(player))
            .reason("quest reward")
            .build()
            .ok();
        assert!(tx.is_some());
        if let Some(t) = tx {
            assert_eq!(t.initiator(), Initiator::Player(player));
            assert_eq!(t.reason(), Some("quest reward"));
            assert_eq!(t.currency(), "gold");
            assert_eq!(t.kind(), TransactionKind::Deposit);
        }

        let plain = EconomyTransaction::deposit("gold", Decimal::ONE).ok();
        assert_eq!(plain.as_ref().map(EconomyTransaction::initiator), Some(Initiator::Server));
        assert_eq!(plain.as_ref().and_then(EconomyTransaction::reason), None);
    }
}
