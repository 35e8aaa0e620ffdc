//! Currency definitions, display formatting, and amount parsing.
//!
//! A [`Currency`] carries everything needed to render and parse amounts for
//! players: a symbol, a decimal separator, an optional grouping separator,
//! singular/plural names, and a fixed precision (digits after the decimal
//! separator).
//!
//! # Rounding
//!
//! Every conversion that drops digits truncates toward zero: `-1.239` at
//! precision 2 becomes `-1.23`, not `-1.24`. The same rule is used by the
//! persistence codec, so an amount parsed from chat and an amount read back
//! from storage agree digit for digit.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;

/// Largest precision representable by [`Decimal`].
pub const MAX_PRECISION: u32 = 28;

/// Errors produced by [`Currency::parse`].
#[derive(Debug, thiserror::Error)]
pub enum ParseAmountError {
    /// Nothing was left to parse after stripping symbols and separators.
    #[error("no amount given")]
    Empty,

    /// The remaining text is not a decimal number.
    #[error("invalid amount {input:?}: {source}")]
    Invalid {
        /// The text as handed to the parser.
        input: String,
        /// The underlying decimal parse error.
        source: rust_decimal::Error,
    },
}

/// A named unit of account.
///
/// `identifier` is the unique registry key. At most one currency in a
/// registry has `is_primary` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Unique registry key (e.g. `"gold"`).
    pub identifier: String,
    /// Symbol shown next to amounts (e.g. `"$"`).
    pub symbol: String,
    /// Character separating integer and fractional digits.
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    /// Character separating groups of three integer digits, if any.
    #[serde(default)]
    pub grouping_separator: Option<char>,
    /// Display name for a single unit.
    pub name_singular: String,
    /// Display name for several units.
    pub name_plural: String,
    /// Digits kept after the decimal separator.
    pub precision: u32,
    /// Balance materialized for a player on first access.
    #[serde(default)]
    pub starting_balance: Decimal,
    /// Whether this is the default currency.
    #[serde(default)]
    pub is_primary: bool,
}

const fn default_decimal_separator() -> char {
    '.'
}

impl Currency {
    /// Create a currency with `.` as decimal separator, no grouping, both
    /// display names set to the identifier, and a zero starting balance.
    pub fn new(identifier: impl Into<String>, symbol: impl Into<String>, precision: u32) -> Self {
        let identifier = identifier.into();
        Self {
            name_singular: identifier.clone(),
            name_plural: identifier.clone(),
            identifier,
            symbol: symbol.into(),
            decimal_separator: default_decimal_separator(),
            grouping_separator: None,
            precision,
            starting_balance: Decimal::ZERO,
            is_primary: false,
        }
    }

    /// Set the singular and plural display names.
    #[must_use]
    pub fn with_names(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.name_singular = singular.into();
        self.name_plural = plural.into();
        self
    }

    /// Set the decimal separator.
    #[must_use]
    pub const fn with_decimal_separator(mut self, separator: char) -> Self {
        self.decimal_separator = separator;
        self
    }

    /// Set the grouping separator.
    #[must_use]
    pub const fn with_grouping_separator(mut self, separator: char) -> Self {
        self.grouping_separator = Some(separator);
        self
    }

    /// Set the starting balance handed to new player accounts.
    #[must_use]
    pub const fn with_starting_balance(mut self, amount: Decimal) -> Self {
        self.starting_balance = amount;
        self
    }

    /// Mark the currency as primary.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Describe why the separators cannot round-trip through
    /// [`Currency::parse`], or `None` if they can.
    ///
    /// Separators must differ from each other and must not be an ASCII
    /// digit or `-`.
    pub fn separator_conflict(&self) -> Option<String> {
        let bad = |c: char| c.is_ascii_digit() || c == '-';
        if bad(self.decimal_separator) {
            return Some(format!(
                "decimal separator {:?} cannot be a digit or '-'",
                self.decimal_separator
            ));
        }
        match self.grouping_separator {
            Some(g) if bad(g) => Some(format!("grouping separator {g:?} cannot be a digit or '-'")),
            Some(g) if g == self.decimal_separator => Some(format!(
                "grouping separator {g:?} is also the decimal separator"
            )),
            _ => None,
        }
    }

    /// Balance materialized the first time `account` reads this currency.
    ///
    /// Players receive [`Currency::starting_balance`]; non-player accounts
    /// always start at zero.
    pub fn starting_balance_for(&self, account: &AccountId) -> Decimal {
        match account {
            AccountId::Player(_) => self.truncate(self.starting_balance),
            AccountId::NonPlayer(_) => Decimal::ZERO,
        }
    }

    /// Balances may go below zero in every currency.
    pub const fn supports_negative_balances(&self) -> bool {
        true
    }

    /// Convert `amount` into `other`. Only identity conversion exists.
    pub const fn convert_to(&self, _other: &Self, amount: Decimal) -> Decimal {
        amount
    }

    /// Truncate `amount` toward zero to this currency's precision, with the
    /// scale fixed at exactly `precision` digits.
    pub fn truncate(&self, amount: Decimal) -> Decimal {
        truncate_to(amount, self.precision)
    }

    /// Render `amount` with this currency's separators and precision.
    ///
    /// The symbol is not included; callers decide where it goes.
    pub fn format(&self, amount: Decimal) -> String {
        self.format_with_precision(amount, self.precision)
    }

    /// Render `amount` with an explicit number of fractional digits.
    pub fn format_with_precision(&self, amount: Decimal, digits: u32) -> String {
        let digits = digits.min(MAX_PRECISION);
        let value = truncate_to(amount, digits);
        let negative = value.is_sign_negative() && !value.is_zero();
        let plain = value.abs().to_string();

        let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

        let mut out = String::with_capacity(plain.len().saturating_add(8));
        if negative {
            out.push('-');
        }
        match self.grouping_separator {
            Some(separator) => out.push_str(&group_digits(integer, separator)),
            None => out.push_str(integer),
        }
        if !fraction.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }

    /// Parse a player-entered amount such as `"$1,234.5"`.
    ///
    /// Grouping separators and the symbol are stripped, the decimal separator
    /// is normalized, and the result is truncated toward zero to this
    /// currency's precision.
    ///
    /// # Errors
    ///
    /// Returns [`ParseAmountError::Empty`] if nothing numeric remains, or
    /// [`ParseAmountError::Invalid`] if the text is not a decimal number.
    pub fn parse(&self, formatted: &str) -> Result<Decimal, ParseAmountError> {
        let mut text = formatted.trim().to_owned();
        if let Some(separator) = self.grouping_separator {
            text = text.replace(separator, "");
        }
        if !self.symbol.is_empty() {
            text = text.replace(self.symbol.as_str(), "");
        }
        let text = text.trim().replace(self.decimal_separator, ".");
        if text.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let value = Decimal::from_str(&text).map_err(|source| ParseAmountError::Invalid {
            input: formatted.to_owned(),
            source,
        })?;
        Ok(self.truncate(value))
    }
}

/// Truncate toward zero to `precision` digits and pin the scale.
fn truncate_to(amount: Decimal, precision: u32) -> Decimal {
    let mut value = amount.round_dp_with_strategy(precision, RoundingStrategy::ToZero);
    value.rescale(precision);
    value
}

/// Insert `separator` between every group of three digits, from the right.
fn group_digits(digits: &str, separator: char) -> String {
    let len = digits.chars().count();
    let mut out = String::with_capacity(len.saturating_add(len / 3));
    for (i, ch) in digits.chars().enumerate() {
        let remaining = len.saturating_sub(i);
        if i > 0 && remaining % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PlayerId;

    fn gold() -> Currency {
        Currency::new("gold", "G", 2)
            .with_names("Gold coin", "Gold coins")
            .with_grouping_separator(',')
    }

    #[test]
    fn format_pads_fraction() {
        assert_eq!(gold().format(Decimal::new(65, 1)), "6.50");
        assert_eq!(gold().format(Decimal::ZERO), "0.00");
    }

    #[test]
    fn format_groups_thousands() {
        assert_eq!(gold().format(Decimal::new(123_456_789, 2)), "1,234,567.89");
        assert_eq!(gold().format(Decimal::new(100_000, 0)), "100,000.00");
        assert_eq!(gold().format(Decimal::new(999, 0)), "999.00");
    }

    #[test]
    fn format_truncates_toward_zero() {
        assert_eq!(gold().format(Decimal::new(-1239, 3)), "-1.23");
        assert_eq!(gold().format(Decimal::new(1239, 3)), "1.23");
    }

    #[test]
    fn format_custom_separators() {
        let euro = Currency::new("euro", "€", 2)
            .with_decimal_separator(',')
            .with_grouping_separator('.');
        assert_eq!(euro.format(Decimal::new(123_450, 2)), "1.234,50");
    }

    #[test]
    fn format_with_zero_digits() {
        assert_eq!(gold().format_with_precision(Decimal::new(12_349, 1), 0), "1,234");
    }

    #[test]
    fn parse_strips_symbol_and_grouping() {
        let parsed = gold().parse("G1,234.56").ok();
        assert_eq!(parsed, Some(Decimal::new(123_456, 2)));
    }

    #[test]
    fn parse_truncates_toward_zero() {
        assert_eq!(gold().parse("-3.509").ok(), Some(Decimal::new(-350, 2)));
        assert_eq!(gold().parse("3.509").ok(), Some(Decimal::new(350, 2)));
    }

    #[test]
    fn parse_custom_decimal_separator() {
        let euro = Currency::new("euro", "€", 2)
            .with_decimal_separator(',')
            .with_grouping_separator('.');
        assert_eq!(euro.parse("1.234,5 €").ok(), Some(Decimal::new(123_450, 2)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(gold().parse("abc"), Err(ParseAmountError::Invalid { .. })));
        assert!(matches!(gold().parse("G"), Err(ParseAmountError::Empty)));
    }

    #[test]
    fn separator_conflicts() {
        assert_eq!(gold().separator_conflict(), None);
        assert!(Currency::new("odd", "O", 2)
            .with_grouping_separator('.')
            .separator_conflict()
            .is_some());
        assert!(gold().with_decimal_separator('5').separator_conflict().is_some());
        assert!(gold().with_grouping_separator('-').separator_conflict().is_some());
    }

    #[test]
    fn starting_balance_only_for_players() {
        let currency = gold().with_starting_balance(Decimal::new(100, 0));
        let player = AccountId::from(PlayerId::new());
        assert_eq!(currency.starting_balance_for(&player), Decimal::new(100, 0));
        assert_eq!(
            currency.starting_balance_for(&AccountId::non_player("bank")),
            Decimal::ZERO
        );
    }

    #[test]
    fn conversion_is_identity() {
        let amount = Decimal::new(42, 1);
        let silver = Currency::new("silver", "S", 3);
        assert_eq!(gold().convert_to(&silver, amount), amount);
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "identifier": "gold",
            "symbol": "G",
            "name_singular": "Gold",
            "name_plural": "Gold",
            "precision": 2
        }"#;
        let currency: Option<Currency> = serde_json::from_str(json).ok();
        assert!(currency.is_some());
        if let Some(c) = currency {
            assert_eq!(c.decimal_separator, '.');
            assert_eq!(c.grouping_separator, None);
            assert!(!c.is_primary);
            assert_eq!(c.starting_balance, Decimal::ZERO);
        }
    }
}
