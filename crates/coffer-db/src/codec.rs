//! Fixed-point encoding of monetary amounts.
//!
//! A balance is persisted as the integer `amount * 10^precision`, truncated
//! toward zero, serialized as a minimal two's-complement big-endian byte
//! sequence. Zero is a single `0x00` byte; `1.28` at precision 2 is
//! `[0x00, 0x80]`; `-1.29` is `[0xff, 0x7f]`.
//!
//! Decoding divides by `10^precision` exactly using [`Decimal`], never
//! binary floating point.

use coffer_types::PlayerId;
use coffer_types::currency::MAX_PRECISION;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::DbError;

/// Widest scaled integer accepted from storage.
const MAX_ENCODED_LEN: usize = 16;

/// Encode `amount` at `precision` fractional digits.
///
/// # Errors
///
/// Returns [`DbError::Encoding`] if `precision` exceeds the decimal range or
/// the scaled integer does not fit.
pub fn encode(amount: Decimal, precision: u32) -> Result<Vec<u8>, DbError> {
    check_precision(precision)?;

    let mut scaled = amount.round_dp_with_strategy(precision, RoundingStrategy::ToZero);
    scaled.rescale(precision);
    if scaled.scale() != precision {
        return Err(DbError::Encoding(format!(
            "amount {amount} does not fit at precision {precision}"
        )));
    }

    Ok(to_signed_bytes(scaled.mantissa()))
}

/// Decode scaled-integer `bytes` at `precision` fractional digits.
///
/// # Errors
///
/// Returns [`DbError::Encoding`] if the byte sequence is empty, longer than
/// 16 bytes, or holds a value outside the decimal range.
pub fn decode(bytes: &[u8], precision: u32) -> Result<Decimal, DbError> {
    check_precision(precision)?;

    if bytes.is_empty() || bytes.len() > MAX_ENCODED_LEN {
        return Err(DbError::Encoding(format!(
            "scaled integer must be 1..={MAX_ENCODED_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut buf = if negative {
        [0xff; MAX_ENCODED_LEN]
    } else {
        [0x00; MAX_ENCODED_LEN]
    };
    let offset = MAX_ENCODED_LEN.saturating_sub(bytes.len());
    buf.get_mut(offset..)
        .ok_or_else(|| DbError::Encoding("scaled integer overflow".to_owned()))?
        .copy_from_slice(bytes);

    let value = i128::from_be_bytes(buf);
    Decimal::try_from_i128_with_scale(value, precision)
        .map_err(|e| DbError::Encoding(format!("scaled integer {value} out of range: {e}")))
}

/// Decode a player id from its 16-byte storage form.
pub(crate) fn decode_player_id(bytes: &[u8]) -> Result<PlayerId, DbError> {
    PlayerId::from_slice(bytes)
        .ok_or_else(|| DbError::Encoding(format!("player id must be 16 bytes, got {}", bytes.len())))
}

fn check_precision(precision: u32) -> Result<(), DbError> {
    if precision > MAX_PRECISION {
        return Err(DbError::Encoding(format!(
            "precision {precision} exceeds maximum {MAX_PRECISION}"
        )));
    }
    Ok(())
}

/// Minimal two's-complement big-endian form: leading sign bytes are dropped
/// while the next byte still carries the same sign bit.
fn to_signed_bytes(value: i128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let sign: u8 = if value < 0 { 0xff } else { 0x00 };
    let redundant = bytes
        .windows(2)
        .take_while(|pair| match pair {
            [byte, next] => *byte == sign && (next & 0x80) == (sign & 0x80),
            _ => false,
        })
        .count();
    bytes.get(redundant..).map(<[u8]>::to_vec).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(amount: Decimal, precision: u32) -> Option<Decimal> {
        encode(amount, precision)
            .and_then(|bytes| decode(&bytes, precision))
            .ok()
    }

    #[test]
    fn zero_is_one_byte() {
        assert_eq!(encode(Decimal::ZERO, 2).ok(), Some(vec![0x00]));
    }

    #[test]
    fn encoding_is_minimal_twos_complement() {
        assert_eq!(encode(Decimal::new(128, 2), 2).ok(), Some(vec![0x00, 0x80]));
        assert_eq!(encode(Decimal::new(127, 2), 2).ok(), Some(vec![0x7f]));
        assert_eq!(encode(Decimal::new(-128, 2), 2).ok(), Some(vec![0x80]));
        assert_eq!(encode(Decimal::new(-129, 2), 2).ok(), Some(vec![0xff, 0x7f]));
        assert_eq!(encode(Decimal::new(-1, 2), 2).ok(), Some(vec![0xff]));
        assert_eq!(encode(Decimal::new(1000, 2), 2).ok(), Some(vec![0x03, 0xe8]));
    }

    #[test]
    fn roundtrip_preserves_representable_amounts() {
        let samples = [
            (Decimal::new(1000, 2), 2),
            (Decimal::new(-350, 2), 2),
            (Decimal::new(650, 2), 2),
            (Decimal::new(1, 8), 8),
            (Decimal::new(123_456_789, 0), 0),
            (Decimal::MAX, 0),
            (Decimal::MIN, 0),
        ];
        for (amount, precision) in samples {
            assert_eq!(roundtrip(amount, precision), Some(amount), "{amount} @ {precision}");
        }
    }

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(roundtrip(Decimal::new(-1239, 3), 2), Some(Decimal::new(-123, 2)));
        assert_eq!(roundtrip(Decimal::new(1239, 3), 2), Some(Decimal::new(123, 2)));
        assert_eq!(roundtrip(Decimal::new(-9, 3), 2), Some(Decimal::ZERO));
    }

    #[test]
    fn decoded_scale_matches_precision() {
        let decoded = roundtrip(Decimal::new(5, 0), 2);
        assert_eq!(decoded.map(|d| d.scale()), Some(2));
    }

    #[test]
    fn rejects_malformed_bytes() {
        assert!(matches!(decode(&[], 2), Err(DbError::Encoding(_))));
        assert!(matches!(decode(&[0x01; 17], 2), Err(DbError::Encoding(_))));
        // 2^127 - 1 does not fit in a 96-bit decimal mantissa.
        let mut too_big = vec![0x7f];
        too_big.extend_from_slice(&[0xff; 15]);
        assert!(matches!(decode(&too_big, 0), Err(DbError::Encoding(_))));
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(matches!(encode(Decimal::ONE, 29), Err(DbError::Encoding(_))));
        assert!(matches!(decode(&[0x01], 29), Err(DbError::Encoding(_))));
    }

    #[test]
    fn rejects_amounts_that_overflow_at_precision() {
        assert!(matches!(encode(Decimal::MAX, 2), Err(DbError::Encoding(_))));
    }

    #[test]
    fn player_ids_must_be_sixteen_bytes() {
        let id = PlayerId::new();
        assert_eq!(decode_player_id(&id.to_bytes()).ok(), Some(id));
        assert!(matches!(decode_player_id(&[0x01; 15]), Err(DbError::Encoding(_))));
    }
}
