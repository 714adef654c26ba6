//! Fixed-point decimals: a 128-bit unscaled integer at scale 12.

use std::fmt;
use std::str::FromStr;

use bytes::BufMut;

use super::codec;
use crate::error_handling::types::WireError;

pub const SCALE: u32 = 12;

const ONE: i128 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    unscaled: i128,
}

impl Decimal {
    /// Encoding reserved for a null decimal column.
    pub const NULL_SENTINEL: i128 = i128::MIN;

    pub fn from_unscaled(unscaled: i128) -> Self {
        Self { unscaled }
    }

    pub fn unscaled(&self) -> i128 {
        self.unscaled
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i128(self.unscaled);
    }

    /// Reads sixteen bytes; the null sentinel decodes to `None`.
    pub fn decode(buf: &mut &[u8]) -> Result<Option<Self>, WireError> {
        let raw = codec::get_i128(buf)?;
        if raw == Self::NULL_SENTINEL {
            return Ok(None);
        }
        Ok(Some(Self::from_unscaled(raw)))
    }
}

impl FromStr for Decimal {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(WireError::InvalidDecimal(s.to_string()));
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(WireError::InvalidDecimal(s.to_string()));
        }
        if fraction.len() > SCALE as usize {
            return Err(WireError::InvalidDecimal(format!(
                "{} has more than {} fractional digits",
                s, SCALE
            )));
        }

        let overflow = || WireError::InvalidDecimal(format!("{} is out of range", s));
        let mut unscaled: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = c as i128 - '0' as i128;
            unscaled = unscaled
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(overflow)?;
        }
        for _ in fraction.len()..SCALE as usize {
            unscaled = unscaled.checked_mul(10).ok_or_else(overflow)?;
        }
        if negative {
            unscaled = -unscaled;
        }
        Ok(Self::from_unscaled(unscaled))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let magnitude = self.unscaled.unsigned_abs();
        let whole = magnitude / ONE as u128;
        let fraction = magnitude % ONE as u128;
        if fraction == 0 {
            return write!(f, "{}{}", sign, whole);
        }
        let digits = format!("{:012}", fraction);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_parse_scales_to_twelve_digits() {
        let d: Decimal = "3.1459".parse().unwrap();
        assert_eq!(d.unscaled(), 3_145_900_000_000);
        let d: Decimal = "-3".parse().unwrap();
        assert_eq!(d.unscaled(), -3 * ONE);
        let d: Decimal = ".5".parse().unwrap();
        assert_eq!(d.unscaled(), ONE / 2);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("0.0000000000001".parse::<Decimal>().is_err());
        assert!("999999999999999999999999999999".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_display_trims_trailing_zeros() {
        assert_eq!("3.14".parse::<Decimal>().unwrap().to_string(), "3.14");
        assert_eq!("-0.5".parse::<Decimal>().unwrap().to_string(), "-0.5");
        assert_eq!("42".parse::<Decimal>().unwrap().to_string(), "42");
    }

    #[test]
    fn test_encoding_is_sixteen_big_endian_bytes() {
        let mut out = BytesMut::new();
        Decimal::from_unscaled(1).encode(&mut out);
        assert_eq!(out.len(), 16);
        assert_eq!(out[15], 1);
        assert!(out[..15].iter().all(|b| *b == 0));

        let mut null = BytesMut::new();
        null.put_i128(Decimal::NULL_SENTINEL);
        let mut buf = &null[..];
        assert_eq!(Decimal::decode(&mut buf).unwrap(), None);
    }
}
