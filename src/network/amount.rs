use primitive_types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Unsigned on-chain amount in the currency's smallest unit.
///
/// Backed by a 256-bit integer so explorer values above `u64::MAX` survive every codec path.
/// JSON carries it as a decimal string (numbers are accepted on input), binary formats carry
/// the 32 big-endian bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
	pub const ZERO: Amount = Amount(U256::zero());

	pub fn new(value: U256) -> Self {
		Self(value)
	}

	pub fn value(&self) -> U256 {
		self.0
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn saturating_add(self, other: Amount) -> Amount {
		Amount(self.0.saturating_add(other.0))
	}

	/// Parse a base-10 string.
	pub fn from_dec_str(value: &str) -> Result<Self, AmountParseError> {
		U256::from_dec_str(value.trim())
			.map(Amount)
			.map_err(|_| AmountParseError(value.to_string()))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0:?}")]
pub struct AmountParseError(String);

impl FromStr for Amount {
	type Err = AmountParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Amount::from_dec_str(s)
	}
}

impl From<u64> for Amount {
	fn from(value: u64) -> Self {
		Amount(U256::from(value))
	}
}

impl From<u128> for Amount {
	fn from(value: u128) -> Self {
		Amount(U256::from(value))
	}
}

impl From<U256> for Amount {
	fn from(value: U256) -> Self {
		Amount(value)
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Amount {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		if serializer.is_human_readable() {
			serializer.serialize_str(&self.0.to_string())
		} else {
			serializer.serialize_bytes(&self.0.to_big_endian())
		}
	}
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
	type Value = Amount;

	fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str("a decimal amount string, an unsigned integer or 32 big-endian bytes")
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
		Ok(Amount::from(v))
	}

	fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
		Ok(Amount::from(v))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
		u64::try_from(v)
			.map(Amount::from)
			.map_err(|_| E::custom(format!("negative amount: {}", v)))
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
		Amount::from_dec_str(v).map_err(E::custom)
	}

	fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Amount, E> {
		if v.len() != 32 {
			return Err(E::invalid_length(v.len(), &"32 bytes"));
		}
		Ok(Amount(U256::from_big_endian(v)))
	}
}

impl<'de> Deserialize<'de> for Amount {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		if deserializer.is_human_readable() {
			deserializer.deserialize_any(AmountVisitor)
		} else {
			deserializer.deserialize_bytes(AmountVisitor)
		}
	}
}
