//! Hex rendering of raw byte columns (addresses, hashes, bytecode).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Encode bytes as lowercase hex with a `0x` prefix.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode hex with an optional `0x` prefix.
pub fn from_prefixed_hex(s: &str) -> crate::Result<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(digits).map_err(|e| crate::Error::InvalidHex(format!("{s:?}: {e}")))
}

/// Owned byte string rendered as `0x`-prefixed hex.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexBytes(Vec<u8>);

impl HexBytes {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse from hex with an optional `0x` prefix.
    pub fn parse(s: &str) -> crate::Result<Self> {
        from_prefixed_hex(s).map(Self)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexBytes({self})")
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An on-chain location: chain id plus contract address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContractLocation {
    pub chain_id: i64,
    pub address: HexBytes,
}

impl ContractLocation {
    pub fn new(chain_id: i64, address: impl Into<HexBytes>) -> Self {
        Self {
            chain_id,
            address: address.into(),
        }
    }
}

impl fmt::Display for ContractLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.chain_id, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_hex_roundtrip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = to_prefixed_hex(&bytes);
        assert_eq!(encoded, "0xdeadbeef");
        assert_eq!(from_prefixed_hex(&encoded).unwrap(), bytes);
        assert_eq!(from_prefixed_hex("DEADBEEF").unwrap(), bytes);
    }

    #[test]
    fn test_invalid_hex_is_rejected() {
        assert!(from_prefixed_hex("0xzz").is_err());
        assert!(from_prefixed_hex("0xabc").is_err());
    }

    #[test]
    fn test_hex_bytes_serde_as_string() {
        let value = HexBytes::new(vec![0x01, 0xab]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"0x01ab\"");
        let decoded: HexBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_location_display() {
        let location = ContractLocation::new(1, vec![0x00, 0xff]);
        assert_eq!(location.to_string(), "[1] 0x00ff");
    }
}
