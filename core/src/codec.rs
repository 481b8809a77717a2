//! Fixed-width integer encodings for stored values.
//!
//! Stack counts are 4-byte big-endian unsigned; sums, balances, and the
//! lifetime/pity counters are 8-byte big-endian unsigned. An absent value
//! decodes as zero — every entity is created lazily.

/// Encode a stack count.
pub fn encode_u32(n: u32) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

/// Decode a stack count. Absent or short buffers read as 0.
pub fn decode_u32(buf: Option<&[u8]>) -> u32 {
    match buf {
        Some(b) if b.len() >= 4 => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        _ => 0,
    }
}

/// Encode a sum, balance, or counter.
pub fn encode_u64(n: u64) -> Vec<u8> {
    n.to_be_bytes().to_vec()
}

/// Decode a sum, balance, or counter. Absent or short buffers read as 0.
pub fn decode_u64(buf: Option<&[u8]>) -> u64 {
    match buf {
        Some(b) if b.len() >= 8 => u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]),
        _ => 0,
    }
}

/// Serde adapter for signed amounts inside idempotency snapshots.
///
/// Snapshot integers are persisted as exact decimal strings so replaying a
/// request reproduces the original amounts without any precision loss.
pub mod string_i64 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<i64>().map_err(de::Error::custom)
    }
}
