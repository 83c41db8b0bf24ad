use serde::{de::Error, Deserialize, Deserializer, Serializer};

/// Serde helpers for u64 fields the JSON-RPC surface renders as 0x-prefixed
/// hex quantities.
pub mod u64 {
    use super::*;

    pub mod hex_str {
        use super::*;

        pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&format!("{value:#x}"))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
            let value = String::deserialize(deserializer)?;
            u64::from_str_radix(value.trim_start_matches("0x"), 16)
                .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
        }
    }

    pub mod hex_str_opt {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<u64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&format!("{value:#x}")),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<u64>, D::Error> {
            let value = Option::<String>::deserialize(deserializer)?;
            value
                .map(|value| {
                    u64::from_str_radix(value.trim_start_matches("0x"), 16)
                        .map_err(|_| D::Error::custom("Failed to deserialize u64 value"))
                })
                .transpose()
        }
    }
}

/// Serde helpers for 48-byte KZG commitments and proofs, rendered as
/// 0x-prefixed hex strings in JSON.
pub mod bytes48 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8; 48], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 48], D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_bytes48::<D>(&value)
    }
}

pub mod bytes48_vec {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &[[u8; 48]],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter().map(|item| format!("0x{}", hex::encode(item))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<[u8; 48]>, D::Error> {
        let values = Vec::<String>::deserialize(deserializer)?;
        values
            .iter()
            .map(|value| super::parse_bytes48::<D>(value))
            .collect()
    }
}

fn parse_bytes48<'de, D: Deserializer<'de>>(value: &str) -> Result<[u8; 48], D::Error> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(stripped).map_err(D::Error::custom)?;
    bytes
        .try_into()
        .map_err(|_| D::Error::custom("expected 48 bytes"))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "super::bytes48")]
        commitment: [u8; 48],
        #[serde(with = "super::bytes48_vec")]
        proofs: Vec<[u8; 48]>,
    }

    #[test]
    fn hex_round_trip() {
        let wrapper = Wrapper {
            commitment: [0xab; 48],
            proofs: vec![[0x01; 48], [0x02; 48]],
        };
        let json = serde_json::to_string(&wrapper).unwrap();
        assert!(json.contains(&format!("0x{}", "ab".repeat(48))));

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.commitment, wrapper.commitment);
        assert_eq!(back.proofs, wrapper.proofs);
    }
}
