//! Serde helpers for byte fields

/// `Vec<u8>` as a base64 string
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// `[u8; 32]` as a hex string
pub mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(encoded).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        #[serde(with = "super::base64_bytes")]
        content: Vec<u8>,
        #[serde(with = "super::hex_array")]
        hash: [u8; 32],
    }

    #[test]
    fn test_byte_fields_roundtrip() {
        let payload = Payload {
            content: b"hello".to_vec(),
            hash: [0xab; 32],
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"aGVsbG8=\""));
        assert!(json.contains(&"ab".repeat(32)));
        assert_eq!(serde_json::from_str::<Payload>(&json).unwrap(), payload);

        assert!(serde_json::from_str::<Payload>(r#"{"content":"aGVsbG8=","hash":"ab"}"#).is_err());
    }
}
