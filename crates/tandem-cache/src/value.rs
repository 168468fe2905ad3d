//! Values that can be stored in the cache.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CacheResult;

/// A read result that the interceptor may cache.
///
/// Empty-equivalent results are never written: a later read would otherwise
/// keep returning "nothing" after the record appears.
pub trait CacheValue: Serialize + DeserializeOwned + Send + Sync {
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl<T: CacheValue> CacheValue for Option<T> {
    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

impl<T: CacheValue> CacheValue for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl CacheValue for Value {
    fn is_empty_value(&self) -> bool {
        self.is_null()
    }
}

impl CacheValue for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl CacheValue for bool {}
impl CacheValue for i64 {}
impl CacheValue for u64 {}

/// Encodes a value as MessagePack with field names.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CacheResult<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CacheResult<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: String,
        #[serde(rename = "firstName")]
        first_name: String,
    }

    impl CacheValue for Profile {}

    #[test]
    fn test_empty_equivalents() {
        assert!(None::<Profile>.is_empty_value());
        assert!(Vec::<Profile>::new().is_empty_value());
        assert!(Value::Null.is_empty_value());
        assert!(String::new().is_empty_value());

        let profile = Profile {
            id: "1".into(),
            first_name: "A".into(),
        };
        assert!(!profile.is_empty_value());
        assert!(!Some(profile).is_empty_value());
        assert!(!json!([]).is_empty_value());
        assert!(!false.is_empty_value());
    }

    #[test]
    fn test_struct_survives_codec() {
        let profile = Profile {
            id: "abc123".into(),
            first_name: "Ada".into(),
        };
        let bytes = encode(&profile).unwrap();
        let back: Profile = decode(&bytes).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(decode::<Profile>(&[0xc1, 0x00]).is_err());
    }
}
