//! Serde adapter for fields where "absent" and "explicit null" differ.
//!
//! Used as `#[serde(default, skip_serializing_if = "Option::is_none", with = "tristate")]`
//! on an `Option<Option<T>>`: a missing key stays `None`, `null` becomes
//! `Some(None)`, and a value becomes `Some(Some(v))`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[allow(clippy::option_option)]
pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::option_option)]
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
