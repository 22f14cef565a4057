//! Google encodes int64 fields as JSON strings. Fields using
//! `#[serde(default, deserialize_with = "int64::deserialize")]` accept both
//! `"123"` and `123`.

use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Int64Repr {
    Number(i64),
    Text(String),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Int64Repr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Int64Repr::Number(n)) => Ok(Some(n)),
        Some(Int64Repr::Text(s)) => s
            .parse()
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid int64 value '{}': {}", s, e))),
    }
}
