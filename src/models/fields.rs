use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A document timestamp as it travels on the wire: an ISO-8601 string.
///
/// Structured `chrono` values are normalized on the way in; strings from the
/// wire are kept verbatim. Any other JSON type fails to deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn as_str(&self) -> &str { &self.0 }

    /// Parse back into an instant. `None` for strings that are not RFC 3339
    /// (naive timestamps have no offset to recover).
    pub fn parse(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.0).ok()
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp
where
    Tz::Offset: Display,
{
    fn from(dt: DateTime<Tz>) -> Self { Timestamp(dt.to_rfc3339()) }
}

/// Naive values are taken to be UTC.
impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self { Timestamp(dt.and_utc().to_rfc3339()) }
}

impl From<&str> for Timestamp {
    fn from(s: &str) -> Self { Timestamp(s.to_string()) }
}

impl From<String> for Timestamp {
    fn from(s: String) -> Self { Timestamp(s) }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TimestampVisitor;

        impl<'de> Visitor<'de> for TimestampVisitor {
            type Value = Timestamp;

            fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str("an ISO-8601 date-time string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Timestamp, E> {
                Ok(Timestamp(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Timestamp, E> {
                Ok(Timestamp(v))
            }
        }

        deserializer.deserialize_str(TimestampVisitor)
    }
}

/// Three-state field for patch payloads: omitted, explicitly cleared, or set.
///
/// Use with `#[serde(default, skip_serializing_if = "Patch::is_absent")]` so
/// an omitted field never reaches the remote service while `null` does.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self { Patch::Absent }
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool { matches!(self, Patch::Absent) }

    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Value(v) => v.serialize(serializer),
            Patch::Absent | Patch::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|v| v.map_or(Patch::Null, Patch::Value))
    }
}

/// Version tag of a published file. Kept in whichever form the service sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionTag {
    Number(i64),
    Text(String),
}

impl Display for VersionTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            VersionTag::Number(n) => write!(f, "{n}"),
            VersionTag::Text(s) => f.write_str(s),
        }
    }
}
