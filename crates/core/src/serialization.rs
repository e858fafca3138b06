// Serde helpers for time types that cross the wire

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch, saturating at zero for pre-epoch times
pub fn epoch_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

pub mod time {
    use super::*;

    /// Serialize a SystemTime as milliseconds since the unix epoch
    pub mod system_time_as_millis {
        use super::*;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(t: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_u64(epoch_millis(*t))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
        where
            D: Deserializer<'de>,
        {
            let millis = u64::deserialize(deserializer)?;
            Ok(UNIX_EPOCH + Duration::from_millis(millis))
        }
    }

    /// Serialize a Duration as whole milliseconds
    pub mod duration_as_millis {
        use super::*;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_u64(d.as_millis() as u64)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
        where
            D: Deserializer<'de>,
        {
            let millis = u64::deserialize(deserializer)?;
            Ok(Duration::from_millis(millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "time::system_time_as_millis")]
        at: SystemTime,
        #[serde(with = "time::duration_as_millis")]
        ttl: Duration,
    }

    #[test]
    fn round_trips_through_millis() {
        let original = Stamped {
            at: UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
            ttl: Duration::from_millis(2500),
        };
        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("1700000000123"));
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(epoch_millis(back.at), 1_700_000_000_123);
        assert_eq!(back.ttl, Duration::from_millis(2500));
    }
}
