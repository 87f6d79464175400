//! Discord snowflake identifiers.
//!
//! Discord encodes every ID as a 64-bit snowflake and transmits it as a JSON
//! string. The `define_snowflake!` macro creates a distinct newtype per
//! entity kind so a role ID can never be passed where a user ID is expected.

use core::fmt;

/// Error returned when a string is not a valid snowflake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid snowflake: {0:?}")]
pub struct SnowflakeError(pub String);

/// Parse a decimal snowflake string.
///
/// # Errors
///
/// Returns `SnowflakeError` if the input is empty or not a `u64`.
pub fn parse_snowflake(raw: &str) -> Result<u64, SnowflakeError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SnowflakeError(raw.to_owned()))
}

/// Macro to define a Discord snowflake wrapper.
///
/// The generated type serializes as a string and deserializes from either
/// a string or a number, matching what the Discord API sends.
#[macro_export]
macro_rules! define_snowflake {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            /// Create a new snowflake from its numeric value.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get the underlying numeric value.
            #[must_use]
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::snowflake::SnowflakeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $crate::types::snowflake::parse_snowflake(s).map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Self, D::Error> {
                $crate::types::snowflake::deserialize_snowflake(deserializer).map(Self)
            }
        }
    };
}

#[doc(hidden)]
pub fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct SnowflakeVisitor;

    impl serde::de::Visitor<'_> for SnowflakeVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a snowflake as a string or integer")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative snowflake: {v}")))
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<u64, E> {
            parse_snowflake(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(SnowflakeVisitor)
}

define_snowflake!(UserId);
define_snowflake!(RoleId);
define_snowflake!(ChannelId);
define_snowflake!(MessageId);
define_snowflake!(GuildId);
define_snowflake!(DiscordApplicationId);

impl UserId {
    /// Render a user mention (`<@id>`).
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl RoleId {
    /// Render a role mention (`<@&id>`).
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}
