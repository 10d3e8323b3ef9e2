//! Platform snowflake identifiers.
//!
//! Stored rules carry ids as plain JSON integers, so every id is a
//! transparent `u64`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 { self.0 }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self { Self(value) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> { s.trim().parse().map(Self) }
        }
    };
}

snowflake!(
    /// Guild (community server) id
    GuildId
);
snowflake!(
    /// Role id, unique across the platform
    RoleId
);
snowflake!(
    /// User id; a member is a (guild, user) pair
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_integers() {
        let role = RoleId(1_234_567_890_123_456_789);
        assert_eq!(serde_json::to_string(&role).unwrap(), "1234567890123456789");
        let back: RoleId = serde_json::from_str("42").unwrap();
        assert_eq!(back, RoleId(42));
    }

    #[test]
    fn ids_parse_from_cli_text() {
        assert_eq!(" 77 ".parse::<GuildId>().unwrap(), GuildId(77));
        assert!("abc".parse::<UserId>().is_err());
    }
}
