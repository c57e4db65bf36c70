//! Platform snowflake identifiers.
//!
//! Every identifier is scoped to one guild; the newtypes only keep the three
//! id spaces from being mixed up.

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            derive_more::Display,
            derive_more::From,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw snowflake value.
            pub fn get(self) -> u64 {
                self.0
            }
        }
    };
}

snowflake!(
    /// Identifier of a guild, the isolated consistency domain.
    GuildId
);
snowflake!(
    /// Identifier of a channel (voice or category).
    ChannelId
);
snowflake!(
    /// Identifier of a user or guild member.
    UserId
);
