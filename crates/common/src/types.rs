use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

snowflake!(
    /// A community (guild) the bot serves.
    CommunityId
);
snowflake!(
    /// An actor on the platform. No local state hangs off it.
    MemberId
);
snowflake!(
    /// A voice channel or any other channel-like resource.
    ResourceId
);
snowflake!(
    /// A posted announcement message.
    ArtifactId
);
snowflake!(RoleId);
snowflake!(ThreadId);

impl MemberId {
    /// Platform mention syntax.
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

impl ResourceId {
    pub fn mention(self) -> String {
        format!("<#{}>", self.0)
    }
}
