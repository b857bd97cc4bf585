/// ID types for Foley entities
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the inner string
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a single playable effect within a group
    EffectId
);

string_id!(
    /// Identifier of a soundboard button (group)
    GroupId
);

string_id!(
    /// Stable identifier of one sequence step, used to highlight the step while it sounds
    ElementId
);

string_id!(
    /// Identifier of one live container instance
    InstanceId
);

impl InstanceId {
    /// Generate a new random instance ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
