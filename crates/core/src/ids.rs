use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppError;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|error| {
                        AppError::Validation(format!("invalid {} '{value}': {error}", $label))
                    })
            }
        }
    };
}

uuid_identifier!(
    /// Tenant identifier used as the partition key for every tenant-owned row.
    TenantId,
    "tenant id"
);

uuid_identifier!(
    /// Identifier of a user account in the identity context.
    UserId,
    "user id"
);

uuid_identifier!(
    /// Identifier of a role row.
    RoleId,
    "role id"
);

uuid_identifier!(
    /// Identifier of a permission row.
    PermissionId,
    "permission id"
);

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{PermissionId, RoleId};

    #[test]
    fn identifiers_parse_from_display_value() {
        let role_id = RoleId::new();
        let parsed = RoleId::from_str(role_id.to_string().as_str());
        assert_eq!(parsed.ok(), Some(role_id));
    }

    #[test]
    fn malformed_identifier_is_a_validation_error() {
        let parsed = PermissionId::from_str("not-a-uuid");
        assert!(matches!(parsed, Err(crate::AppError::Validation(_))));
    }
}
