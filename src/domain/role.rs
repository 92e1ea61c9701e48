use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Role ladder for users inside an organization.
///
/// The ordering is the authorization model: `Operator < Admin < MasterAdmin`.
/// Every privilege check in the crate goes through [`Role::satisfies`]; no
/// caller compares roles by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Admin,
    MasterAdmin,
}

impl Role {
    /// The single authorization gate: true when this role sits at or above
    /// the required rung.
    #[must_use]
    pub fn satisfies(self, minimum: Role) -> bool {
        self >= minimum
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Admin => "admin",
            Self::MasterAdmin => "master_admin",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "operator" => Some(Self::Operator),
            "admin" => Some(Self::Admin),
            "master_admin" => Some(Self::MasterAdmin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
