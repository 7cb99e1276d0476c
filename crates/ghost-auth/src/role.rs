//! Role hierarchy types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission level of a session or key.
///
/// Roles form a strict total order: `God > Admin > Guest`. Permission
/// checks are purely numeric on this order, so the derived [`Ord`] is the
/// single source of truth.
///
/// # Example
///
/// ```
/// use ghost_auth::Role;
///
/// assert!(Role::God.has_permission(Role::Admin));
/// assert!(Role::Admin.has_permission(Role::Admin));
/// assert!(!Role::Guest.has_permission(Role::Admin));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Read-only access. Default until authenticated.
    #[default]
    Guest = 1,
    /// Standard access. Issued by God.
    Admin = 2,
    /// Full access. There can be only one.
    God = 3,
}

impl Role {
    /// Numeric rank used by the permission check.
    #[must_use]
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Returns `true` if this role meets or exceeds `required`.
    #[must_use]
    pub fn has_permission(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Guest => "GUEST",
            Self::Admin => "ADMIN",
            Self::God => "GOD",
        };
        f.write_str(s)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GUEST" => Ok(Self::Guest),
            "ADMIN" => Ok(Self::Admin),
            "GOD" => Ok(Self::God),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
