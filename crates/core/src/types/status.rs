//! Role and status enums shared with the backend.
//!
//! All of these travel over the wire in `SCREAMING_SNAKE_CASE`, matching the
//! backend's representation.

use serde::{Deserialize, Serialize};

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// A trade customer browsing the inventory.
    #[default]
    User,
    /// Staff with full inventory and quotation management.
    Admin,
}

impl Role {
    /// Wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Account lifecycle status.
///
/// Accounts are created `Pending` at registration and moved by staff
/// approval actions on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
    Approved,
    Suspended,
    Rejected,
}

impl UserStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Active,
        Self::Approved,
        Self::Suspended,
        Self::Rejected,
    ];

    /// Whether a `USER` account in this status may browse the inventory.
    #[must_use]
    pub const fn grants_inventory_access(self) -> bool {
        matches!(self, Self::Active | Self::Approved)
    }

    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Approved => "APPROVED",
            Self::Suspended => "SUSPENDED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending review",
            Self::Active => "Active",
            Self::Approved => "Approved",
            Self::Suspended => "Suspended",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid user status: {s}"))
    }
}

/// Quotation review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl QuotationStatus {
    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// CSS badge class used by the quotation tables.
    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Pending => "badge badge-pending",
            Self::Approved => "badge badge-approved",
            Self::Rejected => "badge badge-rejected",
        }
    }
}

impl std::fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuotationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(format!("invalid quotation status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_and_approved_grant_access() {
        let granted: Vec<_> = UserStatus::ALL
            .into_iter()
            .filter(|s| s.grants_inventory_access())
            .collect();
        assert_eq!(granted, vec![UserStatus::Active, UserStatus::Approved]);
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&UserStatus::Suspended).unwrap_or_default();
        assert_eq!(json, "\"SUSPENDED\"");
        let role: Role = serde_json::from_str("\"ADMIN\"").unwrap_or_default();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_from_str_is_case_insensitive() {
        assert_eq!("approved".parse::<UserStatus>(), Ok(UserStatus::Approved));
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(
            "rejected".parse::<QuotationStatus>(),
            Ok(QuotationStatus::Rejected)
        );
    }
}
