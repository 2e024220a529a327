//! Account records as returned by the backend profile endpoint.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::quotation::Quotation;
use super::status::{Role, UserStatus};

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    /// Know-your-customer / business profile submitted at registration.
    #[serde(default, alias = "businessProfile")]
    pub kyc: Option<KycProfile>,
    #[serde(default)]
    pub quotations: Vec<Quotation>,
}

impl User {
    /// Whether the account has the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Name for greetings, falling back to the email address.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    /// Number of quotations still awaiting a decision.
    #[must_use]
    pub fn open_quotations(&self) -> usize {
        self.quotations.iter().filter(|q| q.is_open()).count()
    }
}

/// Business details a trade customer provides for approval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KycProfile {
    pub company_name: Option<String>,
    pub business_type: Option<String>,
    pub registration_number: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl KycProfile {
    /// Label/value pairs for the fields that were filled in.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Company", self.company_name.as_deref()),
            ("Business type", self.business_type.as_deref()),
            ("Registration no.", self.registration_number.as_deref()),
            ("Country", self.country.as_deref()),
            ("Phone", self.phone.as_deref()),
            ("Website", self.website.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| value.filter(|v| !v.is_empty()).map(|v| (label, v)))
        .collect()
    }
}

/// Registration body sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub kyc: KycProfile,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_deserializes_with_defaults() {
        let user: User =
            serde_json::from_str(r#"{"_id":"u1","email":"buyer@example.com"}"#).unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, UserStatus::Pending);
        assert!(!user.is_admin());
        assert_eq!(user.display_name(), "buyer@example.com");
    }

    #[test]
    fn test_business_profile_alias() {
        let user: User = serde_json::from_str(
            r#"{"id":"u2","email":"a@b.co","role":"ADMIN","status":"ACTIVE",
                "businessProfile":{"companyName":"Lumen Gems","country":"TH"}}"#,
        )
        .unwrap();
        assert!(user.is_admin());
        let kyc = user.kyc.unwrap();
        assert_eq!(
            kyc.entries(),
            vec![("Company", "Lumen Gems"), ("Country", "TH")]
        );
    }
}
