//! Business rules applied during dimension and fact transformation
//!
//! Pure, total functions. Every input produces a value; nothing here
//! touches the database or can fail.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tenant::Tenant;

/// Role recorded when the raw role/origin pair is not recognized.
pub const UNKNOWN_ROLE: &str = "Unknown";

/// How a call's destination relates to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceClass {
    SystemToSystem,
    ThirdParty,
}

impl ServiceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::SystemToSystem => "System-to-System",
            ServiceClass::ThirdParty => "3rd-Party",
        }
    }
}

impl fmt::Display for ServiceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical rendering of a free-form origin: each alphabetic character is
/// uppercased when the preceding character is non-alphanumeric and
/// lowercased otherwise (the warehouse's `initcap` convention).
pub fn title_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_alphanumeric = false;
    for c in raw.chars() {
        if c.is_alphabetic() {
            if prev_alphanumeric {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
        } else {
            out.push(c);
        }
        prev_alphanumeric = c.is_alphanumeric();
    }
    out
}

/// Normalize a raw (role, origin) pair.
///
/// When the origin names a tenant (case-insensitively) and the raw role is
/// on that tenant's allow-list (case-sensitively), the pair maps to the
/// allow-listed role and the tenant's canonical name. Everything else maps
/// to the `Unknown` role with the origin title-cased.
pub fn normalize_role(raw_role: &str, raw_origin: &str) -> (String, String) {
    match Tenant::from_origin(raw_origin) {
        Some(tenant) => {
            let role = if tenant.allowed_roles().contains(&raw_role) {
                raw_role.to_string()
            } else {
                UNKNOWN_ROLE.to_string()
            };
            (role, tenant.canonical_name().to_string())
        }
        None => (UNKNOWN_ROLE.to_string(), title_case(raw_origin)),
    }
}

/// Classify a call by destination: an exact (case-sensitive) tenant name is
/// platform-internal traffic, anything else is third-party.
pub fn classify_service(destination: &str) -> ServiceClass {
    if Tenant::ALL
        .iter()
        .any(|t| t.canonical_name() == destination)
    {
        ServiceClass::SystemToSystem
    } else {
        ServiceClass::ThirdParty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_case_basic() {
        assert_eq!(title_case("teleo"), "Teleo");
        assert_eq!(title_case("hello world"), "Hello World");
        assert_eq!(title_case("SHOPIFY"), "Shopify");
    }

    #[test]
    fn test_title_case_word_boundaries() {
        // Any non-alphanumeric character starts a new word.
        assert_eq!(title_case("o'brien api"), "O'Brien Api");
        assert_eq!(title_case("my-test_origin"), "My-Test_Origin");
        // Digits are part of the word but are never case-changed.
        assert_eq!(title_case("3rd-party vendor"), "3rd-Party Vendor");
        assert_eq!(title_case("abc1def"), "Abc1def");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_normalize_role_allow_listed() {
        assert_eq!(
            normalize_role("Student", "campus"),
            ("Student".to_string(), "Campus".to_string())
        );
        assert_eq!(
            normalize_role("Pastor", "TELEO"),
            ("Pastor".to_string(), "Teleo".to_string())
        );
    }

    #[test]
    fn test_normalize_role_wrong_tenant_falls_back() {
        // Organizer belongs to Evntgarde, not Campus.
        assert_eq!(
            normalize_role("Organizer", "campus"),
            ("Unknown".to_string(), "Campus".to_string())
        );
    }

    #[test]
    fn test_normalize_role_is_case_sensitive_on_roles() {
        assert_eq!(
            normalize_role("student", "campus"),
            ("Unknown".to_string(), "Campus".to_string())
        );
    }

    #[test]
    fn test_normalize_role_unknown_origin() {
        assert_eq!(
            normalize_role("Admin", "shopify"),
            ("Unknown".to_string(), "Shopify".to_string())
        );
        assert_eq!(
            normalize_role("Guest", "my legacy app"),
            ("Unknown".to_string(), "My Legacy App".to_string())
        );
    }

    #[test]
    fn test_classify_service() {
        assert_eq!(classify_service("Pillars"), ServiceClass::SystemToSystem);
        assert_eq!(classify_service("Campus"), ServiceClass::SystemToSystem);
        assert_eq!(classify_service("Stripe"), ServiceClass::ThirdParty);
        // Destination matching is exact and case-sensitive.
        assert_eq!(classify_service("teleo"), ServiceClass::ThirdParty);
        assert_eq!(classify_service(""), ServiceClass::ThirdParty);
    }

    #[test]
    fn test_service_class_labels() {
        assert_eq!(ServiceClass::SystemToSystem.as_str(), "System-to-System");
        assert_eq!(ServiceClass::ThirdParty.as_str(), "3rd-Party");
    }
}
