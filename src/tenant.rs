//! Tenant registry
//!
//! The platform serves a closed set of four tenants. Origin matching is
//! case-insensitive; the canonical names below are what the warehouse
//! stores and what mart and bucket names derive from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the four platform tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tenant {
    Teleo,
    Campus,
    Evntgarde,
    Pillars,
}

impl Tenant {
    /// Stable iteration order used by mart builds and exports.
    pub const ALL: [Tenant; 4] = [
        Tenant::Teleo,
        Tenant::Campus,
        Tenant::Evntgarde,
        Tenant::Pillars,
    ];

    /// Canonical tenant name as stored in the warehouse.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Tenant::Teleo => "Teleo",
            Tenant::Campus => "Campus",
            Tenant::Evntgarde => "Evntgarde",
            Tenant::Pillars => "Pillars",
        }
    }

    /// Lowercase form used in table and file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Tenant::Teleo => "teleo",
            Tenant::Campus => "campus",
            Tenant::Evntgarde => "evntgarde",
            Tenant::Pillars => "pillars",
        }
    }

    /// Roles recognized for this tenant. Matching is case-sensitive.
    pub fn allowed_roles(&self) -> &'static [&'static str] {
        match self {
            Tenant::Teleo => &["Normal_User", "Guest", "Church_Admin", "Pastor"],
            Tenant::Campus => &["Student", "Professor", "Admin"],
            Tenant::Evntgarde => &["Customer", "Organizer", "Vendor"],
            Tenant::Pillars => &["Employer", "Dean", "Professor", "Student"],
        }
    }

    /// Delivery bucket this tenant's extracts land in.
    pub fn delivery_bucket(&self) -> String {
        format!("integreat-analytics-{}", self.slug())
    }

    /// Resolve a raw origin value, ignoring case.
    pub fn from_origin(raw: &str) -> Option<Tenant> {
        Tenant::ALL
            .into_iter()
            .find(|t| t.canonical_name().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_origin_ignores_case() {
        assert_eq!(Tenant::from_origin("teleo"), Some(Tenant::Teleo));
        assert_eq!(Tenant::from_origin("TELEO"), Some(Tenant::Teleo));
        assert_eq!(Tenant::from_origin("EvntGarde"), Some(Tenant::Evntgarde));
        assert_eq!(Tenant::from_origin("shopify"), None);
        // No trimming: a padded origin is not a tenant match.
        assert_eq!(Tenant::from_origin(" pillars "), None);
    }

    #[test]
    fn test_delivery_bucket_naming() {
        assert_eq!(
            Tenant::Campus.delivery_bucket(),
            "integreat-analytics-campus"
        );
    }

    #[test]
    fn test_all_order_is_stable() {
        let names: Vec<&str> = Tenant::ALL.iter().map(|t| t.slug()).collect();
        assert_eq!(names, vec!["teleo", "campus", "evntgarde", "pillars"]);
    }

    #[test]
    fn test_allowed_roles_membership() {
        assert!(Tenant::Campus.allowed_roles().contains(&"Student"));
        assert!(!Tenant::Campus.allowed_roles().contains(&"Organizer"));
        assert!(Tenant::Pillars.allowed_roles().contains(&"Dean"));
    }
}
