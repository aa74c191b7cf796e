//! # Collection Catalogue
//!
//! Every document lives in one named collection. The names are the storage
//! and wire names; anything outside this list is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EdifError;

/// The named collections of the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Testimonials,
    TeamMembers,
    Gallery,
    CompanyStats,
    ContactInfo,
    HomepageSections,
    Innovations,
    Users,
    Activity,
    SampleRequests,
    AdverseEventReports,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Products,
        Collection::Testimonials,
        Collection::TeamMembers,
        Collection::Gallery,
        Collection::CompanyStats,
        Collection::ContactInfo,
        Collection::HomepageSections,
        Collection::Innovations,
        Collection::Users,
        Collection::Activity,
        Collection::SampleRequests,
        Collection::AdverseEventReports,
    ];

    /// Collections editable through the generic admin CRUD screens.
    pub const CONTENT: [Collection; 8] = [
        Collection::Products,
        Collection::Testimonials,
        Collection::TeamMembers,
        Collection::Gallery,
        Collection::CompanyStats,
        Collection::ContactInfo,
        Collection::HomepageSections,
        Collection::Innovations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Testimonials => "testimonials",
            Collection::TeamMembers => "team_members",
            Collection::Gallery => "gallery",
            Collection::CompanyStats => "company_stats",
            Collection::ContactInfo => "contact_info",
            Collection::HomepageSections => "homepage_sections",
            Collection::Innovations => "innovations",
            Collection::Users => "users",
            Collection::Activity => "activity",
            Collection::SampleRequests => "sample_requests",
            Collection::AdverseEventReports => "adverse_event_reports",
        }
    }

    /// Admin-editable content (create/update/delete through CRUD screens).
    pub fn is_content(self) -> bool {
        Self::CONTENT.contains(&self)
    }

    /// Content collections carry an `order` index.
    pub fn is_ordered(self) -> bool {
        self.is_content() && self != Collection::HomepageSections
    }

    /// Human label used in activity descriptions.
    pub fn entity_label(self) -> &'static str {
        match self {
            Collection::Products => "Product",
            Collection::Testimonials => "Testimonial",
            Collection::TeamMembers => "Team member",
            Collection::Gallery => "Gallery item",
            Collection::CompanyStats => "Company stat",
            Collection::ContactInfo => "Contact info",
            Collection::HomepageSections => "Homepage section",
            Collection::Innovations => "Innovation",
            Collection::Users => "User",
            Collection::Activity => "Activity",
            Collection::SampleRequests => "Sample request",
            Collection::AdverseEventReports => "Adverse event report",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = EdifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EdifError::UnknownCollection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for c in Collection::ALL {
            assert_eq!(c.as_str().parse::<Collection>().ok(), Some(c));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "pipelines".parse::<Collection>();
        assert!(matches!(err, Err(EdifError::UnknownCollection(name)) if name == "pipelines"));
    }

    #[test]
    fn homepage_sections_are_content_but_unordered() {
        assert!(Collection::HomepageSections.is_content());
        assert!(!Collection::HomepageSections.is_ordered());
        assert!(Collection::Products.is_ordered());
        assert!(!Collection::Users.is_content());
    }

    #[test]
    fn serde_uses_storage_names() {
        let json = serde_json::to_string(&Collection::TeamMembers).ok();
        assert_eq!(json.as_deref(), Some("\"team_members\""));
    }
}
