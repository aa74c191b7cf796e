//! # Subscription Presets
//!
//! Named default queries for the site's content collections. A caller may
//! override them: supplied filters replace the default filters, a supplied
//! sort replaces the default sort.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::EdifError;
use crate::query::{Filter, OrderBy, Query};

/// Caller options for a live subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    #[serde(default)]
    pub filters: Option<Vec<Filter>>,
    #[serde(default)]
    pub sort_by: Option<OrderBy>,
    /// A disabled subscription never queries and reports no data.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            filters: None,
            sort_by: None,
            enabled: true,
        }
    }
}

impl QueryOptions {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: OrderBy) -> Self {
        self.sort_by = Some(sort);
        self
    }

    /// Apply to a base query: filters and sort replace, never append.
    pub fn apply(&self, mut query: Query) -> Query {
        if let Some(filters) = &self.filters {
            query.filters = filters.clone();
        }
        if let Some(sort) = &self.sort_by {
            query.order_by = Some(sort.clone());
        }
        query
    }
}

/// The site's specialised subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Products,
    Testimonials,
    TeamMembers,
    Gallery,
    CompanyStats,
    ContactInfo,
    HomepageSections,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Products,
        Preset::Testimonials,
        Preset::TeamMembers,
        Preset::Gallery,
        Preset::CompanyStats,
        Preset::ContactInfo,
        Preset::HomepageSections,
    ];

    pub fn collection(self) -> Collection {
        match self {
            Preset::Products => Collection::Products,
            Preset::Testimonials => Collection::Testimonials,
            Preset::TeamMembers => Collection::TeamMembers,
            Preset::Gallery => Collection::Gallery,
            Preset::CompanyStats => Collection::CompanyStats,
            Preset::ContactInfo => Collection::ContactInfo,
            Preset::HomepageSections => Collection::HomepageSections,
        }
    }

    /// Default query.
    ///
    /// Products are listed whatever their active flag; the other presets
    /// only show active entries. Hero sections are unsorted.
    pub fn query(self) -> Query {
        let base = Query::new(self.collection());
        match self {
            Preset::Products => base.order_by(OrderBy::asc("order")),
            Preset::HomepageSections => base.where_eq("isActive", true),
            _ => base.where_eq("isActive", true).order_by(OrderBy::asc("order")),
        }
    }

    pub fn query_with(self, options: &QueryOptions) -> Query {
        options.apply(self.query())
    }

    pub fn as_str(self) -> &'static str {
        self.collection().as_str()
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = EdifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EdifError::UnknownCollection(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterOp, SortDirection};

    #[test]
    fn products_are_sorted_but_unfiltered() {
        let q = Preset::Products.query();
        assert!(q.filters.is_empty());
        assert_eq!(q.order_by, Some(OrderBy::asc("order")));
    }

    #[test]
    fn active_presets_filter_and_sort() {
        for preset in [
            Preset::Testimonials,
            Preset::TeamMembers,
            Preset::Gallery,
            Preset::CompanyStats,
            Preset::ContactInfo,
        ] {
            let q = preset.query();
            assert_eq!(q.filters, vec![Filter::eq("isActive", true)], "{preset}");
            assert_eq!(q.order_by, Some(OrderBy::asc("order")), "{preset}");
        }
    }

    #[test]
    fn hero_sections_are_unsorted() {
        let q = Preset::HomepageSections.query();
        assert_eq!(q.filters.len(), 1);
        assert!(q.order_by.is_none());
    }

    #[test]
    fn caller_options_replace_defaults() {
        let options = QueryOptions::default()
            .with_filters(vec![Filter::new("rating", FilterOp::Gte, 4)])
            .with_sort(OrderBy::desc("rating"));
        let q = Preset::Testimonials.query_with(&options);
        assert_eq!(q.filters.len(), 1);
        assert_eq!(q.filters[0].field, "rating");
        assert_eq!(
            q.order_by.map(|o| o.direction),
            Some(SortDirection::Desc)
        );
    }

    #[test]
    fn empty_filter_override_clears_defaults() {
        let q = Preset::Gallery.query_with(&QueryOptions::default().with_filters(vec![]));
        assert!(q.filters.is_empty());
        assert!(q.order_by.is_some());
    }

    #[test]
    fn parse_by_collection_name() {
        assert_eq!("team_members".parse::<Preset>().unwrap(), Preset::TeamMembers);
        assert!("users".parse::<Preset>().is_err());
    }
}
