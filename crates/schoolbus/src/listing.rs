//! Client-side filtering, search, sort and pagination of resource lists.
//!
//! The list endpoints return every entity, active or not; these helpers
//! narrow the result the way the admin tables do.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Activatable, Resource, SortValue};

/// Default number of rows per page.
pub const DEFAULT_PER_PAGE: usize = 20;

/// Membership filter on the `isActive` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ActiveFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl ActiveFilter {
    #[must_use]
    pub fn matches(self, active: bool) -> bool {
        match self {
            Self::All => true,
            Self::Active => active,
            Self::Inactive => !active,
        }
    }
}

impl fmt::Display for ActiveFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// How a list should be narrowed and ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: ActiveFilter,
    pub sort: Option<String>,
    pub descending: bool,
    /// 1-based page number.
    pub page: usize,
    pub per_page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: ActiveFilter::All,
            sort: None,
            descending: false,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    /// Items across all pages.
    pub total: usize,
    pub total_pages: usize,
}

/// Keep the items whose text fields contain `term`, ignoring case.
#[must_use]
pub fn search<R: Resource>(items: Vec<R>, term: &str) -> Vec<R> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| {
            item.search_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        })
        .collect()
}

/// Stable sort by the named key.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `R` has no such key.
pub fn sort<R: Resource>(items: &mut [R], key: &str, descending: bool) -> Result<()> {
    if let Some(first) = items.first() {
        if first.sort_value(key).is_none() {
            return Err(Error::validation(
                "sort",
                format!("{} cannot be sorted by '{key}'", R::NAME),
            ));
        }
    }
    // Missing values stay last in both directions.
    items.sort_by(|a, b| match (a.sort_value(key), b.sort_value(key)) {
        (Some(SortValue::Missing), Some(SortValue::Missing)) => Ordering::Equal,
        (Some(SortValue::Missing), Some(_)) => Ordering::Greater,
        (Some(_), Some(SortValue::Missing)) => Ordering::Less,
        (Some(a), Some(b)) if descending => b.compare(&a),
        (Some(a), Some(b)) => a.compare(&b),
        _ => Ordering::Equal,
    });
    Ok(())
}

/// Cut `items` into pages of `per_page` and return page `page` (1-based).
///
/// Pages outside `1..=total_pages` come back empty.
#[must_use]
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let total_pages = total.div_ceil(per_page);
    let items = if page == 0 {
        Vec::new()
    } else {
        items
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect()
    };
    Page {
        items,
        page,
        per_page,
        total,
        total_pages,
    }
}

/// Filter by status, search, sort and paginate.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an unknown sort key.
pub fn apply<R>(items: Vec<R>, query: &ListQuery) -> Result<Page<R>>
where
    R: Resource + Activatable,
{
    let items: Vec<R> = items
        .into_iter()
        .filter(|item| query.status.matches(item.is_active()))
        .collect();
    let mut items = match &query.search {
        Some(term) => search(items, term),
        None => items,
    };
    if let Some(key) = &query.sort {
        sort(&mut items, key, query.descending)?;
    }
    Ok(paginate(items, query.page, query.per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bus, Stop};

    fn bus(id: i64, plate: &str, capacity: u32, active: bool) -> Bus {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "plateNumber": plate,
            "capacity": capacity,
            "isActive": active,
        }))
        .unwrap()
    }

    fn fleet() -> Vec<Bus> {
        vec![
            bus(1, "ABC-123", 40, true),
            bus(2, "XYZ-900", 20, true),
            bus(3, "abd-555", 30, false),
        ]
    }

    #[test]
    fn test_soft_deleted_entity_changes_filter_membership() {
        let mut buses = fleet();
        buses[1].is_active = false;

        let all = apply(buses.clone(), &ListQuery::default()).unwrap();
        assert_eq!(all.total, 3);

        let active = apply(
            buses.clone(),
            &ListQuery {
                status: ActiveFilter::Active,
                ..ListQuery::default()
            },
        )
        .unwrap();
        assert_eq!(active.items.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1]);

        let inactive = apply(
            buses,
            &ListQuery {
                status: ActiveFilter::Inactive,
                ..ListQuery::default()
            },
        )
        .unwrap();
        assert_eq!(inactive.items.iter().map(|b| b.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let found = search(fleet(), " AB ");
        assert_eq!(found.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(search(fleet(), "").len(), 3);
        assert!(search(fleet(), "nothing").is_empty());
    }

    #[test]
    fn test_sort_by_key() {
        let mut buses = fleet();
        sort(&mut buses, "capacity", false).unwrap();
        assert_eq!(buses.iter().map(|b| b.id).collect::<Vec<_>>(), vec![2, 3, 1]);
        sort(&mut buses, "capacity", true).unwrap();
        assert_eq!(buses.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_missing_values_sort_last_both_ways() {
        let stop = |id: i64, address: Option<&str>| -> Stop {
            serde_json::from_value(serde_json::json!({
                "id": id,
                "name": format!("Stop {id}"),
                "address": address,
            }))
            .unwrap()
        };
        let mut stops = vec![stop(1, Some("Alpha")), stop(2, None), stop(3, Some("Bravo"))];

        sort(&mut stops, "address", true).unwrap();
        assert_eq!(stops.iter().map(|s| s.id).collect::<Vec<_>>(), vec![3, 1, 2]);
        sort(&mut stops, "address", false).unwrap();
        assert_eq!(stops.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 3, 2]);
    }

    #[test]
    fn test_unknown_sort_key() {
        let mut buses = fleet();
        let err = sort(&mut buses, "colour", false).unwrap_err();
        assert!(err.to_string().contains("colour"));

        let mut empty: Vec<Stop> = Vec::new();
        sort(&mut empty, "colour", false).unwrap();
    }

    #[test]
    fn test_paginate() {
        let page = paginate((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_out_of_range_pages_are_empty() {
        let items: Vec<u32> = (1..=5).collect();
        assert!(paginate(items.clone(), 2, 5).items.is_empty());
        assert!(paginate(items.clone(), 0, 5).items.is_empty());
        let empty = paginate(Vec::<u32>::new(), 1, 5);
        assert_eq!((empty.total, empty.total_pages), (0, 0));
        assert_eq!(paginate(items, 1, 0).per_page, 1);
    }
}
