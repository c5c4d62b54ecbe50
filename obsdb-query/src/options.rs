//! Query options: paging, ordering, shaping, counting.
//!
//! This is the parsed form of the `$top/$skip/$orderby/$select/$expand/
//! $count` request parameters, shared by the repository (which applies
//! them) and the translator (which resolves `$orderby` properties).

use crate::error::{FilterError, Result};

/// One `$orderby` clause: a property path and a direction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBySpec {
    pub property: String,
    pub descending: bool,
}

/// Options for a collection query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Raw `$filter` text, compiled by the caller.
    pub filter: Option<String>,
    /// Maximum rows to return (`$top`), server-capped.
    pub top: Option<usize>,
    /// Rows to skip before returning results (`$skip`).
    pub skip: Option<usize>,
    /// Whether to include the total matching count (`$count=true`).
    pub count: bool,
    /// Sort specifications (`$orderby`), applied before paging.
    pub order_by: Vec<OrderBySpec>,
    /// Properties to project (`$select`); empty means all.
    pub select: Vec<String>,
    /// Navigation properties to expand inline (`$expand`).
    pub expand: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = Some(top);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn with_order_by(mut self, specs: Vec<OrderBySpec>) -> Self {
        self.order_by = specs;
        self
    }

    /// Check if any modifiers are set
    pub fn has_modifiers(&self) -> bool {
        self.filter.is_some()
            || self.top.is_some()
            || self.skip.is_some()
            || self.count
            || !self.order_by.is_empty()
            || !self.select.is_empty()
            || !self.expand.is_empty()
    }

    /// Parse an `$orderby` clause: comma-separated `property [asc|desc]`.
    pub fn parse_order_by(clause: &str) -> Result<Vec<OrderBySpec>> {
        let mut specs = Vec::new();
        for part in clause.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(FilterError::syntax(0, "empty $orderby segment"));
            }
            let mut words = part.split_whitespace();
            let property = words.next().unwrap_or_default().to_string();
            let descending = match words.next() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(FilterError::syntax(
                        0,
                        format!("invalid $orderby direction '{}'", other),
                    ))
                }
            };
            if words.next().is_some() {
                return Err(FilterError::syntax(0, "trailing input in $orderby segment"));
            }
            specs.push(OrderBySpec {
                property,
                descending,
            });
        }
        Ok(specs)
    }

    /// Parse a comma-separated property list (`$select`, `$expand`).
    pub fn parse_property_list(clause: &str) -> Vec<String> {
        clause
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_modifiers() {
        assert!(!QueryOptions::default().has_modifiers());
    }

    #[test]
    fn test_builder() {
        let opts = QueryOptions::new().with_top(50).with_skip(100).with_count();
        assert_eq!(opts.top, Some(50));
        assert_eq!(opts.skip, Some(100));
        assert!(opts.count);
        assert!(opts.has_modifiers());
    }

    #[test]
    fn test_parse_order_by() {
        let specs = QueryOptions::parse_order_by("phenomenonTime desc, result").unwrap();
        assert_eq!(
            specs,
            vec![
                OrderBySpec {
                    property: "phenomenonTime".into(),
                    descending: true
                },
                OrderBySpec {
                    property: "result".into(),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn test_parse_order_by_rejects_bad_direction() {
        assert!(QueryOptions::parse_order_by("result sideways").is_err());
    }

    #[test]
    fn test_parse_property_list() {
        assert_eq!(
            QueryOptions::parse_property_list("name, description"),
            vec!["name".to_string(), "description".to_string()]
        );
    }
}
