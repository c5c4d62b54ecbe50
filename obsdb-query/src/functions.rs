//! The static filter-function table.
//!
//! Adding a function is a data change: add a variant, a table row, and a
//! lowering arm keyed off the variant. The parser consults this table to
//! reject unknown names with `UnsupportedFunction` — never silently.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Every supported filter function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterFunction {
    // String
    Contains,
    StartsWith,
    EndsWith,
    Length,
    ToLower,
    ToUpper,
    Trim,
    Substring,
    IndexOf,
    Concat,
    // Numeric
    Round,
    Floor,
    Ceiling,
    // Spatial
    GeoDistance,
    GeoIntersects,
    GeoLength,
    GeoWithin,
    // Temporal
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Whether a function produces a boolean predicate or a scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Usable directly as a filter condition (`contains(name,'x')`).
    Predicate,
    /// Produces a value for use inside a comparison (`length(name) gt 5`).
    Scalar,
}

/// One row of the function table.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub func: FilterFunction,
    pub kind: FunctionKind,
    pub min_args: usize,
    pub max_args: usize,
}

/// The function table. Order matters only for documentation.
pub static FUNCTIONS: &[FunctionSpec] = &[
    // String functions
    spec("contains", FilterFunction::Contains, FunctionKind::Predicate, 2, 2),
    spec("startswith", FilterFunction::StartsWith, FunctionKind::Predicate, 2, 2),
    spec("endswith", FilterFunction::EndsWith, FunctionKind::Predicate, 2, 2),
    spec("length", FilterFunction::Length, FunctionKind::Scalar, 1, 1),
    spec("tolower", FilterFunction::ToLower, FunctionKind::Scalar, 1, 1),
    spec("toupper", FilterFunction::ToUpper, FunctionKind::Scalar, 1, 1),
    spec("trim", FilterFunction::Trim, FunctionKind::Scalar, 1, 1),
    spec("substring", FilterFunction::Substring, FunctionKind::Scalar, 2, 3),
    spec("indexof", FilterFunction::IndexOf, FunctionKind::Scalar, 2, 2),
    spec("concat", FilterFunction::Concat, FunctionKind::Scalar, 2, 2),
    // Numeric functions
    spec("round", FilterFunction::Round, FunctionKind::Scalar, 1, 1),
    spec("floor", FilterFunction::Floor, FunctionKind::Scalar, 1, 1),
    spec("ceiling", FilterFunction::Ceiling, FunctionKind::Scalar, 1, 1),
    // Spatial functions
    spec("geo.distance", FilterFunction::GeoDistance, FunctionKind::Scalar, 2, 2),
    spec("geo.intersects", FilterFunction::GeoIntersects, FunctionKind::Predicate, 2, 2),
    spec("geo.length", FilterFunction::GeoLength, FunctionKind::Scalar, 1, 1),
    spec("geo.within", FilterFunction::GeoWithin, FunctionKind::Predicate, 2, 2),
    // Temporal extraction
    spec("year", FilterFunction::Year, FunctionKind::Scalar, 1, 1),
    spec("month", FilterFunction::Month, FunctionKind::Scalar, 1, 1),
    spec("day", FilterFunction::Day, FunctionKind::Scalar, 1, 1),
    spec("hour", FilterFunction::Hour, FunctionKind::Scalar, 1, 1),
    spec("minute", FilterFunction::Minute, FunctionKind::Scalar, 1, 1),
    spec("second", FilterFunction::Second, FunctionKind::Scalar, 1, 1),
];

const fn spec(
    name: &'static str,
    func: FilterFunction,
    kind: FunctionKind,
    min_args: usize,
    max_args: usize,
) -> FunctionSpec {
    FunctionSpec {
        name,
        func,
        kind,
        min_args,
        max_args,
    }
}

static BY_NAME: Lazy<FxHashMap<&'static str, &'static FunctionSpec>> = Lazy::new(|| {
    FUNCTIONS.iter().map(|s| (s.name, s)).collect()
});

/// Look up a function by its grammar name. `None` means unsupported.
pub fn lookup_function(name: &str) -> Option<&'static FunctionSpec> {
    BY_NAME.get(name).copied()
}

impl FilterFunction {
    /// The grammar name of this function.
    pub fn name(&self) -> &'static str {
        FUNCTIONS
            .iter()
            .find(|s| s.func == *self)
            .map(|s| s.name)
            .unwrap_or("?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known() {
        let spec = lookup_function("contains").unwrap();
        assert_eq!(spec.func, FilterFunction::Contains);
        assert_eq!(spec.kind, FunctionKind::Predicate);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup_function("fractionalseconds").is_none());
        assert!(lookup_function("now").is_none());
    }

    #[test]
    fn test_table_names_unique() {
        let mut seen = std::collections::HashSet::new();
        for s in FUNCTIONS {
            assert!(seen.insert(s.name), "duplicate function name {}", s.name);
        }
    }
}
