//! Lowering from AST to a parameterized store query.
//!
//! `translate` turns an AST plus query options into a `StoreQuery`:
//! a template tree referencing bound parameters by index, plus the
//! parameter vector. Every literal from the filter text lands in `params`;
//! the template never carries a value inline, so the store can evaluate (or
//! render) it without any risk of value/text confusion.
//!
//! Property names resolve through static per-entity-type tables, and may
//! traverse up to two navigation hops (`Datastream/Thing/name`). Function
//! lowering is likewise a static table: adding a function is a data change,
//! not a control-flow change.

use crate::ast::{CompareOp, Expr, Literal, PropertyPath};
use crate::error::{FilterError, Result};
use crate::functions::FilterFunction;
use crate::options::QueryOptions;
use obsdb_core::{EntityType, GeometryValue, Timestamp};
use std::fmt;

// ---------------------------------------------------------------------------
// Columns and field references
// ---------------------------------------------------------------------------

/// Storage-level column identifiers, shared across entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    Name,
    Description,
    EncodingType,
    Metadata,
    Definition,
    ObservationType,
    UnitName,
    UnitSymbol,
    UnitDefinition,
    Geometry,
    Time,
    PhenomenonTime,
    ResultTime,
    Result,
    ResultQuality,
    PhenomenonTimeStart,
    PhenomenonTimeEnd,
    ResultTimeStart,
    ResultTimeEnd,
    ClientTimestamp,
    ServerTimestamp,
    SyncBatchId,
}

/// A join-qualified column: zero, one, or two navigation hops followed by a
/// column on the final entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Navigation targets, outermost first (e.g. `[Datastream, Thing]`).
    pub hops: Vec<EntityType>,
    pub column: Column,
}

impl FieldRef {
    pub fn direct(column: Column) -> Self {
        Self {
            hops: Vec::new(),
            column,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hop in &self.hops {
            write!(f, "{}.", hop.collection())?;
        }
        write!(f, "{:?}", self.column)
    }
}

/// Property table: property name → column, per entity type.
static PROPERTIES: &[(EntityType, &[(&str, Column)])] = &[
    (
        EntityType::Thing,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("description", Column::Description),
        ],
    ),
    (
        EntityType::Location,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("description", Column::Description),
            ("encodingType", Column::EncodingType),
            ("location", Column::Geometry),
        ],
    ),
    (
        EntityType::HistoricalLocation,
        &[("id", Column::Id), ("time", Column::Time)],
    ),
    (
        EntityType::Sensor,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("description", Column::Description),
            ("encodingType", Column::EncodingType),
            ("metadata", Column::Metadata),
        ],
    ),
    (
        EntityType::ObservedProperty,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("definition", Column::Definition),
            ("description", Column::Description),
        ],
    ),
    (
        EntityType::Datastream,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("description", Column::Description),
            ("observationType", Column::ObservationType),
            ("unitName", Column::UnitName),
            ("unitSymbol", Column::UnitSymbol),
            ("unitDefinition", Column::UnitDefinition),
            ("phenomenonTimeStart", Column::PhenomenonTimeStart),
            ("phenomenonTimeEnd", Column::PhenomenonTimeEnd),
            ("resultTimeStart", Column::ResultTimeStart),
            ("resultTimeEnd", Column::ResultTimeEnd),
        ],
    ),
    (
        EntityType::Observation,
        &[
            ("id", Column::Id),
            ("phenomenonTime", Column::PhenomenonTime),
            ("resultTime", Column::ResultTime),
            ("result", Column::Result),
            ("resultQuality", Column::ResultQuality),
            ("clientTimestamp", Column::ClientTimestamp),
            ("serverTimestamp", Column::ServerTimestamp),
            ("syncBatchId", Column::SyncBatchId),
        ],
    ),
    (
        EntityType::FeatureOfInterest,
        &[
            ("id", Column::Id),
            ("name", Column::Name),
            ("description", Column::Description),
            ("encodingType", Column::EncodingType),
            ("feature", Column::Geometry),
        ],
    ),
];

/// Navigation table: single-valued navigation name → target type, per
/// entity type. Only single-valued navigations are traversable in filters.
static NAVIGATIONS: &[(EntityType, &[(&str, EntityType)])] = &[
    (
        EntityType::Observation,
        &[
            ("Datastream", EntityType::Datastream),
            ("FeatureOfInterest", EntityType::FeatureOfInterest),
        ],
    ),
    (
        EntityType::Datastream,
        &[
            ("Thing", EntityType::Thing),
            ("Sensor", EntityType::Sensor),
            ("ObservedProperty", EntityType::ObservedProperty),
        ],
    ),
    (
        EntityType::HistoricalLocation,
        &[("Thing", EntityType::Thing)],
    ),
];

fn property_column(entity_type: EntityType, name: &str) -> Option<Column> {
    PROPERTIES
        .iter()
        .find(|(t, _)| *t == entity_type)
        .and_then(|(_, props)| props.iter().find(|(n, _)| *n == name))
        .map(|(_, c)| *c)
}

fn navigation_target(entity_type: EntityType, name: &str) -> Option<EntityType> {
    NAVIGATIONS
        .iter()
        .find(|(t, _)| *t == entity_type)
        .and_then(|(_, navs)| navs.iter().find(|(n, _)| *n == name))
        .map(|(_, t)| *t)
}

/// Resolve a property path against an entity type, following up to two
/// navigation hops.
pub fn resolve_property(entity_type: EntityType, path: &PropertyPath) -> Result<FieldRef> {
    let unknown = || FilterError::UnknownProperty {
        entity_type: entity_type.collection().to_string(),
        path: path.to_string(),
    };

    if path.navigations().len() > 2 {
        return Err(unknown());
    }

    let mut hops = Vec::new();
    let mut current = entity_type;
    for nav in path.navigations() {
        let target = navigation_target(current, nav).ok_or_else(unknown)?;
        hops.push(target);
        current = target;
    }

    let column = property_column(current, path.property()).ok_or_else(unknown)?;
    Ok(FieldRef { hops, column })
}

// ---------------------------------------------------------------------------
// Parameterized query
// ---------------------------------------------------------------------------

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(Timestamp),
    Geometry(GeometryValue),
    Null,
}

/// Scalar functions appearing inside comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    Length,
    ToLower,
    ToUpper,
    Trim,
    Substring,
    IndexOf,
    Concat,
    Round,
    Floor,
    Ceiling,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    GeoDistance,
    GeoLength,
}

/// Boolean predicate functions usable directly as conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolFunc {
    Contains,
    StartsWith,
    EndsWith,
    GeoIntersects,
    GeoWithin,
}

/// How each filter function lowers into the template.
enum Lowering {
    Bool(BoolFunc),
    Scalar(ScalarFunc),
}

/// Static lowering table, keyed by `FilterFunction`.
static LOWERINGS: &[(FilterFunction, Lowering)] = &[
    (FilterFunction::Contains, Lowering::Bool(BoolFunc::Contains)),
    (FilterFunction::StartsWith, Lowering::Bool(BoolFunc::StartsWith)),
    (FilterFunction::EndsWith, Lowering::Bool(BoolFunc::EndsWith)),
    (FilterFunction::Length, Lowering::Scalar(ScalarFunc::Length)),
    (FilterFunction::ToLower, Lowering::Scalar(ScalarFunc::ToLower)),
    (FilterFunction::ToUpper, Lowering::Scalar(ScalarFunc::ToUpper)),
    (FilterFunction::Trim, Lowering::Scalar(ScalarFunc::Trim)),
    (FilterFunction::Substring, Lowering::Scalar(ScalarFunc::Substring)),
    (FilterFunction::IndexOf, Lowering::Scalar(ScalarFunc::IndexOf)),
    (FilterFunction::Concat, Lowering::Scalar(ScalarFunc::Concat)),
    (FilterFunction::Round, Lowering::Scalar(ScalarFunc::Round)),
    (FilterFunction::Floor, Lowering::Scalar(ScalarFunc::Floor)),
    (FilterFunction::Ceiling, Lowering::Scalar(ScalarFunc::Ceiling)),
    (FilterFunction::GeoDistance, Lowering::Scalar(ScalarFunc::GeoDistance)),
    (FilterFunction::GeoIntersects, Lowering::Bool(BoolFunc::GeoIntersects)),
    (FilterFunction::GeoLength, Lowering::Scalar(ScalarFunc::GeoLength)),
    (FilterFunction::GeoWithin, Lowering::Bool(BoolFunc::GeoWithin)),
    (FilterFunction::Year, Lowering::Scalar(ScalarFunc::Year)),
    (FilterFunction::Month, Lowering::Scalar(ScalarFunc::Month)),
    (FilterFunction::Day, Lowering::Scalar(ScalarFunc::Day)),
    (FilterFunction::Hour, Lowering::Scalar(ScalarFunc::Hour)),
    (FilterFunction::Minute, Lowering::Scalar(ScalarFunc::Minute)),
    (FilterFunction::Second, Lowering::Scalar(ScalarFunc::Second)),
];

fn lowering_for(func: FilterFunction) -> Option<&'static Lowering> {
    LOWERINGS.iter().find(|(f, _)| *f == func).map(|(_, l)| l)
}

/// A value-producing template node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A (possibly join-qualified) column.
    Field(FieldRef),
    /// A bound parameter, by index into `StoreQuery::params`.
    Param(usize),
    /// A scalar function over operands.
    Apply { func: ScalarFunc, args: Vec<Operand> },
}

/// A boolean template node.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTemplate {
    And(Box<QueryTemplate>, Box<QueryTemplate>),
    Or(Box<QueryTemplate>, Box<QueryTemplate>),
    Not(Box<QueryTemplate>),
    Compare {
        op: CompareOp,
        lhs: Operand,
        rhs: Operand,
    },
    Predicate { func: BoolFunc, args: Vec<Operand> },
}

/// An `$orderby` clause resolved to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOrderBy {
    pub field: FieldRef,
    pub descending: bool,
}

/// A fully lowered, parameterized query ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub entity_type: EntityType,
    pub template: Option<QueryTemplate>,
    pub params: Vec<ParamValue>,
    pub order: Vec<ResolvedOrderBy>,
    pub top: Option<usize>,
    pub skip: usize,
    pub count: bool,
}

/// Lower an AST (if any) plus options into a `StoreQuery`.
pub fn translate(
    expr: Option<&Expr>,
    entity_type: EntityType,
    options: &QueryOptions,
) -> Result<StoreQuery> {
    let mut lowerer = Lowerer {
        entity_type,
        params: Vec::new(),
    };

    let template = expr.map(|e| lowerer.lower_bool(e)).transpose()?;

    let mut order = Vec::new();
    for spec in &options.order_by {
        let path = PropertyPath::new(spec.property.split('/').map(str::to_string).collect());
        order.push(ResolvedOrderBy {
            field: resolve_property(entity_type, &path)?,
            descending: spec.descending,
        });
    }

    Ok(StoreQuery {
        entity_type,
        template,
        params: lowerer.params,
        order,
        top: options.top,
        skip: options.skip.unwrap_or(0),
        count: options.count,
    })
}

struct Lowerer {
    entity_type: EntityType,
    params: Vec<ParamValue>,
}

impl Lowerer {
    fn bind(&mut self, value: ParamValue) -> Operand {
        self.params.push(value);
        Operand::Param(self.params.len() - 1)
    }

    fn lower_bool(&mut self, expr: &Expr) -> Result<QueryTemplate> {
        match expr {
            Expr::And(lhs, rhs) => Ok(QueryTemplate::And(
                Box::new(self.lower_bool(lhs)?),
                Box::new(self.lower_bool(rhs)?),
            )),
            Expr::Or(lhs, rhs) => Ok(QueryTemplate::Or(
                Box::new(self.lower_bool(lhs)?),
                Box::new(self.lower_bool(rhs)?),
            )),
            Expr::Not(inner) => Ok(QueryTemplate::Not(Box::new(self.lower_bool(inner)?))),
            Expr::Compare { op, lhs, rhs } => Ok(QueryTemplate::Compare {
                op: *op,
                lhs: self.lower_operand(lhs)?,
                rhs: self.lower_operand(rhs)?,
            }),
            Expr::Function { func, args } => match lowering_for(*func) {
                Some(Lowering::Bool(bool_func)) => {
                    let args = args
                        .iter()
                        .map(|a| self.lower_operand(a))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(QueryTemplate::Predicate {
                        func: *bool_func,
                        args,
                    })
                }
                Some(Lowering::Scalar(_)) => Err(FilterError::translate(format!(
                    "{} produces a value, not a condition; compare it with eq/gt/...",
                    func.name()
                ))),
                None => Err(FilterError::unsupported(func.name())),
            },
            Expr::Property(path) => Err(FilterError::translate(format!(
                "property {} is not a boolean condition",
                path
            ))),
            Expr::Literal(_) => Err(FilterError::translate(
                "literal is not a boolean condition",
            )),
        }
    }

    fn lower_operand(&mut self, expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Property(path) => {
                Ok(Operand::Field(resolve_property(self.entity_type, path)?))
            }
            Expr::Literal(lit) => Ok(self.bind(match lit {
                Literal::Number(n) => ParamValue::Number(*n),
                Literal::Text(s) => ParamValue::Text(s.clone()),
                Literal::Bool(b) => ParamValue::Bool(*b),
                Literal::DateTime(ts) => ParamValue::DateTime(ts.clone()),
                Literal::Geometry(g) => ParamValue::Geometry(g.clone()),
                Literal::Null => ParamValue::Null,
            })),
            Expr::Function { func, args } => match lowering_for(*func) {
                Some(Lowering::Scalar(scalar)) => {
                    let args = args
                        .iter()
                        .map(|a| self.lower_operand(a))
                        .collect::<Result<Vec<_>>>()?;
                    Ok(Operand::Apply { func: *scalar, args })
                }
                Some(Lowering::Bool(_)) => Err(FilterError::translate(format!(
                    "{} is a condition and cannot be used as a value",
                    func.name()
                ))),
                None => Err(FilterError::unsupported(func.name())),
            },
            other => Err(FilterError::translate(format!(
                "expression {:?} cannot be used as a value",
                other
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Template rendering
// ---------------------------------------------------------------------------

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "{}", field),
            // 1-based placeholders, matching the usual bound-parameter style.
            Operand::Param(i) => write!(f, "${}", i + 1),
            Operand::Apply { func, args } => {
                write!(f, "{:?}(", func)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryTemplate::And(a, b) => write!(f, "({} AND {})", a, b),
            QueryTemplate::Or(a, b) => write!(f, "({} OR {})", a, b),
            QueryTemplate::Not(inner) => write!(f, "(NOT {})", inner),
            QueryTemplate::Compare { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, op.keyword(), rhs)
            }
            QueryTemplate::Predicate { func, args } => {
                write!(f, "{:?}(", func)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}
