//! Template evaluation against entity rows.
//!
//! The translator produces a `QueryTemplate` referencing bound parameters
//! by index; this module compiles that into row matching. Evaluation uses
//! **two-valued logic** (true/false), not SQL 3-valued NULL logic:
//!
//! - Missing fields: comparisons involving a missing value yield `false`
//! - Type mismatches: comparisons between incompatible types yield `false`
//!   (except `ne`, which yields `true` for mismatched types)
//! - `null` literals: `eq null` is `true` only when the field is absent
//! - Logical operators: standard boolean logic (and, or, not)
//!
//! Navigation hops (`Datastream/Thing/name`) resolve against the entity
//! tables at evaluation time; a dangling reference simply yields a missing
//! value.

use crate::tables::EntityTables;
use obsdb_core::{
    Datastream, EntityType, FeatureOfInterest, GeometryValue, HistoricalLocation, Location,
    Observation, ObservedProperty, ResultValue, Sensor, Thing, Timestamp,
};
use obsdb_query::{
    BoolFunc, Column, CompareOp, FieldRef, Operand, ParamValue, QueryTemplate, ResolvedOrderBy,
    ScalarFunc,
};
use std::cmp::Ordering;

/// Runtime value produced by field access or function application.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(Timestamp),
    Geometry(GeometryValue),
}

impl Value {
    fn from_param(p: &ParamValue) -> Value {
        match p {
            ParamValue::Number(n) => Value::Number(*n),
            ParamValue::Text(s) => Value::Text(s.clone()),
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::DateTime(ts) => Value::DateTime(ts.clone()),
            ParamValue::Geometry(g) => Value::Geometry(g.clone()),
            ParamValue::Null => Value::Null,
        }
    }

    fn from_result(r: &ResultValue) -> Value {
        match r {
            ResultValue::Bool(b) => Value::Bool(*b),
            ResultValue::Number(n) => Value::Number(*n),
            ResultValue::Text(s) => Value::Text(s.clone()),
            // Structured results are opaque to filters.
            ResultValue::Structured(_) => Value::Null,
        }
    }

    fn opt_ts(ts: &Option<Timestamp>) -> Value {
        ts.as_ref()
            .map(|t| Value::DateTime(t.clone()))
            .unwrap_or(Value::Null)
    }

    fn opt_text(s: &Option<String>) -> Value {
        s.as_ref()
            .map(|t| Value::Text(t.clone()))
            .unwrap_or(Value::Null)
    }
}

/// Column access for rows that filters can run against.
pub trait EntityFields {
    fn entity_type(&self) -> EntityType;
    fn column(&self, col: Column) -> Value;
    /// Resolve a single-valued navigation to an owned entity snapshot.
    fn navigate(&self, target: EntityType, tables: &EntityTables) -> Option<NavEntity>;
}

/// An owned snapshot of a navigation target.
pub enum NavEntity {
    Thing(Thing),
    Sensor(Sensor),
    ObservedProperty(ObservedProperty),
    Datastream(Datastream),
    Feature(FeatureOfInterest),
}

impl NavEntity {
    fn column(&self, col: Column) -> Value {
        match self {
            NavEntity::Thing(t) => t.column(col),
            NavEntity::Sensor(s) => s.column(col),
            NavEntity::ObservedProperty(p) => p.column(col),
            NavEntity::Datastream(d) => d.column(col),
            NavEntity::Feature(f) => f.column(col),
        }
    }

    fn navigate(&self, target: EntityType, tables: &EntityTables) -> Option<NavEntity> {
        match self {
            NavEntity::Datastream(d) => d.navigate(target, tables),
            _ => None,
        }
    }
}

impl EntityFields for Thing {
    fn entity_type(&self) -> EntityType {
        EntityType::Thing
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Description => Value::Text(self.description.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, _target: EntityType, _tables: &EntityTables) -> Option<NavEntity> {
        None
    }
}

impl EntityFields for Location {
    fn entity_type(&self) -> EntityType {
        EntityType::Location
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Description => Value::Text(self.description.clone()),
            Column::EncodingType => Value::Text(self.encoding_type.clone()),
            Column::Geometry => Value::Geometry(self.geometry.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, _target: EntityType, _tables: &EntityTables) -> Option<NavEntity> {
        None
    }
}

impl EntityFields for HistoricalLocation {
    fn entity_type(&self) -> EntityType {
        EntityType::HistoricalLocation
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Time => Value::DateTime(self.time.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, target: EntityType, tables: &EntityTables) -> Option<NavEntity> {
        match target {
            EntityType::Thing => tables
                .things
                .read()
                .get(&self.thing_id)
                .cloned()
                .map(NavEntity::Thing),
            _ => None,
        }
    }
}

impl EntityFields for Sensor {
    fn entity_type(&self) -> EntityType {
        EntityType::Sensor
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Description => Value::Text(self.description.clone()),
            Column::EncodingType => Value::Text(self.encoding_type.clone()),
            Column::Metadata => Value::Text(self.metadata.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, _target: EntityType, _tables: &EntityTables) -> Option<NavEntity> {
        None
    }
}

impl EntityFields for ObservedProperty {
    fn entity_type(&self) -> EntityType {
        EntityType::ObservedProperty
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Definition => Value::Text(self.definition.clone()),
            Column::Description => Value::Text(self.description.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, _target: EntityType, _tables: &EntityTables) -> Option<NavEntity> {
        None
    }
}

impl EntityFields for Datastream {
    fn entity_type(&self) -> EntityType {
        EntityType::Datastream
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Description => Value::Text(self.description.clone()),
            Column::ObservationType => Value::opt_text(&self.observation_type),
            Column::UnitName => Value::Text(self.unit_of_measurement.name.clone()),
            Column::UnitSymbol => Value::Text(self.unit_of_measurement.symbol.clone()),
            Column::UnitDefinition => Value::Text(self.unit_of_measurement.definition.clone()),
            Column::PhenomenonTimeStart => Value::opt_ts(&self.phenomenon_time_start),
            Column::PhenomenonTimeEnd => Value::opt_ts(&self.phenomenon_time_end),
            Column::ResultTimeStart => Value::opt_ts(&self.result_time_start),
            Column::ResultTimeEnd => Value::opt_ts(&self.result_time_end),
            _ => Value::Null,
        }
    }

    fn navigate(&self, target: EntityType, tables: &EntityTables) -> Option<NavEntity> {
        match target {
            EntityType::Thing => tables
                .things
                .read()
                .get(&self.thing_id)
                .cloned()
                .map(NavEntity::Thing),
            EntityType::Sensor => tables
                .sensors
                .read()
                .get(&self.sensor_id)
                .cloned()
                .map(NavEntity::Sensor),
            EntityType::ObservedProperty => tables
                .observed_properties
                .read()
                .get(&self.observed_property_id)
                .cloned()
                .map(NavEntity::ObservedProperty),
            _ => None,
        }
    }
}

impl EntityFields for Observation {
    fn entity_type(&self) -> EntityType {
        EntityType::Observation
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::PhenomenonTime => Value::DateTime(self.phenomenon_time.clone()),
            Column::ResultTime => Value::opt_ts(&self.result_time),
            Column::Result => Value::from_result(&self.result),
            Column::ResultQuality => Value::opt_text(&self.result_quality),
            Column::ClientTimestamp => Value::opt_ts(&self.client_timestamp),
            Column::ServerTimestamp => Value::opt_ts(&self.server_timestamp),
            Column::SyncBatchId => Value::opt_text(&self.sync_batch_id),
            _ => Value::Null,
        }
    }

    fn navigate(&self, target: EntityType, tables: &EntityTables) -> Option<NavEntity> {
        match target {
            EntityType::Datastream => tables
                .datastreams
                .read()
                .get(&self.datastream_id)
                .cloned()
                .map(NavEntity::Datastream),
            EntityType::FeatureOfInterest => {
                let id = self.feature_of_interest_id?;
                tables
                    .features
                    .read()
                    .get(&id)
                    .cloned()
                    .map(NavEntity::Feature)
            }
            _ => None,
        }
    }
}

impl EntityFields for FeatureOfInterest {
    fn entity_type(&self) -> EntityType {
        EntityType::FeatureOfInterest
    }

    fn column(&self, col: Column) -> Value {
        match col {
            Column::Id => Value::Number(self.id.as_u64() as f64),
            Column::Name => Value::Text(self.name.clone()),
            Column::Description => Value::Text(self.description.clone()),
            Column::EncodingType => Value::Text(self.encoding_type.clone()),
            Column::Geometry => Value::Geometry(self.geometry.clone()),
            _ => Value::Null,
        }
    }

    fn navigate(&self, _target: EntityType, _tables: &EntityTables) -> Option<NavEntity> {
        None
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluates templates against rows, with parameters and the tables needed
/// for navigation hops.
pub struct Evaluator<'a> {
    pub params: &'a [ParamValue],
    pub tables: &'a EntityTables,
}

impl<'a> Evaluator<'a> {
    pub fn new(params: &'a [ParamValue], tables: &'a EntityTables) -> Self {
        Self { params, tables }
    }

    /// Whether a row satisfies the template.
    pub fn matches<R: EntityFields>(&self, row: &R, template: &QueryTemplate) -> bool {
        match template {
            QueryTemplate::And(a, b) => self.matches(row, a) && self.matches(row, b),
            QueryTemplate::Or(a, b) => self.matches(row, a) || self.matches(row, b),
            QueryTemplate::Not(inner) => !self.matches(row, inner),
            QueryTemplate::Compare { op, lhs, rhs } => {
                let lhs = self.operand(row, lhs);
                let rhs = self.operand(row, rhs);
                compare(*op, &lhs, &rhs)
            }
            QueryTemplate::Predicate { func, args } => {
                let args: Vec<Value> = args.iter().map(|a| self.operand(row, a)).collect();
                bool_func(*func, &args)
            }
        }
    }

    /// Evaluate a value-producing operand for a row.
    pub fn operand<R: EntityFields>(&self, row: &R, operand: &Operand) -> Value {
        match operand {
            Operand::Field(field) => self.field(row, field),
            Operand::Param(i) => self
                .params
                .get(*i)
                .map(Value::from_param)
                .unwrap_or(Value::Null),
            Operand::Apply { func, args } => {
                let args: Vec<Value> = args.iter().map(|a| self.operand(row, a)).collect();
                scalar_func(*func, &args)
            }
        }
    }

    fn field<R: EntityFields>(&self, row: &R, field: &FieldRef) -> Value {
        if field.hops.is_empty() {
            return row.column(field.column);
        }
        let mut nav = match row.navigate(field.hops[0], self.tables) {
            Some(nav) => nav,
            None => return Value::Null,
        };
        for hop in &field.hops[1..] {
            nav = match nav.navigate(*hop, self.tables) {
                Some(next) => next,
                None => return Value::Null,
            };
        }
        nav.column(field.column)
    }

    /// Sort rows in place by resolved order specs. Missing values sort
    /// first; ties keep insertion order (stable sort).
    pub fn sort_rows<R: EntityFields>(&self, rows: &mut [R], order: &[ResolvedOrderBy]) {
        if order.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for spec in order {
                let va = self.field(a, &spec.field);
                let vb = self.field(b, &spec.field);
                let ord = cmp_values(&va, &vb).unwrap_or(Ordering::Equal);
                let ord = if spec.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

/// Sort comparison: Null first, incomparable pairs tie.
pub fn cmp_for_sort(a: &Value, b: &Value) -> Ordering {
    cmp_values(a, b).unwrap_or(Ordering::Equal)
}

/// Total-ish comparison for sorting: Null < everything, cross-type pairs
/// are incomparable (treated as equal by the sorter).
fn cmp_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Comparison semantics: mismatched or missing operands yield `false`,
/// except `ne`, which yields `true` for a genuine mismatch.
fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> bool {
    // Null handling: only eq/ne treat two nulls as equal.
    if matches!(lhs, Value::Null) || matches!(rhs, Value::Null) {
        let both_null = matches!(lhs, Value::Null) && matches!(rhs, Value::Null);
        return match op {
            CompareOp::Eq => both_null,
            CompareOp::Ne => !both_null,
            _ => false,
        };
    }

    match cmp_values(lhs, rhs) {
        Some(ord) => match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
        },
        // Incomparable types.
        None => matches!(op, CompareOp::Ne),
    }
}

fn as_text(v: &Value) -> Option<&str> {
    match v {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

fn as_geometry(v: &Value) -> Option<&GeometryValue> {
    match v {
        Value::Geometry(g) => Some(g),
        _ => None,
    }
}

fn bool_func(func: BoolFunc, args: &[Value]) -> bool {
    match func {
        BoolFunc::Contains => match (as_text(&args[0]), as_text(&args[1])) {
            (Some(s), Some(sub)) => s.contains(sub),
            _ => false,
        },
        BoolFunc::StartsWith => match (as_text(&args[0]), as_text(&args[1])) {
            (Some(s), Some(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        BoolFunc::EndsWith => match (as_text(&args[0]), as_text(&args[1])) {
            (Some(s), Some(suffix)) => s.ends_with(suffix),
            _ => false,
        },
        BoolFunc::GeoIntersects => match (as_geometry(&args[0]), as_geometry(&args[1])) {
            (Some(a), Some(b)) => a.intersects(b),
            _ => false,
        },
        BoolFunc::GeoWithin => match (as_geometry(&args[0]), as_geometry(&args[1])) {
            (Some(a), Some(b)) => a.within(b),
            _ => false,
        },
    }
}

fn scalar_func(func: ScalarFunc, args: &[Value]) -> Value {
    match func {
        ScalarFunc::Length => as_text(&args[0])
            .map(|s| Value::Number(s.chars().count() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::ToLower => as_text(&args[0])
            .map(|s| Value::Text(s.to_lowercase()))
            .unwrap_or(Value::Null),
        ScalarFunc::ToUpper => as_text(&args[0])
            .map(|s| Value::Text(s.to_uppercase()))
            .unwrap_or(Value::Null),
        ScalarFunc::Trim => as_text(&args[0])
            .map(|s| Value::Text(s.trim().to_string()))
            .unwrap_or(Value::Null),
        ScalarFunc::Substring => {
            let (Some(s), Some(start)) = (as_text(&args[0]), as_number(&args[1])) else {
                return Value::Null;
            };
            let start = start.max(0.0) as usize;
            let chars: Vec<char> = s.chars().collect();
            if start >= chars.len() {
                return Value::Text(String::new());
            }
            let end = match args.get(2).and_then(as_number) {
                Some(len) => (start + len.max(0.0) as usize).min(chars.len()),
                None => chars.len(),
            };
            Value::Text(chars[start..end].iter().collect())
        }
        ScalarFunc::IndexOf => match (as_text(&args[0]), as_text(&args[1])) {
            (Some(s), Some(sub)) => Value::Number(match s.find(sub) {
                Some(byte_idx) => s[..byte_idx].chars().count() as f64,
                None => -1.0,
            }),
            _ => Value::Null,
        },
        ScalarFunc::Concat => match (as_text(&args[0]), as_text(&args[1])) {
            (Some(a), Some(b)) => Value::Text(format!("{}{}", a, b)),
            _ => Value::Null,
        },
        ScalarFunc::Round => as_number(&args[0])
            .map(|n| Value::Number(n.round()))
            .unwrap_or(Value::Null),
        ScalarFunc::Floor => as_number(&args[0])
            .map(|n| Value::Number(n.floor()))
            .unwrap_or(Value::Null),
        ScalarFunc::Ceiling => as_number(&args[0])
            .map(|n| Value::Number(n.ceil()))
            .unwrap_or(Value::Null),
        ScalarFunc::Year => as_datetime(&args[0])
            .map(|t| Value::Number(t.year() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::Month => as_datetime(&args[0])
            .map(|t| Value::Number(t.month() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::Day => as_datetime(&args[0])
            .map(|t| Value::Number(t.day() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::Hour => as_datetime(&args[0])
            .map(|t| Value::Number(t.hour() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::Minute => as_datetime(&args[0])
            .map(|t| Value::Number(t.minute() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::Second => as_datetime(&args[0])
            .map(|t| Value::Number(t.second() as f64))
            .unwrap_or(Value::Null),
        ScalarFunc::GeoDistance => match (as_geometry(&args[0]), as_geometry(&args[1])) {
            (Some(a), Some(b)) => a.distance(b).map(Value::Number).unwrap_or(Value::Null),
            _ => Value::Null,
        },
        ScalarFunc::GeoLength => as_geometry(&args[0])
            .and_then(|g| g.length())
            .map(Value::Number)
            .unwrap_or(Value::Null),
    }
}

fn as_datetime(v: &Value) -> Option<&Timestamp> {
    match v {
        Value::DateTime(ts) => Some(ts),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obsdb_core::EntityId;
    use obsdb_query::{parse_filter, translate, QueryOptions};

    fn observation(result: f64, time: &str) -> Observation {
        Observation {
            id: EntityId(1),
            datastream_id: EntityId(5),
            feature_of_interest_id: None,
            phenomenon_time: Timestamp::parse(time).unwrap(),
            result_time: None,
            result: ResultValue::Number(result),
            result_quality: None,
            parameters: None,
            client_timestamp: None,
            server_timestamp: None,
            sync_batch_id: None,
        }
    }

    fn eval(filter: &str, row: &Observation, tables: &EntityTables) -> bool {
        let expr = parse_filter(filter).unwrap();
        let q = translate(Some(&expr), EntityType::Observation, &QueryOptions::default()).unwrap();
        let evaluator = Evaluator::new(&q.params, tables);
        evaluator.matches(row, q.template.as_ref().unwrap())
    }

    #[test]
    fn test_numeric_comparison() {
        let tables = EntityTables::new();
        let row = observation(21.5, "2024-01-15T10:30:00Z");
        assert!(eval("result gt 20", &row, &tables));
        assert!(!eval("result gt 30", &row, &tables));
        assert!(eval("result ge 21.5", &row, &tables));
    }

    #[test]
    fn test_temporal_extraction() {
        let tables = EntityTables::new();
        let row = observation(1.0, "2024-06-15T10:30:45Z");
        assert!(eval("year(phenomenonTime) eq 2024", &row, &tables));
        assert!(eval("month(phenomenonTime) eq 6", &row, &tables));
        assert!(eval("second(phenomenonTime) eq 45", &row, &tables));
        assert!(!eval("hour(phenomenonTime) eq 11", &row, &tables));
    }

    #[test]
    fn test_null_semantics() {
        let tables = EntityTables::new();
        let row = observation(1.0, "2024-01-01T00:00:00Z");
        // resultTime is absent on this row.
        assert!(eval("resultTime eq null", &row, &tables));
        assert!(!eval("resultTime ne null", &row, &tables));
        // Ordering against a missing value is false, and not negates it.
        assert!(!eval("resultTime gt 2024-01-01T00:00:00Z", &row, &tables));
        assert!(eval("not resultTime gt 2024-01-01T00:00:00Z", &row, &tables));
    }

    #[test]
    fn test_type_mismatch_is_false_except_ne() {
        let tables = EntityTables::new();
        let row = observation(1.0, "2024-01-01T00:00:00Z");
        assert!(!eval("result eq 'one'", &row, &tables));
        assert!(eval("result ne 'one'", &row, &tables));
    }

    #[test]
    fn test_navigation_hop_evaluation() {
        use obsdb_core::UnitOfMeasurement;

        let tables = EntityTables::new();
        tables.things.write().insert(
            EntityId(2),
            Thing {
                id: EntityId(2),
                name: "Weather Station 12".into(),
                description: String::new(),
                properties: None,
                sync_key: None,
            },
        );
        tables.datastreams.write().insert(
            EntityId(5),
            Datastream {
                id: EntityId(5),
                name: "air temp".into(),
                description: String::new(),
                thing_id: EntityId(2),
                sensor_id: EntityId(3),
                observed_property_id: EntityId(4),
                unit_of_measurement: UnitOfMeasurement {
                    name: "degree Celsius".into(),
                    symbol: "°C".into(),
                    definition: "ucum:Cel".into(),
                },
                observation_type: None,
                phenomenon_time_start: None,
                phenomenon_time_end: None,
                result_time_start: None,
                result_time_end: None,
                observed_area: None,
            },
        );

        let row = observation(21.5, "2024-01-15T10:30:00Z");
        assert!(eval(
            "contains(Datastream/Thing/name,'Weather') and result gt 20",
            &row,
            &tables
        ));
        assert!(!eval(
            "contains(Datastream/Thing/name,'Buoy') and result gt 20",
            &row,
            &tables
        ));
    }

    #[test]
    fn test_string_functions() {
        let tables = EntityTables::new();
        let mut row = observation(1.0, "2024-01-01T00:00:00Z");
        row.result = ResultValue::Text("Dry".into());
        assert!(eval("tolower(result) eq 'dry'", &row, &tables));
        assert!(eval("length(result) eq 3", &row, &tables));
        assert!(eval("substring(result,1) eq 'ry'", &row, &tables));
        assert!(eval("indexof(result,'r') eq 1", &row, &tables));
        assert!(eval("concat(result,'!') eq 'Dry!'", &row, &tables));
    }

    #[test]
    fn test_sort_rows() {
        let tables = EntityTables::new();
        let mut rows = vec![
            observation(3.0, "2024-01-03T00:00:00Z"),
            observation(1.0, "2024-01-01T00:00:00Z"),
            observation(2.0, "2024-01-02T00:00:00Z"),
        ];
        let opts = QueryOptions::new()
            .with_order_by(QueryOptions::parse_order_by("phenomenonTime desc").unwrap());
        let q = translate(None, EntityType::Observation, &opts).unwrap();
        let evaluator = Evaluator::new(&q.params, &tables);
        evaluator.sort_rows(&mut rows, &q.order);
        let results: Vec<f64> = rows.iter().filter_map(|o| o.result.as_number()).collect();
        assert_eq!(results, vec![3.0, 2.0, 1.0]);
    }
}
