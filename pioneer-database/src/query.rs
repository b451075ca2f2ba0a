//! The query engine (C8.2): `Operation`s compose into `Statement`s via
//! `Conjunction`, `Statement`s attach to a field `Condition`, and a
//! `Query` bundles output projection, conditions, and optional staged
//! foreign data from a join.

use pioneer_core::{PioneerError, PioneerResult};
use pioneer_data::{Data, FieldPath, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Contains,
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Not,
}

/// A single `field <op> operand` test, optionally negated.
#[derive(Debug, Clone)]
pub struct Operation {
    pub path: FieldPath,
    pub operator: Operator,
    pub operand: Option<Value>,
    pub modifier: Option<Modifier>,
}

impl Operation {
    pub fn new(path: FieldPath, operator: Operator, operand: Option<Value>) -> Self {
        Self { path, operator, operand, modifier: None }
    }

    pub fn eq(path: FieldPath, operand: Value) -> Self {
        Self::new(path, Operator::Eq, Some(operand))
    }

    pub fn ne(path: FieldPath, operand: Value) -> Self {
        Self::new(path, Operator::Ne, Some(operand))
    }

    pub fn gt(path: FieldPath, operand: Value) -> Self {
        Self::new(path, Operator::Gt, Some(operand))
    }

    pub fn lt(path: FieldPath, operand: Value) -> Self {
        Self::new(path, Operator::Lt, Some(operand))
    }

    pub fn contains(path: FieldPath, operand: Value) -> Self {
        Self::new(path, Operator::Contains, Some(operand))
    }

    /// True if the field is a non-empty list/set with at least one truthy
    /// element.
    pub fn any(path: FieldPath) -> Self {
        Self::new(path, Operator::Any, None)
    }

    /// True if the field is a non-empty list/set whose elements are all
    /// truthy.
    pub fn all(path: FieldPath) -> Self {
        Self::new(path, Operator::All, None)
    }

    pub fn not(mut self) -> Self {
        self.modifier = Some(Modifier::Not);
        self
    }

    pub fn evaluate(&self, record: &Data) -> PioneerResult<bool> {
        let value = record.get(&self.path);
        let raw = match self.operator {
            Operator::Eq => value.map(|v| Some(v) == self.operand.as_ref()).unwrap_or(false),
            Operator::Ne => value.map(|v| Some(v) != self.operand.as_ref()).unwrap_or(true),
            Operator::Gt => {
                matches!(compare(value, self.operand.as_ref()), Some(std::cmp::Ordering::Greater))
            }
            Operator::Lt => {
                matches!(compare(value, self.operand.as_ref()), Some(std::cmp::Ordering::Less))
            }
            Operator::Contains => match value {
                Some(Value::List(items)) | Some(Value::Set(items)) => {
                    self.operand.as_ref().map(|op| items.contains(op)).unwrap_or(false)
                }
                Some(Value::String(s)) => match &self.operand {
                    Some(Value::String(sub)) => s.contains(sub.as_str()),
                    _ => false,
                },
                _ => false,
            },
            Operator::Any => as_iterable(value, &self.path)?.iter().any(truthy),
            Operator::All => {
                let items = as_iterable(value, &self.path)?;
                !items.is_empty() && items.iter().all(truthy)
            }
        };
        Ok(if self.modifier == Some(Modifier::Not) { !raw } else { raw })
    }
}

fn as_iterable<'a>(value: Option<&'a Value>, path: &FieldPath) -> PioneerResult<&'a [Value]> {
    match value {
        Some(Value::List(v)) | Some(Value::Set(v)) => Ok(v),
        _ => Err(PioneerError::SchemaViolation(format!("field {path} is not iterable for any/all"))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::List(l) | Value::Set(l) => !l.is_empty(),
        Value::Map(m) => !m.is_empty(),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Some(Value::String(x)), Some(Value::String(y))) => Some(x.cmp(y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

/// A chain of operations joined by `Conjunction`s, short-circuiting like
/// the boolean operator it names.
#[derive(Debug, Clone)]
pub enum Statement {
    Operation(Operation),
    Compound(Operation, Conjunction, Box<Statement>),
}

impl Statement {
    pub fn and(self, next: Operation) -> Self {
        Statement::Compound(next, Conjunction::And, Box::new(self))
    }

    pub fn or(self, next: Operation) -> Self {
        Statement::Compound(next, Conjunction::Or, Box::new(self))
    }

    pub fn evaluate(&self, record: &Data) -> PioneerResult<bool> {
        match self {
            Statement::Operation(op) => op.evaluate(record),
            Statement::Compound(op, conjunction, rest) => {
                let head = op.evaluate(record)?;
                match conjunction {
                    Conjunction::And => Ok(head && rest.evaluate(record)?),
                    Conjunction::Or => Ok(head || rest.evaluate(record)?),
                }
            }
        }
    }
}

/// A named predicate: the field path it is nominally about (used for
/// index narrowing) plus the statement to run.
#[derive(Debug, Clone)]
pub struct Condition {
    pub path: FieldPath,
    pub statement: Statement,
}

impl Condition {
    pub fn new(path: FieldPath, statement: Statement) -> Self {
        Self { path, statement }
    }

    pub fn evaluate(&self, record: &Data) -> PioneerResult<bool> {
        self.statement.evaluate(record)
    }
}

/// Data staged by a join, ready to be grafted into a candidate record
/// before its conditions are evaluated.
#[derive(Debug, Clone)]
pub enum ForeignData {
    Single(Data),
    Many(Vec<Data>),
}

impl ForeignData {
    fn into_value(self) -> Value {
        match self {
            ForeignData::Single(d) => Value::Map(d.fields),
            ForeignData::Many(items) => Value::List(items.into_iter().map(|d| Value::Map(d.fields)).collect()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub outputs: Vec<FieldPath>,
    pub conditions: Vec<Condition>,
    foreign: Vec<(Option<FieldPath>, ForeignData)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the fields an [`crate::index::IndexedDatabase`] narrows
    /// candidates by; has no effect on which records match, only on how
    /// fast matching ones are found.
    pub fn select(mut self, paths: impl IntoIterator<Item = FieldPath>) -> Self {
        self.outputs = paths.into_iter().collect();
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn where_op(self, operation: Operation) -> Self {
        let path = operation.path.clone();
        self.filter(Condition::new(path, Statement::Operation(operation)))
    }

    /// Stage foreign data directly, without running a sub-query.
    pub fn with_foreign(mut self, path: Option<FieldPath>, data: ForeignData) -> Self {
        self.foreign.push((path, data));
        self
    }

    /// Run `sub_query` against `other` and stage its result as foreign
    /// data at `foreign_path` (or merged wholesale into the candidate
    /// record, field by field, when `foreign_path` is `None`).
    pub async fn join(
        mut self,
        foreign_path: Option<FieldPath>,
        other: &crate::client::DatabaseClient,
        sub_query: Query,
    ) -> PioneerResult<Self> {
        let mut results = other.query(&sub_query).await?;
        let foreign = if results.len() == 1 {
            ForeignData::Single(results.pop().expect("len checked above"))
        } else {
            ForeignData::Many(results)
        };
        self.foreign.push((foreign_path, foreign));
        Ok(self)
    }

    /// Graft staged foreign data into a clone of `record`, then evaluate
    /// every condition against it. `None` if any condition fails.
    pub fn evaluate(&self, record: &Data) -> PioneerResult<Option<Data>> {
        let mut record = record.clone();
        for (path, foreign) in &self.foreign {
            match path {
                Some(p) => record.set(p, foreign.clone().into_value()),
                None => {
                    if let ForeignData::Single(data) = foreign {
                        record.update(data);
                    }
                }
            }
        }
        for condition in &self.conditions {
            if !condition.evaluate(&record)? {
                return Ok(None);
            }
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(json: serde_json::Value) -> Data {
        Data::from_json(json).unwrap()
    }

    #[test]
    fn eq_matches_scalar_field() {
        let op = Operation::eq(FieldPath::from(["a"]), Value::from(1i64));
        assert!(op.evaluate(&data(serde_json::json!({"a": 1}))).unwrap());
        assert!(!op.evaluate(&data(serde_json::json!({"a": 2}))).unwrap());
    }

    #[test]
    fn not_inverts_result() {
        let op = Operation::eq(FieldPath::from(["a"]), Value::from(1i64)).not();
        assert!(!op.evaluate(&data(serde_json::json!({"a": 1}))).unwrap());
    }

    #[test]
    fn any_requires_iterable_field() {
        let op = Operation::any(FieldPath::from(["a"]));
        assert!(matches!(op.evaluate(&data(serde_json::json!({"a": 1}))), Err(PioneerError::SchemaViolation(_))));
        assert!(op.evaluate(&data(serde_json::json!({"a": [false, true]}))).unwrap());
        assert!(!op.evaluate(&data(serde_json::json!({"a": [false, 0]}))).unwrap());
    }

    #[test]
    fn compound_and_or_short_circuit_correctly() {
        let statement = Statement::Operation(Operation::eq(FieldPath::from(["a"]), Value::from(1i64)))
            .and(Operation::eq(FieldPath::from(["b"]), Value::from(2i64)));
        assert!(statement.evaluate(&data(serde_json::json!({"a": 1, "b": 2}))).unwrap());
        assert!(!statement.evaluate(&data(serde_json::json!({"a": 1, "b": 3}))).unwrap());
    }

    #[test]
    fn query_without_conditions_passes_everything_through() {
        let query = Query::new();
        assert_eq!(query.evaluate(&data(serde_json::json!({"a": 1}))).unwrap(), Some(data(serde_json::json!({"a": 1}))));
    }
}
