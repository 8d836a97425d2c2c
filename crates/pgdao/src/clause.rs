//! Clause vocabulary shared by [`TableQuery`](crate::TableQuery) and
//! [`JoinQuery`](crate::JoinQuery).
//!
//! A [`ClauseSet`] accumulates conditions and bare connectives in insertion
//! order and renders them into a [`Fragment`] with unnumbered placeholders.
//! Connectives are never inserted automatically between user conditions.

use crate::error::OrmError;
use crate::statement::Fragment;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Comparison operator.
///
/// # Example
/// ```ignore
/// use pgdao::Op;
///
/// let op: Op = "not in".parse()?;
/// assert_eq!(op, Op::NotIn);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<>`
    LtGt,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `LIKE`
    Like,
    /// `IN (..)`
    In,
    /// `NOT IN (..)`
    NotIn,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Op {
    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::LtGt => "<>",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Lte => "<=",
            Op::Gte => ">=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::IsNull => "IS NULL",
            Op::IsNotNull => "IS NOT NULL",
        }
    }

    /// `IN` / `NOT IN`.
    pub fn takes_list(self) -> bool {
        matches!(self, Op::In | Op::NotIn)
    }

    /// `IS NULL` / `IS NOT NULL`.
    pub fn takes_no_value(self) -> bool {
        matches!(self, Op::IsNull | Op::IsNotNull)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Op {
    type Err = OrmError;

    /// Case-insensitive; runs of whitespace are treated as one space.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let op = match normalized.to_ascii_lowercase().as_str() {
            "=" => Op::Eq,
            "!=" => Op::Ne,
            "<>" => Op::LtGt,
            "<" => Op::Lt,
            ">" => Op::Gt,
            "<=" => Op::Lte,
            ">=" => Op::Gte,
            "like" => Op::Like,
            "in" => Op::In,
            "not in" => Op::NotIn,
            "is null" => Op::IsNull,
            "is not null" => Op::IsNotNull,
            _ => return Err(OrmError::validation(format!("unknown operator: {s:?}"))),
        };
        Ok(op)
    }
}

/// Function applied to the column before comparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Upper,
    Lower,
}

impl Transform {
    /// Wrap `target` (a column or expression) in the function call.
    pub fn apply(self, target: &str) -> String {
        match self {
            Transform::Upper => format!("UPPER({target})"),
            Transform::Lower => format!("LOWER({target})"),
        }
    }
}

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Right-hand side of a condition.
///
/// Built from scalars, `Option`s (`None` is absent), vectors, arrays and slices.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Operand {
    #[default]
    Absent,
    Scalar(Value),
    List(Vec<Value>),
}

impl Operand {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Absent | Operand::Scalar(Value::Null) => "no value",
            Operand::Scalar(_) => "a scalar",
            Operand::List(_) => "a list",
        }
    }
}

macro_rules! impl_operand_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Scalar(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from_scalar!(
    bool,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    &str,
    &String,
    DateTime<Utc>,
    uuid::Uuid,
);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Scalar(v)
    }
}

impl From<()> for Operand {
    fn from(_: ()) -> Self {
        Operand::Absent
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        v.map_or(Operand::Absent, |v| Operand::Scalar(v.into()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(v: Vec<T>) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Operand {
    fn from(v: [T; N]) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Operand {
    fn from(v: &[T]) -> Self {
        Operand::List(v.iter().cloned().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Condition(Fragment),
    And,
    Or,
}

/// Accumulated `WHERE` / `ORDER BY` / `LIMIT` / `OFFSET` state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseSet {
    clauses: Vec<Clause>,
    order: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl ClauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no condition, ordering, limit or offset has been recorded.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
            && self.order.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
    }

    pub fn has_conditions(&self) -> bool {
        !self.clauses.is_empty()
    }

    /// Record `<target> <op> <operand>`; `target` is already-resolved SQL.
    ///
    /// Returns `false` (and logs a warning) when the operand does not suit the
    /// operator; nothing is recorded in that case.
    pub fn push_condition(&mut self, target: &str, op: Op, operand: Operand) -> bool {
        let mut cond = Fragment::new(format!("{target} {op}"));

        if op.takes_no_value() {
            self.clauses.push(Clause::Condition(cond));
            return true;
        }

        if op.takes_list() {
            let values = match operand {
                Operand::List(values) => values,
                other => {
                    warn_operand(target, op, &other);
                    return false;
                }
            };
            if values.is_empty() {
                self.clauses.push(Clause::Condition(Fragment::new("1 = 1")));
                return true;
            }
            cond.push(" (").push_bind_list(values).push(")");
            self.clauses.push(Clause::Condition(cond));
            return true;
        }

        match operand {
            Operand::Scalar(value) if !value.is_null() => {
                cond.push(" ").push_bind(value);
                self.clauses.push(Clause::Condition(cond));
                true
            }
            other => {
                warn_operand(target, op, &other);
                false
            }
        }
    }

    pub fn push_and(&mut self) {
        self.clauses.push(Clause::And);
    }

    pub fn push_or(&mut self) {
        self.clauses.push(Clause::Or);
    }

    /// Record `<target> ASC|DESC`; `target` is already-resolved SQL.
    pub fn push_order(&mut self, target: &str, direction: Direction) {
        self.order.push(format!("{target} {}", direction.as_sql()));
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    /// Write ` WHERE ...`.
    ///
    /// User clauses are parenthesized as one group; `mandatory` (if any) is
    /// then appended with `AND`, so no user `OR` can escape it.
    pub fn write_where(&self, out: &mut Fragment, mandatory: Option<&str>) {
        if self.clauses.is_empty() && mandatory.is_none() {
            return;
        }

        out.push(" WHERE ");
        if !self.clauses.is_empty() {
            out.push("(");
            for (i, clause) in self.clauses.iter().enumerate() {
                if i > 0 {
                    out.push(" ");
                }
                match clause {
                    Clause::Condition(cond) => {
                        out.push_fragment(cond.clone());
                    }
                    Clause::And => {
                        out.push("AND");
                    }
                    Clause::Or => {
                        out.push("OR");
                    }
                }
            }
            out.push(")");
        }
        if let Some(predicate) = mandatory {
            if !self.clauses.is_empty() {
                out.push(" AND ");
            }
            out.push(predicate);
        }
    }

    /// Write ` ORDER BY ...` if any ordering was recorded.
    pub fn write_order(&self, out: &mut Fragment) {
        if !self.order.is_empty() {
            out.push(" ORDER BY ").push(&self.order.join(", "));
        }
    }

    /// Write ` LIMIT n` / ` OFFSET n`. Explicit values win over the defaults;
    /// with neither the clause is omitted.
    pub fn write_limit_offset(
        &self,
        out: &mut Fragment,
        default_limit: Option<u64>,
        default_offset: Option<u64>,
    ) {
        if let Some(limit) = self.limit.or(default_limit) {
            out.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset.or(default_offset) {
            out.push(&format!(" OFFSET {offset}"));
        }
    }

    /// Move the accumulated state out, leaving this set empty.
    pub fn take(&mut self) -> ClauseSet {
        std::mem::take(self)
    }

    pub fn reset(&mut self) {
        *self = ClauseSet::default();
    }
}

fn warn_operand(target: &str, op: Op, operand: &Operand) {
    tracing::warn!(
        target: "pgdao.query",
        column = target,
        operator = op.as_sql(),
        received = operand.kind(),
        "invalid value for operator; condition skipped"
    );
}
