//! Join composition over independently built single-table queries.
//!
//! Each participating [`TableQuery`] is rendered as a subquery whose columns
//! are exposed as `table<N>_<column>`, where `N` is the 1-based position of
//! the table in the join. References are written `table<N>.<field>` and
//! resolved against the tables registered so far. Rows coming back are split
//! by their `table<N>_` prefix and hydrated into a tuple of records.
//!
//! # Example
//!
//! ```ignore
//! use pgdao::{JoinQuery, Op, TableQuery};
//!
//! let mut orders = TableQuery::<Order>::new();
//! orders.where_("status", Op::Eq, "open");
//! let mut users = TableQuery::<User>::new();
//!
//! let rows = JoinQuery::new(&mut orders)
//!     .inner_join(&mut users, "table1.user_id", "table2.id")
//!     .add_computed_column("label", &["table2.name", " || ': ' || ", "table1.status"])
//!     .execute(&pool)
//!     .await?;
//! for row in rows.unwrap_or_default() {
//!     let (order, user) = row.records;
//!     println!("{} {} {:?}", order.id, user.name, row.extra.get("label"));
//! }
//! ```

mod tuple;


pub use tuple::{Append, RecordTuple};

use crate::clause::{ClauseSet, Direction, Op, Operand, Transform};
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::ident::is_valid_ident;
use crate::page::{Page, PageRequest};
use crate::record::Record;
use crate::statement::{Fragment, Statement};
use crate::table_query::{DEFAULT_LIMIT, DEFAULT_OFFSET, TableQuery, paginate};
use crate::value::RowMap;
use std::fmt;
use std::marker::PhantomData;

/// One joined result row.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRow<T> {
    /// One record per joined table, in join order.
    pub records: T,
    /// Columns not owned by any table (computed columns).
    pub extra: RowMap,
}

#[derive(Clone, Copy)]
struct TableDescriptor {
    table: &'static str,
    column_of: fn(&str) -> Option<&'static str>,
}

impl TableDescriptor {
    fn of<R: Record>() -> Self {
        Self {
            table: R::TABLE,
            column_of: R::column_of,
        }
    }
}

impl fmt::Debug for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table)
    }
}

#[derive(Debug, Clone, Copy)]
enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Builder composing a join of `T`'s record types (a tuple such as `(Order, User)`).
///
/// Consumed by execution, so its state never outlives one statement.
#[must_use]
pub struct JoinQuery<T> {
    from: Fragment,
    tables: Vec<TableDescriptor>,
    clauses: ClauseSet,
    distinct: Vec<String>,
    computed: Vec<(String, String)>,
    build_error: Option<String>,
    _records: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for JoinQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinQuery")
            .field("tables", &self.tables)
            .field("clauses", &self.clauses)
            .field("distinct", &self.distinct)
            .field("computed", &self.computed)
            .field("build_error", &self.build_error)
            .finish()
    }
}

impl<A: Record> JoinQuery<(A,)> {
    /// Start a join with `query` as `table1`. The query's state is consumed.
    pub fn new(query: &mut TableQuery<A>) -> Self {
        let mut from = Fragment::new("(");
        from.push_fragment(query.take_join_fragment("table1"))
            .push(") AS t1");
        Self {
            from,
            tables: vec![TableDescriptor::of::<A>()],
            clauses: ClauseSet::new(),
            distinct: Vec::new(),
            computed: Vec::new(),
            build_error: None,
            _records: PhantomData,
        }
    }
}

impl<T: RecordTuple> JoinQuery<T> {
    // ==================== Joins ====================

    /// `INNER JOIN` `query` as the next table, `ON <left> = <right>`.
    pub fn inner_join<R: Record>(
        self,
        query: &mut TableQuery<R>,
        left: &str,
        right: &str,
    ) -> JoinQuery<T::Output>
    where
        T: Append<R>,
    {
        self.join(JoinKind::Inner, query, left, right)
    }

    /// `LEFT JOIN` `query` as the next table, `ON <left> = <right>`.
    pub fn left_join<R: Record>(
        self,
        query: &mut TableQuery<R>,
        left: &str,
        right: &str,
    ) -> JoinQuery<T::Output>
    where
        T: Append<R>,
    {
        self.join(JoinKind::Left, query, left, right)
    }

    /// `RIGHT JOIN` `query` as the next table, `ON <left> = <right>`.
    pub fn right_join<R: Record>(
        self,
        query: &mut TableQuery<R>,
        left: &str,
        right: &str,
    ) -> JoinQuery<T::Output>
    where
        T: Append<R>,
    {
        self.join(JoinKind::Right, query, left, right)
    }

    fn join<R: Record>(
        mut self,
        kind: JoinKind,
        query: &mut TableQuery<R>,
        left: &str,
        right: &str,
    ) -> JoinQuery<T::Output>
    where
        T: Append<R>,
    {
        self.tables.push(TableDescriptor::of::<R>());
        let n = self.tables.len();

        let on = match (self.resolve(left), self.resolve(right)) {
            (Some(l), Some(r)) => format!("{l} = {r}"),
            (l, _) => {
                let unresolved = if l.is_none() { left } else { right };
                self.fail(format!(
                    "join of table{n} ({}): cannot resolve ON reference '{unresolved}'",
                    R::TABLE
                ));
                format!("{left} = {right}")
            }
        };

        self.from
            .push(&format!(" {} (", kind.as_sql()))
            .push_fragment(query.take_join_fragment(&format!("table{n}")))
            .push(&format!(") AS t{n} ON {on}"));
        self.retype()
    }

    fn retype<U>(self) -> JoinQuery<U> {
        JoinQuery {
            from: self.from,
            tables: self.tables,
            clauses: self.clauses,
            distinct: self.distinct,
            computed: self.computed,
            build_error: self.build_error,
            _records: PhantomData,
        }
    }

    // ==================== References ====================

    /// Resolve `table<N>.<field>` (or a bare field while only one table is
    /// registered) to the aliased column `table<N>_<column>`.
    fn resolve(&self, reference: &str) -> Option<String> {
        let (index, field) = match reference.strip_prefix("table").and_then(|r| r.split_once('.')) {
            Some((digits, field))
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) =>
            {
                (digits.parse::<usize>().ok()?, field)
            }
            _ if self.tables.len() == 1 && !reference.contains('.') => (1, reference),
            _ => return None,
        };
        let table = self.tables.get(index.checked_sub(1)?)?;
        let column = (table.column_of)(field)?;
        Some(format!("table{index}_{column}"))
    }

    fn resolve_or_warn(&self, reference: &str) -> Option<String> {
        let resolved = self.resolve(reference);
        if resolved.is_none() {
            tracing::warn!(
                target: "pgdao.query",
                reference,
                tables = ?self.tables,
                "unresolvable join reference; clause skipped"
            );
        }
        resolved
    }

    fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    // ==================== Select list ====================

    /// Add `<parts..> AS <name>` to the select list.
    ///
    /// Each part is a column reference when it resolves, otherwise literal SQL;
    /// parts are concatenated as-is. Literal parts are not escaped, so never
    /// build them from untrusted input.
    ///
    /// Names shaped like a member alias (`table<N>_..`) are rejected: the row
    /// splitter would route them into that member instead of `extra`.
    pub fn add_computed_column(mut self, name: &str, parts: &[&str]) -> Self {
        if !is_valid_ident(name) {
            self.fail(format!("invalid computed column name: {name:?}"));
            return self;
        }
        if table_slot(name, usize::MAX).is_some() {
            self.fail(format!(
                "computed column name {name:?} collides with a table-scoped alias"
            ));
            return self;
        }
        let expr: String = parts
            .iter()
            .map(|part| self.resolve(part).unwrap_or_else(|| part.to_string()))
            .collect();
        self.computed.push((name.to_string(), expr));
        self
    }

    /// `SELECT DISTINCT ON (..)` over the given references.
    pub fn distinct(mut self, columns: &[&str]) -> Self {
        let resolved = columns
            .iter()
            .filter_map(|c| self.resolve_or_warn(c))
            .collect();
        self.distinct = resolved;
        self
    }

    // ==================== Conditions ====================

    pub fn where_(self, reference: &str, op: Op, value: impl Into<Operand>) -> Self {
        self.push_where(reference, op, value.into(), None)
    }

    pub fn where_with(
        self,
        reference: &str,
        op: Op,
        value: impl Into<Operand>,
        transform: Transform,
    ) -> Self {
        self.push_where(reference, op, value.into(), Some(transform))
    }

    fn push_where(
        mut self,
        reference: &str,
        op: Op,
        value: Operand,
        transform: Option<Transform>,
    ) -> Self {
        if let Some(column) = self.resolve_or_warn(reference) {
            let target = match transform {
                Some(t) => t.apply(&column),
                None => column,
            };
            self.clauses.push_condition(&target, op, value);
        }
        self
    }

    pub fn and(mut self) -> Self {
        self.clauses.push_and();
        self
    }

    pub fn or(mut self) -> Self {
        self.clauses.push_or();
        self
    }

    // ==================== Ordering & Pagination ====================

    pub fn order_by(mut self, reference: &str, direction: Direction) -> Self {
        if let Some(column) = self.resolve_or_warn(reference) {
            self.clauses.push_order(&column, direction);
        }
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.clauses.set_limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.clauses.set_offset(offset);
        self
    }

    // ==================== Build helpers ====================

    fn check(&self) -> OrmResult<()> {
        match &self.build_error {
            Some(message) => Err(OrmError::validation(message.clone())),
            None => Ok(()),
        }
    }

    fn select_fragment(&self) -> OrmResult<Fragment> {
        self.check()?;

        let mut head = String::from("SELECT ");
        if !self.distinct.is_empty() {
            head.push_str(&format!("DISTINCT ON ({}) ", self.distinct.join(", ")));
        }
        head.push('*');
        for (name, expr) in &self.computed {
            head.push_str(&format!(", {expr} AS {name}"));
        }
        head.push_str(" FROM ");

        let mut out = Fragment::new(head);
        out.push_fragment(self.from.clone());
        self.clauses.write_where(&mut out, None);
        self.clauses.write_order(&mut out);
        Ok(out)
    }

    /// Render the complete join with `$1..$n` numbered once across every member.
    pub fn build_statement(
        &self,
        default_limit: Option<u64>,
        default_offset: Option<u64>,
    ) -> OrmResult<Statement> {
        let mut out = self.select_fragment()?;
        self.clauses
            .write_limit_offset(&mut out, default_limit, default_offset);
        Ok(out.into_statement())
    }

    // ==================== Execution ====================

    /// Run the join (limit 100, offset 0 unless set).
    pub async fn execute(self, conn: &impl Executor) -> OrmResult<Option<Vec<JoinRow<T>>>> {
        let stmt = self.build_statement(Some(DEFAULT_LIMIT), Some(DEFAULT_OFFSET))?;
        let rows = stmt.fetch(conn).await?;
        Ok(rows.map(demux_rows::<T>))
    }

    /// Run the join one page at a time; the page request governs limit and offset.
    pub async fn paginated_execute(
        self,
        conn: &impl Executor,
        request: PageRequest,
    ) -> OrmResult<Option<Page<JoinRow<T>>>> {
        let base = self.select_fragment()?;
        paginate(conn, base, request.clamped(), demux_rows::<T>).await
    }
}

fn demux_rows<T: RecordTuple>(rows: Vec<RowMap>) -> Vec<JoinRow<T>> {
    rows.into_iter().map(demux::<T>).collect()
}

/// Split one joined row into per-table buckets keyed by bare column name.
fn demux<T: RecordTuple>(row: RowMap) -> JoinRow<T> {
    let (buckets, extra) = split_row(row, T::ARITY);
    JoinRow {
        records: T::hydrate(buckets),
        extra,
    }
}

pub(crate) fn split_row(row: RowMap, arity: usize) -> (Vec<RowMap>, RowMap) {
    let mut buckets = vec![RowMap::new(); arity];
    let mut extra = RowMap::new();
    for (key, value) in row {
        match table_slot(&key, arity) {
            Some((index, column)) => {
                buckets[index].insert(column.to_string(), value);
            }
            None => {
                extra.insert(key, value);
            }
        }
    }
    (buckets, extra)
}

/// `table<N>_<column>` with `1 <= N <= arity` -> `(N - 1, column)`.
fn table_slot(key: &str, arity: usize) -> Option<(usize, &str)> {
    let rest = key.strip_prefix("table")?;
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let n: usize = rest[..digits].parse().ok()?;
    let column = rest[digits..].strip_prefix('_')?;
    (1..=arity).contains(&n).then(|| (n - 1, column))
}
