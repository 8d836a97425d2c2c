//! Single-table query and CRUD builder.
//!
//! A [`TableQuery`] accumulates conditions for one record type, renders a
//! soft-delete-aware `SELECT`, and runs inserts, updates and soft deletes.
//! State is single-shot: every execution clears it.
//!
//! # Example
//!
//! ```ignore
//! use pgdao::{Direction, Op, TableQuery};
//!
//! let adults = TableQuery::<User>::new()
//!     .where_("age", Op::Gte, 18)
//!     .and()
//!     .where_("email", Op::IsNotNull, ())
//!     .order_by("name", Direction::Asc)
//!     .execute(&pool)
//!     .await?;
//! ```

#[cfg(test)]
mod tests;

use crate::clause::{ClauseSet, Direction, Op, Operand, Transform};
use crate::error::OrmResult;
use crate::executor::Executor;
use crate::page::{Page, PageRequest};
use crate::record::Record;
use crate::statement::{Fragment, Statement};
use crate::value::{RowMap, Value};
use chrono::Utc;
use std::fmt;
use std::marker::PhantomData;

/// Limit applied by [`TableQuery::execute`] when none was set.
pub const DEFAULT_LIMIT: u64 = 100;
/// Offset applied by [`TableQuery::execute`] when none was set.
pub const DEFAULT_OFFSET: u64 = 0;

/// Predicate appended to every read so soft-deleted rows never surface.
pub(crate) const NOT_DELETED: &str = "is_deleted = false";

/// Query/CRUD builder for one record type.
pub struct TableQuery<R: Record> {
    clauses: ClauseSet,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Default for TableQuery<R> {
    fn default() -> Self {
        Self {
            clauses: ClauseSet::new(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> fmt::Debug for TableQuery<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableQuery")
            .field("table", &R::TABLE)
            .field("clauses", &self.clauses)
            .finish()
    }
}

impl<R: Record> TableQuery<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been accumulated since the last execution.
    pub fn is_idle(&self) -> bool {
        self.clauses.is_empty()
    }

    // ==================== Conditions ====================

    /// Add `<field> <op> <value>`.
    ///
    /// Unknown fields and values that do not suit `op` are logged and ignored.
    pub fn where_(&mut self, field: &str, op: Op, value: impl Into<Operand>) -> &mut Self {
        self.push_where(field, op, value.into(), None)
    }

    /// Like [`where_`](Self::where_) with the column wrapped in `UPPER`/`LOWER`.
    pub fn where_with(
        &mut self,
        field: &str,
        op: Op,
        value: impl Into<Operand>,
        transform: Transform,
    ) -> &mut Self {
        self.push_where(field, op, value.into(), Some(transform))
    }

    fn push_where(
        &mut self,
        field: &str,
        op: Op,
        value: Operand,
        transform: Option<Transform>,
    ) -> &mut Self {
        if let Some(target) = target_of::<R>(field) {
            let target = match transform {
                Some(t) => t.apply(target),
                None => target.to_string(),
            };
            self.clauses.push_condition(&target, op, value);
        }
        self
    }

    pub fn and(&mut self) -> &mut Self {
        self.clauses.push_and();
        self
    }

    pub fn or(&mut self) -> &mut Self {
        self.clauses.push_or();
        self
    }

    // ==================== Ordering & Pagination ====================

    pub fn order_by(&mut self, field: &str, direction: Direction) -> &mut Self {
        if let Some(target) = target_of::<R>(field) {
            self.clauses.push_order(target, direction);
        }
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.clauses.set_limit(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.clauses.set_offset(offset);
        self
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) -> &mut Self {
        self.clauses.reset();
        self
    }

    // ==================== Build helpers ====================

    fn column_list(alias: Option<&str>) -> String {
        match alias {
            Some(alias) => {
                let stored = R::field_defs()
                    .filter(|def| !def.is_computed())
                    .map(|def| format!("{} AS {alias}_{}", def.column, def.column));
                let computed = R::field_defs()
                    .filter(|def| def.is_computed())
                    .map(|def| format!("{} AS {alias}_{}", def.select_sql(), def.column));
                stored.chain(computed).collect::<Vec<_>>().join(", ")
            }
            None => std::iter::once("*".to_string())
                .chain(
                    R::field_defs()
                        .filter(|def| def.is_computed())
                        .map(|def| format!("{} AS {}", def.select_sql(), def.column)),
                )
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// `SELECT .. FROM .. WHERE .. ORDER BY ..` without limit or offset.
    fn select_fragment(&self, alias: Option<&str>) -> Fragment {
        let mut out = Fragment::new(format!(
            "SELECT {} FROM {}",
            Self::column_list(alias),
            R::TABLE
        ));
        self.clauses.write_where(&mut out, Some(NOT_DELETED));
        self.clauses.write_order(&mut out);
        out
    }

    /// Render the `SELECT` with unnumbered placeholders.
    ///
    /// With an `alias` every column is exposed as `<alias>_<column>` (the form
    /// a join subquery needs). Explicit limit/offset win over the defaults.
    pub fn build_fragment(
        &self,
        alias: Option<&str>,
        default_limit: Option<u64>,
        default_offset: Option<u64>,
    ) -> Fragment {
        let mut out = self.select_fragment(alias);
        self.clauses
            .write_limit_offset(&mut out, default_limit, default_offset);
        out
    }

    /// Render the complete `SELECT` with `$1..$n` placeholders.
    pub fn build_statement(
        &self,
        default_limit: Option<u64>,
        default_offset: Option<u64>,
    ) -> Statement {
        self.build_fragment(None, default_limit, default_offset)
            .into_statement()
    }

    /// Render as a join member aliased `alias` and clear the accumulated state.
    pub(crate) fn take_join_fragment(&mut self, alias: &str) -> Fragment {
        let fragment = self.build_fragment(Some(alias), None, None);
        self.clauses.reset();
        fragment
    }

    // ==================== Execution ====================

    /// Run the accumulated `SELECT` (limit 100, offset 0 unless set).
    ///
    /// The builder is reset before the statement is sent, so it is idle
    /// afterwards whether or not execution succeeds.
    pub async fn execute(&mut self, conn: &impl Executor) -> OrmResult<Option<Vec<R>>> {
        let stmt = self.build_statement(Some(DEFAULT_LIMIT), Some(DEFAULT_OFFSET));
        self.clauses.reset();
        let rows = stmt.fetch(conn).await?;
        Ok(rows.map(|rows| hydrate::<R>(&rows)))
    }

    /// Run the accumulated `SELECT` one page at a time.
    ///
    /// The page request governs limit and offset; explicitly set values are
    /// ignored. Returns `None` when either statement yields no result or the
    /// count row has no `count` value.
    pub async fn paginated_execute(
        &mut self,
        conn: &impl Executor,
        request: PageRequest,
    ) -> OrmResult<Option<Page<R>>> {
        let request = request.clamped();
        let base = self.select_fragment(None);
        self.clauses.reset();
        paginate(conn, base, request, |rows| hydrate::<R>(&rows)).await
    }

    /// Fetch one record by id. Pending conditions are combined with `AND`.
    pub async fn read(&mut self, conn: &impl Executor, id: &str) -> OrmResult<Option<R>> {
        if self.clauses.has_conditions() {
            self.clauses.push_and();
        }
        self.where_("id", Op::Eq, id);
        let records = self.execute(conn).await?;
        Ok(records.and_then(|records| records.into_iter().next()))
    }

    /// Fetch every record whose id is in `ids`. Pending conditions are combined with `AND`.
    ///
    /// An empty `ids` returns an empty list without contacting the executor.
    pub async fn read_many<I>(&mut self, conn: &impl Executor, ids: I) -> OrmResult<Option<Vec<R>>>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            self.clauses.reset();
            return Ok(Some(Vec::new()));
        }
        if self.clauses.has_conditions() {
            self.clauses.push_and();
        }
        self.where_("id", Op::In, ids);
        self.execute(conn).await
    }

    // ==================== Mutations ====================

    /// Insert `record` and assign the generated id.
    ///
    /// Stamps `create_date`, clears `update_date` and `is_deleted`. Returns
    /// `false` when the executor reports no result or no id came back.
    pub async fn create(&self, conn: &impl Executor, record: &mut R) -> OrmResult<bool> {
        self.create_many(conn, std::slice::from_mut(record)).await
    }

    /// Insert all `records` in one multi-row statement and assign ids in order.
    ///
    /// Empty input returns `false` without contacting the executor.
    pub async fn create_many(&self, conn: &impl Executor, records: &mut [R]) -> OrmResult<bool> {
        if records.is_empty() {
            return Ok(false);
        }

        let now = Utc::now();
        for record in records.iter_mut() {
            record.set_value("create_date", Value::Timestamp(now));
            record.set_value("update_date", Value::Null);
            record.set_value("is_deleted", Value::Bool(false));
        }

        let columns: Vec<_> = R::field_defs()
            .filter(|def| !def.is_computed() && def.name != "id")
            .collect();

        let mut out = Fragment::new(format!(
            "INSERT INTO {} ({}) VALUES ",
            R::TABLE,
            columns
                .iter()
                .map(|def| def.column)
                .collect::<Vec<_>>()
                .join(", ")
        ));
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                out.push(", ");
            }
            out.push("(");
            out.push_bind_list(
                columns
                    .iter()
                    .map(|def| record.value(def.name).unwrap_or(Value::Null)),
            );
            out.push(")");
        }
        out.push(" RETURNING id");

        let Some(rows) = out.into_statement().fetch(conn).await? else {
            return Ok(false);
        };
        if rows.is_empty() {
            return Ok(false);
        }
        for (record, row) in records.iter_mut().zip(&rows) {
            if let Some(id) = returned_id(row) {
                record.set_value("id", id);
            }
        }
        Ok(true)
    }

    /// Write every stored field except `id` and `create_date`, keyed by id.
    ///
    /// Stamps `update_date` and forces `is_deleted` to `false`. Returns
    /// whether a row matched.
    pub async fn update(&self, conn: &impl Executor, record: &mut R) -> OrmResult<bool> {
        record.set_value("update_date", Value::Timestamp(Utc::now()));
        record.set_value("is_deleted", Value::Bool(false));

        let mut out = Fragment::new(format!("UPDATE {} SET ", R::TABLE));
        let columns = R::field_defs()
            .filter(|def| !def.is_computed() && def.name != "id" && def.name != "create_date");
        for (i, def) in columns.enumerate() {
            if i > 0 {
                out.push(", ");
            }
            out.push(&format!("{} = ", def.column));
            out.push_bind(record.value(def.name).unwrap_or(Value::Null));
        }
        out.push(" WHERE id = ").push_bind(record.id()).push(" RETURNING id");

        let rows = out.into_statement().fetch(conn).await?;
        Ok(matched(rows.as_deref()))
    }

    /// Update each record in turn, best effort.
    ///
    /// A failing or unmatched record is logged and left out of the result;
    /// the batch itself never fails. Empty input returns `None` without
    /// contacting the executor. Contrast [`delete_many`](Self::delete_many),
    /// which stops at the first failure.
    pub async fn update_many(&self, conn: &impl Executor, records: Vec<R>) -> Option<Vec<R>> {
        if records.is_empty() {
            return None;
        }

        let mut updated = Vec::with_capacity(records.len());
        for mut record in records {
            match self.update(conn, &mut record).await {
                Ok(true) => updated.push(record),
                Ok(false) => tracing::warn!(
                    target: "pgdao.batch",
                    table = R::TABLE,
                    id = %record.id(),
                    "update matched no row; record skipped"
                ),
                Err(err) => tracing::warn!(
                    target: "pgdao.batch",
                    table = R::TABLE,
                    id = %record.id(),
                    error = %err,
                    "update failed; record skipped"
                ),
            }
        }
        Some(updated)
    }

    /// Soft delete: `SET is_deleted = true`. Returns whether a row matched.
    pub async fn delete(&self, conn: &impl Executor, record: &R) -> OrmResult<bool> {
        let mut out = Fragment::new(format!(
            "UPDATE {} SET is_deleted = true WHERE id = ",
            R::TABLE
        ));
        out.push_bind(record.id()).push(" RETURNING id");

        let rows = out.into_statement().fetch(conn).await?;
        Ok(matched(rows.as_deref()))
    }

    /// Soft delete each record in turn, stopping at the first failure.
    ///
    /// Empty input returns `None` without contacting the executor. Unlike
    /// [`update_many`](Self::update_many), an error aborts the batch and is
    /// returned; records before it stay deleted.
    pub async fn delete_many(
        &self,
        conn: &impl Executor,
        records: &[R],
    ) -> OrmResult<Option<Vec<bool>>> {
        if records.is_empty() {
            return Ok(None);
        }

        let mut results = Vec::with_capacity(records.len());
        for record in records {
            results.push(self.delete(conn, record).await?);
        }
        Ok(Some(results))
    }
}

/// SQL that reads `field` of `R`: its column, or its expression when computed.
fn target_of<R: Record>(field: &str) -> Option<&'static str> {
    let target = R::field_def(field).map(|def| def.select_sql());
    if target.is_none() {
        tracing::warn!(
            target: "pgdao.query",
            table = R::TABLE,
            field,
            "unknown field; clause skipped"
        );
    }
    target
}

fn hydrate<R: Record>(rows: &[RowMap]) -> Vec<R> {
    rows.iter().map(R::from_row).collect()
}

fn returned_id(row: &RowMap) -> Option<Value> {
    match row.get("id")? {
        Value::Null => None,
        Value::Text(id) => Some(Value::Text(id.clone())),
        Value::Int(id) => Some(Value::Text(id.to_string())),
        other => {
            tracing::warn!(
                target: "pgdao.record",
                received = other.type_name(),
                "unexpected id type returned"
            );
            None
        }
    }
}

fn matched(rows: Option<&[RowMap]>) -> bool {
    rows.and_then(|rows| rows.first())
        .and_then(returned_id)
        .is_some()
}

/// Run the count statement and then the page statement for `base`.
pub(crate) async fn paginate<T>(
    conn: &impl Executor,
    base: Fragment,
    request: PageRequest,
    hydrate: impl FnOnce(Vec<RowMap>) -> Vec<T>,
) -> OrmResult<Option<Page<T>>> {
    let mut count = Fragment::new("SELECT COUNT(*) AS count FROM (");
    count.push_fragment(base.clone()).push(") AS count_table");

    let mut page = base;
    page.push(&format!(
        " LIMIT {} OFFSET {}",
        request.limit(),
        request.offset()
    ));

    let Some(count_rows) = count.into_statement().fetch(conn).await? else {
        return Ok(None);
    };
    let Some(total) = count_rows
        .first()
        .and_then(|row| row.get("count"))
        .and_then(Value::as_i64)
    else {
        return Ok(None);
    };

    let Some(rows) = page.into_statement().fetch(conn).await? else {
        return Ok(None);
    };
    Ok(Some(Page::new(
        hydrate(rows),
        request,
        u64::try_from(total).unwrap_or(0),
    )))
}
