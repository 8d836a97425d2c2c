//! Parameter-safe statement fragments.
//!
//! A [`Fragment`] stores SQL pieces and parameters separately. Placeholders
//! stay unnumbered while fragments are composed (a join absorbs several
//! single-table subqueries), and are numbered `$1, $2, ...` exactly once when
//! the complete statement is turned into a [`Statement`].

use crate::error::OrmResult;
use crate::executor::Executor;
use crate::value::{RowMap, Value};

/// The token written for a placeholder that has not been numbered yet.
pub const PLACEHOLDER: char = '$';

#[derive(Debug, Clone, PartialEq)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A composable piece of SQL with its bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Fragment {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

impl Fragment {
    /// Create a fragment starting with raw SQL.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        let mut fragment = Self::empty();
        fragment.push(&initial_sql.into());
        fragment
    }

    /// Create an empty fragment.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append raw SQL (no parameters).
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append a placeholder and bind its value.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value.into());
        self
    }

    /// Append a comma-separated list of placeholders, one per value.
    pub fn push_bind_list(&mut self, values: impl IntoIterator<Item = Value>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Append another fragment, keeping its parameters in order.
    pub fn push_fragment(&mut self, mut other: Fragment) -> &mut Self {
        for part in other.parts.drain(..) {
            match part {
                SqlPart::Raw(s) => {
                    self.push(&s);
                }
                SqlPart::Param => self.parts.push(SqlPart::Param),
            }
        }
        self.params.append(&mut other.params);
        self
    }

    /// Bound parameters, in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Number of placeholders written so far.
    pub fn placeholder_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param))
            .count()
    }

    /// Render SQL with bare `$` placeholder tokens.
    pub fn to_unnumbered_sql(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => out.push(PLACEHOLDER),
            }
        }
        out
    }

    /// Render SQL with `$1, $2, ...` placeholders.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        let mut idx = 0usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param => {
                    idx += 1;
                    out.push(PLACEHOLDER);
                    out.push_str(&idx.to_string());
                }
            }
        }
        out
    }

    /// Number the placeholders and produce a dispatchable statement.
    pub fn into_statement(self) -> Statement {
        debug_assert_eq!(self.placeholder_count(), self.params.len());
        Statement {
            sql: self.to_sql(),
            params: self.params,
        }
    }
}

/// A complete statement with numbered placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Send the statement through `conn`, logging it first and logging any failure.
    pub async fn fetch(&self, conn: &impl Executor) -> OrmResult<Option<Vec<RowMap>>> {
        tracing::debug!(
            target: "pgdao.sql",
            param_count = self.params.len(),
            sql = %self.sql,
        );
        conn.query(&self.sql, &self.params).await.inspect_err(|err| {
            tracing::error!(
                target: "pgdao.sql",
                error = %err,
                sql = %self.sql,
                "unexpected error executing statement"
            );
        })
    }
}
