//! # pgdao
//!
//! A small record-oriented data access layer for PostgreSQL.
//!
//! ## Features
//!
//! - **Declared mappings**: `record!` declares an entity and its field/column table
//! - **Parameter safe**: values are always bound, placeholders are numbered once per statement
//! - **Soft delete**: every read filters `is_deleted = false`, deletes only flip the flag
//! - **Composable joins**: single-table queries become join members with prefixed columns
//! - **Pagination**: count plus page in one call, serializable as `{ rows, currentPage, .. }`
//!
//! ## Single table
//!
//! ```ignore
//! use pgdao::{Direction, Op, TableQuery};
//!
//! pgdao::record! {
//!     pub struct User in "users" {
//!         pub name: String => "user_name",
//!         pub email: Option<String> => "email",
//!     }
//! }
//!
//! let pool = pgdao::create_pool(&pgdao::DbConfig::from_env())?;
//!
//! let mut user = User { name: "ada".into(), ..User::default() };
//! TableQuery::<User>::new().create(&pool, &mut user).await?;
//!
//! let found = TableQuery::<User>::new()
//!     .where_("name", Op::Like, "a%")
//!     .order_by("name", Direction::Asc)
//!     .execute(&pool)
//!     .await?;
//! ```
//!
//! ## Joins
//!
//! ```ignore
//! use pgdao::{JoinQuery, TableQuery};
//!
//! let rows = JoinQuery::new(&mut TableQuery::<Order>::new())
//!     .inner_join(&mut TableQuery::<User>::new(), "table1.user_id", "table2.id")
//!     .execute(&pool)
//!     .await?;
//! ```

pub mod clause;
pub mod error;
pub mod executor;
pub mod ident;
pub mod join_query;
pub mod page;
pub mod record;
pub mod statement;
pub mod table_query;
pub mod value;

#[cfg(test)]
mod test_support;

pub use clause::{ClauseSet, Direction, Op, Operand, Transform};
pub use error::{OrmError, OrmResult};
pub use executor::Executor;
pub use join_query::{Append, JoinQuery, JoinRow, RecordTuple};
pub use page::{Page, PageRequest};
pub use record::{BASE_FIELDS, FieldDef, FieldValue, Record};
pub use statement::{Fragment, Statement};
pub use table_query::TableQuery;
pub use value::{FieldKind, RowMap, Value};

// Used by `record!` expansions.
pub use chrono;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use executor::SharedPool;

#[cfg(feature = "pool")]
pub use pool::{DbConfig, configure_db, create_pool, shared_pool};
