//! Record mapping: how an entity's fields map to columns and how rows
//! populate and serialize an entity.
//!
//! Every record carries four base fields (`id`, `is_deleted`, `create_date`,
//! `update_date`) followed by its own [`FieldDef`] table. Builders iterate the
//! declared table; nothing is discovered at runtime.
//!
//! Records are normally declared with [`record!`](crate::record!); a manual
//! `impl Record` only needs the table, the field table and a name-keyed
//! getter/setter pair.

mod macros;


use crate::error::{OrmError, OrmResult};
use crate::ident::validate_ident;
use crate::value::{FieldKind, RowMap, Value};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// One mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust-side field name.
    pub name: &'static str,
    /// Column name (for computed fields: the alias the expression is read as).
    pub column: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
    /// SQL expression for computed (read-only) fields.
    pub computed: Option<&'static str>,
}

impl FieldDef {
    /// A stored, non-nullable field.
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            nullable: false,
            computed: None,
        }
    }

    /// Mark the field nullable.
    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Read the field through `expr` instead of a stored column.
    pub const fn computed(mut self, expr: &'static str) -> Self {
        self.computed = Some(expr);
        self
    }

    /// Whether the field is derived from a SQL expression.
    pub const fn is_computed(&self) -> bool {
        self.computed.is_some()
    }

    /// SQL that reads this field inside its own table: the column, or the expression.
    pub fn select_sql(&self) -> &'static str {
        self.computed.unwrap_or(self.column)
    }
}

/// The fields every record carries, in declaration order.
pub const BASE_FIELDS: &[FieldDef] = &[
    FieldDef::new("id", "id", FieldKind::Text),
    FieldDef::new("is_deleted", "is_deleted", FieldKind::Bool),
    FieldDef::new("create_date", "create_date", FieldKind::Timestamp),
    FieldDef::new("update_date", "update_date", FieldKind::Timestamp).nullable(),
];

/// Rust types that can back a mapped field.
pub trait FieldValue: Sized {
    const KIND: FieldKind;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    /// Convert an already kind-checked value; `None` if it does not fit.
    fn from_value(value: Value) -> Option<Self>;

    /// Replace `self` with `value` when it converts; report whether it did.
    fn assign(&mut self, value: Value) -> bool {
        match Self::from_value(value) {
            Some(v) => {
                *self = v;
                true
            }
            None => false,
        }
    }
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FieldValue for i32 {
    const KIND: FieldKind = FieldKind::Int;

    fn to_value(&self) -> Value {
        Value::Int((*self).into())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => i32::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FieldValue for i64 {
    const KIND: FieldKind = FieldKind::Int;

    fn to_value(&self) -> Value {
        Value::Int(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    const KIND: FieldKind = FieldKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(v),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FieldValue for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const KIND: FieldKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, FieldValue::to_value)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// An entity mapped to one table.
pub trait Record: Default + Send + Sync + 'static {
    /// Physical relation name.
    const TABLE: &'static str;

    /// Type-specific fields (the base fields are implied).
    const FIELDS: &'static [FieldDef];

    /// Current value of a field by name (base fields included).
    fn value(&self, field: &str) -> Option<Value>;

    /// Assign a kind-checked value to a field by name; `false` if the field is
    /// unknown or the value does not convert.
    fn set_value(&mut self, field: &str, value: Value) -> bool;

    fn table_name() -> &'static str {
        Self::TABLE
    }

    /// Base fields followed by [`Record::FIELDS`].
    fn field_defs() -> impl Iterator<Item = &'static FieldDef> {
        BASE_FIELDS.iter().chain(Self::FIELDS.iter())
    }

    fn field_def(field: &str) -> Option<&'static FieldDef> {
        Self::field_defs().find(|def| def.name == field)
    }

    fn column_of(field: &str) -> Option<&'static str> {
        Self::field_def(field).map(|def| def.column)
    }

    /// Check that the mapping covers every field exactly once with valid identifiers.
    fn validate_mapping() -> OrmResult<()> {
        validate_ident(Self::TABLE)?;
        let mut names = HashSet::new();
        let mut columns = HashSet::new();
        for def in Self::field_defs() {
            validate_ident(def.column)?;
            if !names.insert(def.name) {
                return Err(OrmError::validation(format!(
                    "{}: field '{}' is mapped more than once",
                    Self::TABLE,
                    def.name
                )));
            }
            if !columns.insert(def.column) {
                return Err(OrmError::validation(format!(
                    "{}: column '{}' is mapped more than once",
                    Self::TABLE,
                    def.column
                )));
            }
        }
        Ok(())
    }

    fn id(&self) -> String {
        match self.value("id") {
            Some(Value::Text(id)) => id,
            _ => String::new(),
        }
    }

    /// A fresh record populated from a column-keyed row.
    fn from_row(row: &RowMap) -> Self {
        let mut record = Self::default();
        record.populate_from_row(row);
        record
    }

    /// Populate from a column-keyed row.
    ///
    /// Absent columns leave the field unchanged, `NULL` clears nullable fields,
    /// and values of the wrong kind are skipped with a warning.
    fn populate_from_row(&mut self, row: &RowMap) -> &mut Self {
        populate(self, row, |def| def.column);
        self
    }

    /// Populate from a field-name keyed map, same rules as [`Record::populate_from_row`].
    fn populate_from_object(&mut self, object: &RowMap) -> &mut Self {
        populate(self, object, |def| def.name);
        self
    }

    /// Populate from a JSON object keyed by field name. Non-scalar members are ignored.
    fn populate_from_json(&mut self, json: &serde_json::Value) -> &mut Self {
        let object: RowMap = match json.as_object() {
            Some(members) => members
                .iter()
                .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                .collect(),
            None => RowMap::new(),
        };
        self.populate_from_object(&object)
    }

    /// Field-name keyed snapshot of every field.
    fn to_record(&self) -> RowMap {
        Self::field_defs()
            .filter_map(|def| self.value(def.name).map(|v| (def.name.to_string(), v)))
            .collect()
    }

    /// Column keyed snapshot of every field.
    fn to_row_object(&self) -> RowMap {
        Self::field_defs()
            .filter_map(|def| self.value(def.name).map(|v| (def.column.to_string(), v)))
            .collect()
    }

    /// JSON object keyed by field name.
    fn to_json(&self) -> OrmResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_record())?)
    }
}

fn populate<R: Record>(
    record: &mut R,
    source: &RowMap,
    key: impl Fn(&FieldDef) -> &'static str,
) {
    for def in R::field_defs() {
        let Some(raw) = source.get(key(def)) else {
            continue;
        };
        match raw.coerce(def.kind) {
            // NULL into a non-nullable field keeps the current value.
            Some(Value::Null) if !def.nullable => {}
            Some(value) => {
                if !record.set_value(def.name, value) {
                    warn_mismatch::<R>(def, raw);
                }
            }
            None => warn_mismatch::<R>(def, raw),
        }
    }
}

fn warn_mismatch<R: Record>(def: &FieldDef, raw: &Value) {
    tracing::warn!(
        target: "pgdao.record",
        table = R::TABLE,
        field = def.name,
        expected = ?def.kind,
        received = raw.type_name(),
        "type mismatch; keeping previous value"
    );
}
