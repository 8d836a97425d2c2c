//! Fixtures shared by the unit tests: two mapped records and a scripted executor.

use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::value::{RowMap, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

crate::record! {
    pub struct User in "users" {
        pub name: String => "user_name",
        pub email: Option<String> => "email",
        pub age: i32 => "age",
        pub name_upper: String => "name_upper" as "UPPER(user_name)",
    }
}

crate::record! {
    pub struct Order in "orders" {
        pub user_id: String => "user_id",
        pub total: f64 => "total",
        pub status: String => "status",
    }
}

pub fn row(cells: &[(&str, Value)]) -> RowMap {
    cells
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Records every statement it receives and answers from a script.
///
/// Once the script runs out every call returns an empty row set.
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    script: Mutex<VecDeque<OrmResult<Option<Vec<RowMap>>>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(self, rows: Vec<RowMap>) -> Self {
        self.push(Ok(Some(rows)))
    }

    pub fn no_result(self) -> Self {
        self.push(Ok(None))
    }

    pub fn fail(self, message: &str) -> Self {
        self.push(Err(OrmError::Other(message.to_string())))
    }

    fn push(self, answer: OrmResult<Option<Vec<RowMap>>>) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql(&self, idx: usize) -> String {
        self.calls()[idx].0.clone()
    }

    pub fn params(&self, idx: usize) -> Vec<Value> {
        self.calls()[idx].1.clone()
    }
}

impl Executor for ScriptedExecutor {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Option<Vec<RowMap>>> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Some(Vec::new())))
    }
}
