#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use statsboard_client::{FetchError, StatsApi};
use statsboard_core::query::Query;

#[derive(Debug, Clone)]
pub struct Call {
    pub path: String,
    pub query: String,
    pub extra: Vec<(String, String)>,
}

/// Scripted stand-in for the stats API.
///
/// Unless a payload is queued for a path, every call answers with one row
/// named after the query's period, so tests can tell which request won.
#[derive(Default)]
pub struct FakeApi {
    queued: Mutex<HashMap<String, VecDeque<Value>>>,
    failing: Mutex<HashSet<String>>,
    skip_imported_reason: Mutex<Option<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue(&self, path: &str, payload: Value) {
        self.queued
            .lock()
            .expect("lock")
            .entry(path.to_string())
            .or_default()
            .push_back(payload);
    }

    pub fn fail(&self, path: &str) {
        self.failing.lock().expect("lock").insert(path.to_string());
    }

    pub fn skip_imported(&self, reason: &str) {
        *self.skip_imported_reason.lock().expect("lock") = Some(reason.to_string());
    }

    /// Hold the next call for `query` until the returned gate is notified.
    pub fn gate(&self, query: &Query) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .expect("lock")
            .insert(query.to_query_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("lock").clone()
    }

    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().expect("lock").len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl StatsApi for FakeApi {
    async fn get(
        &self,
        path: &str,
        query: &Query,
        extra_params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let key = query.to_query_string();
        self.calls.lock().expect("lock").push(Call {
            path: path.to_string(),
            query: key.clone(),
            extra: extra_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        let gate = self.gates.lock().expect("lock").remove(&key);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().expect("lock").contains(path) {
            return Err(FetchError::Status {
                status: 500,
                message: "boom".to_string(),
            });
        }

        let queued = self
            .queued
            .lock()
            .expect("lock")
            .get_mut(path)
            .and_then(VecDeque::pop_front);
        if let Some(payload) = queued {
            return Ok(payload);
        }

        let mut payload = json!({
            "results": [{ "name": query.period.as_str(), "visitors": 1 }]
        });
        if let Some(reason) = self.skip_imported_reason.lock().expect("lock").clone() {
            payload["skip_imported_reason"] = Value::String(reason);
        }
        Ok(payload)
    }
}

pub fn rows(count: usize) -> Value {
    let results: Vec<Value> = (0..count)
        .map(|i| json!({ "name": format!("value-{i}"), "visitors": 1, "events": 2, "percentage": 1.0 }))
        .collect();
    json!({ "results": results })
}
