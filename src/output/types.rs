use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "importer.v1";

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub duration_ms: u128,
}

impl Meta {
    pub fn since(started: Instant) -> Self {
        Self { duration_ms: started.elapsed().as_millis() }
    }
}

/// Stable wrapper around every plan and result printed on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Envelope {
    pub fn plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, Body::Plan(serde_json::to_value(plan)?), meta))
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, Body::Result(serde_json::to_value(result)?), meta))
    }

    fn build(op: &'static str, body: Body, meta: Option<Meta>) -> Self {
        let (apply, plan, result) = match body {
            Body::Plan(v) => (false, Some(v), None),
            Body::Result(v) => (true, None, Some(v)),
        };
        Envelope { schema_version: SCHEMA_VERSION, time: Utc::now(), request_id: Uuid::new_v4(), op, apply, plan, result, meta }
    }
}

enum Body {
    Plan(Value),
    Result(Value),
}
