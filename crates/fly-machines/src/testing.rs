//! Scripted in-memory transport for orchestrator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fly_api::{Method, RawResponse, StatusCode, Transport};
use serde_json::{Value, json};
use tracing::Subscriber;
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Replies from per-route queues; the last queued reply for a route repeats.
/// Unscripted routes answer 501 so a test notices the stray call.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<RawResponse>>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(RawResponse::new(status, body.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(Call::label).collect()
    }

    pub fn labels_for(&self, machine_id: &str) -> Vec<String> {
        let needle = format!("/machines/{machine_id}");
        self.labels()
            .into_iter()
            .filter(|label| label.contains(&needle))
            .collect()
    }

    fn reply(&self, call: Call) -> RawResponse {
        let key = (call.method.clone(), call.path.clone());
        self.calls.lock().unwrap().push(call);

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => RawResponse::new(StatusCode::NOT_IMPLEMENTED, "unscripted"),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> fly_api::Result<RawResponse> {
        Ok(self.reply(Call {
            method: Method::GET,
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body: None,
        }))
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> fly_api::Result<RawResponse> {
        Ok(self.reply(Call {
            method: Method::POST,
            path: path.to_string(),
            query: Vec::new(),
            body: body.cloned(),
        }))
    }

    async fn delete(&self, path: &str) -> fly_api::Result<RawResponse> {
        Ok(self.reply(Call {
            method: Method::DELETE,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }))
    }
}

/// Layer recording every new span's name together with its parent's name.
#[derive(Clone, Default)]
pub struct SpanTree(Arc<Mutex<Vec<(String, Option<String>)>>>);

impl SpanTree {
    pub fn parents_of(&self, name: &str) -> Vec<Option<String>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(span, _)| span == name)
            .map(|(_, parent)| parent.clone())
            .collect()
    }
}

impl<S> Layer<S> for SpanTree
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            let parent = span.parent().map(|p| p.name().to_string());
            self.0.lock().unwrap().push((span.name().to_string(), parent));
        }
    }
}

pub fn machine_json(id: &str, state: &str, region: &str) -> Value {
    json!({
        "id": id,
        "name": format!("machine-{id}"),
        "state": state,
        "region": region,
        "instance_id": format!("inst-{id}"),
        "private_ip": "fdaa:0:1::2",
        "config": {
            "image": "registry.fly.io/demo:latest",
            "guest": { "cpus": 1, "cpu_kind": "shared", "memory_mb": 256 },
            "env": { "PORT": "8080" },
            "services": [
                { "protocol": "tcp", "internal_port": 8080, "ports": [{ "port": 443, "handlers": ["tls", "http"] }] }
            ],
            "checks": {
                "alive": { "type": "tcp", "port": 8080, "interval": "15s", "timeout": "10s" }
            },
            "dns": { "skip_registration": true }
        },
        "created_at": "2024-03-01T12:00:00Z",
        "updated_at": "2024-03-01T12:05:00Z"
    })
}
