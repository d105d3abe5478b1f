//! In-memory `Transport` for unit tests: canned responses matched by method, path
//! and a few key/value pairs (query params or top-level body fields), plus a log
//! of every call made.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::ExchangeError;
use crate::transport::Transport;
use crate::utils::as_id;

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    fn field(&self, key: &str) -> Option<String> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| {
                self.body
                    .as_ref()
                    .and_then(|b| b.get(key))
                    .and_then(|v| match v {
                        Value::Bool(b) => Some(b.to_string()),
                        other => as_id(other),
                    })
            })
    }
}

struct Route {
    method: Method,
    path: String,
    matchers: Vec<(String, String)>,
    /// Served in order; the last one repeats.
    responses: VecDeque<Result<Value, ExchangeError>>,
}

#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &self,
        method: Method,
        path: &str,
        matchers: &[(&str, &str)],
        response: Result<Value, ExchangeError>,
    ) -> &Self {
        let matchers: Vec<(String, String)> = matchers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut routes = self.routes.lock().unwrap();
        if let Some(r) = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path && r.matchers == matchers)
        {
            r.responses.push_back(response);
        } else {
            routes.push(Route {
                method,
                path: path.to_string(),
                matchers,
                responses: VecDeque::from([response]),
            });
        }
        self
    }

    pub fn ok(&self, method: Method, path: &str, matchers: &[(&str, &str)], result: Value) -> &Self {
        self.on(method, path, matchers, Ok(result))
    }

    pub fn fail(
        &self,
        method: Method,
        path: &str,
        matchers: &[(&str, &str)],
        err: ExchangeError,
    ) -> &Self {
        self.on(method, path, matchers, Err(err))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, ExchangeError> {
        let call = Call {
            method: method.clone(),
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body,
        };
        self.calls.lock().unwrap().push(call.clone());

        let mut routes = self.routes.lock().unwrap();
        // Most specific route wins.
        let route = routes
            .iter_mut()
            .filter(|r| r.method == method && r.path == path)
            .filter(|r| {
                r.matchers
                    .iter()
                    .all(|(k, v)| call.field(k).as_deref() == Some(v.as_str()))
            })
            .max_by_key(|r| r.matchers.len());
        match route {
            Some(r) if r.responses.len() > 1 => r.responses.pop_front().unwrap(),
            Some(r) => r.responses.front().cloned().unwrap(),
            None => Err(ExchangeError::Status {
                status: 404,
                message: format!("no scripted response for {} {}", method, path),
            }),
        }
    }
}
