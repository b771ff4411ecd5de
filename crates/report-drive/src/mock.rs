//! Scripted [`HttpTransport`] for offline tests.
//!
//! A rule matches when the method is equal and the request URL, with its
//! query string removed, ends with the rule's pattern. Rules are checked in
//! the order they were added. Each rule replays its queued outcomes in order
//! and keeps repeating the last one. Unmatched requests get a Graph-style 404.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

const NOT_FOUND_BODY: &str = r#"{"error":{"code":"itemNotFound","message":"mock: no rule"}}"#;

#[derive(Debug, Clone)]
enum Outcome {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Debug)]
struct Rule {
    method: String,
    pattern: String,
    outcomes: VecDeque<Outcome>,
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    rules: Mutex<Vec<Rule>>,
    history: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, pattern: &str, status: u16, body: &str) -> &Self {
        self.push(
            method,
            pattern,
            Outcome::Respond(HttpResponse {
                status,
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            }),
        );
        self
    }

    pub fn fail(&self, method: &str, pattern: &str, message: &str) -> &Self {
        self.push(method, pattern, Outcome::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// `METHOD url` lines, handy for asserting call order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|call| format!("{} {}", call.method, call.url))
            .collect()
    }

    pub fn count(&self, method: &str, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method && url_matches(&call.url, pattern))
            .count()
    }

    fn push(&self, method: &str, pattern: &str, outcome: Outcome) {
        let Ok(mut rules) = self.rules.lock() else {
            return;
        };
        if let Some(rule) = rules
            .iter_mut()
            .find(|rule| rule.method == method && rule.pattern == pattern)
        {
            rule.outcomes.push_back(outcome);
            return;
        }
        rules.push(Rule {
            method: method.to_string(),
            pattern: pattern.to_string(),
            outcomes: VecDeque::from([outcome]),
        });
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut history) = self.history.lock() {
            history.push(request.clone());
        }
        let outcome = {
            let mut rules = self
                .rules
                .lock()
                .map_err(|_| TransportError::Io("mock rules poisoned".into()))?;
            rules
                .iter_mut()
                .find(|rule| {
                    rule.method == request.method && url_matches(&request.url, &rule.pattern)
                })
                .and_then(|rule| {
                    if rule.outcomes.len() > 1 {
                        rule.outcomes.pop_front()
                    } else {
                        rule.outcomes.front().cloned()
                    }
                })
        };
        match outcome {
            Some(Outcome::Respond(resp)) => Ok(resp),
            Some(Outcome::Fail(message)) => Err(TransportError::Io(message)),
            None => Ok(HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: NOT_FOUND_BODY.as_bytes().to_vec(),
            }),
        }
    }
}

fn url_matches(url: &str, pattern: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url);
    path.ends_with(pattern)
}
