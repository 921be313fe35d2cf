//! In-memory stand-ins for the SMS provider and the record store.

use async_trait::async_trait;
use sms_core::{SendRequest, SendResponse, SmsClient, SmsError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use xapi_lrs::{LrsError, RecordStore, Statement, StatementQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub from: String,
    pub text: String,
}

/// Records every send; optionally fails with a provider error.
#[derive(Debug, Default)]
pub struct FakeSms {
    failure: Option<String>,
    counter: AtomicUsize,
    sent: Mutex<Vec<SentMessage>>,
}

impl FakeSms {
    pub fn failing(detail: &str) -> Self {
        Self {
            failure: Some(detail.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsClient for FakeSms {
    async fn send(&self, req: SendRequest<'_>) -> Result<SendResponse, SmsError> {
        if let Some(detail) = &self.failure {
            return Err(SmsError::Provider(detail.clone()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(SentMessage {
            to: req.to.to_string(),
            from: req.from.to_string(),
            text: req.text.to_string(),
        });
        Ok(SendResponse {
            id: format!("SM-fake-{}", n),
            to: req.to.to_string(),
            from: req.from.to_string(),
            provider: "fake",
            raw: serde_json::Value::Null,
        })
    }
}

/// Keeps statements in insertion order and answers queries newest first.
#[derive(Debug, Default)]
pub struct MemoryStore {
    fail_writes: bool,
    fail_reads: bool,
    statements: Mutex<Vec<Statement>>,
}

impl MemoryStore {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save_statement(&self, statement: &Statement) -> Result<String, LrsError> {
        if self.fail_writes {
            return Err(LrsError::Store {
                status: 503,
                body: "unavailable".into(),
            });
        }
        let id = statement.id.map(|id| id.to_string()).unwrap_or_default();
        self.statements.lock().unwrap().push(statement.clone());
        Ok(id)
    }

    async fn query_statements(&self, query: &StatementQuery) -> Result<Vec<Statement>, LrsError> {
        if self.fail_reads {
            return Err(LrsError::Http("connection refused".into()));
        }
        let statements = self.statements.lock().unwrap();
        let matching = statements.iter().filter(|s| {
            query.verb.as_ref().is_none_or(|v| &s.verb.id == v)
                && query.activity.as_ref().is_none_or(|a| &s.object.id == a)
        });
        let mut found: Vec<Statement> = if query.ascending {
            matching.cloned().collect()
        } else {
            matching.rev().cloned().collect()
        };
        if let Some(limit) = query.limit {
            found.truncate(limit as usize);
        }
        Ok(found)
    }
}
