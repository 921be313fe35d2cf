//! # SMS Relay
//!
//! The framework-agnostic prompt / reply / read pipeline.
//!
//! - **Dispatch** sends the option prompt to the configured destination.
//! - **Ingest** turns an inbound reply webhook into an xAPI statement.
//! - **Read** decodes the newest stored answer back to display text.
//! - **Direct send** relays arbitrary text to a caller-chosen number.
//!
//! The record store is the only state shared between the three; nothing is
//! kept in process beyond the immutable [`RelaySettings`].

use time::OffsetDateTime;
use xapi_lrs::{
    language_map, Activity, Agent, Context, Statement, StatementQuery, StatementResult, Verb,
};

pub mod options;
pub mod processor;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;

pub use options::{
    default_options, normalize_reply, Decoded, OptionTable, ReplyOption, NO_RESPONSE,
    UNKNOWN_RESPONSE,
};
pub use processor::{LatestResponse, RecordedReply, RelayError, RelayProcessor};

/// xAPI verb for an answered prompt.
pub const ANSWERED_VERB: &str = "http://adlnet.gov/expapi/verbs/answered";

/// Everything the pipeline needs that does not change per request.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Phone number the prompt is sent to.
    pub destination: String,
    /// Phone number the prompt is sent from.
    pub sender: String,
    /// First line of the prompt, before the options.
    pub prompt_intro: String,
    pub options: OptionTable,
    pub statement: StatementTemplate,
    /// Text relayed back to the replier; empty for a silent acknowledgment.
    pub acknowledgment: String,
    /// Public URL of the reply webhook, used for signature checks.
    pub webhook_url: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            destination: String::new(),
            sender: String::new(),
            prompt_intro: "Your learner just started a course. Reply with one letter:".into(),
            options: OptionTable::default(),
            statement: StatementTemplate::default(),
            acknowledgment: "Thanks! Your reply has been recorded.".into(),
            webhook_url: String::new(),
        }
    }
}

/// Fixed parts of every statement the relay writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub actor_name: String,
    pub actor_mbox: String,
    pub verb_id: String,
    pub verb_display: String,
    pub activity_id: String,
    pub activity_name: String,
    /// Parent activity for `context.contextActivities`; omitted when empty.
    pub parent_activity_id: String,
}

impl Default for StatementTemplate {
    fn default() -> Self {
        Self {
            actor_name: "Parent".into(),
            actor_mbox: "mailto:parent@example.com".into(),
            verb_id: ANSWERED_VERB.into(),
            verb_display: "answered".into(),
            activity_id: "https://example.com/activities/parent-check-in".into(),
            activity_name: "Parent check-in".into(),
            parent_activity_id: "https://example.com/courses/intro".into(),
        }
    }
}

impl StatementTemplate {
    /// A fresh statement recording `code` as the answer.
    pub fn build(&self, code: &str, timestamp: OffsetDateTime) -> Statement {
        let context = (!self.parent_activity_id.is_empty())
            .then(|| Context::with_parent(Activity::new(&self.parent_activity_id)));
        Statement {
            id: Some(uuid::Uuid::new_v4()),
            actor: Agent::new(&self.actor_name, &self.actor_mbox),
            verb: Verb {
                id: self.verb_id.clone(),
                display: language_map("en-US", &self.verb_display),
            },
            object: Activity::named(&self.activity_id, &self.activity_name),
            result: Some(StatementResult {
                response: Some(code.to_string()),
            }),
            context,
            timestamp: Some(timestamp),
        }
    }

    /// Query for the newest statement this template produces.
    pub fn latest_query(&self) -> StatementQuery {
        StatementQuery::latest(&self.verb_id).for_activity(&self.activity_id)
    }
}
