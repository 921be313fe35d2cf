//! The subset of the xAPI statement model the relay reads and writes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Language map, e.g. `{"en-US": "answered"}`.
pub type LanguageMap = BTreeMap<String, String>;

pub fn language_map(lang: &str, text: &str) -> LanguageMap {
    let mut map = LanguageMap::new();
    map.insert(lang.to_string(), text.to_string());
    map
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub actor: Agent,
    pub verb: Verb,
    pub object: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StatementResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<OffsetDateTime>,
}

impl Statement {
    /// `result.response`, if the statement carries one.
    pub fn response(&self) -> Option<&str> {
        self.result.as_ref()?.response.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    #[serde(rename = "objectType", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mbox: Option<String>,
}

impl Agent {
    pub fn new(name: &str, mbox: &str) -> Self {
        let mbox = if mbox.starts_with("mailto:") {
            mbox.to_string()
        } else {
            format!("mailto:{}", mbox)
        };
        Self {
            object_type: Some("Agent".into()),
            name: Some(name.to_string()),
            mbox: Some(mbox),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Verb {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display: LanguageMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    #[serde(rename = "objectType", default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<ActivityDefinition>,
}

impl Activity {
    pub fn new(id: &str) -> Self {
        Self {
            object_type: Some("Activity".into()),
            id: id.to_string(),
            definition: None,
        }
    }

    pub fn named(id: &str, name: &str) -> Self {
        Self {
            definition: Some(ActivityDefinition {
                name: language_map("en-US", name),
            }),
            ..Self::new(id)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityDefinition {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name: LanguageMap,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatementResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Context {
    #[serde(
        rename = "contextActivities",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub context_activities: Option<ContextActivities>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextActivities {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent: Vec<Activity>,
}

impl Context {
    pub fn with_parent(activity: Activity) -> Self {
        Self {
            context_activities: Some(ContextActivities {
                parent: vec![activity],
            }),
        }
    }
}

/// Body of `GET /statements`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementPage {
    pub statements: Vec<Statement>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_xapi_field_names() {
        let statement = Statement {
            id: None,
            actor: Agent::new("Parent", "parent@example.com"),
            verb: Verb {
                id: "http://adlnet.gov/expapi/verbs/answered".into(),
                display: language_map("en-US", "answered"),
            },
            object: Activity::named("https://example.com/activities/prompt", "Prompt"),
            result: Some(StatementResult {
                response: Some("B".into()),
            }),
            context: Some(Context::with_parent(Activity::new(
                "https://example.com/courses/1",
            ))),
            timestamp: None,
        };
        let value = serde_json::to_value(&statement).unwrap();
        assert_eq!(value["actor"]["objectType"], "Agent");
        assert_eq!(value["actor"]["mbox"], "mailto:parent@example.com");
        assert_eq!(value["verb"]["display"]["en-US"], "answered");
        assert_eq!(value["object"]["definition"]["name"]["en-US"], "Prompt");
        assert_eq!(value["result"]["response"], "B");
        assert_eq!(
            value["context"]["contextActivities"]["parent"][0]["id"],
            "https://example.com/courses/1"
        );
        assert!(value.get("id").is_none());
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn reads_store_statement_with_extra_fields() {
        let value = json!({
            "id": "6690e6c9-3ef0-4ed3-8b37-7f3964730bee",
            "actor": { "mbox": "mailto:parent@example.com" },
            "verb": { "id": "http://adlnet.gov/expapi/verbs/answered" },
            "object": { "id": "https://example.com/activities/prompt" },
            "result": { "response": "C", "success": true },
            "timestamp": "2024-05-01T10:00:00.000Z",
            "stored": "2024-05-01T10:00:00.123Z",
            "authority": { "mbox": "mailto:lrs@example.com" },
            "version": "1.0.0"
        });
        let statement: Statement = serde_json::from_value(value).unwrap();
        assert_eq!(statement.response(), Some("C"));
        assert!(statement.timestamp.is_some());
        assert!(statement.id.is_some());
    }

    #[test]
    fn agent_keeps_existing_mailto() {
        let agent = Agent::new("P", "mailto:p@example.com");
        assert_eq!(agent.mbox.as_deref(), Some("mailto:p@example.com"));
    }
}
