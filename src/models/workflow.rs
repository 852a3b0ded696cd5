use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Domain event category a workflow subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "trigger_type", rename_all = "snake_case")]
pub enum TriggerType {
    MessageReceived,
    NoReply,
    StageChange,
    QualificationComplete,
    Manual,
    Scheduled,
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_received" => Ok(TriggerType::MessageReceived),
            "no_reply" => Ok(TriggerType::NoReply),
            "stage_change" => Ok(TriggerType::StageChange),
            "qualification_complete" => Ok(TriggerType::QualificationComplete),
            "manual" => Ok(TriggerType::Manual),
            "scheduled" => Ok(TriggerType::Scheduled),
            other => Err(format!("unknown trigger type: {other}")),
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerType::MessageReceived => "message_received",
            TriggerType::NoReply => "no_reply",
            TriggerType::StageChange => "stage_change",
            TriggerType::QualificationComplete => "qualification_complete",
            TriggerType::Manual => "manual",
            TriggerType::Scheduled => "scheduled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "workflow_status", rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Inactive,
}

/// Comparison operator for a condition clause. `Unknown` is a deliberate
/// fail-open variant: clauses carrying an operator this version does not
/// recognize are treated as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
    #[serde(other)]
    Unknown,
}

/// A single declarative comparison gating workflow execution:
/// `field operator value`, where `field` is a dot path into the trigger data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// Side-effecting step kind. `Unknown` executes as a logged no-op so a
/// workflow authored against a newer action set does not abort mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendWhatsappMessage,
    AssignRep,
    UpdateLeadField,
    TriggerWebhook,
    Delay,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Workflow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    pub trigger_config: Json<Value>,
    pub conditions: Json<Vec<ConditionClause>>,
    pub actions: Json<Vec<ActionDescriptor>>,
    pub status: WorkflowStatus,
    pub priority: i32,
    pub execution_count: i32,
    pub success_count: i32,
    pub failure_count: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_executed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub description: Option<String>,
    pub trigger_type: TriggerType,
    #[serde(default = "default_trigger_config")]
    pub trigger_config: Value,
    #[serde(default)]
    pub conditions: Vec<ConditionClause>,
    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
    pub status: Option<WorkflowStatus>,
    pub priority: Option<i32>,
}

fn default_trigger_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Partial update payload; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateWorkflow {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger_type: Option<TriggerType>,
    pub trigger_config: Option<Value>,
    pub conditions: Option<Vec<ConditionClause>>,
    pub actions: Option<Vec<ActionDescriptor>>,
    pub status: Option<WorkflowStatus>,
    pub priority: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_in_uses_reserved_word_spelling() {
        let clause: ConditionClause = serde_json::from_value(json!({
            "field": "status",
            "operator": "in",
            "value": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(clause.operator, Operator::In);
    }

    #[test]
    fn unrecognized_operator_deserializes_as_unknown() {
        let clause: ConditionClause = serde_json::from_value(json!({
            "field": "x",
            "operator": "matches_regex",
            "value": ".*"
        }))
        .unwrap();
        assert_eq!(clause.operator, Operator::Unknown);
    }

    #[test]
    fn unrecognized_action_type_deserializes_as_unknown() {
        let action: ActionDescriptor = serde_json::from_value(json!({
            "type": "send_carrier_pigeon",
            "config": {}
        }))
        .unwrap();
        assert_eq!(action.kind, ActionKind::Unknown);
    }

    #[test]
    fn action_config_defaults_to_null_when_absent() {
        let action: ActionDescriptor = serde_json::from_value(json!({"type": "delay"})).unwrap();
        assert_eq!(action.kind, ActionKind::Delay);
        assert!(action.config.is_null());
    }

    #[test]
    fn trigger_type_round_trips_through_str() {
        for raw in [
            "message_received",
            "no_reply",
            "stage_change",
            "qualification_complete",
            "manual",
            "scheduled",
        ] {
            let parsed: TriggerType = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
        assert!("mystery_event".parse::<TriggerType>().is_err());
    }
}
