use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::workflow::{ActionDescriptor, ActionKind};
use crate::services::webhook::WebhookError;
use crate::services::whatsapp::GatewayError;
use crate::state::AppState;

const DEFAULT_DELAY_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("trigger data has no resolvable lead id")]
    MissingLead,
    #[error("lead {0} not found")]
    LeadNotFound(Uuid),
    #[error("invalid action config: {0}")]
    Config(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Runs a single workflow action and returns its result payload, which the
/// engine appends to the execution log. Any `Err` aborts the run at this
/// action.
pub async fn execute_action(
    state: &AppState,
    tenant_id: Uuid,
    action: &ActionDescriptor,
    trigger_data: &Value,
) -> Result<Value, ActionError> {
    match action.kind {
        ActionKind::SendWhatsappMessage => {
            send_whatsapp_message(state, tenant_id, action, trigger_data).await
        }
        ActionKind::AssignRep => assign_rep(state, action, trigger_data).await,
        ActionKind::UpdateLeadField => update_lead_field(state, action, trigger_data).await,
        ActionKind::TriggerWebhook => trigger_webhook(state, tenant_id, action, trigger_data).await,
        ActionKind::Delay => delay(action).await,
        ActionKind::Unknown => {
            // Logged no-op rather than an abort, so a workflow authored
            // against a newer action set still runs its remaining steps.
            warn!("Unknown action type");
            Ok(json!({ "success": false, "message": "Unknown action type" }))
        }
    }
}

/// Pulls the lead id out of the trigger data. Event producers attach it as
/// a `leadId` string at the top level.
fn lead_id_from(trigger_data: &Value) -> Option<Uuid> {
    trigger_data
        .get("leadId")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn config_str<'a>(action: &'a ActionDescriptor, key: &str) -> Option<&'a str> {
    action.config.get(key).and_then(Value::as_str)
}

async fn send_whatsapp_message(
    state: &AppState,
    tenant_id: Uuid,
    action: &ActionDescriptor,
    trigger_data: &Value,
) -> Result<Value, ActionError> {
    let lead_id = lead_id_from(trigger_data).ok_or(ActionError::MissingLead)?;
    let lead = state
        .leads
        .find_lead(lead_id)
        .await?
        .ok_or(ActionError::LeadNotFound(lead_id))?;

    let message = config_str(action, "message").unwrap_or_default();
    state
        .whatsapp
        .send_session_message(tenant_id, &lead.whatsapp_number, message)
        .await?;

    info!(%lead_id, "workflow sent WhatsApp message");
    Ok(json!({ "success": true, "action": "message_sent" }))
}

async fn assign_rep(
    state: &AppState,
    action: &ActionDescriptor,
    trigger_data: &Value,
) -> Result<Value, ActionError> {
    let lead_id = lead_id_from(trigger_data).ok_or(ActionError::MissingLead)?;
    let user_id = config_str(action, "userId")
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ActionError::Config("assign_rep requires a `userId` uuid".into()))?;

    state.leads.set_assigned_rep(lead_id, user_id).await?;
    Ok(json!({ "success": true, "action": "rep_assigned" }))
}

async fn update_lead_field(
    state: &AppState,
    action: &ActionDescriptor,
    trigger_data: &Value,
) -> Result<Value, ActionError> {
    let lead_id = lead_id_from(trigger_data).ok_or(ActionError::MissingLead)?;
    let field = config_str(action, "field")
        .ok_or_else(|| ActionError::Config("update_lead_field requires a `field` name".into()))?;
    let value = action.config.get("value").cloned().unwrap_or(Value::Null);

    state.leads.update_lead_field(lead_id, field, &value).await?;
    Ok(json!({ "success": true, "action": "field_updated" }))
}

async fn trigger_webhook(
    state: &AppState,
    tenant_id: Uuid,
    action: &ActionDescriptor,
    trigger_data: &Value,
) -> Result<Value, ActionError> {
    let event_type = config_str(action, "eventType")
        .ok_or_else(|| ActionError::Config("trigger_webhook requires an `eventType`".into()))?;

    state
        .webhooks
        .send_webhook(tenant_id, event_type, trigger_data)
        .await?;
    Ok(json!({ "success": true, "action": "webhook_triggered" }))
}

async fn delay(action: &ActionDescriptor) -> Result<Value, ActionError> {
    let duration_ms = action
        .config
        .get("delayMs")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_DELAY_MS);
    sleep(Duration::from_millis(duration_ms)).await;
    Ok(json!({ "success": true, "action": "delayed", "duration": duration_ms }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{InMemoryLeadRepository, InMemoryWorkflowRepository};
    use crate::engine::test_support::{build_state, sample_lead};
    use crate::services::whatsapp::MockWhatsAppGateway;
    use serde_json::json;
    use std::sync::Arc;

    fn descriptor(kind: ActionKind, config: Value) -> ActionDescriptor {
        ActionDescriptor { kind, config }
    }

    #[tokio::test]
    async fn unknown_action_reports_failure_without_erroring() {
        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let action = descriptor(ActionKind::Unknown, Value::Null);

        let result = execute_action(&state, Uuid::new_v4(), &action, &json!({}))
            .await
            .unwrap();
        assert_eq!(result["success"], json!(false));
        assert_eq!(result["message"], json!("Unknown action type"));
    }

    #[tokio::test]
    async fn delay_reports_the_duration_it_slept() {
        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let action = descriptor(ActionKind::Delay, json!({ "delayMs": 5 }));

        let result = execute_action(&state, Uuid::new_v4(), &action, &json!({}))
            .await
            .unwrap();
        assert_eq!(result["action"], json!("delayed"));
        assert_eq!(result["duration"], json!(5));
    }

    #[tokio::test]
    async fn send_whatsapp_message_targets_the_lead_number() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;
        let number = lead.whatsapp_number.clone();

        let mut gateway = MockWhatsAppGateway::new();
        gateway
            .expect_send_session_message()
            .withf(move |tid, to, body| {
                *tid == tenant_id && to == number && body == "Welcome aboard!"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::with_lead(lead)),
            Arc::new(gateway),
            "http://localhost:1",
        );
        let action = descriptor(
            ActionKind::SendWhatsappMessage,
            json!({ "message": "Welcome aboard!" }),
        );
        let trigger_data = json!({ "leadId": lead_id.to_string() });

        let result = execute_action(&state, tenant_id, &action, &trigger_data)
            .await
            .unwrap();
        assert_eq!(result["action"], json!("message_sent"));
    }

    #[tokio::test]
    async fn send_whatsapp_message_fails_for_missing_lead() {
        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let ghost = Uuid::new_v4();
        let action = descriptor(ActionKind::SendWhatsappMessage, json!({ "message": "hi" }));
        let trigger_data = json!({ "leadId": ghost.to_string() });

        let err = execute_action(&state, Uuid::new_v4(), &action, &trigger_data)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::LeadNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn assign_rep_writes_assigned_to() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;
        let leads = Arc::new(InMemoryLeadRepository::with_lead(lead));
        let rep = Uuid::new_v4();

        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            leads.clone(),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let action = descriptor(ActionKind::AssignRep, json!({ "userId": rep.to_string() }));
        let trigger_data = json!({ "leadId": lead_id.to_string() });

        let result = execute_action(&state, tenant_id, &action, &trigger_data)
            .await
            .unwrap();
        assert_eq!(result["action"], json!("rep_assigned"));
        assert_eq!(leads.lead(lead_id).unwrap().assigned_to, Some(rep));
    }

    #[tokio::test]
    async fn update_lead_field_handles_custom_fields() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;
        let leads = Arc::new(InMemoryLeadRepository::with_lead(lead));

        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            leads.clone(),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let action = descriptor(
            ActionKind::UpdateLeadField,
            json!({ "field": "budget", "value": 25_000 }),
        );
        let trigger_data = json!({ "leadId": lead_id.to_string() });

        execute_action(&state, tenant_id, &action, &trigger_data)
            .await
            .unwrap();
        let stored = leads.lead(lead_id).unwrap();
        assert_eq!(stored.custom_fields.0["budget"], json!(25_000));
    }

    #[tokio::test]
    async fn update_lead_field_requires_a_field_name() {
        let (state, _) = build_state(
            Arc::new(InMemoryWorkflowRepository::default()),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );
        let action = descriptor(ActionKind::UpdateLeadField, json!({ "value": "x" }));
        let trigger_data = json!({ "leadId": Uuid::new_v4().to_string() });

        let err = execute_action(&state, Uuid::new_v4(), &action, &trigger_data)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Config(_)));
    }
}
