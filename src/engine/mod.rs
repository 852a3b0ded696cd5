pub mod actions;
pub mod conditions;
pub mod dispatcher;
pub mod executor;

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::{json, Value};
    use sqlx::types::Json;
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::db::mock_db::{
        InMemoryLeadRepository, InMemoryWebhookLogRepository, InMemoryWorkflowRepository,
    };
    use crate::models::lead::Lead;
    use crate::models::workflow::{
        ActionDescriptor, ConditionClause, TriggerType, Workflow, WorkflowStatus,
    };
    use crate::services::webhook::WebhookService;
    use crate::services::whatsapp::WhatsAppGateway;
    use crate::state::AppState;

    pub(crate) fn build_state(
        workflow_repo: Arc<InMemoryWorkflowRepository>,
        leads: Arc<InMemoryLeadRepository>,
        whatsapp: Arc<dyn WhatsAppGateway>,
        webhook_base_url: &str,
    ) -> (AppState, Arc<InMemoryWebhookLogRepository>) {
        let webhook_repo = Arc::new(InMemoryWebhookLogRepository::default());
        let client = Arc::new(reqwest::Client::new());
        let config = Arc::new(Config {
            database_url: String::new(),
            frontend_origin: "http://localhost:3000".into(),
            webhook_base_url: webhook_base_url.to_string(),
            webhook_secret: "test-webhook-secret".into(),
            webhook_max_retries: 3,
            whatsapp_api_base_url: "http://localhost:1".into(),
            whatsapp_api_key: "test-key".into(),
        });
        let webhooks = WebhookService::new(
            webhook_repo.clone(),
            client,
            config.webhook_base_url.clone(),
            config.webhook_secret.clone(),
            config.webhook_max_retries,
        );
        let state = AppState {
            workflow_repo,
            leads,
            whatsapp,
            webhooks,
            config,
        };
        (state, webhook_repo)
    }

    pub(crate) fn sample_workflow(
        tenant_id: Uuid,
        trigger_type: TriggerType,
        status: WorkflowStatus,
        priority: i32,
        conditions: Vec<ConditionClause>,
        actions: Vec<ActionDescriptor>,
    ) -> Workflow {
        let now = OffsetDateTime::now_utc();
        Workflow {
            id: Uuid::new_v4(),
            tenant_id,
            name: "test workflow".into(),
            description: None,
            trigger_type,
            trigger_config: Json(json!({})),
            conditions: Json(conditions),
            actions: Json(actions),
            status,
            priority,
            execution_count: 0,
            success_count: 0,
            failure_count: 0,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn sample_lead(tenant_id: Uuid) -> Lead {
        let now = OffsetDateTime::now_utc();
        Lead {
            id: Uuid::new_v4(),
            tenant_id,
            whatsapp_number: "15551230000".into(),
            name: Some("Ada Q. Lead".into()),
            email: None,
            company: None,
            status: Some("new".into()),
            assigned_to: None,
            custom_fields: Json(Value::Object(serde_json::Map::new())),
            created_at: now,
            updated_at: now,
        }
    }
}
