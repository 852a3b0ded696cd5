use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::executor::execute_workflow;
use crate::models::workflow::TriggerType;
use crate::models::workflow_execution::WorkflowExecution;
use crate::state::AppState;

/// Fans a domain event out to every active workflow the tenant has
/// registered for that trigger, in priority order (ties broken by creation
/// order).
///
/// Workflows are isolated from each other: one failing run is logged and
/// recorded against its own workflow but never stops the rest of the batch.
/// The returned list therefore contains only the successful (completed or
/// skipped) executions.
pub async fn trigger_workflows_by_event(
    state: &AppState,
    tenant_id: Uuid,
    trigger_type: TriggerType,
    data: &Value,
) -> Result<Vec<WorkflowExecution>, sqlx::Error> {
    let workflows = state
        .workflow_repo
        .list_active_by_trigger(tenant_id, trigger_type)
        .await?;
    info!(%tenant_id, %trigger_type, matched = workflows.len(), "dispatching event");

    let mut executions = Vec::with_capacity(workflows.len());
    for workflow in workflows {
        match execute_workflow(state, workflow.id, data.clone()).await {
            Ok(execution) => executions.push(execution),
            Err(err) => {
                error!(
                    workflow_id = %workflow.id,
                    %trigger_type,
                    error = %err,
                    "workflow trigger error"
                );
            }
        }
    }
    Ok(executions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{InMemoryLeadRepository, InMemoryWorkflowRepository};
    use crate::engine::test_support::{build_state, sample_lead, sample_workflow};
    use crate::models::workflow::{ActionDescriptor, ActionKind, WorkflowStatus};
    use crate::models::workflow_execution::ExecutionStatus;
    use crate::services::whatsapp::MockWhatsAppGateway;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn one_failing_workflow_does_not_stop_the_batch() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;

        // Higher priority, runs first, fails: its lead lookup points at a
        // lead that exists but the gateway rejects the send.
        let failing = sample_workflow(
            tenant_id,
            TriggerType::MessageReceived,
            WorkflowStatus::Active,
            10,
            vec![],
            vec![ActionDescriptor {
                kind: ActionKind::SendWhatsappMessage,
                config: json!({ "message": "hi" }),
            }],
        );
        let succeeding = sample_workflow(
            tenant_id,
            TriggerType::MessageReceived,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![ActionDescriptor {
                kind: ActionKind::UpdateLeadField,
                config: json!({ "field": "status", "value": "engaged" }),
            }],
        );
        let failing_id = failing.id;
        let succeeding_id = succeeding.id;

        let mut gateway = MockWhatsAppGateway::new();
        gateway.expect_send_session_message().times(1).returning(|_, _, _| {
            Err(crate::services::whatsapp::GatewayError::Api {
                status: 503,
                message: "gateway offline".into(),
            })
        });

        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![
            failing, succeeding,
        ]));
        let (state, _) = build_state(
            repo.clone(),
            Arc::new(InMemoryLeadRepository::with_lead(lead)),
            Arc::new(gateway),
            "http://localhost:1",
        );

        let executions = trigger_workflows_by_event(
            &state,
            tenant_id,
            TriggerType::MessageReceived,
            &json!({ "leadId": lead_id.to_string() }),
        )
        .await
        .unwrap();

        // Only the successful run is returned, but both left records and
        // counter updates behind.
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].workflow_id, succeeding_id);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(repo.execution_count(), 2);
        assert_eq!(repo.workflow(failing_id).unwrap().failure_count, 1);
        assert_eq!(repo.workflow(succeeding_id).unwrap().success_count, 1);
    }

    #[tokio::test]
    async fn only_matching_active_workflows_run() {
        let tenant_id = Uuid::new_v4();
        let matching = sample_workflow(
            tenant_id,
            TriggerType::StageChange,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![],
        );
        let wrong_trigger = sample_workflow(
            tenant_id,
            TriggerType::NoReply,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![],
        );
        let inactive = sample_workflow(
            tenant_id,
            TriggerType::StageChange,
            WorkflowStatus::Inactive,
            0,
            vec![],
            vec![],
        );
        let other_tenant = sample_workflow(
            Uuid::new_v4(),
            TriggerType::StageChange,
            WorkflowStatus::Active,
            0,
            vec![],
            vec![],
        );
        let matching_id = matching.id;

        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![
            matching,
            wrong_trigger,
            inactive,
            other_tenant,
        ]));
        let (state, _) = build_state(
            repo.clone(),
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let executions =
            trigger_workflows_by_event(&state, tenant_id, TriggerType::StageChange, &json!({}))
                .await
                .unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].workflow_id, matching_id);
        assert_eq!(repo.execution_count(), 1);
    }

    #[tokio::test]
    async fn message_received_event_runs_the_full_pipeline() {
        let tenant_id = Uuid::new_v4();
        let lead = sample_lead(tenant_id);
        let lead_id = lead.id;
        let number = lead.whatsapp_number.clone();

        let workflow = sample_workflow(
            tenant_id,
            TriggerType::MessageReceived,
            WorkflowStatus::Active,
            0,
            vec![crate::models::workflow::ConditionClause {
                field: "message".into(),
                operator: crate::models::workflow::Operator::Contains,
                value: serde_json::json!("price"),
            }],
            vec![
                ActionDescriptor {
                    kind: ActionKind::SendWhatsappMessage,
                    config: json!({ "message": "Our pricing starts at $49/mo." }),
                },
                ActionDescriptor {
                    kind: ActionKind::UpdateLeadField,
                    config: json!({ "field": "status", "value": "engaged" }),
                },
            ],
        );
        let workflow_id = workflow.id;

        let mut gateway = MockWhatsAppGateway::new();
        gateway
            .expect_send_session_message()
            .withf(move |tid, to, body| {
                *tid == tenant_id && to == number && body.contains("$49")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![workflow]));
        let leads = Arc::new(InMemoryLeadRepository::with_lead(lead));
        let (state, _) = build_state(repo.clone(), leads.clone(), Arc::new(gateway), "http://localhost:1");

        let executions = trigger_workflows_by_event(
            &state,
            tenant_id,
            TriggerType::MessageReceived,
            &json!({
                "leadId": lead_id.to_string(),
                "message": "what is the price of the pro plan?"
            }),
        )
        .await
        .unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(executions[0].execution_log.0.len(), 2);
        assert_eq!(
            leads.lead(lead_id).unwrap().status.as_deref(),
            Some("engaged")
        );
        assert_eq!(repo.workflow(workflow_id).unwrap().success_count, 1);
    }

    #[tokio::test]
    async fn higher_priority_workflows_run_first() {
        let tenant_id = Uuid::new_v4();
        let low = sample_workflow(
            tenant_id,
            TriggerType::Manual,
            WorkflowStatus::Active,
            1,
            vec![],
            vec![],
        );
        let high = sample_workflow(
            tenant_id,
            TriggerType::Manual,
            WorkflowStatus::Active,
            5,
            vec![],
            vec![],
        );
        let low_id = low.id;
        let high_id = high.id;

        let repo = Arc::new(InMemoryWorkflowRepository::with_workflows(vec![low, high]));
        let (state, _) = build_state(
            repo,
            Arc::new(InMemoryLeadRepository::default()),
            Arc::new(MockWhatsAppGateway::new()),
            "http://localhost:1",
        );

        let executions =
            trigger_workflows_by_event(&state, tenant_id, TriggerType::Manual, &json!({}))
                .await
                .unwrap();

        assert_eq!(
            executions
                .iter()
                .map(|e| e.workflow_id)
                .collect::<Vec<_>>(),
            vec![high_id, low_id]
        );
    }
}
