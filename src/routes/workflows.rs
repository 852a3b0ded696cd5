use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    engine::executor::{execute_workflow, EngineError},
    models::workflow::{CreateWorkflow, TriggerType, UpdateWorkflow, WorkflowStatus},
    responses::JsonResponse,
    state::AppState,
};

pub async fn create_workflow(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<CreateWorkflow>,
) -> Response {
    match app_state
        .workflow_repo
        .create_workflow(tenant_id, &payload)
        .await
    {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error creating workflow: {:?}", e);
            JsonResponse::server_error("Failed to create workflow").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ListWorkflowsQuery {
    pub status: Option<WorkflowStatus>,
    pub trigger_type: Option<TriggerType>,
}

pub async fn list_workflows(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Response {
    match app_state
        .workflow_repo
        .list_workflows(tenant_id, query.status, query.trigger_type)
        .await
    {
        Ok(workflows) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflows": workflows
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing workflows: {:?}", e);
            JsonResponse::server_error("Failed to fetch workflows").into_response()
        }
    }
}

pub async fn get_workflow(
    State(app_state): State<AppState>,
    Path((tenant_id, workflow_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match app_state
        .workflow_repo
        .find_workflow_for_tenant(tenant_id, workflow_id)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error fetching workflow {}: {:?}", workflow_id, e);
            JsonResponse::server_error("Failed to fetch workflow").into_response()
        }
    }
}

pub async fn update_workflow(
    State(app_state): State<AppState>,
    Path((tenant_id, workflow_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateWorkflow>,
) -> Response {
    match app_state
        .workflow_repo
        .update_workflow(tenant_id, workflow_id, &payload)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error updating workflow {}: {:?}", workflow_id, e);
            JsonResponse::server_error("Failed to update workflow").into_response()
        }
    }
}

pub async fn delete_workflow(
    State(app_state): State<AppState>,
    Path((tenant_id, workflow_id)): Path<(Uuid, Uuid)>,
) -> Response {
    match app_state
        .workflow_repo
        .delete_workflow(tenant_id, workflow_id)
        .await
    {
        Ok(true) => Json(json!({ "success": true })).into_response(),
        Ok(false) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(e) => {
            eprintln!("DB error deleting workflow {}: {:?}", workflow_id, e);
            JsonResponse::server_error("Failed to delete workflow").into_response()
        }
    }
}

/// Manual "run now". A run that started but failed at an action still
/// answers 200 with the failed execution record; only precondition errors
/// (unknown or non-active workflow) answer 400.
pub async fn execute_workflow_now(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    payload: Option<Json<Value>>,
) -> Response {
    let trigger_data = payload.map(|Json(v)| v).unwrap_or_else(|| json!({}));

    match execute_workflow(&app_state, workflow_id, trigger_data).await {
        Ok(execution) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "execution": execution
            })),
        )
            .into_response(),
        Err(EngineError::NotFound(_)) => {
            JsonResponse::bad_request("Workflow not found").into_response()
        }
        Err(EngineError::NotActive(_)) => {
            JsonResponse::bad_request("Workflow is not active").into_response()
        }
        Err(EngineError::Action { execution, .. }) => (
            StatusCode::OK,
            Json(json!({
                "success": false,
                "execution": execution
            })),
        )
            .into_response(),
        Err(EngineError::Db(e)) => {
            eprintln!("DB error executing workflow {}: {:?}", workflow_id, e);
            JsonResponse::server_error("Failed to execute workflow").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct ListExecutionsQuery {
    pub limit: Option<i64>,
}

pub async fn list_executions(
    State(app_state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Query(query): Query<ListExecutionsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match app_state
        .workflow_repo
        .list_executions(workflow_id, limit)
        .await
    {
        Ok(executions) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "executions": executions
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing executions for {}: {:?}", workflow_id, e);
            JsonResponse::server_error("Failed to fetch executions").into_response()
        }
    }
}
