use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    engine::dispatcher::trigger_workflows_by_event, models::workflow::TriggerType,
    responses::JsonResponse, state::AppState,
};

/// Domain-event ingestion. Fans the event out to every active workflow the
/// tenant has registered for the trigger; per-workflow failures are recorded
/// against their workflows and do not fail the request.
pub async fn ingest_event(
    State(app_state): State<AppState>,
    Path((tenant_id, trigger_type)): Path<(Uuid, String)>,
    payload: Option<Json<Value>>,
) -> Response {
    let Ok(trigger_type) = trigger_type.parse::<TriggerType>() else {
        return JsonResponse::bad_request("Unknown trigger type").into_response();
    };
    let data = payload.map(|Json(v)| v).unwrap_or_else(|| json!({}));

    match trigger_workflows_by_event(&app_state, tenant_id, trigger_type, &data).await {
        Ok(executions) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "count": executions.len(),
                "executions": executions
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error dispatching {} event: {:?}", trigger_type, e);
            JsonResponse::server_error("Failed to dispatch event").into_response()
        }
    }
}
