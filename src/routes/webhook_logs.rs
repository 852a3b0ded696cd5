use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{models::webhook_log::WebhookStatus, responses::JsonResponse, state::AppState};

#[derive(Deserialize)]
pub struct ListWebhookLogsQuery {
    pub event_type: Option<String>,
    pub status: Option<WebhookStatus>,
    pub limit: Option<i64>,
}

/// Delivery audit trail for a tenant's outbound webhooks, newest first.
pub async fn list_webhook_logs(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Query(query): Query<ListWebhookLogsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    match app_state
        .webhooks
        .list_logs(tenant_id, query.event_type.as_deref(), query.status, limit)
        .await
    {
        Ok(logs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "logs": logs
            })),
        )
            .into_response(),
        Err(e) => {
            eprintln!("DB error listing webhook logs for {}: {:?}", tenant_id, e);
            JsonResponse::server_error("Failed to fetch webhook logs").into_response()
        }
    }
}
