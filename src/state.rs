use crate::config::Config;
use crate::db::{lead_repository::LeadRepository, workflow_repository::WorkflowRepository};
use crate::services::webhook::WebhookService;
use crate::services::whatsapp::WhatsAppGateway;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub workflow_repo: Arc<dyn WorkflowRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub whatsapp: Arc<dyn WhatsAppGateway>,
    pub webhooks: WebhookService,
    pub config: Arc<Config>,
}
