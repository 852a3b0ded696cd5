pub mod lead_repository;
pub mod mock_db;
pub mod postgres_lead_repository;
pub mod postgres_webhook_log_repository;
pub mod postgres_workflow_repository;
pub mod webhook_log_repository;
pub mod workflow_repository;
