pub mod lead;
pub mod webhook_log;
pub mod workflow;
pub mod workflow_execution;
