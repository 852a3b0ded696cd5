pub mod events;
pub mod webhook_logs;
pub mod workflows;
