//! Webhook module: admission decision building and the HTTPS transport.

pub mod admission;
mod server;

pub use admission::{Decision, decide};
pub use server::{WebhookError, WebhookState, create_webhook_router, run_webhook_server};
