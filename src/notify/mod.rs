//! # Notifier Seam
//!
//! Message delivery collaborator. The scheduler treats delivery as
//! fire-and-forget: failures are logged by the caller, never retried.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release with LogNotifier

use anyhow::Result;
use async_trait::async_trait;
use log::info;

/// Collaborator that delivers a text message to a chat identity.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Notifier that logs deliveries instead of sending them.
///
/// Useful for local runs and wiring tests before a real bot transport is
/// plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        info!("message to {}: {}", chat_id, text);
        Ok(())
    }
}
