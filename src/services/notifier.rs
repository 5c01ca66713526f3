use async_trait::async_trait;
use thiserror::Error;

use crate::models::users;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Falha ao enviar código: {0}")]
    Delivery(String),
}

/// Canal de livraison des codes de réinitialisation
#[async_trait]
pub trait ResetCodeNotifier: Send + Sync {
    async fn send_reset_code(
        &self,
        user: &users::Model,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), NotifyError>;
}

/// Implémentation par défaut pour le développement: le code n'apparaît qu'au
/// niveau debug (RUST_LOG=debug). Un transport email se branche en
/// implémentant ResetCodeNotifier.
pub struct LogNotifier;

#[async_trait]
impl ResetCodeNotifier for LogNotifier {
    async fn send_reset_code(
        &self,
        user: &users::Model,
        code: &str,
        ttl_minutes: i64,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id = user.id, ttl_minutes, "password reset code issued");
        tracing::debug!(user_id = user.id, email = %user.email, code = %code, "password reset code");
        Ok(())
    }
}
