// ============================================================================
// ERREURS APPLICATIVES
// ============================================================================
//
// Description:
//   Type d'erreur unique renvoyé par les services. Il implémente
//   ResponseError : les routes peuvent donc retourner Result<HttpResponse, AppError>
//   et laisser actix construire la réponse JSON.
//
// Correspondance HTTP:
//   - Validation / BadRequest -> 400
//   - Unauthorized            -> 401
//   - Forbidden               -> 403
//   - NotFound                -> 404
//   - Db / Io / Internal      -> 500 (détail uniquement dans les logs)
//
// ============================================================================

use std::collections::BTreeMap;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

/// Erreurs par champ: {"email": ["Este email já está em uso."]}
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Dados inválidos")]
    Validation(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Erreur de validation portant sur un seul champ
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        AppError::Validation(errors)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(field_errors(&errors))
    }
}

/// Convertit les erreurs du crate validator en erreurs par champ
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, field_errors) in errors.field_errors() {
        let messages = field_errors
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Valor inválido ({})", e.code))
            })
            .collect();
        fields.insert(field.to_string(), messages);
    }
    fields
}

/// Ajoute un message à un champ (utilisé pour les règles métier hors validator)
pub fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Db(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::Validation(errors) => HttpResponse::build(status).json(serde_json::json!({
                "success": false,
                "error": self.to_string(),
                "errors": errors,
            })),
            AppError::Db(_) | AppError::Io(_) | AppError::Internal(_) => {
                // Le détail reste côté serveur
                tracing::error!(error = %self, "request failed");
                HttpResponse::build(status).json(serde_json::json!({
                    "success": false,
                    "error": "Erro interno do servidor",
                }))
            }
            _ => HttpResponse::build(status).json(serde_json::json!({
                "success": false,
                "error": self.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Campo obrigatório"))]
        nome: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::field("x", "y").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("no").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthorized("no".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Db(sea_orm::DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_validation_errors_are_mapped_per_field() {
        let err: AppError = Sample { nome: String::new() }.validate().unwrap_err().into();
        match err {
            AppError::Validation(fields) => {
                assert_eq!(fields["nome"], vec!["Campo obrigatório".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
