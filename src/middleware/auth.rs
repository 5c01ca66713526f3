use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use futures::future::LocalBoxFuture;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::models::users;
use crate::utils::jwt;

/// Utilisateur authentifié, rechargé depuis la base à chaque requête
/// Utilisé comme extracteur dans les routes protégées
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: users::Model,
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Extraire le token (format: "Bearer <token>")
        let token = bearer_token(req);
        let config = req.app_data::<web::Data<AppConfig>>().cloned();
        let db = req.app_data::<web::Data<DatabaseConnection>>().cloned();

        Box::pin(async move {
            let (Some(config), Some(db)) = (config, db) else {
                return Err(AppError::Internal("application state not configured".to_string()));
            };
            let token = token?;

            // 2. Vérifier le token JWT
            let claims = jwt::verify_token(&token, &config.jwt_secret).map_err(|e| {
                tracing::warn!(error = %e, "invalid bearer token");
                AppError::Unauthorized("Token inválido ou expirado.".to_string())
            })?;

            // 3. Charger l'utilisateur, qui doit être actif
            let user = users::Entity::find_by_id(claims.sub)
                .one(db.get_ref())
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| AppError::Unauthorized("Usuário não encontrado ou inativo.".to_string()))?;

            tracing::debug!(user_id = user.id, email = %claims.email, role = %claims.role, "request authenticated");
            Ok(AuthUser { user })
        })
    }
}

fn bearer_token(req: &HttpRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or_else(|| AppError::Unauthorized("As credenciais de autenticação não foram fornecidas.".to_string()))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Formato inválido (esperado: Bearer <token>).".to_string()))
}
