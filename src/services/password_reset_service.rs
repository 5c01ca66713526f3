// ============================================================================
// SERVICE : PASSWORD RESET
// ============================================================================
//
// Workflow:
//   1. request_reset  : supprime l'ancien token, crée un code, le transmet
//   2. check_code     : vérifie le code sans le consommer
//   3. confirm_reset  : vérifie le code, change le mot de passe, used = true
//
// Points d'attention:
//   - Email inconnu ou inactif: succès silencieux (pas de fuite d'existence)
//   - Échec d'envoi: le token créé est supprimé
//   - Chaque mauvais code incrémente attempts, y compris via check_code
//   - attempts est incrémenté en base (UPDATE ... WHERE attempts < limite)
//
// ============================================================================

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use validator::Validate;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult, FieldErrors, field_errors, push_error};
use crate::models::dto::{CheckCodeRequest, PasswordResetConfirmRequest, PasswordResetRequest};
use crate::models::{password_reset_tokens, users};
use crate::services::notifier::ResetCodeNotifier;
use crate::utils::{password, reset_code};

const INVALID_CODE: &str = "Código inválido ou expirado.";

#[derive(Debug, Serialize)]
pub struct ResetRequestOutcome {
    pub email_sent: bool,
}

#[derive(Debug, Serialize)]
pub struct CodeStatus {
    pub valid: bool,
    pub minutes_remaining: i64,
    pub attempts: i32,
    pub max_attempts: i32,
}

pub struct PasswordResetService;

impl PasswordResetService {
    pub async fn request_reset(
        db: &DatabaseConnection,
        config: &AppConfig,
        notifier: &dyn ResetCodeNotifier,
        request: PasswordResetRequest,
        ip_address: Option<String>,
    ) -> AppResult<ResetRequestOutcome> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();

        // 1. Utilisateur actif ? Sinon on répond comme si tout allait bien
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(&email))
            .filter(users::Column::IsActive.eq(true))
            .one(db)
            .await?;
        let Some(user) = user else {
            tracing::info!("password reset requested for unknown or inactive account");
            return Ok(ResetRequestOutcome { email_sent: false });
        };

        // 2. Un seul token par utilisateur: l'ancien est remplacé
        let code = reset_code::generate_code();
        let code_hash =
            reset_code::hash_code(&config.jwt_secret, user.id, &code).map_err(AppError::Internal)?;
        let now = Utc::now();

        let txn = db.begin().await?;
        password_reset_tokens::Entity::delete_many()
            .filter(password_reset_tokens::Column::UserId.eq(user.id))
            .exec(&txn)
            .await?;
        let token = password_reset_tokens::ActiveModel {
            user_id: Set(user.id),
            code_hash: Set(code_hash),
            expires_at: Set(now + Duration::minutes(config.reset_code_ttl_minutes)),
            attempts: Set(0),
            used: Set(false),
            created_at: Set(now),
            ip_address: Set(ip_address),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        // 3. Envoi du code; en cas d'échec, pas de token orphelin
        match notifier
            .send_reset_code(&user, &code, config.reset_code_ttl_minutes)
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = user.id, "password reset code sent");
                Ok(ResetRequestOutcome { email_sent: true })
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "password reset code delivery failed");
                password_reset_tokens::Entity::delete_by_id(token.id).exec(db).await?;
                Ok(ResetRequestOutcome { email_sent: false })
            }
        }
    }

    pub async fn check_code(
        db: &DatabaseConnection,
        config: &AppConfig,
        request: CheckCodeRequest,
    ) -> AppResult<CodeStatus> {
        request.validate()?;

        let (_, token) = Self::verify(db, config, &request.email, &request.code).await?;
        let now = Utc::now();

        Ok(CodeStatus {
            valid: true,
            minutes_remaining: token.minutes_remaining(now),
            attempts: token.attempts,
            max_attempts: config.reset_code_max_attempts,
        })
    }

    pub async fn confirm_reset(
        db: &DatabaseConnection,
        config: &AppConfig,
        request: PasswordResetConfirmRequest,
    ) -> AppResult<users::Model> {
        // 1. Le nouveau mot de passe d'abord: aucune tentative consommée s'il est refusé
        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        if request.new_password != request.confirm_password {
            push_error(&mut errors, "confirm_password", "As senhas não coincidem.");
        }
        for problem in password::password_problems(&request.new_password) {
            push_error(&mut errors, "new_password", problem);
        }
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // 2. Code
        let (user, token) = Self::verify(db, config, &request.email, &request.code).await?;

        // 3. Mot de passe + token consommé dans la même transaction
        let password_hash =
            password::hash_password(&request.new_password).map_err(AppError::Internal)?;

        let txn = db.begin().await?;
        let mut active_user: users::ActiveModel = user.into();
        active_user.password_hash = Set(password_hash);
        let user = active_user.update(&txn).await?;

        // usage unique, même face à deux confirmations simultanées
        let consumed = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Id.eq(token.id))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .exec(&txn)
            .await?;
        if consumed.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::field("code", INVALID_CODE));
        }
        txn.commit().await?;

        tracing::info!(user_id = user.id, "password reset completed");
        Ok(user)
    }

    /// Retrouve le token valide de l'utilisateur et compare le code.
    ///
    /// Chaque comparaison réserve d'abord une tentative par un UPDATE atomique
    /// (attempts < limite): des essais concurrents ne peuvent pas dépasser la
    /// limite. Un code correct rend la tentative réservée.
    async fn verify(
        db: &DatabaseConnection,
        config: &AppConfig,
        email: &str,
        code: &str,
    ) -> AppResult<(users::Model, password_reset_tokens::Model)> {
        let email = email.trim().to_lowercase();
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(&email))
            .filter(users::Column::IsActive.eq(true))
            .one(db)
            .await?
            .ok_or_else(|| AppError::field("code", INVALID_CODE))?;

        let token = password_reset_tokens::Entity::find()
            .filter(password_reset_tokens::Column::UserId.eq(user.id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::field("code", INVALID_CODE))?;

        let now = Utc::now();
        if !token.is_valid(now, config.reset_code_max_attempts) {
            return Err(AppError::field("code", INVALID_CODE));
        }

        // 1. Réserver une tentative
        let reserved = password_reset_tokens::Entity::update_many()
            .col_expr(
                password_reset_tokens::Column::Attempts,
                Expr::col(password_reset_tokens::Column::Attempts).add(1),
            )
            .filter(password_reset_tokens::Column::Id.eq(token.id))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::Attempts.lt(config.reset_code_max_attempts))
            .exec(db)
            .await?;
        if reserved.rows_affected == 0 {
            return Err(AppError::field("code", INVALID_CODE));
        }

        // 2. Comparer
        if !reset_code::verify_code(&config.jwt_secret, user.id, code, &token.code_hash) {
            let attempts = password_reset_tokens::Entity::find_by_id(token.id)
                .one(db)
                .await?
                .map_or(config.reset_code_max_attempts, |t| t.attempts);

            tracing::warn!(user_id = user.id, attempts, "wrong password reset code");
            let remaining = (config.reset_code_max_attempts - attempts).max(0);
            return Err(AppError::field(
                "code",
                format!("Código incorreto. Tentativas restantes: {}.", remaining),
            ));
        }

        // 3. Code correct: la tentative n'est pas comptée
        password_reset_tokens::Entity::update_many()
            .col_expr(
                password_reset_tokens::Column::Attempts,
                Expr::col(password_reset_tokens::Column::Attempts).sub(1),
            )
            .filter(password_reset_tokens::Column::Id.eq(token.id))
            .exec(db)
            .await?;

        Ok((user, token))
    }
}
