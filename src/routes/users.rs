use actix_web::{HttpResponse, get, patch, web};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{ApiResponse, UserListQuery, UserResponse};
use crate::services::user_service::{AccountAction, UserService};

/// GET /api/auth/users?role=motorista&is_active=false - logistica/admin
#[get("")]
pub async fn list_users(
    auth_user: AuthUser,
    query: web::Query<UserListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let users = UserService::list_users(db.get_ref(), &auth_user.user, query.into_inner()).await?;
    let users: Vec<UserResponse> = users.iter().map(UserResponse::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": users.len(),
        "data": users,
    })))
}

/// GET /api/auth/users/{id}
#[get("/{id}")]
pub async fn get_user(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::get_user(db.get_ref(), &auth_user.user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UserResponse::from(&user))))
}

/// PATCH /api/auth/users/{id}/activate | /deactivate
#[patch("/{id}/{action}")]
pub async fn set_active(
    auth_user: AuthUser,
    path: web::Path<(i32, String)>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let (user_id, action) = path.into_inner();
    let action = AccountAction::parse(&action)?;

    let outcome = UserService::set_active(db.get_ref(), &auth_user.user, user_id, action).await?;
    let message = match (action, outcome.changed) {
        (AccountAction::Activate, true) => "Usuário ativado com sucesso.",
        (AccountAction::Deactivate, true) => "Usuário desativado com sucesso.",
        (AccountAction::Activate, false) => "Usuário já está ativo.",
        (AccountAction::Deactivate, false) => "Usuário já está inativo.",
    };

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(message, UserResponse::from(&outcome.user))))
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(list_users)
            .service(get_user)
            .service(set_active),
    );
}
