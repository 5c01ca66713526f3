use actix_web::{HttpResponse, get, post, web};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{ApiResponse, TransferActionRequest};
use crate::services::transfer_service::TransferService;

/// GET /api/transferencias/minhas - Transferts ouverts de l'utilisateur
#[get("/minhas")]
pub async fn my_transfers(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let mine = TransferService::mine(db.get_ref(), &auth_user.user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Transferências recuperadas", mine)))
}

#[get("/{id}")]
pub async fn get_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let detail = TransferService::detail(db.get_ref(), &auth_user.user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(detail)))
}

/// Le corps est optionnel pour aceitar/cancelar/aprovar; un JSON mal formé est refusé
fn action_body(body: &web::Bytes) -> Result<TransferActionRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TransferActionRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "malformed transfer action body");
        AppError::bad_request(format!("JSON inválido: {}", e))
    })
}

#[post("/{id}/aceitar")]
pub async fn accept_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transfer = TransferService::accept(db.get_ref(), &auth_user.user, path.into_inner(), action_body(&body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Transferência aceita! Você agora é responsável pela OT.",
        transfer,
    )))
}

#[post("/{id}/recusar")]
pub async fn refuse_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transfer = TransferService::refuse(db.get_ref(), &auth_user.user, path.into_inner(), action_body(&body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Transferência recusada. A OT continua com o motorista de origem.",
        transfer,
    )))
}

#[post("/{id}/cancelar")]
pub async fn cancel_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transfer = TransferService::cancel(db.get_ref(), &auth_user.user, path.into_inner(), action_body(&body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Transferência cancelada", transfer)))
}

#[post("/{id}/aprovar")]
pub async fn approve_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transfer = TransferService::approve(db.get_ref(), &auth_user.user, path.into_inner(), action_body(&body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Transferência aprovada.", transfer)))
}

#[post("/{id}/rejeitar")]
pub async fn reject_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let transfer = TransferService::reject(db.get_ref(), &auth_user.user, path.into_inner(), action_body(&body)?).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Transferência rejeitada.", transfer)))
}

pub fn transfer_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/transferencias")
            .service(my_transfers)
            .service(get_transfer)
            .service(accept_transfer)
            .service(refuse_transfer)
            .service(cancel_transfer)
            .service(approve_transfer)
            .service(reject_transfer),
    );
}
