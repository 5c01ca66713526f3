use actix_web::{HttpResponse, get, patch, post, web};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    ApiResponse, CreateOtRequest, FinalizeRequest, OtListQuery, SearchQuery, StatusUpdateRequest,
    TransferRequest, UpdateOtRequest, UploadRequest,
};
use crate::services::file_service::FileService;
use crate::services::ot_service::OtService;
use crate::services::transfer_service::TransferService;

/// GET /api/ots?status=EM_TRANSITO&motorista=3
#[get("")]
pub async fn list_ots(
    auth_user: AuthUser,
    query: web::Query<OtListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let list = OtService::list(db.get_ref(), &auth_user.user, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(list)))
}

/// POST /api/ots - Créer une OT (motorista)
#[post("")]
pub async fn create_ot(
    auth_user: AuthUser,
    body: web::Json<CreateOtRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ot = OtService::create(db.get_ref(), &auth_user.user, body.into_inner()).await?;
    let numero = ot.numero_ot.clone();
    let mut responses = OtService::to_responses(db.get_ref(), vec![ot]).await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        format!("OT {} criada com sucesso!", numero),
        responses.pop(),
    )))
}

/// GET /api/ots/buscar?cliente_nome=...&data_inicio=2025-04-01
#[get("/buscar")]
pub async fn search_ots(
    auth_user: AuthUser,
    query: web::Query<SearchQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ots = OtService::search(db.get_ref(), &auth_user.user, query.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": ots.len(),
        "data": ots,
    })))
}

/// GET /api/ots/stats
#[get("/stats")]
pub async fn ot_stats(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let stats = OtService::stats(db.get_ref(), &auth_user.user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(stats)))
}

/// GET /api/ots/pode-criar
#[get("/pode-criar")]
pub async fn can_create_ot(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let check = OtService::can_create(db.get_ref(), &auth_user.user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(check)))
}

/// GET /api/ots/{id}
#[get("/{id}")]
pub async fn get_ot(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let detail = OtService::detail(db.get_ref(), &auth_user.user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(detail)))
}

/// PATCH /api/ots/{id}
#[patch("/{id}")]
pub async fn update_ot(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateOtRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ot = OtService::update(db.get_ref(), &auth_user.user, path.into_inner(), body.into_inner()).await?;
    let mut responses = OtService::to_responses(db.get_ref(), vec![ot]).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("OT atualizada com sucesso.", responses.pop())))
}

/// PATCH /api/ots/{id}/status
#[patch("/{id}/status")]
pub async fn update_status(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<StatusUpdateRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ot = OtService::update_status(db.get_ref(), &auth_user.user, path.into_inner(), body.into_inner()).await?;
    let message = format!("Status atualizado para {}.", ot.status.label());
    let mut responses = OtService::to_responses(db.get_ref(), vec![ot]).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(message, responses.pop())))
}

/// POST /api/ots/{id}/finalizar
#[post("/{id}/finalizar")]
pub async fn finalize_ot(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<FinalizeRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let ot = OtService::finalize(db.get_ref(), &auth_user.user, path.into_inner(), body.into_inner()).await?;
    let message = format!("OT {} finalizada com sucesso!", ot.numero_ot);
    let mut responses = OtService::to_responses(db.get_ref(), vec![ot]).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(message, responses.pop())))
}

/// POST /api/ots/{id}/transferir
#[post("/{id}/transferir")]
pub async fn request_transfer(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<TransferRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let outcome = TransferService::request(db.get_ref(), &auth_user.user, path.into_inner(), body.into_inner()).await?;
    let message = if outcome.aplicada {
        "Transferência realizada com sucesso."
    } else {
        "Transferência solicitada. Aguardando resposta."
    };

    Ok(HttpResponse::Created().json(ApiResponse::with_message(message, outcome)))
}

/// POST /api/ots/{id}/arquivos - Contenu en base64 dans le JSON
#[post("/{id}/arquivos")]
pub async fn upload_file(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UploadRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let arquivo = FileService::upload(
        db.get_ref(),
        config.get_ref(),
        &auth_user.user,
        path.into_inner(),
        body.into_inner(),
    )
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message("Arquivo enviado com sucesso.", arquivo)))
}

/// GET /api/ots/{id}/timeline
#[get("/{id}/timeline")]
pub async fn ot_timeline(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let events = OtService::timeline(db.get_ref(), &auth_user.user, path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "total": events.len(),
        "data": events,
    })))
}

pub fn ot_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ots")
            .service(list_ots)
            .service(create_ot)
            // chemins fixes avant /{id}
            .service(search_ots)
            .service(ot_stats)
            .service(can_create_ot)
            .service(get_ot)
            .service(update_ot)
            .service(update_status)
            .service(finalize_ot)
            .service(request_transfer)
            .service(upload_file)
            .service(ot_timeline),
    );
}
