use actix_web::{HttpRequest, HttpResponse, get, patch, post, web};
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    ApiResponse, CheckCodeRequest, PasswordResetConfirmRequest, PasswordResetRequest,
    RegisterRequest, UpdateProfileRequest, UserResponse,
};
use crate::routes::users;
use crate::services::notifier::ResetCodeNotifier;
use crate::services::password_reset_service::PasswordResetService;
use crate::services::user_service::UserService;

/// POST /api/auth/register - Créer un compte (PUBLIC, inactif jusqu'à activation)
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::register(db.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        "Usuário cadastrado com sucesso. Aguarde a ativação da conta.",
        UserResponse::from(&user),
    )))
}

/// GET /api/auth/profile - Profil de l'utilisateur connecté
#[get("/profile")]
pub async fn get_profile(auth_user: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(ApiResponse::ok(UserResponse::from(&auth_user.user))))
}

/// PATCH /api/auth/profile
#[patch("/profile")]
pub async fn update_profile(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::update_profile(db.get_ref(), auth_user.user, body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "Perfil atualizado com sucesso.",
        UserResponse::from(&user),
    )))
}

/// POST /api/auth/password/reset - Toujours 200, que l'email existe ou non
#[post("/password/reset")]
pub async fn request_password_reset(
    req: HttpRequest,
    body: web::Json<PasswordResetRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
    notifier: web::Data<dyn ResetCodeNotifier>,
) -> Result<HttpResponse, AppError> {
    let ip_address = req.connection_info().realip_remote_addr().map(str::to_string);

    PasswordResetService::request_reset(
        db.get_ref(),
        config.get_ref(),
        notifier.get_ref(),
        body.into_inner(),
        ip_address,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Se o email estiver cadastrado, você receberá um código de recuperação."
    })))
}

/// POST /api/auth/password/check-code - Vérifie le code sans le consommer
#[post("/password/check-code")]
pub async fn check_reset_code(
    body: web::Json<CheckCodeRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    let status = PasswordResetService::check_code(db.get_ref(), config.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("Código válido.", status)))
}

/// POST /api/auth/password/confirm - Nouveau mot de passe
#[post("/password/confirm")]
pub async fn confirm_password_reset(
    body: web::Json<PasswordResetConfirmRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse, AppError> {
    PasswordResetService::confirm_reset(db.get_ref(), config.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Senha alterada com sucesso."
    })))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(get_profile)
            .service(update_profile)
            .service(request_password_reset)
            .service(check_reset_code)
            .service(confirm_password_reset)
            .configure(users::user_routes),
    );
}
