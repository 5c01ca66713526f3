pub mod auth;
pub mod health;
pub mod ots;
pub mod transferencias;
pub mod users;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(ots::ot_routes)
            .configure(transferencias::transfer_routes),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test, web};
    use sea_orm::{ActiveModelTrait, DatabaseConnection, IntoActiveModel, Set};
    use serde_json::{Value, json};

    use super::configure_routes;
    use crate::config::AppConfig;
    use crate::models::users::{self, UserRole};
    use crate::services::notifier::ResetCodeNotifier;
    use crate::services::notifier::testing::CapturingNotifier;
    use crate::test_utils::{TEST_PASSWORD, attach_file, create_ot, create_user, setup_db, test_config};
    use crate::utils::jwt::generate_token;

    fn bearer(user: &users::Model, config: &AppConfig) -> (&'static str, String) {
        let token = generate_token(user.id, &user.email, user.role.label(), &config.jwt_secret);
        ("Authorization", format!("Bearer {}", token))
    }

    macro_rules! app {
        ($db:expr, $config:expr, $notifier:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new($config.clone()))
                    .app_data(web::Data::from($notifier.clone() as Arc<dyn ResetCodeNotifier>))
                    .configure(configure_routes),
            )
            .await
        };
    }

    async fn setup() -> (DatabaseConnection, AppConfig, Arc<CapturingNotifier>) {
        (setup_db().await, test_config(), Arc::new(CapturingNotifier::default()))
    }

    #[actix_web::test]
    async fn test_health() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[actix_web::test]
    async fn test_protected_routes_need_valid_token() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);

        let req = test::TestRequest::get().uri("/api/ots").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        let req = test::TestRequest::get()
            .uri("/api/auth/profile")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

        // compte désactivé après émission du token
        let user = create_user(&db, UserRole::Motorista, "ana@logitrack.com").await;
        let header = bearer(&user, &config);
        let mut active = user.into_active_model();
        active.is_active = Set(false);
        active.update(&db).await.unwrap();

        let req = test::TestRequest::get()
            .uri("/api/auth/profile")
            .insert_header(header)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_register_then_profile() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "email": "novo@logitrack.com",
                "password": TEST_PASSWORD,
                "password_confirm": TEST_PASSWORD,
                "first_name": "Novo",
                "last_name": "Motorista",
                "cpf": "529.982.247-25",
                "role": "motorista",
                "cnh_numero": "01234567890",
                "cnh_categoria": "E",
                "cnh_validade": "2099-01-01"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["cpf"], "52998224725");
        assert!(body["data"].get("password_hash").is_none());

        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "email": "outro@logitrack.com",
                "password": "123",
                "password_confirm": "456",
                "first_name": "Outro",
                "last_name": "Motorista",
                "cpf": "52998224725"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["errors"]["password"].is_array());
        assert!(body["errors"]["cpf"].is_array());

        let user = create_user(&db, UserRole::Logistica, "log@logitrack.com").await;
        let req = test::TestRequest::get()
            .uri("/api/auth/profile")
            .insert_header(bearer(&user, &config))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["email"], "log@logitrack.com");
        assert_eq!(body["data"]["role"], "logistica");
    }

    #[actix_web::test]
    async fn test_password_reset_flow() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);
        create_user(&db, UserRole::Motorista, "eva@logitrack.com").await;

        // email inconnu: même réponse
        for email in ["ninguem@logitrack.com", "eva@logitrack.com"] {
            let req = test::TestRequest::post()
                .uri("/api/auth/password/reset")
                .set_json(json!({ "email": email }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }
        let code = notifier.last_code().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/auth/password/check-code")
            .set_json(json!({ "email": "eva@logitrack.com", "code": code }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["valid"], true);

        let req = test::TestRequest::post()
            .uri("/api/auth/password/confirm")
            .set_json(json!({
                "email": "eva@logitrack.com",
                "code": code,
                "new_password": "Estrada#Nova9",
                "confirm_password": "Estrada#Nova9"
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        // code à usage unique
        let req = test::TestRequest::post()
            .uri("/api/auth/password/check-code")
            .set_json(json!({ "email": "eva@logitrack.com", "code": code }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_ot_lifecycle_over_http() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);
        let ana = create_user(&db, UserRole::Motorista, "ana@logitrack.com").await;
        let auth = bearer(&ana, &config);

        let req = test::TestRequest::post()
            .uri("/api/ots")
            .insert_header(auth.clone())
            .set_json(json!({
                "cliente_nome": "Mercado Boa Vista",
                "endereco_entrega": "Rua das Flores, 120",
                "cidade_entrega": "Campinas",
                "latitude_origem": -23.5505,
                "longitude_origem": -46.6333
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        let id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["status"], "INICIADA");
        assert_eq!(body["data"]["motorista_atual"]["id"], ana.id);

        let req = test::TestRequest::get()
            .uri("/api/ots/pode-criar")
            .insert_header(auth.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["pode_criar"], false);

        let req = test::TestRequest::get()
            .uri("/api/ots/buscar?cliente_nome=boa")
            .insert_header(auth.clone())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);

        for status in ["EM_CARREGAMENTO", "EM_TRANSITO"] {
            let req = test::TestRequest::patch()
                .uri(&format!("/api/ots/{}/status", id))
                .insert_header(auth.clone())
                .set_json(json!({ "status": status }))
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }

        let finalize = json!({ "observacoes_entrega": "Recebido pelo gerente" });
        let req = test::TestRequest::post()
            .uri(&format!("/api/ots/{}/finalizar", id))
            .insert_header(auth.clone())
            .set_json(&finalize)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["errors"]["arquivos"].is_array());

        let ot = crate::services::ot_service::find_ot(&db, id as i32).await.unwrap();
        attach_file(&db, &ot, &ana).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/ots/{}/finalizar", id))
            .insert_header(auth.clone())
            .set_json(&finalize)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "ENTREGUE");
        assert_eq!(body["data"]["esta_finalizada"], true);

        let req = test::TestRequest::get()
            .uri(&format!("/api/ots/{}/timeline", id))
            .insert_header(auth)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"][0]["evento"], "atualizacao");
    }

    #[actix_web::test]
    async fn test_transfer_over_http() {
        let (db, config, notifier) = setup().await;
        let app = app!(db, config, notifier);
        let ana = create_user(&db, UserRole::Motorista, "ana@logitrack.com").await;
        let bia = create_user(&db, UserRole::Motorista, "bia@logitrack.com").await;
        let ot = create_ot(&db, &ana).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/ots/{}/transferir", ot.id))
            .insert_header(bearer(&ana, &config))
            .set_json(json!({ "motorista_destino": bia.id, "motivo": "Fim do turno" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["status"], "AGUARDANDO_ACEITACAO");
        let transfer_id = body["data"]["transferencia"]["id"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri("/api/transferencias/minhas")
            .insert_header(bearer(&bia, &config))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["contadores"]["para_aceitar"], 1);

        // JSON mal formé: refusé, la transferência reste ouverte
        let req = test::TestRequest::post()
            .uri(&format!("/api/transferencias/{}/aceitar", transfer_id))
            .insert_header(bearer(&bia, &config))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{\"observacao\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);

        // sans corps: observation par défaut
        let req = test::TestRequest::post()
            .uri(&format!("/api/transferencias/{}/aceitar", transfer_id))
            .insert_header(bearer(&bia, &config))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["status"], "APROVADA");
        assert_eq!(body["data"]["tipo"], "OUTROS");

        let req = test::TestRequest::get()
            .uri(&format!("/api/ots/{}", ot.id))
            .insert_header(bearer(&bia, &config))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["motorista_atual"]["id"], bia.id);
    }
}
