// Fixtures partagées par les tests des services et des routes

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::*;
use tempfile::TempDir;

use crate::config::AppConfig;
use crate::db::create_schema;
use crate::models::arquivos::{self, TipoArquivo};
use crate::models::dto::{CreateOtRequest, RegisterRequest};
use crate::models::ordens_transporte;
use crate::models::users::{self, CnhCategoria, UserRole};
use crate::services::ot_service::OtService;
use crate::utils::password::hash_password;

pub const TEST_PASSWORD: &str = "Caminhao#2024";

static CPF_SEQUENCE: AtomicU32 = AtomicU32::new(1);

/// Base SQLite en mémoire; une seule connexion pour que toutes les requêtes voient le même schéma
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    create_schema(&db).await.unwrap();
    db
}

/// Base SQLite sur disque avec plusieurs connexions, pour les tests de concurrence
pub async fn setup_pooled_db() -> (DatabaseConnection, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("logitrack.db").display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(8)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    create_schema(&db).await.unwrap();
    (db, dir)
}

/// Configuration de test (MEDIA_ROOT non utilisé)
pub fn test_config() -> AppConfig {
    AppConfig::for_tests(std::env::temp_dir().join("logitrack-tests"))
}

/// Configuration avec un MEDIA_ROOT isolé, supprimé avec le TempDir
pub fn media_config() -> (AppConfig, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (AppConfig::for_tests(dir.path().to_path_buf()), dir)
}

/// Utilisateur actif avec CNH valide
pub async fn create_user(db: &DatabaseConnection, role: UserRole, email: &str) -> users::Model {
    let sequence = CPF_SEQUENCE.fetch_add(1, Ordering::SeqCst);
    let first_name = email.split('@').next().unwrap_or("teste");

    users::ActiveModel {
        email: Set(email.to_lowercase()),
        password_hash: Set(hash_password(TEST_PASSWORD).unwrap()),
        first_name: Set(first_name.to_string()),
        last_name: Set("Silva".to_string()),
        cpf: Set(format!("{:011}", sequence)),
        phone: Set(Some("+5511987654321".to_string())),
        role: Set(role),
        is_active: Set(true),
        is_staff: Set(role == UserRole::Admin),
        date_joined: Set(Utc::now()),
        cnh_numero: Set(Some(format!("{:011}", 90_000_000 + sequence))),
        cnh_categoria: Set(Some(CnhCategoria::E)),
        cnh_validade: Set(Some((Utc::now() + Duration::days(365)).date_naive())),
        foto_perfil: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn register_request(email: &str, cpf: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
        password_confirm: TEST_PASSWORD.to_string(),
        first_name: "Ana".to_string(),
        last_name: "Souza".to_string(),
        cpf: cpf.to_string(),
        phone: Some("+5511912345678".to_string()),
        role: Some(UserRole::Motorista),
        cnh_numero: Some("01234567890".to_string()),
        cnh_categoria: Some(CnhCategoria::E),
        cnh_validade: Some((Utc::now() + Duration::days(365)).date_naive()),
    }
}

pub fn create_request() -> CreateOtRequest {
    CreateOtRequest {
        cliente_nome: "Mercado Boa Vista".to_string(),
        endereco_entrega: "Rua das Flores, 120".to_string(),
        cidade_entrega: "Campinas".to_string(),
        observacoes: None,
        latitude_origem: Some(Decimal::new(-2354, 2)),
        longitude_origem: Some(Decimal::new(-4663, 2)),
        endereco_origem: Some("CD Guarulhos".to_string()),
    }
}

pub async fn create_ot(db: &DatabaseConnection, motorista: &users::Model) -> ordens_transporte::Model {
    OtService::create(db, motorista, create_request()).await.unwrap()
}

/// Ligne de fichier sans contenu sur disque (suffit pour les règles de livraison)
pub async fn attach_file(
    db: &DatabaseConnection,
    ot: &ordens_transporte::Model,
    user: &users::Model,
) -> arquivos::Model {
    arquivos::ActiveModel {
        ordem_transporte_id: Set(ot.id),
        arquivo: Set(format!("ots/arquivos/2025/04/26/{}-canhoto.jpg", uuid::Uuid::new_v4())),
        nome_original: Set("canhoto.jpg".to_string()),
        tamanho: Set(2048),
        sha256: Set("0".repeat(64)),
        tipo: Set(TipoArquivo::Canhoto),
        descricao: Set(None),
        enviado_por_id: Set(user.id),
        data_envio: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
