// ============================================================================
// CONFIGURATION
// ============================================================================
//
// Description:
//   Lecture des variables d'environnement (après dotenv) en une structure
//   unique partagée par toute l'application via web::Data<AppConfig>.
//
// Variables:
//   - DATABASE_URL             (défaut: sqlite://logitrack.db?mode=rwc)
//   - BIND_ADDR / PORT         (défaut: 127.0.0.1:8080)
//   - JWT_SECRET               (défaut INSECURE + warning)
//   - MEDIA_ROOT               (défaut: ./media)
//   - RESET_CODE_TTL_MINUTES   (défaut: 30)
//   - RESET_CODE_MAX_ATTEMPTS  (défaut: 3)
//   - MAX_UPLOAD_BYTES         (défaut: 10 MiB)
//   - LOG_FORMAT               (pretty | json)
//
// ============================================================================

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_JWT_SECRET: &str = "default-insecure-key-change-this";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {value:?}")]
    InvalidEnvValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub jwt_secret: String,
    pub media_root: PathBuf,
    pub reset_code_ttl_minutes: i64,
    pub reset_code_max_attempts: i32,
    pub max_upload_bytes: usize,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_format = match env::var("LOG_FORMAT").ok().as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidEnvValue {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        // Le logger n'est pas encore initialisé ici: le warning est émis par
        // main une fois le subscriber en place (voir uses_default_secret).
        let jwt_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string());

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://logitrack.db?mode=rwc".to_string()),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080)?,
            jwt_secret,
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./media")),
            reset_code_ttl_minutes: parse_var("RESET_CODE_TTL_MINUTES", 30)?,
            reset_code_max_attempts: parse_var("RESET_CODE_MAX_ATTEMPTS", 3)?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            log_format,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidEnvValue { name, value }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl AppConfig {
    /// Configuration utilisée par les tests (aucune variable d'environnement lue)
    pub fn for_tests(media_root: PathBuf) -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            media_root,
            reset_code_ttl_minutes: 30,
            reset_code_max_attempts: 3,
            max_upload_bytes: 1024 * 1024,
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_rejects_garbage() {
        // Nom de variable propre au test pour ne pas interférer avec les autres
        unsafe { env::set_var("LOGITRACK_TEST_PORT", "not-a-port") };
        let result: Result<u16, _> = parse_var("LOGITRACK_TEST_PORT", 8080);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvValue { name: "LOGITRACK_TEST_PORT", .. })
        ));
        unsafe { env::remove_var("LOGITRACK_TEST_PORT") };
    }

    #[test]
    fn test_parse_var_default_when_missing() {
        let value: i64 = parse_var("LOGITRACK_TEST_UNSET_VARIABLE", 30).unwrap();
        assert_eq!(value, 30);
    }
}
