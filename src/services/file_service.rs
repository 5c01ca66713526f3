use std::collections::HashMap;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use sea_orm::*;
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::models::arquivos::{self, TipoArquivo, format_size};
use crate::models::atualizacoes_ot::TipoAtualizacao;
use crate::models::dto::{ArquivoResponse, UploadRequest};
use crate::models::users;
use crate::services::audit::AuditEntry;
use crate::services::ot_service::OtService;
use crate::services::permissions;

const MAX_NAME_LENGTH: usize = 100;

pub struct FileService;

impl FileService {
    /// Pièce jointe d'une OT: décodage, écriture sous MEDIA_ROOT, ligne + journal
    pub async fn upload(
        db: &DatabaseConnection,
        config: &AppConfig,
        user: &users::Model,
        ot_id: i32,
        request: UploadRequest,
    ) -> AppResult<ArquivoResponse> {
        let ot = OtService::get_visible(db, user, ot_id).await?;
        if !permissions::can_upload_file(user, &ot) {
            return Err(AppError::forbidden("Você não pode anexar arquivos a esta OT."));
        }
        request.validate()?;

        // 1. Contenu
        let bytes = decode_content(&request.conteudo_base64)?;
        if bytes.is_empty() {
            return Err(AppError::field("conteudo_base64", "Arquivo vazio."));
        }
        if bytes.len() > config.max_upload_bytes {
            return Err(AppError::field(
                "conteudo_base64",
                format!(
                    "Arquivo muito grande ({}). Tamanho máximo: {}.",
                    format_size(bytes.len() as i64),
                    format_size(config.max_upload_bytes as i64)
                ),
            ));
        }
        let nome = sanitize_file_name(&request.nome_arquivo)
            .ok_or_else(|| AppError::field("nome_arquivo", "Nome de arquivo inválido."))?;

        // 2. Écriture sur disque
        let now = Utc::now();
        let relative = format!(
            "ots/arquivos/{}/{}-{}",
            now.format("%Y/%m/%d"),
            uuid::Uuid::new_v4(),
            nome
        );
        let absolute = config.media_root.join(&relative);
        write_file(&absolute, &bytes).await?;

        let sha256 = hex::encode(Sha256::digest(&bytes));
        let tipo = request.tipo.unwrap_or(TipoArquivo::Outro);

        // 3. Ligne + journal; le fichier est supprimé si l'insertion échoue
        let saved = match Self::insert(db, user, ot.id, &relative, &request, bytes.len(), sha256, tipo).await {
            Ok(saved) => saved,
            Err(e) => {
                if let Err(io) = tokio::fs::remove_file(&absolute).await {
                    tracing::warn!(path = %absolute.display(), error = %io, "orphan upload not removed");
                }
                return Err(e);
            }
        };

        tracing::info!(
            numero_ot = %ot.numero_ot,
            arquivo_id = saved.id,
            tamanho = saved.tamanho,
            user_id = user.id,
            "file uploaded"
        );

        let users = HashMap::from([(user.id, user.clone())]);
        Ok(ArquivoResponse::build(saved, &users))
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
        relative: &str,
        request: &UploadRequest,
        size: usize,
        sha256: String,
        tipo: TipoArquivo,
    ) -> AppResult<arquivos::Model> {
        let txn = db.begin().await?;

        let saved = arquivos::ActiveModel {
            ordem_transporte_id: Set(ot_id),
            arquivo: Set(relative.to_string()),
            nome_original: Set(request.nome_arquivo.clone()),
            tamanho: Set(size as i64),
            sha256: Set(sha256),
            tipo: Set(tipo),
            descricao: Set(request.descricao.clone().filter(|d| !d.trim().is_empty())),
            enviado_por_id: Set(user.id),
            data_envio: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        AuditEntry::new(
            ot_id,
            user.id,
            TipoAtualizacao::Arquivo,
            format!("Arquivo anexado: {} ({})", saved.nome_original, tipo.label()),
        )
        .observacao(saved.descricao.clone())
        .record(&txn)
        .await?;

        txn.commit().await?;
        Ok(saved)
    }
}

/// Accepte le base64 brut ou une data URL ("data:image/jpeg;base64,...")
fn decode_content(raw: &str) -> AppResult<Vec<u8>> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|_| AppError::field("conteudo_base64", "Conteúdo base64 inválido."))
}

/// Nom de base, caractères sûrs uniquement; None si rien d'utilisable
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if !cleaned.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    // Garde l'extension si le nom doit être tronqué
    if cleaned.len() <= MAX_NAME_LENGTH {
        return Some(cleaned.to_string());
    }
    let (stem, ext) = match cleaned.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < 10 => (stem, format!(".{}", ext)),
        _ => (cleaned, String::new()),
    };
    let keep = MAX_NAME_LENGTH.saturating_sub(ext.len());
    Some(format!("{}{}", &stem[..keep.min(stem.len())], ext))
}

async fn write_file(path: &Path, bytes: &[u8]) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
