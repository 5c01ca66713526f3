// ============================================================================
// MODÈLE : ARQUIVOS
// ============================================================================
//
// Description:
//   Fichier joint à une OT (canhoto, photos, justificatifs).
//   Le contenu est sur disque sous MEDIA_ROOT, la table garde le chemin relatif.
//
// Colonnes de la table arquivos:
//   - ordem_transporte_id (FK vers ordens_transporte)
//   - arquivo (VARCHAR) - ots/arquivos/YYYY/MM/DD/<uuid>-<nom>
//   - nome_original (VARCHAR)
//   - tamanho (BIGINT) - en octets
//   - sha256 (VARCHAR(64))
//   - tipo (VARCHAR(20)) - voir TipoArquivo
//   - descricao (TEXT, NULL)
//   - enviado_por_id (FK vers users)
//   - data_envio (TIMESTAMP)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoArquivo {
    #[sea_orm(string_value = "CANHOTO")]
    Canhoto,
    #[sea_orm(string_value = "FOTO_ENTREGA")]
    FotoEntrega,
    #[sea_orm(string_value = "FOTO_OCORRENCIA")]
    FotoOcorrencia,
    #[sea_orm(string_value = "COMPROVANTE")]
    Comprovante,
    #[sea_orm(string_value = "OUTRO")]
    Outro,
}

impl TipoArquivo {
    pub fn label(&self) -> &'static str {
        match self {
            TipoArquivo::Canhoto => "Canhoto",
            TipoArquivo::FotoEntrega => "Foto da Entrega",
            TipoArquivo::FotoOcorrencia => "Foto de Ocorrência",
            TipoArquivo::Comprovante => "Comprovante",
            TipoArquivo::Outro => "Outro",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "arquivos")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ordem_transporte_id: i32,
    pub arquivo: String,
    pub nome_original: String,
    pub tamanho: i64,
    pub sha256: String,
    pub tipo: TipoArquivo,
    #[sea_orm(column_type = "Text", nullable)]
    pub descricao: Option<String>,
    pub enviado_por_id: i32,
    pub data_envio: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::ordens_transporte::Entity",
        from = "Column::OrdemTransporteId",
        to = "super::ordens_transporte::Column::Id",
        on_delete = "Cascade"
    )]
    OrdemTransporte,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::EnviadoPorId",
        to = "super::users::Column::Id"
    )]
    EnviadoPor,
}

impl Related<super::ordens_transporte::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrdemTransporte.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Nom de fichier seul (sans le répertoire de stockage)
    pub fn nome_arquivo(&self) -> &str {
        self.arquivo.rsplit('/').next().unwrap_or(&self.arquivo)
    }

    pub fn tamanho_formatado(&self) -> String {
        format_size(self.tamanho)
    }
}

/// Taille lisible: "512.0 B", "12.0 KB", "3.4 MB"...
pub fn format_size(bytes: i64) -> String {
    let mut size = bytes.max(0) as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.0 B");
        assert_eq!(format_size(512), "512.0 B");
        assert_eq!(format_size(12 * 1024), "12.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024 + 400 * 1024), "3.4 MB");
        assert_eq!(format_size(2 * 1024_i64.pow(4)), "2.0 TB");
    }

    #[test]
    fn test_nome_arquivo() {
        let arquivo = Model {
            id: 1,
            ordem_transporte_id: 1,
            arquivo: "ots/arquivos/2025/04/26/abc-canhoto.jpg".to_string(),
            nome_original: "canhoto.jpg".to_string(),
            tamanho: 10,
            sha256: String::new(),
            tipo: TipoArquivo::Canhoto,
            descricao: None,
            enviado_por_id: 1,
            data_envio: chrono::Utc::now(),
        };
        assert_eq!(arquivo.nome_arquivo(), "abc-canhoto.jpg");
    }
}
