// ============================================================================
// MODÈLE : ATUALIZACOES OT
// ============================================================================
//
// Description:
//   Journal (append-only) des événements d'une OT: création, changements de
//   status, transferts appliqués, fichiers envoyés. Sert de timeline.
//
// Colonnes de la table atualizacoes_ot:
//   - ordem_transporte_id (FK), usuario_id (FK)
//   - tipo (VARCHAR(20)) - voir TipoAtualizacao
//   - descricao (VARCHAR), observacao (TEXT, NULL)
//   - status_anterior / status_novo (NULL sauf pour STATUS)
//   - latitude / longitude / endereco (NULL)
//   - data_criacao (TIMESTAMP)
//
// Points d'attention:
//   - Jamais modifiée ni supprimée après insertion
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::ordens_transporte::OtStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoAtualizacao {
    #[sea_orm(string_value = "STATUS")]
    Status,
    #[sea_orm(string_value = "OBSERVACAO")]
    Observacao,
    #[sea_orm(string_value = "LOCALIZACAO")]
    Localizacao,
    #[sea_orm(string_value = "TRANSFERENCIA")]
    Transferencia,
    #[sea_orm(string_value = "ARQUIVO")]
    Arquivo,
    #[sea_orm(string_value = "OUTRO")]
    Outro,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "atualizacoes_ot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ordem_transporte_id: i32,
    pub usuario_id: i32,
    pub tipo: TipoAtualizacao,
    pub descricao: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub observacao: Option<String>,
    pub status_anterior: Option<OtStatus>,
    pub status_novo: Option<OtStatus>,
    #[sea_orm(column_type = "Decimal(Some((10, 8)))", nullable)]
    pub latitude: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((11, 8)))", nullable)]
    pub longitude: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub endereco: Option<String>,
    pub data_criacao: DateTimeUtc,
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
        from = "Column::UsuarioId",
        to = "super::users::Column::Id"
    )]
    Usuario,
}

impl Related<super::ordens_transporte::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrdemTransporte.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
