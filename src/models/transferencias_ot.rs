// ============================================================================
// MODÈLE : TRANSFERENCIAS OT
// ============================================================================
//
// Description:
//   Demande de passage d'une OT d'un motorista à un autre.
//
// Colonnes de la table transferencias_ot:
//   - ordem_transporte_id (FK vers ordens_transporte)
//   - motorista_origem_id / motorista_destino_id / solicitado_por_id (FK vers users)
//   - aprovado_por_id (FK vers users, NULL) - auteur de la réponse
//   - status (VARCHAR(25)) - voir TransferStatus
//   - motivo (TEXT), observacao_aprovacao (TEXT, NULL)
//   - data_solicitacao / data_resposta
//   - latitude / longitude / endereco (position au moment de la demande)
//
// Workflow:
//   - Demande par logistica/admin        -> APROVADA immédiatement
//   - Demande par le motorista actuel    -> AGUARDANDO_ACEITACAO (le destinataire accepte/refuse)
//   - Demande par un autre motorista     -> PENDENTE (logistica/admin approuve/rejette)
//
// Points d'attention:
//   - APROVADA, REJEITADA et CANCELADA sont terminaux
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::users;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(25))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    #[sea_orm(string_value = "PENDENTE")]
    Pendente,
    #[sea_orm(string_value = "AGUARDANDO_ACEITACAO")]
    AguardandoAceitacao,
    #[sea_orm(string_value = "APROVADA")]
    Aprovada,
    #[sea_orm(string_value = "REJEITADA")]
    Rejeitada,
    #[sea_orm(string_value = "CANCELADA")]
    Cancelada,
}

impl TransferStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TransferStatus::Pendente => "Pendente",
            TransferStatus::AguardandoAceitacao => "Aguardando Aceitação",
            TransferStatus::Aprovada => "Aprovada",
            TransferStatus::Rejeitada => "Rejeitada",
            TransferStatus::Cancelada => "Cancelada",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransferStatus::Aprovada | TransferStatus::Rejeitada | TransferStatus::Cancelada
        )
    }
}

/// Nature de la transfert, déduite de son status et de l'auteur de la demande
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipoTransferencia {
    Direta,
    Solicitacao,
    Logistica,
    Outros,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transferencias_ot")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ordem_transporte_id: i32,
    pub motorista_origem_id: i32,
    pub motorista_destino_id: i32,
    pub solicitado_por_id: i32,
    pub aprovado_por_id: Option<i32>,
    pub status: TransferStatus,
    #[sea_orm(column_type = "Text")]
    pub motivo: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub observacao_aprovacao: Option<String>,
    pub data_solicitacao: DateTimeUtc,
    pub data_resposta: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Decimal(Some((10, 8)))", nullable)]
    pub latitude: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((11, 8)))", nullable)]
    pub longitude: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub endereco: Option<String>,
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
        from = "Column::MotoristaOrigemId",
        to = "super::users::Column::Id"
    )]
    MotoristaOrigem,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::MotoristaDestinoId",
        to = "super::users::Column::Id"
    )]
    MotoristaDestino,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SolicitadoPorId",
        to = "super::users::Column::Id"
    )]
    SolicitadoPor,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::AprovadoPorId",
        to = "super::users::Column::Id"
    )]
    AprovadoPor,
}

impl Related<super::ordens_transporte::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrdemTransporte.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_finished(&self) -> bool {
        self.status.is_final()
    }

    /// Seul le motorista de destination accepte une transfert directe
    pub fn can_be_accepted_by(&self, user: &users::Model) -> bool {
        self.status == TransferStatus::AguardandoAceitacao && user.id == self.motorista_destino_id
    }

    pub fn can_be_refused_by(&self, user: &users::Model) -> bool {
        self.can_be_accepted_by(user)
    }

    pub fn can_be_cancelled_by(&self, user: &users::Model) -> bool {
        matches!(
            self.status,
            TransferStatus::Pendente | TransferStatus::AguardandoAceitacao
        ) && (user.id == self.solicitado_por_id
            || user.id == self.motorista_origem_id
            || user.role.is_manager())
    }

    pub fn can_be_approved_by(&self, user: &users::Model) -> bool {
        self.status == TransferStatus::Pendente && user.role.is_manager()
    }

    /// Motorista concerné (origine, destination ou demandeur)
    pub fn involves(&self, user_id: i32) -> bool {
        user_id == self.motorista_origem_id
            || user_id == self.motorista_destino_id
            || user_id == self.solicitado_por_id
    }

    pub fn kind(&self, solicitante_role: users::UserRole) -> TipoTransferencia {
        match self.status {
            TransferStatus::AguardandoAceitacao => TipoTransferencia::Direta,
            TransferStatus::Pendente => TipoTransferencia::Solicitacao,
            _ if solicitante_role.is_manager() => TipoTransferencia::Logistica,
            _ => TipoTransferencia::Outros,
        }
    }
}
