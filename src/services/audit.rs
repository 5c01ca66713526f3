use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::*;

use crate::models::atualizacoes_ot::{self, TipoAtualizacao};
use crate::models::ordens_transporte::OtStatus;

/// Entrée de journal à insérer (les champs optionnels restent NULL)
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub ordem_transporte_id: i32,
    pub usuario_id: i32,
    pub tipo: TipoAtualizacao,
    pub descricao: String,
    pub observacao: Option<String>,
    pub status_anterior: Option<OtStatus>,
    pub status_novo: Option<OtStatus>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub endereco: Option<String>,
}

impl AuditEntry {
    pub fn new(
        ordem_transporte_id: i32,
        usuario_id: i32,
        tipo: TipoAtualizacao,
        descricao: impl Into<String>,
    ) -> Self {
        Self {
            ordem_transporte_id,
            usuario_id,
            tipo,
            descricao: descricao.into(),
            observacao: None,
            status_anterior: None,
            status_novo: None,
            latitude: None,
            longitude: None,
            endereco: None,
        }
    }

    pub fn observacao(mut self, observacao: Option<String>) -> Self {
        self.observacao = observacao;
        self
    }

    pub fn status(mut self, anterior: OtStatus, novo: OtStatus) -> Self {
        self.status_anterior = Some(anterior);
        self.status_novo = Some(novo);
        self
    }

    pub fn location(
        mut self,
        latitude: Option<Decimal>,
        longitude: Option<Decimal>,
        endereco: Option<String>,
    ) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.endereco = endereco;
        self
    }

    /// Insère l'entrée (dans la transaction de l'opération appelante)
    pub async fn record<C: ConnectionTrait>(
        self,
        conn: &C,
    ) -> Result<atualizacoes_ot::Model, DbErr> {
        atualizacoes_ot::ActiveModel {
            ordem_transporte_id: Set(self.ordem_transporte_id),
            usuario_id: Set(self.usuario_id),
            tipo: Set(self.tipo),
            descricao: Set(self.descricao),
            observacao: Set(self.observacao),
            status_anterior: Set(self.status_anterior),
            status_novo: Set(self.status_novo),
            latitude: Set(self.latitude),
            longitude: Set(self.longitude),
            endereco: Set(self.endereco),
            data_criacao: Set(Utc::now()),
            ..Default::default()
        }
        .insert(conn)
        .await
    }
}

/// Journal d'une OT, du plus récent au plus ancien
pub async fn history<C: ConnectionTrait>(
    conn: &C,
    ot_id: i32,
    limit: Option<u64>,
) -> Result<Vec<atualizacoes_ot::Model>, DbErr> {
    atualizacoes_ot::Entity::find()
        .filter(atualizacoes_ot::Column::OrdemTransporteId.eq(ot_id))
        .order_by_desc(atualizacoes_ot::Column::DataCriacao)
        .order_by_desc(atualizacoes_ot::Column::Id)
        .limit(limit)
        .all(conn)
        .await
}
