// ============================================================================
// MODÈLE : ORDENS DE TRANSPORTE (OT)
// ============================================================================
//
// Description:
//   Ordre de transport créé par un motorista et suivi jusqu'à la livraison.
//
// Colonnes de la table ordens_transporte:
//   - numero_ot (VARCHAR(20), UNIQUE) - "OT" + YYYYMMDD + séquence du jour (4 chiffres)
//   - motorista_criador_id / motorista_atual_id (FK vers users)
//   - status (VARCHAR(20)) - voir OtStatus
//   - data_criacao / data_atualizacao / data_finalizacao
//   - cliente_nome, endereco_entrega, cidade_entrega
//   - observacoes, observacoes_entrega
//   - latitude/longitude/endereco d'origine
//   - latitude/longitude/endereco_entrega_real (position à la livraison)
//   - ativa (BOOLEAN)
//
// Transitions de status:
//   INICIADA        -> EM_CARREGAMENTO, CANCELADA
//   EM_CARREGAMENTO -> EM_TRANSITO, CANCELADA
//   EM_TRANSITO     -> ENTREGUE, ENTREGUE_PARCIAL, CANCELADA
//   ENTREGUE / ENTREGUE_PARCIAL / CANCELADA : finaux
//
// Points d'attention:
//   - data_finalizacao est renseignée à l'entrée dans un status final
//   - Une OT finalisée n'est plus modifiable ni transférable
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtStatus {
    #[sea_orm(string_value = "INICIADA")]
    Iniciada,
    #[sea_orm(string_value = "EM_CARREGAMENTO")]
    EmCarregamento,
    #[sea_orm(string_value = "EM_TRANSITO")]
    EmTransito,
    #[sea_orm(string_value = "ENTREGUE")]
    Entregue,
    #[sea_orm(string_value = "ENTREGUE_PARCIAL")]
    EntregueParcial,
    #[sea_orm(string_value = "CANCELADA")]
    Cancelada,
}

impl OtStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OtStatus::Iniciada => "Iniciada",
            OtStatus::EmCarregamento => "Em Carregamento",
            OtStatus::EmTransito => "Em Trânsito",
            OtStatus::Entregue => "Entregue",
            OtStatus::EntregueParcial => "Entregue Parcialmente",
            OtStatus::Cancelada => "Cancelada",
        }
    }

    /// Table d'adjacence des transitions autorisées
    pub fn allowed_transitions(&self) -> &'static [OtStatus] {
        match self {
            OtStatus::Iniciada => &[OtStatus::EmCarregamento, OtStatus::Cancelada],
            OtStatus::EmCarregamento => &[OtStatus::EmTransito, OtStatus::Cancelada],
            OtStatus::EmTransito => &[
                OtStatus::Entregue,
                OtStatus::EntregueParcial,
                OtStatus::Cancelada,
            ],
            OtStatus::Entregue | OtStatus::EntregueParcial | OtStatus::Cancelada => &[],
        }
    }

    pub fn can_transition_to(&self, next: OtStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OtStatus::Entregue | OtStatus::EntregueParcial | OtStatus::Cancelada
        )
    }

    /// Status de livraison: exigent au moins un fichier joint
    pub fn is_delivery(&self) -> bool {
        matches!(self, OtStatus::Entregue | OtStatus::EntregueParcial)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ordens_transporte")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub numero_ot: String,
    pub motorista_criador_id: i32,
    pub motorista_atual_id: i32,
    pub status: OtStatus,
    pub data_criacao: DateTimeUtc,
    pub data_atualizacao: DateTimeUtc,
    pub data_finalizacao: Option<DateTimeUtc>,
    pub cliente_nome: String,
    #[sea_orm(column_type = "Text")]
    pub endereco_entrega: String,
    pub cidade_entrega: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub observacoes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub observacoes_entrega: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 8)))", nullable)]
    pub latitude_origem: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((11, 8)))", nullable)]
    pub longitude_origem: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub endereco_origem: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 8)))", nullable)]
    pub latitude_entrega: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((11, 8)))", nullable)]
    pub longitude_entrega: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub endereco_entrega_real: Option<String>,
    pub ativa: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::MotoristaCriadorId",
        to = "super::users::Column::Id"
    )]
    MotoristaCriador,

    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::MotoristaAtualId",
        to = "super::users::Column::Id"
    )]
    MotoristaAtual,

    #[sea_orm(has_many = "super::arquivos::Entity")]
    Arquivos,

    #[sea_orm(has_many = "super::transferencias_ot::Entity")]
    Transferencias,

    #[sea_orm(has_many = "super::atualizacoes_ot::Entity")]
    Atualizacoes,
}

impl Related<super::arquivos::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Arquivos.def()
    }
}

impl Related<super::transferencias_ot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transferencias.def()
    }
}

impl Related<super::atualizacoes_ot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Atualizacoes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn can_be_edited(&self) -> bool {
        !self.status.is_final()
    }

    pub fn can_be_transferred(&self) -> bool {
        matches!(
            self.status,
            OtStatus::Iniciada | OtStatus::EmCarregamento | OtStatus::EmTransito
        )
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_final()
    }

    pub fn can_transition_to(&self, next: OtStatus) -> bool {
        self.status.can_transition_to(next)
    }
}

/// Numéro d'OT: "OT" + date + séquence sur 4 chiffres
pub fn format_numero(date: chrono::NaiveDate, sequence: u32) -> String {
    format!("OT{}{:04}", date.format("%Y%m%d"), sequence)
}

/// Dernière séquence représentable sur 4 chiffres
pub const MAX_DAILY_SEQUENCE: u32 = 9999;

/// Séquence suivante à partir du dernier numéro du jour (None -> 1).
/// Renvoie None quand le plafond journalier est atteint.
pub fn next_sequence(last_numero: Option<&str>) -> Option<u32> {
    let next = last_numero
        .and_then(|n| n.get(n.len().saturating_sub(4)..))
        .and_then(|seq| seq.parse::<u32>().ok())
        .map(|seq| seq + 1)
        .unwrap_or(1);
    (next <= MAX_DAILY_SEQUENCE).then_some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_transition_table() {
        use OtStatus::*;
        let allowed = [
            (Iniciada, EmCarregamento),
            (Iniciada, Cancelada),
            (EmCarregamento, EmTransito),
            (EmCarregamento, Cancelada),
            (EmTransito, Entregue),
            (EmTransito, EntregueParcial),
            (EmTransito, Cancelada),
        ];

        for from in OtStatus::iter() {
            for to in OtStatus::iter() {
                let expected = allowed.contains(&(from, to));
                assert_eq!(
                    from.can_transition_to(to),
                    expected,
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_final_states_have_no_exit() {
        for status in OtStatus::iter().filter(|s| s.is_final()) {
            assert!(status.allowed_transitions().is_empty());
        }
        assert!(!OtStatus::EmTransito.is_final());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OtStatus::EntregueParcial).unwrap(),
            "\"ENTREGUE_PARCIAL\""
        );
        assert_eq!(OtStatus::EmTransito.label(), "Em Trânsito");
    }

    #[test]
    fn test_numero_ot() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 4, 26).unwrap();
        assert_eq!(format_numero(date, 1), "OT202504260001");
        assert_eq!(next_sequence(None), Some(1));
        assert_eq!(next_sequence(Some("OT202504260009")), Some(10));
        assert_eq!(next_sequence(Some("garbage")), Some(1));
        assert_eq!(next_sequence(Some("OT202504269998")), Some(9999));
        // plafond: pas de suffixe à 5 chiffres
        assert_eq!(next_sequence(Some("OT202504269999")), None);
    }
}
