// ============================================================================
// MODÈLE : USERS
// ============================================================================
//
// Description:
//   Compte utilisateur identifié par son email. Trois profils:
//   motorista (chauffeur), logistica (équipe logistique) et admin.
//
// Colonnes de la table users:
//   - id (INTEGER, PRIMARY KEY)
//   - email (VARCHAR, UNIQUE) - toujours stocké en minuscules
//   - password_hash (VARCHAR) - format pbkdf2_sha256$iterations$salt$hash
//   - first_name / last_name (VARCHAR(30))
//   - cpf (VARCHAR(11), UNIQUE) - uniquement les 11 chiffres
//   - phone (VARCHAR(17), NULL)
//   - role (VARCHAR(20)) - motorista | logistica | admin
//   - is_active (BOOLEAN) - FALSE tant qu'un gestionnaire n'a pas activé le compte
//   - is_staff (BOOLEAN)
//   - date_joined (TIMESTAMP)
//   - cnh_numero / cnh_categoria / cnh_validade - obligatoires pour un motorista
//   - foto_perfil (VARCHAR, NULL) - chemin relatif du fichier
//
// Points d'attention:
//   - Le hash n'est jamais sérialisé en JSON
//   - Les noms de colonnes suivent le vocabulaire métier (CPF, CNH)
//
// ============================================================================

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "motorista")]
    Motorista,
    #[sea_orm(string_value = "logistica")]
    Logistica,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserRole {
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Motorista => "Motorista",
            UserRole::Logistica => "Logística",
            UserRole::Admin => "Administrador",
        }
    }

    /// logistica et admin gèrent les comptes et voient toutes les OTs
    pub fn is_manager(&self) -> bool {
        matches!(self, UserRole::Logistica | UserRole::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(2))")]
pub enum CnhCategoria {
    #[sea_orm(string_value = "A")]
    A,
    #[sea_orm(string_value = "B")]
    B,
    #[sea_orm(string_value = "AB")]
    AB,
    #[sea_orm(string_value = "C")]
    C,
    #[sea_orm(string_value = "D")]
    D,
    #[sea_orm(string_value = "E")]
    E,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(unique)]
    pub cpf: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTimeUtc,
    pub cnh_numero: Option<String>,
    pub cnh_categoria: Option<CnhCategoria>,
    pub cnh_validade: Option<Date>,
    pub foto_perfil: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::password_reset_tokens::Entity")]
    PasswordResetToken,
}

impl Related<super::password_reset_tokens::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PasswordResetToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Prénom + nom, sinon prénom seul, sinon l'email
    pub fn full_name(&self) -> String {
        let first = self.first_name.trim();
        let last = self.last_name.trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{} {}", first, last),
            (false, true) => first.to_string(),
            _ => self.email.clone(),
        }
    }

    pub fn short_name(&self) -> String {
        if self.first_name.trim().is_empty() {
            self.email.clone()
        } else {
            self.first_name.trim().to_string()
        }
    }

    /// CPF au format XXX.XXX.XXX-XX (inchangé s'il n'a pas 11 chiffres)
    pub fn cpf_formatted(&self) -> String {
        format_cpf(&self.cpf)
    }

    pub fn cnh_vencida(&self, today: NaiveDate) -> bool {
        self.cnh_validade.is_some_and(|validade| validade < today)
    }

    pub fn is_motorista(&self) -> bool {
        self.role == UserRole::Motorista
    }

    pub fn can_manage_users(&self) -> bool {
        self.role.is_manager()
    }

    pub fn can_view_all_ots(&self) -> bool {
        self.role.is_manager()
    }
}

pub fn format_cpf(cpf: &str) -> String {
    if cpf.len() == 11 && cpf.chars().all(|c| c.is_ascii_digit()) {
        format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11])
    } else {
        cpf.to_string()
    }
}

/// Garde uniquement les chiffres d'un CPF saisi ("123.456.789-09" -> "12345678909")
pub fn clean_cpf(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}
