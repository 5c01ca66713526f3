// ============================================================================
// MODÈLE : PASSWORD RESET TOKENS
// ============================================================================
//
// Description:
//   Code de réinitialisation à 6 chiffres, un seul par utilisateur.
//
// Colonnes de la table password_reset_tokens:
//   - id (INTEGER, PRIMARY KEY)
//   - user_id (INTEGER, UNIQUE, FK vers users)
//   - code_hash (VARCHAR) - HMAC-SHA256 du code, jamais le code en clair
//   - expires_at (TIMESTAMP) - created_at + 30 minutes
//   - attempts (INTEGER) - tentatives échouées
//   - used (BOOLEAN)
//   - created_at (TIMESTAMP)
//   - ip_address (VARCHAR, NULL) - IP de la demande
//
// Workflow:
//   1. POST /api/auth/password/reset : l'ancien token est supprimé, un nouveau créé
//   2. Le code est transmis par le notifier
//   3. POST /api/auth/password/check-code (optionnel) : vérifie sans consommer
//   4. POST /api/auth/password/confirm : change le mot de passe, used = true
//
// Points d'attention:
//   - Invalide si used, expiré ou attempts >= limite
//   - Un mauvais code incrémente attempts
//
// ============================================================================

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "password_reset_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub user_id: i32,

    #[serde(skip_serializing)]
    pub code_hash: String,

    pub expires_at: DateTimeUtc,

    pub attempts: i32,

    pub used: bool,

    pub created_at: DateTimeUtc,

    pub ip_address: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_valid(&self, now: DateTime<Utc>, max_attempts: i32) -> bool {
        !self.used && !self.is_expired(now) && self.attempts < max_attempts
    }

    /// Minutes restantes avant expiration (0 si expiré)
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_minutes().max(0)
    }
}
