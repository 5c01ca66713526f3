// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table créée par db::create_schema.
//
// Liste des modules:
//   - health : Health check API
//   - dto : Enveloppe de réponse et vues des utilisateurs
//   - users : Comptes (motorista, logistica, admin)
//   - password_reset_tokens : Codes de réinitialisation (expire 30 min)
//   - ordens_transporte : Ordres de transport (OT)
//   - arquivos : Fichiers joints aux OTs
//   - transferencias_ot : Transferts d'OT entre motoristas
//   - atualizacoes_ot : Journal des événements d'une OT
//
// ============================================================================

pub mod health;
pub mod dto;
pub mod users;
pub mod password_reset_tokens;
pub mod ordens_transporte;
pub mod arquivos;
pub mod transferencias_ot;
pub mod atualizacoes_ot;
