// Règles d'accès par rôle et par relation à l'OT.
// Fonctions pures: les services les appliquent après avoir chargé les modèles.

use crate::models::ordens_transporte;
use crate::models::transferencias_ot;
use crate::models::users::{self, UserRole};

/// logistica/admin voient tout; un motorista voit les OTs qu'il a créées ou qu'il porte
pub fn can_view_ot(user: &users::Model, ot: &ordens_transporte::Model) -> bool {
    user.can_view_all_ots() || ot.motorista_atual_id == user.id || ot.motorista_criador_id == user.id
}

/// Modification des champs d'observation / livraison
pub fn can_edit_ot(user: &users::Model, ot: &ordens_transporte::Model) -> bool {
    can_view_ot(user, ot) && ot.can_be_edited()
}

/// Changement de status et finalisation: motorista actuel ou gestionnaire
pub fn can_update_status(user: &users::Model, ot: &ordens_transporte::Model) -> bool {
    ot.can_be_edited() && (user.role.is_manager() || ot.motorista_atual_id == user.id)
}

/// Tout utilisateur actif peut demander le transfert d'une OT transférable;
/// le circuit d'approbation dépend ensuite de son rôle.
pub fn can_request_transfer(_user: &users::Model, ot: &ordens_transporte::Model) -> bool {
    ot.can_be_transferred()
}

pub fn can_upload_file(user: &users::Model, ot: &ordens_transporte::Model) -> bool {
    can_view_ot(user, ot)
}

/// Seuls les motoristas actifs créent des OTs
pub fn can_create_ot(user: &users::Model) -> bool {
    user.is_active && user.role == UserRole::Motorista
}

pub fn can_view_transfer(user: &users::Model, transfer: &transferencias_ot::Model) -> bool {
    user.role.is_manager() || transfer.involves(user.id)
}

/// logistica ne voit ni ne modifie les comptes admin
pub fn can_manage_account(actor: &users::Model, target: &users::Model) -> bool {
    match actor.role {
        UserRole::Admin => true,
        UserRole::Logistica => target.role != UserRole::Admin,
        UserRole::Motorista => false,
    }
}
