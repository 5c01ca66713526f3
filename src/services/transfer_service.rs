use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::*;
use validator::Validate;

use crate::error::{AppError, AppResult, FieldErrors, field_errors};
use crate::models::atualizacoes_ot::TipoAtualizacao;
use crate::models::dto::{
    MyTransfersResponse, TransferActionRequest, TransferActions, TransferDetailResponse,
    TransferOutcome, TransferRequest, TransferResponse,
};
use crate::models::transferencias_ot::{self, TransferStatus};
use crate::models::users::{self, UserRole};
use crate::models::ordens_transporte;
use crate::services::audit::AuditEntry;
use crate::services::ot_service::{check_coordinates, find_ot, transfer_user_ids};
use crate::services::permissions;
use crate::services::user_service::user_map;

const OPEN_STATUSES: [TransferStatus; 2] = [TransferStatus::Pendente, TransferStatus::AguardandoAceitacao];

pub struct TransferService;

impl TransferService {
    /// Demande de transfert; le circuit dépend du rôle du demandeur:
    /// logistica/admin -> APROVADA, motorista actuel -> AGUARDANDO_ACEITACAO, autre -> PENDENTE
    pub async fn request(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
        request: TransferRequest,
    ) -> AppResult<TransferOutcome> {
        let ot = find_ot(db, ot_id).await?;

        // 1. Payload
        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        check_coordinates(
            &mut errors,
            ("latitude", request.latitude),
            ("longitude", request.longitude),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // 2. OT transférable
        if !permissions::can_request_transfer(user, &ot) {
            return Err(AppError::bad_request(format!(
                "Esta OT não pode ser transferida (status: {}).",
                ot.status.label()
            )));
        }

        // 3. Destinataire: motorista actif, différent du motorista actuel
        let destino = users::Entity::find_by_id(request.motorista_destino)
            .one(db)
            .await?
            .filter(|u| u.is_active && u.role == UserRole::Motorista && u.id != ot.motorista_atual_id)
            .ok_or_else(|| AppError::field("motorista_destino", "Motorista não encontrado ou inativo."))?;

        // 4. Une seule demande ouverte par OT
        let open = transferencias_ot::Entity::find()
            .filter(transferencias_ot::Column::OrdemTransporteId.eq(ot.id))
            .filter(transferencias_ot::Column::Status.is_in(OPEN_STATUSES))
            .count(db)
            .await?;
        if open > 0 {
            return Err(AppError::bad_request(
                "Já existe uma transferência em andamento para esta OT.",
            ));
        }

        let status = if user.role.is_manager() {
            TransferStatus::Aprovada
        } else if user.id == ot.motorista_atual_id {
            TransferStatus::AguardandoAceitacao
        } else {
            TransferStatus::Pendente
        };

        let now = Utc::now();
        let txn = db.begin().await?;

        let transfer = transferencias_ot::ActiveModel {
            ordem_transporte_id: Set(ot.id),
            motorista_origem_id: Set(ot.motorista_atual_id),
            motorista_destino_id: Set(destino.id),
            solicitado_por_id: Set(user.id),
            aprovado_por_id: Set((status == TransferStatus::Aprovada).then_some(user.id)),
            status: Set(status),
            motivo: Set(request.motivo.trim().to_string()),
            observacao_aprovacao: Set(None),
            data_solicitacao: Set(now),
            data_resposta: Set((status == TransferStatus::Aprovada).then_some(now)),
            latitude: Set(request.latitude),
            longitude: Set(request.longitude),
            endereco: Set(request.endereco),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let users = user_map(&txn, transfer_user_ids(&transfer)).await?;

        let aplicada = status == TransferStatus::Aprovada;
        if aplicada {
            apply_transfer(
                &txn,
                &transfer,
                user.id,
                format!(
                    "OT transferida de {} para {}",
                    full_name(&users, transfer.motorista_origem_id),
                    full_name(&users, transfer.motorista_destino_id)
                ),
                format!(
                    "{} (Aprovada automaticamente por {})",
                    transfer.motivo,
                    user.role.label()
                ),
            )
            .await?;
        }

        txn.commit().await?;

        tracing::info!(
            transfer_id = transfer.id,
            numero_ot = %ot.numero_ot,
            user_id = user.id,
            destino_id = destino.id,
            status = ?status,
            "transfer requested"
        );

        Ok(TransferOutcome {
            status,
            aplicada,
            transferencia: TransferResponse::build(transfer, &users),
        })
    }

    /// Acceptation par le motorista de destination
    pub async fn accept(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
        request: TransferActionRequest,
    ) -> AppResult<TransferResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        expect_status(&transfer, &[TransferStatus::AguardandoAceitacao], "aceitas")?;
        if !transfer.can_be_accepted_by(user) {
            return Err(refused(user, &transfer, "Apenas o motorista de destino pode aceitar a transferência."));
        }

        let observacao = non_empty(request.observacao)
            .unwrap_or_else(|| "Transferência aceita pelo motorista de destino".to_string());

        let txn = db.begin().await?;
        let transfer = respond(&txn, &transfer, TransferStatus::Aprovada, user.id, observacao.clone()).await?;
        let users = user_map(&txn, transfer_user_ids(&transfer)).await?;
        apply_transfer(
            &txn,
            &transfer,
            user.id,
            format!(
                "Transferência aceita: OT passou de {} para {}",
                full_name(&users, transfer.motorista_origem_id),
                full_name(&users, transfer.motorista_destino_id)
            ),
            observacao,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(transfer_id = transfer.id, user_id = user.id, "transfer accepted");
        Ok(TransferResponse::build(transfer, &users))
    }

    /// Refus par le motorista de destination (observation obligatoire)
    pub async fn refuse(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
        request: TransferActionRequest,
    ) -> AppResult<TransferResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        expect_status(&transfer, &[TransferStatus::AguardandoAceitacao], "recusadas")?;
        if !transfer.can_be_refused_by(user) {
            return Err(refused(user, &transfer, "Apenas o motorista de destino pode recusar a transferência."));
        }
        let observacao = non_empty(request.observacao).ok_or_else(|| {
            AppError::field("observacao", "Observação é obrigatória para recusar a transferência.")
        })?;

        let transfer = respond(db, &transfer, TransferStatus::Rejeitada, user.id, observacao).await?;

        tracing::info!(transfer_id = transfer.id, user_id = user.id, "transfer refused");
        Self::build(db, transfer).await
    }

    /// Approbation d'une demande PENDENTE par logistica/admin
    pub async fn approve(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
        request: TransferActionRequest,
    ) -> AppResult<TransferResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        expect_status(&transfer, &[TransferStatus::Pendente], "aprovadas")?;
        if !transfer.can_be_approved_by(user) {
            return Err(refused(user, &transfer, "Apenas logística ou admin podem aprovar transferências."));
        }

        let observacao =
            non_empty(request.observacao).unwrap_or_else(|| "Aprovada pela logística".to_string());

        let txn = db.begin().await?;
        let transfer = respond(&txn, &transfer, TransferStatus::Aprovada, user.id, observacao.clone()).await?;
        let users = user_map(&txn, transfer_user_ids(&transfer)).await?;
        apply_transfer(
            &txn,
            &transfer,
            user.id,
            format!(
                "Transferência aprovada pela logística: {} → {}",
                full_name(&users, transfer.motorista_origem_id),
                full_name(&users, transfer.motorista_destino_id)
            ),
            observacao,
        )
        .await?;
        txn.commit().await?;

        tracing::info!(transfer_id = transfer.id, user_id = user.id, "transfer approved");
        Ok(TransferResponse::build(transfer, &users))
    }

    pub async fn reject(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
        request: TransferActionRequest,
    ) -> AppResult<TransferResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        expect_status(&transfer, &[TransferStatus::Pendente], "rejeitadas")?;
        if !transfer.can_be_approved_by(user) {
            return Err(refused(user, &transfer, "Apenas logística ou admin podem rejeitar transferências."));
        }
        let observacao = non_empty(request.observacao).ok_or_else(|| {
            AppError::field("observacao", "Observação é obrigatória para rejeitar a transferência.")
        })?;

        let transfer = respond(db, &transfer, TransferStatus::Rejeitada, user.id, observacao).await?;

        tracing::info!(transfer_id = transfer.id, user_id = user.id, "transfer rejected");
        Self::build(db, transfer).await
    }

    /// Annulation par le demandeur, le motorista d'origine ou la logistique
    pub async fn cancel(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
        request: TransferActionRequest,
    ) -> AppResult<TransferResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        expect_status(&transfer, &OPEN_STATUSES, "canceladas")?;
        if !transfer.can_be_cancelled_by(user) {
            return Err(refused(user, &transfer, "Você não tem permissão para cancelar esta transferência."));
        }

        let observacao =
            non_empty(request.observacao).unwrap_or_else(|| "Transferência cancelada".to_string());
        let transfer = respond(db, &transfer, TransferStatus::Cancelada, user.id, observacao).await?;

        tracing::info!(transfer_id = transfer.id, user_id = user.id, "transfer cancelled");
        Self::build(db, transfer).await
    }

    pub async fn detail(
        db: &DatabaseConnection,
        user: &users::Model,
        transfer_id: i32,
    ) -> AppResult<TransferDetailResponse> {
        let transfer = find_transfer(db, transfer_id).await?;
        if !permissions::can_view_transfer(user, &transfer) {
            return Err(refused(user, &transfer, "Você não tem permissão para ver esta transferência."));
        }

        let ot = find_ot(db, transfer.ordem_transporte_id).await?;
        let acoes = TransferActions {
            pode_aceitar: transfer.can_be_accepted_by(user),
            pode_recusar: transfer.can_be_refused_by(user),
            pode_cancelar: transfer.can_be_cancelled_by(user),
            pode_aprovar: transfer.can_be_approved_by(user),
            horas_desde_solicitacao: (Utc::now() - transfer.data_solicitacao).num_hours(),
        };

        Ok(TransferDetailResponse {
            transferencia: Self::build(db, transfer).await?,
            numero_ot: ot.numero_ot,
            acoes,
        })
    }

    /// Transferts ouverts qui concernent l'utilisateur, groupés par action attendue
    pub async fn mine(db: &DatabaseConnection, user: &users::Model) -> AppResult<MyTransfersResponse> {
        let transfers = transferencias_ot::Entity::find()
            .filter(transferencias_ot::Column::Status.is_in(OPEN_STATUSES))
            .filter(
                Condition::any()
                    .add(transferencias_ot::Column::MotoristaDestinoId.eq(user.id))
                    .add(transferencias_ot::Column::SolicitadoPorId.eq(user.id))
                    .add(transferencias_ot::Column::MotoristaOrigemId.eq(user.id)),
            )
            .order_by_desc(transferencias_ot::Column::DataSolicitacao)
            .order_by_desc(transferencias_ot::Column::Id)
            .all(db)
            .await?;

        // Le destinataire ne voit une demande PENDENTE qu'une fois approuvée
        let transfers: Vec<_> = transfers
            .into_iter()
            .filter(|t| {
                t.motorista_destino_id != user.id
                    || t.status == TransferStatus::AguardandoAceitacao
                    || t.solicitado_por_id == user.id
                    || t.motorista_origem_id == user.id
            })
            .collect();

        let users = user_map(db, transfers.iter().flat_map(transfer_user_ids)).await?;

        let mut para_aceitar = Vec::new();
        let mut aguardando_aprovacao = Vec::new();
        let mut minhas_aguardando_resposta = Vec::new();
        for t in &transfers {
            match t.status {
                TransferStatus::AguardandoAceitacao if t.motorista_destino_id == user.id => {
                    para_aceitar.push(TransferResponse::build(t.clone(), &users))
                }
                TransferStatus::AguardandoAceitacao if t.motorista_origem_id == user.id => {
                    minhas_aguardando_resposta.push(TransferResponse::build(t.clone(), &users))
                }
                TransferStatus::Pendente => {
                    aguardando_aprovacao.push(TransferResponse::build(t.clone(), &users))
                }
                _ => {}
            }
        }
        let todas: Vec<TransferResponse> = transfers
            .into_iter()
            .map(|t| TransferResponse::build(t, &users))
            .collect();

        let contadores = BTreeMap::from([
            ("para_aceitar", para_aceitar.len()),
            ("aguardando_aprovacao", aguardando_aprovacao.len()),
            ("minhas_aguardando_resposta", minhas_aguardando_resposta.len()),
            ("total", todas.len()),
        ]);

        Ok(MyTransfersResponse {
            para_aceitar,
            aguardando_aprovacao,
            minhas_aguardando_resposta,
            todas,
            contadores,
        })
    }

    async fn build(
        db: &DatabaseConnection,
        transfer: transferencias_ot::Model,
    ) -> AppResult<TransferResponse> {
        let users = user_map(db, transfer_user_ids(&transfer)).await?;
        Ok(TransferResponse::build(transfer, &users))
    }
}

pub async fn find_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer_id: i32,
) -> AppResult<transferencias_ot::Model> {
    transferencias_ot::Entity::find_by_id(transfer_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Transferência não encontrada."))
}

fn expect_status(
    transfer: &transferencias_ot::Model,
    expected: &[TransferStatus],
    action: &str,
) -> AppResult<()> {
    if expected.contains(&transfer.status) {
        return Ok(());
    }
    let wanted = expected
        .iter()
        .map(|s| s.label().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ou ");
    Err(AppError::bad_request(format!(
        "Apenas transferências com status {} podem ser {}. Status atual: {}",
        wanted,
        action,
        transfer.status.label()
    )))
}

fn refused(user: &users::Model, transfer: &transferencias_ot::Model, message: &str) -> AppError {
    tracing::warn!(user_id = user.id, transfer_id = transfer.id, "transfer action refused");
    AppError::forbidden(message)
}

/// Enregistre la réponse si la transfert est toujours dans le status lu
async fn respond<C: ConnectionTrait>(
    conn: &C,
    transfer: &transferencias_ot::Model,
    next: TransferStatus,
    actor_id: i32,
    observacao: String,
) -> AppResult<transferencias_ot::Model> {
    let result = transferencias_ot::Entity::update_many()
        .set(transferencias_ot::ActiveModel {
            status: Set(next),
            aprovado_por_id: Set(Some(actor_id)),
            data_resposta: Set(Some(Utc::now())),
            observacao_aprovacao: Set(Some(observacao)),
            ..Default::default()
        })
        .filter(transferencias_ot::Column::Id.eq(transfer.id))
        .filter(transferencias_ot::Column::Status.eq(transfer.status))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::bad_request("Esta transferência já foi respondida."));
    }
    find_transfer(conn, transfer.id).await
}

/// Passe l'OT au motorista de destination et journalise
async fn apply_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer: &transferencias_ot::Model,
    actor_id: i32,
    descricao: String,
    observacao: String,
) -> AppResult<ordens_transporte::Model> {
    let ot = find_ot(conn, transfer.ordem_transporte_id).await?;
    if !ot.can_be_transferred() {
        return Err(AppError::bad_request(format!(
            "Esta OT não pode mais ser transferida (status: {}).",
            ot.status.label()
        )));
    }

    let mut active: ordens_transporte::ActiveModel = ot.into();
    active.motorista_atual_id = Set(transfer.motorista_destino_id);
    active.data_atualizacao = Set(Utc::now());
    let ot = active.update(conn).await?;

    AuditEntry::new(ot.id, actor_id, TipoAtualizacao::Transferencia, descricao)
        .observacao(Some(observacao))
        .location(transfer.latitude, transfer.longitude, transfer.endereco.clone())
        .record(conn)
        .await?;

    Ok(ot)
}

fn full_name(users: &HashMap<i32, users::Model>, id: i32) -> String {
    users
        .get(&id)
        .map(|u| u.full_name())
        .unwrap_or_else(|| format!("#{}", id))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dto::StatusUpdateRequest;
    use crate::models::ordens_transporte::OtStatus;
    use crate::services::audit;
    use crate::services::ot_service::OtService;
    use crate::test_utils::{create_ot, create_user, setup_db};

    fn transfer_to(destino: &users::Model) -> TransferRequest {
        TransferRequest {
            motorista_destino: destino.id,
            motivo: "Troca de turno".to_string(),
            latitude: None,
            longitude: None,
            endereco: Some("Posto Graal, km 120".to_string()),
        }
    }

    fn with_obs(obs: &str) -> TransferActionRequest {
        TransferActionRequest { observacao: Some(obs.to_string()) }
    }

    struct Fixture {
        db: DatabaseConnection,
        ana: users::Model,
        bia: users::Model,
        caio: users::Model,
        logistica: users::Model,
        ot: ordens_transporte::Model,
    }

    async fn fixture() -> Fixture {
        let db = setup_db().await;
        let ana = create_user(&db, UserRole::Motorista, "ana@logitrack.com").await;
        let bia = create_user(&db, UserRole::Motorista, "bia@logitrack.com").await;
        let caio = create_user(&db, UserRole::Motorista, "caio@logitrack.com").await;
        let logistica = create_user(&db, UserRole::Logistica, "log@logitrack.com").await;
        let ot = create_ot(&db, &ana).await;
        Fixture { db, ana, bia, caio, logistica, ot }
    }

    async fn current_driver(db: &DatabaseConnection, ot_id: i32) -> i32 {
        find_ot(db, ot_id).await.unwrap().motorista_atual_id
    }

    #[tokio::test]
    async fn test_manager_transfer_is_applied_immediately() {
        let f = fixture().await;
        let outcome = TransferService::request(&f.db, &f.logistica, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap();

        assert!(outcome.aplicada);
        assert_eq!(outcome.status, TransferStatus::Aprovada);
        assert_eq!(outcome.transferencia.transferencia.aprovado_por_id, Some(f.logistica.id));
        assert!(outcome.transferencia.transferencia.data_resposta.is_some());
        assert_eq!(current_driver(&f.db, f.ot.id).await, f.bia.id);

        let last = audit::history(&f.db, f.ot.id, Some(1)).await.unwrap().remove(0);
        assert_eq!(last.tipo, TipoAtualizacao::Transferencia);
        assert!(last.observacao.unwrap().contains("Aprovada automaticamente por"));
    }

    #[tokio::test]
    async fn test_driver_transfer_waits_for_acceptance() {
        let f = fixture().await;
        let outcome = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap();
        assert_eq!(outcome.status, TransferStatus::AguardandoAceitacao);
        assert!(!outcome.aplicada);
        let id = outcome.transferencia.transferencia.id;

        // un seul transfert ouvert par OT
        let err = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.caio))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        // seul le destinataire accepte
        let err = TransferService::accept(&f.db, &f.caio, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = TransferService::accept(&f.db, &f.logistica, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let accepted = TransferService::accept(&f.db, &f.bia, id, TransferActionRequest::default())
            .await
            .unwrap();
        assert_eq!(accepted.transferencia.status, TransferStatus::Aprovada);
        assert_eq!(
            accepted.transferencia.observacao_aprovacao.as_deref(),
            Some("Transferência aceita pelo motorista de destino")
        );
        assert_eq!(current_driver(&f.db, f.ot.id).await, f.bia.id);

        // état terminal
        let err = TransferService::cancel(&f.db, &f.ana, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_refusal_keeps_driver_and_needs_observation() {
        let f = fixture().await;
        let id = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap()
            .transferencia
            .transferencia
            .id;

        let err = TransferService::refuse(&f.db, &f.bia, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref fields) if fields.contains_key("observacao")));

        let refused = TransferService::refuse(&f.db, &f.bia, id, with_obs("Estou de folga"))
            .await
            .unwrap();
        assert_eq!(refused.transferencia.status, TransferStatus::Rejeitada);
        assert_eq!(refused.transferencia.aprovado_por_id, Some(f.bia.id));
        assert_eq!(current_driver(&f.db, f.ot.id).await, f.ana.id);
    }

    #[tokio::test]
    async fn test_third_party_request_needs_manager_approval() {
        let f = fixture().await;
        let outcome = TransferService::request(&f.db, &f.caio, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap();
        assert_eq!(outcome.status, TransferStatus::Pendente);
        let id = outcome.transferencia.transferencia.id;

        // le destinataire ne peut pas accepter une demande PENDENTE
        let err = TransferService::accept(&f.db, &f.bia, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = TransferService::approve(&f.db, &f.ana, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let approved = TransferService::approve(&f.db, &f.logistica, id, TransferActionRequest::default())
            .await
            .unwrap();
        assert_eq!(approved.transferencia.observacao_aprovacao.as_deref(), Some("Aprovada pela logística"));
        assert_eq!(current_driver(&f.db, f.ot.id).await, f.bia.id);
    }

    #[tokio::test]
    async fn test_reject_and_cancel() {
        let f = fixture().await;
        let pending = TransferService::request(&f.db, &f.caio, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap()
            .transferencia
            .transferencia
            .id;

        let err = TransferService::reject(&f.db, &f.logistica, pending, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let rejected = TransferService::reject(&f.db, &f.logistica, pending, with_obs("Sem justificativa"))
            .await
            .unwrap();
        assert_eq!(rejected.transferencia.status, TransferStatus::Rejeitada);

        let direct = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap()
            .transferencia
            .transferencia
            .id;
        let err = TransferService::cancel(&f.db, &f.caio, direct, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let cancelled = TransferService::cancel(&f.db, &f.ana, direct, TransferActionRequest::default())
            .await
            .unwrap();
        assert_eq!(cancelled.transferencia.status, TransferStatus::Cancelada);
        assert_eq!(cancelled.transferencia.observacao_aprovacao.as_deref(), Some("Transferência cancelada"));
        assert_eq!(current_driver(&f.db, f.ot.id).await, f.ana.id);
    }

    #[tokio::test]
    async fn test_invalid_destination_and_finished_ot() {
        let f = fixture().await;

        // destinataire = motorista actuel
        let err = TransferService::request(&f.db, &f.logistica, f.ot.id, transfer_to(&f.ana))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref fields) if fields.contains_key("motorista_destino")));

        // destinataire non motorista
        let err = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.logistica))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        OtService::update_status(
            &f.db,
            &f.ana,
            f.ot.id,
            StatusUpdateRequest {
                status: OtStatus::Cancelada,
                observacao: None,
                latitude: None,
                longitude: None,
                endereco: None,
            },
        )
        .await
        .unwrap();
        let err = TransferService::request(&f.db, &f.logistica, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_acceptance_fails_once_ot_is_finished() {
        let f = fixture().await;
        let id = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap()
            .transferencia
            .transferencia
            .id;
        OtService::update_status(
            &f.db,
            &f.ana,
            f.ot.id,
            StatusUpdateRequest {
                status: OtStatus::Cancelada,
                observacao: None,
                latitude: None,
                longitude: None,
                endereco: None,
            },
        )
        .await
        .unwrap();

        let err = TransferService::accept(&f.db, &f.bia, id, TransferActionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        // la transaction est annulée: la demande reste ouverte
        let transfer = find_transfer(&f.db, id).await.unwrap();
        assert_eq!(transfer.status, TransferStatus::AguardandoAceitacao);
    }

    #[tokio::test]
    async fn test_detail_and_mine() {
        let f = fixture().await;
        let id = TransferService::request(&f.db, &f.ana, f.ot.id, transfer_to(&f.bia))
            .await
            .unwrap()
            .transferencia
            .transferencia
            .id;

        let detail = TransferService::detail(&f.db, &f.bia, id).await.unwrap();
        assert!(detail.acoes.pode_aceitar);
        assert!(!detail.acoes.pode_aprovar);
        assert_eq!(detail.numero_ot, f.ot.numero_ot);

        let err = TransferService::detail(&f.db, &f.caio, id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let bia = TransferService::mine(&f.db, &f.bia).await.unwrap();
        assert_eq!(bia.para_aceitar.len(), 1);
        assert_eq!(bia.contadores["total"], 1);

        let ana = TransferService::mine(&f.db, &f.ana).await.unwrap();
        assert_eq!(ana.minhas_aguardando_resposta.len(), 1);
        assert!(ana.para_aceitar.is_empty());

        let caio = TransferService::mine(&f.db, &f.caio).await.unwrap();
        assert_eq!(caio.contadores["total"], 0);
    }
}
