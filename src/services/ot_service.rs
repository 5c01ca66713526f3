use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::*;
use validator::Validate;

use crate::error::{AppError, AppResult, FieldErrors, field_errors, push_error};
use crate::models::atualizacoes_ot::TipoAtualizacao;
use crate::models::dto::{
    ArquivoResponse, AtualizacaoResponse, CanCreateResponse, CreateOtRequest, FinalizeRequest,
    MotoristaCount, OtDetailResponse, OtListQuery, OtListResponse, OtResponse, OtStatsResponse,
    SearchQuery, StatsPeriodo, StatsResumo, StatusCount, StatusUpdateRequest, TimelineEvent,
    TransferResponse, UpdateOtRequest, UserSummary,
};
use crate::models::ordens_transporte::{self, OtStatus, format_numero, next_sequence};
use crate::models::{arquivos, atualizacoes_ot, transferencias_ot, users};
use crate::services::audit::{self, AuditEntry};
use crate::services::permissions;
use crate::services::user_service::user_map;

const SEARCH_LIMIT: u64 = 50;
const DETAIL_HISTORY: u64 = 10;

pub struct OtService;

impl OtService {
    /// Création d'une OT par un motorista actif sans OT en cours
    pub async fn create(
        db: &DatabaseConnection,
        user: &users::Model,
        request: CreateOtRequest,
    ) -> AppResult<ordens_transporte::Model> {
        // 1. Rôle
        if !permissions::can_create_ot(user) {
            tracing::warn!(user_id = user.id, role = ?user.role, "OT creation refused");
            return Err(AppError::forbidden(
                "Apenas motoristas ativos podem criar Ordens de Transporte.",
            ));
        }

        // 2. Payload
        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };
        check_coordinates(
            &mut errors,
            ("latitude_origem", request.latitude_origem),
            ("longitude_origem", request.longitude_origem),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // 3. Une seule OT en cours par motorista
        if let Some(ativa) = Self::open_ot_for(db, user.id).await? {
            return Err(AppError::bad_request(format!(
                "Você já possui uma Ordem de Transporte ativa ({}). Finalize-a antes de criar uma nova.",
                ativa.numero_ot
            )));
        }

        // 4. Numéro + insertion + journal dans une transaction
        let now = Utc::now();
        let txn = db.begin().await?;

        let prefix = format!("OT{}", now.date_naive().format("%Y%m%d"));
        let last = ordens_transporte::Entity::find()
            .filter(ordens_transporte::Column::NumeroOt.starts_with(&prefix))
            .order_by_desc(ordens_transporte::Column::NumeroOt)
            .one(&txn)
            .await?;
        let sequence = next_sequence(last.as_ref().map(|ot| ot.numero_ot.as_str()))
            .ok_or_else(|| AppError::bad_request("Limite diário de OTs atingido."))?;
        let numero_ot = format_numero(now.date_naive(), sequence);

        let cliente_nome = request.cliente_nome.trim().to_string();
        let ot = ordens_transporte::ActiveModel {
            numero_ot: Set(numero_ot),
            motorista_criador_id: Set(user.id),
            motorista_atual_id: Set(user.id),
            status: Set(OtStatus::Iniciada),
            data_criacao: Set(now),
            data_atualizacao: Set(now),
            data_finalizacao: Set(None),
            cliente_nome: Set(cliente_nome.clone()),
            endereco_entrega: Set(request.endereco_entrega.trim().to_string()),
            cidade_entrega: Set(request.cidade_entrega.trim().to_string()),
            observacoes: Set(request.observacoes),
            observacoes_entrega: Set(None),
            latitude_origem: Set(request.latitude_origem),
            longitude_origem: Set(request.longitude_origem),
            endereco_origem: Set(request.endereco_origem.clone()),
            latitude_entrega: Set(None),
            longitude_entrega: Set(None),
            endereco_entrega_real: Set(None),
            ativa: Set(true),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut entry = AuditEntry::new(
            ot.id,
            user.id,
            TipoAtualizacao::Status,
            format!("OT criada com status {}", OtStatus::Iniciada.label()),
        )
        .observacao(Some(format!("Cliente: {}", cliente_nome)))
        .location(ot.latitude_origem, ot.longitude_origem, request.endereco_origem);
        entry.status_novo = Some(OtStatus::Iniciada);
        entry.record(&txn).await?;

        txn.commit().await?;

        tracing::info!(numero_ot = %ot.numero_ot, user_id = user.id, "OT created");
        Ok(ot)
    }

    pub async fn can_create(db: &DatabaseConnection, user: &users::Model) -> AppResult<CanCreateResponse> {
        if !permissions::can_create_ot(user) {
            return Ok(CanCreateResponse {
                pode_criar: false,
                motivo: Some("Apenas motoristas ativos podem criar Ordens de Transporte.".to_string()),
                ot_ativa: None,
            });
        }

        match Self::open_ot_for(db, user.id).await? {
            Some(ot) => {
                let mut responses = Self::to_responses(db, vec![ot]).await?;
                Ok(CanCreateResponse {
                    pode_criar: false,
                    motivo: Some(
                        "Você já possui uma Ordem de Transporte ativa. Finalize-a antes de criar uma nova."
                            .to_string(),
                    ),
                    ot_ativa: responses.pop(),
                })
            }
            None => Ok(CanCreateResponse {
                pode_criar: true,
                motivo: None,
                ot_ativa: None,
            }),
        }
    }

    /// OTs visibles, plus récentes d'abord, avec le décompte par status
    pub async fn list(
        db: &DatabaseConnection,
        user: &users::Model,
        query: OtListQuery,
    ) -> AppResult<OtListResponse> {
        let mut select = visible_ots(user);
        if let Some(status) = query.status {
            select = select.filter(ordens_transporte::Column::Status.eq(status));
        }
        // Filtre par motorista réservé à la logistique
        if let (Some(motorista), true) = (query.motorista, user.can_view_all_ots()) {
            select = select.filter(ordens_transporte::Column::MotoristaAtualId.eq(motorista));
        }

        let ots = select
            .order_by_desc(ordens_transporte::Column::DataCriacao)
            .order_by_desc(ordens_transporte::Column::Id)
            .all(db)
            .await?;

        let mut por_status: BTreeMap<OtStatus, u64> = OtStatus::iter().map(|s| (s, 0)).collect();
        for ot in &ots {
            *por_status.entry(ot.status).or_default() += 1;
        }

        let ots = Self::to_responses(db, ots).await?;
        Ok(OtListResponse { total: ots.len(), por_status, ots })
    }

    /// Charge une OT et vérifie que l'utilisateur peut la voir
    pub async fn get_visible(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
    ) -> AppResult<ordens_transporte::Model> {
        let ot = find_ot(db, ot_id).await?;
        if !permissions::can_view_ot(user, &ot) {
            tracing::warn!(user_id = user.id, numero_ot = %ot.numero_ot, "OT access refused");
            return Err(AppError::forbidden(
                "Você só pode acessar suas próprias OTs ou ser da equipe de logística/admin.",
            ));
        }
        Ok(ot)
    }

    pub async fn detail(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
    ) -> AppResult<OtDetailResponse> {
        let ot = Self::get_visible(db, user, ot_id).await?;

        let files = arquivos::Entity::find()
            .filter(arquivos::Column::OrdemTransporteId.eq(ot.id))
            .order_by_desc(arquivos::Column::DataEnvio)
            .all(db)
            .await?;
        let transfers = transferencias_ot::Entity::find()
            .filter(transferencias_ot::Column::OrdemTransporteId.eq(ot.id))
            .order_by_desc(transferencias_ot::Column::DataSolicitacao)
            .all(db)
            .await?;
        let history = audit::history(db, ot.id, Some(DETAIL_HISTORY)).await?;

        let users = user_map(
            db,
            [ot.motorista_criador_id, ot.motorista_atual_id]
                .into_iter()
                .chain(files.iter().map(|a| a.enviado_por_id))
                .chain(transfers.iter().flat_map(transfer_user_ids))
                .chain(history.iter().map(|h| h.usuario_id)),
        )
        .await?;

        let mut arquivos_por_tipo = BTreeMap::new();
        for file in &files {
            *arquivos_por_tipo.entry(file.tipo).or_insert(0) += 1;
        }

        Ok(OtDetailResponse {
            ot: OtResponse::build(ot, &users),
            total_arquivos: files.len(),
            arquivos_por_tipo,
            arquivos: files.into_iter().map(|a| ArquivoResponse::build(a, &users)).collect(),
            transferencias: transfers
                .into_iter()
                .map(|t| TransferResponse::build(t, &users))
                .collect(),
            atualizacoes: history
                .into_iter()
                .map(|h| atualizacao_response(h, &users))
                .collect(),
        })
    }

    /// Mise à jour des observations / position de livraison, status optionnel
    pub async fn update(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
        request: UpdateOtRequest,
    ) -> AppResult<ordens_transporte::Model> {
        let ot = Self::get_visible(db, user, ot_id).await?;
        if !permissions::can_edit_ot(user, &ot) {
            return Err(AppError::bad_request("Esta OT não pode mais ser editada."));
        }

        let mut errors = FieldErrors::new();
        check_coordinates(
            &mut errors,
            ("latitude_entrega", request.latitude_entrega),
            ("longitude_entrega", request.longitude_entrega),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now();
        let txn = db.begin().await?;

        let observacoes_changed = (request.observacoes.is_some()
            && request.observacoes != ot.observacoes)
            || (request.observacoes_entrega.is_some()
                && request.observacoes_entrega != ot.observacoes_entrega);

        if let Some(next) = request.status {
            if !permissions::can_update_status(user, &ot) {
                return Err(AppError::forbidden(
                    "Apenas o motorista atual ou a logística podem alterar o status.",
                ));
            }
            ensure_transition(&txn, &ot, next).await?;
        }

        let previous = ot.status;
        let mut active: ordens_transporte::ActiveModel = ot.clone().into();
        if let Some(observacoes) = request.observacoes {
            active.observacoes = Set(Some(observacoes));
        }
        if let Some(observacoes_entrega) = request.observacoes_entrega {
            active.observacoes_entrega = Set(Some(observacoes_entrega));
        }
        if request.latitude_entrega.is_some() {
            active.latitude_entrega = Set(request.latitude_entrega);
        }
        if request.longitude_entrega.is_some() {
            active.longitude_entrega = Set(request.longitude_entrega);
        }
        if request.endereco_entrega_real.is_some() {
            active.endereco_entrega_real = Set(request.endereco_entrega_real);
        }
        if let Some(next) = request.status {
            set_status(&mut active, next, now);
        }
        active.data_atualizacao = Set(now);
        let updated = save_if_status(&txn, active, ot.id, previous).await?;

        if observacoes_changed {
            AuditEntry::new(updated.id, user.id, TipoAtualizacao::Observacao, "Observações atualizadas")
                .observacao(updated.observacoes_entrega.clone().or(updated.observacoes.clone()))
                .record(&txn)
                .await?;
        }
        if let Some(next) = request.status {
            status_entry(&updated, user.id, previous, next, None)
                .record(&txn)
                .await?;
        }

        txn.commit().await?;

        tracing::info!(numero_ot = %updated.numero_ot, user_id = user.id, "OT updated");
        Ok(updated)
    }

    /// PATCH /ots/{id}/status
    pub async fn update_status(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
        request: StatusUpdateRequest,
    ) -> AppResult<ordens_transporte::Model> {
        let ot = Self::get_visible(db, user, ot_id).await?;
        check_status_permission(user, &ot)?;

        let mut errors = FieldErrors::new();
        check_coordinates(
            &mut errors,
            ("latitude", request.latitude),
            ("longitude", request.longitude),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let now = Utc::now();
        let txn = db.begin().await?;
        ensure_transition(&txn, &ot, request.status).await?;

        let previous = ot.status;
        let ot_id = ot.id;
        let mut active: ordens_transporte::ActiveModel = ot.into();
        set_status(&mut active, request.status, now);
        active.data_atualizacao = Set(now);
        let updated = save_if_status(&txn, active, ot_id, previous).await?;

        status_entry(&updated, user.id, previous, request.status, request.observacao)
            .location(request.latitude, request.longitude, request.endereco)
            .record(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(
            numero_ot = %updated.numero_ot,
            from = ?previous,
            to = ?updated.status,
            user_id = user.id,
            "OT status changed"
        );
        Ok(updated)
    }

    /// Livraison: au moins un fichier, transition vers ENTREGUE, observations obligatoires
    pub async fn finalize(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
        request: FinalizeRequest,
    ) -> AppResult<ordens_transporte::Model> {
        let ot = Self::get_visible(db, user, ot_id).await?;
        Self::finalize_loaded(db, user, ot, request).await
    }

    /// Finalise une OT déjà chargée; l'écriture échoue si son status a changé depuis
    async fn finalize_loaded(
        db: &DatabaseConnection,
        user: &users::Model,
        ot: ordens_transporte::Model,
        request: FinalizeRequest,
    ) -> AppResult<ordens_transporte::Model> {
        check_status_permission(user, &ot)?;

        let now = Utc::now();
        let txn = db.begin().await?;

        // 1. Documents, transition, observations (dans cet ordre)
        ensure_transition(&txn, &ot, OtStatus::Entregue).await?;

        let mut errors = FieldErrors::new();
        let observacoes_entrega = request
            .observacoes_entrega
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string);
        if observacoes_entrega.is_none() {
            push_error(
                &mut errors,
                "observacoes_entrega",
                "Informe as observações da entrega.",
            );
        }
        check_coordinates(
            &mut errors,
            ("latitude_entrega", request.latitude_entrega),
            ("longitude_entrega", request.longitude_entrega),
        );
        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // 2. Mise à jour + journal
        let previous = ot.status;
        let ot_id = ot.id;
        let mut active: ordens_transporte::ActiveModel = ot.into();
        set_status(&mut active, OtStatus::Entregue, now);
        active.observacoes_entrega = Set(observacoes_entrega.clone());
        active.latitude_entrega = Set(request.latitude_entrega);
        active.longitude_entrega = Set(request.longitude_entrega);
        active.endereco_entrega_real = Set(request.endereco_entrega_real.clone());
        active.data_atualizacao = Set(now);
        let updated = save_if_status(&txn, active, ot_id, previous).await?;

        AuditEntry::new(updated.id, user.id, TipoAtualizacao::Status, "OT finalizada com sucesso")
            .status(previous, OtStatus::Entregue)
            .observacao(observacoes_entrega)
            .location(
                request.latitude_entrega,
                request.longitude_entrega,
                request.endereco_entrega_real,
            )
            .record(&txn)
            .await?;
        txn.commit().await?;

        tracing::info!(numero_ot = %updated.numero_ot, user_id = user.id, "OT finalized");
        Ok(updated)
    }

    /// Recherche multi-critères (au moins un critère, 50 résultats max)
    pub async fn search(
        db: &DatabaseConnection,
        user: &users::Model,
        query: SearchQuery,
    ) -> AppResult<Vec<OtResponse>> {
        let mut select = visible_ots(user);
        let mut criteria = 0;
        let mut errors = FieldErrors::new();

        if let Some(numero) = non_blank(&query.numero_ot) {
            select = select.filter(
                Expr::col(ordens_transporte::Column::NumeroOt).like(contains_pattern(&numero.to_uppercase())),
            );
            criteria += 1;
        }
        if let Some(cliente) = non_blank(&query.cliente_nome) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(ordens_transporte::Column::ClienteNome)))
                    .like(contains_pattern(&cliente.to_lowercase())),
            );
            criteria += 1;
        }
        if let Some(status) = query.status {
            select = select.filter(ordens_transporte::Column::Status.eq(status));
            criteria += 1;
        }
        if let (Some(motorista_id), true) = (query.motorista_id, user.can_view_all_ots()) {
            select = select.filter(ordens_transporte::Column::MotoristaAtualId.eq(motorista_id));
            criteria += 1;
        }
        if let Some(raw) = non_blank(&query.data_inicio) {
            match parse_date(raw) {
                Some(date) => {
                    select = select.filter(ordens_transporte::Column::DataCriacao.gte(start_of_day(date)));
                    criteria += 1;
                }
                None => push_error(&mut errors, "data_inicio", "Data inválida. Use o formato AAAA-MM-DD."),
            }
        }
        if let Some(raw) = non_blank(&query.data_fim) {
            match parse_date(raw) {
                Some(date) => {
                    let end = start_of_day(date) + Duration::days(1);
                    select = select.filter(ordens_transporte::Column::DataCriacao.lt(end));
                    criteria += 1;
                }
                None => push_error(&mut errors, "data_fim", "Data inválida. Use o formato AAAA-MM-DD."),
            }
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }
        if criteria == 0 {
            return Err(AppError::bad_request("Informe pelo menos um critério de busca."));
        }

        let ots = select
            .order_by_desc(ordens_transporte::Column::DataCriacao)
            .order_by_desc(ordens_transporte::Column::Id)
            .limit(SEARCH_LIMIT)
            .all(db)
            .await?;

        Ok(Self::to_responses(db, ots).await?)
    }

    /// Tableau de bord: totaux, répartition par status, 30 derniers jours, top motoristas
    pub async fn stats(db: &DatabaseConnection, user: &users::Model) -> AppResult<OtStatsResponse> {
        let ots = visible_ots(user).all(db).await?;
        let since = Utc::now() - Duration::days(30);

        let count = |pred: &dyn Fn(&ordens_transporte::Model) -> bool| {
            ots.iter().filter(|ot| pred(ot)).count() as u64
        };

        let resumo = StatsResumo {
            total: ots.len() as u64,
            ativas: count(&|ot| !ot.status.is_final()),
            finalizadas: count(&|ot| ot.status.is_delivery()),
            canceladas: count(&|ot| ot.status == OtStatus::Cancelada),
        };

        let por_status = OtStatus::iter()
            .map(|status| StatusCount {
                status,
                label: status.label(),
                total: count(&|ot| ot.status == status),
            })
            .collect();

        let ultimos_30_dias = StatsPeriodo {
            criadas: count(&|ot| ot.data_criacao >= since),
            finalizadas: count(&|ot| ot.data_criacao >= since && ot.status.is_delivery()),
        };

        let por_motorista = if user.can_view_all_ots() {
            let mut totals: BTreeMap<i32, u64> = BTreeMap::new();
            for ot in &ots {
                *totals.entry(ot.motorista_atual_id).or_default() += 1;
            }
            let mut ranking: Vec<(i32, u64)> = totals.into_iter().collect();
            ranking.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            ranking.truncate(10);

            let users = user_map(db, ranking.iter().map(|(id, _)| *id)).await?;
            Some(
                ranking
                    .into_iter()
                    .filter_map(|(id, total)| {
                        users.get(&id).map(|u| MotoristaCount { motorista: UserSummary::from(u), total })
                    })
                    .collect(),
            )
        } else {
            None
        };

        Ok(OtStatsResponse { resumo, por_status, ultimos_30_dias, por_motorista })
    }

    /// Journal, transferts et fichiers fusionnés, du plus récent au plus ancien
    pub async fn timeline(
        db: &DatabaseConnection,
        user: &users::Model,
        ot_id: i32,
    ) -> AppResult<Vec<TimelineEvent>> {
        let ot = Self::get_visible(db, user, ot_id).await?;

        let history = audit::history(db, ot.id, None).await?;
        let transfers = transferencias_ot::Entity::find()
            .filter(transferencias_ot::Column::OrdemTransporteId.eq(ot.id))
            .all(db)
            .await?;
        let files = arquivos::Entity::find()
            .filter(arquivos::Column::OrdemTransporteId.eq(ot.id))
            .all(db)
            .await?;

        let users = user_map(
            db,
            history
                .iter()
                .map(|h| h.usuario_id)
                .chain(transfers.iter().flat_map(transfer_user_ids))
                .chain(files.iter().map(|a| a.enviado_por_id)),
        )
        .await?;

        let mut events: Vec<TimelineEvent> = history
            .into_iter()
            .map(|h| TimelineEvent::Atualizacao(atualizacao_response(h, &users)))
            .chain(
                transfers
                    .into_iter()
                    .map(|t| TimelineEvent::Transferencia(TransferResponse::build(t, &users))),
            )
            .chain(
                files
                    .into_iter()
                    .map(|a| TimelineEvent::Arquivo(ArquivoResponse::build(a, &users))),
            )
            .collect();
        events.sort_by(|a, b| b.date().cmp(&a.date()));

        Ok(events)
    }

    /// Construit les réponses avec les motoristas embarqués
    pub async fn to_responses<C: ConnectionTrait>(
        conn: &C,
        ots: Vec<ordens_transporte::Model>,
    ) -> Result<Vec<OtResponse>, DbErr> {
        let users = user_map(
            conn,
            ots.iter()
                .flat_map(|ot| [ot.motorista_criador_id, ot.motorista_atual_id]),
        )
        .await?;
        Ok(ots.into_iter().map(|ot| OtResponse::build(ot, &users)).collect())
    }

    /// OT en cours portée par le motorista (bloque une nouvelle création)
    async fn open_ot_for(
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Option<ordens_transporte::Model>, DbErr> {
        ordens_transporte::Entity::find()
            .filter(ordens_transporte::Column::MotoristaAtualId.eq(user_id))
            .filter(ordens_transporte::Column::Ativa.eq(true))
            .filter(ordens_transporte::Column::Status.is_in([
                OtStatus::Iniciada,
                OtStatus::EmCarregamento,
                OtStatus::EmTransito,
            ]))
            .order_by_desc(ordens_transporte::Column::DataCriacao)
            .one(db)
            .await
    }
}

pub async fn find_ot<C: ConnectionTrait>(conn: &C, ot_id: i32) -> AppResult<ordens_transporte::Model> {
    ordens_transporte::Entity::find_by_id(ot_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Ordem de Transporte não encontrada."))
}

/// logistica/admin: toutes les OTs; motorista: créées ou portées
pub fn visible_ots(user: &users::Model) -> Select<ordens_transporte::Entity> {
    let select = ordens_transporte::Entity::find();
    if user.can_view_all_ots() {
        select
    } else {
        select.filter(
            Condition::any()
                .add(ordens_transporte::Column::MotoristaAtualId.eq(user.id))
                .add(ordens_transporte::Column::MotoristaCriadorId.eq(user.id)),
        )
    }
}

/// Vérifie la table de transitions et, pour une livraison, la présence d'un fichier
pub async fn ensure_transition<C: ConnectionTrait>(
    conn: &C,
    ot: &ordens_transporte::Model,
    next: OtStatus,
) -> AppResult<()> {
    if next.is_delivery() {
        let files = arquivos::Entity::find()
            .filter(arquivos::Column::OrdemTransporteId.eq(ot.id))
            .count(conn)
            .await?;
        if files == 0 {
            return Err(AppError::field(
                "arquivos",
                "É necessário anexar pelo menos um arquivo (canhoto ou foto) antes de finalizar a OT.",
            ));
        }
    }

    if !ot.can_transition_to(next) {
        return Err(AppError::bad_request(format!(
            "Não é possível transicionar de {} para {}.",
            ot.status.label(),
            next.label()
        )));
    }
    Ok(())
}

fn check_status_permission(user: &users::Model, ot: &ordens_transporte::Model) -> AppResult<()> {
    if !ot.can_be_edited() {
        return Err(AppError::bad_request("Esta OT não pode mais ser editada."));
    }
    if !permissions::can_update_status(user, ot) {
        tracing::warn!(user_id = user.id, numero_ot = %ot.numero_ot, "status change refused");
        return Err(AppError::forbidden(
            "Apenas o motorista atual ou a logística podem alterar o status.",
        ));
    }
    Ok(())
}

/// data_finalizacao suit l'entrée / la sortie des status finaux
fn set_status(active: &mut ordens_transporte::ActiveModel, next: OtStatus, now: DateTime<Utc>) {
    active.status = Set(next);
    active.data_finalizacao = Set(next.is_final().then_some(now));
}

/// Écrit l'OT seulement si son status est encore celui qui a été lu
async fn save_if_status<C: ConnectionTrait>(
    conn: &C,
    active: ordens_transporte::ActiveModel,
    ot_id: i32,
    expected: OtStatus,
) -> AppResult<ordens_transporte::Model> {
    let result = ordens_transporte::Entity::update_many()
        .set(active)
        .filter(ordens_transporte::Column::Id.eq(ot_id))
        .filter(ordens_transporte::Column::Status.eq(expected))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(ot_id, expected = ?expected, "OT changed concurrently");
        return Err(AppError::bad_request(
            "A OT foi alterada por outra operação. Atualize e tente novamente.",
        ));
    }
    find_ot(conn, ot_id).await
}

fn status_entry(
    ot: &ordens_transporte::Model,
    user_id: i32,
    previous: OtStatus,
    next: OtStatus,
    observacao: Option<String>,
) -> AuditEntry {
    AuditEntry::new(
        ot.id,
        user_id,
        TipoAtualizacao::Status,
        format!("Status alterado de {} para {}", previous.label(), next.label()),
    )
    .status(previous, next)
    .observacao(observacao)
}

fn atualizacao_response(
    atualizacao: atualizacoes_ot::Model,
    users: &std::collections::HashMap<i32, users::Model>,
) -> AtualizacaoResponse {
    AtualizacaoResponse {
        usuario: users.get(&atualizacao.usuario_id).map(UserSummary::from),
        atualizacao,
    }
}

pub fn transfer_user_ids(t: &transferencias_ot::Model) -> Vec<i32> {
    let mut ids = vec![t.motorista_origem_id, t.motorista_destino_id, t.solicitado_por_id];
    ids.extend(t.aprovado_por_id);
    ids
}

/// Latitude dans [-90, 90], longitude dans [-180, 180]
pub fn check_coordinates(
    errors: &mut FieldErrors,
    latitude: (&str, Option<Decimal>),
    longitude: (&str, Option<Decimal>),
) {
    if let Some(lat) = latitude.1 {
        if lat < Decimal::from(-90) || lat > Decimal::from(90) {
            push_error(errors, latitude.0, "Latitude deve estar entre -90 e 90.");
        }
    }
    if let Some(lon) = longitude.1 {
        if lon < Decimal::from(-180) || lon > Decimal::from(180) {
            push_error(errors, longitude.0, "Longitude deve estar entre -180 e 180.");
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Motif LIKE "contient": % et _ saisis par l'utilisateur restent littéraux
fn contains_pattern(term: &str) -> LikeExpr {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    LikeExpr::new(format!("%{}%", escaped)).escape('\\')
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
