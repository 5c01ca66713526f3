//pour la réponse structurée
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::arquivos::{self, TipoArquivo};
use super::atualizacoes_ot;
use super::ordens_transporte::{self, OtStatus};
use super::transferencias_ot::{self, TipoTransferencia, TransferStatus};
use super::users::{self, CnhCategoria, UserRole};

/// Enveloppe commune des réponses: {"success": true, "message": "...", "data": ...}
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: Some(message.into()), data }
    }
}

// ============================================================================
// COMPTES
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Informe um email válido."))]
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[validate(length(min = 1, max = 30, message = "Informe um nome com até 30 caracteres."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 30, message = "Informe um sobrenome com até 30 caracteres."))]
    pub last_name: String,
    pub cpf: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    #[validate(length(max = 20, message = "Número da CNH com até 20 caracteres."))]
    pub cnh_numero: Option<String>,
    pub cnh_categoria: Option<CnhCategoria>,
    pub cnh_validade: Option<NaiveDate>,
}

// email, cpf, role et is_active ne sont pas modifiables par le profil
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 30, message = "Informe um nome com até 30 caracteres."))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 30, message = "Informe um sobrenome com até 30 caracteres."))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[validate(length(max = 20, message = "Número da CNH com até 20 caracteres."))]
    pub cnh_numero: Option<String>,
    pub cnh_categoria: Option<CnhCategoria>,
    pub cnh_validade: Option<NaiveDate>,
    pub foto_perfil: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "Informe um email válido."))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckCodeRequest {
    #[validate(email(message = "Informe um email válido."))]
    pub email: String,
    #[validate(length(equal = 6, message = "O código deve ter 6 dígitos."))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordResetConfirmRequest {
    #[validate(email(message = "Informe um email válido."))]
    pub email: String,
    #[validate(length(equal = 6, message = "O código deve ter 6 dígitos."))]
    pub code: String,
    pub new_password: String,
    pub confirm_password: String,
}

// Utilisateur embarqué dans les réponses OT / transferts
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub short_name: String,
    pub role: UserRole,
}

impl From<&users::Model> for UserSummary {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name(),
            short_name: user.short_name(),
            role: user.role,
        }
    }
}

// Profil complet (GET /auth/profile, gestion des utilisateurs)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub cpf: String,
    pub cpf_formatted: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub role_display: &'static str,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub cnh_numero: Option<String>,
    pub cnh_categoria: Option<CnhCategoria>,
    pub cnh_validade: Option<NaiveDate>,
    pub cnh_vencida: bool,
    pub foto_perfil: Option<String>,
}

impl From<&users::Model> for UserResponse {
    fn from(user: &users::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            cpf: user.cpf.clone(),
            cpf_formatted: user.cpf_formatted(),
            phone: user.phone.clone(),
            role: user.role,
            role_display: user.role.label(),
            is_active: user.is_active,
            date_joined: user.date_joined,
            cnh_numero: user.cnh_numero.clone(),
            cnh_categoria: user.cnh_categoria,
            cnh_validade: user.cnh_validade,
            cnh_vencida: user.cnh_vencida(Utc::now().date_naive()),
            foto_perfil: user.foto_perfil.clone(),
        }
    }
}

// ============================================================================
// ORDENS DE TRANSPORTE
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOtRequest {
    #[validate(length(min = 1, max = 200, message = "Informe o nome do cliente."))]
    pub cliente_nome: String,
    #[validate(length(min = 1, message = "Informe o endereço de entrega."))]
    pub endereco_entrega: String,
    #[validate(length(min = 1, max = 100, message = "Informe a cidade de entrega."))]
    pub cidade_entrega: String,
    pub observacoes: Option<String>,
    pub latitude_origem: Option<Decimal>,
    pub longitude_origem: Option<Decimal>,
    pub endereco_origem: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOtRequest {
    pub observacoes: Option<String>,
    pub observacoes_entrega: Option<String>,
    pub status: Option<OtStatus>,
    pub latitude_entrega: Option<Decimal>,
    pub longitude_entrega: Option<Decimal>,
    pub endereco_entrega_real: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OtStatus,
    pub observacao: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub endereco: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FinalizeRequest {
    pub observacoes_entrega: Option<String>,
    pub latitude_entrega: Option<Decimal>,
    pub longitude_entrega: Option<Decimal>,
    pub endereco_entrega_real: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtListQuery {
    pub status: Option<OtStatus>,
    pub motorista: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub numero_ot: Option<String>,
    pub cliente_nome: Option<String>,
    pub status: Option<OtStatus>,
    pub motorista_id: Option<i32>,
    pub data_inicio: Option<String>, // Format: "2025-04-26"
    pub data_fim: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OtResponse {
    #[serde(flatten)]
    pub ot: ordens_transporte::Model,
    pub status_display: &'static str,
    pub motorista_criador: Option<UserSummary>,
    pub motorista_atual: Option<UserSummary>,
    pub pode_editar: bool,
    pub pode_transferir: bool,
    pub esta_finalizada: bool,
}

impl OtResponse {
    pub fn build(ot: ordens_transporte::Model, users: &HashMap<i32, users::Model>) -> Self {
        Self {
            status_display: ot.status.label(),
            motorista_criador: users.get(&ot.motorista_criador_id).map(UserSummary::from),
            motorista_atual: users.get(&ot.motorista_atual_id).map(UserSummary::from),
            pode_editar: ot.can_be_edited(),
            pode_transferir: ot.can_be_transferred(),
            esta_finalizada: ot.is_finished(),
            ot,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OtListResponse {
    pub total: usize,
    pub por_status: BTreeMap<OtStatus, u64>,
    pub ots: Vec<OtResponse>,
}

#[derive(Debug, Serialize)]
pub struct OtDetailResponse {
    #[serde(flatten)]
    pub ot: OtResponse,
    pub arquivos: Vec<ArquivoResponse>,
    pub total_arquivos: usize,
    pub arquivos_por_tipo: BTreeMap<TipoArquivo, usize>,
    pub transferencias: Vec<TransferResponse>,
    pub atualizacoes: Vec<AtualizacaoResponse>,
}

#[derive(Debug, Serialize)]
pub struct CanCreateResponse {
    pub pode_criar: bool,
    pub motivo: Option<String>,
    pub ot_ativa: Option<OtResponse>,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: OtStatus,
    pub label: &'static str,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct MotoristaCount {
    pub motorista: UserSummary,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsResumo {
    pub total: u64,
    pub ativas: u64,
    pub finalizadas: u64,
    pub canceladas: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsPeriodo {
    pub criadas: u64,
    pub finalizadas: u64,
}

#[derive(Debug, Serialize)]
pub struct OtStatsResponse {
    pub resumo: StatsResumo,
    pub por_status: Vec<StatusCount>,
    pub ultimos_30_dias: StatsPeriodo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub por_motorista: Option<Vec<MotoristaCount>>,
}

/// Entrée de timeline: journal, transfert ou fichier, triés par date
#[derive(Debug, Serialize)]
#[serde(tag = "evento", rename_all = "lowercase")]
pub enum TimelineEvent {
    Atualizacao(AtualizacaoResponse),
    Transferencia(TransferResponse),
    Arquivo(ArquivoResponse),
}

impl TimelineEvent {
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            TimelineEvent::Atualizacao(a) => a.atualizacao.data_criacao,
            TimelineEvent::Transferencia(t) => t.transferencia.data_solicitacao,
            TimelineEvent::Arquivo(a) => a.arquivo.data_envio,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AtualizacaoResponse {
    #[serde(flatten)]
    pub atualizacao: atualizacoes_ot::Model,
    pub usuario: Option<UserSummary>,
}

// ============================================================================
// FICHIERS
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct UploadRequest {
    #[validate(length(min = 1, max = 255, message = "Informe o nome do arquivo."))]
    pub nome_arquivo: String,
    #[validate(length(min = 1, message = "Arquivo vazio."))]
    pub conteudo_base64: String,
    pub tipo: Option<TipoArquivo>,
    pub descricao: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ArquivoResponse {
    #[serde(flatten)]
    pub arquivo: arquivos::Model,
    pub nome_arquivo: String,
    pub tamanho_formatado: String,
    pub tipo_display: &'static str,
    pub enviado_por: Option<UserSummary>,
}

impl ArquivoResponse {
    pub fn build(arquivo: arquivos::Model, users: &HashMap<i32, users::Model>) -> Self {
        Self {
            nome_arquivo: arquivo.nome_arquivo().to_string(),
            tamanho_formatado: arquivo.tamanho_formatado(),
            tipo_display: arquivo.tipo.label(),
            enviado_por: users.get(&arquivo.enviado_por_id).map(UserSummary::from),
            arquivo,
        }
    }
}

// ============================================================================
// TRANSFERTS
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    pub motorista_destino: i32,
    #[validate(length(min = 1, message = "Informe o motivo da transferência."))]
    pub motivo: String,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub endereco: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferActionRequest {
    pub observacao: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    #[serde(flatten)]
    pub transferencia: transferencias_ot::Model,
    pub status_display: &'static str,
    pub tipo: TipoTransferencia,
    pub motorista_origem: Option<UserSummary>,
    pub motorista_destino: Option<UserSummary>,
    pub solicitado_por: Option<UserSummary>,
    pub aprovado_por: Option<UserSummary>,
}

impl TransferResponse {
    pub fn build(
        transferencia: transferencias_ot::Model,
        users: &HashMap<i32, users::Model>,
    ) -> Self {
        let solicitante_role = users
            .get(&transferencia.solicitado_por_id)
            .map(|u| u.role)
            .unwrap_or(UserRole::Motorista);
        Self {
            status_display: transferencia.status.label(),
            tipo: transferencia.kind(solicitante_role),
            motorista_origem: users.get(&transferencia.motorista_origem_id).map(UserSummary::from),
            motorista_destino: users.get(&transferencia.motorista_destino_id).map(UserSummary::from),
            solicitado_por: users.get(&transferencia.solicitado_por_id).map(UserSummary::from),
            aprovado_por: transferencia
                .aprovado_por_id
                .and_then(|id| users.get(&id))
                .map(UserSummary::from),
            transferencia,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferActions {
    pub pode_aceitar: bool,
    pub pode_recusar: bool,
    pub pode_cancelar: bool,
    pub pode_aprovar: bool,
    pub horas_desde_solicitacao: i64,
}

#[derive(Debug, Serialize)]
pub struct TransferDetailResponse {
    #[serde(flatten)]
    pub transferencia: TransferResponse,
    pub numero_ot: String,
    pub acoes: TransferActions,
}

#[derive(Debug, Serialize)]
pub struct MyTransfersResponse {
    pub para_aceitar: Vec<TransferResponse>,
    pub aguardando_aprovacao: Vec<TransferResponse>,
    pub minhas_aguardando_resposta: Vec<TransferResponse>,
    pub todas: Vec<TransferResponse>,
    pub contadores: BTreeMap<&'static str, usize>,
}

/// Résultat d'une demande de transfert: la transfert et, si appliquée, l'OT à jour
#[derive(Debug, Serialize)]
pub struct TransferOutcome {
    pub transferencia: TransferResponse,
    pub status: TransferStatus,
    pub aplicada: bool,
}
