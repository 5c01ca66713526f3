use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::*;
use validator::Validate;

use crate::error::{AppError, AppResult, FieldErrors, field_errors, push_error};
use crate::models::dto::{RegisterRequest, UpdateProfileRequest, UserListQuery};
use crate::models::users::{self, CnhCategoria, UserRole, clean_cpf};
use crate::services::permissions;
use crate::utils::password;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?1?\d{10,15}$").expect("phone pattern is a valid regex")
});

/// Action de PATCH /auth/users/{id}/{action}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountAction {
    Activate,
    Deactivate,
}

impl AccountAction {
    pub fn parse(action: &str) -> AppResult<Self> {
        match action {
            "activate" => Ok(AccountAction::Activate),
            "deactivate" => Ok(AccountAction::Deactivate),
            other => Err(AppError::bad_request(format!(
                "Ação inválida: {}. Use 'activate' ou 'deactivate'.",
                other
            ))),
        }
    }
}

/// Résultat d'une activation / désactivation
#[derive(Debug)]
pub struct ActivationOutcome {
    pub user: users::Model,
    pub changed: bool,
}

pub struct UserService;

impl UserService {
    /// Inscription publique: le compte est créé inactif
    pub async fn register(db: &DatabaseConnection, request: RegisterRequest) -> AppResult<users::Model> {
        // 1. Règles déclaratives (email, longueurs)
        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };

        let email = request.email.trim().to_lowercase();
        let cpf = clean_cpf(&request.cpf);
        let role = request.role.unwrap_or(UserRole::Motorista);

        // 2. Règles métier
        if cpf.len() != 11 {
            push_error(&mut errors, "cpf", "CPF deve conter 11 dígitos.");
        }
        if request.password != request.password_confirm {
            push_error(&mut errors, "password_confirm", "As senhas não coincidem.");
        }
        for problem in password::password_problems(&request.password) {
            push_error(&mut errors, "password", problem);
        }
        if let Some(phone) = non_empty(&request.phone) {
            if !PHONE_RE.is_match(phone) {
                push_error(
                    &mut errors,
                    "phone",
                    "Número de telefone deve estar no formato: '+999999999'. Até 15 dígitos permitidos.",
                );
            }
        }
        if role == UserRole::Admin {
            push_error(&mut errors, "role", "Não é possível se cadastrar como administrador.");
        }
        if role == UserRole::Motorista {
            check_driver_license(
                &mut errors,
                non_empty(&request.cnh_numero),
                request.cnh_categoria,
                request.cnh_validade.is_some(),
            );
        }

        // 3. Unicité (email, CPF)
        if !email.is_empty()
            && users::Entity::find()
                .filter(users::Column::Email.eq(&email))
                .one(db)
                .await?
                .is_some()
        {
            push_error(&mut errors, "email", "Este email já está em uso.");
        }
        if cpf.len() == 11
            && users::Entity::find()
                .filter(users::Column::Cpf.eq(&cpf))
                .one(db)
                .await?
                .is_some()
        {
            push_error(&mut errors, "cpf", "Este CPF já está cadastrado.");
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        // 4. Hash + insertion
        let password_hash = password::hash_password(&request.password).map_err(AppError::Internal)?;

        let user = users::ActiveModel {
            email: Set(email),
            password_hash: Set(password_hash),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            cpf: Set(cpf),
            phone: Set(non_empty(&request.phone).map(str::to_string)),
            role: Set(role),
            is_active: Set(false),
            is_staff: Set(false),
            date_joined: Set(Utc::now()),
            cnh_numero: Set(non_empty(&request.cnh_numero).map(str::to_string)),
            cnh_categoria: Set(request.cnh_categoria),
            cnh_validade: Set(request.cnh_validade),
            foto_perfil: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(user_id = user.id, role = ?user.role, "user registered (pending activation)");
        Ok(user)
    }

    pub async fn update_profile(
        db: &DatabaseConnection,
        user: users::Model,
        request: UpdateProfileRequest,
    ) -> AppResult<users::Model> {
        let mut errors = match request.validate() {
            Ok(()) => FieldErrors::new(),
            Err(e) => field_errors(&e),
        };

        if let Some(phone) = non_empty(&request.phone) {
            if !PHONE_RE.is_match(phone) {
                push_error(
                    &mut errors,
                    "phone",
                    "Número de telefone deve estar no formato: '+999999999'. Até 15 dígitos permitidos.",
                );
            }
        }

        // La règle CNH porte sur l'état final du profil
        if user.is_motorista() {
            let numero = request.cnh_numero.as_deref().or(user.cnh_numero.as_deref());
            check_driver_license(
                &mut errors,
                numero.filter(|n| !n.trim().is_empty()),
                request.cnh_categoria.or(user.cnh_categoria),
                request.cnh_validade.or(user.cnh_validade).is_some(),
            );
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let user_id = user.id;
        let mut active: users::ActiveModel = user.into();
        if let Some(first_name) = request.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(Some(phone).filter(|p| !p.trim().is_empty()));
        }
        if let Some(numero) = request.cnh_numero {
            active.cnh_numero = Set(Some(numero));
        }
        if let Some(categoria) = request.cnh_categoria {
            active.cnh_categoria = Set(Some(categoria));
        }
        if let Some(validade) = request.cnh_validade {
            active.cnh_validade = Set(Some(validade));
        }
        if let Some(foto) = request.foto_perfil {
            active.foto_perfil = Set(Some(foto));
        }

        let updated = active.update(db).await?;
        tracing::info!(user_id, "profile updated");
        Ok(updated)
    }

    /// Liste des comptes pour logistica/admin (logistica ne voit pas les admins)
    pub async fn list_users(
        db: &DatabaseConnection,
        actor: &users::Model,
        query: UserListQuery,
    ) -> AppResult<Vec<users::Model>> {
        if !actor.can_manage_users() {
            tracing::warn!(user_id = actor.id, "user list refused");
            return Err(AppError::forbidden(
                "Apenas logística ou administradores podem listar usuários.",
            ));
        }

        let mut select = users::Entity::find();
        if actor.role == UserRole::Logistica {
            select = select.filter(users::Column::Role.ne(UserRole::Admin));
        }
        if let Some(role) = query.role {
            select = select.filter(users::Column::Role.eq(role));
        }
        if let Some(is_active) = query.is_active {
            select = select.filter(users::Column::IsActive.eq(is_active));
        }

        Ok(select
            .order_by_desc(users::Column::DateJoined)
            .order_by_desc(users::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn get_user(
        db: &DatabaseConnection,
        actor: &users::Model,
        user_id: i32,
    ) -> AppResult<users::Model> {
        if actor.id != user_id && !actor.can_manage_users() {
            return Err(AppError::forbidden("Você não tem permissão para ver este usuário."));
        }

        let user = find_user(db, user_id).await?;
        if actor.id != user_id && !permissions::can_manage_account(actor, &user) {
            return Err(AppError::forbidden("Você não tem permissão para ver este usuário."));
        }
        Ok(user)
    }

    pub async fn set_active(
        db: &DatabaseConnection,
        actor: &users::Model,
        user_id: i32,
        action: AccountAction,
    ) -> AppResult<ActivationOutcome> {
        if !actor.can_manage_users() {
            return Err(AppError::forbidden(
                "Apenas logística ou administradores podem gerenciar usuários.",
            ));
        }

        let target = find_user(db, user_id).await?;

        if action == AccountAction::Deactivate && target.id == actor.id {
            return Err(AppError::bad_request("Você não pode desativar sua própria conta."));
        }
        if !permissions::can_manage_account(actor, &target) {
            tracing::warn!(actor_id = actor.id, target_id = target.id, "admin account change refused");
            return Err(AppError::forbidden(
                "Logística não pode modificar contas de administradores.",
            ));
        }

        let wanted = action == AccountAction::Activate;
        if target.is_active == wanted {
            return Ok(ActivationOutcome { user: target, changed: false });
        }

        let mut active: users::ActiveModel = target.into();
        active.is_active = Set(wanted);
        let user = active.update(db).await?;

        tracing::info!(actor_id = actor.id, user_id = user.id, is_active = wanted, "account status changed");
        Ok(ActivationOutcome { user, changed: true })
    }
}

pub async fn find_user<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Usuário não encontrado."))
}

/// Charge les utilisateurs référencés par une réponse (un seul SELECT)
pub async fn user_map<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, users::Model>, DbErr> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let users = users::Entity::find()
        .filter(users::Column::Id.is_in(ids))
        .all(conn)
        .await?;

    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

fn check_driver_license(
    errors: &mut FieldErrors,
    numero: Option<&str>,
    categoria: Option<CnhCategoria>,
    has_validade: bool,
) {
    if numero.is_none() {
        push_error(errors, "cnh_numero", "Número da CNH é obrigatório para motoristas.");
    }
    if categoria.is_none() {
        push_error(errors, "cnh_categoria", "Categoria da CNH é obrigatória para motoristas.");
    }
    if !has_validade {
        push_error(errors, "cnh_validade", "Validade da CNH é obrigatória para motoristas.");
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_user, register_request, setup_db};

    #[tokio::test]
    async fn test_register_creates_inactive_driver() {
        let db = setup_db().await;
        let mut request = register_request("Ana@LogiTrack.com", "123.456.789-09");
        request.phone = Some("+5581999998888".to_string());

        let user = UserService::register(&db, request).await.unwrap();

        assert_eq!(user.email, "ana@logitrack.com");
        assert_eq!(user.cpf, "12345678909");
        assert_eq!(user.role, UserRole::Motorista);
        assert!(!user.is_active);
        assert!(password::verify_password("Caminhao#2024", &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email_and_cpf() {
        let db = setup_db().await;
        UserService::register(&db, register_request("ana@logitrack.com", "12345678909"))
            .await
            .unwrap();

        let err = UserService::register(&db, register_request("ANA@logitrack.com", "123.456.789-09"))
            .await
            .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("email"));
                assert!(fields.contains_key("cpf"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_rules() {
        let db = setup_db().await;
        let mut request = register_request("bia@logitrack.com", "1234");
        request.password_confirm = "outra-senha".to_string();
        request.role = Some(UserRole::Admin);
        request.phone = Some("abc".to_string());

        let err = UserService::register(&db, request).await.unwrap_err();
        let AppError::Validation(fields) = err else {
            panic!("expected validation error");
        };
        for field in ["cpf", "password_confirm", "role", "phone"] {
            assert!(fields.contains_key(field), "missing error for {}", field);
        }
    }

    #[tokio::test]
    async fn test_phone_format() {
        let db = setup_db().await;

        // chiffres seulement, indicatif optionnel
        let mut request = register_request("dora@logitrack.com", "12345678909");
        request.phone = Some("(11) 91234-5678".to_string());
        let AppError::Validation(fields) = UserService::register(&db, request).await.unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["phone"]);

        let request = register_request("dora@logitrack.com", "12345678909");
        assert_eq!(request.phone.as_deref(), Some("+5511912345678"));
        assert!(UserService::register(&db, request).await.is_ok());
    }

    #[tokio::test]
    async fn test_driver_requires_cnh() {
        let db = setup_db().await;
        let mut request = register_request("caio@logitrack.com", "98765432100");
        request.cnh_numero = None;
        request.cnh_validade = None;

        let AppError::Validation(fields) = UserService::register(&db, request).await.unwrap_err()
        else {
            panic!("expected validation error");
        };
        assert!(fields.contains_key("cnh_numero"));
        assert!(fields.contains_key("cnh_validade"));
        assert!(!fields.contains_key("cnh_categoria"));

        // logistica n'a pas besoin de CNH
        let mut request = register_request("caio@logitrack.com", "98765432100");
        request.role = Some(UserRole::Logistica);
        request.cnh_numero = None;
        request.cnh_categoria = None;
        request.cnh_validade = None;
        assert!(UserService::register(&db, request).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_identity_fields() {
        let db = setup_db().await;
        let user = create_user(&db, UserRole::Motorista, "davi@logitrack.com").await;

        let updated = UserService::update_profile(
            &db,
            user.clone(),
            UpdateProfileRequest {
                first_name: Some("Davi".to_string()),
                phone: Some("81999998888".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.first_name, "Davi");
        assert_eq!(updated.phone.as_deref(), Some("81999998888"));
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.cpf, user.cpf);
    }

    #[tokio::test]
    async fn test_logistica_does_not_see_admins() {
        let db = setup_db().await;
        let logistica = create_user(&db, UserRole::Logistica, "log@logitrack.com").await;
        let admin = create_user(&db, UserRole::Admin, "adm@logitrack.com").await;
        create_user(&db, UserRole::Motorista, "mot@logitrack.com").await;

        let seen = UserService::list_users(&db, &logistica, UserListQuery::default())
            .await
            .unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|u| u.role != UserRole::Admin));

        let all = UserService::list_users(&db, &admin, UserListQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let drivers = UserService::list_users(
            &db,
            &admin,
            UserListQuery { role: Some(UserRole::Motorista), is_active: None },
        )
        .await
        .unwrap();
        assert_eq!(drivers.len(), 1);

        let motorista = create_user(&db, UserRole::Motorista, "m2@logitrack.com").await;
        assert!(matches!(
            UserService::list_users(&db, &motorista, UserListQuery::default()).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            UserService::get_user(&db, &logistica, admin.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_activation_rules() {
        let db = setup_db().await;
        let logistica = create_user(&db, UserRole::Logistica, "log@logitrack.com").await;
        let admin = create_user(&db, UserRole::Admin, "adm@logitrack.com").await;
        let motorista = create_user(&db, UserRole::Motorista, "mot@logitrack.com").await;

        // déjà actif: pas de changement
        let outcome = UserService::set_active(&db, &logistica, motorista.id, AccountAction::Activate)
            .await
            .unwrap();
        assert!(!outcome.changed);

        let outcome =
            UserService::set_active(&db, &logistica, motorista.id, AccountAction::Deactivate)
                .await
                .unwrap();
        assert!(outcome.changed);
        assert!(!outcome.user.is_active);

        assert!(matches!(
            UserService::set_active(&db, &logistica, logistica.id, AccountAction::Deactivate).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            UserService::set_active(&db, &logistica, admin.id, AccountAction::Deactivate).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(AccountAction::parse("delete").is_err());
    }
}
