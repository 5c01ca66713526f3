// connexion BD + création du schéma

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityName, EntityTrait,
    Schema,
};

use crate::config::AppConfig;
use crate::models::{
    arquivos, atualizacoes_ot, ordens_transporte, password_reset_tokens, transferencias_ot, users,
};

pub async fn establish_connection(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options.sqlx_logging(false);

    Database::connect(options).await
}

/// Crée les tables manquantes à partir des entités (ordre: tables référencées d'abord)
pub async fn create_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, users::Entity).await?;
    create_table(db, password_reset_tokens::Entity).await?;
    create_table(db, ordens_transporte::Entity).await?;
    create_table(db, arquivos::Entity).await?;
    create_table(db, transferencias_ot::Entity).await?;
    create_table(db, atualizacoes_ot::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();

    db.execute(backend.build(&statement)).await?;
    tracing::debug!(table = %entity.table_name(), "table ready");
    Ok(())
}
