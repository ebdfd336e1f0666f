use ledger::TransferPolicy;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "corebank={level},server={level},ledger={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::error!("no [server] section in settings.toml; nothing to run");
        return Ok(());
    };

    let db = match parse_database(&server.database).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!("failed to initialize database: {err}");
            return Ok(());
        }
    };

    let policy = if server.cross_user_internal_transfers {
        TransferPolicy::AnyAccount
    } else {
        TransferPolicy::SameOwnerOnly
    };

    let ledger = match ledger::Ledger::builder()
        .database(db.clone())
        .transfer_policy(policy)
        .build()
        .await
    {
        Ok(ledger) => ledger,
        Err(err) => {
            tracing::error!("failed to build ledger from database: {err}");
            return Ok(());
        }
    };

    let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, server.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return Ok(());
        }
    };
    if let Err(err) = server::run_with_listener(ledger, db, listener).await {
        tracing::error!("server failed: {err}");
    }

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
