use log::{error, info};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config);

    info!("Migrating database [{}]...", config.database_url());

    // No search_path here: the first migration creates the schema.
    let db = match Database::connect(config.database_url()).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(&db, None).await {
        error!("Migration failed: {e}");
        std::process::exit(1);
    }

    info!("Migrations applied");
}
