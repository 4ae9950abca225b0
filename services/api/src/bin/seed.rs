//! services/api/src/bin/seed.rs
//!
//! Imports an export-shaped JSON corpus into the database.

use acrostic_core::domain::Identity;
use acrostic_core::export::ExportDocument;
use acrostic_core::memory::InMemoryStore;
use acrostic_core::seed::import_document;
use acrostic_core::structure::KjvStructure;
use api_lib::{adapters::DbAdapter, error::ApiError};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(about = "Load mnemonics from an export document into the branch store")]
struct Args {
    /// Path to a JSON file in the `/export` format.
    path: PathBuf,

    /// Mark every imported branch as the canonical one for its reference.
    #[arg(long)]
    canonical: bool,

    /// Validate and count against an in-memory store; nothing is written.
    #[arg(long)]
    dry_run: bool,

    /// The account the imported branches are attributed to.
    #[arg(long, env = "SEED_USER_ID")]
    user_id: Option<Uuid>,

    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let raw = std::fs::read_to_string(&args.path)?;
    let document: ExportDocument = serde_json::from_str(&raw).map_err(|e| {
        ApiError::BadRequest(format!("{} is not an export document: {}", args.path.display(), e))
    })?;
    let structure = KjvStructure::new();
    let identity = Identity {
        user_id: args.user_id.unwrap_or_else(Uuid::new_v4),
        is_admin: true,
    };

    let report = if args.dry_run {
        info!("Dry run: importing into an in-memory store");
        let store = InMemoryStore::new();
        import_document(&store, &structure, &identity, &document, args.canonical).await?
    } else {
        let database_url = args
            .database_url
            .ok_or_else(|| ApiError::Internal("DATABASE_URL is required".to_string()))?;
        if args.user_id.is_none() {
            return Err(ApiError::Internal(
                "--user-id (or SEED_USER_ID) is required unless --dry-run is set".to_string(),
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;
        let db_adapter = DbAdapter::new(pool);
        db_adapter.run_migrations().await?;
        db_adapter.ensure_user(identity.user_id, true).await?;
        import_document(&db_adapter, &structure, &identity, &document, args.canonical).await?
    };

    println!(
        "Imported {} branches ({} skipped)",
        report.inserted, report.skipped
    );
    Ok(())
}

