//! Wires the store, services and modules into a running application.

use std::sync::Arc;

use anyhow::Context;
use covers_authz::TokenIssuer;
use covers_db::Database;
use covers_kernel::{settings::Settings, InitCtx, ModuleRegistry};

use crate::modules::{
    self,
    books::{models::Book, service::BookService},
    users::{models::User, service::UserService},
};

/// Shared handles every module is built from.
#[derive(Clone)]
pub struct Services {
    pub database: Arc<Database>,
    pub tokens: Arc<TokenIssuer>,
    pub users: Arc<UserService>,
    pub books: Arc<BookService>,
}

impl Services {
    /// Opens the configured store and builds the services on top of it.
    pub fn open(settings: &Settings) -> anyhow::Result<Self> {
        let database = Database::open(&settings.database).with_context(|| {
            format!(
                "failed to open data directory {:?}",
                settings.database.data_dir
            )
        })?;
        Self::with_database(Arc::new(database), settings)
    }

    /// Services over a store that is never written to disk.
    pub fn in_memory(settings: &Settings) -> anyhow::Result<Self> {
        Self::with_database(Arc::new(Database::in_memory()), settings)
    }

    fn with_database(database: Arc<Database>, settings: &Settings) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenIssuer::from_settings(&settings.auth));
        let users = database
            .collection::<User>()
            .context("failed to load users")?;
        let books = database
            .collection::<Book>()
            .context("failed to load books")?;

        Ok(Self {
            users: Arc::new(UserService::new(users.clone(), tokens.clone())),
            books: Arc::new(BookService::new(books, users)),
            tokens,
            database,
        })
    }

    /// Core modules first, then the lending modules.
    pub fn registry(&self) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register_core(covers_db::create_module(self.database.clone()));
        modules::register_all(&mut registry, self);
        registry
    }
}

/// Runs the HTTP server until a shutdown signal arrives. Modules are stopped
/// even when the server fails, so the store is still flushed.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let services = Services::open(&settings)?;
    let registry = services.registry();
    let ctx = InitCtx {
        settings: &settings,
    };

    tracing::info!(
        env = ?settings.environment,
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "covers bootstrap starting"
    );

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served =
        covers_http::start_server(&registry, &settings, covers_http::shutdown_signal()).await;
    let stopped = registry.stop_all().await;

    served?;
    stopped?;
    tracing::info!("covers shut down cleanly");
    Ok(())
}
