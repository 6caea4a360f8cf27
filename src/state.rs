use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use time::Duration;

use crate::auth::{
    repo::{PgUserStore, UserStore},
    services::Accounts,
    session::SessionKeys,
    tokens::LinkTokens,
};
use crate::config::AppConfig;
use crate::mail::{Mailer, SmtpMailer};

/// Applies the embedded migrations; startup stops if the schema cannot be brought up.
pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    tracing::info!("migrations applied");
    Ok(())
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<Accounts>,
    pub sessions: SessionKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        run_migrations(&db).await?;

        let store = Arc::new(PgUserStore::new(db)) as Arc<dyn UserStore>;
        let mailer = Arc::new(SmtpMailer::new(&config.mail)?) as Arc<dyn Mailer>;

        Ok(Self::from_parts(config, store, mailer))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let tokens = LinkTokens::new(
            config.secret_key.clone(),
            Duration::seconds(config.link_max_age_secs),
        );
        let accounts = Arc::new(Accounts::new(
            store,
            mailer,
            tokens,
            config.public_base_url.clone(),
        ));
        let sessions = SessionKeys::from_config(&config);
        Self {
            config,
            accounts,
            sessions,
        }
    }
}
