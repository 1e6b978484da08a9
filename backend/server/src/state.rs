use std::sync::Arc;

use super::{
    config::Config,
    database::Database,
    error::AppError,
    mailer::{LogMailer, Mailer},
    oauth::{HttpIdentityProvider, IdentityProvider},
    remote::{HttpRemoteSource, RemoteSource},
};

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub mailer: Arc<dyn Mailer>,
    pub remote: Arc<dyn RemoteSource>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let db = Database::open(&config.database_url)?;
        let identity = config
            .oauth
            .clone()
            .map(|oauth| Arc::new(HttpIdentityProvider::new(oauth)) as Arc<dyn IdentityProvider>);

        Ok(Arc::new(Self {
            config,
            db,
            mailer: Arc::new(LogMailer),
            remote: Arc::new(HttpRemoteSource::new()),
            identity,
        }))
    }

    /// State with every collaborator supplied by the caller.
    pub fn with_parts(
        config: Config,
        db: Database,
        mailer: Arc<dyn Mailer>,
        remote: Arc<dyn RemoteSource>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            db,
            mailer,
            remote,
            identity,
        })
    }
}
