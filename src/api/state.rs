use std::sync::Arc;

use crate::auth::SessionSigner;
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::db::Database;
use crate::openai::OpenAiClient;
use crate::share::ShareStore;
use crate::upstream::UpstreamClient;

/// Everything a handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub db: Database,
    pub upstream: UpstreamClient,
    pub openai: OpenAiClient,
    pub signer: SessionSigner,
    pub shares: ShareStore,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: GatewayConfig, db: Database) -> anyhow::Result<Self> {
        Self::with_clock(config, db, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GatewayConfig, db: Database, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(&config)?;
        let openai = OpenAiClient::new(&config)?;
        let signer = SessionSigner::new(&config.session_secret);
        let shares = ShareStore::new(config.share_ttl, clock.clone());
        let db = db.with_clock(clock.clone());

        Ok(Self {
            config: Arc::new(config),
            db,
            upstream,
            openai,
            signer,
            shares,
            clock,
        })
    }
}
