//! Shared application state

use civic_core::config::{MediaConfig, ServerConfig};
use civic_core::{Config, IssueService, Store};

use crate::auth::TokenRegistry;
use crate::geocode::Geocoder;
use crate::media::MediaHost;

pub struct AppState {
    pub issues: IssueService,
    pub tokens: TokenRegistry,
    pub media: MediaHost,
    pub media_config: MediaConfig,
    pub geocoder: Option<Geocoder>,
    pub server: ServerConfig,
}

impl AppState {
    /// Open the store and build every collaborator from `config`
    pub fn from_config(config: &Config) -> civic_core::Result<Self> {
        config.validate()?;
        let store = Store::open(&config.data_dir)?;
        tracing::info!(
            path = %config.data_dir.display(),
            issues = store.len()?,
            "issue store opened"
        );

        let geocoder = if config.geocode.enabled {
            Some(Geocoder::new(&config.geocode)?)
        } else {
            None
        };

        Ok(Self {
            issues: IssueService::new(store, config.prefix.clone()),
            tokens: TokenRegistry::from_entries(&config.auth.tokens),
            media: MediaHost::from_config(config)?,
            media_config: config.media.clone(),
            geocoder,
            server: config.server.clone(),
        })
    }
}
