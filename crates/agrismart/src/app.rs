//! Build the service components from a [`Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use advisor::{AdvisorError, Advisor, GenerateOptions, ProviderRegistry};

use crate::actions::Actions;
use crate::auth::{FirebaseIdentity, IdentityProvider, LocalIdentity};
use crate::config::{AuthBackend, Config, StorageBackend};
use crate::history::History;
use crate::store::{DocumentStore, FileStore, MemoryStore};

/// Pick the provider and model named in the config.
pub fn build_advisor(config: &Config, registry: &ProviderRegistry) -> Result<Advisor> {
    let provider = match config.ai.provider.as_deref() {
        Some(name) => registry.require(name)?,
        None => registry.require_any()?,
    };

    let mut advisor = Advisor::new(provider.clone()).with_options(GenerateOptions {
        temperature: Some(config.ai.temperature),
        max_tokens: Some(config.ai.max_tokens),
        ..Default::default()
    });

    if let Some(model) = config.ai.model.as_deref() {
        if !provider.supports_model(model) {
            return Err(AdvisorError::ModelNotSupported {
                model: format!("{model} (provider {})", provider.name()),
            }
            .into());
        }
        advisor = advisor.with_model(model);
    }

    info!(
        provider = advisor.provider_name(),
        model = advisor.model(),
        "AI provider selected"
    );
    Ok(advisor)
}

pub fn build_identity(config: &Config) -> Result<Arc<dyn IdentityProvider>> {
    Ok(match config.auth.backend {
        AuthBackend::Local => Arc::new(LocalIdentity::with_session_ttl(Duration::from_secs(
            config.auth.session_ttl_secs,
        ))),
        AuthBackend::Firebase => {
            let api_key = config
                .auth
                .firebase_api_key
                .clone()
                .context("FIREBASE_API_KEY is required for the firebase auth backend")?;
            Arc::new(FirebaseIdentity::new(api_key))
        }
    })
}

pub fn build_store(config: &Config) -> Arc<dyn DocumentStore> {
    match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::new(&config.storage.data_dir)),
    }
}

pub fn build_actions(config: &Config, registry: &ProviderRegistry) -> Result<Actions> {
    Ok(Actions::new(
        build_advisor(config, registry)?,
        History::new(build_store(config)),
        config.validation.ranges.clone(),
        config.validation.image_limits(),
    ))
}
