use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::Provider;

/// Live map of provider name to provider instance.
///
/// Built once at daemon start and immutable afterwards, so lookups need no
/// locking. Only providers whose `available()` predicate holds are
/// admitted, and every admitted provider's `setup()` has completed by the
/// time `build` returns.
pub struct Registry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl Registry {
    /// Gate `candidates` on availability, run their setups concurrently,
    /// and return the live map.
    ///
    /// A panicking `setup` drops that provider from the map instead of
    /// taking the daemon down. Duplicate names keep the first registration.
    pub async fn build(candidates: Vec<Arc<dyn Provider>>) -> Self {
        let mut admitted: Vec<Arc<dyn Provider>> = Vec::with_capacity(candidates.len());
        let mut seen: Vec<String> = Vec::with_capacity(candidates.len());

        for provider in candidates {
            let name = provider.name().to_string();
            if seen.contains(&name) {
                log::warn!("provider {name} registered twice, keeping the first");
                continue;
            }
            if !provider.available() {
                log::info!("provider {name} unavailable, skipping");
                continue;
            }
            seen.push(name);
            admitted.push(provider);
        }

        let mut setups = JoinSet::new();
        for provider in admitted {
            setups.spawn(async move {
                provider.setup().await;
                provider
            });
        }

        let mut providers = HashMap::new();
        while let Some(joined) = setups.join_next().await {
            match joined {
                Ok(provider) => {
                    log::info!("provider {} loaded", provider.name());
                    providers.insert(provider.name().to_string(), provider);
                }
                Err(err) => {
                    log::error!("provider setup failed: {err}");
                }
            }
        }

        Self { providers }
    }

    /// Build a registry without running any setup. Intended for tests.
    pub fn from_providers(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
