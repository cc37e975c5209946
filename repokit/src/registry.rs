//! Service discovery handle
//!
//! The data source carries a [`Discovery`] implementation so application code
//! can resolve peer services. [`StaticDiscovery`] serves a fixed table, usually
//! loaded from the `[registry]` config section; other backends plug in by
//! implementing the trait.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;

use crate::config::RegistryConfig;
use crate::error::{Error, Result};

/// One reachable instance of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Service name
    pub name: String,
    /// Address, e.g. `10.0.0.7:9000` or `http://billing:8080`
    pub endpoint: String,
    /// Free-form instance metadata
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Instance with no metadata
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Resolves service names to instances
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Instances of `name`; empty when the service is unknown
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>>;
}

/// Discovery over a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    namespace: String,
    services: BTreeMap<String, Vec<ServiceInstance>>,
}

impl StaticDiscovery {
    /// Empty registry in `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            services: BTreeMap::new(),
        }
    }

    /// Registry populated from configuration
    pub fn from_config(config: &RegistryConfig) -> Self {
        let mut registry = Self::new(config.namespace.clone());
        for (name, endpoints) in &config.services {
            for endpoint in endpoints {
                registry = registry.register(name.clone(), endpoint.clone());
            }
        }
        registry
    }

    /// Add an instance
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let instance = ServiceInstance::new(name, endpoint);
        self.services
            .entry(instance.name.clone())
            .or_default()
            .push(instance);
        self
    }

    /// Registry namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn get_service(&self, name: &str) -> Result<Vec<ServiceInstance>> {
        if name.is_empty() {
            return Err(Error::Registry("service name is empty".to_string()));
        }
        Ok(self.services.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config() {
        let mut config = RegistryConfig {
            namespace: "prod".to_string(),
            ..RegistryConfig::default()
        };
        config.services.insert(
            "billing".to_string(),
            vec!["10.0.0.7:9000".to_string(), "10.0.0.8:9000".to_string()],
        );

        let registry = StaticDiscovery::from_config(&config);
        assert_eq!(registry.namespace(), "prod");

        let instances = registry.get_service("billing").await.unwrap();
        let endpoints: Vec<_> = instances.iter().map(|i| i.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["10.0.0.7:9000", "10.0.0.8:9000"]);
    }

    #[tokio::test]
    async fn test_unknown_service_is_empty() {
        let registry = StaticDiscovery::new("dev").register("billing", "127.0.0.1:9000");
        assert!(registry.get_service("shipping").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let registry: Box<dyn Discovery> = Box::new(StaticDiscovery::default());
        assert!(matches!(
            registry.get_service("").await,
            Err(Error::Registry(_))
        ));
    }
}
