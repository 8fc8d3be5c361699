//! Gateway state
//!
//! Shared by the socket handler, the request handlers and the HTTP routes.

use std::sync::Arc;

use huddle_common::GatewayConfig;
use huddle_service::ServiceContext;
use tokio_util::sync::CancellationToken;

use crate::registry::Registry;

#[derive(Clone)]
pub struct GatewayState {
    /// Services, storage and the index
    service_context: Arc<ServiceContext>,
    /// Live connections and pending uploads
    registry: Arc<Registry>,
    config: Arc<GatewayConfig>,
    /// Request body limit of the upload endpoint
    max_upload_bytes: usize,
}

impl GatewayState {
    pub fn new(service_context: ServiceContext, config: GatewayConfig, max_upload_bytes: usize) -> Self {
        let registry = Registry::new_shared(service_context.index_handle(), config.upload_slot_ttl);
        Self {
            service_context: Arc::new(service_context),
            registry,
            config: Arc::new(config),
            max_upload_bytes,
        }
    }

    pub fn service_context(&self) -> &ServiceContext {
        &self.service_context
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Root cancellation scope of the process
    pub fn shutdown(&self) -> &CancellationToken {
        self.service_context.shutdown()
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}
