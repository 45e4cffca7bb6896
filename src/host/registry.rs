//! Service registration contract.
//!
//! Generated gRPC servers are registered by the concrete service; the host
//! only owns the listeners. A registrar receives the [`ServiceRegistry`]
//! (the primary server's route table) and adds whatever services it serves.

use std::ops::{Deref, DerefMut};

use tonic::service::{Routes, RoutesBuilder};

/// Largest message a hosted service accepts (1 GiB).
pub const MAX_MESSAGE_SIZE: usize = 1 << 30;

/// Route table of the primary server, handed to a [`ServiceRegistrar`].
///
/// Dereferences to [`RoutesBuilder`], so `registry.add_service(svc)` works
/// for any generated server. Generated servers should be configured with
/// [`ServiceRegistry::max_message_size`]:
///
/// ```ignore
/// let max = registry.max_message_size();
/// registry.add_service(
///     InventoryServer::new(svc)
///         .max_decoding_message_size(max)
///         .max_encoding_message_size(max),
/// );
/// ```
pub struct ServiceRegistry {
    routes: RoutesBuilder,
    max_message_size: usize,
}

impl ServiceRegistry {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            routes: RoutesBuilder::default(),
            max_message_size,
        }
    }

    /// Message size limit services should apply to decoding and encoding.
    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub(crate) fn into_routes(self) -> Routes {
        self.routes.routes()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}

impl Deref for ServiceRegistry {
    type Target = RoutesBuilder;

    fn deref(&self) -> &Self::Target {
        &self.routes
    }
}

impl DerefMut for ServiceRegistry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.routes
    }
}

/// Binds a service's RPC methods onto the host's primary server.
pub trait ServiceRegistrar: Send + Sync {
    fn register(&self, registry: &mut ServiceRegistry);
}

impl<F> ServiceRegistrar for F
where
    F: Fn(&mut ServiceRegistry) + Send + Sync,
{
    fn register(&self, registry: &mut ServiceRegistry) {
        self(registry)
    }
}
