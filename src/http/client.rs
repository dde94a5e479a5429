//! Transport handle
//!
//! A [`Client`] is what a [`FetchConfig`](super::FetchConfig) borrows to reach
//! the network. It is a cheap, cloneable handle around a shared
//! [`Transport`]; every clone executes requests through the same transport.

use super::transport::{ReqwestTransport, Transport, TransportConfig};
use crate::error::Result;
use std::sync::Arc;

/// Shared handle to an HTTP transport
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client over any transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Create a client over an already shared transport
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a client backed by reqwest
    pub fn reqwest(config: &TransportConfig) -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new(config)?))
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}
