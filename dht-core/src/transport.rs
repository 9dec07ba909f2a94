//! The capability boundary between a `NodeCore` and the rest of the
//! network: everything the core needs to reach another peer, and nothing
//! about how that reach is implemented.
//!
//! Two concrete variants are expected in a full deployment: an in-process
//! variant (below) that resolves an id through a shared registry of local
//! node handles, used by the simulator and tests; and a network variant
//! backed by a request/response client, whose failure modes all collapse
//! to [`CoreError::Unreachable`]. `NodeCore` is generic over this trait and
//! never branches on which variant is in play.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::address::NodeAddress;
use crate::error::{CoreError, CoreResult};
use crate::key::KeyInt;

/// What `local_find_value` (and its remote FIND_VALUE counterpart) answer
/// with: either the stored value, or the closest nodes known instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindValueOutcome {
    Value(Vec<u8>),
    Nodes(Vec<NodeAddress>),
}

/// Operations a `NodeCore` may invoke on a remote peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// True iff `dst` is reachable.
    async fn ping(&self, caller: &NodeAddress, dst: &NodeAddress) -> bool;

    /// FIND_NODE: ask `dst` for up to `n` addresses closest to `target`.
    async fn find_node(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        target: KeyInt,
        n: u32,
    ) -> CoreResult<Vec<NodeAddress>>;

    /// STORE: append `(key, value)` to `dst`'s entry store.
    async fn store(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        key: KeyInt,
        value: Vec<u8>,
    ) -> CoreResult<()>;

    /// FIND_VALUE: ask `dst` for the value behind `key`, or its closest
    /// known nodes if it doesn't hold one.
    async fn find_value(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        key: KeyInt,
    ) -> CoreResult<FindValueOutcome>;
}

/// The locally-servable side of the four RPCs, implemented by `NodeCore`.
/// Kept as its own trait (rather than requiring the in-process transport to
/// know the concrete `NodeCore` type) so the registry below can hold
/// trait objects without a dependency cycle between this module and
/// `node`.
#[async_trait]
pub trait LocalRpc: Send + Sync {
    async fn local_ping(&mut self, caller: &NodeAddress);
    async fn local_find_node(
        &mut self,
        caller: &NodeAddress,
        target: KeyInt,
        n: u32,
    ) -> Vec<NodeAddress>;
    async fn local_store(&mut self, caller: &NodeAddress, key: KeyInt, value: Vec<u8>);
    async fn local_find_value(&mut self, caller: &NodeAddress, key: KeyInt) -> FindValueOutcome;
}

type Registry = RwLock<HashMap<KeyInt, Arc<RwLock<dyn LocalRpc>>>>;

/// Resolves destinations through a shared, read-mostly registry of local
/// node handles and calls their `LocalRpc` operations directly. Used by
/// the simulator driver, where every peer lives in the same process.
pub struct InProcessTransport {
    registry: Arc<Registry>,
}

impl InProcessTransport {
    pub fn new() -> InProcessTransport {
        InProcessTransport {
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a peer's handle so other peers can reach it by id.
    pub async fn register(&self, id: KeyInt, handle: Arc<RwLock<dyn LocalRpc>>) {
        self.registry.write().await.insert(id, handle);
    }

    pub async fn unregister(&self, id: &KeyInt) {
        self.registry.write().await.remove(id);
    }

    async fn resolve(&self, id: &KeyInt) -> Option<Arc<RwLock<dyn LocalRpc>>> {
        self.registry.read().await.get(id).cloned()
    }
}

impl Default for InProcessTransport {
    fn default() -> InProcessTransport {
        InProcessTransport::new()
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn ping(&self, caller: &NodeAddress, dst: &NodeAddress) -> bool {
        match self.resolve(&dst.id).await {
            Some(handle) => {
                handle.write().await.local_ping(caller).await;
                true
            }
            None => false,
        }
    }

    async fn find_node(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        target: KeyInt,
        n: u32,
    ) -> CoreResult<Vec<NodeAddress>> {
        match self.resolve(&dst.id).await {
            Some(handle) => Ok(handle.write().await.local_find_node(caller, target, n).await),
            None => Err(CoreError::Unreachable),
        }
    }

    async fn store(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        key: KeyInt,
        value: Vec<u8>,
    ) -> CoreResult<()> {
        match self.resolve(&dst.id).await {
            Some(handle) => {
                handle.write().await.local_store(caller, key, value).await;
                Ok(())
            }
            None => Err(CoreError::Unreachable),
        }
    }

    async fn find_value(
        &self,
        caller: &NodeAddress,
        dst: &NodeAddress,
        key: KeyInt,
    ) -> CoreResult<FindValueOutcome> {
        match self.resolve(&dst.id).await {
            Some(handle) => Ok(handle.write().await.local_find_value(caller, key).await),
            None => Err(CoreError::Unreachable),
        }
    }
}
