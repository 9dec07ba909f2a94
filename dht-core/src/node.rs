//! A single DHT peer: its address, routing table, entry store, and the
//! operations it exposes to callers and to itself (the iterative lookup).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::address::NodeAddress;
use crate::config::Configuration;
use crate::entry::EntryStore;
use crate::error::CoreResult;
use crate::key::KeyInt;
use crate::routing::{ObserveOutcome, RoutingTable};
use crate::transport::{FindValueOutcome, LocalRpc, Transport};

/// Per-node state: address, configuration, routing table, entry store, and
/// the transport used to reach every other peer.
pub struct NodeCore {
    address: NodeAddress,
    config: Configuration,
    routing: RoutingTable,
    entries: EntryStore,
    transport: Arc<dyn Transport>,
}

impl NodeCore {
    pub fn new(address: NodeAddress, config: Configuration, transport: Arc<dyn Transport>) -> NodeCore {
        let routing = RoutingTable::new(address.id, config.b, config.k);
        NodeCore {
            address,
            config,
            routing,
            entries: EntryStore::new(),
            transport,
        }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn config(&self) -> Configuration {
        self.config
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn entries_iter(&self) -> impl Iterator<Item = &(KeyInt, Vec<u8>)> {
        self.entries.iter()
    }

    pub fn connection_count(&self) -> u32 {
        self.routing.connection_count()
    }

    /// Driver-facing admission call; see [`RoutingTable::observe`].
    pub fn observe(&mut self, addr: &NodeAddress) -> CoreResult<ObserveOutcome> {
        self.routing.observe(addr)
    }

    pub fn find_closest(&self, target: KeyInt, n: u32) -> Vec<NodeAddress> {
        self.routing.find_closest(target, n)
    }

    /// Admits a caller's address into the routing table. `BucketFull` and
    /// `SelfReference` are both swallowed here: a peer learning of another
    /// peer through an incoming RPC has no occasion to retry or to evict,
    /// those are driver-level policies layered on top of `observe`.
    fn admit_caller(&mut self, caller: &NodeAddress) {
        if caller.id == self.address.id {
            return;
        }
        let _ = self.routing.observe(caller);
    }

    /// `local_ping() -> ()`: reply immediately indicating liveness.
    pub async fn local_ping(&mut self, caller: &NodeAddress) {
        self.admit_caller(caller);
    }

    /// `local_find_node(target) -> Vec<NodeAddress>`: the node's own
    /// `config.k` closest known addresses to `target`.
    pub async fn local_find_node(&mut self, caller: &NodeAddress, target: KeyInt) -> Vec<NodeAddress> {
        self.local_find_node_n(caller, target, self.config.k).await
    }

    async fn local_find_node_n(&mut self, caller: &NodeAddress, target: KeyInt, n: u32) -> Vec<NodeAddress> {
        self.admit_caller(caller);
        self.routing.find_closest(target, n)
    }

    /// `local_store(key, value) -> ()`: append to the entry store. Never
    /// fails for the in-memory store.
    pub async fn local_store(&mut self, caller: &NodeAddress, key: KeyInt, value: Vec<u8>) {
        self.admit_caller(caller);
        self.entries.append(key, value);
    }

    /// `local_find_value(key) -> Either<Value, Vec<NodeAddress>>`.
    pub async fn local_find_value(&mut self, caller: &NodeAddress, key: KeyInt) -> FindValueOutcome {
        self.admit_caller(caller);
        match self.entries.get(&key) {
            Some(value) => FindValueOutcome::Value(value.to_vec()),
            None => FindValueOutcome::Nodes(self.routing.find_closest(key, self.config.k)),
        }
    }

    /// Probes `batch` concurrently via `transport.find_node`, filtering
    /// self out of every response. `batch` is expected to already be
    /// bounded to `alpha` entries by the caller. Returns the addresses
    /// found alongside the ids of any probed destination whose call
    /// failed, so the caller can drop those from `best_k`.
    async fn probe_find_node(&self, batch: &[NodeAddress], target: KeyInt) -> (Vec<NodeAddress>, Vec<KeyInt>) {
        let k = self.config.k;
        let caller = self.address.clone();
        let futures = batch.iter().map(|dst| {
            let transport = Arc::clone(&self.transport);
            let caller = caller.clone();
            let dst = dst.clone();
            let dst_id = dst.id;
            async move {
                match transport.find_node(&caller, &dst, target, k).await {
                    Ok(addrs) => (addrs, None),
                    Err(_) => (Vec::new(), Some(dst_id)),
                }
            }
        });
        let responses = futures::future::join_all(futures).await;
        let self_id = self.address.id;
        let mut found = Vec::new();
        let mut unreachable = Vec::new();
        for (addrs, failed) in responses {
            found.extend(addrs.into_iter().filter(|a| a.id != self_id));
            if let Some(id) = failed {
                unreachable.push(id);
            }
        }
        (found, unreachable)
    }

    /// Iterative node lookup (see the procedure in the module's design
    /// notes): returns up to `config.k` addresses closest to `target`.
    pub async fn node_lookup(&self, target: KeyInt) -> Vec<NodeAddress> {
        let mut queried: HashSet<KeyInt> = HashSet::new();
        queried.insert(self.address.id);

        let mut best_k = self.routing.find_closest(target, self.config.k);
        best_k.retain(|a| a.id != self.address.id);

        let mut shortlist = self.routing.find_closest(target, self.config.alpha);
        shortlist.retain(|a| !queried.contains(&a.id));

        loop {
            if shortlist.is_empty() {
                break;
            }

            let old_best = closest_distance(&best_k, target);
            for a in &shortlist {
                queried.insert(a.id);
            }

            let (responses, unreachable) = self.probe_find_node(&shortlist, target).await;
            best_k.retain(|a| !unreachable.contains(&a.id));
            let new_best = closest_distance(&responses, target);
            merge_best_k(&mut best_k, responses, self.address.id, self.config.k, target);

            let improved = match (new_best, old_best) {
                (Some(nb), Some(ob)) => nb < ob,
                (Some(_), None) => true,
                _ => false,
            };

            if improved {
                shortlist = best_k
                    .iter()
                    .filter(|a| !queried.contains(&a.id))
                    .take(self.config.alpha as usize)
                    .cloned()
                    .collect();
            } else {
                let remaining: Vec<NodeAddress> = best_k
                    .iter()
                    .filter(|a| !queried.contains(&a.id))
                    .cloned()
                    .collect();
                if !remaining.is_empty() {
                    for a in &remaining {
                        queried.insert(a.id);
                    }
                    let (final_responses, final_unreachable) = self.probe_find_node(&remaining, target).await;
                    best_k.retain(|a| !final_unreachable.contains(&a.id));
                    merge_best_k(&mut best_k, final_responses, self.address.id, self.config.k, target);
                }
                break;
            }
        }

        best_k.truncate(self.config.k as usize);
        debug!(lookup_target = %target, found = best_k.len(), "node_lookup converged");
        best_k
    }

    /// `put(key, value)`: best-effort replication to the lookup's result
    /// set. No acknowledgement is awaited beyond the store call contract.
    pub async fn put(&self, key: KeyInt, value: Vec<u8>) {
        let targets = self.node_lookup(key).await;
        let caller = self.address.clone();
        let stores = targets.iter().map(|dst| {
            let transport = Arc::clone(&self.transport);
            let caller = caller.clone();
            let dst = dst.clone();
            let value = value.clone();
            async move { transport.store(&caller, &dst, key, value).await }
        });
        futures::future::join_all(stores).await;
    }

    /// `get(key) -> Option<bytes>`: iteratively pulls closer nodes via
    /// FIND_VALUE-style responses, terminating early on a hit.
    pub async fn get(&self, key: KeyInt) -> Option<Vec<u8>> {
        if let Some(value) = self.entries.get(&key) {
            return Some(value.to_vec());
        }

        let mut queried: HashSet<KeyInt> = HashSet::new();
        queried.insert(self.address.id);

        let mut best_k = self.routing.find_closest(key, self.config.k);
        best_k.retain(|a| a.id != self.address.id);

        let mut shortlist = self.routing.find_closest(key, self.config.alpha);
        shortlist.retain(|a| !queried.contains(&a.id));

        loop {
            if shortlist.is_empty() {
                return None;
            }
            for a in &shortlist {
                queried.insert(a.id);
            }

            let caller = self.address.clone();
            let futures = shortlist.iter().map(|dst| {
                let transport = Arc::clone(&self.transport);
                let caller = caller.clone();
                let dst = dst.clone();
                async move { transport.find_value(&caller, &dst, key).await }
            });
            let results = futures::future::join_all(futures).await;

            let mut next_addrs = Vec::new();
            for result in results {
                match result {
                    Ok(FindValueOutcome::Value(value)) => return Some(value),
                    Ok(FindValueOutcome::Nodes(addrs)) => next_addrs.extend(addrs),
                    Err(_) => {}
                }
            }

            merge_best_k(&mut best_k, next_addrs, self.address.id, self.config.k, key);
            shortlist = best_k
                .iter()
                .filter(|a| !queried.contains(&a.id))
                .take(self.config.alpha as usize)
                .cloned()
                .collect();
        }
    }
}

fn closest_distance(addrs: &[NodeAddress], target: KeyInt) -> Option<KeyInt> {
    addrs.iter().map(|a| target.xor(&a.id)).min()
}

fn merge_best_k(
    best_k: &mut Vec<NodeAddress>,
    new_addrs: Vec<NodeAddress>,
    self_id: KeyInt,
    k: u32,
    target: KeyInt,
) {
    best_k.extend(new_addrs);
    best_k.retain(|a| a.id != self_id);
    let mut seen = HashSet::new();
    best_k.retain(|a| seen.insert(a.id));
    best_k.sort_by(|a, b| {
        let da = target.xor(&a.id);
        let db = target.xor(&b.id);
        da.cmp(&db).then_with(|| a.id.cmp(&b.id))
    });
    best_k.truncate(k as usize);
}

/// The RPC surface an [`crate::transport::InProcessTransport`] dispatches
/// to. Named distinctly from the `local_*` inherent methods above so the
/// two APIs (direct synchronous-feeling calls vs. registry dispatch) never
/// collide in method resolution.
#[async_trait]
impl LocalRpc for NodeCore {
    async fn local_ping(&mut self, caller: &NodeAddress) {
        NodeCore::local_ping(self, caller).await
    }

    async fn local_find_node(&mut self, caller: &NodeAddress, target: KeyInt, n: u32) -> Vec<NodeAddress> {
        self.local_find_node_n(caller, target, n).await
    }

    async fn local_store(&mut self, caller: &NodeAddress, key: KeyInt, value: Vec<u8>) {
        NodeCore::local_store(self, caller, key, value).await
    }

    async fn local_find_value(&mut self, caller: &NodeAddress, key: KeyInt) -> FindValueOutcome {
        NodeCore::local_find_value(self, caller, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::transport::InProcessTransport;
    use std::collections::HashSet;
    use tokio::sync::RwLock;

    fn addr(id: u64) -> NodeAddress {
        NodeAddress::new(KeyInt::from_u64(id), "127.0.0.1", 9000)
    }

    async fn build_network(ids: &[u64], config: Configuration) -> (Arc<InProcessTransport>, Vec<Arc<RwLock<NodeCore>>>) {
        let transport = Arc::new(InProcessTransport::new());
        let mut handles = Vec::new();
        for &id in ids {
            let node = NodeCore::new(addr(id), config, transport.clone());
            let handle = Arc::new(RwLock::new(node));
            transport.register(KeyInt::from_u64(id), handle.clone()).await;
            handles.push(handle);
        }
        // Every peer observes every other peer directly (simulator-style seeding).
        for (&own_id, handle) in ids.iter().zip(handles.iter()) {
            let mut node = handle.write().await;
            for &id in ids {
                if id != own_id {
                    let _ = node.observe(&addr(id));
                }
            }
        }
        (transport, handles)
    }

    fn id_of(id: KeyInt) -> u64 {
        // test helper only valid for the small from_u64-constructed ids used here.
        let hex = id.to_hex();
        u64::from_str_radix(&hex[24..], 16).unwrap()
    }

    #[tokio::test]
    async fn scenario_four_peers_b4_k2_alpha1() {
        let config = Configuration::new(4, 2, 1).unwrap();
        let ids = [0b0001, 0b0010, 0b0100, 0b1000];
        let (_transport, handles) = build_network(&ids, config).await;

        let target = KeyInt::from_u64(0b0011);
        let result = handles[0].read().await.node_lookup(target).await;

        let mut got: Vec<u64> = result.iter().map(|a| id_of(a.id)).collect();
        got.sort_unstable();
        assert_eq!(got, vec![0b0010, 0b0100]);
    }

    #[tokio::test]
    async fn put_then_get_round_trips_and_eviction_yields_none() {
        let config = Configuration::default();
        let ids: Vec<u64> = (1..=8).collect();
        let (_transport, handles) = build_network(&ids, config).await;

        let key = KeyInt::from_u64(777);
        let value = b"hello kademlia".to_vec();
        handles[0].read().await.put(key, value.clone()).await;

        let mut holders = Vec::new();
        for handle in &handles {
            let node = handle.read().await;
            if node.entries_iter().any(|(k, _)| *k == key) {
                holders.push(Arc::clone(handle));
            }
        }
        assert!(!holders.is_empty());

        let other = handles
            .iter()
            .find(|h| !Arc::ptr_eq(h, &holders[0]))
            .expect("network has more than one peer");
        let fetched = other.read().await.get(key).await;
        assert_eq!(fetched, Some(value));

        for holder in &holders {
            let mut node = holder.write().await;
            // Reach into the entry store the same way a persistent backing
            // store eviction would: drop the matching entries.
            let remaining: Vec<_> = node.entries_iter().filter(|(k, _)| *k != key).cloned().collect();
            node.entries = EntryStore::new();
            for (k, v) in remaining {
                node.entries.append(k, v);
            }
        }

        let after_eviction = other.read().await.get(key).await;
        assert_eq!(after_eviction, None);
    }

    /// A transport that reports specific destinations as unreachable while
    /// delegating everything else to a shared in-process transport.
    struct FlakyTransport {
        inner: Arc<InProcessTransport>,
        unreachable: HashSet<KeyInt>,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn ping(&self, caller: &NodeAddress, dst: &NodeAddress) -> bool {
            if self.unreachable.contains(&dst.id) {
                false
            } else {
                self.inner.ping(caller, dst).await
            }
        }

        async fn find_node(
            &self,
            caller: &NodeAddress,
            dst: &NodeAddress,
            target: KeyInt,
            n: u32,
        ) -> CoreResult<Vec<NodeAddress>> {
            if self.unreachable.contains(&dst.id) {
                Err(CoreError::Unreachable)
            } else {
                self.inner.find_node(caller, dst, target, n).await
            }
        }

        async fn store(&self, caller: &NodeAddress, dst: &NodeAddress, key: KeyInt, value: Vec<u8>) -> CoreResult<()> {
            if self.unreachable.contains(&dst.id) {
                Err(CoreError::Unreachable)
            } else {
                self.inner.store(caller, dst, key, value).await
            }
        }

        async fn find_value(&self, caller: &NodeAddress, dst: &NodeAddress, key: KeyInt) -> CoreResult<FindValueOutcome> {
            if self.unreachable.contains(&dst.id) {
                Err(CoreError::Unreachable)
            } else {
                self.inner.find_value(caller, dst, key).await
            }
        }
    }

    #[tokio::test]
    async fn unreachable_peers_are_dropped_from_best_k() {
        let config = Configuration::new(8, 5, 2).unwrap();
        let transport = Arc::new(InProcessTransport::new());

        let mut handles = Vec::new();
        for id in 1u64..=4 {
            let node = NodeCore::new(addr(id), config, transport.clone());
            let handle = Arc::new(RwLock::new(node));
            transport.register(KeyInt::from_u64(id), handle.clone()).await;
            handles.push(handle);
        }
        for (i, handle) in handles.iter().enumerate() {
            let mut node = handle.write().await;
            for (j, id) in (1u64..=4).enumerate() {
                if i != j {
                    let _ = node.observe(&addr(id));
                }
            }
        }

        let mut unreachable = HashSet::new();
        unreachable.insert(KeyInt::from_u64(2));
        let flaky: Arc<dyn Transport> = Arc::new(FlakyTransport {
            inner: transport.clone(),
            unreachable,
        });

        let mut looker = NodeCore::new(addr(5), config, flaky);
        for id in 1u64..=4 {
            looker.observe(&addr(id)).unwrap();
        }

        let target = KeyInt::from_u64(1);
        let result = looker.node_lookup(target).await;
        assert!(!result.iter().any(|a| a.id == KeyInt::from_u64(2)));
    }
}
