//! Builds the in-process peer population the shell operates on: spawns
//! `nodes` peers behind one shared `InProcessTransport`, wires an initial
//! set of routing-table edges, and seeds a handful of entries.

use std::sync::Arc;

use dht_core::{BitMap, InProcessTransport, KeyInt, LocalRpc, NodeAddress, NodeCore, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config_file::ResolvedParams;

/// A live in-process network: every peer's handle, plus the shared
/// transport they were all registered against.
pub struct Network {
    pub transport: Arc<InProcessTransport>,
    pub nodes: Vec<Arc<RwLock<NodeCore>>>,
    pub ids: Vec<KeyInt>,
}

impl Network {
    pub async fn build(params: &ResolvedParams) -> Network {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        if !params.bootstrap.is_empty() {
            warn!(
                peers = params.bootstrap.len(),
                "bootstrap addresses are ignored by the in-process simulator"
            );
        }

        let transport = Arc::new(InProcessTransport::new());
        let mut ids = Vec::with_capacity(params.nodes as usize);
        let mut nodes = Vec::with_capacity(params.nodes as usize);

        for index in 0..params.nodes {
            let id = KeyInt::random_with_bits(&mut rng, params.config.b);
            let address = NodeAddress::new(id, "127.0.0.1", 9000u16.wrapping_add(index as u16));
            let node = NodeCore::new(address, params.config, Arc::clone(&transport) as Arc<dyn Transport>);
            let handle: Arc<RwLock<NodeCore>> = Arc::new(RwLock::new(node));
            transport
                .register(id, Arc::clone(&handle) as Arc<RwLock<dyn LocalRpc>>)
                .await;
            ids.push(id);
            nodes.push(handle);
        }

        info!(nodes = nodes.len(), "peers constructed and registered");

        seed_connections(&nodes, &ids, params.connections, &mut rng).await;
        seed_entries(&nodes, params.config.b, params.entries, &mut rng).await;

        Network {
            transport,
            nodes,
            ids,
        }
    }
}

/// Gives each peer `connections` initial routing-table entries, drawn
/// without replacement from its peers, via direct `observe` calls (the
/// simulator's stand-in for an initial round of PINGs).
async fn seed_connections(
    nodes: &[Arc<RwLock<NodeCore>>],
    ids: &[KeyInt],
    connections: u32,
    rng: &mut StdRng,
) {
    let n = nodes.len();
    if n < 2 {
        return;
    }
    let wanted = connections.min(n as u32 - 1);

    for (index, node) in nodes.iter().enumerate() {
        let mut pool = BitMap::new(n as u32 - 1);
        let mut node = node.write().await;
        for _ in 0..wanted {
            let draw = match pool.get_rand_uint(rng) {
                Ok(v) => v as usize,
                Err(_) => break,
            };
            let peer_index = if draw >= index { draw + 1 } else { draw };
            let peer_id = ids[peer_index];
            let peer_addr = NodeAddress::new(peer_id, "127.0.0.1", 9000u16.wrapping_add(peer_index as u16));
            let _ = node.observe(&peer_addr);
        }
    }
}

/// Seeds `count` (key, value) entries across the network via ordinary
/// `put` calls issued from a randomly chosen peer each. Keys are drawn
/// from the same `bits`-wide keyspace as the node ids, for the same
/// reason: `put`/`get` route through `find_closest`, which indexes a
/// bucket array sized to `bits + 1`.
async fn seed_entries(nodes: &[Arc<RwLock<NodeCore>>], bits: u32, count: u32, rng: &mut StdRng) {
    use rand::Rng;

    if nodes.is_empty() {
        return;
    }
    for i in 0..count {
        let origin = rng.gen_range(0..nodes.len());
        let key = KeyInt::random_with_bits(rng, bits);
        let value = format!("seed-entry-{i}").into_bytes();
        nodes[origin].read().await.put(key, value).await;
    }
    if count > 0 {
        info!(count, "seeded entries");
    }
}
