//! Line-oriented persistence formats used by the shell's `save` and
//! `graphviz` commands. Both formats are stable across runs given a fixed
//! PRNG seed, since they only ever read already-settled routing state.

use std::io::{self, Write};

use crate::config::Configuration;
use crate::node::NodeCore;

/// Writes the textual configuration block: `n_bits`, `k`, `alpha`,
/// `n_nodes`, one per line.
pub fn dump_config<W: Write>(w: &mut W, config: Configuration, n_nodes: u32) -> io::Result<()> {
    writeln!(w, "n_bits {}", config.b)?;
    writeln!(w, "k {}", config.k)?;
    writeln!(w, "alpha {}", config.alpha)?;
    writeln!(w, "n_nodes {n_nodes}")?;
    Ok(())
}

/// Writes one per-node block: `node <index> <hex-id>`, a `bucket i` header
/// per non-empty bucket (i >= 1) followed by one hex-id per line, then a
/// `files` header followed by one hex key per stored entry.
pub fn dump_node<W: Write>(w: &mut W, index: u32, node: &NodeCore) -> io::Result<()> {
    writeln!(w, "node {} {}", index, node.address().id.to_hex())?;
    for (bucket_index, bucket) in node.routing().non_empty_buckets() {
        writeln!(w, "bucket {bucket_index}")?;
        for addr in bucket {
            writeln!(w, "{}", addr.id.to_hex())?;
        }
    }
    writeln!(w, "files")?;
    for (key, _) in node.entries_iter() {
        writeln!(w, "{}", key.to_hex())?;
    }
    Ok(())
}

/// Writes the full text dump: configuration block followed by one node
/// block per entry in `nodes`, in order.
pub fn dump_network<W: Write>(w: &mut W, config: Configuration, nodes: &[&NodeCore]) -> io::Result<()> {
    dump_config(w, config, nodes.len() as u32)?;
    for (index, node) in nodes.iter().enumerate() {
        dump_node(w, index as u32, node)?;
    }
    Ok(())
}

/// Writes a graphviz `digraph` with one labelled vertex per node and one
/// directed edge per routing-table entry.
pub fn dump_graphviz<W: Write>(w: &mut W, nodes: &[&NodeCore]) -> io::Result<()> {
    writeln!(w, "digraph G {{")?;
    writeln!(w, "  node [shape=record];")?;
    writeln!(w, "  rankdir=TB;")?;
    for node in nodes {
        let id = node.address().id.to_hex();
        writeln!(w, "  \"{id}\" [label=\"{}\"];", &id[..8])?;
    }
    for node in nodes {
        let from = node.address().id.to_hex();
        for (_, bucket) in node.routing().non_empty_buckets() {
            for addr in bucket {
                writeln!(w, "  \"{from}\" -> \"{}\";", addr.id.to_hex())?;
            }
        }
    }
    writeln!(w, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NodeAddress;
    use crate::key::KeyInt;
    use crate::transport::InProcessTransport;
    use std::sync::Arc;

    #[test]
    fn dump_config_emits_four_lines() {
        let config = Configuration::new(160, 20, 3).unwrap();
        let mut buf = Vec::new();
        dump_config(&mut buf, config, 5).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "n_bits 160\nk 20\nalpha 3\nn_nodes 5\n"
        );
    }

    #[test]
    fn dump_node_lists_buckets_and_files() {
        let config = Configuration::new(8, 20, 3).unwrap();
        let transport = Arc::new(InProcessTransport::new());
        let mut node = NodeCore::new(
            NodeAddress::new(KeyInt::from_u64(0), "127.0.0.1", 9000),
            config,
            transport,
        );
        node.observe(&NodeAddress::new(KeyInt::from_u64(4), "127.0.0.1", 9001))
            .unwrap();

        let mut buf = Vec::new();
        dump_node(&mut buf, 0, &node).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("node 0 "));
        assert!(text.contains("bucket 3"));
        assert!(text.ends_with("files\n"));
    }

    #[test]
    fn graphviz_wraps_in_digraph_block() {
        let config = Configuration::new(8, 20, 3).unwrap();
        let transport = Arc::new(InProcessTransport::new());
        let node = NodeCore::new(
            NodeAddress::new(KeyInt::from_u64(0), "127.0.0.1", 9000),
            config,
            transport,
        );
        let mut buf = Vec::new();
        dump_graphviz(&mut buf, &[&node]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("digraph G {"));
        assert!(text.trim_end().ends_with('}'));
    }
}
