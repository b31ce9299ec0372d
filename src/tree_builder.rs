//! Search tree builder for the MMDB format
//!
//! Networks are inserted into an arena-allocated binary trie. An insert
//! replaces everything the network covers, so when networks overlap the
//! most recent insert wins. Parts of an older, wider network that the new
//! one does not cover keep their data.
//!
//! IPv6 trees alias the IPv4-mapped (`::ffff:0:0/96`), 6to4 (`2002::/16`)
//! and Teredo (`2001::/32`) ranges to the IPv4 subtree at `::/96` when the
//! tree is serialized. Data inserted inside those ranges is shadowed by the
//! alias.

use crate::error::ConvertError;
use crate::mmdb::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR};
use crate::network::Network;
use std::collections::HashMap;
use std::net::IpAddr;

/// IPv6 ranges that point at the IPv4 subtree, as `(bits, prefix_len)`
const IPV4_ALIASES: [(u128, u8); 3] = [
    (0xffff << 32, 96),
    (0x2002 << 112, 16),
    (0x2001 << 112, 32),
];

/// Depth of the IPv4 subtree in an IPv6 tree
const IPV4_SUBTREE_DEPTH: usize = 96;

/// Binary trie over address bits, serialized as an MMDB search tree
pub struct TreeBuilder {
    record_size: RecordSize,
    ip_version: IpVersion,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    /// Index 0 follows bit 0, index 1 follows bit 1
    children: [Pointer; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pointer {
    Empty,
    Node(u32),
    /// Offset into the data section
    Data(u32),
}

impl Node {
    const EMPTY: Node = Node {
        children: [Pointer::Empty; 2],
    };
}

impl TreeBuilder {
    /// Create a builder with just the root node
    pub fn new(ip_version: IpVersion, record_size: RecordSize) -> Self {
        Self {
            record_size,
            ip_version,
            nodes: vec![Node::EMPTY],
        }
    }

    /// IP version of the tree being built
    pub fn ip_version(&self) -> IpVersion {
        self.ip_version
    }

    /// Record size used when serializing
    pub fn record_size(&self) -> RecordSize {
        self.record_size
    }

    /// Number of nodes the serialized tree will contain
    pub fn node_count(&self) -> u32 {
        self.finished_nodes().len() as u32
    }

    /// Insert a network pointing at `data_offset` in the data section
    pub fn insert(&mut self, network: &Network, data_offset: u32) -> Result<(), ConvertError> {
        let (bits, prefix_len) = match (network.addr(), self.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => {
                (u128::from(u32::from(v4)) << 96, network.prefix_len())
            }
            // IPv4 networks live under ::/96
            (IpAddr::V4(v4), IpVersion::V6) => {
                (u128::from(u32::from(v4)), 96 + network.prefix_len())
            }
            (IpAddr::V6(v6), IpVersion::V6) => (u128::from(v6), network.prefix_len()),
            (IpAddr::V6(_), IpVersion::V4) => {
                return Err(ConvertError::Insert(format!(
                    "cannot insert IPv6 network {} into an IPv4 tree",
                    network
                )))
            }
        };

        if prefix_len > self.ip_version.bit_count() {
            return Err(ConvertError::Insert(format!(
                "prefix length {} exceeds {} for {}",
                prefix_len,
                self.ip_version.bit_count(),
                network
            )));
        }

        set_edge(&mut self.nodes, bits, prefix_len, Pointer::Data(data_offset));
        Ok(())
    }

    /// Serialize the tree
    ///
    /// Returns `(tree_bytes, node_count)`.
    pub fn build(&self) -> Result<(Vec<u8>, u32), ConvertError> {
        let nodes = self.finished_nodes();
        let node_count = nodes.len() as u32;
        let node_bytes = self.record_size.node_bytes();
        let mut tree = Vec::with_capacity(nodes.len() * node_bytes);

        for node in &nodes {
            let left = self.record_value(node.children[0], node_count)?;
            let right = self.record_value(node.children[1], node_count)?;
            self.write_node(&mut tree, left, right);
        }

        Ok((tree, node_count))
    }

    /// Arena with aliases applied, reduced to the nodes reachable from the
    /// root and renumbered breadth-first
    fn finished_nodes(&self) -> Vec<Node> {
        let mut nodes = self.nodes.clone();
        if self.ip_version == IpVersion::V6 {
            alias_ipv4(&mut nodes);
        }

        let mut order = vec![0u32];
        let mut renumber = HashMap::from([(0u32, 0u32)]);
        let mut next = 0;
        while next < order.len() {
            for child in nodes[order[next] as usize].children {
                if let Pointer::Node(id) = child {
                    if !renumber.contains_key(&id) {
                        renumber.insert(id, order.len() as u32);
                        order.push(id);
                    }
                }
            }
            next += 1;
        }

        order
            .iter()
            .map(|&old| {
                let mut node = nodes[old as usize];
                for child in node.children.iter_mut() {
                    if let Pointer::Node(id) = child {
                        *id = renumber[&*id];
                    }
                }
                node
            })
            .collect()
    }

    fn record_value(&self, pointer: Pointer, node_count: u32) -> Result<u32, ConvertError> {
        let value = match pointer {
            Pointer::Empty => Some(node_count),
            Pointer::Node(id) => Some(id),
            Pointer::Data(offset) => node_count
                .checked_add(DATA_SECTION_SEPARATOR as u32)
                .and_then(|base| base.checked_add(offset)),
        };

        value
            .filter(|&v| v <= self.record_size.max_record_value())
            .ok_or_else(|| {
                ConvertError::Writer(format!(
                    "database too large for {}-bit records ({} nodes)",
                    self.record_size.bits(),
                    node_count
                ))
            })
    }

    fn write_node(&self, tree: &mut Vec<u8>, left: u32, right: u32) {
        let l = left.to_be_bytes();
        let r = right.to_be_bytes();
        match self.record_size {
            RecordSize::Bits24 => {
                tree.extend_from_slice(&l[1..]);
                tree.extend_from_slice(&r[1..]);
            }
            RecordSize::Bits28 => {
                tree.extend_from_slice(&l[1..]);
                tree.push(((l[0] & 0x0F) << 4) | (r[0] & 0x0F));
                tree.extend_from_slice(&r[1..]);
            }
            RecordSize::Bits32 => {
                tree.extend_from_slice(&l);
                tree.extend_from_slice(&r);
            }
        }
    }
}

fn bit_at(bits: u128, depth: u8) -> usize {
    ((bits >> (127 - depth)) & 1) as usize
}

/// Point the edge for `bits/prefix_len` at `pointer`, dropping whatever was
/// below it
///
/// Leaves crossed on the way down are split so the rest of their range keeps
/// its data.
fn set_edge(nodes: &mut Vec<Node>, bits: u128, prefix_len: u8, pointer: Pointer) {
    if prefix_len == 0 {
        nodes[0].children = [pointer; 2];
        return;
    }

    let mut node = 0usize;
    for depth in 0..prefix_len - 1 {
        let bit = bit_at(bits, depth);
        node = match nodes[node].children[bit] {
            Pointer::Node(id) => id as usize,
            other => {
                let id = nodes.len();
                nodes.push(Node {
                    children: [other; 2],
                });
                nodes[node].children[bit] = Pointer::Node(id as u32);
                id
            }
        };
    }
    nodes[node].children[bit_at(bits, prefix_len - 1)] = pointer;
}

/// Link the IPv4 alias ranges to whatever sits at `::/96`
fn alias_ipv4(nodes: &mut Vec<Node>) {
    let mut target = Pointer::Node(0);
    for _ in 0..IPV4_SUBTREE_DEPTH {
        match target {
            Pointer::Node(id) => target = nodes[id as usize].children[0],
            _ => break,
        }
    }

    if target == Pointer::Empty {
        return;
    }
    for (bits, prefix_len) in IPV4_ALIASES {
        set_edge(nodes, bits, prefix_len, target);
    }
}
