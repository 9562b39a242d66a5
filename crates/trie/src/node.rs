use crate::{Nibbles, Result, TrieError};
use ember_rlp::{Decoder, Encoder, RlpItem};
use ember_types::H256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Leaf {
        key: Nibbles,
        value: Vec<u8>,
    },
    Extension {
        key: Nibbles,
        node: NodeRef,
    },
    Branch {
        children: [Option<NodeRef>; 16],
        value: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Hash(H256),
    Inline(Box<Node>),
}

impl Node {
    pub fn new_leaf(key: Nibbles, value: Vec<u8>) -> Self {
        Node::Leaf { key, value }
    }

    pub fn new_branch() -> Self {
        Node::Branch {
            children: Default::default(),
            value: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    /// Canonical node encoding. Sub-nodes whose encoding is shorter than
    /// 32 bytes embed raw; longer ones embed as their Keccak hash.
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        match self {
            Node::Empty => {
                encoder.encode_bytes(&[]);
            }
            Node::Leaf { key, value } => {
                encoder.encode_list_with(|e| {
                    e.encode_bytes(&key.encode_compact(true));
                    e.encode_bytes(value);
                });
            }
            Node::Extension { key, node } => {
                encoder.encode_list_with(|e| {
                    e.encode_bytes(&key.encode_compact(false));
                    encode_node_ref(node, e);
                });
            }
            Node::Branch { children, value } => {
                encoder.encode_list_with(|e| {
                    for child in children {
                        match child {
                            None => e.encode_bytes(&[]),
                            Some(node_ref) => encode_node_ref(node_ref, e),
                        }
                    }
                    match value {
                        None => e.encode_bytes(&[]),
                        Some(v) => e.encode_bytes(v),
                    }
                });
            }
        }
        encoder.finish()
    }

    pub fn decode_raw(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data == [0x80] {
            return Ok(Node::Empty);
        }

        let mut decoder = Decoder::new(data)?;
        let item = decoder.decode_item()?;
        Self::from_item(&item)
    }

    fn from_item(item: &RlpItem) -> Result<Self> {
        let items = item.as_list().ok_or(TrieError::InvalidNode)?;

        match items.len() {
            2 => {
                let key_data = items[0].as_bytes().ok_or(TrieError::InvalidNode)?;
                let (key, is_leaf) = Nibbles::decode_compact(key_data)?;

                if is_leaf {
                    let value = items[1].as_bytes().ok_or(TrieError::InvalidNode)?.to_vec();
                    Ok(Node::Leaf { key, value })
                } else {
                    let node = decode_node_ref(&items[1])?.ok_or(TrieError::InvalidNode)?;
                    Ok(Node::Extension { key, node })
                }
            }
            17 => {
                let mut children: [Option<NodeRef>; 16] = Default::default();

                for (i, child) in items[..16].iter().enumerate() {
                    children[i] = decode_node_ref(child)?;
                }

                let value_data = items[16].as_bytes().ok_or(TrieError::InvalidNode)?;
                let value = if value_data.is_empty() {
                    None
                } else {
                    Some(value_data.to_vec())
                };

                Ok(Node::Branch { children, value })
            }
            _ => Err(TrieError::InvalidNode),
        }
    }

    pub fn hash(&self) -> H256 {
        ember_crypto::keccak256(&self.encode_raw())
    }
}

fn encode_node_ref(node_ref: &NodeRef, encoder: &mut Encoder) {
    match node_ref {
        NodeRef::Hash(hash) => encoder.encode_bytes(hash.as_bytes()),
        NodeRef::Inline(node) => {
            let encoded = node.encode_raw();
            if encoded.len() < 32 {
                encoder.append_raw(&encoded);
            } else {
                encoder.encode_bytes(node.hash().as_bytes());
            }
        }
    }
}

fn decode_node_ref(item: &RlpItem) -> Result<Option<NodeRef>> {
    match item {
        RlpItem::String(bytes) if bytes.is_empty() => Ok(None),
        RlpItem::String(bytes) if bytes.len() == 32 => {
            Ok(Some(NodeRef::Hash(H256::from_slice(bytes))))
        }
        RlpItem::List(_) => Ok(Some(NodeRef::Inline(Box::new(Node::from_item(item)?)))),
        RlpItem::String(_) => Err(TrieError::InvalidNode),
    }
}
