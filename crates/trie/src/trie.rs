use crate::{Nibbles, Node, NodeRef, Result, TrieError};
use ember_rlp::Encoder;
use ember_types::H256;

/// In-memory Merkle-Patricia trie. Built fresh per use (transaction and
/// receipt roots); there is no persistent backend.
pub struct Trie {
    root: Node,
}

impl Trie {
    pub fn new() -> Self {
        Self { root: Node::Empty }
    }

    /// Root of the empty trie: keccak256 of the RLP empty string.
    pub fn empty_root() -> H256 {
        let mut encoder = Encoder::new();
        encoder.encode_bytes(&[]);
        ember_crypto::keccak256(&encoder.finish())
    }

    pub fn root_hash(&self) -> H256 {
        match &self.root {
            Node::Empty => Self::empty_root(),
            node => node.hash(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let nibbles = Nibbles::from_bytes(key);
        self.get_at_node(&self.root, &nibbles, 0)
    }

    fn get_at_node(&self, node: &Node, key: &Nibbles, key_index: usize) -> Result<Option<Vec<u8>>> {
        match node {
            Node::Empty => Ok(None),

            Node::Leaf { key: leaf_key, value } => {
                if key.slice_from(key_index) == *leaf_key {
                    Ok(Some(value.clone()))
                } else {
                    Ok(None)
                }
            }

            Node::Extension { key: ext_key, node: child_ref } => {
                let remaining_key = key.slice_from(key_index);
                let common_len = ext_key.common_prefix_len(&remaining_key);

                if common_len == ext_key.len() {
                    let child = resolve(child_ref)?;
                    self.get_at_node(child, key, key_index + common_len)
                } else {
                    Ok(None)
                }
            }

            Node::Branch { children, value } => {
                if key_index == key.len() {
                    Ok(value.clone())
                } else {
                    let nibble = key.get(key_index).ok_or(TrieError::InvalidNibbles)? as usize;
                    match &children[nibble] {
                        None => Ok(None),
                        Some(child_ref) => {
                            let child = resolve(child_ref)?;
                            self.get_at_node(child, key, key_index + 1)
                        }
                    }
                }
            }
        }
    }

    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> Result<()> {
        let nibbles = Nibbles::from_bytes(key);
        let root = std::mem::replace(&mut self.root, Node::Empty);
        self.root = Self::insert_at_node(root, &nibbles, 0, value)?;
        Ok(())
    }

    fn insert_at_node(node: Node, key: &Nibbles, key_index: usize, value: Vec<u8>) -> Result<Node> {
        match node {
            Node::Empty => Ok(Node::Leaf {
                key: key.slice_from(key_index),
                value,
            }),

            Node::Leaf { key: leaf_key, value: leaf_value } => {
                let remaining_key = key.slice_from(key_index);
                let common_len = leaf_key.common_prefix_len(&remaining_key);

                if common_len == leaf_key.len() && common_len == remaining_key.len() {
                    // Same key, replace value
                    return Ok(Node::Leaf { key: leaf_key, value });
                }

                let mut branch = Node::new_branch();
                if let Node::Branch { children, value: branch_value } = &mut branch {
                    let leaf_rest = leaf_key.slice_from(common_len);
                    if leaf_rest.is_empty() {
                        *branch_value = Some(leaf_value);
                    } else {
                        let nibble = leaf_rest.get(0).ok_or(TrieError::InvalidNibbles)? as usize;
                        children[nibble] = Some(NodeRef::Inline(Box::new(Node::Leaf {
                            key: leaf_rest.slice_from(1),
                            value: leaf_value,
                        })));
                    }

                    let key_rest = remaining_key.slice_from(common_len);
                    if key_rest.is_empty() {
                        *branch_value = Some(value);
                    } else {
                        let nibble = key_rest.get(0).ok_or(TrieError::InvalidNibbles)? as usize;
                        children[nibble] = Some(NodeRef::Inline(Box::new(Node::Leaf {
                            key: key_rest.slice_from(1),
                            value,
                        })));
                    }
                }

                if common_len > 0 {
                    Ok(Node::Extension {
                        key: leaf_key.slice(0, common_len),
                        node: NodeRef::Inline(Box::new(branch)),
                    })
                } else {
                    Ok(branch)
                }
            }

            Node::Extension { key: ext_key, node: child_ref } => {
                let remaining_key = key.slice_from(key_index);
                let common_len = ext_key.common_prefix_len(&remaining_key);

                if common_len == ext_key.len() {
                    // Full prefix match, descend
                    let child = into_node(child_ref)?;
                    let new_child = Self::insert_at_node(child, key, key_index + common_len, value)?;
                    return Ok(Node::Extension {
                        key: ext_key,
                        node: NodeRef::Inline(Box::new(new_child)),
                    });
                }

                // Split the extension at the divergence point
                let mut branch = Node::new_branch();
                if let Node::Branch { children, value: branch_value } = &mut branch {
                    let ext_rest = ext_key.slice_from(common_len);
                    let nibble = ext_rest.get(0).ok_or(TrieError::InvalidNibbles)? as usize;
                    if ext_rest.len() == 1 {
                        children[nibble] = Some(child_ref);
                    } else {
                        children[nibble] = Some(NodeRef::Inline(Box::new(Node::Extension {
                            key: ext_rest.slice_from(1),
                            node: child_ref,
                        })));
                    }

                    let key_rest = remaining_key.slice_from(common_len);
                    if key_rest.is_empty() {
                        *branch_value = Some(value);
                    } else {
                        let nibble = key_rest.get(0).ok_or(TrieError::InvalidNibbles)? as usize;
                        children[nibble] = Some(NodeRef::Inline(Box::new(Node::Leaf {
                            key: key_rest.slice_from(1),
                            value,
                        })));
                    }
                }

                if common_len > 0 {
                    Ok(Node::Extension {
                        key: ext_key.slice(0, common_len),
                        node: NodeRef::Inline(Box::new(branch)),
                    })
                } else {
                    Ok(branch)
                }
            }

            Node::Branch { mut children, value: mut branch_value } => {
                if key_index == key.len() {
                    branch_value = Some(value);
                } else {
                    let nibble = key.get(key_index).ok_or(TrieError::InvalidNibbles)? as usize;
                    let child = match children[nibble].take() {
                        None => Node::Empty,
                        Some(child_ref) => into_node(child_ref)?,
                    };
                    let new_child = Self::insert_at_node(child, key, key_index + 1, value)?;
                    children[nibble] = Some(NodeRef::Inline(Box::new(new_child)));
                }
                Ok(Node::Branch { children, value: branch_value })
            }
        }
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(node_ref: &NodeRef) -> Result<&Node> {
    match node_ref {
        NodeRef::Inline(node) => Ok(node),
        NodeRef::Hash(_) => Err(TrieError::UnresolvableNode),
    }
}

fn into_node(node_ref: NodeRef) -> Result<Node> {
    match node_ref {
        NodeRef::Inline(node) => Ok(*node),
        NodeRef::Hash(_) => Err(TrieError::UnresolvableNode),
    }
}
