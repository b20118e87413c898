//! Decoded value graph
//!
//! Scalars are stored inline in `Value`. Everything with identity (containers
//! and objects) lives in the graph's arena and is referenced by `NodeId`, so
//! two memo references to the same object yield the same index and cycles
//! need no shared ownership.

use crate::error::FormatErrorKind;
use crate::pickle::placeholder::Placeholder;
use crate::pickle::resolver::ClassRef;
use indexmap::IndexMap;
use std::rc::Rc;

/// Index of a node in the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    /// Integer outside the i64 range, as exact decimal text
    BigInt(Rc<str>),
    Float(f64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    /// Type reference pushed by GLOBAL / STACK_GLOBAL
    Class(Rc<ClassRef>),
    Node(NodeId),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }
}

/// Hashable projection of a value, used for dict keys and set members
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    None,
    Int(i64),
    BigInt(Rc<str>),
    Float(u64),
    Str(Rc<str>),
    Bytes(Rc<[u8]>),
    Class(Rc<str>, Rc<str>),
    Tuple(Vec<Key>),
    /// Member keys in sorted order, so equal contents hash equal
    FrozenSet(Vec<Key>),
    /// Hashed by identity
    Object(NodeId),
}

impl Key {
    pub fn str(s: &str) -> Self {
        Key::Str(Rc::from(s))
    }
}

/// Key-unique mapping that remembers the original key values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<Key, (Value, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing the value (but keeping the first key) on collision
    pub fn insert(&mut self, key: Key, key_value: Value, value: Value) {
        match self.entries.get_mut(&key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(key, (key_value, value));
            }
        }
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.entries.get(key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.get(&Key::str(key))
    }

    pub fn contains_str(&self, key: &str) -> bool {
        self.entries.contains_key(&Key::str(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (key, value) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.values().map(|(k, v)| (k, v))
    }
}

/// Key-unique collection of values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet {
    items: IndexMap<Key, Value>,
}

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: Key, value: Value) {
        self.items.entry(key).or_insert(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.items.keys()
    }
}

/// Resolved object with native named fields (`types.SimpleNamespace` and friends)
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub class: Rc<ClassRef>,
    pub fields: IndexMap<Rc<str>, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(Mapping),
    Set(ValueSet),
    FrozenSet(ValueSet),
    ByteArray(Vec<u8>),
    Namespace(Namespace),
    Placeholder(Placeholder),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::List(_) => "list",
            Node::Tuple(_) => "tuple",
            Node::Dict(_) => "dict",
            Node::Set(_) => "set",
            Node::FrozenSet(_) => "frozenset",
            Node::ByteArray(_) => "bytearray",
            Node::Namespace(_) => "namespace",
            Node::Placeholder(_) => "placeholder",
        }
    }
}

/// Root value plus the arena of everything reachable from it
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Value,
}

impl Graph {
    pub(crate) fn empty() -> Self {
        Graph {
            nodes: Vec::new(),
            root: Value::None,
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub(crate) fn alloc(&mut self, node: Node) -> Value {
        self.nodes.push(node);
        Value::Node(NodeId(self.nodes.len() - 1))
    }

    /// The node behind a value, if it is a reference
    pub fn deref(&self, value: &Value) -> Option<&Node> {
        value.as_node().map(|id| self.node(id))
    }

    pub fn as_mapping(&self, value: &Value) -> Option<&Mapping> {
        match self.deref(value)? {
            Node::Dict(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_tuple(&self, value: &Value) -> Option<&[Value]> {
        match self.deref(value)? {
            Node::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_placeholder(&self, value: &Value) -> Option<&Placeholder> {
        match self.deref(value)? {
            Node::Placeholder(p) => Some(p),
            _ => None,
        }
    }

    /// Elements of any sequence or set node, in stored order
    pub fn elements(&self, value: &Value) -> Option<Vec<&Value>> {
        match self.deref(value)? {
            Node::List(items) | Node::Tuple(items) => Some(items.iter().collect()),
            Node::Set(set) | Node::FrozenSet(set) => Some(set.iter().collect()),
            _ => None,
        }
    }

    /// Look up `value[key]` for a mapping value and a text key
    pub fn item(&self, value: &Value, key: &str) -> Option<&Value> {
        self.as_mapping(value)?.get_str(key)
    }

    /// Producer-side type name of a value, for messages
    pub fn type_name(&self, value: &Value) -> &'static str {
        match value {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::BigInt(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Class(_) => "type",
            Value::Node(id) => self.node(*id).kind(),
        }
    }

    /// Hash key for a value, following the producer's hashing rules
    pub fn key_of(&self, value: &Value) -> Result<Key, FormatErrorKind> {
        Ok(match value {
            Value::None => Key::None,
            Value::Bool(b) => Key::Int(*b as i64),
            Value::Int(i) => Key::Int(*i),
            Value::BigInt(s) => Key::BigInt(s.clone()),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Key::Int(*f as i64)
                } else {
                    Key::Float(f.to_bits())
                }
            }
            Value::Str(s) => Key::Str(s.clone()),
            Value::Bytes(b) => Key::Bytes(b.clone()),
            Value::Class(c) => Key::Class(c.module.clone(), c.name.clone()),
            Value::Node(id) => match self.node(*id) {
                Node::Tuple(items) => Key::Tuple(
                    items
                        .iter()
                        .map(|item| self.key_of(item))
                        .collect::<Result<_, _>>()?,
                ),
                Node::FrozenSet(set) => {
                    let mut members: Vec<Key> = set.keys().cloned().collect();
                    members.sort();
                    Key::FrozenSet(members)
                }
                Node::Namespace(_) | Node::Placeholder(_) => Key::Object(*id),
                other => return Err(FormatErrorKind::UnhashableKey(other.kind())),
            },
        })
    }
}
