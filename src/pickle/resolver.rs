//! Type resolution for GLOBAL / STACK_GLOBAL references
//!
//! The resolver never fails: a (namespace, type-name) pair found in the
//! registry resolves to a builtin reconstruction, anything else resolves to
//! a placeholder class. Each pair resolves to one shared `ClassRef` for the
//! life of the resolver, so every instance of an unknown type carries the
//! same class identity.

use crate::error::FormatErrorKind;
use crate::pickle::placeholder::Placeholder;
use crate::pickle::value::{Graph, Key, Mapping, Namespace, Node, Value, ValueSet};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// Reconstruction strategies for registered types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    List,
    Tuple,
    Dict,
    Set,
    FrozenSet,
    ByteArray,
    /// `_codecs.encode(text, encoding)`, used for bytes by older protocols
    Encode,
    OrderedDict,
    DefaultDict,
    /// `copyreg._reconstructor(cls, base, state)`
    Reconstructor,
    /// `copyreg.__newobj__(cls, *args)`
    NewObj,
    Namespace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Builtin(Builtin),
    Placeholder,
}

/// A resolved type reference
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRef {
    pub module: Rc<str>,
    pub name: Rc<str>,
    pub kind: ClassKind,
}

impl ClassRef {
    pub fn is_placeholder(&self) -> bool {
        self.kind == ClassKind::Placeholder
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

lazy_static! {
    static ref KNOWN_TYPES: HashMap<&'static str, HashMap<&'static str, Builtin>> = {
        let builtins = [
            ("list", Builtin::List),
            ("tuple", Builtin::Tuple),
            ("dict", Builtin::Dict),
            ("set", Builtin::Set),
            ("frozenset", Builtin::FrozenSet),
            ("bytearray", Builtin::ByteArray),
        ];
        let copyreg = [
            ("_reconstructor", Builtin::Reconstructor),
            ("__newobj__", Builtin::NewObj),
        ];

        let mut m: HashMap<&'static str, HashMap<&'static str, Builtin>> = HashMap::new();
        for module in ["builtins", "__builtin__"] {
            m.insert(module, builtins.iter().copied().collect());
        }
        for module in ["copyreg", "copy_reg"] {
            m.insert(module, copyreg.iter().copied().collect());
        }
        m.insert(
            "collections",
            [
                ("OrderedDict", Builtin::OrderedDict),
                ("defaultdict", Builtin::DefaultDict),
            ]
            .into_iter()
            .collect(),
        );
        m.insert("_codecs", [("encode", Builtin::Encode)].into_iter().collect());
        m.insert(
            "types",
            [("SimpleNamespace", Builtin::Namespace)].into_iter().collect(),
        );
        m.insert(
            "argparse",
            [("Namespace", Builtin::Namespace)].into_iter().collect(),
        );
        m
    };
}

/// Look up a pair in the static registry
pub fn known_type(module: &str, name: &str) -> Option<Builtin> {
    KNOWN_TYPES.get(module)?.get(name).copied()
}

#[derive(Default)]
pub struct TypeResolver {
    classes: IndexMap<String, IndexMap<String, Rc<ClassRef>>>,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, module: &str, name: &str) -> Rc<ClassRef> {
        if let Some(class) = self.classes.get(module).and_then(|m| m.get(name)) {
            return class.clone();
        }

        let kind = match known_type(module, name) {
            Some(builtin) => ClassKind::Builtin(builtin),
            None => {
                debug!("No registered type for {}.{}; using a placeholder", module, name);
                ClassKind::Placeholder
            }
        };
        let class = Rc::new(ClassRef {
            module: Rc::from(module),
            name: Rc::from(name),
            kind,
        });
        self.classes
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string(), class.clone());
        class
    }

    /// Placeholder classes created so far, in first-seen order
    pub fn placeholder_classes(&self) -> Vec<Rc<ClassRef>> {
        self.classes
            .values()
            .flat_map(|m| m.values())
            .filter(|c| c.is_placeholder())
            .cloned()
            .collect()
    }
}

/// Build an instance of `class` from the arguments the stream supplied
pub fn construct(
    graph: &mut Graph,
    class: &Rc<ClassRef>,
    args: Vec<Value>,
    kwargs: IndexMap<Rc<str>, Value>,
) -> Result<Value, FormatErrorKind> {
    let builtin = match class.kind {
        ClassKind::Placeholder => {
            let placeholder = Placeholder::new(class.clone(), args, kwargs);
            return Ok(graph.alloc(Node::Placeholder(placeholder)));
        }
        ClassKind::Builtin(builtin) => builtin,
    };

    match builtin {
        Builtin::List => {
            let items = optional_iterable(graph, &args, class)?;
            Ok(graph.alloc(Node::List(items)))
        }
        Builtin::Tuple => {
            let items = optional_iterable(graph, &args, class)?;
            Ok(graph.alloc(Node::Tuple(items)))
        }
        Builtin::Set | Builtin::FrozenSet => {
            let mut set = ValueSet::new();
            for item in optional_iterable(graph, &args, class)? {
                set.insert(graph.key_of(&item)?, item);
            }
            if builtin == Builtin::Set {
                Ok(graph.alloc(Node::Set(set)))
            } else {
                Ok(graph.alloc(Node::FrozenSet(set)))
            }
        }
        Builtin::Dict | Builtin::OrderedDict | Builtin::DefaultDict => {
            let mut args = args;
            if builtin == Builtin::DefaultDict && !args.is_empty() {
                let factory = args.remove(0);
                debug!("Dropping defaultdict factory {:?}", factory);
            }
            let mut mapping = Mapping::new();
            if let Some(source) = args.first() {
                fill_mapping(graph, &mut mapping, source)?;
            }
            for (k, v) in kwargs {
                mapping.insert(Key::Str(k.clone()), Value::Str(k), v);
            }
            Ok(graph.alloc(Node::Dict(mapping)))
        }
        Builtin::ByteArray => {
            let bytes = match args.as_slice() {
                [] => Vec::new(),
                [Value::Bytes(b)] => b.to_vec(),
                [Value::Str(text), Value::Str(encoding), ..] => encode_text(text, encoding)?,
                [other] => iterable_bytes(graph, other)?,
                _ => return Err(bad_args(class, &args)),
            };
            Ok(graph.alloc(Node::ByteArray(bytes)))
        }
        Builtin::Encode => match args.as_slice() {
            [Value::Str(text)] => Ok(Value::Bytes(Rc::from(text.as_bytes()))),
            [Value::Str(text), Value::Str(encoding), ..] => {
                Ok(Value::Bytes(Rc::from(encode_text(text, encoding)?)))
            }
            _ => Err(bad_args(class, &args)),
        },
        Builtin::Reconstructor => {
            let target = match args.first() {
                Some(Value::Class(target)) => target.clone(),
                _ => return Err(bad_args(class, &args)),
            };
            let inner = match args.get(2) {
                Some(state) if !state.is_none() => vec![state.clone()],
                _ => Vec::new(),
            };
            construct(graph, &target, inner, IndexMap::new())
        }
        Builtin::NewObj => {
            let mut args = args;
            let target = match args.first() {
                Some(Value::Class(target)) => target.clone(),
                _ => return Err(bad_args(class, &args)),
            };
            args.remove(0);
            construct(graph, &target, args, kwargs)
        }
        Builtin::Namespace => Ok(graph.alloc(Node::Namespace(Namespace {
            class: class.clone(),
            fields: kwargs,
        }))),
    }
}

fn bad_args(class: &ClassRef, args: &[Value]) -> FormatErrorKind {
    FormatErrorKind::TypeMismatch(format!(
        "cannot construct {} from {} argument(s)",
        class.qualified_name(),
        args.len()
    ))
}

/// Items of the single optional iterable argument of list()/tuple()/set()
fn optional_iterable(
    graph: &Graph,
    args: &[Value],
    class: &ClassRef,
) -> Result<Vec<Value>, FormatErrorKind> {
    match args {
        [] => Ok(Vec::new()),
        [source] => iterate(graph, source).ok_or_else(|| bad_args(class, args)),
        _ => Err(bad_args(class, args)),
    }
}

/// Values produced by iterating `value`, if it is iterable
pub(crate) fn iterate(graph: &Graph, value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Str(s) => Some(s.chars().map(|c| Value::str(c.encode_utf8(&mut [0; 4]))).collect()),
        Value::Bytes(b) => Some(b.iter().map(|&x| Value::Int(x as i64)).collect()),
        Value::Node(_) => match graph.deref(value)? {
            Node::Dict(m) => Some(m.iter().map(|(k, _)| k.clone()).collect()),
            Node::ByteArray(b) => Some(b.iter().map(|&x| Value::Int(x as i64)).collect()),
            _ => graph
                .elements(value)
                .map(|items| items.into_iter().cloned().collect()),
        },
        _ => None,
    }
}

fn fill_mapping(graph: &Graph, mapping: &mut Mapping, source: &Value) -> Result<(), FormatErrorKind> {
    if let Some(existing) = graph.as_mapping(source) {
        for (k, v) in existing.iter() {
            mapping.insert(graph.key_of(k)?, k.clone(), v.clone());
        }
        return Ok(());
    }
    let pairs = iterate(graph, source).ok_or_else(|| {
        FormatErrorKind::TypeMismatch("mapping source is not iterable".to_string())
    })?;
    for pair in pairs {
        match graph.elements(&pair).as_deref() {
            Some([k, v]) => mapping.insert(graph.key_of(k)?, (*k).clone(), (*v).clone()),
            _ => {
                return Err(FormatErrorKind::TypeMismatch(
                    "mapping source element is not a pair".to_string(),
                ))
            }
        }
    }
    Ok(())
}

fn iterable_bytes(graph: &Graph, value: &Value) -> Result<Vec<u8>, FormatErrorKind> {
    let items = iterate(graph, value).ok_or_else(|| {
        FormatErrorKind::TypeMismatch("bytearray source is not iterable".to_string())
    })?;
    items
        .iter()
        .map(|item| match item.as_int() {
            Some(i) if (0..=255).contains(&i) => Ok(i as u8),
            _ => Err(FormatErrorKind::TypeMismatch(
                "bytearray element is not a byte".to_string(),
            )),
        })
        .collect()
}

fn encode_text(text: &str, encoding: &str) -> Result<Vec<u8>, FormatErrorKind> {
    match encoding.to_ascii_lowercase().replace('_', "-").as_str() {
        "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" => text
            .chars()
            .map(|c| {
                u8::try_from(c as u32).map_err(|_| {
                    FormatErrorKind::InvalidOperand(format!("{:?} is not latin-1", c))
                })
            })
            .collect(),
        "utf-8" | "utf8" | "ascii" => Ok(text.as_bytes().to_vec()),
        other => Err(FormatErrorKind::TypeMismatch(format!(
            "unsupported text encoding {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_unknown_pairs_share_one_placeholder_class() {
        let mut resolver = TypeResolver::new();
        let a = resolver.resolve("NetUtils", "NetworkSlot");
        let b = resolver.resolve("NetUtils", "NetworkSlot");
        let c = resolver.resolve("NetUtils", "SlotType");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert!(a.is_placeholder());
        assert_eq!(a.qualified_name(), "NetUtils.NetworkSlot");
        assert_eq!(resolver.placeholder_classes().len(), 2);
    }

    #[test]
    fn test_registry_covers_both_builtin_spellings() {
        assert_eq!(known_type("builtins", "set"), Some(Builtin::Set));
        assert_eq!(known_type("__builtin__", "set"), Some(Builtin::Set));
        assert_eq!(known_type("copy_reg", "_reconstructor"), Some(Builtin::Reconstructor));
        assert_eq!(known_type("builtins", "NetworkSlot"), None);
        assert_eq!(known_type("pkg.mod", "Foo"), None);
    }

    #[test]
    fn test_construct_placeholder_records_arguments() {
        let mut resolver = TypeResolver::new();
        let mut graph = Graph::empty();
        let class = resolver.resolve("pkg.mod", "Foo");
        let mut kwargs = IndexMap::new();
        kwargs.insert(Rc::from("level"), Value::Int(3));
        let value = construct(&mut graph, &class, vec![Value::str("Alice")], kwargs).unwrap();

        let p = graph.as_placeholder(&value).unwrap();
        assert_eq!(p.args, vec![Value::str("Alice")]);
        assert_eq!(p.kwargs.get("level"), Some(&Value::Int(3)));
        assert!(Rc::ptr_eq(&p.class, &class));
    }

    #[test]
    fn test_construct_set_from_list_deduplicates() {
        let mut resolver = TypeResolver::new();
        let mut graph = Graph::empty();
        let list = graph.alloc(Node::List(vec![Value::Int(1), Value::Int(2), Value::Int(1)]));
        let class = resolver.resolve("builtins", "set");
        let set = construct(&mut graph, &class, vec![list], IndexMap::new()).unwrap();
        assert_eq!(graph.elements(&set).unwrap().len(), 2);
    }

    #[test]
    fn test_construct_bytes_through_codecs() {
        let mut resolver = TypeResolver::new();
        let mut graph = Graph::empty();
        let class = resolver.resolve("_codecs", "encode");
        let value = construct(
            &mut graph,
            &class,
            vec![Value::str("\u{e9}a"), Value::str("latin1")],
            IndexMap::new(),
        )
        .unwrap();
        assert_eq!(value, Value::Bytes(Rc::from(&[0xe9u8, b'a'][..])));
    }

    #[test]
    fn test_reconstructor_delegates_to_target_class() {
        let mut resolver = TypeResolver::new();
        let mut graph = Graph::empty();
        let recon = resolver.resolve("copy_reg", "_reconstructor");
        let target = resolver.resolve("Options", "Toggle");
        let object = resolver.resolve("__builtin__", "object");
        let value = construct(
            &mut graph,
            &recon,
            vec![Value::Class(target.clone()), Value::Class(object), Value::None],
            IndexMap::new(),
        )
        .unwrap();
        let p = graph.as_placeholder(&value).unwrap();
        assert!(Rc::ptr_eq(&p.class, &target));
        assert!(p.args.is_empty());
    }

    #[test]
    fn test_reconstructor_rejects_non_class_target() {
        let mut resolver = TypeResolver::new();
        let mut graph = Graph::empty();
        let recon = resolver.resolve("copyreg", "_reconstructor");
        let err = construct(&mut graph, &recon, vec![Value::Int(1)], IndexMap::new());
        assert!(matches!(err, Err(FormatErrorKind::TypeMismatch(_))));
    }
}
