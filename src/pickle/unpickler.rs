//! Stack-machine decoder for the object-serialization stream
//!
//! Executes the stream one opcode at a time against a value stack, a mark
//! stack and a memo table, building the decoded graph in an arena as it
//! goes. Types referenced by the stream go through the `TypeResolver`, so an
//! unknown type yields a placeholder object instead of an error.
//!
//! Malformed input always fails with a `FormatError` naming the opcode and
//! the offset it started at; nothing is skipped and no partial graph is
//! returned.

use crate::error::{FormatError, FormatErrorKind};
use crate::pickle::opcodes::{Opcode, HIGHEST_PROTOCOL};
use crate::pickle::reader::Reader;
use crate::pickle::resolver::{construct, ClassRef, TypeResolver};
use crate::pickle::value::{Graph, Key, Mapping, Node, NodeId, Value, ValueSet};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::rc::Rc;

/// Decode a complete stream into a graph
pub fn loads(data: &[u8]) -> Result<Graph, FormatError> {
    Unpickler::new(data).load()
}

enum Flow {
    Continue,
    Stop,
}

pub struct Unpickler<'a> {
    reader: Reader<'a>,
    /// Main value stack
    stack: Vec<Value>,
    /// Stack heights at each open MARK
    marks: Vec<usize>,
    memo: HashMap<u64, Value>,
    graph: Graph,
    resolver: TypeResolver,
    protocol: u8,
}

impl<'a> Unpickler<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Unpickler {
            reader: Reader::new(data),
            stack: Vec::new(),
            marks: Vec::new(),
            memo: HashMap::new(),
            graph: Graph::empty(),
            resolver: TypeResolver::new(),
            protocol: 0,
        }
    }

    /// Resolver state, including the placeholder classes created while decoding
    pub fn resolver(&self) -> &TypeResolver {
        &self.resolver
    }

    /// Protocol announced by the stream's PROTO opcode (0 if none)
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// Run the stream to its STOP opcode and return the decoded graph
    pub fn load(&mut self) -> Result<Graph, FormatError> {
        loop {
            let offset = self.reader.position();
            let byte = self.reader.read_u8().map_err(|kind| FormatError {
                offset,
                opcode: "(end of stream)",
                kind,
            })?;
            let op = Opcode::from_byte(byte).ok_or(FormatError {
                offset,
                opcode: "unknown",
                kind: FormatErrorKind::UnknownOpcode(byte),
            })?;

            trace!(
                "{:6}: {:<16} depth={} marks={}",
                offset,
                op.name(),
                self.stack.len(),
                self.marks.len()
            );

            let flow = self.execute(op).map_err(|kind| FormatError {
                offset,
                opcode: op.name(),
                kind,
            })?;

            if let Flow::Stop = flow {
                return self.finish(offset);
            }
        }
    }

    fn finish(&mut self, offset: usize) -> Result<Graph, FormatError> {
        if !self.marks.is_empty() || self.stack.len() != 1 {
            return Err(FormatError {
                offset,
                opcode: Opcode::Stop.name(),
                kind: FormatErrorKind::TerminalStack {
                    depth: self.stack.len(),
                    marks: self.marks.len(),
                },
            });
        }
        if !self.reader.is_empty() {
            debug!(
                "Ignoring {} trailing bytes after STOP",
                self.reader.remaining()
            );
        }

        let mut graph = std::mem::replace(&mut self.graph, Graph::empty());
        graph.root = self.stack.pop().unwrap_or(Value::None);
        self.memo.clear();
        debug!(
            "Decoded {} nodes, {} placeholder types",
            graph.len(),
            self.resolver.placeholder_classes().len()
        );
        Ok(graph)
    }

    fn execute(&mut self, op: Opcode) -> Result<Flow, FormatErrorKind> {
        match op {
            // ---- framing ----
            Opcode::Proto => {
                let proto = self.reader.read_u8()?;
                if proto > HIGHEST_PROTOCOL {
                    return Err(FormatErrorKind::InvalidOperand(format!(
                        "unsupported protocol {}",
                        proto
                    )));
                }
                debug!("Stream protocol {}", proto);
                self.protocol = proto;
            }
            Opcode::Frame => {
                let len = self.reader.read_u64()?;
                if len > self.reader.remaining() as u64 {
                    return Err(FormatErrorKind::Truncated {
                        needed: usize::try_from(len).unwrap_or(usize::MAX),
                        available: self.reader.remaining(),
                    });
                }
            }
            Opcode::Stop => return Ok(Flow::Stop),

            // ---- marks and stack shuffling ----
            Opcode::Mark => self.marks.push(self.stack.len()),
            Opcode::Pop => {
                if self.stack.len() > self.floor() {
                    self.pop()?;
                } else {
                    self.pop_mark()?;
                }
            }
            Opcode::PopMark => {
                self.pop_mark()?;
            }
            Opcode::Dup => {
                let top = self.top()?.clone();
                self.stack.push(top);
            }

            // ---- scalars ----
            Opcode::None => self.stack.push(Value::None),
            Opcode::NewTrue => self.stack.push(Value::Bool(true)),
            Opcode::NewFalse => self.stack.push(Value::Bool(false)),
            Opcode::Int => {
                let line = self.read_text_line()?;
                let value = match line {
                    "00" => Value::Bool(false),
                    "01" => Value::Bool(true),
                    _ => parse_decimal(line)?,
                };
                self.stack.push(value);
            }
            Opcode::BinInt => {
                let v = self.reader.read_i32()?;
                self.stack.push(Value::Int(v as i64));
            }
            Opcode::BinInt1 => {
                let v = self.reader.read_u8()?;
                self.stack.push(Value::Int(v as i64));
            }
            Opcode::BinInt2 => {
                let v = self.reader.read_u16()?;
                self.stack.push(Value::Int(v as i64));
            }
            Opcode::Long => {
                let line = self.read_text_line()?;
                let value = parse_decimal(line.strip_suffix('L').unwrap_or(line))?;
                self.stack.push(value);
            }
            Opcode::Long1 => {
                let bytes = self.reader.read_bytes1()?;
                self.stack.push(decode_long(bytes));
            }
            Opcode::Long4 => {
                let bytes = self.reader.read_bytes_i4()?;
                self.stack.push(decode_long(bytes));
            }
            Opcode::Float => {
                let line = self.read_text_line()?;
                let v = line.trim().parse::<f64>().map_err(|_| {
                    FormatErrorKind::InvalidOperand(format!("bad float literal {:?}", line))
                })?;
                self.stack.push(Value::Float(v));
            }
            Opcode::BinFloat => {
                let v = self.reader.read_f64_be()?;
                self.stack.push(Value::Float(v));
            }

            // ---- text ----
            Opcode::String => {
                let line = self.reader.read_line()?;
                let bytes = unquote_string(line)?;
                self.stack.push(legacy_string(bytes));
            }
            Opcode::BinString => {
                let bytes = self.reader.read_bytes_i4()?;
                self.stack.push(legacy_string(bytes.to_vec()));
            }
            Opcode::ShortBinString => {
                let bytes = self.reader.read_bytes1()?;
                self.stack.push(legacy_string(bytes.to_vec()));
            }
            Opcode::Unicode => {
                let line = self.reader.read_line()?;
                let text = raw_unicode_escape(line)?;
                self.stack.push(Value::Str(Rc::from(text)));
            }
            Opcode::BinUnicode => {
                let bytes = self.reader.read_bytes4()?;
                self.stack.push(Value::Str(utf8(bytes)?));
            }
            Opcode::ShortBinUnicode => {
                let bytes = self.reader.read_bytes1()?;
                self.stack.push(Value::Str(utf8(bytes)?));
            }
            Opcode::BinUnicode8 => {
                let bytes = self.reader.read_bytes8()?;
                self.stack.push(Value::Str(utf8(bytes)?));
            }

            // ---- binary ----
            Opcode::BinBytes => {
                let bytes = self.reader.read_bytes4()?;
                self.stack.push(Value::Bytes(Rc::from(bytes)));
            }
            Opcode::ShortBinBytes => {
                let bytes = self.reader.read_bytes1()?;
                self.stack.push(Value::Bytes(Rc::from(bytes)));
            }
            Opcode::BinBytes8 => {
                let bytes = self.reader.read_bytes8()?;
                self.stack.push(Value::Bytes(Rc::from(bytes)));
            }
            Opcode::ByteArray8 => {
                let bytes = self.reader.read_bytes8()?;
                let value = self.graph.alloc(Node::ByteArray(bytes.to_vec()));
                self.stack.push(value);
            }
            Opcode::ReadonlyBuffer => {
                self.top()?;
            }
            Opcode::NextBuffer => {
                return Err(FormatErrorKind::Unsupported(
                    "out-of-band buffers are not carried in the stream",
                ))
            }

            // ---- containers ----
            Opcode::EmptyTuple => {
                let value = self.graph.alloc(Node::Tuple(Vec::new()));
                self.stack.push(value);
            }
            Opcode::Tuple => {
                let items = self.pop_mark()?;
                let value = self.graph.alloc(Node::Tuple(items));
                self.stack.push(value);
            }
            Opcode::Tuple1 | Opcode::Tuple2 | Opcode::Tuple3 => {
                let n = match op {
                    Opcode::Tuple1 => 1,
                    Opcode::Tuple2 => 2,
                    _ => 3,
                };
                let items = self.pop_n(n)?;
                let value = self.graph.alloc(Node::Tuple(items));
                self.stack.push(value);
            }
            Opcode::EmptyList => {
                let value = self.graph.alloc(Node::List(Vec::new()));
                self.stack.push(value);
            }
            Opcode::List => {
                let items = self.pop_mark()?;
                let value = self.graph.alloc(Node::List(items));
                self.stack.push(value);
            }
            Opcode::Append => {
                let item = self.pop()?;
                let target = self.top()?.clone();
                self.extend(&target, vec![item])?;
            }
            Opcode::Appends => {
                let items = self.pop_mark()?;
                let target = self.top()?.clone();
                self.extend(&target, items)?;
            }
            Opcode::EmptyDict => {
                let value = self.graph.alloc(Node::Dict(Mapping::new()));
                self.stack.push(value);
            }
            Opcode::Dict => {
                let items = self.pop_mark()?;
                let mut mapping = Mapping::new();
                for (key, k, v) in self.keyed_pairs(items)? {
                    mapping.insert(key, k, v);
                }
                let value = self.graph.alloc(Node::Dict(mapping));
                self.stack.push(value);
            }
            Opcode::SetItem => {
                let v = self.pop()?;
                let k = self.pop()?;
                let target = self.top()?.clone();
                self.set_items(&target, vec![k, v])?;
            }
            Opcode::SetItems => {
                let items = self.pop_mark()?;
                let target = self.top()?.clone();
                self.set_items(&target, items)?;
            }
            Opcode::EmptySet => {
                let value = self.graph.alloc(Node::Set(ValueSet::new()));
                self.stack.push(value);
            }
            Opcode::AddItems => {
                let items = self.pop_mark()?;
                let target = self.top()?.clone();
                self.add_items(&target, items)?;
            }
            Opcode::FrozenSet => {
                let items = self.pop_mark()?;
                let mut set = ValueSet::new();
                for item in items {
                    set.insert(self.graph.key_of(&item)?, item);
                }
                let value = self.graph.alloc(Node::FrozenSet(set));
                self.stack.push(value);
            }

            // ---- objects ----
            Opcode::Global => {
                let module = self.read_text_line()?.to_string();
                let name = self.read_text_line()?;
                let class = self.resolver.resolve(&module, name);
                self.stack.push(Value::Class(class));
            }
            Opcode::StackGlobal => {
                let name = self.pop()?;
                let module = self.pop()?;
                let class = match (&module, &name) {
                    (Value::Str(module), Value::Str(name)) => self.resolver.resolve(module, name),
                    _ => {
                        return Err(FormatErrorKind::TypeMismatch(format!(
                            "STACK_GLOBAL needs two str values, got {} and {}",
                            self.type_name(&module),
                            self.type_name(&name)
                        )))
                    }
                };
                self.stack.push(Value::Class(class));
            }
            Opcode::Reduce => {
                let args = self.pop()?;
                let callable = self.pop()?;
                let class = self.expect_class(&callable, "REDUCE")?;
                let args = self.expect_tuple(&args, "REDUCE")?;
                let value = construct(&mut self.graph, &class, args, IndexMap::new())?;
                self.stack.push(value);
            }
            Opcode::NewObj => {
                let args = self.pop()?;
                let cls = self.pop()?;
                let class = self.expect_class(&cls, "NEWOBJ")?;
                let args = self.expect_tuple(&args, "NEWOBJ")?;
                let value = construct(&mut self.graph, &class, args, IndexMap::new())?;
                self.stack.push(value);
            }
            Opcode::NewObjEx => {
                let kwargs = self.pop()?;
                let args = self.pop()?;
                let cls = self.pop()?;
                let class = self.expect_class(&cls, "NEWOBJ_EX")?;
                let args = self.expect_tuple(&args, "NEWOBJ_EX")?;
                let kwargs = self.expect_kwargs(&kwargs)?;
                let value = construct(&mut self.graph, &class, args, kwargs)?;
                self.stack.push(value);
            }
            Opcode::Inst => {
                let module = self.read_text_line()?.to_string();
                let name = self.read_text_line()?;
                let class = self.resolver.resolve(&module, name);
                let args = self.pop_mark()?;
                let value = construct(&mut self.graph, &class, args, IndexMap::new())?;
                self.stack.push(value);
            }
            Opcode::Obj => {
                let mut items = self.pop_mark()?;
                if items.is_empty() {
                    return Err(FormatErrorKind::StackUnderflow);
                }
                let cls = items.remove(0);
                let class = self.expect_class(&cls, "OBJ")?;
                let value = construct(&mut self.graph, &class, items, IndexMap::new())?;
                self.stack.push(value);
            }
            Opcode::Build => {
                let state = self.pop()?;
                let target = self.top()?.clone();
                self.apply_state(&target, state)?;
            }

            // ---- memo ----
            Opcode::Put => {
                let id = self.read_memo_id()?;
                self.memo_put(id)?;
            }
            Opcode::BinPut => {
                let id = self.reader.read_u8()? as u64;
                self.memo_put(id)?;
            }
            Opcode::LongBinPut => {
                let id = self.reader.read_u32()? as u64;
                self.memo_put(id)?;
            }
            Opcode::Memoize => {
                let id = self.memo.len() as u64;
                self.memo_put(id)?;
            }
            Opcode::Get => {
                let id = self.read_memo_id()?;
                self.memo_get(id)?;
            }
            Opcode::BinGet => {
                let id = self.reader.read_u8()? as u64;
                self.memo_get(id)?;
            }
            Opcode::LongBinGet => {
                let id = self.reader.read_u32()? as u64;
                self.memo_get(id)?;
            }

            // ---- not supported in archives ----
            Opcode::PersId | Opcode::BinPersId => {
                return Err(FormatErrorKind::Unsupported(
                    "persistent ids need an external resolver",
                ))
            }
            Opcode::Ext1 | Opcode::Ext2 | Opcode::Ext4 => {
                return Err(FormatErrorKind::Unsupported(
                    "the extension registry belongs to the producing process",
                ))
            }
        }
        Ok(Flow::Continue)
    }

    /// Lowest stack index the current frame may pop
    fn floor(&self) -> usize {
        self.marks.last().copied().unwrap_or(0)
    }

    fn pop(&mut self) -> Result<Value, FormatErrorKind> {
        if self.stack.len() <= self.floor() {
            return Err(FormatErrorKind::StackUnderflow);
        }
        self.stack.pop().ok_or(FormatErrorKind::StackUnderflow)
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, FormatErrorKind> {
        if self.stack.len() < self.floor() + n {
            return Err(FormatErrorKind::StackUnderflow);
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn top(&self) -> Result<&Value, FormatErrorKind> {
        if self.stack.len() <= self.floor() {
            return Err(FormatErrorKind::StackUnderflow);
        }
        self.stack.last().ok_or(FormatErrorKind::StackUnderflow)
    }

    /// Pop everything above the most recent MARK, and the mark itself
    fn pop_mark(&mut self) -> Result<Vec<Value>, FormatErrorKind> {
        let mark = self.marks.pop().ok_or(FormatErrorKind::MissingMark)?;
        Ok(self.stack.split_off(mark))
    }

    fn memo_put(&mut self, id: u64) -> Result<(), FormatErrorKind> {
        let value = self.top()?.clone();
        self.memo.insert(id, value);
        Ok(())
    }

    fn memo_get(&mut self, id: u64) -> Result<(), FormatErrorKind> {
        let value = self
            .memo
            .get(&id)
            .cloned()
            .ok_or(FormatErrorKind::UndefinedMemo(id))?;
        self.stack.push(value);
        Ok(())
    }

    fn read_text_line(&mut self) -> Result<&'a str, FormatErrorKind> {
        let line = self.reader.read_line()?;
        std::str::from_utf8(line)
            .map_err(|_| FormatErrorKind::InvalidOperand("line is not valid UTF-8".to_string()))
    }

    fn read_memo_id(&mut self) -> Result<u64, FormatErrorKind> {
        let line = self.read_text_line()?;
        line.trim().parse::<u64>().map_err(|_| {
            FormatErrorKind::InvalidOperand(format!("bad memo id {:?}", line))
        })
    }

    fn type_name(&self, value: &Value) -> &'static str {
        self.graph.type_name(value)
    }

    fn expect_class(&self, value: &Value, op: &str) -> Result<Rc<ClassRef>, FormatErrorKind> {
        match value {
            Value::Class(class) => Ok(class.clone()),
            other => Err(FormatErrorKind::TypeMismatch(format!(
                "{} needs a type reference, got {}",
                op,
                self.type_name(other)
            ))),
        }
    }

    fn expect_tuple(&self, value: &Value, op: &str) -> Result<Vec<Value>, FormatErrorKind> {
        match self.graph.as_tuple(value) {
            Some(items) => Ok(items.to_vec()),
            None => Err(FormatErrorKind::TypeMismatch(format!(
                "{} needs an argument tuple, got {}",
                op,
                self.type_name(value)
            ))),
        }
    }

    fn expect_kwargs(&self, value: &Value) -> Result<IndexMap<Rc<str>, Value>, FormatErrorKind> {
        let mapping = self.graph.as_mapping(value).ok_or_else(|| {
            FormatErrorKind::TypeMismatch(format!(
                "NEWOBJ_EX needs a keyword dict, got {}",
                self.type_name(value)
            ))
        })?;
        mapping
            .iter()
            .map(|(k, v)| match k {
                Value::Str(name) => Ok((name.clone(), v.clone())),
                other => Err(FormatErrorKind::TypeMismatch(format!(
                    "keyword name is {}, not str",
                    self.type_name(other)
                ))),
            })
            .collect()
    }

    fn expect_node(&self, value: &Value, action: &str) -> Result<NodeId, FormatErrorKind> {
        value.as_node().ok_or_else(|| {
            FormatErrorKind::TypeMismatch(format!("cannot {} a {}", action, self.type_name(value)))
        })
    }

    /// Split a flat key/value run into hashed pairs
    fn keyed_pairs(&self, items: Vec<Value>) -> Result<Vec<(Key, Value, Value)>, FormatErrorKind> {
        if items.len() % 2 != 0 {
            return Err(FormatErrorKind::InvalidOperand(format!(
                "odd number of items ({}) for a mapping",
                items.len()
            )));
        }
        let mut pairs = Vec::with_capacity(items.len() / 2);
        let mut iter = items.into_iter();
        while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
            pairs.push((self.graph.key_of(&k)?, k, v));
        }
        Ok(pairs)
    }

    fn extend(&mut self, target: &Value, items: Vec<Value>) -> Result<(), FormatErrorKind> {
        let id = self.expect_node(target, "append to")?;
        match self.graph.node_mut(id) {
            Node::List(list) => list.extend(items),
            Node::Placeholder(p) => p.list_items.extend(items),
            other => {
                return Err(FormatErrorKind::TypeMismatch(format!(
                    "cannot append to a {}",
                    other.kind()
                )))
            }
        }
        Ok(())
    }

    fn set_items(&mut self, target: &Value, items: Vec<Value>) -> Result<(), FormatErrorKind> {
        let id = self.expect_node(target, "set items on")?;
        let pairs = self.keyed_pairs(items)?;
        let mapping = match self.graph.node_mut(id) {
            Node::Dict(m) => m,
            Node::Placeholder(p) => &mut p.dict_items,
            other => {
                return Err(FormatErrorKind::TypeMismatch(format!(
                    "cannot set items on a {}",
                    other.kind()
                )))
            }
        };
        for (key, k, v) in pairs {
            mapping.insert(key, k, v);
        }
        Ok(())
    }

    fn add_items(&mut self, target: &Value, items: Vec<Value>) -> Result<(), FormatErrorKind> {
        let id = self.expect_node(target, "add items to")?;
        let keyed = items
            .into_iter()
            .map(|item| Ok((self.graph.key_of(&item)?, item)))
            .collect::<Result<Vec<_>, FormatErrorKind>>()?;
        match self.graph.node_mut(id) {
            Node::Set(set) => {
                for (key, item) in keyed {
                    set.insert(key, item);
                }
            }
            Node::Placeholder(p) => p.list_items.extend(keyed.into_iter().map(|(_, v)| v)),
            other => {
                return Err(FormatErrorKind::TypeMismatch(format!(
                    "cannot add items to a {}",
                    other.kind()
                )))
            }
        }
        Ok(())
    }

    /// BUILD: hand `state` to the object on top of the stack
    fn apply_state(&mut self, target: &Value, state: Value) -> Result<(), FormatErrorKind> {
        let id = self.expect_node(target, "restore state on")?;
        let fields = match self.graph.node(id) {
            Node::Namespace(_) => Some(self.state_fields(&state)?),
            _ => None,
        };
        match self.graph.node_mut(id) {
            Node::Placeholder(p) => p.restore_state(state),
            Node::Namespace(ns) => {
                for (name, value) in fields.unwrap_or_default() {
                    ns.fields.insert(name, value);
                }
            }
            other => {
                if !state.is_none() {
                    warn!(
                        "Discarding restored state for a {} (node {})",
                        other.kind(),
                        id.index()
                    );
                }
            }
        }
        Ok(())
    }

    /// Flatten a `state` or `(state, slot_state)` value into named fields
    fn state_fields(&self, state: &Value) -> Result<Vec<(Rc<str>, Value)>, FormatErrorKind> {
        let parts: Vec<&Value> = match self.graph.as_tuple(state) {
            Some([dict_state, slot_state]) => vec![dict_state, slot_state],
            _ => vec![state],
        };
        let mut fields = Vec::new();
        for part in parts {
            if part.is_none() {
                continue;
            }
            let mapping = self.graph.as_mapping(part).ok_or_else(|| {
                FormatErrorKind::TypeMismatch(format!(
                    "object state is a {}, not a dict",
                    self.type_name(part)
                ))
            })?;
            for (k, v) in mapping.iter() {
                match k {
                    Value::Str(name) => fields.push((name.clone(), v.clone())),
                    other => {
                        return Err(FormatErrorKind::TypeMismatch(format!(
                            "attribute name is {}, not str",
                            self.type_name(other)
                        )))
                    }
                }
            }
        }
        Ok(fields)
    }
}

fn utf8(bytes: &[u8]) -> Result<Rc<str>, FormatErrorKind> {
    std::str::from_utf8(bytes)
        .map(Rc::from)
        .map_err(|e| FormatErrorKind::InvalidOperand(format!("invalid UTF-8 text: {}", e)))
}

/// Protocol 0-2 byte strings: text when they decode, bytes otherwise
fn legacy_string(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::Str(Rc::from(text)),
        Err(e) => Value::Bytes(Rc::from(e.into_bytes())),
    }
}

/// Decimal integer text; values beyond i64 are kept as exact text
fn parse_decimal(text: &str) -> Result<Value, FormatErrorKind> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(Value::Int(v));
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FormatErrorKind::InvalidOperand(format!(
            "bad integer literal {:?}",
            text
        )));
    }
    let digits = digits.trim_start_matches('0');
    let sign = if negative { "-" } else { "" };
    Ok(Value::BigInt(Rc::from(format!("{}{}", sign, digits))))
}

/// Little-endian two's complement integer of any width
fn decode_long(bytes: &[u8]) -> Value {
    let Some(&last) = bytes.last() else {
        return Value::Int(0);
    };
    let negative = last & 0x80 != 0;
    if bytes.len() <= 8 {
        let mut buf = if negative { [0xff; 8] } else { [0; 8] };
        buf[..bytes.len()].copy_from_slice(bytes);
        return Value::Int(i64::from_le_bytes(buf));
    }

    let mut magnitude = bytes.to_vec();
    if negative {
        for b in magnitude.iter_mut() {
            *b = !*b;
        }
        for b in magnitude.iter_mut() {
            let (sum, carry) = b.overflowing_add(1);
            *b = sum;
            if !carry {
                break;
            }
        }
    }

    // repeated division of the big-endian magnitude by ten
    let mut be: Vec<u8> = magnitude.into_iter().rev().skip_while(|&b| b == 0).collect();
    let mut digits = Vec::new();
    while !be.is_empty() {
        let mut rem = 0u32;
        let mut quotient = Vec::with_capacity(be.len());
        for &b in &be {
            let cur = (rem << 8) | b as u32;
            let q = cur / 10;
            rem = cur % 10;
            if !(quotient.is_empty() && q == 0) {
                quotient.push(q as u8);
            }
        }
        digits.push(b'0' + rem as u8);
        be = quotient;
    }
    if digits.is_empty() {
        digits.push(b'0');
    }
    if negative {
        digits.push(b'-');
    }
    digits.reverse();
    let text = String::from_utf8_lossy(&digits).into_owned();
    match text.parse::<i64>() {
        Ok(v) => Value::Int(v),
        Err(_) => Value::BigInt(Rc::from(text)),
    }
}

/// STRING operand: a quoted literal with backslash escapes
fn unquote_string(line: &[u8]) -> Result<Vec<u8>, FormatErrorKind> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let body = match line {
        [q, body @ .., end] if (*q == b'\'' || *q == b'"') && q == end => body,
        _ => {
            return Err(FormatErrorKind::InvalidOperand(
                "STRING argument must be quoted".to_string(),
            ))
        }
    };

    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&esc) = body.get(i) else {
            return Err(FormatErrorKind::InvalidOperand(
                "trailing backslash in STRING".to_string(),
            ));
        };
        i += 1;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\\' | b'\'' | b'"' => out.push(esc),
            b'\n' => {}
            b'x' => {
                let hex = body.get(i..i + 2).ok_or_else(|| {
                    FormatErrorKind::InvalidOperand("truncated \\x escape".to_string())
                })?;
                out.push(parse_hex(hex)? as u8);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut v = (esc - b'0') as u32;
                for _ in 0..2 {
                    match body.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            v = v * 8 + (d - b'0') as u32;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((v & 0xff) as u8);
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

/// UNICODE operand: latin-1 bytes with `\uXXXX` / `\UXXXXXXXX` escapes
fn raw_unicode_escape(line: &[u8]) -> Result<String, FormatErrorKind> {
    let mut out = String::with_capacity(line.len());
    let mut pending_high: Option<u32> = None;
    let mut i = 0;
    while i < line.len() {
        let width = match (line[i], line.get(i + 1)) {
            (b'\\', Some(b'u')) => 4,
            (b'\\', Some(b'U')) => 8,
            _ => 0,
        };
        if width == 0 {
            if pending_high.take().is_some() {
                return Err(lone_surrogate());
            }
            out.push(line[i] as char);
            i += 1;
            continue;
        }
        let hex = line.get(i + 2..i + 2 + width).ok_or_else(|| {
            FormatErrorKind::InvalidOperand("truncated unicode escape".to_string())
        })?;
        let code = parse_hex(hex)?;
        i += 2 + width;

        match (pending_high.take(), code) {
            (None, 0xD800..=0xDBFF) => pending_high = Some(code),
            (Some(high), 0xDC00..=0xDFFF) => {
                let combined = 0x10000 + ((high - 0xD800) << 10) + (code - 0xDC00);
                out.push(char::from_u32(combined).ok_or_else(lone_surrogate)?);
            }
            (Some(_), _) => return Err(lone_surrogate()),
            (None, _) => out.push(char::from_u32(code).ok_or_else(lone_surrogate)?),
        }
    }
    if pending_high.is_some() {
        return Err(lone_surrogate());
    }
    Ok(out)
}

fn lone_surrogate() -> FormatErrorKind {
    FormatErrorKind::InvalidOperand("unpaired surrogate in unicode escape".to_string())
}

fn parse_hex(hex: &[u8]) -> Result<u32, FormatErrorKind> {
    std::str::from_utf8(hex)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
        .ok_or_else(|| FormatErrorKind::InvalidOperand(format!("bad hex escape {:?}", hex)))
}
