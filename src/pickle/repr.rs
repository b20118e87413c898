//! Text rendering of decoded graphs
//!
//! `repr` produces a single-line rendering close to what the producing
//! runtime would print. `pretty` breaks anything that does not fit the line
//! width into one entry per line. Both are cycle-safe: a node that is already
//! being rendered further up shows as `<Recursion on list #N>`.

use crate::pickle::placeholder::Placeholder;
use crate::pickle::value::{Graph, Mapping, Node, NodeId, Value};
use std::fmt::Write;

pub const DEFAULT_WIDTH: usize = 120;
pub const DEFAULT_INDENT: usize = 2;

/// Single-line rendering of a value
pub fn repr(graph: &Graph, value: &Value) -> String {
    let mut c = Compact::new(graph, usize::MAX, Vec::new());
    // unlimited budget, cannot overflow
    let _ = c.value(value);
    c.out
}

/// Multi-line rendering with the given line width and indent step
pub fn pretty(graph: &Graph, value: &Value, width: usize, indent: usize) -> String {
    let mut p = Pretty {
        graph,
        width,
        indent,
        out: String::new(),
        active: Vec::new(),
    };
    p.write_value(value, 0, "", "");
    p.out
}

pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub(crate) fn bytes_repr(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push_str("b'");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{:02x}", b);
            }
        }
    }
    out.push('\'');
    out
}

fn float_repr(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else if f.abs() >= 1e16 {
        format!("{:e}", f)
    } else {
        format!("{}", f)
    }
}

fn scalar_repr(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(s) => s.to_string(),
        Value::Float(f) => float_repr(*f),
        Value::Str(s) => str_repr(s),
        Value::Bytes(b) => bytes_repr(b),
        Value::Class(c) => format!("<class '{}'>", c.qualified_name()),
        Value::Node(id) => format!("<node #{}>", id.index()),
    }
}

fn recursion_marker(graph: &Graph, id: NodeId) -> String {
    format!("<Recursion on {} #{}>", graph.node(id).kind(), id.index())
}

/// How a node breaks into entries
struct Layout<'g> {
    open: String,
    entries: Vec<Entry<'g>>,
    close: &'static str,
    /// Between entries on a single line
    sep: &'static str,
    /// After each entry when broken across lines
    trailing: &'static str,
    /// One-element tuples keep their comma
    one_tuple: bool,
}

enum Entry<'g> {
    Item(String, &'g Value),
    Pair(&'g Value, &'g Value),
    Group(String, Layout<'g>),
}

enum Shape<'g> {
    Atom(String),
    Layout(Layout<'g>),
}

fn seq_layout<'g>(open: &str, items: impl Iterator<Item = &'g Value>, close: &'static str) -> Layout<'g> {
    Layout {
        open: open.to_string(),
        entries: items.map(|v| Entry::Item(String::new(), v)).collect(),
        close,
        sep: ", ",
        trailing: ",",
        one_tuple: false,
    }
}

fn mapping_layout<'g>(open: &str, mapping: &'g Mapping, close: &'static str) -> Layout<'g> {
    Layout {
        open: open.to_string(),
        entries: mapping.iter().map(|(k, v)| Entry::Pair(k, v)).collect(),
        close,
        sep: ", ",
        trailing: ",",
        one_tuple: false,
    }
}

fn tuple_layout<'g>(items: &'g [Value]) -> Layout<'g> {
    let mut layout = seq_layout("(", items.iter(), ")");
    layout.one_tuple = items.len() == 1;
    layout
}

fn placeholder_layout(p: &Placeholder) -> Layout<'_> {
    let mut entries = vec![Entry::Group("args=".to_string(), tuple_layout(&p.args))];
    if !p.kwargs.is_empty() {
        let kwargs = Layout {
            open: "{".to_string(),
            entries: p
                .kwargs
                .iter()
                .map(|(k, v)| Entry::Item(format!("{}: ", str_repr(k)), v))
                .collect(),
            close: "}",
            sep: ", ",
            trailing: ",",
            one_tuple: false,
        };
        entries.push(Entry::Group("kwargs=".to_string(), kwargs));
    }
    if let Some(state) = &p.state {
        entries.push(Entry::Item("state=".to_string(), state));
    }
    if !p.list_items.is_empty() {
        entries.push(Entry::Group(
            "items=".to_string(),
            seq_layout("[", p.list_items.iter(), "]"),
        ));
    }
    if !p.dict_items.is_empty() {
        entries.push(Entry::Group(
            "dict_items=".to_string(),
            mapping_layout("{", &p.dict_items, "}"),
        ));
    }
    Layout {
        open: format!("<{} ", p.class.qualified_name()),
        entries,
        close: ">",
        sep: " ",
        trailing: "",
        one_tuple: false,
    }
}

fn shape(node: &Node) -> Shape<'_> {
    match node {
        Node::List(items) => Shape::Layout(seq_layout("[", items.iter(), "]")),
        Node::Tuple(items) => Shape::Layout(tuple_layout(items)),
        Node::Dict(m) => Shape::Layout(mapping_layout("{", m, "}")),
        Node::Set(s) if s.is_empty() => Shape::Atom("set()".to_string()),
        Node::Set(s) => Shape::Layout(seq_layout("{", s.iter(), "}")),
        Node::FrozenSet(s) if s.is_empty() => Shape::Atom("frozenset()".to_string()),
        Node::FrozenSet(s) => Shape::Layout(seq_layout("frozenset({", s.iter(), "})")),
        Node::ByteArray(b) => Shape::Atom(format!("bytearray({})", bytes_repr(b))),
        Node::Namespace(ns) => Shape::Layout(Layout {
            open: format!("{}(", ns.class.name),
            entries: ns
                .fields
                .iter()
                .map(|(k, v)| Entry::Item(format!("{}=", k), v))
                .collect(),
            close: ")",
            sep: ", ",
            trailing: ",",
            one_tuple: false,
        }),
        Node::Placeholder(p) => Shape::Layout(placeholder_layout(p)),
    }
}

struct Overflow;

/// Single-line writer that gives up once `limit` bytes are exceeded
struct Compact<'g> {
    graph: &'g Graph,
    out: String,
    limit: usize,
    active: Vec<NodeId>,
}

impl<'g> Compact<'g> {
    fn new(graph: &'g Graph, limit: usize, active: Vec<NodeId>) -> Self {
        Compact {
            graph,
            out: String::new(),
            limit,
            active,
        }
    }

    fn push(&mut self, s: &str) -> Result<(), Overflow> {
        self.out.push_str(s);
        if self.out.len() > self.limit {
            Err(Overflow)
        } else {
            Ok(())
        }
    }

    fn value(&mut self, value: &Value) -> Result<(), Overflow> {
        let Value::Node(id) = value else {
            return self.push(&scalar_repr(value));
        };
        let graph = self.graph;
        if self.active.contains(id) {
            return self.push(&recursion_marker(graph, *id));
        }
        self.active.push(*id);
        let result = match shape(graph.node(*id)) {
            Shape::Atom(text) => self.push(&text),
            Shape::Layout(layout) => self.layout(&layout),
        };
        self.active.pop();
        result
    }

    fn layout(&mut self, layout: &Layout) -> Result<(), Overflow> {
        self.push(&layout.open)?;
        for (i, entry) in layout.entries.iter().enumerate() {
            if i > 0 {
                self.push(layout.sep)?;
            }
            match entry {
                Entry::Item(prefix, v) => {
                    self.push(prefix)?;
                    self.value(v)?;
                }
                Entry::Pair(k, v) => {
                    self.value(k)?;
                    self.push(": ")?;
                    self.value(v)?;
                }
                Entry::Group(prefix, inner) => {
                    self.push(prefix)?;
                    self.layout(inner)?;
                }
            }
        }
        if layout.one_tuple {
            self.push(",")?;
        }
        self.push(layout.close)
    }
}

struct Pretty<'g> {
    graph: &'g Graph,
    width: usize,
    indent: usize,
    out: String,
    active: Vec<NodeId>,
}

impl<'g> Pretty<'g> {
    fn line(&mut self, level: usize, text: &str) {
        for _ in 0..level * self.indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn budget(&self, level: usize, prefix: &str, suffix: &str) -> usize {
        self.width
            .saturating_sub(level * self.indent + prefix.len() + suffix.len())
    }

    fn write_value(&mut self, value: &Value, level: usize, prefix: &str, suffix: &str) {
        let mut c = Compact::new(self.graph, self.budget(level, prefix, suffix), self.active.clone());
        if c.value(value).is_ok() {
            let text = format!("{}{}{}", prefix, c.out, suffix);
            self.line(level, &text);
            return;
        }

        // only nodes can overflow into several lines
        let Value::Node(id) = value else {
            let text = format!("{}{}{}", prefix, scalar_repr(value), suffix);
            self.line(level, &text);
            return;
        };
        let graph = self.graph;
        self.active.push(*id);
        match shape(graph.node(*id)) {
            Shape::Atom(text) => {
                let text = format!("{}{}{}", prefix, text, suffix);
                self.line(level, &text);
            }
            Shape::Layout(layout) => self.write_block(&layout, level, prefix, suffix),
        }
        self.active.pop();
    }

    fn write_layout(&mut self, layout: &Layout, level: usize, prefix: &str, suffix: &str) {
        let mut c = Compact::new(self.graph, self.budget(level, prefix, suffix), self.active.clone());
        if c.layout(layout).is_ok() {
            let text = format!("{}{}{}", prefix, c.out, suffix);
            self.line(level, &text);
        } else {
            self.write_block(layout, level, prefix, suffix);
        }
    }

    fn write_block(&mut self, layout: &Layout, level: usize, prefix: &str, suffix: &str) {
        let head = format!("{}{}", prefix, layout.open.trim_end());
        self.line(level, &head);
        for entry in &layout.entries {
            match entry {
                Entry::Item(item_prefix, v) => {
                    self.write_value(v, level + 1, item_prefix, layout.trailing)
                }
                Entry::Pair(k, v) => {
                    let mut c = Compact::new(self.graph, usize::MAX, self.active.clone());
                    let _ = c.value(k);
                    let key_prefix = format!("{}: ", c.out);
                    self.write_value(v, level + 1, &key_prefix, layout.trailing);
                }
                Entry::Group(group_prefix, inner) => {
                    self.write_layout(inner, level + 1, group_prefix, layout.trailing)
                }
            }
        }
        let tail = format!("{}{}", layout.close, suffix);
        self.line(level, &tail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::unpickler::loads;

    #[test]
    fn test_scalar_reprs() {
        let g = loads(b"N.").unwrap();
        assert_eq!(repr(&g, &Value::None), "None");
        assert_eq!(repr(&g, &Value::Bool(true)), "True");
        assert_eq!(repr(&g, &Value::Float(2.0)), "2.0");
        assert_eq!(repr(&g, &Value::Float(0.25)), "0.25");
        assert_eq!(repr(&g, &Value::str("it's")), "\"it's\"");
        assert_eq!(repr(&g, &Value::str("a\nb")), "'a\\nb'");
        assert_eq!(
            repr(&g, &Value::Bytes(std::rc::Rc::from(&b"A\x00"[..]))),
            "b'A\\x00'"
        );
    }

    #[test]
    fn test_container_reprs() {
        // {'a': (1,), 'b': [None, True]}
        let g = loads(b"}(\x8c\x01aK\x01\x85\x8c\x01b](N\x88eu.").unwrap();
        assert_eq!(repr(&g, g.root()), "{'a': (1,), 'b': [None, True]}");

        let g = loads(b"\x8f.").unwrap();
        assert_eq!(repr(&g, g.root()), "set()");
    }

    #[test]
    fn test_placeholder_repr() {
        let g = loads(
            b"\x8c\x07pkg.mod\x8c\x03Foo\x93\x8c\x05Alice\x85\x81}\x8c\x05levelK\x03sb.",
        )
        .unwrap();
        assert_eq!(
            repr(&g, g.root()),
            "<pkg.mod.Foo args=('Alice',) state={'level': 3}>"
        );
    }

    #[test]
    fn test_cycles_are_marked() {
        let g = loads(b"]\x94h\x00a.").unwrap();
        assert_eq!(repr(&g, g.root()), "[<Recursion on list #0>]");
        assert_eq!(pretty(&g, g.root(), 120, 2), "[<Recursion on list #0>]\n");
    }

    #[test]
    fn test_pretty_breaks_long_containers() {
        // ['aaaaaaaaaa', 'bbbbbbbbbb'] at width 20
        let g = loads(b"](\x8c\naaaaaaaaaa\x8c\nbbbbbbbbbbe.").unwrap();
        assert_eq!(
            pretty(&g, g.root(), 20, 2),
            "[\n  'aaaaaaaaaa',\n  'bbbbbbbbbb',\n]\n"
        );
        assert_eq!(
            pretty(&g, g.root(), 120, 2),
            "['aaaaaaaaaa', 'bbbbbbbbbb']\n"
        );
    }

    #[test]
    fn test_pretty_nested_dict() {
        // {'k': ['aaaaaaaaaa', 'bbbbbbbbbb']} at width 24
        let g = loads(b"}\x8c\x01k](\x8c\naaaaaaaaaa\x8c\nbbbbbbbbbbes.").unwrap();
        assert_eq!(
            pretty(&g, g.root(), 24, 2),
            "{\n  'k': [\n    'aaaaaaaaaa',\n    'bbbbbbbbbb',\n  ],\n}\n"
        );
    }
}
