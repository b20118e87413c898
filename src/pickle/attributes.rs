//! Attribute lookup over decoded objects
//!
//! Strategies are tried in a fixed order and the first one that yields a
//! value wins:
//!
//! 1. native field of a resolved object
//! 2. entry in a placeholder's restored-state mapping
//! 3. entry in either half of a `(state, slot_state)` pair, first half first
//! 4. the slot-record constructor convention (`name`, `game`), see
//!    [`slot_record_argument`]
//!
//! Anything else is `Attribute::Unknown`.

use crate::pickle::placeholder::Placeholder;
use crate::pickle::value::{Graph, Node, Value};

/// Where an attribute value was found
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attribute<'g> {
    Field(&'g Value),
    State(&'g Value),
    SlotState(&'g Value),
    ConstructorArg(&'g Value),
    Unknown,
}

impl<'g> Attribute<'g> {
    pub fn value(&self) -> Option<&'g Value> {
        match *self {
            Attribute::Field(v)
            | Attribute::State(v)
            | Attribute::SlotState(v)
            | Attribute::ConstructorArg(v) => Some(v),
            Attribute::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Attribute::Unknown)
    }
}

/// Resolve `value.name`
pub fn get_attr<'g>(graph: &'g Graph, value: &Value, name: &str) -> Attribute<'g> {
    match graph.deref(value) {
        Some(Node::Namespace(ns)) => ns
            .fields
            .get(name)
            .map_or(Attribute::Unknown, Attribute::Field),
        Some(Node::Placeholder(p)) => placeholder_attr(graph, p, name),
        _ => Attribute::Unknown,
    }
}

fn placeholder_attr<'g>(graph: &'g Graph, p: &'g Placeholder, name: &str) -> Attribute<'g> {
    if let Some(state) = &p.state {
        if let Some(v) = graph.item(state, name) {
            return Attribute::State(v);
        }
        if let Some([dict_state, slot_state]) = graph.as_tuple(state) {
            if let Some(v) = graph.item(dict_state, name) {
                return Attribute::State(v);
            }
            if let Some(v) = graph.item(slot_state, name) {
                return Attribute::SlotState(v);
            }
        }
    }

    slot_record_argument(p, name).map_or(Attribute::Unknown, Attribute::ConstructorArg)
}

/// Heuristic: the multiworld slot record is constructed as
/// `NetworkSlot(name, game, ...)` and carries no state of its own, so its
/// identity is only recoverable positionally. Applies to `name` and `game`
/// only; no other attribute is ever read from constructor arguments.
fn slot_record_argument<'g>(p: &'g Placeholder, name: &str) -> Option<&'g Value> {
    let index = match name {
        "name" => 0,
        "game" => 1,
        _ => return None,
    };
    p.args.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::unpickler::loads;
    use test_log::test;

    // NetUtils.NetworkSlot('Alice', 'ChessGame') with optional BUILD state appended
    fn slot_stream(state: &[u8]) -> Vec<u8> {
        let mut data = b"\x80\x04\x8c\x08NetUtils\x8c\x0bNetworkSlot\x93".to_vec();
        data.extend_from_slice(b"\x8c\x05Alice\x8c\tChessGame\x86\x81");
        data.extend_from_slice(state);
        data.push(b'.');
        data
    }

    #[test]
    fn test_constructor_convention() {
        let g = loads(&slot_stream(b"")).unwrap();
        let root = g.root();
        assert_eq!(
            get_attr(&g, root, "name"),
            Attribute::ConstructorArg(&Value::str("Alice"))
        );
        assert_eq!(
            get_attr(&g, root, "game").value(),
            Some(&Value::str("ChessGame"))
        );
        assert!(get_attr(&g, root, "type").is_unknown());
    }

    #[test]
    fn test_state_shadows_constructor_args() {
        let g = loads(&slot_stream(b"}\x8c\x04name\x8c\x03Bobsb")).unwrap();
        let root = g.root();
        assert_eq!(get_attr(&g, root, "name"), Attribute::State(&Value::str("Bob")));
        // game is absent from state, so the heuristic still supplies it
        assert_eq!(
            get_attr(&g, root, "game"),
            Attribute::ConstructorArg(&Value::str("ChessGame"))
        );
    }

    #[test]
    fn test_state_with_extra_keys() {
        let g = loads(&slot_stream(b"}\x8c\x05levelK\x03sb")).unwrap();
        let root = g.root();
        assert_eq!(get_attr(&g, root, "level"), Attribute::State(&Value::Int(3)));
        assert_eq!(get_attr(&g, root, "name").value(), Some(&Value::str("Alice")));
    }

    #[test]
    fn test_state_pair_checks_first_then_second() {
        // BUILD (None, {'name': 'Carol'}) then a pair where both halves have it
        let g = loads(&slot_stream(b"N}\x8c\x04name\x8c\x05Carols\x86b")).unwrap();
        assert_eq!(
            get_attr(&g, g.root(), "name"),
            Attribute::SlotState(&Value::str("Carol"))
        );

        let g = loads(&slot_stream(
            b"}\x8c\x04name\x8c\x04Daves}\x8c\x04name\x8c\x03Eves\x86b",
        ))
        .unwrap();
        assert_eq!(
            get_attr(&g, g.root(), "name"),
            Attribute::State(&Value::str("Dave"))
        );
    }

    #[test]
    fn test_short_argument_list() {
        // Slot('Zed',) has a name but no game
        let g = loads(b"\x8c\x01m\x8c\x04Slot\x93\x8c\x03Zed\x85\x81.").unwrap();
        assert_eq!(get_attr(&g, g.root(), "name").value(), Some(&Value::str("Zed")));
        assert!(get_attr(&g, g.root(), "game").is_unknown());
    }

    #[test]
    fn test_native_fields_and_scalars() {
        let g = loads(b"ctypes\nSimpleNamespace\n)R}\x8c\x04game\x8c\x04Chesssb.").unwrap();
        assert_eq!(
            get_attr(&g, g.root(), "game"),
            Attribute::Field(&Value::str("Chess"))
        );
        assert!(get_attr(&g, g.root(), "name").is_unknown());
        assert!(get_attr(&g, &Value::Int(1), "name").is_unknown());
    }
}
