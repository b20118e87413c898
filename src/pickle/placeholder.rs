//! Stand-in for instances of types the resolver does not know
//!
//! A placeholder is a passive record of whatever the stream supplied for the
//! object: constructor arguments, keyword arguments and, later, restored
//! state. Interpretation of that data belongs to `attributes`.

use crate::pickle::resolver::ClassRef;
use crate::pickle::value::{Mapping, Value};
use indexmap::IndexMap;
use log::warn;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    /// Shared per (namespace, type-name) by the resolver that created it
    pub class: Rc<ClassRef>,
    pub args: Vec<Value>,
    pub kwargs: IndexMap<Rc<str>, Value>,
    pub state: Option<Value>,
    /// Items appended when the unknown type was a list subclass
    pub list_items: Vec<Value>,
    /// Items stored when the unknown type was a dict subclass
    pub dict_items: Mapping,
}

impl Placeholder {
    pub fn new(class: Rc<ClassRef>, args: Vec<Value>, kwargs: IndexMap<Rc<str>, Value>) -> Self {
        Placeholder {
            class,
            args,
            kwargs,
            state: None,
            list_items: Vec::new(),
            dict_items: Mapping::new(),
        }
    }

    pub fn module(&self) -> &str {
        &self.class.module
    }

    pub fn type_name(&self) -> &str {
        &self.class.name
    }

    /// Attach restored state. A repeated restore overwrites the earlier one.
    pub fn restore_state(&mut self, state: Value) {
        if self.state.is_some() {
            warn!(
                "State restored twice on {}.{}; keeping the latest",
                self.class.module, self.class.name
            );
        }
        self.state = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pickle::resolver::TypeResolver;
    use test_log::test;

    #[test]
    fn test_restore_state_overwrites() {
        let mut resolver = TypeResolver::new();
        let class = resolver.resolve("NetUtils", "NetworkSlot");
        let mut p = Placeholder::new(class, vec![Value::str("Alice")], IndexMap::new());
        assert!(p.state.is_none());

        p.restore_state(Value::Int(1));
        p.restore_state(Value::Int(2));
        assert_eq!(p.state, Some(Value::Int(2)));
        assert_eq!(p.module(), "NetUtils");
        assert_eq!(p.type_name(), "NetworkSlot");
        assert_eq!(p.args, vec![Value::str("Alice")]);
    }
}
