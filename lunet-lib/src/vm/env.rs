//! A stack of lexical scopes, innermost last.
//!
//! Blocks open a scope on entry and collapse it on exit. Lookup walks from
//! the innermost scope outwards. The maps are persistent, so snapshotting a
//! scope is a structural share rather than a deep copy.

use im::HashMap as ImHashMap;

use crate::core::Value;

pub type Scope = ImHashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct Env {
    /// the first scope belongs to the enclosing function (or chunk)
    scopes: Vec<Scope>,
}

impl Env {
    pub fn new() -> Self {
        Env {
            scopes: vec![ImHashMap::new()],
        }
    }

    /// open a new innermost scope
    pub fn open(&mut self) {
        self.scopes.push(ImHashMap::new());
    }

    /// collapse the innermost scope
    pub fn close(&mut self) {
        assert!(
            self.scopes.len() > 1,
            "tried to collapse the root scope. This is a bug"
        );
        self.scopes.pop();
    }

    /// introduce (or shadow) a binding in the innermost scope
    pub fn define(&mut self, name: impl Into<String>, val: Value) {
        self.scopes.last_mut().unwrap().insert(name.into(), val);
    }

    /// whether any scope holds a binding with this name
    pub fn contains(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.contains_key(name))
    }

    /// update the nearest binding with this name; panics if there is none
    pub fn assign(&mut self, name: &str, val: Value) {
        for scope in self.scopes.iter_mut().rev() {
            if scope.contains_key(name) {
                scope.insert(name.to_owned(), val);
                return;
            }
        }
        panic!("assign to an unbound name '{}'. This is a bug", name);
    }

    /// look a name up, innermost scope first
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scopes_shadow_outer_ones() {
        let mut env = Env::new();
        env.define("x", Value::Num(1.0));
        env.open();
        env.define("x", Value::Num(2.0));
        assert_eq!(env.get("x"), Some(&Value::Num(2.0)));
        env.close();
        assert_eq!(env.get("x"), Some(&Value::Num(1.0)));
    }

    #[test]
    fn assign_updates_the_nearest_binding() {
        let mut env = Env::new();
        env.define("x", Value::Num(1.0));
        env.open();
        assert!(env.contains("x"));
        env.assign("x", Value::Num(5.0));
        env.close();
        assert_eq!(env.get("x"), Some(&Value::Num(5.0)));
    }
}
