//! The per-case symbol table.
//!
//! A [`Scope`] is owned by exactly one case runner and passed by reference to every
//! directive handler and to the snippet evaluator. It only exposes `get`, `set` and `has`.

use std::fmt;

use im::OrdMap;

// ============================================================================
// VALUES
// ============================================================================

/// A value bound to a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// The empty value; bound by `extract_match` when nothing matched.
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Converts a YAML scalar or sequence; mappings have no `Value` form.
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Option<Value> {
        match yaml {
            serde_yaml::Value::Null => Some(Value::Nil),
            serde_yaml::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_yaml::Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            }),
            serde_yaml::Value::String(s) => Some(Value::Str(s.clone())),
            serde_yaml::Value::Sequence(items) => items
                .iter()
                .map(Value::from_yaml)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_yaml::Value::Mapping(_) => None,
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Renders the value the way it is written in snippet source: strings quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("({})", inner.join(" "))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(_) => write!(f, "{}", self.repr()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

// ============================================================================
// SCOPE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Scope {
    symbols: OrdMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.symbols.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.symbols.insert(name.into(), value.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.symbols.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_has() {
        let mut scope = Scope::new();
        assert!(!scope.has("name"));
        scope.set("name", "value");
        assert!(scope.has("name"));
        assert_eq!(scope.get("name"), Some(&Value::from("value")));
        scope.set("name", Value::Nil);
        assert_eq!(scope.get("name"), Some(&Value::Nil));
    }

    #[test]
    fn test_names_are_ordered() {
        let mut scope = Scope::new();
        scope.set("b", 2i64);
        scope.set("a", 1i64);
        let names: Vec<_> = scope.names().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_from_yaml() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("[1, two, true, ~]").unwrap();
        assert_eq!(
            Value::from_yaml(&yaml),
            Some(Value::List(vec![
                Value::Int(1),
                Value::from("two"),
                Value::Bool(true),
                Value::Nil
            ]))
        );
        let map: serde_yaml::Value = serde_yaml::from_str("{a: 1}").unwrap();
        assert_eq!(Value::from_yaml(&map), None);
    }

    #[test]
    fn test_display_and_repr() {
        let list = Value::List(vec![Value::Int(0), Value::from("out")]);
        assert_eq!(list.to_string(), "(0 \"out\")");
        assert_eq!(Value::from("out").to_string(), "out");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert!(!Value::Nil.is_truthy());
        assert!(Value::from("x").is_truthy());
    }
}
