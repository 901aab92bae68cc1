use crate::runtime::builtins::Builtin;
use crate::runtime::function::FunctionObject;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Shared variable slot. Closures capture the slot, not the value, so a
/// later assignment in either scope is seen by both.
pub type Cell = Rc<RefCell<Option<Value>>>;

pub fn new_cell(value: Option<Value>) -> Cell {
    Rc::new(RefCell::new(value))
}

/// Runtime value of the script language.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Function(Rc<FunctionObject>),
    BoundMethod {
        receiver: Box<Value>,
        function: Rc<FunctionObject>,
    },
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Builtin(Builtin),
}

impl Value {
    pub fn str(text: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(text.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Unit => "()".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "i64".to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::List(_) => "Vec".to_string(),
            Value::Function(_) => "fn".to_string(),
            Value::BoundMethod { .. } => "method".to_string(),
            Value::Class(_) => "struct".to_string(),
            Value::Instance(instance) => instance.class.name.clone(),
            Value::Builtin(_) => "builtin".to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Representation used inside containers and for `{:?}`.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(text) => format!("{:?}", &**text),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (
                Value::BoundMethod {
                    receiver: ra,
                    function: fa,
                },
                Value::BoundMethod {
                    receiver: rb,
                    function: fb,
                },
            ) => Rc::ptr_eq(fa, fb) && ra == rb,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(text) => write!(f, "{text}"),
            Value::List(items) => {
                let items = items.borrow();
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Function(function) => write!(f, "<fn {}>", function.qualname()),
            Value::BoundMethod { function, .. } => write!(f, "<method {}>", function.qualname()),
            Value::Class(class) => write!(f, "<struct {}>", class.qualname),
            Value::Instance(instance) => {
                let fields = instance.fields.borrow();
                let sorted: BTreeMap<_, _> = fields.iter().collect();
                write!(f, "{} {{", instance.class.name)?;
                for (idx, (name, value)) in sorted.into_iter().enumerate() {
                    let sep = if idx == 0 { " " } else { ", " };
                    write!(f, "{sep}{name}: {}", value.repr())?;
                }
                if fields.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Value::Builtin(builtin) => write!(f, "<builtin {}>", builtin.name()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::str(text)
    }
}

/// A `struct` declaration: a named bag of members filled in by `impl` blocks.
pub struct Class {
    pub name: String,
    pub qualname: String,
    members: RefCell<HashMap<String, Value>>,
}

impl Class {
    pub fn new(name: impl Into<String>, qualname: impl Into<String>) -> Rc<Class> {
        Rc::new(Class {
            name: name.into(),
            qualname: qualname.into(),
            members: RefCell::new(HashMap::new()),
        })
    }

    pub fn member(&self, name: &str) -> Option<Value> {
        self.members.borrow().get(name).cloned()
    }

    pub fn set_member(&self, name: impl Into<String>, value: Value) {
        self.members.borrow_mut().insert(name.into(), value);
    }

    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("qualname", &self.qualname)
            .field("members", &self.member_names())
            .finish()
    }
}

/// A struct literal: its class plus mutable fields.
pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<HashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>, fields: HashMap<String, Value>) -> Rc<Instance> {
        Rc::new(Instance {
            class,
            fields: RefCell::new(fields),
        })
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    /// Shallow copy with the same class.
    pub fn duplicate(&self) -> Rc<Instance> {
        Instance::new(self.class.clone(), self.fields.borrow().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_repr() {
        assert_eq!(Value::Int(3).to_string(), "3");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::str("hi").to_string(), "hi");
        assert_eq!(Value::str("hi").repr(), "\"hi\"");
        assert_eq!(Value::list(vec![Value::Int(1), Value::str("a")]).to_string(), "[1, \"a\"]");
        assert_eq!(Value::Unit.to_string(), "()");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::str("2"));
    }

    #[test]
    fn instances_compare_by_identity() {
        let class = Class::new("Point", "Point");
        let a = Value::Instance(Instance::new(class.clone(), HashMap::new()));
        let b = Value::Instance(Instance::new(class, HashMap::new()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn instance_display_sorts_fields() {
        let class = Class::new("Point", "Point");
        let mut fields = HashMap::new();
        fields.insert("y".to_string(), Value::Int(2));
        fields.insert("x".to_string(), Value::Int(1));
        let point = Value::Instance(Instance::new(class.clone(), fields));
        assert_eq!(point.to_string(), "Point { x: 1, y: 2 }");
        assert_eq!(Value::Instance(Instance::new(class, HashMap::new())).to_string(), "Point {}");
    }

    #[test]
    fn cells_are_shared() {
        let cell = new_cell(None);
        let other = cell.clone();
        *cell.borrow_mut() = Some(Value::Int(5));
        assert_eq!(*other.borrow(), Some(Value::Int(5)));
    }
}
