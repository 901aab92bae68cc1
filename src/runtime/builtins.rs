//! Functions and methods available to every script without definition.

use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

/// Largest string a script may build in one operation.
pub const MAX_STRING_BYTES: usize = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Len,
    Min,
    Max,
    Abs,
    /// The `String` namespace, reached as `String::new` / `String::from`.
    StringType,
    StringNew,
    StringFrom,
    /// The `Vec` namespace, reached as `Vec::new`.
    VecType,
    VecNew,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Len => "len",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Abs => "abs",
            Builtin::StringType => "String",
            Builtin::StringNew => "String::new",
            Builtin::StringFrom => "String::from",
            Builtin::VecType => "Vec",
            Builtin::VecNew => "Vec::new",
        }
    }
}

/// Global fallback for names the module does not define.
pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "len" => Some(Builtin::Len),
        "min" => Some(Builtin::Min),
        "max" => Some(Builtin::Max),
        "abs" => Some(Builtin::Abs),
        "String" => Some(Builtin::StringType),
        "Vec" => Some(Builtin::VecType),
        _ => None,
    }
}

/// `Namespace::member` on a builtin namespace.
pub fn lookup_member(builtin: Builtin, member: &str) -> Option<Builtin> {
    match (builtin, member) {
        (Builtin::StringType, "new") => Some(Builtin::StringNew),
        (Builtin::StringType, "from") => Some(Builtin::StringFrom),
        (Builtin::VecType, "new") => Some(Builtin::VecNew),
        _ => None,
    }
}

fn arity(name: &str, expected: usize, args: &[Value]) -> Result<(), RuntimeError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RuntimeError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        })
    }
}

fn extreme(name: &'static str, args: &[Value], pick_first: impl Fn(&Value, &Value) -> bool) -> Result<Value, RuntimeError> {
    arity(name, 2, args)?;
    match (&args[0], &args[1]) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            if pick_first(&args[0], &args[1]) {
                Ok(args[0].clone())
            } else {
                Ok(args[1].clone())
            }
        }
        (left, right) => Err(RuntimeError::BinaryType {
            operation: "compare",
            left: left.type_name(),
            right: right.type_name(),
        }),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn length(name: &str, value: &Value) -> Result<Value, RuntimeError> {
    let len = match value {
        Value::Str(text) => text.chars().count(),
        Value::List(items) => items.borrow().len(),
        other => return Err(RuntimeError::type_error(name, "a string or Vec", other.type_name())),
    };
    Ok(Value::Int(len as i64))
}

fn absolute(value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(n) => n
            .checked_abs()
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow { operation: "abs" }),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => Err(RuntimeError::type_error("abs", "a number", other.type_name())),
    }
}

pub fn call(builtin: Builtin, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match builtin {
        Builtin::Len => {
            arity("len", 1, &args)?;
            length("len", &args[0])
        }
        Builtin::Min => extreme("min", &args, |a, b| as_f64(a) <= as_f64(b)),
        Builtin::Max => extreme("max", &args, |a, b| as_f64(a) >= as_f64(b)),
        Builtin::Abs => {
            arity("abs", 1, &args)?;
            absolute(&args[0])
        }
        Builtin::StringNew => {
            arity("String::new", 0, &args)?;
            Ok(Value::str(""))
        }
        Builtin::StringFrom => {
            arity("String::from", 1, &args)?;
            Ok(Value::str(args[0].to_string()))
        }
        Builtin::VecNew => {
            arity("Vec::new", 0, &args)?;
            Ok(Value::list(Vec::new()))
        }
        Builtin::StringType | Builtin::VecType => Err(RuntimeError::NotCallable {
            type_name: builtin.name().to_string(),
        }),
    }
}

fn int_arg(method: &str, value: &Value) -> Result<i64, RuntimeError> {
    value
        .as_int()
        .ok_or_else(|| RuntimeError::type_error(method, "an integer", value.type_name()))
}

fn str_arg(method: &str, value: &Value) -> Result<String, RuntimeError> {
    match value {
        Value::Str(text) => Ok(text.to_string()),
        other => Err(RuntimeError::type_error(method, "a string", other.type_name())),
    }
}

/// Method provided by the runtime for the receiver's type.
///
/// Returns `None` when the type has no such method, so the caller can
/// report the missing attribute with full context.
pub fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Option<Result<Value, RuntimeError>> {
    if method == "clone" {
        return Some(arity("clone", 0, &args).map(|()| clone_value(receiver)));
    }
    if method == "to_string" {
        return Some(arity("to_string", 0, &args).map(|()| Value::str(receiver.to_string())));
    }
    match receiver {
        Value::Str(text) => string_method(text, method, args),
        Value::Int(n) => int_method(*n, method, args),
        Value::Float(x) => float_method(*x, method, args),
        Value::List(_) => list_method(receiver, method, args),
        _ => None,
    }
}

fn clone_value(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::list(items.borrow().clone()),
        Value::Instance(instance) => Value::Instance(instance.duplicate()),
        other => other.clone(),
    }
}

fn string_method(text: &str, method: &str, args: Vec<Value>) -> Option<Result<Value, RuntimeError>> {
    let result = match method {
        "len" => arity(method, 0, &args).map(|()| Value::Int(text.len() as i64)),
        "is_empty" => arity(method, 0, &args).map(|()| Value::Bool(text.is_empty())),
        "to_uppercase" => arity(method, 0, &args).map(|()| Value::str(text.to_uppercase())),
        "to_lowercase" => arity(method, 0, &args).map(|()| Value::str(text.to_lowercase())),
        "trim" => arity(method, 0, &args).map(|()| Value::str(text.trim())),
        "chars" => arity(method, 0, &args).map(|()| {
            Value::list(text.chars().map(|c| Value::str(c.to_string())).collect())
        }),
        "contains" | "starts_with" | "ends_with" => arity(method, 1, &args)
            .and_then(|()| str_arg(method, &args[0]))
            .map(|needle| {
                Value::Bool(match method {
                    "contains" => text.contains(&needle),
                    "starts_with" => text.starts_with(&needle),
                    _ => text.ends_with(&needle),
                })
            }),
        "split" => arity(method, 1, &args)
            .and_then(|()| str_arg(method, &args[0]))
            .map(|sep| Value::list(text.split(sep.as_str()).map(Value::str).collect())),
        "replace" => arity(method, 2, &args).and_then(|()| {
            let from = str_arg(method, &args[0])?;
            let to = str_arg(method, &args[1])?;
            Ok(Value::str(text.replace(&from, &to)))
        }),
        "repeat" => arity(method, 1, &args)
            .and_then(|()| int_arg(method, &args[0]))
            .and_then(|times| {
                let times = usize::try_from(times).unwrap_or(0);
                match text.len().checked_mul(times) {
                    Some(len) if len <= MAX_STRING_BYTES => Ok(Value::str(text.repeat(times))),
                    _ => Err(RuntimeError::StringTooLong {
                        operation: "repeat",
                        limit: MAX_STRING_BYTES,
                    }),
                }
            }),
        _ => return None,
    };
    Some(result)
}

fn int_method(n: i64, method: &str, args: Vec<Value>) -> Option<Result<Value, RuntimeError>> {
    let result = match method {
        "abs" => arity(method, 0, &args).and_then(|()| absolute(&Value::Int(n))),
        "signum" => arity(method, 0, &args).map(|()| Value::Int(n.signum())),
        "pow" => arity(method, 1, &args)
            .and_then(|()| int_arg(method, &args[0]))
            .and_then(|exp| {
                u32::try_from(exp)
                    .ok()
                    .and_then(|exp| n.checked_pow(exp))
                    .map(Value::Int)
                    .ok_or(RuntimeError::Overflow { operation: "pow" })
            }),
        "min" | "max" => {
            let mut all = vec![Value::Int(n)];
            all.extend(args);
            if method == "min" {
                extreme("min", &all, |a, b| as_f64(a) <= as_f64(b))
            } else {
                extreme("max", &all, |a, b| as_f64(a) >= as_f64(b))
            }
        }
        _ => return None,
    };
    Some(result)
}

fn float_method(x: f64, method: &str, args: Vec<Value>) -> Option<Result<Value, RuntimeError>> {
    let unary = |f: fn(f64) -> f64| arity(method, 0, &args).map(|()| Value::Float(f(x)));
    let result = match method {
        "abs" => unary(f64::abs),
        "sqrt" => unary(f64::sqrt),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "round" => unary(f64::round),
        "powi" => arity(method, 1, &args)
            .and_then(|()| int_arg(method, &args[0]))
            .map(|exp| Value::Float(x.powi(exp as i32))),
        "powf" => arity(method, 1, &args).map(|()| Value::Float(x.powf(as_f64(&args[0])))),
        _ => return None,
    };
    Some(result)
}

fn list_method(receiver: &Value, method: &str, args: Vec<Value>) -> Option<Result<Value, RuntimeError>> {
    let Value::List(items) = receiver else {
        return None;
    };
    let result = match method {
        "len" => arity(method, 0, &args).map(|()| Value::Int(items.borrow().len() as i64)),
        "is_empty" => arity(method, 0, &args).map(|()| Value::Bool(items.borrow().is_empty())),
        "iter" | "into_iter" => arity(method, 0, &args).map(|()| receiver.clone()),
        "push" => arity(method, 1, &args).map(|()| {
            items.borrow_mut().extend(args);
            Value::Unit
        }),
        "pop" => arity(method, 0, &args).and_then(|()| {
            items
                .borrow_mut()
                .pop()
                .ok_or(RuntimeError::IndexOutOfRange { index: -1, len: 0 })
        }),
        "contains" => arity(method, 1, &args).map(|()| Value::Bool(items.borrow().contains(&args[0]))),
        "reverse" => arity(method, 0, &args).map(|()| {
            items.borrow_mut().reverse();
            Value::Unit
        }),
        "join" => arity(method, 1, &args)
            .and_then(|()| str_arg(method, &args[0]))
            .map(|sep| {
                let parts: Vec<String> = items.borrow().iter().map(ToString::to_string).collect();
                Value::str(parts.join(&sep))
            }),
        "sum" => arity(method, 0, &args).and_then(|()| sum(&items.borrow())),
        _ => return None,
    };
    Some(result)
}

fn sum(items: &[Value]) -> Result<Value, RuntimeError> {
    let mut total = Value::Int(0);
    for item in items {
        total = match (&total, item) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or(RuntimeError::Overflow { operation: "sum" })?,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                Value::Float(as_f64(&total) + as_f64(item))
            }
            (_, other) => return Err(RuntimeError::type_error("sum", "a number", other.type_name())),
        };
    }
    Ok(total)
}
