//! Tree-walking evaluation of lowered IR.

use crate::runtime::builtins;
use crate::runtime::errors::RuntimeError;
use crate::runtime::function::{CompileFlags, FunctionObject, MethodKind};
use crate::runtime::ir::{
    BinOp, Block, Capture, CastType, Expr, FormatPiece, FunctionDef, Item, Name, Place, Stmt, UnOp,
};
use crate::runtime::module::Globals;
use crate::runtime::value::{new_cell, Cell, Class, Instance, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Deepest chain of script calls before evaluation gives up.
pub const MAX_CALL_DEPTH: usize = 100;

/// Native stack that must remain before evaluating one more expression.
const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each stack segment allocated once the red zone is reached.
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

thread_local! {
    static CALL_DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<DepthGuard, RuntimeError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                return Err(RuntimeError::RecursionLimit {
                    limit: MAX_CALL_DEPTH,
                });
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Non-local exits travelling up through evaluation.
pub(crate) enum Unwind {
    Break(Value),
    Continue,
    Return(Value),
    Raise(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Raise(error)
    }
}

impl Unwind {
    fn into_error(self) -> RuntimeError {
        match self {
            Unwind::Raise(error) => error,
            Unwind::Break(_) => RuntimeError::LoopControl { keyword: "break" },
            Unwind::Continue => RuntimeError::LoopControl {
                keyword: "continue",
            },
            Unwind::Return(_) => RuntimeError::LoopControl { keyword: "return" },
        }
    }
}

type Flow<T> = Result<T, Unwind>;

/// A resolved assignment target.
enum Slot {
    Name(Name),
    Field(Rc<Instance>, String),
    Index(Rc<RefCell<Vec<Value>>>, usize),
}

/// Variables of one executing function, or of module initialization.
pub(crate) struct Frame {
    cells: HashMap<String, Cell>,
    globals: Globals,
    flags: CompileFlags,
}

/// Run `function` with the code installed at the moment of the call.
///
/// A receiver is taken from `receiver`, or from the first argument when
/// the method is called through its class (`Artist::method(artist)`).
pub fn call_function(
    function: &Rc<FunctionObject>,
    receiver: Option<Value>,
    mut args: Vec<Value>,
) -> Result<Value, RuntimeError> {
    let code = function.code();
    let given = args.len() + usize::from(receiver.is_some());
    let arity_error = || RuntimeError::Arity {
        name: function.qualname().to_string(),
        expected: code.arity(),
        got: given,
    };

    let receiver = match (code.receiver, receiver) {
        (true, Some(receiver)) => Some(receiver),
        (true, None) if !args.is_empty() => Some(args.remove(0)),
        (false, None) => None,
        _ => return Err(arity_error()),
    };
    if args.len() != code.params.len() {
        return Err(arity_error());
    }

    let _depth = DepthGuard::enter()?;

    let mut cells = HashMap::with_capacity(code.locals.len() + function.closure().len());
    for local in &code.locals {
        cells.insert(local.clone(), new_cell(None));
    }
    for (name, cell) in function.closure() {
        cells.insert(name.clone(), cell.clone());
    }
    for (param, arg) in code.params.iter().zip(args) {
        cells.insert(param.clone(), new_cell(Some(arg)));
    }
    if let Some(receiver) = receiver {
        cells.insert("self".to_string(), new_cell(Some(receiver)));
    }

    let mut frame = Frame {
        cells,
        globals: function.globals().clone(),
        flags: code.flags,
    };
    match frame.exec_block(&code.body) {
        Ok(value) | Err(Unwind::Return(value)) => Ok(value),
        Err(unwind) => Err(unwind.into_error()),
    }
}

pub fn call_value(callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Function(function) => call_function(function, None, args),
        Value::BoundMethod { receiver, function } => {
            call_function(function, Some((**receiver).clone()), args)
        }
        Value::Builtin(builtin) => builtins::call(*builtin, args),
        other => Err(RuntimeError::NotCallable {
            type_name: other.type_name(),
        }),
    }
}

/// `receiver.method(args)`: methods of the receiver's class first, then the
/// runtime's methods for its type.
pub fn call_method(receiver: &Value, method: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
    if let Value::Instance(instance) = receiver {
        if let Some(member) = instance.class.member(method) {
            return match member {
                Value::Function(function) if function.kind() == MethodKind::Instance => {
                    call_function(&function, Some(receiver.clone()), args)
                }
                other => call_value(&other, args),
            };
        }
    }
    builtins::call_method(receiver, method, args)
        .unwrap_or_else(|| Err(RuntimeError::no_attribute(receiver.type_name(), method)))
}

/// `value.name`: an instance field, else a class member (instance methods
/// come back bound to the instance).
pub fn get_attribute(value: &Value, name: &str) -> Result<Value, RuntimeError> {
    match value {
        Value::Instance(instance) => {
            if let Some(field) = instance.field(name) {
                return Ok(field);
            }
            match instance.class.member(name) {
                Some(Value::Function(function)) if function.kind() == MethodKind::Instance => {
                    Ok(Value::BoundMethod {
                        receiver: Box::new(value.clone()),
                        function,
                    })
                }
                Some(member) => Ok(member),
                None => Err(RuntimeError::no_attribute(value.type_name(), name)),
            }
        }
        Value::Class(class) => class
            .member(name)
            .ok_or_else(|| RuntimeError::no_attribute(class.name.clone(), name)),
        other => Err(RuntimeError::no_attribute(other.type_name(), name)),
    }
}

fn index_of(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let index = index
        .as_int()
        .ok_or_else(|| RuntimeError::type_error("indexing", "an integer", index.type_name()))?;
    usize::try_from(index)
        .ok()
        .filter(|idx| *idx < len)
        .ok_or(RuntimeError::IndexOutOfRange { index, len })
}

fn condition(value: Value, construct: &str) -> Result<bool, RuntimeError> {
    value
        .as_bool()
        .ok_or_else(|| RuntimeError::type_error(construct, "a bool", value.type_name()))
}

fn iterate(value: Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Str(text) => Ok(text.chars().map(|c| Value::str(c.to_string())).collect()),
        other => Err(RuntimeError::type_error(
            "for loop",
            "a Vec, range or string",
            other.type_name(),
        )),
    }
}

impl Frame {
    pub(crate) fn module(globals: Globals, flags: CompileFlags) -> Frame {
        Frame {
            cells: HashMap::new(),
            globals,
            flags,
        }
    }

    /// Execute module-level items in order.
    pub(crate) fn exec_items(&mut self, items: &[Item]) -> Result<(), RuntimeError> {
        for item in items {
            self.exec_item(item).map_err(Unwind::into_error)?;
        }
        Ok(())
    }

    fn load(&self, name: &Name) -> Result<Value, RuntimeError> {
        match name {
            Name::Local(ident) | Name::Free(ident) => {
                let value = self.cells.get(ident).and_then(|cell| cell.borrow().clone());
                value.ok_or_else(|| match name {
                    Name::Free(_) => RuntimeError::UnboundFree {
                        name: ident.clone(),
                    },
                    _ => RuntimeError::UnboundLocal {
                        name: ident.clone(),
                    },
                })
            }
            Name::Global(ident) => self
                .globals
                .get(ident)
                .or_else(|| builtins::lookup(ident).map(Value::Builtin))
                .ok_or_else(|| RuntimeError::NameNotDefined {
                    name: ident.clone(),
                }),
        }
    }

    fn store(&mut self, name: &Name, value: Value) {
        match name {
            Name::Local(ident) | Name::Free(ident) => {
                let cell = self
                    .cells
                    .entry(ident.clone())
                    .or_insert_with(|| new_cell(None));
                *cell.borrow_mut() = Some(value);
            }
            Name::Global(ident) => self.globals.set(ident.clone(), value),
        }
    }

    fn make_function(&self, def: &FunctionDef, self_cell: Option<&Cell>) -> Rc<FunctionObject> {
        let closure = def
            .code
            .freevars
            .iter()
            .zip(&def.captures)
            .map(|(name, capture)| {
                let cell = match capture {
                    Capture::Frame(source) => self.cells.get(source).cloned(),
                    Capture::SelfType => self_cell.cloned(),
                };
                (name.clone(), cell.unwrap_or_else(|| new_cell(None)))
            })
            .collect();
        FunctionObject::new(
            def.qualname.clone(),
            def.kind,
            def.code.clone(),
            closure,
            self.globals.clone(),
        )
    }

    fn exec_item(&mut self, item: &Item) -> Flow<()> {
        match item {
            Item::Function(def) => {
                let function = self.make_function(def, None);
                if let Some(target) = &def.target {
                    self.store(target, Value::Function(function));
                }
            }
            Item::Class {
                target,
                name,
                qualname,
            } => {
                let class = Class::new(name.clone(), qualname.clone());
                self.store(target, Value::Class(class));
            }
            Item::Impl { class, methods } => {
                let value = self.load(class)?;
                let Value::Class(class) = value else {
                    return Err(RuntimeError::type_error("impl", "a struct", value.type_name()).into());
                };
                let self_cell = new_cell(Some(Value::Class(class.clone())));
                for def in methods {
                    let function = self.make_function(def, Some(&self_cell));
                    class.set_member(def.member.clone(), Value::Function(function));
                }
            }
            Item::Const { target, value } => {
                let value = self.eval(value)?;
                self.store(target, value);
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, block: &Block) -> Flow<Value> {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let { target, init } => {
                    if let Some(init) = init {
                        let value = self.eval(init)?;
                        if let Some(target) = target {
                            self.store(target, value);
                        }
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval(expr)?;
                }
                Stmt::Item(item) => self.exec_item(item)?,
            }
        }
        match &block.tail {
            Some(tail) => self.eval(tail),
            None => Ok(Value::Unit),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr]) -> Flow<Vec<Value>> {
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn int(&mut self, expr: &Expr, what: &str) -> Flow<i64> {
        let value = self.eval(expr)?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::type_error(what, "an integer", value.type_name()).into())
    }

    /// Body of a loop; `Some` carries the value of a `break`.
    fn loop_body(&mut self, body: &Block) -> Flow<Option<Value>> {
        match self.exec_block(body) {
            Ok(_) | Err(Unwind::Continue) => Ok(None),
            Err(Unwind::Break(value)) => Ok(Some(value)),
            Err(other) => Err(other),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Flow<Value> {
        // Script calls recurse through here; grow the native stack instead
        // of overflowing it before MAX_CALL_DEPTH is reached.
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.eval_expr(expr))
    }

    fn eval_expr(&mut self, expr: &Expr) -> Flow<Value> {
        let value = match expr {
            Expr::Const(value) => value.clone(),
            Expr::Load(name) => self.load(name)?,
            Expr::Assign { target, value } => {
                let value = self.eval(value)?;
                let slot = self.slot(target)?;
                self.write(slot, value);
                Value::Unit
            }
            Expr::AssignOp { target, op, value } => {
                let slot = self.slot(target)?;
                let current = self.read(&slot)?;
                let rhs = self.eval(value)?;
                let updated = binary(*op, &current, &rhs, self.flags)?;
                self.write(slot, updated);
                Value::Unit
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                unary(*op, &operand, self.flags)?
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs, self.flags)?
            }
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if condition(lhs, "&&")? {
                    let rhs = self.eval(rhs)?;
                    Value::Bool(condition(rhs, "&&")?)
                } else {
                    Value::Bool(false)
                }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if condition(lhs, "||")? {
                    Value::Bool(true)
                } else {
                    let rhs = self.eval(rhs)?;
                    Value::Bool(condition(rhs, "||")?)
                }
            }
            Expr::Call { callee, args } => {
                let callee = self.eval(callee)?;
                let args = self.eval_all(args)?;
                call_value(&callee, args)?
            }
            Expr::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_all(args)?;
                call_method(&receiver, method, args)?
            }
            Expr::Field { base, field } => {
                let base = self.eval(base)?;
                get_attribute(&base, field)?
            }
            Expr::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                match &base {
                    Value::List(items) => {
                        let items = items.borrow();
                        items[index_of(&index, items.len())?].clone()
                    }
                    Value::Str(text) => {
                        let chars: Vec<char> = text.chars().collect();
                        Value::str(chars[index_of(&index, chars.len())?].to_string())
                    }
                    other => {
                        return Err(RuntimeError::type_error("indexing", "a Vec or string", other.type_name()).into())
                    }
                }
            }
            Expr::Member { base, member } => match self.eval(base)? {
                Value::Class(class) => class
                    .member(member)
                    .ok_or_else(|| RuntimeError::no_attribute(class.name.clone(), member.clone()))?,
                Value::Builtin(builtin) => builtins::lookup_member(builtin, member)
                    .map(Value::Builtin)
                    .ok_or_else(|| RuntimeError::no_attribute(builtin.name(), member.clone()))?,
                other => return Err(RuntimeError::no_attribute(other.type_name(), member.clone()).into()),
            },
            Expr::StructLit { class, fields } => {
                let class = match self.eval(class)? {
                    Value::Class(class) => class,
                    other => {
                        return Err(RuntimeError::type_error("struct literal", "a struct", other.type_name()).into())
                    }
                };
                let mut values = HashMap::with_capacity(fields.len());
                for (name, expr) in fields {
                    values.insert(name.clone(), self.eval(expr)?);
                }
                Value::Instance(Instance::new(class, values))
            }
            Expr::List(items) => Value::list(self.eval_all(items)?),
            Expr::Range {
                start,
                end,
                inclusive,
            } => {
                let start = self.int(start, "range")?;
                let end = self.int(end, "range")?;
                let items: Vec<Value> = if *inclusive {
                    (start..=end).map(Value::Int).collect()
                } else {
                    (start..end).map(Value::Int).collect()
                };
                Value::list(items)
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond)?;
                if condition(cond, "if")? {
                    self.exec_block(then)?
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)?
                } else {
                    Value::Unit
                }
            }
            Expr::While { cond, body } => {
                loop {
                    let cond = self.eval(cond)?;
                    if !condition(cond, "while")? || self.loop_body(body)?.is_some() {
                        break;
                    }
                }
                Value::Unit
            }
            Expr::Loop(body) => loop {
                if let Some(value) = self.loop_body(body)? {
                    break value;
                }
            },
            Expr::For { target, iter, body } => {
                let items: Box<dyn Iterator<Item = Value>> = match &**iter {
                    Expr::Range {
                        start,
                        end,
                        inclusive,
                    } => {
                        let start = self.int(start, "range")?;
                        let end = self.int(end, "range")?;
                        if *inclusive {
                            Box::new((start..=end).map(Value::Int))
                        } else {
                            Box::new((start..end).map(Value::Int))
                        }
                    }
                    other => {
                        let value = self.eval(other)?;
                        Box::new(iterate(value)?.into_iter())
                    }
                };
                for item in items {
                    if let Some(target) = target {
                        self.store(target, item);
                    }
                    if self.loop_body(body)?.is_some() {
                        break;
                    }
                }
                Value::Unit
            }
            Expr::Block(block) => self.exec_block(block)?,
            Expr::Break(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Unit,
                };
                return Err(Unwind::Break(value));
            }
            Expr::Continue => return Err(Unwind::Continue),
            Expr::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value)?,
                    None => Value::Unit,
                };
                return Err(Unwind::Return(value));
            }
            Expr::Closure(def) => Value::Function(self.make_function(def, None)),
            Expr::Format(pieces) => Value::str(self.render(pieces)?),
            Expr::Print {
                pieces,
                newline,
                stderr,
            } => {
                let mut text = self.render(pieces)?;
                if *newline {
                    text.push('\n');
                }
                if *stderr {
                    eprint!("{text}");
                } else {
                    print!("{text}");
                }
                Value::Unit
            }
            Expr::Panic(pieces) => {
                let message = self.render(pieces)?;
                return Err(RuntimeError::Panic(message).into());
            }
            Expr::Cast { expr, to } => {
                let value = self.eval(expr)?;
                cast(&value, *to)?
            }
        };
        Ok(value)
    }

    fn render(&mut self, pieces: &[FormatPiece]) -> Flow<String> {
        let mut out = String::new();
        for piece in pieces {
            match piece {
                FormatPiece::Literal(text) => out.push_str(text),
                FormatPiece::Arg { expr, debug } => {
                    let value = self.eval(expr)?;
                    if *debug {
                        out.push_str(&value.repr());
                    } else {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        Ok(out)
    }

    fn slot(&mut self, place: &Place) -> Flow<Slot> {
        match place {
            Place::Name(name) => Ok(Slot::Name(name.clone())),
            Place::Field { base, field } => match self.eval(base)? {
                Value::Instance(instance) => Ok(Slot::Field(instance, field.clone())),
                other => Err(RuntimeError::no_attribute(other.type_name(), field.clone()).into()),
            },
            Place::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                match base {
                    Value::List(items) => {
                        let idx = index_of(&index, items.borrow().len())?;
                        Ok(Slot::Index(items, idx))
                    }
                    other => {
                        Err(RuntimeError::type_error("index assignment", "a Vec", other.type_name()).into())
                    }
                }
            }
        }
    }

    fn read(&self, slot: &Slot) -> Result<Value, RuntimeError> {
        match slot {
            Slot::Name(name) => self.load(name),
            Slot::Field(instance, field) => instance
                .field(field)
                .ok_or_else(|| RuntimeError::no_attribute(instance.class.name.clone(), field.clone())),
            Slot::Index(items, idx) => Ok(items.borrow()[*idx].clone()),
        }
    }

    fn write(&mut self, slot: Slot, value: Value) {
        match slot {
            Slot::Name(name) => self.store(&name, value),
            Slot::Field(instance, field) => instance.set_field(field, value),
            Slot::Index(items, idx) => {
                if let Some(entry) = items.borrow_mut().get_mut(idx) {
                    *entry = value;
                }
            }
        }
    }
}

fn unary(op: UnOp, operand: &Value, flags: CompileFlags) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnOp::Neg, Value::Int(n)) => {
            if flags.contains(CompileFlags::WRAPPING_ARITHMETIC) {
                Ok(Value::Int(n.wrapping_neg()))
            } else {
                n.checked_neg()
                    .map(Value::Int)
                    .ok_or(RuntimeError::Overflow { operation: "negate" })
            }
        }
        (UnOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnOp::Not, Value::Int(n)) => Ok(Value::Int(!n)),
        (UnOp::Neg, other) => Err(RuntimeError::type_error("negation", "a number", other.type_name())),
        (UnOp::Not, other) => Err(RuntimeError::type_error("`!`", "a bool or integer", other.type_name())),
    }
}

fn cast(value: &Value, to: CastType) -> Result<Value, RuntimeError> {
    match (value, to) {
        (Value::Int(n), CastType::Int) => Ok(Value::Int(*n)),
        (Value::Int(n), CastType::Float) => Ok(Value::Float(*n as f64)),
        (Value::Float(x), CastType::Int) => Ok(Value::Int(*x as i64)),
        (Value::Float(x), CastType::Float) => Ok(Value::Float(*x)),
        (Value::Bool(b), CastType::Int) => Ok(Value::Int(i64::from(*b))),
        (other, _) => Err(RuntimeError::type_error("cast", "a number or bool", other.type_name())),
    }
}

fn ordering(op: BinOp, ord: Option<std::cmp::Ordering>) -> Option<bool> {
    use std::cmp::Ordering::*;
    let ord = ord?;
    Some(match op {
        BinOp::Lt => ord == Less,
        BinOp::Le => ord != Greater,
        BinOp::Gt => ord == Greater,
        BinOp::Ge => ord != Less,
        _ => return None,
    })
}

fn int_binary(op: BinOp, a: i64, b: i64, flags: CompileFlags) -> Result<Value, RuntimeError> {
    let wrapping = flags.contains(CompileFlags::WRAPPING_ARITHMETIC);
    let shift = |b: i64| u32::try_from(b).ok();
    let result = match op {
        BinOp::Add if wrapping => Some(a.wrapping_add(b)),
        BinOp::Add => a.checked_add(b),
        BinOp::Sub if wrapping => Some(a.wrapping_sub(b)),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul if wrapping => Some(a.wrapping_mul(b)),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div | BinOp::Rem if b == 0 => return Err(RuntimeError::DivisionByZero),
        BinOp::Div if flags.contains(CompileFlags::TRUE_DIVISION) => {
            return Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::Div if wrapping => Some(a.wrapping_div(b)),
        BinOp::Div => a.checked_div(b),
        BinOp::Rem if wrapping => Some(a.wrapping_rem(b)),
        BinOp::Rem => a.checked_rem(b),
        BinOp::BitAnd => Some(a & b),
        BinOp::BitOr => Some(a | b),
        BinOp::BitXor => Some(a ^ b),
        BinOp::Shl if wrapping => shift(b).map(|s| a.wrapping_shl(s)),
        BinOp::Shl => shift(b).and_then(|s| a.checked_shl(s)),
        BinOp::Shr if wrapping => shift(b).map(|s| a.wrapping_shr(s)),
        BinOp::Shr => shift(b).and_then(|s| a.checked_shr(s)),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            return Ok(Value::Bool(ordering(op, Some(a.cmp(&b))).unwrap_or(false)))
        }
        BinOp::Eq | BinOp::Ne => return Ok(Value::Bool((a == b) == (op == BinOp::Eq))),
    };
    result.map(Value::Int).ok_or(RuntimeError::Overflow {
        operation: op.symbol(),
    })
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Option<Value> {
    let value = match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mul => Value::Float(a * b),
        BinOp::Div => Value::Float(a / b),
        BinOp::Rem => Value::Float(a % b),
        _ => Value::Bool(ordering(op, a.partial_cmp(&b))?),
    };
    Some(value)
}

/// Evaluate a binary operator under the given module flags.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value, flags: CompileFlags) -> Result<Value, RuntimeError> {
    if matches!(op, BinOp::Eq | BinOp::Ne) {
        return Ok(Value::Bool((lhs == rhs) == (op == BinOp::Eq)));
    }
    let mismatch = || RuntimeError::BinaryType {
        operation: op.symbol(),
        left: lhs.type_name(),
        right: rhs.type_name(),
    };
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b, flags),
        (Value::Float(a), Value::Float(b)) => float_binary(op, *a, *b).ok_or_else(mismatch),
        (Value::Int(a), Value::Float(b)) => float_binary(op, *a as f64, *b).ok_or_else(mismatch),
        (Value::Float(a), Value::Int(b)) => float_binary(op, *a, *b as f64).ok_or_else(mismatch),
        (Value::Str(a), Value::Str(b)) => match op {
            BinOp::Add => Ok(Value::str(format!("{a}{b}"))),
            _ => ordering(op, Some(a.cmp(b))).map(Value::Bool).ok_or_else(mismatch),
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::BitAnd => Ok(Value::Bool(a & b)),
            BinOp::BitOr => Ok(Value::Bool(a | b)),
            BinOp::BitXor => Ok(Value::Bool(a ^ b)),
            _ => ordering(op, Some(a.cmp(b))).map(Value::Bool).ok_or_else(mismatch),
        },
        _ => Err(mismatch()),
    }
}
