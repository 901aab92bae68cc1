//! Lowering of `syn` syntax trees into resolved IR.
//!
//! Name resolution is static and per function, not per block: a name bound
//! anywhere in a function body (`let`, parameter, `for` pattern, nested
//! `fn`/`struct`/`const`) is local to the whole function. A name that is not
//! local resolves to the nearest enclosing function binding it (becoming a
//! free variable of every function in between), else to the module.

use crate::runtime::errors::CompileError;
use crate::runtime::function::{CodeObject, CompileFlags, MethodKind, Origin};
use crate::runtime::ir::{
    BinOp, Block, Capture, CastType, Expr, FormatPiece, FunctionDef, Item, Name, Place, Stmt, UnOp,
};
use crate::runtime::scope::{is_global_decl, mangle, LocalCollector, Scope, ScopeKind};
use crate::runtime::value::Value;
use std::collections::HashMap;
use std::rc::Rc;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::Token;

fn line_of(node: &impl Spanned) -> usize {
    node.span().start().line
}

/// Read `#![feature(...)]` inner attributes of a module.
pub fn module_flags(file: &syn::File) -> Result<CompileFlags, CompileError> {
    let mut flags = CompileFlags::empty();
    let mut unknown = None;

    for attr in &file.attrs {
        if !matches!(attr.style, syn::AttrStyle::Inner(_)) || !attr.path().is_ident("feature") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();
            match CompileFlags::from_feature(&name) {
                Some(flag) => flags.insert(flag),
                None => {
                    unknown.get_or_insert(name);
                }
            }
            Ok(())
        })?;
    }

    match unknown {
        Some(name) => Err(CompileError::UnknownFeature { name }),
        None => Ok(flags),
    }
}

#[derive(Clone, Copy)]
enum Body<'a> {
    Block(&'a syn::Block),
    Expr(&'a syn::Expr),
}

struct CodeSpec<'a> {
    name: String,
    qualname: String,
    params: Vec<String>,
    receiver: bool,
    body: Body<'a>,
    line: usize,
    is_method: bool,
}

/// Compiles one module (or one rebuild wrapper) worth of items.
pub struct Compiler {
    module: String,
    source: Option<Rc<str>>,
    flags: CompileFlags,
    scopes: Vec<Scope>,
    class: Option<String>,
    qual_prefix: String,
}

impl Compiler {
    /// `source` is recorded as the origin of every compiled function so
    /// their text can be recovered later; pass `None` for synthesized code.
    pub fn new(module: impl Into<String>, source: Option<Rc<str>>, flags: CompileFlags) -> Self {
        Self {
            module: module.into(),
            source,
            flags,
            scopes: Vec::new(),
            class: None,
            qual_prefix: String::new(),
        }
    }

    pub fn compile_file(&mut self, file: &syn::File) -> Result<Vec<Item>, CompileError> {
        let mut items = Vec::new();
        for item in &file.items {
            if let Some(compiled) = self.compile_item(item)? {
                items.push(compiled);
            }
        }
        Ok(items)
    }

    fn mangle(&self, name: &str) -> String {
        mangle(self.class.as_deref(), name)
    }

    /// Find the scope binding `name`, marking it free in every function
    /// between that scope and the current one.
    fn lookup(&mut self, name: &str) -> Option<Name> {
        let current = self.scopes.len().checked_sub(1)?;
        let scope = &self.scopes[current];
        if scope.globals.contains(name) {
            return Some(Name::Global(name.to_string()));
        }
        if scope.kind == ScopeKind::Function && scope.locals.contains(name) {
            return Some(Name::Local(name.to_string()));
        }

        let mut owner = None;
        for idx in (0..current).rev() {
            let scope = &self.scopes[idx];
            if scope.kind == ScopeKind::Function && scope.globals.contains(name) {
                return Some(Name::Global(name.to_string()));
            }
            if scope.binds(name) {
                owner = Some(idx);
                break;
            }
        }

        let owner = owner?;
        for scope in &mut self.scopes[owner + 1..] {
            if scope.kind == ScopeKind::Function {
                scope.freevars.insert(name.to_string());
            }
        }
        Some(Name::Free(name.to_string()))
    }

    fn resolve_load(&mut self, raw: &str) -> Name {
        let name = self.mangle(raw);
        self.lookup(&name).unwrap_or(Name::Global(name))
    }

    fn resolve_store(&mut self, raw: &str, line: usize) -> Result<Name, CompileError> {
        let name = self.mangle(raw);
        if self.scopes.is_empty() {
            return Ok(Name::Global(name));
        }
        self.lookup(&name)
            .ok_or(CompileError::NonlocalUnbound { name, line })
    }

    fn compile_item(&mut self, item: &syn::Item) -> Result<Option<Item>, CompileError> {
        let line = line_of(item);
        let compiled = match item {
            syn::Item::Fn(func) => {
                let name = func.sig.ident.to_string();
                let target = self.resolve_store(&name, line)?;
                let (params, receiver) = self.params(&func.sig)?;
                let qualname = format!("{}{}", self.qual_prefix, name);
                let (code, captures) = self.compile_code(CodeSpec {
                    name: name.clone(),
                    qualname: qualname.clone(),
                    params,
                    receiver,
                    body: Body::Block(&func.block),
                    line: line_of(&func.sig.ident),
                    is_method: false,
                })?;
                Item::Function(FunctionDef {
                    target: Some(target),
                    member: name,
                    qualname,
                    kind: MethodKind::Function,
                    code,
                    captures,
                })
            }
            syn::Item::Struct(item) => {
                let name = item.ident.to_string();
                Item::Class {
                    target: self.resolve_store(&name, line)?,
                    qualname: format!("{}{}", self.qual_prefix, name),
                    name,
                }
            }
            syn::Item::Impl(item) => self.compile_impl(item)?,
            syn::Item::Const(item) => {
                let value = self.compile_expr(&item.expr)?;
                Item::Const {
                    target: self.resolve_store(&item.ident.to_string(), line)?,
                    value,
                }
            }
            syn::Item::Use(_) => return Ok(None),
            syn::Item::Macro(item) if is_global_decl(&item.mac) => return Ok(None),
            other => {
                return Err(CompileError::unsupported(
                    format!("item `{}`", item_kind(other)),
                    line,
                ))
            }
        };
        Ok(Some(compiled))
    }

    fn params(&self, sig: &syn::Signature) -> Result<(Vec<String>, bool), CompileError> {
        let mut params = Vec::new();
        let mut receiver = false;
        for input in &sig.inputs {
            match input {
                syn::FnArg::Receiver(_) => receiver = true,
                syn::FnArg::Typed(typed) => params.push(self.param_name(&typed.pat)?),
            }
        }
        Ok((params, receiver))
    }

    fn param_name(&self, pat: &syn::Pat) -> Result<String, CompileError> {
        match pat {
            syn::Pat::Ident(ident) => Ok(self.mangle(&ident.ident.to_string())),
            syn::Pat::Type(typed) => self.param_name(&typed.pat),
            syn::Pat::Wild(_) => Ok("_".to_string()),
            other => Err(CompileError::unsupported("parameter pattern", line_of(other))),
        }
    }

    fn compile_impl(&mut self, item: &syn::ItemImpl) -> Result<Item, CompileError> {
        let line = line_of(item);
        let class_name = match &*item.self_ty {
            syn::Type::Path(path) => path
                .path
                .segments
                .last()
                .map(|segment| segment.ident.to_string())
                .ok_or_else(|| CompileError::unsupported("impl target", line))?,
            _ => return Err(CompileError::unsupported("impl target", line)),
        };
        let class = self.resolve_load(&class_name);

        let saved_class = self.class.replace(class_name.clone());
        let prefix = format!("{}{}.", self.qual_prefix, class_name);
        let saved_prefix = std::mem::replace(&mut self.qual_prefix, prefix);
        self.scopes.push(Scope::impl_block());

        let methods = self.compile_methods(item);

        self.scopes.pop();
        self.qual_prefix = saved_prefix;
        self.class = saved_class;

        Ok(Item::Impl {
            class,
            methods: methods?,
        })
    }

    fn compile_methods(&mut self, item: &syn::ItemImpl) -> Result<Vec<FunctionDef>, CompileError> {
        let mut methods = Vec::new();
        for impl_item in &item.items {
            let syn::ImplItem::Fn(method) = impl_item else {
                return Err(CompileError::unsupported("impl item other than fn", line_of(impl_item)));
            };
            let name = method.sig.ident.to_string();
            let (params, receiver) = self.params(&method.sig)?;
            let qualname = format!("{}{}", self.qual_prefix, name);
            let (code, captures) = self.compile_code(CodeSpec {
                name: name.clone(),
                qualname: qualname.clone(),
                params,
                receiver,
                body: Body::Block(&method.block),
                line: line_of(&method.sig.ident),
                is_method: true,
            })?;
            methods.push(FunctionDef {
                target: None,
                member: self.mangle(&name),
                qualname,
                kind: if receiver {
                    MethodKind::Instance
                } else {
                    MethodKind::Static
                },
                code,
                captures,
            });
        }
        Ok(methods)
    }

    fn compile_code(&mut self, spec: CodeSpec<'_>) -> Result<(Rc<CodeObject>, Vec<Capture>), CompileError> {
        let mut collector = LocalCollector::new(self.class.clone());
        match spec.body {
            Body::Block(block) => collector.visit_block(block),
            Body::Expr(expr) => collector.visit_expr(expr),
        }
        let (mut locals, globals) = collector.finish()?;
        locals.extend(spec.params.iter().cloned());
        if spec.receiver {
            locals.insert("self".to_string());
        }
        for name in &globals {
            locals.remove(name);
        }

        let mut local_names: Vec<String> = locals.iter().cloned().collect();
        local_names.sort();

        self.scopes.push(Scope::function(locals, globals));
        let saved_prefix = std::mem::replace(
            &mut self.qual_prefix,
            format!("{}.<locals>.", spec.qualname),
        );

        if spec.is_method {
            self.resolve_load("Self");
        }
        let body = match spec.body {
            Body::Block(block) => self.compile_block(block),
            Body::Expr(syn::Expr::Block(block)) if block.label.is_none() => {
                self.compile_block(&block.block)
            }
            Body::Expr(expr) => self.compile_expr(expr).map(|tail| Block {
                stmts: Vec::new(),
                tail: Some(Box::new(tail)),
            }),
        };

        self.qual_prefix = saved_prefix;
        let scope = self.scopes.pop();
        let body = body?;
        let freevars: Vec<String> = scope
            .map(|scope| scope.freevars.into_iter().collect())
            .unwrap_or_default();

        let parent_is_impl = self
            .scopes
            .last()
            .is_some_and(|scope| scope.kind == ScopeKind::Impl);
        let captures = freevars
            .iter()
            .map(|name| {
                if parent_is_impl && name == "Self" {
                    Capture::SelfType
                } else {
                    Capture::Frame(name.clone())
                }
            })
            .collect();

        let code = CodeObject {
            name: spec.name,
            params: spec.params,
            receiver: spec.receiver,
            locals: local_names,
            freevars,
            body,
            flags: self.flags,
            class_name: self.class.clone(),
            origin: self.source.as_ref().map(|source| Origin {
                module: self.module.clone(),
                source: source.clone(),
                line: spec.line,
            }),
        };
        Ok((Rc::new(code), captures))
    }

    fn compile_block(&mut self, block: &syn::Block) -> Result<Block, CompileError> {
        let mut out = Block::default();
        let count = block.stmts.len();

        for (idx, stmt) in block.stmts.iter().enumerate() {
            let is_last = idx + 1 == count;
            match stmt {
                syn::Stmt::Local(local) => {
                    if let Some(init) = &local.init {
                        if init.diverge.is_some() {
                            return Err(CompileError::unsupported("let-else", line_of(local)));
                        }
                    }
                    let init = match &local.init {
                        Some(init) => Some(self.compile_expr(&init.expr)?),
                        None => None,
                    };
                    let target = self.pattern_target(&local.pat)?;
                    out.stmts.push(Stmt::Let { target, init });
                }
                syn::Stmt::Item(item) => {
                    if let Some(item) = self.compile_item(item)? {
                        out.stmts.push(Stmt::Item(item));
                    }
                }
                syn::Stmt::Expr(expr, semi) => {
                    let compiled = self.compile_expr(expr)?;
                    if semi.is_none() && is_last {
                        out.tail = Some(Box::new(compiled));
                    } else {
                        out.stmts.push(Stmt::Expr(compiled));
                    }
                }
                syn::Stmt::Macro(stmt) => {
                    if is_global_decl(&stmt.mac) {
                        continue;
                    }
                    let compiled = self.compile_macro(&stmt.mac)?;
                    if stmt.semi_token.is_none() && is_last {
                        out.tail = Some(Box::new(compiled));
                    } else {
                        out.stmts.push(Stmt::Expr(compiled));
                    }
                }
            }
        }

        Ok(out)
    }

    fn pattern_target(&mut self, pat: &syn::Pat) -> Result<Option<Name>, CompileError> {
        match pat {
            syn::Pat::Ident(ident) => Ok(Some(
                self.resolve_store(&ident.ident.to_string(), line_of(ident))?,
            )),
            syn::Pat::Type(typed) => self.pattern_target(&typed.pat),
            syn::Pat::Wild(_) => Ok(None),
            other => Err(CompileError::unsupported("destructuring pattern", line_of(other))),
        }
    }

    fn compile_exprs<'a>(
        &mut self,
        exprs: impl IntoIterator<Item = &'a syn::Expr>,
    ) -> Result<Vec<Expr>, CompileError> {
        exprs.into_iter().map(|expr| self.compile_expr(expr)).collect()
    }

    fn boxed(&mut self, expr: &syn::Expr) -> Result<Box<Expr>, CompileError> {
        self.compile_expr(expr).map(Box::new)
    }

    pub fn compile_expr(&mut self, expr: &syn::Expr) -> Result<Expr, CompileError> {
        let line = line_of(expr);
        let compiled = match expr {
            syn::Expr::Lit(lit) => Expr::Const(literal(&lit.lit)?),
            syn::Expr::Path(path) => self.compile_path(&path.path, line)?,
            syn::Expr::Call(call) => Expr::Call {
                callee: self.boxed(&call.func)?,
                args: self.compile_exprs(&call.args)?,
            },
            syn::Expr::MethodCall(call) => Expr::MethodCall {
                receiver: self.boxed(&call.receiver)?,
                method: self.mangle(&call.method.to_string()),
                args: self.compile_exprs(&call.args)?,
            },
            syn::Expr::Field(field) => Expr::Field {
                base: self.boxed(&field.base)?,
                field: self.member_name(&field.member, line)?,
            },
            syn::Expr::Binary(binary) => self.compile_binary(binary, line)?,
            syn::Expr::Unary(unary) => {
                let operand = self.boxed(&unary.expr)?;
                match unary.op {
                    syn::UnOp::Neg(_) => Expr::Unary {
                        op: UnOp::Neg,
                        operand,
                    },
                    syn::UnOp::Not(_) => Expr::Unary {
                        op: UnOp::Not,
                        operand,
                    },
                    syn::UnOp::Deref(_) => *operand,
                    _ => return Err(CompileError::unsupported("unary operator", line)),
                }
            }
            syn::Expr::Reference(reference) => self.compile_expr(&reference.expr)?,
            syn::Expr::Paren(paren) => self.compile_expr(&paren.expr)?,
            syn::Expr::Group(group) => self.compile_expr(&group.expr)?,
            syn::Expr::Assign(assign) => Expr::Assign {
                target: self.place(&assign.left)?,
                value: self.boxed(&assign.right)?,
            },
            syn::Expr::If(expr_if) => {
                if matches!(&*expr_if.cond, syn::Expr::Let(_)) {
                    return Err(CompileError::unsupported("if let", line));
                }
                Expr::If {
                    cond: self.boxed(&expr_if.cond)?,
                    then: self.compile_block(&expr_if.then_branch)?,
                    otherwise: match &expr_if.else_branch {
                        Some((_, otherwise)) => Some(self.boxed(otherwise)?),
                        None => None,
                    },
                }
            }
            syn::Expr::While(expr_while) => {
                no_label(expr_while.label.as_ref(), line)?;
                Expr::While {
                    cond: self.boxed(&expr_while.cond)?,
                    body: self.compile_block(&expr_while.body)?,
                }
            }
            syn::Expr::Loop(expr_loop) => {
                no_label(expr_loop.label.as_ref(), line)?;
                Expr::Loop(self.compile_block(&expr_loop.body)?)
            }
            syn::Expr::ForLoop(expr_for) => {
                no_label(expr_for.label.as_ref(), line)?;
                let iter = self.boxed(&expr_for.expr)?;
                Expr::For {
                    target: self.pattern_target(&expr_for.pat)?,
                    iter,
                    body: self.compile_block(&expr_for.body)?,
                }
            }
            syn::Expr::Block(block) => {
                no_label(block.label.as_ref(), line)?;
                Expr::Block(self.compile_block(&block.block)?)
            }
            syn::Expr::Break(expr_break) => {
                if expr_break.label.is_some() {
                    return Err(CompileError::unsupported("labeled break", line));
                }
                Expr::Break(match &expr_break.expr {
                    Some(value) => Some(self.boxed(value)?),
                    None => None,
                })
            }
            syn::Expr::Continue(expr_continue) => {
                if expr_continue.label.is_some() {
                    return Err(CompileError::unsupported("labeled continue", line));
                }
                Expr::Continue
            }
            syn::Expr::Return(expr_return) => Expr::Return(match &expr_return.expr {
                Some(value) => Some(self.boxed(value)?),
                None => None,
            }),
            syn::Expr::Closure(closure) => self.compile_closure(closure, line)?,
            syn::Expr::Struct(literal) => {
                if literal.rest.is_some() {
                    return Err(CompileError::unsupported("struct update syntax", line));
                }
                let class = Box::new(self.compile_path(&literal.path, line)?);
                let mut fields = Vec::with_capacity(literal.fields.len());
                for field in &literal.fields {
                    let name = self.member_name(&field.member, line)?;
                    fields.push((name, self.compile_expr(&field.expr)?));
                }
                Expr::StructLit { class, fields }
            }
            syn::Expr::Array(array) => Expr::List(self.compile_exprs(&array.elems)?),
            syn::Expr::Index(index) => Expr::Index {
                base: self.boxed(&index.expr)?,
                index: self.boxed(&index.index)?,
            },
            syn::Expr::Range(range) => {
                let (Some(start), Some(end)) = (&range.start, &range.end) else {
                    return Err(CompileError::unsupported("open range", line));
                };
                Expr::Range {
                    start: self.boxed(start)?,
                    end: self.boxed(end)?,
                    inclusive: matches!(range.limits, syn::RangeLimits::Closed(_)),
                }
            }
            syn::Expr::Cast(cast) => Expr::Cast {
                expr: self.boxed(&cast.expr)?,
                to: cast_type(&cast.ty, line)?,
            },
            syn::Expr::Macro(mac) => {
                if is_global_decl(&mac.mac) {
                    Expr::Const(Value::Unit)
                } else {
                    self.compile_macro(&mac.mac)?
                }
            }
            syn::Expr::Tuple(tuple) if tuple.elems.is_empty() => Expr::Const(Value::Unit),
            other => {
                return Err(CompileError::unsupported(
                    format!("{} expression", expr_kind(other)),
                    line,
                ))
            }
        };
        Ok(compiled)
    }

    fn compile_path(&mut self, path: &syn::Path, line: usize) -> Result<Expr, CompileError> {
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        match segments.as_slice() {
            [name] if path.leading_colon.is_none() => Ok(Expr::Load(self.resolve_load(name))),
            [base, member] if path.leading_colon.is_none() => Ok(Expr::Member {
                base: Box::new(Expr::Load(self.resolve_load(base))),
                member: self.mangle(member),
            }),
            _ => Err(CompileError::unsupported(
                format!("path `{}`", segments.join("::")),
                line,
            )),
        }
    }

    fn member_name(&self, member: &syn::Member, line: usize) -> Result<String, CompileError> {
        match member {
            syn::Member::Named(ident) => Ok(self.mangle(&ident.to_string())),
            syn::Member::Unnamed(_) => Err(CompileError::unsupported("tuple field", line)),
        }
    }

    fn place(&mut self, expr: &syn::Expr) -> Result<Place, CompileError> {
        let line = line_of(expr);
        match expr {
            syn::Expr::Path(path) => match path.path.get_ident() {
                Some(ident) => Ok(Place::Name(self.resolve_store(&ident.to_string(), line)?)),
                None => Err(CompileError::unsupported("assignment to a path", line)),
            },
            syn::Expr::Field(field) => Ok(Place::Field {
                base: self.boxed(&field.base)?,
                field: self.member_name(&field.member, line)?,
            }),
            syn::Expr::Index(index) => Ok(Place::Index {
                base: self.boxed(&index.expr)?,
                index: self.boxed(&index.index)?,
            }),
            syn::Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Deref(_)) => {
                self.place(&unary.expr)
            }
            syn::Expr::Paren(paren) => self.place(&paren.expr),
            _ => Err(CompileError::unsupported("assignment target", line)),
        }
    }

    fn compile_binary(&mut self, binary: &syn::ExprBinary, line: usize) -> Result<Expr, CompileError> {
        use syn::BinOp as B;

        let compound = match binary.op {
            B::AddAssign(_) => Some(BinOp::Add),
            B::SubAssign(_) => Some(BinOp::Sub),
            B::MulAssign(_) => Some(BinOp::Mul),
            B::DivAssign(_) => Some(BinOp::Div),
            B::RemAssign(_) => Some(BinOp::Rem),
            B::BitAndAssign(_) => Some(BinOp::BitAnd),
            B::BitOrAssign(_) => Some(BinOp::BitOr),
            B::BitXorAssign(_) => Some(BinOp::BitXor),
            B::ShlAssign(_) => Some(BinOp::Shl),
            B::ShrAssign(_) => Some(BinOp::Shr),
            _ => None,
        };
        if let Some(op) = compound {
            return Ok(Expr::AssignOp {
                target: self.place(&binary.left)?,
                op,
                value: self.boxed(&binary.right)?,
            });
        }

        let lhs = self.boxed(&binary.left)?;
        let rhs = self.boxed(&binary.right)?;
        let op = match binary.op {
            B::And(_) => return Ok(Expr::And(lhs, rhs)),
            B::Or(_) => return Ok(Expr::Or(lhs, rhs)),
            B::Add(_) => BinOp::Add,
            B::Sub(_) => BinOp::Sub,
            B::Mul(_) => BinOp::Mul,
            B::Div(_) => BinOp::Div,
            B::Rem(_) => BinOp::Rem,
            B::Eq(_) => BinOp::Eq,
            B::Ne(_) => BinOp::Ne,
            B::Lt(_) => BinOp::Lt,
            B::Le(_) => BinOp::Le,
            B::Gt(_) => BinOp::Gt,
            B::Ge(_) => BinOp::Ge,
            B::BitAnd(_) => BinOp::BitAnd,
            B::BitOr(_) => BinOp::BitOr,
            B::BitXor(_) => BinOp::BitXor,
            B::Shl(_) => BinOp::Shl,
            B::Shr(_) => BinOp::Shr,
            _ => return Err(CompileError::unsupported("binary operator", line)),
        };
        Ok(Expr::Binary { op, lhs, rhs })
    }

    fn compile_closure(&mut self, closure: &syn::ExprClosure, line: usize) -> Result<Expr, CompileError> {
        let params = closure
            .inputs
            .iter()
            .map(|pat| self.param_name(pat))
            .collect::<Result<Vec<_>, _>>()?;
        let name = "<closure>".to_string();
        let qualname = format!("{}{}", self.qual_prefix, name);
        let (code, captures) = self.compile_code(CodeSpec {
            name: name.clone(),
            qualname: qualname.clone(),
            params,
            receiver: false,
            body: Body::Expr(&closure.body),
            line,
            is_method: false,
        })?;
        Ok(Expr::Closure(Box::new(FunctionDef {
            target: None,
            member: name,
            qualname,
            kind: MethodKind::Function,
            code,
            captures,
        })))
    }

    fn compile_macro(&mut self, mac: &syn::Macro) -> Result<Expr, CompileError> {
        let line = line_of(mac);
        let name = mac
            .path
            .get_ident()
            .map(ToString::to_string)
            .unwrap_or_default();
        let args: Vec<syn::Expr> = if mac.tokens.is_empty() {
            Vec::new()
        } else {
            mac.parse_body_with(Punctuated::<syn::Expr, Token![,]>::parse_terminated)?
                .into_iter()
                .collect()
        };

        match name.as_str() {
            "format" => Ok(Expr::Format(self.compile_format(&args, line)?)),
            "println" | "print" | "eprintln" | "eprint" => Ok(Expr::Print {
                pieces: self.compile_format(&args, line)?,
                newline: name.ends_with("ln"),
                stderr: name.starts_with('e'),
            }),
            "panic" => {
                let pieces = if args.is_empty() {
                    vec![FormatPiece::Literal("explicit panic".to_string())]
                } else {
                    self.compile_format(&args, line)?
                };
                Ok(Expr::Panic(pieces))
            }
            "vec" => Ok(Expr::List(self.compile_exprs(&args)?)),
            _ => Err(CompileError::unsupported(format!("macro `{name}!`"), line)),
        }
    }

    fn compile_format(&mut self, args: &[syn::Expr], line: usize) -> Result<Vec<FormatPiece>, CompileError> {
        let Some((template, rest)) = args.split_first() else {
            return Ok(Vec::new());
        };
        let template = match template {
            syn::Expr::Lit(syn::ExprLit {
                lit: syn::Lit::Str(text),
                ..
            }) => text.value(),
            _ => return Err(CompileError::unsupported("format string that is not a literal", line)),
        };

        let mut positional = Vec::new();
        let mut named: HashMap<String, &syn::Expr> = HashMap::new();
        for arg in rest {
            match arg {
                syn::Expr::Assign(assign) => {
                    let syn::Expr::Path(path) = &*assign.left else {
                        return Err(CompileError::unsupported("format argument", line));
                    };
                    let Some(ident) = path.path.get_ident() else {
                        return Err(CompileError::unsupported("format argument", line));
                    };
                    named.insert(ident.to_string(), &assign.right);
                }
                other => positional.push(other),
            }
        }

        let mut pieces = Vec::new();
        let mut literal_text = String::new();
        let mut next_positional = 0usize;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal_text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal_text.push('}');
                }
                '{' => {
                    let mut spec = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        spec.push(c);
                    }
                    if !closed {
                        return Err(format_error("unterminated `{` in format string", line));
                    }
                    let (arg, options) = spec.split_once(':').unwrap_or((spec.as_str(), ""));
                    let source = if arg.is_empty() {
                        next_positional += 1;
                        positional.get(next_positional - 1).copied()
                    } else if let Ok(index) = arg.parse::<usize>() {
                        positional.get(index).copied()
                    } else {
                        named.get(arg).copied()
                    };
                    let expr = match source {
                        Some(expr) => self.compile_expr(expr)?,
                        None if !arg.is_empty() && arg.parse::<usize>().is_err() => {
                            Expr::Load(self.resolve_load(arg))
                        }
                        None => {
                            return Err(format_error("format string refers to a missing argument", line))
                        }
                    };
                    if !literal_text.is_empty() {
                        pieces.push(FormatPiece::Literal(std::mem::take(&mut literal_text)));
                    }
                    pieces.push(FormatPiece::Arg {
                        expr,
                        debug: options.contains('?'),
                    });
                }
                '}' => return Err(format_error("unmatched `}` in format string", line)),
                other => literal_text.push(other),
            }
        }
        if !literal_text.is_empty() {
            pieces.push(FormatPiece::Literal(literal_text));
        }
        Ok(pieces)
    }
}

fn format_error(message: &str, line: usize) -> CompileError {
    CompileError::Syntax {
        message: message.to_string(),
        line,
        column: 0,
    }
}

fn no_label(label: Option<&syn::Label>, line: usize) -> Result<(), CompileError> {
    match label {
        Some(_) => Err(CompileError::unsupported("loop label", line)),
        None => Ok(()),
    }
}

fn literal(lit: &syn::Lit) -> Result<Value, CompileError> {
    match lit {
        syn::Lit::Int(int) => Ok(Value::Int(int.base10_parse()?)),
        syn::Lit::Float(float) => Ok(Value::Float(float.base10_parse()?)),
        syn::Lit::Str(text) => Ok(Value::str(text.value())),
        syn::Lit::Char(c) => Ok(Value::str(c.value().to_string())),
        syn::Lit::Bool(b) => Ok(Value::Bool(b.value)),
        other => Err(CompileError::unsupported("literal", line_of(other))),
    }
}

fn cast_type(ty: &syn::Type, line: usize) -> Result<CastType, CompileError> {
    let name = match ty {
        syn::Type::Path(path) => path.path.get_ident().map(ToString::to_string),
        _ => None,
    };
    match name.as_deref() {
        Some("i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize") => {
            Ok(CastType::Int)
        }
        Some("f32" | "f64") => Ok(CastType::Float),
        _ => Err(CompileError::unsupported("cast target", line)),
    }
}

fn item_kind(item: &syn::Item) -> &'static str {
    match item {
        syn::Item::Enum(_) => "enum",
        syn::Item::Mod(_) => "mod",
        syn::Item::Static(_) => "static",
        syn::Item::Trait(_) => "trait",
        syn::Item::Type(_) => "type",
        syn::Item::Union(_) => "union",
        syn::Item::Macro(_) => "macro",
        syn::Item::ExternCrate(_) => "extern crate",
        _ => "item",
    }
}

fn expr_kind(expr: &syn::Expr) -> &'static str {
    match expr {
        syn::Expr::Match(_) => "match",
        syn::Expr::Let(_) => "let",
        syn::Expr::Tuple(_) => "tuple",
        syn::Expr::Repeat(_) => "array repeat",
        syn::Expr::Try(_) => "`?`",
        syn::Expr::Async(_) => "async",
        syn::Expr::Await(_) => "await",
        syn::Expr::Unsafe(_) => "unsafe",
        syn::Expr::Yield(_) => "yield",
        _ => "this",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(source: &str) -> Result<Vec<Item>, CompileError> {
        let file = syn::parse_file(source)?;
        Compiler::new("test", Some(Rc::from(source)), CompileFlags::empty()).compile_file(&file)
    }

    fn function<'a>(items: &'a [Item], name: &str) -> &'a FunctionDef {
        items
            .iter()
            .find_map(|item| match item {
                Item::Function(def) if def.member == name => Some(def),
                _ => None,
            })
            .unwrap()
    }

    fn nested(def: &FunctionDef) -> Vec<&FunctionDef> {
        def.code
            .body
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(Item::Function(inner)) => Some(inner),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn module_functions_have_no_freevars() {
        let items = compile("fn factorial(n: i64) -> i64 { if n <= 1 { 1 } else { n * factorial(n - 1) } }").unwrap();
        let def = function(&items, "factorial");
        assert!(def.code.freevars.is_empty());
        assert_eq!(def.target, Some(Name::Global("factorial".to_string())));
        assert_eq!(def.code.origin.as_ref().map(|o| o.line), Some(1));
    }

    #[test]
    fn nested_function_captures_enclosing_locals() {
        let items = compile(
            "fn outer() -> i64 {\n    let a = 1;\n    let b = 2;\n    fn inner() -> i64 { b + a }\n    inner()\n}",
        )
        .unwrap();
        let outer = function(&items, "outer");
        let inner = nested(outer)[0];
        assert_eq!(inner.code.freevars, vec!["a", "b"]);
        assert_eq!(inner.qualname, "outer.<locals>.inner");
        assert_eq!(
            inner.captures,
            vec![Capture::Frame("a".to_string()), Capture::Frame("b".to_string())]
        );
        assert_eq!(inner.code.origin.as_ref().map(|o| o.line), Some(4));
    }

    #[test]
    fn freevars_pass_through_intermediate_functions() {
        let items = compile("fn a() { let x = 1; fn b() { fn c() -> i64 { x } } }").unwrap();
        let b = nested(function(&items, "a"))[0];
        let c = nested(b)[0];
        assert_eq!(b.code.freevars, vec!["x"]);
        assert_eq!(c.code.freevars, vec!["x"]);
    }

    #[test]
    fn assignment_without_binding_is_rejected() {
        let err = compile("fn f() { missing = 1; }").unwrap_err();
        assert_eq!(
            err,
            CompileError::NonlocalUnbound {
                name: "missing".to_string(),
                line: 1
            }
        );
        assert_eq!(err.to_string(), "no binding for nonlocal 'missing' found");
    }

    #[test]
    fn assignment_to_enclosing_binding_is_nonlocal() {
        let items = compile("fn counter() { let count = 0; fn bump() { count += 1; } }").unwrap();
        let bump = nested(function(&items, "counter"))[0];
        assert_eq!(bump.code.freevars, vec!["count"]);
    }

    #[test]
    fn global_declaration_skips_enclosing_scopes() {
        let items = compile("fn wrapper() { global!(target); fn target() -> i64 { target() } }").unwrap();
        let wrapper = function(&items, "wrapper");
        let target = nested(wrapper)[0];
        assert_eq!(target.target, Some(Name::Global("target".to_string())));
        assert!(target.code.freevars.is_empty());
    }

    #[test]
    fn methods_capture_self_and_mangle_private_names() {
        let items = compile(
            "struct Artist;\nimpl Artist {\n    fn __lower(&self) -> i64 { 1 }\n    fn method(&self) -> i64 { self.__lower() }\n}",
        )
        .unwrap();
        let Some(Item::Impl { methods, .. }) = items.get(1) else {
            panic!("expected impl");
        };
        assert_eq!(methods[0].member, "_Artist__lower");
        assert_eq!(methods[0].qualname, "Artist.__lower");
        assert_eq!(methods[1].code.freevars, vec!["Self"]);
        assert_eq!(methods[1].captures, vec![Capture::SelfType]);
        assert_eq!(methods[1].code.class_name.as_deref(), Some("Artist"));
        assert_eq!(methods[1].kind, MethodKind::Instance);
    }

    #[test]
    fn impl_inside_a_function_extends_the_qualname_prefix() {
        let items = compile("fn outer() {\n    struct Point;\n    impl Point {\n        fn norm() -> i64 { 1 }\n    }\n}").unwrap();
        let outer = function(&items, "outer");
        let methods = outer
            .code
            .body
            .stmts
            .iter()
            .find_map(|stmt| match stmt {
                Stmt::Item(Item::Impl { methods, .. }) => Some(methods),
                _ => None,
            })
            .unwrap();
        assert_eq!(methods[0].qualname, "outer.<locals>.Point.norm");
        assert_eq!(methods[0].kind, MethodKind::Static);
    }

    #[test]
    fn module_flags_are_read() {
        let file = syn::parse_file("#![feature(true_division)]\nfn f() {}").unwrap();
        assert_eq!(module_flags(&file).unwrap(), CompileFlags::TRUE_DIVISION);

        let file = syn::parse_file("#![feature(time_travel)]\nfn f() {}").unwrap();
        assert_eq!(
            module_flags(&file).unwrap_err(),
            CompileError::UnknownFeature {
                name: "time_travel".to_string()
            }
        );
    }

    #[test]
    fn format_strings_resolve_inline_names() {
        let items = compile("fn outer() { let who = 1; fn inner() -> String { format!(\"hi {who}\") } }").unwrap();
        let inner = nested(function(&items, "outer"))[0];
        assert_eq!(inner.code.freevars, vec!["who"]);
    }

    #[test]
    fn unsupported_syntax_is_reported_with_line() {
        let err = compile("fn f() {\n    match 1 { _ => 2 }\n}").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }
}
