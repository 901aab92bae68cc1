//! Static scope facts: which names a function binds, which it declares
//! global, and how private names are mangled inside an `impl`.

use crate::runtime::errors::CompileError;
use std::collections::{BTreeSet, HashSet};
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::Token;

/// Rewrite `__name` to `_Class__name` inside the context of `class`.
///
/// Names that also end in `__` are left alone, as are all names when the
/// class name is made only of underscores.
pub fn mangle(class: Option<&str>, name: &str) -> String {
    let Some(class) = class else {
        return name.to_string();
    };
    if !name.starts_with("__") || name.ends_with("__") {
        return name.to_string();
    }
    let stripped = class.trim_start_matches('_');
    if stripped.is_empty() {
        return name.to_string();
    }
    format!("_{stripped}{name}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    /// An `impl` block; binds only `Self`.
    Impl,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub locals: HashSet<String>,
    pub globals: HashSet<String>,
    pub freevars: BTreeSet<String>,
}

impl Scope {
    pub fn function(locals: HashSet<String>, globals: HashSet<String>) -> Self {
        Self {
            kind: ScopeKind::Function,
            locals,
            globals,
            freevars: BTreeSet::new(),
        }
    }

    pub fn impl_block() -> Self {
        Self {
            kind: ScopeKind::Impl,
            locals: HashSet::new(),
            globals: HashSet::new(),
            freevars: BTreeSet::new(),
        }
    }

    /// Whether this scope provides a binding for `name` to inner scopes.
    pub fn binds(&self, name: &str) -> bool {
        match self.kind {
            ScopeKind::Function => self.locals.contains(name),
            ScopeKind::Impl => name == "Self",
        }
    }
}

/// Collects the names bound directly in one function body.
///
/// Nested functions, closures and `impl` blocks are not entered: they are
/// scopes of their own. Their names (for `fn` and `struct`) are bindings of
/// the enclosing body.
pub struct LocalCollector {
    class: Option<String>,
    pub locals: HashSet<String>,
    pub globals: HashSet<String>,
    error: Option<CompileError>,
}

impl LocalCollector {
    pub fn new(class: Option<String>) -> Self {
        Self {
            class,
            locals: HashSet::new(),
            globals: HashSet::new(),
            error: None,
        }
    }

    pub fn finish(self) -> Result<(HashSet<String>, HashSet<String>), CompileError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.locals, self.globals)),
        }
    }

    fn bind(&mut self, name: &str) {
        self.locals.insert(mangle(self.class.as_deref(), name));
    }

    fn declare_globals(&mut self, mac: &syn::Macro) {
        match parse_global_names(mac) {
            Ok(names) => {
                for name in names {
                    self.globals.insert(mangle(self.class.as_deref(), &name));
                }
            }
            Err(error) => {
                self.error.get_or_insert(error);
            }
        }
    }
}

/// Whether a macro invocation is a `global!(...)` declaration.
pub fn is_global_decl(mac: &syn::Macro) -> bool {
    mac.path.is_ident("global")
}

/// Names listed in `global!(a, b)`.
pub fn parse_global_names(mac: &syn::Macro) -> Result<Vec<String>, CompileError> {
    let names = mac.parse_body_with(Punctuated::<syn::Ident, Token![,]>::parse_terminated)?;
    Ok(names.iter().map(ToString::to_string).collect())
}

impl<'ast> Visit<'ast> for LocalCollector {
    fn visit_pat_ident(&mut self, node: &'ast syn::PatIdent) {
        self.bind(&node.ident.to_string());
        visit::visit_pat_ident(self, node);
    }

    fn visit_expr_closure(&mut self, _node: &'ast syn::ExprClosure) {}

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.bind(&node.sig.ident.to_string());
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        self.bind(&node.ident.to_string());
    }

    fn visit_item_const(&mut self, node: &'ast syn::ItemConst) {
        self.bind(&node.ident.to_string());
        visit::visit_expr(self, &node.expr);
    }

    fn visit_item_impl(&mut self, _node: &'ast syn::ItemImpl) {}

    fn visit_stmt_macro(&mut self, node: &'ast syn::StmtMacro) {
        if is_global_decl(&node.mac) {
            self.declare_globals(&node.mac);
        }
    }

    fn visit_expr_macro(&mut self, node: &'ast syn::ExprMacro) {
        if is_global_decl(&node.mac) {
            self.declare_globals(&node.mac);
        }
    }
}
