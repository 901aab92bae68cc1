//! Recompilation of a single function from new source text.
//!
//! The new text is compiled inside a synthesized wrapper function that
//! recreates the scope the original was defined in:
//!
//! ```text
//! fn __live_patcher_wrapper__() {
//!     global!(name);          // unless `name` is a free variable
//!     let freevar = ();       // one per free variable of the original
//!     fn name(..) { ..; freevar; }
//!     name
//! }
//! ```
//!
//! Methods are rebuilt inside `struct C; impl C { .. }` so private names
//! are mangled for `C` and `Self` is captured, and the wrapper returns
//! `C::<mangled name>`. Running the wrapper in a copy of the module
//! namespace yields a function whose code has the same free variables as
//! the original, ready to be swapped in.

use crate::runtime::compile::Compiler;
use crate::runtime::eval::{self, Frame};
use crate::runtime::scope::mangle;
use crate::runtime::{CodeObject, CompileError, FunctionObject, RuntimeError, Value};
use proc_macro2::TokenStream;
use quote::quote;
use std::rc::Rc;
use syn::ext::IdentExt;
use syn::parse::Parser;
use thiserror::Error;

pub const WRAPPER_NAME: &str = "__live_patcher_wrapper__";

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("defining the new code of '{name}' failed: {source}")]
    Runtime {
        name: String,
        #[source]
        source: RuntimeError,
    },
}

/// New code for a function plus the wrapper it was built in.
#[derive(Debug)]
pub struct CompiledUnit {
    pub code: Rc<CodeObject>,
    pub wrapper: syn::ItemFn,
}

fn ident(name: &str) -> Result<syn::Ident, CompileError> {
    syn::Ident::parse_any
        .parse_str(name)
        .map_err(|_| CompileError::unsupported(format!("rebuilding `{name}`, which is not a named function"), 0))
}

fn item_kind(item: &syn::Item) -> String {
    let kind = match item {
        syn::Item::Struct(_) => "a struct",
        syn::Item::Impl(_) => "an impl block",
        syn::Item::Const(_) => "a const",
        syn::Item::Use(_) => "a use declaration",
        syn::Item::Enum(_) => "an enum",
        syn::Item::Macro(_) => "a macro invocation",
        _ => "another item",
    };
    kind.to_string()
}

/// Turn a trailing tail expression into `return <expr>;` so statements can
/// be appended without changing the result.
fn return_tail(block: &mut syn::Block) {
    let Some(last) = block.stmts.pop() else {
        return;
    };
    let replaced = match last {
        syn::Stmt::Expr(expr, None) => syn::parse_quote!(return #expr;),
        syn::Stmt::Macro(stmt) if stmt.semi_token.is_none() => {
            let expr = syn::Expr::Macro(syn::ExprMacro {
                attrs: stmt.attrs,
                mac: stmt.mac,
            });
            syn::parse_quote!(return #expr;)
        }
        other => other,
    };
    block.stmts.push(replaced);
}

/// Rebuilds functions from source text, one at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnitRebuilder;

impl UnitRebuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the wrapper for `function` around the first item of
    /// `new_source`, which must be a `fn`.
    pub fn wrapper(&self, function: &FunctionObject, new_source: &str) -> Result<syn::ItemFn, CompileError> {
        let file = syn::parse_file(new_source)?;
        let mut new_fn = match file.items.into_iter().next() {
            Some(syn::Item::Fn(item)) => item,
            Some(other) => {
                return Err(CompileError::NotAFunction {
                    found: item_kind(&other),
                })
            }
            None => {
                return Err(CompileError::NotAFunction {
                    found: "nothing".to_string(),
                })
            }
        };

        let name = function.name();
        if new_fn.sig.ident != name {
            return Err(CompileError::NameMismatch {
                expected: name.to_string(),
                found: new_fn.sig.ident.to_string(),
            });
        }

        let code = function.code();
        let class = function.class_name();
        let is_free = |var: &str| code.freevars.iter().any(|free| free == var);

        let mut prelude: Vec<TokenStream> = Vec::new();
        match class {
            Some(class) if !is_free(class) => {
                let class = ident(class)?;
                prelude.push(quote!(global!(#class);));
            }
            None if !is_free(name) => {
                let name = ident(name)?;
                prelude.push(quote!(global!(#name);));
            }
            _ => {}
        }
        for var in &code.freevars {
            if class.is_some() && var == "Self" {
                continue;
            }
            let var = ident(var)?;
            prelude.push(quote!(let #var = ();));
        }

        return_tail(&mut new_fn.block);
        for var in &code.freevars {
            let var = ident(var)?;
            new_fn.block.stmts.push(syn::parse_quote!(#var;));
        }

        let wrapper_name = ident(WRAPPER_NAME)?;
        let tokens = match class {
            Some(class) => {
                let class_ident = ident(class)?;
                let member = ident(&mangle(Some(class), name))?;
                quote! {
                    fn #wrapper_name() {
                        #(#prelude)*
                        struct #class_ident;
                        impl #class_ident {
                            #new_fn
                        }
                        #class_ident::#member
                    }
                }
            }
            None => {
                let name = ident(name)?;
                quote! {
                    fn #wrapper_name() {
                        #(#prelude)*
                        #new_fn
                        #name
                    }
                }
            }
        };
        Ok(syn::parse2(tokens)?)
    }

    /// Compile `new_source` in the environment of `function`.
    ///
    /// The wrapper runs against a copy of the function's module namespace,
    /// so the live namespace is never touched.
    pub fn rebuild(&self, function: &FunctionObject, new_source: &str) -> Result<CompiledUnit, RebuildError> {
        let wrapper = self.wrapper(function, new_source)?;
        let original = function.code();
        let module = original
            .origin
            .as_ref()
            .map(|origin| origin.module.clone())
            .unwrap_or_default();

        let file = syn::File {
            shebang: None,
            attrs: Vec::new(),
            items: vec![syn::Item::Fn(wrapper.clone())],
        };
        let items = Compiler::new(module, Some(Rc::from(new_source)), original.flags).compile_file(&file)?;

        let runtime_error = |source| RebuildError::Runtime {
            name: function.qualname().to_string(),
            source,
        };
        let namespace = function.globals().snapshot();
        Frame::module(namespace.clone(), original.flags)
            .exec_items(&items)
            .map_err(runtime_error)?;
        let built = namespace
            .get(WRAPPER_NAME)
            .ok_or_else(|| RuntimeError::NameNotDefined {
                name: WRAPPER_NAME.to_string(),
            })
            .and_then(|wrapper| eval::call_value(&wrapper, Vec::new()))
            .map_err(runtime_error)?;

        let code = match built {
            Value::Function(function) | Value::BoundMethod { function, .. } => function.code(),
            other => {
                return Err(CompileError::NotAFunction {
                    found: other.type_name(),
                }
                .into())
            }
        };
        Ok(CompiledUnit { code, wrapper })
    }
}
