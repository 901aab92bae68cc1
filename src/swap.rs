//! Installing rebuilt code into a live function.

use crate::rebuild::CompiledUnit;
use crate::registry::SourceRegistry;
use crate::runtime::Callable;
use crate::text::fingerprint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error(
        "the new code of '{name}' captures {found:?} but the function's closure holds {expected:?}"
    )]
    ClosureMismatch {
        name: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

/// Swaps code objects and records the source that produced them.
pub struct LiveSwapper<'r> {
    registry: &'r mut SourceRegistry,
}

impl<'r> LiveSwapper<'r> {
    pub fn new(registry: &'r mut SourceRegistry) -> Self {
        Self { registry }
    }

    /// Replace the code of `callable`'s function with `unit.code`.
    ///
    /// Nothing changes unless the new code's free variables line up with
    /// the cells the function already captured.
    pub fn install(&mut self, callable: &Callable, unit: CompiledUnit, source: &str) -> Result<(), SwapError> {
        let function = callable.underlying();
        let expected: Vec<String> = function
            .closure_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        if unit.code.freevars != expected {
            return Err(SwapError::ClosureMismatch {
                name: function.qualname().to_string(),
                expected,
                found: unit.code.freevars.clone(),
            });
        }

        function.set_code(unit.code);
        self.registry.set_source(callable, source);
        tracing::debug!(
            function = function.qualname(),
            fingerprint = %fingerprint(source),
            "swapped code object"
        );
        Ok(())
    }
}
