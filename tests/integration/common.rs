use live_patcher::config::PatcherConfig;
use live_patcher::diff::{BackendError, BackendRequest};
use live_patcher::{EmbeddedPatcher, Module, PatchBackend, Patcher};
use std::cell::Cell;
use std::rc::Rc;

/// Patcher driven by the in-process backend, so no `patch` binary is needed.
pub fn patcher() -> Patcher {
    Patcher::with_backend(&PatcherConfig::default(), Box::new(EmbeddedPatcher::default()))
}

pub fn module(source: &str) -> Module {
    Module::from_source("sample", source).unwrap()
}

/// Embedded backend that counts its calls and can be told to fail.
#[derive(Clone, Default)]
pub struct Tracked {
    pub calls: Rc<Cell<usize>>,
    pub broken: Rc<Cell<bool>>,
}

impl PatchBackend for Tracked {
    fn name(&self) -> &str {
        "tracked"
    }

    fn apply(&self, request: &BackendRequest<'_>) -> Result<String, BackendError> {
        self.calls.set(self.calls.get() + 1);
        if self.broken.get() {
            return Err(BackendError::Rejected {
                stdout: "backend switched off".to_string(),
                stderr: String::new(),
            });
        }
        EmbeddedPatcher::default().apply(request)
    }
}

pub fn tracked_patcher() -> (Patcher, Tracked) {
    let backend = Tracked::default();
    let patcher = Patcher::with_backend(&PatcherConfig::default(), Box::new(backend.clone()));
    (patcher, backend)
}
