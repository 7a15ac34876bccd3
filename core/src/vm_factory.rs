use crate::vm::{ActionParams, Exec, NoopVm};
use std::sync::Arc;

/// Virtual machine factory
#[derive(Clone)]
pub struct VmFactory {
    constructor: Arc<dyn Fn(ActionParams, usize) -> Box<dyn Exec> + Send + Sync>,
}

impl VmFactory {
    pub fn new() -> Self {
        VmFactory {
            constructor: Arc::new(|params, _depth| {
                Box::new(NoopVm::new(params))
            }),
        }
    }

    /// Build a factory producing custom machines: the hook an interpreter
    /// plugs in through.
    pub fn with_constructor<F>(constructor: F) -> Self
    where F: Fn(ActionParams, usize) -> Box<dyn Exec> + Send + Sync + 'static
    {
        VmFactory {
            constructor: Arc::new(constructor),
        }
    }

    pub fn create(&self, params: ActionParams, depth: usize) -> Box<dyn Exec> {
        (self.constructor)(params, depth)
    }
}

impl Default for VmFactory {
    fn default() -> Self { Self::new() }
}
