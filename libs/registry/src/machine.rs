//! Local machine identity.

use crate::MachineState;

/// Identity of the machine this process runs on.
pub trait LocalMachine: Send + Sync {
    fn state(&self) -> MachineState;
}

/// A machine whose state never changes.
#[derive(Debug, Clone)]
pub struct StaticMachine {
    state: MachineState,
}

impl StaticMachine {
    pub fn new(state: MachineState) -> Self {
        Self { state }
    }
}

impl LocalMachine for StaticMachine {
    fn state(&self) -> MachineState {
        self.state.clone()
    }
}
