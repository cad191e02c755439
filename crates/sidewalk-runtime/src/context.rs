//! Device Runtime Context
//!
//! Owned by the event dispatcher and mutated only from the event task, so it
//! carries no lock.

use sidewalk_core::{LinkMask, SidStatus, StackConfig, StackHandle};

/// Coarse lifecycle state, derived from the events seen so far
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeState {
    #[default]
    Uninitialized,
    PlatformReady,
    Started,
    Switching,
    Exited,
}

/// Stack handle, active configuration and last observed status
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub handle: Option<StackHandle>,
    pub config: StackConfig,
    pub last_status: Option<SidStatus>,
    pub state: RuntimeState,
}

impl DeviceContext {
    pub fn new(link_mask: LinkMask) -> Self {
        Self {
            config: StackConfig { link_mask },
            ..Self::default()
        }
    }

    pub fn link_mask(&self) -> LinkMask {
        self.config.link_mask
    }
}
