//! Sidewalk Runtime Engine
//!
//! This crate contains the runtime engine of the end device:
//! - `DeviceContext`: stack handle, active configuration and last status
//! - `EventDispatcher`: the state machine applying one event at a time
//! - `EventTask`: the single consumer draining the event queue
//! - `RuntimeBuilder` / `RuntimeHandle`: wiring and the producer-side API
//! - `StackEvents`: bridge from stack notifications into events and the registry
//!
//! `sidewalk-core` provides the types and collaborator traits this engine drives.

pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod event;
pub mod notifier;
pub mod task;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use context::{DeviceContext, RuntimeState};
pub use dispatcher::{chunk_digest, Collaborators, EventDispatcher, Flow};
pub use event::{
    create_event_channel, EventReceiver, EventSender, SidewalkEvent, WeakEventSender,
};
pub use notifier::StackEvents;
pub use task::EventTask;

// Re-export core types for convenience
pub use sidewalk_core::{
    DeviceConfig, LinkMask, LockMode, OutboundMessage, PendingMessages, SidError, SidResult,
};
