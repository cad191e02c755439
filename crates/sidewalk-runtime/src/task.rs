//! Event Task
//!
//! The single consumer of the event queue. Events are applied strictly in
//! arrival order, one at a time, until an exit event has been processed or
//! every producer has gone away.

use sidewalk_core::SidError;
use tracing::{debug, info, warn};

use crate::dispatcher::{EventDispatcher, Flow};
use crate::event::{EventReceiver, SidewalkEvent};

// ----------------------------------------------------------------------------
// Event Task
// ----------------------------------------------------------------------------

pub struct EventTask {
    dispatcher: EventDispatcher,
    receiver: EventReceiver,
}

impl EventTask {
    pub fn new(dispatcher: EventDispatcher, receiver: EventReceiver) -> Self {
        Self {
            dispatcher,
            receiver,
        }
    }

    /// Drain the queue until exit; returns the dispatcher for inspection
    pub async fn run(mut self) -> EventDispatcher {
        info!("Sidewalk event task starting");

        let mut exited = false;
        while let Some(event) = self.receiver.recv().await {
            let name = event.name();
            debug!("Processing {} event", name);

            match self.dispatcher.dispatch(event) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exited { released }) => {
                    info!("Exit processed, {} pending messages released", released);
                    exited = true;
                    break;
                }
                Err(e @ (SidError::Channel { .. } | SidError::Configuration { .. })) => {
                    warn!("{} event failed: {}", name, e);
                }
                Err(e) => debug!("{} event finished with {}", name, e),
            }
        }

        // Nothing posted after exit is ever applied.
        self.receiver.close();

        if !exited {
            warn!("All event producers dropped, tearing down");
            let _ = self.dispatcher.dispatch(SidewalkEvent::Exit);
        }
        info!("Sidewalk event task stopped");
        self.dispatcher
    }
}
