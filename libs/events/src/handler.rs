//! Event handler seam.

use crate::Event;

/// Receives events from the cluster event stream.
///
/// Implementations are called on the dispatcher's task and must return
/// promptly; anything slow belongs on the handler's own task.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}
