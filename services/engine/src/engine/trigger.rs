//! Reconciliation triggers.
//!
//! A trigger asks the engine to reconcile soon. The channel holds at most
//! one pending trigger, sending never blocks, and while a pass runs every
//! trigger that arrives is drained and discarded.

use std::future::Future;

use fleet_events::{Event, EventHandler, EventType};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

/// Sender side of an engine's trigger channel.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<()>,
}

/// Create a trigger channel with room for one pending trigger.
pub(crate) fn channel() -> (TriggerHandle, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (TriggerHandle { tx }, rx)
}

impl TriggerHandle {
    /// Request a reconciliation pass.
    ///
    /// Returns true if this call queued the pending trigger, false if one
    /// was already pending or the engine is gone.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                trace!("Reconciliation already pending");
                false
            }
            Err(TrySendError::Closed(())) => {
                debug!("Engine stopped, dropping trigger");
                false
            }
        }
    }
}

impl EventHandler for TriggerHandle {
    fn handle(&self, event: &Event) {
        if event.event_type == EventType::JobTargetStateChanged {
            debug!(job = %event.subject, "Job target state changed");
            self.trigger();
        }
    }
}

/// Run `work` to completion while discarding every trigger that arrives.
///
/// The drain stops the moment `work` finishes, so nothing outlives the
/// pass it was started for.
pub(crate) async fn drain_while<F: Future>(triggers: &mut mpsc::Receiver<()>, work: F) -> F::Output {
    tokio::pin!(work);
    let mut drained = 0u32;

    loop {
        tokio::select! {
            biased;
            out = &mut work => {
                if drained > 0 {
                    debug!(drained, "Discarded triggers received during reconciliation");
                }
                return out;
            }
            Some(()) = triggers.recv() => {
                drained += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleet_id::{JobName, MachineId};

    use super::*;

    #[tokio::test]
    async fn test_trigger_coalesces_to_one_pending() {
        let (handle, mut rx) = channel();

        assert!(handle.trigger());
        for _ in 0..100 {
            assert!(!handle.trigger());
        }

        assert_eq!(rx.recv().await, Some(()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_trigger_after_receiver_dropped() {
        let (handle, rx) = channel();
        drop(rx);
        assert!(!handle.trigger());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_while_discards_triggers() {
        let (handle, mut rx) = channel();
        let sender = handle.clone();

        let out = drain_while(&mut rx, async move {
            for _ in 0..10 {
                sender.trigger();
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            42
        })
        .await;

        assert_eq!(out, 42);
        // Each trigger was drained as it arrived.
        let mut left = 0;
        while rx.try_recv().is_ok() {
            left += 1;
        }
        assert_eq!(left, 0);
    }

    #[test]
    fn test_event_handler_filters_event_types() {
        let (handle, mut rx) = channel();
        let job = JobName::parse("web.service").unwrap();

        handle.handle(&Event::for_job(EventType::MachineRemoved, &job));
        assert!(rx.try_recv().is_err());

        handle.handle(&Event::for_machine(
            EventType::MachineRemoved,
            &MachineId::parse("m1").unwrap(),
        ));
        assert!(rx.try_recv().is_err());

        handle.handle(&Event::for_job(EventType::JobTargetStateChanged, &job));
        assert!(rx.try_recv().is_ok());
    }
}
