//! Host context handed to every scan session
//!
//! Everything a session needs from its host arrives here at construction:
//! which view it belongs to, how to convert dp to pixels, where to send
//! callbacks and which lifecycle to follow. Nothing is read from globals.

use qrscan_core::prelude::*;
use qrscan_core::HostEvent;
use tokio::sync::{broadcast, mpsc};

/// Foreground/background transitions of the host screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Paused,
    Resumed,
}

/// Broadcast of host lifecycle transitions, shared by all views of a host
#[derive(Debug, Clone)]
pub struct HostLifecycle {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl HostLifecycle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: LifecycleEvent) {
        // No subscribers just means no live sessions
        let _ = self.tx.send(event);
    }

    pub fn paused(&self) {
        self.notify(LifecycleEvent::Paused);
    }

    pub fn resumed(&self) {
        self.notify(LifecycleEvent::Resumed);
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Outbound callback channel of one view.
///
/// Decode and permission callbacks only enqueue here; the host drains the
/// receiver on its own control loop.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl EventSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue an event for the host. Returns `false` if the host is gone.
    pub fn emit(&self, event: HostEvent) -> bool {
        let method = event.method_name();
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!("host channel closed, dropping {}", method);
                false
            }
        }
    }
}

/// Explicitly injected host handle for one scan view
#[derive(Debug, Clone)]
pub struct HostContext {
    pub view_id: i32,
    /// Pixels per dp on the host display
    pub density: f32,
    pub events: EventSender,
    pub lifecycle: HostLifecycle,
}

impl HostContext {
    pub fn new(view_id: i32, density: f32, events: EventSender, lifecycle: HostLifecycle) -> Self {
        Self {
            view_id,
            density,
            events,
            lifecycle,
        }
    }
}
