//! Per-view camera permission gate
//!
//! Permission is a two-phase exchange: [`PermissionGate::ensure_permission`]
//! shows the platform prompt tagged with this view's request code and
//! suspends; the platform answer comes back later through
//! [`PermissionGate::on_request_permissions_result`], which is matched by
//! request code and wakes the waiting caller.

use std::sync::{Arc, Mutex, MutexGuard};

use qrscan_core::prelude::*;
use qrscan_core::{HostEvent, PermissionGrant, PermissionState};
use qrscan_device::PermissionPlatform;
use tokio::sync::oneshot;

use crate::context::EventSender;

#[derive(Debug, Default)]
struct GateInner {
    state: PermissionState,
    waiter: Option<oneshot::Sender<bool>>,
    cancelled: bool,
}

pub struct PermissionGate {
    platform: Arc<dyn PermissionPlatform>,
    request_code: i32,
    events: EventSender,
    inner: Mutex<GateInner>,
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("request_code", &self.request_code)
            .field("state", &self.state())
            .finish()
    }
}

impl PermissionGate {
    pub fn new(
        platform: Arc<dyn PermissionPlatform>,
        request_code: i32,
        events: EventSender,
    ) -> Self {
        Self {
            platform,
            request_code,
            events,
            inner: Mutex::new(GateInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn request_code(&self) -> i32 {
        self.request_code
    }

    pub fn state(&self) -> PermissionState {
        self.lock().state
    }

    pub fn is_granted(&self) -> bool {
        self.state() == PermissionState::Granted
    }

    /// Re-read the platform grant without prompting.
    ///
    /// A permission revoked while the host was in the background drops a
    /// `Granted` gate back to `Unknown`.
    pub fn refresh(&self) -> bool {
        let granted = !self.platform.requires_runtime_request() || self.platform.is_granted();
        let mut inner = self.lock();
        match (granted, inner.state) {
            (_, PermissionState::Requesting) => {}
            (true, _) => inner.state = PermissionState::Granted,
            (false, PermissionState::Granted) => inner.state = PermissionState::Unknown,
            (false, _) => {}
        }
        granted
    }

    /// Make sure the camera may be used, prompting if needed.
    ///
    /// Resolves `true` once granted and `false` on denial. A second call
    /// while a prompt is open fails with `PermissionInProgress` without
    /// prompting again. Denial is final for this call; the host decides
    /// whether to ask again.
    pub async fn ensure_permission(&self) -> Result<bool> {
        let response = {
            let mut inner = self.lock();
            if inner.cancelled {
                return Err(Error::PermissionCancelled);
            }

            if !self.platform.requires_runtime_request() || self.platform.is_granted() {
                inner.state = PermissionState::Granted;
                drop(inner);
                self.events.emit(HostEvent::PermissionSet(true));
                return Ok(true);
            }

            if inner.state == PermissionState::Requesting {
                debug!("permission request {} already pending", self.request_code);
                return Err(Error::PermissionInProgress);
            }

            let (tx, rx) = oneshot::channel();
            inner.state = PermissionState::Requesting;
            inner.waiter = Some(tx);
            rx
        };

        info!("requesting camera permission (code {})", self.request_code);
        self.platform.request(self.request_code);

        response.await.map_err(|_| Error::PermissionCancelled)
    }

    /// Platform callback for a finished permission prompt.
    ///
    /// Returns `false` when the request code belongs to someone else or no
    /// prompt of this gate is pending, so the caller can keep routing it.
    /// The first grant entry decides; an empty array counts as denied.
    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        grants: &[PermissionGrant],
    ) -> bool {
        if request_code != self.request_code {
            return false;
        }

        let granted = grants.first() == Some(&PermissionGrant::Granted);
        let waiter = {
            let mut inner = self.lock();
            if inner.state != PermissionState::Requesting {
                debug!(
                    "ignoring permission result {} with no pending request",
                    request_code
                );
                return false;
            }
            inner.state = if granted {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
            inner.waiter.take()
        };

        info!("camera permission {}", if granted { "granted" } else { "denied" });
        self.events.emit(HostEvent::PermissionSet(granted));
        if let Some(waiter) = waiter {
            // Caller may have given up waiting
            let _ = waiter.send(granted);
        }
        true
    }

    /// Drop any pending prompt. A suspended caller sees `PermissionCancelled`
    /// and later platform answers are ignored.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.cancelled = true;
        if inner.state == PermissionState::Requesting {
            inner.state = PermissionState::Unknown;
        }
        if inner.waiter.take().is_some() {
            debug!("cancelled pending permission request {}", self.request_code);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }
}
