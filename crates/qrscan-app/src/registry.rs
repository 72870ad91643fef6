//! View registry: one scan session and bridge per host view id

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use qrscan_core::prelude::*;
use qrscan_core::{HostEvent, PermissionGrant};
use qrscan_device::{create_decoder, CameraHardware, Decoder, PermissionPlatform};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::bridge::{GalleryScanner, HostBridge};
use crate::config::ScanSettings;
use crate::context::{EventSender, HostContext, HostLifecycle};
use crate::session::{ScanSession, SessionOptions};

/// Factory and permission router for all scan views of one host.
///
/// The registry only keeps weak references: a view lives as long as its
/// bridge does, and disposed views drop out of routing.
pub struct ViewRegistry {
    options: SessionOptions,
    decoder: Arc<dyn Decoder>,
    lifecycle: HostLifecycle,
    gallery: Arc<GalleryScanner>,
    views: Mutex<HashMap<i32, Weak<ScanSession>>>,
}

impl std::fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("options", &self.options)
            .field("views", &self.view_ids())
            .finish()
    }
}

impl ViewRegistry {
    pub fn new(settings: &ScanSettings) -> Self {
        Self::with_decoder(settings, create_decoder(settings.decoder.backend))
    }

    /// Registry whose views and gallery scans share `decoder`
    pub fn with_decoder(settings: &ScanSettings, decoder: Arc<dyn Decoder>) -> Self {
        let gallery = Arc::new(GalleryScanner::new(
            Arc::clone(&decoder),
            settings.gallery.max_height,
        ));
        Self {
            options: SessionOptions::from(settings),
            decoder,
            lifecycle: HostLifecycle::new(),
            gallery,
            views: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i32, Weak<ScanSession>>> {
        self.views.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lifecycle(&self) -> &HostLifecycle {
        &self.lifecycle
    }

    pub fn gallery(&self) -> Arc<GalleryScanner> {
        Arc::clone(&self.gallery)
    }

    /// Create the session for a new host view.
    ///
    /// Returns the view's bridge and the receiver of its outbound events.
    /// Must be called inside a tokio runtime.
    pub fn create_view(
        &self,
        view_id: i32,
        density: f32,
        camera: Box<dyn CameraHardware>,
        permissions: Arc<dyn PermissionPlatform>,
    ) -> Result<(HostBridge<ScanSession>, UnboundedReceiver<HostEvent>)> {
        let mut views = self.lock();
        views.retain(|_, view| is_live(view));
        if views.contains_key(&view_id) {
            return Err(Error::invalid_argument(format!(
                "view {} already exists",
                view_id
            )));
        }

        let (events, rx) = EventSender::channel();
        let context = HostContext::new(view_id, density, events, self.lifecycle.clone());
        let session = Arc::new(ScanSession::new(
            context,
            camera,
            permissions,
            Arc::clone(&self.decoder),
            self.options.clone(),
        ));
        views.insert(view_id, Arc::downgrade(&session));
        info!("registered view {} ({} live)", view_id, views.len());

        let bridge = HostBridge::new(view_id, session, Arc::clone(&self.gallery));
        Ok((bridge, rx))
    }

    fn live_sessions(&self) -> Vec<Arc<ScanSession>> {
        let mut views = self.lock();
        views.retain(|_, view| is_live(view));
        views.values().filter_map(Weak::upgrade).collect()
    }

    /// Route a platform permission answer to the view that asked.
    ///
    /// Returns `false` if no live view claims the request code.
    pub fn on_request_permissions_result(
        &self,
        request_code: i32,
        grants: &[PermissionGrant],
    ) -> bool {
        let handled = self
            .live_sessions()
            .iter()
            .any(|session| session.on_request_permissions_result(request_code, grants));
        if !handled {
            debug!("no view claimed permission result {}", request_code);
        }
        handled
    }

    /// Dispose a view by id. Returns `false` if it was not live.
    pub fn dispose_view(&self, view_id: i32) -> bool {
        let session = self.lock().remove(&view_id).and_then(|view| view.upgrade());
        match session {
            Some(session) if !session.is_disposed() => {
                session.dispose();
                true
            }
            _ => false,
        }
    }

    /// Dispose every live view
    pub fn dispose_all(&self) {
        let sessions: Vec<_> = self
            .lock()
            .drain()
            .filter_map(|(_, view)| view.upgrade())
            .collect();
        for session in sessions {
            session.dispose();
        }
        self.gallery.cancel();
    }

    pub fn view_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .live_sessions()
            .iter()
            .map(|session| session.view_id())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn view_count(&self) -> usize {
        self.live_sessions().len()
    }

    /// Host screen went to the background
    pub fn host_paused(&self) {
        self.lifecycle.paused();
    }

    /// Host screen came back to the foreground
    pub fn host_resumed(&self) {
        self.lifecycle.resumed();
    }
}

fn is_live(view: &Weak<ScanSession>) -> bool {
    view.upgrade().is_some_and(|session| !session.is_disposed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrscan_core::ScanPhase;
    use qrscan_device::test_utils::{FakeCamera, FakePermissions, PlacedSymbolDecoder};
    use qrscan_device::DEFAULT_REQUEST_CODE_BASE;

    fn registry() -> ViewRegistry {
        ViewRegistry::with_decoder(
            &ScanSettings::default(),
            Arc::new(PlacedSymbolDecoder::new()),
        )
    }

    fn camera() -> Box<dyn CameraHardware> {
        let (camera, _handle) = FakeCamera::full_featured();
        Box::new(camera)
    }

    #[tokio::test]
    async fn test_duplicate_view_id_rejected() {
        let registry = registry();
        let platform = Arc::new(FakePermissions::granted());

        let (_bridge, _rx) = registry.create_view(1, 1.0, camera(), platform.clone()).unwrap();
        let err = registry.create_view(1, 1.0, camera(), platform).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert_eq!(registry.view_ids(), vec![1]);
    }

    #[tokio::test]
    async fn test_dropped_bridge_forgets_view() {
        let registry = registry();
        let platform = Arc::new(FakePermissions::granted());

        let (bridge, _rx) = registry.create_view(4, 1.0, camera(), platform.clone()).unwrap();
        let (_other, _rx2) = registry.create_view(5, 1.0, camera(), platform).unwrap();
        assert_eq!(registry.view_count(), 2);

        drop(bridge);
        assert_eq!(registry.view_ids(), vec![5]);
    }

    #[tokio::test]
    async fn test_dispose_view_by_id() {
        let registry = registry();
        let (bridge, _rx) = registry
            .create_view(2, 1.0, camera(), Arc::new(FakePermissions::granted()))
            .unwrap();

        assert!(registry.dispose_view(2));
        assert!(!registry.dispose_view(2));
        assert_eq!(bridge.controller().phase(), ScanPhase::Disposed);
        assert_eq!(registry.view_count(), 0);
    }

    #[tokio::test]
    async fn test_permission_result_routed_by_code() {
        let registry = registry();
        let platform = FakePermissions::prompting();

        let (first, _rx1) = registry
            .create_view(1, 1.0, camera(), Arc::new(platform.clone()))
            .unwrap();
        let (second, mut rx2) = registry
            .create_view(2, 1.0, camera(), Arc::new(platform.clone()))
            .unwrap();

        let waiting = tokio::spawn({
            let session = Arc::clone(second.controller());
            async move { session.request_permissions().await }
        });
        while platform.requests().is_empty() {
            tokio::task::yield_now().await;
        }
        assert_eq!(platform.requests(), vec![DEFAULT_REQUEST_CODE_BASE + 2]);

        // Code of a view that never asked
        assert!(!registry
            .on_request_permissions_result(DEFAULT_REQUEST_CODE_BASE + 1, &[PermissionGrant::Granted]));
        assert!(registry
            .on_request_permissions_result(DEFAULT_REQUEST_CODE_BASE + 2, &[PermissionGrant::Granted]));

        assert!(waiting.await.unwrap().unwrap());
        assert_eq!(rx2.recv().await, Some(HostEvent::PermissionSet(true)));
        assert!(!first.controller().permission_gate().is_granted());
    }
}
