//! qrscan-app - Scan-session coordination and host bridge
//!
//! This crate composes the permission gate, the camera session and the
//! decode worker into the per-view scan session state machine, binds it to
//! the host lifecycle, and exposes it to hosts through a method-call bridge
//! and a view registry. Configuration loading lives here too.

pub mod bridge;
pub mod camera;
pub mod config;
pub mod context;
pub mod controller;
pub mod permission_gate;
pub mod registry;
pub mod scan_area;
pub mod session;

// Re-export primary types
pub use bridge::{GalleryScanner, HostBridge, HostMethod, MethodCall, MethodResponse};
pub use camera::CameraSession;
pub use config::ScanSettings;
pub use context::{EventSender, HostContext, HostLifecycle, LifecycleEvent};
pub use controller::{LocalScanController, ScanController};
pub use permission_gate::PermissionGate;
pub use registry::ViewRegistry;
pub use scan_area::framing_rect;
pub use session::{DispatchStats, ScanSession, SessionOptions, SessionSnapshot};
