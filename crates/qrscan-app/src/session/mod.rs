//! Per-view scan session and its result dispatcher

mod dispatch;
#[allow(clippy::module_inception)]
mod session;

#[cfg(test)]
mod tests;

pub use dispatch::{DispatchStats, ResultDispatch};
pub use session::{ScanSession, SessionOptions, SessionSnapshot};
