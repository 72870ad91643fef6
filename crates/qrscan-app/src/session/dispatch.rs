//! Gatekeeper between the decode worker and the host event channel

use std::sync::{Mutex, MutexGuard};

use qrscan_core::prelude::*;
use qrscan_core::{BarcodeResult, FormatFilter, HostEvent};
use qrscan_device::ResultSink;

use crate::context::EventSender;

#[derive(Debug, Default)]
struct DispatchState {
    active: bool,
    disposed: bool,
    filter: FormatFilter,
    delivered: u64,
    filtered: u64,
    dropped: u64,
}

/// Counters for results that reached the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub filtered: u64,
    pub dropped: u64,
}

/// Forwards decode results to the host while the session is scanning.
///
/// The active/disposed check and the emit happen under one lock, so once
/// [`dispose`](ResultDispatch::dispose) returns no further `onRecognizeQR`
/// can be queued, even by a decode that was already running.
#[derive(Debug)]
pub struct ResultDispatch {
    events: EventSender,
    state: Mutex<DispatchState>,
}

impl ResultDispatch {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            state: Mutex::new(DispatchState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_filter(&self, filter: FormatFilter) {
        self.lock().filter = filter;
    }

    pub fn filter(&self) -> FormatFilter {
        self.lock().filter.clone()
    }

    pub fn activate(&self) {
        let mut state = self.lock();
        if !state.disposed {
            state.active = true;
        }
    }

    pub fn deactivate(&self) {
        self.lock().active = false;
    }

    pub fn is_active(&self) -> bool {
        let state = self.lock();
        state.active && !state.disposed
    }

    pub fn dispose(&self) {
        let mut state = self.lock();
        state.active = false;
        state.disposed = true;
    }

    pub fn stats(&self) -> DispatchStats {
        let state = self.lock();
        DispatchStats {
            delivered: state.delivered,
            filtered: state.filtered,
            dropped: state.dropped,
        }
    }
}

impl ResultSink for ResultDispatch {
    fn deliver(&self, results: Vec<BarcodeResult>) {
        let mut state = self.lock();
        if state.disposed || !state.active {
            state.dropped += results.len() as u64;
            debug!("dropping {} result(s), session not scanning", results.len());
            return;
        }

        for result in results {
            if !state.filter.accepts(result.format) {
                trace!("filtered out {} result", result.format);
                state.filtered += 1;
                continue;
            }
            if self.events.emit(HostEvent::RecognizeQr(result.into())) {
                state.delivered += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrscan_core::BarcodeFormat;

    fn qr(text: &str) -> BarcodeResult {
        BarcodeResult::text(text, BarcodeFormat::QrCode)
    }

    #[test]
    fn test_inactive_dispatch_drops() {
        let (events, mut rx) = EventSender::channel();
        let dispatch = ResultDispatch::new(events);

        dispatch.deliver(vec![qr("a")]);
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatch.stats().dropped, 1);
    }

    #[test]
    fn test_filter_applies_after_decode() {
        let (events, mut rx) = EventSender::channel();
        let dispatch = ResultDispatch::new(events);
        dispatch.set_filter(FormatFilter::new([BarcodeFormat::Ean13]));
        dispatch.activate();

        dispatch.deliver(vec![
            qr("skipped"),
            BarcodeResult::text("4006381333931", BarcodeFormat::Ean13),
        ]);

        match rx.try_recv().unwrap() {
            HostEvent::RecognizeQr(code) => {
                assert_eq!(code.code.as_deref(), Some("4006381333931"));
                assert_eq!(code.format, "EAN_13");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(
            dispatch.stats(),
            DispatchStats {
                delivered: 1,
                filtered: 1,
                dropped: 0
            }
        );
    }

    #[test]
    fn test_disposed_dispatch_never_reactivates() {
        let (events, mut rx) = EventSender::channel();
        let dispatch = ResultDispatch::new(events);
        dispatch.activate();
        dispatch.dispose();
        dispatch.activate();

        assert!(!dispatch.is_active());
        dispatch.deliver(vec![qr("late")]);
        assert!(rx.try_recv().is_err());
    }
}
