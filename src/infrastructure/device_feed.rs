// Location and scan adapters fed by reports pushed from the field device
use crate::application::ports::{
    LocationEvent, LocationStream, LocationSubscription, ScanError, WifiScanner,
};
use crate::application::reading::ScanReport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

const SUBSCRIBER_BUFFER: usize = 64;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    senders: HashMap<u64, mpsc::Sender<LocationEvent>>,
}

/// Fans pushed GPS fixes out to every live subscription
#[derive(Clone, Default)]
pub struct DeviceLocationFeed {
    subscribers: Arc<Mutex<Subscribers>>,
    high_accuracy: Arc<AtomicBool>,
}

impl DeviceLocationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, event: LocationEvent) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.senders.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Location subscriber {} is lagging; dropping event", id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).senders.len()
    }

    pub fn high_accuracy(&self) -> bool {
        self.high_accuracy.load(Ordering::Relaxed)
    }
}

impl LocationStream for DeviceLocationFeed {
    fn subscribe(&self) -> LocationSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = {
            let mut subscribers = lock(&self.subscribers);
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.senders.insert(id, tx);
            id
        };
        tracing::debug!("Location subscriber {} added", id);

        let subscribers = self.subscribers.clone();
        LocationSubscription::new(rx, move || {
            lock(&subscribers).senders.remove(&id);
            tracing::debug!("Location subscriber {} removed", id);
        })
    }

    fn set_high_accuracy(&self, enabled: bool) {
        self.high_accuracy.store(enabled, Ordering::Relaxed);
        tracing::info!("High-accuracy location requested: {}", enabled);
    }
}

/// Hands the most recent device scan to the capture tick, waiting briefly
/// for one to arrive if none is pending. Each report is consumed once.
pub struct DeviceScanFeed {
    pending: Mutex<Option<Result<ScanReport, ScanError>>>,
    arrived: Notify,
    permission_denied: AtomicBool,
    wait: Duration,
}

impl DeviceScanFeed {
    pub fn new(wait: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            arrived: Notify::new(),
            permission_denied: AtomicBool::new(false),
            wait,
        }
    }

    pub fn report(&self, outcome: Result<ScanReport, ScanError>) {
        self.permission_denied.store(
            matches!(outcome, Err(ScanError::PermissionDenied)),
            Ordering::Relaxed,
        );
        *lock(&self.pending) = Some(outcome);
        self.arrived.notify_one();
    }

    fn take_pending(&self) -> Option<Result<ScanReport, ScanError>> {
        lock(&self.pending).take()
    }
}

#[async_trait]
impl WifiScanner for DeviceScanFeed {
    async fn check_permission(&self) -> Result<(), ScanError> {
        if self.permission_denied.load(Ordering::Relaxed) {
            Err(ScanError::PermissionDenied)
        } else {
            Ok(())
        }
    }

    async fn scan(&self) -> Result<ScanReport, ScanError> {
        let deadline = tokio::time::Instant::now() + self.wait;
        loop {
            if let Some(outcome) = self.take_pending() {
                return outcome;
            }
            // a stale permit from an already-consumed report wakes us early; keep waiting
            if tokio::time::timeout_at(deadline, self.arrived.notified())
                .await
                .is_err()
            {
                return Err(ScanError::NoReport);
            }
        }
    }
}

/// Map a device-reported failure code onto the scan error taxonomy
pub fn scan_error_from_code(code: &str) -> ScanError {
    match code {
        "permission_denied" => ScanError::PermissionDenied,
        "radio_unavailable" => ScanError::RadioUnavailable,
        "throttled" => ScanError::Throttled,
        other => ScanError::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::anchor::GpsFix;

    #[tokio::test]
    async fn test_fixes_reach_every_subscriber() {
        let feed = DeviceLocationFeed::new();
        let mut a = feed.subscribe();
        let mut b = feed.subscribe();

        let fix = GpsFix::new(10.0, 20.0);
        feed.publish(LocationEvent::Fix(fix));

        assert_eq!(a.next().await, Some(LocationEvent::Fix(fix)));
        assert_eq!(b.next().await, Some(LocationEvent::Fix(fix)));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let feed = DeviceLocationFeed::new();
        let subscription = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(subscription);
        assert_eq!(feed.subscriber_count(), 0);
        // publishing with no subscribers is a no-op
        feed.publish(LocationEvent::Error("timeout".to_string()));
    }

    #[tokio::test]
    async fn test_high_accuracy_flag() {
        let feed = DeviceLocationFeed::new();
        feed.set_high_accuracy(true);
        assert!(feed.high_accuracy());
        feed.set_high_accuracy(false);
        assert!(!feed.high_accuracy());
    }

    #[tokio::test]
    async fn test_pending_report_is_consumed_once() {
        let feed = DeviceScanFeed::new(Duration::from_millis(10));
        feed.report(Ok(ScanReport::default()));

        assert_eq!(feed.scan().await, Ok(ScanReport::default()));
        assert_eq!(feed.scan().await, Err(ScanError::NoReport));
    }

    #[tokio::test]
    async fn test_scan_waits_for_report() {
        let feed = Arc::new(DeviceScanFeed::new(Duration::from_secs(5)));
        let waiting = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.scan().await })
        };
        tokio::task::yield_now().await;
        feed.report(Err(ScanError::Throttled));

        assert_eq!(waiting.await.unwrap(), Err(ScanError::Throttled));
    }

    #[tokio::test]
    async fn test_permission_follows_latest_report() {
        let feed = DeviceScanFeed::new(Duration::from_millis(10));
        assert!(feed.check_permission().await.is_ok());

        feed.report(Err(ScanError::PermissionDenied));
        assert_eq!(feed.check_permission().await, Err(ScanError::PermissionDenied));

        feed.report(Ok(ScanReport::default()));
        assert!(feed.check_permission().await.is_ok());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(scan_error_from_code("permission_denied"), ScanError::PermissionDenied);
        assert_eq!(scan_error_from_code("throttled"), ScanError::Throttled);
        assert_eq!(
            scan_error_from_code("boom"),
            ScanError::Other("boom".to_string())
        );
    }
}
