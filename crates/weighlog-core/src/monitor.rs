//! Characteristic notification monitoring
//!
//! Turns the central's notification stream into a stream of weights and
//! drives it in a background task. The subscription lives exactly as long as
//! that task: aborting it drops the stream, which unsubscribes.

use std::sync::Arc;

use futures::future;
use futures::stream::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::central::{BleCentral, NotificationStream};
use crate::codec::decode_weight;
use crate::errors::Result;
use crate::types::{DeviceId, Grams};

/// Decoded weights of a notification stream.
///
/// Failed notifications and payloads that do not decode are logged and
/// skipped; the stream ends only when the subscription does.
pub fn weight_stream(notifications: NotificationStream) -> impl Stream<Item = Grams> + Send {
    notifications.filter_map(|notification| {
        let grams = match notification {
            Ok(payload) => match decode_weight(&payload) {
                Ok(grams) => Some(grams),
                Err(e) => {
                    warn!("Discarding weight notification: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Weight notification error: {}", e);
                None
            }
        };
        future::ready(grams)
    })
}

// ----------------------------------------------------------------------------
// Characteristic Monitor
// ----------------------------------------------------------------------------

/// Subscribes to a characteristic and reports decoded weights
pub struct CharacteristicMonitor<C: BleCentral> {
    central: Arc<C>,
}

impl<C: BleCentral> CharacteristicMonitor<C> {
    pub fn new(central: Arc<C>) -> Self {
        Self { central }
    }

    /// Subscribe to `(service, characteristic)` on `device`. The returned
    /// stream is handed to [`CharacteristicMonitor::spawn`] once the caller
    /// is ready to accept weights.
    pub async fn subscribe(
        &self,
        device: &DeviceId,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<NotificationStream> {
        let notifications = self.central.monitor(device, service, characteristic).await?;
        debug!("Monitoring {} on {}", characteristic, device);
        Ok(notifications)
    }

    /// Drive an already established subscription.
    ///
    /// `on_end` runs when the subscription ends on its own, which means the
    /// link to the device was lost. It does not run when `on_update` stops
    /// the monitor or the task is aborted.
    pub fn spawn<F, E>(
        device: DeviceId,
        notifications: NotificationStream,
        mut on_update: F,
        on_end: E,
    ) -> JoinHandle<()>
    where
        F: FnMut(Grams) -> bool + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        tokio::spawn(async move {
            let mut weights = Box::pin(weight_stream(notifications));
            while let Some(grams) = weights.next().await {
                if !on_update(grams) {
                    debug!("Weight from {} arrived after its connection ended", device);
                    return;
                }
            }
            debug!("Notifications from {} ended", device);
            on_end();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Payload;
    use crate::errors::ScaleError;
    use futures::stream;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_weight_stream_skips_bad_frames() {
        let notifications = stream::iter(vec![
            Ok(Payload::Bytes(b"12".to_vec())),
            Ok(Payload::Bytes(b"abc".to_vec())),
            Err(ScaleError::Notification("GATT error".to_string())),
            Ok(Payload::Bytes(b"13 g".to_vec())),
        ])
        .boxed();

        let weights: Vec<Grams> = weight_stream(notifications).collect().await;
        assert_eq!(weights, vec![Grams::new(12), Grams::new(13)]);
    }

    #[tokio::test]
    async fn test_end_callback_runs_when_stream_ends() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (ended_tx, ended_rx) = tokio::sync::oneshot::channel();

        let recorder = Arc::clone(&seen);
        let handle = CharacteristicMonitor::<NeverCentral>::spawn(
            DeviceId::from("AA:BB"),
            stream::iter(vec![Ok(Payload::Bytes(b"7".to_vec()))]).boxed(),
            move |grams| {
                recorder.lock().unwrap().push(grams);
                true
            },
            move || {
                let _ = ended_tx.send(());
            },
        );

        handle.await.unwrap();
        assert!(ended_rx.await.is_ok());
        assert_eq!(*seen.lock().unwrap(), vec![Grams::new(7)]);
    }

    #[tokio::test]
    async fn test_end_callback_skipped_when_stopped() {
        let (ended_tx, mut ended_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = CharacteristicMonitor::<NeverCentral>::spawn(
            DeviceId::from("AA:BB"),
            stream::iter(vec![Ok(Payload::Bytes(b"7".to_vec()))]).boxed(),
            |_| false,
            move || {
                let _ = ended_tx.send(());
            },
        );

        handle.await.unwrap();
        assert!(ended_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_subscribe_reports_central_failure() {
        let monitor = CharacteristicMonitor::new(Arc::new(NeverCentral));
        let result = monitor
            .subscribe(&DeviceId::from("AA:BB"), Uuid::nil(), Uuid::nil())
            .await;
        assert!(matches!(result, Err(ScaleError::AdapterNotAvailable)));
    }

    /// Central that refuses everything
    struct NeverCentral;

    #[async_trait::async_trait]
    impl BleCentral for NeverCentral {
        async fn start_scan(
            &self,
            _: crate::central::ScanFilter,
        ) -> Result<crate::central::ScanEventStream> {
            Err(ScaleError::AdapterNotAvailable)
        }
        async fn stop_scan(&self) -> Result<()> {
            Ok(())
        }
        async fn connect(&self, _: &DeviceId) -> Result<()> {
            Err(ScaleError::AdapterNotAvailable)
        }
        async fn discover_services(&self, _: &DeviceId) -> Result<()> {
            Err(ScaleError::AdapterNotAvailable)
        }
        async fn monitor(&self, _: &DeviceId, _: Uuid, _: Uuid) -> Result<NotificationStream> {
            Err(ScaleError::AdapterNotAvailable)
        }
        async fn cancel_connection(&self, _: &DeviceId) -> Result<()> {
            Ok(())
        }
    }
}
