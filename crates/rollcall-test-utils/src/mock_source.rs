// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock inbound event source.
//!
//! Notifications injected with [`MockSource::inject`] are dispatched to the
//! handler by [`MembershipEventSource::run`], in order, until
//! [`MockSource::close`] is called and the queue is empty.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use rollcall_core::{
    AdapterType, HealthStatus, MembershipEventHandler, MembershipEventSource, NotificationKind,
    PluginAdapter, RawNotification, RollcallError,
};

type Item = (NotificationKind, RawNotification);

pub struct MockSource {
    tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Item>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Item>>,
}

impl MockSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
        }
    }

    /// Queue a notification. Ignored after [`close`](Self::close).
    pub fn inject(&self, kind: NotificationKind, notification: RawNotification) {
        if let Ok(tx) = self.tx.lock() {
            if let Some(tx) = tx.as_ref() {
                let _ = tx.send((kind, notification));
            }
        }
    }

    /// End the stream once the queued notifications are dispatched.
    pub fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, RollcallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RollcallError> {
        self.close();
        Ok(())
    }
}

#[async_trait]
impl MembershipEventSource for MockSource {
    async fn run(&self, handler: Arc<dyn MembershipEventHandler>) -> Result<(), RollcallError> {
        let mut rx = self.rx.lock().await;
        while let Some((kind, notification)) = rx.recv().await {
            match kind {
                NotificationKind::Join => handler.on_group_join(notification).await,
                NotificationKind::Leave => handler.on_group_leave(notification).await,
                NotificationKind::Remove => handler.on_group_remove(notification).await,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<NotificationKind>>);

    #[async_trait]
    impl MembershipEventHandler for Recorder {
        async fn on_group_join(&self, _: RawNotification) {
            self.0.lock().await.push(NotificationKind::Join);
        }
        async fn on_group_leave(&self, _: RawNotification) {
            self.0.lock().await.push(NotificationKind::Leave);
        }
        async fn on_group_remove(&self, _: RawNotification) {
            self.0.lock().await.push(NotificationKind::Remove);
        }
    }

    #[tokio::test]
    async fn dispatches_in_order_until_closed() {
        let source = MockSource::new();
        source.inject(NotificationKind::Join, RawNotification::default());
        source.inject(NotificationKind::Remove, RawNotification::default());
        source.inject(NotificationKind::Leave, RawNotification::default());
        source.close();
        source.inject(NotificationKind::Join, RawNotification::default());

        let recorder = Arc::new(Recorder::default());
        source.run(recorder.clone()).await.unwrap();
        assert_eq!(
            *recorder.0.lock().await,
            [NotificationKind::Join, NotificationKind::Remove, NotificationKind::Leave]
        );
    }
}
