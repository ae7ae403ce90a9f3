//! Analytics publisher - drains the analytics channel
//!
//! Fans each event out to the enabled sinks:
//! - MQTT topic (QoS 0, fire-and-forget)
//! - JSONL file
//!
//! Delivery failures are logged and otherwise unobserved.

use crate::infra::config::Config;
use crate::io::analytics::AnalyticsEvent;
use crate::io::analytics_log::AnalyticsLog;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

struct MqttSink {
    client: AsyncClient,
    topic: String,
    /// Taken and driven by `run` so it stops with the publisher
    eventloop: Option<EventLoop>,
}

impl MqttSink {
    /// Build the client for the configured broker; nothing connects until
    /// the eventloop is polled
    fn connect(config: &Config) -> Self {
        let client_id = format!("kiosk-analytics-{}-{}", config.site_id(), std::process::id());
        let mut mqttoptions = MqttOptions::new(
            client_id,
            config.analytics_mqtt_host(),
            config.analytics_mqtt_port(),
        );
        mqttoptions.set_keep_alive(Duration::from_secs(30));
        mqttoptions.set_clean_session(true);

        if let (Some(username), Some(password)) =
            (config.analytics_mqtt_username(), config.analytics_mqtt_password())
        {
            mqttoptions.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(mqttoptions, 100);
        Self { client, topic: config.analytics_topic().to_string(), eventloop: Some(eventloop) }
    }

    async fn publish(&mut self, json: &str) {
        if let Err(e) =
            self.client.publish(&self.topic, QoS::AtMostOnce, false, json.as_bytes()).await
        {
            debug!(error = %e, "analytics_mqtt_publish_failed");
        }
    }
}

/// Poll the MQTT eventloop until shutdown
async fn run_eventloop(mut eventloop: EventLoop, mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("analytics_mqtt_eventloop_stopped");
                    return;
                }
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("analytics_mqtt_connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "analytics_mqtt_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

/// Analytics publisher actor
pub struct AnalyticsPublisher {
    rx: mpsc::Receiver<AnalyticsEvent>,
    mqtt: Option<MqttSink>,
    log: Option<AnalyticsLog>,
}

impl AnalyticsPublisher {
    /// Build the publisher with the sinks enabled in `config`
    pub fn new(config: &Config, rx: mpsc::Receiver<AnalyticsEvent>) -> Self {
        let mqtt = config.analytics_mqtt_enabled().then(|| MqttSink::connect(config));
        let log = config.analytics_file().map(AnalyticsLog::new);
        Self { rx, mqtt, log }
    }

    /// Publisher writing to a file only
    pub fn with_log(rx: mpsc::Receiver<AnalyticsEvent>, log: AnalyticsLog) -> Self {
        Self { rx, mqtt: None, log: Some(log) }
    }

    /// Run the publisher loop until shutdown or until every sender is gone
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(mqtt = self.mqtt.is_some(), file = self.log.is_some(), "analytics_publisher_started");

        if let Some(eventloop) = self.mqtt.as_mut().and_then(|m| m.eventloop.take()) {
            tokio::spawn(run_eventloop(eventloop, shutdown.clone()));
        }

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped shutdown sender also means stop
                    if changed.is_err() || *shutdown.borrow() {
                        // Drain remaining events
                        while let Ok(event) = self.rx.try_recv() {
                            self.publish(event).await;
                        }
                        info!("analytics_publisher_shutdown");
                        return;
                    }
                }
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.publish(event).await,
                        None => {
                            info!("analytics_publisher_channel_closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn publish(&mut self, event: AnalyticsEvent) {
        if let Some(ref log) = self.log {
            log.write_event(&event);
        }
        if let Some(ref mut mqtt) = self.mqtt {
            mqtt.publish(&event.to_json()).await;
        }
        debug!(category = %event.category.as_str(), "analytics_event_published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::metrics::Metrics;
    use crate::io::analytics::{create_analytics_channel, ScanCategory};
    use std::sync::Arc;
    use tempfile::tempdir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_publisher_writes_until_channel_closes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.jsonl");
        let metrics = Arc::new(Metrics::new());
        let (sender, rx) = create_analytics_channel(8, "kiosk".to_string(), metrics);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let publisher = AnalyticsPublisher::with_log(rx, AnalyticsLog::new(path.to_str().unwrap()));
        let handle = tokio::spawn(publisher.run(shutdown_rx));

        let session = Uuid::now_v7();
        sender.send_scan(session, ScanCategory::ScanRejected, "nope");
        sender.send_scan(session, ScanCategory::ScanSuccess, "G123456786");
        drop(sender);

        handle.await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("scan_rejected"));
        assert!(content.contains("G123456786"));
    }

    #[tokio::test]
    async fn test_mqtt_eventloop_stops_on_shutdown() {
        // Nothing listens on port 1, so the loop sits in connect/retry
        let (_client, eventloop) =
            AsyncClient::new(MqttOptions::new("kiosk-test", "127.0.0.1", 1), 10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_eventloop(eventloop, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("eventloop task still running after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_publisher_drains_on_shutdown() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.jsonl");
        let metrics = Arc::new(Metrics::new());
        let (sender, rx) = create_analytics_channel(8, "kiosk".to_string(), metrics);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        sender.send_scan(Uuid::now_v7(), ScanCategory::ScanSuccess, "G000000000");
        let publisher = AnalyticsPublisher::with_log(rx, AnalyticsLog::new(path.to_str().unwrap()));
        shutdown_tx.send(true).unwrap();
        publisher.run(shutdown_rx).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("G000000000"));
    }
}
