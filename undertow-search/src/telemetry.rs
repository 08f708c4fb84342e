//! Aggregation telemetry.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Summary emitted once per computed aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Tracker validation mode the tracker list went through
    pub mode: String,
    /// Tracker limit requested from validation
    pub limit: usize,
    /// Healthy trackers attached
    pub healthy: usize,
    /// Trackers submitted to validation
    pub total: usize,
    /// Provider of the top ranked stream
    pub source: String,
    /// Content type
    #[serde(rename = "type")]
    pub content_type: String,
    /// Requested content id
    pub id: String,
    /// Representative title
    pub title: String,
    /// Season of a series id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    /// Episode of a series id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

/// Destination for telemetry events.
///
/// Fire-and-forget: implementations must not block or panic.
pub trait TelemetrySink: Send + Sync {
    /// Records `event`.
    fn push(&self, event: TelemetryEvent);
}

/// Logs events as structured `tracing` records.
#[derive(Debug, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn push(&self, event: TelemetryEvent) {
        tracing::info!(
            target: "undertow::telemetry",
            mode = %event.mode,
            limit = event.limit,
            healthy = event.healthy,
            total = event.total,
            source = %event.source,
            content_type = %event.content_type,
            id = %event.id,
            title = %event.title,
            season = ?event.season,
            episode = ?event.episode,
            "aggregation completed"
        );
    }
}

/// Forwards events to a channel; a closed receiver drops them.
#[derive(Debug)]
pub struct ChannelTelemetry {
    sender: UnboundedSender<TelemetryEvent>,
}

impl ChannelTelemetry {
    /// Sends events into `sender`.
    pub fn new(sender: UnboundedSender<TelemetryEvent>) -> Self {
        Self { sender }
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn push(&self, event: TelemetryEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("Telemetry receiver closed, dropping event");
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Events recorded so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn push(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    fn event() -> TelemetryEvent {
        TelemetryEvent {
            mode: "basic".into(),
            limit: 10,
            healthy: 3,
            total: 12,
            source: "addon".into(),
            content_type: "series".into(),
            id: "tt0944947:1:2".into(),
            title: "tt0944947 S01E02".into(),
            season: Some(1),
            episode: Some(2),
        }
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(event()).unwrap();
        assert_eq!(json["type"], "series");
        assert_eq!(json["season"], 1);

        let movie = TelemetryEvent {
            season: None,
            episode: None,
            ..event()
        };
        assert!(serde_json::to_value(movie).unwrap().get("season").is_none());
    }

    #[test]
    fn test_channel_sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelTelemetry::new(tx);
        drop(rx);
        sink.push(event());
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingTelemetry::default();
        sink.push(event());
        assert_eq!(sink.events(), vec![event()]);
    }
}
