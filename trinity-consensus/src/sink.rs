//! Destinations for consensus outcomes and incidents.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

use trinity_common::{IncidentRecord, SecurityNotification};

/// Downstream alerting boundary. Sinks must not fail the consensus that
/// reports to them, so both calls are infallible.
#[async_trait]
pub trait SecurityEventSink: Send + Sync {
    async fn notify_consensus(&self, notification: &SecurityNotification);

    async fn record_incident(&self, incident: &IncidentRecord);
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl SecurityEventSink for TracingSink {
    async fn notify_consensus(&self, notification: &SecurityNotification) {
        let per_chain: Vec<String> = notification
            .per_chain_status
            .iter()
            .map(|(chain, status)| format!("{chain}={}", status.verified))
            .collect();
        info!(
            verification_id = %notification.verification_id,
            vault_id = %notification.vault_id,
            verified = notification.verified,
            overall = ?notification.overall_status,
            per_chain = %per_chain.join(","),
            "consensus finalized"
        );
    }

    async fn record_incident(&self, incident: &IncidentRecord) {
        warn!(
            kind = ?incident.kind,
            verification_id = %incident.verification_id,
            vault_id = %incident.vault_id,
            chain = ?incident.chain,
            detail = %incident.detail,
            "security incident"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    Consensus(SecurityNotification),
    Incident(IncidentRecord),
}

/// Forwards events to an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SecurityEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SecurityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SecurityEvent) {
        if self.tx.send(event).is_err() {
            warn!("security event receiver dropped");
        }
    }
}

#[async_trait]
impl SecurityEventSink for ChannelSink {
    async fn notify_consensus(&self, notification: &SecurityNotification) {
        self.send(SecurityEvent::Consensus(notification.clone()));
    }

    async fn record_incident(&self, incident: &IncidentRecord) {
        self.send(SecurityEvent::Incident(incident.clone()));
    }
}

/// Delivers each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn SecurityEventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn SecurityEventSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn SecurityEventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl SecurityEventSink for FanoutSink {
    async fn notify_consensus(&self, notification: &SecurityNotification) {
        for sink in &self.sinks {
            sink.notify_consensus(notification).await;
        }
    }

    async fn record_incident(&self, incident: &IncidentRecord) {
        for sink in &self.sinks {
            sink.record_incident(incident).await;
        }
    }
}
