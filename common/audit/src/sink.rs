use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::info;

use crate::{AuditEvent, AuditResult};
#[cfg(feature = "kafka")] use crate::AuditError;
#[cfg(feature = "kafka")] use rdkafka::producer::{FutureProducer, FutureRecord};
#[cfg(feature = "kafka")] use std::time::Duration;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn emit(&self, event: AuditEvent) -> AuditResult<()>;
}

/// Writes each event as a structured log line on the `audit` target.
#[derive(Clone, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn emit(&self, event: AuditEvent) -> AuditResult<()> {
        info!(
            target: "audit",
            event_id = %event.event_id,
            action = %event.action,
            actor_uid = event.actor.uid.as_deref().unwrap_or("-"),
            severity = ?event.severity,
            source = %event.source_service,
            payload = %event.payload,
            "audit event"
        );
        Ok(())
    }
}

/// Keeps events in memory; tests read them back with [`BufferedAuditSink::take`].
#[derive(Clone, Default)]
pub struct BufferedAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl BufferedAuditSink {
    pub fn new() -> Self { Self::default() }

    pub fn take(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize { self.events.lock().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl AuditSink for BufferedAuditSink {
    async fn emit(&self, event: AuditEvent) -> AuditResult<()> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
        Ok(())
    }
}

#[cfg(feature = "kafka")]
#[derive(Clone)]
pub struct KafkaAuditSink {
    producer: FutureProducer,
    topic: String,
}

#[cfg(feature = "kafka")]
impl KafkaAuditSink {
    pub fn new(producer: FutureProducer, topic: impl Into<String>) -> Self { Self { producer, topic: topic.into() } }
}

#[cfg(feature = "kafka")]
#[async_trait]
impl AuditSink for KafkaAuditSink {
    async fn emit(&self, event: AuditEvent) -> AuditResult<()> {
        let serialized = serde_json::to_vec(&event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let key = event.actor.uid.clone().unwrap_or_else(|| "anonymous".to_string());
        let record = FutureRecord::to(&self.topic).key(&key).payload(&serialized);
        if let Err((e, _)) = self.producer.send(record, Duration::from_secs(5)).await { return Err(AuditError::Kafka(e.to_string())); }
        Ok(())
    }
}
