pub mod model;
pub mod sink;

pub use model::{AuditEvent, AuditActor, AuditError, AuditResult, AUDIT_EVENT_VERSION, ACTION_ACCESS_DENIED, AuditSeverity};
pub use sink::{AuditSink, BufferedAuditSink, TracingAuditSink};
#[cfg(feature = "kafka")]
pub use sink::KafkaAuditSink;
