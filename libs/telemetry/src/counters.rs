use metrics::{Unit, describe_counter};
use tracing::Span;

pub const WEBHOOK_EVENTS_RECEIVED: &str = "webhook_events_received";
pub const WEBHOOK_SIGNATURE_REJECTED: &str = "webhook_signature_rejected";
pub const OUTBOUND_SENT: &str = "outbound_sent";
pub const OUTBOUND_FAILED: &str = "outbound_failed";
pub const NLU_RUNS: &str = "nlu_runs";
pub const SESSIONS_CREATED: &str = "sessions_created";
pub const SESSIONS_EVICTED: &str = "sessions_evicted";

/// Every counter the services emit, with its description.
pub const COUNTERS: [(&str, &str); 7] = [
    (WEBHOOK_EVENTS_RECEIVED, "Messaging events accepted from the webhook"),
    (WEBHOOK_SIGNATURE_REJECTED, "Webhook deliveries refused for a bad signature"),
    (OUTBOUND_SENT, "Messages accepted by the Send API"),
    (OUTBOUND_FAILED, "Messages the Send API did not accept"),
    (NLU_RUNS, "NLU engine runs by outcome"),
    (SESSIONS_CREATED, "Sessions created on first contact"),
    (SESSIONS_EVICTED, "Sessions dropped by eviction"),
];

/// Registers descriptions for every counter with the installed recorder.
pub fn describe_counters() {
    for (name, description) in COUNTERS {
        describe_counter!(name, Unit::Count, description);
    }
}

/// Records the sender and message id on an event span declared with those
/// fields empty.
pub fn with_event_fields(span: &Span, sender: &str, msg_id: Option<&str>) {
    span.record("sender", tracing::field::display(sender));
    if let Some(msg_id) = msg_id {
        span.record("msg_id", tracing::field::display(msg_id));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn counter_names_are_unique() {
        let names: HashSet<_> = COUNTERS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), COUNTERS.len());
        assert!(names.contains(SESSIONS_CREATED));
        assert!(names.contains(OUTBOUND_FAILED));
    }
}
