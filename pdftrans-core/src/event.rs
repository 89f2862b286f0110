use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single progress notification published on the `EventBus`.
///
/// Progress is monotonically non-decreasing within a run, except for
/// heartbeats which use `-1` (see `pdftrans-server`'s SSE endpoint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub agent: String,
    pub stage: String,
    pub progress: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl Event {
    pub fn new(agent: impl Into<String>, stage: impl Into<String>, progress: i32) -> Self {
        Self { agent: agent.into(), stage: stage.into(), progress, detail: None }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn heartbeat() -> Self {
        Self::new("system", "heartbeat", -1)
    }

    pub fn connected() -> Self {
        Self::new("system", "connected", 0)
    }

    pub fn complete() -> Self {
        Self::new("orchestrator", "complete", 100)
    }

    pub fn is_complete(&self) -> bool {
        self.agent == "orchestrator" && self.stage == "complete"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let event = Event::new("ocr", "analyze", 20).with_detail(serde_json::json!({"pipeline": "llm"}));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn complete_is_recognized() {
        assert!(Event::complete().is_complete());
        assert!(!Event::heartbeat().is_complete());
    }
}
