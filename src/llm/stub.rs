//! Offline provider returning a fixed Schema v2.2 document.

use async_trait::async_trait;

use super::{LlmError, LlmProvider};

pub const STUB_RESPONSE: &str = r#"{
  "incident_id": "STUB-001",
  "source": {"agency": "other", "report_title": "Stub report", "url": null},
  "event": {
    "date": null,
    "location": null,
    "facility_type": null,
    "summary": "Placeholder incident produced without a model.",
    "hazard": "Hydrocarbons under pressure",
    "top_event": "Loss of containment"
  },
  "bowtie": {
    "threats": [{"threat_id": "T-001", "name": "Corrosion of process piping"}],
    "consequences": [{"consequence_id": "Q-001", "name": "Fire", "severity": null}],
    "controls": [
      {
        "control_id": "C-001",
        "name": "Mechanical integrity inspection program",
        "side": "prevention",
        "barrier_type": "administrative",
        "line_of_defense": "1st",
        "barrier_status": "unknown",
        "linked_threat_ids": ["T-001"],
        "linked_consequence_ids": [],
        "evidence": null,
        "confidence": "low"
      }
    ]
  },
  "notes": {"schema_version": "2.2", "extraction_notes": "stub"}
}"#;

/// Returns [`STUB_RESPONSE`] for every prompt.
#[derive(Debug, Clone, Default)]
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
        Ok(STUB_RESPONSE.to_string())
    }
}
