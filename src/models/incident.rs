//! Incident records for the legacy analytics pass.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IncidentParseError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// An oil and gas incident with its bowtie components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub incident_id: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub facility_type: Option<String>,
    #[serde(default)]
    pub incident_type: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    pub description: String,

    #[serde(default)]
    pub hazard: Option<String>,
    #[serde(default)]
    pub top_event: Option<String>,
    #[serde(default)]
    pub causes: Vec<String>,
    #[serde(default)]
    pub consequences: Vec<String>,
    #[serde(default)]
    pub prevention_barriers: Vec<String>,
    #[serde(default)]
    pub mitigation_barriers: Vec<String>,

    #[serde(default)]
    pub injuries: Option<u32>,
    #[serde(default)]
    pub fatalities: Option<u32>,
    #[serde(default)]
    pub environmental_impact: Option<String>,

    #[serde(default)]
    pub source: Option<String>,
}

impl Incident {
    pub fn new(incident_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            incident_id: incident_id.into(),
            date: None,
            location: None,
            facility_type: None,
            incident_type: None,
            severity: None,
            description: description.into(),
            hazard: None,
            top_event: None,
            causes: Vec::new(),
            consequences: Vec::new(),
            prevention_barriers: Vec::new(),
            mitigation_barriers: Vec::new(),
            injuries: None,
            fatalities: None,
            environmental_impact: None,
            source: None,
        }
    }

    /// Parse one `Key: value` block.
    ///
    /// Keys are matched case-insensitively with spaces or underscores. List
    /// fields are separated by `;`. Unknown keys are ignored; `Incident ID`
    /// and `Description` are required.
    pub fn from_text_block(block: &str) -> Result<Self, IncidentParseError> {
        let mut incident = Incident::new(String::new(), String::new());

        for line in block.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let key = key.trim().to_lowercase().replace([' ', '-'], "_");

            match key.as_str() {
                "incident_id" | "id" => incident.incident_id = value.to_string(),
                "description" => incident.description = value.to_string(),
                "date" => incident.date = Some(parse_date(value)?),
                "location" => incident.location = Some(value.to_string()),
                "facility_type" => incident.facility_type = Some(value.to_string()),
                "incident_type" | "type" => incident.incident_type = Some(value.to_string()),
                "severity" => incident.severity = Some(value.to_string()),
                "hazard" => incident.hazard = Some(value.to_string()),
                "top_event" => incident.top_event = Some(value.to_string()),
                "causes" => incident.causes = split_list(value),
                "consequences" => incident.consequences = split_list(value),
                "prevention_barriers" => incident.prevention_barriers = split_list(value),
                "mitigation_barriers" => incident.mitigation_barriers = split_list(value),
                "injuries" => incident.injuries = Some(parse_count("injuries", value)?),
                "fatalities" => incident.fatalities = Some(parse_count("fatalities", value)?),
                "environmental_impact" => {
                    incident.environmental_impact = Some(value.to_string())
                }
                "source" => incident.source = Some(value.to_string()),
                _ => {}
            }
        }

        if incident.incident_id.is_empty() {
            return Err(IncidentParseError::MissingField("incident_id"));
        }
        if incident.description.is_empty() {
            return Err(IncidentParseError::MissingField("description"));
        }
        Ok(incident)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_date(value: &str) -> Result<NaiveDate, IncidentParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| IncidentParseError::InvalidValue {
        field: "date",
        value: value.to_string(),
    })
}

fn parse_count(field: &'static str, value: &str) -> Result<u32, IncidentParseError> {
    value
        .parse::<u32>()
        .map_err(|_| IncidentParseError::InvalidValue {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: &str = "Incident ID: INC-2024-001
Date: 2024-01-15
Location: Gulf of Mexico
Facility Type: Offshore Platform
Incident Type: Gas Release
Severity: Major
Description: Uncontrolled gas release from wellhead
Hazard: Hydrocarbon Release
Top Event: Loss of Containment
Causes: Equipment failure; Corrosion
Consequences: Fire; Platform evacuation
Prevention Barriers: Pressure relief valve; Corrosion inspection
Mitigation Barriers: Gas detection
Injuries: 2
Fatalities: 0
Source: BSEE Investigation Report";

    #[test]
    fn test_minimal() {
        let incident = Incident::new("INC-001", "Test incident");
        assert_eq!(incident.incident_id, "INC-001");
        assert!(incident.causes.is_empty());
    }

    #[test]
    fn test_full_block() {
        let incident = Incident::from_text_block(BLOCK).unwrap();
        assert_eq!(incident.incident_id, "INC-2024-001");
        assert_eq!(incident.date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(incident.facility_type.as_deref(), Some("Offshore Platform"));
        assert_eq!(incident.causes, vec!["Equipment failure", "Corrosion"]);
        assert_eq!(incident.prevention_barriers.len(), 2);
        assert_eq!(incident.mitigation_barriers, vec!["Gas detection"]);
        assert_eq!(incident.injuries, Some(2));
        assert_eq!(incident.fatalities, Some(0));
    }

    #[test]
    fn test_serialization() {
        let incident = Incident::new("INC-003", "Test serialization");
        let json = serde_json::to_string(&incident).unwrap();
        assert!(json.contains("INC-003"));
        let back: Incident = serde_json::from_str(&json).unwrap();
        assert_eq!(back, incident);
    }

    #[test]
    fn test_rejects_negative_counts() {
        let err = Incident::from_text_block("Incident ID: INC-005\nDescription: Test\nInjuries: -1")
            .unwrap_err();
        assert_eq!(
            err,
            IncidentParseError::InvalidValue {
                field: "injuries",
                value: "-1".to_string()
            }
        );
    }

    #[test]
    fn test_required_fields() {
        assert_eq!(
            Incident::from_text_block("Description: no id"),
            Err(IncidentParseError::MissingField("incident_id"))
        );
        assert_eq!(
            Incident::from_text_block("Incident ID: INC-9"),
            Err(IncidentParseError::MissingField("description"))
        );
    }
}
