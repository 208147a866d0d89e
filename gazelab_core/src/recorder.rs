//! Trial accumulation and the exported run snapshot.

use gazelab_traits::GazeSample;
use serde::{Deserialize, Serialize};

use crate::condition::Condition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responses {
    pub judgment: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

impl Responses {
    /// Slider defaults; confidence is present only when it will be asked.
    pub fn new(default: u8, ask_confidence: bool) -> Self {
        Self {
            judgment: default,
            confidence: ask_confidence.then_some(default),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeRecord {
    pub x: f64,
    pub y: f64,
    pub timestamp: u64,
}

impl From<&GazeSample> for GazeRecord {
    fn from(s: &GazeSample) -> Self {
        Self {
            x: s.x,
            y: s.y,
            timestamp: s.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub condition: Condition,
    pub responses: Responses,
    #[serde(rename = "eyetracking_data")]
    pub samples: Vec<GazeRecord>,
}

/// The persisted shape: `{"participantID", "trials"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunExport {
    #[serde(rename = "participantID")]
    pub participant_id: String,
    pub trials: Vec<Trial>,
}

impl RunExport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct TrialRecorder {
    trials: Vec<Trial>,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one trial. No deduplication: the sequencer calls this exactly
    /// once per completed response step.
    pub fn record_trial(
        &mut self,
        condition: Condition,
        responses: Responses,
        samples: &[GazeSample],
    ) {
        self.trials.push(Trial {
            condition,
            responses,
            samples: samples.iter().map(GazeRecord::from).collect(),
        });
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Snapshot of everything recorded so far; the recorder keeps its trials.
    pub fn export_run(&self, participant_id: &str) -> RunExport {
        RunExport {
            participant_id: participant_id.to_string(),
            trials: self.trials.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_uses_the_persisted_field_names() {
        let mut r = TrialRecorder::new();
        r.record_trial(
            Condition::from("and"),
            Responses::new(50, false),
            &[GazeSample::new(1.0, 2.0, 3)],
        );
        let json = r.export_run("p01").to_json().expect("json");
        let v: serde_json::Value = serde_json::from_str(&json).expect("parse");
        assert_eq!(v["participantID"], "p01");
        assert_eq!(v["trials"][0]["condition"], "and");
        assert_eq!(v["trials"][0]["responses"]["judgment"], 50);
        assert!(v["trials"][0]["responses"].get("confidence").is_none());
        assert_eq!(v["trials"][0]["eyetracking_data"][0]["timestamp"], 3);
    }

    #[test]
    fn repeated_export_is_byte_identical() {
        let mut r = TrialRecorder::new();
        r.record_trial(Condition::from("or"), Responses::new(20, true), &[]);
        let a = r.export_run("p").to_json().expect("json");
        let b = r.export_run("p").to_json().expect("json");
        assert_eq!(a, b);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn no_dedup_on_repeated_conditions() {
        let mut r = TrialRecorder::new();
        r.record_trial(Condition::from("x"), Responses::new(1, false), &[]);
        r.record_trial(Condition::from("x"), Responses::new(2, false), &[]);
        assert_eq!(r.trials().len(), 2);
    }
}
