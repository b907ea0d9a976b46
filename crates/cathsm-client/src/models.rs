//! Request/response models for the select-template and alignment services.

use cathsm_common::SequenceRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Data required to submit a job to the CATH select-template API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSelectTemplate {
    pub query_id: String,
    pub query_sequence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl SubmitSelectTemplate {
    pub fn new(query_id: impl Into<String>, query_sequence: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            query_sequence: query_sequence.into(),
            task_id: None,
        }
    }

    pub fn from_record(record: &SequenceRecord) -> Self {
        Self::new(&record.id, &record.sequence)
    }
}

/// Data required to submit a job to the SM alignment/modelling API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAlignment {
    pub target_sequence: String,
    pub template_sequence: String,
    pub template_seqres_offset: i64,
    pub pdb_id: String,
    pub auth_asym_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl From<AlignmentCandidate> for SubmitAlignment {
    fn from(aln: AlignmentCandidate) -> Self {
        Self {
            target_sequence: aln.target_sequence,
            template_sequence: aln.template_sequence,
            template_seqres_offset: aln.template_seqres_offset,
            pdb_id: aln.pdb_id,
            auth_asym_id: aln.auth_asym_id,
            assembly_id: None,
            project_id: None,
        }
    }
}

/// One candidate structural-template match from a stage-1 hit list.
/// Read-only once parsed; fields the pipeline does not inspect are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub hit_uuid: Uuid,
    #[serde(default)]
    pub ff_id: String,
    #[serde(default)]
    pub ff_name: String,
    #[serde(default)]
    pub query_range: String,
}

/// The chosen target/template pairing for one hit; becomes the stage-2
/// parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentCandidate {
    pub target_sequence: String,
    pub template_sequence: String,
    pub template_seqres_offset: i64,
    pub pdb_id: String,
    pub auth_asym_id: String,
}

/// Remote job lifecycle as reported by either service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "unknown")]
    Pending,
    Queued,
    Running,
    Success,
    #[serde(alias = "error")]
    Failed,
}

/// Handle to a submitted remote job. Owned by the call that created it.
#[derive(Debug, Clone)]
pub struct RemoteJobHandle {
    pub job_id: String,
    pub status: JobStatus,
}

/// Parse a raw hits document (the verbatim cached payload) into hits.
pub fn parse_hits(raw: &[u8]) -> Result<Vec<Hit>, serde_json::Error> {
    serde_json::from_slice(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_wire_values() {
        for (wire, expected) in [
            ("\"unknown\"", JobStatus::Pending),
            ("\"pending\"", JobStatus::Pending),
            ("\"queued\"", JobStatus::Queued),
            ("\"running\"", JobStatus::Running),
            ("\"success\"", JobStatus::Success),
            ("\"error\"", JobStatus::Failed),
            ("\"failed\"", JobStatus::Failed),
        ] {
            let status: JobStatus = serde_json::from_str(wire).unwrap();
            assert_eq!(status, expected, "wire value {wire}");
        }
    }

    #[test]
    fn submit_select_template_omits_empty_task_id() {
        let submit = SubmitSelectTemplate::new("query", "MKT");
        let json = serde_json::to_value(&submit).unwrap();
        assert_eq!(json["query_id"], "query");
        assert!(json.get("task_id").is_none());
    }

    #[test]
    fn parses_hit_list_with_extra_fields() {
        let raw = br#"[{
            "hit_uuid": "6ecf8a4c-74a6-4a72-9a68-8c1b6e1f6a01",
            "ff_id": "1.10.8.10/FF/14534",
            "ff_name": "some family",
            "query_range": "5-120",
            "score": 42.0
        }]"#;
        let hits = parse_hits(raw).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ff_id, "1.10.8.10/FF/14534");
        assert_eq!(hits[0].query_range, "5-120");
    }

    #[test]
    fn alignment_candidate_into_submit() {
        let aln = AlignmentCandidate {
            target_sequence: "MKT".into(),
            template_sequence: "MKV".into(),
            template_seqres_offset: 3,
            pdb_id: "1abc".into(),
            auth_asym_id: "A".into(),
        };
        let submit = SubmitAlignment::from(aln);
        assert_eq!(submit.pdb_id, "1abc");
        assert_eq!(submit.template_seqres_offset, 3);
        assert!(submit.project_id.is_none());
    }
}
