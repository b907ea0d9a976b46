//! Minimal FASTA reading for protein query files.
//!
//! Query inputs are small (a handful of sequences), so this is a plain
//! line-oriented parser rather than a streaming/compressed reader.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// One (identifier, sequence) record from a FASTA file. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl SequenceRecord {
    /// Read only the first record of a FASTA file.
    ///
    /// Preserves the first-sequence-only semantics of single-submission
    /// paths: extra records are ignored, not an error.
    pub fn first_from_fasta(path: impl AsRef<Path>) -> Result<Self, CommonError> {
        let path = path.as_ref();
        let records = read_fasta_file(path)?;
        records
            .into_iter()
            .next()
            .ok_or_else(|| CommonError::EmptyFasta { path: path.into() })
    }
}

/// Parse all records of a multi-sequence FASTA file.
pub fn read_fasta_file(path: impl AsRef<Path>) -> Result<Vec<SequenceRecord>, CommonError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| CommonError::Io {
        path: path.into(),
        source,
    })?;
    parse_fasta(&text, path)
}

fn parse_fasta(text: &str, path: &Path) -> Result<Vec<SequenceRecord>, CommonError> {
    let mut records: Vec<SequenceRecord> = Vec::new();
    let mut current: Option<SequenceRecord> = None;

    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            if let Some(rec) = current.take() {
                records.push(rec);
            }
            // Identifier is the first whitespace-delimited word; the rest
            // of the header line is a free-text description we discard.
            let id = header.split_whitespace().next().unwrap_or("").to_string();
            if id.is_empty() {
                return Err(CommonError::MalformedFasta {
                    path: path.into(),
                    reason: format!("empty sequence identifier at line {}", lineno + 1),
                });
            }
            current = Some(SequenceRecord {
                id,
                sequence: String::new(),
            });
        } else {
            match current.as_mut() {
                Some(rec) => rec.sequence.push_str(line.trim()),
                None => {
                    return Err(CommonError::MalformedFasta {
                        path: path.into(),
                        reason: format!("sequence data before any '>' header at line {}", lineno + 1),
                    });
                }
            }
        }
    }
    if let Some(rec) = current.take() {
        records.push(rec);
    }

    if records.is_empty() {
        return Err(CommonError::EmptyFasta { path: path.into() });
    }
    Ok(records)
}
