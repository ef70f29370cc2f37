use std::fmt;

use chrono::{DateTime, Utc};
use mime::Mime;
use serde::{Deserialize, Serialize};

/// Largest assessment file accepted, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Notion caps a single rich-text block at 2000 characters.
pub const MAX_FEEDBACK_CHARS: usize = 2000;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Identifier of an applicant record in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The subset of an applicant's record this portal reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantRecord {
    pub id: RecordId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub file_url: Option<String>,
    pub score: Option<i64>,
    pub feedback: Option<String>,
    pub submitted: bool,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

impl ApplicantRecord {
    pub fn view(&self) -> SubmissionView {
        SubmissionView {
            id: self.id.clone(),
            name: self
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            email: self.email.clone(),
            file_url: self.file_url.clone(),
            score: self.score,
            feedback: self.feedback.clone(),
            reviewed: self.reviewed,
            submitted_date: self.created_at,
        }
    }
}

/// Review listing entry returned to admins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: RecordId,
    pub name: String,
    pub email: Option<String>,
    pub file_url: Option<String>,
    pub score: Option<i64>,
    pub feedback: Option<String>,
    pub reviewed: bool,
    pub submitted_date: DateTime<Utc>,
}

/// Review score, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::ScoreOutOfRange)
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

/// A validated admin review for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInput {
    pub record_id: RecordId,
    pub score: Score,
    pub feedback: String,
}

impl ReviewInput {
    pub fn new(record_id: String, score: i64, feedback: String) -> Result<Self, ValidationError> {
        if record_id.trim().is_empty() || feedback.trim().is_empty() {
            return Err(ValidationError::MissingReviewFields);
        }
        let score = Score::new(score)?;
        if feedback.chars().count() > MAX_FEEDBACK_CHARS {
            return Err(ValidationError::FeedbackTooLong);
        }

        Ok(Self {
            record_id: RecordId(record_id),
            score,
            feedback,
        })
    }
}

/// An uploaded assessment held in memory for the duration of one request.
#[derive(Clone, PartialEq, Eq)]
pub struct AssessmentUpload {
    file_name: String,
    bytes: Vec<u8>,
}

impl AssessmentUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let file_name = sanitize_file_name(&file_name.into());
        if file_name.is_empty() {
            return Err(ValidationError::MissingFile);
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge);
        }
        Ok(Self { file_name, bytes })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_type(&self) -> Mime {
        content_type_for(&self.file_name)
    }

    /// Object key unique per record and upload instant; not content addressed.
    pub fn storage_key(&self, record_id: &RecordId, uploaded_at: DateTime<Utc>) -> String {
        format!(
            "{}_{}_{}",
            record_id.0,
            uploaded_at.timestamp_millis(),
            self.file_name
        )
    }
}

impl fmt::Debug for AssessmentUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Content type sent to the blob store, inferred from the extension only.
pub fn content_type_for(file_name: &str) -> Mime {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".pdf") {
        mime::APPLICATION_PDF
    } else if lower.ends_with(".docx") {
        DOCX_MIME.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

fn sanitize_file_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Client input rejected before any store is contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Email is required")]
    MissingEmail,
    #[error("File is required")]
    MissingFile,
    #[error("File size must be less than 10MB")]
    FileTooLarge,
    #[error("Invalid multipart payload")]
    MalformedUpload,
    #[error("Missing required fields")]
    MissingReviewFields,
    #[error("Score must be between 1 and 10")]
    ScoreOutOfRange,
    #[error("Feedback must be at most 2000 characters")]
    FeedbackTooLong,
    #[error("Invalid JSON body")]
    MalformedJson,
}
