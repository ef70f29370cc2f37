use async_trait::async_trait;

use super::domain::{ApplicantRecord, RecordId, Score};

/// Predicate over applicant records, translated by each store into its own query language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    EmailEquals(String),
    SubmittedEquals(bool),
    ReviewedEquals(bool),
    And(Vec<RecordFilter>),
}

impl RecordFilter {
    /// Evaluates the filter locally; used by in-process stores.
    pub fn matches(&self, record: &ApplicantRecord) -> bool {
        match self {
            RecordFilter::EmailEquals(email) => record.email.as_deref() == Some(email.as_str()),
            RecordFilter::SubmittedEquals(flag) => record.submitted == *flag,
            RecordFilter::ReviewedEquals(flag) => record.reviewed == *flag,
            RecordFilter::And(filters) => filters.iter().all(|filter| filter.matches(record)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering by record creation time, which is when the applicant entered the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedTimeSort(pub SortDirection);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub sort: Option<CreatedTimeSort>,
}

impl RecordQuery {
    pub fn applicant_by_email(email: &str) -> Self {
        Self {
            filter: RecordFilter::EmailEquals(email.to_string()),
            sort: None,
        }
    }

    pub fn submitted_newest_first() -> Self {
        Self {
            filter: RecordFilter::SubmittedEquals(true),
            sort: Some(CreatedTimeSort(SortDirection::Descending)),
        }
    }

    pub fn awaiting_review() -> Self {
        Self {
            filter: RecordFilter::And(vec![
                RecordFilter::SubmittedEquals(true),
                RecordFilter::ReviewedEquals(false),
            ]),
            sort: Some(CreatedTimeSort(SortDirection::Descending)),
        }
    }
}

/// A single field write applied by [`RecordStore::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Submitted(bool),
    FileUrl(String),
    Score(Score),
    Feedback(String),
    Reviewed(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPatch(pub Vec<FieldUpdate>);

impl FieldPatch {
    pub fn mark_submitted(file_url: String) -> Self {
        Self(vec![
            FieldUpdate::Submitted(true),
            FieldUpdate::FileUrl(file_url),
        ])
    }

    /// Reviews only ever set the reviewed flag; nothing clears it.
    pub fn record_review(score: Score, feedback: String) -> Self {
        Self(vec![
            FieldUpdate::Score(score),
            FieldUpdate::Feedback(feedback),
            FieldUpdate::Reviewed(true),
        ])
    }

    /// Applies the patch to a local copy of the record.
    pub fn apply(&self, record: &mut ApplicantRecord) {
        for update in &self.0 {
            match update {
                FieldUpdate::Submitted(flag) => record.submitted = *flag,
                FieldUpdate::FileUrl(url) => record.file_url = Some(url.clone()),
                FieldUpdate::Score(score) => record.score = Some(i64::from(score.get())),
                FieldUpdate::Feedback(text) => record.feedback = Some(text.clone()),
                FieldUpdate::Reviewed(flag) => record.reviewed = *flag,
            }
        }
    }
}

/// Query/update contract of the external structured-record service.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<ApplicantRecord>, RecordStoreError>;
    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> Result<(), RecordStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("record not found")]
    NotFound,
    #[error("record store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("record store unreachable: {0}")]
    Transport(String),
    #[error("unexpected record store response: {0}")]
    Decode(String),
}
