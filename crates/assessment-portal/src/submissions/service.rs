use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::blob_store::{BlobStore, BlobStoreError};
use super::domain::{AssessmentUpload, RecordId, ReviewInput, SubmissionView, ValidationError};
use super::record_store::{FieldPatch, RecordQuery, RecordStore, RecordStoreError};

/// Service composing the record store and blob store behind the intake and review flows.
pub struct AssessmentService<R, B> {
    records: Arc<R>,
    blobs: Arc<B>,
}

/// Outcome of a stored submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub record_id: RecordId,
    pub storage_key: String,
    pub file_url: String,
}

impl<R, B> AssessmentService<R, B>
where
    R: RecordStore + 'static,
    B: BlobStore + 'static,
{
    pub fn new(records: Arc<R>, blobs: Arc<B>) -> Self {
        Self { records, blobs }
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Attach an uploaded assessment to the applicant registered under `email`.
    pub async fn submit(
        &self,
        email: &str,
        upload: AssessmentUpload,
    ) -> Result<SubmissionReceipt, ServiceError> {
        self.submit_at(email, upload, Utc::now()).await
    }

    /// Upload then mark the record submitted. If marking fails the stored
    /// object is removed again so no file is left without a record pointing at it.
    #[instrument(skip(self, email, upload), fields(file = upload.file_name(), size = upload.len()))]
    pub async fn submit_at(
        &self,
        email: &str,
        upload: AssessmentUpload,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, ServiceError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingEmail.into());
        }

        let applicant = self
            .records
            .query(&RecordQuery::applicant_by_email(email))
            .await?
            .into_iter()
            .next()
            .ok_or(ServiceError::ApplicantNotFound)?;

        let storage_key = upload.storage_key(&applicant.id, now);
        let content_type = upload.content_type();
        self.blobs
            .upload(&storage_key, upload.into_bytes(), &content_type)
            .await?;

        let file_url = match self.blobs.public_url(&storage_key) {
            Ok(url) => url,
            Err(err) => {
                self.discard_upload(&storage_key).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self
            .records
            .update(&applicant.id, &FieldPatch::mark_submitted(file_url.clone()))
            .await
        {
            self.discard_upload(&storage_key).await;
            return Err(err.into());
        }

        info!(record = %applicant.id, key = %storage_key, "assessment submitted");
        Ok(SubmissionReceipt {
            record_id: applicant.id,
            storage_key,
            file_url,
        })
    }

    async fn discard_upload(&self, storage_key: &str) {
        if let Err(err) = self.blobs.remove(storage_key).await {
            warn!(key = storage_key, error = %err, "orphaned upload could not be removed");
        }
    }

    /// Every submitted record, newest first.
    pub async fn list_submissions(&self) -> Result<Vec<SubmissionView>, ServiceError> {
        self.views(&RecordQuery::submitted_newest_first()).await
    }

    /// Submitted records that have not been scored yet, newest first.
    pub async fn pending_reviews(&self) -> Result<Vec<SubmissionView>, ServiceError> {
        self.views(&RecordQuery::awaiting_review()).await
    }

    async fn views(&self, query: &RecordQuery) -> Result<Vec<SubmissionView>, ServiceError> {
        let records = self.records.query(query).await?;
        Ok(records.iter().map(|record| record.view()).collect())
    }

    /// Store a score and feedback and mark the record reviewed.
    #[instrument(skip(self, input), fields(record = %input.record_id, score = input.score.get()))]
    pub async fn review(&self, input: ReviewInput) -> Result<(), ServiceError> {
        let ReviewInput {
            record_id,
            score,
            feedback,
        } = input;

        self.records
            .update(&record_id, &FieldPatch::record_review(score, feedback))
            .await?;

        info!("review recorded");
        Ok(())
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("applicant not found")]
    ApplicantNotFound,
    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),
    #[error(transparent)]
    BlobStore(#[from] BlobStoreError),
}
