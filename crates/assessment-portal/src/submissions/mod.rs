//! Assessment intake and admin review.
//!
//! Applicant records are owned by an external [`RecordStore`]; uploaded files by an
//! external [`BlobStore`]. [`AssessmentService`] composes the two and
//! [`portal_router`] exposes it over HTTP.

pub mod blob_store;
pub mod domain;
pub mod notion;
pub mod record_store;
pub mod router;
pub mod service;
pub mod supabase;

#[cfg(test)]
mod tests;

pub use blob_store::{BlobStore, BlobStoreError};
pub use domain::{
    content_type_for, ApplicantRecord, AssessmentUpload, RecordId, ReviewInput, Score,
    SubmissionView, ValidationError, MAX_FEEDBACK_CHARS, MAX_UPLOAD_BYTES,
};
pub use notion::NotionRecordStore;
pub use record_store::{
    CreatedTimeSort, FieldPatch, FieldUpdate, RecordFilter, RecordQuery, RecordStore,
    RecordStoreError, SortDirection,
};
pub use router::{portal_router, ApiError, PortalState};
pub use service::{AssessmentService, ServiceError, SubmissionReceipt};
pub use supabase::SupabaseBlobStore;

/// Appends path segments to `base`, percent-encoding each one.
pub(crate) fn join_segments(base: &url::Url, segments: &[&str]) -> Option<url::Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(segments);
    Some(url)
}
