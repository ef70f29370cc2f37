use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use mime::Mime;
use serde_json::Value;

use crate::submissions::blob_store::{BlobStore, BlobStoreError};
use crate::submissions::domain::{ApplicantRecord, RecordId};
use crate::submissions::record_store::{
    FieldPatch, RecordQuery, RecordStore, RecordStoreError, SortDirection,
};
use crate::submissions::router::{portal_router, PortalState};
use crate::submissions::service::AssessmentService;

pub(super) const ADMIN_SECRET: &str = "let-me-in";
pub(super) const BOUNDARY: &str = "----portal-test-boundary";

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn applicant(id: &str, email: &str, created_at: DateTime<Utc>) -> ApplicantRecord {
    ApplicantRecord {
        id: RecordId(id.to_string()),
        name: Some(format!("Applicant {id}")),
        email: Some(email.to_string()),
        file_url: None,
        score: None,
        feedback: None,
        submitted: false,
        reviewed: false,
        created_at,
    }
}

pub(super) fn submitted(id: &str, email: &str, created_at: DateTime<Utc>) -> ApplicantRecord {
    ApplicantRecord {
        submitted: true,
        file_url: Some(format!("https://blobs.test/public/{id}.pdf")),
        ..applicant(id, email, created_at)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRecordStore {
    records: Arc<Mutex<Vec<ApplicantRecord>>>,
    updates: Arc<Mutex<Vec<(RecordId, FieldPatch)>>>,
}

impl MemoryRecordStore {
    pub(super) fn with_records(records: Vec<ApplicantRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
            updates: Arc::default(),
        }
    }

    pub(super) fn record(&self, id: &str) -> ApplicantRecord {
        self.records
            .lock()
            .expect("record mutex poisoned")
            .iter()
            .find(|record| record.id.0 == id)
            .cloned()
            .expect("record present")
    }

    pub(super) fn update_count(&self) -> usize {
        self.updates.lock().expect("update mutex poisoned").len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<ApplicantRecord>, RecordStoreError> {
        let guard = self.records.lock().expect("record mutex poisoned");
        let mut matches: Vec<ApplicantRecord> = guard
            .iter()
            .filter(|record| query.filter.matches(record))
            .cloned()
            .collect();
        if let Some(sort) = query.sort {
            matches.sort_by_key(|record| record.created_at);
            if sort.0 == SortDirection::Descending {
                matches.reverse();
            }
        }
        Ok(matches)
    }

    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> Result<(), RecordStoreError> {
        let mut guard = self.records.lock().expect("record mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(RecordStoreError::NotFound)?;
        patch.apply(record);
        self.updates
            .lock()
            .expect("update mutex poisoned")
            .push((id.clone(), patch.clone()));
        Ok(())
    }
}

/// Answers queries from memory but refuses every write.
#[derive(Default, Clone)]
pub(super) struct ReadOnlyRecordStore {
    pub(super) inner: MemoryRecordStore,
}

#[async_trait]
impl RecordStore for ReadOnlyRecordStore {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<ApplicantRecord>, RecordStoreError> {
        self.inner.query(query).await
    }

    async fn update(&self, _id: &RecordId, _patch: &FieldPatch) -> Result<(), RecordStoreError> {
        Err(RecordStoreError::Rejected {
            status: 409,
            message: "Conflict occurred while saving. Please try again.".to_string(),
        })
    }
}

pub(super) struct UnavailableRecordStore;

#[async_trait]
impl RecordStore for UnavailableRecordStore {
    async fn query(&self, _query: &RecordQuery) -> Result<Vec<ApplicantRecord>, RecordStoreError> {
        Err(RecordStoreError::Transport(
            "connection refused by api.notion.com".to_string(),
        ))
    }

    async fn update(&self, _id: &RecordId, _patch: &FieldPatch) -> Result<(), RecordStoreError> {
        Err(RecordStoreError::Transport(
            "connection refused by api.notion.com".to_string(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct StoredObject {
    pub(super) bytes: Vec<u8>,
    pub(super) content_type: String,
}

#[derive(Default, Clone)]
pub(super) struct MemoryBlobStore {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
    removed: Arc<Mutex<Vec<String>>>,
}

impl MemoryBlobStore {
    pub(super) fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.objects.lock().expect("blob mutex poisoned").clone()
    }

    pub(super) fn removed(&self) -> Vec<String> {
        self.removed.lock().expect("blob mutex poisoned").clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &Mime,
    ) -> Result<(), BlobStoreError> {
        let mut guard = self.objects.lock().expect("blob mutex poisoned");
        if guard.contains_key(key) {
            return Err(BlobStoreError::AlreadyExists(key.to_string()));
        }
        guard.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<String, BlobStoreError> {
        Ok(format!("https://blobs.test/public/{key}"))
    }

    async fn remove(&self, key: &str) -> Result<(), BlobStoreError> {
        self.objects.lock().expect("blob mutex poisoned").remove(key);
        self.removed
            .lock()
            .expect("blob mutex poisoned")
            .push(key.to_string());
        Ok(())
    }
}

pub(super) struct OfflineBlobStore;

#[async_trait]
impl BlobStore for OfflineBlobStore {
    async fn upload(
        &self,
        _key: &str,
        _bytes: Vec<u8>,
        _content_type: &Mime,
    ) -> Result<(), BlobStoreError> {
        Err(BlobStoreError::Rejected {
            status: 403,
            message: "new row violates row-level security policy".to_string(),
        })
    }

    fn public_url(&self, key: &str) -> Result<String, BlobStoreError> {
        Ok(format!("https://blobs.test/public/{key}"))
    }

    async fn remove(&self, _key: &str) -> Result<(), BlobStoreError> {
        Ok(())
    }
}

pub(super) fn build_service(
    records: Vec<ApplicantRecord>,
) -> (
    AssessmentService<MemoryRecordStore, MemoryBlobStore>,
    Arc<MemoryRecordStore>,
    Arc<MemoryBlobStore>,
) {
    let store = Arc::new(MemoryRecordStore::with_records(records));
    let blobs = Arc::new(MemoryBlobStore::default());
    let service = AssessmentService::new(store.clone(), blobs.clone());
    (service, store, blobs)
}

pub(super) fn router_with_service<R, B>(service: AssessmentService<R, B>) -> axum::Router
where
    R: RecordStore + 'static,
    B: BlobStore + 'static,
{
    portal_router(PortalState::new(Arc::new(service), ADMIN_SECRET))
}

pub(super) fn multipart_body(email: Option<&str>, file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(email) = email {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"email\"\r\n\r\n{email}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn submit_request(email: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
    Request::post("/submit")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(email, file)))
        .expect("request builds")
}

pub(super) fn review_request(method: &str, secret: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/review");
    if let Some(secret) = secret {
        builder = builder.header(header::AUTHORIZATION, secret);
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("json encodes"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
