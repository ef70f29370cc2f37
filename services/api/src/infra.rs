use assessment_portal::config::AppConfig;
use assessment_portal::error::AppError;
use assessment_portal::submissions::{AssessmentService, NotionRecordStore, SupabaseBlobStore};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type PortalService = AssessmentService<NotionRecordStore, SupabaseBlobStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the Notion and Supabase clients once; every request shares them.
pub(crate) fn connect(config: &AppConfig) -> Result<PortalService, AppError> {
    let records = NotionRecordStore::new(config.notion.clone())?;
    let blobs = SupabaseBlobStore::new(config.storage.clone())?;
    Ok(AssessmentService::new(Arc::new(records), Arc::new(blobs)))
}
