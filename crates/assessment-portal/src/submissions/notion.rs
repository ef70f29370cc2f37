//! [`RecordStore`] backed by a Notion database.
//!
//! Each applicant is a page; the properties below are the columns the intake form
//! created. Requests go straight to the public REST API with `reqwest`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

use super::domain::{ApplicantRecord, RecordId};
use super::record_store::{
    CreatedTimeSort, FieldPatch, FieldUpdate, RecordFilter, RecordQuery, RecordStore,
    RecordStoreError, SortDirection,
};
use crate::config::NotionConfig;

pub(crate) const NAME_PROPERTY: &str = "What's your name?";
pub(crate) const EMAIL_PROPERTY: &str = "What's your email?";
pub(crate) const SUBMITTED_PROPERTY: &str = "Assessment Submitted";
pub(crate) const FILE_URL_PROPERTY: &str = "Assessment File URL";
pub(crate) const SCORE_PROPERTY: &str = "Assessment Score";
pub(crate) const FEEDBACK_PROPERTY: &str = "Assessment Feedback";
pub(crate) const REVIEWED_PROPERTY: &str = "Assessment Reviewed";

const PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NotionRecordStore {
    client: Client,
    config: NotionConfig,
}

impl std::fmt::Debug for NotionRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionRecordStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotionRecordStore {
    pub fn new(config: NotionConfig) -> Result<Self, RecordStoreError> {
        let client = Client::builder()
            .build()
            .map_err(|err| RecordStoreError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RecordStoreError> {
        super::join_segments(&self.config.api_url, segments).ok_or_else(|| {
            RecordStoreError::Transport(format!(
                "cannot build endpoint from {}",
                self.config.api_url
            ))
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.version)
    }
}

#[async_trait]
impl RecordStore for NotionRecordStore {
    #[instrument(skip(self, query), fields(database = %self.config.database_id))]
    async fn query(&self, query: &RecordQuery) -> Result<Vec<ApplicantRecord>, RecordStoreError> {
        let url = self.endpoint(&["databases", self.config.database_id.as_str(), "query"])?;
        let mut cursor: Option<String> = None;
        let mut records = Vec::new();

        loop {
            let body = query_body(query, cursor.as_deref());
            let response = self
                .request(Method::POST, url.clone())
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let page: QueryResponse = read_json(response).await?;

            records.extend(page.results.into_iter().map(NotionPage::into_record));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!(count = records.len(), "notion query complete");
        Ok(records)
    }

    #[instrument(skip(self, patch), fields(record = %id))]
    async fn update(&self, id: &RecordId, patch: &FieldPatch) -> Result<(), RecordStoreError> {
        let url = self.endpoint(&["pages", id.0.as_str()])?;
        let response = self
            .request(Method::PATCH, url)
            .json(&patch_body(patch))
            .send()
            .await
            .map_err(transport_error)?;
        let _: Value = read_json(response).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> RecordStoreError {
    RecordStoreError::Transport(err.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RecordStoreError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|err| RecordStoreError::Decode(err.to_string()));
    }

    if status == StatusCode::NOT_FOUND {
        return Err(RecordStoreError::NotFound);
    }

    let message = serde_json::from_str::<NotionErrorBody>(&body)
        .map(|error| error.message)
        .unwrap_or(body);
    Err(RecordStoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

pub(crate) fn filter_json(filter: &RecordFilter) -> Value {
    match filter {
        RecordFilter::EmailEquals(email) => json!({
            "property": EMAIL_PROPERTY,
            "email": { "equals": email },
        }),
        RecordFilter::SubmittedEquals(flag) => json!({
            "property": SUBMITTED_PROPERTY,
            "checkbox": { "equals": flag },
        }),
        RecordFilter::ReviewedEquals(flag) => json!({
            "property": REVIEWED_PROPERTY,
            "checkbox": { "equals": flag },
        }),
        RecordFilter::And(filters) => json!({
            "and": filters.iter().map(filter_json).collect::<Vec<_>>(),
        }),
    }
}

fn sort_json(sort: CreatedTimeSort) -> Value {
    let direction = match sort.0 {
        SortDirection::Ascending => "ascending",
        SortDirection::Descending => "descending",
    };
    json!({ "timestamp": "created_time", "direction": direction })
}

pub(crate) fn query_body(query: &RecordQuery, cursor: Option<&str>) -> Value {
    let mut body = json!({
        "filter": filter_json(&query.filter),
        "page_size": PAGE_SIZE,
    });
    if let Some(sort) = query.sort {
        body["sorts"] = json!([sort_json(sort)]);
    }
    if let Some(cursor) = cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

pub(crate) fn patch_body(patch: &FieldPatch) -> Value {
    let properties: serde_json::Map<String, Value> = patch
        .0
        .iter()
        .map(|update| match update {
            FieldUpdate::Submitted(flag) => {
                (SUBMITTED_PROPERTY.to_string(), json!({ "checkbox": flag }))
            }
            FieldUpdate::FileUrl(url) => (FILE_URL_PROPERTY.to_string(), json!({ "url": url })),
            FieldUpdate::Score(score) => {
                (SCORE_PROPERTY.to_string(), json!({ "number": score.get() }))
            }
            FieldUpdate::Feedback(text) => (
                FEEDBACK_PROPERTY.to_string(),
                json!({ "rich_text": [{ "text": { "content": text } }] }),
            ),
            FieldUpdate::Reviewed(flag) => {
                (REVIEWED_PROPERTY.to_string(), json!({ "checkbox": flag }))
            }
        })
        .collect();

    json!({ "properties": properties })
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) results: Vec<NotionPage>,
    #[serde(default)]
    pub(crate) has_more: bool,
    #[serde(default)]
    pub(crate) next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotionPage {
    id: String,
    created_time: DateTime<Utc>,
    #[serde(default)]
    properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Email {
        email: Option<String>,
    },
    Url {
        url: Option<String>,
    },
    Number {
        number: Option<f64>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: bool,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Debug, Deserialize)]
struct NotionErrorBody {
    #[serde(default)]
    message: String,
}

fn join_plain_text(blocks: &[RichText]) -> Option<String> {
    let text: String = blocks.iter().map(|block| block.plain_text.as_str()).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl NotionPage {
    fn text(&self, property: &str) -> Option<String> {
        match self.properties.get(property)? {
            PropertyValue::Title { title } => join_plain_text(title),
            PropertyValue::RichText { rich_text } => join_plain_text(rich_text),
            PropertyValue::Email { email } => email.clone(),
            PropertyValue::Url { url } => url.clone(),
            _ => None,
        }
    }

    fn number(&self, property: &str) -> Option<i64> {
        match self.properties.get(property)? {
            PropertyValue::Number { number } => number
                .filter(|value| value.is_finite())
                .map(|value| value.round() as i64),
            _ => None,
        }
    }

    fn flag(&self, property: &str) -> bool {
        matches!(
            self.properties.get(property),
            Some(PropertyValue::Checkbox { checkbox: true })
        )
    }

    pub(crate) fn into_record(self) -> ApplicantRecord {
        ApplicantRecord {
            name: self.text(NAME_PROPERTY),
            email: self.text(EMAIL_PROPERTY),
            file_url: self.text(FILE_URL_PROPERTY),
            score: self.number(SCORE_PROPERTY),
            feedback: self.text(FEEDBACK_PROPERTY),
            submitted: self.flag(SUBMITTED_PROPERTY),
            reviewed: self.flag(REVIEWED_PROPERTY),
            created_at: self.created_time,
            id: RecordId(self.id),
        }
    }
}
