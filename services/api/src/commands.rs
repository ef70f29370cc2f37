use crate::infra::connect;
use assessment_portal::config::AppConfig;
use assessment_portal::error::AppError;
use assessment_portal::submissions::{BlobStore, SubmissionView};
use assessment_portal::telemetry;
use chrono::Utc;
use clap::Args;
use tracing::info;

const PROBE_BODY: &[u8] = b"assessment portal storage check";

#[derive(Args, Debug, Default)]
pub(crate) struct SubmissionsArgs {
    /// Only list submissions that have not been reviewed yet
    #[arg(long)]
    pub(crate) unreviewed: bool,
    /// Print the listing as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run_submissions(args: SubmissionsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let service = connect(&config)?;

    let submissions = if args.unreviewed {
        service.pending_reviews().await?
    } else {
        service.list_submissions().await?
    };

    if args.json {
        let payload = serde_json::json!({ "submissions": submissions });
        println!("{payload:#}");
        return Ok(());
    }

    if submissions.is_empty() {
        println!("No submissions to review.");
        return Ok(());
    }

    println!("{}", render_header());
    for submission in &submissions {
        println!("{}", render_row(submission));
    }
    println!("\n{} submission(s)", submissions.len());
    Ok(())
}

pub(crate) async fn run_storage_check() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let service = connect(&config)?;
    let blobs = service.blobs();

    let key = format!("storage-check_{}.txt", Utc::now().timestamp_millis());
    info!(bucket = blobs.bucket(), %key, "uploading storage probe");

    blobs
        .upload(&key, PROBE_BODY.to_vec(), &mime::TEXT_PLAIN)
        .await?;
    let url = match blobs.public_url(&key) {
        Ok(url) => url,
        Err(err) => {
            blobs.remove(&key).await?;
            return Err(err.into());
        }
    };

    println!("Uploaded probe to bucket {}", blobs.bucket());
    println!("Public URL: {url}");

    blobs.remove(&key).await?;
    println!("Removed {key}");
    Ok(())
}

fn render_header() -> String {
    format!(
        "{:<20} {:<15} {:<6} {:<28} {}",
        "Submitted", "Status", "Score", "Applicant", "Email"
    )
}

fn render_row(submission: &SubmissionView) -> String {
    let status = if submission.reviewed {
        "Reviewed"
    } else {
        "Pending Review"
    };
    let score = submission
        .score
        .map(|score| format!("{score}/10"))
        .unwrap_or_else(|| "-".to_string());

    let mut row = format!(
        "{:<20} {:<15} {:<6} {:<28} {}",
        submission.submitted_date.format("%Y-%m-%d %H:%M"),
        status,
        score,
        submission.name,
        submission.email.as_deref().unwrap_or("N/A"),
    );
    if let Some(url) = &submission.file_url {
        row.push_str("\n    ");
        row.push_str(url);
    }
    row
}
