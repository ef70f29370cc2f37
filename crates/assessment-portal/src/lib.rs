//! Assessment submission and review portal.
//!
//! Applicants upload an assessment file tied to their email; admins list and
//! score submissions. Applicant records live in a Notion database and files in
//! a Supabase Storage bucket, both reached through the traits in
//! [`submissions`].

pub mod config;
pub mod error;
pub mod submissions;
pub mod telemetry;
