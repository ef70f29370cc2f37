use axum::extract::Query;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use serde::Deserialize;

const HOME_PAGE: &str = include_str!("../assets/home.html");
const SUBMIT_TEMPLATE: &str = include_str!("../assets/submit.html");
const REVIEW_PAGE: &str = include_str!("../assets/review.html");
const STYLESHEET: &str = include_str!("../assets/portal.css");

const MISSING_EMAIL_WARNING: &str = r#"<div class="warning"><p>No email found in URL. Please use the link from your email.</p></div>"#;

pub(crate) fn with_pages(router: axum::Router) -> axum::Router {
    router
        .route("/", get(home_page))
        .route("/portal/submit", get(submit_page))
        .route("/portal/review", get(review_page))
        .route("/portal/portal.css", get(stylesheet))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitPageQuery {
    #[serde(default)]
    pub(crate) email: Option<String>,
}

pub(crate) async fn home_page() -> Html<&'static str> {
    Html(HOME_PAGE)
}

pub(crate) async fn review_page() -> Html<&'static str> {
    Html(REVIEW_PAGE)
}

pub(crate) async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLESHEET)
}

pub(crate) async fn submit_page(Query(query): Query<SubmitPageQuery>) -> Html<String> {
    Html(render_submit_page(query.email.as_deref()))
}

/// The form stays disabled until the page was opened with the applicant's email.
pub(crate) fn render_submit_page(email: Option<&str>) -> String {
    let email = email.map(str::trim).filter(|email| !email.is_empty());

    match email {
        Some(email) => {
            let escaped = escape_html(email);
            let section = format!(
                r#"<p class="email-display">Submitting as: <strong>{escaped}</strong></p>"#
            );
            fill(
                SUBMIT_TEMPLATE,
                &[
                    ("email_section", &section),
                    ("email_attr", &escaped),
                    ("disabled", ""),
                ],
            )
        }
        None => fill(
            SUBMIT_TEMPLATE,
            &[
                ("email_section", MISSING_EMAIL_WARNING),
                ("email_attr", ""),
                ("disabled", "disabled"),
            ],
        ),
    }
}

/// Single pass over `{{name}}` placeholders, so substituted text is never rescanned.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            rendered.push_str(&rest[start..]);
            return rendered;
        };
        let name = &after[..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => rendered.push_str(value),
            None => rendered.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    rendered.push_str(rest);
    rendered
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            other => escaped.push(other),
        }
    }
    escaped
}
