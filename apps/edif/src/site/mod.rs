//! # Public Site
//!
//! Server-rendered HTML for the marketing site. Collection-backed sections
//! read the server's standing live subscriptions, so edits made in the admin
//! API show up on the next page load without a restart.

pub mod forms;
pub mod pages;

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::AppState;
use crate::live::{LiveQuery, LiveState};

/// How long a page render waits for a subscription's first result.
const FIRST_LOAD: Duration = Duration::from_secs(2);

const CSS: &str = r#"
:root { --brand-blue: #0b3d91; --brand-teal: #0f9d8a; --text: #1f2933; --muted: #616e7c; --border: #e4e7eb; }
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, -apple-system, "Segoe UI", sans-serif; color: var(--text); line-height: 1.6; }
a { color: var(--brand-blue); }
.container { max-width: 1120px; margin: 0 auto; padding: 0 1.5rem; }
.site-header { border-bottom: 1px solid var(--border); background: #fff; }
.site-header .container { display: flex; align-items: center; justify-content: space-between; height: 4rem; }
.brand { font-weight: 700; font-size: 1.25rem; color: var(--brand-blue); text-decoration: none; }
.site-nav a { margin-left: 1.25rem; text-decoration: none; color: var(--text); }
.site-nav a.active { color: var(--brand-blue); font-weight: 600; }
.hero { background: linear-gradient(135deg, var(--brand-blue), var(--brand-teal)); color: #fff; padding: 5rem 0; background-size: cover; }
.hero h1 { font-size: 2.75rem; margin: 0 0 1rem; }
.button { display: inline-block; padding: 0.75rem 1.5rem; border-radius: 0.5rem; background: var(--brand-teal); color: #fff; text-decoration: none; border: 0; cursor: pointer; font-size: 1rem; }
section { padding: 3.5rem 0; }
section h2 { color: var(--brand-blue); }
.grid { display: grid; gap: 1.5rem; grid-template-columns: repeat(auto-fill, minmax(240px, 1fr)); }
.card { border: 1px solid var(--border); border-radius: 0.75rem; padding: 1.25rem; background: #fff; }
.card img { width: 100%; border-radius: 0.5rem; }
.muted { color: var(--muted); }
.stat-value { font-size: 2rem; font-weight: 700; color: var(--brand-blue); }
.badge { display: inline-block; padding: 0.125rem 0.5rem; border-radius: 999px; background: #e8f1ff; color: var(--brand-blue); font-size: 0.8rem; }
.notice { padding: 1rem; border-radius: 0.5rem; background: #fff4e5; }
form label { display: block; margin-top: 1rem; font-weight: 600; }
form input, form textarea, form select { width: 100%; padding: 0.6rem; border: 1px solid var(--border); border-radius: 0.4rem; font: inherit; }
.field-error { color: #b42318; font-size: 0.875rem; }
.site-footer { border-top: 1px solid var(--border); padding: 2rem 0; margin-top: 3rem; font-size: 0.9rem; }
.site-footer a { margin-right: 1rem; }
"#;

/// Main navigation: (href, label).
const NAV: [(&str, &str); 6] = [
    ("/", "Home"),
    ("/products", "Products"),
    ("/rd", "R&D"),
    ("/company", "Company"),
    ("/leadership", "Leadership"),
    ("/contact", "Contact"),
];

const FOOTER_LINKS: [(&str, &str); 6] = [
    ("/privacy", "Privacy"),
    ("/terms", "Terms"),
    ("/cookies", "Cookies"),
    ("/report-ae", "Report an adverse event"),
    ("/careers", "Careers"),
    ("/investors", "Investors"),
];

fn base_document(title: &str, css: &str, body_class: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " | EDIF Pharmaceuticals" }
                style { (PreEscaped(css)) }
            }
            body class=[body_class] {
                (content)
            }
        }
    }
}

fn site_header(current_path: &str) -> Markup {
    html! {
        header.site-header {
            div.container {
                a.brand href="/" { "EDIF" }
                nav.site-nav {
                    @for (href, label) in NAV {
                        a href=(href) class=[(href == current_path).then_some("active")] { (label) }
                    }
                }
            }
        }
    }
}

fn site_footer() -> Markup {
    html! {
        footer.site-footer {
            div.container {
                p {
                    @for (href, label) in FOOTER_LINKS {
                        a href=(href) { (label) }
                    }
                }
                p.muted { "© EDIF Pharmaceuticals. For healthcare professionals." }
            }
        }
    }
}

/// Full page: header, content, footer.
pub fn layout(title: &str, current_path: &str, body_class: Option<&str>, content: Markup) -> Markup {
    base_document(
        title,
        CSS,
        body_class,
        html! {
            (site_header(current_path))
            main { (content) }
            (site_footer())
        },
    )
}

pub fn render(markup: Markup) -> Html<String> {
    Html(markup.into_string())
}

/// Current state of a subscription, waiting briefly for its first result.
pub async fn settled<T>(query: &LiveQuery<T>) -> LiveState<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    query.newer_than(0, FIRST_LOAD).await
}

fn not_found(path: &str) -> Response {
    let markup = layout(
        "Page not found",
        path,
        Some("not-found"),
        html! {
            section { div.container {
                h1 { "Page not found" }
                p.muted { "The page " code { (path) } " does not exist." }
                a.button href="/" { "Back to home" }
            } }
        },
    );
    (StatusCode::NOT_FOUND, render(markup)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

pub async fn home(State(state): State<AppState>) -> Html<String> {
    render(pages::home(&state).await)
}

/// Every other page, routed by slug.
pub async fn page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(search): Query<SearchParams>,
) -> Response {
    let markup = match slug.as_str() {
        "products" => pages::products(&state, &search.q).await,
        "gallery" => pages::gallery(&state).await,
        "leadership" | "executive-team" => pages::leadership(&state, &slug).await,
        "contact" | "contact-us" => pages::contact(&state, &slug).await,
        other => match pages::static_page(other) {
            Some(page) => pages::render_static(other, page),
            None => return not_found(&format!("/{slug}")),
        },
    };
    render(markup).into_response()
}

pub async fn fallback(uri: axum::http::Uri) -> Response {
    not_found(uri.path())
}
