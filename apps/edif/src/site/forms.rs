use axum::Form;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use edif_core::content::{AdverseEventReport, SampleRequest};
use edif_core::validate::validation_errors;
use edif_core::{Collection, ValidationErrors};
use maud::{Markup, html};
use serde::Deserialize;
use tracing::warn;

use super::{layout, render};
use crate::api::AppState;
use crate::error::AppError;

/// Role options of the sample request form.
const ROLES: [&str; 4] = ["Physician", "Pharmacist", "Nurse", "Other"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SampleRequestForm {
    pub name: String,
    pub organization: String,
    pub email: String,
    pub role: String,
}

impl SampleRequestForm {
    fn to_record(&self) -> SampleRequest {
        SampleRequest {
            name: self.name.trim().to_string(),
            organization: self.organization.trim().to_string(),
            email: self.email.trim().to_string(),
            role: self.role.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdverseEventForm {
    pub reporter_name: String,
    pub email: String,
    pub phone: String,
    pub product_name: String,
    pub description: String,
    pub onset_date: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl AdverseEventForm {
    fn to_record(&self) -> AdverseEventReport {
        AdverseEventReport {
            reporter_name: self.reporter_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: non_empty(&self.phone),
            product_name: self.product_name.trim().to_string(),
            description: self.description.trim().to_string(),
            onset_date: non_empty(&self.onset_date),
        }
    }
}

fn field_error(errors: Option<&ValidationErrors>, field: &str) -> Markup {
    html! {
        @if let Some(message) = errors.and_then(|e| e.message_for(field)) {
            p.field-error { (message) }
        }
    }
}

// =============================================================================
// SAMPLE REQUEST
// =============================================================================

pub fn sample_request_form(form: &SampleRequestForm, errors: Option<&ValidationErrors>) -> Markup {
    html! {
        form method="post" action="/sample-request" {
            label for="name" { "Full name" }
            input #name type="text" name="name" value=(form.name);
            (field_error(errors, "name"))

            label for="organization" { "Organization" }
            input #organization type="text" name="organization" value=(form.organization);
            (field_error(errors, "organization"))

            label for="email" { "Email" }
            input #email type="email" name="email" value=(form.email);
            (field_error(errors, "email"))

            label for="role" { "Role" }
            select #role name="role" {
                option value="" { "Select your role" }
                @for role in ROLES {
                    option value=(role) selected[form.role == role] { (role) }
                }
            }
            (field_error(errors, "role"))

            p { button.button type="submit" { "Request sample" } }
        }
    }
}

pub fn sample_request_page(form: &SampleRequestForm, errors: Option<&ValidationErrors>) -> Markup {
    layout(
        "Request a Sample",
        "/sample-request",
        None,
        html! {
            section { div.container {
                h1 { "Request a sample" }
                p.muted { "Samples are available to licensed healthcare professionals." }
                (sample_request_form(form, errors))
            } }
        },
    )
}

fn thank_you(title: &str, message: &str) -> Markup {
    layout(
        title,
        "",
        Some("confirmation"),
        html! {
            section { div.container {
                h1 { (title) }
                p { (message) }
                a.button href="/" { "Back to home" }
            } }
        },
    )
}

/// Re-render the form with 400 on validation failures, 500 otherwise.
fn rejected(err: &AppError, page: impl FnOnce(Option<&ValidationErrors>) -> Markup) -> Response {
    let errors = match err {
        AppError::Core(core) => validation_errors(core),
        _ => None,
    };
    let status = match errors {
        Some(_) => StatusCode::BAD_REQUEST,
        None => {
            warn!(error = %err, "form submission failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, render(page(errors))).into_response()
}

pub async fn sample_request() -> Html<String> {
    render(sample_request_page(&SampleRequestForm::default(), None))
}

pub async fn submit_sample_request(
    State(state): State<AppState>,
    Form(form): Form<SampleRequestForm>,
) -> Response {
    match state
        .content
        .submit(Collection::SampleRequests, &form.to_record())
    {
        Ok(_) => render(thank_you(
            "Request received",
            "Thank you. Our team will contact you about your sample request shortly.",
        ))
        .into_response(),
        Err(e) => rejected(&e, |errors| sample_request_page(&form, errors)),
    }
}

// =============================================================================
// ADVERSE EVENT REPORT
// =============================================================================

pub fn adverse_event_page(form: &AdverseEventForm, errors: Option<&ValidationErrors>) -> Markup {
    layout(
        "Report an Adverse Event",
        "/report-ae",
        None,
        html! {
            section { div.container {
                h1 { "Report an adverse event" }
                p.muted {
                    "If you suspect a side effect from one of our products, tell us here. "
                    "In an emergency contact your doctor or local emergency services."
                }
                form method="post" action="/report-ae" {
                    label for="reporterName" { "Your name" }
                    input #reporterName type="text" name="reporterName" value=(form.reporter_name);
                    (field_error(errors, "reporterName"))

                    label for="email" { "Email" }
                    input #email type="email" name="email" value=(form.email);
                    (field_error(errors, "email"))

                    label for="phone" { "Phone (optional)" }
                    input #phone type="tel" name="phone" value=(form.phone);

                    label for="productName" { "Product" }
                    input #productName type="text" name="productName" value=(form.product_name);
                    (field_error(errors, "productName"))

                    label for="onsetDate" { "Date of onset (optional)" }
                    input #onsetDate type="date" name="onsetDate" value=(form.onset_date);

                    label for="description" { "What happened?" }
                    textarea #description name="description" rows="6" { (form.description) }
                    (field_error(errors, "description"))

                    p { button.button type="submit" { "Submit report" } }
                }
            } }
        },
    )
}

pub async fn adverse_event() -> Html<String> {
    render(adverse_event_page(&AdverseEventForm::default(), None))
}

pub async fn submit_adverse_event(
    State(state): State<AppState>,
    Form(form): Form<AdverseEventForm>,
) -> Response {
    match state
        .content
        .submit(Collection::AdverseEventReports, &form.to_record())
    {
        Ok(_) => render(thank_you(
            "Report received",
            "Thank you. Our pharmacovigilance team will review your report.",
        ))
        .into_response(),
        Err(e) => rejected(&e, |errors| adverse_event_page(&form, errors)),
    }
}
