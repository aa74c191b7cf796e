//! # Form-Boundary Validation
//!
//! Admin submissions are schema-less JSON objects. Before they reach the
//! store they are checked per collection: presence and type of required
//! fields, simple range rules, and finally a decode into the typed entity.
//! Every failing field is reported, not only the first.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::collection::Collection;
use crate::content::{
    AdverseEventReport, CompanyStat, ContactInfo, GalleryItem, HeroSection, Innovation, Product,
    SampleRequest, TeamMember, Testimonial,
};
use crate::document::{Document, Fields, json_type_name};
use crate::error::{EdifError, Result, ValidationErrors};

const CONTACT_KINDS: [&str; 5] = ["address", "phone", "email", "social", "hours"];

/// Loose e-mail syntax check: `local@domain.tld`, no whitespace.
pub fn looks_like_email(s: &str) -> bool {
    let s = s.trim();
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Link or asset URL that can go into `href`, `src` or a CSS `url('...')`.
///
/// Relative paths pass. Absolute URLs must use http, https, mailto or tel.
/// Quotes, parentheses, angle brackets, backslashes and control characters
/// are refused anywhere.
pub fn is_safe_url(s: &str) -> bool {
    let s = s.trim();
    if s.chars()
        .any(|c| matches!(c, '"' | '\'' | '(' | ')' | '<' | '>' | '\\') || c.is_control())
    {
        return false;
    }
    match s.split_once(':') {
        Some((scheme, _))
            if scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            matches!(
                scheme.to_ascii_lowercase().as_str(),
                "http" | "https" | "mailto" | "tel"
            )
        }
        _ => true,
    }
}

/// Validate a full document body for a collection.
pub fn validate_fields(collection: Collection, fields: &Fields) -> Result<()> {
    let mut v = Checker::new(fields);

    if collection.is_content() {
        v.optional_bool("isActive");
    }
    if collection.is_ordered() {
        v.optional_int("order");
    }

    match collection {
        Collection::Products => {
            v.required_str("name", "Name is required");
            v.required_str("description", "Description is required");
            v.required_str("category", "Category is required");
            v.non_empty_str_array("images", "At least one image is required");
            v.optional_min_number("price", 0, "Price cannot be negative");
            v.optional_str("indication");
            v.optional_str("dosage");
            v.decode::<Product>();
        }
        Collection::Testimonials => {
            v.required_str("clientName", "Client name is required");
            v.required_str("company", "Company is required");
            v.required_str("review", "Review is required");
            v.int_in_range("rating", 1, 5, "Rating must be between 1 and 5");
            v.decode::<Testimonial>();
        }
        Collection::TeamMembers => {
            v.required_str("name", "Name is required");
            v.required_str("position", "Position is required");
            v.required_str("bio", "Bio is required");
            v.required_str("photo", "Photo is required");
            v.optional_email("socialLinks.email", "Invalid email address");
            v.optional_url("socialLinks.linkedin");
            v.optional_url("socialLinks.twitter");
            v.decode::<TeamMember>();
        }
        Collection::Gallery => {
            v.required_str("title", "Title is required");
            v.required_str("image", "Image is required");
            v.required_str("altText", "Alt text is required");
            v.required_str("category", "Category is required");
            v.decode::<GalleryItem>();
        }
        Collection::CompanyStats => {
            v.required_str("title", "Title is required");
            v.required_str("value", "Value is required");
            v.decode::<CompanyStat>();
        }
        Collection::ContactInfo => {
            v.one_of("type", &CONTACT_KINDS);
            v.required_str("label", "Label is required");
            v.required_str("value", "Value is required");
            if matches!(v.get("type"), Some(Value::String(kind)) if kind == "social") {
                v.optional_url("value");
            }
            v.decode::<ContactInfo>();
        }
        Collection::HomepageSections => {
            v.required_str("title", "Title is required");
            v.required_str("subtitle", "Subtitle is required");
            v.required_str("ctaText", "CTA text is required");
            v.required_str("ctaLink", "CTA link is required");
            v.optional_url("ctaLink");
            v.optional_url("backgroundImage");
            v.decode::<HeroSection>();
        }
        Collection::Innovations => {
            v.required_str("title", "Title is required");
            v.required_str("description", "Description is required");
            v.required_str("category", "Category is required");
            v.required_str("publicationDate", "Publication date is required");
            v.decode::<Innovation>();
        }
        Collection::SampleRequests => {
            v.required_str("name", "Name is required");
            v.required_str("organization", "Organization is required");
            v.required_email("email");
            v.required_str("role", "Role is required");
            v.decode::<SampleRequest>();
        }
        Collection::AdverseEventReports => {
            v.required_str("reporterName", "Reporter name is required");
            v.required_email("email");
            v.required_str("productName", "Product name is required");
            v.required_str("description", "Description is required");
            v.decode::<AdverseEventReport>();
        }
        Collection::Users | Collection::Activity => {}
    }

    v.finish()
}

/// Fill lifecycle defaults on a new document body: `isActive = true` for
/// content, and `order = max(order) + 1` for ordered collections.
pub fn apply_create_defaults(collection: Collection, fields: &mut Fields, existing: &[Document]) {
    if collection.is_content() && !fields.contains_key("isActive") {
        fields.insert("isActive".to_string(), Value::Bool(true));
    }
    if collection.is_ordered() && matches!(fields.get("order"), None | Some(Value::Null)) {
        fields.insert("order".to_string(), Value::from(next_order(existing)));
    }
}

/// One past the highest integer `order` among `docs`; `1` when none.
pub fn next_order(docs: &[Document]) -> i64 {
    docs.iter()
        .filter_map(|d| d.i64_field("order"))
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

/// Validate a typed public submission.
pub fn validate_record<T: serde::Serialize>(collection: Collection, record: &T) -> Result<()> {
    let fields = crate::document::to_fields(record)?;
    validate_fields(collection, &fields)
}

// =============================================================================
// CHECKER
// =============================================================================

struct Checker<'a> {
    fields: &'a Fields,
    errors: ValidationErrors,
}

impl<'a> Checker<'a> {
    fn new(fields: &'a Fields) -> Self {
        Self {
            fields,
            errors: ValidationErrors::new(),
        }
    }

    fn get(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    fn failed(&self, field: &str) -> bool {
        self.errors.message_for(field).is_some()
    }

    fn type_error(&mut self, field: &str, expected: &str, got: &Value) {
        self.errors.push(
            field,
            format!("Expected {}, received {}", expected, json_type_name(got)),
        );
    }

    fn required_str(&mut self, field: &str, message: &str) {
        match self.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) | None | Some(Value::Null) => self.errors.push(field, message),
            Some(other) => self.type_error(field, "string", other),
        }
    }

    fn optional_str(&mut self, field: &str) {
        match self.get(field) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(other) => self.type_error(field, "string", other),
        }
    }

    /// Skipped when the field already failed or is absent.
    fn optional_url(&mut self, field: &str) {
        if self.failed(field) {
            return;
        }
        match self.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if is_safe_url(s) => {}
            Some(Value::String(_)) => self.errors.push(field, "Invalid URL"),
            Some(other) => self.type_error(field, "string", other),
        }
    }

    fn required_email(&mut self, field: &str) {
        self.required_str(field, "Email is required");
        if !self.failed(field)
            && let Some(Value::String(s)) = self.get(field)
            && !looks_like_email(s)
        {
            self.errors.push(field, "Invalid email address");
        }
    }

    fn optional_email(&mut self, field: &str, message: &str) {
        match self.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s.trim().is_empty() || looks_like_email(s) => {}
            Some(Value::String(_)) => self.errors.push(field, message),
            Some(other) => self.type_error(field, "string", other),
        }
    }

    fn non_empty_str_array(&mut self, field: &str, message: &str) {
        match self.get(field) {
            Some(Value::Array(items)) if items.is_empty() => self.errors.push(field, message),
            Some(Value::Array(items)) => {
                if let Some(bad) = items.iter().find(|i| !i.is_string()) {
                    self.type_error(field, "array of strings", bad);
                }
            }
            None | Some(Value::Null) => self.errors.push(field, message),
            Some(other) => self.type_error(field, "array", other),
        }
    }

    fn optional_min_number(&mut self, field: &str, min: i64, message: &str) {
        match self.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) => {
                let below = match n.as_i64() {
                    Some(i) => i < min,
                    None => n.as_f64().is_some_and(|f| f < min as f64),
                };
                if below {
                    self.errors.push(field, message);
                }
            }
            Some(other) => self.type_error(field, "number", other),
        }
    }

    fn int_in_range(&mut self, field: &str, min: i64, max: i64, message: &str) {
        match self.get(field) {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) if (min..=max).contains(&i) => {}
                _ => self.errors.push(field, message),
            },
            None | Some(Value::Null) => self.errors.push(field, message),
            Some(other) => self.type_error(field, "number", other),
        }
    }

    fn optional_int(&mut self, field: &str) {
        match self.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Number(n)) if n.is_i64() => {}
            Some(other) => self.type_error(field, "integer", other),
        }
    }

    fn optional_bool(&mut self, field: &str) {
        match self.get(field) {
            None | Some(Value::Null) | Some(Value::Bool(_)) => {}
            Some(other) => self.type_error(field, "boolean", other),
        }
    }

    fn one_of(&mut self, field: &str, allowed: &[&str]) {
        match self.get(field) {
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
            Some(Value::String(_)) | None | Some(Value::Null) => self.errors.push(
                field,
                format!("Must be one of: {}", allowed.join(", ")),
            ),
            Some(other) => self.type_error(field, "string", other),
        }
    }

    /// Final typed decode; only attempted when the field rules passed, so
    /// its error is about something the rules do not cover.
    fn decode<T: DeserializeOwned>(&mut self) {
        if !self.errors.is_empty() {
            return;
        }
        if let Err(e) = serde_json::from_value::<T>(Value::Object(self.fields.clone())) {
            self.errors.push("document", e.to_string());
        }
    }

    fn finish(self) -> Result<()> {
        self.errors.into_result()
    }
}

/// Error helper for callers that only need the validation list.
pub fn validation_errors(err: &EdifError) -> Option<&ValidationErrors> {
    match err {
        EdifError::Validation(v) => Some(v),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => Fields::new(),
        }
    }

    fn errors_of(collection: Collection, value: Value) -> ValidationErrors {
        match validate_fields(collection, &fields(value)) {
            Err(EdifError::Validation(v)) => v,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_product_passes() {
        let ok = validate_fields(
            Collection::Products,
            &fields(json!({
                "name": "Amoxicillin 500mg",
                "description": "Broad-spectrum antibiotic",
                "category": "Antibiotics",
                "images": ["/files/products/amox.png"],
                "price": 12.5,
                "isActive": true,
                "order": 1,
            })),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn product_reports_every_missing_field() {
        let errors = errors_of(Collection::Products, json!({ "name": "  ", "images": [] }));
        assert_eq!(errors.message_for("name"), Some("Name is required"));
        assert_eq!(errors.message_for("description"), Some("Description is required"));
        assert_eq!(errors.message_for("category"), Some("Category is required"));
        assert_eq!(
            errors.message_for("images"),
            Some("At least one image is required")
        );
    }

    #[test]
    fn negative_price_is_rejected() {
        let errors = errors_of(
            Collection::Products,
            json!({
                "name": "X", "description": "Y", "category": "Z",
                "images": ["a.png"], "price": -1
            }),
        );
        assert_eq!(errors.len(), 1);
        assert!(errors.message_for("price").is_some());
    }

    #[test]
    fn testimonial_rating_range_and_types() {
        let errors = errors_of(
            Collection::Testimonials,
            json!({ "clientName": "Dr. Rao", "company": "City Hospital", "review": "Reliable", "rating": 6 }),
        );
        assert_eq!(errors.message_for("rating"), Some("Rating must be between 1 and 5"));

        let errors = errors_of(
            Collection::Testimonials,
            json!({ "clientName": "Dr. Rao", "company": "City Hospital", "review": "Reliable", "rating": "five" }),
        );
        assert_eq!(
            errors.message_for("rating"),
            Some("Expected number, received string")
        );
    }

    #[test]
    fn contact_type_must_be_known() {
        let errors = errors_of(
            Collection::ContactInfo,
            json!({ "type": "fax", "label": "Fax", "value": "123" }),
        );
        assert!(errors.message_for("type").is_some_and(|m| m.contains("address")));
    }

    #[test]
    fn team_member_social_email_is_checked() {
        let errors = errors_of(
            Collection::TeamMembers,
            json!({
                "name": "A", "position": "B", "bio": "C", "photo": "d.png",
                "socialLinks": { "email": "not-an-email" }
            }),
        );
        assert_eq!(
            errors.message_for("socialLinks.email"),
            Some("Invalid email address")
        );
    }

    #[test]
    fn order_and_active_flags_are_type_checked() {
        let errors = errors_of(
            Collection::CompanyStats,
            json!({ "title": "Countries", "value": "40+", "order": "first", "isActive": "yes" }),
        );
        assert!(errors.message_for("order").is_some());
        assert!(errors.message_for("isActive").is_some());
    }

    #[test]
    fn hero_sections_ignore_order() {
        let ok = validate_fields(
            Collection::HomepageSections,
            &fields(json!({
                "title": "Quality medicines", "subtitle": "For every patient",
                "ctaText": "Explore", "ctaLink": "/products", "order": "n/a"
            })),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn hero_links_must_be_safe_urls() {
        let hero = |link: &str, image: &str| {
            validate_fields(
                Collection::HomepageSections,
                &fields(json!({
                    "title": "Quality medicines", "subtitle": "For every patient",
                    "ctaText": "Explore", "ctaLink": link, "backgroundImage": image
                })),
            )
        };
        assert!(hero("/products", "/files/hero.jpg").is_ok());
        assert!(hero("https://edif.example/products?a=b:c", "").is_ok());

        let err = hero(" JavaScript:alert(1)", "/files/hero.jpg").unwrap_err();
        let errors = validation_errors(&err).unwrap();
        assert_eq!(errors.message_for("ctaLink"), Some("Invalid URL"));
        assert!(errors.message_for("backgroundImage").is_none());

        let err = hero("/products", "x'); background: url('https://evil.example").unwrap_err();
        assert_eq!(
            validation_errors(&err).and_then(|v| v.message_for("backgroundImage")),
            Some("Invalid URL")
        );
        assert!(hero("/products\" onmouseover=\"x", "").is_err());
    }

    #[test]
    fn safe_url_rules() {
        assert!(is_safe_url("/files/a.png"));
        assert!(is_safe_url("mailto:info@edif.example"));
        assert!(is_safe_url("#contact"));
        assert!(!is_safe_url("data:text/html,hi"));
        assert!(!is_safe_url("vbscript:msgbox"));
        assert!(!is_safe_url("java\tscript:alert"));
        assert!(!is_safe_url("/a<b"));
    }

    #[test]
    fn sample_request_record_validation() {
        let request = SampleRequest {
            name: "Jane".into(),
            organization: "Clinic".into(),
            email: "jane@clinic".into(),
            role: "Pharmacist".into(),
        };
        let err = validate_record(Collection::SampleRequests, &request).unwrap_err();
        assert_eq!(
            validation_errors(&err).and_then(|v| v.message_for("email")),
            Some("Invalid email address")
        );
    }

    #[test]
    fn create_defaults_fill_order_and_active() {
        use crate::timestamp::Timestamp;
        let existing: Vec<Document> = [3, 7]
            .iter()
            .map(|o| Document::new(format!("d{o}"), fields(json!({ "order": o })), "a", Timestamp::EPOCH))
            .collect();

        let mut body = fields(json!({ "title": "Countries" }));
        apply_create_defaults(Collection::CompanyStats, &mut body, &existing);
        assert_eq!(body["order"], json!(8));
        assert_eq!(body["isActive"], json!(true));

        let mut explicit = fields(json!({ "order": 2, "isActive": false }));
        apply_create_defaults(Collection::CompanyStats, &mut explicit, &existing);
        assert_eq!(explicit["order"], json!(2));
        assert_eq!(explicit["isActive"], json!(false));

        let mut hero = fields(json!({}));
        apply_create_defaults(Collection::HomepageSections, &mut hero, &existing);
        assert!(!hero.contains_key("order"));
        assert_eq!(next_order(&[]), 1);
    }

    #[test]
    fn email_syntax() {
        assert!(looks_like_email("qa@edif.example"));
        assert!(!looks_like_email("qa@edif"));
        assert!(!looks_like_email("qa edif@x.com"));
        assert!(!looks_like_email("@x.com"));
        assert!(!looks_like_email("a@@x.com"));
    }
}
