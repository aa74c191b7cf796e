use edif_core::Record;
use edif_core::content::{ContactKind, CtaSection, Feature, HeroSection, Product};
use edif_core::validate::is_safe_url;
use maud::{Markup, html};

use super::{forms, layout, settled};
use crate::api::AppState;

// =============================================================================
// HOME
// =============================================================================

fn default_hero() -> HeroSection {
    HeroSection {
        title: "Quality medicines for healthier lives".to_string(),
        subtitle: "EDIF develops and manufactures trusted generics and specialty \
                   pharmaceuticals for patients and healthcare professionals."
            .to_string(),
        background_image: None,
        cta_text: "Explore products".to_string(),
        cta_link: "/products".to_string(),
        is_active: true,
    }
}

fn default_cta() -> CtaSection {
    CtaSection {
        title: "Request a product sample".to_string(),
        subtitle: "Healthcare professionals can request samples of any product in our portfolio."
            .to_string(),
        cta_text: "Request sample".to_string(),
        cta_link: "/sample-request".to_string(),
        background_image: None,
        is_active: true,
    }
}

fn therapeutic_areas() -> Vec<Feature> {
    [
        ("Cardiovascular", "Comprehensive solutions for heart health"),
        ("Neurology", "Advanced neurological treatments"),
        ("Metabolic", "Diabetes and metabolic disorders"),
        ("Infectious Disease", "Antibiotics and antiviral therapies"),
        ("Immunology", "Immune system support"),
        ("Pain Management", "Analgesics and anti-inflammatory"),
    ]
    .into_iter()
    .zip(1..)
    .map(|((title, description), order)| Feature {
        title: title.to_string(),
        description: description.to_string(),
        icon: None,
        is_active: true,
        order,
    })
    .collect()
}

/// R&D pipeline: (phase, indication, status, progress %).
const PIPELINE: [(&str, &str, &str, u8); 4] = [
    ("Phase III", "Cardiovascular disease management", "Enrollment complete", 85),
    ("Phase II", "Diabetes combination therapy", "Active recruitment", 60),
    ("Phase I", "Novel antibiotic development", "Preclinical", 35),
    ("Filed", "Generic oncology product", "Regulatory review", 95),
];

fn hero(section: &HeroSection) -> Markup {
    let style = section
        .background_image
        .as_deref()
        .filter(|url| !url.is_empty() && is_safe_url(url))
        .map(|url| format!("background-image: url('{url}')"));
    let cta_link = if is_safe_url(&section.cta_link) {
        section.cta_link.as_str()
    } else {
        "#"
    };
    html! {
        section.hero style=[style] {
            div.container {
                h1 { (section.title) }
                p { (section.subtitle) }
                a.button href=(cta_link) { (section.cta_text) }
            }
        }
    }
}

fn product_card(product: &Record<Product>) -> Markup {
    html! {
        article.card {
            @if let Some(image) = product.images.first() {
                img src=(image) alt=(product.name);
            }
            span.badge { (product.category) }
            h3 { (product.name) }
            @if let Some(indication) = &product.indication {
                p.muted { (indication) }
            }
            p { (product.description) }
            @if let Some(dosage) = &product.dosage {
                p.muted { "Dosage: " (dosage) }
            }
            p { strong { (product.price_label()) } }
        }
    }
}

fn load_error(error: Option<&str>) -> Markup {
    html! {
        @if let Some(error) = error {
            p.notice { "Content is temporarily unavailable: " (error) }
        }
    }
}

pub async fn home(state: &AppState) -> Markup {
    let views = &state.views;
    let sections = settled(&views.homepage_sections).await;
    let products = settled(&views.products).await;
    let stats = settled(&views.company_stats).await;
    let testimonials = settled(&views.testimonials).await;
    let gallery = settled(&views.gallery).await;

    let hero_section = sections
        .data
        .first()
        .map(|record| record.data.clone())
        .unwrap_or_else(default_hero);
    let preview: Vec<&Record<Product>> = products.data.iter().filter(|p| p.is_active).take(3).collect();
    let cta = default_cta();

    layout(
        "Home",
        "/",
        Some("home"),
        html! {
            (hero(&hero_section))

            section #therapeutic-areas { div.container {
                h2 { "Therapeutic areas" }
                div.grid {
                    @for area in therapeutic_areas() {
                        div.card {
                            h3 { (area.title) }
                            p.muted { (area.description) }
                        }
                    }
                }
            } }

            section #products { div.container {
                h2 { "Featured products" }
                (load_error(products.error.as_deref()))
                div.grid {
                    @for product in &preview {
                        (product_card(product))
                    }
                }
                p { a href="/products" { "View all products" } }
            } }

            section #pipeline { div.container {
                h2 { "R&D pipeline" }
                div.grid {
                    @for (phase, indication, status, progress) in PIPELINE {
                        div.card {
                            span.badge { (phase) }
                            h3 { (indication) }
                            p.muted { (status) }
                            progress max="100" value=(progress) { (progress) "%" }
                        }
                    }
                }
            } }

            @if !stats.data.is_empty() {
                section #stats { div.container {
                    div.grid {
                        @for stat in &stats.data {
                            div.card {
                                div.stat-value { (stat.value) }
                                h3 { (stat.title) }
                                @if let Some(description) = &stat.description {
                                    p.muted { (description) }
                                }
                            }
                        }
                    }
                } }
            }

            @if !testimonials.data.is_empty() {
                section #testimonials { div.container {
                    h2 { "What our partners say" }
                    div.grid {
                        @for t in &testimonials.data {
                            blockquote.card {
                                p { "“" (t.review) "”" }
                                p { strong { (t.client_name) } br; span.muted { (t.company) } }
                                p.muted { (t.rating) " / 5" }
                            }
                        }
                    }
                } }
            }

            @if !gallery.data.is_empty() {
                section #gallery { div.container {
                    h2 { "Inside EDIF" }
                    div.grid {
                        @for item in gallery.data.iter().take(6) {
                            figure.card {
                                img src=(item.image) alt=(item.alt_text);
                                figcaption { (item.title) }
                            }
                        }
                    }
                    p { a href="/gallery" { "View gallery" } }
                } }
            }

            section #cta { div.container {
                h2 { (cta.title) }
                p.muted { (cta.subtitle) }
                (forms::sample_request_form(&forms::SampleRequestForm::default(), None))
            } }
        },
    )
}

// =============================================================================
// COLLECTION PAGES
// =============================================================================

pub async fn products(state: &AppState, query: &str) -> Markup {
    let products = settled(&state.views.products).await;
    let matches: Vec<&Record<Product>> = products
        .data
        .iter()
        .filter(|p| p.is_active && p.matches_search(query))
        .collect();

    layout(
        "Products",
        "/products",
        None,
        html! {
            section { div.container {
                h1 { "Products" }
                form method="get" action="/products" {
                    input type="search" name="q" value=(query)
                        placeholder="Search by name, category or indication";
                }
                (load_error(products.error.as_deref()))
                @if matches.is_empty() && !products.loading {
                    p.muted { "No products match your search." }
                }
                div.grid {
                    @for product in &matches {
                        (product_card(product))
                    }
                }
            } }
        },
    )
}

pub async fn gallery(state: &AppState) -> Markup {
    let gallery = settled(&state.views.gallery).await;
    layout(
        "Gallery",
        "/gallery",
        None,
        html! {
            section { div.container {
                h1 { "Gallery" }
                (load_error(gallery.error.as_deref()))
                div.grid {
                    @for item in &gallery.data {
                        figure.card {
                            img src=(item.image) alt=(item.alt_text);
                            figcaption {
                                strong { (item.title) }
                                @if let Some(caption) = &item.caption {
                                    br; span.muted { (caption) }
                                }
                            }
                        }
                    }
                }
            } }
        },
    )
}

pub async fn leadership(state: &AppState, slug: &str) -> Markup {
    let team = settled(&state.views.team_members).await;
    layout(
        "Leadership",
        &format!("/{slug}"),
        None,
        html! {
            section { div.container {
                h1 { "Leadership team" }
                (load_error(team.error.as_deref()))
                div.grid {
                    @for member in &team.data {
                        article.card {
                            img src=(member.photo) alt=(member.name);
                            h3 { (member.name) }
                            p.muted { (member.position) }
                            p { (member.bio) }
                            p {
                                @if let Some(url) = &member.social_links.linkedin {
                                    a href=(url) { "LinkedIn" } " "
                                }
                                @if let Some(url) = &member.social_links.twitter {
                                    a href=(url) { "Twitter" } " "
                                }
                                @if let Some(email) = &member.social_links.email {
                                    a href={ "mailto:" (email) } { "Email" }
                                }
                            }
                        }
                    }
                }
            } }
        },
    )
}

pub async fn contact(state: &AppState, slug: &str) -> Markup {
    let contact = settled(&state.views.contact_info).await;
    layout(
        "Contact",
        &format!("/{slug}"),
        None,
        html! {
            section { div.container {
                h1 { "Contact us" }
                (load_error(contact.error.as_deref()))
                div.grid {
                    @for entry in &contact.data {
                        div.card {
                            span.badge { (entry.kind.label()) }
                            h3 { (entry.label) }
                            @match entry.kind {
                                ContactKind::Email => { p { a href={ "mailto:" (entry.value) } { (entry.value) } } }
                                ContactKind::Phone => { p { a href={ "tel:" (entry.value) } { (entry.value) } } }
                                ContactKind::Social => { p { a href=(entry.value) { (entry.value) } } }
                                ContactKind::Address | ContactKind::Hours => { p { (entry.value) } }
                            }
                        }
                    }
                }
            } }
        },
    )
}

// =============================================================================
// STATIC PAGES
// =============================================================================

/// An informational page without collection data.
#[derive(Debug, Clone, Copy)]
pub struct StaticPage {
    pub title: &'static str,
    pub lead: &'static str,
    pub body: &'static [&'static str],
}

const fn page(title: &'static str, lead: &'static str, body: &'static [&'static str]) -> StaticPage {
    StaticPage { title, lead, body }
}

pub const STATIC_PAGES: [(&str, StaticPage); 30] = [
    ("rd", page("Research & Development", "Science that reaches patients.", &[
        "Our R&D teams focus on cardiovascular, metabolic and infectious disease programmes.",
        "Each programme moves through clearly staged clinical development with independent safety oversight.",
    ])),
    ("company", page("Our Company", "A pharmaceutical manufacturer built on quality.", &[
        "EDIF develops, manufactures and distributes medicines across multiple therapeutic areas.",
    ])),
    ("about", page("About EDIF", "Decades of pharmaceutical expertise.", &[
        "From formulation to distribution, every step is governed by documented quality systems.",
    ])),
    ("manufacturing", page("Manufacturing", "GMP-certified production at scale.", &[
        "Our facilities produce solid oral dosage forms, injectables and topical products.",
        "Every batch is released only after full quality-control testing.",
    ])),
    ("resources", page("Resources", "Information for professionals and patients.", &[
        "Browse product monographs, safety information and regulatory documents.",
    ])),
    ("investors", page("Investors", "Sustainable growth through quality medicines.", &[
        "Find financial reports, regulatory filings and governance information.",
    ])),
    ("careers", page("Careers", "Build a career that improves lives.", &[
        "We hire scientists, engineers, quality specialists and commercial professionals.",
    ])),
    ("media", page("Media", "News and press resources.", &[
        "Press enquiries can be sent to our communications team through the contact page.",
    ])),
    ("privacy", page("Privacy Policy", "How we handle personal data.", &[
        "We collect only the information needed to respond to enquiries and safety reports.",
        "Adverse event reports are processed as required by pharmacovigilance regulations.",
    ])),
    ("terms", page("Terms of Use", "Conditions for using this website.", &[
        "Content on this site is provided for information and is not medical advice.",
    ])),
    ("cookies", page("Cookie Policy", "Cookies used on this website.", &[
        "This site uses only the cookies required to operate it.",
    ])),
    ("quality", page("Quality", "Quality is built into every process.", &[
        "Our quality management system covers development, manufacturing and distribution.",
    ])),
    ("distributors", page("Distributors", "Partnering with distributors worldwide.", &[
        "Contact our commercial team to discuss distribution partnerships.",
    ])),
    ("investor-relations", page("Investor Relations", "Transparent communication with shareholders.", &[
        "Quarterly results and investor presentations are published here.",
    ])),
    ("reports", page("Reports", "Annual and quarterly reports.", &[
        "Download our latest annual report and financial statements.",
    ])),
    ("filings", page("Filings", "Regulatory and exchange filings.", &[
        "All statutory filings are listed in chronological order.",
    ])),
    ("investor-news", page("Investor News", "Announcements for investors.", &[
        "Corporate announcements and results releases.",
    ])),
    ("governance", page("Corporate Governance", "Accountable leadership.", &[
        "Our board committees oversee audit, risk, remuneration and nominations.",
    ])),
    ("hcp-portal", page("HCP Portal", "Resources for healthcare professionals.", &[
        "Access prescribing information, monographs and sample requests.",
    ])),
    ("monographs", page("Product Monographs", "Prescribing information.", &[
        "Monographs are available for every product in our portfolio.",
    ])),
    ("patient-info", page("Patient Information", "Understanding your medicine.", &[
        "Always read the patient information leaflet supplied with your medicine.",
    ])),
    ("safety-info", page("Safety Information", "Using our medicines safely.", &[
        "Report suspected side effects through our adverse event form.",
    ])),
    ("regulatory", page("Regulatory Affairs", "Compliance in every market.", &[
        "Our regulatory team maintains marketing authorisations across our markets.",
    ])),
    ("sds", page("Safety Data Sheets", "Material safety documentation.", &[
        "Safety data sheets are available on request for all marketed products.",
    ])),
    ("mission-values", page("Mission & Values", "Why we do what we do.", &[
        "Integrity, quality and patient focus guide every decision we make.",
    ])),
    ("board", page("Board of Directors", "Oversight and strategy.", &[
        "The board sets strategy and oversees management on behalf of shareholders.",
    ])),
    ("join-our-team", page("Join Our Team", "Open positions.", &[
        "Send your CV through the contact page and our recruitment team will be in touch.",
    ])),
    ("life-at-edif", page("Life at EDIF", "People first.", &[
        "We invest in training, wellbeing and career development.",
    ])),
    ("global-presence", page("Global Presence", "Serving patients in many markets.", &[
        "Our products are available through partners across Africa, Asia and Europe.",
    ])),
    ("csr", page("Corporate Social Responsibility", "Healthier communities.", &[
        "We support health education programmes and access-to-medicine initiatives.",
    ])),
];

pub fn static_page(slug: &str) -> Option<StaticPage> {
    STATIC_PAGES
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, page)| *page)
}

pub fn render_static(slug: &str, page: StaticPage) -> Markup {
    layout(
        page.title,
        &format!("/{slug}"),
        Some("static-page"),
        html! {
            section { div.container {
                h1 { (page.title) }
                p.muted { (page.lead) }
                @for paragraph in page.body {
                    p { (paragraph) }
                }
            } }
        },
    )
}
