//! Sample content for a fresh database.

use chrono::Utc;
use edif_core::{Collection, Fields, UserProfile, UserRole};
use serde_json::{Value, json};
use tracing::info;

use crate::content::ContentService;
use crate::error::AppResult;

/// Actor recorded on seeded documents.
pub fn system_actor() -> UserProfile {
    UserProfile {
        id: "system".to_string(),
        email: String::new(),
        name: "System".to_string(),
        role: UserRole::Admin,
        avatar: None,
        created_at: Utc::now(),
        last_login: None,
    }
}

fn sample_content() -> Vec<(Collection, Vec<Value>)> {
    vec![
        (
            Collection::Products,
            vec![
                json!({
                    "name": "Amoxicillin 500mg",
                    "description": "Broad-spectrum penicillin antibiotic capsules.",
                    "category": "Antibiotics",
                    "indication": "Bacterial infections of the respiratory and urinary tract",
                    "dosage": "500mg every 8 hours",
                    "price": 12.5,
                    "images": ["/files/products/amoxicillin.png"],
                }),
                json!({
                    "name": "Metformin 850mg",
                    "description": "First-line oral therapy for type 2 diabetes.",
                    "category": "Metabolic",
                    "indication": "Type 2 diabetes mellitus",
                    "dosage": "850mg twice daily with meals",
                    "price": 8.75,
                    "images": ["/files/products/metformin.png"],
                }),
                json!({
                    "name": "Omeprazole 20mg",
                    "description": "Proton pump inhibitor gastro-resistant capsules.",
                    "category": "Gastroenterology",
                    "indication": "Gastro-oesophageal reflux disease",
                    "dosage": "20mg once daily",
                    "price": 9.9,
                    "images": ["/files/products/omeprazole.png"],
                }),
                json!({
                    "name": "Amlodipine 5mg",
                    "description": "Calcium channel blocker tablets.",
                    "category": "Cardiovascular",
                    "indication": "Hypertension and stable angina",
                    "dosage": "5mg once daily",
                    "images": ["/files/products/amlodipine.png"],
                }),
            ],
        ),
        (
            Collection::CompanyStats,
            vec![
                json!({ "title": "Years of experience", "value": "25+" }),
                json!({ "title": "Products", "value": "150+" }),
                json!({ "title": "Countries served", "value": "30" }),
                json!({ "title": "Healthcare partners", "value": "2,000+" }),
            ],
        ),
        (
            Collection::Testimonials,
            vec![
                json!({
                    "clientName": "Dr. Amina Yusuf",
                    "company": "City General Hospital",
                    "rating": 5,
                    "review": "Consistent quality and reliable supply for our pharmacy.",
                }),
                json!({
                    "clientName": "Peter Okafor",
                    "company": "HealthPlus Pharmacies",
                    "rating": 4,
                    "review": "Responsive team and excellent product documentation.",
                }),
            ],
        ),
        (
            Collection::TeamMembers,
            vec![
                json!({
                    "name": "Grace Adeyemi",
                    "position": "Chief Executive Officer",
                    "bio": "Twenty years leading pharmaceutical manufacturing and operations.",
                    "photo": "/files/team/grace.jpg",
                    "socialLinks": { "email": "ceo@edif.example" },
                }),
                json!({
                    "name": "Daniel Mensah",
                    "position": "Head of Research & Development",
                    "bio": "Clinical pharmacologist overseeing the development pipeline.",
                    "photo": "/files/team/daniel.jpg",
                }),
            ],
        ),
        (
            Collection::Gallery,
            vec![
                json!({
                    "title": "Production line",
                    "image": "/files/gallery/production.jpg",
                    "altText": "Tablet production line",
                    "category": "Manufacturing",
                }),
                json!({
                    "title": "Quality control lab",
                    "image": "/files/gallery/qc-lab.jpg",
                    "altText": "Analysts in the quality control laboratory",
                    "caption": "Every batch is tested before release.",
                    "category": "Quality",
                }),
            ],
        ),
        (
            Collection::ContactInfo,
            vec![
                json!({ "type": "address", "label": "Head office", "value": "12 Industrial Avenue, Lagos" }),
                json!({ "type": "phone", "label": "Customer service", "value": "+234 800 000 0000" }),
                json!({ "type": "email", "label": "General enquiries", "value": "info@edif.example" }),
                json!({ "type": "hours", "label": "Office hours", "value": "Mon-Fri 8:00-17:00" }),
            ],
        ),
        (
            Collection::HomepageSections,
            vec![json!({
                "title": "Quality medicines for healthier lives",
                "subtitle": "Trusted generics and specialty pharmaceuticals for patients and professionals.",
                "ctaText": "Explore products",
                "ctaLink": "/products",
            })],
        ),
    ]
}

/// Seed every empty content collection; non-empty ones are left alone.
/// Returns the number of documents created.
pub fn seed(content: &ContentService) -> AppResult<usize> {
    let actor = system_actor();
    let mut created = 0;
    for (collection, docs) in sample_content() {
        if content.store().count(collection)? > 0 {
            info!(collection = %collection, "already has content, skipping");
            continue;
        }
        for doc in docs {
            let fields = match doc {
                Value::Object(fields) => fields,
                _ => Fields::new(),
            };
            content.create(collection, fields, &actor)?;
            created += 1;
        }
    }
    info!(created, "seed complete");
    Ok(created)
}
