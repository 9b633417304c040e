//! Canned responder used when no backend is available (`PAWBOND_DEMO_MODE`).
//!
//! Each route plays a short pipeline: intermediate stages rewrite the pending
//! reply with progress text and a growing trace, the last stage carries the
//! final answer and its cards.

use std::time::Duration;

use serde_json::json;

use crate::normalize::hit_to_match;
use crate::router::ChatRoute;
use crate::types::{
    ApplicationAnalysis, Attachments, FosterReport, Match, MedicalAnalysis, PhotoAnalysis, Trace,
    TraceStep, Translation,
};

/// Default pause between pipeline stages.
pub const STAGE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone)]
pub struct DemoStage {
    pub delay: Duration,
    pub content: String,
    pub attachments: Attachments,
}

#[derive(Debug, Clone)]
pub struct DemoResponder {
    stage_delay: Duration,
}

impl Default for DemoResponder {
    fn default() -> Self {
        Self::new(STAGE_DELAY)
    }
}

impl DemoResponder {
    pub fn new(stage_delay: Duration) -> Self {
        Self { stage_delay }
    }

    /// Pipeline for `route`. Never empty; the last stage is the answer.
    pub fn stages(&self, route: ChatRoute, text: &str) -> Vec<DemoStage> {
        let (steps, answer, cards): (Vec<(&str, u64)>, String, Attachments) = match route {
            ChatRoute::BehavioralAnxiety => (
                vec![
                    ("Detecting intent: find_adopters", 42),
                    ("Semantic search on motivation (ELSER)", 118),
                    ("Structured filters: experience, housing", 23),
                    ("Reciprocal rank fusion", 6),
                ],
                "### Adopters for a dog with separation anxiety\n\
                 I found **3 applicants** whose experience and schedule suit a dog that struggles when left alone:\n\
                 - Work-from-home or flexible schedules\n\
                 - Prior experience with anxious or rescue dogs\n\
                 - Calm households without young children"
                    .to_string(),
                Attachments {
                    matches: Some(anxiety_matches()),
                    ..Attachments::default()
                },
            ),
            ChatRoute::MultiCriteria => (
                vec![
                    ("Detecting intent: find_adopters", 39),
                    ("Extracting filters from query", 17),
                    ("Hybrid search (semantic + structured)", 131),
                    ("Reciprocal rank fusion", 5),
                ],
                "### Multi-criteria matches\n\
                 Applicants ranked on **all** requested criteria. Scores combine semantic similarity with exact filter hits."
                    .to_string(),
                Attachments {
                    matches: Some(criteria_matches()),
                    ..Attachments::default()
                },
            ),
            ChatRoute::Similarity => (
                vec![
                    ("Embedding reference profile", 64),
                    ("kNN over dog profiles", 97),
                    ("Loading medical summaries", 35),
                ],
                "### Similar rescue cases\n\
                 The closest match is **Biscuit**, a beagle mix with a comparable intake profile. \
                 Both dogs were treated for ear infections and responded well to crate training."
                    .to_string(),
                Attachments {
                    photo_analysis: Some(PhotoAnalysis {
                        dog_name: Some("Biscuit".to_string()),
                        breed_estimate: Some("Beagle mix".to_string()),
                        observations: vec![
                            "Healthy coat, slightly underweight".to_string(),
                            "Alert posture, relaxed ears".to_string(),
                        ],
                        health_flags: vec!["Mild tartar build-up".to_string()],
                        confidence: Some(0.87),
                    }),
                    medical_analysis: Some(MedicalAnalysis {
                        document_id: Some("med-0042".to_string()),
                        conditions: vec!["Otitis externa (resolved)".to_string()],
                        active_treatments: Vec::new(),
                        severity_score: Some(2),
                        adoption_readiness: Some("ready".to_string()),
                        extracted_text: None,
                    }),
                    ..Attachments::default()
                },
            ),
            ChatRoute::FosterReport => (
                vec![
                    ("Detecting language", 21),
                    ("Translating report", 143),
                    ("Sentiment and behavior extraction", 88),
                ],
                "### Foster report summary\n\
                 Overall the report is **positive**. Anxiety at night is improving with a consistent routine; \
                 the foster recommends an adopter who is home most of the day."
                    .to_string(),
                Attachments {
                    foster_report: Some(FosterReport {
                        dog_name: Some("Bella".to_string()),
                        summary: "Settling in well; night-time anxiety improving.".to_string(),
                        sentiment: Some("positive".to_string()),
                        behavioral_notes: vec![
                            "Crate trained within two weeks".to_string(),
                            "Gentle with other dogs".to_string(),
                        ],
                        concerns: vec!["Whines when left alone for more than an hour".to_string()],
                    }),
                    translation: Some(Translation {
                        original_text: text.to_string(),
                        translated_text: text.to_string(),
                        source_language: "Auto-detected".to_string(),
                        target_language: "English".to_string(),
                        confidence: Some(0.93),
                    }),
                    ..Attachments::default()
                },
            ),
            ChatRoute::ApplicationAnalysis => (
                vec![
                    ("Sentiment analysis", 57),
                    ("Entity and theme extraction", 71),
                    ("Commitment assessment", 12),
                ],
                "### Application analysis\n\
                 The applicant shows **high commitment** and realistic expectations. \
                 Recommended for a home visit."
                    .to_string(),
                Attachments {
                    application_analysis: Some(ApplicationAnalysis {
                        applicant_name: None,
                        summary: "High commitment, realistic expectations.".to_string(),
                        recommendation: Some("approve".to_string()),
                        sentiment_score: Some(0.8),
                        commitment_level: Some("High".to_string()),
                        key_themes: vec![
                            "Daily routine".to_string(),
                            "Training budget".to_string(),
                            "Family agreement".to_string(),
                        ],
                        red_flags: Vec::new(),
                    }),
                    ..Attachments::default()
                },
            ),
            ChatRoute::General => (
                Vec::new(),
                "I can help you find adopters, analyze applications and foster reports, \
                 or look up dogs similar to one in your care. Try *\"Find adopters who can handle a dog with separation anxiety\"*."
                    .to_string(),
                Attachments::default(),
            ),
        };

        let mut stages = Vec::with_capacity(steps.len() + 1);
        let mut done: Vec<TraceStep> = Vec::new();
        for (label, duration_ms) in steps {
            let mut running = done.clone();
            running.push(TraceStep {
                label: label.to_string(),
                duration_ms: 0,
                status: "running".to_string(),
            });
            stages.push(DemoStage {
                delay: self.stage_delay,
                content: format!("{label}…"),
                attachments: Attachments {
                    trace: Some(Trace { steps: running }),
                    ..Attachments::default()
                },
            });
            done.push(TraceStep {
                label: label.to_string(),
                duration_ms,
                status: "done".to_string(),
            });
        }

        let mut attachments = cards;
        if !done.is_empty() {
            attachments.trace = Some(Trace { steps: done });
        }
        stages.push(DemoStage {
            delay: self.stage_delay,
            content: answer,
            attachments,
        });
        stages
    }
}

fn anxiety_matches() -> Vec<Match> {
    [
        json!({"_id": "app-101", "_score": 0.92, "_source": {
            "applicant_name": "Sarah Chen", "housing_type": "House", "experience_level": "Experienced",
            "has_yard": true,
            "motivation": "I work from home full time and previously fostered two dogs with separation anxiety."
        }}),
        json!({"_id": "app-117", "_score": 0.86, "_source": {
            "applicant_name": "Marcus Johnson", "housing_type": "Townhouse", "experience_level": "Intermediate",
            "has_yard": false,
            "motivation": "Retired nurse, home most days, patient with rescue dogs.",
            "other_pets_description": "One calm senior cat"
        }}),
        json!({"_id": "app-123", "_score": 0.79, "_source": {
            "applicant_name": "Emily Rodriguez", "housing_type": "House", "experience_level": "Experienced",
            "has_yard": true,
            "motivation": "Trained as a vet tech; happy to follow a desensitisation plan."
        }}),
    ]
    .iter()
    .map(hit_to_match)
    .collect()
}

fn criteria_matches() -> Vec<Match> {
    [
        json!({"_id": "app-131", "_score": 8.8, "_source": {
            "applicant_name": "Priya Natarajan", "housing_type": "House", "experience_level": "Experienced",
            "has_yard": true, "family_members": "Two adults, no children"
        }}),
        json!({"_id": "app-140", "_score": 7.1, "_source": {
            "applicant_name": "Tom Becker", "housing_type": "House", "experience_level": "Intermediate",
            "has_yard": true, "motivation": "Looking for a running partner."
        }}),
    ]
    .iter()
    .map(hit_to_match)
    .collect()
}
