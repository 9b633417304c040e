use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Assistant placeholder reserved when a turn begins.
    Pending,
    Complete,
    Error,
}

/// A single chat bubble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    pub intent: Option<String>,
    #[serde(default)]
    pub attachments: Attachments,
}

/// Card payloads rendered under a message. Each card is present only when
/// the backend (or the persisted metadata) supplied it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachments {
    pub matches: Option<Vec<Match>>,
    pub photo_analysis: Option<PhotoAnalysis>,
    pub medical_analysis: Option<MedicalAnalysis>,
    pub translation: Option<Translation>,
    pub application_analysis: Option<ApplicationAnalysis>,
    pub foster_report: Option<FosterReport>,
    pub trace: Option<Trace>,
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        *self == Attachments::default()
    }
}

/// Flat applicant record consumed by the match card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: Option<String>,
    pub name: String,
    /// Always in 0..=100.
    pub score: u8,
    pub housing: String,
    pub experience: String,
    pub has_yard: Option<bool>,
    pub other_pets: Option<String>,
    pub motivation: Option<String>,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoAnalysis {
    #[serde(alias = "dogName")]
    pub dog_name: Option<String>,
    #[serde(alias = "breedEstimate")]
    pub breed_estimate: Option<String>,
    #[serde(alias = "visualObservations")]
    pub observations: Vec<String>,
    #[serde(alias = "healthFlags")]
    pub health_flags: Vec<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicalAnalysis {
    #[serde(alias = "documentId")]
    pub document_id: Option<String>,
    pub conditions: Vec<String>,
    #[serde(alias = "activeTreatments")]
    pub active_treatments: Vec<String>,
    #[serde(alias = "severityScore")]
    pub severity_score: Option<u8>,
    #[serde(alias = "adoptionReadiness")]
    pub adoption_readiness: Option<String>,
    #[serde(alias = "extractedText")]
    pub extracted_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Translation {
    #[serde(alias = "originalText")]
    pub original_text: String,
    #[serde(alias = "translatedText")]
    pub translated_text: String,
    #[serde(alias = "sourceLanguage")]
    pub source_language: String,
    #[serde(alias = "targetLanguage")]
    pub target_language: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationAnalysis {
    #[serde(alias = "applicantName")]
    pub applicant_name: Option<String>,
    pub summary: String,
    pub recommendation: Option<String>,
    #[serde(alias = "sentimentScore")]
    pub sentiment_score: Option<f64>,
    #[serde(alias = "commitmentLevel")]
    pub commitment_level: Option<String>,
    #[serde(alias = "keyThemes")]
    pub key_themes: Vec<String>,
    #[serde(alias = "redFlags")]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FosterReport {
    #[serde(alias = "dogName")]
    pub dog_name: Option<String>,
    pub summary: String,
    pub sentiment: Option<String>,
    #[serde(alias = "behavioralNotes")]
    pub behavioral_notes: Vec<String>,
    pub concerns: Vec<String>,
}

/// Ordered pipeline steps shown verbatim in the trace drawer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub label: String,
    #[serde(default, alias = "durationMs", alias = "duration")]
    pub duration_ms: u64,
    #[serde(default = "default_step_status")]
    pub status: String,
}

fn default_step_status() -> String {
    "done".to_string()
}

/// Transient toast queued for the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }
}

// ─── Chat history wire types ─────────────────────────────────────────────────

/// Row of the recent-sessions sidebar. Owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSessionSummary {
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ChatSessionSummary {
    /// Sidebar label: the custom name, else the preview, else a stub.
    pub fn title(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ if !self.preview.trim().is_empty() => &self.preview,
            _ => "New chat",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: Vec<ChatSessionSummary>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: usize,
}

/// Full persisted conversation returned by `GET /chat-history/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_count: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<StoredMessage>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

// ─── Data management / analytics ─────────────────────────────────────────────

/// Record collections managed on the data-management screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Applications,
    Dogs,
    Outcomes,
    MedicalDocuments,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Applications,
        DataKind::Dogs,
        DataKind::Outcomes,
        DataKind::MedicalDocuments,
    ];

    /// Path segment of the collection endpoint.
    pub fn path(self) -> &'static str {
        match self {
            DataKind::Applications => "applications",
            DataKind::Dogs => "dogs",
            DataKind::Outcomes => "outcomes",
            DataKind::MedicalDocuments => "medical-documents",
        }
    }

    /// Medical documents are uploaded as scans, not CSV.
    pub fn supports_csv(self) -> bool {
        !matches!(self, DataKind::MedicalDocuments)
    }
}

/// Summary returned by the `*/csv/upload` endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvUploadSummary {
    pub success: bool,
    pub filename: Option<String>,
    pub total_rows: usize,
    pub indexed_count: usize,
    pub failed_count: usize,
    pub indexed_ids: Vec<String>,
    pub errors: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStats {
    pub indices: Vec<IndexStat>,
    pub total_documents: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStat {
    #[serde(alias = "index")]
    pub name: String,
    #[serde(alias = "docs_count", alias = "count")]
    pub document_count: u64,
    #[serde(alias = "size_bytes", alias = "store_size_bytes")]
    pub size_in_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeStats {
    pub total_outcomes: u64,
    pub successful_adoptions: u64,
    pub returned_adoptions: u64,
    pub success_rate: f64,
}

/// Accepts RFC 3339 as well as the naive ISO timestamps the backend writes.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
