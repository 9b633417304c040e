//! Maps loosely-typed backend payloads onto card view-models.
//!
//! The backend contract is loose: hits may arrive as Elasticsearch documents
//! (`_source`/`_score`), as wrapped records (`data`), or already flattened.
//! Everything here tolerates missing fields and never fails; unknown shapes
//! degrade to a fenced JSON dump so the user still sees the answer.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::types::{
    ApplicationAnalysis, Attachments, FosterReport, Match, MedicalAnalysis, PhotoAnalysis, Trace,
    Translation,
};

pub const UNKNOWN_APPLICANT: &str = "Unknown Applicant";
pub const NOT_SPECIFIED: &str = "Not specified";

/// Intent the backend reports for adopter searches.
pub const FIND_ADOPTERS: &str = "find_adopters";

const MAX_HIGHLIGHTS: usize = 3;

/// Source fields, in priority order, used for match highlights when the hit
/// carries no search highlight fragments.
const HIGHLIGHT_FIELDS: [&str; 4] = [
    "motivation",
    "other_pets_description",
    "family_members",
    "behavioral_notes",
];

/// Reply ready to be placed in an assistant message.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub intent: Option<String>,
    pub attachments: Attachments,
}

/// Maps a backend match score onto 0..=100.
///
/// Scores in `[0, 1]` are similarities, `(1, 10]` a ten-point scale, and
/// anything larger is taken as a percentage already.
pub fn normalize_score(raw: f64) -> u8 {
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    let scaled = if raw <= 1.0 {
        raw * 100.0
    } else if raw <= 10.0 {
        raw * 10.0
    } else {
        raw
    };
    scaled.round().clamp(0.0, 100.0) as u8
}

/// Flattens one raw search hit into a [`Match`].
pub fn hit_to_match(hit: &Value) -> Match {
    let source = hit
        .get("_source")
        .filter(|v| v.is_object())
        .or_else(|| hit.get("data").filter(|v| v.is_object()))
        .unwrap_or(hit);

    let id = str_field(hit, &["_id", "id"])
        .or_else(|| str_field(source, &["id", "application_id"]));
    let name = str_field(source, &["applicant_name", "name"])
        .unwrap_or_else(|| UNKNOWN_APPLICANT.to_string());
    let housing = str_field(source, &["housing_type", "housing"])
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let experience = str_field(source, &["experience_level", "experience"])
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let score = ["_score", "score"]
        .iter()
        .find_map(|key| number(hit.get(*key)))
        .or_else(|| number(source.get("score")))
        .or_else(|| number(source.get("match_score")))
        .map(normalize_score)
        .unwrap_or(0);

    Match {
        id,
        name,
        score,
        housing,
        experience,
        has_yard: source.get("has_yard").and_then(as_bool),
        other_pets: str_field(source, &["other_pets_description", "other_pets"]),
        motivation: str_field(source, &["motivation"]),
        highlights: highlights(hit, source),
    }
}

fn highlights(hit: &Value, source: &Value) -> Vec<String> {
    let from_search: Vec<String> = hit
        .get("highlight")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .values()
                .filter_map(|frags| match frags {
                    Value::Array(items) => items.first().and_then(non_empty_str),
                    other => non_empty_str(other),
                })
                .collect()
        })
        .unwrap_or_default();
    if !from_search.is_empty() {
        return from_search.into_iter().take(MAX_HIGHLIGHTS).collect();
    }
    if let Some(Value::Array(items)) = source.get("highlights") {
        let listed: Vec<String> = items.iter().filter_map(non_empty_str).collect();
        if !listed.is_empty() {
            return listed.into_iter().take(MAX_HIGHLIGHTS).collect();
        }
    }
    HIGHLIGHT_FIELDS
        .iter()
        .filter_map(|field| source.get(*field).and_then(non_empty_str))
        .take(MAX_HIGHLIGHTS)
        .collect()
}

/// Finds the list of raw hits inside a chat payload, if any.
fn hits_of(payload: &Value) -> Option<&Vec<Value>> {
    if let Some(Value::Array(items)) = payload.get("matches") {
        return Some(items);
    }
    match payload.get("hits") {
        Some(Value::Array(items)) => return Some(items),
        Some(hits) => {
            if let Some(Value::Array(items)) = hits.get("hits") {
                return Some(items);
            }
        }
        None => {}
    }
    match payload.get("results") {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Pulls the human-readable text out of a payload.
fn text_of(body: &Value, payload: &Value) -> Option<String> {
    if let Some(text) = body.get("text").and_then(non_empty_str) {
        return Some(text);
    }
    if let Some(text) = non_empty_str(payload) {
        return Some(text);
    }
    ["text", "response", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(non_empty_str))
        .or_else(|| {
            payload
                .get("analysis")
                .and_then(|a| a.get("summary"))
                .and_then(non_empty_str)
        })
}

fn json_fallback(value: &Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

/// Normalizes a `POST /chat/message` response body.
pub fn normalize_chat_response(body: &Value) -> AssistantReply {
    let intent = body.get("intent").and_then(non_empty_str);
    let payload = body.get("response").unwrap_or(body);

    let mut attachments = Attachments::default();
    if let Value::Object(map) = payload {
        attachments = attachments_from_map(map);
        // Raw hits are only cards for adopter searches.
        attachments.matches = None;
    }

    if intent.as_deref() == Some(FIND_ADOPTERS) {
        if let Some(hits) = hits_of(payload).filter(|h| !h.is_empty()) {
            let matches: Vec<Match> = hits.iter().map(hit_to_match).collect();
            let content = text_of(body, payload).unwrap_or_else(|| {
                format!(
                    "Found {} potential adopter{}.",
                    matches.len(),
                    if matches.len() == 1 { "" } else { "s" }
                )
            });
            attachments.matches = Some(matches);
            return AssistantReply { content, intent, attachments };
        }
    }

    let content = text_of(body, payload).unwrap_or_else(|| json_fallback(payload));
    AssistantReply { content, intent, attachments }
}

/// Normalizes a `POST /chat/analyze-application` response body.
pub fn normalize_analysis_response(body: &Value) -> AssistantReply {
    let analysis = body.get("analysis").unwrap_or(body);
    let card = application_analysis(analysis);
    let content = match &card {
        Some(card) if !card.summary.is_empty() => card.summary.clone(),
        _ => text_of(body, analysis).unwrap_or_else(|| json_fallback(analysis)),
    };
    AssistantReply {
        content,
        intent: Some("analyze_application".to_string()),
        attachments: Attachments {
            application_analysis: card,
            ..Attachments::default()
        },
    }
}

fn application_analysis(value: &Value) -> Option<ApplicationAnalysis> {
    let map = value.as_object()?;
    let mut card: ApplicationAnalysis = serde_json::from_value(value.clone()).ok()?;
    if card.summary.is_empty() {
        card.summary = ["summary", "recommendation_text", "explanation"]
            .iter()
            .find_map(|k| map.get(*k).and_then(non_empty_str))
            .unwrap_or_default();
    }
    if card.sentiment_score.is_none() {
        card.sentiment_score = value
            .get("sentiment")
            .and_then(|s| number(s.get("score")));
    }
    if card.commitment_level.is_none() {
        card.commitment_level = value
            .get("commitment_assessment")
            .and_then(|c| c.get("commitment_level"))
            .and_then(non_empty_str);
    }
    if card == ApplicationAnalysis::default() {
        return None;
    }
    Some(card)
}

/// Rebuilds card payloads from persisted message metadata.
pub fn attachments_from_metadata(metadata: &Value) -> Attachments {
    match metadata {
        Value::Object(map) => attachments_from_map(map),
        _ => Attachments::default(),
    }
}

fn attachments_from_map(map: &Map<String, Value>) -> Attachments {
    let matches = match map.get("matches") {
        Some(Value::Array(items)) if !items.is_empty() => {
            Some(items.iter().map(hit_to_match).collect())
        }
        _ => None,
    };
    Attachments {
        matches,
        photo_analysis: card::<PhotoAnalysis>(map, &["photoAnalysis", "photo_analysis"]),
        medical_analysis: card::<MedicalAnalysis>(map, &["medicalAnalysis", "medical_analysis"]),
        translation: card::<Translation>(map, &["translation"]),
        application_analysis: lookup(map, &["applicationAnalysis", "application_analysis"])
            .and_then(application_analysis),
        foster_report: card::<FosterReport>(map, &["fosterReport", "foster_report"]),
        trace: trace(map),
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| map.get(*k))
        .filter(|v| !v.is_null())
}

fn card<T: DeserializeOwned>(map: &Map<String, Value>, keys: &[&str]) -> Option<T> {
    lookup(map, keys).and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Trace arrives either as `{steps: [...]}` or as the bare step list.
fn trace(map: &Map<String, Value>) -> Option<Trace> {
    let raw = lookup(map, &["trace", "traceData", "trace_data"])?;
    let steps = match raw {
        Value::Array(_) => raw.clone(),
        other => other.get("steps")?.clone(),
    };
    serde_json::from_value(steps).ok().map(|steps| Trace { steps })
}

fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| value.get(*k).and_then(non_empty_str))
}

fn non_empty_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
