use serde::{Deserialize, Serialize};

use crate::types::{Message, Trace};

/// Kind of search the UI is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// kNN over embeddings only.
    Semantic,
    /// Semantic + keyword fused with RRF on the backend.
    Hybrid,
    /// Structured filters only.
    Structured,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedSession {
    pub session_id: String,
    pub messages: Vec<Message>,
}

/// Process-wide search/session UI state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchState {
    /// At most one search type is active.
    pub search_type: Option<SearchType>,
    pub current_query: String,
    pub show_trace: bool,
    pub trace: Option<Trace>,
    pub loaded_session: Option<LoadedSession>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchAction {
    /// Replaces whatever search was active and drops its trace.
    StartSearch { search_type: SearchType, query: String },
    ClearSearch,
    SetTrace { trace: Trace },
    ToggleTrace,
    SetTraceVisible { visible: bool },
    LoadSession { session_id: String, messages: Vec<Message> },
    ClearSession,
    Reset,
}

impl SearchState {
    /// Applies `action` and returns the next state.
    pub fn reduce(mut self, action: SearchAction) -> Self {
        match action {
            SearchAction::StartSearch { search_type, query } => {
                self.search_type = Some(search_type);
                self.current_query = query.trim().to_string();
                self.trace = None;
            }
            SearchAction::ClearSearch => {
                self.search_type = None;
                self.current_query.clear();
                self.trace = None;
                self.show_trace = false;
            }
            SearchAction::SetTrace { trace } => self.trace = Some(trace),
            SearchAction::ToggleTrace => self.show_trace = !self.show_trace,
            SearchAction::SetTraceVisible { visible } => self.show_trace = visible,
            SearchAction::LoadSession { session_id, messages } => {
                self.loaded_session = Some(LoadedSession { session_id, messages });
            }
            SearchAction::ClearSession => self.loaded_session = None,
            SearchAction::Reset => return SearchState::default(),
        }
        self
    }

    /// In-place variant of [`reduce`](Self::reduce) for state held behind a lock.
    pub fn dispatch(&mut self, action: SearchAction) {
        let current = std::mem::take(self);
        *self = current.reduce(action);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceStep;

    fn trace() -> Trace {
        Trace {
            steps: vec![TraceStep {
                label: "RRF fusion".to_string(),
                duration_ms: 8,
                status: "done".to_string(),
            }],
        }
    }

    #[test]
    fn new_search_replaces_previous_one() {
        let state = SearchState::default()
            .reduce(SearchAction::StartSearch {
                search_type: SearchType::Semantic,
                query: " calm dogs ".to_string(),
            })
            .reduce(SearchAction::SetTrace { trace: trace() })
            .reduce(SearchAction::StartSearch {
                search_type: SearchType::Hybrid,
                query: "yard".to_string(),
            });
        assert_eq!(state.search_type, Some(SearchType::Hybrid));
        assert_eq!(state.current_query, "yard");
        assert!(state.trace.is_none());
    }

    #[test]
    fn trace_visibility_toggles() {
        let mut state = SearchState::default();
        state.dispatch(SearchAction::SetTrace { trace: trace() });
        state.dispatch(SearchAction::ToggleTrace);
        assert!(state.show_trace);
        state.dispatch(SearchAction::ToggleTrace);
        assert!(!state.show_trace);
        state.dispatch(SearchAction::SetTraceVisible { visible: true });
        assert!(state.show_trace);
        assert_eq!(state.trace.as_ref().map(|t| t.steps.len()), Some(1));
    }

    #[test]
    fn clear_search_keeps_loaded_session() {
        let state = SearchState::default()
            .reduce(SearchAction::LoadSession {
                session_id: "s1".to_string(),
                messages: Vec::new(),
            })
            .reduce(SearchAction::StartSearch {
                search_type: SearchType::Structured,
                query: "house".to_string(),
            })
            .reduce(SearchAction::ClearSearch);
        assert!(state.search_type.is_none());
        assert_eq!(state.loaded_session.map(|s| s.session_id).as_deref(), Some("s1"));
    }

    #[test]
    fn actions_deserialize_from_tagged_json() {
        let action: SearchAction = serde_json::from_value(serde_json::json!({
            "type": "start_search",
            "search_type": "hybrid",
            "query": "anxiety"
        }))
        .unwrap();
        let state = SearchState::default().reduce(action);
        assert_eq!(state.search_type, Some(SearchType::Hybrid));

        let state = state.reduce(SearchAction::Reset);
        assert!(state.search_type.is_none());
        assert!(state.current_query.is_empty());
    }
}
