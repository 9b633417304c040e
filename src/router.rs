use serde::{Deserialize, Serialize};

/// Where a chat turn is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRoute {
    /// Free-text foster report to summarise (sentiment, translation, concerns).
    FosterReport,
    /// Adopters able to handle a dog with separation anxiety.
    BehavioralAnxiety,
    /// Adopters filtered on several structured criteria at once.
    MultiCriteria,
    /// Dogs or cases similar to a given one.
    Similarity,
    /// Analysis of a pasted adoption application.
    ApplicationAnalysis,
    General,
}

impl ChatRoute {
    pub fn label(self) -> &'static str {
        match self {
            ChatRoute::FosterReport => "Foster report analysis",
            ChatRoute::BehavioralAnxiety => "Behavioral search",
            ChatRoute::MultiCriteria => "Multi-criteria search",
            ChatRoute::Similarity => "Similarity search",
            ChatRoute::ApplicationAnalysis => "Application analysis",
            ChatRoute::General => "Chat",
        }
    }
}

/// One entry of the decision list. Matches when every `all_of` keyword is
/// present and, if `any_of` is non-empty, at least one of those is too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub route: ChatRoute,
    pub all_of: Vec<String>,
    pub any_of: Vec<String>,
}

impl RouteRule {
    pub fn new(route: ChatRoute, all_of: &[&str], any_of: &[&str]) -> Self {
        Self {
            route,
            all_of: all_of.iter().map(|k| k.to_lowercase()).collect(),
            any_of: any_of.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// `input` must already be lowercased.
    fn matches(&self, input: &str) -> bool {
        self.all_of.iter().all(|k| input.contains(k.as_str()))
            && (self.any_of.is_empty() || self.any_of.iter().any(|k| input.contains(k.as_str())))
    }
}

/// Ordered keyword classifier. First matching rule wins; no match is
/// [`ChatRoute::General`].
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<RouteRule>,
}

impl Router {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, input: &str) -> ChatRoute {
        let input = input.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&input))
            .map(|rule| rule.route)
            .unwrap_or(ChatRoute::General)
    }
}

impl Default for Router {
    /// Foster reports are checked before anxiety: reports routinely mention
    /// separation anxiety but need the report pipeline.
    fn default() -> Self {
        use ChatRoute::*;
        Self::new(vec![
            RouteRule::new(
                FosterReport,
                &[],
                &["foster report", "foster update", "foster notes", "foster parent says"],
            ),
            RouteRule::new(
                BehavioralAnxiety,
                &[],
                &["separation anxiety", "anxious dog", "anxiety"],
            ),
            RouteRule::new(
                MultiCriteria,
                &[],
                &[
                    "multi-criteria",
                    "with a yard",
                    "no other pets",
                    "first-time",
                    "experienced adopter",
                    "apartment",
                ],
            ),
            RouteRule::new(
                Similarity,
                &[],
                &["similar", "like this", "find dogs like", "comparable"],
            ),
            RouteRule::new(
                ApplicationAnalysis,
                &["application"],
                &["analyze", "analyse", "review", "evaluate", "assess"],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separation_anxiety_goes_to_behavioral() {
        let router = Router::default();
        assert_eq!(
            router.classify("Find adopters who can handle a dog with separation anxiety"),
            ChatRoute::BehavioralAnxiety
        );
    }

    #[test]
    fn foster_report_wins_over_anxiety() {
        let router = Router::default();
        assert_eq!(
            router.classify("Foster report: Bella still shows separation anxiety at night"),
            ChatRoute::FosterReport
        );
    }

    #[test]
    fn matching_is_case_insensitive() {
        let router = Router::default();
        assert_eq!(router.classify("SHOW DOGS SIMILAR TO MAX"), ChatRoute::Similarity);
        assert_eq!(
            router.classify("Please ANALYZE this Application from Jordan"),
            ChatRoute::ApplicationAnalysis
        );
        assert_eq!(
            router.classify("Adopters with a yard and no other pets"),
            ChatRoute::MultiCriteria
        );
    }

    #[test]
    fn application_needs_an_action_word() {
        let router = Router::default();
        assert_eq!(router.classify("How many applications came in?"), ChatRoute::General);
    }

    #[test]
    fn unmatched_input_is_general() {
        assert_eq!(Router::default().classify("hello there"), ChatRoute::General);
        assert_eq!(Router::new(Vec::new()).classify("separation anxiety"), ChatRoute::General);
    }

    #[test]
    fn custom_order_is_respected() {
        let router = Router::new(vec![
            RouteRule::new(ChatRoute::Similarity, &[], &["dog"]),
            RouteRule::new(ChatRoute::BehavioralAnxiety, &[], &["anxiety"]),
        ]);
        assert_eq!(router.classify("dog with anxiety"), ChatRoute::Similarity);
    }
}
