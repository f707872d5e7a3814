//! Architectural guard: keeps autonomous work away from structural changes.
//!
//! Two filters run per cycle. The static filter inspects the task goal before
//! any model is called; the veto filter inspects the supervisor plan for a
//! reserved sentinel.

/// Content filter built from the loop configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitecturalGuard {
    trigger_phrases: Vec<String>,
    veto_sentinel: String,
}

impl ArchitecturalGuard {
    pub fn new(trigger_phrases: &[String], veto_sentinel: impl Into<String>) -> Self {
        Self {
            trigger_phrases: trigger_phrases
                .iter()
                .map(|phrase| phrase.trim().to_string())
                .filter(|phrase| !phrase.is_empty())
                .collect(),
            veto_sentinel: veto_sentinel.into(),
        }
    }

    /// Return the first trigger phrase contained in `goal` (case-insensitive).
    pub fn static_trigger(&self, goal: &str) -> Option<&str> {
        let haystack = goal.to_lowercase();
        self.trigger_phrases
            .iter()
            .find(|phrase| haystack.contains(&phrase.to_lowercase()))
            .map(String::as_str)
    }

    /// True if the supervisor plan asks for architect intervention.
    pub fn plan_vetoed(&self, plan: &str) -> bool {
        plan.contains(&self.veto_sentinel)
    }

    pub fn veto_sentinel(&self) -> &str {
        &self.veto_sentinel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> ArchitecturalGuard {
        ArchitecturalGuard::new(
            &["framework".to_string(), "architecture".to_string()],
            "ARCHITECT_REQUIRED",
        )
    }

    #[test]
    fn static_trigger_matches_any_case() {
        let guard = guard();
        assert_eq!(
            guard.static_trigger("Migrate the web FrameWork to v2"),
            Some("framework")
        );
        assert_eq!(
            guard.static_trigger("Redesign the ARCHITECTURE"),
            Some("architecture")
        );
        assert_eq!(guard.static_trigger("Reverse a string"), None);
    }

    #[test]
    fn blank_phrases_are_ignored() {
        let guard = ArchitecturalGuard::new(&["  ".to_string()], "X");
        assert_eq!(guard.static_trigger("anything"), None);
    }

    #[test]
    fn plan_veto_requires_exact_sentinel() {
        let guard = guard();
        assert!(guard.plan_vetoed("This is large.\nARCHITECT_REQUIRED"));
        assert!(!guard.plan_vetoed("1. write the function\n2. print it"));
    }
}
