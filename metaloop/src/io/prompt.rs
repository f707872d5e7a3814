//! Prompt rendering for the supervisor planning and review steps.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");

/// Inputs for the review prompt.
#[derive(Debug, Clone)]
pub struct ReviewInputs<'a> {
    pub goal: &'a str,
    pub coder_output: &'a str,
    pub execution_result: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        env.add_template("review", REVIEW_TEMPLATE)
            .expect("review template should be valid");
        Self { env }
    }

    /// Planning prompt: the goal, plus reviewer feedback from the last attempt when replayed.
    pub fn render_plan(&self, goal: &str, feedback: Option<&str>) -> Result<String> {
        let template = self.env.get_template("plan")?;
        let rendered = template.render(context! {
            goal => goal.trim(),
            feedback => feedback.map(str::trim).filter(|s| !s.is_empty()),
        })?;
        debug!(len = rendered.len(), "rendered plan prompt");
        Ok(rendered.trim_end().to_string())
    }

    pub fn render_review(&self, inputs: &ReviewInputs<'_>) -> Result<String> {
        let template = self.env.get_template("review")?;
        let rendered = template.render(context! {
            goal => inputs.goal,
            coder_output => inputs.coder_output,
            execution_result => inputs.execution_result,
        })?;
        debug!(len = rendered.len(), "rendered review prompt");
        Ok(rendered)
    }
}
