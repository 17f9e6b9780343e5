//! Prompt variants fed to the engine.
//!
//! Two embedded templates: the initializer runs exactly once on a fresh
//! project, the coding variant on every later iteration. Content is opaque to
//! the orchestrator; only the selection matters.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

const INITIALIZER_TEMPLATE: &str = include_str!("prompts/initializer.md");
const CODING_TEMPLATE: &str = include_str!("prompts/coding.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// First-run prompt: set up tracking, then start implementing.
    Initializer,
    /// Continuation prompt: resume from tracker state.
    Coding,
}

/// Render the prompt for one iteration.
pub fn render_prompt(variant: PromptVariant, project_name: &str, spec_file: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("initializer", INITIALIZER_TEMPLATE)
        .context("initializer template")?;
    env.add_template("coding", CODING_TEMPLATE)
        .context("coding template")?;

    let name = match variant {
        PromptVariant::Initializer => "initializer",
        PromptVariant::Coding => "coding",
    };
    let template = env.get_template(name)?;
    let rendered = template.render(context! {
        project_name => project_name,
        spec_file => spec_file,
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_render_distinct_prompts() {
        let init =
            render_prompt(PromptVariant::Initializer, "demo", "app_spec.txt").expect("render");
        let coding = render_prompt(PromptVariant::Coding, "demo", "app_spec.txt").expect("render");

        assert!(init.contains("brand-new project"));
        assert!(coding.contains("continuing work"));
        assert_ne!(init, coding);
    }

    #[test]
    fn templates_substitute_context() {
        let rendered =
            render_prompt(PromptVariant::Coding, "invoice-app", "app_spec.txt").expect("render");
        assert!(rendered.contains("invoice-app"));
        assert!(rendered.contains("app_spec.txt"));
    }
}
