use minijinja::{context, Environment};

use super::CollaboratorResult;
use crate::models::ChatMessage;
use crate::workflow::Change;

const CONSTITUTION: &str = r#"Write a project constitution in Markdown for the repository at {{ worktree_path }}.
The constitution lists the principles every future change must respect.
{% if use_claude_md %}
Read CLAUDE.md in the repository root first and stay consistent with it.
{% endif %}
Base it on the maintainer's answers:
{% for item in answers %}
## {{ item.question }}
{{ item.answer }}
{% endfor %}
Reply with the constitution only."#;

const PROPOSAL: &str = r#"You are preparing a change proposal for the repository at {{ worktree_path }}.

# Change: {{ name }}

{{ intent }}
{% if context_files %}
Relevant files:
{% for file in context_files %}- {{ file }}
{% endfor %}{% endif %}
Describe the motivation, the scope, and the risks. Do not write code."#;

const PLAN: &str = r#"Turn this approved proposal into a step-by-step implementation plan for {{ worktree_path }}.

# Change: {{ name }}

## Proposal
{{ proposal }}
{% if context_files %}
Relevant files:
{% for file in context_files %}- {{ file }}
{% endfor %}{% endif %}
List concrete steps, the files each step touches, and how to test it."#;

const IMPLEMENTATION: &str = r#"Implement the following plan in the repository at {{ worktree_path }}.

# Change: {{ name }}

## Plan
{{ plan }}

Report every file you changed and the commands you ran."#;

const CHAT: &str = r#"{% for entry in history %}{{ entry.role }}: {{ entry.content }}
{% endfor %}user: {{ message }}"#;

/// Built-in prompt templates for every AI-backed workflow.
pub struct PromptRenderer {
    env: Environment<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        // Built-in sources; a syntax error here shows up as a render error.
        for (name, source) in [
            ("constitution", CONSTITUTION),
            ("proposal", PROPOSAL),
            ("plan", PLAN),
            ("implementation", IMPLEMENTATION),
            ("chat", CHAT),
        ] {
            if let Err(e) = env.add_template(name, source) {
                tracing::error!("Invalid built-in prompt template {}: {}", name, e);
            }
        }
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> CollaboratorResult<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    pub fn constitution(
        &self,
        worktree_path: &str,
        answers: &[(&str, &str)],
        use_claude_md: bool,
    ) -> CollaboratorResult<String> {
        let answers: Vec<_> = answers
            .iter()
            .map(|(question, answer)| context! { question => question, answer => answer })
            .collect();
        self.render(
            "constitution",
            context! { worktree_path, answers, use_claude_md },
        )
    }

    pub fn proposal(&self, worktree_path: &str, change: &Change) -> CollaboratorResult<String> {
        self.render(
            "proposal",
            context! {
                worktree_path,
                name => change.name,
                intent => change.intent,
                context_files => change.context_files,
            },
        )
    }

    pub fn plan(&self, worktree_path: &str, change: &Change) -> CollaboratorResult<String> {
        self.render(
            "plan",
            context! {
                worktree_path,
                name => change.name,
                proposal => change.proposal.as_deref().unwrap_or_default(),
                context_files => change.context_files,
            },
        )
    }

    pub fn implementation(
        &self,
        worktree_path: &str,
        change: &Change,
    ) -> CollaboratorResult<String> {
        self.render(
            "implementation",
            context! {
                worktree_path,
                name => change.name,
                plan => change.plan.as_deref().unwrap_or_default(),
            },
        )
    }

    pub fn chat(&self, history: &[ChatMessage], message: &str) -> CollaboratorResult<String> {
        let history: Vec<_> = history
            .iter()
            .map(|m| {
                context! {
                    role => m.role.as_str(),
                    content => m.content,
                }
            })
            .collect();
        self.render("chat", context! { history, message })
    }
}
