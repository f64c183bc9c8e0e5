//! Prompt construction for both roles.

use super::principles::PedagogicalPrinciple;
use super::types::{CurriculumContext, LearnerContext, ReviewVerdict, StructuredCritique, SuggestionSet};

/// Appended on the format-reminder retry.
pub const FORMAT_REMINDER: &str = "IMPORTANT: Your previous reply could not be used. Respond with ONLY a JSON object, no prose and no markdown outside a single ```json block.";

pub fn ego_system_prompt() -> String {
    let mut prompt = String::new();
    prompt.push_str("You are the suggestion generator of an adaptive tutor. ");
    prompt.push_str("You propose the learner's next step: what to study, practise or reflect on, and how to phrase it.\n\n");
    prompt.push_str("Write to the learner directly. Invite rather than command. Never give away answers.\n");
    prompt
}

pub fn superego_system_prompt() -> String {
    let mut prompt = String::new();
    prompt.push_str("You are the critique reviewer of an adaptive tutor. ");
    prompt.push_str("You evaluate proposed learner-facing suggestions against these pedagogical principles:\n");
    prompt.push_str(&PedagogicalPrinciple::catalogue());
    prompt.push_str("\n\nBe specific. Approve suggestions that are sound even if imperfect; reserve rejection for real violations.\n");
    prompt
}

fn suggestion_format() -> &'static str {
    "## Output Format\n```json\n{\"suggestions\": [{\"type\": \"lecture|practice|review|reflection|exploration|continue\", \"priority\": \"high|medium|low\", \"title\": \"...\", \"message\": \"...\", \"action_target\": \"optional content id\", \"reasoning\": \"why this helps\"}]}\n```\n"
}

/// Initial draft.
pub fn draft_prompt(learner: &LearnerContext, curriculum: &CurriculumContext) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Learner\n");
    prompt.push_str(&learner.render());
    prompt.push_str("\n## Curriculum\n");
    prompt.push_str(&curriculum.render());
    prompt.push_str("\nPropose one to three suggestions for the learner's next step.\n\n");
    prompt.push_str(suggestion_format());
    prompt
}

/// Revision after a rejection.
pub fn revision_prompt(
    learner: &LearnerContext,
    curriculum: &CurriculumContext,
    draft: &SuggestionSet,
    verdict: &ReviewVerdict,
) -> String {
    let mut prompt = draft_prompt(learner, curriculum);
    prompt.push_str("\n## Your Previous Draft\n");
    prompt.push_str(&draft.render());
    prompt.push_str("\n\n## Reviewer Feedback\n");
    prompt.push_str(&verdict.feedback);
    prompt.push('\n');
    if let Some(principle) = verdict.principle {
        prompt.push_str(&format!("Principle at stake: {} ({})\n", principle, principle.description()));
    }
    for refinement in &verdict.refinements {
        prompt.push_str(&format!("- {}\n", refinement));
    }
    prompt.push_str("\nRevise the suggestions to address the feedback. Keep what was working.\n");
    prompt
}

/// Final pass applying an approving reviewer's minor refinements.
pub fn incorporation_prompt(draft: &SuggestionSet, refinements: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("The reviewer approved these suggestions with minor refinements.\n\n");
    prompt.push_str("## Approved Draft\n");
    prompt.push_str(&draft.render());
    prompt.push_str("\n\n## Refinements\n");
    for refinement in refinements {
        prompt.push_str(&format!("- {}\n", refinement));
    }
    prompt.push_str("\nApply the refinements without changing anything else.\n\n");
    prompt.push_str(suggestion_format());
    prompt
}

/// Simple-mode review.
pub fn review_prompt(learner: &LearnerContext, draft: &SuggestionSet) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Learner\n");
    prompt.push_str(&learner.render());
    prompt.push_str("\n## Proposed Suggestions\n");
    prompt.push_str(&draft.render());
    prompt.push_str("\n\n## Output Format\n");
    prompt.push_str("```json\n{\"approved\": true, \"refinements\": [\"minor change\"], \"feedback\": \"what is wrong or right\", \"principle\": \"principle label, if one is violated\"}\n```\n");
    prompt.push_str("Refinements are small edits that do not require a new draft. Rejection requires feedback.\n");
    prompt
}

fn memory_section(prompt: &mut String, memory: Option<&str>) {
    if let Some(memory) = memory.filter(|m| !m.trim().is_empty()) {
        prompt.push_str("\n## What We Remember About This Learner\n");
        prompt.push_str(memory);
        prompt.push('\n');
    }
}

/// Dialectical critique of a draft.
pub fn critique_prompt(draft: &str, learner: &LearnerContext, memory: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Learner\n");
    prompt.push_str(&learner.render());
    memory_section(&mut prompt, memory);
    prompt.push_str("\n## Draft Suggestion (thesis)\n");
    prompt.push_str(draft);
    prompt.push_str("\n\nState your position on this draft. If it violates a principle, say which and how badly.\n\n");
    prompt.push_str("## Output Format\n");
    prompt.push_str("```json\n{\"disapproves\": true, \"severity\": 0.0, \"critique\": \"your antithesis\", \"principle\": \"principle label\"}\n```\n");
    prompt.push_str("severity is between 0 and 1.\n");
    prompt
}

/// The generator's answer to a critique.
pub fn ego_response_prompt(
    draft: &str,
    critique: &StructuredCritique,
    concerns: &[String],
    learner: &LearnerContext,
    memory: Option<&str>,
) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Learner\n");
    prompt.push_str(&learner.render());
    memory_section(&mut prompt, memory);
    prompt.push_str("\n## Your Current Suggestion\n");
    prompt.push_str(draft);
    prompt.push_str("\n\n## Reviewer's Critique\n");
    prompt.push_str(&critique.critique);
    if !critique.principle.is_empty() {
        prompt.push_str(&format!("\nPrinciple: {}", critique.principle));
    }
    prompt.push('\n');
    if !concerns.is_empty() {
        prompt.push_str("\n## Remaining Concerns\n");
        for concern in concerns {
            prompt.push_str(&format!("- {}\n", concern));
        }
    }
    prompt.push_str("\nAcknowledge what the critique gets right, then revise. ");
    prompt.push_str("In `transformation`, describe how your own understanding changed, or leave it empty if you only conceded.\n\n");
    prompt.push_str("## Output Format\n");
    prompt.push_str("```json\n{\"acknowledgment\": \"...\", \"revision\": \"the revised suggestion\", \"transformation\": \"...\"}\n```\n");
    prompt
}

/// The reviewer's evaluation of a revision.
pub fn revision_review_prompt(
    original: &str,
    critique: &StructuredCritique,
    acknowledgment: &str,
    revision: &str,
) -> String {
    let mut prompt = String::new();
    prompt.push_str("## Original Draft\n");
    prompt.push_str(original);
    prompt.push_str("\n\n## Your Critique\n");
    prompt.push_str(&critique.critique);
    prompt.push_str("\n\n## Generator's Acknowledgment\n");
    prompt.push_str(acknowledgment);
    prompt.push_str("\n\n## Revised Suggestion\n");
    prompt.push_str(revision);
    prompt.push_str("\n\nDecide whether the revision resolves your critique. ");
    prompt.push_str("In `transformation`, describe how your own view changed, or leave it empty.\n\n");
    prompt.push_str("## Output Format\n");
    prompt.push_str("```json\n{\"accepts\": true, \"remaining_concerns\": [\"...\"], \"transformation\": \"...\"}\n```\n");
    prompt.push_str("Rejection requires at least one remaining concern.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::types::{Suggestion, SuggestionKind};

    #[test]
    fn test_revision_prompt_carries_feedback() {
        let learner = LearnerContext::new("l-1", "New to recursion");
        let draft = SuggestionSet::new(vec![Suggestion::new(
            SuggestionKind::Lecture,
            "Recursion",
            "Watch the lecture",
        )]);
        let verdict = ReviewVerdict {
            approved: false,
            refinements: vec![],
            feedback: "Too passive".into(),
            principle: Some(PedagogicalPrinciple::ProductiveStruggle),
            source: super::super::types::VerdictSource::Model,
        };

        let prompt = revision_prompt(&learner, &CurriculumContext::new(), &draft, &verdict);
        assert!(prompt.contains("Too passive"));
        assert!(prompt.contains("productive_struggle"));
        assert!(prompt.contains("Watch the lecture"));
    }

    #[test]
    fn test_memory_section_omitted_when_blank() {
        let learner = LearnerContext::new("l-1", "");
        assert!(!critique_prompt("draft", &learner, Some("  ")).contains("Remember"));
        assert!(critique_prompt("draft", &learner, Some("Past breakthrough")).contains("Past breakthrough"));
    }

    #[test]
    fn test_superego_prompt_lists_principles() {
        assert!(superego_system_prompt().contains("learner_autonomy"));
    }
}
