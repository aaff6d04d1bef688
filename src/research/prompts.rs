//! Fixed instructions and prompt templates for each pipeline stage.
//!
//! Templates use `{name}` placeholders filled by [`render`].

/// System instruction for the planner model.
pub const PLANNER_SYSTEM_INSTRUCTIONS: &str = r#"You are a senior research strategist.
Given a research question, write a detailed research plan that a team of researchers can execute.

The plan must:
- restate the objective of the research in one or two sentences,
- break the question into the distinct areas that need to be investigated,
- for each area, list the specific questions to answer and the kinds of sources to consult,
- note the time frame, regions or other scope limits implied by the question,
- describe how the findings should be brought together in the final report.

Write the plan in plain prose and bullet points. Do not answer the research question yourself."#;

/// System instruction for the decomposer model.
pub const TASK_SPLITTER_SYSTEM_INSTRUCTIONS: &str = r#"You split research plans into independent subtasks.
You receive a research plan. Return a JSON object with a single key "subtasks" holding a list of subtasks.

Each subtask has:
- "id": a short unique identifier (for example "A", "history", "drivers"),
- "title": a short descriptive title,
- "description": clear, detailed instructions for the researcher who will work on this subtask alone.

Together the subtasks must cover the whole plan. Each subtask must be researchable on its own,
without waiting for the results of another subtask. Avoid overlap between subtasks.
Return only the JSON object."#;

/// User prompt for one research worker.
///
/// Placeholders: `user_query`, `research_plan`, `subtask_id`, `subtask_title`,
/// `subtask_description`.
pub const SUBAGENT_PROMPT_TEMPLATE: &str = r#"You are a research sub-agent working on one part of a larger research project.

Overall research question:
{user_query}

Full research plan (for context only):
{research_plan}

Your subtask:
- ID: {subtask_id}
- Title: {subtask_title}
- Instructions: {subtask_description}

Research ONLY this subtask. Use the search tool to find sources and the page retrieval tools to read them.
Prefer recent, primary and authoritative sources. Do not invent facts or sources.

When you are done, answer with a markdown report containing:
1. a heading that names the subtask ({subtask_id}: {subtask_title}),
2. a narrative explanation of what you found,
3. a bullet list of key findings,
4. a "Sources" section listing the links you relied on."#;

/// User prompt for the dispatch agent.
///
/// Placeholders: `user_query`, `research_plan`, `subtasks_json`.
pub const COORDINATOR_PROMPT_TEMPLATE: &str = r#"You are the coordinator of a deep research project.

Research question:
{user_query}

Research plan:
{research_plan}

Subtasks (JSON):
{subtasks_json}

You have one tool, `initialize_subagent`, which starts a dedicated research sub-agent for a single
subtask and returns its markdown report. Call it once for each subtask you want researched, passing the
subtask's id, title and description exactly as listed above.

After the sub-agents have reported, write the final report. It must answer the research question,
combine the sub-agent reports into one coherent document with clear sections, keep their citations,
and point out gaps or contradictions between the reports. If a sub-agent failed, say which part of the
research is missing. Answer with the final report in markdown and nothing else."#;

/// Fill `{name}` placeholders from `vars` in a single pass.
///
/// Unknown placeholders and stray braces are kept as written. Substituted
/// values are never scanned again, so a value containing `{subtask_id}`
/// stays literal.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_known_placeholders() {
        let text = render("Q: {user_query} / {missing} / {", &[("user_query", "ESG")]);
        assert_eq!(text, "Q: ESG / {missing} / {");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let text = render(
            "{subtask_title} ({subtask_id})",
            &[("subtask_title", "about {subtask_id}"), ("subtask_id", "A")],
        );
        assert_eq!(text, "about {subtask_id} (A)");
    }

    #[test]
    fn test_templates_reference_all_fields() {
        for key in [
            "{user_query}",
            "{research_plan}",
            "{subtask_id}",
            "{subtask_title}",
            "{subtask_description}",
        ] {
            assert!(SUBAGENT_PROMPT_TEMPLATE.contains(key), "missing {}", key);
        }
        for key in ["{user_query}", "{research_plan}", "{subtasks_json}"] {
            assert!(COORDINATOR_PROMPT_TEMPLATE.contains(key), "missing {}", key);
        }
    }
}
