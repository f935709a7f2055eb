//! Prompt text for the engine's LLM calls.

use deepbrief_core::SearchHit;

use crate::state::ResearchState;

pub const QUERY_WRITER_SYSTEM: &str = "\
You write one highly targeted web search query for a research topic. \
AVOID generic shapes like 'Tell me more about X' or 'What is X'. \
Use specific terminology, include recency qualifiers (current year, 'latest') \
where they help, and apply domain-aware strategies: version numbers and \
frameworks for technology topics, methodology and peer-reviewed terms for \
science, market data terms for business, clinical-evidence terms for health. \
Return the query and a one-sentence rationale.";

pub const ANTI_REPETITION_SUFFIX: &str = "\
\n\nYour previous proposal duplicated an earlier query. Generate a clearly \
different query exploring an aspect not covered by any previous search.";

pub const NO_VALID_SOURCES_SUFFIX: &str = "\
\n\nThe previous query found no sources meeting the relevance bar. Refine it: \
narrow the scope, add authoritative or scholarly qualifiers, or reframe the \
terminology. Do not repeat any previous query.";

pub const VALIDATION_SYSTEM: &str = "\
You are a research quality assessor. Score each candidate source for topical \
relevance to the research topic on a 0.0-1.0 scale: \
0.0-0.3 completely irrelevant (dictionaries, unrelated topics, spam); \
0.4-0.6 somewhat relevant (general news, tangential content); \
0.7-0.9 highly relevant (specific to the topic, authoritative); \
1.0 perfect match (expert source directly addressing the topic). \
For academic papers additionally report whether the work describes its \
methodology or results in substance (has_methodology) and whether it is \
recent work from the last three years (is_recent). \
Score every candidate you were given, keyed by its number.";

pub const SUMMARIZER_SYSTEM: &str = "\
You maintain a running research summary in markdown. \
When creating a new summary, highlight the information most relevant to the \
topic with a coherent flow. When extending an existing summary, integrate \
new information into the relevant paragraphs, add new paragraphs for new but \
relevant material, and skip anything off-topic; never drop facts from the \
existing summary unless the new sources directly contradict them. \
Cite sources inline with their bracketed numbers, e.g. [3], exactly as \
numbered in the input. Start directly with the summary text, no preamble or \
headings.";

pub const REFLECTION_SYSTEM: &str = "\
You are an expert research assistant auditing a summary for knowledge gaps: \
technical details, implementation specifics, or emerging trends not yet \
covered. Describe the single most important gap in a self-contained way that \
could seed a web search. Set is_sufficient true only when the summary covers \
the topic well enough that further searching would add little.";

/// User prompt for query generation, with history and gap context.
pub fn query_user_prompt(state: &ResearchState, current_date: &str) -> String {
    let mut prompt = format!(
        "Current date: {current_date}\nResearch topic: {}\n",
        state.topic
    );

    if !state.knowledge_gap.is_empty() {
        prompt.push_str(&format!(
            "\nKnowledge gap to address:\n{}\n",
            state.knowledge_gap
        ));
    }

    if !state.query_history.is_empty() {
        prompt.push_str("\nPrevious queries used in this research:\n");
        for (i, q) in state.query_history.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, q));
        }
        prompt.push_str(
            "\nGenerate a NEW, different query that explores unexplored aspects \
             or addresses the knowledge gap.\n",
        );
    }

    prompt.push_str("\nGenerate the search query.");
    prompt
}

/// User prompt for validation scoring over a numbered candidate list.
pub fn validation_user_prompt(state: &ResearchState, candidates: &[SearchHit]) -> String {
    let mut prompt = format!("Research topic: {}\n", state.topic);
    if !state.knowledge_gap.is_empty() {
        prompt.push_str(&format!("Current knowledge gap: {}\n", state.knowledge_gap));
    }
    prompt.push_str("\nCandidate sources:\n");

    for (i, hit) in candidates.iter().enumerate() {
        let preview: String = hit.content.chars().take(600).collect();
        prompt.push_str(&format!(
            "\n--- Candidate {} ---\nURL: {}\nTitle: {}\nProvider: {}\nContent: {}\n",
            i + 1,
            hit.url,
            hit.title,
            hit.provider,
            preview,
        ));
    }

    prompt.push_str("\nScore every candidate.");
    prompt
}

/// User prompt for creating or extending the running summary.
pub fn summarizer_user_prompt(state: &ResearchState, rendered_sources: &str) -> String {
    if state.running_summary.is_empty() {
        format!(
            "Topic: {}\n\nNew sources:\n{}\n\nCreate a summary of the sources \
             addressing the topic.",
            state.topic, rendered_sources,
        )
    } else {
        format!(
            "Topic: {}\n\nExisting summary:\n{}\n\nNew sources:\n{}\n\nExtend \
             the existing summary with the new sources.",
            state.topic, state.running_summary, rendered_sources,
        )
    }
}

/// User prompt for gap reflection over the running summary.
pub fn reflection_user_prompt(state: &ResearchState) -> String {
    format!(
        "Research topic: {}\n\nCurrent summary:\n===\n{}\n===\n\nIdentify the \
         knowledge gap.",
        state.topic, state.running_summary,
    )
}
