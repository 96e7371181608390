//! Built-in prompt templates
//!
//! Placeholders: `{abstract}`, `{title}`, `{year}`, `{keywords}`, `{extract}`.

use super::PromptTemplate;

const PLS_DETAILED_INTRO: &str = "Compose a detailed Plain-Language Summary (PLS) of the following biomedical research paper to promote Knowledge Translation (KT) and make the findings accessible to a non-expert audience.";

const PLS_INFORMATIVE_INTRO: &str = "Create an informative and accessible Plain-Language Summary (PLS) for the following biomedical research paper, aimed at enhancing Knowledge Translation (KT) and making the content understandable to individuals without a scientific background.";

const PLS_DETAILED_EXTRACT_INTRO: &str = "Compose a detailed Plain-Language Summary (PLS) of the following key sentences extracted from a biomedical research paper to promote Knowledge Translation (KT) and make the findings accessible to a non-expert audience.";

const PLS_INFORMATIVE_EXTRACT_INTRO: &str = "Create an informative and accessible Plain-Language Summary (PLS) for the following key sentences extracted from a biomedical research paper, aimed at enhancing Knowledge Translation (KT) and making the content understandable to individuals without a scientific background.";

const LAY_SUMMARY_INTRO: &str = "Summarise the following biomedical research paper in simple language for a general audience.";

const STEP_BY_STEP: &str = "Explain the following biomedical abstract by breaking down the research process step-by-step. First, summarise the methodology\u{2014}how was the study conducted? What were the key methods used? Then, explain the main outcomes of the study and why they matter in the context of biomedical science or public health. Abstract: {abstract}";

const PERSONA_EDUCATOR: &str = "Imagine you are a science educator. Simplify this abstract for a non-expert audience: {abstract}";

const FEW_SHOT: &str = "Example Abstract: [Short abstract here] -> Example Summary: [Simple summary here]\n\
Example Abstract: [Another short abstract] -> Example Summary: [Another simple summary]\n\
New Abstract: {abstract} -> Your Summary:";

const EXTRACT_THEN_SIMPLIFY: &str = "Compose an accessible summary of the following key points, avoiding technical jargon and explaining any necessary terms in simple language. Ensure that the summary includes the following keywords: {keywords}.\n\n{extract}\n\nThe summary should be concise, engaging, and no more than 300 words.";

/// Prompt sent to a model by the `model` extraction strategy
pub const KEY_SENTENCE_EXTRACTION: &str = "Extract the key sentences from the following research abstract that highlight the main objectives, methods, and findings. Ensure that all critical technical details are included.\n\n{abstract}\n\nReturn only the most important sentences as an extract.";

const PAPER_BLOCK: &str = "**Title**: \"{title}\"\n**Year**: {year}\n\n**Abstract**:\n{abstract}\n\n";

const EXTRACT_BLOCK: &str = "**Title**: \"{title}\"\n**Year**: {year}\n\n**Key Sentences**:\n{extract}\n\n";

const LAY_SUMMARY_BODY: &str = "**Title**: \"{title}\"\n**Year**: {year}\n\n**Abstract**:\n{abstract}\n\n**Keywords**: {keywords}\n\n\
Instructions:\n\
- Start by explaining the central topic of the paper based on the title.\n\
- Provide a simple explanation of the abstract without using biomedical jargon.\n\
- Highlight the significance of the findings and their potential impact.\n\
- Clarify any difficult terms using the provided keywords.";

/// Ids accepted by `[[prompts]] builtin = "..."`
pub const BUILTIN_IDS: &[&str] = &[
    "lay-summary",
    "step-by-step",
    "pls-detailed",
    "pls-informative",
    "pls-detailed-extract",
    "pls-informative-extract",
    "persona-educator",
    "few-shot",
    "extract-then-simplify",
];

fn intro_with_block(id: &str, intro: &str, block: &str) -> PromptTemplate {
    PromptTemplate::new(id, format!("{}\n\n{}", intro, block)).with_label(intro)
}

/// Look up a built-in template by id
pub fn builtin(id: &str) -> Option<PromptTemplate> {
    let template = match id {
        "lay-summary" => intro_with_block(id, LAY_SUMMARY_INTRO, LAY_SUMMARY_BODY),
        "step-by-step" => PromptTemplate::new(id, STEP_BY_STEP),
        "pls-detailed" => intro_with_block(id, PLS_DETAILED_INTRO, PAPER_BLOCK),
        "pls-informative" => intro_with_block(id, PLS_INFORMATIVE_INTRO, PAPER_BLOCK),
        "pls-detailed-extract" => intro_with_block(id, PLS_DETAILED_EXTRACT_INTRO, EXTRACT_BLOCK),
        "pls-informative-extract" => {
            intro_with_block(id, PLS_INFORMATIVE_EXTRACT_INTRO, EXTRACT_BLOCK)
        }
        "persona-educator" => PromptTemplate::new(id, PERSONA_EDUCATOR),
        "few-shot" => PromptTemplate::new(id, FEW_SHOT),
        "extract-then-simplify" => PromptTemplate::new(id, EXTRACT_THEN_SIMPLIFY),
        _ => return None,
    };
    Some(template)
}
