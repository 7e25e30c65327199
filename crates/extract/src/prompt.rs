use crate::schema::AnalysisKind;

/// Position of a section within a chunked document (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionInfo {
    pub number: usize,
    pub total: usize,
}

fn instruction(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::ExtractDeadlines => {
            r#"Extract every explicit or implied deadline from the document below.

INSTRUCTIONS:
1. List each deadline on its own line as: DATE - what it governs - consequence if missed (if stated)
2. Include move-in/move-out windows, form due dates, payment dates, discount cut-offs and shipping arrival windows
3. Keep dates exactly as written; add the weekday only if the document gives it
4. If no deadlines are present, answer: No deadlines found."#
        }
        AnalysisKind::ExtractRequirements => {
            r#"Extract every requirement, rule and restriction an exhibitor must follow from the document below.

INSTRUCTIONS:
1. Group requirements under short headings (Booth construction, Electrical, Safety, Shipping, Insurance, Other)
2. One requirement per bullet, stated as an obligation
3. Include limits and numbers exactly as written (heights, weights, amperage, fees)
4. If no requirements are present, answer: No requirements found."#
        }
        AnalysisKind::Summarize => {
            r#"Summarize the document below for a trade-show exhibitor.

INSTRUCTIONS:
1. Start with one sentence describing what the document is
2. Follow with the key points an exhibitor needs to act on
3. Keep it under 300 words and do not invent details"#
        }
        AnalysisKind::Custom => {
            r#"Answer the question using only the document below.

INSTRUCTIONS:
1. Quote or reference the relevant passage where possible
2. If the document does not contain the answer, say so plainly"#
        }
    }
}

fn synthesis_instruction(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::ExtractDeadlines => {
            "Combine and deduplicate the following partial extractions into one coherent list of deadlines. \
             Merge entries that refer to the same deadline and order the result chronologically."
        }
        AnalysisKind::ExtractRequirements => {
            "Combine and deduplicate the following partial extractions into one coherent list of requirements. \
             Merge entries that state the same rule and keep the grouping under short headings."
        }
        AnalysisKind::Summarize => {
            "Combine the following section summaries into one coherent summary of the whole document. \
             Remove repetition and keep it under 400 words."
        }
        AnalysisKind::Custom => {
            "Combine the following partial answers, each drawn from one section of the document, into one complete answer to the question. \
             Resolve contradictions by preferring the more specific statement."
        }
    }
}

/// Prompt for analyzing one section (or the whole document when `section` is None).
pub fn build_analysis_prompt(
    kind: AnalysisKind,
    question: Option<&str>,
    text: &str,
    section: Option<SectionInfo>,
) -> String {
    let mut prompt = String::from(instruction(kind));
    prompt.push_str("\n\n");

    if let Some(q) = question {
        prompt.push_str(&format!("QUESTION: {}\n\n", q));
    }

    if let Some(s) = section {
        prompt.push_str(&format!(
            "NOTE: This is section {} of {} of a longer document. Work only with what this section contains and do not assume it is the full document.\n\n",
            s.number, s.total
        ));
    }

    prompt.push_str("DOCUMENT:\n");
    prompt.push_str(text);
    prompt.push_str("\n\nANSWER:");
    prompt
}

/// Prompt for the final pass over concatenated partial outputs.
pub fn build_synthesis_prompt(
    kind: AnalysisKind,
    question: Option<&str>,
    prior_context: &str,
    sections: usize,
) -> String {
    let mut prompt = String::from(synthesis_instruction(kind));
    prompt.push_str("\n\n");

    if let Some(q) = question {
        prompt.push_str(&format!("QUESTION: {}\n\n", q));
    }

    prompt.push_str(&format!(
        "PARTIAL RESULTS ({} sections of one document, in order):\n{}\n\nCOMBINED RESULT:",
        sections, prior_context
    ));
    prompt
}
