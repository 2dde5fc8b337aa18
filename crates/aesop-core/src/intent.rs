//! Intent classifier: four ordered stages, first high-confidence stage wins.

use aesop_llm::LlmClient;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::types::Intent;

static FAST_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|thanks|thank you|ok|okay|great|cool|sounds good)\s*[!.]*\s*$").unwrap()
});

const MEDICAL: &[&str] = &[
    "cancer", "tumor", "tumour", "mutation", "gene", "drug", "treatment", "therapy", "clinical",
    "disease", "protein", "inhibitor", "trial", "patient", "diagnosis", "oncology",
    "pharmacology", "biomarker", "pathway", "efficacy", "dosage",
];
const SYSTEM: &[&str] =
    &["who are you", "what can you do", "how do you work", "your capabilities", "help me use"];
const FOLLOWUP: &[&str] = &[
    "those studies", "these papers", "that paper", "more about", "tell me more", "what about",
    "elaborate", "follow up", "dig deeper", "the first one", "the second one",
];
const UTILITY: &[&str] = &[
    "summarize", "summarise", "shorten", "bulletize", "bullet points", "simplify", "tabulate",
    "make a table", "tl;dr", "extract the conclusion",
];

fn any_hit(message: &str, terms: &[&str]) -> bool {
    let lower = message.to_lowercase();
    terms.iter().any(|t| lower.contains(t))
}

#[derive(Debug, Deserialize)]
struct LlmIntentOutput {
    intent: String,
    confidence: f64,
}

fn parse_intent_str(s: &str) -> Intent {
    match s {
        "research" => Intent::Research,
        "followup_research" => Intent::FollowupResearch,
        "utility" => Intent::Utility,
        _ => Intent::Chat,
    }
}

fn non_whitespace_token_count(message: &str) -> usize {
    message.split_whitespace().count()
}

/// Classifies `message` into one of the four intents, given whether a
/// session currently exists and whether it carries a prior synthesis.
pub async fn classify_intent(
    llm: &LlmClient,
    message: &str,
    has_session: bool,
    has_synthesis: bool,
) -> (Intent, f64) {
    if FAST_PATH.is_match(message) {
        return (Intent::Chat, 0.98);
    }

    let medical_hit = any_hit(message, MEDICAL);
    let system_hit = any_hit(message, SYSTEM);
    let followup_hit = any_hit(message, FOLLOWUP);
    let utility_hit = any_hit(message, UTILITY);

    let stage2 = if followup_hit && has_session {
        Some((Intent::FollowupResearch, 0.90))
    } else if utility_hit && has_session && has_synthesis {
        Some((Intent::Utility, 0.90))
    } else if system_hit && !medical_hit {
        Some((Intent::Chat, 0.85))
    } else if medical_hit && !followup_hit && !utility_hit {
        Some((Intent::Research, 0.85))
    } else {
        None
    };

    let (mut intent, mut confidence) = match stage2 {
        Some(result) => result,
        None => {
            let system_prompt = "Classify the user's message into exactly one of: chat, research, \
                followup_research, utility. Respond with strict JSON {\"intent\": string, \"confidence\": number}.";
            let user_prompt = format!("has_session={has_session}\nmessage: {message}");
            match llm.complete_json::<LlmIntentOutput>(system_prompt, &user_prompt).await {
                Ok(out) => (parse_intent_str(&out.intent), out.confidence.clamp(0.0, 1.0)),
                Err(_) => (Intent::Chat, 0.4),
            }
        }
    };

    // Stage 4: validation.
    if intent == Intent::FollowupResearch && !has_session {
        intent = Intent::Research;
    }
    if intent == Intent::Utility && !has_synthesis {
        intent = Intent::Chat;
    }
    if intent == Intent::Research && non_whitespace_token_count(message) < 3 && !medical_hit {
        intent = Intent::Chat;
    }

    if intent != stage2.map(|(i, _)| i).unwrap_or(intent) {
        confidence = confidence.min(0.85);
    }

    (intent, confidence)
}
