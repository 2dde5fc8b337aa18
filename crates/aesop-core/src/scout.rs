//! Scout: expands a query, searches PubMed, fetches abstracts.
//! Never raises -- every failure mode degrades to an empty contribution.

use aesop_llm::LlmClient;
use aesop_pubmed::{Paper, PubMedClient};
use serde::Deserialize;
use tracing::warn;

const MIN_VARIANTS: usize = 1;
const MAX_VARIANTS: usize = 5;
const IDS_PER_VARIANT: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VariantsOutput {
    Array(Vec<String>),
    Wrapped { variants: Vec<String> },
}

/// Expands `query` into 3-5 sub-queries via a single LLM call, falling back
/// to `[query]` on any parse failure.
pub async fn expand_query(llm: &LlmClient, query: &str) -> Vec<String> {
    let system = "Generate 3 to 5 alternative PubMed search query variants for the user's \
        research question. Respond with a strict JSON array of strings, e.g. [\"variant one\", \"variant two\"].";

    let raw = match llm.complete(system, query).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "query expansion LLM call failed, falling back to original query");
            return vec![query.to_string()];
        }
    };

    let variants = aesop_llm::json::extract_json::<VariantsOutput>(&raw)
        .map(|v| match v {
            VariantsOutput::Array(a) => a,
            VariantsOutput::Wrapped { variants } => variants,
        })
        .unwrap_or_else(|_| {
            raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()
        });

    let cleaned: Vec<String> = variants
        .into_iter()
        .map(|v| v.trim().trim_matches(|c| c == '"' || c == '-' || c == '*').trim().to_string())
        .filter(|v| !v.is_empty())
        .take(MAX_VARIANTS)
        .collect();

    if cleaned.len() < MIN_VARIANTS {
        vec![query.to_string()]
    } else {
        cleaned
    }
}

/// Searches PubMed for every variant, merges PMIDs preserving first-seen
/// order, and fetches abstracts in batches. Never raises.
pub async fn search_and_fetch(pubmed: &PubMedClient, variants: &[String], fetch_batch_size: usize) -> Vec<Paper> {
    let mut seen = std::collections::HashSet::new();
    let mut merged_ids = Vec::new();

    for variant in variants {
        match pubmed.esearch(variant, IDS_PER_VARIANT).await {
            Ok(ids) => {
                for id in ids {
                    if seen.insert(id.clone()) {
                        merged_ids.push(id);
                    }
                }
            }
            Err(e) => warn!(error = %e, variant, "esearch failed for variant, skipping"),
        }
    }

    pubmed.fetch_abstracts(&merged_ids, fetch_batch_size).await
}
