//! Command implementations.

use anyhow::Result;
use menu_common::{ExplainRequest, SearchRequest};
use owo_colors::OwoColorize;

use crate::client::MenuClient;

pub async fn explain(
    client: &MenuClient,
    dish: String,
    language: String,
    restaurant_id: Option<String>,
    restaurant_name: Option<String>,
) -> Result<()> {
    let req = ExplainRequest {
        dish_name: dish.clone(),
        language,
        restaurant_id,
        restaurant_name,
    };
    let (response, meta) = client.explain(&req).await?;

    println!("{}", dish.bold());
    println!("  {}", response.explanation);
    if !response.tags.is_empty() {
        println!("  {} {}", "tags:".dimmed(), response.tags.join(", "));
    }
    if !response.allergens.is_empty() {
        println!(
            "  {} {}",
            "allergens:".yellow(),
            response.allergens.join(", ")
        );
    }
    println!("  {} {}", "cuisine:".dimmed(), response.cuisine);

    if let Some(source) = meta.source {
        let detail = match meta.match_score {
            Some(score) => format!("{source} (match {score})"),
            None => source,
        };
        let timing = meta
            .processing_ms
            .map(|ms| format!(", {ms} ms"))
            .unwrap_or_default();
        println!("  {} {detail}{timing}", "source:".dimmed());
    }

    Ok(())
}

pub async fn search(client: &MenuClient, query: String, language: String) -> Result<()> {
    let response = client.search(&SearchRequest { query, language }).await?;

    if response.candidates.is_empty() {
        println!("{}", "No matches in the corpus.".dimmed());
        return Ok(());
    }

    for candidate in response.candidates {
        println!(
            "{} {} ({})",
            format!("{:.2}", candidate.score).green(),
            candidate.name.bold(),
            candidate.cuisine
        );
        println!("    {}", candidate.explanation.dimmed());
    }

    Ok(())
}

pub async fn health(client: &MenuClient) -> Result<()> {
    let health = client.health().await?;

    println!("{} menud v{}", "●".green(), health.version);
    println!("  status:  {}", health.status);
    println!("  uptime:  {}s", health.uptime_seconds);
    println!("  corpus:  {} entries", health.corpus_entries);

    Ok(())
}
