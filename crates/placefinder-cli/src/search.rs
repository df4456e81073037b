//! Handler for the `search` subcommand.

use std::sync::Arc;

use placefinder_core::{rating_label, AppConfig, EnrichedResult, SearchRequest};
use placefinder_places::{CoordinateGeocoder, SearchOrchestrator, SearchOutcome};

/// Runs one search and prints the outcome to stdout.
///
/// # Errors
///
/// Returns an error when the request is blank, the location cannot be
/// resolved, or the provider fails. `main` turns it into a non-zero exit.
pub(crate) async fn run_search(
    config: &AppConfig,
    business: &str,
    location: &str,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let request = SearchRequest::new(business, location, limit);
    if request.business_query().is_empty() || request.location_text().is_empty() {
        anyhow::bail!("business and location must not be empty");
    }

    let orchestrator = SearchOrchestrator::from_app_config(config, Arc::new(CoordinateGeocoder))?;
    tracing::debug!(?request, settings = ?orchestrator.settings(), "running search");
    let outcome = orchestrator.run(&request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(outcome.results())?);
        return Ok(());
    }

    match &outcome {
        SearchOutcome::NoResults => println!("No businesses found."),
        SearchOutcome::Complete(results) | SearchOutcome::Partial(results) => {
            print!("{}", render_results(results));
            if outcome.is_partial() {
                println!("(partial results: the search stopped early)");
            }
        }
    }
    Ok(())
}

/// Formats results as a numbered plain-text list.
pub(crate) fn render_results(results: &[EnrichedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {} ({}, {})\n   {}\n   phone: {}  web: {}\n",
                i + 1,
                r.name,
                rating_label(r.rating),
                r.open_now,
                r.address,
                r.phone,
                r.website,
            )
        })
        .collect()
}
