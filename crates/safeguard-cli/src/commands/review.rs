use std::path::Path;

use anyhow::{anyhow, bail, Result};
use safeguard_engine::RunTracker;
use safeguard_types::state::{HumanReview, ResultId, ReviewScope};

/// Build the review submitted on the command line.
///
/// Labels are trimmed and lowercased; an unknown scope is rejected.
fn build_review(label: &str, notes: Option<String>, scope: Option<&str>) -> Result<HumanReview> {
    let label = label.trim().to_lowercase();
    if label.is_empty() {
        bail!("Review label must not be empty");
    }
    let mut review = HumanReview::new(label, notes);
    if let Some(scope) = scope {
        let scope: ReviewScope = scope.trim().to_lowercase().parse().map_err(|e| anyhow!("{e}"))?;
        review = review.with_scope(scope);
    }
    Ok(review)
}

/// Execute the `review` command: record a human label on one result.
pub fn execute(
    db: &Path,
    result_id: i64,
    label: &str,
    notes: Option<String>,
    scope: Option<&str>,
) -> Result<()> {
    let review = build_review(label, notes, scope)?;
    let tracker = RunTracker::new(super::open_store(db)?);
    if !tracker.record_human_review(ResultId::new(result_id), &review)? {
        bail!("Result {result_id} not found");
    }
    println!("Recorded '{}' review for result {result_id}", review.label);
    Ok(())
}
