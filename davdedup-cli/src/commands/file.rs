use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use davdedup_core::vcf;
use serde_json::json;

use crate::utils::tui::pluralize;

/// Remove byte-identical vCards from an exported address book.
pub fn run(input: &Path, output: &Path, json: bool) -> Result<()> {
    let content = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let total = vcf::split_cards(&content).len();
    let (deduped, removed) = vcf::dedupe_exact(&content);

    fs::write(output, deduped)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!("{}: {} of {} cards removed", input.display(), removed, total);

    if json {
        let value = json!({
            "input": input,
            "output": output,
            "cards": total,
            "removed": removed,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Removed {} duplicate {} out of {}, written to {}",
            removed,
            pluralize("card", removed),
            total,
            output.display()
        );
    }

    Ok(())
}
