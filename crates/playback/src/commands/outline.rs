use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::config::{Config, Settings};
use crate::content::markdown;
use crate::overlay::toc::{self, TocEntry};

pub fn run(file: &Path) -> Result<()> {
    let source = std::fs::read_to_string(file)?;
    let settings = Config::load_or_default().settings();
    let entries = outline(&source, &settings)?;

    if entries.is_empty() {
        println!("{}", "No headings found.".dimmed());
        return Ok(());
    }
    for entry in &entries {
        let indent = "  ".repeat(usize::from(entry.level.saturating_sub(1)));
        let label = if entry.level == 1 {
            entry.label.bold()
        } else {
            entry.label.normal()
        };
        println!("{indent}{label} {}", format!("#{}", entry.anchor_id).dimmed());
    }
    Ok(())
}

/// The outline of a document, built from the same cleaned up content the
/// presentation shows.
fn outline(source: &str, settings: &Settings) -> Result<Vec<TocEntry>> {
    let page = markdown::parse_page(source, &settings.marker_class);
    let mut content = page
        .find_by_class(&settings.marker_class)
        .ok_or_else(|| anyhow::anyhow!("No .{} element in document", settings.marker_class))?
        .clone();
    content.remove_by_class(&settings.summary_class);
    Ok(toc::build(&mut content, &settings.outline_levels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_skips_summary_and_empty_headings() {
        let source = "\
<div class=\"aisummary\"><h2>Summary</h2></div>

# Title

##

## Background

###### Too deep
";
        let entries = outline(source, &Settings::default()).unwrap();
        let found: Vec<(u8, &str, usize)> = entries
            .iter()
            .map(|e| (e.level, e.label.as_str(), e.source_index))
            .collect();
        assert_eq!(found, vec![(1, "Title", 0), (2, "Background", 2)]);
        assert_eq!(entries[1].anchor_id, "toc-title-2");
    }
}
