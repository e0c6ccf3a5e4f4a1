// Player roster: the list of names the dashboard resolves in one go.
//
// A plain text file, one player name per line. Blank lines and lines
// starting with `#` are ignored.

use std::path::Path;

use anyhow::{Context, Result};

/// Parse roster text into player names, in file order.
pub fn parse_roster(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read a roster file.
pub async fn load_roster(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read roster {}", path.display()))?;
    Ok(parse_roster(&text))
}
