//! `collapse` and `expand`.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use agentrix_core::Preferences;

/// Collapse or expand `org` in the default preferences file.
pub fn run(org: &str, collapsed: bool) -> anyhow::Result<()> {
    let path = Preferences::default_path().context("no user config directory")?;
    let changed = set_collapsed(&path, org, collapsed)?;
    let verb = if collapsed { "collapsed" } else { "expanded" };
    if changed {
        println!("{org}: {verb}");
    } else {
        println!("{org}: already {verb}");
    }
    Ok(())
}

/// Update the preferences at `path`. Returns whether anything changed.
pub fn set_collapsed(path: &Path, org: &str, collapsed: bool) -> anyhow::Result<bool> {
    let mut prefs = Preferences::load(path)
        .with_context(|| format!("reading preferences {}", path.display()))?;
    if !prefs.set_collapsed(org, collapsed) {
        return Ok(false);
    }
    prefs
        .save(path)
        .with_context(|| format!("writing preferences {}", path.display()))?;
    info!(org, collapsed, "Preferences updated");
    Ok(true)
}
