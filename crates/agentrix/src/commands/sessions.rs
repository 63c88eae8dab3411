//! `sessions`: list the server's sessions grouped by organisation.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::Context;

use agentrix_core::{ClientConfig, Preferences, SessionSummary, Tool, WorktreeKey};
use agentrix_session::ActivityTracker;

use crate::cli::SessionsArgs;

/// Marker for idle sessions the user has not looked at yet.
const HIGHLIGHT: &str = "*";

/// List sessions.
pub async fn run(args: SessionsArgs, config: ClientConfig) -> anyhow::Result<()> {
    let (directory, _) = super::connect(&config)?;
    let sessions = directory.list_sessions().await.context("listing sessions")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    let prefs = match Preferences::default_path() {
        Some(path) => Preferences::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable preferences: {}", e);
            Preferences::default()
        }),
        None => Preferences::default(),
    };
    let mut tracker = ActivityTracker::new(&config.activity);
    tracker.sync_known_sessions(&sessions);

    print!("{}", format_sessions(&sessions, &tracker, &prefs, args.all));
    Ok(())
}

struct Row {
    tools: Vec<Tool>,
    entries: usize,
}

/// Render the session list. `tracker` must already be synced with
/// `sessions`; collapsed organisations are summarized unless `show_all`.
pub fn format_sessions(
    sessions: &[SessionSummary],
    tracker: &ActivityTracker,
    prefs: &Preferences,
    show_all: bool,
) -> String {
    if sessions.is_empty() {
        return "No sessions\n".to_string();
    }

    let mut orgs: BTreeMap<&str, BTreeMap<WorktreeKey, Row>> = BTreeMap::new();
    for summary in sessions {
        let row = orgs
            .entry(summary.org.as_str())
            .or_default()
            .entry(summary.key())
            .or_insert(Row {
                tools: Vec::new(),
                entries: 0,
            });
        row.entries += 1;
        if let Some(tool) = summary.tool.filter(|tool| !row.tools.contains(tool)) {
            row.tools.push(tool);
        }
    }

    let mut out = String::new();
    for (org, rows) in &orgs {
        let idle = rows
            .keys()
            .filter(|key| tracker.metadata(key).is_some_and(|meta| meta.idle))
            .count();

        if prefs.is_collapsed(org) && !show_all {
            let _ = writeln!(out, "{org} (collapsed: {} worktrees, {idle} idle)", rows.len());
            continue;
        }

        let _ = writeln!(out, "{org}");
        for (key, row) in rows {
            let mut line = format!("  {}/{}", key.repo, key.branch);
            if !row.tools.is_empty() {
                let tools: Vec<String> = row.tools.iter().map(Tool::to_string).collect();
                let _ = write!(line, " [{}]", tools.join(", "));
            }
            if row.entries > 1 {
                let _ = write!(line, " x{}", row.entries);
            }
            match tracker.metadata(key) {
                Some(meta) if meta.idle => line.push_str(" idle"),
                Some(_) => line.push_str(" busy"),
                None => {}
            }
            if tracker.should_highlight(key) {
                let _ = write!(line, " {HIGHLIGHT}");
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out
}
