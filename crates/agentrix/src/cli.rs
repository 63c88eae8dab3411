//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use agentrix_core::{ReconcileMode, Tool, WorktreeKey};

/// Terminal client for agentrix worktree sessions.
#[derive(Debug, Parser)]
#[command(name = "agentrix", version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "AGENTRIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Attach this terminal to a worktree's session (Ctrl-] detaches)
    Attach(AttachArgs),
    /// Print the rendered screen of a worktree's session
    Snapshot(SnapshotArgs),
    /// List sessions known to the server
    Sessions(SessionsArgs),
    /// Collapse an organisation in session listings
    Collapse {
        /// Organisation name
        org: String,
    },
    /// Expand a collapsed organisation
    Expand {
        /// Organisation name
        org: String,
    },
}

/// Worktree selection.
#[derive(Debug, Clone, Args)]
pub struct WorktreeArgs {
    /// Organisation
    #[arg(long)]
    pub org: String,
    /// Repository
    #[arg(long)]
    pub repo: String,
    /// Branch
    #[arg(long)]
    pub branch: String,
}

impl WorktreeArgs {
    /// Worktree key for these arguments.
    pub fn key(&self) -> WorktreeKey {
        WorktreeKey::new(&self.org, &self.repo, &self.branch)
    }
}

/// Arguments of `attach`.
#[derive(Debug, Clone, Args)]
pub struct AttachArgs {
    #[command(flatten)]
    pub worktree: WorktreeArgs,
    /// Tool to launch (defaults to the last one used)
    #[arg(long)]
    pub tool: Option<Tool>,
    /// Reconciliation mode (overrides the config file)
    #[arg(long)]
    pub mode: Option<ReconcileMode>,
    /// Terminate the server-side session when detaching
    #[arg(long)]
    pub close_on_exit: bool,
}

/// Arguments of `snapshot`.
#[derive(Debug, Clone, Args)]
pub struct SnapshotArgs {
    #[command(flatten)]
    pub worktree: WorktreeArgs,
    /// Tool to launch if the session is not running
    #[arg(long)]
    pub tool: Option<Tool>,
    /// Reconciliation mode (overrides the config file)
    #[arg(long)]
    pub mode: Option<ReconcileMode>,
    /// How long to collect output before printing
    #[arg(long, default_value_t = 1500)]
    pub wait_ms: u64,
    /// Include scrollback above the visible screen
    #[arg(long)]
    pub scrollback: bool,
}

/// Arguments of `sessions`.
#[derive(Debug, Clone, Args)]
pub struct SessionsArgs {
    /// Print the raw session list as JSON
    #[arg(long)]
    pub json: bool,
    /// Show collapsed organisations expanded
    #[arg(long)]
    pub all: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach() {
        let cli = Cli::try_parse_from([
            "agentrix", "attach", "--org", "acme", "--repo", "api", "--branch", "feat/x",
            "--tool", "agent", "--mode", "gated",
        ])
        .unwrap();
        let Command::Attach(args) = cli.command else {
            panic!("expected attach");
        };
        assert_eq!(args.worktree.key(), WorktreeKey::new("acme", "api", "feat/x"));
        assert_eq!(args.tool, Some(Tool::Agent));
        assert_eq!(args.mode, Some(ReconcileMode::Gated));
        assert!(!args.close_on_exit);
    }

    #[test]
    fn test_parse_snapshot_defaults() {
        let cli = Cli::try_parse_from([
            "agentrix", "-v", "snapshot", "--org", "a", "--repo", "b", "--branch", "main",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Snapshot(args) = cli.command else {
            panic!("expected snapshot");
        };
        assert_eq!(args.wait_ms, 1500);
        assert_eq!(args.tool, None);
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["agentrix", "sessions", "--config", "/tmp/c.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
    }

    #[test]
    fn test_rejects_unknown_tool() {
        let result = Cli::try_parse_from([
            "agentrix", "attach", "--org", "a", "--repo", "b", "--branch", "c", "--tool", "vim",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_collapse() {
        let cli = Cli::try_parse_from(["agentrix", "collapse", "acme"]).unwrap();
        assert!(matches!(cli.command, Command::Collapse { org } if org == "acme"));
    }
}
