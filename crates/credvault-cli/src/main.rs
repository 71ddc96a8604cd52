//! credvault - local credential vault
//!
//! Every invocation opens the vault, runs one command and exits. Commands
//! that need the key unlock with `--password`, `CREDVAULT_PASSWORD` or an
//! interactive prompt.

mod commands;

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use uuid::Uuid;

use credvault_core::Vault;

/// credvault - encrypted credential storage on your machine
#[derive(Parser, Debug)]
#[command(name = "credvault")]
#[command(version)]
#[command(about = "Local credential vault with per-password encryption")]
pub struct Args {
    /// Vault directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "CREDVAULT_DIR")]
    vault_dir: Option<PathBuf>,

    /// Master passphrase; prompted for when needed and not given
    #[arg(long, global = true, env = "CREDVAULT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new vault
    Init,

    /// Add a credential
    Add {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        username: String,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Generate the password instead of prompting for it
        #[arg(long)]
        generate: bool,
    },

    /// List credentials
    List {
        /// Only credentials with any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Only credentials matching this text
        #[arg(long)]
        query: Option<String>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Search platform, username and tags
    Search { query: String },

    /// Show one credential
    Show {
        id: Uuid,
        /// Print the decrypted password
        #[arg(long)]
        reveal: bool,
    },

    /// Copy a password to the clipboard, clearing it after 60 seconds
    Copy {
        id: Uuid,
        /// Exit right away and leave the password on the clipboard
        #[arg(long)]
        no_clear: bool,
    },

    /// Edit a credential
    Edit {
        id: Uuid,
        #[arg(long)]
        platform: Option<String>,
        #[arg(long)]
        username: Option<String>,
        /// Replace tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Remove all tags
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        url: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        new_password: bool,
    },

    /// Delete a credential
    Delete { id: Uuid },

    /// Export all credentials (passwords stay encrypted)
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace all credentials with an export file
    Import { file: PathBuf },

    /// Generate a random password
    Generate(GenerateArgs),

    /// Rate a password
    Strength {
        /// Password to rate; prompted for if omitted
        #[arg(value_name = "PASSWORD")]
        candidate: Option<String>,
    },

    /// Show or change the auto-lock timeout
    AutoLock {
        /// Minutes of inactivity before locking (0 disables)
        #[arg(long, conflicts_with = "disable")]
        minutes: Option<u32>,
        #[arg(long)]
        disable: bool,
    },

    /// Destroy the vault and every credential in it
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
pub struct GenerateArgs {
    #[arg(long, short, default_value_t = 16)]
    length: usize,
    #[arg(long)]
    no_upper: bool,
    #[arg(long)]
    no_lower: bool,
    #[arg(long)]
    no_digits: bool,
    #[arg(long)]
    no_symbols: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so exports on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let vault = match args.vault_dir.clone() {
        Some(dir) => Vault::open(dir).await,
        None => Vault::open_default().await,
    };

    let result = match vault {
        Ok(mut vault) => commands::run(&mut vault, args.password.as_deref(), args.command).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let args = Args::try_parse_from([
            "credvault", "--vault-dir", "/tmp/v", "add", "--platform", "GitHub", "--username",
            "a@b.com", "--tag", "dev", "--tag", "work",
        ])
        .unwrap();

        assert_eq!(args.vault_dir, Some(PathBuf::from("/tmp/v")));
        match args.command {
            Command::Add { platform, tags, generate, .. } => {
                assert_eq!(platform, "GitHub");
                assert_eq!(tags, vec!["dev", "work"]);
                assert!(!generate);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_bad_id() {
        assert!(Args::try_parse_from(["credvault", "show", "not-a-uuid"]).is_err());
    }

    #[test]
    fn test_auto_lock_flags_conflict() {
        assert!(
            Args::try_parse_from(["credvault", "auto-lock", "--minutes", "5", "--disable"]).is_err()
        );
    }

    #[test]
    fn test_strength_positional_is_not_master_password() {
        let args = Args::try_parse_from(["credvault", "strength", "hunter2"]).unwrap();
        assert_eq!(args.password, None);
        match args.command {
            Command::Strength { candidate } => assert_eq!(candidate.as_deref(), Some("hunter2")),
            other => panic!("unexpected command: {:?}", other),
        }

        let args =
            Args::try_parse_from(["credvault", "strength", "--password", "Tr0ub4dor&3"]).unwrap();
        assert_eq!(args.password.as_deref(), Some("Tr0ub4dor&3"));
        match args.command {
            Command::Strength { candidate } => assert_eq!(candidate, None),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_edit_tag_flags_conflict() {
        let id = Uuid::new_v4().to_string();
        assert!(Args::try_parse_from([
            "credvault", "edit", &id, "--tag", "x", "--clear-tags"
        ])
        .is_err());
    }
}
