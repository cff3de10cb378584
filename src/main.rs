use anyhow::Context;
use clap::{Parser, Subcommand};
use lorgan_chat::storage::conversations::backup_file_name;
use lorgan_chat::storage::quota::format_bytes;
use lorgan_chat::storage::settings::{load_settings, save_settings};
use lorgan_chat::{logging, ConversationStore, FileBackend, ImportMode};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "lorgan-chat")]
#[command(about = "Inspect and back up stored chat conversations")]
struct Cli {
    /// Storage directory (defaults to the configured data directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User whose conversations to operate on
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Organization scope (omit for the global scope)
    #[arg(short, long, global = true)]
    org: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List conversation ids and titles
    List,
    /// Print the scope as pretty JSON, or write it to a file
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write a timestamped export file
    Backup {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Import conversations from a JSON file
    Import {
        file: PathBuf,
        /// Keep stored conversations whose ids are not in the file
        #[arg(long)]
        merge: bool,
    },
    /// Delete one conversation
    Delete { id: String },
    /// Remove the whole scope
    Clear,
    /// List every scope key stored for the user
    Scopes,
    /// Show estimated usage against the configured quota
    Usage,
    /// Print the effective settings as JSON
    Config {
        /// Write them to the settings file as well
        #[arg(long)]
        save: bool,
    },
}

fn require_user(user: Option<&str>) -> anyhow::Result<&str> {
    user.context("--user is required")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings();
    logging::init(&settings.log_filter);

    if let Command::Config { save } = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        if save {
            save_settings(&settings).context("Failed to save settings")?;
            info!("Settings saved");
        }
        return Ok(());
    }

    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| settings.data_directory.clone());
    let backend = FileBackend::new(&data_dir)
        .with_context(|| format!("Failed to open storage at {}", data_dir.display()))?;
    let store = ConversationStore::new(backend);

    let user = require_user(cli.user.as_deref())?;
    let org = cli.org.as_deref();

    match cli.command {
        Command::List => {
            for conversation in store.load(user, org) {
                println!(
                    "{}\t{}",
                    conversation.id,
                    conversation.title().unwrap_or("(untitled)")
                );
            }
        }
        Command::Export { output } => {
            let json = store.export_scope(user, org);
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Backup { dir } => {
            let path = dir.join(backup_file_name(user, org, chrono::Utc::now()));
            fs::write(&path, store.export_scope(user, org))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        Command::Import { file, merge } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            store
                .import_scope(user, org, &text, mode)
                .context("Import failed")?;
        }
        Command::Delete { id } => {
            store.delete(user, org, &id).context("Delete failed")?;
        }
        Command::Clear => {
            store.clear(user, org).context("Clear failed")?;
        }
        Command::Scopes => {
            for key in store.list_scope_keys(user) {
                println!("{key}");
            }
        }
        Command::Usage => {
            let status = store.quota_status(user, &settings.quota);
            println!(
                "{} / {} ({:.1}%)",
                format_bytes(status.used_bytes),
                format_bytes(status.quota_bytes),
                status.percentage
            );
            if let Some(level) = status.level {
                println!("Level: {level}");
            }
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_merge_flag() {
        let cli = parse(&["lorgan-chat", "--user", "u1", "import", "chats.json", "--merge"]);
        match cli.command {
            Command::Import { file, merge } => {
                assert_eq!(file, PathBuf::from("chats.json"));
                assert!(merge);
            }
            _ => panic!("expected import"),
        }

        let cli = parse(&["lorgan-chat", "-u", "u1", "import", "chats.json"]);
        assert!(matches!(cli.command, Command::Import { merge: false, .. }));
    }

    #[test]
    fn test_scope_args_after_subcommand() {
        let cli = parse(&["lorgan-chat", "list", "--user", "u1", "--org", "acme"]);
        assert_eq!(require_user(cli.user.as_deref()).unwrap(), "u1");
        assert_eq!(cli.org.as_deref(), Some("acme"));
    }

    #[test]
    fn test_missing_user_is_rejected() {
        let cli = parse(&["lorgan-chat", "scopes"]);
        assert!(require_user(cli.user.as_deref()).is_err());
        assert!(cli.org.is_none());
    }

    #[test]
    fn test_unknown_subcommand_fails_to_parse() {
        let parsed = Cli::try_parse_from(["lorgan-chat", "--user", "u1", "rename"]);
        assert!(parsed.is_err());
    }
}
