//! Command-line interface.
//!
//! Provides commands:
//! - `chat`: interactive request loop (default)
//! - `run`: execute an orchestration definition once
//! - `check`: validate an orchestration definition
//! - `classify`: show how a request would be classified
//! - `download`: save a ticket attachment to disk

use crate::{chat, setup};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use ticketing_common::security::{attachment_file_name, resolve_download_path};
use ticketing_common::Attachment;
use ticketing_coordinator::{build_classifier, DefinitionRunner, OrchestrationDefinition};
use tracing::info;

/// Zammad ticketing assistant
#[derive(Parser, Debug)]
#[command(name = "ticketing")]
#[command(about = "Create, search and update Zammad tickets from plain language")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an in-memory backend instead of Zammad
    #[arg(long, global = true)]
    pub offline: bool,

    /// Do not verify Zammad credentials at start-up
    #[arg(long, global = true)]
    pub skip_preflight: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Interactive request loop (default)
    Chat,
    /// Run an orchestration definition once
    Run {
        /// YAML definition file
        file: PathBuf,
    },
    /// Validate an orchestration definition without running it
    Check {
        /// YAML definition file
        file: PathBuf,
    },
    /// Classify a request without touching the backend
    Classify {
        /// Request text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download a ticket attachment
    Download {
        ticket_id: u64,
        article_id: u64,
        attachment_id: u64,

        /// Target file; defaults to the attachment's name. Absolute paths
        /// are used as given
        #[arg(short, long, value_name = "PATH")]
        output: Option<String>,

        /// Directory relative output paths are resolved against
        #[arg(long, value_name = "DIR", default_value = ".")]
        dir: PathBuf,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> Result<()> {
    let load_config = || setup::load_config(cli.config.as_deref());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Check { file } => {
            let definition = OrchestrationDefinition::from_file(&file)?;
            println!(
                "{}: '{}' is valid ({} step(s))",
                file.display(),
                definition.name,
                definition.steps.len()
            );
            Ok(())
        }
        Commands::Chat => {
            let config = load_config()?;
            let orchestrator =
                setup::orchestrator(&config, cli.offline, cli.skip_preflight).await?;
            chat::run(&orchestrator).await
        }
        Commands::Run { file } => {
            let definition = OrchestrationDefinition::from_file(&file)?;
            let config = load_config()?;
            let orchestrator =
                setup::orchestrator(&config, cli.offline, cli.skip_preflight).await?;
            let report = DefinitionRunner::new(orchestrator).run(&definition).await;
            println!("{}", report.render());
            match report.first_error() {
                Some(err) => bail!("orchestration '{}' failed: {err}", definition.name),
                None => Ok(()),
            }
        }
        Commands::Classify { text, json } => {
            let classifier = build_classifier(&load_config()?)?;
            let classification = classifier.classify(&text.join(" ")).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                println!(
                    "{} (confidence {:.2}): {}",
                    classification.kind(),
                    classification.confidence,
                    classification.reasoning
                );
            }
            Ok(())
        }
        Commands::Download {
            ticket_id,
            article_id,
            attachment_id,
            output,
            dir,
        } => {
            let config = load_config()?;
            let backend = setup::backend(&config, cli.offline, cli.skip_preflight).await?;
            let reported = match output {
                Some(_) => None,
                None => backend
                    .ticket_articles(ticket_id)
                    .await?
                    .into_iter()
                    .filter(|a| a.id == article_id)
                    .flat_map(|a| a.attachments)
                    .find(|att| att.id == attachment_id)
                    .map(|att| att.filename),
            };
            let path =
                download_target(&dir, output.as_deref(), reported.as_deref(), attachment_id)?;
            let bytes = backend
                .download_attachment(ticket_id, article_id, attachment_id)
                .await?;
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Attachment saved");
            println!("Saved {} ({} bytes)", path.display(), bytes.len());
            Ok(())
        }
    }
}

/// Where an attachment is saved.
///
/// An explicit `output` comes from the user and is honoured as given when
/// absolute. A name reported by the backend is cut down to a bare file name
/// and always lands inside `dir`.
fn download_target(
    dir: &Path,
    output: Option<&str>,
    reported: Option<&str>,
    attachment_id: u64,
) -> ticketing_common::Result<PathBuf> {
    match output {
        Some(out) if Path::new(out.trim()).is_absolute() => Ok(PathBuf::from(out.trim())),
        Some(out) => resolve_download_path(dir, out),
        None => {
            let name = match reported {
                Some(reported) => attachment_file_name(reported, attachment_id),
                None => Attachment::default_name(attachment_id),
            };
            resolve_download_path(dir, &name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_chat() {
        let cli = Cli::try_parse_from(["ticketing"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.offline);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ticketing",
            "run",
            "flow.yaml",
            "--offline",
            "--config",
            "ticketing.toml",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                file: PathBuf::from("flow.yaml")
            })
        );
        assert!(cli.offline);
        assert_eq!(cli.config, Some(PathBuf::from("ticketing.toml")));
    }

    #[test]
    fn classify_joins_words() {
        let cli = Cli::try_parse_from(["ticketing", "classify", "close", "ticket", "#3", "--json"])
            .unwrap();
        let Some(Commands::Classify { text, json }) = cli.command else {
            panic!("expected classify");
        };
        assert_eq!(text.join(" "), "close ticket #3");
        assert!(json);
    }

    #[test]
    fn classify_requires_text() {
        assert!(Cli::try_parse_from(["ticketing", "classify"]).is_err());
    }

    #[test]
    fn download_takes_three_ids() {
        let cli = Cli::try_parse_from(["ticketing", "download", "1", "2", "3", "-o", "log.txt"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Download {
                ticket_id: 1,
                article_id: 2,
                attachment_id: 3,
                output: Some("log.txt".into()),
                dir: PathBuf::from("."),
            })
        );
    }

    #[test]
    fn backend_filename_stays_in_download_dir() {
        let dir = Path::new("/tmp/downloads");
        let path = download_target(dir, None, Some("/etc/cron.d/evil"), 9).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/downloads/evil"));

        let path = download_target(dir, None, Some("../../.bashrc"), 9).unwrap();
        assert!(path.starts_with(dir));
    }

    #[test]
    fn missing_backend_filename_uses_default_name() {
        let dir = Path::new("/tmp/downloads");
        assert_eq!(
            download_target(dir, None, None, 9).unwrap(),
            dir.join(Attachment::default_name(9))
        );
        assert_eq!(
            download_target(dir, None, Some(""), 9).unwrap(),
            PathBuf::from("/tmp/downloads/attachment-9")
        );
    }

    #[test]
    fn explicit_output_is_honoured() {
        let dir = Path::new("/tmp/downloads");
        assert_eq!(
            download_target(dir, Some("/var/tmp/x.bin"), Some("evil"), 9).unwrap(),
            PathBuf::from("/var/tmp/x.bin")
        );
        assert_eq!(
            download_target(dir, Some("logs/x.txt"), None, 9).unwrap(),
            PathBuf::from("/tmp/downloads/logs/x.txt")
        );
        assert!(download_target(dir, Some("../x.txt"), None, 9).is_err());
    }

    #[tokio::test]
    async fn check_reports_definition_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, "name: empty\nsteps: []\n").unwrap();

        let cli = Cli::try_parse_from(["ticketing", "check", path.to_str().unwrap()]).unwrap();
        let err = run(cli).await.unwrap_err();
        assert!(err.to_string().contains("steps:"), "{err}");
    }
}
