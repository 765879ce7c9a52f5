use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use mailbox_archiver::api::{HttpApi, MailboxApi};
use mailbox_archiver::cancel::CancelFlag;
use mailbox_archiver::config::{Config, load_config};
use mailbox_archiver::domain::folder;
use mailbox_archiver::download::CacheBuilder;
use mailbox_archiver::export::Exporter;
use mailbox_archiver::index::{self, Indexer};
use mailbox_archiver::store::{StateDir, checkpoint};

#[derive(Parser)]
#[command(name = "mailbox_archiver")]
#[command(about = "Index, download and export a remote mailbox", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or resume the index: folders, ids, metadata, conversations
    Index {
        /// Only drop every index checkpoint; the next plain run rebuilds
        #[arg(long)]
        reset: bool,
    },

    /// Download every indexed message into the cache
    Download {
        /// Only drop every cache bundle; the next plain run rebuilds
        #[arg(long)]
        reset: bool,
    },

    /// Export the cache as a browsable directory tree
    Output {
        outdir: PathBuf,

        #[arg(long)]
        max_subject_chars: Option<usize>,
    },

    /// Index, download and output in one run
    Archive {
        outdir: PathBuf,

        #[arg(long)]
        max_subject_chars: Option<usize>,
    },

    /// Fetch and print the folder tree
    Folders,

    /// Print the remote message count of every folder
    TotalEmails,

    /// Print the account record
    Me,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(hint) = e
                .downcast_ref::<mailbox_archiver::Error>()
                .and_then(mailbox_archiver::Error::remediation)
            {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref()).context("Configuration error")?;
    let state = cfg.state();
    let api = HttpApi::from_config(&cfg)?;
    let cancel = CancelFlag::install_ctrlc().map_err(|e| anyhow!("Ctrl-C handler: {e}"))?;

    match cli.cmd {
        Command::Index { reset } => {
            if reset {
                state.reset_index()?;
                log::info!("Index reset");
                return Ok(());
            }
            Indexer::new(&api, &state, &cancel).run()?;
            Ok(())
        }

        Command::Download { reset } => {
            if reset {
                state.reset_caches()?;
                log::info!("Caches reset");
                return Ok(());
            }
            let report = CacheBuilder::new(&api, &state, &cancel).run()?;
            println!(
                "Downloaded {} messages across {} folders",
                report.messages, report.folders
            );
            Ok(())
        }

        Command::Output {
            outdir,
            max_subject_chars,
        } => export(&api, &state, &cancel, &cfg, &outdir, max_subject_chars),

        Command::Archive {
            outdir,
            max_subject_chars,
        } => {
            Indexer::new(&api, &state, &cancel).run()?;
            CacheBuilder::new(&api, &state, &cancel).run()?;
            export(&api, &state, &cancel, &cfg, &outdir, max_subject_chars)
        }

        Command::Folders => {
            let raw = api.get_folder_tree()?;
            let path = state.debug_dir().join("folders.json");
            std::fs::create_dir_all(state.debug_dir())?;
            checkpoint::write_json(&path, &raw)?;
            let forest = folder::parse_forest(raw)?;
            for (ancestors, node) in folder::preorder(&forest) {
                println!("{}", folder::display_path(&ancestors, node, " -> "));
            }
            println!("Saved to {}", path.display());
            Ok(())
        }

        Command::TotalEmails => {
            let totals = index::folder_totals(&api)?;
            let width = totals
                .iter()
                .map(|(name, _)| name.chars().count())
                .max()
                .unwrap_or(0)
                .max("Total".len());
            let mut sum = 0u64;
            for (name, count) in &totals {
                println!("{name:<width$}  {count:>8}");
                sum += count;
            }
            println!("{}", "-".repeat(width + 10));
            println!("{:<width$}  {sum:>8}", "Total");
            Ok(())
        }

        Command::Me => {
            let me = api.get_me()?;
            println!("{}", serde_json::to_string_pretty(&me)?);
            Ok(())
        }
    }
}

fn export(
    api: &dyn MailboxApi,
    state: &StateDir,
    cancel: &CancelFlag,
    cfg: &Config,
    outdir: &std::path::Path,
    max_subject_chars: Option<usize>,
) -> Result<()> {
    let limit = max_subject_chars.unwrap_or_else(|| cfg.max_subject_chars());
    let report = Exporter::new(api, state, cancel, limit).run(outdir)?;
    println!(
        "Exported {} conversations ({} messages) to {}",
        report.conversations,
        report.messages,
        outdir.display()
    );
    Ok(())
}
