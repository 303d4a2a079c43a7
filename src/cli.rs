use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, AppConfig};
use crate::ledger::Ledger;
use crate::migrate::destroy::{self, DestroyKind};
use crate::migrate::{sanity, Migrator, Stage, Stats};
use crate::model::board::{Action, Board};
use crate::providers::github::GitHubTarget;
use crate::providers::trello::{self, TrelloSource};
use crate::providers::Routes;
use crate::query::uploads::UPLOADS_DIR;
use crate::query::{Indexes, UploadIndex};
use crate::render::preview;
use crate::resolve::SourceLinks;

/// Flags accepted before or after any subcommand.
#[derive(Debug, Default, PartialEq)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub verbose: u8,
    pub quiet: bool,
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Migrate {
        board: PathBuf,
        comments: Option<PathBuf>,
        stage: Option<Stage>,
    },
    Preview {
        board: PathBuf,
        comments: Option<PathBuf>,
        out_dir: PathBuf,
    },
    Destroy {
        kind: DestroyKind,
    },
    FetchComments {
        board: PathBuf,
        output: PathBuf,
    },
    DownloadAttachments {
        board: PathBuf,
        dir: PathBuf,
    },
    Help,
}

#[derive(Debug, PartialEq)]
pub struct Invocation {
    pub global: GlobalArgs,
    pub command: Command,
}

/// Parse everything after the program name.
///
/// Supported forms:
///   trello2gh migrate board.json [--comments comments.json] [--stage cards]
///   trello2gh preview board.json [--comments comments.json] [-o dir]
///   trello2gh destroy lists|labels|cards
///   trello2gh fetch-comments board.json [-o comments.json]
///   trello2gh download-attachments board.json [-d dir]
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut global = GlobalArgs::default();
    let mut positional: Vec<&str> = Vec::new();
    let mut comments: Option<PathBuf> = None;
    let mut stage: Option<Stage> = None;
    let mut output: Option<PathBuf> = None;
    let mut dir: Option<PathBuf> = None;
    let mut i = 0;

    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "-c" | "--config" => global.config = Some(value(args, &mut i, arg)?.into()),
            "--comments" => comments = Some(value(args, &mut i, arg)?.into()),
            "-o" | "--output" => output = Some(value(args, &mut i, arg)?.into()),
            "-d" | "--dir" => dir = Some(value(args, &mut i, arg)?.into()),
            "--stage" => {
                let name = value(args, &mut i, arg)?;
                stage = Some(Stage::parse(name).with_context(|| {
                    let names: Vec<&str> = Stage::ALL.iter().map(Stage::as_str).collect();
                    format!("Unknown stage '{name}'. Expected one of: {}", names.join(", "))
                })?);
            }
            "-q" | "--quiet" => global.quiet = true,
            "-h" | "--help" => positional.insert(0, "help"),
            _ if arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v') => {
                global.verbose = global.verbose.saturating_add((arg.len() - 1) as u8);
            }
            "--verbose" => global.verbose = global.verbose.saturating_add(1),
            _ if arg.starts_with('-') => bail!("Unknown flag {arg}"),
            _ => positional.push(arg),
        }
        i += 1;
    }

    let Some((&name, rest)) = positional.split_first() else {
        return Ok(Invocation { global, command: Command::Help });
    };

    let command = match name {
        "help" => Command::Help,
        "migrate" => Command::Migrate {
            board: board_arg(name, rest)?,
            comments,
            stage,
        },
        "preview" => Command::Preview {
            board: board_arg(name, rest)?,
            comments,
            out_dir: output.unwrap_or_else(|| PathBuf::from(".")),
        },
        "destroy" => {
            let kind = match rest {
                [kind] => DestroyKind::parse(kind),
                _ => None,
            };
            let Some(kind) = kind else {
                bail!("Usage: trello2gh destroy lists|labels|cards");
            };
            Command::Destroy { kind }
        }
        "fetch-comments" => Command::FetchComments {
            board: board_arg(name, rest)?,
            output: output.unwrap_or_else(|| PathBuf::from("comments.json")),
        },
        "download-attachments" => Command::DownloadAttachments {
            board: board_arg(name, rest)?,
            dir: dir.unwrap_or_else(|| PathBuf::from(UPLOADS_DIR)),
        },
        other => bail!("Unknown command '{other}'. Run `trello2gh help` for usage."),
    };

    Ok(Invocation { global, command })
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(v) => Ok(v.as_str()),
        None => bail!("Missing value for {flag} flag"),
    }
}

fn board_arg(command: &str, rest: &[&str]) -> Result<PathBuf> {
    match rest {
        [board] => Ok(PathBuf::from(*board)),
        [] => bail!("Usage: trello2gh {command} <board.json>"),
        _ => bail!("Unexpected arguments for {command}: {}", rest[1..].join(" ")),
    }
}

pub async fn run(invocation: Invocation) -> Result<()> {
    if invocation.command == Command::Help {
        print_help();
        return Ok(());
    }

    let config = config::load_config(invocation.global.config.as_deref())?;
    match invocation.command {
        Command::Migrate { board, comments, stage } => {
            handle_migrate(&config, &board, comments.as_deref(), stage).await
        }
        Command::Preview { board, comments, out_dir } => {
            handle_preview(&config, &board, comments.as_deref(), &out_dir)
        }
        Command::Destroy { kind } => handle_destroy(&config, kind).await,
        Command::FetchComments { board, output } => handle_fetch_comments(&config, &board, &output).await,
        Command::DownloadAttachments { board, dir } => handle_download(&config, &board, &dir).await,
        Command::Help => Ok(()),
    }
}

/// The board export, with its comments replaced by a fetched comments file
/// when one is given.
fn load_board(board: &Path, comments: Option<&Path>) -> Result<Board> {
    let board = Board::load(board)?;
    let Some(comments) = comments else {
        return Ok(board);
    };
    let contents = std::fs::read_to_string(comments)
        .with_context(|| format!("Failed to read comments from {}", comments.display()))?;
    let actions: Vec<Action> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse comments in {}", comments.display()))?;
    board.with_comment_actions(actions)
}

fn build_indexes<'a>(config: &AppConfig, board: &'a Board) -> Result<Indexes<'a>> {
    let links = SourceLinks::new(config.card_url_base())?;
    Ok(Indexes::build(
        board,
        &config.members,
        config.attachment_host()?,
        links,
    ))
}

fn github(config: &AppConfig) -> Result<(GitHubTarget, Routes)> {
    let gh = config.github()?;
    let routes = Routes::new(&gh.owner, &gh.repo, config.project_id()?);
    let api = GitHubTarget::new(config.api_url()?, config.github_token()?);
    Ok((api, routes))
}

async fn handle_migrate(
    config: &AppConfig,
    board_path: &Path,
    comments: Option<&Path>,
    stage: Option<Stage>,
) -> Result<()> {
    let (api, routes) = github(config)?;
    let board = load_board(board_path, comments)?;
    let ix = build_indexes(config, &board)?;

    Stats::collect(&board, &ix).log();
    sanity::check(&board, &ix);

    let mut ledger = Ledger::open(&config.ledger_path(), config.migration.paranoid)?;
    let stages = match stage {
        Some(stage) => vec![stage],
        None => Stage::ALL.to_vec(),
    };

    Migrator::new(&board, &ix, &api, routes, &mut ledger)
        .with_default_label_color(config.default_label_color())
        .run(&stages)
        .await?;

    println!(
        "Migrated board {} ({} ledger entries in {})",
        board.name,
        ledger.len(),
        ledger.path().display()
    );
    Ok(())
}

fn handle_preview(config: &AppConfig, board_path: &Path, comments: Option<&Path>, out_dir: &Path) -> Result<()> {
    let board = load_board(board_path, comments)?;
    let ix = build_indexes(config, &board)?;
    sanity::check(&board, &ix);

    let ledger = Ledger::load(&config.ledger_path())?;
    let (cards, comments) = preview::write_preview(&ix, &ledger, out_dir)?;
    println!("Wrote {} and {}", cards.display(), comments.display());
    Ok(())
}

async fn handle_destroy(config: &AppConfig, kind: DestroyKind) -> Result<()> {
    let (api, routes) = github(config)?;

    let confirmed = {
        let stdin = std::io::stdin();
        destroy::confirm(kind, &mut stdin.lock(), &mut std::io::stdout())?
    };
    if !confirmed {
        println!("Aborted, nothing was deleted.");
        return Ok(());
    }

    let ledger = Ledger::load(&config.ledger_path())?;
    let deleted = destroy::destroy(kind, &api, &routes, &ledger).await?;
    println!("Deleted {deleted} {kind}.");
    Ok(())
}

async fn handle_fetch_comments(config: &AppConfig, board_path: &Path, output: &Path) -> Result<()> {
    let (api_key, token) = config.trello_credentials()?;
    let board = Board::load(board_path)?;

    let actions = TrelloSource::new(api_key, token)
        .fetch_comment_actions(&board.id)
        .await?;
    let json = serde_json::to_string_pretty(&actions)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} comments to {}", actions.len(), output.display());
    Ok(())
}

async fn handle_download(config: &AppConfig, board_path: &Path, dir: &Path) -> Result<()> {
    let board = Board::load(board_path)?;
    let uploads = UploadIndex::new(&board.cards, config.attachment_host()?);

    let report = trello::download_uploads(&reqwest::Client::new(), uploads.uploads(), dir).await?;
    println!(
        "Downloaded {} attachments to {} ({} already present)",
        report.downloaded,
        dir.display(),
        report.skipped
    );
    Ok(())
}

pub fn print_help() {
    println!("trello2gh: migrate a Trello board to GitHub issues and a project board\n");
    println!("USAGE:");
    println!("  trello2gh migrate <board.json>               Run every migration stage");
    println!("  trello2gh preview <board.json>               Render issues and comments to markdown");
    println!("  trello2gh destroy lists|labels|cards         Delete migrated objects on GitHub");
    println!("  trello2gh fetch-comments <board.json>        Download every card comment");
    println!("  trello2gh download-attachments <board.json>  Download uploaded attachments");
    println!();
    println!("OPTIONS:");
    println!("  -c, --config <file>    Config file (default ~/.trello2gh/config.toml)");
    println!("  --comments <file>      Comments fetched with fetch-comments");
    println!("  --stage <name>         Run one stage: lists, labels, cards, card-bodies,");
    println!("                         comments, project-cards, card-archive");
    println!("  -o, --output <path>    Output file or directory");
    println!("  -d, --dir <dir>        Attachment directory (default {UPLOADS_DIR})");
    println!("  -v, -vv                More logging (RUST_LOG overrides)");
    println!("  -q, --quiet            Errors only");
    println!();
    println!("EXAMPLES:");
    println!("  trello2gh fetch-comments board.json -o comments.json");
    println!("  trello2gh migrate board.json --comments comments.json");
    println!("  trello2gh migrate board.json --stage card-bodies");
}
