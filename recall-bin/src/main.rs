use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use recall_core::{
    api::RecallApi,
    config::Config,
    deck::{Deck, DeckStatus},
    normalizer::normalize_content,
    render::{render_deck, render_slide},
    service::{PresentationService, ReplayService},
    session::Session,
    slide::Slide,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "RecallAI presentation client", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a deck from a prompt, printing slides as they arrive
    Generate {
        #[arg(short, long, help = "Prompt for the deck")]
        message: String,
        #[arg(long, help = "Repository to ground the deck on")]
        repo: Option<String>,
        #[arg(long, help = "Saved presentation that receives reorders")]
        presentation: Option<String>,
        /// Move a slide after generation, by 1-based position (e.g. 3:1)
        #[arg(long = "move", value_name = "FROM:TO")]
        moves: Vec<String>,
        /// Replay a captured response body instead of calling the service
        #[arg(long, value_name = "FILE")]
        replay: Option<PathBuf>,
    },
    /// Replace the content of one slide
    EditSlide {
        #[arg(long)]
        id: String,
        #[arg(long)]
        content: String,
    },
    /// List saved presentations
    List,
    /// Print a saved presentation
    Show {
        #[arg(long)]
        id: String,
    },
    /// Delete a saved presentation
    Delete {
        #[arg(long)]
        id: String,
    },
}

fn parse_move(raw: &str) -> anyhow::Result<(usize, usize)> {
    let (from, to) = raw
        .split_once(':')
        .with_context(|| format!("move `{raw}` is not FROM:TO"))?;
    let from: usize = from.trim().parse().with_context(|| format!("bad position in `{raw}`"))?;
    let to: usize = to.trim().parse().with_context(|| format!("bad position in `{raw}`"))?;
    if from == 0 || to == 0 {
        bail!("positions start at 1 in `{raw}`");
    }
    Ok((from, to))
}

/// Signed step count for moving 1-based `from` to `to` in a deck of `len` slides.
fn move_steps(len: usize, from: usize, to: usize) -> anyhow::Result<isize> {
    for pos in [from, to] {
        if pos > len {
            bail!("no slide at position {pos}");
        }
    }
    Ok(to as isize - from as isize)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recall=info,recall_core=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    let api = RecallApi::from_config(&cfg)?;

    match cli.command {
        Commands::Generate { message, repo, presentation, moves, replay } => {
            let moves = moves.iter().map(|m| parse_move(m)).collect::<anyhow::Result<Vec<_>>>()?;
            let service: Arc<dyn PresentationService> = match replay {
                Some(path) => {
                    let body = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Arc::new(ReplayService::new(body, cfg.stream.data_prefix.clone()))
                }
                None => Arc::new(api),
            };
            let mut session = Session::new(service, &cfg.reorder, presentation.as_deref());
            session.on_insert(|pos, slide| {
                println!("--- {pos} [{}] {}", slide.variant(), slide.id());
                print!("{}", render_slide(slide));
                io::stdout().flush().ok();
            });

            let report = session.submit(&message, repo.as_deref()).await?;
            eprintln!(
                "[{}: {} inserted, {} duplicate, {} malformed]",
                report.status.as_str(),
                report.inserted,
                report.duplicates,
                report.malformed
            );
            if let Some(notice) = session.notice() {
                eprintln!("[notice: {}]", notice.message);
            }

            if !moves.is_empty() {
                for (from, to) in moves {
                    let order = session.deck().current_order();
                    let steps = move_steps(order.len(), from, to)?;
                    let id = order[from - 1].id().to_string();
                    session.move_slide(&id, steps).await?;
                }
                println!("=== final order");
                print!("{}", render_deck(session.deck()));
            }
        }
        Commands::EditSlide { id, content } => {
            api.update_slide(&id, &normalize_content(&content)).await?;
            println!("slide {id} updated");
        }
        Commands::List => {
            for p in api.list_presentations().await? {
                println!(
                    "{}\t{}\t{} slides\t{}",
                    p.id,
                    p.title.as_deref().unwrap_or("(untitled)"),
                    p.slides.len(),
                    p.created_at.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Show { id } => {
            let p = api.get_presentation(&id).await?;
            println!("# {}", p.title.as_deref().unwrap_or("(untitled)"));
            let mut deck = Deck::new();
            for raw in p.slides {
                match Slide::try_from(raw) {
                    Ok(slide) => {
                        deck.append(slide);
                    }
                    Err(err) => warn!(%err, "skipping stored slide"),
                }
            }
            deck.set_status(if deck.is_empty() { DeckStatus::NothingGenerated } else { DeckStatus::Complete });
            print!("{}", render_deck(&deck));
        }
        Commands::Delete { id } => {
            api.delete_presentation(&id).await?;
            println!("deleted {id}");
        }
    }

    Ok(())
}
