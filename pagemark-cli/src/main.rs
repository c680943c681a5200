use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use pagemark_core::{
    export_file_name, highlight_link, read_highlights, write_highlights, Config,
    DocumentPartition, ExportError, Highlight, HighlightKind, JsonTextSource, Rect, Rotation,
    SearchOutcome, Session, SessionEvent, TextSource, Viewport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "pagemark",
    version,
    about = "annotate and search the text layers of paginated documents"
)]
struct Args {
    /// Highlights file (JSON) merged into the first document on start
    #[arg(long = "highlights")]
    highlights: Option<PathBuf>,

    /// Config file; defaults to config.toml in the platform config dir
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Text-layer dumps to open; the first one becomes active
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

/// One line typed into the shell.
#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    /// Make another text layer the active document
    Open { path: PathBuf },
    /// Highlight every match of a pattern (invalid patterns match literally)
    Search {
        #[arg(short, long)]
        color: Option<String>,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Remove the highlights of the latest search
    Clear,
    /// List highlights of the active document
    List,
    /// Remove one highlight
    Remove { id: String },
    /// Remove every highlight of the active document
    Reset,
    /// Merge highlights from a JSON file
    Import { path: PathBuf },
    /// Write highlights of the active document to a JSON file
    Export { path: Option<PathBuf> },
    /// Scroll to a highlight by link, e.g. #highlight-42
    Goto { link: String },
    /// Move an area highlight to a rectangle given in display pixels
    Move {
        id: String,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        rotation: i32,
        /// Page the rectangle lands on; defaults to the highlight's page
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show known documents and their highlight counts
    Documents,
    #[command(alias = "exit")]
    Quit,
}

enum LoopAction {
    Continue,
    Quit,
}

struct Shell {
    session: Session,
    source: JsonTextSource,
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.files.is_empty() {
        return Err(anyhow!("no input files provided"));
    }

    let project_dirs = ProjectDirs::from("net", "pagemark", "pagemark")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let config = Config::load(&config_path)?;
    let _log_guard = init_logging(&project_dirs, &config)?;

    let first = &args.files[0];
    let source = JsonTextSource::open(first).with_context(|| format!("failed to open {:?}", first))?;
    let mut partition = DocumentPartition::new();
    for path in &args.files[1..] {
        partition.checkout(&document_id(path));
    }
    let session = Session::with_partition(
        document_id(first),
        partition,
        config.id_generator(),
        config.search_options(),
    );
    let mut shell = Shell {
        session,
        source,
        config,
    };

    if let Some(path) = &args.highlights {
        let incoming = read_highlights(path)?;
        let appended = shell.session.import_merge(incoming);
        println!("imported {} highlights from {}", appended, path.display());
    }
    shell.report_events();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(shell.session.active_document())?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words = split_line(&line);
        if words.is_empty() {
            continue;
        }
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(err) => {
                print!("{}", err.render());
                continue;
            }
        };
        match shell.handle(command).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Quit) => break,
            Err(err) => println!("error: {err:#}"),
        }
        shell.report_events();
    }

    shell.session.flush();
    info!("session closed");
    Ok(())
}

impl Shell {
    async fn handle(&mut self, command: ShellCommand) -> Result<LoopAction> {
        match command {
            ShellCommand::Open { path } => {
                self.source = JsonTextSource::open(&path)?;
                self.session.load_document(document_id(&path));
            }
            ShellCommand::Search { color, query } => {
                let query = query.join(" ");
                let color = color.unwrap_or_else(|| self.config.search.color.clone());
                let outcome = self.session.search(&query, &color, &self.source).await?;
                print_outcome(&query, &outcome);
            }
            ShellCommand::Clear => {
                let removed = self.session.clear_search_highlights();
                println!("cleared {removed} search highlights");
            }
            ShellCommand::List => {
                if self.session.highlights().is_empty() {
                    println!("no highlights");
                }
                for highlight in self.session.highlights() {
                    println!("{}", format_highlight(highlight));
                }
            }
            ShellCommand::Remove { id } => {
                let removed = self.session.remove(&id)?;
                println!("removed {}", format_highlight(&removed));
            }
            ShellCommand::Reset => {
                self.session.reset_all();
                println!("all highlights removed");
            }
            ShellCommand::Import { path } => {
                let incoming = read_highlights(&path)?;
                let total = incoming.len();
                let appended = self.session.import_merge(incoming);
                println!("imported {appended} of {total} highlights");
            }
            ShellCommand::Export { path } => {
                let path = path.unwrap_or_else(|| {
                    PathBuf::from(export_file_name(
                        &document_name(self.source.path()),
                        chrono::Local::now().date_naive(),
                    ))
                });
                match write_highlights(&path, &self.session.export_snapshot()) {
                    Ok(()) => println!("exported to {}", path.display()),
                    Err(err) if err.downcast_ref::<ExportError>().is_some() => {
                        println!("No highlights to export.")
                    }
                    Err(err) => return Err(err),
                }
            }
            ShellCommand::Goto { link } => {
                if self.session.follow_link(&link).is_none() {
                    println!("no highlight for {link}");
                }
            }
            ShellCommand::Move {
                id,
                left,
                top,
                width,
                height,
                scale,
                rotation,
                page,
            } => {
                let current = self
                    .session
                    .highlight(&id)
                    .ok_or_else(|| anyhow!("no highlight with id {id}"))?;
                if current.kind() != HighlightKind::Area {
                    warn!(%id, "moving the bounding box of a text highlight");
                }
                let page = page.unwrap_or(current.page_number());
                let page_text = self.source.page(page).await?;
                let rotation = Rotation::from_degrees(rotation)
                    .ok_or_else(|| anyhow!("rotation must be a multiple of 90"))?;
                let viewport = Viewport::new(page_text.width, page_text.height, scale, rotation)?;
                let display = Rect::from_ltwh(left, top, width, height, page);
                let updated =
                    self.session
                        .on_highlight_geometry_changed(&id, display, &viewport, None)?;
                println!("moved {}", format_highlight(&updated));
            }
            ShellCommand::Documents => {
                let active = self.session.active_document().to_owned();
                let partition = self.session.partition();
                let mut documents: Vec<_> = partition.documents().collect();
                documents.sort_unstable();
                for document in documents {
                    let count = partition.get(document).map_or(0, |list| list.len());
                    let marker = if document == active { "*" } else { " " };
                    println!("{marker} {document} ({count} highlights)");
                }
            }
            ShellCommand::Quit => return Ok(LoopAction::Quit),
        }
        Ok(LoopAction::Continue)
    }

    fn report_events(&self) {
        for event in self.session.drain_events() {
            match event {
                SessionEvent::ScrollRequested(highlight) => {
                    println!(
                        "-> page {} {}",
                        highlight.page_number(),
                        highlight_link(&highlight.id)
                    );
                }
                SessionEvent::DocumentLoaded(document) => {
                    println!("active document: {document}");
                }
                SessionEvent::SearchFinished { failed_pages, .. } if !failed_pages.is_empty() => {
                    println!("skipped unreadable pages: {failed_pages:?}");
                }
                _ => {}
            }
        }
    }
}

fn prompt(document: &str) -> Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{}> ", document_name(Path::new(document)))?;
    stdout.flush()?;
    Ok(())
}

fn print_outcome(query: &str, outcome: &SearchOutcome) {
    match outcome {
        SearchOutcome::Matches {
            count,
            literal_fallback,
            ..
        } => {
            let mode = if *literal_fallback { " (literal)" } else { "" };
            println!("{count} matches for {query}{mode}");
        }
        SearchOutcome::NoMatches { .. } => println!("No matches found for: {query}"),
    }
}

fn format_highlight(highlight: &Highlight) -> String {
    let rect = &highlight.position.bounding_rect;
    let label = match highlight.kind() {
        HighlightKind::Area => "[area]".to_owned(),
        HighlightKind::Text => highlight
            .content
            .text
            .as_deref()
            .map(|text| truncate_with_ellipsis(text.to_owned(), 40))
            .unwrap_or_default(),
    };
    let mut line = format!(
        "{} p{} [{:.1}, {:.1}, {:.1}, {:.1}] {}",
        highlight.id,
        highlight.page_number(),
        rect.x1,
        rect.y1,
        rect.x2,
        rect.y2,
        label
    );
    if !highlight.comment.text.is_empty() {
        line.push_str(" - ");
        if !highlight.comment.emoji.is_empty() {
            line.push_str(&highlight.comment.emoji);
            line.push(' ');
        }
        line.push_str(&highlight.comment.text);
    }
    line
}

fn truncate_with_ellipsis(mut text: String, width: usize) -> String {
    if text.chars().count() <= width {
        return text;
    }
    if let Some((cut, _)) = text.char_indices().nth(width.saturating_sub(1)) {
        text.truncate(cut);
    }
    text.push('…');
    text
}

/// Splits a shell line on whitespace; double quotes group words.
fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        words.push(current);
    }
    words
}

fn document_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn document_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .to_owned()
}

fn init_logging(project_dirs: &ProjectDirs, config: &Config) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pagemark.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
