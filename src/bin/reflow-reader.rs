use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

use reflow_reader::{
    Button, FileBackend, FixedMetricsViewport, FontConfig, InputEvent, MeasuringPaginator,
    NavOutcome, NavigationController, PageConstraints, PageView, PositionStore, ReaderBuilder,
    StaticContentSource, Swipe, Theme, ViewportSize,
};

#[derive(Parser)]
#[command(name = "reflow-reader", version, about = "Paginate and read plain-text books")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print page boundaries of every chapter as JSON
    Paginate {
        /// Plain-text book (chapters separated by a form feed or a `***` line)
        file: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
        /// Font scale in percent
        #[arg(long, default_value_t = 100)]
        font: u16,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Read interactively; commands come from stdin
    Read {
        /// Plain-text book (chapters separated by a form feed or a `***` line)
        file: PathBuf,
        #[command(flatten)]
        layout: LayoutArgs,
        /// Position store file (default: `<file>.position.json`)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Book identifier used in the storage key (default: file stem)
        #[arg(long)]
        book_id: Option<String>,
    },
}

#[derive(Args, Clone, Copy)]
struct LayoutArgs {
    /// Page width in pixels
    #[arg(long, default_value_t = 600.0)]
    width: f32,
    /// Page height in pixels
    #[arg(long, default_value_t = 800.0)]
    height: f32,
}

#[derive(Serialize)]
struct ChapterReport {
    chapter: usize,
    paragraphs: usize,
    pages: Vec<PageReport>,
}

#[derive(Serialize)]
struct PageReport {
    page: usize,
    first_paragraph: usize,
    paragraph_count: usize,
}

#[derive(Serialize)]
struct PaginationReport {
    file: String,
    width: f32,
    height: f32,
    font_scale: u16,
    chapters: Vec<ChapterReport>,
}

#[derive(Clone, Debug, PartialEq)]
enum ReadCommand {
    Next,
    Prev,
    NextChapter,
    PrevChapter,
    Chapter(usize),
    Swipe(Swipe),
    Font(u16),
    Theme(Theme),
    Help,
    Quit,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let default_filter = format!("{}=info", env!("CARGO_PKG_NAME"));
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Paginate {
            file,
            layout,
            font,
            pretty,
        } => paginate(&file, layout, font, pretty),
        Command::Read {
            file,
            layout,
            store,
            book_id,
        } => read(&file, layout, store, book_id).await,
    }
}

fn load_book(path: &Path) -> anyhow::Result<StaticContentSource> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(StaticContentSource::from_book_text(&text))
}

fn paginate(path: &Path, layout: LayoutArgs, font: u16, pretty: bool) -> anyhow::Result<()> {
    let book = load_book(path)?;
    let font = FontConfig::scaled(
        font.clamp(reflow_reader::FONT_SCALE_MIN, reflow_reader::FONT_SCALE_MAX),
    );
    let constraints =
        PageConstraints::new(ViewportSize::new(layout.width, layout.height), font);
    let mut paginator =
        MeasuringPaginator::new(FixedMetricsViewport::new(layout.width, layout.height));

    let mut chapters = Vec::with_capacity(book.chapters().len());
    for chapter in book.chapters() {
        let pages = paginator
            .paginate(&chapter.paragraphs, &constraints)
            .with_context(|| format!("chapter {} could not be paginated", chapter.index + 1))?;
        let mut first_paragraph = 0;
        let pages = pages
            .iter()
            .enumerate()
            .map(|(page, content)| {
                let report = PageReport {
                    page,
                    first_paragraph,
                    paragraph_count: content.paragraph_count(),
                };
                first_paragraph += content.paragraph_count();
                report
            })
            .collect();
        chapters.push(ChapterReport {
            chapter: chapter.index,
            paragraphs: chapter.paragraphs.len(),
            pages,
        });
    }

    let report = PaginationReport {
        file: path.display().to_string(),
        width: layout.width,
        height: layout.height,
        font_scale: font.scale_percent,
        chapters,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

async fn read(
    path: &Path,
    layout: LayoutArgs,
    store: Option<PathBuf>,
    book_id: Option<String>,
) -> anyhow::Result<()> {
    let book = load_book(path)?;
    let store_path = store.unwrap_or_else(|| {
        let mut name = path.as_os_str().to_owned();
        name.push(".position.json");
        PathBuf::from(name)
    });
    let book_id = book_id
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "book".to_string());

    let mut reader = ReaderBuilder::new().book_id(book_id).build(
        FixedMetricsViewport::new(layout.width, layout.height),
        book,
        PositionStore::local_only(Arc::new(FileBackend::new(&store_path))),
    );
    reader.start().await;
    show(&reader)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(msg) => {
                eprintln!("{}", msg);
                continue;
            }
        };
        let outcome = match command {
            ReadCommand::Quit => break,
            ReadCommand::Help => {
                print_help();
                continue;
            }
            ReadCommand::Next => reader.go_to_page(1).await,
            ReadCommand::Prev => reader.go_to_page(-1).await,
            ReadCommand::NextChapter => {
                reader
                    .handle_input(InputEvent::Button(Button::NextChapter))
                    .await
            }
            ReadCommand::PrevChapter => {
                reader
                    .handle_input(InputEvent::Button(Button::PrevChapter))
                    .await
            }
            ReadCommand::Chapter(index) => match reader.try_go_to_chapter(index).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    eprintln!("{}", err);
                    continue;
                }
            },
            ReadCommand::Swipe(swipe) => reader.handle_input(InputEvent::Swipe(swipe)).await,
            ReadCommand::Font(percent) => reader.set_font_scale(percent).await,
            ReadCommand::Theme(theme) => reader.set_theme(theme).await,
        };
        match outcome {
            NavOutcome::Moved(_) => show(&reader)?,
            other => eprintln!("({:?})", other),
        }
    }
    Ok(())
}

fn show(reader: &NavigationController<FixedMetricsViewport, StaticContentSource>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let (page, total) = reader.page_indicator();
    writeln!(
        out,
        "== chapter {}/{} | page {}/{} | {:.0}% | font {}% | {} ==",
        reader.chapter_index() + 1,
        reader.chapter_count(),
        page,
        total,
        reader.book_progress() * 100.0,
        reader.settings().font_scale,
        reader.settings().theme.name()
    )?;
    match reader.current_view() {
        PageView::Content(page) => {
            for paragraph in &page.paragraphs {
                writeln!(out, "{}\n", paragraph)?;
            }
        }
        PageView::Placeholder { text, .. } => writeln!(out, "[{}]\n", text)?,
    }
    if !reader.settings().hint_shown {
        writeln!(out, "(type `next`, `prev` or `help`)")?;
    }
    out.flush()
}

fn parse_command(line: &str) -> Result<ReadCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = parts.collect();
    let command = match (cmd, args.as_slice()) {
        ("next" | "n", []) => ReadCommand::Next,
        ("prev" | "p", []) => ReadCommand::Prev,
        ("next-chapter", []) => ReadCommand::NextChapter,
        ("prev-chapter", []) => ReadCommand::PrevChapter,
        ("chapter", [n]) => match parse_number(n)? {
            n if n >= 1 => ReadCommand::Chapter(n as usize - 1),
            _ => return Err("chapters are numbered from 1".to_string()),
        },
        ("swipe", [dx, dy, ms]) => ReadCommand::Swipe(Swipe {
            dx: parse_number(dx)? as f32,
            dy: parse_number(dy)? as f32,
            duration_ms: Some(parse_number(ms)?.max(0) as u64),
        }),
        ("font", [n]) => ReadCommand::Font(parse_number(n)?.clamp(0, i64::from(u16::MAX)) as u16),
        ("theme", [name]) => match Theme::from_name(name) {
            Some(theme) => ReadCommand::Theme(theme),
            None => return Err(format!("unknown theme '{}'", name)),
        },
        ("help" | "?", []) => ReadCommand::Help,
        ("quit" | "q" | "exit", []) => ReadCommand::Quit,
        _ => return Err(format!("unrecognized command '{}' (try `help`)", line.trim())),
    };
    Ok(command)
}

fn parse_number(s: &str) -> Result<i64, String> {
    s.parse::<i64>()
        .map_err(|_| format!("'{}' is not a number", s))
}

fn print_help() {
    println!(
        "commands:\n  next | prev\n  next-chapter | prev-chapter\n  chapter <N>\n  swipe <DX> <DY> <MS>\n  font <PERCENT>\n  theme <light|dark|beige|brown>\n  quit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("next"), Ok(ReadCommand::Next));
        assert_eq!(parse_command("  chapter 3 "), Ok(ReadCommand::Chapter(2)));
        assert_eq!(
            parse_command("swipe -120 4 200"),
            Ok(ReadCommand::Swipe(Swipe {
                dx: -120.0,
                dy: 4.0,
                duration_ms: Some(200)
            }))
        );
        assert_eq!(parse_command("theme Dark"), Ok(ReadCommand::Theme(Theme::Dark)));
        assert_eq!(parse_command("font 200"), Ok(ReadCommand::Font(200)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("chapter 0").is_err());
        assert!(parse_command("chapter x").is_err());
        assert!(parse_command("theme neon").is_err());
        assert!(parse_command("next 2").is_err());
        assert!(parse_command("fly").is_err());
    }
}
