use clap::Parser;
use quire::config::{EditorConfig, RcLoader};
use quire::controller::{EditorContext, EditorController};
use quire::document_model::DocumentModel;
use quire::document_model::analysis::analyze_snapshot;
use quire::logging::{LOG_ENV, init_logging};
use quire::view::{
    CELL_HEIGHT, CELL_WIDTH, DocumentViewModel, LayoutEngine, ManuscriptLayout, MonospaceShaper, Page,
    PaginatedLayout, Size, ViewMode,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser, Debug)]
#[command(name = "quire", version, about = "Editor for long-form documents")]
struct Args {
    /// UTF-8 text file to open. A missing file starts an empty document.
    path: Option<PathBuf>,

    /// Presentation: continuous, page, typewriter or manuscript
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ViewMode>,

    /// Print word and character counts and exit
    #[arg(long)]
    stats: bool,

    /// Print frequent words, close repetitions and TODO/NOTE tags, then exit
    #[arg(long)]
    analyze: bool,

    /// Paginate and print where each page starts, then exit
    #[arg(long = "dump-pages")]
    dump_pages: bool,

    /// Log filter directive, e.g. `debug` or `quire::view=trace`. Logs go to stderr.
    #[arg(long = "log")]
    log: Option<String>,
}

fn parse_mode(id: &str) -> Result<ViewMode, String> {
    ViewMode::from_id(id).ok_or_else(|| format!("unknown view mode '{id}'"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let interactive = !args.stats && !args.analyze && !args.dump_pages;

    // The interactive screen owns the terminal; only log there when asked to
    if !interactive || args.log.is_some() || env::var_os(LOG_ENV).is_some() {
        init_logging(args.log.as_deref());
    }

    let mut config = RcLoader::load_config();
    if let Some(mode) = args.mode {
        config.view_mode = mode;
    }

    let document = match &args.path {
        Some(path) => load_document(path)?,
        None => DocumentModel::new(),
    };
    let title = args.path.as_deref().and_then(document_title);

    if args.stats {
        let stats = document.stats();
        println!("words:       {}", stats.words);
        println!("characters:  {}", stats.characters);
        println!("  no spaces: {}", stats.characters_no_spaces);
        println!("paragraphs:  {}", stats.paragraphs);
        println!("reading:     {} min", stats.reading_minutes);
    }
    if args.analyze {
        print_analysis(&document, &config);
    }
    if args.dump_pages {
        dump_pages(&document, &config, title.clone());
    }
    if !interactive {
        return Ok(());
    }

    let viewport = Size::new(80.0 * CELL_WIDTH, 23.0 * CELL_HEIGHT);
    let mut controller = EditorController::new(document, EditorContext::system(config), viewport);
    controller.set_title(title);
    controller.run()?;
    Ok(())
}

fn load_document(path: &Path) -> Result<DocumentModel, Box<dyn std::error::Error>> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "new file");
        return Ok(DocumentModel::new());
    }
    let text = fs::read_to_string(path)?;
    tracing::info!(path = %path.display(), chars = text.chars().count(), "file loaded");
    Ok(DocumentModel::with_text(&text))
}

fn document_title(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

fn print_analysis(document: &DocumentModel, config: &EditorConfig) {
    let report = analyze_snapshot(&document.snapshot(), &config.frequency_options());
    let frequency = &report.frequency;
    println!("words counted: {} ({} unique)", frequency.total_words, frequency.unique_words());
    for word in frequency.top_words(10) {
        let flag = if word.overused { "  overused" } else { "" };
        println!("  {:<20} {:>6} {:>6.2}%{flag}", word.word, word.count, word.percentage);
    }
    if !frequency.repetitions.is_empty() {
        println!("close repetitions: {}", frequency.repetitions.len());
        for repetition in frequency.repetitions.iter().take(10) {
            println!("  '{}' after {} words at char {}", repetition.word, repetition.distance, repetition.start);
        }
    }
    for tag in &report.tags {
        println!("line {:>5}: {}: {}", tag.line_number(), tag.kind.keyword(), tag.content);
    }
}

fn dump_pages(document: &DocumentModel, config: &EditorConfig, title: Option<String>) {
    let view = DocumentViewModel::new(document);
    let shaper = Rc::new(MonospaceShaper);
    let viewport = Size::new(1024.0, 768.0);
    let pages: Vec<Page> = if config.view_mode == ViewMode::Manuscript {
        let mut layout = ManuscriptLayout::new(shaper, viewport);
        layout.set_title(title);
        layout.set_widows_orphans(config.widows, config.orphans);
        layout.initialize(&view);
        layout.pages(&view).to_vec()
    } else {
        let mut layout = PaginatedLayout::new(shaper, config.metrics(), config.page_setup(), viewport);
        layout.set_title(title);
        layout.set_widows_orphans(config.widows, config.orphans);
        layout.initialize(&view);
        layout.pages(&view).to_vec()
    };

    for (index, page) in pages.iter().enumerate() {
        let end = pages.get(index + 1).map_or(document.len(), Page::start);
        println!("page {:>4}: chars {:>8}..{:<8} {:>3} lines", index + 1, page.start(), end, page.line_count());
    }
}
