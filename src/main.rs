//! bindery - Markdown to Kindle-compatible EPUB converter

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bindery::{ContentType, RawMetadata, convert, safe_filename, write_epub_file};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(version, about = "Markdown to Kindle-compatible EPUB converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    bindery book.md book.epub --title 'My Book' --author 'Me'
    bindery book.md --title 'My Book' --author 'Me' --cover cover.jpg
    bindery book.md book.epub -t 'Poems' -a 'Me' --poetry --report-json")]
struct Cli {
    /// Input manuscript (Markdown or plain text)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output EPUB file (defaults to a name derived from the title)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Book title
    #[arg(short, long)]
    title: String,

    /// Author name
    #[arg(short, long)]
    author: String,

    /// ISO 639-1 language code
    #[arg(short, long, default_value = "en")]
    language: String,

    /// ISBN-10 or ISBN-13 (a UUID identifier is generated when omitted)
    #[arg(long)]
    isbn: Option<String>,

    /// Publisher name
    #[arg(long)]
    publisher: Option<String>,

    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<String>,

    /// Book description
    #[arg(long)]
    description: Option<String>,

    /// Comma-separated keywords
    #[arg(long)]
    keywords: Option<String>,

    /// Cover image (JPEG or PNG)
    #[arg(long)]
    cover: Option<PathBuf>,

    /// Preserve manuscript line breaks (poetry mode)
    #[arg(long)]
    poetry: bool,

    /// Print the validation report as JSON
    #[arg(long)]
    report_json: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let document = std::fs::read(&cli.input)
        .map_err(|e| format!("cannot read {}: {e}", cli.input.display()))?;

    let cover = match &cli.cover {
        Some(path) => Some(
            std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let metadata = RawMetadata {
        title: cli.title.clone(),
        author: cli.author.clone(),
        language: cli.language.clone(),
        publisher: cli.publisher.clone(),
        pub_date: cli.date.clone(),
        isbn: cli.isbn.clone(),
        description: cli.description.clone(),
        keywords: cli.keywords.clone(),
        content_type: if cli.poetry {
            ContentType::Poetry
        } else {
            ContentType::Prose
        },
    };

    let result = convert(&document, &metadata, cover.as_deref()).map_err(|e| e.to_string())?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(safe_filename(&cli.title)));
    write_epub_file(&result.epub, &output).map_err(|e| e.to_string())?;

    if cli.report_json {
        let json =
            serde_json::to_string_pretty(&result.report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !cli.quiet {
        print_report(&output, &result.report);
    }

    if result.report.kindle_compatible {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_report(output: &std::path::Path, report: &bindery::ValidationReport) {
    println!("Wrote: {}", output.display());
    println!("Chapters: {}", report.info.chapter_count);
    println!(
        "Size: {:.1} KB across {} files",
        report.info.size_bytes as f64 / 1024.0,
        report.info.file_count
    );
    if let Some(location) = report.opf_location {
        println!("Package document: {location}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    for error in &report.errors {
        println!("error: {error}");
    }
    println!(
        "Kindle compatible: {}",
        if report.kindle_compatible { "yes" } else { "no" }
    );
}
