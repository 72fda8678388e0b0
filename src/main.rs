use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;

use rooftakeoff::input;
use rooftakeoff::parser::extract;
use rooftakeoff::parser::spec::SpecStatus;
use rooftakeoff::{
    AssemblyReport, DrawingSetReport, Engine, ScopeRegistry, Settings, SpecSummary,
};

#[derive(Parser)]
#[command(name = "rooftakeoff", about = "Roofing takeoff from construction PDF text")]
struct Cli {
    /// Settings file (default: ./rooftakeoff.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Scope registry JSON, overrides the settings file
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    format: Format,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
    /// Assembly rows only
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every sheet of one or more drawing sets
    Classify {
        /// Page JSON or form-feed separated text
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Match drawing sets against the Division 07 scope registry
    Scopes {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Report scopes with no matching pages too
        #[arg(long)]
        all: bool,
    },
    /// Extract roof assemblies from manufacturer assembly letters
    Assemblies {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Parse Division 07 specification sections
    Spec {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Full drawing-set analysis: sheets, relevance, scopes and stats
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        all: bool,
    },
    /// List the scopes in the active registry
    Registry,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    if let Some(path) = &cli.registry {
        settings.registry_path = Some(path.clone());
    }
    if let Commands::Scopes { all: true, .. } | Commands::Run { all: true, .. } = &cli.command {
        settings.include_empty_scopes = true;
    }
    if cli.format == Format::Csv && !matches!(cli.command, Commands::Assemblies { .. }) {
        bail!("--format csv is only available for assemblies");
    }

    let engine = Engine::from_settings(settings)?;

    let result = match &cli.command {
        Commands::Classify { files } => {
            let reports = analyze(&engine, files)?;
            match cli.format {
                Format::Json => print_json(&reports),
                _ => {
                    reports.iter().for_each(print_sheets);
                    Ok(())
                }
            }
        }
        Commands::Scopes { files, .. } => {
            let reports = analyze(&engine, files)?;
            match cli.format {
                Format::Json => {
                    let scopes: Vec<_> = reports.iter().map(|r| (&r.document, &r.scopes)).collect();
                    print_json(&scopes)
                }
                _ => {
                    reports.iter().for_each(print_scopes);
                    Ok(())
                }
            }
        }
        Commands::Run { files, .. } => {
            let reports = analyze(&engine, files)?;
            match cli.format {
                Format::Json => print_json(&reports),
                _ => {
                    for report in &reports {
                        print_sheets(report);
                        print_scopes(report);
                        print_stats(report);
                    }
                    Ok(())
                }
            }
        }
        Commands::Assemblies { files } => {
            let reports = process_documents(files, |path| {
                let text = input::read_text(path)?;
                Ok(engine.extract_assemblies(&input::document_name(path), &text))
            })?;
            match cli.format {
                Format::Json => print_json(&reports),
                Format::Csv => {
                    let rows: Vec<_> = reports
                        .iter()
                        .flat_map(|r| r.assemblies.iter().map(|a| a.to_row()))
                        .collect();
                    let mut out = io::stdout().lock();
                    extract::write_csv(&mut out, &rows)?;
                    out.flush()?;
                    Ok(())
                }
                Format::Table => {
                    reports.iter().for_each(print_assemblies);
                    Ok(())
                }
            }
        }
        Commands::Spec { files } => {
            let summaries = process_documents(files, |path| {
                let text = input::read_text(path)?;
                Ok(engine.parse_spec(&input::document_name(path), &text))
            })?;
            match cli.format {
                Format::Json => print_json(&summaries),
                _ => {
                    summaries.iter().for_each(print_spec);
                    Ok(())
                }
            }
        }
        Commands::Registry => {
            let registry = engine.registry();
            match cli.format {
                Format::Json => print_json(&registry.scopes()),
                _ => {
                    print_registry(registry);
                    Ok(())
                }
            }
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn analyze(engine: &Engine, files: &[PathBuf]) -> anyhow::Result<Vec<DrawingSetReport>> {
    process_documents(files, |path| {
        let set = input::load_drawing_set(path)?;
        Ok(engine.analyze_drawings(&set.name, set.pages))
    })
}

/// Runs `f` over every input in parallel, in input order, behind a progress
/// bar. The first failure aborts the batch.
fn process_documents<T, F>(files: &[PathBuf], f: F) -> anyhow::Result<Vec<T>>
where
    T: Send,
    F: Fn(&Path) -> anyhow::Result<T> + Sync,
{
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = if files.len() > 1 {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let results: Vec<anyhow::Result<T>> = files
        .par_iter()
        .map(|path| {
            let result = f(path.as_path()).with_context(|| format!("processing {}", path.display()));
            pb.inc(1);
            result
        })
        .collect();

    pb.finish_and_clear();
    results.into_iter().collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_sheets(report: &DrawingSetReport) {
    println!("== {} ==", report.document);
    println!(
        "{:>4} | {:<10} | {:<30} | {:<18} | {:<9} | {:>5}",
        "Page", "Sheet", "Title", "Type", "Tier", "Roof"
    );
    println!("{}", "-".repeat(92));
    for p in &report.pages {
        let title = truncate(p.sheet_title.as_deref().unwrap_or("-"), 30);
        let roof = if p.roof_related {
            format!("{:.2}", p.relevance.score)
        } else {
            "-".into()
        };
        println!(
            "{:>4} | {:<10} | {:<30} | {:<18} | {:<9} | {:>5}",
            p.page_number,
            truncate(&p.sheet_number, 10),
            title,
            p.classification.drawing_type,
            p.classification.tier,
            roof
        );
    }
    println!();
}

fn print_scopes(report: &DrawingSetReport) {
    println!("== {} scopes ==", report.document);
    if report.scopes.is_empty() {
        println!("No scope matched.\n");
        return;
    }
    println!(
        "{:<6} | {:<36} | {:>5} | {:>8} | {:>5} | {:>4} | {}",
        "Scope", "Name", "Pages", "Critical", "Best", "Est.", "Escalate"
    );
    println!("{}", "-".repeat(90));
    for s in &report.scopes {
        let best = s
            .best_score()
            .map(|b| format!("{:.2}", b))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<6} | {:<36} | {:>5} | {:>8} | {:>5} | {:>4} | {}",
            s.scope_id,
            truncate(&s.scope_name, 36),
            s.pages_matched,
            s.critical_sheets.len(),
            best,
            s.shop_drawings.total_estimate,
            if s.escalate { "yes" } else { "" }
        );
    }

    let with_mfrs: Vec<_> = report
        .scopes
        .iter()
        .filter(|s| !s.manufacturers_found.is_empty())
        .collect();
    if !with_mfrs.is_empty() {
        println!("\n--- Manufacturers ---");
        for s in &with_mfrs {
            println!("  {}: {}", s.scope_id, s.manufacturers_found.join(", "));
        }
    }
    println!();
}

fn print_stats(report: &DrawingSetReport) {
    let s = &report.stats;
    println!("Pages analyzed:    {}", s.pages_analyzed);
    println!("Roof related:      {}", s.roof_related_pages);
    println!("Filter efficiency: {:.1}%", s.filter_efficiency);
    for d in &report.diagnostics {
        println!("Note: {}", d);
    }
    println!();
}

fn print_assemblies(report: &AssemblyReport) {
    println!("== {} ==", report.document);
    if report.implicit {
        println!("(no roof-area headings; whole letter treated as one assembly)");
    }
    for a in &report.assemblies {
        println!("{}", a.roof_area);
        let row = a.to_row();
        for (header, value) in extract::AssemblyRow::HEADERS.iter().zip(row.values()).skip(1) {
            if !value.is_empty() {
                println!("  {:<14} {}", header, value);
            }
        }
        for d in &a.diagnostics {
            println!("  Note: {}", d);
        }
    }
    for d in &report.diagnostics {
        println!("Note: {}", d);
    }
    println!();
}

fn print_spec(s: &SpecSummary) {
    println!("== {} ==", s.document);
    if s.status == SpecStatus::NoText {
        println!("No text found ({} chars); the PDF may need OCR.\n", s.text_length);
        return;
    }
    let category = s.category.map_or("", |c| c.as_str());
    println!("Section:  {} {}", s.spec_number, s.spec_title);
    println!("Category: {}", category);
    if !s.manufacturers.is_empty() {
        println!("Manufacturers: {}", s.manufacturers.join(", "));
    }
    if !s.products.is_empty() {
        println!("Products: {}", s.products.join(", "));
    }
    println!("\nShop drawing requirements:");
    for (i, req) in s.shop_drawing_requirements.iter().enumerate() {
        println!("{:>3}. {}", i + 1, req);
    }
    for (kind, items) in &s.other_submittals {
        println!("\n{}:", kind);
        for item in items {
            println!("  - {}", truncate(item, 100));
        }
    }
    println!();
}

fn print_registry(registry: &ScopeRegistry) {
    println!("{:<6} | {:<42} | {:>8} | {:>4}", "Scope", "Name", "Keywords", "Mfrs");
    println!("{}", "-".repeat(70));
    for s in registry.scopes() {
        println!(
            "{:<6} | {:<42} | {:>8} | {:>4}",
            s.id,
            truncate(&s.name, 42),
            s.keywords.len(),
            s.manufacturers.len()
        );
    }
    println!("\n{} scopes", registry.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
