use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};

use catsync_core::storage::{read_json, write_atomic};
use catsync_core::{
    AppConfig, AssetIndex, Catalog, CatalogDocument, CatalogError, ContentField, ExitCode,
    LinkIndex, LinkMode, Reconciler, apply_links, clean_descriptions, load_catalog, load_source,
    report_missing, resolve_covers, save_catalog, set_all_prices,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "catsync",
    about = "Reconcile scraped product records and storefront links into a JSON catalog",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: $CATSYNC_CONFIG or ~/.config/catsync/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file to read and rewrite (overrides `[catalog] path`).
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Run the pass and print the summary without writing anything.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Output in JSON format. Also enabled by setting CATSYNC_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge scraped source files into the catalog.
    Merge {
        /// Scraped source file(s), processed in order.
        #[arg(long, required = true, num_args = 1..)]
        source: Vec<PathBuf>,
        /// Storefront link export used to fill missing links.
        #[arg(long)]
        links: Option<PathBuf>,
        /// Resolve covers against the images in this directory.
        #[arg(long)]
        covers: Option<PathBuf>,
        /// Price given to new products that have none.
        #[arg(long)]
        default_price: Option<f64>,
        /// Content fields a non-empty source value may overwrite.
        #[arg(long, num_args = 1..)]
        refresh: Vec<ContentField>,
    },

    /// Copy storefront links onto products by title.
    ApplyLinks {
        #[arg(long)]
        links: PathBuf,
        /// Replace links that differ instead of only filling empty ones.
        #[arg(long)]
        overwrite: bool,
    },

    /// Point covers at local image files and report the missing ones.
    Covers {
        /// Cover directory (overrides `[covers] dir`).
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Write missing covers as `id<TAB>title<TAB>cover` lines to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Set every product's price.
    SetPrice { amount: f64 },

    /// Remove isolated `ZIP` lines from descriptions.
    CleanDescriptions,

    /// List collected app URLs that have no record in a scraped file.
    ReportMissing {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        urls: PathBuf,
        /// Write the missing URLs here, one per line.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("warning: {e:#}");
    }

    if let Err(err) = run(cli) {
        eprintln!("error: {}", one_line(&err));
        std::process::exit(exit_code(&err) as i32);
    }
}

/// Logs go to stderr. Filter from `CATSYNC_LOG`, then `RUST_LOG`, else `warn`.
fn init_tracing() -> Result<()> {
    let filter = std::env::var("CATSYNC_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}

fn run(cli: Cli) -> Result<()> {
    let start = Instant::now();
    let json_output = cli.json || std::env::var("CATSYNC_JSON").as_deref() == Ok("1");

    let config = load_config(cli.config.as_deref())?;
    let catalog_path = cli.catalog.clone().unwrap_or_else(|| config.catalog_path());
    let out = Output {
        json: json_output,
        start,
    };

    match cli.command {
        Commands::Merge {
            source,
            links,
            covers,
            default_price,
            refresh,
        } => {
            let mut policy = config.merge_policy().with_refreshable(refresh);
            if let Some(price) = default_price {
                policy.default_price = Some(price).filter(|p| p.is_finite());
            }

            let doc = load_catalog(&catalog_path)?;
            let link_index = links.as_deref().map(LinkIndex::load).transpose()?;
            let assets = covers.as_deref().map(AssetIndex::from_dir).transpose()?;

            let mut records = Vec::new();
            for path in &source {
                records.extend(load_source(path)?);
            }

            let mut reconciler = Reconciler::new(policy)
                .with_matcher(config.matcher())
                .with_extractor(config.extractor()?)
                .with_cover_prefix(config.covers.public_prefix.clone());
            if let Some(index) = &link_index {
                reconciler = reconciler.with_links(index);
            }
            if let Some(assets) = &assets {
                reconciler = reconciler.with_assets(assets);
            }

            let CatalogDocument { shape, products } = doc;
            let mut catalog = Catalog::new(products);
            let summary = reconciler.reconcile(&mut catalog, &records);
            let doc = CatalogDocument {
                shape,
                products: catalog.into_products(),
            };

            let changed = summary.added + summary.updated > 0;
            let backup = persist(&catalog_path, &doc, changed, cli.dry_run)?;

            out.emit(
                json!({
                    "catalog": catalog_path,
                    "backup": backup,
                    "dry_run": cli.dry_run,
                    "summary": summary,
                }),
                || {
                    println!("Source records: {}", summary.total);
                    println!("Added:          {}", summary.added);
                    println!("Updated:        {}", summary.updated);
                    println!("Unchanged:      {}", summary.unchanged);
                    println!("Skipped:        {}", summary.skipped);
                    println!("Newly linked:   {}", summary.linked);
                    print_write_status(&catalog_path, backup.as_deref(), changed, cli.dry_run);
                },
            )?;
        }

        Commands::ApplyLinks { links, overwrite } => {
            let mut doc = load_catalog(&catalog_path)?;
            let index = LinkIndex::load(&links)?;
            let mode = if overwrite {
                LinkMode::Overwrite
            } else {
                LinkMode::FillEmpty
            };

            let summary = apply_links(&mut doc.products, &index, mode, &config.matcher());
            let changed = summary.updated > 0;
            let backup = persist(&catalog_path, &doc, changed, cli.dry_run)?;

            out.emit(
                json!({
                    "catalog": catalog_path,
                    "backup": backup,
                    "dry_run": cli.dry_run,
                    "summary": summary,
                }),
                || {
                    println!("Products:          {}", summary.products);
                    println!("Already linked:    {}", summary.had_links);
                    println!("Links updated:     {}", summary.updated);
                    println!("No title match:    {}", summary.unmatched);
                    println!("With valid URL:    {}", summary.with_valid_url);
                    print_write_status(&catalog_path, backup.as_deref(), changed, cli.dry_run);
                },
            )?;
        }

        Commands::Covers { dir, report } => {
            let dir = dir.unwrap_or_else(|| config.covers_dir());
            let mut doc = load_catalog(&catalog_path)?;
            let assets = AssetIndex::from_dir(&dir)?;

            let result = resolve_covers(&mut doc.products, &assets, &config.covers.public_prefix);
            let changed = result.fixed > 0;
            let backup = persist(&catalog_path, &doc, changed, cli.dry_run)?;
            if let Some(report_path) = &report {
                write_report(report_path, &result.missing_tsv(), cli.dry_run)?;
            }

            out.emit(
                json!({
                    "catalog": catalog_path,
                    "backup": backup,
                    "dry_run": cli.dry_run,
                    "covers_dir": dir,
                    "summary": result,
                }),
                || {
                    println!("Images indexed:  {}", assets.len());
                    println!("Fixed paths:     {}", result.fixed);
                    println!("Already OK:      {}", result.ok);
                    println!("Remote:          {}", result.remote);
                    println!("Missing:         {}", result.missing.len());
                    print_write_status(&catalog_path, backup.as_deref(), changed, cli.dry_run);
                    if let Some(report_path) = &report {
                        println!("Report: {}", report_path.display());
                    }
                },
            )?;
        }

        Commands::SetPrice { amount } => {
            if !amount.is_finite() || amount < 0.0 {
                return Err(CatalogError::Config(format!("invalid price: {amount}")).into());
            }
            let mut doc = load_catalog(&catalog_path)?;
            let changed_count = set_all_prices(&mut doc.products, amount);
            let changed = changed_count > 0;
            let backup = persist(&catalog_path, &doc, changed, cli.dry_run)?;

            out.emit(
                json!({
                    "catalog": catalog_path,
                    "backup": backup,
                    "dry_run": cli.dry_run,
                    "summary": { "products": doc.products.len(), "changed": changed_count, "price": amount },
                }),
                || {
                    println!("Prices set to {amount}: {changed_count}");
                    print_write_status(&catalog_path, backup.as_deref(), changed, cli.dry_run);
                },
            )?;
        }

        Commands::CleanDescriptions => {
            let mut doc = load_catalog(&catalog_path)?;
            let (touched, removed) = clean_descriptions(&mut doc.products);
            let changed = touched > 0;
            let backup = persist(&catalog_path, &doc, changed, cli.dry_run)?;

            out.emit(
                json!({
                    "catalog": catalog_path,
                    "backup": backup,
                    "dry_run": cli.dry_run,
                    "summary": { "products_touched": touched, "lines_removed": removed },
                }),
                || {
                    println!("Products touched: {touched}");
                    println!("Lines removed:    {removed}");
                    print_write_status(&catalog_path, backup.as_deref(), changed, cli.dry_run);
                },
            )?;
        }

        Commands::ReportMissing {
            source,
            urls,
            out: out_path,
        } => {
            let scraped = read_json(&source)?;
            let urls_text = read_text(&urls)?;
            let report = report_missing(&urls_text, &scraped, &config.extractor()?);
            if let Some(path) = &out_path {
                write_report(path, &report.to_text(), cli.dry_run)?;
            }

            out.emit(json!({ "out": out_path, "summary": report }), || {
                println!("Unique URLs:  {}", report.unique_urls);
                println!("Scraped ids:  {}", report.scraped_ids);
                println!("Missing:      {}", report.missing.len());
                match &out_path {
                    Some(path) => println!("Wrote: {}", path.display()),
                    None => report.missing.iter().for_each(|url| println!("  {url}")),
                }
            })?;
        }
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

struct Output {
    json: bool,
    start: Instant,
}

impl Output {
    fn emit(&self, data: Value, human: impl FnOnce()) -> Result<()> {
        if self.json {
            let dur = self.start.elapsed().as_millis();
            print_json(&json!({"status": "ok", "data": data, "meta": {"duration_ms": dur}}))
        } else {
            human();
            Ok(())
        }
    }
}

fn print_json(val: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    match explicit {
        Some(path) if !path.exists() => Err(CatalogError::FileNotFound(path.to_path_buf()).into()),
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AppConfig::load()?),
    }
}

/// Back up and rewrite the catalog when the pass changed it.
fn persist(path: &Path, doc: &CatalogDocument, changed: bool, dry_run: bool) -> Result<Option<PathBuf>> {
    if dry_run {
        info!(catalog = %path.display(), changed, "dry run, catalog not written");
        return Ok(None);
    }
    if !changed {
        debug!(catalog = %path.display(), "no changes, catalog left as is");
        return Ok(None);
    }
    Ok(save_catalog(path, doc)?)
}

/// Write a report file unless this is a dry run.
fn write_report(path: &Path, contents: &str, dry_run: bool) -> Result<()> {
    if dry_run {
        info!(report = %path.display(), "dry run, report not written");
        return Ok(());
    }
    write_atomic(path, contents.as_bytes())?;
    info!(report = %path.display(), bytes = contents.len(), "report written");
    Ok(())
}

fn print_write_status(path: &Path, backup: Option<&Path>, changed: bool, dry_run: bool) {
    match (dry_run, changed) {
        (true, _) => println!("Dry run: {} not written", path.display()),
        (false, false) => println!("No changes: {} left as is", path.display()),
        (false, true) => {
            println!("Updated: {}", path.display());
            if let Some(backup) = backup {
                println!("Backup:  {}", backup.display());
            }
        }
    }
}

fn read_text(path: &Path) -> catsync_core::Result<String> {
    if !path.exists() {
        return Err(CatalogError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

fn exit_code(err: &anyhow::Error) -> ExitCode {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<CatalogError>())
        .map(CatalogError::exit_code)
        .unwrap_or(ExitCode::GeneralError)
}

// Causes already quoted by their parent's message are not repeated.
fn one_line(err: &anyhow::Error) -> String {
    let mut line = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if line.contains(&text) {
            continue;
        }
        if !line.is_empty() {
            line.push_str(": ");
        }
        line.push_str(&text);
    }
    line.replace('\n', " ")
}
