//! `toolmap`: a static, browseable catalog of security tools.
//!
//! The pipeline, one subcommand per stage:
//!
//! ```text
//! scrape     tool index  -> tool links + SVG icons
//! taxonomy   registry    -> taxonomy artifact (path list, tree, or JS)
//! sort       registry + taxonomy -> registry ordered by taxonomy position
//! dashboard  registry + taxonomy -> single HTML page with embedded data
//! convert    YAML        -> JSON
//! ```
//!
//! Tools are ordered by the pre-order position of their category in the
//! taxonomy tree (falling back to the longest known prefix), then featured
//! (`best_in`) first, then case-insensitive name. Unknown categories go last.

mod convert;
mod document;
mod error;
mod registry;
mod render;
mod scrape;
mod sort;
mod taxonomy;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::convert::{to_json_string, JsonStyle};
use crate::document::DocFormat;
use crate::error::InputError;
use crate::registry::{
    ensure_notes, load_registry, validate, IssueKind, RecordIssue, ToolRecord,
};
use crate::render::{render_dashboard, Dashboard};
use crate::sort::{sort_with_keys, SortKey, UNCATEGORIZED_INDEX};
use crate::taxonomy::{
    build_category_order, merge_registry_paths, to_js_assignment, CategoryPath, TaxonomyNode,
    TaxonomySource,
};

#[derive(Parser, Debug)]
#[command(name = "toolmap")]
#[command(about = "Security tool catalog: taxonomy ordering, icon scraping, static dashboard")]
struct Cli {
    /// Log at debug level (`RUST_LOG` takes precedence when set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sort tools by taxonomy position, featured flag, then name.
    Sort(SortArgs),
    /// Derive a taxonomy artifact from the category paths of a registry.
    Taxonomy(TaxonomyArgs),
    /// Print the pre-order category index of a taxonomy.
    Order(OrderArgs),
    /// Render the static HTML dashboard.
    Dashboard(DashboardArgs),
    /// Convert a YAML file to JSON (mapping key order is kept).
    Convert(ConvertArgs),
    /// Crawl the tool index for tool page links and SVG icons.
    Scrape(ScrapeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
struct SortArgs {
    /// Tool registry (JSON list, or YAML for any other extension).
    #[arg(short = 'j', long = "json")]
    registry: PathBuf,

    /// Taxonomy: `const taxonomy = {...};`, a nested mapping, or a list of paths.
    #[arg(short, long)]
    taxonomy: PathBuf,

    /// Output path. Defaults to `tools_sorted.json` next to the registry.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON indentation of the written file.
    #[arg(long, default_value_t = 2)]
    indent: usize,

    /// Stdout format: a preview of the first/last tools, or a JSON envelope.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print timing + size stats to stderr.
    ///
    /// Does not change stdout; the summary goes to stderr only.
    #[arg(long, default_value_t = false)]
    stats: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaxonomyStyle {
    /// `paths: [[...], ...]` YAML document.
    Paths,
    /// Nested mapping; JSON for a `.json` output, YAML otherwise.
    Tree,
    /// `const taxonomy = {...};` script for the browser.
    Js,
}

#[derive(Parser, Debug, Clone)]
struct TaxonomyArgs {
    /// Tool registry to collect category paths from.
    #[arg(long, default_value = "data/registry.yml")]
    registry: PathBuf,

    /// Existing taxonomy whose paths come first (in their own order).
    #[arg(long)]
    existing: Option<PathBuf>,

    /// Output path.
    #[arg(long, default_value = "data/taxonomy.yml")]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = TaxonomyStyle::Paths)]
    style: TaxonomyStyle,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
struct OrderArgs {
    /// Taxonomy file.
    #[arg(default_value = "data/taxonomy.yml")]
    taxonomy: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
struct DashboardArgs {
    #[arg(long, default_value = "data/registry.yml")]
    registry: PathBuf,

    /// Taxonomy whose paths are merged with the registry's own.
    #[arg(long, default_value = "data/taxonomy.yml")]
    taxonomy: PathBuf,

    #[arg(long, default_value = "app/PT_Toolmap_Dashboard.html")]
    out: PathBuf,

    #[arg(long, default_value = "Kali Linux Toolmap")]
    title: String,

    /// Order tools by taxonomy position before embedding them.
    ///
    /// Note: this is a boolean *value*; use `--sort=false` to keep registry order.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    sort: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
struct ConvertArgs {
    /// YAML input file.
    input: PathBuf,

    /// JSON output file. Defaults to the input with a `.json` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 2)]
    indent: usize,

    /// Escape non-ASCII characters.
    #[arg(long)]
    ensure_ascii: bool,
}

#[derive(Parser, Debug, Clone)]
struct ScrapeArgs {
    /// Tool index page.
    #[arg(long, default_value = scrape::DEFAULT_START_URL)]
    start: String,

    /// Where the sorted tool link list is written.
    #[arg(long, default_value = "data/kali_tool_links.txt")]
    links_out: PathBuf,

    /// Where icons are downloaded. Existing files are never re-fetched.
    #[arg(long, default_value = "app/icons")]
    icons_dir: PathBuf,

    /// Pause between requests, in milliseconds.
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,

    /// Timeout for page requests, in seconds.
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Timeout for icon downloads, in seconds.
    #[arg(long, default_value_t = 30)]
    download_timeout_secs: u64,

    #[arg(long, env = "TOOLMAP_USER_AGENT", default_value = scrape::DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Sort(args) => run_sort(&args),
        Command::Taxonomy(args) => run_taxonomy(&args),
        Command::Order(args) => run_order(&args),
        Command::Dashboard(args) => run_dashboard(&args),
        Command::Convert(args) => run_convert(&args),
        Command::Scrape(args) => run_scrape(&args),
    }
}

fn init_tracing(verbose: bool) {
    // Logs go to stderr; stdout carries the command's primary output.
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Write `contents` to `path`, creating parent directories.
///
/// The bytes go to a temp file in the same directory which is then renamed over
/// `path`; a failed write leaves any previous file untouched.
fn write_output(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir {}", parent.display()))?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .with_context(|| format!("failed to write {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_envelope(command: &str, body: Value) -> Result<()> {
    let mut out = serde_json::json!({
        "schema_version": 1,
        "ok": true,
        "command": command,
    });
    if let (Some(out), Value::Object(body)) = (out.as_object_mut(), body) {
        out.extend(body);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn default_sorted_path(registry: &Path) -> PathBuf {
    registry.with_file_name("tools_sorted.json")
}

#[derive(Debug, Serialize)]
struct SortRow {
    name: Option<String>,
    category_path: CategoryPath,
    best_in: bool,
    key: SortKey,
}

#[derive(Debug, Serialize)]
struct WarningsOut<'a> {
    total: usize,
    by_kind: BTreeMap<&'static str, usize>,
    issues: &'a [RecordIssue],
}

fn run_sort(args: &SortArgs) -> Result<()> {
    let started_at = Instant::now();
    // Both inputs must exist before anything else happens.
    for (what, path) in [("registry file", &args.registry), ("taxonomy file", &args.taxonomy)] {
        if !path.exists() {
            return Err(InputError::NotFound {
                what,
                path: path.clone(),
            }
            .into());
        }
    }
    let out_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_sorted_path(&args.registry));
    let style = JsonStyle {
        indent: args.indent,
        ensure_ascii: false,
    };

    let t_load = Instant::now();
    let registry = load_registry(&args.registry)?;
    let entries = registry.entries;
    if entries.is_empty() {
        warn!("no tools found; writing an empty list");
        write_output(&out_path, "[]")?;
        if let OutputFormat::Json = args.format {
            print_envelope(
                "sort",
                serde_json::json!({
                    "output": out_path.display().to_string(),
                    "taxonomy_nodes": 0,
                    "tools_sorted": 0,
                    "uncategorized": 0,
                    "warnings": { "total": 0, "by_kind": {}, "issues": [] },
                    "rows": [],
                }),
            )?;
        }
        return Ok(());
    }

    let report = validate(&entries);
    report.log();

    let taxonomy = TaxonomySource::load(&args.taxonomy)?.into_tree();
    if taxonomy.is_empty() {
        return Err(InputError::EmptyTaxonomy.into());
    }
    let dt_load = t_load.elapsed();

    let t_order = Instant::now();
    let order = build_category_order(&taxonomy);
    let dt_order = t_order.elapsed();

    let t_sort = Instant::now();
    let keyed = sort_with_keys(entries, &order);
    let dt_sort = t_sort.elapsed();

    let sorted: Vec<&Value> = keyed.iter().map(|(_, v)| v).collect();
    let json = to_json_string(&sorted, &style)?;
    write_output(&out_path, &json)?;

    let uncategorized = keyed
        .iter()
        .filter(|(k, _)| k.category_index == UNCATEGORIZED_INDEX)
        .count();
    info!("taxonomy: {} nodes", order.len());
    info!("tools sorted: {} ({} uncategorized)", keyed.len(), uncategorized);
    info!("saved to {}", out_path.display());

    match args.format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct SortJsonOut<'a> {
                schema_version: u32,
                ok: bool,
                command: &'a str,
                output: String,
                taxonomy_nodes: usize,
                tools_sorted: usize,
                uncategorized: usize,
                warnings: WarningsOut<'a>,
                rows: Vec<SortRow>,
            }
            let rows = keyed
                .iter()
                .map(|(key, entry)| {
                    let record = ToolRecord::from_value(entry);
                    SortRow {
                        name: record.name,
                        category_path: record.category_path,
                        best_in: record.best_in,
                        key: key.clone(),
                    }
                })
                .collect();
            let out = SortJsonOut {
                schema_version: 1,
                ok: true,
                command: "sort",
                output: out_path.display().to_string(),
                taxonomy_nodes: order.len(),
                tools_sorted: keyed.len(),
                uncategorized,
                warnings: WarningsOut {
                    total: report.len(),
                    by_kind: report.counts(),
                    issues: &report.issues,
                },
                rows,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => print_preview(&sorted),
    }

    if args.stats {
        let stats = SortStats {
            command: "sort",
            tools: keyed.len() as u64,
            taxonomy_nodes: order.len() as u64,
            warnings: report.len() as u64,
            bytes_written: json.len() as u64,
            elapsed_load: dt_load,
            elapsed_order: dt_order,
            elapsed_sort: dt_sort,
            elapsed_total: started_at.elapsed(),
        };
        print_sort_stats(args.format, &stats);
    }

    Ok(())
}

fn print_tool_row(i: usize, tool: &Value) {
    let record = ToolRecord::from_value(tool);
    let best = if record.best_in { " [*]" } else { "" };
    let name = record
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or("(unnamed)");
    println!("  {:4}. [{}]{} {}", i + 1, record.category_path, best, name);
}

/// First ten and last five tools.
fn print_preview(sorted: &[&Value]) {
    let total = sorted.len();
    let top_n = total.min(10);
    let bottom_n = total.min(5);

    println!("--- First {top_n} ---");
    for (i, tool) in sorted.iter().take(top_n).enumerate() {
        print_tool_row(i, tool);
    }

    let middle = total.saturating_sub(top_n + bottom_n);
    if middle > 0 {
        println!("\n  ... ({middle} tools in between) ...\n");
    } else {
        println!();
    }

    let bottom_start = top_n.max(total - bottom_n);
    if bottom_start < total {
        println!("--- Last {} ---", total - bottom_start);
        for (i, tool) in sorted.iter().enumerate().skip(bottom_start) {
            print_tool_row(i, tool);
        }
    }
}

#[derive(Debug)]
struct SortStats<'a> {
    command: &'a str,
    tools: u64,
    taxonomy_nodes: u64,
    warnings: u64,
    bytes_written: u64,
    elapsed_load: Duration,
    elapsed_order: Duration,
    elapsed_sort: Duration,
    elapsed_total: Duration,
}

fn print_sort_stats(format: OutputFormat, stats: &SortStats<'_>) {
    // IMPORTANT: keep stats on stderr so stdout remains a stable artifact surface.
    if matches!(format, OutputFormat::Json) {
        let out = serde_json::json!({
            "type": "toolmap_stats",
            "data": {
                "command": stats.command,
                "tools": stats.tools,
                "taxonomy_nodes": stats.taxonomy_nodes,
                "warnings": stats.warnings,
                "bytes_written": stats.bytes_written,
                "elapsed": {
                    "load_human": format!("{:0.6}s", stats.elapsed_load.as_secs_f64()),
                    "order_human": format!("{:0.6}s", stats.elapsed_order.as_secs_f64()),
                    "sort_human": format!("{:0.6}s", stats.elapsed_sort.as_secs_f64()),
                    "total_human": format!("{:0.6}s", stats.elapsed_total.as_secs_f64()),
                    "total_secs": stats.elapsed_total.as_secs(),
                    "total_nanos": stats.elapsed_total.subsec_nanos(),
                }
            }
        });
        eprintln!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        eprintln!(
            "
toolmap stats
command: {command}
tools: {tools} ({warnings} warnings)
taxonomy: {nodes} nodes
bytes written: {bytes}
{t_load:0.6} seconds load inputs
{t_order:0.6} seconds category order
{t_sort:0.6} seconds sort
{t_total:0.6} seconds total
",
            command = stats.command,
            tools = stats.tools,
            warnings = stats.warnings,
            nodes = stats.taxonomy_nodes,
            bytes = stats.bytes_written,
            t_load = stats.elapsed_load.as_secs_f64(),
            t_order = stats.elapsed_order.as_secs_f64(),
            t_sort = stats.elapsed_sort.as_secs_f64(),
            t_total = stats.elapsed_total.as_secs_f64(),
        );
    }
}

#[derive(Debug, Serialize)]
struct PathsDocument<'a> {
    paths: &'a [CategoryPath],
}

fn run_taxonomy(args: &TaxonomyArgs) -> Result<()> {
    let registry = load_registry(&args.registry)?;
    let tools: Vec<ToolRecord> = registry.entries.iter().map(ToolRecord::from_value).collect();
    let existing = match &args.existing {
        Some(path) => TaxonomySource::load(path)?.paths(),
        None => Vec::new(),
    };
    let paths = merge_registry_paths(&existing, &tools);
    let tree = TaxonomyNode::build_tree(&paths);

    let text = match args.style {
        TaxonomyStyle::Paths => serde_yaml::to_string(&PathsDocument { paths: &paths })?,
        TaxonomyStyle::Tree => match DocFormat::from_path(&args.out) {
            DocFormat::Json => {
                let style = JsonStyle {
                    indent: 4,
                    ensure_ascii: false,
                };
                format!("{}\n", to_json_string(&tree, &style)?)
            }
            DocFormat::Yaml => serde_yaml::to_string(&tree)?,
        },
        TaxonomyStyle::Js => to_js_assignment(&tree)?,
    };
    write_output(&args.out, &text)?;
    info!(
        "taxonomy written with {} unique paths ({} nodes): {}",
        paths.len(),
        tree.node_count(),
        args.out.display()
    );

    match args.format {
        OutputFormat::Json => print_envelope(
            "taxonomy",
            serde_json::json!({
                "output": args.out.display().to_string(),
                "paths": paths.len(),
                "nodes": tree.node_count(),
                "tree": tree,
            }),
        ),
        OutputFormat::Text => {
            println!(
                "{} paths, {} nodes -> {}",
                paths.len(),
                tree.node_count(),
                args.out.display()
            );
            Ok(())
        }
    }
}

fn run_order(args: &OrderArgs) -> Result<()> {
    let tree = TaxonomySource::load(&args.taxonomy)?.into_tree();
    let order = build_category_order(&tree);
    if order.is_empty() {
        warn!("taxonomy {} has no categories", args.taxonomy.display());
    }

    match args.format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct OrderRow<'a> {
                path: &'a CategoryPath,
                index: usize,
            }
            let rows: Vec<OrderRow<'_>> = order
                .iter()
                .map(|(path, index)| OrderRow { path, index })
                .collect();
            print_envelope(
                "order",
                serde_json::json!({
                    "nodes": order.len(),
                    "rows": rows,
                }),
            )
        }
        OutputFormat::Text => {
            for (path, index) in order.iter() {
                let depth = path.len().saturating_sub(1);
                let leaf = path.segments().last().map(String::as_str).unwrap_or("");
                println!("{:6}  {}{}", index, "  ".repeat(depth), leaf);
            }
            println!("\n{} nodes", order.len());
            Ok(())
        }
    }
}

fn run_dashboard(args: &DashboardArgs) -> Result<()> {
    let registry = load_registry(&args.registry)?;
    info!("loaded {} tools from registry", registry.entries.len());
    let report = validate(&registry.entries);
    report.log();
    let uncategorized = report.count(IssueKind::MissingCategoryPath);
    if uncategorized > 0 {
        info!("{uncategorized} tools have no category path and are listed last");
    }

    let taxonomy = TaxonomySource::load(&args.taxonomy)?;
    let records: Vec<ToolRecord> = registry.entries.iter().map(ToolRecord::from_value).collect();
    let paths = merge_registry_paths(&taxonomy.paths(), &records);
    let tree = TaxonomyNode::build_tree(&paths);
    info!("built tree with {} total paths", paths.len());

    let mut tools = registry.entries;
    if args.sort {
        let order = build_category_order(&tree);
        tools = sort::sort_tools(tools, &order);
    }
    let notes_defaulted = ensure_notes(&mut tools);

    let html = render_dashboard(&Dashboard {
        title: &args.title,
        tools: &tools,
        tree: &tree,
        raw_registry: &registry.raw_text,
    })?;
    write_output(&args.out, &html)?;
    info!("wrote {}", args.out.display());

    match args.format {
        OutputFormat::Json => print_envelope(
            "dashboard",
            serde_json::json!({
                "output": args.out.display().to_string(),
                "tools": tools.len(),
                "paths": paths.len(),
                "sorted": args.sort,
                "notes_defaulted": notes_defaulted,
                "warnings": report.len(),
            }),
        ),
        OutputFormat::Text => {
            println!(
                "{} tools, {} category paths -> {}",
                tools.len(),
                paths.len(),
                args.out.display()
            );
            Ok(())
        }
    }
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let style = JsonStyle {
        indent: args.indent,
        ensure_ascii: args.ensure_ascii,
    };
    let out = convert::yaml_to_json(&args.input, args.output.as_deref(), &style)?;
    info!("converted {} -> {}", args.input.display(), out.display());
    Ok(())
}

fn run_scrape(args: &ScrapeArgs) -> Result<()> {
    let start =
        Url::parse(&args.start).with_context(|| format!("invalid start URL {}", args.start))?;
    let config = scrape::ScrapeConfig {
        start,
        user_agent: args.user_agent.clone(),
        page_timeout: Duration::from_secs(args.timeout_secs),
        download_timeout: Duration::from_secs(args.download_timeout_secs),
        delay: Duration::from_millis(args.delay_ms),
    };
    let summary = scrape::run_scrape(&config, &args.links_out, &args.icons_dir)?;

    match args.format {
        OutputFormat::Json => print_envelope("scrape", serde_json::to_value(&summary)?),
        OutputFormat::Text => {
            println!(
                "done: {} tool links, {} icons downloaded ({} already present, {} failed), {} pages failed",
                summary.tool_links,
                summary.icons_downloaded,
                summary.icons_existing,
                summary.icons_failed,
                summary.pages_failed
            );
            Ok(())
        }
    }
}
