//! bomkit CLI - supplier data and order quantities for KiCad legacy projects.

use anyhow::{bail, Context};
use bomkit::{
    Bom, BomkitCore, CacheKey, CacheOutcome, ComponentCache, DiagnosticKind, FileBackend,
    Project, RoundingPolicy, StoreOutcome, SupplierData, UserField,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "bomkit")]
#[command(about = "Supplier data and BOM tool for KiCad legacy schematics", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Component cache file (default from the project settings)
    #[arg(long, value_name = "FILE", global = true)]
    cache_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the components of a project
    List {
        /// Project directory, .pro file or root .sch file
        #[arg(value_name = "PROJECT", default_value = ".")]
        project: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Report parse warnings and components without supplier data
    Check {
        #[arg(value_name = "PROJECT", default_value = ".")]
        project: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if any enabled component lacks a supplier number
        #[arg(long)]
        fail_on_unassigned: bool,
    },

    /// Assign supplier data to components and write it into the schematic
    Assign(AssignArgs),

    /// Remove supplier data from components
    Clear {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Designators or row keys
        #[arg(value_name = "DESIGNATOR", required = true)]
        designators: Vec<String>,
    },

    /// Print the bill of materials
    Bom {
        #[arg(value_name = "PROJECT", default_value = ".")]
        project: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Multiplier applied to every line
        #[arg(long, value_name = "N")]
        multiplier: Option<u64>,

        /// Spare parts added to every line
        #[arg(long, value_name = "N")]
        adder: Option<u64>,

        /// Number of boards
        #[arg(long, value_name = "N")]
        global_multiplier: Option<u64>,

        /// Rounding policy as <digit>,<exponent>, e.g. 5,1 rounds up to multiples of 50
        #[arg(long, value_name = "D,E")]
        rounding: Option<RoundingPolicy>,
    },

    /// Show cached supplier data for components that have none
    Suggest {
        #[arg(value_name = "PROJECT", default_value = ".")]
        project: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Assign the suggestion where exactly one cached record matches
        #[arg(long)]
        apply: bool,
    },

    /// Inspect and maintain the component cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Args)]
struct AssignArgs {
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// Designators or row keys
    #[arg(value_name = "DESIGNATOR", required = true)]
    designators: Vec<String>,

    #[arg(long)]
    manufacturer: Option<String>,

    #[arg(long, value_name = "NUMBER")]
    mfr_no: Option<String>,

    #[arg(long)]
    supplier: Option<String>,

    #[arg(long, value_name = "NUMBER")]
    supplier_no: Option<String>,

    #[arg(long, value_name = "URL")]
    datasheet: Option<String>,

    /// Use a cached record instead of the field options
    #[arg(long, value_name = "HASH", conflicts_with_all = ["manufacturer", "mfr_no", "supplier", "supplier_no", "datasheet"])]
    from_cache: Option<String>,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List every cached record
    List {
        #[arg(value_name = "PROJECT", default_value = ".")]
        project: PathBuf,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show the records cached for one part
    Lookup {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
        library_reference: String,
        value: String,
        footprint: String,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Delete one cached record
    Remove {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
        library_reference: String,
        value: String,
        footprint: String,
        hash: String,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let cache_file = cli.cache_file;
    match cli.command {
        Commands::List { project, format } => handle_list(&project, format),
        Commands::Check {
            project,
            format,
            fail_on_unassigned,
        } => handle_check(&project, format, fail_on_unassigned),
        Commands::Assign(args) => handle_assign(args, cache_file),
        Commands::Clear {
            project,
            designators,
        } => handle_clear(&project, &designators),
        Commands::Bom {
            project,
            format,
            multiplier,
            adder,
            global_multiplier,
            rounding,
        } => {
            let mut project = open_project(&project)?;
            if let Some(m) = multiplier {
                project.settings.default_multiplier = m;
            }
            if let Some(a) = adder {
                project.settings.default_adder = a;
            }
            if let Some(g) = global_multiplier {
                project.settings.global_multiplier = g;
            }
            if let Some(r) = rounding {
                project.settings.rounding = r;
            }
            output_bom(&project.bom(), &format)?;
            Ok(0)
        }
        Commands::Suggest {
            project,
            format,
            apply,
        } => handle_suggest(&project, format, apply, cache_file),
        Commands::Cache(command) => handle_cache(command, cache_file),
    }
}

fn open_project(path: &Path) -> anyhow::Result<Project> {
    BomkitCore::open_project(path)
        .with_context(|| format!("cannot open project {}", path.display()))
}

fn open_cache(project: &Project, cache_file: Option<PathBuf>) -> anyhow::Result<ComponentCache> {
    let path = cache_file.unwrap_or_else(|| project.cache_path());
    ComponentCache::open(FileBackend::new(&path))
        .with_context(|| format!("cannot open component cache {}", path.display()))
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn handle_list(path: &Path, format: OutputFormat) -> anyhow::Result<i32> {
    let project = open_project(path)?;
    let document = &project.document;

    match format {
        OutputFormat::Human => {
            println!(
                "{:<18} {:<28} {:<12} {:<28} {:<12} {}",
                "Designators", "Library", "Value", "Footprint", "Supplier", "Supplier no"
            );
            println!("{}", "─".repeat(110));
            for record in document.components() {
                let marker = if document.is_enabled(&record.key()) { "" } else { " (disabled)" };
                println!(
                    "{:<18} {:<28} {:<12} {:<28} {:<12} {}{}",
                    record.key(),
                    record.library_reference,
                    record.value,
                    record.footprint,
                    record.supplier.as_deref().unwrap_or("-"),
                    record.supplier_number.as_deref().unwrap_or("-"),
                    marker
                );
            }
        }
        OutputFormat::Json => {
            let components: Vec<serde_json::Value> = document
                .components()
                .map(|r| {
                    serde_json::json!({
                        "key": r.key(),
                        "enabled": document.is_enabled(&r.key()),
                        "component": r,
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "files": document.files(),
                "components": components,
            }))?;
        }
    }
    Ok(0)
}

fn handle_check(path: &Path, format: OutputFormat, fail_on_unassigned: bool) -> anyhow::Result<i32> {
    let project = open_project(path)?;
    let document = &project.document;
    let unassigned = BomkitCore::unassigned(document);

    match format {
        OutputFormat::Human => {
            println!("Project: {}", project.directory.display());
            println!("{}", "─".repeat(60));
            println!("  Sheets:     {}", document.files().len());
            println!("  Components: {}", document.len());

            if !document.diagnostics().is_empty() {
                println!("\n  WARNINGS:");
                for d in document.diagnostics() {
                    let kind = match d.kind {
                        DiagnosticKind::DuplicateAlias => "duplicate alias",
                        DiagnosticKind::OverlappingComponent => "overlap",
                        DiagnosticKind::MissingSheet => "missing sheet",
                    };
                    println!("    - [{}] {}:{}: {}", kind, d.file.display(), d.line, d.message);
                }
            }

            if unassigned.is_empty() {
                println!("\n  All components have a supplier number");
            } else {
                println!("\n  Without supplier number:");
                for key in &unassigned {
                    println!("    - {}", key);
                }
            }
        }
        OutputFormat::Json => {
            print_json(&serde_json::json!({
                "files": document.files(),
                "components": document.len(),
                "diagnostics": document.diagnostics(),
                "unassigned": unassigned,
            }))?;
        }
    }

    if fail_on_unassigned && !unassigned.is_empty() {
        return Ok(1);
    }
    Ok(0)
}

fn handle_assign(args: AssignArgs, cache_file: Option<PathBuf>) -> anyhow::Result<i32> {
    let mut project = open_project(&args.project)?;
    let mut cache = open_cache(&project, cache_file)?;

    let data = match &args.from_cache {
        Some(hash) => {
            let Some((library_reference, value, footprint)) =
                project.document.unique_triple(&args.designators)
            else {
                bail!("--from-cache needs components that share library reference, value and footprint");
            };
            cache
                .lookup(&library_reference, &value, &footprint)
                .into_iter()
                .find(|(h, _)| h.starts_with(hash.as_str()))
                .map(|(_, record)| record.clone())
                .with_context(|| format!("no cached record {} for {} {}", hash, library_reference, value))?
        }
        None => {
            // Fields not given keep the value of the first selected component.
            let first = project
                .document
                .get_component(&args.designators[0])
                .with_context(|| format!("no component with designator '{}'", args.designators[0]))?;
            let mut data = first.supplier_data();
            let given = [
                (UserField::Manufacturer, &args.manufacturer),
                (UserField::ManufacturerNumber, &args.mfr_no),
                (UserField::Supplier, &args.supplier),
                (UserField::SupplierNumber, &args.supplier_no),
                (UserField::Datasheet, &args.datasheet),
            ];
            for (field, value) in given {
                if let Some(value) = value {
                    data.set(field, value);
                }
            }
            data
        }
    };

    let report = BomkitCore::assign(&mut project.document, &mut cache, &args.designators, &data)?;
    let saved = BomkitCore::save(&project.document)?;

    println!("Updated {} component(s)", report.updated);
    match report.cache {
        CacheOutcome::Stored(StoreOutcome::Inserted { hash }) => println!("Cached as {}", hash),
        CacheOutcome::Stored(StoreOutcome::AlreadyPresent { hash }) => println!("Already cached as {}", hash),
        CacheOutcome::Ambiguous(triples) => {
            println!("Not cached, the selection mixes parts:");
            for triple in triples {
                println!("  - {}", triple);
            }
        }
        CacheOutcome::NothingToStore => {}
    }
    for file in &saved.rewritten {
        println!("Wrote {}", file.display());
    }
    Ok(0)
}

fn handle_clear(path: &Path, designators: &[String]) -> anyhow::Result<i32> {
    let mut project = open_project(path)?;
    let cleared = project.document.clear_assignments(designators)?;
    let saved = BomkitCore::save(&project.document)?;
    println!("Cleared {} component(s)", cleared);
    for file in &saved.rewritten {
        println!("Wrote {}", file.display());
    }
    Ok(0)
}

fn output_bom(bom: &Bom, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Human => {
            println!(
                "{:>6} {:<24} {:<12} {:<28} {:<12} {}",
                "Qty", "Designators", "Value", "Footprint", "Supplier", "Supplier no"
            );
            println!("{}", "─".repeat(100));
            for line in bom.lines() {
                let marker = if line.is_overridden() { "*" } else { "" };
                println!(
                    "{:>6} {:<24} {:<12} {:<28} {:<12} {}{}",
                    line.total(),
                    line.designators().join(","),
                    line.value,
                    line.footprint,
                    line.supplier.as_deref().unwrap_or("-"),
                    line.supplier_number.as_deref().unwrap_or("-"),
                    marker
                );
            }
            println!("\n  Lines: {}", bom.lines().len());
            println!("  Parts: {}", bom.total_parts());
            println!("  Boards: {}", bom.global_multiplier());
            println!("  Rounding: {}", bom.rounding());
        }
        OutputFormat::Json => {
            let lines: Vec<serde_json::Value> = bom
                .lines()
                .iter()
                .map(|l| {
                    serde_json::json!({
                        "designators": l.designators(),
                        "library_reference": l.library_reference,
                        "value": l.value,
                        "footprint": l.footprint,
                        "manufacturer": l.manufacturer,
                        "manufacturer_number": l.manufacturer_number,
                        "supplier": l.supplier,
                        "supplier_number": l.supplier_number,
                        "datasheet": l.datasheet,
                        "quantity": l.quantity(),
                        "multiplier": l.multiplier(),
                        "adder": l.adder(),
                        "total": l.total(),
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "lines": lines,
                "global_multiplier": bom.global_multiplier(),
                "rounding": bom.rounding(),
                "total_parts": bom.total_parts(),
            }))?;
        }
    }
    Ok(())
}

fn handle_suggest(
    path: &Path,
    format: OutputFormat,
    apply: bool,
    cache_file: Option<PathBuf>,
) -> anyhow::Result<i32> {
    let mut project = open_project(path)?;
    let mut cache = open_cache(&project, cache_file)?;
    let suggestions = BomkitCore::suggest(&project.document, &cache);

    match format {
        OutputFormat::Human => {
            if suggestions.is_empty() {
                println!("No suggestions");
            }
            for suggestion in &suggestions {
                println!("{}:", suggestion.key);
                for (hash, record) in &suggestion.candidates {
                    println!("  {} {}", short_hash(hash), describe(record));
                }
            }
        }
        OutputFormat::Json => print_json(&serde_json::to_value(&suggestions)?)?,
    }

    if apply {
        let mut applied = 0;
        for suggestion in suggestions.iter().filter(|s| s.candidates.len() == 1) {
            let (_, record) = &suggestion.candidates[0];
            BomkitCore::assign(&mut project.document, &mut cache, &[&suggestion.key], record)?;
            applied += 1;
        }
        if applied > 0 {
            let saved = BomkitCore::save(&project.document)?;
            eprintln!("Applied {} suggestion(s), wrote {} file(s)", applied, saved.rewritten.len());
        }
    }
    Ok(0)
}

/// First twelve characters of a cache hash. Keys from older cache files are
/// arbitrary strings, so this counts characters, not bytes.
fn short_hash(hash: &str) -> String {
    hash.chars().take(12).collect()
}

fn describe(record: &SupplierData) -> String {
    UserField::ALL
        .iter()
        .filter_map(|f| record.get(*f).map(|v| format!("{}={}", f.column_name(), v)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn handle_cache(command: CacheCommands, cache_file: Option<PathBuf>) -> anyhow::Result<i32> {
    match command {
        CacheCommands::List { project, format } => {
            let project = open_project(&project)?;
            let cache = open_cache(&project, cache_file)?;
            let entries = cache.entries();
            match format {
                OutputFormat::Human => {
                    println!("Cache: {} ({} records)", cache.backend_name(), entries.len());
                    for entry in &entries {
                        println!("  {} {}", short_hash(&entry.hash), entry.key);
                        println!("      {}", describe(&entry.record));
                    }
                }
                OutputFormat::Json => print_json(&serde_json::to_value(&entries)?)?,
            }
            Ok(0)
        }
        CacheCommands::Lookup {
            project,
            library_reference,
            value,
            footprint,
            format,
        } => {
            let project = open_project(&project)?;
            let cache = open_cache(&project, cache_file)?;
            let hits = cache.lookup(&library_reference, &value, &footprint);
            match format {
                OutputFormat::Human => {
                    if hits.is_empty() {
                        println!("Nothing cached for {} / {} / {}", library_reference, value, footprint);
                    }
                    for (hash, record) in &hits {
                        println!("  {} {}", hash, describe(record));
                    }
                }
                OutputFormat::Json => {
                    let hits: serde_json::Map<String, serde_json::Value> = hits
                        .into_iter()
                        .map(|(hash, record)| Ok::<_, serde_json::Error>((hash.to_string(), serde_json::to_value(record)?)))
                        .collect::<Result<_, serde_json::Error>>()?;
                    print_json(&serde_json::Value::Object(hits))?;
                }
            }
            Ok(0)
        }
        CacheCommands::Remove {
            project,
            library_reference,
            value,
            footprint,
            hash,
        } => {
            let project = open_project(&project)?;
            let mut cache = open_cache(&project, cache_file)?;
            let key = CacheKey::new(library_reference, value, footprint);
            match cache.remove(&key, &hash)? {
                Some(_) => {
                    println!("Removed {} from {}", hash, key);
                    Ok(0)
                }
                None => {
                    eprintln!("Error: no cached record {} for {}", hash, key);
                    Ok(1)
                }
            }
        }
    }
}
