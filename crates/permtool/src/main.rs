use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use permtool_core::builder::{PermissionSetMetadata, build};
use permtool_core::config::{PermtoolConfig, load_config};
use permtool_core::csv::parse_records;
use permtool_core::dedup::{DedupStats, RootElement, deduplicate};
use permtool_core::project::extract_to_csv;
use permtool_core::registry::{ALL_TYPES, PermissionType};
use permtool_core::roster::{filter_roster, parse_email_list};
use permtool_core::session::PermissionSession;
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(
    name = "permtool",
    version,
    about = "Salesforce profile and permission-set metadata tooling"
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "List supported permission types and their CSV columns")]
    Types(TypesArgs),
    #[command(about = "Extract permission entries from metadata XML into CSV")]
    Extract(ExtractArgs),
    #[command(about = "Merge metadata XML documents, keeping the first occurrence per identity")]
    Dedupe(DedupeArgs),
    #[command(about = "Build permission-set XML from CSV input")]
    Build(BuildArgs),
    #[command(
        name = "roster-filter",
        about = "Remove rows from a user roster CSV by email"
    )]
    RosterFilter(RosterFilterArgs),
}

#[derive(Debug, Args)]
struct TypesArgs {
    #[arg(long, help = "Print the registry as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(value_name = "INPUT", help = "Metadata XML file or directory")]
    input: PathBuf,
    #[arg(
        long,
        value_name = "LIST",
        help = "Comma-separated permission type tags, or `all`"
    )]
    types: Option<String>,
    #[arg(long, value_name = "DIR", help = "Write one CSV per type into DIR")]
    out: Option<PathBuf>,
    #[arg(long, help = "Also write the combined CSV with a PermissionType column")]
    combined: bool,
}

#[derive(Debug, Args)]
struct DedupeArgs {
    #[arg(
        value_name = "INPUTS",
        required = true,
        help = "Metadata XML files or directories, in merge order (first wins)"
    )]
    inputs: Vec<PathBuf>,
    #[arg(
        long,
        value_name = "LIST",
        help = "Comma-separated permission type tags, or `all`"
    )]
    types: Option<String>,
    #[arg(
        long,
        value_name = "ELEMENT",
        help = "Root element of the merged document: profile or permissionset"
    )]
    root: Option<String>,
    #[arg(long, value_name = "FILE", help = "Write the merged XML to FILE")]
    out: Option<PathBuf>,
    #[arg(long, help = "Report statistics as JSON")]
    json_stats: bool,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[arg(long, value_name = "LABEL", help = "Permission set label")]
    name: String,
    #[arg(long, value_name = "TEXT")]
    description: Option<String>,
    #[arg(long, help = "Set hasActivationRequired to true")]
    activation_required: bool,
    #[arg(
        long,
        value_name = "NAME",
        help = "Custom API name (derived from the label when omitted)"
    )]
    api_name: Option<String>,
    #[arg(
        long = "csv",
        value_name = "TYPE=FILE",
        required = true,
        help = "CSV input per permission type; repeatable, later rows win on re-added identities"
    )]
    csv: Vec<String>,
    #[arg(long, value_name = "FILE", help = "Write the XML to FILE")]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RosterFilterArgs {
    #[arg(long, value_name = "FILE", help = "User roster CSV")]
    csv: PathBuf,
    #[arg(
        long,
        value_name = "LIST",
        help = "Comma-separated emails to remove",
        conflicts_with = "remove_file"
    )]
    remove: Option<String>,
    #[arg(long, value_name = "FILE", help = "File with emails to remove, one per line")]
    remove_file: Option<PathBuf>,
    #[arg(long, value_name = "FILE", help = "Write the filtered CSV to FILE")]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Types(args)) => run_types(args),
        Some(Commands::Extract(args)) => run_extract(&config, args),
        Some(Commands::Dedupe(args)) => run_dedupe(&config, args),
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::RosterFilter(args)) => run_roster_filter(args),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_types(args: TypesArgs) -> Result<()> {
    if args.json {
        let entries: Vec<serde_json::Value> = ALL_TYPES
            .iter()
            .map(|permission_type| {
                let spec = permission_type.spec();
                serde_json::json!({
                    "type": spec.tag,
                    "identity": spec.identity,
                    "required_columns": spec.required_columns,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for permission_type in ALL_TYPES {
        let spec = permission_type.spec();
        println!(
            "{}: identity={} columns={}",
            spec.tag,
            spec.identity.join("|"),
            spec.required_columns.join(",")
        );
    }
    Ok(())
}

fn run_extract(config: &PermtoolConfig, args: ExtractArgs) -> Result<()> {
    let types = resolve_types(config, args.types.as_deref())?;
    let documents = collect_documents(&[args.input.clone()])?;
    let xml = documents
        .iter()
        .map(|(_, content)| content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let report = extract_to_csv(&xml, &types)?;
    if report.total == 0 {
        bail!("no permissions found in the input");
    }

    match &args.out {
        Some(out_dir) => {
            fs::create_dir_all(out_dir)
                .with_context(|| format!("failed to create {}", out_dir.display()))?;
            println!("extract");
            println!("input: {}", normalize_path(&args.input));
            println!("documents: {}", documents.len());
            for section in &report.sections {
                let path = out_dir.join(format!("{}.csv", section.permission_type.tag()));
                fs::write(&path, &section.csv)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("{}: {} entries -> {}", section.permission_type, section.count, normalize_path(&path));
            }
            if args.combined {
                match &report.combined_csv {
                    Some(combined) => {
                        let path = out_dir.join("all_permissions.csv");
                        fs::write(&path, combined)
                            .with_context(|| format!("failed to write {}", path.display()))?;
                        println!("combined: {} entries -> {}", report.total, normalize_path(&path));
                    }
                    None => println!("combined: <single type, skipped>"),
                }
            }
            println!("total: {}", report.total);
        }
        None => {
            for section in &report.sections {
                print!("{}", section.csv);
            }
            if args.combined
                && let Some(combined) = &report.combined_csv
            {
                print!("{combined}");
            }
        }
    }
    Ok(())
}

fn run_dedupe(config: &PermtoolConfig, args: DedupeArgs) -> Result<()> {
    let types = resolve_types(config, args.types.as_deref())?;
    let root = match &args.root {
        Some(name) => RootElement::from_name(name).with_context(|| {
            format!("invalid root element: {name} (expected profile or permissionset)")
        })?,
        None => config.dedupe_root()?,
    };

    let documents = collect_documents(&args.inputs)?;
    if documents.is_empty() {
        bail!("no metadata XML files found in the given inputs");
    }
    let contents: Vec<String> = documents
        .iter()
        .map(|(_, content)| content.clone())
        .collect();

    let outcome = deduplicate(&contents, &types)?;
    let xml = outcome.render(root);

    match &args.out {
        Some(out_path) => {
            fs::write(out_path, &xml)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            println!("dedupe");
            for (name, _) in &documents {
                println!("input: {name}");
            }
            println!("root: {root}");
            println!("output: {}", normalize_path(out_path));
            if args.json_stats {
                println!("{}", serde_json::to_string_pretty(&outcome.stats)?);
            } else {
                print_dedup_stats(&outcome.stats);
            }
        }
        None => {
            println!("{xml}");
            if args.json_stats {
                eprintln!("{}", serde_json::to_string_pretty(&outcome.stats)?);
            } else {
                eprintln!(
                    "processed {} permissions: {} unique, {} duplicates removed",
                    outcome.stats.total_processed,
                    outcome.stats.total_unique,
                    outcome.stats.total_duplicates
                );
            }
        }
    }
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<()> {
    let mut session = PermissionSession::new();
    let mut warnings = Vec::new();
    let mut inputs = Vec::new();

    for entry in &args.csv {
        let (type_name, path) = entry
            .split_once('=')
            .with_context(|| format!("expected TYPE=FILE, got: {entry}"))?;
        let permission_type = PermissionType::from_tag(type_name.trim())?;
        let path = Path::new(path.trim());
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let outcome = parse_records(&content, permission_type)?;
        inputs.push((permission_type, outcome.records.len()));
        warnings.extend(outcome.warnings);
        session.add(outcome.records);
    }

    let metadata = PermissionSetMetadata {
        name: args.name,
        description: args.description,
        activation_required: args.activation_required,
        api_name: args.api_name,
    };
    let xml = build(&session, &metadata)?;

    for warning in &warnings {
        eprintln!("warning: {warning}");
    }
    match &args.out {
        Some(out_path) => {
            fs::write(out_path, &xml)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            println!("build");
            for (permission_type, count) in &inputs {
                println!("{permission_type}: {count} parsed");
            }
            println!("total: {}", session.total());
            println!("output: {}", normalize_path(out_path));
        }
        None => println!("{xml}"),
    }
    Ok(())
}

fn run_roster_filter(args: RosterFilterArgs) -> Result<()> {
    let emails_text = match (&args.remove, &args.remove_file) {
        (Some(list), _) => list.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("either --remove or --remove-file is required"),
    };
    let emails = parse_email_list(&emails_text);

    let csv_text = fs::read_to_string(&args.csv)
        .with_context(|| format!("failed to read {}", args.csv.display()))?;
    let report = filter_roster(&csv_text, &emails)?;

    match &args.out {
        Some(out_path) => {
            fs::write(out_path, &report.csv)
                .with_context(|| format!("failed to write {}", out_path.display()))?;
            println!("roster-filter");
            println!("input: {}", normalize_path(&args.csv));
            println!("removed: {}", report.removed);
            println!("remaining: {}", report.remaining);
            println!("output: {}", normalize_path(out_path));
        }
        None => {
            print!("{}", report.csv);
            eprintln!(
                "removed {} rows, {} remaining",
                report.removed, report.remaining
            );
        }
    }
    Ok(())
}

fn print_dedup_stats(stats: &DedupStats) {
    println!("stats.total_processed: {}", stats.total_processed);
    println!("stats.total_unique: {}", stats.total_unique);
    println!("stats.total_duplicates: {}", stats.total_duplicates);
    for (tag, counts) in &stats.by_type {
        println!(
            "stats.{tag}: total={} unique={} duplicates={}",
            counts.total, counts.unique, counts.duplicates
        );
    }
}

fn resolve_config(override_path: Option<&Path>) -> Result<PermtoolConfig> {
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => match std::env::var("PERMTOOL_CONFIG") {
            Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
            _ => PathBuf::from("permtool.toml"),
        },
    };
    load_config(&path)
}

fn resolve_types(config: &PermtoolConfig, selection: Option<&str>) -> Result<Vec<PermissionType>> {
    match selection {
        None => config.extract_types(),
        Some(list) if list.trim().eq_ignore_ascii_case("all") => Ok(ALL_TYPES.to_vec()),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| PermissionType::from_tag(name).map_err(Into::into))
            .collect(),
    }
}

/// Expand files and directories into named documents. Directories are
/// walked for metadata XML files in sorted order; explicit files are
/// read as-is. Input order is preserved because the merge is first-wins.
fn collect_documents(inputs: &[PathBuf]) -> Result<Vec<(String, String)>> {
    let mut documents = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut paths: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_metadata_file(path))
                .collect();
            paths.sort();
            for path in paths {
                documents.push(read_document(&path)?);
            }
        } else {
            documents.push(read_document(input)?);
        }
    }
    Ok(documents)
}

fn read_document(path: &Path) -> Result<(String, String)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok((normalize_path(path), content))
}

fn is_metadata_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    name.ends_with(".xml") || name.ends_with(".profile") || name.ends_with(".permissionset")
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
