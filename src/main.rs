//! Packlane CLI
//!
//! Entry point for the `packlane` command-line tool. Presentation only;
//! the library does the work.

use clap::{Parser, Subcommand};
use packlane::pipeline::{Pipeline, PipelineConfig, BUILD_FAILED_EXIT_CODE};
use packlane::summary::Status;
use packlane::PlatformPair;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "packlane")]
#[command(about = "Workspace package resolver and incremental build lane", version)]
struct Cli {
    /// Path to workspace config file (default: ./packlane.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a package identifier and print its record
    Resolve {
        /// Package identifier
        ident: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List packages matching a pattern (supports trailing /...)
    List {
        /// Identifier or wildcard pattern
        pattern: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Validate resolution, graph, and visibility without building
    Check {
        /// Identifiers or wildcard patterns
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Build packages matching the given patterns
    Build {
        /// Identifiers or wildcard patterns
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Target platform (os/arch, e.g. linux/amd64)
        #[arg(long)]
        platform: Option<String>,

        /// Worker pool size
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Executable output directory
        #[arg(long)]
        bin_dir: Option<PathBuf>,

        /// Output the build report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Cache inspection commands
    Cache {
        #[command(subcommand)]
        action: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cache entries for a package identifier
    Ls {
        /// Package identifier
        ident: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut pipeline_config = PipelineConfig {
        verbose: cli.verbose,
        ..Default::default()
    };
    if let Some(path) = cli.config {
        pipeline_config.config_path = path;
    }

    match cli.command {
        Commands::Resolve { ident, json } => {
            run_resolve(pipeline_config, &ident, json);
        }
        Commands::List { pattern, json } => {
            run_list(pipeline_config, &pattern, json);
        }
        Commands::Check { patterns } => {
            run_check(pipeline_config, patterns);
        }
        Commands::Build {
            patterns,
            platform,
            jobs,
            bin_dir,
            json,
        } => {
            run_build(pipeline_config, patterns, platform, jobs, bin_dir, json);
        }
        Commands::Cache { action } => match action {
            CacheCommands::Ls { ident, json } => {
                run_cache_ls(pipeline_config, &ident, json);
            }
        },
    }
}

fn run_resolve(config: PipelineConfig, ident: &str, json: bool) {
    let mut pipeline = Pipeline::new(config);

    let record = match pipeline.resolve(ident) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if json {
        match serde_json::to_string_pretty(&record) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("{}", record.ident);
    println!("  Directory: {}", record.dir.display());
    println!("  Short name: {}", record.short_name);
    println!("  Declared name: {}", record.declared_name);
    println!("  Files: {}", record.files.len());
    if !record.imports.is_empty() {
        println!("  Imports: {}", record.imports.join(", "));
    }
    if record.is_command {
        println!(
            "  Command package (executable: {})",
            record.executable_name.as_deref().unwrap_or("?")
        );
    }
    if record.is_restricted {
        println!(
            "  Access-restricted (permitted subtree: {})",
            record.permitted_root.as_deref().unwrap_or("")
        );
    }
}

fn run_list(config: PipelineConfig, pattern: &str, json: bool) {
    let mut pipeline = Pipeline::new(config);

    let idents = match pipeline.list(pattern) {
        Ok(idents) => idents,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if json {
        match serde_json::to_string_pretty(&idents) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for ident in idents {
        println!("{}", ident);
    }
}

fn run_check(config: PipelineConfig, patterns: Vec<String>) {
    let mut pipeline = Pipeline::new(config);

    match pipeline.check(&patterns) {
        Ok(summary) => {
            println!("Graph valid.");
            println!("  Packages: {}", summary.packages);
            println!("  Edges: {}", summary.edges);
            println!("  Commands: {}", summary.commands);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run_build(
    mut config: PipelineConfig,
    patterns: Vec<String>,
    platform: Option<String>,
    jobs: Option<usize>,
    bin_dir: Option<PathBuf>,
    json: bool,
) {
    if let Some(raw) = platform {
        match raw.parse::<PlatformPair>() {
            Ok(platform) => config.platform = Some(platform),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }
    config.jobs = jobs;
    config.bin_dir = bin_dir;

    let mut pipeline = Pipeline::new(config);

    let report = match pipeline.build(&patterns) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!(
            "Build {}: {} package(s), {} compiled, {} cached",
            if report.succeeded() { "succeeded" } else { "FAILED" },
            report.nodes.len(),
            report.compiled_count(),
            report.cached_count(),
        );
        for node in &report.nodes {
            match node.status {
                Status::Failed => {
                    let location = match (&node.failure_file, node.failure_line) {
                        (Some(file), Some(line)) => format!(" ({}:{})", file, line),
                        (Some(file), None) => format!(" ({})", file),
                        _ => String::new(),
                    };
                    println!(
                        "  FAILED  {}{}: {}",
                        node.ident,
                        location,
                        node.failure.as_deref().unwrap_or("unknown failure")
                    );
                }
                Status::Blocked => {
                    let roots: Vec<&str> =
                        node.blocked_by.iter().map(|i| i.as_str()).collect();
                    println!("  BLOCKED {} (by {})", node.ident, roots.join(", "));
                }
                Status::Success => {
                    if let Some(exe) = &node.executable {
                        println!("  OK      {} -> {}", node.ident, exe.display());
                    }
                }
            }
        }
    }

    if !report.succeeded() {
        process::exit(BUILD_FAILED_EXIT_CODE);
    }
}

fn run_cache_ls(config: PipelineConfig, ident: &str, json: bool) {
    let mut pipeline = Pipeline::new(config);

    let entries = match pipeline.cache_entries(ident) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    };

    if json {
        match serde_json::to_string_pretty(&entries) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    if entries.is_empty() {
        println!("No cache entries for {}", ident);
        return;
    }

    println!("Cache entries for {} ({} total):\n", ident, entries.len());
    for entry in entries {
        println!("  {} {}", entry.platform, entry.fingerprint);
        println!("    Created: {}", entry.created_at.to_rfc3339());
        if !entry.dep_fingerprints.is_empty() {
            println!("    Dep fingerprints: {}", entry.dep_fingerprints.len());
        }
    }
}
