// src/main.rs

use anyhow::{Context, Result};
use clap::{ArgGroup, CommandFactory, Parser};
use clap_complete::Shell;
use ploc::db::DEFAULT_DB_PATH;
use ploc::request::{self, PackageRequest};
use ploc::{
    Chooser, ConsoleChooser, ExitStatus, InstallOptions, Installer, Registry, ScriptedChooser,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Operations that `--group` and `--force` cannot be combined with
const NON_INSTALL_OPERATIONS: [&str; 7] = [
    "remove",
    "list",
    "search",
    "search_unique",
    "all",
    "verify",
    "completions",
];

#[derive(Parser, Debug)]
#[command(name = "ploc")]
#[command(author, version, about = "Track where local binaries are installed", long_about = None)]
#[command(group(ArgGroup::new("operation").required(true).multiple(false)))]
struct Cli {
    /// Install SOURCE as DEST (absolute; a trailing '/' keeps the source's file name)
    #[arg(short = 'i', long, num_args = 2, value_names = ["SOURCE", "DEST"], group = "operation")]
    install: Option<Vec<String>>,

    /// Remove a package, given as NAME or /dir/NAME
    #[arg(short = 'r', long, value_name = "NAME", group = "operation")]
    remove: Option<String>,

    /// Show name, group and path of a package
    #[arg(short = 'l', long = "list", value_name = "NAME", group = "operation")]
    list: Option<String>,

    /// Show every directory a package is installed in
    #[arg(short = 's', long = "search", value_name = "NAME", group = "operation")]
    search: Option<String>,

    /// Check whether /dir/NAME is installed
    #[arg(short = 'S', long = "search-unique", value_name = "PATH", group = "operation")]
    search_unique: Option<String>,

    /// List every installed package
    #[arg(short = 'a', long = "all", group = "operation")]
    all: bool,

    /// Compare installed files with their recorded hashes (all packages if NAME is omitted)
    #[arg(long, value_name = "NAME", num_args = 0..=1, group = "operation")]
    verify: Option<Option<String>>,

    /// Print a shell completion script
    #[arg(long, value_name = "SHELL", group = "operation")]
    completions: Option<Shell>,

    /// Group recorded for the installed package
    #[arg(short, long, conflicts_with_all = NON_INSTALL_OPERATIONS)]
    group: Option<String>,

    /// Overwrite a package already installed at the destination
    #[arg(short, long, conflicts_with_all = NON_INSTALL_OPERATIONS)]
    force: bool,

    /// Answer the "multiple packages" prompt with this index
    #[arg(long, value_name = "INDEX")]
    select: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Database path
    #[arg(short, long, env = "PLOC_DB", default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();
}

/// Map the first ploc error in the chain to its exit code
fn exit_status(err: &anyhow::Error) -> ExitStatus {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ploc::Error>())
        .map(ploc::Error::exit_status)
        .unwrap_or(ExitStatus::FilesystemFailure)
}

fn chooser_for(select: Option<usize>) -> Box<dyn Chooser> {
    match select {
        Some(index) => Box::new(ScriptedChooser::new([index])),
        None => Box::new(ConsoleChooser::stdio()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.install.is_none() && (cli.force || cli.group.is_some()) {
        return Err(
            ploc::Error::InvalidArgument("--group and --force only apply to -i".to_string()).into(),
        );
    }

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "ploc", &mut io::stdout());
        return Ok(());
    }

    let mut registry = Registry::open(&cli.db_path)
        .with_context(|| format!("Cannot use registry at {}", cli.db_path))?;
    let mut installer = Installer::new(&mut registry);

    if let Some(args) = &cli.install {
        let (Some(source), Some(destination)) = (args.first(), args.get(1)) else {
            return Err(ploc::Error::InvalidArgument("-i needs SOURCE and DEST".to_string()).into());
        };
        let source = PathBuf::from(source);
        let package = request::install_target(&source, destination, cli.group.as_deref())?;

        let report = installer.install(package, &source, InstallOptions { force: cli.force })?;
        if cli.json {
            print_json(&report)?;
        } else {
            let verb = if report.replaced { "Reinstalled" } else { "Installed" };
            println!(
                "{} {} to {}",
                verb,
                report.package.name,
                report.package.location().display()
            );
            println!("  Group: {}", report.package.group);
            println!("  Size: {} bytes", report.bytes);
        }
        return Ok(());
    }

    if let Some(operand) = &cli.remove {
        let request = PackageRequest::parse(operand)?;
        let removed = installer.remove(&request, &mut *chooser_for(cli.select))?;
        println!("Removed {}", removed.location().display());
        return Ok(());
    }

    if let Some(operand) = &cli.list {
        let request = PackageRequest::parse(operand)?;
        let package = installer.describe(&request, &mut *chooser_for(cli.select))?;
        if cli.json {
            print_json(&package)?;
        } else {
            println!("Name:\t{}", package.name);
            println!("Group:\t{}", package.group);
            println!("Path:\t{}", package.path);
        }
        return Ok(());
    }

    if let Some(name) = &cli.search {
        let paths = installer.search_all(name)?;
        debug!("{} location(s) for {}", paths.len(), name);
        if cli.json {
            print_json(&paths)?;
        } else if paths.is_empty() {
            println!("{} is not recorded", name);
        } else {
            for path in &paths {
                println!("{}{}", path, name);
            }
        }
        return Ok(());
    }

    if let Some(operand) = &cli.search_unique {
        let request = PackageRequest::parse(operand)?;
        let path = request.require_path()?;
        let installed = installer.search_unique(&request.name, path)?;
        if cli.json {
            print_json(&serde_json::json!({
                "name": request.name,
                "path": path,
                "installed": installed,
            }))?;
        } else if installed {
            println!("{} is installed", request);
        } else {
            println!("{} is not recorded", request);
        }
        return Ok(());
    }

    if cli.all {
        let packages = installer.list_all()?;
        if cli.json {
            print_json(&packages)?;
        } else if packages.is_empty() {
            println!("No packages installed.");
        } else {
            println!("{:<6} {:<20} {:<20} PATH", "ID", "NAME", "GROUP");
            for package in &packages {
                println!(
                    "{:<6} {:<20} {:<20} {}",
                    package.id.unwrap_or_default(),
                    package.name,
                    package.group,
                    package.path
                );
            }
            println!("\nTotal: {} package(s)", packages.len());
        }
        return Ok(());
    }

    if let Some(name) = &cli.verify {
        let reports = installer.verify(name.as_deref())?;
        if cli.json {
            print_json(&reports)?;
        } else {
            for report in &reports {
                println!(
                    "{:<10} {}",
                    format!("{:?}", report.status).to_lowercase(),
                    report.package.location().display()
                );
            }
        }
        info!("Verified {} package(s)", reports.len());
        return Ok(());
    }

    // clap's required "operation" group makes this unreachable from the CLI
    Err(ploc::Error::InvalidArgument("No operation given".to_string()).into())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitStatus::ArgumentSyntax.into()
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ploc: {:#}", e);
            exit_status(&e).into()
        }
    }
}
