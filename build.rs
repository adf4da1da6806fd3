// build.rs

use clap::{Arg, ArgAction, ArgGroup, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

const NON_INSTALL_OPERATIONS: [&str; 7] = [
    "remove",
    "list",
    "search",
    "search_unique",
    "all",
    "verify",
    "completions",
];

fn build_cli() -> Command {
    Command::new("ploc")
        .version(env!("CARGO_PKG_VERSION"))
        .author("ploc Contributors")
        .about("Track where local binaries are installed")
        .arg(
            Arg::new("install")
                .short('i')
                .long("install")
                .num_args(2)
                .value_names(["SOURCE", "DEST"])
                .help("Install SOURCE as DEST (absolute; a trailing '/' keeps the source's file name)"),
        )
        .arg(
            Arg::new("remove")
                .short('r')
                .long("remove")
                .value_name("NAME")
                .help("Remove a package, given as NAME or /dir/NAME"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .value_name("NAME")
                .help("Show name, group and path of a package"),
        )
        .arg(
            Arg::new("search")
                .short('s')
                .long("search")
                .value_name("NAME")
                .help("Show every directory a package is installed in"),
        )
        .arg(
            Arg::new("search_unique")
                .short('S')
                .long("search-unique")
                .value_name("PATH")
                .help("Check whether /dir/NAME is installed"),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .action(ArgAction::SetTrue)
                .help("List every installed package"),
        )
        .arg(
            Arg::new("verify")
                .long("verify")
                .value_name("NAME")
                .num_args(0..=1)
                .help("Compare installed files with their recorded hashes"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                .help("Print a shell completion script"),
        )
        .group(
            ArgGroup::new("operation")
                .args([
                    "install",
                    "remove",
                    "list",
                    "search",
                    "search_unique",
                    "all",
                    "verify",
                    "completions",
                ])
                .required(true),
        )
        .arg(
            Arg::new("group")
                .short('g')
                .long("group")
                .conflicts_with_all(NON_INSTALL_OPERATIONS)
                .help("Group recorded for the installed package"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .conflicts_with_all(NON_INSTALL_OPERATIONS)
                .help("Overwrite a package already installed at the destination"),
        )
        .arg(
            Arg::new("select")
                .long("select")
                .value_name("INDEX")
                .help("Answer the \"multiple packages\" prompt with this index"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .default_value("/var/local/ploc.db")
                .help("Database path (env: PLOC_DB)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Log more (-v info, -vv debug)"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer)
        .expect("Failed to render man page");

    let man_path = man_dir.join("ploc.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
