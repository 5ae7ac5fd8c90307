// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: install prefix
fn prefix_arg() -> Arg {
    Arg::new("prefix")
        .short('p')
        .long("prefix")
        .value_name("DIR")
        .help("Install prefix (binaries go to <prefix>/bin)")
}

/// Common argument: recipe file
fn recipe_arg() -> Arg {
    Arg::new("recipe").required(true).help("Recipe file")
}

fn build_cli() -> Command {
    Command::new("kettle")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Kettle Contributors")
        .about("Declarative package-recipe installer with verified fetches")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Config file (default: <config dir>/kettle/config.toml)"),
        )
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .value_name("DIR")
                .global(true)
                .help("Artifact cache directory (overrides config and KETTLE_CACHE_DIR)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Verbose logging"),
        )
        .subcommand(
            Command::new("install")
                .about("Fetch, verify and stage one or more recipes")
                .arg(
                    Arg::new("recipes")
                        .required(true)
                        .num_args(1..)
                        .help("Recipe files"),
                )
                .arg(prefix_arg())
                .arg(
                    Arg::new("keep_staging")
                        .long("keep-staging")
                        .action(ArgAction::SetTrue)
                        .help("Keep the extracted tree for debugging"),
                )
                .arg(
                    Arg::new("no_deps")
                        .long("no-deps")
                        .action(ArgAction::SetTrue)
                        .help("Skip the host prerequisite check"),
                )
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .default_value("0")
                        .help("Parallel installs when several recipes are given (0 = auto)"),
                ),
        )
        .subcommand(
            Command::new("test")
                .about("Run a recipe's self-test against its installed files")
                .arg(recipe_arg())
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch and verify a recipe's artifact into the cache without installing")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a recipe and show warnings")
                .arg(recipe_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("kettle.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
