pub mod error;
pub mod handlers;

use std::{path::PathBuf, str::FromStr};

use clap::{value_parser, Arg, ArgAction, Command};
use leasehold_core::Category;

pub fn build_cli() -> Command {
    Command::new("leasehold")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exclusive leases on shared QA publishers and staging environments")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Use only this config file (skips global and project config)"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Database file, overriding config and LEASEHOLD_DB"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print responses as JSON"),
        )
        .subcommand(Command::new("status").about("Show who holds every resource"))
        .subcommand(cmd_list())
        .subcommand(
            Command::new("info")
                .about("Show one resource")
                .arg(arg_category())
                .arg(arg_id()),
        )
        .subcommand(cmd_history())
        .subcommand(cmd_lease("take", "Take a free resource"))
        .subcommand(cmd_lease("steal", "Take a resource even if someone holds it"))
        .subcommand(
            Command::new("release")
                .about("Release a resource")
                .arg(arg_category())
                .arg(arg_id())
                .arg(
                    Arg::new("holder")
                        .long("holder")
                        .value_name("NAME")
                        .help("Only release if NAME holds it (default: release regardless)"),
                ),
        )
        .subcommand(Command::new("health").about("Show persistence health"))
        .subcommand(Command::new("whoami").about("Show the holder name used by take and steal"))
        .subcommand(
            Command::new("reset")
                .about("Clear all stored lease state and history")
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .action(ArgAction::SetTrue)
                        .help("Confirm the reset"),
                ),
        )
}

fn cmd_list() -> Command {
    Command::new("list")
        .about("List resources of a category")
        .arg(arg_category())
        .arg(
            Arg::new("available")
                .long("available")
                .action(ArgAction::SetTrue)
                .help("Only resources nobody holds"),
        )
        .arg(
            Arg::new("where")
                .long("where")
                .value_name("KEY=VALUE")
                .value_parser(parse_key_value)
                .conflicts_with("kind")
                .help("Only resources whose metadata KEY equals VALUE"),
        )
        .arg(
            Arg::new("kind")
                .long("kind")
                .value_name("KIND")
                .help("Only publishers whose type or platform is KIND"),
        )
}

fn cmd_history() -> Command {
    Command::new("history")
        .about("Show past holders of a resource, newest first")
        .arg(arg_category())
        .arg(arg_id())
        .arg(
            Arg::new("limit")
                .long("limit")
                .short('n')
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Show at most N entries"),
        )
}

fn cmd_lease(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(arg_category())
        .arg(arg_id())
        .arg(
            Arg::new("holder")
                .long("holder")
                .value_name("NAME")
                .help("Holder name (default: LEASEHOLD_HOLDER, USER or USERNAME)"),
        )
}

fn arg_category() -> Arg {
    Arg::new("category")
        .required(true)
        .value_name("CATEGORY")
        .value_parser(parse_category)
        .help("publisher(s) or environment(s)/env")
}

fn arg_id() -> Arg {
    Arg::new("id")
        .required(true)
        .value_name("ID")
        .help("Resource id")
}

fn parse_category(raw: &str) -> Result<Category, String> {
    Category::from_str(raw.trim())
        .map_err(|_| format!("unknown category '{raw}' (expected publisher or environment)"))
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
