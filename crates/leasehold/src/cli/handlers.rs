use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use leasehold_core::{
    identity, load_config, Category, Config, LoadOptions, ResourceRegistry,
};
use tracing::warn;

use super::{build_cli, error};
use crate::commands::{self, ListFilter, Reply};

/// Parse the process arguments, run the selected command, print its reply
/// or error, and return the process exit code.
///
/// - 0: success
/// - 1: the lease operation was refused (already held, not the holder,
///   nothing to release), or bad input
/// - 2/3/4: see `leasehold_core::Error::exit_code`; 4 also when a change
///   could not be saved or the store fails its write check
pub async fn run_cli() -> i32 {
    let matches = build_cli().get_matches();
    let json = matches
        .subcommand()
        .is_some_and(|(_, sub)| sub.get_flag("json"));

    match dispatch(&matches).await {
        Ok(reply) => match reply.print(json) {
            Ok(()) => reply.exit_code(),
            Err(e) => error::report(&e, false),
        },
        Err(e) => error::report(&e, json),
    }
}

pub async fn dispatch(matches: &ArgMatches) -> Result<Reply> {
    let Some((name, sub)) = matches.subcommand() else {
        anyhow::bail!("Unknown command. Run 'leasehold --help' for usage.");
    };

    let reply = match name {
        "whoami" => commands::whoami::run()?,
        "reset" => {
            let config = load(sub)?;
            commands::reset::run(&config, sub.get_flag("yes")).await?
        }
        _ => {
            let config = load(sub)?;
            let registry = ResourceRegistry::open(&config)
                .await
                .with_context(|| format!("Failed to open {}", config.store.path.display()))?;
            let reply = run_with_registry(&registry, name, sub).await;
            if let Err(e) = registry.shutdown().await {
                warn!(error = %e, "Failed to flush lease state on exit");
            }
            reply?
        }
    };

    Ok(reply)
}

async fn run_with_registry(
    registry: &ResourceRegistry,
    name: &str,
    sub: &ArgMatches,
) -> Result<Reply> {
    match name {
        "status" => commands::status::run(registry).await,
        "health" => commands::health::run(registry).await,
        "list" => {
            let filter = ListFilter {
                available_only: sub.get_flag("available"),
                metadata: sub.get_one::<(String, String)>("where").cloned(),
                kind: sub.get_one::<String>("kind").cloned(),
            };
            commands::list::run(registry, category(sub)?, &filter).await
        }
        "info" => commands::info::run(registry, category(sub)?, id(sub)?).await,
        "history" => {
            let limit = sub.get_one::<usize>("limit").copied();
            commands::history::run(registry, category(sub)?, id(sub)?, limit).await
        }
        "take" => {
            let holder = holder_or_identity(sub)?;
            commands::lease::take(registry, category(sub)?, id(sub)?, &holder).await
        }
        "steal" => {
            let holder = holder_or_identity(sub)?;
            commands::lease::steal(registry, category(sub)?, id(sub)?, &holder).await
        }
        "release" => {
            let holder = sub
                .get_one::<String>("holder")
                .map(String::as_str)
                .map(identity::validate_holder)
                .transpose()?;
            commands::lease::release(registry, category(sub)?, id(sub)?, holder.as_deref()).await
        }
        _ => anyhow::bail!("Unknown command '{name}'. Run 'leasehold --help' for usage."),
    }
}

fn load(sub: &ArgMatches) -> Result<Config> {
    let options = LoadOptions {
        config_file: sub.get_one::<PathBuf>("config").cloned(),
        db_path: sub.get_one::<PathBuf>("db").cloned(),
    };
    Ok(load_config(&options)?)
}

fn category(sub: &ArgMatches) -> Result<Category> {
    sub.get_one::<Category>("category")
        .copied()
        .context("Category required")
}

fn id(sub: &ArgMatches) -> Result<&str> {
    sub.get_one::<String>("id")
        .map(String::as_str)
        .context("Resource id required")
}

fn holder_or_identity(sub: &ArgMatches) -> Result<String> {
    match sub.get_one::<String>("holder") {
        Some(holder) => Ok(identity::validate_holder(holder)?),
        None => Ok(identity::resolve_holder()),
    }
}
