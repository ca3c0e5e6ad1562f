// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use carprice_app::{ConditionGroup, SelectorLevel};
use config::Config;
use runtime::{EstimateArgs, TableArgs, run_estimate, run_table};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `carprice --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_level())?;

    let mut client = carprice_api::Client::new(
        config.base_url(),
        config.timeout()?,
        config.cache_ttl()?,
    )
    .with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout/cache_ttl values",
            options.config_path.display()
        )
    })?;

    if options.check_only {
        let categories = client.ping()?;
        println!("{} is reachable ({categories} categories)", client.base_url());
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match options.command {
        Some(Command::Estimate(args)) => run_estimate(&mut client, &args, &mut out),
        Some(Command::Table(mut args)) => {
            args.server_side |= config.server_side();
            run_table(
                &mut client,
                &args,
                config.table_endpoint(),
                config.page_size(),
                &mut out,
            )
        }
        None => {
            print_help();
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log.level {level:?} -- use e.g. warn or debug"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow!("initialise logging: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Estimate(EstimateArgs),
    Table(TableArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    command: Option<Command>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        show_help: false,
        command: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let arg = arg.as_ref();
        let mut value = |flag: &str| -> Result<String> {
            iter.next()
                .map(|value| value.as_ref().to_owned())
                .ok_or_else(|| anyhow!("{flag} requires a value"))
        };

        match (arg, &mut options.command) {
            ("--config", _) => {
                let path = value("--config")
                    .map_err(|_| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(path);
            }
            ("--print-config-path", _) => options.print_config_path = true,
            ("--print-example-config", _) => options.print_example = true,
            ("--check", _) => options.check_only = true,
            ("--help" | "-h", _) => options.show_help = true,
            ("estimate", None) => {
                options.command = Some(Command::Estimate(EstimateArgs::default()));
            }
            ("table", None) => {
                options.command = Some(Command::Table(TableArgs {
                    page: 1,
                    ..TableArgs::default()
                }));
            }
            ("--select", Some(Command::Estimate(estimate))) => {
                let (key, choice) = split_pair("--select", &value("--select")?)?;
                let level = SelectorLevel::parse(&key).ok_or_else(|| {
                    anyhow!(
                        "unknown selector {key:?} -- use one of: category, brand, model, variant, year"
                    )
                })?;
                estimate.selections.retain(|(existing, _)| *existing != level);
                estimate.selections.push((level, choice));
            }
            ("--condition", Some(Command::Estimate(estimate))) => {
                let (key, score) = split_pair("--condition", &value("--condition")?)?;
                let group = ConditionGroup::parse(&key).ok_or_else(|| {
                    let known: Vec<&str> =
                        ConditionGroup::ALL.iter().map(|group| group.as_str()).collect();
                    anyhow!("unknown condition group {key:?} -- use one of: {}", known.join(", "))
                })?;
                estimate.conditions.push((group, score));
            }
            ("--mileage", Some(Command::Estimate(estimate))) => {
                estimate.mileage = Some(value("--mileage")?);
            }
            ("--submit", Some(Command::Estimate(estimate))) => {
                estimate.submit = Some(value("--submit")?);
            }
            ("--csrf-token", Some(Command::Estimate(estimate))) => {
                estimate.csrf_token = Some(value("--csrf-token")?);
            }
            ("--endpoint", Some(Command::Table(table))) => {
                table.endpoint = Some(value("--endpoint")?);
            }
            ("--page", Some(Command::Table(table))) => {
                table.page = parse_positive("--page", &value("--page")?)?;
            }
            ("--size", Some(Command::Table(table))) => {
                table.size = Some(parse_positive("--size", &value("--size")?)?);
            }
            ("--search", Some(Command::Table(table))) => {
                table.search = Some(value("--search")?);
            }
            ("--sort", Some(Command::Table(table))) => {
                table.sort = Some(value("--sort")?);
            }
            ("--desc", Some(Command::Table(table))) => table.descending = true,
            ("--filter", Some(Command::Table(table))) => {
                table.filters.push(split_pair("--filter", &value("--filter")?)?);
            }
            ("--param", Some(Command::Table(table))) => {
                table.params.push(split_pair("--param", &value("--param")?)?);
            }
            ("--server-side", Some(Command::Table(table))) => table.server_side = true,
            (unknown, _) => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
        }
    }

    if let Some(Command::Table(table)) = &options.command
        && table.descending
        && table.sort.is_none()
    {
        bail!("--desc needs a column -- pass --sort <field> as well");
    }
    if let Some(Command::Estimate(estimate)) = &options.command
        && estimate.csrf_token.is_some()
        && estimate.submit.is_none()
    {
        bail!("--csrf-token only applies with --submit <path>");
    }

    Ok(options)
}

fn split_pair(flag: &str, raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("{flag} expects key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("{flag} expects key=value, got {raw:?}");
    }
    Ok((key.to_owned(), value.trim().to_owned()))
}

fn parse_positive(flag: &str, raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(number) if number > 0 => Ok(number),
        _ => bail!("{flag} expects a positive whole number, got {raw:?}"),
    }
}

fn print_help() {
    println!("carprice: used-car price estimator client");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and ping the backend");
    println!("  --help                   Show this help");
    println!();
    println!("carprice estimate [options]");
    println!("  --select <level>=<value>     Choose category, brand, model, variant or year");
    println!("  --condition <group>=<score>  Answer a condition group");
    println!("  --mileage <km>               Optional odometer reading");
    println!("  --submit <path>              POST the payload to this path");
    println!("  --csrf-token <token>         CSRF token sent with --submit");
    println!();
    println!("carprice table [options]");
    println!("  --endpoint <path>     Table endpoint (default from config)");
    println!("  --page <n>            Page to show");
    println!("  --size <n>            Rows per page");
    println!("  --search <text>       Search across all columns");
    println!("  --sort <field>        Sort by column (ascending)");
    println!("  --desc                Sort descending");
    println!("  --filter <key=value>  Filter a column; value min..max filters a range");
    println!("  --param <key=value>   Extra query parameter for the endpoint");
    println!("  --server-side         Let the backend page, sort and filter");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, Command, parse_cli_args};
    use crate::runtime::{EstimateArgs, TableArgs};
    use anyhow::Result;
    use carprice_app::{ConditionGroup, SelectorLevel};
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/carprice-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                check_only: false,
                show_help: false,
                command: None,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }

    #[test]
    fn estimate_collects_selections_and_conditions() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "estimate",
                "--select",
                "brand=Perodua",
                "--select",
                "brand=Proton",
                "--condition",
                "tires_brakes=2",
                "--mileage",
                "88000",
                "--submit",
                "/api/estimate/",
                "--csrf-token",
                "tok",
            ],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Some(Command::Estimate(EstimateArgs {
                selections: vec![(SelectorLevel::Brand, "Proton".to_owned())],
                conditions: vec![(ConditionGroup::TiresBrakes, "2".to_owned())],
                mileage: Some("88000".to_owned()),
                submit: Some("/api/estimate/".to_owned()),
                csrf_token: Some("tok".to_owned()),
            }))
        );
        Ok(())
    }

    #[test]
    fn estimate_rejects_unknown_keys() {
        let error = parse_cli_args(
            vec!["estimate", "--select", "colour=red"],
            default_options_path(),
        )
        .expect_err("unknown selector");
        assert!(error.to_string().contains("unknown selector"));

        let error = parse_cli_args(vec!["estimate", "--condition", "vibes"], default_options_path())
            .expect_err("missing =");
        assert!(error.to_string().contains("key=value"));

        let error = parse_cli_args(vec!["estimate", "--csrf-token", "tok"], default_options_path())
            .expect_err("token without submit");
        assert!(error.to_string().contains("--submit"));
    }

    #[test]
    fn table_flags_are_scoped_to_the_table_command() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "table",
                "--page",
                "3",
                "--size",
                "10",
                "--sort",
                "price",
                "--desc",
                "--filter",
                "year=2019..2022",
                "--server-side",
            ],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Some(Command::Table(TableArgs {
                page: 3,
                size: Some(10),
                sort: Some("price".to_owned()),
                descending: true,
                filters: vec![("year".to_owned(), "2019..2022".to_owned())],
                server_side: true,
                ..TableArgs::default()
            }))
        );

        let error = parse_cli_args(vec!["--page", "2"], default_options_path())
            .expect_err("--page outside table");
        assert!(error.to_string().contains("unknown argument"));

        let error = parse_cli_args(vec!["table", "--page", "0"], default_options_path())
            .expect_err("page zero");
        assert!(error.to_string().contains("positive whole number"));
        Ok(())
    }

    #[test]
    fn desc_requires_sort() {
        let error = parse_cli_args(vec!["table", "--desc"], default_options_path())
            .expect_err("desc without sort");
        assert!(error.to_string().contains("--sort"));
    }
}
