//! `defensx`: command-line host for the DefensX Partner API node.
//!
//! Usage:
//!   defensx <resource> <operation> [args] [--fields]
//!   defensx raw --method GET --endpoint /status
//!   defensx options customers
//!   defensx describe | generate | test-connection
//!
//! Credentials come from `--api-root`/`--api-key` or `DEFENSX_API_ROOT`/
//! `DEFENSX_API_KEY`; a `.env` file in the working directory is loaded first.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use defensx_node::builder::{operation_record, raw_record};
use defensx_node::declarations::OPERATION_FIELD;
use defensx_node::options::{load_browser_extension_options, load_policy_group_options};
use defensx_node::{
    build_commands, find_operation, generate, Catalog, CliConfig, Credentials,
    DeclarationBuilder, Dispatcher, HttpTransport, OptionLoader, Overrides,
};

const DEFAULT_OUT: &str = "src/generated/operations.json";

fn utility_commands() -> Vec<Command> {
    vec![
        Command::new("generate")
            .about("Compile the OpenAPI document into the operation table")
            .arg(
                Arg::new("root")
                    .long("root")
                    .default_value(".")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Package root holding openapi/defensx-partner.yaml"),
            )
            .arg(
                Arg::new("out")
                    .long("out")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Output file (default: <root>/src/generated/operations.json)"),
            ),
        Command::new("describe").about("Print the node declarations as JSON"),
        Command::new("test-connection").about("Check the API root and key against /status"),
        Command::new("options")
            .about("List values for a dynamic selector")
            .arg(
                Arg::new("kind")
                    .required(true)
                    .value_parser(["customers", "browser-extensions", "policy-groups"]),
            )
            .arg(
                Arg::new("operation")
                    .long("operation")
                    .help("Operation id the selector belongs to"),
            )
            .arg(
                Arg::new("customer")
                    .long("customer")
                    .help("Selected customer id"),
            ),
    ]
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn credentials(matches: &ArgMatches) -> Result<Credentials> {
    let api_root = matches
        .get_one::<String>("api-root")
        .cloned()
        .unwrap_or_default();
    let Some(api_key) = matches.get_one::<String>("api-key") else {
        bail!("missing API key: pass --api-key or set DEFENSX_API_KEY");
    };
    Ok(Credentials::new(api_root, api_key.clone()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render output")?
    );
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let catalog = Catalog::embedded().context("failed to load operation catalog")?;
    let overrides = Overrides::builtin();
    let declarations = DeclarationBuilder::new(&catalog, &overrides);
    let config = CliConfig::new("defensx", "DefensX Partner API client");

    let matches = build_commands(&config, &declarations)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommands(utility_commands())
        .get_matches();
    init_tracing(matches.get_flag("verbose"));

    let Some((name, sub)) = matches.subcommand() else {
        bail!("no command given");
    };

    match name {
        "generate" => {
            let root = sub
                .get_one::<PathBuf>("root")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("."));
            let out = sub
                .get_one::<PathBuf>("out")
                .cloned()
                .unwrap_or_else(|| root.join(DEFAULT_OUT));
            let ops = generate(&root, &out).context("code generation failed")?;
            println!("Generated {} operations into {}", ops.len(), out.display());
            return Ok(());
        }
        "describe" => return print_json(&declarations.describe()),
        _ => {}
    }

    let credentials = credentials(&matches)?;
    let transport = HttpTransport::from_credentials(Client::new(), &credentials);
    debug!(?credentials, "resolved credentials");

    let record: Map<String, Value> = match name {
        "test-connection" => {
            credentials
                .test_connection(&transport)
                .context("connection test failed")?;
            println!("Connection OK");
            return Ok(());
        }
        "options" => {
            let operation = sub.get_one::<String>("operation");
            let customer = sub.get_one::<String>("customer").map(String::as_str);
            let options = match sub.get_one::<String>("kind").map(String::as_str) {
                Some("customers") => {
                    let mut current = Map::new();
                    if let Some(id) = operation {
                        current.insert(OPERATION_FIELD.into(), Value::from(id.as_str()));
                    }
                    OptionLoader::Customers.load(&catalog, &credentials, &transport, &current)?
                }
                Some("browser-extensions") => {
                    load_browser_extension_options(&credentials, &transport, customer)?
                }
                Some("policy-groups") => {
                    load_policy_group_options(&credentials, &transport, customer)?
                }
                other => bail!("unknown option kind: {other:?}"),
            };
            return print_json(&options);
        }
        "raw" => raw_record(sub),
        resource_name => {
            let Some((op_name, op_matches)) = sub.subcommand() else {
                bail!("no operation given for {resource_name}");
            };
            let Some(command) = find_operation(&config, &declarations, resource_name, op_name)
            else {
                bail!("unknown operation: {resource_name} {op_name}");
            };
            let fields = declarations.operation_fields(command.op);
            operation_record(&command, &fields, op_matches)
        }
    };

    let dispatcher = Dispatcher::new(&catalog, &credentials, transport);
    let mut out = Vec::new();
    let result = dispatcher.execute(&[record], &mut out);
    print_json(&out)?;
    result.context("DefensX node execution failed")
}
