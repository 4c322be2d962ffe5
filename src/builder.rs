//! Declarations → clap Command tree builder
//!
//! Renders the node's resource → operation → field declarations as a command
//! line: `<name> <resource> <operation> [path args] [--fields]`, plus a `raw`
//! subcommand for custom requests. Parsed matches are turned back into the
//! field-value record the dispatcher reads.

use std::collections::{HashMap, HashSet};

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::{Map, Value};

use crate::credentials::DEFAULT_API_ROOT;
use crate::declarations::{
    DeclarationBuilder, FieldDeclaration, FieldKind, BODY_FIELD, DEFAULT_ENDPOINT,
    ENDPOINT_FIELD, METHOD_FIELD, OPERATION_FIELD, OUTPUT_MODE_FIELD, QUERY_FIELD, RAW_RESOURCE,
    RESOURCE_FIELD,
};
use crate::options::OptionLoader;
use crate::spec::{HttpMethod, OperationDescriptor};

pub const API_ROOT_ENV: &str = "DEFENSX_API_ROOT";
pub const API_KEY_ENV: &str = "DEFENSX_API_KEY";

/// Strategy for generating operation command names.
#[derive(Debug, Clone, Copy, Default)]
pub enum CommandNaming {
    /// Slug of the operation's display label.
    ///
    /// `"Get list of agents"` → command `"get-list-of-agents"`
    #[default]
    Label,
    /// Slug of the operation id.
    ///
    /// `"get_customers_by_customerid_agents"` → `"get-customers-by-customerid-agents"`
    OperationId,
}

impl CommandNaming {
    fn apply(&self, label: &str, operation_id: &str) -> String {
        let result = match self {
            Self::Label => normalize_group(label),
            Self::OperationId => normalize_group(operation_id),
        };
        // Guard: empty command name would panic in clap
        if result.is_empty() {
            normalize_group(operation_id)
        } else {
            result
        }
    }
}

/// Configuration for building the CLI.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CliConfig {
    /// Root command name
    pub name: String,
    /// Root command about/description
    pub about: String,
    /// Default API root when neither flag nor environment provides one
    pub default_api_root: String,
    /// Strategy for generating command names from operations
    pub command_naming: CommandNaming,
}

impl CliConfig {
    pub fn new(name: impl Into<String>, about: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: about.into(),
            default_api_root: DEFAULT_API_ROOT.to_string(),
            command_naming: CommandNaming::Label,
        }
    }

    /// Set the command naming strategy.
    pub fn command_naming(mut self, naming: CommandNaming) -> Self {
        self.command_naming = naming;
        self
    }
}

/// One operation command, resolved to its descriptor.
#[derive(Debug, Clone)]
pub struct OperationCommand<'a> {
    /// Resource label, as the dispatcher's `resource` field expects it.
    pub resource: String,
    pub op: &'a OperationDescriptor,
}

/// Resource and operation command names of every visible operation.
fn command_names<'a>(
    config: &CliConfig,
    declarations: &DeclarationBuilder<'a>,
) -> Vec<(String, String, Vec<(String, &'a OperationDescriptor)>)> {
    let mut resources = Vec::new();
    for resource in declarations.resource_options() {
        let Some(label) = resource.value.as_str() else {
            continue;
        };
        if label == RAW_RESOURCE {
            continue;
        }

        let ops: Vec<(String, &OperationDescriptor)> = declarations
            .operation_options(label)
            .iter()
            .filter_map(|option| {
                let op = declarations.catalog().find(option.value.as_str()?)?;
                Some((config.command_naming.apply(&option.name, &op.id), op))
            })
            .collect();

        // Detect duplicate names within this resource
        let mut name_count: HashMap<&str, usize> = HashMap::new();
        for (name, _) in &ops {
            *name_count.entry(name.as_str()).or_default() += 1;
        }
        let ops = ops
            .iter()
            .map(|(name, op)| {
                if name_count.get(name.as_str()).copied().unwrap_or(0) > 1 {
                    (normalize_group(&op.id), *op)
                } else {
                    (name.clone(), *op)
                }
            })
            .collect();

        resources.push((normalize_group(label), label.to_string(), ops));
    }
    resources
}

/// Build a clap `Command` tree from the node declarations.
///
/// Structure: `<name> <resource> <operation> [args] [--options]`, plus
/// `<name> raw`. Resources are the declared resource labels.
pub fn build_commands(config: &CliConfig, declarations: &DeclarationBuilder<'_>) -> Command {
    let mut root = Command::new(config.name.clone())
        .about(config.about.clone())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("api-root")
                .long("api-root")
                .global(true)
                .env(API_ROOT_ENV)
                .default_value(config.default_api_root.clone())
                .help("DefensX API root"),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .global(true)
                .env(API_KEY_ENV)
                .hide_env_values(true)
                .help("Partner API key"),
        )
        .subcommand(build_raw_command());

    for (slug, label, ops) in command_names(config, declarations) {
        let mut resource_cmd = Command::new(slug)
            .about(label)
            .subcommand_required(true)
            .arg_required_else_help(true);
        for (name, op) in ops {
            resource_cmd = resource_cmd.subcommand(build_operation_command(
                &name,
                &declarations.operation_label(op),
                &declarations.operation_fields(op),
            ));
        }
        root = root.subcommand(resource_cmd);
    }

    root
}

/// Find the operation behind a resolved resource + operation command name.
pub fn find_operation<'a>(
    config: &CliConfig,
    declarations: &DeclarationBuilder<'a>,
    resource_name: &str,
    op_name: &str,
) -> Option<OperationCommand<'a>> {
    let (_, resource, ops) = command_names(config, declarations)
        .into_iter()
        .find(|(slug, _, _)| slug == resource_name)?;
    let (_, op) = ops.into_iter().find(|(name, _)| name == op_name)?;
    Some(OperationCommand { resource, op })
}

fn build_raw_command() -> Command {
    let methods: Vec<&'static str> = HttpMethod::ALL.iter().map(|m| m.as_str()).collect();
    Command::new(RAW_RESOURCE)
        .about("Make a custom request by providing method, endpoint, query, and body")
        .arg(
            Arg::new(METHOD_FIELD)
                .long("method")
                .short('X')
                .ignore_case(true)
                .value_parser(methods)
                .default_value("GET")
                .help("HTTP method"),
        )
        .arg(
            Arg::new(ENDPOINT_FIELD)
                .long("endpoint")
                .default_value(DEFAULT_ENDPOINT)
                .help("Path under /api/partner/v1, for example /status"),
        )
        .arg(
            Arg::new(QUERY_FIELD)
                .long("query")
                .short('q')
                .default_value("{}")
                .help("Query string parameters as JSON object"),
        )
        .arg(
            Arg::new(BODY_FIELD)
                .long("body")
                .short('d')
                .default_value("{}")
                .help("Request body as JSON object (used for POST/PUT/PATCH)"),
        )
}

/// Long flag of a field, derived from its display name.
fn field_flag(field: &FieldDeclaration) -> String {
    match field.kind {
        FieldKind::Json => "json".to_string(),
        _ => normalize_group(&field.display_name),
    }
}

fn is_path_field(field: &FieldDeclaration) -> bool {
    field.name.starts_with("path_")
}

fn build_operation_command(cmd_name: &str, about: &str, fields: &[FieldDeclaration]) -> Command {
    let mut cmd = Command::new(cmd_name.to_owned()).about(about.to_owned());
    let mut used: HashSet<String> = HashSet::from(["output-mode".to_string()]);

    for field in fields {
        let mut help = field.description.clone().unwrap_or_default();
        if let FieldKind::DynamicOptions { loader, .. } = &field.kind {
            let hint = format!("values: `options {}`", loader_command(*loader));
            help = if help.is_empty() { hint } else { format!("{help} ({hint})") };
        }

        // Path parameters → positional args
        let arg = if is_path_field(field) {
            Arg::new(field.name.clone())
                .value_name(normalize_group(&field.display_name).to_uppercase())
                .required(true)
        } else {
            let mut flag = field_flag(field);
            if !used.insert(flag.clone()) {
                flag = normalize_group(&field.name);
                used.insert(flag.clone());
            }
            let required = field.required && !field.name.starts_with("body_");
            let arg = Arg::new(field.name.clone()).long(flag).required(required);
            match &field.default {
                Value::Bool(b) if !required => arg.default_value(b.to_string()),
                Value::Number(n) if !required => arg.default_value(n.to_string()),
                _ => arg,
            }
        };
        cmd = cmd.arg(arg.help(help).action(ArgAction::Set));
    }

    cmd.arg(
        Arg::new(OUTPUT_MODE_FIELD)
            .long("output-mode")
            .value_parser(["items", "raw"])
            .default_value("items")
            .help("items: one record per array element; raw: the whole response"),
    )
}

fn loader_command(loader: OptionLoader) -> &'static str {
    match loader {
        OptionLoader::Customers => "customers",
        OptionLoader::BrowserExtensions => "browser-extensions",
        OptionLoader::PolicyGroups => "policy-groups",
    }
}

/// Field values of a parsed operation command.
pub fn operation_record(
    command: &OperationCommand<'_>,
    fields: &[FieldDeclaration],
    matches: &ArgMatches,
) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(RESOURCE_FIELD.into(), Value::from(command.resource.as_str()));
    record.insert(OPERATION_FIELD.into(), Value::from(command.op.id.as_str()));
    if let Some(mode) = matches.get_one::<String>(OUTPUT_MODE_FIELD) {
        record.insert(OUTPUT_MODE_FIELD.into(), Value::from(mode.as_str()));
    }
    for field in fields {
        if let Some(val) = matches.get_one::<String>(&field.name) {
            record.insert(field.name.clone(), Value::from(val.as_str()));
        }
    }
    record
}

/// Field values of a parsed `raw` command.
pub fn raw_record(matches: &ArgMatches) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(RESOURCE_FIELD.into(), Value::from(RAW_RESOURCE));
    for name in [METHOD_FIELD, ENDPOINT_FIELD, QUERY_FIELD, BODY_FIELD] {
        if let Some(val) = matches.get_one::<String>(name) {
            record.insert(name.into(), Value::from(val.as_str()));
        }
    }
    record
}

pub fn normalize_group(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            result.push(c.to_ascii_lowercase());
        } else if !result.is_empty() && !result.ends_with('-') {
            result.push('-');
        }
    }
    while result.ends_with('-') {
        result.pop();
    }
    result
}
