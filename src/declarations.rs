//! Operation table → field declarations
//!
//! Projects the flat operation list into the resource → operation selection
//! hierarchy and the per-operation input fields that a property-driven UI
//! renders. Field values are later read back by the dispatcher using the same
//! deterministic field names.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::{json, Value};

use crate::behavior::{pagination_fields_for, PaginationFields};
use crate::catalog::Catalog;
use crate::options::OptionLoader;
use crate::overrides::Overrides;
use crate::spec::{OperationDescriptor, ParameterLocation};

/// Synthetic resource that bypasses the catalog.
pub const RAW_RESOURCE: &str = "raw";
pub const RAW_RESOURCE_LABEL: &str = "Raw Request";
/// The single operation of the raw resource.
pub const RAW_OPERATION: &str = "__customApiQuery";

pub const RESOURCE_FIELD: &str = "resource";
pub const OPERATION_FIELD: &str = "operation";
pub const METHOD_FIELD: &str = "method";
pub const ENDPOINT_FIELD: &str = "endpoint";
pub const QUERY_FIELD: &str = "query";
pub const BODY_FIELD: &str = "body";
pub const OUTPUT_MODE_FIELD: &str = "outputMode";

pub const DEFAULT_ENDPOINT: &str = "/status";

/// Namespace of a generated field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPrefix {
    Path,
    Query,
    Body,
    BodyJson,
    Pagination,
}

impl FieldPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Body => "body",
            Self::BodyJson => "bodyJson",
            Self::Pagination => "pagination",
        }
    }
}

impl From<ParameterLocation> for FieldPrefix {
    fn from(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Path => Self::Path,
            ParameterLocation::Query => Self::Query,
        }
    }
}

/// `{prefix}_{operationId}_{name}` with anything outside `[A-Za-z0-9_]` as `_`.
pub fn field_name(prefix: FieldPrefix, operation_id: &str, name: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix.as_str(),
        sanitize_key(operation_id),
        sanitize_key(name)
    )
}

pub const RETURN_ALL: &str = "returnAll";
pub const MAX_RESULTS: &str = "maxResults";
pub const PAGE_SIZE: &str = "pageSize";
pub const BODY_JSON: &str = "json";

fn sanitize_key(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// A selectable value of an options field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionEntry {
    pub name: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl OptionEntry {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            action: None,
        }
    }

    fn described(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }
}

/// Rendering of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    String,
    DateTime,
    Boolean,
    Number,
    Json,
    Options {
        options: Vec<OptionEntry>,
    },
    #[serde(rename_all = "camelCase")]
    DynamicOptions {
        loader: OptionLoader,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        depends_on: Vec<String>,
    },
}

/// Field values a condition matches on.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DisplayCondition {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<String>,
}

impl DisplayCondition {
    fn is_empty(&self) -> bool {
        self.resource.is_empty() && self.operation.is_empty()
    }
}

/// When a field is visible.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DisplayOptions {
    #[serde(skip_serializing_if = "DisplayCondition::is_empty")]
    pub show: DisplayCondition,
    #[serde(skip_serializing_if = "DisplayCondition::is_empty")]
    pub hide: DisplayCondition,
}

impl DisplayOptions {
    fn show_resource(resource: &str) -> Self {
        Self {
            show: DisplayCondition {
                resource: vec![resource.to_string()],
                operation: Vec::new(),
            },
            ..Self::default()
        }
    }

    fn show_operation(resource: &str, operation_id: &str) -> Self {
        Self {
            show: DisplayCondition {
                resource: vec![resource.to_string()],
                operation: vec![operation_id.to_string()],
            },
            ..Self::default()
        }
    }

    fn hide_resource(resource: &str) -> Self {
        Self {
            hide: DisplayCondition {
                resource: vec![resource.to_string()],
                operation: Vec::new(),
            },
            ..Self::default()
        }
    }

    pub fn shows_operation(&self, operation_id: &str) -> bool {
        self.show.operation.iter().any(|o| o == operation_id)
    }
}

/// One input field of the node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDeclaration {
    pub display_name: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub default: Value,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub display_options: DisplayOptions,
}

impl FieldDeclaration {
    fn new(display_name: impl Into<String>, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            display_name: display_name.into(),
            name: name.into(),
            kind,
            default: Value::String(String::new()),
            required: false,
            description: None,
            placeholder: None,
            display_options: DisplayOptions::default(),
        }
    }

    fn default_value(mut self, default: Value) -> Self {
        self.default = default;
        self
    }

    fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    fn description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(str::to_string);
        self
    }

    fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    fn display(mut self, display_options: DisplayOptions) -> Self {
        self.display_options = display_options;
        self
    }
}

/// The complete declaration set consumed by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescription {
    pub display_name: String,
    pub name: String,
    pub description: String,
    pub properties: Vec<FieldDeclaration>,
}

/// Builds declarations from the catalog and override table.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationBuilder<'a> {
    catalog: &'a Catalog,
    overrides: &'a Overrides,
}

impl<'a> DeclarationBuilder<'a> {
    pub fn new(catalog: &'a Catalog, overrides: &'a Overrides) -> Self {
        Self { catalog, overrides }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    fn visible_operations(&self) -> impl Iterator<Item = &'a OperationDescriptor> + '_ {
        self.catalog
            .operations()
            .iter()
            .filter(|op| !self.overrides.is_hidden(&op.id))
    }

    /// Normalized resource label of an operation.
    pub fn resource_of(&self, op: &OperationDescriptor) -> String {
        let raw = self
            .overrides
            .get(&op.id)
            .and_then(|o| o.resource_name.as_deref())
            .unwrap_or(if op.tag.is_empty() { "Default" } else { &op.tag });
        normalize_label(raw.trim())
    }

    /// Display label of an operation within its resource.
    pub fn operation_label(&self, op: &OperationDescriptor) -> String {
        let display = match self.overrides.get(&op.id).and_then(|o| o.operation_name.clone()) {
            Some(name) => name,
            None => op
                .summary
                .clone()
                .unwrap_or_else(|| format!("{} {}", op.method, op.path)),
        };
        strip_redundant_resource_prefix(&self.resource_of(op), &normalize_label(&display))
    }

    /// `Raw Request` first, then every visible resource sorted case-insensitively.
    pub fn resource_options(&self) -> Vec<OptionEntry> {
        let mut resources: Vec<String> = Vec::new();
        for op in self.visible_operations() {
            let resource = self.resource_of(op);
            if !resources.contains(&resource) {
                resources.push(resource);
            }
        }
        resources.sort_by(|a, b| compare_labels(a, b));

        std::iter::once(OptionEntry::new(RAW_RESOURCE_LABEL, RAW_RESOURCE))
            .chain(resources.into_iter().map(|r| OptionEntry::new(r.clone(), r)))
            .collect()
    }

    /// Visible operations of one resource, sorted case-insensitively by label.
    pub fn operation_options(&self, resource: &str) -> Vec<OptionEntry> {
        if resource == RAW_RESOURCE {
            return vec![raw_operation_option()];
        }

        let mut options: Vec<OptionEntry> = self
            .visible_operations()
            .filter(|op| self.resource_of(op) == resource)
            .map(|op| {
                let label = self.operation_label(op);
                OptionEntry {
                    action: Some(label.clone()),
                    ..OptionEntry::new(label, op.id.clone()).described(op.description.as_deref())
                }
            })
            .collect();
        options.sort_by(|a, b| compare_labels(&a.name, &b.name));
        options
    }

    /// Input fields of a single operation, in declaration order.
    pub fn operation_fields(&self, op: &OperationDescriptor) -> Vec<FieldDeclaration> {
        let display = DisplayOptions::show_operation(&self.resource_of(op), &op.id);
        let customer_field = customer_field_name(op);
        let mut fields = Vec::new();

        for param in &op.parameters {
            let kind = if is_customer_id_field(&param.name) {
                FieldKind::DynamicOptions {
                    loader: OptionLoader::Customers,
                    depends_on: Vec::new(),
                }
            } else if is_browser_extension_id_field(&param.name) {
                FieldKind::DynamicOptions {
                    loader: OptionLoader::BrowserExtensions,
                    depends_on: vec![customer_field.clone()],
                }
            } else if is_date_like_field(&param.name) {
                FieldKind::DateTime
            } else {
                FieldKind::String
            };

            let mut field = FieldDeclaration::new(
                format_parameter_display_name(&param.name),
                field_name(param.location.into(), &op.id, &param.name),
                kind,
            )
            .required(param.required)
            .description(param.description.as_deref())
            .display(display.clone());
            if is_customer_id_field(&param.name) && !param.required {
                field = field.placeholder("All customers (optional)");
            }
            fields.push(field);
        }

        let pagination = pagination_fields_for(&op.id);
        if pagination != PaginationFields::None {
            fields.push(
                FieldDeclaration::new(
                    "Return All",
                    field_name(FieldPrefix::Pagination, &op.id, RETURN_ALL),
                    FieldKind::Boolean,
                )
                .default_value(json!(true))
                .description(Some("Whether to fetch all pages automatically."))
                .display(display.clone()),
            );
            fields.push(
                FieldDeclaration::new(
                    "Max Results",
                    field_name(FieldPrefix::Pagination, &op.id, MAX_RESULTS),
                    FieldKind::Number,
                )
                .default_value(json!(0))
                .description(Some(
                    "Optional maximum number of items to return (0 = no limit).",
                ))
                .display(display.clone()),
            );
        }
        if pagination == PaginationFields::WithPageSize {
            fields.push(
                FieldDeclaration::new(
                    "Page Size",
                    field_name(FieldPrefix::Pagination, &op.id, PAGE_SIZE),
                    FieldKind::Number,
                )
                .default_value(json!(1000))
                .description(Some("Number of records to return per page."))
                .display(display.clone()),
            );
        }

        if let Some(body) = &op.request_body {
            let json_name = field_name(FieldPrefix::BodyJson, &op.id, BODY_JSON);
            match body.schema.simple_properties() {
                Some(properties) => {
                    for (name, property) in properties {
                        let kind = if is_date_like_field(name) {
                            FieldKind::DateTime
                        } else {
                            FieldKind::String
                        };
                        fields.push(
                            FieldDeclaration::new(
                                format_parameter_display_name(name),
                                field_name(FieldPrefix::Body, &op.id, name),
                                kind,
                            )
                            .required(body.schema.is_required(name))
                            .description(property.description.as_deref())
                            .display(display.clone()),
                        );
                    }
                    fields.push(
                        FieldDeclaration::new("Body (JSON Override)", json_name, FieldKind::Json)
                            .default_value(json!("{}"))
                            .description(Some(
                                "Optional JSON body override. If not empty, this JSON is sent instead of the structured body fields.",
                            ))
                            .display(display),
                    );
                }
                None => {
                    fields.push(
                        FieldDeclaration::new("Body", json_name, FieldKind::Json)
                            .default_value(json!("{}"))
                            .description(Some("Request body as JSON."))
                            .display(display),
                    );
                }
            }
        }

        fields
    }

    /// Every field of the node: selectors, raw request inputs, output mode and
    /// the generated per-operation inputs.
    pub fn describe(&self) -> NodeDescription {
        let resources = self.resource_options();
        let mut properties = vec![FieldDeclaration::new(
            "Resource",
            RESOURCE_FIELD,
            FieldKind::Options {
                options: resources.clone(),
            },
        )
        .default_value(json!(RAW_RESOURCE))];

        properties.push(
            FieldDeclaration::new(
                "Operation",
                OPERATION_FIELD,
                FieldKind::Options {
                    options: vec![raw_operation_option()],
                },
            )
            .default_value(json!(RAW_OPERATION))
            .display(DisplayOptions::show_resource(RAW_RESOURCE)),
        );
        for resource in resources.iter().filter_map(|r| r.value.as_str()) {
            if resource == RAW_RESOURCE {
                continue;
            }
            properties.push(
                FieldDeclaration::new(
                    "Operation",
                    OPERATION_FIELD,
                    FieldKind::Options {
                        options: self.operation_options(resource),
                    },
                )
                .required(true)
                .placeholder("Select operation")
                .display(DisplayOptions::show_resource(resource)),
            );
        }

        properties.extend(raw_request_fields());
        properties.push(
            FieldDeclaration::new(
                "Output Mode",
                OUTPUT_MODE_FIELD,
                FieldKind::Options {
                    options: vec![
                        OptionEntry::new("One Item Per Element", "items").described(Some(
                            "If the API returns an array, output one item per element",
                        )),
                        OptionEntry::new("Single Item (Raw)", "raw")
                            .described(Some("Return the full response as-is in a single item")),
                    ],
                },
            )
            .default_value(json!("items"))
            .display(DisplayOptions::hide_resource(RAW_RESOURCE)),
        );

        for op in self.visible_operations() {
            properties.extend(self.operation_fields(op));
        }

        NodeDescription {
            display_name: "DefensX".to_string(),
            name: "defensx".to_string(),
            description: "Call DefensX Partner API endpoints.".to_string(),
            properties,
        }
    }
}

fn raw_operation_option() -> OptionEntry {
    OptionEntry {
        action: Some("Custom API Query".to_string()),
        ..OptionEntry::new("Custom API Query", RAW_OPERATION).described(Some(
            "Make a custom request by providing method, endpoint, query, and body.",
        ))
    }
}

fn raw_request_fields() -> Vec<FieldDeclaration> {
    let display = DisplayOptions::show_resource(RAW_RESOURCE);
    let methods = ["GET", "POST", "PUT", "PATCH", "DELETE"]
        .into_iter()
        .map(|m| OptionEntry::new(m, m))
        .collect();
    vec![
        FieldDeclaration::new("Method", METHOD_FIELD, FieldKind::Options { options: methods })
            .default_value(json!("GET"))
            .display(display.clone()),
        FieldDeclaration::new("Endpoint", ENDPOINT_FIELD, FieldKind::String)
            .default_value(json!(DEFAULT_ENDPOINT))
            .description(Some("Path under /api/partner/v1, for example /status"))
            .display(display.clone()),
        FieldDeclaration::new("Query Parameters", QUERY_FIELD, FieldKind::Json)
            .default_value(json!("{}"))
            .description(Some("Query string parameters as JSON object"))
            .display(display.clone()),
        FieldDeclaration::new("Body", BODY_FIELD, FieldKind::Json)
            .default_value(json!("{}"))
            .description(Some("Request body as JSON object (used for POST/PUT/PATCH)"))
            .display(display),
    ]
}

/// Field name of the customer selector an operation's extension selector depends on.
pub fn customer_field_name(op: &OperationDescriptor) -> String {
    match op.parameters.iter().find(|p| is_customer_id_field(&p.name)) {
        Some(param) => field_name(param.location.into(), &op.id, &param.name),
        None => field_name(FieldPrefix::Query, &op.id, "customerId"),
    }
}

/// Case-insensitive order, ties broken by the raw text.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn alphanumeric_lowercase(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn is_customer_id_field(name: &str) -> bool {
    alphanumeric_lowercase(name) == "customerid"
}

pub fn is_browser_extension_id_field(name: &str) -> bool {
    alphanumeric_lowercase(name) == "browserextensionid"
}

/// Names rendered as date/time pickers.
pub fn is_date_like_field(name: &str) -> bool {
    let lowered = name.trim().to_lowercase();
    lowered.contains("date") || lowered == "from" || lowered == "to"
}

/// Apply `word` to every `[A-Za-z0-9_]` run, keeping separators as-is.
fn map_words(value: &str, word: impl Fn(&str) -> Option<&'static str>) -> String {
    let mut result = String::with_capacity(value.len());
    let mut current = String::new();
    let flush = |current: &mut String, result: &mut String| {
        if !current.is_empty() {
            match word(current) {
                Some(replacement) => result.push_str(replacement),
                None => result.push_str(current),
            }
            current.clear();
        }
    };
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c);
        } else {
            flush(&mut current, &mut result);
            result.push(c);
        }
    }
    flush(&mut current, &mut result);
    result
}

/// `Of` → `of`, `url` → `URL`, `urls` → `URLs` on whole words.
pub fn normalize_label(value: &str) -> String {
    map_words(value, |word| {
        if word == "Of" {
            Some("of")
        } else if word.eq_ignore_ascii_case("urls") {
            Some("URLs")
        } else if word.eq_ignore_ascii_case("url") {
            Some("URL")
        } else {
            None
        }
    })
}

fn strip_redundant_resource_prefix(resource: &str, operation_name: &str) -> String {
    let trimmed = normalize_label(operation_name.trim());
    if trimmed.is_empty() {
        return trimmed;
    }

    let resource = resource.trim().to_lowercase();
    for prefix in [
        format!("{resource}: "),
        format!("{resource} - "),
        format!("{resource} "),
    ] {
        let matches = trimmed
            .get(..prefix.len())
            .is_some_and(|head| head.to_lowercase() == prefix);
        if matches {
            let stripped = trimmed[prefix.len()..].trim();
            return if stripped.is_empty() {
                trimmed.clone()
            } else {
                stripped.to_string()
            };
        }
    }
    trimmed
}

fn title_case_word(word: &str) -> String {
    let lowered = word.to_lowercase();
    match lowered.as_str() {
        "id" => "ID".to_string(),
        "url" => "URL".to_string(),
        "urls" => "URLs".to_string(),
        "of" => "of".to_string(),
        _ => {
            let mut chars = lowered.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => lowered,
            }
        }
    }
}

/// Split snake and camel case into title-cased words.
pub fn humanize_field_name(name: &str) -> String {
    let mut spaced = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if c == '_' {
            spaced.push(' ');
        } else {
            if c.is_ascii_uppercase()
                && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
            {
                spaced.push(' ');
            }
            spaced.push(c);
        }
        prev = Some(c);
    }

    let trimmed = spaced.trim();
    if trimmed.is_empty() {
        return name.to_string();
    }
    let words: Vec<String> = trimmed.split_whitespace().map(title_case_word).collect();
    normalize_label(&words.join(" "))
}

pub fn format_parameter_display_name(name: &str) -> String {
    if name == "customerId" {
        return "Customer ID".to_string();
    }
    if name.contains('_') || name.chars().any(|c| c.is_ascii_uppercase()) || is_date_like_field(name)
    {
        return humanize_field_name(name);
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::overrides::OperationOverride;
    use crate::spec::{
        HttpMethod, ParameterDescriptor, RequestBodyDescriptor, SchemaProperty, SchemaShape,
        SchemaType,
    };

    fn make_operation(id: &str, tag: &str, summary: Option<&str>) -> OperationDescriptor {
        OperationDescriptor {
            id: id.to_string(),
            tag: tag.to_string(),
            method: HttpMethod::Get,
            path: format!("/{id}"),
            summary: summary.map(str::to_string),
            description: None,
            parameters: Vec::new(),
            request_body: None,
            behavior: Behavior::classify(id),
        }
    }

    fn param(name: &str, location: ParameterLocation, required: bool) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            location,
            required,
            description: None,
            schema_type: SchemaType::String,
        }
    }

    fn names(options: &[OptionEntry]) -> Vec<&str> {
        options.iter().map(|o| o.name.as_str()).collect()
    }

    // -- labels --

    #[test]
    fn normalize_label_fixes_acronyms_on_whole_words() {
        assert_eq!(normalize_label("Custom Url Groups"), "Custom URL Groups");
        assert_eq!(normalize_label("Custom urls"), "Custom URLs");
        assert_eq!(normalize_label("List Of Things"), "List of Things");
        assert_eq!(normalize_label("custom_url stays"), "custom_url stays");
        assert_eq!(normalize_label("Urlish"), "Urlish");
    }

    #[test]
    fn humanize_field_name_splits_snake_and_camel_case() {
        assert_eq!(humanize_field_name("subscription_id"), "Subscription ID");
        assert_eq!(humanize_field_name("browserExtensionId"), "Browser Extension ID");
        assert_eq!(humanize_field_name("customUrlGroupId"), "Custom URL Group ID");
        assert_eq!(humanize_field_name("start_date"), "Start Date");
        assert_eq!(humanize_field_name("___"), "___");
    }

    #[test]
    fn format_parameter_display_name_rules() {
        assert_eq!(format_parameter_display_name("customerId"), "Customer ID");
        assert_eq!(format_parameter_display_name("from"), "From");
        assert_eq!(format_parameter_display_name("hostname"), "hostname");
        assert_eq!(format_parameter_display_name("q"), "q");
        assert_eq!(format_parameter_display_name("config_type"), "Config Type");
    }

    #[test]
    fn strip_redundant_resource_prefix_variants() {
        assert_eq!(strip_redundant_resource_prefix("Users", "Users list all"), "list all");
        assert_eq!(strip_redundant_resource_prefix("Users", "users: list"), "list");
        assert_eq!(strip_redundant_resource_prefix("Users", "Users - list"), "list");
        assert_eq!(strip_redundant_resource_prefix("Users", "Get users"), "Get users");
        assert_eq!(strip_redundant_resource_prefix("Users", "Users"), "Users");
    }

    #[test]
    fn field_name_sanitizes_both_parts() {
        assert_eq!(
            field_name(FieldPrefix::Path, "get_customers_by_customerid_users", "customerId"),
            "path_get_customers_by_customerid_users_customerId"
        );
        assert_eq!(
            field_name(FieldPrefix::BodyJson, "op.v2", "x-y"),
            "bodyJson_op_v2_x_y"
        );
    }

    // -- resources and operations --

    #[test]
    fn resources_sorted_case_insensitively_with_raw_first() {
        let catalog = Catalog::new(vec![
            make_operation("a", "zeta", None),
            make_operation("b", "Alpha", None),
            make_operation("c", "beta", None),
            make_operation("d", "Alpha", None),
            make_operation("e", "", None),
        ]);
        let overrides = Overrides::default();
        let options = DeclarationBuilder::new(&catalog, &overrides).resource_options();
        assert_eq!(names(&options), ["Raw Request", "Alpha", "beta", "Default", "zeta"]);
        assert_eq!(options[0].value, json!("raw"));
    }

    #[test]
    fn hidden_operations_never_listed() {
        let catalog = Catalog::new(vec![
            make_operation("visible", "Users", Some("List users")),
            make_operation("secret", "Users", Some("Secret users")),
            make_operation("lonely", "Ghosts", Some("Only hidden")),
        ]);
        let overrides = Overrides::default()
            .with("secret", OperationOverride { hidden: true, ..Default::default() })
            .with("lonely", OperationOverride { hidden: true, ..Default::default() });
        let builder = DeclarationBuilder::new(&catalog, &overrides);

        assert_eq!(names(&builder.resource_options()), ["Raw Request", "Users"]);
        let ops = builder.operation_options("Users");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].value, json!("visible"));
        assert!(builder.operation_options("Ghosts").is_empty());
        assert!(builder
            .describe()
            .properties
            .iter()
            .all(|f| !f.display_options.shows_operation("secret")));
    }

    #[test]
    fn operation_labels_use_override_then_summary_then_method_path() {
        let catalog = Catalog::new(vec![
            make_operation("named", "Agents", Some("Get list of agents")),
            make_operation("overridden", "Agents", Some("ignored")),
            make_operation("bare", "Agents", None),
        ]);
        let overrides = Overrides::default().with(
            "overridden",
            OperationOverride {
                resource_name: Some("Agents".into()),
                operation_name: Some("Agents: include children".into()),
                hidden: false,
            },
        );
        let ops = DeclarationBuilder::new(&catalog, &overrides).operation_options("Agents");
        assert_eq!(names(&ops), ["GET /bare", "Get list of agents", "include children"]);
        assert_eq!(ops[2].action.as_deref(), Some("include children"));
    }

    #[test]
    fn override_resource_name_moves_operation() {
        let catalog = Catalog::new(vec![make_operation("x", "Policies", Some("Categories"))]);
        let overrides = Overrides::default().with(
            "x",
            OperationOverride {
                resource_name: Some("Webfilter urls".into()),
                ..Default::default()
            },
        );
        let builder = DeclarationBuilder::new(&catalog, &overrides);
        assert_eq!(names(&builder.resource_options()), ["Raw Request", "Webfilter URLs"]);
        assert_eq!(builder.operation_options("Webfilter URLs").len(), 1);
    }

    // -- fields --

    #[test]
    fn parameter_fields_typed_by_name() {
        let mut op = make_operation(
            "get_customers_by_customerid_browser_extensions_by_browserextensionid_users",
            "Browser Extensions",
            Some("Users of extension"),
        );
        op.parameters = vec![
            param("customerId", ParameterLocation::Path, true),
            param("browserExtensionId", ParameterLocation::Path, true),
            param("start_date", ParameterLocation::Query, false),
            param("page", ParameterLocation::Query, false),
        ];
        let catalog = Catalog::new(vec![op.clone()]);
        let overrides = Overrides::default();
        let fields = DeclarationBuilder::new(&catalog, &overrides).operation_fields(&op);

        let customer = &fields[0];
        assert_eq!(customer.display_name, "Customer ID");
        assert_eq!(
            customer.kind,
            FieldKind::DynamicOptions { loader: OptionLoader::Customers, depends_on: vec![] }
        );
        assert!(customer.placeholder.is_none());

        let extension = &fields[1];
        assert_eq!(
            extension.kind,
            FieldKind::DynamicOptions {
                loader: OptionLoader::BrowserExtensions,
                depends_on: vec![
                    "path_get_customers_by_customerid_browser_extensions_by_browserextensionid_users_customerId"
                        .to_string()
                ],
            }
        );
        assert_eq!(fields[2].kind, FieldKind::DateTime);
        assert_eq!(fields[3].kind, FieldKind::String);

        let extra: Vec<&str> = fields[4..].iter().map(|f| f.display_name.as_str()).collect();
        assert_eq!(extra, ["Return All", "Max Results"]);
        assert_eq!(fields[4].default, json!(true));
        assert_eq!(fields[5].default, json!(0));
        assert!(fields
            .iter()
            .all(|f| f.display_options.show.resource == ["Browser Extensions"]));
    }

    #[test]
    fn usage_operations_get_page_size_and_optional_customer_placeholder() {
        let mut op = make_operation("get_usage", "Usage", Some("Usage"));
        op.parameters = vec![param("customerId", ParameterLocation::Query, false)];
        let catalog = Catalog::new(vec![op.clone()]);
        let overrides = Overrides::default();
        let fields = DeclarationBuilder::new(&catalog, &overrides).operation_fields(&op);

        assert_eq!(fields[0].placeholder.as_deref(), Some("All customers (optional)"));
        assert_eq!(fields[0].name, "query_get_usage_customerId");
        let page_size = fields.iter().find(|f| f.display_name == "Page Size").unwrap();
        assert_eq!(page_size.name, "pagination_get_usage_pageSize");
        assert_eq!(page_size.default, json!(1000));
    }

    #[test]
    fn simple_body_gets_property_fields_and_json_override() {
        let mut op = make_operation("post_customers", "Customers", Some("Create customer"));
        op.method = HttpMethod::Post;
        let mut properties = indexmap::IndexMap::new();
        properties.insert(
            "name".to_string(),
            SchemaProperty { schema_type: SchemaType::String, description: None },
        );
        properties.insert(
            "subscription_id".to_string(),
            SchemaProperty { schema_type: SchemaType::Integer, description: None },
        );
        op.request_body = Some(RequestBodyDescriptor {
            content_type: "application/json".into(),
            schema: SchemaShape {
                kind: "object".into(),
                is_simple_object: true,
                required: vec!["name".into()],
                properties: Some(properties),
            },
        });
        let catalog = Catalog::new(vec![op.clone()]);
        let overrides = Overrides::default();
        let fields = DeclarationBuilder::new(&catalog, &overrides).operation_fields(&op);

        let summary: Vec<(&str, &str, bool)> = fields
            .iter()
            .map(|f| (f.display_name.as_str(), f.name.as_str(), f.required))
            .collect();
        assert_eq!(
            summary,
            [
                ("name", "body_post_customers_name", true),
                ("Subscription ID", "body_post_customers_subscription_id", false),
                ("Body (JSON Override)", "bodyJson_post_customers_json", false),
            ]
        );
        assert_eq!(fields[2].kind, FieldKind::Json);
        assert_eq!(fields[2].default, json!("{}"));
    }

    #[test]
    fn opaque_body_gets_single_json_field() {
        let mut op = make_operation("post_things", "Things", None);
        op.request_body = Some(RequestBodyDescriptor {
            content_type: "application/json".into(),
            schema: SchemaShape {
                kind: "array".into(),
                is_simple_object: false,
                required: Vec::new(),
                properties: None,
            },
        });
        let catalog = Catalog::new(vec![op.clone()]);
        let overrides = Overrides::default();
        let fields = DeclarationBuilder::new(&catalog, &overrides).operation_fields(&op);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].display_name, "Body");
        assert_eq!(fields[0].name, "bodyJson_post_things_json");
    }

    #[test]
    fn field_names_unique_across_embedded_catalog() {
        let catalog = Catalog::embedded().unwrap();
        let overrides = Overrides::builtin();
        let builder = DeclarationBuilder::new(&catalog, &overrides);
        let mut seen = std::collections::HashSet::new();
        for op in catalog.operations() {
            for field in builder.operation_fields(op) {
                assert!(seen.insert(field.name.clone()), "duplicate field {}", field.name);
            }
        }
    }

    #[test]
    fn describe_embedded_catalog() {
        let catalog = Catalog::embedded().unwrap();
        let overrides = Overrides::builtin();
        let builder = DeclarationBuilder::new(&catalog, &overrides);

        let resources = builder.resource_options();
        assert_eq!(resources[0].name, "Raw Request");
        assert!(names(&resources).contains(&"Custom URL Groups"));
        assert!(names(&resources).contains(&"Custom URLs"));

        let agents = builder.operation_options("Agents");
        assert!(names(&agents).contains(&"Get a list of agents including children"));

        let description = builder.describe();
        assert_eq!(description.properties[0].name, RESOURCE_FIELD);
        let output_mode = description
            .properties
            .iter()
            .find(|f| f.name == OUTPUT_MODE_FIELD)
            .unwrap();
        assert_eq!(output_mode.display_options.hide.resource, ["raw"]);

        let value = serde_json::to_value(&description).unwrap();
        assert_eq!(value["properties"][0]["type"], "options");
        assert_eq!(value["properties"][0]["default"], "raw");
    }
}
