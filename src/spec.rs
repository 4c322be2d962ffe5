//! OpenAPI spec → operation table
//!
//! Parses the DefensX OpenAPI document into a flat, order-stable list of
//! `OperationDescriptor`s that the declaration builder and the dispatcher
//! consume. One level of `#/...` `$ref` indirection is resolved against the
//! root document; unresolvable references degrade to absent or opaque shapes.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::behavior::Behavior;
use crate::error::CompileError;

/// Appended to the description of date-like parameters and body properties.
pub const DATE_FORMAT_SUFFIX: &str =
    " (in format YYYY-MM-DD, with optional HH:MM:SS and no timezone)";

/// File name of the bundled OpenAPI document.
pub const SPEC_FILE_NAME: &str = "defensx-partner.yaml";

const DATE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}";
const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP methods the compiler turns into operations, in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// GET and DELETE never carry a request body.
    pub fn sends_body(self) -> bool {
        !matches!(self, Self::Get | Self::Delete)
    }

    fn path_item_key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Where a parameter is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
}

/// Normalized schema type of a parameter or body property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    #[serde(other)]
    Unknown,
}

impl SchemaType {
    fn from_declared(declared: &str) -> Self {
        match declared {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            _ => Self::Unknown,
        }
    }

    /// Flatly representable as a single form field.
    pub fn is_scalar(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// A single path or query parameter of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub schema_type: SchemaType,
}

/// One property of a simple-object request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaProperty {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Shape of a request body schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaShape {
    /// Declared schema type (`object`, `array`, ... or `unknown`).
    #[serde(rename = "type")]
    pub kind: String,
    pub is_simple_object: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaProperty>>,
}

impl SchemaShape {
    fn opaque(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            is_simple_object: false,
            required: Vec::new(),
            properties: None,
        }
    }

    /// Properties rendered as individual fields, if the shape is simple.
    pub fn simple_properties(&self) -> Option<&IndexMap<String, SchemaProperty>> {
        if self.is_simple_object {
            self.properties.as_ref()
        } else {
            None
        }
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }
}

/// JSON request body of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBodyDescriptor {
    pub content_type: String,
    pub schema: SchemaShape,
}

/// A compiled API operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Unique across the whole table.
    pub id: String,
    /// First OpenAPI tag, or `Default`.
    pub tag: String,
    pub method: HttpMethod,
    /// URL path template (e.g. "/customers/{customerId}/users")
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodyDescriptor>,
    #[serde(default)]
    pub behavior: Behavior,
}

impl OperationDescriptor {
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn declares_parameter(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }
}

/// Compile every operation of an OpenAPI document.
///
/// A missing or non-object `paths` is fatal; everything else degrades.
pub fn extract_operations(doc: &Value) -> Result<Vec<OperationDescriptor>, CompileError> {
    let paths = doc
        .get("paths")
        .and_then(Value::as_object)
        .ok_or(CompileError::MissingPaths)?;

    let resolver = RefResolver { root: doc };
    let mut used_ids = HashSet::new();
    let mut ops = Vec::new();

    for (path, path_item) in paths {
        let Some(path_item) = path_item.as_object() else {
            continue;
        };

        for method in HttpMethod::ALL {
            let Some(operation) = path_item
                .get(method.path_item_key())
                .and_then(Value::as_object)
            else {
                continue;
            };

            ops.push(extract_single_operation(
                &resolver,
                path,
                method,
                path_item,
                operation,
                &mut used_ids,
            ));
        }
    }

    info!(operations = ops.len(), "compiled OpenAPI document");
    Ok(ops)
}

fn extract_single_operation(
    resolver: &RefResolver<'_>,
    path: &str,
    method: HttpMethod,
    path_item: &Map<String, Value>,
    operation: &Map<String, Value>,
    used_ids: &mut HashSet<String>,
) -> OperationDescriptor {
    let base_id = operation
        .get("operationId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| synthesize_operation_id(method, path));
    let id = claim_unique_id(base_id, used_ids);

    let tag = operation
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| tags.iter().find_map(Value::as_str))
        .unwrap_or("Default")
        .to_string();

    let text = |key: &str| operation.get(key).and_then(Value::as_str).map(str::to_string);

    debug!(%id, %method, path, "compiled operation");

    OperationDescriptor {
        behavior: Behavior::classify(&id),
        id,
        tag,
        method,
        path: path.to_string(),
        summary: text("summary"),
        description: text("description"),
        parameters: collect_params(resolver, path_item, operation),
        request_body: extract_body(resolver, operation),
    }
}

/// `GET /customers/{customerId}/users` → `get_customers_by_customerid_users`
pub fn synthesize_operation_id(method: HttpMethod, path: &str) -> String {
    let raw = format!("{}_{}", method.as_str(), substitute_path_params(path));
    let mut id = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c.to_ascii_lowercase());
        } else if !id.ends_with('_') {
            id.push('_');
        }
    }
    id.trim_matches('_').to_string()
}

fn substitute_path_params(path: &str) -> String {
    let mut result = String::with_capacity(path.len() + 8);
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(len) = rest[open + 1..].find('}').filter(|&len| len > 0) else {
            break;
        };
        result.push_str(&rest[..open]);
        result.push_str("by_");
        result.push_str(&rest[open + 1..open + 1 + len]);
        rest = &rest[open + len + 2..];
    }
    result.push_str(rest);
    result
}

/// Suffix `_2`, `_3`, ... until the id is unused, in first-seen order.
fn claim_unique_id(base: String, used: &mut HashSet<String>) -> String {
    let id = if used.contains(&base) {
        let mut counter = 2;
        while used.contains(&format!("{base}_{counter}")) {
            counter += 1;
        }
        format!("{base}_{counter}")
    } else {
        base
    };
    used.insert(id.clone());
    id
}

/// Concatenate path-item and operation parameters, keeping path/query only.
fn collect_params(
    resolver: &RefResolver<'_>,
    path_item: &Map<String, Value>,
    operation: &Map<String, Value>,
) -> Vec<ParameterDescriptor> {
    [path_item.get("parameters"), operation.get("parameters")]
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|param| parse_param(resolver, param))
        .collect()
}

fn parse_param(resolver: &RefResolver<'_>, param: &Value) -> Option<ParameterDescriptor> {
    let param = resolver.resolve(Some(param))?;
    let location = match param.get("in").and_then(Value::as_str) {
        Some("path") => ParameterLocation::Path,
        Some("query") => ParameterLocation::Query,
        _ => return None,
    };
    let name = param.get("name")?.as_str()?.to_string();
    let schema = resolver.resolve(param.get("schema"));
    let schema_type = schema
        .and_then(|s| s.get("type"))
        .and_then(Value::as_str)
        .map_or(SchemaType::String, SchemaType::from_declared);
    let description = param.get("description").and_then(Value::as_str);

    Some(ParameterDescriptor {
        name,
        location,
        required: param
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        description: describe(schema, description),
        schema_type,
    })
}

fn extract_body(
    resolver: &RefResolver<'_>,
    operation: &Map<String, Value>,
) -> Option<RequestBodyDescriptor> {
    let request_body = resolver.resolve(operation.get("requestBody"))?;
    let content = request_body.get("content")?.as_object()?;

    let media = content
        .get(JSON_CONTENT_TYPE)
        .and_then(Value::as_object)
        .or_else(|| content.get("application/*+json").and_then(Value::as_object));

    let schema = match media {
        Some(media) => extract_schema_shape(resolver, media.get("schema")),
        None => SchemaShape::opaque("unknown"),
    };

    Some(RequestBodyDescriptor {
        content_type: JSON_CONTENT_TYPE.to_string(),
        schema,
    })
}

fn extract_schema_shape(resolver: &RefResolver<'_>, schema: Option<&Value>) -> SchemaShape {
    let Some(schema) = resolver.resolve(schema) else {
        return SchemaShape::opaque("unknown");
    };
    let kind = schema.get("type").and_then(Value::as_str).unwrap_or("unknown");

    let properties = match schema.get("properties").and_then(Value::as_object) {
        Some(properties) if kind == "object" => properties,
        _ => return SchemaShape::opaque(kind),
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut is_simple_object = true;
    let mut shaped = IndexMap::with_capacity(properties.len());
    for (name, property) in properties {
        let resolved = resolver.resolve(Some(property));
        let schema_type = resolved
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .map_or(SchemaType::Unknown, SchemaType::from_declared);
        if !schema_type.is_scalar() {
            is_simple_object = false;
        }
        let description = resolved
            .and_then(|p| p.get("description"))
            .and_then(Value::as_str);

        shaped.insert(
            name.clone(),
            SchemaProperty {
                schema_type,
                description: describe(resolved, description),
            },
        );
    }

    SchemaShape {
        kind: "object".to_string(),
        is_simple_object,
        required,
        properties: Some(shaped),
    }
}

fn describe(schema: Option<&Map<String, Value>>, description: Option<&str>) -> Option<String> {
    if is_date_schema(schema) {
        Some(with_date_format_suffix(description))
    } else {
        description.map(str::to_string)
    }
}

/// `format: date` (any case) or a `\d{4}-\d{2}-\d{2}` pattern.
pub fn is_date_schema(schema: Option<&Map<String, Value>>) -> bool {
    let Some(schema) = schema else {
        return false;
    };
    if schema
        .get("format")
        .and_then(Value::as_str)
        .is_some_and(|f| f.eq_ignore_ascii_case("date"))
    {
        return true;
    }
    schema
        .get("pattern")
        .and_then(Value::as_str)
        .is_some_and(|p| p.contains(DATE_PATTERN))
}

/// Append the date format hint once.
pub fn with_date_format_suffix(description: Option<&str>) -> String {
    let normalized = description.unwrap_or("").trim();
    if normalized.is_empty() {
        return format!("Date{DATE_FORMAT_SUFFIX}");
    }
    if normalized.ends_with(DATE_FORMAT_SUFFIX) || normalized.contains(DATE_FORMAT_SUFFIX.trim()) {
        return normalized.to_string();
    }
    format!("{normalized}{DATE_FORMAT_SUFFIX}")
}

/// Single-level `#/...` pointer resolution against the root document.
struct RefResolver<'a> {
    root: &'a Value,
}

impl<'a> RefResolver<'a> {
    fn pointer(&self, reference: &str) -> Option<&'a Value> {
        let rest = reference.strip_prefix("#/")?;
        let mut current = self.root;
        for part in rest.split('/') {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Follow `$ref` if present; non-object targets count as absent.
    fn resolve(&self, value: Option<&'a Value>) -> Option<&'a Map<String, Value>> {
        let value = value?;
        let target = match value.get("$ref") {
            Some(reference) => self.pointer(reference.as_str()?)?,
            None => value,
        };
        target.as_object()
    }
}

// -- build-time generator --

/// Locations probed for the OpenAPI document, in order.
pub fn candidate_paths(package_root: &Path) -> Vec<PathBuf> {
    vec![
        package_root.join("openapi").join(SPEC_FILE_NAME),
        package_root.join("..").join(SPEC_FILE_NAME),
    ]
}

pub fn locate_document(package_root: &Path) -> Result<PathBuf, CompileError> {
    let candidates = candidate_paths(package_root);
    match candidates.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(CompileError::SpecNotFound { candidates }),
    }
}

/// Read a YAML (or JSON) OpenAPI document.
pub fn load_document(path: &Path) -> Result<Value, CompileError> {
    let raw = fs::read_to_string(path).map_err(|source| CompileError::SpecRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| CompileError::SpecParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the generated operations module.
pub fn write_operations(ops: &[OperationDescriptor], out: &Path) -> Result<(), CompileError> {
    let write_err = |source| CompileError::Write {
        path: out.to_path_buf(),
        source,
    };
    if let Some(dir) = out.parent() {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    let mut text = serde_json::to_string_pretty(ops).map_err(CompileError::Serialize)?;
    text.push('\n');
    fs::write(out, text).map_err(write_err)
}

/// Locate, compile and write the operation table in one step.
pub fn generate(package_root: &Path, out: &Path) -> Result<Vec<OperationDescriptor>, CompileError> {
    let spec_path = locate_document(package_root)?;
    info!(spec = %spec_path.display(), "loading OpenAPI document");
    let doc = load_document(&spec_path)?;
    let ops = extract_operations(&doc)?;
    write_operations(&ops, out)?;
    info!(out = %out.display(), operations = ops.len(), "wrote generated operations");
    Ok(ops)
}
