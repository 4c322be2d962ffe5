//! Field values → HTTP request dispatch
//!
//! Reads one input record's field values through a [`ParameterSource`],
//! resolves the selected operation, builds the request, runs it (paginating
//! where the operation's behaviour asks for it) and reshapes the response into
//! output records.

use std::str::FromStr;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::behavior::Behavior;
use crate::catalog::Catalog;
use crate::credentials::Credentials;
use crate::declarations::{
    field_name, FieldPrefix, BODY_FIELD, BODY_JSON, DEFAULT_ENDPOINT, ENDPOINT_FIELD,
    MAX_RESULTS, METHOD_FIELD, OPERATION_FIELD, OUTPUT_MODE_FIELD, PAGE_SIZE, QUERY_FIELD,
    RAW_RESOURCE, RESOURCE_FIELD, RETURN_ALL,
};
use crate::error::NodeError;
use crate::paginate::{PageLimits, Paginator};
use crate::spec::{HttpMethod, OperationDescriptor, ParameterLocation, SchemaType};
use crate::transport::{ApiRequest, Transport};

const INVALID_QUERY_JSON: &str = "Invalid Query Parameters JSON";
const INVALID_BODY_JSON: &str = "Invalid Body JSON";

/// Field values of one input record, looked up by field name.
pub trait ParameterSource {
    fn parameter(&self, name: &str) -> Option<Value>;
}

impl ParameterSource for Map<String, Value> {
    fn parameter(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// How responses become output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// One record per array element.
    #[default]
    Items,
    /// The whole response as a single record.
    Raw,
}

impl OutputMode {
    fn from_field(value: Option<Value>) -> Self {
        match value.as_ref().and_then(Value::as_str) {
            Some("raw") => Self::Raw,
            _ => Self::Items,
        }
    }
}

/// Coerce a field value to the declared schema type.
///
/// Absent, null and blank values yield `None` so the parameter is dropped.
pub fn coerce_value(
    schema_type: SchemaType,
    value: Option<&Value>,
    field: &str,
) -> Result<Option<Value>, NodeError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(v) => v,
    };

    let coerced = match schema_type {
        SchemaType::Integer | SchemaType::Number => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .filter(|n| n.is_finite());
            let number = match (number, schema_type) {
                (Some(n), SchemaType::Integer) => number_value(n.trunc()),
                (Some(n), _) => number_value(n),
                (None, _) => None,
            };
            number.ok_or_else(|| NodeError::InvalidNumber {
                field: field.to_string(),
            })?
        }
        SchemaType::Boolean => match value {
            Value::Bool(b) => Value::Bool(*b),
            other => match scalar_text(other).trim().to_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => {
                    return Err(NodeError::InvalidBoolean {
                        field: field.to_string(),
                    })
                }
            },
        },
        SchemaType::String | SchemaType::Unknown => Value::String(scalar_text(value)),
    };
    Ok(Some(coerced))
}

/// Whole numbers serialize as integers; non-finite input has no JSON form.
fn number_value(number: f64) -> Option<Value> {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Some(Value::from(number as i64))
    } else {
        serde_json::Number::from_f64(number).map(Value::Number)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parsed JSON of a JSON field; `None` when absent or blank.
fn parse_json_field(
    value: Option<Value>,
    context: &'static str,
) -> Result<Option<Value>, NodeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| NodeError::InvalidJson { context, source })
        }
        Some(other) => Ok(Some(other)),
    }
}

/// A JSON object field. Blank text and non-object JSON yield an empty object;
/// malformed JSON is an error.
pub fn parse_json_object(
    value: Option<Value>,
    context: &'static str,
) -> Result<Map<String, Value>, NodeError> {
    match parse_json_field(value, context)? {
        Some(Value::Object(obj)) => Ok(obj),
        _ => Ok(Map::new()),
    }
}

/// A non-empty object or array replaces the structured body.
fn parse_body_override(value: Option<Value>) -> Result<Option<Value>, NodeError> {
    match parse_json_field(value, INVALID_BODY_JSON)? {
        Some(Value::Object(obj)) if !obj.is_empty() => Ok(Some(Value::Object(obj))),
        Some(Value::Array(items)) if !items.is_empty() => Ok(Some(Value::Array(items))),
        _ => Ok(None),
    }
}

/// Append `response` to `out` according to the output mode.
pub fn append_response_items(out: &mut Vec<Value>, response: Value, mode: OutputMode) {
    match (mode, response) {
        (OutputMode::Items, Value::Array(elements)) => {
            out.extend(elements.into_iter().map(|element| match element {
                Value::Object(_) => element,
                other => json!({ "value": other }),
            }));
        }
        (OutputMode::Raw, Value::Object(obj)) => out.push(Value::Object(obj)),
        (OutputMode::Raw, other) => out.push(json!({ "items": other })),
        (OutputMode::Items, other) => out.push(other),
    }
}

/// Prefix every element with `field: id`. Object elements keep their own
/// entries; anything else becomes `{field, value}`.
pub fn enrich_with_id(elements: Vec<Value>, field: &str, id: &Value) -> Vec<Value> {
    elements
        .into_iter()
        .map(|element| {
            let mut enriched = Map::new();
            enriched.insert(field.to_string(), id.clone());
            match element {
                Value::Object(obj) => enriched.extend(obj),
                other => {
                    enriched.insert("value".to_string(), other);
                }
            }
            Value::Object(enriched)
        })
        .collect()
}

/// A catalog request ready to send, plus the path values it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub request: ApiRequest,
    pub path_values: Map<String, Value>,
}

/// Executes node input records against the partner API.
#[derive(Debug)]
pub struct Dispatcher<'a, T> {
    catalog: &'a Catalog,
    credentials: &'a Credentials,
    transport: T,
}

impl<'a, T: Transport> Dispatcher<'a, T> {
    pub fn new(catalog: &'a Catalog, credentials: &'a Credentials, transport: T) -> Self {
        Self {
            catalog,
            credentials,
            transport,
        }
    }

    /// Process records in order, appending output records to `out`.
    ///
    /// The first error stops processing; records already appended stay.
    pub fn execute<S: ParameterSource>(
        &self,
        items: &[S],
        out: &mut Vec<Value>,
    ) -> Result<(), NodeError> {
        for (index, item) in items.iter().enumerate() {
            if let Err(err) = self.execute_item(item, out) {
                warn!(item = index, error = %err, "execution aborted");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Process a single record.
    pub fn execute_item<S: ParameterSource>(
        &self,
        item: &S,
        out: &mut Vec<Value>,
    ) -> Result<(), NodeError> {
        self.credentials.base_url()?;

        let resource = item.parameter(RESOURCE_FIELD);
        if resource.as_ref().and_then(Value::as_str) == Some(RAW_RESOURCE) {
            return self.execute_raw(item, out);
        }

        let operation_id = match item.parameter(OPERATION_FIELD) {
            Some(Value::String(id)) if !id.trim().is_empty() => id,
            _ => return Err(NodeError::OperationNotSelected),
        };
        let op = self
            .catalog
            .find(&operation_id)
            .ok_or_else(|| NodeError::UnknownOperation {
                id: operation_id.clone(),
            })?;
        let mode = OutputMode::from_field(item.parameter(OUTPUT_MODE_FIELD));

        self.execute_operation(op, item, mode, out)
    }

    fn execute_raw<S: ParameterSource>(
        &self,
        item: &S,
        out: &mut Vec<Value>,
    ) -> Result<(), NodeError> {
        let method = match item.parameter(METHOD_FIELD) {
            Some(Value::String(m)) => {
                HttpMethod::from_str(&m).map_err(|_| NodeError::UnsupportedMethod { method: m })?
            }
            _ => HttpMethod::Get,
        };
        let endpoint = match item.parameter(ENDPOINT_FIELD) {
            Some(Value::String(e)) if !e.trim().is_empty() => e,
            _ => DEFAULT_ENDPOINT.to_string(),
        };

        let url = self.credentials.api_url(endpoint.trim())?;
        let query = parse_json_object(item.parameter(QUERY_FIELD), INVALID_QUERY_JSON)?;
        let body = parse_json_object(item.parameter(BODY_FIELD), INVALID_BODY_JSON)?;

        let request = ApiRequest {
            method,
            url,
            query,
            body: method.sends_body().then_some(Value::Object(body)),
        };
        let response = self.transport.send(&request)?;
        out.push(response);
        Ok(())
    }

    /// Resolve path, query and body of a catalog operation from field values.
    pub fn prepare<S: ParameterSource>(
        &self,
        op: &OperationDescriptor,
        item: &S,
    ) -> Result<PreparedRequest, NodeError> {
        let mut path = op.path.clone();
        let mut query = Map::new();
        let mut path_values = Map::new();

        for param in &op.parameters {
            if op.behavior.skips_user_pagination_params()
                && param.location == ParameterLocation::Query
                && (param.name == "page" || param.name == "limit")
            {
                continue;
            }

            let value = item.parameter(&field_name(param.location.into(), &op.id, &param.name));
            let Some(coerced) = coerce_value(param.schema_type, value.as_ref(), &param.name)?
            else {
                continue;
            };

            match param.location {
                ParameterLocation::Path => {
                    let text = scalar_text(&coerced);
                    path = path.replace(
                        &format!("{{{}}}", param.name),
                        &urlencoding::encode(&text),
                    );
                    path_values.insert(param.name.clone(), coerced);
                }
                ParameterLocation::Query => {
                    query.insert(param.name.clone(), coerced);
                }
            }
        }

        let body = self.build_body(op, item)?;
        let request = ApiRequest {
            method: op.method,
            url: self.credentials.api_url(&path)?,
            query,
            body: op
                .method
                .sends_body()
                .then(|| body.unwrap_or_else(|| Value::Object(Map::new()))),
        };
        Ok(PreparedRequest {
            request,
            path_values,
        })
    }

    fn build_body<S: ParameterSource>(
        &self,
        op: &OperationDescriptor,
        item: &S,
    ) -> Result<Option<Value>, NodeError> {
        let Some(request_body) = &op.request_body else {
            return Ok(None);
        };

        let override_value =
            item.parameter(&field_name(FieldPrefix::BodyJson, &op.id, BODY_JSON));
        if let Some(body) = parse_body_override(override_value)? {
            return Ok(Some(body));
        }

        let Some(properties) = request_body.schema.simple_properties() else {
            return Ok(None);
        };
        let mut body = Map::new();
        for (name, property) in properties {
            let value = item.parameter(&field_name(FieldPrefix::Body, &op.id, name));
            if let Some(coerced) = coerce_value(property.schema_type, value.as_ref(), name)? {
                body.insert(name.clone(), coerced);
            }
        }
        Ok(Some(Value::Object(body)))
    }

    fn page_limits<S: ParameterSource>(
        &self,
        op: &OperationDescriptor,
        item: &S,
    ) -> Result<(PageLimits, Option<u64>), NodeError> {
        let field = |name: &str| item.parameter(&field_name(FieldPrefix::Pagination, &op.id, name));

        let return_all = coerce_value(SchemaType::Boolean, field(RETURN_ALL).as_ref(), "Return All")?
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let max_results =
            coerce_value(SchemaType::Integer, field(MAX_RESULTS).as_ref(), "Max Results")?
                .and_then(|v| v.as_i64())
                .filter(|&n| n > 0)
                .map_or(0, |n| n as usize);
        let page_size = coerce_value(SchemaType::Integer, field(PAGE_SIZE).as_ref(), "Page Size")?
            .and_then(|v| v.as_i64())
            .filter(|&n| n > 0)
            .map(|n| n as u64);

        Ok((
            PageLimits {
                return_all,
                max_results,
            },
            page_size,
        ))
    }

    fn execute_operation<S: ParameterSource>(
        &self,
        op: &OperationDescriptor,
        item: &S,
        mode: OutputMode,
        out: &mut Vec<Value>,
    ) -> Result<(), NodeError> {
        let PreparedRequest {
            request,
            path_values,
        } = self.prepare(op, item)?;
        debug!(operation = %op.id, behavior = ?op.behavior, "executing operation");

        match op.behavior {
            Behavior::PaginatedGeneric(config) => {
                let (limits, page_size) = self.page_limits(op, item)?;
                let items = Paginator::generic(config, &request.query, page_size, limits)
                    .run(&self.transport, &request)?;
                append_response_items(out, Value::Array(items), mode);
            }
            Behavior::PaginatedUsage => {
                let (limits, page_size) = self.page_limits(op, item)?;
                let declares_page_params =
                    op.declares_parameter("page") || op.declares_parameter("limit");
                let items =
                    Paginator::usage(declares_page_params, &request.query, page_size, limits)
                        .run(&self.transport, &request)?;
                append_response_items(out, Value::Array(items), mode);
            }
            Behavior::Plain | Behavior::EnrichWithCustomerId | Behavior::EnrichWithGroupId => {
                let response = self.transport.send(&request)?;
                let enrichment = op
                    .behavior
                    .enrichment()
                    .and_then(|(field, param)| Some((field, path_values.get(param)?)));
                match (enrichment, mode, response) {
                    (Some((field, id)), OutputMode::Items, Value::Array(elements)) => {
                        let enriched = enrich_with_id(elements, field, id);
                        append_response_items(out, Value::Array(enriched), mode);
                    }
                    (_, _, response) => append_response_items(out, response, mode),
                }
            }
        }
        Ok(())
    }
}
