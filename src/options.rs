//! Dynamic option providers for the customer, browser-extension and
//! policy-group selectors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::catalog::Catalog;
use crate::credentials::Credentials;
use crate::declarations::{
    compare_labels, customer_field_name, is_customer_id_field, OptionEntry, OPERATION_FIELD,
};
use crate::dispatch::ParameterSource;
use crate::error::NodeError;
use crate::transport::{ApiRequest, Transport};

/// Which provider fills a dynamic selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionLoader {
    #[serde(rename = "getCustomerOptions")]
    Customers,
    #[serde(rename = "getBrowserExtensionOptions")]
    BrowserExtensions,
    #[serde(rename = "getPolicyGroupOptions")]
    PolicyGroups,
}

impl OptionLoader {
    /// Load options for the selector given the node's current field values.
    pub fn load<T: Transport, S: ParameterSource>(
        self,
        catalog: &Catalog,
        credentials: &Credentials,
        transport: &T,
        current: &S,
    ) -> Result<Vec<OptionEntry>, NodeError> {
        let op = current
            .parameter(OPERATION_FIELD)
            .and_then(|v| v.as_str().and_then(|id| catalog.find(id)));

        match self {
            Self::Customers => {
                let required = op
                    .and_then(|op| op.parameters.iter().find(|p| is_customer_id_field(&p.name)))
                    .is_some_and(|p| p.required);
                load_customer_options(credentials, transport, required)
            }
            Self::BrowserExtensions | Self::PolicyGroups => {
                let customer_id = op
                    .and_then(|op| current.parameter(&customer_field_name(op)))
                    .and_then(|v| text_of(&v));
                if self == Self::BrowserExtensions {
                    load_browser_extension_options(credentials, transport, customer_id.as_deref())
                } else {
                    load_policy_group_options(credentials, transport, customer_id.as_deref())
                }
            }
        }
    }
}

/// Customers of the partner, behind a leading empty sentinel option.
pub fn load_customer_options<T: Transport>(
    credentials: &Credentials,
    transport: &T,
    customer_required: bool,
) -> Result<Vec<OptionEntry>, NodeError> {
    let response = fetch_list(credentials, transport, "/customers")?;
    let mut options: Vec<OptionEntry> = response
        .iter()
        .filter_map(|customer| {
            let obj = customer.as_object()?;
            let id = obj.get("id").and_then(text_of)?;
            let name = obj.get("name").and_then(text_of).unwrap_or_else(|| id.clone());
            Some(OptionEntry::new(name, id))
        })
        .collect();
    sort_options(&mut options);

    let sentinel = if customer_required {
        "Select a customer"
    } else {
        "All customers"
    };
    options.insert(0, OptionEntry::new(sentinel, ""));
    Ok(options)
}

/// Browser extensions of the selected customer; empty without a request when
/// no customer is selected.
pub fn load_browser_extension_options<T: Transport>(
    credentials: &Credentials,
    transport: &T,
    customer_id: Option<&str>,
) -> Result<Vec<OptionEntry>, NodeError> {
    let Some(customer_id) = customer_id.filter(|id| !id.is_empty()) else {
        return Ok(Vec::new());
    };
    let endpoint = format!(
        "/customers/{}/browser_extensions",
        urlencoding::encode(customer_id)
    );
    let mut options: Vec<OptionEntry> = fetch_list(credentials, transport, &endpoint)?
        .iter()
        .filter_map(|extension| {
            let obj = extension.as_object()?;
            let value = numeric_id(obj.get("id")?)?;
            let name = obj
                .get("name")
                .and_then(text_of)
                .or_else(|| text_of(obj.get("id")?))?;
            Some(OptionEntry::new(name, value))
        })
        .collect();
    sort_options(&mut options);
    Ok(options)
}

/// Policy groups of the selected customer, labelled `name - config_type - targets`.
pub fn load_policy_group_options<T: Transport>(
    credentials: &Credentials,
    transport: &T,
    customer_id: Option<&str>,
) -> Result<Vec<OptionEntry>, NodeError> {
    let Some(customer_id) = customer_id.filter(|id| !id.is_empty()) else {
        return Ok(Vec::new());
    };
    let endpoint = format!("/customers/{}/policies", urlencoding::encode(customer_id));
    let mut options: Vec<OptionEntry> = fetch_list(credentials, transport, &endpoint)?
        .iter()
        .filter_map(|policy| {
            let obj = policy.as_object()?;
            let value = numeric_id(obj.get("id")?)?;
            let base = obj
                .get("name")
                .and_then(text_of)
                .or_else(|| obj.get("id").and_then(text_of))?;

            let mut parts = vec![base.trim().to_string()];
            if let Some(config_type) = obj
                .get("config_type")
                .or_else(|| obj.get("configType"))
                .and_then(text_of)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
            {
                parts.push(config_type);
            }
            let targets = match obj.get("targets") {
                Some(Value::Array(targets)) => targets
                    .iter()
                    .filter_map(text_of)
                    .collect::<Vec<_>>()
                    .join(", "),
                Some(other) => text_of(other).map(|t| t.trim().to_string()).unwrap_or_default(),
                None => String::new(),
            };
            if !targets.is_empty() {
                parts.push(targets);
            }

            let name = parts.join(" - ");
            (!parts[0].is_empty()).then(|| OptionEntry::new(name, value))
        })
        .collect();
    sort_options(&mut options);
    Ok(options)
}

fn fetch_list<T: Transport>(
    credentials: &Credentials,
    transport: &T,
    endpoint: &str,
) -> Result<Vec<Value>, NodeError> {
    let url = credentials.api_url(endpoint)?;
    debug!(%url, "loading options");
    match transport.send(&ApiRequest::get(url))? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn sort_options(options: &mut [OptionEntry]) {
    options.sort_by(|a, b| compare_labels(&a.name, &b.name));
}

/// Non-empty display text of a scalar.
fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric ids stay numbers, numeric strings become numbers, anything else
/// keeps its text.
fn numeric_id(id: &Value) -> Option<Value> {
    match id {
        Value::Number(_) => Some(id.clone()),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Some(Value::from(n)),
            Err(_) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .or_else(|| text_of(id).map(Value::String)),
        },
        other => text_of(other).map(Value::String),
    }
}
