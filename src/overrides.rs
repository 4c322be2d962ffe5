//! Corrections to labels derived from the OpenAPI document.

use std::collections::HashMap;

/// Optional per-operation correction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOverride {
    pub resource_name: Option<String>,
    pub operation_name: Option<String>,
    /// Excluded from resource and operation listings; still dispatchable.
    pub hidden: bool,
}

impl OperationOverride {
    pub fn operation_name(name: impl Into<String>) -> Self {
        Self {
            operation_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Immutable override table keyed by operation id.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    entries: HashMap<String, OperationOverride>,
}

impl Overrides {
    /// The corrections shipped with the node.
    pub fn builtin() -> Self {
        Self::default()
            .with(
                "get_customers_by_customerid_agents_with_children",
                OperationOverride::operation_name("Get a list of agents including children"),
            )
            .with(
                "post_customers_by_customerid_custom_url_groups",
                OperationOverride::operation_name("Create custom URL group under a customer"),
            )
    }

    pub fn with(mut self, operation_id: impl Into<String>, entry: OperationOverride) -> Self {
        self.entries.insert(operation_id.into(), entry);
        self
    }

    pub fn get(&self, operation_id: &str) -> Option<&OperationOverride> {
        self.entries.get(operation_id)
    }

    pub fn is_hidden(&self, operation_id: &str) -> bool {
        self.get(operation_id).is_some_and(|o| o.hidden)
    }
}
