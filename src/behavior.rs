//! Per-operation dispatch behaviour.
//!
//! Each operation is assigned exactly one behaviour class when the OpenAPI
//! document is compiled. The dispatcher reads it from the descriptor instead of
//! matching operation ids at request time.

use serde::{Deserialize, Serialize};

const USERS_LIST: &str = "get_customers_by_customerid_users";
const GROUPS_LIST: &str = "get_customers_by_customerid_groups";
const BROWSER_EXTENSION_USERS: &str =
    "get_customers_by_customerid_browser_extensions_by_browserextensionid_users";
const LOG_OPERATIONS: [&str; 6] = [
    "get_customers_by_customerid_logs_urls",
    "get_customers_by_customerid_logs_credentials",
    "get_customers_by_customerid_logs_file_transfers",
    "get_customers_by_customerid_logs_consents",
    "get_customers_by_customerid_logs_dns",
    "get_customers_by_customerid_logs_rbi",
];
const USAGE_OPERATIONS: [&str; 2] = ["get_usage", "get_usage_current"];
const BROWSER_EXTENSION_LISTS: [&str; 2] = [
    "get_customers_by_customerid_browser_extensions",
    "get_customers_by_customerid_browser_extensions_low_reputation",
];
const CUSTOM_URLS_IN_GROUP: &str =
    "get_customers_by_customerid_custom_url_groups_by_customurlgroupid_custom_urls";

/// Page size policy of a paginated operation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    pub default_page_size: u64,
    /// Start page and page size come from the user's `page`/`limit` query values.
    #[serde(default)]
    pub support_requested_page_and_limit: bool,
}

impl PaginationConfig {
    pub const USERS: Self = Self {
        default_page_size: 1000,
        support_requested_page_and_limit: true,
    };
    pub const LISTS: Self = Self {
        default_page_size: 100,
        support_requested_page_and_limit: false,
    };
}

/// How the dispatcher executes and reshapes one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Behavior {
    /// Single request, response shaped as-is.
    #[default]
    Plain,
    /// Page/limit loop with list extraction by key probing.
    PaginatedGeneric(PaginationConfig),
    /// Page loop flattening `usageBySubscriptions`.
    PaginatedUsage,
    /// Array elements gain the `customerId` path value.
    EnrichWithCustomerId,
    /// Array elements gain the `customUrlGroupId` path value.
    EnrichWithGroupId,
}

impl Behavior {
    /// Assign the behaviour class for a compiled operation id.
    pub fn classify(operation_id: &str) -> Self {
        if operation_id == USERS_LIST {
            return Self::PaginatedGeneric(PaginationConfig::USERS);
        }
        if operation_id == GROUPS_LIST
            || operation_id == BROWSER_EXTENSION_USERS
            || LOG_OPERATIONS.contains(&operation_id)
        {
            return Self::PaginatedGeneric(PaginationConfig::LISTS);
        }
        if USAGE_OPERATIONS.contains(&operation_id) {
            return Self::PaginatedUsage;
        }
        if BROWSER_EXTENSION_LISTS.contains(&operation_id) {
            return Self::EnrichWithCustomerId;
        }
        if operation_id == CUSTOM_URLS_IN_GROUP {
            return Self::EnrichWithGroupId;
        }
        Self::Plain
    }

    /// `page`/`limit` query fields are driven by the paginator, never by the user.
    pub fn skips_user_pagination_params(&self) -> bool {
        matches!(self, Self::PaginatedGeneric(_))
    }

    /// Output field name and the path parameter it is copied from.
    pub fn enrichment(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::EnrichWithCustomerId => Some(("customerId", "customerId")),
            Self::EnrichWithGroupId => Some(("customUrlGroupId", "customUrlGroupId")),
            _ => None,
        }
    }
}

/// Operations that get the `Return All` / `Max Results` (and `Page Size`) fields.
pub fn pagination_fields_for(operation_id: &str) -> PaginationFields {
    if USAGE_OPERATIONS.contains(&operation_id) {
        PaginationFields::WithPageSize
    } else if operation_id == BROWSER_EXTENSION_USERS {
        PaginationFields::Limits
    } else {
        PaginationFields::None
    }
}

/// Extra pagination inputs declared for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationFields {
    None,
    /// `Return All` and `Max Results`.
    Limits,
    /// `Return All`, `Max Results` and `Page Size`.
    WithPageSize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_assigns_families() {
        assert_eq!(
            Behavior::classify("get_customers_by_customerid_users"),
            Behavior::PaginatedGeneric(PaginationConfig::USERS)
        );
        assert_eq!(
            Behavior::classify("get_customers_by_customerid_logs_dns"),
            Behavior::PaginatedGeneric(PaginationConfig::LISTS)
        );
        assert_eq!(Behavior::classify("get_usage_current"), Behavior::PaginatedUsage);
        assert_eq!(
            Behavior::classify("get_customers_by_customerid_browser_extensions_low_reputation"),
            Behavior::EnrichWithCustomerId
        );
        assert_eq!(Behavior::classify("get_status"), Behavior::Plain);
    }

    #[test]
    fn only_generic_pagination_skips_user_page_params() {
        assert!(Behavior::PaginatedGeneric(PaginationConfig::LISTS).skips_user_pagination_params());
        assert!(!Behavior::PaginatedUsage.skips_user_pagination_params());
        assert!(!Behavior::Plain.skips_user_pagination_params());
    }

    #[test]
    fn behavior_serializes_with_kind_tag() {
        let value = serde_json::to_value(Behavior::PaginatedGeneric(PaginationConfig::USERS)).unwrap();
        assert_eq!(
            value,
            json!({"kind": "paginated_generic", "defaultPageSize": 1000, "supportRequestedPageAndLimit": true})
        );
        let plain: Behavior = serde_json::from_value(json!({"kind": "plain"})).unwrap();
        assert_eq!(plain, Behavior::Plain);
    }

    #[test]
    fn pagination_fields_only_for_usage_and_extension_users() {
        assert_eq!(pagination_fields_for("get_usage"), PaginationFields::WithPageSize);
        assert_eq!(
            pagination_fields_for(BROWSER_EXTENSION_USERS),
            PaginationFields::Limits
        );
        assert_eq!(
            pagination_fields_for("get_customers_by_customerid_users"),
            PaginationFields::None
        );
    }
}
