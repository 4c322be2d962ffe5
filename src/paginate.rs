//! Page/limit loops for list endpoints.
//!
//! Both paginated families share one loop. They differ only in how items are
//! pulled out of a page and in whether `page`/`limit` are sent from the start.

use serde_json::{Map, Value};
use tracing::debug;

use crate::behavior::PaginationConfig;
use crate::error::TransportError;
use crate::transport::{ApiRequest, Transport};

/// Keys probed, in order, for the list inside an object response.
pub const LIST_KEYS: [&str; 4] = ["items", "users", "results", "data"];

/// Page size of the usage family when nothing else is configured.
pub const USAGE_DEFAULT_PAGE_SIZE: u64 = 1000;

const USAGE_KEY: &str = "usageBySubscriptions";

/// Where the list of a page response lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListShape<'a> {
    /// The response is the list.
    Array(&'a [Value]),
    /// The first array found under one of [`LIST_KEYS`].
    Keyed {
        key: &'static str,
        items: &'a [Value],
    },
    Empty,
}

impl<'a> ListShape<'a> {
    pub fn decode(response: &'a Value) -> Self {
        match response {
            Value::Array(items) => Self::Array(items),
            Value::Object(obj) => LIST_KEYS
                .iter()
                .find_map(|&key| match obj.get(key) {
                    Some(Value::Array(items)) => Some(Self::Keyed { key, items }),
                    _ => None,
                })
                .unwrap_or(Self::Empty),
            _ => Self::Empty,
        }
    }

    pub fn items(self) -> &'a [Value] {
        match self {
            Self::Array(items) | Self::Keyed { items, .. } => items,
            Self::Empty => &[],
        }
    }
}

pub fn extract_list_items(response: &Value) -> Vec<Value> {
    ListShape::decode(response).items().to_vec()
}

/// Flatten `usageBySubscriptions` out of an array of usage records, or out of a
/// single usage object. Array elements without it are kept as-is.
pub fn extract_usage_by_subscriptions(response: &Value) -> Vec<Value> {
    match response {
        Value::Array(elements) => {
            let mut flattened = Vec::new();
            for element in elements {
                match element.get(USAGE_KEY) {
                    Some(Value::Array(usage)) => flattened.extend(usage.iter().cloned()),
                    _ => flattened.push(element.clone()),
                }
            }
            flattened
        }
        Value::Object(obj) => match obj.get(USAGE_KEY) {
            Some(Value::Array(usage)) => usage.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// How page items are pulled out of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemExtraction {
    ListKeys,
    UsageBySubscriptions,
}

impl ItemExtraction {
    fn extract(self, response: &Value) -> Vec<Value> {
        match self {
            Self::ListKeys => extract_list_items(response),
            Self::UsageBySubscriptions => extract_usage_by_subscriptions(response),
        }
    }
}

/// User limits read from the pagination fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub return_all: bool,
    /// `0` means unlimited.
    pub max_results: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            return_all: true,
            max_results: 0,
        }
    }
}

/// A planned page loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator {
    extraction: ItemExtraction,
    start_page: u64,
    page_size: u64,
    send_page_params: bool,
    limits: PageLimits,
}

impl Paginator {
    /// Generic list family. `page`/`limit` are always sent.
    pub fn generic(
        config: PaginationConfig,
        query: &Map<String, Value>,
        configured_page_size: Option<u64>,
        limits: PageLimits,
    ) -> Self {
        let mut page_size = configured_page_size
            .filter(|&size| size > 0)
            .unwrap_or(config.default_page_size);
        let mut start_page = 1;
        if config.support_requested_page_and_limit {
            start_page = positive_number(query.get("page")).unwrap_or(1);
            page_size = positive_number(query.get("limit")).unwrap_or(page_size);
        }

        Self {
            extraction: ItemExtraction::ListKeys,
            start_page,
            page_size,
            send_page_params: true,
            limits,
        }
    }

    /// Usage family. `page`/`limit` are sent only when the operation declares
    /// them or once a response reports more than one page.
    pub fn usage(
        declares_page_params: bool,
        query: &Map<String, Value>,
        configured_page_size: Option<u64>,
        limits: PageLimits,
    ) -> Self {
        let page_size = positive_number(query.get("limit"))
            .or(configured_page_size.filter(|&size| size > 0))
            .unwrap_or(USAGE_DEFAULT_PAGE_SIZE);

        Self {
            extraction: ItemExtraction::UsageBySubscriptions,
            start_page: positive_number(query.get("page")).unwrap_or(1),
            page_size,
            send_page_params: declares_page_params,
            limits,
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Run the loop from `request`, returning at most `max_results` items.
    pub fn run<T: Transport>(
        &self,
        transport: &T,
        request: &ApiRequest,
    ) -> Result<Vec<Value>, TransportError> {
        let mut collected: Vec<Value> = Vec::new();
        let mut page = self.start_page;
        let mut total_pages: u64 = 1;
        let mut send_page_params = self.send_page_params;
        let mut previous: Option<Vec<Value>> = None;

        loop {
            let mut paged = request.clone();
            if send_page_params {
                paged.query.insert("page".into(), Value::from(page));
                paged.query.insert("limit".into(), Value::from(self.page_size));
            }

            let response = transport.send(&paged)?;
            let items = self.extraction.extract(&response);
            // A backend that ignores `page` keeps serving the same list.
            if !items.is_empty() && previous.as_ref() == Some(&items) {
                debug!(page, "page repeats the previous one, stopping");
                break;
            }
            let fetched = items.len() as u64;
            collected.extend(items.iter().cloned());
            previous = Some(items);
            debug!(page, fetched, collected = collected.len(), "fetched page");

            if self.limits.max_results > 0 && collected.len() >= self.limits.max_results {
                break;
            }
            if !self.limits.return_all {
                break;
            }

            let current_page = positive_number(response.get("page")).unwrap_or(page);
            match positive_number(response.get("totalPages")) {
                Some(total) => total_pages = total,
                None if fetched < self.page_size => total_pages = current_page,
                None if send_page_params => total_pages = total_pages.max(current_page + 1),
                None => {}
            }
            if !send_page_params && total_pages > 1 {
                send_page_params = true;
            }

            if current_page >= total_pages {
                break;
            }
            page = current_page + 1;
        }

        if self.limits.max_results > 0 {
            collected.truncate(self.limits.max_results);
        }
        Ok(collected)
    }
}

/// A strictly positive whole number from a JSON number or numeric string.
fn positive_number(value: Option<&Value>) -> Option<u64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.is_finite() && number >= 1.0 {
        Some(number.trunc() as u64)
    } else {
        None
    }
}
