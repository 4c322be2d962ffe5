//! DefensX Partner API node.
//!
//! Compiles the partner OpenAPI document into an operation table, derives the
//! resource → operation → field declarations a host renders, and dispatches one
//! input record at a time against the API, paginating and reshaping responses
//! into output records.
//!
//! # Usage
//!
//! ```no_run
//! use defensx_node::{Catalog, Credentials, Dispatcher, HttpTransport};
//! use reqwest::blocking::Client;
//! use serde_json::json;
//!
//! let catalog = Catalog::embedded().unwrap();
//! let credentials = Credentials::new("https://cloud.defensx.com", "api-key");
//! let transport = HttpTransport::from_credentials(Client::new(), &credentials);
//! let dispatcher = Dispatcher::new(&catalog, &credentials, transport);
//!
//! let record = json!({"resource": "raw", "method": "GET", "endpoint": "/status"});
//! let mut out = Vec::new();
//! dispatcher
//!     .execute(&[record.as_object().cloned().unwrap()], &mut out)
//!     .unwrap();
//! ```

pub mod behavior;
pub mod builder;
pub mod catalog;
pub mod credentials;
pub mod declarations;
pub mod dispatch;
pub mod error;
pub mod options;
pub mod overrides;
pub mod paginate;
pub mod spec;
pub mod transport;

pub use behavior::{Behavior, PaginationConfig};
pub use builder::{build_commands, find_operation, normalize_group, CliConfig, CommandNaming};
pub use catalog::Catalog;
pub use credentials::Credentials;
pub use declarations::{DeclarationBuilder, FieldDeclaration, FieldKind, NodeDescription, OptionEntry};
pub use dispatch::{Dispatcher, OutputMode, ParameterSource};
pub use error::{CatalogError, CompileError, NodeError, TransportError};
pub use options::OptionLoader;
pub use overrides::{OperationOverride, Overrides};
pub use spec::{extract_operations, generate, HttpMethod, OperationDescriptor};
pub use transport::{ApiRequest, HttpTransport, Transport};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
