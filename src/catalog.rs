//! The compiled operation table shipped with the crate.

use crate::error::CatalogError;
use crate::spec::OperationDescriptor;

/// Output of `defensx generate`, compiled from `openapi/defensx-partner.yaml`.
const GENERATED_OPERATIONS: &str = include_str!("generated/operations.json");

/// Read-only table of every known operation, loaded once and shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    operations: Vec<OperationDescriptor>,
}

impl Catalog {
    pub fn new(operations: Vec<OperationDescriptor>) -> Self {
        Self { operations }
    }

    /// Decode the generated table bundled at compile time.
    pub fn embedded() -> Result<Self, CatalogError> {
        let operations = serde_json::from_str(GENERATED_OPERATIONS).map_err(CatalogError)?;
        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[OperationDescriptor] {
        &self.operations
    }

    pub fn find(&self, id: &str) -> Option<&OperationDescriptor> {
        self.operations.iter().find(|op| op.id == id)
    }
}
