//! Data model shared by the validation pipeline and its reporters.

use serde::{Deserialize, Serialize};

use crate::error::PackageError;

/// Identifies one manifest fetch target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSpecification {
    /// Repository name, without any `.git` suffix.
    pub repository_name: String,

    /// Owning user or organisation.
    pub owner: String,

    /// Branch whose contents are fetched.
    pub branch_name: String,
}

impl RepoSpecification {
    pub fn new(
        repository_name: impl Into<String>,
        owner: impl Into<String>,
        branch_name: impl Into<String>,
    ) -> Self {
        Self {
            repository_name: repository_name.into(),
            owner: owner.into(),
            branch_name: branch_name.into(),
        }
    }
}

/// A product declared by a package (library, executable, plugin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,

    #[serde(default)]
    pub targets: Vec<String>,

    /// Product type as emitted by the dump tool, e.g. `{"library": ["automatic"]}`.
    #[serde(rename = "type", default)]
    pub kind: Option<serde_json::Value>,
}

impl Product {
    pub fn is_library(&self) -> bool {
        matches!(&self.kind, Some(serde_json::Value::Object(map)) if map.contains_key("library"))
    }
}

/// A target declared by a package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Decoded manifest metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,

    #[serde(default)]
    pub products: Vec<Product>,

    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub dependencies: Vec<serde_json::Value>,

    #[serde(default)]
    pub platforms: Vec<serde_json::Value>,
}

impl Package {
    /// Decode the JSON document written by the dump tool.
    pub fn from_dump(bytes: &[u8]) -> Result<Self, PackageError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A package known to declare at least one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoDetail {
    pub first_product: Product,
    pub package: Package,
}

impl TryFrom<Package> for RepoDetail {
    type Error = PackageError;

    fn try_from(package: Package) -> Result<Self, Self::Error> {
        let first_product = package
            .products
            .first()
            .cloned()
            .ok_or(PackageError::MissingProducts)?;
        Ok(Self {
            first_product,
            package,
        })
    }
}

/// Result of validating one repository URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub url: String,
    pub result: Result<RepoDetail, PackageError>,
}

impl ValidationOutcome {
    pub fn success(url: impl Into<String>, detail: RepoDetail) -> Self {
        Self {
            url: url.into(),
            result: Ok(detail),
        }
    }

    pub fn failure(url: impl Into<String>, error: PackageError) -> Self {
        Self {
            url: url.into(),
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&PackageError> {
        self.result.as_ref().err()
    }
}
