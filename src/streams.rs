//! Built-in CJ stream definitions embedded in the binary
//!
//! The catalog YAML lives in `catalogs/cj.yaml` and is compiled in, so the
//! tap works without any catalog file on disk.

use crate::catalog::Catalog;
use crate::error::Result;

/// Default CJ API root
pub const CJ_API_URL: &str = "https://commissions.api.cj.com";

/// Built-in catalog document
pub const BUILTIN_CATALOG: &str = include_str!("../catalogs/cj.yaml");

/// Parse the built-in catalog
pub fn builtin_catalog() -> Result<Catalog> {
    Catalog::parse(BUILTIN_CATALOG)
}

/// Names of the built-in streams
pub fn builtin_stream_names() -> Result<Vec<String>> {
    Ok(builtin_catalog()?
        .names()
        .into_iter()
        .map(str::to_string)
        .collect())
}
