//! Restricted-import enforcement
//!
//! Runs once per edge, after graph construction and before scheduling.
//! The check is purely structural: the importer's resolved directory must
//! lie within the permitted subtree of the restricted package (the parent
//! of the restricted segment and everything beneath it).

use thiserror::Error;

use crate::graph::PackageGraph;
use crate::ident::PackageIdent;
use crate::resolver::PackageRecord;

/// Errors for visibility enforcement
#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("restricted import: {importer} may not import {imported}")]
    RestrictedImport {
        importer: PackageIdent,
        imported: PackageIdent,
    },
}

/// Validate every edge of a constructed graph.
pub fn enforce(graph: &PackageGraph) -> Result<(), VisibilityError> {
    for edge in graph.edges() {
        let imported = match graph.record(&edge.imported) {
            Some(r) if r.is_restricted => r,
            _ => continue,
        };
        let importer = match graph.record(&edge.importer) {
            Some(r) => r,
            None => continue,
        };

        if !import_permitted(importer, imported) {
            return Err(VisibilityError::RestrictedImport {
                importer: edge.importer.clone(),
                imported: edge.imported.clone(),
            });
        }
    }
    Ok(())
}

/// Whether `importer` lies within the permitted subtree of `imported`.
fn import_permitted(importer: &PackageRecord, imported: &PackageRecord) -> bool {
    if let Some(permitted_dir) = &imported.permitted_dir {
        return importer.dir.starts_with(permitted_dir);
    }

    // Resolvers that carry no directory (synthetic layouts) fall back to
    // identifier-prefix containment against the permitted root.
    match imported.ident.permitted_root() {
        Some(root) if root.is_empty() => true,
        Some(root) => {
            importer.ident.as_str() == root
                || importer.ident.as_str().starts_with(&format!("{}/", root))
        }
        None => true,
    }
}
