//! Identifier resolution
//!
//! Maps a symbolic package identifier to a physical directory under one of
//! the configured workspace roots and derives the package metadata: short
//! name, command/test/restricted classification, and the raw declared
//! imports. Resolution is injectable through the [`Resolver`] trait so the
//! graph builder never assumes a particular layout convention.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::WalkDir;

use crate::ident::{IdentError, PackageIdent, ENTRY_NAME, TEST_SUFFIX};
use crate::source::{FsSourceReader, SourceError, SourceFile, SourceListing, SourceReader, SOURCE_EXTENSION};

/// Identifier used for packages resolved from a bare file list.
pub const FILE_LIST_IDENT: &str = "command-line-files";

/// Errors for identifier resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Ident(#[from] IdentError),

    #[error("package not found: {0}")]
    NotFound(PackageIdent),

    #[error("ambiguous roots for {ident}: {first} and {second}")]
    AmbiguousRoot {
        ident: PackageIdent,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("conflicting package declarations in {dir}: {names:?}")]
    ConflictingDeclarations { dir: PathBuf, names: Vec<String> },

    #[error("no workspace roots configured")]
    NoRoots,

    #[error("empty source file list")]
    EmptyFileList,

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Resolved metadata for one package identifier.
///
/// Immutable for the duration of a build invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageRecord {
    /// The identifier this record was resolved from
    pub ident: PackageIdent,

    /// Physical source directory
    pub dir: PathBuf,

    /// Derived short name (last identifier segment, version suffix stripped)
    pub short_name: String,

    /// Declared package name from the source headers
    pub declared_name: String,

    /// Source files belonging to this record, in lexical order
    pub files: Vec<SourceFile>,

    /// Declared dependency identifiers, raw and unresolved, deduplicated
    /// in declaration order
    pub imports: Vec<String>,

    /// Whether this package produces an executable
    pub is_command: bool,

    /// Whether this is the auxiliary test-only package of its directory
    pub is_test_only: bool,

    /// Whether a restricted-access segment covers this package
    pub is_restricted: bool,

    /// Executable name for command packages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable_name: Option<String>,

    /// Identifier prefix of the permitted-importer subtree (restricted only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_root: Option<String>,

    /// Directory of the permitted-importer subtree (restricted only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_dir: Option<PathBuf>,
}

/// Resolution strategy interface.
///
/// One method: identifier in, record out. The build pipeline only ever
/// talks to this, so tests can substitute a synthetic layout.
pub trait Resolver {
    fn resolve(&self, ident: &PackageIdent) -> Result<PackageRecord, ResolveError>;
}

/// The convention-based resolver over a set of workspace roots.
pub struct WorkspaceResolver {
    roots: Vec<PathBuf>,
    reader: Box<dyn SourceReader>,
}

impl WorkspaceResolver {
    /// Create a resolver with the default filesystem source reader.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            reader: Box::new(FsSourceReader::new()),
        }
    }

    /// Substitute the source reader collaborator.
    pub fn with_reader(mut self, reader: Box<dyn SourceReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Locate the unique directory for `ident` across the roots.
    fn locate(&self, ident: &PackageIdent) -> Result<PathBuf, ResolveError> {
        if self.roots.is_empty() {
            return Err(ResolveError::NoRoots);
        }

        let rel: PathBuf = ident.segments().iter().collect();
        let mut found: Option<PathBuf> = None;

        for root in &self.roots {
            let candidate = root.join(&rel);
            if !has_sources(&candidate) {
                continue;
            }
            match &found {
                None => found = Some(candidate),
                Some(first) => {
                    return Err(ResolveError::AmbiguousRoot {
                        ident: ident.clone(),
                        first: first.clone(),
                        second: candidate,
                    });
                }
            }
        }

        found.ok_or_else(|| ResolveError::NotFound(ident.clone()))
    }

    /// Resolve the auxiliary test-only package sharing `ident`'s directory,
    /// if the directory declares one.
    pub fn resolve_aux(&self, ident: &PackageIdent) -> Result<Option<PackageRecord>, ResolveError> {
        let dir = self.locate(ident)?;
        let listing = self.reader.read_dir(&dir)?;
        let (_, aux) = split_listing(&dir, &listing)?;

        Ok(aux.map(|files| build_record(ident.clone(), dir.clone(), files, true)))
    }

    /// Expand a wildcard pattern (`prefix/...`) into every resolvable
    /// identifier under the prefix, in directory traversal order.
    ///
    /// Non-wildcard identifiers expand to themselves when resolvable.
    pub fn expand(&self, pattern: &PackageIdent) -> Result<Vec<PackageIdent>, ResolveError> {
        if !pattern.is_wildcard() {
            // Verify it resolves, then return it as a singleton sequence
            self.locate(pattern)?;
            return Ok(vec![pattern.clone()]);
        }

        if self.roots.is_empty() {
            return Err(ResolveError::NoRoots);
        }

        let prefix = pattern.wildcard_prefix().unwrap_or("");
        let rel: PathBuf = prefix.split('/').filter(|s| !s.is_empty()).collect();

        let mut idents: Vec<PackageIdent> = Vec::new();
        for root in &self.roots {
            let base = root.join(&rel);
            if !base.is_dir() {
                continue;
            }

            for entry in WalkDir::new(&base)
                .follow_links(false)
                .sort_by(|a, b| a.file_name().cmp(b.file_name()))
                .into_iter()
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_dir() || !has_sources(entry.path()) {
                    continue;
                }
                let rel_to_root = match entry.path().strip_prefix(root) {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let ident_str = rel_to_root
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if ident_str.is_empty() {
                    continue;
                }
                let ident = PackageIdent::parse(&ident_str)?;
                if !idents.contains(&ident) {
                    idents.push(ident);
                }
            }
        }

        Ok(idents)
    }

    /// Resolve a command package from a bare, ordered list of source files.
    ///
    /// The produced executable is named after the first file in the list.
    pub fn resolve_file_list(&self, files: &[PathBuf]) -> Result<PackageRecord, ResolveError> {
        let first = files.first().ok_or(ResolveError::EmptyFileList)?;
        let listing = self.reader.read_files(files)?;

        let dir = first
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let ident = PackageIdent::parse(FILE_LIST_IDENT)?;

        let mut record = build_record(ident, dir, listing.files, false);

        // Executable named after the first file, extension stripped
        let base = first
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| FILE_LIST_IDENT.to_string());
        record.is_command = record.declared_name == ENTRY_NAME;
        if record.is_command {
            record.executable_name = Some(base);
        }

        Ok(record)
    }
}

impl Resolver for WorkspaceResolver {
    fn resolve(&self, ident: &PackageIdent) -> Result<PackageRecord, ResolveError> {
        let dir = self.locate(ident)?;
        let listing = self.reader.read_dir(&dir)?;
        let (primary, _) = split_listing(&dir, &listing)?;

        let mut record = build_record(ident.clone(), dir.clone(), primary, false);

        if record.is_restricted {
            // Permitted subtree is the parent directory of the restricted
            // segment, resolved under the same root as the package itself.
            if let Some(root_prefix) = ident.permitted_root() {
                let depth = ident.segments().len()
                    - root_prefix.split('/').filter(|s| !s.is_empty()).count();
                let mut permitted = dir.clone();
                for _ in 0..depth {
                    permitted = permitted
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or(permitted);
                }
                record.permitted_root = Some(root_prefix);
                record.permitted_dir = Some(permitted);
            }
        }

        Ok(record)
    }
}

/// Whether a directory directly contains at least one source file.
fn has_sources(dir: &Path) -> bool {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return false,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file()
            && path.extension().map(|e| e == SOURCE_EXTENSION).unwrap_or(false)
        {
            return true;
        }
    }
    false
}

/// Partition a directory listing into the primary package files and the
/// auxiliary `_test` package files.
///
/// A directory may legally declare exactly one primary name plus that name
/// with the reserved test suffix; anything else is a conflict.
fn split_listing(
    dir: &Path,
    listing: &SourceListing,
) -> Result<(Vec<SourceFile>, Option<Vec<SourceFile>>), ResolveError> {
    let names = listing.declared_names();

    let mut primary_name: Option<&str> = None;
    let mut aux_name: Option<&str> = None;

    for name in &names {
        if let Some(base) = name.strip_suffix(TEST_SUFFIX) {
            if !base.is_empty() && (primary_name.is_none() || primary_name == Some(base)) {
                aux_name = Some(name);
                continue;
            }
        }
        match primary_name {
            None => {
                // An earlier `_test` name must match this primary
                if let Some(aux) = aux_name {
                    if aux.strip_suffix(TEST_SUFFIX) != Some(name) {
                        return Err(conflict(dir, &names));
                    }
                }
                primary_name = Some(name);
            }
            Some(existing) if existing == *name => {}
            Some(_) => return Err(conflict(dir, &names)),
        }
    }

    let primary_name = match primary_name {
        Some(n) => n,
        // A directory holding only the auxiliary package is still resolvable;
        // the primary record is then empty of files.
        None => return Ok((Vec::new(), collect_aux(listing, aux_name))),
    };

    let primary: Vec<SourceFile> = listing
        .files
        .iter()
        .filter(|f| f.declared_name == primary_name)
        .cloned()
        .collect();

    Ok((primary, collect_aux(listing, aux_name)))
}

fn collect_aux(listing: &SourceListing, aux_name: Option<&str>) -> Option<Vec<SourceFile>> {
    let aux_name = aux_name?;
    Some(
        listing
            .files
            .iter()
            .filter(|f| f.declared_name == aux_name)
            .cloned()
            .collect(),
    )
}

fn conflict(dir: &Path, names: &[&str]) -> ResolveError {
    ResolveError::ConflictingDeclarations {
        dir: dir.to_path_buf(),
        names: names.iter().map(|s| s.to_string()).collect(),
    }
}

/// Assemble a record from a file subset of one directory.
fn build_record(
    ident: PackageIdent,
    dir: PathBuf,
    files: Vec<SourceFile>,
    is_test_only: bool,
) -> PackageRecord {
    let declared_name = files
        .first()
        .map(|f| f.declared_name.clone())
        .unwrap_or_else(|| ident.short_name().to_string());

    let mut imports: Vec<String> = Vec::new();
    for file in &files {
        for import in &file.imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
    }

    let is_command = !is_test_only && declared_name == ENTRY_NAME;
    let executable_name = if is_command {
        Some(ident.segments().last().map(|s| s.to_string()).unwrap_or_default())
    } else {
        None
    };

    PackageRecord {
        short_name: ident.short_name().to_string(),
        is_restricted: ident.is_restricted(),
        ident,
        dir,
        declared_name,
        files,
        imports,
        is_command,
        is_test_only,
        executable_name,
        permitted_root: None,
        permitted_dir: None,
    }
}
