//! Process-wide format capability registry
//!
//! Models the link-in-optional-capability pattern: a format is decodable
//! by the running process if and only if the unit registering it was
//! linked in and ran its registration during startup. The registry is an
//! explicit process-scoped container with a one-shot write phase:
//! registrations are accepted while initializing, serialized by a mutex,
//! and rejected once the registry seals. The first dispatch seals the
//! registry, making it read-only for the remainder of the process
//! lifetime.
//!
//! Dispatch is a linear scan in registration order; the first entry whose
//! probe is a prefix of the candidate bytes wins. Overlapping probes
//! resolve to whichever registered first.

use std::sync::{Mutex, OnceLock};

use thiserror::Error;

/// Errors for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry is sealed; registration is only valid during initialization")]
    Sealed,

    #[error("no registered format matches the candidate bytes")]
    NotFound,
}

/// Decode/encode callables for one format.
///
/// Function pointers keep entries trivially shareable across threads; the
/// payloads are opaque to the registry.
#[derive(Debug, Clone, Copy)]
pub struct FormatHandlers {
    pub decode: fn(&[u8]) -> Result<Vec<u8>, String>,
    pub encode: fn(&[u8]) -> Result<Vec<u8>, String>,
}

/// A matched registration: the format name plus its handlers.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub handlers: FormatHandlers,
}

#[derive(Debug)]
struct Entry {
    name: String,
    probe: Vec<u8>,
    handlers: FormatHandlers,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    sealed: bool,
}

/// Append-only-then-sealed registration table.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a registration. Valid only before the registry seals;
    /// concurrent registrations during initialization are serialized.
    pub fn register(
        &self,
        name: &str,
        probe: &[u8],
        handlers: FormatHandlers,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sealed {
            return Err(RegistryError::Sealed);
        }
        inner.entries.push(Entry {
            name: name.to_string(),
            probe: probe.to_vec(),
            handlers,
        });
        Ok(())
    }

    /// End the write phase explicitly. Idempotent.
    pub fn seal(&self) {
        self.inner.lock().unwrap().sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.lock().unwrap().sealed
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the first registration whose probe prefixes `candidate`.
    ///
    /// Dispatch seals the registry: the table is write-then-read-only, so
    /// the first lookup ends the write phase.
    pub fn dispatch(&self, candidate: &[u8]) -> Result<Registration, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sealed = true;

        inner
            .entries
            .iter()
            .find(|e| candidate.starts_with(&e.probe))
            .map(|e| Registration {
                name: e.name.clone(),
                handlers: e.handlers,
            })
            .ok_or(RegistryError::NotFound)
    }

    /// Registered format names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }
}

/// The process-wide registry instance.
///
/// Optional capability units call `global().register(..)` from their
/// startup routines; dispatchers consult the same instance later.
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}
