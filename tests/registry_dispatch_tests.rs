//! Capability registration and decode dispatch
//!
//! A format is decodable iff its registering unit ran during startup;
//! dispatch scans probes in registration order and the registry is sealed
//! by the first lookup.

use packlane::registry::{FormatHandlers, Registry, RegistryError};

fn upper(bytes: &[u8]) -> Result<Vec<u8>, String> {
    Ok(bytes.to_ascii_uppercase())
}

fn lower(bytes: &[u8]) -> Result<Vec<u8>, String> {
    Ok(bytes.to_ascii_lowercase())
}

/// A startup routine the way an optional format unit would provide one.
fn register_upper_format(registry: &Registry) {
    registry
        .register(
            "upper",
            b"UP!",
            FormatHandlers {
                decode: upper,
                encode: lower,
            },
        )
        .unwrap();
}

#[test]
fn test_linked_in_unit_makes_format_dispatchable() {
    let registry = Registry::new();
    register_upper_format(&registry);

    let matched = registry.dispatch(b"UP!payload").unwrap();
    assert_eq!(matched.name, "upper");
    assert_eq!((matched.handlers.decode)(b"abc").unwrap(), b"ABC");
}

#[test]
fn test_unlinked_format_is_not_found_only_at_dispatch_time() {
    // Not registering anything is not an error; the absence only shows up
    // as NotFound when dispatch is attempted.
    let registry = Registry::new();
    assert_eq!(
        registry.dispatch(b"UP!payload").unwrap_err(),
        RegistryError::NotFound
    );
}

#[test]
fn test_registration_after_first_dispatch_is_rejected() {
    let registry = Registry::new();
    register_upper_format(&registry);

    let _ = registry.dispatch(b"probe");
    assert_eq!(
        registry
            .register("late", b"L8", FormatHandlers { decode: upper, encode: lower })
            .unwrap_err(),
        RegistryError::Sealed
    );
}

#[test]
fn test_global_registry_single_initialization_phase() {
    // One test owns the process-wide instance: register during "startup",
    // then dispatch for the rest of the process lifetime.
    let registry = packlane::registry::global();
    register_upper_format(registry);
    registry.seal();

    let matched = registry.dispatch(b"UP!data").unwrap();
    assert_eq!(matched.name, "upper");
    assert!(registry.is_sealed());
}
