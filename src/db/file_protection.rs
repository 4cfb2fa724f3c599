//! At-rest file protection hook (spec §4.1: "complete until first user
//! authentication").
//!
//! The actual protection class is an OS-level attribute the host platform
//! applies to the database file (on iOS, `NSFileProtectionCompleteUntilFirstUserAuthentication`).
//! This crate has no FFI bridge to that API; `apply` is the seam the host
//! app's platform layer is expected to hook, and is a documented no-op
//! everywhere else so the store keeps working identically on platforms
//! without a file-protection concept (Linux CI, desktop, `:memory:` tests).

use std::path::Path;

use tracing::debug;

/// Best-effort request to mark `path` as protected until first unlock.
/// Never fails the caller — this is advisory hardening, not a correctness
/// requirement of the store itself.
pub fn apply(path: &Path) {
    debug!(path = %path.display(), "file protection hook invoked (no-op on this platform)");
}
