//! Build script for storefront crate.
//!
//! Hashes static assets so templates can append `?v=<hash>` and the files can
//! be cached forever.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    emit_hash(&static_dir.join("css/main.css"), "CSS_HASH");
    emit_hash(&static_dir.join("js/inventory.js"), "JS_HASH");
}

/// Set `env_var` to the first 8 hex chars of the file's SHA-256.
///
/// A missing file yields an empty hash rather than failing the build.
fn emit_hash(path: &Path, env_var: &str) {
    println!("cargo:rerun-if-changed={}", path.display());

    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", path.display());
            println!("cargo:rustc-env={env_var}=");
            return;
        }
    };

    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = hash.get(..8).unwrap_or(&hash);
    println!("cargo:rustc-env={env_var}={short_hash}");
}
