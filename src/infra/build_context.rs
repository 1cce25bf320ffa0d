//! Build-context packing.
//!
//! The engine's build endpoint consumes a tar archive of the context
//! directory; this module packs a template's build directory (Dockerfile and
//! support files) into an in-memory archive.

use std::io;
use std::path::Path;

/// Pack `dir` into an uncompressed tar archive, preserving relative paths.
///
/// # Errors
///
/// Returns the underlying I/O error when the directory cannot be read.
pub fn pack_build_context(dir: &Path) -> io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(true);
    builder.append_dir_all(".", dir)?;
    builder.into_inner()
}
