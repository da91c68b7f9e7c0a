use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use log::trace;

use crate::{
    common::extension_of,
    properties::PropertyStore,
    scene::Scene,
    source::ImportSource,
    Result,
};

/// Stable handle to a registered importer, returned by
/// [`AssetImporter::register_importer`](crate::AssetImporter::register_importer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImporterId(pub(crate) u64);

/// Common interface of all per-format decoders.
///
/// The dispatcher asks `can_read` whether an importer handles a file. When
/// that returns `true`, `intern_read_file` decodes the file into a fresh
/// [`Scene`]. The returned scene must satisfy the canonical contract:
///
/// - a root node is present, even if its only purpose is to reference a mesh;
/// - vertex data is in the verbose pseudo-indexed format, i.e. a vertex
///   index does not occur twice in a single mesh;
/// - `Mesh::primitive_types` may be left empty; the preprocessor infers it;
/// - `Animation::duration` may be `-1.0`; the preprocessor derives it;
/// - bitangents may be absent when tangents and normals are given;
/// - unless the scene is flagged `INCOMPLETE`, at least one mesh is present
///   and no mesh has zero vertices or faces.
pub trait Importer {
    /// Returns whether this importer handles the format of the given file.
    ///
    /// With `source == None` the method is being asked purely about
    /// extension support and must answer from the path string alone. With
    /// `check_sig == false` only cheap checks (the extension) are allowed;
    /// with `check_sig == true` the importer may read a small prefix of the
    /// file looking for magic tokens or keywords.
    fn can_read(&self, path: &Path, source: Option<&dyn ImportSource>, check_sig: bool) -> bool;

    /// Appends the supported extensions to `append` in `*.ext;*.ext2` form,
    /// without a trailing delimiter.
    fn extension_list(&self, append: &mut String);

    /// Snapshot of the dispatcher configuration, taken just before decode.
    fn setup_properties(&mut self, _properties: &PropertyStore) {}

    /// Decodes the file into a scene satisfying the canonical contract, or
    /// fails with a [`Decode`](crate::Error::Decode) error carrying a
    /// human-readable message. Partial construction must not leak on error.
    fn intern_read_file(&mut self, path: &Path, source: &dyn ImportSource) -> Result<Scene>;
}

/// Returns the lowercase extension of `path` without the dot, empty when
/// there is none.
pub fn get_extension(path: &Path) -> String {
    extension_of(path)
}

/// Case-insensitive check whether `path` ends in one of the given
/// extensions. Extensions are given without a leading dot.
pub fn simple_extension_check(path: &Path, extensions: &[&str]) -> bool {
    let extension = extension_of(path);
    extensions.iter().any(|candidate| extension == candidate.to_lowercase())
}

/// Maximum prefix length [`search_file_header_for_token`] looks at.
pub const HEADER_SEARCH_BYTES: usize = 200;

/// Searches the first `search_bytes` bytes of a file for any of the given
/// tokens, case-insensitively.
///
/// Works for text files; NUL bytes are skipped so that UTF-16 encoded
/// headers still match their ASCII tokens. Returns `false` when the file
/// cannot be read.
pub fn search_file_header_for_token(
    source: &dyn ImportSource,
    path: &Path,
    tokens: &[&str],
    search_bytes: usize,
) -> bool {
    debug_assert!(!tokens.is_empty());
    let search_bytes = search_bytes.min(HEADER_SEARCH_BYTES);
    let Ok(mut stream) = source.open(path) else {
        return false;
    };
    let mut buffer = vec![0u8; search_bytes];
    let Ok(read) = stream.read(&mut buffer) else {
        return false;
    };
    buffer.truncate(read);

    let header = buffer
        .iter()
        .filter(|byte| **byte != 0)
        .map(|byte| byte.to_ascii_lowercase() as char)
        .collect::<String>();
    for token in tokens {
        let token = token.to_lowercase();
        if header.contains(&token) {
            trace!("Found token '{token}' in the header of '{}'", path.display());
            return true;
        }
    }
    false
}

/// Checks whether the file starts with one of the given magic tokens.
///
/// Each token must be 1, 2, 4, 8 or 16 bytes long. For token sizes 2 and 4
/// the byte-swapped variant is also accepted, so big-endian writers of the
/// same format still match. Returns `false` when the file cannot be read.
pub fn check_magic_token(source: &dyn ImportSource, path: &Path, tokens: &[&[u8]], offset: u64) -> bool {
    debug_assert!(tokens.iter().all(|token| matches!(token.len(), 1 | 2 | 4 | 8 | 16)));
    let Ok(mut stream) = source.open(path) else {
        return false;
    };
    if stream.seek(SeekFrom::Start(offset)).is_err() {
        return false;
    }
    let mut buffer = [0u8; 16];
    let Ok(read) = stream.read(&mut buffer) else {
        return false;
    };
    for token in tokens {
        if token.len() > read {
            continue;
        }
        let slice = &buffer[..token.len()];
        if slice == *token {
            return true;
        }
        if matches!(token.len(), 2 | 4) {
            let swapped = token.iter().rev().copied().collect::<Vec<_>>();
            if slice == swapped.as_slice() {
                return true;
            }
        }
    }
    false
}
