//! # Overview
//!
//! Crate for importing 3D model files of heterogeneous formats into one
//! uniform in-memory [`Scene`] representation and post-processing that
//! scene for rendering consumers.
//!
//! The two central pieces are the [`AssetImporter`] dispatcher and the
//! [post-processing pipeline](postprocess). The dispatcher owns a list of
//! format [importers](importer::Importer), probes them by extension and by
//! content signature, drives the selected one to decode the file and then
//! runs the requested pipeline stages over the result:
//!
//! ```text
//! read_file(path, steps)
//!   ├─ probe importers (extension pass, then signature pass)
//!   ├─ decode into a canonical Scene
//!   ├─ validate (when requested; out-of-band)
//!   ├─ preprocess (always)
//!   └─ pipeline: every stage whose flags intersect `steps`, in fixed order
//! ```
//!
//! Every importer produces the same canonical scene shape, so every stage
//! and every consumer can rely on one contract regardless of the source
//! format. Failures never unwind across the public surface: a failed
//! import returns `None` and leaves the reason in
//! [`error_string`](AssetImporter::error_string).
//!
//! # Example
//!
//! ```no_run
//! use skarn::{AssetImporter, postprocess::PostProcessSteps};
//!
//! let mut importer = AssetImporter::new();
//! let steps = PostProcessSteps::TRIANGULATE
//!     | PostProcessSteps::JOIN_IDENTICAL_VERTICES
//!     | PostProcessSteps::GEN_SMOOTH_NORMALS;
//! if let Some(scene) = importer.read_file("models/rock.obj", steps) {
//!     for mesh in &scene.meshes {
//!         println!("{} vertices, {} faces", mesh.vertex_count(), mesh.face_count());
//!     }
//! }
//! ```
//!
//! A single [`AssetImporter`] is not thread-safe; run imports in parallel
//! by creating one instance per thread (cloning copies the configuration).

mod asset_importer;
mod common;

pub mod importer;
pub mod importers;
pub mod postprocess;
pub mod preprocess;
pub mod properties;
pub mod scene;
pub mod source;

pub use asset_importer::{AssetImporter, MemoryRequirements};
pub use common::{Error, Result};
pub use importer::{Importer, ImporterId};
pub use postprocess::PostProcessSteps;
pub use properties::PropertyStore;
pub use scene::Scene;
