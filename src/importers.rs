//! Bundled format decoders.
//!
//! Each importer is an independent plugin against the [`Importer`] contract;
//! the dispatcher registers the full set by default. File formats that are
//! not covered here can be supplied by the caller through
//! [`AssetImporter::register_importer`](crate::AssetImporter::register_importer).

mod obj;
mod off;
mod stl;

pub use obj::ObjImporter;
pub use off::OffImporter;
pub use stl::StlImporter;

use crate::importer::Importer;

/// The importers a freshly constructed dispatcher carries.
///
/// Formats that are probed more often should come first; the dispatcher
/// probes in this order.
pub fn default_importers() -> Vec<Box<dyn Importer>> {
    vec![
        Box::new(ObjImporter::default()),
        Box::new(StlImporter::default()),
        Box::new(OffImporter::default()),
    ]
}
