use std::{
    mem,
    panic::{self, AssertUnwindSafe},
    path::Path,
};

use log::{debug, error, info, warn};

use crate::{
    importer::{Importer, ImporterId},
    importers::default_importers,
    postprocess::{standard_pipeline, PostProcessStage, PostProcessSteps, SharedPostProcessState, ValidateDataStructure},
    preprocess::ScenePreprocessor,
    properties::PropertyStore,
    scene::{Animation, Bone, Face, Material, MaterialProperty, Mesh, Node, NodeChannel, QuatKey, Scene, VectorKey, VertexWeight},
    source::{FileSystem, ImportSource},
    Error, Result,
};

/// Byte sizes of the loaded scene per category, as reported by
/// [`AssetImporter::memory_requirements`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Sum of all categories below.
    pub total: usize,
    pub meshes: usize,
    pub materials: usize,
    pub nodes: usize,
    pub textures: usize,
    pub animations: usize,
    pub cameras: usize,
    pub lights: usize,
}

struct RegisteredImporter {
    id: ImporterId,
    importer: Box<dyn Importer>,
}

/// The import dispatcher: owns the format importers and the post-processing
/// pipeline, drives single imports to completion and holds the resulting
/// scene until the caller takes it or the next import replaces it.
///
/// One `AssetImporter` must only be used from one thread at a time;
/// concurrency is achieved by creating more instances (cloning copies the
/// configuration, never loaded data).
///
/// # Example
///
/// ```no_run
/// use skarn::{AssetImporter, postprocess::PostProcessSteps};
/// let mut importer = AssetImporter::new();
/// let steps = PostProcessSteps::TRIANGULATE | PostProcessSteps::GEN_SMOOTH_NORMALS;
/// match importer.read_file("models/character.obj", steps) {
///     Some(scene) => println!("{} meshes", scene.meshes.len()),
///     None => eprintln!("{}", importer.error_string().unwrap_or("unknown error")),
/// }
/// ```
pub struct AssetImporter {
    importers: Vec<RegisteredImporter>,
    pipeline: Vec<Box<dyn PostProcessStage>>,
    source: Box<dyn ImportSource>,
    is_default_source: bool,
    properties: PropertyStore,
    scene: Option<Scene>,
    error: Option<String>,
    extra_verbose: bool,
    shared: SharedPostProcessState,
    next_importer_id: u64,
}

impl AssetImporter {
    /// Creates a dispatcher with the bundled importers, the canonical
    /// pipeline and the filesystem import source.
    pub fn new() -> Self {
        let mut dispatcher = Self {
            importers: Vec::new(),
            pipeline: standard_pipeline(),
            source: Box::new(FileSystem),
            is_default_source: true,
            properties: PropertyStore::new(),
            scene: None,
            error: None,
            extra_verbose: false,
            shared: SharedPostProcessState::default(),
            next_importer_id: 0,
        };
        for importer in default_importers() {
            dispatcher.register_importer(importer);
        }
        dispatcher
    }

    /// Registers an additional importer and returns its handle.
    ///
    /// Registering an importer for an extension that is already covered
    /// only warns: probing runs in registration order, so the earlier
    /// registrant keeps winning that extension.
    pub fn register_importer(&mut self, importer: Box<dyn Importer>) -> ImporterId {
        let mut extensions = String::new();
        importer.extension_list(&mut extensions);
        for extension in extensions.split(';') {
            let extension = extension.trim_start_matches("*.");
            if !extension.is_empty() && self.is_extension_supported(extension) {
                warn!("The file extension '{extension}' is already in use");
            }
        }

        let id = ImporterId(self.next_importer_id);
        self.next_importer_id += 1;
        self.importers.push(RegisteredImporter { id, importer });
        info!("Registered importer for '{extensions}'");
        id
    }

    /// Chainable variant of [`register_importer`](Self::register_importer).
    pub fn with_importer(mut self, importer: Box<dyn Importer>) -> Self {
        self.register_importer(importer);
        self
    }

    /// Removes a previously registered importer.
    pub fn unregister_importer(&mut self, id: ImporterId) -> Result<()> {
        match self.importers.iter().position(|registered| registered.id == id) {
            Some(position) => {
                let registered = self.importers.remove(position);
                let mut extensions = String::new();
                registered.importer.extension_list(&mut extensions);
                info!("Unregistered importer for '{extensions}'");
                Ok(())
            }
            None => {
                warn!("Unable to remove importer: importer not found");
                Err(Error::ImporterNotFound)
            }
        }
    }

    /// Installs a custom import source, or the default filesystem source
    /// when `None` is passed. Any previously installed source is dropped.
    pub fn set_import_source(&mut self, source: Option<Box<dyn ImportSource>>) {
        match source {
            Some(source) => {
                self.source = source;
                self.is_default_source = false;
            }
            None => {
                self.source = Box::new(FileSystem);
                self.is_default_source = true;
            }
        }
    }

    pub fn import_source(&self) -> &dyn ImportSource {
        self.source.as_ref()
    }

    pub fn is_default_import_source(&self) -> bool {
        self.is_default_source
    }

    pub fn set_int_property(&mut self, key: impl Into<String>, value: i32) {
        self.properties.set_int(key, value);
    }

    pub fn set_float_property(&mut self, key: impl Into<String>, value: f32) {
        self.properties.set_float(key, value);
    }

    pub fn set_string_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.set_string(key, value);
    }

    pub fn int_property(&self, key: &str, default: i32) -> i32 {
        self.properties.int(key, default)
    }

    pub fn float_property(&self, key: &str, default: f32) -> f32 {
        self.properties.float(key, default)
    }

    pub fn string_property<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.properties.string(key, default)
    }

    /// Whether any registered importer handles the given extension. Answered
    /// from the extension string alone; no file is touched.
    pub fn is_extension_supported(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches(['*', '.']);
        let probe = std::path::PathBuf::from(format!("probe.{extension}"));
        self.importers
            .iter()
            .any(|registered| registered.importer.can_read(&probe, None, false))
    }

    /// All supported extensions in `*.a;*.b;…` form.
    pub fn extension_list(&self) -> String {
        let mut list = String::new();
        for registered in &self.importers {
            if !list.is_empty() && !list.ends_with(';') {
                list.push(';');
            }
            registered.importer.extension_list(&mut list);
        }
        list
    }

    /// Checks a request bitset: mutually exclusive combinations are
    /// rejected, as is any bit that no pipeline stage services. The
    /// validation bit is handled out-of-band and always accepted.
    pub fn validate_steps(&self, steps: PostProcessSteps) -> bool {
        if steps.contains(PostProcessSteps::GEN_NORMALS | PostProcessSteps::GEN_SMOOTH_NORMALS) {
            error!("GEN_NORMALS and GEN_SMOOTH_NORMALS may not be specified together");
            return false;
        }
        let steps = steps.difference(PostProcessSteps::VALIDATE_DATA_STRUCTURE);
        for bit in steps.iter() {
            if !self.pipeline.iter().any(|stage| stage.is_active(bit)) {
                return false;
            }
        }
        true
    }

    /// Reads the given file and applies the requested post-processing.
    ///
    /// On success the returned borrow is valid until the next mutation of
    /// the dispatcher; take ownership with
    /// [`orphaned_scene`](Self::orphaned_scene) to keep the scene longer.
    /// On failure `None` is returned and
    /// [`error_string`](Self::error_string) carries the reason. Any
    /// previously held scene is discarded either way.
    pub fn read_file(&mut self, path: impl AsRef<Path>, steps: PostProcessSteps) -> Option<&Scene> {
        debug_assert!(!steps.contains(PostProcessSteps::GEN_NORMALS | PostProcessSteps::GEN_SMOOTH_NORMALS));
        let path = path.as_ref().to_owned();

        if self.scene.is_some() {
            debug!("Deleting previous scene");
            self.free_scene();
        }
        self.error = None;

        match self.read_file_guarded(&path, steps) {
            Ok(scene) => {
                self.scene = Some(scene);
            }
            Err(import_error) => {
                let message = import_error.to_string();
                error!("{message}");
                self.error = Some(message);
            }
        }
        self.shared.clear();
        self.scene.as_ref()
    }

    fn read_file_guarded(&mut self, path: &Path, steps: PostProcessSteps) -> Result<Scene> {
        if !self.source.exists(path) {
            return Err(Error::FileNotFound(path.to_owned()));
        }

        let selected = self.find_importer(path)?;
        info!("Found a matching importer for '{}'", path.display());
        let registered = &mut self.importers[selected];
        registered.importer.setup_properties(&self.properties);

        // A decoder that panics must not take the dispatcher down; the
        // panic is converted into an error at this boundary. The importer
        // itself may be left in an unusable state though, so subsequent
        // imports through it are allowed but not guaranteed to work.
        let importer = &mut registered.importer;
        let source = self.source.as_ref();
        let decode = panic::catch_unwind(AssertUnwindSafe(|| importer.intern_read_file(path, source)));
        let mut scene = match decode {
            Ok(result) => result?,
            Err(payload) => {
                return Err(Error::UnexpectedFailure {
                    message: panic_message(payload),
                })
            }
        };

        // Validation runs out-of-band, even before the preprocessor.
        if steps.contains(PostProcessSteps::VALIDATE_DATA_STRUCTURE) {
            ValidateDataStructure::process(&mut scene)?;
        }
        ScenePreprocessor::process(&mut scene);

        info!("Import successful, entering the post-processing pipeline");
        self.run_pipeline(&mut scene, steps)?;
        Ok(scene)
    }

    /// Two-pass importer selection: first by extension, then (when the path
    /// carries an extension at all) by content signature.
    fn find_importer(&self, path: &Path) -> Result<usize> {
        for (index, registered) in self.importers.iter().enumerate() {
            if registered.importer.can_read(path, Some(self.source.as_ref()), false) {
                return Ok(index);
            }
        }
        if path.to_string_lossy().contains('.') {
            info!("File extension not known, trying signature-based detection");
            for (index, registered) in self.importers.iter().enumerate() {
                if registered.importer.can_read(path, Some(self.source.as_ref()), true) {
                    return Ok(index);
                }
            }
        }
        Err(Error::NoSuitableReader(path.to_owned()))
    }

    fn run_pipeline(&mut self, scene: &mut Scene, steps: PostProcessSteps) -> Result<()> {
        for stage in &mut self.pipeline {
            if !stage.is_active(steps) {
                continue;
            }
            stage.setup_properties(&self.properties);
            debug!("Executing stage '{}'", stage.name());
            let execution = panic::catch_unwind(AssertUnwindSafe(|| stage.execute(scene, &mut self.shared)));
            match execution {
                Ok(Ok(())) => {}
                Ok(Err(stage_error)) => return Err(stage_error),
                Err(payload) => {
                    return Err(Error::StageFailed {
                        stage: stage.name(),
                        message: panic_message(payload),
                    })
                }
            }
            if self.extra_verbose {
                debug!("Extra verbose: revalidating the scene after '{}'", stage.name());
                ValidateDataStructure::process(scene)?;
            }
        }
        Ok(())
    }

    /// The scene of the most recent successful import, if any.
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// Transfers ownership of the current scene to the caller; the
    /// dispatcher holds no scene afterwards.
    pub fn orphaned_scene(&mut self) -> Option<Scene> {
        self.scene.take()
    }

    /// Explicitly drops the current scene.
    pub fn free_scene(&mut self) {
        self.scene = None;
    }

    /// The error message of the last failed operation. Empty after a
    /// successful import.
    pub fn error_string(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Re-runs validation between every pair of pipeline stages. Costly;
    /// meant for debugging stages, not for production imports.
    pub fn set_extra_verbose(&mut self, extra_verbose: bool) {
        self.extra_verbose = extra_verbose;
    }

    /// Walks the current scene and sums its memory footprint by category.
    /// All zeros when no scene is loaded.
    pub fn memory_requirements(&self) -> MemoryRequirements {
        let mut requirements = MemoryRequirements::default();
        let Some(scene) = &self.scene else {
            return requirements;
        };

        for mesh in &scene.meshes {
            requirements.meshes += mesh_bytes(mesh);
        }
        for material in &scene.materials {
            requirements.materials += mem::size_of::<Material>() + material.allocated() * mem::size_of::<MaterialProperty>();
            for property in material.properties() {
                requirements.materials += property.key.len() + property.value.data_len();
            }
        }
        requirements.nodes = node_bytes(&scene.root_node);
        for texture in &scene.textures {
            requirements.textures += mem::size_of::<crate::scene::Texture>() + texture.data.len();
        }
        for animation in &scene.animations {
            requirements.animations += animation_bytes(animation);
        }
        requirements.cameras = scene.cameras.len() * mem::size_of::<crate::scene::Camera>();
        requirements.lights = scene.lights.len() * mem::size_of::<crate::scene::Light>();

        requirements.total = requirements.meshes
            + requirements.materials
            + requirements.nodes
            + requirements.textures
            + requirements.animations
            + requirements.cameras
            + requirements.lights;
        requirements
    }
}

impl Default for AssetImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AssetImporter {
    /// Copies the configuration, never loaded data: the clone starts with a
    /// fresh importer set and pipeline, the source dispatcher's property
    /// store contents, and no scene.
    fn clone(&self) -> Self {
        let mut fresh = Self::new();
        fresh.properties = self.properties.clone();
        fresh
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn mesh_bytes(mesh: &Mesh) -> usize {
    let vector3 = mem::size_of::<nalgebra::Vector3<f32>>();
    let mut bytes = mem::size_of::<Mesh>();
    bytes += mesh.positions.len() * vector3;
    for attribute in [&mesh.normals, &mesh.tangents, &mesh.bitangents].into_iter().flatten() {
        bytes += attribute.len() * vector3;
    }
    for colors in mesh.colors.iter().flatten() {
        bytes += colors.len() * mem::size_of::<nalgebra::Vector4<f32>>();
    }
    for coords in mesh.texture_coords.iter().flatten() {
        bytes += coords.len() * vector3;
    }
    for face in &mesh.faces {
        bytes += mem::size_of::<Face>() + face.indices.len() * mem::size_of::<u32>();
    }
    for bone in &mesh.bones {
        bytes += mem::size_of::<Bone>() + bone.node_name.len() + bone.weights.len() * mem::size_of::<VertexWeight>();
    }
    bytes
}

fn node_bytes(node: &Node) -> usize {
    let mut bytes = mem::size_of::<Node>() + node.name.len() + node.meshes.len() * mem::size_of::<u32>();
    for child in &node.children {
        bytes += node_bytes(child);
    }
    bytes
}

fn animation_bytes(animation: &Animation) -> usize {
    let mut bytes = mem::size_of::<Animation>() + animation.name.len();
    // channels are summed by their own index, not the animation's
    for channel in &animation.channels {
        bytes += mem::size_of::<NodeChannel>() + channel.node_name.len();
        bytes += channel.position_keys.len() * mem::size_of::<VectorKey>();
        bytes += channel.rotation_keys.len() * mem::size_of::<QuatKey>();
        bytes += channel.scaling_keys.len() * mem::size_of::<VectorKey>();
    }
    bytes
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use crate::{
        common::setup_logger,
        scene::SceneFlags,
        source::MemorySource,
    };

    use super::*;

    const CUBE_OBJ: &str = indoc! {"
        v -1 -1 -1
        v 1 -1 -1
        v 1 1 -1
        v -1 1 -1
        v -1 -1 1
        v 1 -1 1
        v 1 1 1
        v -1 1 1
        f 1 2 3 4
        f 8 7 6 5
        f 1 5 6 2
        f 2 6 7 3
        f 3 7 8 4
        f 5 1 4 8
    "};

    fn memory_importer(files: &[(&str, &[u8])]) -> AssetImporter {
        let mut source = MemorySource::new();
        for (name, content) in files {
            source = source.with_file(*name, content.to_vec());
        }
        let mut importer = AssetImporter::new();
        importer.set_import_source(Some(Box::new(source)));
        importer
    }

    #[test]
    fn empty_path_reports_unable_to_open() {
        setup_logger();
        let mut importer = AssetImporter::new();
        let scene = importer.read_file("", PostProcessSteps::empty());
        assert!(scene.is_none());
        assert!(importer.error_string().unwrap().contains("Unable to open file"));
    }

    #[test]
    fn unknown_format_reports_no_suitable_reader() {
        let mut importer = memory_importer(&[("cryptic.xyz", b"\x00\x01\x02\x03 nothing recognizable")]);
        let scene = importer.read_file("cryptic.xyz", PostProcessSteps::empty());
        assert!(scene.is_none());
        assert!(importer.error_string().unwrap().contains("No suitable reader"));
    }

    #[test]
    fn plain_import_runs_preprocessor_only() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        let scene = importer.read_file("cube.obj", PostProcessSteps::empty()).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        // quads untouched: no pipeline stage ran
        assert_eq!(scene.meshes[0].faces[0].indices.len(), 4);
        // the preprocessor has run: materials exist and primitive types are set
        assert!(!scene.materials.is_empty());
        assert!(!scene.meshes[0].primitive_types.is_empty());
        assert!(importer.error_string().is_none());
    }

    #[test]
    fn scene_present_iff_no_error() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes()), ("broken.obj", b"v 0 0 0\nf 1 2 9\n")]);
        assert!(importer.read_file("cube.obj", PostProcessSteps::empty()).is_some());
        assert!(importer.scene().is_some() && importer.error_string().is_none());

        assert!(importer.read_file("broken.obj", PostProcessSteps::empty()).is_none());
        assert!(importer.scene().is_none());
        assert!(importer.error_string().unwrap().contains("Failed to decode"));

        // the dispatcher stays usable after a decode failure
        assert!(importer.read_file("cube.obj", PostProcessSteps::empty()).is_some());
        assert!(importer.error_string().is_none());
    }

    #[test]
    fn signature_probe_kicks_in_for_unknown_extension() {
        let mut importer = memory_importer(&[("mesh.dat", b"solid tri\nfacet normal 0 0 1\nouter loop\nvertex 0 0 0\nvertex 1 0 0\nvertex 0 1 0\nendloop\nendfacet\nendsolid\n")]);
        let scene = importer.read_file("mesh.dat", PostProcessSteps::empty());
        assert!(scene.is_some(), "{:?}", importer.error_string());
    }

    #[test]
    fn triangulation_pipeline_runs_before_normal_generation() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        let steps = PostProcessSteps::TRIANGULATE | PostProcessSteps::GEN_NORMALS;
        let scene = importer.read_file("cube.obj", steps).unwrap();
        let mesh = &scene.meshes[0];
        // 6 quads became 12 triangles, then flat normals were generated for
        // the triangulated (not the polygonal) geometry
        assert_eq!(mesh.face_count(), 12);
        assert!(mesh.faces.iter().all(|face| face.indices.len() == 3));
        assert!(mesh.has_normals());
        assert_eq!(mesh.normals.as_ref().unwrap().len(), mesh.vertex_count());
    }

    #[test]
    fn triangulate_then_normals_then_vertex_split() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.set_int_property(crate::properties::config::SPLIT_MESH_VERTEX_LIMIT, 12);
        let steps = PostProcessSteps::TRIANGULATE | PostProcessSteps::GEN_NORMALS | PostProcessSteps::SPLIT_LARGE_MESHES;
        let scene = importer.read_file("cube.obj", steps).unwrap();
        // the vertex-axis split ran last: several meshes, each within the
        // limit, each already triangulated and carrying generated normals
        assert!(scene.meshes.len() > 1);
        for mesh in &scene.meshes {
            assert!(mesh.vertex_count() <= 12);
            assert!(mesh.faces.iter().all(|face| face.indices.len() == 3));
            assert!(mesh.has_normals());
        }
    }

    #[test]
    fn join_vertices_shrinks_verbose_meshes() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        let scene = importer.read_file("cube.obj", PostProcessSteps::JOIN_IDENTICAL_VERTICES).unwrap();
        let mesh = &scene.meshes[0];
        // 6 quads * 4 corners = 24 verbose vertices joined to the 8 cube corners
        assert_eq!(mesh.vertex_count(), 8);
        assert!(scene.flags.contains(SceneFlags::NON_VERBOSE_FORMAT));
    }

    #[test]
    fn validation_step_accepts_clean_scenes() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        let scene = importer.read_file("cube.obj", PostProcessSteps::VALIDATE_DATA_STRUCTURE).unwrap();
        assert!(scene.flags.contains(SceneFlags::VALIDATED));
    }

    #[test]
    fn extra_verbose_revalidates_between_stages() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.set_extra_verbose(true);
        let steps = PostProcessSteps::TRIANGULATE | PostProcessSteps::JOIN_IDENTICAL_VERTICES | PostProcessSteps::GEN_SMOOTH_NORMALS;
        let scene = importer.read_file("cube.obj", steps);
        assert!(scene.is_some(), "{:?}", importer.error_string());
    }

    #[test]
    fn validate_steps_rejects_exclusive_normals() {
        let importer = AssetImporter::new();
        assert!(!importer.validate_steps(PostProcessSteps::GEN_NORMALS | PostProcessSteps::GEN_SMOOTH_NORMALS));
        assert!(importer.validate_steps(PostProcessSteps::GEN_SMOOTH_NORMALS));
        assert!(importer.validate_steps(PostProcessSteps::VALIDATE_DATA_STRUCTURE));
        assert!(importer.validate_steps(PostProcessSteps::all().difference(PostProcessSteps::GEN_NORMALS)));
    }

    #[test]
    fn extension_probe_needs_no_io() {
        let importer = AssetImporter::new();
        assert!(importer.is_extension_supported("obj"));
        assert!(importer.is_extension_supported(".obj"));
        assert!(importer.is_extension_supported("*.STL"));
        assert!(!importer.is_extension_supported("fbx"));
    }

    #[test]
    fn extension_list_aggregates_all_importers() {
        let list = AssetImporter::new().extension_list();
        assert!(list.contains("*.obj"));
        assert!(list.contains("*.stl"));
        assert!(list.contains("*.off"));
        assert!(!list.ends_with(';'));
    }

    #[test]
    fn property_roundtrip() {
        let mut importer = AssetImporter::new();
        importer.set_int_property("k", 7);
        assert_eq!(importer.int_property("k", -1), 7);
        assert_eq!(importer.int_property("unset", -1), -1);
        importer.set_float_property("f", 2.5);
        assert_eq!(importer.float_property("f", 0.0), 2.5);
        importer.set_string_property("s", "value");
        assert_eq!(importer.string_property("s", ""), "value");
    }

    #[test]
    fn import_source_roundtrip() {
        let mut importer = AssetImporter::new();
        assert!(importer.is_default_import_source());
        importer.set_import_source(Some(Box::new(MemorySource::new())));
        assert!(!importer.is_default_import_source());
        importer.set_import_source(None);
        assert!(importer.is_default_import_source());
        assert!(!importer.import_source().exists(Path::new("missing.obj")));
    }

    #[test]
    fn orphaned_scene_transfers_ownership() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.read_file("cube.obj", PostProcessSteps::empty()).unwrap();
        let scene = importer.orphaned_scene().unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert!(importer.scene().is_none());
    }

    #[test]
    fn clone_copies_configuration_not_data() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.set_int_property("k", 42);
        importer.read_file("cube.obj", PostProcessSteps::empty()).unwrap();

        let copy = importer.clone();
        assert_eq!(copy.int_property("k", -1), 42);
        assert!(copy.scene().is_none());
        // the clone goes back to the default source
        assert!(copy.is_default_import_source());
    }

    #[test]
    fn memory_requirements_total_is_the_category_sum() {
        let mut importer = memory_importer(&[("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.read_file("cube.obj", PostProcessSteps::empty()).unwrap();
        let requirements = importer.memory_requirements();
        assert!(requirements.meshes > 0);
        assert!(requirements.nodes > 0);
        assert_eq!(
            requirements.total,
            requirements.meshes
                + requirements.materials
                + requirements.nodes
                + requirements.textures
                + requirements.animations
                + requirements.cameras
                + requirements.lights
        );

        importer.free_scene();
        assert_eq!(importer.memory_requirements(), MemoryRequirements::default());
    }

    // ---- custom importers for registry and failure-containment tests ----

    struct TokenImporter {
        extension: &'static str,
        marker: &'static str,
    }

    impl Importer for TokenImporter {
        fn can_read(&self, path: &Path, _source: Option<&dyn ImportSource>, _check_sig: bool) -> bool {
            crate::importer::simple_extension_check(path, &[self.extension])
        }

        fn extension_list(&self, append: &mut String) {
            append.push_str("*.");
            append.push_str(self.extension);
        }

        fn intern_read_file(&mut self, _path: &Path, _source: &dyn ImportSource) -> Result<Scene> {
            let mut scene = Scene::with_root(self.marker);
            scene.flags |= SceneFlags::INCOMPLETE;
            Ok(scene)
        }
    }

    struct PanickingImporter;

    impl Importer for PanickingImporter {
        fn can_read(&self, path: &Path, _source: Option<&dyn ImportSource>, _check_sig: bool) -> bool {
            crate::importer::simple_extension_check(path, &["boom"])
        }

        fn extension_list(&self, append: &mut String) {
            append.push_str("*.boom");
        }

        fn intern_read_file(&mut self, _path: &Path, _source: &dyn ImportSource) -> Result<Scene> {
            panic!("decoder exploded");
        }
    }

    #[test]
    fn earlier_registrant_wins_extension_ties() {
        let mut importer = memory_importer(&[("scene.zzz", b"payload")]);
        importer.register_importer(Box::new(TokenImporter {
            extension: "zzz",
            marker: "first",
        }));
        importer.register_importer(Box::new(TokenImporter {
            extension: "zzz",
            marker: "second",
        }));
        let scene = importer.read_file("scene.zzz", PostProcessSteps::empty()).unwrap();
        assert_eq!(scene.root_node.name, "first");
    }

    #[test]
    fn unregister_removes_the_importer() {
        let mut importer = AssetImporter::new();
        let id = importer.register_importer(Box::new(TokenImporter {
            extension: "zzz",
            marker: "only",
        }));
        assert!(importer.is_extension_supported("zzz"));
        importer.unregister_importer(id).unwrap();
        assert!(!importer.is_extension_supported("zzz"));
        assert!(matches!(importer.unregister_importer(id), Err(Error::ImporterNotFound)));
    }

    #[test]
    fn panicking_decoder_is_contained() {
        let mut importer = memory_importer(&[("scene.boom", b"!"), ("cube.obj", CUBE_OBJ.as_bytes())]);
        importer.register_importer(Box::new(PanickingImporter));
        let scene = importer.read_file("scene.boom", PostProcessSteps::empty());
        assert!(scene.is_none());
        assert!(importer.error_string().unwrap().contains("decoder exploded"));

        // further imports are allowed (though not guaranteed when the
        // failing importer itself is involved again)
        assert!(importer.read_file("cube.obj", PostProcessSteps::empty()).is_some());
    }
}
