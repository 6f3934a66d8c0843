use std::fmt;
use std::path::Path;

use crate::asset::{GeometryError, MeshData};
use crate::io;
use crate::renderer::device::RenderDevice;
use crate::renderer::vertex::{VertexAttribute, VertexStream};

/// Unindexed triangle geometry living on the device.
///
/// Starts empty; a successful load uploads its streams exactly once. Share a loaded
/// asset between objects through `Rc`.
pub struct GeometryAsset<D: RenderDevice> {
    handle: Option<D::Geometry>,
    vertex_count: u32,
    attributes: Vec<VertexAttribute>,
}

impl<D: RenderDevice> Default for GeometryAsset<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: RenderDevice> fmt::Debug for GeometryAsset<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryAsset")
            .field("loaded", &self.is_loaded())
            .field("vertex_count", &self.vertex_count)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl<D: RenderDevice> GeometryAsset<D> {
    pub fn new() -> Self {
        Self {
            handle: None,
            vertex_count: 0,
            attributes: Vec::new(),
        }
    }

    pub fn load_from_path(
        &mut self,
        device: &mut D,
        path: impl AsRef<Path>,
    ) -> Result<(), GeometryError> {
        let path = path.as_ref();
        log::info!("Loading geometry: {:?}", path);
        let source = io::load_text(path).map_err(|err| {
            log::error!("{err}");
            GeometryError::from(err)
        })?;
        self.load_from_str(device, &source)
    }

    pub fn load_from_str(&mut self, device: &mut D, source: &str) -> Result<(), GeometryError> {
        if self.is_loaded() {
            log::warn!("Refusing to reload geometry that is already uploaded");
            return Err(GeometryError::AlreadyLoaded);
        }
        let mesh = MeshData::parse(source).map_err(|err| {
            log::error!("Failed to parse geometry: {err}");
            err
        })?;
        self.upload(device, &mesh)
    }

    /// Uploads already parsed streams, position first, then normals and UVs when present.
    pub fn upload(&mut self, device: &mut D, mesh: &MeshData) -> Result<(), GeometryError> {
        if self.is_loaded() {
            return Err(GeometryError::AlreadyLoaded);
        }
        if mesh.vertex_count() == 0 {
            log::warn!("Geometry has no faces; nothing uploaded");
            return Ok(());
        }

        let mut streams = vec![VertexStream::positions(&mesh.positions)];
        if mesh.has_normals() {
            streams.push(VertexStream::normals(&mesh.normals));
        }
        if mesh.has_uvs() {
            streams.push(VertexStream::tex_coords(&mesh.uvs));
        }

        let vertex_count = mesh.vertex_count() as u32;
        self.handle = Some(device.upload_geometry(&streams, vertex_count));
        self.attributes = streams.iter().map(|s| s.attribute).collect();
        self.vertex_count = vertex_count;

        log::info!(
            "Uploaded geometry: {} vertices, streams {:?}",
            vertex_count,
            self.attributes
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.handle.is_some()
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn draw(&self, device: &mut D) {
        match &self.handle {
            Some(handle) if self.vertex_count > 0 => device.draw(handle, self.vertex_count),
            _ => {}
        }
    }
}
