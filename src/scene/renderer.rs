//! Frame driver: Update then Render over a set of models

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::animation::Animator;
use crate::error::AssetError;
use crate::rasterizer::{
    diffuse_shader, flat_color_shader, skinned_vertex_shader, AddressMode, Color, GeometryConstantBuffer,
    GeometryStage, LinearColor, PixelShader, RasterSettings, RasterizerConstantBuffer, RasterizerStage, Texture,
    TextureFormat,
};

use super::camera::Camera;
use super::mesh::Mesh;
use super::model::Model3D;

/// Depth value the depth texture is cleared to each frame
pub const FAR_DEPTH: f32 = 1.0;

/// Owns the pipeline stages, their constant buffers and the render surfaces
pub struct FrameRenderer {
    geometry: GeometryStage,
    rasterizer: RasterizerStage,
    geometry_constants: Arc<RwLock<GeometryConstantBuffer>>,
    raster_constants: Arc<RwLock<RasterizerConstantBuffer>>,
    target: Arc<RwLock<Texture>>,
    depth: Arc<RwLock<Texture>>,
    mesh_shader: PixelShader,
    skeleton_shader: PixelShader,
    pub clear_color: Color,
}

impl FrameRenderer {
    pub fn new(width: usize, height: usize, settings: RasterSettings) -> Self {
        let geometry_constants = Arc::new(RwLock::new(GeometryConstantBuffer::default()));
        let raster_constants = Arc::new(RwLock::new(RasterizerConstantBuffer::default()));
        let target = Arc::new(RwLock::new(Texture::new(width, height, TextureFormat::R8G8B8A8Unorm)));
        let depth = Arc::new(RwLock::new(Texture::new(width, height, TextureFormat::R32Float)));

        let mut geometry = GeometryStage::new();
        geometry.set_constant_buffer(&geometry_constants);
        geometry.set_shader(skinned_vertex_shader());

        let mut rasterizer = RasterizerStage::new();
        rasterizer.set_render_target(&target);
        rasterizer.set_depth_texture(&depth);
        rasterizer.set_constant_buffer(&raster_constants);
        rasterizer.bind_geometry(&geometry);

        let mesh_shader = diffuse_shader(settings.sample_filter, AddressMode::Wrap);
        rasterizer.set_settings(settings);

        Self {
            geometry,
            rasterizer,
            geometry_constants,
            raster_constants,
            target,
            depth,
            mesh_shader,
            skeleton_shader: flat_color_shader(LinearColor::GREEN),
            clear_color: Color::BLACK,
        }
    }

    pub fn width(&self) -> usize {
        self.target.read().width()
    }

    pub fn height(&self) -> usize {
        self.target.read().height()
    }

    pub fn target(&self) -> &Arc<RwLock<Texture>> {
        &self.target
    }

    pub fn depth(&self) -> &Arc<RwLock<Texture>> {
        &self.depth
    }

    pub fn settings(&self) -> &RasterSettings {
        &self.rasterizer.settings
    }

    /// Replace the raster settings; the diffuse shader follows the new filter
    pub fn set_settings(&mut self, settings: RasterSettings) {
        self.mesh_shader = diffuse_shader(settings.sample_filter, AddressMode::Wrap);
        self.rasterizer.set_settings(settings);
    }

    /// Reallocate target and depth; existing bindings keep pointing at them
    pub fn resize(&mut self, width: usize, height: usize) {
        *self.target.write() = Texture::new(width, height, TextureFormat::R8G8B8A8Unorm);
        *self.depth.write() = Texture::new(width, height, TextureFormat::R32Float);
    }

    /// Advance every animator by `tick` seconds, then refresh model palettes
    pub fn update(&self, models: &[Arc<RwLock<Model3D>>], animators: &[Arc<RwLock<Animator>>], tick: f32) {
        for animator in animators {
            animator.write().update(tick);
        }
        for model in models {
            model.write().update();
        }
    }

    /// Clear the surfaces and draw every model as seen from `camera`
    pub fn render(&mut self, models: &[Arc<RwLock<Model3D>>], camera: &Camera) {
        self.target.write().clear_color(self.clear_color);
        self.depth.write().clear_data(FAR_DEPTH);

        let aspect = self.width() as f32 / self.height().max(1) as f32;
        {
            let mut cb = self.geometry_constants.write();
            cb.view = camera.view();
            cb.projection = camera.projection(aspect);
        }

        for model in models {
            let model = model.read();
            {
                let mut cb = self.geometry_constants.write();
                cb.world = model.transform;
                cb.set_bones(model.bones());
            }

            let shader = self.mesh_shader.clone();
            for mesh in model.meshes() {
                self.draw_mesh(&mesh, &shader);
            }

            if model.show_skeleton {
                if let Some(animator) = model.animator() {
                    self.draw_skeleton(&animator.read());
                }
            }
        }
    }

    /// Draw the animator's joint lines over everything drawn so far
    fn draw_skeleton(&mut self, animator: &Animator) {
        let Some(lines) = animator.skeleton_mesh() else {
            return;
        };
        {
            let mut cb = self.geometry_constants.write();
            cb.world = animator.transform();
            cb.set_bones(animator.joint_transforms());
        }

        let depth_enable = self.rasterizer.settings.depth_enable;
        self.rasterizer.settings.depth_enable = false;
        let shader = self.skeleton_shader.clone();
        self.draw_mesh(&lines, &shader);
        self.rasterizer.settings.depth_enable = depth_enable;
    }

    fn draw_mesh(&mut self, mesh: &Mesh, shader: &PixelShader) {
        self.geometry.set_vertex_buffer(mesh.vertices().clone());
        self.geometry.set_index_buffer(mesh.indices().clone());
        self.geometry.set_topology(mesh.topology());
        self.geometry.execute();

        self.rasterizer.set_material(mesh.material());
        self.rasterizer.set_shader(shader.clone());
        self.rasterizer.execute();
    }

    /// Write the current frame to an image file
    pub fn save_frame<P: AsRef<Path>>(&self, path: P) -> Result<(), AssetError> {
        self.target.read().save(path)
    }

    /// Raw RGBA bytes of the current frame
    pub fn frame_rgba(&self) -> Vec<u8> {
        self.target.read().pixels().to_vec()
    }

    pub fn raster_constants(&self) -> &Arc<RwLock<RasterizerConstantBuffer>> {
        &self.raster_constants
    }
}
