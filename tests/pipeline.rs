use std::sync::Arc;

use bonnie_pipeline::rasterizer::{
    flat_color_shader, skinned_vertex_shader, Color, GeometryConstantBuffer, GeometryStage, IVec2, LinearColor, Mat4,
    RasterSettings, RasterizerStage, Texture, TextureFormat, Topology, Vec3, Vertex,
};
use bonnie_pipeline::scene::{scene_from_str, Camera, FrameRenderer, ResourceCache};
use parking_lot::RwLock;

fn lit(target: &Texture) -> Vec<IVec2> {
    let mut out = Vec::new();
    for y in 0..target.height() as i32 {
        for x in 0..target.width() as i32 {
            if target.get_pixel(IVec2::new(x, y)) != Color::BLACK {
                out.push(IVec2::new(x, y));
            }
        }
    }
    out
}

#[test]
fn indexed_quad_fills_without_seam() {
    let constants = Arc::new(RwLock::new(GeometryConstantBuffer::default()));
    let target = Arc::new(RwLock::new(Texture::new(9, 9, TextureFormat::R8G8B8A8Unorm)));
    target.write().clear_color(Color::BLACK);

    let vertices = vec![
        Vertex::from_pos(-0.5, -0.5, 0.5),
        Vertex::from_pos(-0.5, 0.5, 0.5),
        Vertex::from_pos(0.5, 0.5, 0.5),
        Vertex::from_pos(0.5, -0.5, 0.5),
    ];

    let mut geometry = GeometryStage::new();
    geometry.set_vertex_buffer(Arc::new(vertices));
    geometry.set_index_buffer(Arc::new(vec![0, 1, 2, 0, 2, 3]));
    geometry.set_constant_buffer(&constants);
    geometry.set_shader(skinned_vertex_shader());
    geometry.set_topology(Topology::TriangleList);
    geometry.execute();

    let mut rasterizer = RasterizerStage::new();
    rasterizer.bind_geometry(&geometry);
    rasterizer.set_render_target(&target);
    rasterizer.set_shader(flat_color_shader(LinearColor::WHITE));
    rasterizer.execute();

    let pixels = lit(&target.read());
    assert_eq!(pixels.len(), 25);
    assert!(pixels.iter().all(|p| (2..=6).contains(&p.x) && (2..=6).contains(&p.y)));
}

#[test]
fn animated_scene_from_assets() {
    let description = scene_from_str(
        r#"(models: [(
            asset: "assets/models/arm.ron",
            animations: ["assets/animations/wave.ron"],
            play: Some("wave"),
            show_skeleton: true,
        )])"#,
    )
    .unwrap();

    let mut cache = ResourceCache::new();
    let model = cache.instantiate(&description.models[0]).unwrap();
    let model = model.upgrade().unwrap();
    let animators = cache.animators();
    assert_eq!(animators.len(), 1);
    assert!(animators[0].read().is_playing());
    assert_eq!(animators[0].read().animation_count(), 2);

    let mut renderer = FrameRenderer::new(64, 48, RasterSettings::default());
    let models = [model.clone()];
    renderer.update(&models, &animators, 0.5);
    assert_ne!(model.read().bones()[1], Mat4::IDENTITY);

    let camera = Camera {
        target: Vec3::new(0.0, 1.0, 0.0),
        ..Camera::default()
    };
    renderer.render(&models, &camera);
    assert!(!lit(&renderer.target().read()).is_empty());
}
