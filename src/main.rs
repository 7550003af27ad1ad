//! Bonnie viewer: drives the CPU pipeline once per frame and blits the result
//!
//! Controls:
//! - Left/Right: orbit, Up/Down: zoom, Space: pause auto-orbit
//! - W: wireframe, C: cycle cull mode, Z: depth test, F: sample filter
//! - P: save frame.png, Escape: quit

use std::sync::Arc;

use bonnie_pipeline::config::ViewerConfig;
use bonnie_pipeline::rasterizer::{CullMode, SampleFilter};
use bonnie_pipeline::scene::{self, load_scene, FrameRenderer, Model3D, SceneDescription, SceneModel, CUBE_ASSET};
use bonnie_pipeline::VERSION;
use macroquad::prelude as mq;
use parking_lot::RwLock;

const CONFIG_PATH: &str = "assets/viewer.ron";

fn window_conf() -> mq::Conf {
    let config = ViewerConfig::load(CONFIG_PATH).unwrap_or_default();
    mq::Conf {
        window_title: format!("Bonnie Viewer v{}", VERSION),
        window_width: config.window_width,
        window_height: config.window_height,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

/// Instantiate every model of the configured scene, or a lone cube
fn build_scene(config: &ViewerConfig) -> Vec<Arc<RwLock<Model3D>>> {
    let description = if config.scene.is_empty() {
        SceneDescription {
            models: vec![SceneModel {
                asset: CUBE_ASSET.to_string(),
                position: Default::default(),
                yaw: 0.0,
                scale: 1.0,
                animations: Vec::new(),
                play: None,
                show_skeleton: false,
            }],
        }
    } else {
        match load_scene(&config.scene) {
            Ok(description) => description,
            Err(e) => {
                log::error!("Failed to load scene {}: {}", config.scene, e);
                SceneDescription::default()
            }
        }
    };

    let mut models = Vec::new();
    for entry in &description.models {
        match scene::instance(|cache| cache.instantiate(entry)) {
            Ok(Ok(model)) => models.extend(model.upgrade()),
            Ok(Err(e)) => log::warn!("Skipping {}: {}", entry.asset, e),
            Err(e) => log::error!("{}", e),
        }
    }
    log::info!("Scene ready: {} models", models.len());
    models
}

fn next_cull(mode: CullMode) -> CullMode {
    match mode {
        CullMode::Back => CullMode::Front,
        CullMode::Front => CullMode::None,
        CullMode::None => CullMode::Back,
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ViewerConfig::load_or_default(CONFIG_PATH);
    if let Err(e) = scene::start_up() {
        log::error!("{}", e);
        return;
    }

    let models = build_scene(&config);
    let animators = scene::instance(|cache| cache.animators()).unwrap_or_default();

    let mut renderer = FrameRenderer::new(config.render_width, config.render_height, config.raster.clone());
    renderer.clear_color = config.clear_color;
    let mut camera = config.camera.clone();
    let mut auto_orbit = true;

    loop {
        let dt = mq::get_frame_time();

        if mq::is_key_pressed(mq::KeyCode::Escape) {
            break;
        }
        if mq::is_key_pressed(mq::KeyCode::Space) {
            auto_orbit = !auto_orbit;
        }
        if auto_orbit {
            camera.orbit(config.orbit_speed * dt);
        }
        if mq::is_key_down(mq::KeyCode::Left) {
            camera.orbit(-1.5 * dt);
        }
        if mq::is_key_down(mq::KeyCode::Right) {
            camera.orbit(1.5 * dt);
        }
        if mq::is_key_down(mq::KeyCode::Up) {
            camera.zoom(4.0 * dt);
        }
        if mq::is_key_down(mq::KeyCode::Down) {
            camera.zoom(-4.0 * dt);
        }

        let mut settings = renderer.settings().clone();
        let mut changed = true;
        if mq::is_key_pressed(mq::KeyCode::W) {
            settings.wireframe = !settings.wireframe;
        } else if mq::is_key_pressed(mq::KeyCode::C) {
            settings.cull_mode = next_cull(settings.cull_mode);
        } else if mq::is_key_pressed(mq::KeyCode::Z) {
            settings.depth_enable = !settings.depth_enable;
        } else if mq::is_key_pressed(mq::KeyCode::F) {
            settings.sample_filter = match settings.sample_filter {
                SampleFilter::Point => SampleFilter::Linear,
                SampleFilter::Linear => SampleFilter::Point,
            };
        } else {
            changed = false;
        }
        if changed {
            log::info!("Raster settings: {:?}", settings);
            renderer.set_settings(settings);
        }

        renderer.update(&models, &animators, dt);
        renderer.render(&models, &camera);

        if mq::is_key_pressed(mq::KeyCode::P) {
            match renderer.save_frame("frame.png") {
                Ok(()) => log::info!("Saved frame.png"),
                Err(e) => log::warn!("Failed to save frame: {}", e),
            }
        }

        mq::clear_background(mq::BLACK);
        let texture = mq::Texture2D::from_rgba8(
            renderer.width() as u16,
            renderer.height() as u16,
            &renderer.frame_rgba(),
        );
        texture.set_filter(mq::FilterMode::Nearest);
        mq::draw_texture_ex(
            &texture,
            0.0,
            0.0,
            mq::WHITE,
            mq::DrawTextureParams {
                dest_size: Some(mq::vec2(mq::screen_width(), mq::screen_height())),
                ..Default::default()
            },
        );

        let s = renderer.settings();
        mq::draw_text(
            &format!(
                "{} fps | cull {:?} | wire {} | depth {} | {:?}",
                mq::get_fps(),
                s.cull_mode,
                s.draws_wireframe(),
                s.depth_enable,
                s.sample_filter
            ),
            8.0,
            20.0,
            18.0,
            mq::WHITE,
        );

        mq::next_frame().await;
    }

    if let Err(e) = scene::shut_down() {
        log::error!("{}", e);
    }
}
