use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use cgmath::{Point3, Vector3};
use pbr_engine::scene::{import_gltf, primitives, Entity, FlyCamera, Material, Scene, TextureData};
use pbr_engine::Renderer;
use web_time::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::ActiveEventLoop,
    window::{Window, WindowId},
};

use crate::input::InputState;
use crate::overlay::EguiOverlay;
use crate::ui::{self, FrameInfo, UiActions};
use crate::ViewerArgs;

/// Frame times above this are clamped so a stall does not fling the camera.
const MAX_FRAME_SECONDS: f32 = 0.1;

/// Spheres in the default scene: roughness rises left to right, the back
/// row is metallic.
const SPHERE_COLUMNS: usize = 5;

/// Everything that exists once the window and device are up.
struct ViewerState {
    window: Arc<Window>,
    renderer: Renderer<'static>,
    overlay: EguiOverlay,
    scene: Scene,
    camera: FlyCamera,
    input: InputState,
    last_frame: Instant,
    frame_seconds: f32,
}

/// Application state for the winit event loop.
pub struct App {
    args: ViewerArgs,
    state: Option<ViewerState>,
    /// Set when startup failed; returned from `main` after the loop exits.
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(args: ViewerArgs) -> Self {
        Self {
            args,
            state: None,
            error: None,
        }
    }

    pub fn exit_status(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init(&self, event_loop: &ActiveEventLoop) -> Result<ViewerState> {
        let window_attrs = Window::default_attributes()
            .with_title("PBR Viewer")
            .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720))
            .with_min_inner_size(winit::dpi::PhysicalSize::new(320, 240));
        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let size = window.inner_size();

        let renderer = pollster::block_on(Renderer::new(
            Arc::clone(&window),
            size.width.max(1),
            size.height.max(1),
            self.args.engine_config(),
        ))?;
        let overlay = EguiOverlay::new(&window, renderer.device(), renderer.surface_format());

        let mut scene = default_scene();
        for path in &self.args.models {
            if let Err(err) = add_model(&mut scene, path) {
                log::error!("Failed to load {}: {:#}", path.display(), err);
            }
        }

        let camera = FlyCamera::new(Point3::new(0.0, 1.0, 6.0), aspect(size.width, size.height));

        Ok(ViewerState {
            window,
            renderer,
            overlay,
            scene,
            camera,
            input: InputState::default(),
            last_frame: Instant::now(),
            frame_seconds: 0.0,
        })
    }
}

impl ViewerState {
    /// One frame: camera, UI, scene and overlay, then actions the UI asked for.
    fn redraw(&mut self) {
        let now = Instant::now();
        self.frame_seconds = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.renderer.reload_shaders() {
            log::info!("Shaders reloaded");
        }
        self.input
            .apply(&mut self.camera, self.frame_seconds.min(MAX_FRAME_SECONDS));

        let adapter = self.renderer.adapter_info().name.clone();
        let info = FrameInfo {
            frame_seconds: self.frame_seconds,
            adapter: &adapter,
            stats: self.renderer.last_frame(),
            param_capacity: self.renderer.param_buffer_capacity(),
            resources: self.renderer.resource_counts(),
            shader_generation: self.renderer.shader_generation(),
        };
        let scene = &mut self.scene;
        let mut actions = UiActions::default();
        let full_output = self.overlay.run(&self.window, |ctx| {
            actions = ui::build(ctx, scene, &info);
        });

        let size = self.renderer.size();
        let overlay = &mut self.overlay;
        let result = self
            .renderer
            .render(&self.scene, &self.camera, |device, queue, encoder, view| {
                overlay.paint(&full_output, size, device, queue, encoder, view);
            });
        if let Err(err) = result {
            log::error!("Render error: {:#}", err);
        }

        self.handle_actions(actions);
        self.window.request_redraw();
    }

    fn handle_actions(&mut self, actions: UiActions) {
        if actions.clear_entities {
            self.scene.clear_entities();
            log::info!("Entities cleared");
        }
        if actions.load_model {
            let file = rfd::FileDialog::new()
                .add_filter("glTF", &["gltf", "glb"])
                .pick_file();
            if let Some(path) = file {
                if let Err(err) = add_model(&mut self.scene, &path) {
                    log::error!("Failed to load {}: {:#}", path.display(), err);
                }
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(err) => {
                log::error!("Startup failed: {:#}", err);
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let consumed = state.overlay.on_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                // The renderer keeps its previous surface when a resize fails.
                if let Err(err) = state.renderer.resize(size.width, size.height) {
                    log::error!("Resize failed: {:#}", err);
                    return;
                }
                if size.height > 0 {
                    state.camera.aspect = aspect(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => state.redraw(),
            _ => {
                // Button releases still reach the camera while looking.
                if !consumed || state.input.is_looking() {
                    state.input.handle_window_event(&event);
                }
                if state.input.quit_requested() {
                    event_loop.exit();
                }
            }
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let Some(state) = self.state.as_mut() {
            state.input.handle_device_event(&event);
        }
    }
}

fn aspect(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Imports a glTF file and places one entity of it at the origin.
fn add_model(scene: &mut Scene, path: &Path) -> Result<()> {
    let imported = import_gltf(path, &mut scene.textures)?;
    let name = imported.name.clone();
    let model = scene.add_imported(imported);
    scene.add_entity(Entity::new(name, model));
    log::info!("Loaded glTF: {}", path.display());
    Ok(())
}

/// Two rows of spheres over a floor, lit by the default lights.
fn default_scene() -> Scene {
    let mut scene = Scene::new();
    let sphere = primitives::uv_sphere(0.4, 48, 24);
    let white = scene.textures.insert(TextureData::solid([255, 255, 255, 255]), true);

    for row in 0..2 {
        let metallic_value = if row == 0 { 0 } else { 255 };
        let metallic = scene
            .textures
            .insert(TextureData::solid([0, 0, metallic_value, 255]), false);
        let albedo = if row == 0 {
            white
        } else {
            scene.textures.insert(TextureData::solid([230, 180, 90, 255]), true)
        };

        for col in 0..SPHERE_COLUMNS {
            let t = col as f32 / (SPHERE_COLUMNS - 1) as f32;
            let roughness_value = (255.0 * t.clamp(0.05, 1.0)) as u8;
            let roughness = scene
                .textures
                .insert(TextureData::solid([0, roughness_value, 0, 255]), false);
            let material = Material::new(format!("sphere {row}-{col}"))
                .with_albedo(albedo)
                .with_metallic(metallic)
                .with_roughness(roughness);
            let model = scene.add_simple_model(sphere.clone(), material);
            let x = (col as f32 - (SPHERE_COLUMNS - 1) as f32 / 2.0) * 1.0;
            let y = 0.5 + row as f32 * 1.0;
            scene.add_entity(
                Entity::new(format!("Sphere {}", row * SPHERE_COLUMNS + col), model)
                    .with_position(Vector3::new(x, y, -(row as f32))),
            );
        }
    }

    let floor_material = Material::new("floor").with_albedo(white);
    let floor = scene.add_simple_model(primitives::plane(10.0), floor_material);
    scene.add_entity(Entity::new("Floor", floor));

    scene.add_default_lights();
    scene
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scene_layout() {
        let scene = default_scene();
        assert_eq!(scene.entities.len(), 2 * SPHERE_COLUMNS + 1);
        assert_eq!(scene.lights.len(), 4);
        for entity in &scene.entities {
            assert!(entity.model < scene.models.len());
        }
    }

    #[test]
    fn test_default_scene_roughness_increases() {
        let scene = default_scene();
        let roughness: Vec<u8> = scene.materials[..SPHERE_COLUMNS]
            .iter()
            .map(|m| scene.textures.get(m.roughness.unwrap()).unwrap().pixels[1])
            .collect();
        assert!(roughness.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_aspect_guards_zero_height() {
        assert_eq!(aspect(1600, 900), 1600.0 / 900.0);
        assert_eq!(aspect(10, 0), 10.0);
    }

    #[test]
    fn test_add_model_missing_file_fails() {
        let mut scene = Scene::new();
        assert!(add_model(&mut scene, Path::new("does/not/exist.gltf")).is_err());
        assert!(scene.entities.is_empty());
        assert!(scene.models.is_empty());
    }
}
