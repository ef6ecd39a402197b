use cgmath::{InnerSpace, Vector3};
use pbr_engine::scene::{Light, LightType, RenderTargetMode, Scene, MAX_LIGHTS};
use pbr_engine::{FrameStats, ResourceCounts};

/// Actions requested by the UI that need to be handled by the application.
#[derive(Debug, Default, PartialEq)]
pub struct UiActions {
    pub load_model: bool,
    pub clear_entities: bool,
}

/// Read-only numbers shown in the info window.
pub struct FrameInfo<'a> {
    pub frame_seconds: f32,
    pub adapter: &'a str,
    pub stats: FrameStats,
    pub param_capacity: u64,
    pub resources: ResourceCounts,
    pub shader_generation: u64,
}

/// Build all egui windows and return any actions requested.
pub fn build(ctx: &egui::Context, scene: &mut Scene, info: &FrameInfo) -> UiActions {
    let mut actions = UiActions::default();

    build_info_window(ctx, scene, info);
    build_editor_window(ctx, scene, &mut actions);

    actions
}

fn build_info_window(ctx: &egui::Context, scene: &Scene, info: &FrameInfo) {
    egui::Window::new("Info")
        .default_pos([10.0, 10.0])
        .resizable(false)
        .show(ctx, |ui| {
            let fps = if info.frame_seconds > 0.0 {
                1.0 / info.frame_seconds
            } else {
                0.0
            };
            ui.label(format!("{:.0} fps ({:.2} ms)", fps, info.frame_seconds * 1000.0));
            ui.label(info.adapter);
            ui.separator();

            egui::Grid::new("info_grid").num_columns(2).show(ui, |ui| {
                ui.label("Entities");
                ui.label(scene.entities.len().to_string());
                ui.end_row();
                ui.label("Lights");
                ui.label(format!("{} / {}", scene.lights.len(), MAX_LIGHTS));
                ui.end_row();
                ui.label("Draws");
                ui.label(format!("{} ({} skipped)", info.stats.draws, info.stats.skipped));
                ui.end_row();
                ui.label("Params");
                ui.label(format!("{} / {} B", info.stats.param_bytes, info.param_capacity));
                ui.end_row();
                ui.label("Textures");
                ui.label(info.resources.textures.to_string());
                ui.end_row();
                ui.label("Meshes");
                ui.label(info.resources.meshes.to_string());
                ui.end_row();
                ui.label("Materials");
                ui.label(info.resources.materials.to_string());
                ui.end_row();
                ui.label("Pipelines");
                ui.label(info.resources.pipelines.to_string());
                ui.end_row();
                ui.label("Shaders");
                ui.label(format!("generation {}", info.shader_generation));
                ui.end_row();
            });
        });
}

fn build_editor_window(ctx: &egui::Context, scene: &mut Scene, actions: &mut UiActions) {
    egui::Window::new("Scene")
        .default_pos([10.0, 260.0])
        .default_width(260.0)
        .show(ctx, |ui| {
            egui::ComboBox::from_label("Output")
                .selected_text(scene.render_target_mode.label())
                .show_ui(ui, |ui| {
                    for mode in RenderTargetMode::ALL {
                        ui.selectable_value(&mut scene.render_target_mode, mode, mode.label());
                    }
                });

            ui.horizontal(|ui| {
                if ui.button("Load glTF...").clicked() {
                    actions.load_model = true;
                }
                if ui.button("Clear").clicked() {
                    actions.clear_entities = true;
                }
            });

            egui::ScrollArea::vertical()
                .max_height(400.0)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    egui::CollapsingHeader::new("Entities")
                        .default_open(true)
                        .show(ui, |ui| entity_rows(ui, scene));
                    egui::CollapsingHeader::new("Lights")
                        .default_open(false)
                        .show(ui, |ui| light_rows(ui, scene));
                });
        });
}

fn entity_rows(ui: &mut egui::Ui, scene: &mut Scene) {
    if scene.entities.is_empty() {
        ui.label("(empty)");
    }
    for (id, entity) in scene.entities.iter_mut().enumerate() {
        ui.push_id(("entity", id), |ui| {
            ui.horizontal(|ui| {
                ui.label(&entity.name);
                vector_drag(ui, &mut entity.position, 0.05);
            });
        });
    }
}

fn light_rows(ui: &mut egui::Ui, scene: &mut Scene) {
    for (i, light) in scene.lights.iter_mut().enumerate() {
        ui.push_id(("light", i), |ui| {
            ui.label(format!("{} #{}", light.light_type.label(), i));
            match light.light_type {
                LightType::Point => {
                    ui.horizontal(|ui| {
                        ui.label("Position");
                        vector_drag(ui, &mut light.position, 0.05);
                    });
                }
                LightType::Directional => {
                    ui.horizontal(|ui| {
                        ui.label("Direction");
                        if vector_drag(ui, &mut light.direction, 0.01) && light.direction.magnitude2() > 0.0 {
                            light.direction = light.direction.normalize();
                        }
                    });
                }
            }
            ui.horizontal(|ui| {
                let mut color = [light.color.x, light.color.y, light.color.z];
                if ui.color_edit_button_rgb(&mut color).changed() {
                    light.color = Vector3::from(color);
                }
                ui.add(
                    egui::DragValue::new(&mut light.intensity)
                        .speed(100.0)
                        .range(0.0..=f32::MAX)
                        .prefix("I: "),
                );
            });
            ui.separator();
        });
    }

    ui.add_enabled_ui(scene.lights.len() < MAX_LIGHTS, |ui| {
        ui.horizontal(|ui| {
            if ui.button("+ Point").clicked() {
                scene.add_light(Light::point(Vector3::new(0.0, 3.0, 0.0)));
            }
            if ui.button("+ Directional").clicked() {
                scene.add_light(Light::directional(Vector3::new(-0.3, -1.0, -0.2)));
            }
        });
    });
}

/// Three drag values side by side. Returns true if any changed.
fn vector_drag(ui: &mut egui::Ui, v: &mut Vector3<f32>, speed: f64) -> bool {
    let mut changed = false;
    for (axis, value) in ["x", "y", "z"].into_iter().zip([&mut v.x, &mut v.y, &mut v.z]) {
        changed |= ui
            .add(egui::DragValue::new(value).speed(speed).prefix(format!("{axis}: ")))
            .changed();
    }
    changed
}
