use eframe::egui;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::config::Config;
use crate::draw;
use crate::error::{AnnotateError, Result};
use crate::export;
use crate::images::{self, Direction};
use crate::model::{Axis, ImageEntry};
use crate::service::{ChartRequest, ChartService, PreAnnotation};
use crate::session::{Action, ClickOutcome, PendingValue, Session};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

const MODES: &[(Action, &str)] = &[
    (Action::SetOrigin, "Origin"),
    (Action::SetXPoints, "X points"),
    (Action::SetYMin, "Y min"),
    (Action::SetYMax, "Y max"),
];

// ── Worker messages ─────────────────────────────────────────────────────────

enum UiMessage {
    BatchLoaded(Result<Vec<ImageEntry>>),
    PreAnnotated {
        generation: u64,
        index: usize,
        pre: PreAnnotation,
    },
    DataProcessed {
        generation: u64,
        index: usize,
        result: Result<serde_json::Value>,
    },
}

// ── Modal prompts ───────────────────────────────────────────────────────────

enum Prompt {
    AxisValue {
        pending: PendingValue,
        input: String,
        error: Option<String>,
    },
    LegendLabel {
        image: usize,
        input: String,
        error: Option<String>,
    },
    XLabels {
        image: usize,
        input: String,
        error: Option<String>,
    },
    Alert {
        message: String,
    },
}

enum Decision {
    Open,
    Submit,
    Cancel,
}

// ── App ─────────────────────────────────────────────────────────────────────

pub struct ChartAnnotateApp {
    session: Session,
    config: Config,
    service: Arc<dyn ChartService>,

    tx: Sender<UiMessage>,
    rx: Receiver<UiMessage>,
    loading: bool,
    pre_annotating: bool,
    processing: bool,

    textures: HashMap<usize, egui::TextureHandle>,
    prompt: Option<Prompt>,
    status: String,

    // pan & zoom
    pan: egui::Vec2,
    zoom: f32,
    panning: bool,
}

impl ChartAnnotateApp {
    pub fn new(
        ctx: &egui::Context,
        config: Config,
        service: Arc<dyn ChartService>,
        initial: Vec<PathBuf>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let mut app = Self {
            session: Session::default(),
            config,
            service,
            tx,
            rx,
            loading: false,
            pre_annotating: false,
            processing: false,
            textures: HashMap::new(),
            prompt: None,
            status: "Open a batch of chart images to start.".to_string(),
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
            panning: false,
        };
        if !initial.is_empty() {
            app.start_load(ctx, initial);
        }
        app
    }

    fn alert(&mut self, message: impl Into<String>) {
        self.prompt = Some(Prompt::Alert {
            message: message.into(),
        });
    }

    fn alert_error(&mut self, err: AnnotateError) {
        log::warn!("{err}");
        self.alert(err.to_string());
    }

    // ── Background work ─────────────────────────────────────────────────────

    fn open_images(&mut self, ctx: &egui::Context) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_files()
        {
            self.start_load(ctx, paths);
        }
    }

    fn start_load(&mut self, ctx: &egui::Context, paths: Vec<PathBuf>) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.status = format!("Loading {} images...", paths.len());
        let service = self.config.sort_files.then(|| Arc::clone(&self.service));
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let result = images::load(paths, service.as_deref());
            let _ = tx.send(UiMessage::BatchLoaded(result));
            ctx.request_repaint();
        });
    }

    fn request_chart_analysis(&mut self, ctx: &egui::Context) {
        let (generation, index, path) = match self.session.chart_target() {
            Ok(target) => target,
            Err(err) => return self.alert_error(err),
        };
        self.pre_annotating = true;
        self.status = "Requesting pre-annotation...".to_string();
        let service = Arc::clone(&self.service);
        let config = self.config.clone();
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let pre = ChartRequest::for_image(&path, &config)
                .and_then(|request| service.process_chart(&request))
                .map(PreAnnotation::from_response)
                .unwrap_or_else(|err| {
                    log::error!("process-chart failed for {}: {err}", path.display());
                    PreAnnotation::failed()
                });
            let _ = tx.send(UiMessage::PreAnnotated {
                generation,
                index,
                pre,
            });
            ctx.request_repaint();
        });
    }

    fn export_data(&mut self, ctx: &egui::Context) {
        let (generation, index, request) = match self.session.process_data_request() {
            Ok(request) => request,
            Err(err) => return self.alert_error(err),
        };
        self.processing = true;
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        let ctx = ctx.clone();
        std::thread::spawn(move || {
            let result = service.process_data(&request);
            let _ = tx.send(UiMessage::DataProcessed {
                generation,
                index,
                result,
            });
            ctx.request_repaint();
        });
    }

    fn drain_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                UiMessage::BatchLoaded(Ok(entries)) => {
                    self.loading = false;
                    self.status = format!("Loaded {} images", entries.len());
                    self.textures.clear();
                    self.prompt = None;
                    self.session.load_batch(entries);
                    self.reset_view();
                }
                UiMessage::BatchLoaded(Err(err)) => {
                    self.loading = false;
                    log::error!("batch load failed: {err}");
                    self.status = format!("Load failed: {err}");
                }
                UiMessage::PreAnnotated {
                    generation,
                    index,
                    pre,
                } => {
                    self.pre_annotating = false;
                    if self.session.apply_pre_annotation(generation, index, pre) {
                        self.status = "Pre-annotation received".to_string();
                    }
                }
                UiMessage::DataProcessed {
                    generation,
                    index,
                    result,
                } => {
                    self.processing = false;
                    self.session.apply_service_result(generation, index, result);
                }
            }
        }
    }

    // ── Actions ─────────────────────────────────────────────────────────────

    fn navigate(&mut self, direction: Direction) {
        if self.session.navigate(direction) {
            self.reset_view();
        }
    }

    fn select_image(&mut self, index: usize) {
        if self.session.select_image(index) {
            self.reset_view();
        }
    }

    fn reset_view(&mut self) {
        self.pan = egui::Vec2::ZERO;
        self.zoom = 1.0;
    }

    fn undo(&mut self) {
        if let Some(point) = self.session.undo() {
            self.status = format!("Removed {}", point.label());
        }
    }

    fn begin_x_labels(&mut self) {
        match self.session.begin_relabel() {
            Ok((image, input)) => {
                self.prompt = Some(Prompt::XLabels {
                    image,
                    input,
                    error: None,
                });
            }
            Err(err) => self.alert_error(err),
        }
    }

    fn save_json(&mut self) {
        let Some(export) = self.session.prepare_export() else {
            return;
        };
        let Some(image_path) = self.session.current_image().map(|e| e.path.clone()) else {
            return;
        };
        if let Some(path) = export::pick_destination(&export, &image_path) {
            match export::write(&export, &path) {
                Ok(()) => self.status = format!("Saved {}", path.display()),
                Err(err) => self.session.error_message = Some(err.to_string()),
            }
        }
    }

    fn handle_click(&mut self, x: f32, y: f32) {
        match self.session.click(x, y) {
            Ok(ClickOutcome::Ignored) => {}
            Ok(ClickOutcome::Recorded(point)) => {
                self.status = format!("{} at ({x:.0}, {y:.0})", point.label());
            }
            Ok(ClickOutcome::NeedsValue(pending)) => {
                self.prompt = Some(Prompt::AxisValue {
                    input: pending.default_input().to_string(),
                    pending,
                    error: None,
                });
            }
            Err(err) => self.alert_error(err),
        }
    }

    // ── Canvas geometry ─────────────────────────────────────────────────────

    fn image_size(&self) -> (f32, f32) {
        self.session
            .current_image()
            .map(|e| e.size())
            .unwrap_or((800.0, 600.0))
    }

    /// Convert image-space coords to screen-space
    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let (w, h) = self.image_size();
        canvas_rect.center() + self.pan + (img_pos.to_vec2() - egui::vec2(w, h) * 0.5) * self.zoom
    }

    /// Convert screen-space coords to image-space
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> egui::Pos2 {
        let (w, h) = self.image_size();
        let rel = screen_pos - canvas_rect.center() - self.pan;
        egui::pos2(rel.x / self.zoom + w * 0.5, rel.y / self.zoom + h * 0.5)
    }

    fn image_rect_on_screen(&self, canvas_rect: egui::Rect) -> egui::Rect {
        let (w, h) = self.image_size();
        egui::Rect::from_min_max(
            self.image_to_screen(canvas_rect, egui::Pos2::ZERO),
            self.image_to_screen(canvas_rect, egui::pos2(w, h)),
        )
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureId> {
        let index = self.session.current_index()?;
        if let Some(tex) = self.textures.get(&index) {
            return Some(tex.id());
        }
        let entry = self.session.current_image()?;
        let rgba = entry.image.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let pixels = rgba.as_flat_samples();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
        let tex = ctx.load_texture(&entry.file_name, color_image, egui::TextureOptions::LINEAR);
        let id = tex.id();
        self.textures.insert(index, tex);
        Some(id)
    }

    // ── Panels ──────────────────────────────────────────────────────────────

    fn toolbar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            if ui
                .add_enabled(!self.loading, egui::Button::new("Open images"))
                .clicked()
            {
                self.open_images(ctx);
            }
            if ui.button("◀ Prev").clicked() {
                self.navigate(Direction::Prev);
            }
            if ui.button("Next ▶").clicked() {
                self.navigate(Direction::Next);
            }
            ui.separator();

            for (action, label) in MODES {
                if ui
                    .selectable_label(self.session.action == *action, *label)
                    .clicked()
                {
                    self.session.select_action(action.clone());
                }
            }
            ui.checkbox(&mut self.session.continuous, "Continuous");
            egui::ComboBox::from_id_salt("axis")
                .selected_text(format!("Axis: {}", self.session.axis.name()))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.session.axis, Axis::Left, "left");
                    ui.selectable_value(&mut self.session.axis, Axis::Right, "right");
                });
            ui.separator();

            if ui.button("Add legend").clicked() {
                match self.session.legend_target() {
                    Ok(image) => {
                        self.prompt = Some(Prompt::LegendLabel {
                            image,
                            input: String::new(),
                            error: None,
                        });
                    }
                    Err(err) => self.alert_error(err),
                }
            }
            if ui.button("Create X labels").clicked() {
                self.begin_x_labels();
            }
            if ui.button("Undo").clicked() {
                self.undo();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
            }
            ui.separator();

            if ui
                .add_enabled(!self.pre_annotating, egui::Button::new("Pre-annotate"))
                .clicked()
            {
                self.request_chart_analysis(ctx);
            }
            if ui
                .add_enabled(!self.processing, egui::Button::new("Process data"))
                .clicked()
            {
                self.export_data(ctx);
            }
            if ui.button("Save JSON").clicked() {
                self.save_json();
            }
            ui.separator();
            ui.label(format!("Zoom: {:.0}%", self.zoom * 100.0));
        });
    }

    fn file_list(&mut self, ui: &mut egui::Ui) {
        ui.heading(format!("Files ({})", self.session.images.len()));
        let current = self.session.current_index();
        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for (i, entry) in self.session.images.iter().enumerate() {
                if ui
                    .selectable_label(current == Some(i), entry.file_name.as_str())
                    .clicked()
                {
                    clicked = Some(i);
                }
            }
        });
        if let Some(i) = clicked {
            self.select_image(i);
        }
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Legends");
        let active = self.session.active_legend().map(str::to_owned);
        let mut toggled = None;
        if let Some(record) = self.session.current_record() {
            for legend in &record.legends {
                let text = egui::RichText::new(format!("{} ({})", legend.label, legend.axis.name()))
                    .color(legend.color.to_egui());
                let is_active = active.as_deref() == Some(legend.label.as_str());
                if ui.selectable_label(is_active, text).clicked() {
                    toggled = Some(legend.label.clone());
                }
            }
        }
        if let Some(label) = toggled {
            self.session.toggle_legend(&label);
        }

        ui.separator();
        ui.heading("Pre-annotation");
        egui::ScrollArea::vertical()
            .id_salt("editor")
            .max_height(ui.available_height() * 0.6)
            .show(ui, |ui| {
                ui.add(
                    egui::TextEdit::multiline(&mut self.session.editor)
                        .code_editor()
                        .desired_width(f32::INFINITY)
                        .desired_rows(16),
                );
            });
        if let Some(err) = &self.session.error_message {
            ui.colored_label(egui::Color32::RED, err.as_str());
        }

        if let Some(result) = &self.session.service_result {
            ui.separator();
            ui.heading("Service result");
            egui::ScrollArea::vertical().id_salt("result").show(ui, |ui| {
                ui.monospace(result.as_str());
            });
        }
    }

    fn canvas(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let texture = self.ensure_texture(ctx);
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;

        // Draw background
        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        let img_rect = self.image_rect_on_screen(canvas_rect);
        if let Some(tex) = texture {
            painter.image(
                tex,
                img_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        if let Some(record) = self.session.current_record() {
            let (_, h) = self.image_size();
            draw::paint(&painter, &draw::draw_list(record), h, self.zoom, |p| {
                self.image_to_screen(canvas_rect, p)
            });
        }

        // Handle pan (middle mouse button)
        if ctx.input(|i| i.pointer.middle_down()) {
            self.pan += ctx.input(|i| i.pointer.delta());
            self.panning = true;
        } else {
            self.panning = false;
        }

        // Handle zoom (scroll wheel)
        let scroll_delta = ctx.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            let new_zoom = (self.zoom * (1.0 + scroll_delta * 0.002)).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let cursor_rel = cursor - canvas_rect.center() - self.pan;
                self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
            }
            self.zoom = new_zoom;
        }

        if self.panning || self.prompt.is_some() {
            return;
        }
        if response.clicked_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                if img_rect.contains(pos) {
                    let img_pos = self.screen_to_image(canvas_rect, pos);
                    self.handle_click(img_pos.x, img_pos.y);
                }
            }
        }
    }

    // ── Prompts ─────────────────────────────────────────────────────────────

    fn show_prompt(&mut self, ctx: &egui::Context) {
        let Some(mut prompt) = self.prompt.take() else {
            return;
        };
        let (title, message) = match &prompt {
            Prompt::AxisValue { pending, .. } => ("Axis value", pending.prompt()),
            Prompt::LegendLabel { .. } => ("Legend", "Enter legend label:"),
            Prompt::XLabels { .. } => ("X labels", "Enter labels for X points, separated by ;"),
            Prompt::Alert { .. } => ("Notice", ""),
        };

        let decision = egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| match &mut prompt {
                Prompt::Alert { message } => {
                    ui.label(message.as_str());
                    let dismissed = ui.input(alert_dismissed);
                    if ui.button("OK").clicked() || dismissed {
                        Decision::Submit
                    } else {
                        Decision::Open
                    }
                }
                Prompt::AxisValue { input, error, .. }
                | Prompt::LegendLabel { input, error, .. }
                | Prompt::XLabels { input, error, .. } => {
                    ui.label(message);
                    let edit = ui.text_edit_singleline(input);
                    let entered = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if !edit.has_focus() && !entered {
                        edit.request_focus();
                    }
                    if let Some(err) = error {
                        ui.colored_label(egui::Color32::RED, err.as_str());
                    }
                    let mut decision = if entered { Decision::Submit } else { Decision::Open };
                    ui.horizontal(|ui| {
                        if ui.button("OK").clicked() {
                            decision = Decision::Submit;
                        }
                        if ui.button("Cancel").clicked() {
                            decision = Decision::Cancel;
                        }
                    });
                    decision
                }
            })
            .and_then(|r| r.inner)
            .unwrap_or(Decision::Open);

        match decision {
            Decision::Open => self.prompt = Some(prompt),
            Decision::Cancel => {}
            Decision::Submit => self.submit_prompt(prompt),
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt) {
        let outcome = match &prompt {
            Prompt::Alert { .. } => return,
            Prompt::AxisValue { pending, input, .. } => self
                .session
                .commit_value(pending, input)
                .map(|point| format!("{} at ({:.0}, {:.0})", point.label(), point.x, point.y)),
            Prompt::LegendLabel { image, input, .. } => self
                .session
                .add_legend(*image, input)
                .map(|legend| format!("Added legend {}", legend.label)),
            Prompt::XLabels { image, input, .. } => self
                .session
                .relabel_x(*image, input)
                .map(|n| format!("Relabelled {n} X points")),
        };
        match outcome {
            Ok(status) => self.status = status,
            Err(err @ AnnotateError::InvalidInput(_)) => {
                // keep the prompt open so the user can fix the input
                self.prompt = Some(with_error(prompt, err.to_string()));
            }
            Err(err) => self.alert_error(err),
        }
    }
}

fn alert_dismissed(input: &egui::InputState) -> bool {
    input.key_pressed(egui::Key::Enter) || input.key_pressed(egui::Key::Escape)
}

fn with_error(prompt: Prompt, message: String) -> Prompt {
    match prompt {
        Prompt::AxisValue { pending, input, .. } => Prompt::AxisValue {
            pending,
            input,
            error: Some(message),
        },
        Prompt::LegendLabel { image, input, .. } => Prompt::LegendLabel {
            image,
            input,
            error: Some(message),
        },
        Prompt::XLabels { image, input, .. } => Prompt::XLabels {
            image,
            input,
            error: Some(message),
        },
        alert @ Prompt::Alert { .. } => alert,
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for ChartAnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        // Keyboard shortcuts
        if self.prompt.is_none() && !ctx.wants_keyboard_input() {
            let (undo, escape) = ctx.input(|i| {
                (
                    i.modifiers.command && i.key_pressed(egui::Key::Z),
                    i.key_pressed(egui::Key::Escape),
                )
            });
            if undo {
                self.undo();
            }
            if escape {
                self.session.action = Action::Idle;
            }
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ctx, ui));

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Mode: {}", self.session.action.name()));
                ui.separator();
                if self.loading || self.pre_annotating || self.processing {
                    ui.spinner();
                }
                ui.label(self.status.as_str());
            });
        });

        egui::SidePanel::left("files")
            .resizable(true)
            .default_width(180.0)
            .show(ctx, |ui| self.file_list(ui));

        egui::SidePanel::right("annotations")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.side_panel(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ctx, ui));

        self.show_prompt(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_frame(key: Option<egui::Key>) -> bool {
        let ctx = egui::Context::default();
        let mut raw = egui::RawInput::default();
        if let Some(key) = key {
            raw.events.push(egui::Event::Key {
                key,
                physical_key: None,
                pressed: true,
                repeat: false,
                modifiers: egui::Modifiers::NONE,
            });
        }
        let mut dismissed = false;
        let _ = ctx.run(raw, |ctx| dismissed = ctx.input(alert_dismissed));
        dismissed
    }

    #[test]
    fn alerts_close_on_enter_or_escape() {
        assert!(key_frame(Some(egui::Key::Enter)));
        assert!(key_frame(Some(egui::Key::Escape)));
        assert!(!key_frame(Some(egui::Key::A)));
        assert!(!key_frame(None));
    }
}
