//! Headless description of what the canvas shows for one record.
//!
//! `draw_list` is pure; `paint` maps the commands onto an egui painter
//! through the canvas' image-to-screen transform.

use eframe::egui;

use crate::model::{AnnotationRecord, HexColor};

pub const POINT_RADIUS: f32 = 5.0;
pub const LABEL_OFFSET_X: f32 = 10.0;
const DASH_LENGTH: f32 = 5.0;
const GAP_LENGTH: f32 = 5.0;
const LABEL_FONT_SIZE: f32 = 12.0;

/// One primitive, in image pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCmd {
    Point {
        x: f32,
        y: f32,
        color: HexColor,
        label: String,
    },
    /// Dashed line across the whole image height at `x`.
    VerticalGuide { x: f32, color: HexColor },
}

pub fn draw_list(record: &AnnotationRecord) -> Vec<DrawCmd> {
    let mut cmds = Vec::with_capacity(record.operations.len());
    for point in &record.operations {
        cmds.push(DrawCmd::Point {
            x: point.x,
            y: point.y,
            color: point.color,
            label: point.label(),
        });
        if point.kind.is_x_tick() {
            cmds.push(DrawCmd::VerticalGuide {
                x: point.x,
                color: HexColor::RED,
            });
        }
    }
    cmds
}

pub fn paint(
    painter: &egui::Painter,
    cmds: &[DrawCmd],
    image_height: f32,
    zoom: f32,
    to_screen: impl Fn(egui::Pos2) -> egui::Pos2,
) {
    for cmd in cmds {
        match cmd {
            DrawCmd::Point { x, y, color, label } => {
                let center = to_screen(egui::pos2(*x, *y));
                let c = color.to_egui();
                painter.circle_filled(center, POINT_RADIUS * zoom.max(0.5), c);
                painter.text(
                    center + egui::vec2(LABEL_OFFSET_X * zoom, 0.0),
                    egui::Align2::LEFT_CENTER,
                    label,
                    egui::FontId::proportional(LABEL_FONT_SIZE * zoom.max(0.75)),
                    c,
                );
            }
            DrawCmd::VerticalGuide { x, color } => {
                let top = to_screen(egui::pos2(*x, 0.0));
                let bottom = to_screen(egui::pos2(*x, image_height));
                painter.extend(egui::Shape::dashed_line(
                    &[top, bottom],
                    egui::Stroke::new(1.0, color.to_egui()),
                    DASH_LENGTH,
                    GAP_LENGTH,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Axis, ClickPoint, PointKind};

    fn point(x: f32, kind: PointKind, color: HexColor) -> ClickPoint {
        ClickPoint {
            x,
            y: 7.0,
            kind,
            color,
            axis: Axis::Left,
        }
    }

    #[test]
    fn empty_record_draws_nothing() {
        assert!(draw_list(&AnnotationRecord::default()).is_empty());
    }

    #[test]
    fn x_ticks_get_a_guide_after_their_point() {
        let record = AnnotationRecord {
            operations: vec![
                point(1.0, PointKind::Origin, HexColor::ORIGIN_RED),
                point(2.0, PointKind::XTick("t0".into()), HexColor::BLUE),
                point(3.0, PointKind::Legend("s".into()), HexColor::GREEN),
            ],
            ..Default::default()
        };

        assert_eq!(
            draw_list(&record),
            vec![
                DrawCmd::Point { x: 1.0, y: 7.0, color: HexColor::ORIGIN_RED, label: "Origin".into() },
                DrawCmd::Point { x: 2.0, y: 7.0, color: HexColor::BLUE, label: "X=t0".into() },
                DrawCmd::VerticalGuide { x: 2.0, color: HexColor::RED },
                DrawCmd::Point { x: 3.0, y: 7.0, color: HexColor::GREEN, label: "s".into() },
            ]
        );
    }
}
