use euclid::default::Point2D;

use crate::stroke::{Action, Stroke};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Auxiliary,
}

impl PointerButton {
    /// DOM `MouseEvent.button` numbering.
    pub fn from_index(index: i16) -> Self {
        match index {
            0 => PointerButton::Primary,
            2 => PointerButton::Secondary,
            _ => PointerButton::Auxiliary,
        }
    }
}

/// Turns pointer events into strokes. Primary drag draws, secondary drag pans.
#[derive(Debug, Default)]
pub struct StrokeCapture {
    drawing: bool,
    panning: bool,
    last_pointer: Option<Point2D<f32>>,
    buffer: Vec<Stroke>,
}

impl StrokeCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Strokes of the gesture in progress, not yet committed.
    pub fn in_progress(&self) -> &[Stroke] {
        &self.buffer
    }

    pub fn pointer_down(&mut self, button: PointerButton, screen_pos: Point2D<f32>) {
        match button {
            PointerButton::Primary => {
                self.drawing = true;
                self.buffer.clear();
            }
            PointerButton::Secondary => self.panning = true,
            PointerButton::Auxiliary => {}
        }
        self.last_pointer = Some(screen_pos);
    }

    /// Returns the stroke appended by this move, if drawing.
    pub fn pointer_move(
        &mut self,
        screen_pos: Point2D<f32>,
        viewport: &mut Viewport,
    ) -> Option<Stroke> {
        let mut drawn = None;
        if let Some(prev) = self.last_pointer {
            if self.drawing {
                let stroke = Stroke::between(viewport.to_world(prev), viewport.to_world(screen_pos));
                self.buffer.push(stroke);
                drawn = Some(stroke);
            }
            if self.panning {
                viewport.pan(screen_pos - prev);
            }
        }
        self.last_pointer = Some(screen_pos);
        drawn
    }

    /// Ends every gesture. Returns the finished action unless nothing was drawn.
    pub fn pointer_up(&mut self) -> Option<Action> {
        self.drawing = false;
        self.panning = false;
        Action::new(std::mem::take(&mut self.buffer))
    }
}
