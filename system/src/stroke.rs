use euclid::default::Point2D;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

/// One line segment in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Stroke {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn between(from: Point2D<f32>, to: Point2D<f32>) -> Self {
        Self::new(from.x, from.y, to.x, to.y)
    }

    pub fn start(&self) -> Point2D<f32> {
        Point2D::new(self.x0, self.y0)
    }

    pub fn end(&self) -> Point2D<f32> {
        Point2D::new(self.x1, self.y1)
    }
}

#[derive(Debug, Error)]
#[error("an action must contain at least one stroke")]
pub struct EmptyActionError;

/// Strokes of one pointer-down to pointer-up gesture. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Stroke>", into = "Vec<Stroke>")]
pub struct Action {
    strokes: Vec<Stroke>,
}

impl Action {
    pub fn new(strokes: Vec<Stroke>) -> Option<Self> {
        if strokes.is_empty() {
            None
        } else {
            Some(Self { strokes })
        }
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }
}

impl TryFrom<Vec<Stroke>> for Action {
    type Error = EmptyActionError;

    fn try_from(strokes: Vec<Stroke>) -> Result<Self, Self::Error> {
        Action::new(strokes).ok_or(EmptyActionError)
    }
}

impl From<Action> for Vec<Stroke> {
    fn from(action: Action) -> Self {
        action.strokes
    }
}
