use euclid::default::{Point2D, Size2D, Vector2D};

const WHEEL_ZOOM_DIVISOR: f32 = 500.0;

/// Pan and zoom of the local view. Never touches the replica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    offset: Vector2D<f32>,
    scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: Vector2D::zero(),
            scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(offset: Vector2D<f32>, scale: f32) -> Self {
        Self { offset, scale }
    }

    pub fn offset(&self) -> Vector2D<f32> {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn to_screen(&self, world: Point2D<f32>) -> Point2D<f32> {
        (world + self.offset) * self.scale
    }

    pub fn to_world(&self, screen: Point2D<f32>) -> Point2D<f32> {
        screen / self.scale - self.offset
    }

    pub fn pan(&mut self, screen_delta: Vector2D<f32>) {
        self.offset += screen_delta / self.scale;
    }

    /// Zooms around the pointer so the content under it stays roughly in place.
    pub fn zoom_at(&mut self, pointer: Point2D<f32>, client_size: Size2D<f32>, wheel_delta: f32) {
        let amount = -wheel_delta / WHEEL_ZOOM_DIVISOR;
        let next_scale = self.scale * (1.0 + amount);
        if next_scale <= 0.0 || !next_scale.is_finite() {
            log::debug!("Ignoring zoom step to scale {}", next_scale);
            return;
        }
        self.scale = next_scale;

        if client_size.width <= 0.0 || client_size.height <= 0.0 {
            return;
        }
        let zoomed = client_size * amount;
        self.offset.x -= zoomed.width * (pointer.x / client_size.width);
        self.offset.y -= zoomed.height * (pointer.y / client_size.height);
    }
}
