//! Drag-controlled reveal boundary between the stacked viewports.
//!
//! The historical viewport is clipped to `[0, fraction]%` of the container
//! width; the primary viewport underneath is never masked.

pub const MIN_REVEAL: f64 = 5.0;
pub const MAX_REVEAL: f64 = 95.0;
pub const DEFAULT_REVEAL: f64 = 50.0;

/// Horizontal extent of the comparison container in client pixels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContainerRect {
    pub left: f64,
    pub width: f64,
}

impl ContainerRect {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }
}

/// Rectangular mask exposing the left `visible_pct` percent of a container.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipMask {
    pub visible_pct: f64,
}

impl ClipMask {
    pub fn hidden_pct(&self) -> f64 {
        100.0 - self.visible_pct
    }

    /// CSS `clip-path` value for the masked container.
    pub fn css_clip_path(&self) -> String {
        format!("inset(0 {}% 0 0)", self.hidden_pct())
    }
}

pub fn clamp_fraction(fraction: f64) -> f64 {
    fraction.clamp(MIN_REVEAL, MAX_REVEAL)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RevealController {
    fraction: f64,
    dragging: bool,
}

impl Default for RevealController {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_REVEAL,
            dragging: false,
        }
    }
}

impl RevealController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn begin(&mut self) {
        self.dragging = true;
    }

    /// Updates the fraction from a pointer position while dragging.
    ///
    /// The pointer may be outside the container; the result is clamped.
    /// Returns the new fraction, or `None` if nothing changed.
    pub fn move_to(&mut self, pointer_x: f64, rect: ContainerRect) -> Option<f64> {
        if !self.dragging || !(rect.width > 0.0) {
            return None;
        }
        let raw = (pointer_x - rect.left) / rect.width * 100.0;
        if !raw.is_finite() {
            return None;
        }
        let next = clamp_fraction(raw);
        if next == self.fraction {
            return None;
        }
        self.fraction = next;
        Some(next)
    }

    /// Ends the drag; also used when the pointer leaves the window.
    pub fn end(&mut self) {
        self.dragging = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn clip_mask(&self) -> ClipMask {
        ClipMask {
            visible_pct: self.fraction,
        }
    }
}
