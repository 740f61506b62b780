/// Deterministic track irregularity at a track position.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Inaccuracy {
    /// Lateral offset along the side vector.
    pub x: f64,
    /// Vertical offset along the up vector.
    pub y: f64,
    /// Extra cant.
    pub cant: f64,
}

impl Inaccuracy {
    /// Linear blend between two samples.
    pub fn lerp(&self, other: &Inaccuracy, t: f64) -> Inaccuracy {
        Inaccuracy {
            x: (1.0 - t) * self.x + t * other.x,
            y: (1.0 - t) * self.y + t * other.y,
            cant: (1.0 - t) * self.cant + t * other.cant,
        }
    }
}

/// Sum of incommensurate sines, scaled by the accuracy level. Zero for
/// accuracy levels of zero or below.
pub fn inaccuracies(position: f64, accuracy: f64) -> Inaccuracy {
    if accuracy <= 0.0 {
        return Inaccuracy::default();
    }
    let z = (0.25 * accuracy).powf(1.2) * position;
    Inaccuracy {
        x: (0.14 * (0.5843 * z).sin() + 0.82 * (0.2246 * z).sin() + 0.55 * (0.1974 * z).sin()) * 0.0035 * accuracy,
        y: (0.18 * (0.5172 * z).sin() + 0.37 * (0.3251 * z).sin() + 0.91 * (0.3773 * z).sin()) * 0.0020 * accuracy,
        cant: (0.23 * (0.3131 * z).sin() + 0.54 * (0.5807 * z).sin() + 0.81 * (0.3621 * z).sin()) * 0.0025 * accuracy,
    }
}
