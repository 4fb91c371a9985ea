//! Presentation-neutral map overlays attached to analysis results.

use crate::hull::convex_hull;
use balloon_domain::Position2D;
use serde::{Deserialize, Serialize};

/// Fixed cluster palette, cycled by cluster id.
pub const CLUSTER_PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6", "#bcf60c",
    "#008080", "#9a6324",
];

/// Colour used for noise points and uncoloured markers.
pub const NEUTRAL_COLOR: &str = "#808080";

/// Stroke/fill styling for one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// Hex colour, `#rrggbb`
    pub color: String,
    /// Fill opacity in `[0, 1]`
    pub fill_opacity: f64,
    /// Optional text label
    pub label: Option<String>,
}

impl OverlayStyle {
    /// Style without a label
    pub fn new(color: impl Into<String>, fill_opacity: f64) -> Self {
        Self {
            color: color.into(),
            fill_opacity,
            label: None,
        }
    }

    /// Attach a label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Map geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Overlay {
    /// Geodesic circle
    Circle {
        /// Centre point
        center: Position2D,
        /// Radius on the ground
        radius_km: f64,
        /// Drawing style
        style: OverlayStyle,
    },
    /// Single point
    Marker {
        /// Marker location
        position: Position2D,
        /// Drawing style
        style: OverlayStyle,
    },
    /// Closed ring
    Polygon {
        /// Ring vertices without a repeated first point
        vertices: Vec<Position2D>,
        /// Drawing style
        style: OverlayStyle,
    },
}

impl Overlay {
    /// Style of any overlay variant
    pub fn style(&self) -> &OverlayStyle {
        match self {
            Self::Circle { style, .. } | Self::Marker { style, .. } | Self::Polygon { style, .. } => {
                style
            }
        }
    }

    /// Convex boundary of `points`, or `None` when they have no hull.
    pub fn hull(points: &[Position2D], style: OverlayStyle) -> Option<Self> {
        convex_hull(points).map(|vertices| Self::Polygon { vertices, style })
    }

    /// Rectangle between two latitude and two longitude bounds.
    pub fn cell(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64, style: OverlayStyle) -> Self {
        Self::Polygon {
            vertices: vec![
                Position2D::new(lat_min, lng_min),
                Position2D::new(lat_min, lng_max),
                Position2D::new(lat_max, lng_max),
                Position2D::new(lat_max, lng_min),
            ],
            style,
        }
    }
}

/// Blue (lowest) to red (highest) hex colour for an altitude.
///
/// `None` when `max_km <= min_km`; callers then skip colour scaling.
#[must_use]
pub fn altitude_color(altitude_km: f64, min_km: f64, max_km: f64) -> Option<String> {
    let range = max_km - min_km;
    if !(range.is_finite() && range > 0.0) {
        return None;
    }
    let t = ((altitude_km - min_km) / range).clamp(0.0, 1.0);
    let red = (255.0 * t).round() as u8;
    let blue = (255.0 * (1.0 - t)).round() as u8;
    Some(format!("#{red:02x}00{blue:02x}"))
}

/// Palette colour for a cluster id, cycling past the end
#[must_use]
pub fn cluster_color(id: usize) -> &'static str {
    CLUSTER_PALETTE[id % CLUSTER_PALETTE.len()]
}
