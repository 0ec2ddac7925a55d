/// Numeric parameters of the repair passes. Versioned as associated
/// constants; `Default` is the current version.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPolicy {
    /// Minimum shape extent along the flow axis.
    pub min_width: f64,
    /// Minimum shape extent along the stacking axis.
    pub min_height: f64,
    /// Width given to shapes placed by an explicit sequence position.
    pub sequence_shape_width: f64,
    /// Gap between consecutive sequence slots.
    pub sequence_buffer: f64,
    /// Smallest gap kept between evenly spaced shapes.
    pub min_gap: f64,
    /// Inset of the lane content area from the title bar and the far edge.
    pub lane_padding: f64,
    /// Lane sums within this distance of the container extent are not rescaled.
    pub lane_tolerance: f64,
    /// Lane size used when neither the lanes nor the container carry one.
    pub default_lane_size: f64,
}

impl LayoutPolicy {
    pub const V1: LayoutPolicy = LayoutPolicy {
        min_width: 50.0,
        min_height: 30.0,
        sequence_shape_width: 160.0,
        sequence_buffer: 40.0,
        min_gap: 20.0,
        lane_padding: 20.0,
        lane_tolerance: 0.01,
        default_lane_size: 200.0,
    };

    /// Distance between the origins of two consecutive sequence slots.
    pub fn sequence_pitch(&self) -> f64 {
        self.sequence_shape_width + self.sequence_buffer
    }
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self::V1
    }
}
