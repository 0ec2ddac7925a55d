pub mod connectors;
pub mod lanes;
pub mod layout;
pub mod normalize;
pub mod package;
pub mod policy;

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use policy::LayoutPolicy;

/// Declares a string enum that keeps unrecognised wire values instead of
/// rejecting them. The normalizer later rewrites `Unknown` to a safe default.
macro_rules! lenient_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// A value outside the recognised set, kept verbatim.
            Unknown(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Unknown(raw) => raw,
                }
            }

            /// Exact match against the wire names; anything else is `Unknown`.
            pub fn from_wire(raw: &str) -> Self {
                match raw {
                    $($wire => Self::$variant,)+
                    other => Self::Unknown(other.to_string()),
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }

            pub fn known() -> impl Iterator<Item = Self> {
                [$(Self::$variant),+].into_iter()
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match serde_json::Value::deserialize(deserializer)? {
                    serde_json::Value::String(raw) => Self::from_wire(&raw),
                    other => Self::Unknown(other.to_string()),
                })
            }
        }

        impl schemars::JsonSchema for $name {
            fn schema_name() -> Cow<'static, str> {
                stringify!($name).into()
            }

            fn json_schema(_: &mut schemars::SchemaGenerator) -> schemars::Schema {
                schemars::json_schema!({
                    "type": "string",
                    "enum": [$($wire),+]
                })
            }
        }
    };
}

// --- Types (matching the diagram host's standard import format) ---

lenient_enum! {
    /// Geometric primitive of a shape, plus the swimlane container type.
    ShapeType {
        SwimLanes => "swimLanes",
        Rectangle => "rectangle",
        Diamond => "diamond",
        Ellipse => "ellipse",
        Circle => "circle",
        Triangle => "triangle",
        Hexagon => "hexagon",
        Octagon => "octagon",
        Cloud => "cloud",
        Document => "document",
        Cylinder => "cylinder",
        Parallelogram => "parallelogram",
        RoundedRectangle => "roundedRectangle",
        Cube => "cube",
        Can => "can",
        FlowchartDocument => "flowchartDocument",
        Step => "step",
        Callout => "callout",
        Star => "star",
        Text => "text",
    }
}

lenient_enum! {
    FillType {
        Color => "color",
    }
}

lenient_enum! {
    EndpointType {
        ShapeEndpoint => "shapeEndpoint",
    }
}

lenient_enum! {
    LineType {
        Straight => "straight",
        Elbow => "elbow",
        Curved => "curved",
    }
}

lenient_enum! {
    ArrowStyle {
        None => "none",
        Arrow => "arrow",
    }
}

impl Default for ShapeType {
    fn default() -> Self {
        ShapeType::Rectangle
    }
}

impl Default for FillType {
    fn default() -> Self {
        FillType::Color
    }
}

impl Default for EndpointType {
    fn default() -> Self {
        EndpointType::ShapeEndpoint
    }
}

impl Default for LineType {
    fn default() -> Self {
        LineType::Straight
    }
}

/// One of the two layout directions of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn cross(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn start(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.w,
            Axis::Y => self.h,
        }
    }

    pub fn end(&self, axis: Axis) -> f64 {
        self.start(axis) + self.extent(axis)
    }

    pub fn set_start(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
        }
    }

    pub fn set_extent(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.w = value,
            Axis::Y => self.h = value,
        }
    }
}

/// Relative attachment point on a shape, both components in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Swap components, mapping a horizontal-lane anchor onto vertical lanes.
    pub const fn transposed(self) -> Self {
        Self {
            x: self.y,
            y: self.x,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Stroke {
    #[serde(default = "default_stroke_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub width: f64,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: default_stroke_color(),
            width: default_stroke_width(),
        }
    }
}

fn default_stroke_color() -> String {
    "#000000".to_string()
}

fn default_stroke_width() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Fill {
    #[serde(rename = "type", default)]
    pub fill_type: FillType,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct ShapeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
}

impl ShapeStyle {
    pub fn is_empty(&self) -> bool {
        self.stroke.is_none() && self.fill.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TitleBar {
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub vertical_text: bool,
}

/// One actor or system band of the swimlane container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub id: String,
    /// Rich-text label (the host accepts inline HTML spans).
    #[serde(default)]
    pub title: String,
    /// Extent along the stacking axis. The host calls this field `width`
    /// regardless of orientation.
    #[serde(rename = "width", alias = "size", default)]
    pub size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_fill: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwimlaneContainer {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "container_type")]
    pub shape_type: ShapeType,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "ShapeStyle::is_empty")]
    pub style: ShapeStyle,
    #[serde(default)]
    pub magnetize: bool,
    /// `false`: lanes are horizontal bands stacked along Y.
    /// `true`: lanes are columns stacked along X.
    #[serde(default)]
    pub vertical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_bar: Option<TitleBar>,
    pub lanes: Vec<Lane>,
}

fn container_type() -> ShapeType {
    ShapeType::SwimLanes
}

impl SwimlaneContainer {
    /// Axis along which lanes are stacked.
    pub fn stacking_axis(&self) -> Axis {
        if self.vertical {
            Axis::X
        } else {
            Axis::Y
        }
    }

    /// Axis along which process flow runs inside a lane.
    pub fn flow_axis(&self) -> Axis {
        self.stacking_axis().cross()
    }

    /// Declared extent of the container along the stacking axis.
    pub fn extent(&self) -> f64 {
        self.bounding_box.extent(self.stacking_axis())
    }

    pub fn title_extent(&self) -> f64 {
        self.title_bar
            .as_ref()
            .map(|t| t.height)
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(0.0)
    }

    pub fn lane_index(&self, lane_id: &str) -> Option<usize> {
        self.lanes.iter().position(|l| l.id == lane_id)
    }

    /// Absolute `(start, size)` of a lane along the stacking axis. The start is
    /// the container origin plus the sizes of all preceding lanes.
    pub fn lane_span(&self, index: usize) -> Option<(f64, f64)> {
        let lane = self.lanes.get(index)?;
        let offset: f64 = self.lanes[..index].iter().map(|l| l.size).sum();
        Some((
            self.bounding_box.start(self.stacking_axis()) + offset,
            lane.size,
        ))
    }

    /// Absolute `(start, end)` of the lane content area along the flow axis,
    /// after the title bar and `padding` on both sides.
    pub fn content_span(&self, padding: f64) -> (f64, f64) {
        let axis = self.flow_axis();
        let start = self.bounding_box.start(axis) + self.title_extent() + padding;
        let end = self.bounding_box.end(axis) - padding;
        (start, end.max(start))
    }
}

/// A flowchart step placed inside a lane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessShape {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub shape_type: ShapeType,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_id: Option<String>,
    #[serde(default, skip_serializing_if = "ShapeStyle::is_empty")]
    pub style: ShapeStyle,
    #[serde(default)]
    pub text: String,
    /// Explicit 1-based slot within the lane, lifted out of the text marker.
    #[serde(skip)]
    pub sequence: Option<u32>,
}

/// Any shape on a page. The container is recognised structurally by its
/// `lanes` array, so a mislabelled container type still parses as one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(untagged)]
pub enum Shape {
    Swimlanes(SwimlaneContainer),
    Process(ProcessShape),
}

impl Shape {
    pub fn id(&self) -> &str {
        match self {
            Shape::Swimlanes(c) => &c.id,
            Shape::Process(p) => &p.id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(rename = "type", default)]
    pub endpoint_type: EndpointType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ArrowStyle>,
    #[serde(default)]
    pub shape_id: String,
    /// Relative to the referenced shape's bounding box.
    #[serde(default)]
    pub position: Position,
}

/// A directed flow line between two shapes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub line_type: LineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    pub endpoint1: Endpoint,
    pub endpoint2: Endpoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Page {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub shapes: Vec<Shape>,
    #[serde(default)]
    pub lines: Vec<Connector>,
}

impl Page {
    /// The page's swimlane container, if any. Only the first one counts.
    pub fn container(&self) -> Option<&SwimlaneContainer> {
        self.shapes.iter().find_map(|s| match s {
            Shape::Swimlanes(c) => Some(c),
            Shape::Process(_) => None,
        })
    }

    pub fn container_mut(&mut self) -> Option<&mut SwimlaneContainer> {
        self.shapes.iter_mut().find_map(|s| match s {
            Shape::Swimlanes(c) => Some(c),
            Shape::Process(_) => None,
        })
    }

    pub fn process_shapes(&self) -> impl Iterator<Item = &ProcessShape> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Process(p) => Some(p),
            Shape::Swimlanes(_) => None,
        })
    }

    pub fn process_shapes_mut(&mut self) -> impl Iterator<Item = &mut ProcessShape> {
        self.shapes.iter_mut().filter_map(|s| match s {
            Shape::Process(p) => Some(p),
            Shape::Swimlanes(_) => None,
        })
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id() == id)
    }
}

/// The whole diagram exchanged with the host. One page in practice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, schemars::JsonSchema)]
pub struct Document {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub pages: Vec<Page>,
}

fn default_version() -> u32 {
    1
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: default_version(),
            pages: Vec::new(),
        }
    }
}

// --- Repair ---

/// Run the four repair passes in order: normalize shape types, rescale lanes,
/// lay out shapes, then resolve connector endpoints.
pub fn repair(document: Document, policy: &LayoutPolicy) -> Document {
    let document = normalize::normalize(document);
    let document = lanes::rescale(document, policy);
    let document = layout::reposition(document, policy);
    connectors::resolve(document)
}

/// JSON Schema of [`Document`], sent to the completion service as the
/// structured-output contract.
pub fn document_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(Document);
    serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null)
}
