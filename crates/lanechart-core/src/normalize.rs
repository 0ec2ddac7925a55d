//! Shape-type normalization.
//!
//! Rewrites enum-valued fields that the generator got wrong to values the
//! diagram host accepts. Numeric and text fields are never touched, and
//! nothing is rejected: an unrecognised value degrades to a safe default.

use log::{debug, warn};

use crate::{
    ArrowStyle, Connector, Endpoint, EndpointType, FillType, LineType, Page, ProcessShape, Shape,
    ShapeStyle, ShapeType, SwimlaneContainer,
};

pub fn normalize(mut document: crate::Document) -> crate::Document {
    for page in &mut document.pages {
        normalize_page(page);
    }
    document
}

fn normalize_page(page: &mut Page) {
    let mut seen_container = false;
    page.shapes.retain_mut(|shape| match shape {
        Shape::Swimlanes(container) => {
            if seen_container {
                warn!(page = page.id.as_str(), container = container.id.as_str(); "dropping extra swimlane container");
                return false;
            }
            seen_container = true;
            normalize_container(container);
            true
        }
        Shape::Process(shape) => {
            normalize_process(shape);
            true
        }
    });

    for line in &mut page.lines {
        normalize_connector(line);
    }
}

fn normalize_container(container: &mut SwimlaneContainer) {
    if container.shape_type != ShapeType::SwimLanes {
        debug!(shape = container.id.as_str(), found = container.shape_type.as_str(); "canonicalizing container type");
        container.shape_type = ShapeType::SwimLanes;
    }
    normalize_style(&mut container.style);
}

fn normalize_process(shape: &mut ProcessShape) {
    shape.shape_type = match recognize(&shape.shape_type) {
        Some(ShapeType::SwimLanes) => {
            warn!(shape = shape.id.as_str(); "container type on a shape without lanes, using rectangle");
            ShapeType::Rectangle
        }
        Some(recognized) => recognized,
        None => {
            warn!(shape = shape.id.as_str(), found = shape.shape_type.as_str(); "unknown shape type, using rectangle");
            ShapeType::Rectangle
        }
    };
    normalize_style(&mut shape.style);
}

/// Resolve a shape type, tolerating case and separator differences.
/// Returns `None` when nothing in the allowed set matches.
pub fn recognize(shape_type: &ShapeType) -> Option<ShapeType> {
    let raw = match shape_type {
        ShapeType::Unknown(raw) => raw,
        known => return Some(known.clone()),
    };

    let folded = fold(raw);
    if matches!(folded.as_str(), "swimlane" | "swimlanes") {
        return Some(ShapeType::SwimLanes);
    }
    ShapeType::known().find(|candidate| fold(candidate.as_str()) == folded)
}

fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn normalize_style(style: &mut ShapeStyle) {
    if let Some(fill) = &mut style.fill {
        if fill.fill_type != FillType::Color {
            debug!(found = fill.fill_type.as_str(); "canonicalizing fill type");
            fill.fill_type = FillType::Color;
        }
    }
}

fn normalize_connector(line: &mut Connector) {
    if !line.line_type.is_known() {
        debug!(line = line.id.as_str(), found = line.line_type.as_str(); "unknown line type, using straight");
        line.line_type = LineType::Straight;
    }
    normalize_endpoint(&mut line.endpoint1, ArrowStyle::None);
    normalize_endpoint(&mut line.endpoint2, ArrowStyle::Arrow);
}

fn normalize_endpoint(endpoint: &mut Endpoint, default_style: ArrowStyle) {
    endpoint.endpoint_type = EndpointType::ShapeEndpoint;
    match &endpoint.style {
        Some(style) if style.is_known() => {}
        _ => endpoint.style = Some(default_style),
    }
}
