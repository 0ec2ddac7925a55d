//! Connector endpoint resolution.
//!
//! Rewrites each connector's attachment points from the lane order of the
//! two shapes it joins, and drops connectors whose shapes do not exist.

use std::collections::HashMap;

use log::{debug, warn};

use crate::{Document, Page, Position, Shape};

const TOP: Position = Position::new(0.5, 0.0);
const BOTTOM: Position = Position::new(0.5, 1.0);
const LEFT: Position = Position::new(0.0, 0.5);
const RIGHT: Position = Position::new(1.0, 0.5);

/// Lane order of a connector's source relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Source lane comes before the target lane.
    Forward,
    SameLane,
    /// Source lane comes after the target lane.
    Backward,
}

impl Relation {
    /// Shapes without a lane are treated as sharing one.
    pub fn between(source: Option<usize>, target: Option<usize>) -> Self {
        match (source, target) {
            (Some(s), Some(t)) if s < t => Relation::Forward,
            (Some(s), Some(t)) if s > t => Relation::Backward,
            _ => Relation::SameLane,
        }
    }

    /// `(source, target)` anchors for lanes stacked top to bottom. Vertical
    /// lanes use the transposed anchors.
    pub fn anchors(self, vertical: bool) -> (Position, Position) {
        let (source, target) = match self {
            Relation::Forward => (BOTTOM, TOP),
            Relation::SameLane => (RIGHT, LEFT),
            Relation::Backward => (TOP, BOTTOM),
        };
        if vertical {
            (source.transposed(), target.transposed())
        } else {
            (source, target)
        }
    }
}

pub fn resolve(mut document: Document) -> Document {
    for page in &mut document.pages {
        resolve_page(page);
    }
    document
}

fn resolve_page(page: &mut Page) {
    let vertical = page.container().is_some_and(|c| c.vertical);
    let lanes = lane_indices(page);

    let before = page.lines.len();
    page.lines.retain_mut(|line| {
        let source = lanes.get(&line.endpoint1.shape_id);
        let target = lanes.get(&line.endpoint2.shape_id);
        let (Some(&source), Some(&target)) = (source, target) else {
            warn!(
                line = line.id.as_str(),
                from = line.endpoint1.shape_id.as_str(),
                to = line.endpoint2.shape_id.as_str();
                "dropping connector to an unknown shape"
            );
            return false;
        };

        let relation = Relation::between(source, target);
        if relation == Relation::Backward {
            warn!(line = line.id.as_str(); "connector runs against the lane order");
        }
        let (from, to) = relation.anchors(vertical);
        line.endpoint1.position = from;
        line.endpoint2.position = to;
        true
    });
    debug!(page = page.id.as_str(), kept = page.lines.len(), dropped = before - page.lines.len(); "resolved connectors");
}

/// Every shape id on the page, with the index of its lane when it has one.
fn lane_indices(page: &Page) -> HashMap<String, Option<usize>> {
    let container = page.container();
    page.shapes
        .iter()
        .map(|shape| {
            let lane = match shape {
                Shape::Process(p) => p
                    .lane_id
                    .as_deref()
                    .zip(container)
                    .and_then(|(id, c)| c.lane_index(id)),
                Shape::Swimlanes(_) => None,
            };
            (shape.id().to_string(), lane)
        })
        .collect()
}
