//! Shape position repair.
//!
//! Turns generated geometry into a layout that fits the lanes: fractional
//! sizes become absolute, undersized shapes are raised to the policy floors,
//! every shape is centred across its lane, and shapes are laid out along the
//! flow axis either evenly or by an explicit `[N]` sequence marker in their
//! text. A lane whose shapes already sit inside the content area without
//! overlapping keeps its layout, so re-running the pass on its own output,
//! in memory or after a trip through JSON, changes nothing.

use log::{debug, warn};

use crate::{Axis, BoundingBox, Document, LayoutPolicy, Page, ProcessShape};

pub fn reposition(mut document: Document, policy: &LayoutPolicy) -> Document {
    for page in &mut document.pages {
        reposition_page(page, policy);
    }
    document
}

/// Lane content area along the flow axis.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: f64,
    end: f64,
}

impl Span {
    fn len(self) -> f64 {
        self.end - self.start
    }

    /// Origin that keeps an `extent`-long shape inside the span.
    fn fit(self, origin: f64, extent: f64) -> f64 {
        origin.min(self.end - extent).max(self.start)
    }
}

fn reposition_page(page: &mut Page, policy: &LayoutPolicy) {
    let Some(container) = page.container().cloned() else {
        debug!(page = page.id.as_str(); "no swimlane container, skipping layout");
        return;
    };

    let stack = container.stacking_axis();
    let flow = container.flow_axis();
    let (start, end) = container.content_span(policy.lane_padding);
    let content = Span { start, end };

    let mut lanes: Vec<Vec<&mut ProcessShape>> =
        container.lanes.iter().map(|_| Vec::new()).collect();

    for shape in page.process_shapes_mut() {
        let Some(index) = shape
            .lane_id
            .as_deref()
            .and_then(|id| container.lane_index(id))
        else {
            warn!(shape = shape.id.as_str(); "shape is outside every lane, leaving it in place");
            continue;
        };
        let Some((lane_start, lane_size)) = container.lane_span(index) else {
            continue;
        };

        lift_sequence_marker(shape);
        let bbox = &mut shape.bounding_box;
        make_absolute(bbox, flow, content.start, content.len(), policy.min_width);
        make_absolute(bbox, stack, lane_start, lane_size, policy.min_height);
        let centred = lane_start + (lane_size - bbox.extent(stack)) / 2.0;
        bbox.set_start(stack, centred);

        lanes[index].push(shape);
    }

    for members in &mut lanes {
        if members.is_empty() {
            continue;
        }
        if members.iter().any(|s| s.sequence.is_some()) {
            place_by_sequence(members, flow, content, policy);
        } else if !is_settled(members, flow, content) {
            space_evenly(members, flow, content, policy);
        }
    }
}

/// Strip a leading `[N]` marker from the text and remember `N` on the shape.
/// A shape keeps the first position it was given.
fn lift_sequence_marker(shape: &mut ProcessShape) {
    if shape.sequence.is_some() {
        return;
    }
    if let Some((position, rest)) = split_marker(&shape.text) {
        let rest = rest.to_string();
        debug!(shape = shape.id.as_str(), position; "found sequence marker");
        shape.sequence = Some(position);
        shape.text = rest;
    }
}

/// `"[3] Approve"` → `(3, "Approve")`. Positions below 1 count as 1.
pub fn split_marker(text: &str) -> Option<(u32, &str)> {
    let rest = text.trim_start().strip_prefix('[')?;
    let (digits, rest) = rest.split_once(']')?;
    let position: u32 = digits.trim().parse().ok()?;
    Some((position.max(1), rest.trim_start()))
}

/// Resolve a fractional box (extent ≤ 1) against the `available` span that
/// begins at `offset`, origin included, then apply the floor. The lane's own
/// size always wins over the floor.
fn make_absolute(bbox: &mut BoundingBox, axis: Axis, offset: f64, available: f64, floor: f64) {
    let mut extent = bbox.extent(axis);
    if !extent.is_finite() {
        extent = floor;
    } else if extent <= 1.0 && available > 1.0 {
        extent *= available;
        let origin = bbox.start(axis);
        if (0.0..=1.0).contains(&origin) {
            bbox.set_start(axis, offset + origin * available);
        }
    }
    bbox.set_extent(axis, extent.max(floor).min(available.max(0.0)));
}

/// Slot `N` starts at `content.start + (N - 1) * pitch`. Shapes are taken in
/// `(position, document order)`; a repeated or missing position takes the
/// next free slot.
fn place_by_sequence(
    members: &mut [&mut ProcessShape],
    flow: Axis,
    content: Span,
    policy: &LayoutPolicy,
) {
    members.sort_by_key(|s| s.sequence.unwrap_or(u32::MAX));

    let mut slots = Vec::with_capacity(members.len());
    let mut previous: u32 = 0;
    for shape in members.iter() {
        let next = previous.saturating_add(1);
        let slot = shape.sequence.map_or(next, |p| p.max(next));
        slots.push(slot);
        previous = slot;
    }

    let (width, pitch) = slot_geometry(&slots, content.len().max(0.0), policy);
    for (shape, slot) in members.iter_mut().zip(slots) {
        let origin = content.start + f64::from(slot - 1) * pitch;
        let bbox = &mut shape.bounding_box;
        bbox.set_extent(flow, width);
        bbox.set_start(flow, content.fit(origin, width));
    }
}

/// Width and pitch for strictly increasing `slots` in a content area `len`
/// long. When the last slot would run past the end the pitch shrinks so it
/// ends flush, and once neighbouring slots would touch the width shrinks too.
fn slot_geometry(slots: &[u32], len: f64, policy: &LayoutPolicy) -> (f64, f64) {
    let width = policy.sequence_shape_width.min(len);
    let nominal = policy.sequence_pitch();
    let last = slots.last().copied().unwrap_or(1);
    if last <= 1 {
        return (width, nominal);
    }
    let steps = f64::from(last - 1);
    if steps * nominal + width <= len {
        return (width, nominal);
    }

    let pitch = (len - width) / steps;
    let Some(closest) = slots.windows(2).map(|pair| pair[1] - pair[0]).min() else {
        return (width, pitch);
    };
    let closest = f64::from(closest);
    if closest * pitch >= width {
        return (width, pitch);
    }
    debug!(slots = slots.len(), last; "sequence slots narrowed to fit the lane");
    let width = closest * len / (steps + closest);
    (width, (len - width) / steps)
}

/// Every shape inside the content area and none overlapping its neighbour.
fn is_settled(members: &[&mut ProcessShape], flow: Axis, content: Span) -> bool {
    const SLACK: f64 = 1e-6;
    let mut spans: Vec<(f64, f64)> = members
        .iter()
        .map(|s| (s.bounding_box.start(flow), s.bounding_box.end(flow)))
        .collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));
    spans
        .iter()
        .all(|&(start, end)| start >= content.start - SLACK && end <= content.end + SLACK)
        && spans.windows(2).all(|pair| pair[0].1 <= pair[1].0 + SLACK)
}

/// Distribute shapes with equal gaps in their current flow order; a sole
/// shape ends up centred. Shapes wider than an even share of the lane are
/// narrowed first, below the floor if the lane cannot hold every shape at it.
fn space_evenly(
    members: &mut [&mut ProcessShape],
    flow: Axis,
    content: Span,
    policy: &LayoutPolicy,
) {
    members.sort_by(|a, b| {
        a.bounding_box
            .start(flow)
            .total_cmp(&b.bounding_box.start(flow))
    });

    let count = members.len() as f64;
    let available = content.len().max(0.0);
    let room = available - (count + 1.0) * policy.min_gap;
    let total: f64 = members.iter().map(|s| s.bounding_box.extent(flow)).sum();
    if total > room {
        let cap = (room / count).max(policy.min_width.min(available / count));
        for shape in members.iter_mut() {
            let extent = shape.bounding_box.extent(flow).min(cap);
            shape.bounding_box.set_extent(flow, extent);
        }
    }

    let total: f64 = members.iter().map(|s| s.bounding_box.extent(flow)).sum();
    let gap = ((available - total) / (count + 1.0)).max(0.0);
    let mut cursor = content.start + gap;
    for shape in members.iter_mut() {
        let extent = shape.bounding_box.extent(flow);
        shape.bounding_box.set_start(flow, content.fit(cursor, extent));
        cursor += extent + gap;
    }
}
