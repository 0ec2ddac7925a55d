//! Lane-dimension rescaling.
//!
//! Forces the lane sizes of the swimlane container to add up to the
//! container's extent along the stacking axis, then pulls every shape back
//! inside its own lane along that axis.

use log::{debug, warn};

use crate::{Axis, BoundingBox, Document, Lane, LayoutPolicy, Page, ProcessShape, SwimlaneContainer};

pub fn rescale(mut document: Document, policy: &LayoutPolicy) -> Document {
    for page in &mut document.pages {
        rescale_page(page, policy);
    }
    document
}

fn rescale_page(page: &mut Page, policy: &LayoutPolicy) {
    let container = match page.container_mut() {
        Some(container) if !container.lanes.is_empty() => {
            fit_lanes(container, policy);
            container.clone()
        }
        Some(container) => {
            warn!(container = container.id.as_str(); "swimlane container has no lanes, skipping rescale");
            return;
        }
        None => {
            debug!(page = page.id.as_str(); "no swimlane container, skipping rescale");
            return;
        }
    };

    let axis = container.stacking_axis();
    for shape in page.process_shapes_mut() {
        let index = bind_lane(shape, &container);
        if let Some((start, size)) = container.lane_span(index) {
            clamp_into(&mut shape.bounding_box, axis, start, size);
        }
    }
}

/// Make `sum(lane.size) == container.extent()` hold exactly.
fn fit_lanes(container: &mut SwimlaneContainer, policy: &LayoutPolicy) {
    let axis = container.stacking_axis();
    let count = container.lanes.len() as f64;

    for lane in &mut container.lanes {
        if !lane.size.is_finite() || lane.size < 0.0 {
            lane.size = 0.0;
        }
    }

    let mut sum = lane_sum(&container.lanes);
    let mut extent = container.extent();
    if !extent.is_finite() || extent <= 0.0 {
        extent = if sum > 0.0 {
            sum
        } else {
            policy.default_lane_size * count
        };
        warn!(container = container.id.as_str(), extent; "container has no usable extent, deriving it from the lanes");
        container.bounding_box.set_extent(axis, extent);
    }

    if sum <= 0.0 {
        for lane in &mut container.lanes {
            lane.size = extent / count;
        }
        sum = lane_sum(&container.lanes);
    }

    let head = sum - container.lanes.last().map(|l| l.size).unwrap_or(0.0);
    if (sum - extent).abs() > policy.lane_tolerance || head > extent {
        let factor = extent / sum;
        debug!(container = container.id.as_str(), sum, extent, factor; "rescaling lanes");
        let last = container.lanes.len() - 1;
        for lane in &mut container.lanes[..last] {
            lane.size *= factor;
        }
    }

    settle_remainder(&mut container.lanes, extent);
}

fn lane_sum(lanes: &[Lane]) -> f64 {
    lanes.iter().map(|l| l.size).sum()
}

/// Give the last lane whatever makes the sum equal `extent`. When the float
/// remainder would not land exactly, the other lanes are snapped down to
/// whole units first, which makes the subtraction exact.
fn settle_remainder(lanes: &mut [Lane], extent: f64) {
    let Some((last, head)) = lanes.split_last_mut() else {
        return;
    };

    let mut taken = lane_sum(head);
    let remainder = extent - taken;
    if remainder < 0.0 || taken + remainder != extent {
        for lane in head.iter_mut() {
            lane.size = lane.size.floor();
        }
        taken = lane_sum(head);
    }
    last.size = extent - taken;
}

/// Index of the shape's lane, re-binding it to the first lane when its
/// `laneId` is missing or unknown. `container` must have at least one lane.
fn bind_lane(shape: &mut ProcessShape, container: &SwimlaneContainer) -> usize {
    if let Some(index) = shape
        .lane_id
        .as_deref()
        .and_then(|id| container.lane_index(id))
    {
        return index;
    }
    warn!(
        shape = shape.id.as_str(),
        lane = shape.lane_id.as_deref().unwrap_or("<none>");
        "shape is not bound to a known lane, using the first lane"
    );
    shape.lane_id = Some(container.lanes[0].id.clone());
    0
}

/// Keep `bbox` within `[start, start + size]` along `axis`, shrinking it
/// first when it is larger than the lane.
pub(crate) fn clamp_into(bbox: &mut BoundingBox, axis: Axis, start: f64, size: f64) {
    let mut extent = bbox.extent(axis);
    if !extent.is_finite() || extent > size {
        extent = size;
        bbox.set_extent(axis, extent);
    }

    let max = (start + size - extent).max(start);
    let origin = bbox.start(axis);
    let clamped = if origin.is_finite() {
        origin.clamp(start, max)
    } else {
        start
    };
    bbox.set_start(axis, clamped);
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::fixtures::*;
    use crate::Shape;

    fn sizes(doc: &Document) -> Vec<f64> {
        doc.pages[0]
            .container()
            .unwrap()
            .lanes
            .iter()
            .map(|l| l.size)
            .collect()
    }

    fn shape_box(doc: &Document, id: &str) -> BoundingBox {
        match doc.pages[0].shape(id).unwrap() {
            Shape::Process(p) => p.bounding_box,
            Shape::Swimlanes(_) => panic!("{id} is the container"),
        }
    }

    #[test]
    fn three_lanes_rescale_to_container_height() {
        let doc = rescale(three_lane_document(vec![], vec![]), &LayoutPolicy::default());
        let sizes = sizes(&doc);
        assert_eq!(sizes, vec![80.0, 80.0, 80.0]);
        assert_eq!(sizes.iter().sum::<f64>(), 240.0);
    }

    #[test]
    fn uneven_rescale_sum_is_exact() {
        let doc = document(
            vec![Shape::Swimlanes(container(
                BoundingBox::new(0.0, 0.0, 500.0, 100.0),
                vec![lane("a", 1.0), lane("b", 1.0), lane("c", 1.0)],
            ))],
            vec![],
        );
        let doc = rescale(doc, &LayoutPolicy::default());
        let sizes = sizes(&doc);
        assert_eq!(sizes.iter().sum::<f64>(), 100.0);
        assert!(approx_eq!(f64, sizes[0], 100.0 / 3.0, epsilon = 1.0));
    }

    #[test]
    fn small_drift_is_absorbed_by_last_lane() {
        let doc = document(
            vec![Shape::Swimlanes(container(
                BoundingBox::new(0.0, 0.0, 500.0, 240.0),
                vec![lane("a", 100.0), lane("b", 100.0), lane("c", 40.005)],
            ))],
            vec![],
        );
        let sizes = sizes(&rescale(doc, &LayoutPolicy::default()));
        assert_eq!(sizes[..2], [100.0, 100.0]);
        assert_eq!(sizes.iter().sum::<f64>(), 240.0);
    }

    #[test]
    fn missing_container_is_a_no_op() {
        let doc = document(
            vec![Shape::Process(shape("s", "a", BoundingBox::new(5.0, 5.0, 1.0, 1.0)))],
            vec![],
        );
        assert_eq!(rescale(doc.clone(), &LayoutPolicy::default()), doc);
    }

    #[test]
    fn zero_sized_lanes_split_extent_evenly() {
        let doc = document(
            vec![Shape::Swimlanes(container(
                BoundingBox::new(0.0, 0.0, 500.0, 300.0),
                vec![lane("a", 0.0), lane("b", -4.0)],
            ))],
            vec![],
        );
        assert_eq!(sizes(&rescale(doc, &LayoutPolicy::default())), vec![150.0, 150.0]);
    }

    #[test]
    fn zero_extent_is_taken_from_lanes() {
        let doc = document(
            vec![Shape::Swimlanes(container(
                BoundingBox::new(0.0, 0.0, 500.0, 0.0),
                vec![lane("a", 120.0), lane("b", 80.0)],
            ))],
            vec![],
        );
        let doc = rescale(doc, &LayoutPolicy::default());
        assert_eq!(doc.pages[0].container().unwrap().bounding_box.h, 200.0);
        assert_eq!(sizes(&doc), vec![120.0, 80.0]);
    }

    #[test]
    fn shapes_are_clamped_into_their_lane() {
        let below = shape("below", "a", BoundingBox::new(300.0, 900.0, 100.0, 40.0));
        let above = shape("above", "c", BoundingBox::new(300.0, 0.0, 100.0, 40.0));
        let doc = rescale(
            three_lane_document(vec![below, above], vec![]),
            &LayoutPolicy::default(),
        );
        // lane a spans [200, 280], lane c spans [360, 440]
        assert_eq!(shape_box(&doc, "below").y, 240.0);
        assert_eq!(shape_box(&doc, "above").y, 360.0);
        assert_eq!(shape_box(&doc, "above").x, 300.0);
    }

    #[test]
    fn oversized_shape_is_shrunk_to_lane() {
        let tall = shape("tall", "b", BoundingBox::new(300.0, 250.0, 100.0, 500.0));
        let doc = rescale(three_lane_document(vec![tall], vec![]), &LayoutPolicy::default());
        let b = shape_box(&doc, "tall");
        assert_eq!((b.y, b.h), (280.0, 80.0));
    }

    #[test]
    fn unknown_lane_binds_to_first_lane() {
        let lost = shape("lost", "nowhere", BoundingBox::new(300.0, 1000.0, 100.0, 40.0));
        let doc = rescale(three_lane_document(vec![lost], vec![]), &LayoutPolicy::default());
        let shape = doc.pages[0].process_shapes().next().unwrap();
        assert_eq!(shape.lane_id.as_deref(), Some("a"));
        assert_eq!(shape.bounding_box.y, 240.0);
    }

    #[test]
    fn vertical_lanes_use_container_width() {
        let mut c = container(
            BoundingBox::new(0.0, 0.0, 600.0, 400.0),
            vec![lane("a", 100.0), lane("b", 100.0)],
        );
        c.vertical = true;
        let s = shape("s", "b", BoundingBox::new(900.0, 10.0, 80.0, 40.0));
        let doc = rescale(
            document(vec![Shape::Swimlanes(c), Shape::Process(s)], vec![]),
            &LayoutPolicy::default(),
        );
        assert_eq!(sizes(&doc), vec![300.0, 300.0]);
        assert_eq!(shape_box(&doc, "s").x, 520.0);
    }

    // ===================
    // Properties
    // ===================

    fn scenario() -> impl Strategy<Value = Document> {
        (
            prop::collection::vec(0.0f64..400.0, 1..6),
            1.0f64..2000.0,
            prop::collection::vec((0usize..6, -500.0f64..2500.0, 0.0f64..300.0), 0..8),
        )
            .prop_map(|(lane_sizes, extent, shapes)| {
                let lanes: Vec<Lane> = lane_sizes
                    .iter()
                    .enumerate()
                    .map(|(i, size)| lane(&format!("l{i}"), *size))
                    .collect();
                let lane_count = lanes.len();
                let mut all = vec![Shape::Swimlanes(container(
                    BoundingBox::new(100.0, 50.0, 900.0, extent),
                    lanes,
                ))];
                all.extend(shapes.into_iter().enumerate().map(|(i, (lane_ix, y, h))| {
                    Shape::Process(shape(
                        &format!("s{i}"),
                        &format!("l{}", lane_ix % lane_count),
                        BoundingBox::new(200.0, y, 80.0, h),
                    ))
                }));
                document(all, vec![])
            })
    }

    fn check_lane_sum_is_exact(doc: Document) -> Result<(), TestCaseError> {
        let out = rescale(doc, &LayoutPolicy::default());
        let container = out.pages[0].container().unwrap();
        let sum: f64 = container.lanes.iter().map(|l| l.size).sum();
        prop_assert_eq!(sum, container.extent());
        prop_assert!(container.lanes.iter().all(|l| l.size >= 0.0));
        Ok(())
    }

    fn check_shapes_are_contained(doc: Document) -> Result<(), TestCaseError> {
        let out = rescale(doc, &LayoutPolicy::default());
        let page = &out.pages[0];
        let container = page.container().unwrap();
        for shape in page.process_shapes() {
            let index = container
                .lane_index(shape.lane_id.as_deref().unwrap())
                .unwrap();
            let (start, size) = container.lane_span(index).unwrap();
            let b = shape.bounding_box;
            prop_assert!(b.y >= start - 1e-9, "{:?} starts before lane at {}", b, start);
            prop_assert!(
                b.y + b.h <= start + size + 1e-9,
                "{:?} ends after lane end {}",
                b,
                start + size
            );
        }
        Ok(())
    }

    fn check_idempotent(doc: Document) -> Result<(), TestCaseError> {
        let policy = LayoutPolicy::default();
        let once = rescale(doc, &policy);
        let twice = rescale(once.clone(), &policy);
        prop_assert_eq!(once, twice);
        Ok(())
    }

    proptest! {
        #[test]
        fn lane_sum_is_exact(doc in scenario()) {
            check_lane_sum_is_exact(doc)?;
        }

        #[test]
        fn shapes_are_contained(doc in scenario()) {
            check_shapes_are_contained(doc)?;
        }

        #[test]
        fn rescale_is_idempotent(doc in scenario()) {
            check_idempotent(doc)?;
        }
    }
}
