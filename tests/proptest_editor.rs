use boxlab::editor::{canonicalize, CoordinateSpace, DragEdges, Editor, InputEvent, Key};
use boxlab::model::ImageSize;
use kurbo::{Point, Vec2};
use proptest::prelude::*;

mod proptest_helpers;

const MIN_LEN: f64 = 6.0;

fn arb_drag_edges() -> impl Strategy<Value = DragEdges> {
    any::<[bool; 4]>().prop_map(|[x0, y0, x1, y1]| DragEdges { x0, y0, x1, y1 })
}

fn arb_event() -> impl Strategy<Value = InputEvent> {
    let point = (-50.0f64..700.0, -50.0f64..530.0);
    prop_oneof![
        3 => point.clone().prop_map(|(x, y)| InputEvent::down(x, y)),
        5 => point.clone().prop_map(|(x, y)| InputEvent::moved(x, y)),
        3 => point.prop_map(|(x, y)| InputEvent::up(x, y)),
        1 => Just(InputEvent::key(Key::Delete)),
    ]
}

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    #[test]
    fn canonical_boxes_are_inside_and_large_enough(
        raw in proptest_helpers::arb_raw_rect(),
        image in proptest_helpers::arb_image_size(),
        drag in arb_drag_edges(),
    ) {
        let bounds = image.bounds();
        let rect = canonicalize(raw, bounds, MIN_LEN, drag);

        prop_assert!(rect.x0 >= bounds.x0 && rect.x1 <= bounds.x1, "{rect:?}");
        prop_assert!(rect.y0 >= bounds.y0 && rect.y1 <= bounds.y1, "{rect:?}");
        prop_assert!(rect.width() >= MIN_LEN - 1e-9, "{rect:?}");
        prop_assert!(rect.height() >= MIN_LEN - 1e-9, "{rect:?}");
    }

    #[test]
    fn display_mapping_roundtrips(
        scale in 0.05f64..20.0,
        dx in -1000.0f64..1000.0,
        dy in -1000.0f64..1000.0,
        point in proptest_helpers::arb_point(),
    ) {
        let space = CoordinateSpace::with_transform(scale, Vec2::new(dx, dy));
        let back = space.to_image(space.to_display(point));
        prop_assert!((back.x - point.x).abs() < 1e-6);
        prop_assert!((back.y - point.y).abs() < 1e-6);
    }

    #[test]
    fn zoom_keeps_the_anchor_in_place(
        factor in 0.2f64..5.0,
        anchor in proptest_helpers::arb_point(),
    ) {
        let mut space = CoordinateSpace::with_transform(1.0, Vec2::new(15.0, -8.0));
        let under = space.to_image(anchor);
        space.zoom_at(anchor, factor);
        let after = space.to_display(under);
        prop_assert!((after.x - anchor.x).abs() < 1e-6);
        prop_assert!((after.y - anchor.y).abs() < 1e-6);
    }

    #[test]
    fn any_event_sequence_keeps_the_store_canonical(
        events in prop::collection::vec(arb_event(), 1..60),
    ) {
        let image = ImageSize::new(640, 480);
        let bounds = image.bounds();
        let mut editor = Editor::default();
        editor.load_image(image);

        for event in &events {
            editor.handle(event);
            for labeled in editor.store().all() {
                let r = labeled.rect;
                prop_assert!(r.x0 >= bounds.x0 && r.x1 <= bounds.x1, "{r:?}");
                prop_assert!(r.y0 >= bounds.y0 && r.y1 <= bounds.y1, "{r:?}");
                prop_assert!(r.width() >= MIN_LEN - 1e-9, "{r:?}");
                prop_assert!(r.height() >= MIN_LEN - 1e-9, "{r:?}");
            }
            if let Some(selected) = editor.selected() {
                prop_assert!(selected < editor.store().len());
            }
        }
        prop_assert!(editor.space().to_image(Point::ZERO) == Point::ZERO);
    }
}
