//! Property-based invariant tests for render geometry.
//!
//! 1. Point -> offset -> point is the identity for every reachable cursor point.
//! 2. Offset -> point -> offset is the identity except where a flush line end
//!    and the next line start share a point.
//! 3. Physical row count is non-decreasing in text length.
//! 4. The last row length is always in `1..=width` for non-empty text.
//! 5. Total rows equal the sum of per-line rows.
//! 6. Resizing and resizing back restores the cursor point.
//! 7. No panics on degenerate widths.

use fline_text::geometry::{
    GeometryError, PromptSpan, RenderData, RenderOffset, ScreenPoint, offset_to_point,
    physical_line_count_len, point_to_offset, remap_for_resize,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn text_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z ]{0,30}", 1..5).prop_map(|lines| lines.join("\n"))
}

/// (text, width, anchor, continuation width)
fn scene_strategy() -> impl Strategy<Value = (String, usize, ScreenPoint, usize)> {
    (text_strategy(), 1usize..24).prop_flat_map(|(text, width)| {
        (
            Just(text),
            Just(width),
            (0..width, 0usize..5).prop_map(|(x, y)| ScreenPoint::new(x, y)),
            0..width + 3,
        )
    })
}

fn all_offsets(render: &RenderData) -> Vec<RenderOffset> {
    render
        .lines
        .iter()
        .enumerate()
        .flat_map(|(line, l)| (0..=l.visible_len()).map(move |index| RenderOffset::new(line, index)))
        .collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1-2. Round trips
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn point_offset_point_identity((text, width, anchor, cont) in scene_strategy()) {
        let render = RenderData::from_text(&text, width, cont);
        for offset in all_offsets(&render) {
            let point = offset_to_point(anchor, width, &render, offset).unwrap();
            let back = point_to_offset(anchor, &render, point);
            prop_assert!(back.is_ok(), "{:?} -> {:?} not mappable: {:?}", offset, point, back);
            let again = offset_to_point(anchor, width, &render, back.unwrap()).unwrap();
            prop_assert_eq!(again, point, "text={:?} width={} offset={:?}", text, width, offset);
        }
    }

    #[test]
    fn offset_point_offset_identity((text, width, anchor, cont) in scene_strategy()) {
        let render = RenderData::from_text(&text, width, cont);
        for offset in all_offsets(&render) {
            let point = offset_to_point(anchor, width, &render, offset).unwrap();
            let back = point_to_offset(anchor, &render, point).unwrap();
            if back != offset {
                // Only a flush end followed by a column-0 line start may collide.
                prop_assert_eq!(cont, 0);
                prop_assert_eq!(back, RenderOffset::new(offset.line + 1, 0));
                prop_assert_eq!(point.x, 0);
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3-4. Row counting
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn rows_non_decreasing(len in 0usize..500, width in 1usize..80, x in 0usize..80) {
        let (a, _) = physical_line_count_len(len, width, x).unwrap();
        let (b, _) = physical_line_count_len(len + 1, width, x).unwrap();
        prop_assert!(b >= a);
        prop_assert!(b <= a + 1);
    }

    #[test]
    fn last_row_length_in_range(len in 1usize..500, width in 1usize..80, x in 0usize..80) {
        let (rows, last) = physical_line_count_len(len, width, x).unwrap();
        prop_assert!(last >= 1 && last <= width, "last={} width={}", last, width);
        prop_assert_eq!((rows - 1) * width + last, x + len);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Total rows
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn total_rows_sum((text, width, anchor, cont) in scene_strategy()) {
        let render = RenderData::from_text(&text, width, cont);
        let sum: usize = render
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                physical_line_count_len(line.visible_len(), width, render.initial_column(anchor, i))
                    .unwrap()
                    .0
            })
            .sum();
        prop_assert_eq!(render.total_rows(anchor, width).unwrap(), sum);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Resize round trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn resize_there_and_back(
        (text, width, anchor, cont) in scene_strategy(),
        other in 1usize..24,
        pick in any::<prop::sample::Index>(),
    ) {
        // Keep line starts off column 0 so no two offsets share a point. The
        // prompt may wrap at the other width.
        let prompt = PromptSpan::new(anchor.y, anchor.x);
        let cont = cont.max(1);
        let render = RenderData::from_text(&text, width, cont);
        let offsets = all_offsets(&render);
        let offset = offsets[pick.index(offsets.len())];
        let cursor = offset_to_point(anchor, width, &render, offset).unwrap();

        let there = remap_for_resize(prompt, &render.clone().with_cursor(cursor), other).unwrap();
        prop_assert_eq!(there.anchor, prompt.anchor(other).unwrap());
        let mut narrowed = render.clone().with_cursor(there.cursor);
        narrowed.buffer_width = other;
        let back = remap_for_resize(prompt, &narrowed, width).unwrap();

        prop_assert_eq!(back.anchor, anchor);
        prop_assert_eq!(back.cursor, cursor);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Degenerate widths
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn zero_width_is_an_error(len in 0usize..50, x in 0usize..10) {
        prop_assert_eq!(physical_line_count_len(len, 0, x), Err(GeometryError::ZeroWidth));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Boundary lengths around multiples of the width
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn boundary_lengths_with_initial_column() {
    let width = 10;
    for x in [0, 1, 4, 9] {
        for k in 1..4 {
            let fill = k * width - x;
            // Content ending flush with the edge.
            assert_eq!(physical_line_count_len(fill, width, x), Ok((k, width)));
            // One past.
            assert_eq!(physical_line_count_len(fill + 1, width, x), Ok((k + 1, 1)));
            // One short.
            assert_eq!(physical_line_count_len(fill - 1, width, x), Ok((k, width - 1)));
        }
    }
}

#[test]
fn exactly_filling_line_reports_one_full_row() {
    for width in 1..20 {
        for x in 0..width {
            assert_eq!(physical_line_count_len(width - x, width, x), Ok((1, width)));
        }
    }
}
