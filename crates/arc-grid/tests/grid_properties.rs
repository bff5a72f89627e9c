// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
use arc_grid::{hamming_distance, Grid, Symbol};
use proptest::prelude::*;

fn grid_strategy() -> impl Strategy<Value = Grid> {
    (1usize..8, 1usize..8)
        .prop_flat_map(|(h, w)| prop::collection::vec(prop::collection::vec(0u8..=9, w), h))
        .prop_map(|rows| Grid::from_values(&rows).unwrap())
}

proptest! {
    #[test]
    fn values_round_trip(g in grid_strategy()) {
        let back = Grid::from_values(&g.to_values()).unwrap();
        prop_assert_eq!(back, g);
    }

    #[test]
    fn distance_to_self_is_zero(g in grid_strategy()) {
        prop_assert!(hamming_distance(&g, &g).abs() < f64::EPSILON);
    }

    #[test]
    fn distance_is_symmetric(a in grid_strategy(), b in grid_strategy()) {
        let ab = hamming_distance(&a, &b);
        let ba = hamming_distance(&b, &a);
        if a.dimensions() == b.dimensions() {
            prop_assert!((ab - ba).abs() < f64::EPSILON);
            prop_assert!((0.0..=1.0).contains(&ab));
        } else {
            prop_assert!(ab.is_infinite() && ba.is_infinite());
        }
    }

    #[test]
    fn flood_fill_touches_only_origin_component(
        g in grid_strategy(),
        sx in 0usize..8,
        sy in 0usize..8,
        v in 0u8..=9,
    ) {
        let (x, y) = (sx % g.height(), sy % g.width());
        let origin = g.get(x, y).unwrap();
        let symbol = Symbol::new(v).unwrap();
        let filled = g.flood_fill(x, y, symbol).unwrap();

        for ((cx, cy), before) in g.iter() {
            let after = filled.get(cx, cy).unwrap();
            if after != before {
                // only cells of the origin symbol may change, and only to the new symbol
                prop_assert_eq!(before, origin);
                prop_assert_eq!(after, symbol);
            }
        }
        // every changed cell is 4-adjacent to another changed cell or is the origin
        if symbol != origin {
            prop_assert_eq!(filled.get(x, y), Some(symbol));
            for ((cx, cy), before) in g.iter() {
                if filled.get(cx, cy) != Some(before) && (cx, cy) != (x, y) {
                    let neighbours = [
                        cx.checked_sub(1).map(|nx| (nx, cy)),
                        Some((cx + 1, cy)),
                        cy.checked_sub(1).map(|ny| (cx, ny)),
                        Some((cx, cy + 1)),
                    ];
                    let linked = neighbours.iter().flatten().any(|&(nx, ny)| {
                        g.get(nx, ny) == Some(origin) && filled.get(nx, ny) == Some(symbol)
                    });
                    prop_assert!(linked);
                }
            }
        }
    }

    #[test]
    fn resize_preserves_overlap(g in grid_strategy(), h in 1usize..10, w in 1usize..10) {
        let resized = g.resize(h, w).unwrap();
        prop_assert_eq!(resized.dimensions(), (h, w));
        for ((x, y), s) in resized.iter() {
            match g.get(x, y) {
                Some(orig) => prop_assert_eq!(s, orig),
                None => prop_assert_eq!(s, Symbol::BLANK),
            }
        }
    }
}
