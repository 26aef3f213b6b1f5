use geo::{ChamberlainDuquetteArea, LineString, Polygon};

use crate::types::Coordinate;

pub fn ring_to_polygon(ring: &[Coordinate]) -> Polygon<f64> {
    // Polygon::new closes the exterior ring if needed
    let exterior: LineString<f64> = ring.iter().map(|c| c.to_geo()).collect();
    Polygon::new(exterior, vec![])
}

/// Area of a footprint ring on the sphere, in square metres.
pub fn ring_area_m2(ring: &[Coordinate]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    ring_to_polygon(ring).chamberlain_duquette_unsigned_area()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(lat: f64, lon: f64, side_deg: f64) -> Vec<Coordinate> {
        vec![
            Coordinate::new(lat, lon),
            Coordinate::new(lat, lon + side_deg),
            Coordinate::new(lat + side_deg, lon + side_deg),
            Coordinate::new(lat + side_deg, lon),
        ]
    }

    #[test]
    fn small_square_at_the_equator() {
        // 0.001 deg is ~111.32 m on a 6378137 m sphere
        let area = ring_area_m2(&square(0.0, 0.0, 0.001));
        let expected = 111.319_49 * 111.319_49;
        assert!((area - expected).abs() / expected < 0.01, "area {area}");
    }

    #[test]
    fn explicit_closing_vertex_changes_nothing() {
        let open = square(51.5, -0.09, 0.0005);
        let mut closed = open.clone();
        closed.push(open[0]);
        assert!((ring_area_m2(&open) - ring_area_m2(&closed)).abs() < 1e-6);
    }

    #[test]
    fn rotation_of_the_start_vertex_keeps_the_area() {
        let ring = vec![
            Coordinate::new(48.8566, 2.3522),
            Coordinate::new(48.8566, 2.3532),
            Coordinate::new(48.8572, 2.3536),
            Coordinate::new(48.8575, 2.3525),
            Coordinate::new(48.8570, 2.3519),
        ];
        let reference = ring_area_m2(&ring);
        assert!(reference > 0.0);
        for shift in 1..ring.len() {
            let mut rotated = ring.clone();
            rotated.rotate_left(shift);
            let area = ring_area_m2(&rotated);
            assert!((area - reference).abs() < 1e-6 * reference, "shift {shift}");
        }
    }

    #[test]
    fn winding_order_does_not_matter() {
        let ring = square(10.0, 10.0, 0.001);
        let mut reversed = ring.clone();
        reversed.reverse();
        assert!((ring_area_m2(&ring) - ring_area_m2(&reversed)).abs() < 1e-6);
    }

    #[test]
    fn degenerate_rings_have_no_area() {
        assert_eq!(ring_area_m2(&[]), 0.0);
        assert_eq!(ring_area_m2(&[Coordinate::new(1.0, 1.0), Coordinate::new(1.0, 2.0)]), 0.0);
    }
}
