//! Sample masking against obstacles and opening proximity

use crate::geometry::polygon::{point_in_polygon, Point2};

/// Keep-mask for points against blocking polygons (true = outside all).
pub fn mask_points_by_polygons(points: &[Point2], polygons: &[Vec<Point2>]) -> Vec<bool> {
    points
        .iter()
        .map(|p| {
            !polygons
                .iter()
                .any(|poly| poly.len() >= 3 && point_in_polygon(*p, poly))
        })
        .collect()
}

/// AND a base mask with the obstacle keep-mask.
pub fn apply_obstacle_masks(
    base_mask: &[bool],
    points: &[Point2],
    obstacle_polygons: &[Vec<Point2>],
) -> Vec<bool> {
    let keep = mask_points_by_polygons(points, obstacle_polygons);
    base_mask
        .iter()
        .enumerate()
        .map(|(i, &b)| b && keep.get(i).copied().unwrap_or(true))
        .collect()
}

/// Mask out samples within `margin` of any opening's bounding box.
pub fn apply_opening_proximity_mask(
    base_mask: &[bool],
    points: &[Point2],
    opening_polygons: &[Vec<Point2>],
    margin: f64,
) -> Vec<bool> {
    let m = margin.max(0.0);
    if m <= 0.0 || opening_polygons.is_empty() {
        return base_mask.to_vec();
    }
    let mut bboxes: Vec<(f64, f64, f64, f64)> = Vec::new();
    for poly in opening_polygons {
        if poly.len() < 2 {
            continue;
        }
        let x0 = poly.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x1 = poly.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y0 = poly.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let y1 = poly.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        bboxes.push((x0 - m, y0 - m, x1 + m, y1 + m));
    }
    if bboxes.is_empty() {
        return base_mask.to_vec();
    }
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut keep = base_mask.get(i).copied().unwrap_or(true);
            if keep {
                let (x, y) = *p;
                for &(x0, y0, x1, y1) in &bboxes {
                    if x0 <= x && x <= x1 && y0 <= y && y <= y1 {
                        keep = false;
                        break;
                    }
                }
            }
            keep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obstacle_mask() {
        let points = vec![(0.5, 0.5), (2.5, 0.5)];
        let obstacle = vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]];
        let base = vec![true, true];
        let out = apply_obstacle_masks(&base, &points, &obstacle);
        assert_eq!(out, vec![false, true]);
    }

    #[test]
    fn test_opening_proximity_mask() {
        let points = vec![(0.5, 0.5), (3.0, 3.0)];
        let opening = vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]];
        let base = vec![true, true];
        let out = apply_opening_proximity_mask(&base, &points, &opening, 0.2);
        assert_eq!(out, vec![false, true]);
    }

    #[test]
    fn test_zero_margin_is_noop() {
        let points = vec![(0.5, 0.5)];
        let opening = vec![vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]];
        let base = vec![true];
        let out = apply_opening_proximity_mask(&base, &points, &opening, 0.0);
        assert_eq!(out, vec![true]);
    }
}
