//! Outline extraction: turning point clouds and binary masks into clean
//! polygons.
//!
//! The pieces compose: [`mask_to_outline`] chains
//! [`largest_connected_component`], [`points_from_mask`], [`convex_hull`] and
//! [`simplify_rdp`]. [`concave_hull_knn`] follows dents a convex hull would
//! bridge, and [`offset_polygon`] grows or shrinks an outline for display.

use log::debug;

use crate::mask::BinaryMask;
use crate::types::{Point, Polygon};

const GEOM_EPS: f64 = 1e-12;

/// Smallest cosine between a vertex bisector and its edge normal before the
/// miter is clipped (about 75.5 degrees, a 4x spike).
const MITER_LIMIT_COS: f64 = 0.25;

/// Calculate the area of a polygon using the shoelace formula.
pub fn polygon_area(points: &[Point]) -> f64 {
    signed_area(points).abs()
}

/// Shoelace area, positive for counter-clockwise vertex order in the
/// points' own axes.
pub fn signed_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area / 2.0
}

/// Centres of the set cells of a grid.
pub fn points_from_mask(mask: &BinaryMask) -> Vec<Point> {
    mask.iter_set()
        .map(|(x, y)| Point::new(x as f64 + 0.5, y as f64 + 0.5))
        .collect()
}

/// Orientation of `c` relative to the directed line `a -> b`.
fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b - a).cross(&(c - a))
}

fn sorted_unique(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.iter().copied().filter(Point::is_finite).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    pts
}

/// Convex hull by Andrew's monotone chain, O(n log n).
///
/// Returns the hull counter-clockwise (in the points' own axes) without
/// collinear vertices. Inputs with fewer than three distinct points come back
/// deduplicated.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let pts = sorted_unique(points);
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && orient(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && orient(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) - GEOM_EPS
        && p.x <= a.x.max(b.x) + GEOM_EPS
        && p.y >= a.y.min(b.y) - GEOM_EPS
        && p.y <= a.y.max(b.y) + GEOM_EPS
}

/// Segment intersection including touching and collinear overlap.
fn segments_intersect(p1: Point, p2: Point, q1: Point, q2: Point) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);

    let opposite =
        |u: f64, v: f64| (u > GEOM_EPS && v < -GEOM_EPS) || (u < -GEOM_EPS && v > GEOM_EPS);
    if opposite(d1, d2) && opposite(d3, d4) {
        return true;
    }

    (d1.abs() <= GEOM_EPS && on_segment(q1, q2, p1))
        || (d2.abs() <= GEOM_EPS && on_segment(q1, q2, p2))
        || (d3.abs() <= GEOM_EPS && on_segment(p1, p2, q1))
        || (d4.abs() <= GEOM_EPS && on_segment(p1, p2, q2))
}

/// Inside test that counts points on the boundary as inside.
fn contains_point(polygon: &[Point], p: Point) -> bool {
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if orient(a, b, p).abs() <= GEOM_EPS && on_segment(a, b, p) {
            return true;
        }
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (polygon[i], polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Counter-clockwise angle from `from` to `to`, in (0, 2π].
fn ccw_angle(from: Point, to: Point) -> f64 {
    let a = from.cross(&to).atan2(from.dot(&to));
    if a <= 0.0 {
        a + std::f64::consts::TAU
    } else {
        a
    }
}

/// Concave hull by k-nearest-neighbour boundary tracing.
///
/// Starting from the lowest point, each step moves to the nearest unused
/// candidate with the sharpest right-hand turn whose new edge does not cross
/// the boundary traced so far. A trace that gets stuck, or that leaves points
/// outside, is retried with `k + 1`. After [`MAX_K_RETRIES`] retries, or once
/// `k` reaches the point count, the convex hull is returned instead.
pub fn concave_hull_knn(points: &[Point], k: usize) -> Vec<Point> {
    let pts = sorted_unique(points);
    if pts.len() < 4 {
        return convex_hull(&pts);
    }

    let start = k.max(3);
    let limit = k_limit(start, pts.len());
    for k in start..limit {
        if let Some(hull) = trace_knn(&pts, k) {
            return hull;
        }
    }
    debug!("concave hull trace failed for k in {start}..{limit}; using convex hull");
    convex_hull(&pts)
}

/// Retries of the concave trace before falling back to the convex hull.
/// Each trace is quadratic in the point count.
pub const MAX_K_RETRIES: usize = 32;

/// Exclusive upper bound on `k` for a trace over `n` points.
fn k_limit(start: usize, n: usize) -> usize {
    n.min(start + MAX_K_RETRIES)
}

fn trace_knn(pts: &[Point], k: usize) -> Option<Vec<Point>> {
    let first = (0..pts.len()).min_by(|&a, &b| {
        pts[a]
            .y
            .total_cmp(&pts[b].y)
            .then(pts[a].x.total_cmp(&pts[b].x))
    })?;

    let mut available = vec![true; pts.len()];
    available[first] = false;
    let mut hull = vec![first];
    let mut current = first;
    // Direction back toward the previous vertex; a virtual predecessor sits to the left.
    let mut back = Point::new(-1.0, 0.0);

    loop {
        if hull.len() == 4 {
            // Only allow closing once the boundary has some extent.
            available[first] = true;
        }

        let here = pts[current];
        let mut neighbours: Vec<(usize, f64)> = (0..pts.len())
            .filter(|&i| available[i])
            .map(|i| (i, here.distance(&pts[i])))
            .collect();
        if neighbours.is_empty() {
            break;
        }
        neighbours.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        neighbours.truncate(k);

        let mut candidates: Vec<(usize, f64, f64)> = neighbours
            .into_iter()
            .map(|(i, d)| (i, ccw_angle(back, pts[i] - here), d))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)));

        let next = candidates.iter().map(|c| c.0).find(|&c| {
            let closing = c == first;
            let edge_count = hull.len().saturating_sub(1);
            // The last edge ends at `current`; when closing, the first edge starts at `first`.
            (0..edge_count.saturating_sub(1))
                .filter(|&e| !(closing && e == 0))
                .all(|e| !segments_intersect(here, pts[c], pts[hull[e]], pts[hull[e + 1]]))
        })?;

        if next == first {
            break;
        }
        hull.push(next);
        available[next] = false;
        back = here - pts[next];
        current = next;
    }

    if hull.len() < 3 {
        return None;
    }

    let outline: Vec<Point> = hull.iter().map(|&i| pts[i]).collect();
    let all_inside = (0..pts.len())
        .filter(|i| !hull.contains(i))
        .all(|i| contains_point(&outline, pts[i]));
    all_inside.then_some(outline)
}

fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len < GEOM_EPS {
        return p.distance(&a);
    }
    (ab.cross(&(p - a))).abs() / len
}

/// Ramer–Douglas–Peucker simplification of an open polyline.
///
/// The first and last points are always kept unchanged.
pub fn simplify_rdp(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;

    let mut stack = vec![(0usize, points.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (mut worst, mut worst_dist) = (start, 0.0);
        for i in start + 1..end {
            let d = perpendicular_distance(points[i], points[start], points[end]);
            if d > worst_dist {
                worst = i;
                worst_dist = d;
            }
        }
        if worst_dist > epsilon {
            keep[worst] = true;
            stack.push((start, worst));
            stack.push((worst, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Keep only the largest 4-connected blob of a grid.
pub fn largest_connected_component(mask: &BinaryMask) -> BinaryMask {
    let (w, h) = (mask.width(), mask.height());
    let mut visited = vec![false; w * h];
    let mut best: Vec<usize> = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if visited[start] || !mask.as_slice()[start] {
            continue;
        }
        let mut component = Vec::new();
        visited[start] = true;
        stack.push(start);
        while let Some(i) = stack.pop() {
            component.push(i);
            let (x, y) = (i % w, i / w);
            let mut visit = |j: usize| {
                if !visited[j] && mask.as_slice()[j] {
                    visited[j] = true;
                    stack.push(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - w);
            }
            if y + 1 < h {
                visit(i + w);
            }
        }
        if component.len() > best.len() {
            best = component;
        }
    }

    let mut out = BinaryMask::empty(w, h);
    for i in best {
        out.set(i % w, i / w, true);
    }
    out
}

/// Stable outline of a noisy mask: largest blob, convex hull, then RDP.
///
/// Returns `None` when the mask has no blob spanning at least a triangle.
pub fn mask_to_outline(mask: &BinaryMask, epsilon: f64) -> Option<Polygon> {
    let blob = largest_connected_component(mask);
    let hull = convex_hull(&points_from_mask(&blob));
    if hull.len() < 3 {
        debug!("mask blob too small for an outline");
        return None;
    }

    // Simplify the closed ring as a polyline that returns to its start.
    let mut ring = hull.clone();
    ring.push(hull[0]);
    let mut simplified = simplify_rdp(&ring, epsilon);
    simplified.pop();

    let points = if simplified.len() >= 3 { simplified } else { hull };
    Some(Polygon::closed(points))
}

/// Move each vertex along the bisector of its adjacent edge normals.
///
/// Positive distances grow the polygon, negative ones shrink it. Sharp
/// corners are miter-limited so spikes stay bounded. Vertex count is
/// preserved; inputs with fewer than three vertices are returned unchanged.
pub fn offset_polygon(points: &[Point], distance: f64) -> Vec<Point> {
    let n = points.len();
    if n < 3 || distance == 0.0 || !distance.is_finite() {
        return points.to_vec();
    }

    let orientation = if signed_area(points) < 0.0 { -1.0 } else { 1.0 };
    let outward = |a: Point, b: Point| -> Option<Point> {
        let e = b - a;
        let len = e.norm();
        (len > GEOM_EPS).then(|| Point::new(e.y, -e.x) * (orientation / len))
    };

    (0..n)
        .map(|i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];

            let (n1, n2) = match (outward(prev, cur), outward(cur, next)) {
                (Some(a), Some(b)) => (a, b),
                (Some(a), None) => (a, a),
                (None, Some(b)) => (b, b),
                (None, None) => return cur,
            };

            let sum = n1 + n2;
            let bisector = if sum.norm() > GEOM_EPS { sum / sum.norm() } else { n1 };
            let cos_half = bisector.dot(&n1).max(MITER_LIMIT_COS);
            cur + bisector * (distance / cos_half)
        })
        .collect()
}

/// Chaikin corner cutting on an open polyline; endpoints are kept.
pub fn chaikin_smooth(points: &[Point], iterations: usize) -> Vec<Point> {
    let mut current = points.to_vec();
    for _ in 0..iterations {
        if current.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(current.len() * 2);
        next.push(current[0]);
        for pair in current.windows(2) {
            next.push(pair[0].lerp(&pair[1], 0.25));
            next.push(pair[0].lerp(&pair[1], 0.75));
        }
        next.push(current[current.len() - 1]);
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(size, 0.0),
            Point::new(size, size),
            Point::new(0.0, size),
        ]
    }

    /// 10x10 integer grid with a 7x4 notch cut from the right-hand side.
    fn c_shape() -> Vec<Point> {
        let mut pts = Vec::new();
        for y in 0..10 {
            for x in 0..10 {
                let notch = (3..=9).contains(&x) && (3..=6).contains(&y);
                if !notch {
                    pts.push(Point::new(x as f64, y as f64));
                }
            }
        }
        pts
    }

    #[test]
    fn test_polygon_area_triangle() {
        let triangle = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 3.0),
        ];
        assert!((polygon_area(&triangle) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_polygon_area_square() {
        assert!((polygon_area(&square(10.0)) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn convex_hull_drops_interior_and_collinear_points() {
        let mut pts = square(4.0);
        pts.push(Point::new(2.0, 2.0));
        pts.push(Point::new(2.0, 0.0));
        pts.push(Point::new(1.0, 1.0));

        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!((polygon_area(&hull) - 16.0).abs() < 1e-12);
        assert!(signed_area(&hull) > 0.0);
    }

    #[test]
    fn convex_hull_of_collinear_points_is_degenerate() {
        let pts: Vec<Point> = (0..5).map(|i| Point::new(i as f64, i as f64)).collect();
        let hull = convex_hull(&pts);
        assert!(hull.len() <= 2);
        assert_eq!(polygon_area(&hull), 0.0);
    }

    #[test]
    fn concave_hull_follows_the_notch() {
        let pts = c_shape();
        let convex = polygon_area(&convex_hull(&pts));
        let concave_hull = concave_hull_knn(&pts, 3);
        let concave = polygon_area(&concave_hull);

        assert!((convex - 81.0).abs() < 1e-9);
        assert!(concave < 0.9 * convex, "concave {concave} vs convex {convex}");
        assert!(concave > 0.0);
    }

    #[test]
    fn concave_hull_of_square_grid_matches_convex() {
        let pts: Vec<Point> = (0..25)
            .map(|i| Point::new((i % 5) as f64, (i / 5) as f64))
            .collect();
        let concave = polygon_area(&concave_hull_knn(&pts, 3));
        assert!((concave - 16.0).abs() < 1e-9);
    }

    #[test]
    fn concave_retries_are_bounded() {
        assert_eq!(k_limit(3, 10), 10);
        assert_eq!(k_limit(3, 10_000), 3 + MAX_K_RETRIES);
    }

    #[test]
    fn concave_hull_of_mask_sized_cloud() {
        let pts: Vec<Point> = (0..40)
            .flat_map(|y| (0..40).map(move |x| Point::new(x as f64, y as f64)))
            .collect();
        let hull = concave_hull_knn(&pts, 3);
        assert!(hull.len() >= 4);
        assert!(polygon_area(&hull) <= 39.0 * 39.0 + 1e-6);
    }

    #[test]
    fn concave_hull_small_inputs() {
        let tri = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        assert_eq!(concave_hull_knn(&tri, 3).len(), 3);
        assert!(concave_hull_knn(&[], 3).is_empty());
    }

    #[test]
    fn rdp_keeps_endpoints_and_reduces() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, -0.1),
            Point::new(3.0, 0.0),
        ];
        let simplified = simplify_rdp(&line, 0.2);

        assert!(simplified.len() < line.len());
        assert_eq!(simplified.first(), line.first());
        assert_eq!(simplified.last(), line.last());
    }

    #[test]
    fn rdp_keeps_real_corners() {
        let line = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, 5.0),
        ];
        assert_eq!(simplify_rdp(&line, 0.5), line);
    }

    #[test]
    fn largest_component_wins() {
        // A 2x2 blob on the left and a 3x3 blob on the right.
        let mask =
            BinaryMask::from_fn(10, 4, |x, y| (x < 2 && y < 2) || (x >= 6 && x < 9 && y < 3));
        let blob = largest_connected_component(&mask);

        assert_eq!(blob.area(), 9);
        assert!(!blob.get(0, 0));
        assert!(blob.get(7, 1));
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let mask = BinaryMask::from_fn(3, 3, |x, y| x == y);
        assert_eq!(largest_connected_component(&mask).area(), 1);
    }

    #[test]
    fn mask_outline_ignores_stray_pixels() {
        let mask = BinaryMask::from_fn(20, 20, |x, y| {
            ((4..12).contains(&x) && (4..12).contains(&y)) || (x == 18 && y == 18)
        });
        let outline = mask_to_outline(&mask, 0.5).unwrap();

        assert!(!outline.open);
        assert_eq!(outline.len(), 4);
        // Pixel centres span 4.5..11.5.
        assert!((polygon_area(&outline.points) - 49.0).abs() < 1e-9);
    }

    #[test]
    fn empty_mask_has_no_outline() {
        assert!(mask_to_outline(&BinaryMask::empty(5, 5), 0.5).is_none());
    }

    #[test]
    fn offset_square_grows_and_shrinks() {
        let sq = square(10.0);

        let grown = offset_polygon(&sq, 1.0);
        assert_eq!(grown.len(), 4);
        assert!((polygon_area(&grown) - 144.0).abs() < 1e-9);

        let shrunk = offset_polygon(&sq, -1.0);
        assert!((polygon_area(&shrunk) - 64.0).abs() < 1e-9);

        // Orientation does not change the meaning of the sign.
        let mut cw = sq.clone();
        cw.reverse();
        assert!((polygon_area(&offset_polygon(&cw, 1.0)) - 144.0).abs() < 1e-9);
    }

    #[test]
    fn offset_is_finite_with_repeated_vertices() {
        let mut pts = square(10.0);
        pts.insert(1, Point::new(0.0, 0.0));
        let out = offset_polygon(&pts, 2.0);

        assert_eq!(out.len(), pts.len());
        assert!(out.iter().all(Point::is_finite));
        let moved: f64 =
            out.iter().zip(&pts).map(|(a, b)| a.distance(b)).sum::<f64>() / pts.len() as f64;
        assert!(moved > 0.0);
        assert!(polygon_area(&out) > 0.0);
    }

    #[test]
    fn chaikin_keeps_endpoints_and_monotone_x() {
        let line: Vec<Point> = (0..5).map(|i| Point::new(i as f64, (i % 2) as f64)).collect();
        let smooth = chaikin_smooth(&line, 2);

        assert_eq!(smooth.first(), line.first());
        assert_eq!(smooth.last(), line.last());
        assert!(smooth.len() > line.len());
        assert!(smooth.windows(2).all(|w| w[1].x > w[0].x));
    }
}
