//! Raster-to-vector conversion of binary masks
//!
//! Each 4-connected region of set cells becomes one polygon whose rings
//! follow cell edges. Rings are traced on the integer corner lattice and
//! mapped to map coordinates at the end, so shared corners match exactly.

use georisk_core::raster::GeoTransform;
use geo::{Coord, LineString, Polygon};
use ndarray::Array2;
use std::collections::{HashMap, VecDeque};

type Vertex = (i64, i64);

/// Directed cell edge on the corner lattice, (col, row) with rows growing down
#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> (i64, i64) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Label 4-connected regions of `mask` cells for which `is_set` holds.
///
/// Returns the label grid (0 = background, labels start at 1) and the
/// number of regions.
pub fn label_regions<T, F>(mask: &Array2<T>, is_set: F) -> (Array2<u32>, u32)
where
    F: Fn(&T) -> bool,
{
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut next = 0u32;
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if labels[[row, col]] != 0 || !is_set(&mask[[row, col]]) {
                continue;
            }
            next += 1;
            labels[[row, col]] = next;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                let neighbors = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbors {
                    if nr < rows && nc < cols && labels[[nr, nc]] == 0 && is_set(&mask[[nr, nc]]) {
                        labels[[nr, nc]] = next;
                        queue.push_back((nr, nc));
                    }
                }
            }
        }
    }

    (labels, next)
}

/// Vectorize the set cells of a binary mask into polygons in map coordinates.
///
/// One polygon per 4-connected region, in label order (row-major order of
/// each region's first cell). Holes become interior rings.
pub fn vectorize_mask(mask: &Array2<u8>, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    let (labels, count) = label_regions(mask, |v| *v == 1);
    if count == 0 {
        return Vec::new();
    }

    let edges = boundary_edges(&labels, count);
    edges
        .into_iter()
        .filter(|e| !e.is_empty())
        .filter_map(|e| {
            let rings = trace_rings(&e);
            build_polygon(rings, transform)
        })
        .collect()
}

/// Directed boundary edges per label, region on the right of travel
fn boundary_edges(labels: &Array2<u32>, count: u32) -> Vec<Vec<Edge>> {
    let (rows, cols) = labels.dim();
    let mut edges: Vec<Vec<Edge>> = vec![Vec::new(); count as usize];

    let label_at = |r: i64, c: i64| -> u32 {
        if r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 {
            0
        } else {
            labels[[r as usize, c as usize]]
        }
    };

    for row in 0..rows as i64 {
        for col in 0..cols as i64 {
            let label = label_at(row, col);
            if label == 0 {
                continue;
            }
            let out = &mut edges[label as usize - 1];
            if label_at(row - 1, col) != label {
                out.push(Edge { from: (col, row), to: (col + 1, row) });
            }
            if label_at(row, col + 1) != label {
                out.push(Edge { from: (col + 1, row), to: (col + 1, row + 1) });
            }
            if label_at(row + 1, col) != label {
                out.push(Edge { from: (col + 1, row + 1), to: (col, row + 1) });
            }
            if label_at(row, col - 1) != label {
                out.push(Edge { from: (col, row + 1), to: (col, row) });
            }
        }
    }

    edges
}

/// Chain edges into closed rings, turning right at shared corners so that
/// diagonally touching cells are never joined through a corner.
fn trace_rings(edges: &[Edge]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::with_capacity(edges.len());
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }

        let mut ring = vec![edges[start].from];
        let mut current = start;
        used[start] = true;

        for _ in 0..edges.len() {
            let edge = edges[current];
            let Some(next) = outgoing
                .get(&edge.to)
                .and_then(|candidates| pick_turn(edge, candidates, edges))
            else {
                break;
            };
            if next == start {
                break;
            }
            ring.push(edges[next].from);
            used[next] = true;
            current = next;
        }

        if ring.len() >= 4 {
            rings.push(simplify_ring(ring));
        }
    }

    rings
}

/// Preferred continuation: right turn, then straight, then left
fn pick_turn(incoming: Edge, candidates: &[usize], edges: &[Edge]) -> Option<usize> {
    let (dx, dy) = incoming.direction();
    candidates
        .iter()
        .copied()
        .filter(|&i| {
            let (ox, oy) = edges[i].direction();
            // Never reverse onto the same cell side
            !(ox == -dx && oy == -dy)
        })
        .max_by_key(|&i| {
            let (ox, oy) = edges[i].direction();
            // y grows downward, so a positive cross product is a right turn
            dx * oy - dy * ox
        })
}

/// Drop vertices where the ring continues in the same direction
fn simplify_ring(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    let kept: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let d1 = (cur.0 - prev.0, cur.1 - prev.1);
            let d2 = (next.0 - cur.0, next.1 - cur.1);
            d1.0 * d2.1 - d1.1 * d2.0 != 0
        })
        .map(|i| ring[i])
        .collect();
    if kept.len() >= 4 {
        kept
    } else {
        ring
    }
}

/// Twice the signed lattice area (positive for outer rings)
fn signed_area2(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

fn build_polygon(mut rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<Polygon<f64>> {
    if rings.is_empty() {
        return None;
    }

    let outer_idx = rings
        .iter()
        .enumerate()
        .max_by_key(|(_, r)| signed_area2(r).abs())
        .map(|(i, _)| i)?;
    let outer = rings.swap_remove(outer_idx);

    let to_line = |ring: &[Vertex]| -> LineString<f64> {
        let mut coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(c, r)| {
                let (x, y) = transform.pixel_corner(c, r);
                Coord { x, y }
            })
            .collect();
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        LineString::new(coords)
    };

    let interiors = rings.iter().map(|r| to_line(r)).collect();
    Some(Polygon::new(to_line(&outer), interiors))
}
