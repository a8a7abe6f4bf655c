//! Direct illuminance backend
//!
//! Deterministic point-source evaluation: each luminaire contributes
//! `I / d^2 * cos(theta)` at a sample, with intensity derived from the
//! asset's rated lumens and the instance's flux multiplier and maintenance
//! factor. Occlusion is an optional BVH `any_hit` test per sample/luminaire
//! pair. Reduction is Kahan summation over luminaires sorted by id, so the
//! result is bitwise reproducible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::DVec3;

use crate::core::error::{LuxeraError, Result};
use crate::geometry::bvh::{Bvh, Triangle};
use crate::geometry::polygon::Point3;
use crate::project::schema::{LuminaireInstance, PhotometryAsset, Project};

/// Cooperative cancellation for long-running jobs.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// One emitter resolved against its asset.
struct Emitter {
    position: DVec3,
    /// Isotropic intensity in candela: lumens * multipliers / 4π.
    intensity: f64,
}

fn resolve_emitters(project: &Project) -> Result<Vec<Emitter>> {
    let mut lums: Vec<&LuminaireInstance> = project.luminaires.iter().collect();
    lums.sort_by(|a, b| a.id.cmp(&b.id));
    let mut out = Vec::with_capacity(lums.len());
    for lum in lums {
        let asset: &PhotometryAsset =
            project.asset(&lum.photometry_asset_id).ok_or_else(|| {
                LuxeraError::runner(format!(
                    "luminaire {} references missing asset {}",
                    lum.id, lum.photometry_asset_id
                ))
            })?;
        let lumens = asset.lumens();
        if lumens <= 0.0 {
            return Err(LuxeraError::runner(format!(
                "asset {} has no valid photometric data (lumens missing)",
                asset.id
            )));
        }
        let flux = lumens * lum.flux_multiplier * lum.maintenance_factor;
        let (x, y, z) = lum.transform.position;
        out.push(Emitter {
            position: DVec3::new(x, y, z),
            intensity: flux / (4.0 * std::f64::consts::PI),
        });
    }
    Ok(out)
}

/// Build occluder triangles from surfaces and obstructions by fanning each
/// vertex ring.
pub fn build_occluder_triangles(project: &Project) -> Vec<Triangle> {
    let mut tris = Vec::new();
    let mut rings: Vec<&Vec<Point3>> = Vec::new();
    let mut surfaces: Vec<_> = project.geometry.surfaces.iter().collect();
    surfaces.sort_by(|a, b| a.id.cmp(&b.id));
    for s in &surfaces {
        rings.push(&s.vertices);
    }
    let mut obstructions: Vec<_> = project.geometry.obstructions.iter().collect();
    obstructions.sort_by(|a, b| a.id.cmp(&b.id));
    for o in &obstructions {
        rings.push(&o.vertices);
    }
    for ring in rings {
        if ring.len() < 3 {
            continue;
        }
        for k in 1..ring.len() - 1 {
            tris.push(Triangle::new(ring[0], ring[k], ring[k + 1]));
        }
    }
    tris
}

/// Evaluate illuminance at sample points with the given surface normal.
///
/// `occluders` enables shadowing; cancellation is checked between samples and
/// aborts without partial output.
pub fn evaluate_illuminance(
    project: &Project,
    samples: &[Point3],
    normal: Point3,
    occluders: Option<&Bvh>,
    cancel: &CancellationToken,
) -> Result<Vec<f64>> {
    let emitters = resolve_emitters(project)?;
    let n = DVec3::new(normal.0, normal.1, normal.2).normalize_or_zero();
    let mut out = Vec::with_capacity(samples.len());
    for sample in samples {
        if cancel.is_cancelled() {
            return Err(LuxeraError::Cancelled {
                job_id: String::new(),
            });
        }
        let p = DVec3::new(sample.0, sample.1, sample.2);
        // Kahan summation in fixed emitter order.
        let mut sum = 0.0f64;
        let mut comp = 0.0f64;
        for emitter in &emitters {
            let d = emitter.position - p;
            let dist2 = d.length_squared();
            if dist2 <= 1e-12 {
                continue;
            }
            let dist = dist2.sqrt();
            let dir = d / dist;
            let cos_theta = n.dot(dir);
            if cos_theta <= 0.0 {
                continue;
            }
            if let Some(bvh) = occluders {
                let origin = (p.x, p.y, p.z);
                let direction = (dir.x, dir.y, dir.z);
                if bvh.any_hit(origin, direction, 1e-4, dist - 1e-4) {
                    continue;
                }
            }
            let e = emitter.intensity / dist2 * cos_theta;
            let y = e - comp;
            let t = sum + y;
            comp = (t - sum) - y;
            sum = t;
        }
        out.push(sum);
    }
    Ok(out)
}

/// Per-object statistics block.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStats {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// U0 = min / mean (0 when mean is 0).
    pub uniformity: f64,
    pub count: usize,
}

/// Statistics over sample values (empty input yields zeros).
pub fn object_stats(values: &[f64]) -> ObjectStats {
    if values.is_empty() {
        return ObjectStats {
            min: 0.0,
            mean: 0.0,
            max: 0.0,
            uniformity: 0.0,
            count: 0,
        };
    }
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut comp = 0.0f64;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        let y = v - comp;
        let t = sum + y;
        comp = (t - sum) - y;
        sum = t;
    }
    let mean = sum / values.len() as f64;
    ObjectStats {
        min,
        mean,
        max,
        uniformity: if mean > 0.0 { min / mean } else { 0.0 },
        count: values.len(),
    }
}
