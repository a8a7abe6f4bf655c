//! Built-in project presets

use serde_json::json;

use crate::project::schema::{
    CalcGrid, JobSpec, LuminaireInstance, PhotometryAsset, Project, TransformSpec,
};

/// A small rectangular office: one room footprint, one luminaire over a
/// workplane grid, and a direct job ready to run. Used by the CLI demo path
/// and as a fixture seed.
pub fn rectangular_office(name: &str) -> Project {
    let mut project = Project::new(name);

    let mut asset = PhotometryAsset {
        id: "asset_demo".to_string(),
        format: "IES".to_string(),
        ..Default::default()
    };
    asset.metadata.insert("lumens".to_string(), json!(3600.0));
    asset
        .metadata
        .insert("manufacturer".to_string(), json!("Generic"));
    project.photometry_assets.push(asset);

    project.luminaires.push(LuminaireInstance {
        id: "lum_01".to_string(),
        name: "Panel".to_string(),
        photometry_asset_id: "asset_demo".to_string(),
        transform: TransformSpec {
            position: (3.0, 4.0, 2.8),
            ..Default::default()
        },
        maintenance_factor: 0.8,
        flux_multiplier: 1.0,
        ..Default::default()
    });

    let nx = 13;
    let ny = 17;
    let mut sample_points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            sample_points.push((i as f64 * 0.5, j as f64 * 0.5, 0.8));
        }
    }
    project.grids.push(CalcGrid {
        id: "grid_wp".to_string(),
        name: "Workplane".to_string(),
        origin: (0.0, 0.0),
        width: 6.0,
        height: 8.0,
        elevation: 0.8,
        nx,
        ny,
        sample_mask: vec![true; nx * ny],
        sample_points,
        ..Default::default()
    });

    project.jobs.push(JobSpec {
        id: "job_direct".to_string(),
        name: "Direct illuminance".to_string(),
        target_ids: vec!["grid_wp".to_string()],
        ..Default::default()
    });
    project
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_is_runnable_shape() {
        let p = rectangular_office("demo");
        assert_eq!(p.jobs.len(), 1);
        assert_eq!(p.grids[0].sample_points.len(), 13 * 17);
        assert_eq!(
            p.grids[0].sample_mask.iter().filter(|&&m| m).count(),
            p.grids[0].sample_points.len()
        );
    }

    #[test]
    fn test_preset_deterministic() {
        assert_eq!(
            rectangular_office("a").content_hash(),
            rectangular_office("a").content_hash()
        );
    }
}
