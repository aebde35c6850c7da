//! Surface charts: 2D parameterizations of the base's outward surface.
//!
//! Composition happens in chart space — footprints are 2D polygons, the
//! surface is filled around them, and feature shells grow along the chart's
//! outward direction. The flat chart is the card top face in (x, y); the
//! cylinder chart is the unrolled wall in (arc length, z). All features are
//! generated in chart space before mapping to world coordinates, which also
//! keeps cylinder features well conditioned near the seam.

use nalgebra::{Point3, Vector3};

const TWO_PI: f64 = std::f64::consts::TAU;

pub trait SurfaceChart {
    /// Chart coordinates of a world point on (or near) the surface
    fn uv_of(&self, world: &Point3<f64>) -> [f32; 2];

    /// World position of a chart point offset `h` along the outward
    /// direction (h > 0 leaves the solid, h < 0 sinks into it)
    fn to_world(&self, uv: [f32; 2], h: f64) -> Point3<f64>;

    /// Outward unit direction at a chart point
    fn outward(&self, uv: [f32; 2]) -> Vector3<f64>;

    /// Whether the chart mapping reverses orientation (CCW chart triangles
    /// map to inward-facing world triangles). True for mirrored cylinders.
    fn flips_orientation(&self) -> bool {
        false
    }
}

/// Card top face: (u, v) = (x, y), outward = +Z
#[derive(Debug, Clone, Copy)]
pub struct PlateChart {
    pub thickness: f64,
}

impl SurfaceChart for PlateChart {
    fn uv_of(&self, world: &Point3<f64>) -> [f32; 2] {
        [world.x as f32, world.y as f32]
    }

    fn to_world(&self, uv: [f32; 2], h: f64) -> Point3<f64> {
        Point3::new(uv[0] as f64, uv[1] as f64, self.thickness + h)
    }

    fn outward(&self, _uv: [f32; 2]) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

/// Unrolled cylinder wall: u = arc length from the wall seam, v = z.
///
/// The chart seam sits at `seam_rad` (mirrored plates measure angles the
/// other way, so the two plates register when flipped together). Content
/// placed by the extractor never crosses the seam.
#[derive(Debug, Clone, Copy)]
pub struct CylinderChart {
    pub radius: f64,
    pub seam_rad: f64,
    pub mirrored: bool,
}

impl CylinderChart {
    pub fn circumference(&self) -> f64 {
        TWO_PI * self.radius
    }

    fn theta_of_u(&self, u: f64) -> f64 {
        let d = u / self.radius;
        if self.mirrored {
            -(d + self.seam_rad)
        } else {
            d + self.seam_rad
        }
    }
}

impl SurfaceChart for CylinderChart {
    fn uv_of(&self, world: &Point3<f64>) -> [f32; 2] {
        let theta = world.y.atan2(world.x);
        let d = if self.mirrored {
            -theta - self.seam_rad
        } else {
            theta - self.seam_rad
        };
        let wrapped = d.rem_euclid(TWO_PI);
        [(wrapped * self.radius) as f32, world.z as f32]
    }

    fn to_world(&self, uv: [f32; 2], h: f64) -> Point3<f64> {
        let theta = self.theta_of_u(uv[0] as f64);
        let r = self.radius + h;
        Point3::new(r * theta.cos(), r * theta.sin(), uv[1] as f64)
    }

    fn outward(&self, uv: [f32; 2]) -> Vector3<f64> {
        let theta = self.theta_of_u(uv[0] as f64);
        Vector3::new(theta.cos(), theta.sin(), 0.0)
    }

    fn flips_orientation(&self) -> bool {
        self.mirrored
    }
}

/// Chart of either base kind; lets the planner and backends share code
#[derive(Debug, Clone, Copy)]
pub enum AnyChart {
    Plate(PlateChart),
    Cylinder(CylinderChart),
}

impl SurfaceChart for AnyChart {
    fn uv_of(&self, world: &Point3<f64>) -> [f32; 2] {
        match self {
            AnyChart::Plate(chart) => chart.uv_of(world),
            AnyChart::Cylinder(chart) => chart.uv_of(world),
        }
    }

    fn to_world(&self, uv: [f32; 2], h: f64) -> Point3<f64> {
        match self {
            AnyChart::Plate(chart) => chart.to_world(uv, h),
            AnyChart::Cylinder(chart) => chart.to_world(uv, h),
        }
    }

    fn outward(&self, uv: [f32; 2]) -> Vector3<f64> {
        match self {
            AnyChart::Plate(chart) => chart.outward(uv),
            AnyChart::Cylinder(chart) => chart.outward(uv),
        }
    }

    fn flips_orientation(&self) -> bool {
        match self {
            AnyChart::Plate(chart) => chart.flips_orientation(),
            AnyChart::Cylinder(chart) => chart.flips_orientation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plate_round_trips_points() {
        let chart = PlateChart { thickness: 2.0 };
        let world = chart.to_world([10.0, 20.0], 0.0);
        assert_eq!(world, Point3::new(10.0, 20.0, 2.0));
        assert_eq!(chart.uv_of(&world), [10.0, 20.0]);
        assert_eq!(chart.outward([0.0, 0.0]), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn cylinder_maps_u_to_arc() {
        let chart = CylinderChart {
            radius: 10.0,
            seam_rad: 0.0,
            mirrored: false,
        };
        let quarter = (chart.circumference() / 4.0) as f32;
        let world = chart.to_world([quarter, 5.0], 0.0);
        assert!((world.x - 0.0).abs() < 1e-6);
        assert!((world.y - 10.0).abs() < 1e-6);
        assert_eq!(world.z, 5.0);

        let uv = chart.uv_of(&world);
        assert!((uv[0] - quarter).abs() < 1e-3);
        assert_eq!(uv[1], 5.0);
    }

    #[test]
    fn cylinder_outward_is_radial() {
        let chart = CylinderChart {
            radius: 15.4,
            seam_rad: 0.3,
            mirrored: false,
        };
        let uv = [7.0_f32, 1.0];
        let outward = chart.outward(uv);
        let on = chart.to_world(uv, 0.0);
        let raised = chart.to_world(uv, 0.5);
        let delta = raised - on;
        assert!((delta.normalize() - outward).norm() < 1e-9);
        assert!((outward.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_h_sinks_into_the_wall() {
        let chart = CylinderChart {
            radius: 15.4,
            seam_rad: 0.0,
            mirrored: false,
        };
        let sunk = chart.to_world([3.0, 0.0], -0.8);
        let r = (sunk.x * sunk.x + sunk.y * sunk.y).sqrt();
        assert!((r - 14.6).abs() < 1e-9);
    }

    #[test]
    fn mirrored_chart_reverses_angle() {
        let plain = CylinderChart {
            radius: 10.0,
            seam_rad: 0.0,
            mirrored: false,
        };
        let mirrored = CylinderChart {
            radius: 10.0,
            seam_rad: 0.0,
            mirrored: true,
        };
        let a = plain.to_world([5.0, 1.0], 0.0);
        let b = mirrored.to_world([5.0, 1.0], 0.0);
        assert!((a.x - b.x).abs() < 1e-9);
        assert!((a.y + b.y).abs() < 1e-9);

        // uv_of inverts to_world on the mirrored chart too
        let uv = mirrored.uv_of(&b);
        assert!((uv[0] - 5.0).abs() < 1e-3);
    }
}
