use std::cmp::Ordering;

use nalgebra::{Point2, Vector2};

pub struct Ray {
    origin: Point2<f64>,
    direction: Vector2<f64>,
}

impl Ray {
    pub fn from_origin_direction(origin: Point2<f64>, direction: Vector2<f64>) -> Self {
        Self { origin, direction }
    }

    pub fn from_origin_angle(origin: Point2<f64>, angle: f64) -> Self {
        Self::from_origin_direction(origin, Vector2::new(angle.cos(), angle.sin()))
    }
}

pub trait Intersect {
    /// Returns the intersection between the object and the `Ray` as a
    /// length `u` along the `direction` of the ray such that the
    /// intersection point can be described by `ray.origin + u*ray.direction`,
    /// or `None` if no intersection occurs.
    fn intersect(&self, ray: &Ray) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    p1: Point2<f64>,
    p2: Point2<f64>,
}

impl LineSegment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            p1: Point2::new(x1, y1),
            p2: Point2::new(x2, y2),
        }
    }
}

impl Intersect for LineSegment {
    fn intersect(&self, ray: &Ray) -> Option<f64> {
        let (x1, y1) = (self.p1.x, self.p1.y);
        let (x2, y2) = (self.p2.x, self.p2.y);

        let (x3, y3) = (ray.origin.x, ray.origin.y);
        let x4 = ray.origin.x + ray.direction.x;
        let y4 = ray.origin.y + ray.direction.y;

        let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);

        // make sure lines are not parallell
        if denom == 0.0 {
            return None;
        }

        let t = ((x1 - x3) * (y3 - y4) - (y1 - y3) * (x3 - x4)) / denom;
        let u = -((x1 - x2) * (y1 - y3) - (y1 - y2) * (x1 - x3)) / denom;

        if (0.0..=1.0).contains(&t) && u > 0.0 {
            return Some(u);
        }
        None
    }
}

/// The static environment seen by the simulated laser scanner.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    segments: Vec<LineSegment>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, segment: LineSegment) -> &mut Self {
        self.segments.push(segment);
        self
    }

    /// Adds the four walls of an axis aligned rectangle with its lower left corner at `origin`.
    pub fn add_rect(&mut self, origin: Point2<f64>, size: Vector2<f64>) -> &mut Self {
        let (x0, y0) = (origin.x, origin.y);
        let (x1, y1) = (origin.x + size.x, origin.y + size.y);

        self.add(LineSegment::new(x0, y0, x1, y0))
            .add(LineSegment::new(x1, y0, x1, y1))
            .add(LineSegment::new(x1, y1, x0, y1))
            .add(LineSegment::new(x0, y1, x0, y0))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Intersect for Scene {
    fn intersect(&self, ray: &Ray) -> Option<f64> {
        // keep lowest u value to only get closest intersection
        self.segments
            .iter()
            .filter_map(|o| o.intersect(ray))
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Less))
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn simple_intersection() {
        let ray = Ray::from_origin_direction(Point2::new(0.0, 0.0), Vector2::new(1.0, 1.0));
        let line = LineSegment::new(1.0, 2.0, 2.0, -2.0);

        let u = line.intersect(&ray).unwrap();
        let p = ray.origin + u * ray.direction;
        assert_relative_eq!(p.x, p.y);
        assert_relative_eq!(p.x, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn intersections_behind_the_origin_are_ignored() {
        let ray = Ray::from_origin_angle(Point2::new(0.0, 0.0), 0.0);
        assert!(LineSegment::new(-1.0, -1.0, -1.0, 1.0).intersect(&ray).is_none());
        assert!(LineSegment::new(1.0, 0.5, 1.0, 1.0).intersect(&ray).is_none());
        assert!(LineSegment::new(0.0, 1.0, 3.0, 1.0).intersect(&ray).is_none());
    }

    #[test]
    fn scene_reports_closest_intersection() {
        let ray = Ray::from_origin_angle(Point2::new(0.0, 0.0), 0.0);

        let mut scene = Scene::new();
        scene
            .add(LineSegment::new(2.0, 2.0, 2.0, -2.0))
            .add(LineSegment::new(1.0, 2.0, 2.0, -2.0));

        assert_relative_eq!(scene.intersect(&ray).unwrap(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn inside_a_rectangle_every_direction_hits() {
        let mut scene = Scene::new();
        scene.add_rect(Point2::new(-1.0, -2.0), Vector2::new(3.0, 4.0));
        assert_eq!(scene.len(), 4);

        for i in 0..16 {
            let angle = (i as f64 + 0.5) * std::f64::consts::PI / 8.0;
            let ray = Ray::from_origin_angle(Point2::new(0.0, 0.0), angle);
            assert!(scene.intersect(&ray).is_some(), "angle {angle}");
        }

        let up = Ray::from_origin_angle(Point2::new(0.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(scene.intersect(&up).unwrap(), 2.0, epsilon = 1e-12);
    }
}
