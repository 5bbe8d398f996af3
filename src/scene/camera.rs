//! Camera projection state and view-frustum extraction.

use glam::{Affine3A, Mat4, Vec3, Vec3A, Vec4};

use crate::scene::Aabb;

/// Per-frame snapshot of a [`Camera`], cheap to copy into the render scene.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RenderCamera {
    pub view_matrix: Mat4,
    pub projection_matrix: Mat4,
    pub view_projection_matrix: Mat4,
    pub position: Vec3A,
    pub frustum: Frustum,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    world_matrix: Affine3A,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    /// `fov` in degrees. Uses an infinite reverse-Z projection, matching the
    /// depth convention the rest of the crate assumes.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32) -> Self {
        let mut cam = Self {
            projection_type: ProjectionType::Perspective,
            fov: fov.to_radians(),
            aspect,
            near,
            far: f32::INFINITY,
            ortho_size: 10.0,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            projection_type: ProjectionType::Orthographic,
            fov: 0.0,
            aspect,
            near,
            far,
            ortho_size,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_infinite_reverse_rh(self.fov, self.aspect, self.near)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                // Reverse-Z: swap near/far in the depth range.
                Mat4::orthographic_rh(-w, w, -h, h, self.far, self.near)
            }
        };
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    #[must_use]
    pub fn extract_render_camera(&self) -> RenderCamera {
        RenderCamera {
            view_matrix: self.view_matrix,
            projection_matrix: self.projection_matrix,
            view_projection_matrix: self.view_projection_matrix,
            position: self.world_matrix.translation.into(),
            frustum: self.frustum,
            near: self.near,
            far: self.far,
        }
    }
}

/// Six-plane view frustum, extracted via Gribb-Hartmann from a combined
/// view-projection matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6],
    has_far: bool,
}

impl Frustum {
    /// Builds a frustum from a reverse-Z, infinite-far projection: the far
    /// plane is left disabled since it never culls anything.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] - rows[2], // near (reverse-Z: NDC z=1 at the near plane)
            Vec4::ZERO,        // far: disabled (infinite projection)
        ];
        normalize_planes(&mut planes, 5);
        Self { planes, has_far: false }
    }

    /// Builds a frustum from a standard (non reverse-Z, finite-far) matrix,
    /// as used by shadow-map orthographic projections.
    #[must_use]
    pub fn from_matrix_standard_z(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];
        normalize_planes(&mut planes, 6);
        Self { planes, has_far: true }
    }

    /// Like [`Self::from_matrix_standard_z`] but disables the near plane,
    /// for culling shadow casters that may sit between the light and its
    /// own near plane.
    #[must_use]
    pub fn from_matrix_shadow_caster(m: Mat4) -> Self {
        let mut frustum = Self::from_matrix_standard_z(m);
        frustum.planes[4] = Vec4::ZERO;
        frustum
    }

    fn active_plane_count(&self) -> usize {
        if self.has_far { 6 } else { 5 }
    }

    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        for plane in &self.planes[..self.active_plane_count()] {
            if plane.x == 0.0 && plane.y == 0.0 && plane.z == 0.0 {
                continue;
            }
            let dist = plane.x * center.x + plane.y * center.y + plane.z * center.z + plane.w;
            if dist < -radius {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn intersects_box(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes[..self.active_plane_count()] {
            if plane.x == 0.0 && plane.y == 0.0 && plane.z == 0.0 {
                continue;
            }
            let p = Vec3::new(
                if plane.x >= 0.0 { max.x } else { min.x },
                if plane.y >= 0.0 { max.y } else { min.y },
                if plane.z >= 0.0 { max.z } else { min.z },
            );
            let dist = plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w;
            if dist < 0.0 {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.intersects_box(aabb.min, aabb.max)
    }
}

fn normalize_planes(planes: &mut [Vec4; 6], count: usize) {
    for plane in planes.iter_mut().take(count) {
        let length = Vec3::new(plane.x, plane.y, plane.z).length();
        if length > 1e-6 {
            *plane /= length;
        } else {
            *plane = Vec4::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn perspective_reverse_z_near_maps_to_1() {
        let cam = Camera::new_perspective(60.0, 1.0, 0.1);
        let rc = cam.extract_render_camera();
        let near_point = rc.projection_matrix * glam::Vec4::new(0.0, 0.0, -0.1, 1.0);
        let ndc_z = near_point.z / near_point.w;
        assert!(approx(ndc_z, 1.0), "got {ndc_z}");
    }

    #[test]
    fn perspective_reverse_z_far_maps_to_0() {
        let cam = Camera::new_perspective(60.0, 1.0, 0.1);
        let rc = cam.extract_render_camera();
        let far_point = rc.projection_matrix * glam::Vec4::new(0.0, 0.0, -100_000.0, 1.0);
        let ndc_z = far_point.z / far_point.w;
        assert!(ndc_z.abs() < 0.01, "got {ndc_z}");
    }

    #[test]
    fn view_matrix_is_inverse_of_world() {
        let mut cam = Camera::new_perspective(60.0, 1.0, 0.1);
        let world = Affine3A::from_translation(Vec3::new(1.0, 2.0, 3.0));
        cam.update_view_projection(&world);
        let render_cam = cam.extract_render_camera();
        let product = Mat4::from(world) * render_cam.view_matrix;
        for i in 0..4 {
            for j in 0..4 {
                assert!(approx(product.col(i)[j], Mat4::IDENTITY.col(i)[j]));
            }
        }
    }

    fn make_test_frustum() -> Frustum {
        let proj = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
        Frustum::from_matrix(proj)
    }

    #[test]
    fn frustum_sphere_inside() {
        let frustum = make_test_frustum();
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
    }

    #[test]
    fn frustum_sphere_outside_left() {
        let frustum = make_test_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(-1000.0, 0.0, -5.0), 1.0));
    }

    #[test]
    fn frustum_sphere_outside_behind() {
        let frustum = make_test_frustum();
        assert!(!frustum.intersects_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn frustum_aabb_behind_camera() {
        let frustum = make_test_frustum();
        assert!(!frustum.intersects_box(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0)));
    }

    #[test]
    fn frustum_intersects_aabb_struct() {
        let frustum = make_test_frustum();
        let aabb = Aabb { min: Vec3::new(-0.5, -0.5, -6.0), max: Vec3::new(0.5, 0.5, -4.0) };
        assert!(frustum.intersects_aabb(&aabb));
    }

    #[test]
    fn shadow_caster_frustum_disables_near_plane() {
        let proj = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let frustum = Frustum::from_matrix_shadow_caster(proj * view);
        assert!(frustum.intersects_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
    }
}
