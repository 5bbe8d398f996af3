//! Per-frame render scene: collection from the external world, visibility
//! culling, and draw-order sorting.

pub mod camera;

pub use camera::{Camera, Frustum, ProjectionType, RenderCamera};

use glam::{Mat4, Vec3};

use crate::gpu::ResourceId;

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    #[must_use]
    pub fn transformed(&self, matrix: Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in corners {
            let p = matrix.transform_point3(corner);
            min = min.min(p);
            max = max.max(p);
        }
        Aabb { min, max }
    }
}

/// One renderable object, produced by [`CollectFromWorld`] and consumed by
/// the render pass library.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub world_matrix: Mat4,
    pub normal_matrix: Mat4,
    pub bounds: Aabb,
    pub mesh_id: ResourceId,
    pub material_ids: Vec<ResourceId>,
    pub entity_id: u64,
    pub sort_key: u64,
    pub visible: bool,
    pub casts_shadow: bool,
    pub receives_shadow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderLight {
    pub ty: LightType,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub inner_cone_angle: f32,
    pub outer_cone_angle: f32,
    pub casts_shadow: bool,
}

impl Default for RenderLight {
    fn default() -> Self {
        Self {
            ty: LightType::Directional,
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, 0.0, -1.0),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.785_4,
            casts_shadow: false,
        }
    }
}

/// View-dependent parameters handed to the render pass library each frame.
#[derive(Debug, Clone, Copy)]
pub struct ViewData {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view: Mat4,
    pub inverse_projection: Mat4,
    pub camera_position: Vec3,
    pub camera_forward: Vec3,
    pub near: f32,
    pub far: f32,
    pub fov: f32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub frame_number: u64,
    pub time: f32,
    pub delta_time: f32,
}

impl ViewData {
    #[must_use]
    pub fn from_camera(
        camera: &RenderCamera,
        viewport_width: u32,
        viewport_height: u32,
        frame_number: u64,
        time: f32,
        delta_time: f32,
    ) -> Self {
        let forward = -camera.view_matrix.row(2).truncate();
        Self {
            view: camera.view_matrix,
            projection: camera.projection_matrix,
            view_projection: camera.view_projection_matrix,
            inverse_view: camera.view_matrix.inverse(),
            inverse_projection: camera.projection_matrix.inverse(),
            camera_position: camera.position.into(),
            camera_forward: forward,
            near: camera.near,
            far: camera.far,
            fov: 0.0,
            viewport_width,
            viewport_height,
            frame_number,
            time,
            delta_time,
        }
    }
}

/// Opaque traversal boundary into the external world representation. The
/// render scene never depends on a concrete scene graph or ECS; callers
/// implement this to expose whatever entity/transform hierarchy they use.
pub trait WorldSource {
    /// Visits every renderable entity with its already-computed world
    /// transform and local bounds, invoking `visit` once per entity.
    fn visit_objects(&self, visit: &mut dyn FnMut(ObjectView<'_>));

    /// Visits every light in the world.
    fn visit_lights(&self, visit: &mut dyn FnMut(RenderLight));
}

/// A single entity's renderable state as exposed by [`WorldSource`].
pub struct ObjectView<'a> {
    pub world_matrix: Mat4,
    pub local_bounds: Aabb,
    pub mesh_id: ResourceId,
    pub material_ids: &'a [ResourceId],
    pub entity_id: u64,
    pub visible: bool,
    pub casts_shadow: bool,
    pub receives_shadow: bool,
}

/// Ordered snapshot of a frame's renderable objects and lights, collected
/// from the external world and culled/sorted per view.
#[derive(Debug, Clone, Default)]
pub struct RenderScene {
    objects: Vec<RenderObject>,
    lights: Vec<RenderLight>,
}

impl RenderScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.lights.clear();
    }

    pub fn add_object(&mut self, object: RenderObject) {
        self.objects.push(object);
    }

    pub fn add_light(&mut self, light: RenderLight) {
        self.lights.push(light);
    }

    /// Walks `world`, producing a [`RenderObject`] per visited entity
    /// (world matrix is already resolved by the caller's traversal) and
    /// harvesting lights. The world representation stays entirely opaque.
    pub fn collect_from_world(&mut self, world: &dyn WorldSource) {
        self.clear();
        world.visit_objects(&mut |view| {
            let bounds = view.local_bounds.transformed(view.world_matrix);
            let normal_matrix = view.world_matrix.inverse().transpose();
            let sort_key = view.material_ids.first().map_or(0, |id| id.0);
            self.objects.push(RenderObject {
                world_matrix: view.world_matrix,
                normal_matrix,
                bounds,
                mesh_id: view.mesh_id,
                material_ids: view.material_ids.to_vec(),
                entity_id: view.entity_id,
                sort_key,
                visible: view.visible,
                casts_shadow: view.casts_shadow,
                receives_shadow: view.receives_shadow,
            });
        });
        world.visit_lights(&mut |light| self.lights.push(light));
    }

    #[must_use]
    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    #[must_use]
    pub fn lights(&self) -> &[RenderLight] {
        &self.lights
    }

    /// View-frustum culls every visible object against `frustum`, returning
    /// the indices of objects whose world AABB overlaps it.
    #[must_use]
    pub fn cull_against_camera(&self, frustum: &Frustum) -> Vec<u32> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, obj)| obj.visible && frustum.intersects_aabb(&obj.bounds))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Sorts `indices` opaque-style: front-to-back by squared distance from
    /// `camera_pos` to the object's AABB centre (maximizing early-Z), tied
    /// by `sort_key`.
    pub fn sort_front_to_back(&self, indices: &mut [u32], camera_pos: Vec3) {
        indices.sort_by(|&a, &b| {
            let oa = &self.objects[a as usize];
            let ob = &self.objects[b as usize];
            let da = oa.bounds.center().distance_squared(camera_pos);
            let db = ob.bounds.center().distance_squared(camera_pos);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal).then(oa.sort_key.cmp(&ob.sort_key))
        });
    }

    /// Sorts `indices` transparent-style: back-to-front by squared distance
    /// from `camera_pos`, so far objects composite first.
    pub fn sort_back_to_front(&self, indices: &mut [u32], camera_pos: Vec3) {
        indices.sort_by(|&a, &b| {
            let oa = &self.objects[a as usize];
            let ob = &self.objects[b as usize];
            let da = oa.bounds.center().distance_squared(camera_pos);
            let db = ob.bounds.center().distance_squared(camera_pos);
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(bounds: Aabb, sort_key: u64) -> RenderObject {
        RenderObject {
            world_matrix: Mat4::IDENTITY,
            normal_matrix: Mat4::IDENTITY,
            bounds,
            mesh_id: ResourceId(0),
            material_ids: vec![],
            entity_id: 0,
            sort_key,
            visible: true,
            casts_shadow: true,
            receives_shadow: true,
        }
    }

    #[test]
    fn cull_against_camera_drops_invisible_objects() {
        let mut scene = RenderScene::new();
        let mut hidden = obj(Aabb { min: Vec3::new(-0.5, -0.5, -6.0), max: Vec3::new(0.5, 0.5, -4.0) }, 0);
        hidden.visible = false;
        scene.add_object(hidden);
        scene.add_object(obj(Aabb { min: Vec3::new(-0.5, -0.5, -6.0), max: Vec3::new(0.5, 0.5, -4.0) }, 0));

        let proj = Mat4::perspective_infinite_reverse_rh(60.0_f32.to_radians(), 1.0, 0.1);
        let frustum = Frustum::from_matrix(proj);
        let visible = scene.cull_against_camera(&frustum);
        assert_eq!(visible, vec![1]);
    }

    #[test]
    fn front_to_back_orders_by_distance_then_sort_key() {
        let mut scene = RenderScene::new();
        scene.add_object(obj(Aabb { min: Vec3::new(-0.1, -0.1, -10.1), max: Vec3::new(0.1, 0.1, -9.9) }, 5));
        scene.add_object(obj(Aabb { min: Vec3::new(-0.1, -0.1, -2.1), max: Vec3::new(0.1, 0.1, -1.9) }, 1));

        let mut indices = vec![0u32, 1];
        scene.sort_front_to_back(&mut indices, Vec3::ZERO);
        assert_eq!(indices, vec![1, 0]);
    }

    #[test]
    fn back_to_front_is_reverse_of_front_to_back() {
        let mut scene = RenderScene::new();
        scene.add_object(obj(Aabb { min: Vec3::new(-0.1, -0.1, -10.1), max: Vec3::new(0.1, 0.1, -9.9) }, 0));
        scene.add_object(obj(Aabb { min: Vec3::new(-0.1, -0.1, -2.1), max: Vec3::new(0.1, 0.1, -1.9) }, 0));

        let mut indices = vec![0u32, 1];
        scene.sort_back_to_front(&mut indices, Vec3::ZERO);
        assert_eq!(indices, vec![0, 1]);
    }
}
