use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use xrgs_protocol::xr::{Fovf, Posef, View};

/// Per-view camera data handed to the renderer. Layout matches the shader's
/// uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraConstants {
    pub proj: [f32; 16],
    pub view: [f32; 16],
    pub position: [f32; 4],
    pub viewport: [i32; 2],
    pub _pad: [i32; 2],
}

impl Default for CameraConstants {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl CameraConstants {
    pub fn from_view(view: &View, near_z: f32, far_z: f32, width: u32, height: u32) -> Self {
        let p = view.pose.position;
        Self {
            proj: projection_fov(&view.fov, near_z, far_z).to_cols_array(),
            view: view_matrix(&view.pose).to_cols_array(),
            position: [p.x, p.y, p.z, 1.0],
            viewport: [width as i32, height as i32],
            _pad: [0; 2],
        }
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::from_cols_array(&self.proj)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.view)
    }
}

/// Asymmetric projection for Vulkan clip space: Y points down and depth maps
/// to [0, 1].
pub fn projection_fov(fov: &Fovf, near_z: f32, far_z: f32) -> Mat4 {
    let tan_left = fov.angle_left.tan();
    let tan_right = fov.angle_right.tan();
    let tan_up = fov.angle_up.tan();
    let tan_down = fov.angle_down.tan();

    let tan_width = tan_right - tan_left;
    let tan_height = tan_down - tan_up;

    let mut m = [0.0f32; 16];
    m[0] = 2.0 / tan_width;
    m[5] = 2.0 / tan_height;
    m[8] = (tan_right + tan_left) / tan_width;
    m[9] = (tan_up + tan_down) / tan_height;
    m[10] = -far_z / (far_z - near_z);
    m[11] = -1.0;
    m[14] = -(far_z * near_z) / (far_z - near_z);
    Mat4::from_cols_array(&m)
}

/// World-to-eye transform for a located view pose.
pub fn view_matrix(pose: &Posef) -> Mat4 {
    let o = pose.orientation;
    let p = pose.position;
    let rotation = Quat::from_xyzw(o.x, o.y, o.z, o.w);
    let translation = Vec3::new(p.x, p.y, p.z);
    Mat4::from_rotation_translation(rotation, translation).inverse()
}

/// Camera constants for every view and every frame in flight. A slot is only
/// rewritten once its frame index comes around again, so two views never
/// share storage.
#[derive(Debug, Clone)]
pub struct CameraRing {
    slots: Vec<CameraConstants>,
    view_count: usize,
    frames_in_flight: usize,
}

impl CameraRing {
    pub fn new(view_count: usize, frames_in_flight: usize) -> Self {
        let view_count = view_count.max(1);
        let frames_in_flight = frames_in_flight.max(1);
        Self {
            slots: vec![CameraConstants::default(); view_count * frames_in_flight],
            view_count,
            frames_in_flight,
        }
    }

    pub fn view_count(&self) -> usize {
        self.view_count
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn index(&self, frame_index: u64, view: usize) -> Option<usize> {
        if view >= self.view_count {
            return None;
        }
        let slot = (frame_index % self.frames_in_flight as u64) as usize;
        Some(slot * self.view_count + view)
    }

    pub fn get(&self, frame_index: u64, view: usize) -> Option<&CameraConstants> {
        self.index(frame_index, view).map(|i| &self.slots[i])
    }

    /// Overwrite the slot for (`frame_index`, `view`) and return it.
    pub fn write(
        &mut self,
        frame_index: u64,
        view: usize,
        constants: CameraConstants,
    ) -> Option<&CameraConstants> {
        let i = self.index(frame_index, view)?;
        self.slots[i] = constants;
        Some(&self.slots[i])
    }
}
