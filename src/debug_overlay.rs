// src/debug_overlay.rs

use std::cell::RefCell;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::geometry::Basis;

pub const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 0.5];
pub const RED: [f32; 4] = [1.0, 0.0, 0.0, 0.5];
pub const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 0.5];

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DebugVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl DebugVertex {
    pub fn new(position: Vec3, color: [f32; 4]) -> Self {
        Self {
            position: position.to_array(),
            color,
        }
    }
}

/// Diagnostic drawing hooks. Nothing drawn here feeds back into placement.
pub trait DebugOverlay {
    fn draw_line(&self, start: Vec3, end: Vec3, color: [f32; 4], duration: f32);

    fn draw_box(&self, mins: Vec3, maxs: Vec3, color: [f32; 4], duration: f32) {
        let corner = |i: usize| {
            Vec3::new(
                if i & 1 == 0 { mins.x } else { maxs.x },
                if i & 2 == 0 { mins.y } else { maxs.y },
                if i & 4 == 0 { mins.z } else { maxs.z },
            )
        };
        for i in 0..8 {
            for bit in [1, 2, 4] {
                if i & bit == 0 {
                    self.draw_line(corner(i), corner(i | bit), color, duration);
                }
            }
        }
    }

    /// Outline of a portal-sized rectangle lying in the plane of `basis`.
    fn draw_oriented_rect(&self, origin: Vec3, basis: &Basis, half_width: f32, half_height: f32, color: [f32; 4], duration: f32) {
        let right = basis.right * half_width;
        let up = basis.up * half_height;
        let corners = [origin - right + up, origin + right + up, origin + right - up, origin - right - up];
        for i in 0..4 {
            self.draw_line(corners[i], corners[(i + 1) % 4], color, duration);
        }
    }
}

pub struct NullOverlay;

impl DebugOverlay for NullOverlay {
    fn draw_line(&self, _start: Vec3, _end: Vec3, _color: [f32; 4], _duration: f32) {}
}

/// Collects line-list vertices, two per line, ready for upload as a vertex buffer.
#[derive(Default)]
pub struct RecordingOverlay {
    vertices: RefCell<Vec<DebugVertex>>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_count(&self) -> usize {
        self.vertices.borrow().len() / 2
    }

    pub fn vertices(&self) -> Vec<DebugVertex> {
        self.vertices.borrow().clone()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.vertices.borrow()).to_vec()
    }

    pub fn clear(&self) {
        self.vertices.borrow_mut().clear();
    }
}

impl DebugOverlay for RecordingOverlay {
    fn draw_line(&self, start: Vec3, end: Vec3, color: [f32; 4], _duration: f32) {
        let mut vertices = self.vertices.borrow_mut();
        vertices.push(DebugVertex::new(start, color));
        vertices.push(DebugVertex::new(end, color));
    }
}
