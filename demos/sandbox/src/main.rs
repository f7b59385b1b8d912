// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Sable Engine Sandbox
// Drives the renderer memory core against the headless device: uploads,
// per-frame uniform streaming, fragmentation, and recovery.

use anyhow::Result;
use sable_core::math::{Mat4, Vec3, Vec4};
use sable_core::renderer::api::{
    IndexFormat, UniformBlock, UniformFieldDesc, UniformLayout, UniformType,
};
use sable_data::residency::{
    MemoryConfig, MeshUpload, ModelUpload, PersistencePolicy, RendererMemoryManager,
    UniformBinding,
};
use sable_infra::graphics::HeadlessDevice;
use std::sync::Arc;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2];

fn material_block(base_color: Vec4) -> Result<UniformBlock> {
    let layout = UniformLayout::new(&[
        UniformFieldDesc::new("base_color", UniformType::Vec4),
        UniformFieldDesc::new("emissive", UniformType::Vec3),
        UniformFieldDesc::new("specular_power", UniformType::Float),
    ]);
    let mut block = UniformBlock::new(layout);
    block.set_vec4("base_color", base_color)?;
    block.set_vec3("emissive", Vec3::ZERO)?;
    block.set_float("specular_power", 16.0)?;
    Ok(block)
}

fn main() -> Result<()> {
    env_logger::init();

    let device = Arc::new(HeadlessDevice::new());
    let config = MemoryConfig {
        vertex_buffer_bytes: 64 << 10,
        index_buffer_bytes: 16 << 10,
        model_uniform_bytes: 16 << 10,
        per_frame_uniform_bytes: 4 << 10,
    };
    let mut manager = RendererMemoryManager::new(device.clone(), &config)?;

    // Upload a mesh and its material once; later frames just acquire them.
    let mesh = manager.add_mesh(
        "triangle",
        &MeshUpload::with_u16_indices(VERTICES, INDICES),
        PersistencePolicy::Cached,
    )?;

    let material = material_block(Vec4::new(1.0, 0.6, 0.1, 1.0))?;
    let model = manager.add_model(
        "triangle_mat",
        &ModelUpload {
            uniform_bytes: material.bytes(),
            binding: UniformBinding { group: 1, binding: 0 },
        },
        PersistencePolicy::Cached,
    )?;

    // Simulate a few frames of per-frame camera writes.
    for frame in 0u32..6 {
        manager.begin_frame();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0 - frame as f32 * 0.1));
        let offset = manager.write_per_frame_uniforms(bytemuck::cast_slice(&view.cols))?;

        let location = mesh.location()?;
        log::info!(
            "frame {}: drawing {} indices (vertices at {}, uniforms at {}, camera at {})",
            frame,
            location.index_count,
            location.vertex_offset,
            model.location()?.uniform_offset,
            offset
        );
    }

    // Fragment the vertex pool with throwaway chunks, then let the facade's
    // defragment-and-retry absorb an upload that no single free run fits.
    let mut held = Vec::new();
    for i in 0..6 {
        let chunk = vec![i as u8; 8 << 10];
        let handle = manager.add_mesh(
            &format!("debris_{i}"),
            &MeshUpload {
                vertex_bytes: &chunk,
                index_bytes: bytemuck::cast_slice(INDICES),
                index_format: IndexFormat::Uint16,
            },
            PersistencePolicy::Transient,
        )?;
        // Keep every other chunk; the dropped ones leave 8 KiB holes.
        if i % 2 == 1 {
            held.push(handle);
        }
    }
    let big = vec![0xAB; 24 << 10];
    manager.add_mesh(
        "streamed_terrain",
        &MeshUpload {
            vertex_bytes: &big,
            index_bytes: bytemuck::cast_slice(INDICES),
            index_format: IndexFormat::Uint16,
        },
        PersistencePolicy::Cached,
    )?;

    let stats = manager.stats();
    log::info!(
        "pools: vertex {}/{} bytes free, index {}/{}, uniforms {}/{}, per-frame high water {} of {}",
        stats.vertex_free,
        stats.vertex_capacity,
        stats.index_free,
        stats.index_capacity,
        stats.uniform_free,
        stats.uniform_capacity,
        stats.per_frame_high_water,
        stats.per_frame_capacity
    );
    log::info!(
        "residency: {} meshes ({} held), {} models ({} held)",
        stats.mesh_entries,
        stats.meshes_held,
        stats.model_entries,
        stats.models_held
    );

    manager.destroy();
    Ok(())
}
