//! Example host for the software device: draws a textured cuboid and sphere
//! with Blinn-Phong lighting and writes the frame to `fb_color.bmp` /
//! `fb_depth.bmp`.

mod shaders;

use bytes::Bytes;
use glam::{Mat4, Vec3, Vec4};
use soft_device::{
    AddressMode, FilterMode, Pipeline, PipelineError, Sampler2d, Semantic, TexelFormat, Texture2d,
};
use soft_model::{Cuboid, MeshData, Sphere};
use tracing::info;

use crate::shaders::{BlinnPhongPs, SimpleVs};

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 768;

/// An RGB checkerboard standing in for the image assets of a real host.
fn checker_texture(size: u32, cells: u32) -> Texture2d {
    let mut data = Vec::with_capacity((size * size * 3) as usize);
    let cell = (size / cells).max(1);

    for y in 0..size {
        for x in 0..size {
            if ((x / cell) + (y / cell)) % 2 == 0 {
                data.extend([230, 230, 230]);
            } else {
                data.extend([40, 60, 150]);
            }
        }
    }

    Texture2d::new(TexelFormat::Rgb8Uint, size, size, Bytes::from(data))
}

fn bind_mesh(device: &mut Pipeline, mesh: &MeshData) {
    device.set_vertex_buffer_channel(Semantic::POSITION0, mesh.position_bytes(), 0, 12);
    device.set_vertex_buffer_channel(Semantic::NORMAL0, mesh.normal_bytes(), 0, 12);
    device.set_vertex_buffer_channel(Semantic::TEXCOORD0, mesh.texcoord_bytes(), 0, 8);
    device.set_vertex_buffer_length(mesh.num_vertices());
    device.set_index_buffer(mesh.index_bytes(), 0, 4, mesh.indices.len());
}

fn draw_at(
    device: &mut Pipeline,
    mesh: &MeshData,
    world: Mat4,
    view: Mat4,
    proj: Mat4,
) -> Result<(), PipelineError> {
    device.set_vs_constant("mWorldView", view * world)?;
    device.set_vs_constant("mWorldViewProj", proj * view * world)?;

    bind_mesh(device, mesh);
    device.draw_indexed()
}

fn run() -> Result<(), PipelineError> {
    let mut device = Pipeline::new();
    device.set_target_size(WIDTH, HEIGHT);
    device.set_vs_program(Box::new(SimpleVs))?;
    device.set_ps_program(Box::new(BlinnPhongPs))?;

    let view = Mat4::look_at_rh(Vec3::new(3.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_rh_gl(
        40.0f32.to_radians(),
        WIDTH as f32 / HEIGHT as f32,
        1.1,
        20.0,
    );

    // Light in view space.
    let light_pos = view * Vec4::new(8.0, 8.0, 5.0, 1.0);
    device.set_ps_constant("cLightPos", light_pos.truncate())?;
    device.set_ps_constant("cLightAmbient", Vec3::splat(0.2))?;
    device.set_ps_constant("cLightDiffuse", Vec3::ONE)?;
    device.set_ps_constant("cLightSpecular", Vec3::ONE)?;
    device.set_ps_constant("cLightPower", 100.0f32)?;
    device.set_ps_constant("cLightShininess", 4.0f32)?;
    device.set_ps_texture("cTexture0", checker_texture(256, 8))?;
    device.set_ps_sampler(
        "cSampler0",
        Sampler2d {
            filter: FilterMode::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
        },
    )?;

    let cuboid = MeshData::from(Cuboid::new(1.0, 1.0, 1.0));
    draw_at(
        &mut device,
        &cuboid,
        Mat4::from_translation(Vec3::new(-1.0, 0.0, 0.0)),
        view,
        proj,
    )?;

    let sphere = MeshData::from(Sphere::default());
    draw_at(
        &mut device,
        &sphere,
        Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)),
        view,
        proj,
    )?;

    device.present()?;

    let metrics = device.metrics();
    info!(
        vertices = metrics.vertex_shader.consumed,
        pixels = metrics.pixel_shader.produced,
        written = metrics.output_merger.consumed,
        "frame complete"
    );

    Ok(())
}

fn main() {
    tracing_subscriber::fmt().init();

    if let Err(err) = run() {
        eprintln!("draw failed: {err}");
        std::process::exit(1);
    }
}
