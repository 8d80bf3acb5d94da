//! The demo's shader programs: a world-view-projection vertex shader and a
//! Blinn-Phong pixel shader with a textured diffuse term.

use glam::{Mat4, Vec2, Vec3, Vec4};
use soft_device::texture::sample;
use soft_device::{ScalarType, Semantic, ShaderContext, ShaderProgram, ShaderSignature, ShaderSymbol};

// Vertex shader slots.
const VS_IN_POSITION: usize = 0;
const VS_IN_NORMAL: usize = 1;
const VS_IN_UV: usize = 2;
const VS_OUT_POS_CLIP: usize = 0;
const VS_OUT_POS_VIEW: usize = 1;
const VS_OUT_NORMAL: usize = 2;
const VS_OUT_UV: usize = 3;
const VS_WORLD_VIEW: usize = 0;
const VS_WORLD_VIEW_PROJ: usize = 1;

/// Transforms positions and normals into view space and emits the clip-space
/// position for the rasterizer.
pub struct SimpleVs;

impl ShaderProgram for SimpleVs {
    fn signature(&self) -> ShaderSignature {
        ShaderSignature {
            inputs: vec![
                ShaderSymbol::new("position", ScalarType::Float3, Semantic::POSITION0),
                ShaderSymbol::new("normal", ScalarType::Float3, Semantic::NORMAL0),
                ShaderSymbol::new("texcoord", ScalarType::Float2, Semantic::TEXCOORD0),
            ],
            outputs: vec![
                ShaderSymbol::new("posClip", ScalarType::Float4, Semantic::SV_POSITION),
                ShaderSymbol::new("posView", ScalarType::Float3, Semantic::POSITION0),
                ShaderSymbol::new("normal", ScalarType::Float3, Semantic::NORMAL0),
                ShaderSymbol::new("texcoord", ScalarType::Float2, Semantic::TEXCOORD0),
            ],
            constants: vec![
                ShaderSymbol::constant("mWorldView", ScalarType::Float4x4),
                ShaderSymbol::constant("mWorldViewProj", ScalarType::Float4x4),
            ],
        }
    }

    fn execute(&self, ctx: &mut ShaderContext) {
        let world_view: Mat4 = ctx.constant(VS_WORLD_VIEW);
        let world_view_proj: Mat4 = ctx.constant(VS_WORLD_VIEW_PROJ);

        let position = ctx.input::<Vec3>(VS_IN_POSITION).extend(1.0);
        let normal = ctx.input::<Vec3>(VS_IN_NORMAL).extend(0.0);
        let uv: Vec2 = ctx.input(VS_IN_UV);

        ctx.set_output(VS_OUT_POS_CLIP, world_view_proj * position);
        ctx.set_output(VS_OUT_POS_VIEW, (world_view * position).truncate());
        ctx.set_output(VS_OUT_NORMAL, (world_view * normal).truncate());
        ctx.set_output(VS_OUT_UV, uv);
    }
}

// Pixel shader slots.
const PS_IN_POS_CLIP: usize = 0;
const PS_IN_POS_VIEW: usize = 1;
const PS_IN_NORMAL: usize = 2;
const PS_IN_UV: usize = 3;
const PS_OUT_POSITION: usize = 0;
const PS_OUT_COLOR: usize = 1;
const PS_LIGHT_POS: usize = 0;
const PS_LIGHT_AMBIENT: usize = 1;
const PS_LIGHT_DIFFUSE: usize = 2;
const PS_LIGHT_SPECULAR: usize = 3;
const PS_LIGHT_POWER: usize = 4;
const PS_SHININESS: usize = 5;
const PS_TEXTURE0: usize = 6;
const PS_SAMPLER0: usize = 7;

/// Blinn-Phong shading in view space, with the diffuse term modulated by
/// `cTexture0` sampled at the interpolated texture coordinate.
pub struct BlinnPhongPs;

impl ShaderProgram for BlinnPhongPs {
    fn signature(&self) -> ShaderSignature {
        ShaderSignature {
            inputs: vec![
                ShaderSymbol::new("posClip", ScalarType::Float4, Semantic::SV_POSITION),
                ShaderSymbol::new("posView", ScalarType::Float3, Semantic::POSITION0),
                ShaderSymbol::new("normal", ScalarType::Float3, Semantic::NORMAL0),
                ShaderSymbol::new("texcoord", ScalarType::Float2, Semantic::TEXCOORD0),
            ],
            outputs: vec![
                ShaderSymbol::new("position", ScalarType::Float3, Semantic::SV_POSITION),
                ShaderSymbol::new("color", ScalarType::Float3, Semantic::SV_TARGET),
            ],
            constants: vec![
                ShaderSymbol::constant("cLightPos", ScalarType::Float3),
                ShaderSymbol::constant("cLightAmbient", ScalarType::Float3),
                ShaderSymbol::constant("cLightDiffuse", ScalarType::Float3),
                ShaderSymbol::constant("cLightSpecular", ScalarType::Float3),
                ShaderSymbol::constant("cLightPower", ScalarType::Float),
                ShaderSymbol::constant("cLightShininess", ScalarType::Float),
                ShaderSymbol::constant("cTexture0", ScalarType::Texture2D),
                ShaderSymbol::constant("cSampler0", ScalarType::Sampler2D),
            ],
        }
    }

    fn execute(&self, ctx: &mut ShaderContext) {
        let pos_clip: Vec4 = ctx.input(PS_IN_POS_CLIP);
        let pos_view: Vec3 = ctx.input(PS_IN_POS_VIEW);
        let uv: Vec2 = ctx.input(PS_IN_UV);

        let light_pos: Vec3 = ctx.constant(PS_LIGHT_POS);
        let ambient: Vec3 = ctx.constant(PS_LIGHT_AMBIENT);
        let diffuse: Vec3 = ctx.constant(PS_LIGHT_DIFFUSE);
        let specular: Vec3 = ctx.constant(PS_LIGHT_SPECULAR);
        let power: f32 = ctx.constant(PS_LIGHT_POWER);
        let shininess: f32 = ctx.constant(PS_SHININESS);

        let albedo = match (ctx.texture(PS_TEXTURE0), ctx.sampler(PS_SAMPLER0)) {
            (Some(texture), Some(sampler)) => sample(texture, sampler, uv).truncate(),
            _ => Vec3::ONE,
        };

        let normal = ctx.input::<Vec3>(PS_IN_NORMAL).normalize_or_zero();
        let to_light = light_pos - pos_view;
        let distance_sq = to_light.length_squared().max(1e-6);
        let light_dir = to_light.normalize_or_zero();

        let lambertian = light_dir.dot(normal).max(0.0);
        let mut spec = 0.0;
        if lambertian > 0.0 {
            let view_dir = (-pos_view).normalize_or_zero();
            let half_dir = (light_dir + view_dir).normalize_or_zero();
            spec = half_dir.dot(normal).max(0.0).powf(shininess);
        }

        let color = ambient
            + lambertian * diffuse * albedo * power / distance_sq
            + spec * specular * power / distance_sq;

        ctx.set_output(PS_OUT_POSITION, pos_clip.truncate());
        ctx.set_output(PS_OUT_COLOR, color);
    }
}
