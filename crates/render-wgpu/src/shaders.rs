//! WGSL programs. All share bind group 0: per-frame uniforms at binding 0
//! and per-draw uniforms (dynamic offset) at binding 1.

/// Lit, textured surface with albedo, normal and roughness maps.
pub const STANDARD_SHADER: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    ambient: vec4<f32>,
    sun_color: vec4<f32>,
    sun_dir: vec4<f32>,
};

struct Draw {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    tint: vec4<f32>,
    uv_repeat: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var<uniform> draw: Draw;

@group(1) @binding(0) var albedo_map: texture_2d<f32>;
@group(1) @binding(1) var normal_map: texture_2d<f32>;
@group(1) @binding(2) var roughness_map: texture_2d<f32>;
@group(1) @binding(3) var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = draw.model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.proj * frame.view * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = normalize((draw.normal_matrix * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.uv = vertex.uv * draw.uv_repeat.xy;
    return out;
}

// Tangent frame from screen-space derivatives; no tangent attribute needed.
fn perturb_normal(n: vec3<f32>, p: vec3<f32>, uv: vec2<f32>, mapped: vec3<f32>) -> vec3<f32> {
    let dp1 = dpdx(p);
    let dp2 = dpdy(p);
    let duv1 = dpdx(uv);
    let duv2 = dpdy(uv);

    let dp2perp = cross(dp2, n);
    let dp1perp = cross(n, dp1);
    let t = dp2perp * duv1.x + dp1perp * duv2.x;
    let b = dp2perp * duv1.y + dp1perp * duv2.y;
    let scale = inverseSqrt(max(max(dot(t, t), dot(b, b)), 1e-12));
    let tbn = mat3x3<f32>(t * scale, b * scale, n);
    return normalize(tbn * mapped);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(albedo_map, material_sampler, in.uv).rgb * draw.tint.rgb;
    let mapped = textureSample(normal_map, material_sampler, in.uv).xyz * 2.0 - 1.0;
    let roughness = textureSample(roughness_map, material_sampler, in.uv).g;

    let n = perturb_normal(normalize(in.world_normal), in.world_position, in.uv, mapped);
    let l = normalize(frame.sun_dir.xyz);
    let v = normalize(frame.camera_pos.xyz - in.world_position);
    let h = normalize(l + v);

    let diffuse = max(dot(n, l), 0.0);
    let shininess = mix(128.0, 2.0, roughness);
    let specular = pow(max(dot(n, h), 0.0), shininess) * (1.0 - roughness) * 0.5;

    let lit = albedo * (frame.ambient.rgb + frame.sun_color.rgb * diffuse)
        + frame.sun_color.rgb * specular;
    return vec4<f32>(lit, draw.tint.a);
}
"#;

/// Edge-weighted, noise-distorted overlay that refracts the previous
/// offscreen capture. Matches `camoscene_render::shading`.
pub const CAMOUFLAGE_SHADER: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    ambient: vec4<f32>,
    sun_color: vec4<f32>,
    sun_dir: vec4<f32>,
};

struct Draw {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    tint: vec4<f32>,
    uv_repeat: vec4<f32>,
};

struct Camouflage {
    base_color: vec4<f32>,
    direction: vec2<f32>,
    screen_size: vec2<f32>,
    time: f32,
    strength: f32,
    edge_falloff: f32,
    distortion: f32,
    scale: f32,
    speed: f32,
    ior: f32,
    _pad: f32,
};

@group(0) @binding(0) var<uniform> frame: Frame;
@group(0) @binding(1) var<uniform> draw: Draw;

@group(1) @binding(0) var<uniform> camo: Camouflage;
@group(1) @binding(1) var screen_texture: texture_2d<f32>;
@group(1) @binding(2) var screen_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) view_normal: vec3<f32>,
    @location(1) world_position: vec3<f32>,
    @location(2) view_position: vec3<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = draw.model * vec4<f32>(vertex.position, 1.0);
    let view_pos = frame.view * world_pos;
    let world_normal = (draw.normal_matrix * vec4<f32>(vertex.normal, 0.0)).xyz;

    var out: VertexOutput;
    out.clip_position = frame.proj * view_pos;
    out.view_normal = normalize((frame.view * vec4<f32>(world_normal, 0.0)).xyz);
    out.world_position = world_pos.xyz;
    out.view_position = view_pos.xyz;
    return out;
}

fn fade(t: vec2<f32>) -> vec2<f32> {
    return t * t * (3.0 - 2.0 * t);
}

fn grad(p: vec2<f32>, offset: vec2<f32>) -> f32 {
    return dot(offset, vec2<f32>(
        sin(dot(p, vec2<f32>(127.1, 311.7))),
        cos(dot(p, vec2<f32>(269.5, 183.3)))
    ));
}

fn perlin(p: vec2<f32>) -> f32 {
    let i = floor(p);
    let f = p - i;
    let u = fade(f);

    let a = grad(i, f);
    let b = grad(i + vec2<f32>(1.0, 0.0), f - vec2<f32>(1.0, 0.0));
    let c = grad(i + vec2<f32>(0.0, 1.0), f - vec2<f32>(0.0, 1.0));
    let d = grad(i + vec2<f32>(1.0, 1.0), f - vec2<f32>(1.0, 1.0));

    return mix(mix(a, b, u.x), mix(c, d, u.x), u.y);
}

fn fresnel(normal: vec3<f32>, view_dir: vec3<f32>, falloff: f32) -> f32 {
    return pow(1.0 - max(dot(normal, view_dir), 0.0), falloff);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let edge = fresnel(normalize(in.view_normal), normalize(-in.view_position), camo.edge_falloff);

    let offset = camo.direction * camo.time * camo.speed;
    let n = perlin(in.world_position.xy * camo.scale + offset);
    let d = n * 2.0 * camo.distortion;

    let amount = edge * camo.strength + d * camo.strength;

    let screen_uv = in.clip_position.xy / camo.screen_size + in.view_normal.xy * camo.ior;
    let scene_color = textureSample(screen_texture, screen_sampler, screen_uv);
    let camo_color = mix(vec3<f32>(0.0), camo.base_color.rgb, amount);

    return vec4<f32>(mix(scene_color.rgb, camo_color, amount), amount);
}
"#;

/// Equirectangular environment drawn behind the scene with one
/// full-screen triangle.
pub const SKY_SHADER: &str = r#"
struct Frame {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    ambient: vec4<f32>,
    sun_color: vec4<f32>,
    sun_dir: vec4<f32>,
};

@group(0) @binding(0) var<uniform> frame: Frame;

@group(1) @binding(0) var environment: texture_2d<f32>;
@group(1) @binding(1) var environment_sampler: sampler;

struct SkyOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
};

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> SkyOutput {
    let x = f32((index << 1u) & 2u) * 2.0 - 1.0;
    let y = f32(index & 2u) * 2.0 - 1.0;

    var out: SkyOutput;
    out.clip_position = vec4<f32>(x, y, 1.0, 1.0);
    out.ndc = vec2<f32>(x, y);
    return out;
}

const PI: f32 = 3.14159265;

@fragment
fn fs_sky(in: SkyOutput) -> @location(0) vec4<f32> {
    let far = frame.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w - frame.camera_pos.xyz);
    let uv = vec2<f32>(
        atan2(dir.z, dir.x) / (2.0 * PI) + 0.5,
        acos(clamp(dir.y, -1.0, 1.0)) / PI,
    );
    return vec4<f32>(textureSample(environment, environment_sampler, uv).rgb, 1.0);
}
"#;
