//! WGSL kernel source.

use crate::TileSize;

/// RGBA8 to 8-bit luma.
///
/// Input is one packed `u32` per pixel (R in the low byte). Output packs four
/// luma bytes per `u32` word; neighbouring work-items share a word, so each
/// one ORs its byte into a zero-initialized atomic. The `{{TILE_X}}` and
/// `{{TILE_Y}}` placeholders are replaced with the work-group size at build
/// time.
pub const RGB_TO_GRAY: &str = r#"
@group(0) @binding(0) var<storage, read> input_image: array<u32>;
@group(0) @binding(1) var<storage, read_write> output_image: array<atomic<u32>>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;  // width, height, origin x, origin y

@compute @workgroup_size({{TILE_X}}, {{TILE_Y}})
fn rgb_to_gray(@builtin(global_invocation_id) id: vec3<u32>) {
    let x = id.x + dims.z;
    let y = id.y + dims.w;
    let width = dims.x;
    let height = dims.y;

    // Global size is rounded up to whole work-groups.
    if x >= width || y >= height { return; }

    let index = y * width + x;
    let pixel = input_image[index];

    let r = pixel & 0xffu;
    let g = (pixel >> 8u) & 0xffu;
    let b = (pixel >> 16u) & 0xffu;

    // floor(0.299 R + 0.587 G + 0.114 B), exact in integers
    let gray = (299u * r + 587u * g + 114u * b) / 1000u;

    let shift = (index & 3u) * 8u;
    atomicOr(&output_image[index >> 2u], gray << shift);
}
"#;

/// Substitutes the work-group size into a kernel template.
pub(crate) fn instantiate(source: &str, tile: TileSize) -> String {
    source
        .replace("{{TILE_X}}", &tile.x.to_string())
        .replace("{{TILE_Y}}", &tile.y.to_string())
}
