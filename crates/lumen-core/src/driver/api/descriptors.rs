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

//! Backend-agnostic resource descriptors.
//!
//! A descriptor states intent (dimensions, format, usage). Every descriptor can
//! `validate()` itself so impossible combinations are rejected before a backend
//! ever sees them.

use super::enums::*;
use super::flags::{AttributeFlags, TargetBufferFlags, TextureUsage};
use super::handle::TextureHandle;
use super::state::SamplerParams;
use crate::driver::error::ContractError;
use crate::driver::{
    MAX_VERTEX_ATTRIBUTE_COUNT, MAX_VERTEX_BUFFER_COUNT, SAMPLER_BINDING_COUNT,
    UNIFORM_BINDING_COUNT,
};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::fmt;

// --- Geometry ---

/// A 3D offset in texels. `z` is the layer for arrays and cubemaps, the slice for
/// 3D textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3D {
    /// X offset.
    pub x: u32,
    /// Y offset.
    pub y: u32,
    /// Z offset (layer or slice).
    pub z: u32,
}

/// A 3D extent in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3D {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
    /// Depth, layer count or slice count.
    pub depth: u32,
}

impl Extent3D {
    /// A single-layer 2D extent.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }
}

/// A sub-region of one mip level of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    /// Mip level.
    pub level: u8,
    /// Region origin.
    pub offset: Offset3D,
    /// Region size.
    pub extent: Extent3D,
}

impl TextureRegion {
    /// A 2D region of `level`, layer 0.
    pub const fn new_2d(level: u8, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            level,
            offset: Offset3D { x, y, z: 0 },
            extent: Extent3D::new_2d(width, height),
        }
    }

    /// The whole of `level` across every layer or slice.
    pub fn whole_level(descriptor: &TextureDescriptor, level: u8) -> Self {
        let (width, height, depth) = descriptor.level_extent(level);
        Self {
            level,
            offset: Offset3D::default(),
            extent: Extent3D {
                width,
                height,
                depth: depth.max(descriptor.layer_count()),
            },
        }
    }
}

// --- Textures ---

/// Describes a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Dimensionality.
    pub target: SamplerType,
    /// Number of mip levels, at least 1.
    pub levels: u8,
    /// Pixel format.
    pub format: TextureFormat,
    /// MSAA sample count.
    pub samples: u8,
    /// Width of level 0.
    pub width: u32,
    /// Height of level 0.
    pub height: u32,
    /// Depth of level 0 for 3D textures, layer count for arrays, 1 otherwise.
    pub depth: u32,
    /// How the texture will be used.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Largest mip level count for a `width x height` texture:
    /// `floor(log2(max(width, height))) + 1`.
    pub const fn max_level_count(width: u32, height: u32) -> u8 {
        let largest = if width > height { width } else { height };
        if largest == 0 {
            0
        } else {
            (u32::BITS - largest.leading_zeros()) as u8
        }
    }

    /// A 2D texture with default usage. `mipmapped` requests a full mip chain.
    pub fn texture_2d(format: TextureFormat, width: u32, height: u32, mipmapped: bool) -> Self {
        Self {
            target: SamplerType::Sampler2D,
            levels: if mipmapped {
                Self::max_level_count(width, height)
            } else {
                1
            },
            format,
            samples: 1,
            width,
            height,
            depth: 1,
            usage: TextureUsage::DEFAULT,
        }
    }

    /// A cubemap of `size x size` faces.
    pub fn cubemap(format: TextureFormat, size: u32, mipmapped: bool) -> Self {
        Self {
            target: SamplerType::SamplerCubemap,
            ..Self::texture_2d(format, size, size, mipmapped)
        }
    }

    /// A depth/stencil attachment.
    pub fn depth_attachment(format: TextureFormat, width: u32, height: u32) -> Self {
        let mut usage = TextureUsage::DEPTH_ATTACHMENT;
        if format.has_stencil() {
            usage |= TextureUsage::STENCIL_ATTACHMENT;
        }
        Self {
            usage,
            ..Self::texture_2d(format, width, height, false)
        }
    }

    /// Replaces the usage flags.
    pub fn with_usage(mut self, usage: TextureUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Number of array layers: 6 for cubemaps, `depth` for arrays, 1 otherwise.
    pub const fn layer_count(&self) -> u32 {
        match self.target {
            SamplerType::SamplerCubemap => 6,
            SamplerType::Sampler2DArray => self.depth,
            SamplerType::Sampler2D | SamplerType::Sampler3D => 1,
        }
    }

    /// Size of `level`; depth only shrinks for 3D textures.
    pub const fn level_extent(&self, level: u8) -> (u32, u32, u32) {
        let depth = match self.target {
            SamplerType::Sampler3D => shrink(self.depth, level),
            _ => 1,
        };
        (shrink(self.width, level), shrink(self.height, level), depth)
    }

    /// Byte size of one layer of `level`.
    pub const fn level_size(&self, level: u8) -> usize {
        let (width, height, depth) = self.level_extent(level);
        self.format.data_size(width, height, depth)
    }

    /// A texture with more than one level that is not pre-compressed has its mip
    /// chain generated from level 0 by `generateMipmaps`.
    pub const fn requires_mip_generation(&self) -> bool {
        self.levels > 1 && !self.format.is_compressed()
    }

    /// Rejects physically impossible combinations.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.width == 0 {
            return Err(ContractError::ZeroSized { what: "width" });
        }
        if self.height == 0 {
            return Err(ContractError::ZeroSized { what: "height" });
        }
        if self.depth == 0 {
            return Err(ContractError::ZeroSized { what: "depth" });
        }
        if self.usage.is_empty() {
            return Err(ContractError::ZeroSized { what: "usage" });
        }
        let max = Self::max_level_count(self.width, self.height);
        if self.levels == 0 || self.levels > max {
            return Err(ContractError::LevelCount {
                levels: self.levels,
                max,
                width: self.width,
                height: self.height,
            });
        }
        validate_sample_count(self.samples)?;
        if self.samples > 1 && (self.levels > 1 || self.target != SamplerType::Sampler2D) {
            return Err(ContractError::InvalidDescriptor(
                "multisampled textures must be single-level 2D textures".into(),
            ));
        }
        match self.target {
            SamplerType::SamplerCubemap if self.width != self.height => {
                return Err(ContractError::InvalidDescriptor(format!(
                    "cubemap faces must be square, got {}x{}",
                    self.width, self.height
                )));
            }
            SamplerType::Sampler2D | SamplerType::SamplerCubemap if self.depth != 1 => {
                return Err(ContractError::InvalidDescriptor(format!(
                    "{:?} textures have a depth of 1, got {}",
                    self.target, self.depth
                )));
            }
            _ => {}
        }

        let format = self.format;
        let incompatible = Err(ContractError::IncompatibleUsage {
            usage: self.usage,
            format,
        });
        let attachment = TextureUsage::COLOR_ATTACHMENT
            | TextureUsage::DEPTH_ATTACHMENT
            | TextureUsage::STENCIL_ATTACHMENT;
        if format.is_compressed() && self.usage.intersects(attachment) {
            return incompatible;
        }
        if self.usage.contains(TextureUsage::COLOR_ATTACHMENT) && format.is_depth_or_stencil() {
            return incompatible;
        }
        if self.usage.contains(TextureUsage::DEPTH_ATTACHMENT) && !format.is_depth() {
            return incompatible;
        }
        if self.usage.contains(TextureUsage::STENCIL_ATTACHMENT) && !format.has_stencil() {
            return incompatible;
        }
        if format.is_depth_or_stencil() && self.target == SamplerType::Sampler3D {
            return incompatible;
        }
        Ok(())
    }
}

const fn shrink(value: u32, level: u8) -> u32 {
    let shifted = value >> level;
    if shifted == 0 {
        1
    } else {
        shifted
    }
}

fn validate_sample_count(samples: u8) -> Result<(), ContractError> {
    match samples {
        1 | 2 | 4 | 8 | 16 => Ok(()),
        other => Err(ContractError::SampleCount(other)),
    }
}

// --- Buffers ---

/// One vertex attribute: where it lives and how it is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    /// Byte offset of the first element in its buffer.
    pub offset: u32,
    /// Byte distance between consecutive elements. Zero means tightly packed.
    pub stride: u8,
    /// Index of the native buffer holding the attribute, or [`Attribute::BUFFER_UNUSED`].
    pub buffer: u8,
    /// Element type.
    pub element_type: ElementType,
    /// Interpretation flags.
    pub flags: AttributeFlags,
}

impl Attribute {
    /// Buffer index marking an attribute slot as unused.
    pub const BUFFER_UNUSED: u8 = 0xFF;

    /// An unused attribute slot.
    pub const UNUSED: Self = Self {
        offset: 0,
        stride: 0,
        buffer: Self::BUFFER_UNUSED,
        element_type: ElementType::Float,
        flags: AttributeFlags::NONE,
    };

    /// An attribute of `element_type` at `offset` in `buffer`.
    pub const fn new(buffer: u8, element_type: ElementType, offset: u32, stride: u8) -> Self {
        Self {
            offset,
            stride,
            buffer,
            element_type,
            flags: AttributeFlags::NONE,
        }
    }

    /// Returns `true` unless the slot is unused.
    pub const fn is_used(&self) -> bool {
        self.buffer != Self::BUFFER_UNUSED
    }

    /// The effective stride: the declared one, or the element size when packed.
    pub const fn effective_stride(&self) -> u32 {
        if self.stride == 0 {
            self.element_type.size()
        } else {
            self.stride as u32
        }
    }
}

impl Default for Attribute {
    fn default() -> Self {
        Self::UNUSED
    }
}

/// Fixed-size attribute table of a vertex buffer.
pub type AttributeArray = [Attribute; MAX_VERTEX_ATTRIBUTE_COUNT];

/// Describes a vertex buffer made of `buffer_count` native buffers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferDescriptor {
    /// Number of native buffers.
    pub buffer_count: u8,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Attribute table. Unused slots have `buffer == BUFFER_UNUSED`.
    pub attributes: AttributeArray,
    /// Static or dynamic.
    pub usage: BufferUsage,
}

impl VertexBufferDescriptor {
    /// A descriptor with no attribute yet.
    pub fn new(buffer_count: u8, vertex_count: u32, usage: BufferUsage) -> Self {
        Self {
            buffer_count,
            vertex_count,
            attributes: [Attribute::UNUSED; MAX_VERTEX_ATTRIBUTE_COUNT],
            usage,
        }
    }

    /// Sets attribute slot `index`.
    pub fn with_attribute(mut self, index: usize, attribute: Attribute) -> Self {
        self.attributes[index] = attribute;
        self
    }

    /// Bitmask of the attribute slots in use.
    pub fn used_attributes(&self) -> u32 {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(_, attribute)| attribute.is_used())
            .fold(0, |mask, (index, _)| mask | (1 << index))
    }

    /// Byte size of native buffer `index`, derived from the attributes it holds.
    pub fn buffer_size(&self, index: u8) -> usize {
        if self.vertex_count == 0 {
            return 0;
        }
        self.attributes
            .iter()
            .filter(|attribute| attribute.buffer == index)
            .map(|attribute| {
                let stride = attribute.effective_stride() as usize;
                let vertices = self.vertex_count as usize;
                let interleaved = stride * vertices;
                let planar = attribute.offset as usize
                    + stride * (vertices - 1)
                    + attribute.element_type.size() as usize;
                interleaved.max(planar)
            })
            .max()
            .unwrap_or(0)
    }

    /// Whole vertices native buffer `index` holds when it is `bytes` long. The
    /// inverse of [`Self::buffer_size`].
    pub fn vertices_in(&self, index: u8, bytes: usize) -> u64 {
        self.attributes
            .iter()
            .filter(|attribute| attribute.buffer == index)
            .map(|attribute| {
                let stride = attribute.effective_stride().max(1) as usize;
                let first_end = attribute.offset as usize + attribute.element_type.size() as usize;
                let planar = match bytes.checked_sub(first_end) {
                    Some(rest) => rest / stride + 1,
                    None => 0,
                };
                planar.min(bytes / stride) as u64
            })
            .min()
            .unwrap_or(0)
    }

    /// Rejects empty buffers and attributes pointing past `buffer_count`.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.vertex_count == 0 {
            return Err(ContractError::ZeroSized {
                what: "vertex count",
            });
        }
        if self.buffer_count == 0 || self.buffer_count as usize > MAX_VERTEX_BUFFER_COUNT {
            return Err(ContractError::InvalidDescriptor(format!(
                "buffer count {} out of range 1..={MAX_VERTEX_BUFFER_COUNT}",
                self.buffer_count
            )));
        }
        for (index, attribute) in self.attributes.iter().enumerate() {
            if attribute.is_used() && attribute.buffer >= self.buffer_count {
                return Err(ContractError::InvalidDescriptor(format!(
                    "attribute {index} refers to buffer {} of {}",
                    attribute.buffer, self.buffer_count
                )));
            }
        }
        if let Some(empty) = (0..self.buffer_count).find(|&i| self.buffer_size(i) == 0) {
            return Err(ContractError::InvalidDescriptor(format!(
                "buffer {empty} holds no attribute"
            )));
        }
        Ok(())
    }
}

/// Describes an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferDescriptor {
    /// Index width.
    pub index_type: IndexType,
    /// Number of indices.
    pub index_count: u32,
    /// Static or dynamic.
    pub usage: BufferUsage,
}

impl IndexBufferDescriptor {
    /// Byte size of the buffer.
    pub const fn size(&self) -> usize {
        self.index_count as usize * self.index_type.size() as usize
    }

    /// Rejects empty buffers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.index_count == 0 {
            return Err(ContractError::ZeroSized {
                what: "index count",
            });
        }
        Ok(())
    }
}

/// Describes a uniform buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformBufferDescriptor {
    /// Byte size.
    pub size: usize,
    /// Static or dynamic.
    pub usage: BufferUsage,
}

impl UniformBufferDescriptor {
    /// Rejects empty buffers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.size == 0 {
            return Err(ContractError::ZeroSized {
                what: "uniform buffer size",
            });
        }
        Ok(())
    }
}

// --- CPU payloads ---

/// Called with the payload bytes once the GPU no longer needs them.
pub type ReleaseCallback = Box<dyn FnOnce(Vec<u8>) + Send>;

/// CPU bytes handed to the driver for an upload.
///
/// The optional callback receives the bytes back after the submission that
/// consumed them has retired.
pub struct BufferDescriptor {
    /// The payload.
    pub data: Vec<u8>,
    callback: Option<ReleaseCallback>,
}

impl BufferDescriptor {
    /// Wraps raw bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            callback: None,
        }
    }

    /// Copies a slice of plain-old-data values.
    pub fn from_slice<T: bytemuck::Pod>(values: &[T]) -> Self {
        Self::new(bytemuck::cast_slice(values).to_vec())
    }

    /// Attaches a release callback.
    pub fn with_release_callback(
        mut self,
        callback: impl FnOnce(Vec<u8>) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Splits into bytes and callback.
    pub fn into_parts(self) -> (Vec<u8>, Option<ReleaseCallback>) {
        (self.data, self.callback)
    }
}

impl fmt::Debug for BufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferDescriptor")
            .field("len", &self.data.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Pixel bytes for a texture upload or readback.
pub struct PixelBufferDescriptor {
    /// The pixels, rows tightly packed.
    pub data: Vec<u8>,
    /// The pixel format of `data`. Must match the texture format.
    pub format: TextureFormat,
    callback: Option<ReleaseCallback>,
}

impl PixelBufferDescriptor {
    /// Wraps pixel bytes of `format`.
    pub fn new(data: Vec<u8>, format: TextureFormat) -> Self {
        Self {
            data,
            format,
            callback: None,
        }
    }

    /// A zeroed destination for reading back `region` of a `format` texture.
    pub fn for_readback(format: TextureFormat, region: &TextureRegion) -> Self {
        let size = format.data_size(
            region.extent.width,
            region.extent.height,
            region.extent.depth,
        );
        Self::new(vec![0; size], format)
    }

    /// Attaches a release callback.
    pub fn with_release_callback(
        mut self,
        callback: impl FnOnce(Vec<u8>) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Splits into bytes and callback.
    pub fn into_parts(self) -> (Vec<u8>, Option<ReleaseCallback>) {
        (self.data, self.callback)
    }
}

impl fmt::Debug for PixelBufferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBufferDescriptor")
            .field("len", &self.data.len())
            .field("format", &self.format)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Byte offsets of the six faces inside a cubemap upload, in +X, -X, +Y, -Y, +Z, -Z
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceOffsets(pub [usize; 6]);

impl FaceOffsets {
    /// Faces stored back to back, `face_size` bytes each.
    pub const fn packed(face_size: usize) -> Self {
        Self([
            0,
            face_size,
            2 * face_size,
            3 * face_size,
            4 * face_size,
            5 * face_size,
        ])
    }
}

// --- Sampler groups ---

/// One texture/sampler pair inside a sampler group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerGroupEntry {
    /// The texture, or null for an empty slot.
    pub texture: TextureHandle,
    /// Sampling parameters.
    pub params: SamplerParams,
}

// --- Programs ---

/// Shader code for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShaderSource {
    /// WGSL text.
    Wgsl(String),
    /// Backend-specific bytecode (SPIR-V, DXBC, ...).
    Binary(Vec<u8>),
}

impl ShaderSource {
    /// Returns `true` when there is no code at all.
    pub fn is_empty(&self) -> bool {
        match self {
            ShaderSource::Wgsl(text) => text.trim().is_empty(),
            ShaderSource::Binary(bytes) => bytes.is_empty(),
        }
    }
}

/// Shader code plus its entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStageSource {
    /// The code.
    pub source: ShaderSource,
    /// Entry point name.
    pub entry_point: String,
}

impl ShaderStageSource {
    /// WGSL code with the given entry point.
    pub fn wgsl(source: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            source: ShaderSource::Wgsl(source.into()),
            entry_point: entry_point.into(),
        }
    }
}

/// A sampler a program declares inside a sampler group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplerSlot {
    /// Name in the shader.
    pub name: String,
    /// Index of the entry in the bound sampler group.
    pub binding: u8,
    /// Texture dimensionality the shader expects.
    pub target: SamplerType,
    /// `true` for depth-comparison samplers.
    pub shadow: bool,
}

/// The samplers a program reads from one sampler-group binding slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerGroupLayout {
    /// The samplers.
    pub samplers: Vec<SamplerSlot>,
}

/// Describes a program: two stages plus the binding interface they use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramDescriptor {
    /// Name used in diagnostics.
    pub name: String,
    /// Vertex stage.
    pub vertex: ShaderStageSource,
    /// Fragment stage.
    pub fragment: ShaderStageSource,
    /// Uniform block name per uniform binding slot.
    pub uniform_blocks: [Option<String>; UNIFORM_BINDING_COUNT],
    /// Sampler layout per sampler binding slot.
    pub sampler_groups: [Option<SamplerGroupLayout>; SAMPLER_BINDING_COUNT],
}

impl ProgramDescriptor {
    /// A program with no uniform block and no sampler.
    pub fn new(
        name: impl Into<String>,
        vertex: ShaderStageSource,
        fragment: ShaderStageSource,
    ) -> Self {
        Self {
            name: name.into(),
            vertex,
            fragment,
            uniform_blocks: Default::default(),
            sampler_groups: Default::default(),
        }
    }

    /// Declares the uniform block read from `slot`.
    pub fn with_uniform_block(mut self, slot: usize, name: impl Into<String>) -> Self {
        self.uniform_blocks[slot] = Some(name.into());
        self
    }

    /// Declares the samplers read from sampler group `slot`.
    pub fn with_sampler_group(mut self, slot: usize, layout: SamplerGroupLayout) -> Self {
        self.sampler_groups[slot] = Some(layout);
        self
    }

    /// Rejects empty stages and duplicate sampler bindings.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.vertex.source.is_empty() || self.fragment.source.is_empty() {
            return Err(ContractError::InvalidDescriptor(format!(
                "program '{}' has an empty shader stage",
                self.name
            )));
        }
        for (slot, layout) in self.sampler_groups.iter().enumerate() {
            let Some(layout) = layout else { continue };
            let mut seen = 0u64;
            for sampler in &layout.samplers {
                let bit = 1u64 << (sampler.binding % 64);
                if seen & bit != 0 {
                    return Err(ContractError::InvalidDescriptor(format!(
                        "program '{}' declares binding {} twice in sampler group {slot}",
                        self.name, sampler.binding
                    )));
                }
                seen |= bit;
            }
        }
        Ok(())
    }
}

// --- Render targets ---

/// One attachment of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TargetBufferInfo {
    /// The attached texture.
    pub handle: TextureHandle,
    /// Mip level rendered into.
    pub level: u8,
    /// Layer (or cubemap face) rendered into.
    pub layer: u16,
}

impl TargetBufferInfo {
    /// Level 0, layer 0 of `handle`.
    pub const fn new(handle: TextureHandle) -> Self {
        Self {
            handle,
            level: 0,
            layer: 0,
        }
    }
}

/// Describes an offscreen render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Attachments present.
    pub flags: TargetBufferFlags,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// MSAA sample count.
    pub samples: u8,
    /// Color attachment.
    pub color: TargetBufferInfo,
    /// Depth attachment.
    pub depth: TargetBufferInfo,
    /// Stencil attachment.
    pub stencil: TargetBufferInfo,
}

impl RenderTargetDescriptor {
    /// Rejects empty targets and missing attachment textures.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.width == 0 || self.height == 0 {
            return Err(ContractError::ZeroSized {
                what: "render target extent",
            });
        }
        if self.flags.is_empty() {
            return Err(ContractError::InvalidDescriptor(
                "render target has no attachment".into(),
            ));
        }
        validate_sample_count(self.samples)?;
        let attachments = [
            (TargetBufferFlags::COLOR, &self.color, "color"),
            (TargetBufferFlags::DEPTH, &self.depth, "depth"),
            (TargetBufferFlags::STENCIL, &self.stencil, "stencil"),
        ];
        for (flag, info, name) in attachments {
            if self.flags.contains(flag) && info.handle.is_null() {
                return Err(ContractError::InvalidDescriptor(format!(
                    "render target declares a {name} attachment without a texture"
                )));
            }
        }
        Ok(())
    }
}

// --- Render passes ---

/// Viewport rectangle, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge.
    pub left: i32,
    /// Bottom edge.
    pub bottom: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

impl Viewport {
    /// A viewport covering `width x height` from the origin.
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            bottom: 0,
            width,
            height,
        }
    }

    /// Converts to a top-left origin for a target of `target_height` pixels.
    pub const fn top_in(&self, target_height: u32) -> i32 {
        target_height as i32 - (self.bottom + self.height as i32)
    }
}

/// Buffers cleared or discarded at pass boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderPassFlags {
    /// Buffers cleared at the start of the pass.
    pub clear: TargetBufferFlags,
    /// Buffers whose previous contents are not needed.
    pub discard_start: TargetBufferFlags,
    /// Buffers whose contents are not needed after the pass.
    pub discard_end: TargetBufferFlags,
}

/// Parameters of `beginRenderPass`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassParams {
    /// Clear/discard flags.
    pub flags: RenderPassFlags,
    /// Viewport. A zero-sized viewport covers the whole target.
    pub viewport: Viewport,
    /// Color clear value.
    pub clear_color: [f32; 4],
    /// Depth clear value.
    pub clear_depth: f64,
    /// Stencil clear value.
    pub clear_stencil: u32,
}

impl Default for RenderPassParams {
    fn default() -> Self {
        Self {
            flags: RenderPassFlags::default(),
            viewport: Viewport::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

// --- Swap chains ---

/// The surface a swap chain presents to.
#[derive(Debug, Clone, Copy)]
pub enum NativeWindow {
    /// A platform window.
    Raw {
        /// The window.
        window: RawWindowHandle,
        /// The display connection.
        display: RawDisplayHandle,
        /// Initial width in pixels.
        width: u32,
        /// Initial height in pixels.
        height: u32,
    },
    /// No window: an offscreen back buffer of the given size.
    Offscreen {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl NativeWindow {
    /// Wraps raw platform handles.
    ///
    /// # Safety
    /// The window and display must stay valid until the swap chain created from
    /// them is destroyed.
    pub unsafe fn from_raw(
        window: RawWindowHandle,
        display: RawDisplayHandle,
        width: u32,
        height: u32,
    ) -> Self {
        Self::Raw {
            window,
            display,
            width,
            height,
        }
    }

    /// Initial extent of the surface.
    pub const fn extent(&self) -> (u32, u32) {
        match *self {
            NativeWindow::Raw { width, height, .. } | NativeWindow::Offscreen { width, height } => {
                (width, height)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_count() {
        assert_eq!(TextureDescriptor::max_level_count(300, 130), 9);
        assert_eq!(TextureDescriptor::max_level_count(256, 256), 9);
        assert_eq!(TextureDescriptor::max_level_count(1, 1), 1);

        let mipmapped = TextureDescriptor::texture_2d(TextureFormat::Rgba8, 300, 130, true);
        assert_eq!(mipmapped.levels, 9);
        assert!(mipmapped.requires_mip_generation());

        let single = TextureDescriptor::texture_2d(TextureFormat::Rgba8, 256, 256, false);
        assert_eq!(single.levels, 1);
        assert!(!single.requires_mip_generation());
    }

    #[test]
    fn test_level_extent_clamps_to_one() {
        let texture = TextureDescriptor::texture_2d(TextureFormat::Rgba8, 300, 130, true);
        assert_eq!(texture.level_extent(0), (300, 130, 1));
        assert_eq!(texture.level_extent(1), (150, 65, 1));
        assert_eq!(texture.level_extent(8), (1, 1, 1));
        assert_eq!(texture.level_size(1), 150 * 65 * 4);
    }

    #[test]
    fn test_cubemap_has_six_layers() {
        let cube = TextureDescriptor::cubemap(TextureFormat::Rgba16f, 64, true);
        assert_eq!(cube.layer_count(), 6);
        assert_eq!(cube.levels, 7);
        assert!(cube.validate().is_ok());
    }

    #[test]
    fn test_texture_validation_rejects_impossible_usage() {
        let depth_as_color = TextureDescriptor::texture_2d(TextureFormat::Depth24, 64, 64, false)
            .with_usage(TextureUsage::COLOR_ATTACHMENT);
        assert!(matches!(
            depth_as_color.validate(),
            Err(ContractError::IncompatibleUsage { .. })
        ));

        let stencil_without_stencil =
            TextureDescriptor::texture_2d(TextureFormat::Depth32f, 64, 64, false)
                .with_usage(TextureUsage::STENCIL_ATTACHMENT);
        assert!(stencil_without_stencil.validate().is_err());

        let compressed_target = TextureDescriptor::texture_2d(TextureFormat::Dxt1Rgb, 64, 64, false)
            .with_usage(TextureUsage::COLOR_ATTACHMENT);
        assert!(compressed_target.validate().is_err());

        let mut too_many_levels = TextureDescriptor::texture_2d(TextureFormat::Rgba8, 16, 16, true);
        too_many_levels.levels = 6;
        assert!(matches!(
            too_many_levels.validate(),
            Err(ContractError::LevelCount { max: 5, .. })
        ));

        let depth = TextureDescriptor::depth_attachment(TextureFormat::Depth24Stencil8, 64, 64);
        assert!(depth.validate().is_ok());
    }

    #[test]
    fn test_vertex_buffer_sizes() {
        let descriptor = VertexBufferDescriptor::new(1, 12, BufferUsage::Static)
            .with_attribute(0, Attribute::new(0, ElementType::Float3, 0, 32))
            .with_attribute(1, Attribute::new(0, ElementType::Float2, 12, 32));
        assert_eq!(descriptor.used_attributes(), 0b11);
        assert_eq!(descriptor.buffer_size(0), 12 * 32);
        assert!(descriptor.validate().is_ok());

        assert_eq!(descriptor.vertices_in(0, descriptor.buffer_size(0)), 12);
        assert_eq!(descriptor.vertices_in(0, 16 * 32), 16);
        assert_eq!(descriptor.vertices_in(0, 16 * 32 - 1), 15);

        // Planar: four positions followed by four UVs.
        let planar = VertexBufferDescriptor::new(1, 4, BufferUsage::Static)
            .with_attribute(0, Attribute::new(0, ElementType::Float3, 0, 0))
            .with_attribute(1, Attribute::new(0, ElementType::Float2, 48, 0));
        assert_eq!(planar.buffer_size(0), 80);
        assert_eq!(planar.vertices_in(0, 80), 4);
        assert_eq!(planar.vertices_in(0, 79), 3);
        assert_eq!(planar.vertices_in(1, 80), 0);

        let dangling = VertexBufferDescriptor::new(1, 4, BufferUsage::Static)
            .with_attribute(0, Attribute::new(1, ElementType::Float3, 0, 12));
        assert!(dangling.validate().is_err());
    }

    #[test]
    fn test_render_target_requires_attachment_textures() {
        let descriptor = RenderTargetDescriptor {
            flags: TargetBufferFlags::COLOR | TargetBufferFlags::DEPTH,
            width: 128,
            height: 128,
            samples: 1,
            color: TargetBufferInfo::new(TextureHandle::from_raw(3)),
            depth: TargetBufferInfo::default(),
            stencil: TargetBufferInfo::default(),
        };
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_viewport_flip() {
        let viewport = Viewport {
            left: 0,
            bottom: 10,
            width: 100,
            height: 50,
        };
        assert_eq!(viewport.top_in(200), 140);
    }
}
