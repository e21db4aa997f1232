//! The recorded vocabulary: everything a frame can contain.
//!
//! Three layers, matching how the executor consumes them:
//! - [InitStep]: one-time object realization, run before any rendering of the
//!   frame that recorded it.
//! - [Step]: one unit of GPU work. Render passes own a command list; copies,
//!   blits and readbacks stand alone.
//! - [RenderCommand]: the smallest recorded unit, replayed strictly in order
//!   inside its render step.
//!
//! Payloads own their data (`Arc` handles, `Vec<u8>` uploads), so a recorded
//! frame can cross the thread boundary without borrowing from the submission
//! side.

use std::sync::Arc;

use glint::{
    resources::{Buffer, Framebuffer, InputLayout, Program, Shader, Texture, UniformSlot},
    state::{
        AspectMask, BlendEq, BlendFactor, BufferUsage, CompareFunc, CullFace, DataFormat,
        FrontFace, IndexType, LogicOp, Primitive, Rect2D, StencilOp, TexFilter, TexWrap, Viewport,
    },
};

///What happens to an aspect of the render target when a pass starts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RenderPassAction {
    ///Previous contents survive.
    Keep,
    ///Cleared to the step's clear value.
    Clear,
    ///Previous contents may be discarded; a hint, never a guarantee.
    DontCare,
}

///A render pass in the making: target, load actions and the command list.
pub struct RenderStep {
    ///`None` renders to the native backbuffer.
    pub framebuffer: Option<Arc<Framebuffer>>,
    pub color_action: RenderPassAction,
    pub depth_action: RenderPassAction,
    pub stencil_action: RenderPassAction,
    ///Packed RGBA, one byte each, R in the low byte.
    pub clear_color: u32,
    pub clear_depth: f32,
    pub clear_stencil: u8,
    pub num_draws: u32,
    pub tag: &'static str,
    pub commands: Vec<RenderCommand>,
}

///One unit of queued GPU work.
pub enum Step {
    Render(RenderStep),
    Copy {
        src: Arc<Framebuffer>,
        src_rect: Rect2D,
        dst: Arc<Framebuffer>,
        dst_pos: glint::state::Offset2D,
        aspects: AspectMask,
        tag: &'static str,
    },
    Blit {
        src: Arc<Framebuffer>,
        src_rect: Rect2D,
        dst: Arc<Framebuffer>,
        dst_rect: Rect2D,
        aspects: AspectMask,
        filter_linear: bool,
        tag: &'static str,
    },
    ///Pixels land in the ring's readback buffer, always as RGBA8.
    Readback {
        ///`None` reads the native backbuffer.
        src: Option<Arc<Framebuffer>>,
        src_rect: Rect2D,
        aspects: AspectMask,
        tag: &'static str,
    },
    ReadbackImage {
        texture: Arc<Texture>,
        mip_level: u8,
        src_rect: Rect2D,
        tag: &'static str,
    },
}

impl Step {
    pub fn tag(&self) -> &'static str {
        match self {
            Step::Render(render) => render.tag,
            Step::Copy { tag, .. }
            | Step::Blit { tag, .. }
            | Step::Readback { tag, .. }
            | Step::ReadbackImage { tag, .. } => tag,
        }
    }
}

///How a uniform command addresses its target.
#[derive(Clone)]
pub enum UniformRef {
    ///Pre-declared slot, location resolved at link time.
    Slot(Arc<UniformSlot>),
    ///Looked up by name against the bound program, cached per program.
    Name(String),
}

///One recorded state change or draw.
pub enum RenderCommand {
    Depth {
        enabled: bool,
        write: bool,
        func: CompareFunc,
    },
    Stencil {
        enabled: bool,
        func: CompareFunc,
        reference: u8,
        compare_mask: u8,
        write_mask: u8,
        stencil_fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    },
    Blend {
        mask: u8,
        enabled: bool,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
        eq_color: BlendEq,
        eq_alpha: BlendEq,
    },
    BlendColor {
        color: [f32; 4],
    },
    LogicOp {
        enabled: bool,
        op: LogicOp,
    },
    ///Mid-pass clear. `scissor == None` clears the whole target.
    Clear {
        aspects: AspectMask,
        clear_color: u32,
        clear_depth: f32,
        clear_stencil: u8,
        color_mask: u8,
        scissor: Option<Rect2D>,
    },
    Invalidate {
        aspects: AspectMask,
    },
    Viewport {
        viewport: Viewport,
    },
    Scissor {
        rect: Rect2D,
    },
    Uniform4F {
        uniform: UniformRef,
        count: u8,
        v: [f32; 4],
    },
    Uniform4I {
        uniform: UniformRef,
        count: u8,
        v: [i32; 4],
    },
    Uniform4Ui {
        uniform: UniformRef,
        count: u8,
        v: [u32; 4],
    },
    UniformMatrix {
        uniform: UniformRef,
        m: [f32; 16],
    },
    BindTexture {
        slot: u32,
        texture: Option<Arc<Texture>>,
    },
    ///Binds a framebuffer's color attachment as a texture.
    BindFbTexture {
        slot: u32,
        framebuffer: Arc<Framebuffer>,
        aspect: AspectMask,
    },
    BindProgram {
        program: Arc<Program>,
    },
    BindVertexBuffer {
        layout: Arc<InputLayout>,
        buffer: Arc<Buffer>,
        offset: usize,
    },
    BindIndexBuffer {
        buffer: Arc<Buffer>,
    },
    GenMips,
    Draw {
        prim: Primitive,
        first: i32,
        count: i32,
    },
    DrawIndexed {
        prim: Primitive,
        count: i32,
        index_type: IndexType,
        offset: usize,
        instances: i32,
    },
    ///Sampler state for the texture bound on `slot`, cached per texture.
    TextureSampler {
        slot: u32,
        wrap_s: TexWrap,
        wrap_t: TexWrap,
        mag_filter: TexFilter,
        min_filter: TexFilter,
        anisotropy: f32,
    },
    TextureLod {
        slot: u32,
        min_lod: f32,
        max_lod: f32,
        lod_bias: f32,
    },
    Raster {
        cull_enable: bool,
        front_face: FrontFace,
        cull_face: CullFace,
        dither: bool,
    },
    TextureSubImage {
        slot: u32,
        texture: Arc<Texture>,
        level: u8,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: DataFormat,
        data: Vec<u8>,
    },
}

///One-time object realization, run in order before the frame's steps.
pub enum InitStep {
    CreateTexture {
        texture: Arc<Texture>,
    },
    CreateBuffer {
        buffer: Arc<Buffer>,
        usage: BufferUsage,
    },
    CreateShader {
        shader: Arc<Shader>,
    },
    CreateProgram {
        program: Arc<Program>,
    },
    CreateFramebuffer {
        framebuffer: Arc<Framebuffer>,
    },
    CreateInputLayout {
        layout: Arc<InputLayout>,
    },
    TextureImage {
        texture: Arc<Texture>,
        level: u8,
        width: i32,
        height: i32,
        format: DataFormat,
        data: Vec<u8>,
        linear_filter: bool,
    },
    TextureFinalize {
        texture: Arc<Texture>,
        max_level: u8,
        gen_mips: bool,
    },
    BufferSubdata {
        buffer: Arc<Buffer>,
        offset: usize,
        data: Vec<u8>,
    },
}
