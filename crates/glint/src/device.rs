//! The call seam between the queue and a real context.
//!
//! [GlDevice] is everything the executor is allowed to do to the context,
//! one method per call, with crate enums instead of raw GLenums. The contract
//! mirrors an implicit-state API: most calls cannot fail, and allocation
//! trouble is polled through [GlDevice::get_error] after the risky spots.
//!
//! Exactly one role may drive a device at a time; the queue guarantees that
//! by construction (only the execution role ever sees it).

use crate::{
    caps::CopyImageSupport,
    state::{
        AspectMask, Attachment, BindFbTarget, BlendEq, BlendFactor, BufferTarget, BufferUsage,
        Capability, CompareFunc, CullFace, DataFormat, FramebufferStatus, FrontFace, IndexType,
        LogicOp, MapAccess, Primitive, Rect2D, RenderbufferFormat, ShaderStage, StencilOp,
        TexFilter, TexWrap, TextureTarget, VertexAttribType,
    },
};

pub mod trace;

///Name of an object owned by the context. Zero is "no object", as usual.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct GlObject(pub u32);

impl GlObject {
    pub const NONE: GlObject = GlObject(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

///Result of [GlDevice::get_error]. Collapsed to what the queue reacts to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GlError {
    NoError,
    OutOfMemory,
    Other(u32),
}

///Texture parameter writes, one call each on a real context.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum TexParameter {
    WrapS(TexWrap),
    WrapT(TexWrap),
    MagFilter(TexFilter),
    MinFilter(TexFilter),
    MaxLevel(u8),
    MaxAnisotropy(f32),
    MinLod(f32),
    MaxLod(f32),
    LodBias(f32),
}

pub trait GlDevice {
    ///Drains one error off the context. Called after operations that may
    ///allocate; [GlError::OutOfMemory] latches the queue's sticky flag.
    fn get_error(&mut self) -> GlError;

    // Vertex array objects. Only used when the caps advertise them; the queue
    // keeps a single global one bound during passes.
    fn gen_vertex_array(&mut self) -> GlObject;
    fn bind_vertex_array(&mut self, vao: GlObject);
    fn delete_vertex_array(&mut self, vao: GlObject);

    // Textures.
    fn gen_texture(&mut self) -> GlObject;
    fn active_texture(&mut self, slot: u32);
    fn bind_texture(&mut self, target: TextureTarget, tex: GlObject);
    ///`data = None` allocates the level without filling it.
    fn tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u8,
        format: DataFormat,
        width: i32,
        height: i32,
        data: Option<&[u8]>,
    );
    #[allow(clippy::too_many_arguments)]
    fn tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u8,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: DataFormat,
        data: &[u8],
    );
    ///Applies to the texture currently bound on the active unit.
    fn tex_parameter(&mut self, target: TextureTarget, param: TexParameter);
    fn generate_mipmap(&mut self, target: TextureTarget);
    fn delete_texture(&mut self, tex: GlObject);

    // Buffers.
    fn gen_buffer(&mut self) -> GlObject;
    fn bind_buffer(&mut self, target: BufferTarget, buffer: GlObject);
    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: BufferUsage);
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    ///Maps the buffer bound to `target` for writing. Returns false when the
    ///context can't (the caller falls back to [GlDevice::buffer_sub_data]).
    fn map_buffer(&mut self, target: BufferTarget, size: usize, access: MapAccess) -> bool;
    ///CPU-side write into the current mapping. The queue keeps the
    ///authoritative bytes; implementations copy into their mapped pointer.
    fn write_mapped(&mut self, target: BufferTarget, offset: usize, data: &[u8]);
    ///Explicit flush of a mapped range, only meaningful for maps taken with
    ///[MapAccess::flush_explicit].
    fn flush_mapped_range(&mut self, target: BufferTarget, offset: usize, size: usize);
    ///Unmapping publishes any writes a non-explicit-flush map still holds.
    fn unmap_buffer(&mut self, target: BufferTarget) -> bool;
    fn delete_buffer(&mut self, buffer: GlObject);

    // Shaders and programs. Compile and link are collapsed into single calls
    // that hand back the info log on failure; there is nothing else the queue
    // ever asks a failed object for.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<GlObject, String>;
    fn delete_shader(&mut self, shader: GlObject);
    fn create_program(&mut self) -> GlObject;
    fn attach_shader(&mut self, program: GlObject, shader: GlObject);
    fn bind_attrib_location(&mut self, program: GlObject, location: u32, name: &str);
    ///Dual-source output naming, capability gated by the caller.
    fn bind_frag_data_location(&mut self, program: GlObject, color: u32, index: u32, name: &str);
    fn link_program(&mut self, program: GlObject) -> Result<(), String>;
    fn use_program(&mut self, program: GlObject);
    ///-1 when the uniform does not exist in the linked program.
    fn uniform_location(&mut self, program: GlObject, name: &str) -> i32;
    ///1 to 4 components, picked by slice length.
    fn uniform_f(&mut self, loc: i32, values: &[f32]);
    fn uniform_i(&mut self, loc: i32, values: &[i32]);
    fn uniform_ui(&mut self, loc: i32, values: &[u32]);
    fn uniform_matrix4(&mut self, loc: i32, matrix: &[f32; 16]);
    fn delete_program(&mut self, program: GlObject);

    // Framebuffers and renderbuffers.
    fn gen_framebuffer(&mut self) -> GlObject;
    ///`GlObject::NONE` binds the native backbuffer.
    fn bind_framebuffer(&mut self, target: BindFbTarget, fbo: GlObject);
    fn gen_renderbuffer(&mut self) -> GlObject;
    fn bind_renderbuffer(&mut self, rb: GlObject);
    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: i32, height: i32);
    ///Attaches to the framebuffer currently bound for drawing.
    fn framebuffer_texture_2d(&mut self, attachment: Attachment, tex: GlObject);
    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, rb: GlObject);
    fn check_framebuffer_status(&mut self) -> FramebufferStatus;
    fn delete_framebuffer(&mut self, fbo: GlObject);
    fn delete_renderbuffer(&mut self, rb: GlObject);
    ///Blits between the framebuffers bound for reading and drawing.
    fn blit_framebuffer(&mut self, src: Rect2D, dst: Rect2D, aspects: AspectMask, linear: bool);
    ///`variant` says which entry point the queue selected from the caps
    ///(ARB/NV/OES); semantics are identical, the context linkage is not.
    #[allow(clippy::too_many_arguments)]
    fn copy_image_sub_data(
        &mut self,
        variant: CopyImageSupport,
        src: GlObject,
        src_level: u8,
        src_pos: (i32, i32, i32),
        dst: GlObject,
        dst_level: u8,
        dst_pos: (i32, i32, i32),
        extent: (i32, i32, i32),
    );
    ///Invalidation hint for attachments of the bound framebuffer.
    fn invalidate_framebuffer(&mut self, aspects: AspectMask);

    // Global state.
    fn enable(&mut self, cap: Capability);
    fn disable(&mut self, cap: Capability);
    fn depth_mask(&mut self, write: bool);
    fn depth_func(&mut self, func: CompareFunc);
    fn depth_range(&mut self, min_z: f32, max_z: f32);
    fn blend_equation(&mut self, color: BlendEq, alpha: BlendEq);
    fn blend_func(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn blend_color(&mut self, color: [f32; 4]);
    fn logic_op(&mut self, op: LogicOp);
    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool);
    fn stencil_func(&mut self, func: CompareFunc, reference: u8, compare_mask: u8);
    fn stencil_op(&mut self, stencil_fail: StencilOp, depth_fail: StencilOp, pass: StencilOp);
    fn stencil_mask(&mut self, write_mask: u8);
    fn front_face(&mut self, front: FrontFace);
    fn cull_face(&mut self, face: CullFace);
    fn viewport(&mut self, x: f32, y: f32, w: f32, h: f32);
    fn scissor(&mut self, rect: Rect2D);
    fn clear_color(&mut self, color: [f32; 4]);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: u8);
    fn clear(&mut self, aspects: AspectMask);

    // Vertex state and draws.
    fn enable_vertex_attrib(&mut self, location: u32);
    fn disable_vertex_attrib(&mut self, location: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        count: i32,
        ty: VertexAttribType,
        normalized: bool,
        stride: i32,
        offset: usize,
    );
    fn draw_arrays(&mut self, prim: Primitive, first: i32, count: i32);
    fn draw_elements(&mut self, prim: Primitive, count: i32, index_type: IndexType, offset: usize);
    fn draw_elements_instanced(
        &mut self,
        prim: Primitive,
        count: i32,
        index_type: IndexType,
        offset: usize,
        instances: i32,
    );

    // Readback plumbing. Pixels always come back as tightly packed RGBA8
    // rows; conversion happens above the seam.
    fn pack_alignment(&mut self, alignment: i32);
    fn pack_row_length(&mut self, row_length: i32);
    ///Selects color attachment 0 of the read framebuffer as readback source.
    fn read_color_attachment(&mut self);
    fn read_pixels(&mut self, rect: Rect2D, dest: &mut [u8]);
    fn get_tex_image(&mut self, target: TextureTarget, level: u8, dest: &mut [u8]);
}
