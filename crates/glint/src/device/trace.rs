//! A [GlDevice] that records instead of rendering.
//!
//! Every call is appended to a shared trace, so a test (or a curious human
//! with a misbehaving command stream) can assert on exactly what the executor
//! emitted, in order. Object names are handed out sequentially starting at 1.
//!
//! The handle is `Clone`; all clones share one trace. That is what lets a
//! test keep a handle while the executor owns the device on another thread.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    caps::CopyImageSupport,
    state::{
        AspectMask, Attachment, BindFbTarget, BlendEq, BlendFactor, BufferTarget, BufferUsage,
        Capability, CompareFunc, CullFace, DataFormat, FramebufferStatus, FrontFace, IndexType,
        LogicOp, MapAccess, Primitive, Rect2D, RenderbufferFormat, ShaderStage, StencilOp,
        TextureTarget, VertexAttribType,
    },
};

use super::{GlDevice, GlError, GlObject, TexParameter};

///One recorded call. Payloads keep whatever a test might want to compare;
///bulk data is reduced to its length.
#[derive(Clone, PartialEq, Debug)]
pub enum TraceCall {
    GenVertexArray(GlObject),
    BindVertexArray(GlObject),
    DeleteVertexArray(GlObject),

    GenTexture(GlObject),
    ActiveTexture(u32),
    BindTexture(TextureTarget, GlObject),
    TexImage2D {
        target: TextureTarget,
        level: u8,
        format: DataFormat,
        width: i32,
        height: i32,
        len: Option<usize>,
    },
    TexSubImage2D {
        target: TextureTarget,
        level: u8,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        len: usize,
    },
    TexParameter(TextureTarget, TexParameter),
    GenerateMipmap(TextureTarget),
    DeleteTexture(GlObject),

    GenBuffer(GlObject),
    BindBuffer(BufferTarget, GlObject),
    BufferData {
        target: BufferTarget,
        size: usize,
        usage: BufferUsage,
    },
    BufferSubData {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    MapBuffer {
        target: BufferTarget,
        size: usize,
        access: MapAccess,
    },
    WriteMapped {
        target: BufferTarget,
        offset: usize,
        len: usize,
    },
    FlushMappedRange {
        target: BufferTarget,
        offset: usize,
        size: usize,
    },
    UnmapBuffer(BufferTarget),
    DeleteBuffer(GlObject),

    CompileShader(ShaderStage, GlObject),
    DeleteShader(GlObject),
    CreateProgram(GlObject),
    AttachShader(GlObject, GlObject),
    BindAttribLocation(GlObject, u32, String),
    BindFragDataLocation(GlObject, u32, u32, String),
    LinkProgram(GlObject),
    UseProgram(GlObject),
    UniformLocation(GlObject, String),
    UniformF(i32, Vec<f32>),
    UniformI(i32, Vec<i32>),
    UniformUi(i32, Vec<u32>),
    UniformMatrix4(i32),
    DeleteProgram(GlObject),

    GenFramebuffer(GlObject),
    BindFramebuffer(BindFbTarget, GlObject),
    GenRenderbuffer(GlObject),
    BindRenderbuffer(GlObject),
    RenderbufferStorage(RenderbufferFormat, i32, i32),
    FramebufferTexture2D(Attachment, GlObject),
    FramebufferRenderbuffer(Attachment, GlObject),
    CheckFramebufferStatus,
    DeleteFramebuffer(GlObject),
    DeleteRenderbuffer(GlObject),
    BlitFramebuffer {
        src: Rect2D,
        dst: Rect2D,
        aspects: AspectMask,
        linear: bool,
    },
    CopyImageSubData {
        variant: CopyImageSupport,
        src: GlObject,
        src_level: u8,
        src_pos: (i32, i32, i32),
        dst: GlObject,
        dst_level: u8,
        dst_pos: (i32, i32, i32),
        extent: (i32, i32, i32),
    },
    InvalidateFramebuffer(AspectMask),

    Enable(Capability),
    Disable(Capability),
    DepthMask(bool),
    DepthFunc(CompareFunc),
    DepthRange(f32, f32),
    BlendEquation(BlendEq, BlendEq),
    BlendFunc(BlendFactor, BlendFactor, BlendFactor, BlendFactor),
    BlendColor([f32; 4]),
    LogicOp(LogicOp),
    ColorMask(bool, bool, bool, bool),
    StencilFunc(CompareFunc, u8, u8),
    StencilOp(StencilOp, StencilOp, StencilOp),
    StencilMask(u8),
    FrontFace(FrontFace),
    CullFace(CullFace),
    Viewport(f32, f32, f32, f32),
    Scissor(Rect2D),
    ClearColor([f32; 4]),
    ClearDepth(f32),
    ClearStencil(u8),
    Clear(AspectMask),

    EnableVertexAttrib(u32),
    DisableVertexAttrib(u32),
    VertexAttribPointer {
        location: u32,
        count: i32,
        ty: VertexAttribType,
        normalized: bool,
        stride: i32,
        offset: usize,
    },
    DrawArrays(Primitive, i32, i32),
    DrawElements(Primitive, i32, IndexType, usize),
    DrawElementsInstanced(Primitive, i32, IndexType, usize, i32),

    PackAlignment(i32),
    PackRowLength(i32),
    ReadColorAttachment,
    ReadPixels(Rect2D),
    GetTexImage(TextureTarget, u8),
}

struct Inner {
    calls: Vec<TraceCall>,
    next_name: u32,
    //test hooks
    pending_errors: VecDeque<GlError>,
    fail_next_compile: Option<String>,
    fail_next_link: Option<String>,
    map_succeeds: bool,
    fill_pixel: [u8; 4],
}

///Recording [GlDevice]. See the module docs.
#[derive(Clone)]
pub struct TraceDevice {
    inner: Arc<Mutex<Inner>>,
}

impl Default for TraceDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceDevice {
    pub fn new() -> Self {
        TraceDevice {
            inner: Arc::new(Mutex::new(Inner {
                calls: Vec::new(),
                next_name: 1,
                pending_errors: VecDeque::new(),
                fail_next_compile: None,
                fail_next_link: None,
                map_succeeds: true,
                fill_pixel: [0, 0, 0, 255],
            })),
        }
    }

    ///Snapshot of everything recorded so far.
    pub fn calls(&self) -> Vec<TraceCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    ///Drains the trace and returns it.
    pub fn take_calls(&self) -> Vec<TraceCall> {
        core::mem::take(&mut self.inner.lock().unwrap().calls)
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }

    ///Queues an error for the next [GlDevice::get_error] poll.
    pub fn inject_error(&self, error: GlError) {
        self.inner.lock().unwrap().pending_errors.push_back(error);
    }

    ///The next compile reports failure with `log` as info log.
    pub fn fail_next_compile(&self, log: impl Into<String>) {
        self.inner.lock().unwrap().fail_next_compile = Some(log.into());
    }

    pub fn fail_next_link(&self, log: impl Into<String>) {
        self.inner.lock().unwrap().fail_next_link = Some(log.into());
    }

    ///Whether [GlDevice::map_buffer] succeeds. Defaults to true.
    pub fn set_map_succeeds(&self, ok: bool) {
        self.inner.lock().unwrap().map_succeeds = ok;
    }

    ///Pixel value readbacks are filled with.
    pub fn set_fill_pixel(&self, px: [u8; 4]) {
        self.inner.lock().unwrap().fill_pixel = px;
    }

    fn record(&mut self, call: TraceCall) {
        self.inner.lock().unwrap().calls.push(call);
    }

    fn next_object(&mut self) -> GlObject {
        let mut inner = self.inner.lock().unwrap();
        let name = inner.next_name;
        inner.next_name += 1;
        GlObject(name)
    }
}

impl GlDevice for TraceDevice {
    fn get_error(&mut self) -> GlError {
        self.inner
            .lock()
            .unwrap()
            .pending_errors
            .pop_front()
            .unwrap_or(GlError::NoError)
    }

    fn gen_vertex_array(&mut self) -> GlObject {
        let vao = self.next_object();
        self.record(TraceCall::GenVertexArray(vao));
        vao
    }

    fn bind_vertex_array(&mut self, vao: GlObject) {
        self.record(TraceCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&mut self, vao: GlObject) {
        self.record(TraceCall::DeleteVertexArray(vao));
    }

    fn gen_texture(&mut self) -> GlObject {
        let tex = self.next_object();
        self.record(TraceCall::GenTexture(tex));
        tex
    }

    fn active_texture(&mut self, slot: u32) {
        self.record(TraceCall::ActiveTexture(slot));
    }

    fn bind_texture(&mut self, target: TextureTarget, tex: GlObject) {
        self.record(TraceCall::BindTexture(target, tex));
    }

    fn tex_image_2d(
        &mut self,
        target: TextureTarget,
        level: u8,
        format: DataFormat,
        width: i32,
        height: i32,
        data: Option<&[u8]>,
    ) {
        self.record(TraceCall::TexImage2D {
            target,
            level,
            format,
            width,
            height,
            len: data.map(<[u8]>::len),
        });
    }

    fn tex_sub_image_2d(
        &mut self,
        target: TextureTarget,
        level: u8,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        _format: DataFormat,
        data: &[u8],
    ) {
        self.record(TraceCall::TexSubImage2D {
            target,
            level,
            x,
            y,
            width,
            height,
            len: data.len(),
        });
    }

    fn tex_parameter(&mut self, target: TextureTarget, param: TexParameter) {
        self.record(TraceCall::TexParameter(target, param));
    }

    fn generate_mipmap(&mut self, target: TextureTarget) {
        self.record(TraceCall::GenerateMipmap(target));
    }

    fn delete_texture(&mut self, tex: GlObject) {
        self.record(TraceCall::DeleteTexture(tex));
    }

    fn gen_buffer(&mut self) -> GlObject {
        let buffer = self.next_object();
        self.record(TraceCall::GenBuffer(buffer));
        buffer
    }

    fn bind_buffer(&mut self, target: BufferTarget, buffer: GlObject) {
        self.record(TraceCall::BindBuffer(target, buffer));
    }

    fn buffer_data(&mut self, target: BufferTarget, size: usize, usage: BufferUsage) {
        self.record(TraceCall::BufferData {
            target,
            size,
            usage,
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(TraceCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn map_buffer(&mut self, target: BufferTarget, size: usize, access: MapAccess) -> bool {
        self.record(TraceCall::MapBuffer {
            target,
            size,
            access,
        });
        self.inner.lock().unwrap().map_succeeds
    }

    fn write_mapped(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(TraceCall::WriteMapped {
            target,
            offset,
            len: data.len(),
        });
    }

    fn flush_mapped_range(&mut self, target: BufferTarget, offset: usize, size: usize) {
        self.record(TraceCall::FlushMappedRange {
            target,
            offset,
            size,
        });
    }

    fn unmap_buffer(&mut self, target: BufferTarget) -> bool {
        self.record(TraceCall::UnmapBuffer(target));
        true
    }

    fn delete_buffer(&mut self, buffer: GlObject) {
        self.record(TraceCall::DeleteBuffer(buffer));
    }

    fn compile_shader(&mut self, stage: ShaderStage, _source: &str) -> Result<GlObject, String> {
        if let Some(log) = self.inner.lock().unwrap().fail_next_compile.take() {
            return Err(log);
        }
        let shader = self.next_object();
        self.record(TraceCall::CompileShader(stage, shader));
        Ok(shader)
    }

    fn delete_shader(&mut self, shader: GlObject) {
        self.record(TraceCall::DeleteShader(shader));
    }

    fn create_program(&mut self) -> GlObject {
        let program = self.next_object();
        self.record(TraceCall::CreateProgram(program));
        program
    }

    fn attach_shader(&mut self, program: GlObject, shader: GlObject) {
        self.record(TraceCall::AttachShader(program, shader));
    }

    fn bind_attrib_location(&mut self, program: GlObject, location: u32, name: &str) {
        self.record(TraceCall::BindAttribLocation(
            program,
            location,
            name.to_owned(),
        ));
    }

    fn bind_frag_data_location(&mut self, program: GlObject, color: u32, index: u32, name: &str) {
        self.record(TraceCall::BindFragDataLocation(
            program,
            color,
            index,
            name.to_owned(),
        ));
    }

    fn link_program(&mut self, program: GlObject) -> Result<(), String> {
        if let Some(log) = self.inner.lock().unwrap().fail_next_link.take() {
            return Err(log);
        }
        self.record(TraceCall::LinkProgram(program));
        Ok(())
    }

    fn use_program(&mut self, program: GlObject) {
        self.record(TraceCall::UseProgram(program));
    }

    fn uniform_location(&mut self, program: GlObject, name: &str) -> i32 {
        self.record(TraceCall::UniformLocation(program, name.to_owned()));
        //every queried uniform "exists", at a location derived from its name
        // length. Deterministic and good enough for tracing.
        name.len() as i32
    }

    fn uniform_f(&mut self, loc: i32, values: &[f32]) {
        self.record(TraceCall::UniformF(loc, values.to_vec()));
    }

    fn uniform_i(&mut self, loc: i32, values: &[i32]) {
        self.record(TraceCall::UniformI(loc, values.to_vec()));
    }

    fn uniform_ui(&mut self, loc: i32, values: &[u32]) {
        self.record(TraceCall::UniformUi(loc, values.to_vec()));
    }

    fn uniform_matrix4(&mut self, loc: i32, _matrix: &[f32; 16]) {
        self.record(TraceCall::UniformMatrix4(loc));
    }

    fn delete_program(&mut self, program: GlObject) {
        self.record(TraceCall::DeleteProgram(program));
    }

    fn gen_framebuffer(&mut self) -> GlObject {
        let fbo = self.next_object();
        self.record(TraceCall::GenFramebuffer(fbo));
        fbo
    }

    fn bind_framebuffer(&mut self, target: BindFbTarget, fbo: GlObject) {
        self.record(TraceCall::BindFramebuffer(target, fbo));
    }

    fn gen_renderbuffer(&mut self) -> GlObject {
        let rb = self.next_object();
        self.record(TraceCall::GenRenderbuffer(rb));
        rb
    }

    fn bind_renderbuffer(&mut self, rb: GlObject) {
        self.record(TraceCall::BindRenderbuffer(rb));
    }

    fn renderbuffer_storage(&mut self, format: RenderbufferFormat, width: i32, height: i32) {
        self.record(TraceCall::RenderbufferStorage(format, width, height));
    }

    fn framebuffer_texture_2d(&mut self, attachment: Attachment, tex: GlObject) {
        self.record(TraceCall::FramebufferTexture2D(attachment, tex));
    }

    fn framebuffer_renderbuffer(&mut self, attachment: Attachment, rb: GlObject) {
        self.record(TraceCall::FramebufferRenderbuffer(attachment, rb));
    }

    fn check_framebuffer_status(&mut self) -> FramebufferStatus {
        self.record(TraceCall::CheckFramebufferStatus);
        FramebufferStatus::Complete
    }

    fn delete_framebuffer(&mut self, fbo: GlObject) {
        self.record(TraceCall::DeleteFramebuffer(fbo));
    }

    fn delete_renderbuffer(&mut self, rb: GlObject) {
        self.record(TraceCall::DeleteRenderbuffer(rb));
    }

    fn blit_framebuffer(&mut self, src: Rect2D, dst: Rect2D, aspects: AspectMask, linear: bool) {
        self.record(TraceCall::BlitFramebuffer {
            src,
            dst,
            aspects,
            linear,
        });
    }

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
    ) {
        self.record(TraceCall::CopyImageSubData {
            variant,
            src,
            src_level,
            src_pos,
            dst,
            dst_level,
            dst_pos,
            extent,
        });
    }

    fn invalidate_framebuffer(&mut self, aspects: AspectMask) {
        self.record(TraceCall::InvalidateFramebuffer(aspects));
    }

    fn enable(&mut self, cap: Capability) {
        self.record(TraceCall::Enable(cap));
    }

    fn disable(&mut self, cap: Capability) {
        self.record(TraceCall::Disable(cap));
    }

    fn depth_mask(&mut self, write: bool) {
        self.record(TraceCall::DepthMask(write));
    }

    fn depth_func(&mut self, func: CompareFunc) {
        self.record(TraceCall::DepthFunc(func));
    }

    fn depth_range(&mut self, min_z: f32, max_z: f32) {
        self.record(TraceCall::DepthRange(min_z, max_z));
    }

    fn blend_equation(&mut self, color: BlendEq, alpha: BlendEq) {
        self.record(TraceCall::BlendEquation(color, alpha));
    }

    fn blend_func(
        &mut self,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(TraceCall::BlendFunc(
            src_color, dst_color, src_alpha, dst_alpha,
        ));
    }

    fn blend_color(&mut self, color: [f32; 4]) {
        self.record(TraceCall::BlendColor(color));
    }

    fn logic_op(&mut self, op: LogicOp) {
        self.record(TraceCall::LogicOp(op));
    }

    fn color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        self.record(TraceCall::ColorMask(r, g, b, a));
    }

    fn stencil_func(&mut self, func: CompareFunc, reference: u8, compare_mask: u8) {
        self.record(TraceCall::StencilFunc(func, reference, compare_mask));
    }

    fn stencil_op(&mut self, stencil_fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) {
        self.record(TraceCall::StencilOp(stencil_fail, depth_fail, pass));
    }

    fn stencil_mask(&mut self, write_mask: u8) {
        self.record(TraceCall::StencilMask(write_mask));
    }

    fn front_face(&mut self, front: FrontFace) {
        self.record(TraceCall::FrontFace(front));
    }

    fn cull_face(&mut self, face: CullFace) {
        self.record(TraceCall::CullFace(face));
    }

    fn viewport(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.record(TraceCall::Viewport(x, y, w, h));
    }

    fn scissor(&mut self, rect: Rect2D) {
        self.record(TraceCall::Scissor(rect));
    }

    fn clear_color(&mut self, color: [f32; 4]) {
        self.record(TraceCall::ClearColor(color));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.record(TraceCall::ClearDepth(depth));
    }

    fn clear_stencil(&mut self, stencil: u8) {
        self.record(TraceCall::ClearStencil(stencil));
    }

    fn clear(&mut self, aspects: AspectMask) {
        self.record(TraceCall::Clear(aspects));
    }

    fn enable_vertex_attrib(&mut self, location: u32) {
        self.record(TraceCall::EnableVertexAttrib(location));
    }

    fn disable_vertex_attrib(&mut self, location: u32) {
        self.record(TraceCall::DisableVertexAttrib(location));
    }

    fn vertex_attrib_pointer(
        &mut self,
        location: u32,
        count: i32,
        ty: VertexAttribType,
        normalized: bool,
        stride: i32,
        offset: usize,
    ) {
        self.record(TraceCall::VertexAttribPointer {
            location,
            count,
            ty,
            normalized,
            stride,
            offset,
        });
    }

    fn draw_arrays(&mut self, prim: Primitive, first: i32, count: i32) {
        self.record(TraceCall::DrawArrays(prim, first, count));
    }

    fn draw_elements(&mut self, prim: Primitive, count: i32, index_type: IndexType, offset: usize) {
        self.record(TraceCall::DrawElements(prim, count, index_type, offset));
    }

    fn draw_elements_instanced(
        &mut self,
        prim: Primitive,
        count: i32,
        index_type: IndexType,
        offset: usize,
        instances: i32,
    ) {
        self.record(TraceCall::DrawElementsInstanced(
            prim, count, index_type, offset, instances,
        ));
    }

    fn pack_alignment(&mut self, alignment: i32) {
        self.record(TraceCall::PackAlignment(alignment));
    }

    fn pack_row_length(&mut self, row_length: i32) {
        self.record(TraceCall::PackRowLength(row_length));
    }

    fn read_color_attachment(&mut self) {
        self.record(TraceCall::ReadColorAttachment);
    }

    fn read_pixels(&mut self, rect: Rect2D, dest: &mut [u8]) {
        let fill = self.inner.lock().unwrap().fill_pixel;
        for px in dest.chunks_exact_mut(4) {
            px.copy_from_slice(&fill);
        }
        self.record(TraceCall::ReadPixels(rect));
    }

    fn get_tex_image(&mut self, target: TextureTarget, level: u8, dest: &mut [u8]) {
        let fill = self.inner.lock().unwrap().fill_pixel;
        for px in dest.chunks_exact_mut(4) {
            px.copy_from_slice(&fill);
        }
        self.record(TraceCall::GetTexImage(target, level));
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(TraceDevice: Send, Sync);
    }

    #[test]
    fn sequential_names() {
        let mut dev = TraceDevice::new();
        assert_eq!(dev.gen_texture(), GlObject(1));
        assert_eq!(dev.gen_buffer(), GlObject(2));
        assert_eq!(dev.create_program(), GlObject(3));
        assert_eq!(
            dev.calls(),
            vec![
                TraceCall::GenTexture(GlObject(1)),
                TraceCall::GenBuffer(GlObject(2)),
                TraceCall::CreateProgram(GlObject(3)),
            ]
        );
    }

    #[test]
    fn injected_errors_drain_in_order() {
        let mut dev = TraceDevice::new();
        dev.inject_error(GlError::OutOfMemory);
        assert_eq!(dev.get_error(), GlError::OutOfMemory);
        assert_eq!(dev.get_error(), GlError::NoError);
    }

    #[test]
    fn clones_share_the_trace() {
        let dev = TraceDevice::new();
        let mut clone = dev.clone();
        clone.depth_mask(true);
        assert_eq!(dev.calls(), vec![TraceCall::DepthMask(true)]);
    }
}
