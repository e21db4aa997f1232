//! The two halves of the engine.
//!
//! [RenderManager] is the submission role: it allocates handle shells,
//! records init steps and commands, and hands finished frames to the ring.
//! [RenderExecutor] is the execution role: the only code that ever touches
//! the [GlDevice], pulling frames off the ring strictly in order.
//!
//! [RenderManager::new] returns both, sharing one ring. Every submission API
//! takes `&mut self`, so the single-writer rule the handoff protocol depends
//! on is enforced by ownership: recording from two threads at once does not
//! borrow-check. Moving the manager to another thread between frames is fine
//! and keeps the required happens-before edges through the move itself.

use std::sync::Arc;

use glint::{
    caps::{DeviceCaps, GpuVendor},
    device::GlDevice,
    resources::{
        Buffer, Framebuffer, InputEntry, InputLayout, MAX_TEXTURE_SLOTS, Program, ProgramFlags,
        Semantic, Shader, Texture, UniformInitializer, UniformSlot,
    },
    state::{
        AspectMask, BlendEq, BlendFactor, BufferTarget, BufferUsage, CompareFunc, CullFace,
        DataFormat, FrontFace, IndexType, LogicOp, Offset2D, Primitive, Rect2D, ShaderStage,
        StencilOp, TexFilter, TexWrap, TextureTarget, Viewport,
    },
};
use smallvec::SmallVec;

use crate::{
    command::{InitStep, RenderCommand, RenderPassAction, RenderStep, Step, UniformRef},
    deleter::Deleter,
    frame::{FRAME_RING_SIZE, FrameRing, FrameWork, RunType},
    push_buffer::{BufferStrategy, PushBuffer},
    readback::{ReadbackError, convert_from_rgba8},
    runner::QueueRunner,
};

///Submission half. See the module docs for the threading contract.
pub struct RenderManager {
    ring: Arc<FrameRing>,
    steps: Vec<Step>,
    init_steps: Vec<InitStep>,
    ///Index into `steps` of the render step commands currently append to.
    cur_render_step: Option<usize>,
    deleter: Deleter,
    cur_frame: usize,
    inside_frame: bool,
}

impl RenderManager {
    ///Creates the manager/executor pair. Hand the executor to whatever thread
    ///owns the context; keep the manager wherever recording happens.
    pub fn new(caps: DeviceCaps) -> (RenderManager, RenderExecutor) {
        let ring = Arc::new(FrameRing::new());
        let executor = RenderExecutor {
            runner: QueueRunner::new(ring.clone(), caps),
            ring: ring.clone(),
            frame_index: 0,
            advance: false,
            strategy: BufferStrategy::Subdata,
            swap_fn: None,
            swap_interval_fn: None,
            first_frame: true,
        };
        (
            RenderManager {
                ring,
                steps: Vec::new(),
                init_steps: Vec::new(),
                cur_render_step: None,
                deleter: Deleter::default(),
                cur_frame: 0,
                inside_frame: false,
            },
            executor,
        )
    }

    // --- object creation; returns immediately, realization is deferred ---

    pub fn create_texture(
        &mut self,
        target: TextureTarget,
        width: i32,
        height: i32,
        depth: i32,
        num_mips: i32,
    ) -> Arc<Texture> {
        debug_assert!(width > 0 && height > 0 && depth > 0 && num_mips > 0);
        let texture = Arc::new(Texture::new(target, width, height, depth, num_mips));
        self.init_steps.push(InitStep::CreateTexture {
            texture: texture.clone(),
        });
        texture
    }

    pub fn create_buffer(
        &mut self,
        target: BufferTarget,
        size: usize,
        usage: BufferUsage,
    ) -> Arc<Buffer> {
        let buffer = Arc::new(Buffer::new(target, size));
        self.init_steps.push(InitStep::CreateBuffer {
            buffer: buffer.clone(),
            usage,
        });
        buffer
    }

    pub fn create_shader(
        &mut self,
        stage: ShaderStage,
        source: impl Into<String>,
        desc: impl Into<String>,
    ) -> Arc<Shader> {
        let shader = Arc::new(Shader::new(stage, source.into(), desc.into()));
        self.init_steps.push(InitStep::CreateShader {
            shader: shader.clone(),
        });
        shader
    }

    ///Uniform initializers can't be replaced by direct `set_uniform` calls
    ///because there might not be an active render pass at creation time.
    pub fn create_program(
        &mut self,
        shaders: Vec<Arc<Shader>>,
        semantics: Vec<Semantic>,
        queries: Vec<Arc<UniformSlot>>,
        initializers: Vec<UniformInitializer>,
        flags: ProgramFlags,
    ) -> Arc<Program> {
        assert!(!shaders.is_empty(), "can't create a program with zero shaders");
        let shaders: SmallVec<[Arc<Shader>; 4]> = shaders.into();
        let program = Arc::new(Program::new(
            shaders,
            semantics,
            queries,
            initializers,
            flags,
        ));
        self.init_steps.push(InitStep::CreateProgram {
            program: program.clone(),
        });
        program
    }

    pub fn create_input_layout(
        &mut self,
        entries: Vec<InputEntry>,
        stride: i32,
    ) -> Arc<InputLayout> {
        let layout = Arc::new(InputLayout::new(entries, stride));
        self.init_steps.push(InitStep::CreateInputLayout {
            layout: layout.clone(),
        });
        layout
    }

    pub fn create_framebuffer(
        &mut self,
        width: i32,
        height: i32,
        z_stencil: bool,
        tag: &str,
    ) -> Arc<Framebuffer> {
        debug_assert!(width > 0 && height > 0);
        let framebuffer = Arc::new(Framebuffer::new(width, height, z_stencil, tag));
        self.init_steps.push(InitStep::CreateFramebuffer {
            framebuffer: framebuffer.clone(),
        });
        framebuffer
    }

    ///Creates a push buffer whose write window follows ring slot `frame`.
    ///Callers that stream every frame create one per slot.
    pub fn create_push_buffer(
        &mut self,
        frame: usize,
        target: BufferTarget,
        size: usize,
        tag: &'static str,
    ) -> Arc<PushBuffer> {
        debug_assert!(frame < FRAME_RING_SIZE);
        let push_buffer = Arc::new(PushBuffer::new(target, size, tag));
        self.ring.register_push_buffer(frame, push_buffer.clone());
        push_buffer
    }

    // --- deferred data population ---

    pub fn texture_image(
        &mut self,
        texture: &Arc<Texture>,
        level: u8,
        width: i32,
        height: i32,
        format: DataFormat,
        data: Vec<u8>,
        linear_filter: bool,
    ) {
        debug_assert!(!data.is_empty());
        self.init_steps.push(InitStep::TextureImage {
            texture: texture.clone(),
            level,
            width,
            height,
            format,
            data,
            linear_filter,
        });
    }

    pub fn finalize_texture(&mut self, texture: &Arc<Texture>, max_level: u8, gen_mips: bool) {
        self.init_steps.push(InitStep::TextureFinalize {
            texture: texture.clone(),
            max_level,
            gen_mips,
        });
    }

    pub fn buffer_subdata(&mut self, buffer: &Arc<Buffer>, offset: usize, data: Vec<u8>) {
        debug_assert!(offset + data.len() <= buffer.size());
        self.init_steps.push(InitStep::BufferSubdata {
            buffer: buffer.clone(),
            offset,
            data,
        });
    }

    // --- deferred deletion; the object is freed one ring cycle after the
    // frame that queued it retires ---

    pub fn delete_texture(&mut self, texture: Arc<Texture>) {
        self.deleter.textures.push(texture);
    }

    pub fn delete_buffer(&mut self, buffer: Arc<Buffer>) {
        self.deleter.buffers.push(buffer);
    }

    pub fn delete_shader(&mut self, shader: Arc<Shader>) {
        self.deleter.shaders.push(shader);
    }

    pub fn delete_program(&mut self, program: Arc<Program>) {
        self.deleter.programs.push(program);
    }

    pub fn delete_input_layout(&mut self, layout: Arc<InputLayout>) {
        self.deleter.input_layouts.push(layout);
    }

    pub fn delete_framebuffer(&mut self, framebuffer: Arc<Framebuffer>) {
        self.deleter.framebuffers.push(framebuffer);
    }

    pub fn delete_push_buffer(&mut self, push_buffer: Arc<PushBuffer>) {
        self.deleter.push_buffers.push(push_buffer);
    }

    // --- step control ---

    pub fn is_in_render_pass(&self) -> bool {
        self.cur_render_step.is_some()
    }

    ///Ends the previous render step and starts a new one targeting `fb`
    ///(`None` = backbuffer). All pass-local state (viewport, scissor, blend,
    ///depth/stencil, raster) has to be re-recorded afterwards.
    ///
    ///Rebinding the target of the current step without requesting a clear is
    ///recognized and skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn bind_framebuffer_as_render_target(
        &mut self,
        fb: Option<&Arc<Framebuffer>>,
        color: RenderPassAction,
        depth: RenderPassAction,
        stencil: RenderPassAction,
        clear_color: u32,
        clear_depth: f32,
        clear_stencil: u8,
        tag: &'static str,
    ) {
        debug_assert!(self.inside_frame, "render target bound outside a frame");

        let any_clear = color == RenderPassAction::Clear
            || depth == RenderPassAction::Clear
            || stencil == RenderPassAction::Clear;
        if !any_clear
            && let Some(Step::Render(last)) = self.steps.last()
        {
            let same_target = match (&last.framebuffer, fb) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if same_target {
                //the bind was unnecessary, keep appending to the open step
                self.cur_render_step = Some(self.steps.len() - 1);
                return;
            }
        }

        self.steps.push(Step::Render(RenderStep {
            framebuffer: fb.cloned(),
            color_action: color,
            depth_action: depth,
            stencil_action: stencil,
            clear_color,
            clear_depth,
            clear_stencil,
            num_draws: 0,
            tag,
            commands: Vec::new(),
        }));
        self.cur_render_step = Some(self.steps.len() - 1);
    }

    pub fn copy_framebuffer(
        &mut self,
        src: &Arc<Framebuffer>,
        src_rect: Rect2D,
        dst: &Arc<Framebuffer>,
        dst_pos: Offset2D,
        aspects: AspectMask,
        tag: &'static str,
    ) {
        self.steps.push(Step::Copy {
            src: src.clone(),
            src_rect,
            dst: dst.clone(),
            dst_pos,
            aspects,
            tag,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn blit_framebuffer(
        &mut self,
        src: &Arc<Framebuffer>,
        src_rect: Rect2D,
        dst: &Arc<Framebuffer>,
        dst_rect: Rect2D,
        aspects: AspectMask,
        filter_linear: bool,
        tag: &'static str,
    ) {
        self.steps.push(Step::Blit {
            src: src.clone(),
            src_rect,
            dst: dst.clone(),
            dst_rect,
            aspects,
            filter_linear,
            tag,
        });
    }

    ///Queues a readback, flushes the partial frame synchronously and converts
    ///the pixels into `pixels` (`dest_stride_px` in pixels). Slow by nature;
    ///screenshots and debugging only.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_framebuffer_to_memory_sync(
        &mut self,
        src: Option<&Arc<Framebuffer>>,
        aspects: AspectMask,
        rect: Rect2D,
        dest_format: DataFormat,
        dest_stride_px: usize,
        pixels: &mut [u8],
        tag: &'static str,
    ) -> Result<(), ReadbackError> {
        debug_assert!(self.inside_frame, "sync readback outside a frame");
        if !aspects.contains(AspectMask::COLOR) {
            return Err(ReadbackError::UnsupportedAspect(aspects));
        }
        self.steps.push(Step::Readback {
            src: src.cloned(),
            src_rect: rect,
            aspects,
            tag,
        });
        self.flush_sync();
        self.convert_readback(rect, dest_format, dest_stride_px, pixels)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_image_to_memory_sync(
        &mut self,
        texture: &Arc<Texture>,
        mip_level: u8,
        rect: Rect2D,
        dest_format: DataFormat,
        dest_stride_px: usize,
        pixels: &mut [u8],
        tag: &'static str,
    ) -> Result<(), ReadbackError> {
        debug_assert!(self.inside_frame, "sync readback outside a frame");
        self.steps.push(Step::ReadbackImage {
            texture: texture.clone(),
            mip_level,
            src_rect: rect,
            tag,
        });
        self.flush_sync();
        self.convert_readback(rect, dest_format, dest_stride_px, pixels)
    }

    fn convert_readback(
        &mut self,
        rect: Rect2D,
        dest_format: DataFormat,
        dest_stride_px: usize,
        pixels: &mut [u8],
    ) -> Result<(), ReadbackError> {
        let readback = self.ring.readback.lock().unwrap();
        convert_from_rgba8(
            pixels,
            &readback.data,
            rect.w as usize,
            rect.h as usize,
            dest_stride_px,
            dest_format,
        )
    }

    // --- command recording; precondition for all of these: an active render
    // step exists ---

    fn cur_step(&mut self) -> &mut RenderStep {
        debug_assert!(
            self.inside_frame && self.cur_render_step.is_some(),
            "render command recorded without an active render pass"
        );
        let index = self
            .cur_render_step
            .expect("render command recorded without an active render pass");
        match &mut self.steps[index] {
            Step::Render(render) => render,
            _ => unreachable!("cur_render_step points at a non-render step"),
        }
    }

    ///Binds a framebuffer's color side as a texture for the following draws.
    pub fn bind_framebuffer_as_texture(
        &mut self,
        fb: &Arc<Framebuffer>,
        slot: u32,
        aspect: AspectMask,
    ) {
        debug_assert!((slot as usize) < MAX_TEXTURE_SLOTS);
        let framebuffer = fb.clone();
        self.cur_step().commands.push(RenderCommand::BindFbTexture {
            slot,
            framebuffer,
            aspect,
        });
    }

    pub fn bind_texture(&mut self, slot: u32, texture: Option<&Arc<Texture>>) {
        debug_assert!((slot as usize) < MAX_TEXTURE_SLOTS);
        if texture.is_none() && self.cur_render_step.is_none() {
            //pre-emptive unbinds outside a pass are harmless, drop them
            return;
        }
        let texture = texture.cloned();
        self.cur_step()
            .commands
            .push(RenderCommand::BindTexture { slot, texture });
    }

    pub fn bind_program(&mut self, program: &Arc<Program>) {
        let program = program.clone();
        self.cur_step()
            .commands
            .push(RenderCommand::BindProgram { program });
    }

    pub fn set_depth(&mut self, enabled: bool, write: bool, func: CompareFunc) {
        self.cur_step().commands.push(RenderCommand::Depth {
            enabled,
            write,
            func,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_stencil(
        &mut self,
        func: CompareFunc,
        reference: u8,
        compare_mask: u8,
        write_mask: u8,
        stencil_fail: StencilOp,
        depth_fail: StencilOp,
        pass: StencilOp,
    ) {
        self.cur_step().commands.push(RenderCommand::Stencil {
            enabled: true,
            func,
            reference,
            compare_mask,
            write_mask,
            stencil_fail,
            depth_fail,
            pass,
        });
    }

    pub fn set_stencil_disabled(&mut self) {
        self.cur_step().commands.push(RenderCommand::Stencil {
            enabled: false,
            func: CompareFunc::Always,
            reference: 0,
            compare_mask: 0,
            write_mask: 0,
            stencil_fail: StencilOp::Keep,
            depth_fail: StencilOp::Keep,
            pass: StencilOp::Keep,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_blend_and_mask(
        &mut self,
        color_mask: u8,
        src_color: BlendFactor,
        dst_color: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
        eq_color: BlendEq,
        eq_alpha: BlendEq,
    ) {
        self.cur_step().commands.push(RenderCommand::Blend {
            mask: color_mask,
            enabled: true,
            src_color,
            dst_color,
            src_alpha,
            dst_alpha,
            eq_color,
            eq_alpha,
        });
    }

    pub fn set_no_blend_and_mask(&mut self, color_mask: u8) {
        self.cur_step().commands.push(RenderCommand::Blend {
            mask: color_mask,
            enabled: false,
            src_color: BlendFactor::One,
            dst_color: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            eq_color: BlendEq::Add,
            eq_alpha: BlendEq::Add,
        });
    }

    pub fn set_blend_factor(&mut self, color: [f32; 4]) {
        self.cur_step()
            .commands
            .push(RenderCommand::BlendColor { color });
    }

    pub fn set_logic_op(&mut self, enabled: bool, op: LogicOp) {
        self.cur_step()
            .commands
            .push(RenderCommand::LogicOp { enabled, op });
    }

    pub fn set_raster(
        &mut self,
        cull_enable: bool,
        front_face: FrontFace,
        cull_face: CullFace,
        dither: bool,
    ) {
        self.cur_step().commands.push(RenderCommand::Raster {
            cull_enable,
            front_face,
            cull_face,
            dither,
        });
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.cur_step()
            .commands
            .push(RenderCommand::Viewport { viewport });
    }

    pub fn set_scissor(&mut self, rect: Rect2D) {
        self.cur_step().commands.push(RenderCommand::Scissor { rect });
    }

    fn push_uniform4f(&mut self, uniform: UniformRef, values: &[f32]) {
        debug_assert!((1..=4).contains(&values.len()));
        let mut v = [0.0; 4];
        v[..values.len()].copy_from_slice(values);
        self.cur_step().commands.push(RenderCommand::Uniform4F {
            uniform,
            count: values.len() as u8,
            v,
        });
    }

    pub fn set_uniform_f(&mut self, slot: &Arc<UniformSlot>, values: &[f32]) {
        self.push_uniform4f(UniformRef::Slot(slot.clone()), values);
    }

    pub fn set_uniform_f_by_name(&mut self, name: &str, values: &[f32]) {
        self.push_uniform4f(UniformRef::Name(name.to_owned()), values);
    }

    pub fn set_uniform_i(&mut self, slot: &Arc<UniformSlot>, values: &[i32]) {
        debug_assert!((1..=4).contains(&values.len()));
        let mut v = [0; 4];
        v[..values.len()].copy_from_slice(values);
        self.cur_step().commands.push(RenderCommand::Uniform4I {
            uniform: UniformRef::Slot(slot.clone()),
            count: values.len() as u8,
            v,
        });
    }

    pub fn set_uniform_ui(&mut self, slot: &Arc<UniformSlot>, values: &[u32]) {
        debug_assert!((1..=4).contains(&values.len()));
        let mut v = [0; 4];
        v[..values.len()].copy_from_slice(values);
        self.cur_step().commands.push(RenderCommand::Uniform4Ui {
            uniform: UniformRef::Slot(slot.clone()),
            count: values.len() as u8,
            v,
        });
    }

    pub fn set_uniform_m4x4(&mut self, slot: &Arc<UniformSlot>, matrix: &[f32; 16]) {
        self.cur_step().commands.push(RenderCommand::UniformMatrix {
            uniform: UniformRef::Slot(slot.clone()),
            m: *matrix,
        });
    }

    pub fn set_uniform_m4x4_by_name(&mut self, name: &str, matrix: &[f32; 16]) {
        self.cur_step().commands.push(RenderCommand::UniformMatrix {
            uniform: UniformRef::Name(name.to_owned()),
            m: *matrix,
        });
    }

    ///Sampler state for the texture bound on `slot`. Modifies the texture,
    ///not global state, exactly like the underlying API.
    pub fn set_texture_sampler(
        &mut self,
        slot: u32,
        wrap_s: TexWrap,
        wrap_t: TexWrap,
        mag_filter: TexFilter,
        min_filter: TexFilter,
        anisotropy: f32,
    ) {
        debug_assert!((slot as usize) < MAX_TEXTURE_SLOTS);
        self.cur_step().commands.push(RenderCommand::TextureSampler {
            slot,
            wrap_s,
            wrap_t,
            mag_filter,
            min_filter,
            anisotropy,
        });
    }

    pub fn set_texture_lod(&mut self, slot: u32, min_lod: f32, max_lod: f32, lod_bias: f32) {
        debug_assert!((slot as usize) < MAX_TEXTURE_SLOTS);
        self.cur_step().commands.push(RenderCommand::TextureLod {
            slot,
            min_lod,
            max_lod,
            lod_bias,
        });
    }

    ///Mid-pass clear. `scissor == None` clears the whole render target.
    #[allow(clippy::too_many_arguments)]
    pub fn clear(
        &mut self,
        clear_color: u32,
        clear_depth: f32,
        clear_stencil: u8,
        aspects: AspectMask,
        color_mask: u8,
        scissor: Option<Rect2D>,
    ) {
        if aspects.is_empty() {
            return;
        }
        self.cur_step().commands.push(RenderCommand::Clear {
            aspects,
            clear_color,
            clear_depth,
            clear_stencil,
            color_mask,
            scissor,
        });
    }

    pub fn invalidate(&mut self, aspects: AspectMask) {
        if aspects.is_empty() {
            return;
        }
        self.cur_step()
            .commands
            .push(RenderCommand::Invalidate { aspects });
    }

    ///Mipmap generation for whatever texture the previous bind put on the
    ///active unit.
    pub fn gen_mips(&mut self) {
        self.cur_step().commands.push(RenderCommand::GenMips);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn texture_subimage(
        &mut self,
        slot: u32,
        texture: &Arc<Texture>,
        level: u8,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: DataFormat,
        data: Vec<u8>,
    ) {
        debug_assert!((slot as usize) < MAX_TEXTURE_SLOTS);
        let texture = texture.clone();
        self.cur_step().commands.push(RenderCommand::TextureSubImage {
            slot,
            texture,
            level,
            x,
            y,
            width,
            height,
            format,
            data,
        });
    }

    pub fn bind_vertex_buffer(
        &mut self,
        layout: &Arc<InputLayout>,
        buffer: &Arc<Buffer>,
        offset: usize,
    ) {
        let layout = layout.clone();
        let buffer = buffer.clone();
        self.cur_step().commands.push(RenderCommand::BindVertexBuffer {
            layout,
            buffer,
            offset,
        });
    }

    pub fn bind_index_buffer(&mut self, buffer: &Arc<Buffer>) {
        let buffer = buffer.clone();
        self.cur_step()
            .commands
            .push(RenderCommand::BindIndexBuffer { buffer });
    }

    pub fn draw(&mut self, prim: Primitive, first: i32, count: i32) {
        let step = self.cur_step();
        step.commands.push(RenderCommand::Draw { prim, first, count });
        step.num_draws += 1;
    }

    pub fn draw_indexed(
        &mut self,
        prim: Primitive,
        count: i32,
        index_type: IndexType,
        offset: usize,
        instances: i32,
    ) {
        let step = self.cur_step();
        step.commands.push(RenderCommand::DrawIndexed {
            prim,
            count,
            index_type,
            offset,
            instances,
        });
        step.num_draws += 1;
    }

    // --- frame control ---

    ///Blocks until the execution role has retired this ring slot, then opens
    ///the frame. This is the backpressure that bounds the pipeline depth.
    pub fn begin_frame(&mut self) {
        debug_assert!(!self.inside_frame, "begin_frame inside an open frame");
        let frame = self.cur_frame;
        self.ring.begin_frame_wait(frame);
        self.inside_frame = true;

        //reopen the slot's streaming buffers now that their last cycle is
        // provably done
        for push_buffer in self.ring.registered_push_buffers(frame) {
            push_buffer.begin(self);
        }
    }

    ///Moves the recorded frame into its ring slot and signals the execution
    ///role. Recording for the next frame can start immediately.
    pub fn finish(&mut self) {
        debug_assert!(self.inside_frame, "finish without begin_frame");
        self.cur_render_step = None;
        let frame = self.cur_frame;

        for push_buffer in self.ring.registered_push_buffers(frame) {
            push_buffer.end();
        }

        let steps = core::mem::take(&mut self.steps);
        let init_steps = core::mem::take(&mut self.init_steps);
        self.ring.submit(
            frame,
            steps,
            init_steps,
            Some(&mut self.deleter),
            RunType::Submit,
        );

        self.cur_frame = (self.cur_frame + 1) % FRAME_RING_SIZE;
        self.inside_frame = false;
    }

    ///Pushes everything recorded so far to the execution role and waits for
    ///it to complete, staying on the current frame. Needed by the sync
    ///readbacks.
    fn flush_sync(&mut self) {
        self.cur_render_step = None;
        let frame = self.cur_frame;
        let steps = core::mem::take(&mut self.steps);
        let init_steps = core::mem::take(&mut self.init_steps);
        self.ring.submit(frame, steps, init_steps, None, RunType::Sync);
        self.ring.wait_sync(frame);
    }

    ///Blocks until the execution role has caught up with every submitted
    ///frame. Call before destructive teardown.
    pub fn wait_until_queue_idle(&mut self) {
        self.ring.wait_idle();
    }

    ///Discards every queued-but-unexecuted step, submission side and ring
    ///slots both. Only valid when the referenced objects are already known
    ///dead (context loss); backend state stays whatever the last executed
    ///frame left behind.
    pub fn wipe(&mut self) {
        self.steps.clear();
        self.init_steps.clear();
        self.cur_render_step = None;
        self.ring.wipe_slots();
    }

    ///Pauses the execution role and drains the ring. The executor's loop
    ///returns false once it observes the stop; join its thread afterwards.
    pub fn stop(&mut self) {
        self.ring.stop();
        self.ring.wait_idle();
        self.steps.clear();
        self.init_steps.clear();
        self.cur_render_step = None;
    }

    ///New backbuffer dimensions, consulted by backbuffer-relative viewports
    ///and scissors.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.ring.resize(width, height);
    }

    ///Applied by the execution role before the next swap, if it changed.
    pub fn set_swap_interval(&mut self, interval: i32) {
        self.ring.set_swap_interval(interval);
    }

    ///Android-style teardown: from here on deleters forget native objects
    ///instead of freeing them and queued steps are dropped unexecuted.
    pub fn set_skip_gl_calls(&mut self) {
        self.ring.set_skip_gl_calls();
    }

    ///Sticky: the execution role observed an out-of-memory condition.
    pub fn saw_out_of_memory(&self) -> bool {
        self.ring.saw_out_of_memory()
    }

    pub fn cur_frame(&self) -> usize {
        self.cur_frame
    }
}

///Execution half: drives a [GlDevice] from the frame ring. Owned by the one
///thread that owns the context.
pub struct RenderExecutor {
    runner: QueueRunner,
    ring: Arc<FrameRing>,
    frame_index: usize,
    advance: bool,
    strategy: BufferStrategy,
    swap_fn: Option<Box<dyn FnMut() + Send>>,
    swap_interval_fn: Option<Box<dyn FnMut(i32) + Send>>,
    first_frame: bool,
}

impl RenderExecutor {
    pub fn runner(&self) -> &QueueRunner {
        &self.runner
    }

    ///Called by the execution role around frame boundaries to present.
    pub fn set_swap_function(&mut self, swap: impl FnMut() + Send + 'static) {
        self.swap_fn = Some(Box::new(swap));
    }

    pub fn set_swap_interval_function(&mut self, swap_interval: impl FnMut(i32) + Send + 'static) {
        self.swap_interval_fn = Some(Box::new(swap_interval));
    }

    pub fn buffer_strategy(&self) -> BufferStrategy {
        self.strategy
    }

    ///One-time setup on the context thread: device objects and the streaming
    ///buffer strategy.
    ///
    ///Mapping notes: NVIDIA drivers like mapping with plain per-frame
    ///unmaps, Qualcomm wants explicit flush+invalidate, everything else is
    ///happier with plain uploads.
    pub fn start<D: GlDevice>(&mut self, device: &mut D) {
        self.runner.create_device_objects(device);

        let caps = self.runner.caps();
        let map_buffers =
            (caps.buffer_storage || caps.map_buffer_range) && !caps.any_map_buffer_slow;
        self.strategy = if map_buffers {
            match caps.gpu_vendor {
                GpuVendor::Nvidia => BufferStrategy::FrameUnmap,
                GpuVendor::Qualcomm => BufferStrategy::FlushInvalidateUnmap,
                GpuVendor::Other => BufferStrategy::Subdata,
            }
        } else {
            BufferStrategy::Subdata
        };
        #[cfg(feature = "logging")]
        log::debug!("streaming buffer strategy: {:?}", self.strategy);
    }

    ///Runs frames until the manager stops the ring. Returns true if it did
    ///anything.
    pub fn thread_frame<D: GlDevice>(&mut self, device: &mut D) -> bool {
        //sync flushes complete mid-frame work without leaving the slot, so
        // keep going until a full frame is done
        loop {
            if self.advance {
                self.frame_index = (self.frame_index + 1) % FRAME_RING_SIZE;
                self.advance = false;
            }
            let Some(mut work) = self.ring.acquire(self.frame_index) else {
                return false;
            };

            let skip_gl_calls = self.ring.skip_gl_calls();
            let mut retired = core::mem::take(&mut work.retired_deleter);
            retired.perform(device, &self.ring, skip_gl_calls);

            let run_type = work.run_type;
            self.run(device, work);

            match run_type {
                RunType::Submit => {
                    self.ring.fence_submit(self.frame_index);
                    if let Some(interval) = self.ring.take_swap_interval_change()
                        && let Some(swap_interval) = &mut self.swap_interval_fn
                    {
                        swap_interval(interval);
                    }
                    if let Some(swap) = &mut self.swap_fn {
                        swap();
                    }
                    self.advance = true;
                    return true;
                }
                RunType::Sync => {
                    self.ring.fence_sync(self.frame_index);
                }
            }
        }
    }

    fn run<D: GlDevice>(&mut self, device: &mut D, work: FrameWork) {
        if self.first_frame {
            #[cfg(feature = "logging")]
            log::debug!("running first frame ({})", self.frame_index);
            self.first_frame = false;
        }

        let FrameWork {
            steps,
            init_steps,
            push_buffers,
            ..
        } = work;

        self.runner.run_init_steps(device, init_steps);

        //after init steps, so freshly created backing buffers exist
        let skip_gl_calls = self.ring.skip_gl_calls();
        if !skip_gl_calls {
            for push_buffer in &push_buffers {
                push_buffer.flush(device);
                push_buffer.unmap_device(device);
            }
        }

        self.runner.run_steps(device, steps);

        if !skip_gl_calls {
            for push_buffer in &push_buffers {
                push_buffer.map_device(device, self.strategy);
            }
        }
    }

    ///`start`, then frames until stopped, then `shutdown`. The whole thread
    ///body for hosts without their own loop.
    pub fn run_loop<D: GlDevice>(&mut self, device: &mut D) {
        self.start(device);
        while self.thread_frame(device) {}
        self.shutdown(device);
    }

    ///Drains leftover deleters and queued steps, then destroys device
    ///objects. Run on the context thread after the manager stopped the ring.
    pub fn shutdown<D: GlDevice>(&mut self, device: &mut D) {
        let skip_gl_calls = self.ring.skip_gl_calls();
        for slot in &self.ring.slots {
            let mut pull = slot.pull.lock().unwrap();
            let mut prev = core::mem::take(&mut pull.deleter_prev);
            let mut current = core::mem::take(&mut pull.deleter);
            let steps = core::mem::take(&mut pull.steps);
            let init_steps = core::mem::take(&mut pull.init_steps);
            drop(pull);

            prev.perform(device, &self.ring, skip_gl_calls);
            current.perform(device, &self.ring, skip_gl_calls);
            drop(steps);
            drop(init_steps);
        }
        self.runner.destroy_device_objects(device);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc,
        },
        time::Duration,
    };

    use glint::{
        caps::CopyImageSupport,
        device::{
            GlError,
            trace::{TraceCall, TraceDevice},
        },
    };
    use static_assertions::assert_impl_all;

    use super::*;

    fn setup() -> (RenderManager, RenderExecutor, TraceDevice) {
        let (manager, executor) = RenderManager::new(DeviceCaps::default());
        (manager, executor, TraceDevice::new())
    }

    ///Records one empty frame and runs it.
    fn pump(manager: &mut RenderManager, executor: &mut RenderExecutor, device: &TraceDevice) {
        manager.begin_frame();
        manager.finish();
        assert!(executor.thread_frame(&mut device.clone()));
    }

    #[test]
    fn roles_are_send() {
        assert_impl_all!(RenderManager: Send);
        assert_impl_all!(RenderExecutor: Send);
    }

    #[test]
    fn commands_replay_in_recorded_order() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);
        manager.resize(100, 100);
        device.take_calls();

        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "present",
        );
        manager.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            w: 100.0,
            h: 100.0,
            min_z: 0.0,
            max_z: 1.0,
        });
        manager.clear(0xFF0000FF, 0.0, 0, AspectMask::COLOR, 0xF, None);
        manager.draw(Primitive::Triangles, 0, 3);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));

        let trace: Vec<TraceCall> = device
            .take_calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    TraceCall::Viewport(..)
                        | TraceCall::ClearColor(..)
                        | TraceCall::Clear(..)
                        | TraceCall::DrawArrays(..)
                )
            })
            .collect();
        assert_eq!(
            trace,
            vec![
                TraceCall::Viewport(0.0, 0.0, 100.0, 100.0),
                TraceCall::ClearColor([1.0, 0.0, 0.0, 1.0]),
                TraceCall::Clear(AspectMask::COLOR),
                TraceCall::DrawArrays(Primitive::Triangles, 0, 3),
            ]
        );
    }

    #[test]
    fn empty_keep_pass_emits_nothing() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);
        device.take_calls();

        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "noop",
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert_eq!(device.take_calls(), vec![]);
    }

    #[test]
    fn clearing_pass_with_no_commands_binds_once() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);
        device.take_calls();

        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Clear,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0xFF000000,
            0.0,
            0,
            "clear only",
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));

        let calls = device.take_calls();
        let binds = calls
            .iter()
            .filter(|call| matches!(call, TraceCall::BindFramebuffer(..)))
            .count();
        assert_eq!(binds, 1);
        assert!(calls.contains(&TraceCall::Clear(AspectMask::COLOR)));
    }

    #[test]
    fn redundant_rebind_reuses_the_open_step() {
        let (mut manager, _executor, _device) = setup();
        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "a",
        );
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "b",
        );
        assert_eq!(manager.steps.len(), 1);
        //a requested clear forces a fresh step
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Clear,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "c",
        );
        assert_eq!(manager.steps.len(), 2);
        manager.finish();
    }

    #[test]
    #[should_panic(expected = "active render pass")]
    fn draw_without_pass_is_a_contract_violation() {
        let (mut manager, _executor, _device) = setup();
        manager.begin_frame();
        manager.draw(Primitive::Triangles, 0, 3);
    }

    #[test]
    fn texture_realizes_and_gains_mips_in_order() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        manager.begin_frame();
        let texture = manager.create_texture(TextureTarget::Texture2D, 4, 4, 1, 1);
        assert!(!texture.is_realized());
        manager.texture_image(
            &texture,
            0,
            4,
            4,
            DataFormat::R8G8B8A8Unorm,
            vec![0xAB; 4 * 4 * 4],
            false,
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(texture.is_realized());
        assert!(!texture.has_mips());

        manager.begin_frame();
        manager.finalize_texture(&texture, 3, true);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(texture.has_mips());
        assert!(
            device
                .take_calls()
                .contains(&TraceCall::GenerateMipmap(TextureTarget::Texture2D))
        );
    }

    #[test]
    fn deletion_happens_exactly_one_ring_cycle_late() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        //frame 0: realize the texture
        manager.begin_frame();
        let texture = manager.create_texture(TextureTarget::Texture2D, 4, 4, 1, 1);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        device.take_calls();

        let deleted = |device: &TraceDevice| {
            device
                .take_calls()
                .iter()
                .any(|call| matches!(call, TraceCall::DeleteTexture(_)))
        };

        //frame 1: queue the deletion
        manager.begin_frame();
        manager.delete_texture(texture.clone());
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(!deleted(&device));

        //frames 2 and 3: still alive
        pump(&mut manager, &mut executor, &device);
        assert!(!deleted(&device));
        pump(&mut manager, &mut executor, &device);
        assert!(!deleted(&device));

        //frame 4 reoccupies the deletion frame's slot: freed now, once
        pump(&mut manager, &mut executor, &device);
        assert!(deleted(&device));
        assert!(texture.lock_state().native.is_none());

        pump(&mut manager, &mut executor, &device);
        assert!(!deleted(&device));
    }

    #[test]
    fn begin_frame_applies_backpressure_at_ring_depth() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();

        let (progress_tx, progress_rx) = mpsc::channel();
        let submission = std::thread::spawn(move || {
            for _ in 0..3 {
                manager.begin_frame();
                manager.finish();
            }
            progress_tx.send("three queued").unwrap();
            //slot 0 is unretired, this has to block
            manager.begin_frame();
            progress_tx.send("fourth began").unwrap();
            manager.finish();
            manager
        });

        progress_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("three frames should queue without an executor");
        assert!(
            progress_rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "fourth begin_frame must block while frame 0 is unretired"
        );

        //retire frame 0 and the submission side unblocks
        assert!(executor.thread_frame(&mut exec_device));
        progress_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("begin_frame should unblock once the slot retires");

        let mut manager = submission.join().unwrap();
        for _ in 0..3 {
            assert!(executor.thread_frame(&mut exec_device));
        }
        manager.stop();
    }

    #[test]
    fn push_buffer_ranges_never_overlap_and_defragment_merges() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        let push_buffer = manager.create_push_buffer(0, BufferTarget::Array, 64, "stream");
        manager.begin_frame();
        let a = push_buffer.push(&mut manager, &[1u8; 16]);
        let b = push_buffer.push(&mut manager, &[2u8; 10]);
        let c = push_buffer.push(&mut manager, &[3u8; 40]);

        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 16);
        assert!(Arc::ptr_eq(&a.buffer, &b.buffer));
        //no overlap within the shared backing buffer
        assert!(b.offset as usize >= a.offset as usize + 16);
        //the big allocation overflowed into a fresh buffer
        assert!(!Arc::ptr_eq(&a.buffer, &c.buffer));
        assert_eq!(c.offset, 0);
        assert_eq!(push_buffer.buffer_count(), 2);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));

        //both written ranges were uploaded
        let uploads: Vec<usize> = device
            .take_calls()
            .into_iter()
            .filter_map(|call| match call {
                TraceCall::BufferSubData { len, .. } => Some(len),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![28, 40]);

        //two more frames until slot 0 comes around again
        pump(&mut manager, &mut executor, &device);
        pump(&mut manager, &mut executor, &device);

        //reopening the write window merges the chain into one buffer
        manager.begin_frame();
        assert_eq!(push_buffer.buffer_count(), 1);
        let big = push_buffer.push(&mut manager, &[4u8; 100]);
        assert_eq!(big.offset, 0);
        assert_eq!(push_buffer.buffer_count(), 1);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
    }

    #[test]
    fn shader_and_program_failures_stay_local() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        device.fail_next_compile("0:1: syntax error");
        manager.begin_frame();
        let bad = manager.create_shader(ShaderStage::Fragment, "garbage", "fs_bad");
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(bad.is_failed());
        assert!(!bad.is_valid());
        let failure = bad.failure().expect("failure must be recorded");
        assert!(failure.to_string().contains("syntax error"));

        //a program holding the failed shader becomes inert instead of crashing
        manager.begin_frame();
        let vs = manager.create_shader(ShaderStage::Vertex, "void main() {}", "vs_ok");
        let program = manager.create_program(
            vec![vs, bad],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            ProgramFlags::default(),
        );
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "draw",
        );
        manager.bind_program(&program);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(program.is_failed());
        //the failed program is bound as null
        assert!(
            device
                .take_calls()
                .contains(&TraceCall::UseProgram(glint::device::GlObject::NONE))
        );
    }

    #[test]
    fn out_of_memory_latches_the_sticky_flag() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);
        assert!(!manager.saw_out_of_memory());

        device.inject_error(GlError::OutOfMemory);
        manager.begin_frame();
        let texture = manager.create_texture(TextureTarget::Texture2D, 4, 4, 1, 1);
        manager.texture_image(
            &texture,
            0,
            4,
            4,
            DataFormat::R8G8B8A8Unorm,
            vec![0; 64],
            false,
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(manager.saw_out_of_memory());
    }

    #[test]
    fn by_name_uniform_locations_are_cached_per_program() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        manager.begin_frame();
        let vs = manager.create_shader(ShaderStage::Vertex, "void main() {}", "vs");
        let fs = manager.create_shader(ShaderStage::Fragment, "void main() {}", "fs");
        let program = manager.create_program(
            vec![vs, fs],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            ProgramFlags::default(),
        );
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "uniforms",
        );
        manager.bind_program(&program);
        manager.set_uniform_f_by_name("u_tint", &[1.0, 0.5, 0.25, 1.0]);
        manager.set_uniform_f_by_name("u_tint", &[0.0, 0.0, 0.0, 1.0]);
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));

        let lookups = device
            .take_calls()
            .iter()
            .filter(|call| matches!(call, TraceCall::UniformLocation(_, name) if name == "u_tint"))
            .count();
        assert_eq!(lookups, 1);
    }

    #[test]
    fn copy_and_blit_pick_capability_gated_variants() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        manager.begin_frame();
        let src = manager.create_framebuffer(32, 32, false, "src");
        let dst = manager.create_framebuffer(32, 32, false, "dst");
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        device.take_calls();

        manager.begin_frame();
        manager.copy_framebuffer(
            &src,
            Rect2D::new(0, 0, 16, 16),
            &dst,
            Offset2D { x: 8, y: 8 },
            AspectMask::COLOR,
            "copy",
        );
        manager.blit_framebuffer(
            &src,
            Rect2D::new(0, 0, 32, 32),
            &dst,
            Rect2D::new(0, 0, 16, 16),
            AspectMask::COLOR,
            true,
            "blit",
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));

        let calls = device.take_calls();
        assert!(calls.iter().any(|call| matches!(
            call,
            TraceCall::CopyImageSubData {
                variant: CopyImageSupport::Arb,
                ..
            }
        )));
        assert!(
            calls
                .iter()
                .any(|call| matches!(call, TraceCall::BlitFramebuffer { linear: true, .. }))
        );
    }

    #[test]
    fn copy_without_capability_is_skipped() {
        let (mut manager, mut executor) = RenderManager::new(DeviceCaps::gles2());
        let device = TraceDevice::new();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);

        manager.begin_frame();
        let src = manager.create_framebuffer(32, 32, false, "src");
        let dst = manager.create_framebuffer(32, 32, false, "dst");
        manager.copy_framebuffer(
            &src,
            Rect2D::new(0, 0, 16, 16),
            &dst,
            Offset2D { x: 0, y: 0 },
            AspectMask::COLOR,
            "copy",
        );
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert!(
            !device
                .take_calls()
                .iter()
                .any(|call| matches!(call, TraceCall::CopyImageSubData { .. }))
        );
    }

    #[test]
    fn sync_readback_returns_executed_pixels() {
        let (mut manager, mut executor, device) = setup();
        device.set_fill_pixel([9, 8, 7, 6]);
        let mut exec_device = device.clone();
        let render_thread = std::thread::spawn(move || executor.run_loop(&mut exec_device));

        manager.resize(32, 32);
        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Clear,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0xFF060708,
            0.0,
            0,
            "scene",
        );
        let mut pixels = [0u8; 4 * 4 * 4];
        manager
            .copy_framebuffer_to_memory_sync(
                None,
                AspectMask::COLOR,
                Rect2D::new(0, 0, 4, 4),
                DataFormat::R8G8B8A8Unorm,
                4,
                &mut pixels,
                "screenshot",
            )
            .unwrap();
        for px in pixels.chunks_exact(4) {
            assert_eq!(px, [9, 8, 7, 6]);
        }

        //the frame stays open after a sync flush; a fresh pass keeps working
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            RenderPassAction::Keep,
            0,
            0.0,
            0,
            "after readback",
        );
        manager.draw(Primitive::Triangles, 0, 3);
        manager.finish();
        manager.stop();
        render_thread.join().unwrap();
    }

    #[test]
    fn depth_readback_is_rejected() {
        let (mut manager, _executor, _device) = setup();
        manager.begin_frame();
        let mut pixels = [0u8; 16];
        let result = manager.copy_framebuffer_to_memory_sync(
            None,
            AspectMask::DEPTH,
            Rect2D::new(0, 0, 2, 2),
            DataFormat::D24S8,
            2,
            &mut pixels,
            "depth",
        );
        assert!(matches!(result, Err(ReadbackError::UnsupportedAspect(_))));
        manager.finish();
    }

    #[test]
    fn wait_until_queue_idle_and_swap_callbacks() {
        let (mut manager, mut executor, device) = setup();
        let swaps = Arc::new(AtomicUsize::new(0));
        let swap_counter = swaps.clone();
        executor.set_swap_function(move || {
            swap_counter.fetch_add(1, Ordering::SeqCst);
        });
        let intervals = Arc::new(AtomicUsize::new(0));
        let interval_counter = intervals.clone();
        executor.set_swap_interval_function(move |_| {
            interval_counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut exec_device = device.clone();
        let render_thread = std::thread::spawn(move || executor.run_loop(&mut exec_device));

        for _ in 0..5 {
            manager.begin_frame();
            manager.bind_framebuffer_as_render_target(
                None,
                RenderPassAction::Clear,
                RenderPassAction::Keep,
                RenderPassAction::Keep,
                0,
                0.0,
                0,
                "frame",
            );
            manager.finish();
        }
        manager.wait_until_queue_idle();

        let binds = device
            .calls()
            .iter()
            .filter(|call| matches!(call, TraceCall::BindFramebuffer(..)))
            .count();
        assert_eq!(binds, 5);

        manager.stop();
        render_thread.join().unwrap();
        assert_eq!(swaps.load(Ordering::SeqCst), 5);
        //the initial interval is applied once, never re-applied
        assert_eq!(intervals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wipe_discards_unexecuted_work() {
        let (mut manager, mut executor, device) = setup();
        let mut exec_device = device.clone();
        executor.start(&mut exec_device);
        device.take_calls();

        manager.begin_frame();
        manager.bind_framebuffer_as_render_target(
            None,
            RenderPassAction::Clear,
            RenderPassAction::Clear,
            RenderPassAction::Clear,
            0,
            1.0,
            0,
            "doomed",
        );
        manager.wipe();
        manager.finish();
        assert!(executor.thread_frame(&mut exec_device));
        assert_eq!(device.take_calls(), vec![]);
    }
}
