//! Executes recorded frames against a [GlDevice].
//!
//! Everything in here runs on the execution role. The runner owns no context
//! state beyond the global VAO; per-pass state filtering lives in locals so a
//! pass always starts from the known post-pass baseline.

use std::sync::Arc;

use glint::{
    ShaderFailure,
    caps::{CopyImageSupport, DeviceCaps},
    device::{GlDevice, GlError, GlObject, TexParameter},
    resources::{Framebuffer, MAX_TEXTURE_SLOTS, Program, Texture},
    state::{
        AspectMask, Attachment, BindFbTarget, BufferTarget, Capability, DataFormat,
        FramebufferStatus, Rect2D, RenderbufferFormat, TexFilter, TexWrap, TextureTarget,
    },
};
use smallvec::SmallVec;

use crate::{
    command::{InitStep, RenderCommand, RenderPassAction, RenderStep, Step, UniformRef},
    frame::FrameRing,
};

fn unpack_color32(color: u32) -> [f32; 4] {
    [
        (color & 0xFF) as f32 / 255.0,
        ((color >> 8) & 0xFF) as f32 / 255.0,
        ((color >> 16) & 0xFF) as f32 / 255.0,
        (color >> 24) as f32 / 255.0,
    ]
}

pub struct QueueRunner {
    caps: DeviceCaps,
    ring: Arc<FrameRing>,
    global_vao: GlObject,
}

impl QueueRunner {
    pub(crate) fn new(ring: Arc<FrameRing>, caps: DeviceCaps) -> Self {
        QueueRunner {
            caps,
            ring,
            global_vao: GlObject::NONE,
        }
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    pub(crate) fn create_device_objects<D: GlDevice>(&mut self, device: &mut D) {
        if self.caps.vertex_array_object {
            self.global_vao = device.gen_vertex_array();
        }
    }

    pub(crate) fn destroy_device_objects<D: GlDevice>(&mut self, device: &mut D) {
        if !self.global_vao.is_none() {
            device.delete_vertex_array(self.global_vao);
            self.global_vao = GlObject::NONE;
        }
    }

    ///Realizes every queued handle, in order. Failures mark the handle and
    ///keep going; nothing in here unwinds.
    pub fn run_init_steps<D: GlDevice>(&mut self, device: &mut D, steps: Vec<InitStep>) {
        if steps.is_empty() || self.ring.skip_gl_calls() {
            return;
        }
        device.active_texture(0);
        let mut bound_texture = GlObject::NONE;
        let mut allocated = false;

        for step in steps {
            match step {
                InitStep::CreateTexture { texture } => {
                    let native = device.gen_texture();
                    device.bind_texture(texture.target(), native);
                    bound_texture = native;
                    texture.lock_state().native = native;
                    texture.set_realized();
                }
                InitStep::CreateBuffer { buffer, usage } => {
                    let native = device.gen_buffer();
                    device.bind_buffer(buffer.target(), native);
                    device.buffer_data(buffer.target(), buffer.size(), usage);
                    buffer.lock_state().native = native;
                }
                InitStep::CreateShader { shader } => {
                    let source = shader.lock_state().source.clone();
                    match device.compile_shader(shader.stage(), &source) {
                        Ok(native) => {
                            shader.lock_state().native = native;
                            shader.set_valid();
                        }
                        Err(info_log) => {
                            let failure = ShaderFailure::Compile {
                                stage: shader.stage(),
                                desc: shader.desc().to_owned(),
                                log: info_log,
                            };
                            #[cfg(feature = "logging")]
                            log::error!("{failure}");
                            shader.lock_state().failure = Some(failure);
                            shader.set_failed();
                        }
                    }
                }
                InitStep::CreateProgram { program } => {
                    self.init_create_program(device, &program);
                }
                InitStep::CreateFramebuffer { framebuffer } => {
                    self.init_create_framebuffer(device, &framebuffer);
                    //framebuffer setup rebinds textures behind our back
                    bound_texture = GlObject::NONE;
                    allocated = true;
                }
                InitStep::CreateInputLayout { .. } => {
                    //nothing to realize until layouts own per-layout VAOs
                }
                InitStep::TextureImage {
                    texture,
                    level,
                    width,
                    height,
                    format,
                    data,
                    linear_filter,
                } => {
                    let mut state = texture.lock_state();
                    if state.native != bound_texture {
                        device.bind_texture(texture.target(), state.native);
                        bound_texture = state.native;
                    }
                    device.tex_image_2d(
                        texture.target(),
                        level,
                        format,
                        width,
                        height,
                        Some(&data),
                    );
                    allocated = true;

                    let filter = if linear_filter {
                        TexFilter::Linear
                    } else {
                        TexFilter::Nearest
                    };
                    state.wrap_s = Some(TexWrap::ClampToEdge);
                    state.wrap_t = Some(TexWrap::ClampToEdge);
                    state.mag_filter = Some(filter);
                    state.min_filter = Some(filter);
                    device.tex_parameter(
                        texture.target(),
                        TexParameter::WrapS(TexWrap::ClampToEdge),
                    );
                    device.tex_parameter(
                        texture.target(),
                        TexParameter::WrapT(TexWrap::ClampToEdge),
                    );
                    device.tex_parameter(texture.target(), TexParameter::MagFilter(filter));
                    device.tex_parameter(texture.target(), TexParameter::MinFilter(filter));
                    drop(state);
                    if level == 0 {
                        texture.set_realized();
                    }
                }
                InitStep::TextureFinalize {
                    texture,
                    max_level,
                    gen_mips,
                } => {
                    let mut state = texture.lock_state();
                    if state.native != bound_texture {
                        device.bind_texture(texture.target(), state.native);
                        bound_texture = state.native;
                    }
                    if self.caps.texture_max_level {
                        device.tex_parameter(texture.target(), TexParameter::MaxLevel(max_level));
                    }
                    state.max_lod = max_level as f32;
                    drop(state);
                    if gen_mips {
                        device.generate_mipmap(texture.target());
                        texture.set_has_mips(true);
                    }
                }
                InitStep::BufferSubdata {
                    buffer,
                    offset,
                    data,
                } => {
                    let native = buffer.lock_state().native;
                    device.bind_buffer(buffer.target(), native);
                    device.buffer_sub_data(buffer.target(), offset, &data);
                }
            }
        }

        if allocated {
            //high-resolution targets plus texture replacement can exhaust
            // VRAM; detect it here instead of crashing later
            match device.get_error() {
                GlError::OutOfMemory => {
                    #[cfg(feature = "logging")]
                    log::warn!("context ran out of GPU memory, continuing degraded");
                    self.ring.latch_out_of_memory();
                }
                GlError::Other(_err) => {
                    #[cfg(feature = "logging")]
                    log::warn!("error after init steps: {_err:#x}");
                }
                GlError::NoError => {}
            }
        }
    }

    fn init_create_program<D: GlDevice>(&mut self, device: &mut D, program: &Arc<Program>) {
        let mut natives: SmallVec<[GlObject; 4]> = SmallVec::new();
        for shader in program.shaders() {
            let native = shader.lock_state().native;
            if native.is_none() {
                #[cfg(feature = "logging")]
                log::error!(
                    "program links against shader '{}' that never compiled",
                    shader.desc()
                );
                program.set_failed();
                return;
            }
            natives.push(native);
        }

        let native = device.create_program();
        for shader in &natives {
            device.attach_shader(native, *shader);
        }
        for semantic in program.semantics() {
            device.bind_attrib_location(native, semantic.location, &semantic.attrib);
        }
        if program.flags().support_dual_source && self.caps.dual_source_blend {
            device.bind_frag_data_location(native, 0, 0, "fragColor0");
            device.bind_frag_data_location(native, 0, 1, "fragColor1");
        }

        program.lock_state().native = native;
        if let Err(_log) = device.link_program(native) {
            #[cfg(feature = "logging")]
            {
                let failure = ShaderFailure::Link { log: _log };
                log::error!("{failure}");
                for shader in program.shaders() {
                    log::error!("  stage {:?}: {}", shader.stage(), shader.desc());
                }
            }
            program.set_failed();
            return;
        }

        device.use_program(native);
        for slot in program.queries() {
            slot.resolve(device.uniform_location(native, slot.name()));
        }
        for init in program.initializers() {
            if let Some(loc) = init.slot.location()
                && loc >= 0
            {
                device.uniform_i(loc, &[init.value]);
            }
        }
    }

    fn init_create_framebuffer<D: GlDevice>(&mut self, device: &mut D, fb: &Arc<Framebuffer>) {
        let width = fb.width();
        let height = fb.height();

        let fbo = device.gen_framebuffer();
        let color = device.gen_texture();
        device.bind_texture(TextureTarget::Texture2D, color);
        device.tex_image_2d(
            TextureTarget::Texture2D,
            0,
            DataFormat::R8G8B8A8Unorm,
            width,
            height,
            None,
        );
        {
            let mut state = fb.color_texture.lock_state();
            state.native = color;
            state.wrap_s = Some(TexWrap::ClampToEdge);
            state.wrap_t = Some(TexWrap::ClampToEdge);
            state.mag_filter = Some(TexFilter::Linear);
            state.min_filter = Some(TexFilter::Linear);
            state.can_wrap = width.count_ones() == 1 && height.count_ones() == 1;
            state.max_lod = 0.0;
        }
        device.tex_parameter(
            TextureTarget::Texture2D,
            TexParameter::WrapS(TexWrap::ClampToEdge),
        );
        device.tex_parameter(
            TextureTarget::Texture2D,
            TexParameter::WrapT(TexWrap::ClampToEdge),
        );
        device.tex_parameter(
            TextureTarget::Texture2D,
            TexParameter::MagFilter(TexFilter::Linear),
        );
        device.tex_parameter(
            TextureTarget::Texture2D,
            TexParameter::MinFilter(TexFilter::Linear),
        );
        if self.caps.texture_max_level {
            device.tex_parameter(TextureTarget::Texture2D, TexParameter::MaxLevel(0));
        }
        fb.color_texture.set_realized();

        let mut state = fb.lock_state();
        state.native = fbo;
        if fb.has_z_stencil() {
            if !self.caps.gles || self.caps.packed_depth_stencil {
                //24-bit Z, 8-bit stencil combined
                let rb = device.gen_renderbuffer();
                device.bind_renderbuffer(rb);
                device.renderbuffer_storage(RenderbufferFormat::Depth24Stencil8, width, height);
                state.z_stencil_buffer = rb;

                device.bind_framebuffer(BindFbTarget::Both, fbo);
                device.framebuffer_texture_2d(Attachment::Color0, color);
                device.framebuffer_renderbuffer(Attachment::Depth, rb);
                device.framebuffer_renderbuffer(Attachment::Stencil, rb);
            } else {
                //16/24-bit Z with a separate 8-bit stencil
                let z = device.gen_renderbuffer();
                device.bind_renderbuffer(z);
                device.renderbuffer_storage(
                    if self.caps.depth24 {
                        RenderbufferFormat::DepthComponent24
                    } else {
                        RenderbufferFormat::DepthComponent16
                    },
                    width,
                    height,
                );
                state.z_buffer = z;

                let stencil = device.gen_renderbuffer();
                device.bind_renderbuffer(stencil);
                device.renderbuffer_storage(RenderbufferFormat::StencilIndex8, width, height);
                state.stencil_buffer = stencil;

                device.bind_framebuffer(BindFbTarget::Both, fbo);
                device.framebuffer_texture_2d(Attachment::Color0, color);
                device.framebuffer_renderbuffer(Attachment::Depth, z);
                device.framebuffer_renderbuffer(Attachment::Stencil, stencil);
            }
        } else {
            device.bind_framebuffer(BindFbTarget::Both, fbo);
            device.framebuffer_texture_2d(Attachment::Color0, color);
        }
        drop(state);

        match device.check_framebuffer_status() {
            FramebufferStatus::Complete => {}
            _status => {
                #[cfg(feature = "logging")]
                log::error!("framebuffer '{}' incomplete: {_status:?}", fb.tag());
            }
        }

        device.bind_renderbuffer(GlObject::NONE);
        device.bind_texture(TextureTarget::Texture2D, GlObject::NONE);
    }

    ///Dispatches each step, strictly in recorded order.
    pub fn run_steps<D: GlDevice>(&mut self, device: &mut D, steps: Vec<Step>) {
        if self.ring.skip_gl_calls() {
            return;
        }
        for step in steps {
            match step {
                Step::Render(render) => self.perform_render_pass(device, render),
                Step::Copy {
                    src,
                    src_rect,
                    dst,
                    dst_pos,
                    aspects,
                    tag,
                } => self.perform_copy(device, &src, src_rect, &dst, dst_pos, aspects, tag),
                Step::Blit {
                    src,
                    src_rect,
                    dst,
                    dst_rect,
                    aspects,
                    filter_linear,
                    ..
                } => self.perform_blit(device, &src, src_rect, &dst, dst_rect, aspects, filter_linear),
                Step::Readback {
                    src,
                    src_rect,
                    aspects,
                    ..
                } => self.perform_readback(device, src.as_deref(), src_rect, aspects),
                Step::ReadbackImage {
                    texture,
                    mip_level,
                    src_rect,
                    ..
                } => self.perform_readback_image(device, &texture, mip_level, src_rect),
            }
        }
    }

    fn perform_render_pass<D: GlDevice>(&mut self, device: &mut D, step: RenderStep) {
        let all_keep = step.color_action == RenderPassAction::Keep
            && step.depth_action == RenderPassAction::Keep
            && step.stencil_action == RenderPassAction::Keep;
        if step.commands.is_empty() && all_keep {
            //nothing would be observable, skip the bind too
            return;
        }
        #[cfg(feature = "logging")]
        log::trace!(
            "render pass '{}': {} commands, {} draws",
            step.tag,
            step.commands.len(),
            step.num_draws
        );

        let (on_backbuffer, target_height) = match &step.framebuffer {
            Some(fb) => {
                device.bind_framebuffer(BindFbTarget::Both, fb.lock_state().native);
                (false, fb.height())
            }
            None => {
                device.bind_framebuffer(BindFbTarget::Both, GlObject::NONE);
                (true, self.ring.target_size().1)
            }
        };

        //load actions: discard hints first, then the clears
        let mut invalidate_mask = AspectMask::NONE;
        if step.color_action == RenderPassAction::DontCare {
            invalidate_mask |= AspectMask::COLOR;
        }
        if step.depth_action == RenderPassAction::DontCare {
            invalidate_mask |= AspectMask::DEPTH;
        }
        if step.stencil_action == RenderPassAction::DontCare {
            invalidate_mask |= AspectMask::STENCIL;
        }
        if !invalidate_mask.is_empty() && (self.caps.gles3 || !self.caps.gles) {
            device.invalidate_framebuffer(invalidate_mask);
        }

        let mut clear_mask = AspectMask::NONE;
        if step.color_action == RenderPassAction::Clear {
            device.clear_color(unpack_color32(step.clear_color));
            clear_mask |= AspectMask::COLOR;
        }
        if step.depth_action == RenderPassAction::Clear {
            device.clear_depth(step.clear_depth);
            clear_mask |= AspectMask::DEPTH;
        }
        if step.stencil_action == RenderPassAction::Clear {
            device.clear_stencil(step.clear_stencil);
            clear_mask |= AspectMask::STENCIL;
        }
        let mut color_mask: Option<u8> = None;
        if !clear_mask.is_empty() {
            device.color_mask(true, true, true, true);
            color_mask = Some(0xF);
            device.clear(clear_mask);
        }

        //every pass starts from the same baseline
        device.disable(Capability::DepthTest);
        device.disable(Capability::StencilTest);
        device.disable(Capability::Blend);
        device.disable(Capability::CullFace);
        device.disable(Capability::Dither);
        if self.caps.logic_op {
            device.disable(Capability::ColorLogicOp);
        }
        device.enable(Capability::ScissorTest);
        if !self.global_vao.is_none() {
            device.bind_vertex_array(self.global_vao);
        }

        let mut active_slot: u32 = 0;
        device.active_texture(0);

        //state filtering, all local to the pass
        let mut cur_tex: [Option<&Texture>; MAX_TEXTURE_SLOTS] = [None; MAX_TEXTURE_SLOTS];
        let mut cur_program: Option<&Arc<Program>> = None;
        let mut depth_enabled = false;
        let mut depth_write: Option<bool> = None;
        let mut depth_func = None;
        let mut stencil_enabled = false;
        let mut blend_enabled = false;
        let mut blend_eq = None;
        let mut logic_enabled = false;
        let mut cull_enabled = false;
        let mut dither_enabled = false;
        let mut attr_mask: u32 = 0;
        let mut cur_array_buffer = GlObject::NONE;
        let mut cur_elem_buffer = GlObject::NONE;

        for cmd in &step.commands {
            match cmd {
                RenderCommand::Depth {
                    enabled,
                    write,
                    func,
                } => {
                    if *enabled {
                        if !depth_enabled {
                            device.enable(Capability::DepthTest);
                            depth_enabled = true;
                        }
                        if depth_write != Some(*write) {
                            device.depth_mask(*write);
                            depth_write = Some(*write);
                        }
                        if depth_func != Some(*func) {
                            device.depth_func(*func);
                            depth_func = Some(*func);
                        }
                    } else if depth_enabled {
                        device.disable(Capability::DepthTest);
                        depth_enabled = false;
                    }
                }
                RenderCommand::Stencil {
                    enabled,
                    func,
                    reference,
                    compare_mask,
                    write_mask,
                    stencil_fail,
                    depth_fail,
                    pass,
                } => {
                    if *enabled {
                        if !stencil_enabled {
                            device.enable(Capability::StencilTest);
                            stencil_enabled = true;
                        }
                        device.stencil_func(*func, *reference, *compare_mask);
                        device.stencil_op(*stencil_fail, *depth_fail, *pass);
                        device.stencil_mask(*write_mask);
                    } else if stencil_enabled {
                        device.disable(Capability::StencilTest);
                        stencil_enabled = false;
                    }
                }
                RenderCommand::Blend {
                    mask,
                    enabled,
                    src_color,
                    dst_color,
                    src_alpha,
                    dst_alpha,
                    eq_color,
                    eq_alpha,
                } => {
                    if *enabled {
                        if !blend_enabled {
                            device.enable(Capability::Blend);
                            blend_enabled = true;
                        }
                        if blend_eq != Some((*eq_color, *eq_alpha)) {
                            device.blend_equation(*eq_color, *eq_alpha);
                            blend_eq = Some((*eq_color, *eq_alpha));
                        }
                        device.blend_func(*src_color, *dst_color, *src_alpha, *dst_alpha);
                    } else if blend_enabled {
                        device.disable(Capability::Blend);
                        blend_enabled = false;
                    }
                    if color_mask != Some(*mask) {
                        device.color_mask(
                            mask & 1 != 0,
                            mask & 2 != 0,
                            mask & 4 != 0,
                            mask & 8 != 0,
                        );
                        color_mask = Some(*mask);
                    }
                }
                RenderCommand::BlendColor { color } => {
                    device.blend_color(*color);
                }
                RenderCommand::LogicOp { enabled, op } => {
                    if !self.caps.logic_op {
                        continue;
                    }
                    if *enabled {
                        if !logic_enabled {
                            device.enable(Capability::ColorLogicOp);
                            logic_enabled = true;
                        }
                        device.logic_op(*op);
                    } else if logic_enabled {
                        device.disable(Capability::ColorLogicOp);
                        logic_enabled = false;
                    }
                }
                RenderCommand::Clear {
                    aspects,
                    clear_color,
                    clear_depth,
                    clear_stencil,
                    color_mask: clear_color_mask,
                    scissor,
                } => {
                    //scissor test stays enabled across the pass; a whole
                    // target clear drops it just for this call
                    match scissor {
                        None => device.disable(Capability::ScissorTest),
                        Some(rect) => device.scissor(*rect),
                    }
                    if color_mask != Some(*clear_color_mask) {
                        device.color_mask(
                            clear_color_mask & 1 != 0,
                            clear_color_mask & 2 != 0,
                            clear_color_mask & 4 != 0,
                            clear_color_mask & 8 != 0,
                        );
                        color_mask = Some(*clear_color_mask);
                    }
                    if aspects.contains(AspectMask::COLOR) {
                        device.clear_color(unpack_color32(*clear_color));
                    }
                    if aspects.contains(AspectMask::DEPTH) {
                        device.clear_depth(*clear_depth);
                    }
                    if aspects.contains(AspectMask::STENCIL) {
                        device.clear_stencil(*clear_stencil);
                    }
                    device.clear(*aspects);
                    if scissor.is_none() {
                        device.enable(Capability::ScissorTest);
                    }
                }
                RenderCommand::Invalidate { aspects } => {
                    if self.caps.gles3 || !self.caps.gles {
                        device.invalidate_framebuffer(*aspects);
                    }
                }
                RenderCommand::Viewport { viewport } => {
                    let mut y = viewport.y;
                    if on_backbuffer {
                        y = target_height as f32 - y - viewport.h;
                    }
                    device.viewport(viewport.x, y, viewport.w, viewport.h);
                    device.depth_range(viewport.min_z, viewport.max_z);
                }
                RenderCommand::Scissor { rect } => {
                    let mut rect = *rect;
                    if on_backbuffer {
                        rect.y = target_height - rect.y - rect.h;
                    }
                    device.scissor(rect);
                }
                RenderCommand::Uniform4F { uniform, count, v } => {
                    if let Some(loc) = resolve_uniform(device, cur_program, uniform) {
                        device.uniform_f(loc, &v[..*count as usize]);
                    }
                }
                RenderCommand::Uniform4I { uniform, count, v } => {
                    if let Some(loc) = resolve_uniform(device, cur_program, uniform) {
                        device.uniform_i(loc, &v[..*count as usize]);
                    }
                }
                RenderCommand::Uniform4Ui { uniform, count, v } => {
                    if let Some(loc) = resolve_uniform(device, cur_program, uniform) {
                        device.uniform_ui(loc, &v[..*count as usize]);
                    }
                }
                RenderCommand::UniformMatrix { uniform, m } => {
                    if let Some(loc) = resolve_uniform(device, cur_program, uniform) {
                        device.uniform_matrix4(loc, m);
                    }
                }
                RenderCommand::BindTexture { slot, texture } => {
                    let slot = *slot;
                    if slot != active_slot {
                        device.active_texture(slot);
                        active_slot = slot;
                    }
                    match texture {
                        Some(texture) => {
                            if !cur_tex[slot as usize]
                                .is_some_and(|cur| std::ptr::eq(cur, &**texture))
                            {
                                device
                                    .bind_texture(texture.target(), texture.lock_state().native);
                                cur_tex[slot as usize] = Some(texture.as_ref());
                            }
                        }
                        None => {
                            device.bind_texture(TextureTarget::Texture2D, GlObject::NONE);
                            cur_tex[slot as usize] = None;
                        }
                    }
                }
                RenderCommand::BindFbTexture {
                    slot,
                    framebuffer,
                    aspect,
                } => {
                    let slot = *slot;
                    if slot != active_slot {
                        device.active_texture(slot);
                        active_slot = slot;
                    }
                    if aspect.contains(AspectMask::COLOR) {
                        let color = &framebuffer.color_texture;
                        if !cur_tex[slot as usize].is_some_and(|cur| std::ptr::eq(cur, color)) {
                            device.bind_texture(
                                TextureTarget::Texture2D,
                                color.lock_state().native,
                            );
                            cur_tex[slot as usize] = Some(color);
                        }
                    } else {
                        #[cfg(feature = "logging")]
                        log::warn!(
                            "binding non-color aspects of '{}' as texture is unsupported",
                            framebuffer.tag()
                        );
                        cur_tex[slot as usize] = None;
                    }
                }
                RenderCommand::BindProgram { program } => {
                    if program.is_failed() {
                        //inert: draws under it go nowhere, which beats dying
                        device.use_program(GlObject::NONE);
                        cur_program = None;
                    } else if !cur_program.is_some_and(|cur| Arc::ptr_eq(cur, program)) {
                        device.use_program(program.lock_state().native);
                        cur_program = Some(program);
                    }
                }
                RenderCommand::BindVertexBuffer {
                    layout,
                    buffer,
                    offset,
                } => {
                    debug_assert!(!buffer.is_mapped(), "draw source buffer is still mapped");
                    let native = buffer.lock_state().native;
                    if native != cur_array_buffer {
                        device.bind_buffer(BufferTarget::Array, native);
                        cur_array_buffer = native;
                    }
                    let semantics = layout.semantics_mask();
                    let enable = semantics & !attr_mask;
                    let disable = !semantics & attr_mask;
                    for location in 0..u32::BITS {
                        if enable & (1 << location) != 0 {
                            device.enable_vertex_attrib(location);
                        }
                        if disable & (1 << location) != 0 {
                            device.disable_vertex_attrib(location);
                        }
                    }
                    attr_mask = semantics;
                    for entry in layout.entries() {
                        device.vertex_attrib_pointer(
                            entry.location,
                            entry.count,
                            entry.ty,
                            entry.normalized,
                            layout.stride(),
                            offset + entry.offset,
                        );
                    }
                }
                RenderCommand::BindIndexBuffer { buffer } => {
                    debug_assert!(!buffer.is_mapped(), "index buffer is still mapped");
                    let native = buffer.lock_state().native;
                    if native != cur_elem_buffer {
                        device.bind_buffer(BufferTarget::ElementArray, native);
                        cur_elem_buffer = native;
                    }
                }
                RenderCommand::GenMips => {
                    //applies to the texture on the active unit
                    device.generate_mipmap(TextureTarget::Texture2D);
                }
                RenderCommand::Draw { prim, first, count } => {
                    device.draw_arrays(*prim, *first, *count);
                }
                RenderCommand::DrawIndexed {
                    prim,
                    count,
                    index_type,
                    offset,
                    instances,
                } => {
                    if *instances == 1 {
                        device.draw_elements(*prim, *count, *index_type, *offset);
                    } else {
                        device.draw_elements_instanced(
                            *prim,
                            *count,
                            *index_type,
                            *offset,
                            *instances,
                        );
                    }
                }
                RenderCommand::TextureSampler {
                    slot,
                    wrap_s,
                    wrap_t,
                    mag_filter,
                    min_filter,
                    anisotropy,
                } => {
                    let slot = *slot;
                    if slot != active_slot {
                        device.active_texture(slot);
                        active_slot = slot;
                    }
                    let Some(tex) = cur_tex[slot as usize] else {
                        continue;
                    };
                    let target = tex.target();
                    let mut state = tex.lock_state();
                    if state.can_wrap {
                        if state.wrap_s != Some(*wrap_s) {
                            device.tex_parameter(target, TexParameter::WrapS(*wrap_s));
                            state.wrap_s = Some(*wrap_s);
                        }
                        if state.wrap_t != Some(*wrap_t) {
                            device.tex_parameter(target, TexParameter::WrapT(*wrap_t));
                            state.wrap_t = Some(*wrap_t);
                        }
                    }
                    if state.mag_filter != Some(*mag_filter) {
                        device.tex_parameter(target, TexParameter::MagFilter(*mag_filter));
                        state.mag_filter = Some(*mag_filter);
                    }
                    if state.min_filter != Some(*min_filter) {
                        device.tex_parameter(target, TexParameter::MinFilter(*min_filter));
                        state.min_filter = Some(*min_filter);
                    }
                    if state.anisotropy != Some(*anisotropy) {
                        if *anisotropy != 0.0 && self.caps.max_anisotropy > 0.0 {
                            device.tex_parameter(
                                target,
                                TexParameter::MaxAnisotropy(
                                    anisotropy.min(self.caps.max_anisotropy),
                                ),
                            );
                        }
                        state.anisotropy = Some(*anisotropy);
                    }
                }
                RenderCommand::TextureLod {
                    slot,
                    min_lod,
                    max_lod,
                    lod_bias,
                } => {
                    let slot = *slot;
                    if slot != active_slot {
                        device.active_texture(slot);
                        active_slot = slot;
                    }
                    let Some(tex) = cur_tex[slot as usize] else {
                        continue;
                    };
                    let target = tex.target();
                    let mut state = tex.lock_state();
                    if !self.caps.gles && state.lod_bias != *lod_bias {
                        device.tex_parameter(target, TexParameter::LodBias(*lod_bias));
                        state.lod_bias = *lod_bias;
                    }
                    if state.min_lod != *min_lod {
                        device.tex_parameter(target, TexParameter::MinLod(*min_lod));
                        state.min_lod = *min_lod;
                    }
                    if state.max_lod != *max_lod {
                        device.tex_parameter(target, TexParameter::MaxLod(*max_lod));
                        state.max_lod = *max_lod;
                    }
                }
                RenderCommand::Raster {
                    cull_enable,
                    front_face,
                    cull_face,
                    dither,
                } => {
                    if *cull_enable {
                        if !cull_enabled {
                            device.enable(Capability::CullFace);
                            cull_enabled = true;
                        }
                        device.front_face(*front_face);
                        device.cull_face(*cull_face);
                    } else if cull_enabled {
                        device.disable(Capability::CullFace);
                        cull_enabled = false;
                    }
                    if *dither {
                        if !dither_enabled {
                            device.enable(Capability::Dither);
                            dither_enabled = true;
                        }
                    } else if dither_enabled {
                        device.disable(Capability::Dither);
                        dither_enabled = false;
                    }
                }
                RenderCommand::TextureSubImage {
                    slot,
                    texture,
                    level,
                    x,
                    y,
                    width,
                    height,
                    format,
                    data,
                } => {
                    let slot = *slot;
                    if slot != active_slot {
                        device.active_texture(slot);
                        active_slot = slot;
                    }
                    if !cur_tex[slot as usize].is_some_and(|cur| std::ptr::eq(cur, &**texture)) {
                        device.bind_texture(texture.target(), texture.lock_state().native);
                        cur_tex[slot as usize] = Some(texture.as_ref());
                    }
                    device.tex_sub_image_2d(
                        texture.target(),
                        *level,
                        *x,
                        *y,
                        *width,
                        *height,
                        *format,
                        data,
                    );
                }
            }
        }

        //wipe pass-local state so the next pass starts from the baseline
        for location in 0..u32::BITS {
            if attr_mask & (1 << location) != 0 {
                device.disable_vertex_attrib(location);
            }
        }
        if active_slot != 0 {
            device.active_texture(0);
        }
        device.bind_buffer(BufferTarget::Array, GlObject::NONE);
        device.bind_buffer(BufferTarget::ElementArray, GlObject::NONE);
        if !self.global_vao.is_none() {
            device.bind_vertex_array(GlObject::NONE);
        }
        device.disable(Capability::ScissorTest);
        device.disable(Capability::DepthTest);
        device.disable(Capability::StencilTest);
        device.disable(Capability::Blend);
        device.disable(Capability::CullFace);
        if self.caps.logic_op {
            device.disable(Capability::ColorLogicOp);
        }
        device.color_mask(true, true, true, true);
    }

    #[allow(clippy::too_many_arguments)]
    fn perform_copy<D: GlDevice>(
        &mut self,
        device: &mut D,
        src: &Framebuffer,
        src_rect: Rect2D,
        dst: &Framebuffer,
        dst_pos: glint::state::Offset2D,
        aspects: AspectMask,
        _tag: &str,
    ) {
        if !aspects.contains(AspectMask::COLOR) {
            #[cfg(feature = "logging")]
            log::error!("depth/stencil copies not supported yet");
            return;
        }
        let src_tex = src.color_texture.lock_state().native;
        let dst_tex = dst.color_texture.lock_state().native;
        if src_tex.is_none() || dst_tex.is_none() {
            #[cfg(feature = "logging")]
            log::warn!("copy '{_tag}' references unrealized framebuffers");
            return;
        }
        match self.caps.copy_image {
            CopyImageSupport::None => {
                #[cfg(feature = "logging")]
                log::error!("tried to copy '{_tag}' without copy-image support");
            }
            variant => device.copy_image_sub_data(
                variant,
                src_tex,
                0,
                (src_rect.x, src_rect.y, 0),
                dst_tex,
                0,
                (dst_pos.x, dst_pos.y, 0),
                (src_rect.w, src_rect.h, 1),
            ),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn perform_blit<D: GlDevice>(
        &mut self,
        device: &mut D,
        src: &Framebuffer,
        src_rect: Rect2D,
        dst: &Framebuffer,
        dst_rect: Rect2D,
        aspects: AspectMask,
        filter_linear: bool,
    ) {
        if !self.caps.framebuffer_blit {
            #[cfg(feature = "logging")]
            log::error!("tried to blit without the capability");
            return;
        }
        device.bind_framebuffer(BindFbTarget::Draw, dst.lock_state().native);
        device.bind_framebuffer(BindFbTarget::Read, src.lock_state().native);
        device.blit_framebuffer(src_rect, dst_rect, aspects, filter_linear);
    }

    fn perform_readback<D: GlDevice>(
        &mut self,
        device: &mut D,
        src: Option<&Framebuffer>,
        rect: Rect2D,
        _aspects: AspectMask,
    ) {
        let native = src
            .map(|fb| fb.lock_state().native)
            .unwrap_or(GlObject::NONE);
        device.bind_framebuffer(BindFbTarget::Read, native);
        if src.is_some() && self.caps.read_buffer_select {
            device.read_color_attachment();
        }

        //always read back as tightly packed RGBA8; conversion happens on the
        // submission side
        device.pack_alignment(4);
        if self.caps.pack_row_length {
            device.pack_row_length(rect.w);
        }
        {
            let mut readback = self.ring.readback.lock().unwrap();
            readback.width = rect.w;
            readback.height = rect.h;
            let size = (rect.w * rect.h) as usize * 4;
            readback.data.resize(size, 0);
            device.read_pixels(rect, &mut readback.data);
        }
        if self.caps.pack_row_length {
            device.pack_row_length(0);
        }
    }

    fn perform_readback_image<D: GlDevice>(
        &mut self,
        device: &mut D,
        texture: &Texture,
        mip_level: u8,
        rect: Rect2D,
    ) {
        if self.caps.gles {
            #[cfg(feature = "logging")]
            log::error!("texture image readback is not available on GLES");
            return;
        }
        let native = texture.lock_state().native;
        if native.is_none() {
            #[cfg(feature = "logging")]
            log::warn!("image readback from unrealized texture");
            return;
        }
        device.bind_texture(texture.target(), native);
        device.pack_alignment(4);
        let mut readback = self.ring.readback.lock().unwrap();
        readback.width = rect.w;
        readback.height = rect.h;
        let size = (rect.w * rect.h) as usize * 4;
        readback.data.resize(size, 0);
        device.get_tex_image(texture.target(), mip_level, &mut readback.data);
    }
}

///Resolves a uniform reference against the bound program. By-name lookups are
///cached per program.
fn resolve_uniform<D: GlDevice>(
    device: &mut D,
    program: Option<&Arc<Program>>,
    uniform: &UniformRef,
) -> Option<i32> {
    match uniform {
        UniformRef::Slot(slot) => slot.location().filter(|loc| *loc >= 0),
        UniformRef::Name(name) => {
            let program = program?;
            let mut state = program.lock_state();
            let native = state.native;
            let loc = match state.uniform_cache.get(name) {
                Some(loc) => *loc,
                None => {
                    let loc = device.uniform_location(native, name);
                    state.uniform_cache.insert(name.clone(), loc);
                    loc
                }
            };
            (loc >= 0).then_some(loc)
        }
    }
}
