//! Deferred deletion lists.
//!
//! `delete_*` on the manager moves a handle in here; the executor performs
//! the list only once the slot that carried it comes around again, one full
//! ring cycle later. That is the entire safety argument for deleting objects
//! the GPU may still be reading.

use std::sync::Arc;

use glint::{
    device::{GlDevice, GlObject},
    resources::{Buffer, Framebuffer, InputLayout, Program, Shader, Texture},
};

use crate::{frame::FrameRing, push_buffer::PushBuffer};

///Per-kind lists of handles waiting for their safe deletion point.
#[derive(Default)]
pub struct Deleter {
    pub shaders: Vec<Arc<Shader>>,
    pub programs: Vec<Arc<Program>>,
    pub buffers: Vec<Arc<Buffer>>,
    pub textures: Vec<Arc<Texture>>,
    pub input_layouts: Vec<Arc<InputLayout>>,
    pub framebuffers: Vec<Arc<Framebuffer>>,
    pub push_buffers: Vec<Arc<PushBuffer>>,
}

impl Deleter {
    ///Drains everything queued on `other` into this deleter.
    pub fn take(&mut self, other: &mut Deleter) {
        self.shaders.append(&mut other.shaders);
        self.programs.append(&mut other.programs);
        self.buffers.append(&mut other.buffers);
        self.textures.append(&mut other.textures);
        self.input_layouts.append(&mut other.input_layouts);
        self.framebuffers.append(&mut other.framebuffers);
        self.push_buffers.append(&mut other.push_buffers);
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
            && self.programs.is_empty()
            && self.buffers.is_empty()
            && self.textures.is_empty()
            && self.input_layouts.is_empty()
            && self.framebuffers.is_empty()
            && self.push_buffers.is_empty()
    }

    ///Frees every queued object, exactly once. With `skip_gl_calls` the
    ///native ids are forgotten instead of freed - only correct when the
    ///context itself is already gone.
    ///
    ///Runs on the execution role.
    pub fn perform<D: GlDevice>(&mut self, device: &mut D, ring: &FrameRing, skip_gl_calls: bool) {
        for push_buffer in self.push_buffers.drain(..) {
            ring.unregister_push_buffer(&push_buffer);
            push_buffer.destroy(device, skip_gl_calls);
        }
        for shader in self.shaders.drain(..) {
            let mut state = shader.lock_state();
            if !state.native.is_none() {
                if !skip_gl_calls {
                    device.delete_shader(state.native);
                }
                state.native = GlObject::NONE;
            }
        }
        for program in self.programs.drain(..) {
            let mut state = program.lock_state();
            if !state.native.is_none() {
                if !skip_gl_calls {
                    device.delete_program(state.native);
                }
                state.native = GlObject::NONE;
            }
        }
        for buffer in self.buffers.drain(..) {
            let mut state = buffer.lock_state();
            if !state.native.is_none() {
                if !skip_gl_calls {
                    device.delete_buffer(state.native);
                }
                state.native = GlObject::NONE;
            }
        }
        for texture in self.textures.drain(..) {
            let mut state = texture.lock_state();
            if !state.native.is_none() {
                if !skip_gl_calls {
                    device.delete_texture(state.native);
                }
                state.native = GlObject::NONE;
            }
        }
        //input layouts hold no context objects yet
        self.input_layouts.clear();
        for framebuffer in self.framebuffers.drain(..) {
            let mut state = framebuffer.lock_state();
            if !skip_gl_calls {
                if !state.native.is_none() {
                    device.delete_framebuffer(state.native);
                }
                for rb in [state.z_stencil_buffer, state.z_buffer, state.stencil_buffer] {
                    if !rb.is_none() {
                        device.delete_renderbuffer(rb);
                    }
                }
            }
            state.native = GlObject::NONE;
            state.z_stencil_buffer = GlObject::NONE;
            state.z_buffer = GlObject::NONE;
            state.stencil_buffer = GlObject::NONE;
            drop(state);

            let mut color = framebuffer.color_texture.lock_state();
            if !color.native.is_none() {
                if !skip_gl_calls {
                    device.delete_texture(color.native);
                }
                color.native = GlObject::NONE;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glint::{
        device::trace::{TraceCall, TraceDevice},
        state::{BufferTarget, TextureTarget},
    };

    use super::*;

    #[test]
    fn perform_frees_each_object_once() {
        let mut device = TraceDevice::new();
        let ring = FrameRing::new();

        let texture = Arc::new(Texture::new(TextureTarget::Texture2D, 8, 8, 1, 1));
        texture.lock_state().native = GlObject(7);
        let buffer = Arc::new(Buffer::new(BufferTarget::Array, 64));
        buffer.lock_state().native = GlObject(9);

        let mut deleter = Deleter::default();
        deleter.textures.push(texture.clone());
        deleter.buffers.push(buffer.clone());
        assert!(!deleter.is_empty());

        deleter.perform(&mut device, &ring, false);
        assert!(deleter.is_empty());
        assert_eq!(
            device.take_calls(),
            vec![
                TraceCall::DeleteBuffer(GlObject(9)),
                TraceCall::DeleteTexture(GlObject(7)),
            ]
        );

        //second perform must not free again
        deleter.perform(&mut device, &ring, false);
        assert!(device.take_calls().is_empty());
        assert!(texture.lock_state().native.is_none());
    }

    #[test]
    fn skip_gl_calls_forgets_without_freeing() {
        let mut device = TraceDevice::new();
        let ring = FrameRing::new();

        let texture = Arc::new(Texture::new(TextureTarget::Texture2D, 8, 8, 1, 1));
        texture.lock_state().native = GlObject(3);

        let mut deleter = Deleter::default();
        deleter.textures.push(texture.clone());
        deleter.perform(&mut device, &ring, true);

        assert!(device.take_calls().is_empty());
        assert!(texture.lock_state().native.is_none());
    }
}
