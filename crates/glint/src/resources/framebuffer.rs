use std::sync::{Mutex, MutexGuard};

use crate::{device::GlObject, state::TextureTarget};

use super::Texture;

///Execution-role view of a framebuffer. Either `z_stencil_buffer` (packed) or
///`z_buffer` + `stencil_buffer` (split) end up set, depending on caps.
#[derive(Debug)]
pub struct FramebufferState {
    pub native: GlObject,
    pub z_stencil_buffer: GlObject,
    pub z_buffer: GlObject,
    pub stencil_buffer: GlObject,
}

pub struct Framebuffer {
    width: i32,
    height: i32,
    z_stencil: bool,
    tag: String,
    ///Color attachment, also bindable as a texture for later passes.
    pub color_texture: Texture,
    pub state: Mutex<FramebufferState>,
}

impl Framebuffer {
    pub fn new(width: i32, height: i32, z_stencil: bool, tag: impl Into<String>) -> Self {
        Framebuffer {
            width,
            height,
            z_stencil,
            tag: tag.into(),
            color_texture: Texture::new(TextureTarget::Texture2D, width, height, 1, 1),
            state: Mutex::new(FramebufferState {
                native: GlObject::NONE,
                z_stencil_buffer: GlObject::NONE,
                z_buffer: GlObject::NONE,
                stencil_buffer: GlObject::NONE,
            }),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn has_z_stencil(&self) -> bool {
        self.z_stencil
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn lock_state(&self) -> MutexGuard<'_, FramebufferState> {
        self.state.lock().unwrap()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if let Ok(state) = self.state.get_mut()
            && !state.native.is_none()
        {
            log::warn!(
                "framebuffer '{}' dropped with live native object, leaking it",
                self.tag
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owns_an_unrealized_color_texture() {
        let fb = Framebuffer::new(256, 128, true, "shadow");
        assert!(!fb.color_texture.is_realized());
        assert_eq!(fb.color_texture.width(), 256);
        assert_eq!(fb.color_texture.height(), 128);
        assert_eq!(fb.tag(), "shadow");
    }
}
