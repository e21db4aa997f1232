//! Handle shells for deferred object creation.
//!
//! The submission role allocates these empty and immediately moves on; the
//! execution role fills in the native object when it runs the matching init
//! step, one or more frames later. Until then the handle is only good for
//! being recorded into commands.
//!
//! Lifetime rules:
//! - mutable interior state (`state` on each type) belongs to the execution
//!   role. The submission side records the `Arc`, nothing else.
//! - the cheap flags a caller may poll (`is_realized`, `has_mips`, `failed`)
//!   are atomics.
//! - nothing here frees GPU objects on `Drop`. Freeing goes through the
//!   queue's deleter so it lands exactly one ring cycle after the handle was
//!   given up. A handle dropped with a live native object logs a leak
//!   warning instead.

mod buffer;
mod framebuffer;
mod input_layout;
mod program;
mod shader;
mod texture;

pub use buffer::{Buffer, BufferState};
pub use framebuffer::{Framebuffer, FramebufferState};
pub use input_layout::{InputEntry, InputLayout};
pub use program::{Program, ProgramFlags, ProgramState, Semantic, UniformInitializer, UniformSlot};
pub use shader::{Shader, ShaderState};
pub use texture::{Texture, TextureState};

///Texture units addressable through bind commands.
pub const MAX_TEXTURE_SLOTS: usize = 8;

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(Texture: Send, Sync);
        assert_impl_all!(Buffer: Send, Sync);
        assert_impl_all!(Shader: Send, Sync);
        assert_impl_all!(Program: Send, Sync);
        assert_impl_all!(Framebuffer: Send, Sync);
        assert_impl_all!(InputLayout: Send, Sync);
        assert_impl_all!(UniformSlot: Send, Sync);
    }
}
