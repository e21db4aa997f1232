use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    device::GlObject,
    state::{TexFilter, TexWrap, TextureTarget},
};

///Execution-role view of a texture. Also caches the sampler parameters last
///written to the context, so redundant parameter calls can be elided. The
///caches start out unknown/absurd, which guarantees the first sampler command
///writes everything.
#[derive(Debug)]
pub struct TextureState {
    pub native: GlObject,
    pub wrap_s: Option<TexWrap>,
    pub wrap_t: Option<TexWrap>,
    pub mag_filter: Option<TexFilter>,
    pub min_filter: Option<TexFilter>,
    pub anisotropy: Option<f32>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub lod_bias: f32,
    ///Repeat/mirror wrapping is legal (false for NPOT targets on small
    ///contexts, the runner then skips wrap writes).
    pub can_wrap: bool,
}

pub struct Texture {
    target: TextureTarget,
    width: u16,
    height: u16,
    depth: u16,
    num_mips: u8,
    realized: AtomicBool,
    has_mips: AtomicBool,
    pub state: Mutex<TextureState>,
}

impl Texture {
    pub fn new(target: TextureTarget, width: i32, height: i32, depth: i32, num_mips: i32) -> Self {
        Texture {
            target,
            width: width as u16,
            height: height as u16,
            depth: depth as u16,
            num_mips: num_mips as u8,
            realized: AtomicBool::new(false),
            has_mips: AtomicBool::new(false),
            state: Mutex::new(TextureState {
                native: GlObject::NONE,
                wrap_s: None,
                wrap_t: None,
                mag_filter: None,
                min_filter: None,
                anisotropy: None,
                min_lod: -1000.0,
                max_lod: 1000.0,
                lod_bias: 0.0,
                can_wrap: true,
            }),
        }
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn width(&self) -> i32 {
        self.width as i32
    }

    pub fn height(&self) -> i32 {
        self.height as i32
    }

    pub fn depth(&self) -> i32 {
        self.depth as i32
    }

    pub fn num_mips(&self) -> u8 {
        self.num_mips
    }

    ///True once the execution role has created the native object.
    pub fn is_realized(&self) -> bool {
        self.realized.load(Ordering::Acquire)
    }

    ///True once a finalize with mip generation has run.
    pub fn has_mips(&self) -> bool {
        self.has_mips.load(Ordering::Acquire)
    }

    pub fn set_realized(&self) {
        self.realized.store(true, Ordering::Release);
    }

    pub fn set_has_mips(&self, mips: bool) {
        self.has_mips.store(mips, Ordering::Release);
    }

    pub fn lock_state(&self) -> MutexGuard<'_, TextureState> {
        self.state.lock().unwrap()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if let Ok(state) = self.state.get_mut()
            && !state.native.is_none()
        {
            log::warn!(
                "texture {:?} dropped with live native object, leaking it",
                state.native
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrealized() {
        let tex = Texture::new(TextureTarget::Texture2D, 64, 32, 1, 1);
        assert!(!tex.is_realized());
        assert!(!tex.has_mips());
        assert!(tex.lock_state().native.is_none());
        assert_eq!(tex.width(), 64);
        assert_eq!(tex.height(), 32);
    }

    #[test]
    fn sampler_cache_starts_unknown() {
        let tex = Texture::new(TextureTarget::Texture2D, 16, 16, 1, 1);
        let state = tex.lock_state();
        assert!(state.wrap_s.is_none());
        assert!(state.mag_filter.is_none());
        assert!(state.anisotropy.is_none());
    }
}
