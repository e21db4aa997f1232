use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use crate::{ShaderFailure, device::GlObject, state::ShaderStage};

#[derive(Debug)]
pub struct ShaderState {
    pub native: GlObject,
    ///Kept after compilation for debugging; the context has its own copy.
    pub source: String,
    pub failure: Option<ShaderFailure>,
}

pub struct Shader {
    stage: ShaderStage,
    ///Human readable tag used in failure reports ("fs_texture_alpha" etc).
    desc: String,
    valid: AtomicBool,
    ///Warning: won't know until a future frame.
    failed: AtomicBool,
    pub state: Mutex<ShaderState>,
}

impl Shader {
    pub fn new(stage: ShaderStage, source: String, desc: String) -> Self {
        Shader {
            stage,
            desc,
            valid: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            state: Mutex::new(ShaderState {
                native: GlObject::NONE,
                source,
                failure: None,
            }),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn set_valid(&self) {
        self.valid.store(true, Ordering::Release);
    }

    pub fn set_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    ///The compile failure, if one has been observed yet.
    pub fn failure(&self) -> Option<ShaderFailure> {
        self.state.lock().unwrap().failure.clone()
    }

    pub fn lock_state(&self) -> MutexGuard<'_, ShaderState> {
        self.state.lock().unwrap()
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if let Ok(state) = self.state.get_mut()
            && !state.native.is_none()
        {
            log::warn!("shader '{}' dropped with live native object", self.desc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_is_deferred() {
        let shader = Shader::new(ShaderStage::Fragment, "void main() {}".into(), "fs".into());
        assert!(!shader.is_valid());
        assert!(!shader.is_failed());
        assert!(shader.failure().is_none());
    }
}
