use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use crate::{device::GlObject, state::BufferTarget};

#[derive(Debug)]
pub struct BufferState {
    pub native: GlObject,
}

pub struct Buffer {
    target: BufferTarget,
    size: usize,
    ///Device-mapped right now. Draw commands assert against binding a buffer
    ///that is still mapped.
    mapped: AtomicBool,
    pub state: Mutex<BufferState>,
}

impl Buffer {
    pub fn new(target: BufferTarget, size: usize) -> Self {
        Buffer {
            target,
            size,
            mapped: AtomicBool::new(false),
            state: Mutex::new(BufferState {
                native: GlObject::NONE,
            }),
        }
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    pub fn set_mapped(&self, mapped: bool) {
        self.mapped.store(mapped, Ordering::Release);
    }

    pub fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if let Ok(state) = self.state.get_mut()
            && !state.native.is_none()
        {
            log::warn!(
                "buffer {:?} dropped with live native object, leaking it",
                state.native
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unrealized_and_unmapped() {
        let buffer = Buffer::new(BufferTarget::Array, 1024);
        assert!(buffer.lock_state().native.is_none());
        assert!(!buffer.is_mapped());
        assert_eq!(buffer.size(), 1024);
    }
}
