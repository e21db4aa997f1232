//! Bump-pointer streaming allocator for transient per-draw data.
//!
//! A push buffer owns one or more backing [Buffer]s of geometrically growing
//! size. The submission role bump-allocates 4-byte aligned ranges into CPU
//! staging between `begin` and `end`; the execution role uploads the written
//! ranges before running the frame's steps, either with plain sub-uploads or
//! through a persistent mapping, depending on the [BufferStrategy] picked
//! from the caps at executor start.
//!
//! The staging memory is behind a mutex, but the two roles never race on it:
//! the write window of a given push buffer is closed (via the frame ring)
//! while its frame executes.

use std::sync::{Arc, Mutex};

use glint::{
    device::GlDevice,
    state::{BufferTarget, BufferUsage, MapAccess},
};

use crate::manager::RenderManager;

///How written ranges reach the device.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BufferStrategy {
    ///CPU staging, one sub-upload per backing buffer per frame. Always works.
    #[default]
    Subdata,
    ///Persistent map, unmap each frame publishes the writes.
    FrameUnmap,
    ///Persistent map with explicit flushes of the written ranges.
    FlushUnmap,
    ///Like [BufferStrategy::FlushUnmap], additionally invalidating the old
    ///contents on map.
    FlushInvalidateUnmap,
}

impl BufferStrategy {
    pub fn uses_mapping(&self) -> bool {
        !matches!(self, BufferStrategy::Subdata)
    }

    pub fn explicit_flush(&self) -> bool {
        matches!(
            self,
            BufferStrategy::FlushUnmap | BufferStrategy::FlushInvalidateUnmap
        )
    }

    pub(crate) fn map_access(&self) -> MapAccess {
        MapAccess {
            flush_explicit: self.explicit_flush(),
            invalidate: matches!(self, BufferStrategy::FlushInvalidateUnmap),
        }
    }
}

///A range handed out by [PushBuffer::push], ready to be recorded into a bind.
#[derive(Clone)]
pub struct PushAllocation {
    pub buffer: Arc<glint::resources::Buffer>,
    pub offset: u32,
}

struct BufInfo {
    buffer: Arc<glint::resources::Buffer>,
    local: Vec<u8>,
    ///Bytes written and not yet published to the device.
    flush_offset: usize,
    device_mapped: bool,
}

struct Inner {
    buffers: Vec<BufInfo>,
    buf: usize,
    offset: usize,
    ///Current backing size; doubles whenever an allocation doesn't fit.
    size: usize,
    write_open: bool,
    strategy: BufferStrategy,
}

pub struct PushBuffer {
    target: BufferTarget,
    tag: &'static str,
    state: Mutex<Inner>,
}

impl PushBuffer {
    pub(crate) fn new(target: BufferTarget, size: usize, tag: &'static str) -> Self {
        PushBuffer {
            target,
            tag,
            state: Mutex::new(Inner {
                buffers: Vec::new(),
                buf: 0,
                offset: 0,
                size,
                write_open: false,
                strategy: BufferStrategy::Subdata,
            }),
        }
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    ///Bytes consumed this frame, across all backing buffers.
    pub fn total_used(&self) -> usize {
        let inner = self.state.lock().unwrap();
        let full: usize = inner
            .buffers
            .iter()
            .take(inner.buf)
            .map(|info| info.local.len())
            .sum();
        full + inner.offset
    }

    ///Copies `data` into the buffer and returns where it landed.
    pub fn push(&self, manager: &mut RenderManager, data: &[u8]) -> PushAllocation {
        self.allocate_with(manager, data.len(), |dest| dest.copy_from_slice(data))
    }

    ///Typed variant of [PushBuffer::push].
    pub fn push_pod<T: bytemuck::NoUninit>(
        &self,
        manager: &mut RenderManager,
        data: &[T],
    ) -> PushAllocation {
        self.push(manager, bytemuck::cast_slice(data))
    }

    ///Bump-allocates a 4-byte aligned range and lets `write` fill it before
    ///anything can be uploaded. Matching every allocation with a write is
    ///what keeps the `end` upload window sound.
    pub fn allocate_with(
        &self,
        manager: &mut RenderManager,
        size: usize,
        write: impl FnOnce(&mut [u8]),
    ) -> PushAllocation {
        let mut inner = self.state.lock().unwrap();
        debug_assert!(
            inner.write_open,
            "push buffer '{}' used outside its begin/end window",
            self.tag
        );
        inner.offset = (inner.offset + 3) & !3;
        if inner.offset + size > inner.size {
            self.next_buffer(&mut inner, manager, size);
        }
        let buf = inner.buf;
        let offset = inner.offset;
        inner.offset += size;

        let info = &mut inner.buffers[buf];
        write(&mut info.local[offset..offset + size]);
        PushAllocation {
            buffer: info.buffer.clone(),
            offset: offset as u32,
        }
    }

    fn next_buffer(&self, inner: &mut Inner, manager: &mut RenderManager, min_size: usize) {
        //the range written so far in the current buffer still has to reach
        // the device
        let offset = inner.offset;
        inner.buffers[inner.buf].flush_offset = offset;

        inner.buf += 1;
        if inner.buf >= inner.buffers.len() || min_size > inner.size {
            while inner.size < min_size {
                inner.size <<= 1;
            }
            Self::add_buffer(inner, manager, self.target);
        }
        inner.offset = 0;
    }

    fn add_buffer(inner: &mut Inner, manager: &mut RenderManager, target: BufferTarget) {
        let buffer = manager.create_buffer(target, inner.size, BufferUsage::DynamicDraw);
        inner.buffers.push(BufInfo {
            buffer,
            local: vec![0; inner.size],
            flush_offset: 0,
            device_mapped: false,
        });
        inner.buf = inner.buffers.len() - 1;
    }

    ///Opens the frame's write window: rewinds to the first buffer and merges
    ///last frame's overflow buffers into one larger one.
    pub(crate) fn begin(&self, manager: &mut RenderManager) {
        let mut inner = self.state.lock().unwrap();
        inner.buf = 0;
        inner.offset = 0;
        self.defragment(&mut inner, manager);
        if inner.buffers.is_empty() {
            Self::add_buffer(&mut inner, manager, self.target);
        }
        inner.write_open = true;
    }

    pub(crate) fn end(&self) {
        let mut inner = self.state.lock().unwrap();
        debug_assert!(
            inner.write_open,
            "push buffer '{}' ended without begin",
            self.tag
        );
        inner.write_open = false;
        let (buf, offset) = (inner.buf, inner.offset);
        inner.buffers[buf].flush_offset = offset;
    }

    fn defragment(&self, inner: &mut Inner, manager: &mut RenderManager) {
        if inner.buffers.len() <= 1 {
            return;
        }
        //overflowed last frame: replace the chain with one buffer that fits
        let new_size = inner.size * inner.buffers.len();
        for info in inner.buffers.drain(..) {
            manager.delete_buffer(info.buffer);
        }
        inner.size = new_size;
        Self::add_buffer(inner, manager, self.target);
        #[cfg(feature = "logging")]
        log::debug!(
            "push buffer '{}' defragmented to one buffer of {} bytes",
            self.tag,
            new_size
        );
    }

    // --- execution role ---

    ///Publishes every written range. Runs after the frame's init steps so the
    ///freshly created backing buffers exist.
    pub(crate) fn flush<D: GlDevice>(&self, device: &mut D) {
        let mut inner = self.state.lock().unwrap();
        let strategy = inner.strategy;
        for info in inner.buffers.iter_mut() {
            if info.flush_offset == 0 {
                continue;
            }
            let native = info.buffer.lock_state().native;
            if native.is_none() {
                continue;
            }
            device.bind_buffer(self.target, native);
            if info.device_mapped {
                device.write_mapped(self.target, 0, &info.local[..info.flush_offset]);
                if strategy.explicit_flush() {
                    device.flush_mapped_range(self.target, 0, info.flush_offset);
                }
            } else {
                device.buffer_sub_data(self.target, 0, &info.local[..info.flush_offset]);
            }
            info.flush_offset = 0;
        }
    }

    pub(crate) fn unmap_device<D: GlDevice>(&self, device: &mut D) {
        let mut inner = self.state.lock().unwrap();
        for info in inner.buffers.iter_mut() {
            if !info.device_mapped {
                continue;
            }
            let native = info.buffer.lock_state().native;
            if !native.is_none() {
                device.bind_buffer(self.target, native);
                device.unmap_buffer(self.target);
            }
            info.device_mapped = false;
            info.buffer.set_mapped(false);
        }
    }

    pub(crate) fn map_device<D: GlDevice>(&self, device: &mut D, strategy: BufferStrategy) {
        let mut inner = self.state.lock().unwrap();
        inner.strategy = strategy;
        if !strategy.uses_mapping() {
            return;
        }
        let access = strategy.map_access();
        for info in inner.buffers.iter_mut() {
            if info.device_mapped {
                continue;
            }
            let native = info.buffer.lock_state().native;
            if native.is_none() {
                //not realized yet, its init step is still queued
                continue;
            }
            device.bind_buffer(self.target, native);
            if device.map_buffer(self.target, info.local.len(), access) {
                info.device_mapped = true;
                info.buffer.set_mapped(true);
            }
        }
    }

    ///Immediately frees the backing buffers. Only called by the deleter, on
    ///the execution role.
    pub(crate) fn destroy<D: GlDevice>(&self, device: &mut D, skip_gl_calls: bool) {
        let mut inner = self.state.lock().unwrap();
        for info in inner.buffers.drain(..) {
            let mut state = info.buffer.lock_state();
            if !state.native.is_none() {
                if !skip_gl_calls {
                    device.delete_buffer(state.native);
                }
                state.native = glint::device::GlObject::NONE;
            }
            info.buffer.set_mapped(false);
        }
        inner.buf = 0;
        inner.offset = 0;
        inner.write_open = false;
    }
}
