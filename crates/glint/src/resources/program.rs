use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicI32, Ordering},
};

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::device::GlObject;

use super::Shader;

///A uniform whose location is resolved at link time. Commands reference the
///slot; the execution role fills in the location once the program linked.
pub struct UniformSlot {
    name: String,
    loc: AtomicI32,
}

impl UniformSlot {
    const UNRESOLVED: i32 = -2;

    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(UniformSlot {
            name: name.into(),
            loc: AtomicI32::new(Self::UNRESOLVED),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    ///Resolved location. -1 means the uniform does not exist in the linked
    ///program, [None] means the program has not linked yet.
    pub fn location(&self) -> Option<i32> {
        match self.loc.load(Ordering::Acquire) {
            Self::UNRESOLVED => None,
            loc => Some(loc),
        }
    }

    pub fn resolve(&self, loc: i32) {
        self.loc.store(loc, Ordering::Release);
    }
}

///Vertex attribute name binding, applied before link.
#[derive(Clone, Debug)]
pub struct Semantic {
    pub location: u32,
    pub attrib: String,
}

///One-shot uniform write run right after a successful link. Integer only,
///which covers the sampler-unit assignments this exists for.
pub struct UniformInitializer {
    pub slot: Arc<UniformSlot>,
    pub value: i32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProgramFlags {
    pub support_dual_source: bool,
}

pub struct ProgramState {
    pub native: GlObject,
    ///By-name location lookups, cached per program. Only the execution role
    ///touches this.
    pub uniform_cache: AHashMap<String, i32>,
}

pub struct Program {
    shaders: SmallVec<[Arc<Shader>; 4]>,
    semantics: Vec<Semantic>,
    queries: Vec<Arc<UniformSlot>>,
    initializers: Vec<UniformInitializer>,
    flags: ProgramFlags,
    ///Warning: won't know until a future frame.
    failed: AtomicBool,
    pub state: Mutex<ProgramState>,
}

impl Program {
    pub fn new(
        shaders: SmallVec<[Arc<Shader>; 4]>,
        semantics: Vec<Semantic>,
        queries: Vec<Arc<UniformSlot>>,
        initializers: Vec<UniformInitializer>,
        flags: ProgramFlags,
    ) -> Self {
        Program {
            shaders,
            semantics,
            queries,
            initializers,
            flags,
            failed: AtomicBool::new(false),
            state: Mutex::new(ProgramState {
                native: GlObject::NONE,
                uniform_cache: AHashMap::default(),
            }),
        }
    }

    pub fn shaders(&self) -> &[Arc<Shader>] {
        &self.shaders
    }

    pub fn semantics(&self) -> &[Semantic] {
        &self.semantics
    }

    pub fn queries(&self) -> &[Arc<UniformSlot>] {
        &self.queries
    }

    pub fn initializers(&self) -> &[UniformInitializer] {
        &self.initializers
    }

    pub fn flags(&self) -> ProgramFlags {
        self.flags
    }

    ///A failed program is inert: binding it is a no-op and draws under it are
    ///dropped.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn set_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn lock_state(&self) -> MutexGuard<'_, ProgramState> {
        self.state.lock().unwrap()
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        if let Ok(state) = self.state.get_mut()
            && !state.native.is_none()
        {
            log::warn!(
                "program {:?} dropped with live native object, leaking it",
                state.native
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_slot_resolution() {
        let slot = UniformSlot::new("u_tex");
        assert_eq!(slot.location(), None);
        slot.resolve(3);
        assert_eq!(slot.location(), Some(3));
        slot.resolve(-1);
        assert_eq!(slot.location(), Some(-1));
    }
}
