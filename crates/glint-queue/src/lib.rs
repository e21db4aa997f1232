//! # Glint queue
//!
//! Deferred command recording with cross-thread execution, built for
//! implicit-state GL-style contexts that have no native command buffers.
//!
//! Two roles share a three-slot frame ring:
//! - the **submission** role records work through [RenderManager]: object
//!   creation returns opaque shells immediately, state changes and draws
//!   append to the current render step, [RenderManager::finish] hands the
//!   frame over.
//! - the **execution** role - the only code allowed to touch the context -
//!   drives [RenderExecutor] on the context thread and replays everything
//!   strictly in recorded order.
//!
//! Up to three frames are in flight; [RenderManager::begin_frame] blocks once
//! the submission side runs that far ahead. Deletions are deferred a full
//! ring cycle, which is what makes handing a still-in-use object to
//! `delete_*` safe.
//!
//! ```no_run
//! use glint::{caps::DeviceCaps, device::trace::TraceDevice};
//! use glint_queue::{RenderManager, RenderPassAction};
//!
//! let (mut manager, mut executor) = RenderManager::new(DeviceCaps::default());
//! let mut device = TraceDevice::new();
//! let render_thread = std::thread::spawn(move || executor.run_loop(&mut device));
//!
//! manager.begin_frame();
//! manager.bind_framebuffer_as_render_target(
//!     None,
//!     RenderPassAction::Clear,
//!     RenderPassAction::Clear,
//!     RenderPassAction::Clear,
//!     0xFF202020,
//!     1.0,
//!     0,
//!     "clear backbuffer",
//! );
//! manager.finish();
//!
//! manager.stop();
//! render_thread.join().unwrap();
//! ```

pub use glint;

///The recorded vocabulary: [Step](command::Step),
///[RenderCommand](command::RenderCommand) and [InitStep](command::InitStep).
pub mod command;

///Deferred deletion lists, performed one ring cycle late.
pub mod deleter;

///The three-slot handoff ring shared by the two roles.
pub mod frame;

///[RenderManager] and [RenderExecutor].
pub mod manager;

///Bump-allocated streaming buffers for transient per-draw data.
pub mod push_buffer;

///Sync readback errors and pixel conversion.
pub mod readback;

///Replays recorded frames against a [GlDevice](glint::device::GlDevice).
pub mod runner;

pub use command::{RenderCommand, RenderPassAction, Step};
pub use deleter::Deleter;
pub use frame::{FRAME_RING_SIZE, ReadbackBuffer};
pub use manager::{RenderExecutor, RenderManager};
pub use push_buffer::{BufferStrategy, PushAllocation, PushBuffer};
pub use readback::ReadbackError;
pub use runner::QueueRunner;
