//! # Glint
//!
//! The bottom layer of the glint render queue. This crate owns the seam
//! between the deferred engine and an actual implicit-state graphics context:
//!
//! - [GlDevice](device::GlDevice): every call the engine can emit against a
//!   real context, expressed with crate-level enums instead of raw GLenums.
//!   Backend crates implement this once per context flavour; the
//!   [TraceDevice](device::trace::TraceDevice) implementation in this crate
//!   records calls instead of executing them, which is what the queue tests
//!   (and command-stream debugging) are built on.
//! - [DeviceCaps](caps::DeviceCaps): read-only capability booleans, consulted
//!   once at executor start to select between call variants.
//! - Handle shells ([Texture](resources::Texture), [Buffer](resources::Buffer)
//!   and friends): created empty on the submission side, realized later by
//!   the execution role. See the [resources] module docs for the lifetime
//!   rules.
//!
//! Structures that carry no backend state (rects, state enums) live in
//! [state] and are plain data.

///Capability table handed to the queue by whoever created the context.
pub mod caps;

///The [GlDevice](device::GlDevice) trait and the tracing implementation.
pub mod device;

///Handle shells shared between the submission and execution roles.
pub mod resources;

///Plain state types: rects, compare/blend/stencil enums, aspect masks.
pub mod state;

mod error;
pub use error::ShaderFailure;
