//! Capability description of the context the execution role owns.
//!
//! Filled in once by whoever created the context (extension parsing is their
//! problem) and then treated as read-only. The queue consults it at executor
//! start to pick call variants and the push buffer mapping strategy.

///Which copy-image entry point the context exposes, if any.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum CopyImageSupport {
    #[default]
    None,
    ///Core / ARB_copy_image.
    Arb,
    ///NV_copy_image, pre-4.x NVIDIA hardware.
    Nv,
    ///OES_copy_image on GLES.
    Oes,
}

impl CopyImageSupport {
    pub fn any(&self) -> bool {
        !matches!(self, CopyImageSupport::None)
    }
}

///Vendor, as far as the strategy selection cares. Everything we don't have a
///dedicated mapping heuristic for lands in `Other`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum GpuVendor {
    Nvidia,
    Qualcomm,
    #[default]
    Other,
}

#[derive(Clone, Debug)]
pub struct DeviceCaps {
    pub gles: bool,
    ///GLES3-class context. Ignored when `gles` is false.
    pub gles3: bool,
    pub gpu_vendor: GpuVendor,

    pub vertex_array_object: bool,
    pub framebuffer_blit: bool,
    pub copy_image: CopyImageSupport,

    ///Map-range style mapping is available at all.
    pub map_buffer_range: bool,
    ///Immutable storage (buffer_storage), required for persistent maps.
    pub buffer_storage: bool,
    ///Driver bug flag: mapping works but is slower than plain uploads.
    pub any_map_buffer_slow: bool,

    pub dual_source_blend: bool,
    pub logic_op: bool,
    pub texture_max_level: bool,
    pub pack_row_length: bool,
    ///glReadBuffer-style source selection before readbacks.
    pub read_buffer_select: bool,
    pub packed_depth_stencil: bool,
    pub depth24: bool,

    ///0.0 when anisotropic filtering is unsupported.
    pub max_anisotropy: f32,
}

impl Default for DeviceCaps {
    ///A desktop core-profile context. GLES users start from [DeviceCaps::gles2].
    fn default() -> Self {
        DeviceCaps {
            gles: false,
            gles3: false,
            gpu_vendor: GpuVendor::Other,
            vertex_array_object: true,
            framebuffer_blit: true,
            copy_image: CopyImageSupport::Arb,
            map_buffer_range: true,
            buffer_storage: true,
            any_map_buffer_slow: false,
            dual_source_blend: true,
            logic_op: true,
            texture_max_level: true,
            pack_row_length: true,
            read_buffer_select: true,
            packed_depth_stencil: true,
            depth24: true,
            max_anisotropy: 16.0,
        }
    }
}

impl DeviceCaps {
    ///Baseline GLES2 context: everything optional switched off.
    pub fn gles2() -> Self {
        DeviceCaps {
            gles: true,
            gles3: false,
            gpu_vendor: GpuVendor::Other,
            vertex_array_object: false,
            framebuffer_blit: false,
            copy_image: CopyImageSupport::None,
            map_buffer_range: false,
            buffer_storage: false,
            any_map_buffer_slow: false,
            dual_source_blend: false,
            logic_op: false,
            texture_max_level: false,
            pack_row_length: false,
            read_buffer_select: false,
            packed_depth_stencil: true,
            depth24: false,
            max_anisotropy: 0.0,
        }
    }
}
