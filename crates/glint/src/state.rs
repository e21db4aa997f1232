//! Plain data types used in recorded commands and device calls.
//!
//! None of these carry backend handles. Mapping to the context's real enum
//! values is the backend's job, not ours.

///Bit set of framebuffer aspects. Color is bit 0, depth bit 1, stencil bit 2.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct AspectMask(u8);

impl AspectMask {
    pub const NONE: Self = AspectMask(0);
    pub const COLOR: Self = AspectMask(1);
    pub const DEPTH: Self = AspectMask(2);
    pub const STENCIL: Self = AspectMask(4);
    pub const DEPTH_STENCIL: Self = AspectMask(2 | 4);
    pub const ALL: Self = AspectMask(1 | 2 | 4);

    pub fn contains(&self, other: AspectMask) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn intersects(&self, other: AspectMask) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for AspectMask {
    type Output = AspectMask;
    fn bitor(self, rhs: AspectMask) -> AspectMask {
        AspectMask(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for AspectMask {
    fn bitor_assign(&mut self, rhs: AspectMask) {
        self.0 |= rhs.0;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Rect2D {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect2D {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect2D { x, y, w, h }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

///Floating point viewport with depth range, matching what the engine records.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub min_z: f32,
    pub max_z: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlendEq {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LogicOp {
    Clear,
    And,
    AndReverse,
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equiv,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Increment,
    IncrementWrap,
    Decrement,
    DecrementWrap,
    Invert,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IndexType {
    U8,
    U16,
    U32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureTarget {
    Texture2D,
    Texture3D,
    Texture2DArray,
    TextureCube,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum VertexAttribType {
    Float,
    UnsignedByte,
    UnsignedShort,
    Byte,
    Short,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TexFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TexWrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FrontFace {
    Ccw,
    Cw,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CullFace {
    Front,
    Back,
}

///Server-side toggles driven through enable/disable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Capability {
    DepthTest,
    StencilTest,
    Blend,
    CullFace,
    Dither,
    ScissorTest,
    ColorLogicOp,
}

///Data formats the queue can move around. Only what uploads and readbacks
///need; anything fancier is decoded before it reaches us.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DataFormat {
    R8G8B8A8Unorm,
    B8G8R8A8Unorm,
    R5G6B5Unorm,
    R4G4B4A4Unorm,
    R8Unorm,
    D16,
    D24S8,
    S8,
}

impl DataFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            DataFormat::R8G8B8A8Unorm | DataFormat::B8G8R8A8Unorm | DataFormat::D24S8 => 4,
            DataFormat::R5G6B5Unorm | DataFormat::R4G4B4A4Unorm | DataFormat::D16 => 2,
            DataFormat::R8Unorm | DataFormat::S8 => 1,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Attachment {
    Color0,
    Depth,
    Stencil,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RenderbufferFormat {
    Depth24Stencil8,
    DepthComponent16,
    DepthComponent24,
    StencilIndex8,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum FramebufferStatus {
    Complete,
    Unsupported,
    IncompleteAttachment,
    Other(u32),
}

///Which binding point a framebuffer bind targets. On contexts without
///separate read/draw bindings the backend collapses all three.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BindFbTarget {
    Draw,
    Read,
    Both,
}

///Write-mapping flags for persistently mapped buffers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct MapAccess {
    pub flush_explicit: bool,
    pub invalidate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_mask_ops() {
        let m = AspectMask::COLOR | AspectMask::DEPTH;
        assert!(m.contains(AspectMask::COLOR));
        assert!(m.contains(AspectMask::DEPTH));
        assert!(!m.contains(AspectMask::STENCIL));
        assert!(m.intersects(AspectMask::DEPTH_STENCIL));
        assert!(!AspectMask::COLOR.intersects(AspectMask::DEPTH_STENCIL));
        assert!(AspectMask::NONE.is_empty());
        assert!(m.contains(AspectMask::NONE));
    }

    #[test]
    fn format_sizes() {
        assert_eq!(DataFormat::R8G8B8A8Unorm.bytes_per_pixel(), 4);
        assert_eq!(DataFormat::R5G6B5Unorm.bytes_per_pixel(), 2);
        assert_eq!(DataFormat::S8.bytes_per_pixel(), 1);
    }
}
