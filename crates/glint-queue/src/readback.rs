//! Synchronous readback plumbing: errors and the RGBA8 conversions applied on
//! the submission side after the execution role filled the ring's readback
//! buffer.

use glint::state::{AspectMask, DataFormat};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadbackError {
    #[error("readback aspect {0:?} is not supported")]
    UnsupportedAspect(AspectMask),
    #[error("no conversion from RGBA8 to {0:?}")]
    UnsupportedFormat(DataFormat),
    #[error("destination holds {got} bytes, readback needs {needed}")]
    DestinationTooSmall { needed: usize, got: usize },
    #[error("readback rectangle is empty")]
    EmptyRect,
}

///Converts tightly packed RGBA8 rows into `format`, honoring the caller's
///row stride (in pixels).
pub(crate) fn convert_from_rgba8(
    dest: &mut [u8],
    src: &[u8],
    width: usize,
    height: usize,
    dest_stride_px: usize,
    format: DataFormat,
) -> Result<(), ReadbackError> {
    if width == 0 || height == 0 {
        return Err(ReadbackError::EmptyRect);
    }
    let bpp = format.bytes_per_pixel();
    let needed = ((height - 1) * dest_stride_px + width) * bpp;
    if dest.len() < needed {
        return Err(ReadbackError::DestinationTooSmall {
            needed,
            got: dest.len(),
        });
    }

    for y in 0..height {
        let src_row = &src[y * width * 4..(y * width + width) * 4];
        let dest_row = &mut dest[y * dest_stride_px * bpp..];
        match format {
            DataFormat::R8G8B8A8Unorm => {
                dest_row[..width * 4].copy_from_slice(src_row);
            }
            DataFormat::B8G8R8A8Unorm => {
                for x in 0..width {
                    let px = &src_row[x * 4..x * 4 + 4];
                    dest_row[x * 4..x * 4 + 4].copy_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
            DataFormat::R5G6B5Unorm => {
                for x in 0..width {
                    let px = &src_row[x * 4..x * 4 + 4];
                    let packed = ((px[0] as u16 >> 3) << 11)
                        | ((px[1] as u16 >> 2) << 5)
                        | (px[2] as u16 >> 3);
                    dest_row[x * 2..x * 2 + 2].copy_from_slice(&packed.to_le_bytes());
                }
            }
            DataFormat::R4G4B4A4Unorm => {
                for x in 0..width {
                    let px = &src_row[x * 4..x * 4 + 4];
                    let packed = ((px[0] as u16 >> 4) << 12)
                        | ((px[1] as u16 >> 4) << 8)
                        | ((px[2] as u16 >> 4) << 4)
                        | (px[3] as u16 >> 4);
                    dest_row[x * 2..x * 2 + 2].copy_from_slice(&packed.to_le_bytes());
                }
            }
            _ => return Err(ReadbackError::UnsupportedFormat(format)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_passthrough_respects_stride() {
        //2x2 image, red and green on top, blue and white below
        let src = [
            255u8, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 255, 255,
        ];
        //stride of 3 pixels leaves a gap column
        let mut dest = [0u8; 3 * 2 * 4];
        convert_from_rgba8(&mut dest, &src, 2, 2, 3, DataFormat::R8G8B8A8Unorm).unwrap();
        assert_eq!(&dest[0..8], &src[0..8]);
        assert_eq!(&dest[12..20], &src[8..16]);
    }

    #[test]
    fn bgra_swizzles() {
        let src = [10u8, 20, 30, 40];
        let mut dest = [0u8; 4];
        convert_from_rgba8(&mut dest, &src, 1, 1, 1, DataFormat::B8G8R8A8Unorm).unwrap();
        assert_eq!(dest, [30, 20, 10, 40]);
    }

    #[test]
    fn rgb565_packs() {
        let src = [255u8, 0, 0, 255];
        let mut dest = [0u8; 2];
        convert_from_rgba8(&mut dest, &src, 1, 1, 1, DataFormat::R5G6B5Unorm).unwrap();
        assert_eq!(u16::from_le_bytes(dest), 0b11111_000000_00000);
    }

    #[test]
    fn depth_formats_are_rejected() {
        let src = [0u8; 4];
        let mut dest = [0u8; 4];
        assert_eq!(
            convert_from_rgba8(&mut dest, &src, 1, 1, 1, DataFormat::D24S8),
            Err(ReadbackError::UnsupportedFormat(DataFormat::D24S8))
        );
    }

    #[test]
    fn too_small_destination_is_rejected() {
        let src = [0u8; 16];
        let mut dest = [0u8; 8];
        assert!(matches!(
            convert_from_rgba8(&mut dest, &src, 2, 2, 2, DataFormat::R8G8B8A8Unorm),
            Err(ReadbackError::DestinationTooSmall { .. })
        ));
    }
}
