use smallvec::SmallVec;

use crate::state::VertexAttribType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEntry {
    pub location: u32,
    pub count: i32,
    pub ty: VertexAttribType,
    pub normalized: bool,
    pub offset: usize,
}

///Vertex attribute layout. Carries no context objects (until we build VAOs
///per layout, nothing to realize), so it is immutable after creation.
pub struct InputLayout {
    entries: SmallVec<[InputEntry; 8]>,
    stride: i32,
    semantics_mask: u32,
}

impl InputLayout {
    pub fn new(entries: impl IntoIterator<Item = InputEntry>, stride: i32) -> Self {
        let entries: SmallVec<[InputEntry; 8]> = entries.into_iter().collect();
        let semantics_mask = entries.iter().fold(0u32, |m, e| m | (1 << e.location));
        InputLayout {
            entries,
            stride,
            semantics_mask,
        }
    }

    pub fn entries(&self) -> &[InputEntry] {
        &self.entries
    }

    pub fn stride(&self) -> i32 {
        self.stride
    }

    ///One bit per used attribute location.
    pub fn semantics_mask(&self) -> u32 {
        self.semantics_mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_covers_all_locations() {
        let layout = InputLayout::new(
            [
                InputEntry {
                    location: 0,
                    count: 3,
                    ty: VertexAttribType::Float,
                    normalized: false,
                    offset: 0,
                },
                InputEntry {
                    location: 2,
                    count: 4,
                    ty: VertexAttribType::UnsignedByte,
                    normalized: true,
                    offset: 12,
                },
            ],
            16,
        );
        assert_eq!(layout.semantics_mask(), 0b101);
        assert_eq!(layout.stride(), 16);
    }
}
