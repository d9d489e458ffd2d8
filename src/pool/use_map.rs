//! One bit per block, set while the block is allocated

#[derive(Debug)]
pub(crate) struct UseMap {
    bits: Box<[u8]>,
}

impl UseMap {
    /// Bytes needed to track `blocks` blocks
    pub fn bytes_for(blocks: usize) -> usize {
        blocks.div_ceil(8)
    }

    pub fn from_buffer(mut bits: Box<[u8]>) -> Self {
        bits.fill(0);
        Self { bits }
    }

    pub fn len_bytes(&self) -> usize {
        self.bits.len()
    }

    pub fn is_set(&self, bit: usize) -> bool {
        self.bits[bit / 8] & (1 << (bit % 8)) != 0
    }

    pub fn set(&mut self, bit: usize) {
        self.bits[bit / 8] |= 1 << (bit % 8);
    }

    pub fn clear(&mut self, bit: usize) {
        self.bits[bit / 8] &= !(1 << (bit % 8));
    }
}
