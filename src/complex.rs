use bytemuck::{Pod, Zeroable};

#[derive(Clone, Copy, Default, PartialEq, PartialOrd, Debug)]
#[repr(C)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

// Both fields share one type, so repr(C) leaves no padding
unsafe impl<T: Zeroable> Zeroable for Complex<T> {}
unsafe impl<T: Pod> Pod for Complex<T> {}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

/// One complex baseband sample as delivered by the radio (fc32)
pub type Sample = Complex<f32>;

/// Size of one sample in bytes, as it lands on disk and on the wire
pub const SAMPLE_SIZE: usize = std::mem::size_of::<Sample>();

/// View a run of samples as interleaved `[re, im, re, im, ...]` floats
pub fn as_interleaved(samples: &[Sample]) -> &[f32] {
    bytemuck::cast_slice(samples)
}

/// Raw native-endian bytes of a run of samples
pub fn sample_bytes(samples: &[Sample]) -> &[u8] {
    bytemuck::cast_slice(samples)
}
