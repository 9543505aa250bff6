// THEORY:
// `RollingSums` is the temporal memory of the engine. Instead of keeping a history
// of values per location (a `VecDeque` per pixel would be far too heavy for a whole
// frame) it keeps one running total per byte offset. Adding the newest byte and
// subtracting the byte that fell out of the window keeps `sum / N` equal to the
// mean of the last N frames, with exact integer arithmetic and no drift.
//
// Key architectural principles:
// 1.  **Order Matters**: The delta for a byte is taken against the average *before*
//     the new frame is folded in. The baseline must not already contain the value
//     it is being compared against.
// 2.  **Slice Kernels**: The arithmetic lives in free functions over slices so that
//     row workers can run them on disjoint sub-ranges of the same accumulator.
// 3.  **Compile-Time Window**: N is a const generic and must be a power of two, so
//     the per-byte average is a shift rather than a division.

/// Default averaging window, in frames.
pub const DEFAULT_WINDOW: usize = 64;

/// The byte-sized average of an accumulator holding the last `N` values.
#[inline]
pub fn average<const N: usize>(sum: u32) -> u8 {
    (sum / N as u32) as u8
}

/// Warm-up step: folds `bytes` into `sums` without removing anything.
pub fn add_bytes(sums: &mut [u32], bytes: &[u8]) {
    debug_assert_eq!(sums.len(), bytes.len());
    for (sum, &value) in sums.iter_mut().zip(bytes) {
        *sum += u32::from(value);
    }
}

/// Computes `delta[i] = average(sum[i]) - new[i]`, then rolls `sum[i]` forward by
/// adding `new[i]` and dropping `old[i]`.
pub fn roll_and_delta<const N: usize>(
    sums: &mut [u32],
    new: &[u8],
    old: &[u8],
    deltas: &mut [i32],
) {
    debug_assert_eq!(sums.len(), new.len());
    debug_assert_eq!(sums.len(), old.len());
    debug_assert_eq!(sums.len(), deltas.len());
    for (((sum, &new_value), &old_value), delta) in
        sums.iter_mut().zip(new).zip(old).zip(deltas.iter_mut())
    {
        *delta = i32::from(average::<N>(*sum)) - i32::from(new_value);
        *sum = *sum + u32::from(new_value) - u32::from(old_value);
    }
}

/// One accumulator per byte offset of a frame, sized once and never resized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingSums<const N: usize = DEFAULT_WINDOW> {
    sums: Vec<u32>,
}

impl<const N: usize> RollingSums<N> {
    pub fn new(len: usize) -> Self {
        const { assert!(N.is_power_of_two(), "averaging window must be a power of two") };
        Self { sums: vec![0; len] }
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn add_frame(&mut self, bytes: &[u8]) {
        add_bytes(&mut self.sums, bytes);
    }

    pub fn roll_and_delta(&mut self, new: &[u8], old: &[u8], deltas: &mut [i32]) {
        roll_and_delta::<N>(&mut self.sums, new, old, deltas);
    }

    /// The current byte average at `index`.
    pub fn average_at(&self, index: usize) -> u8 {
        average::<N>(self.sums[index])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.sums
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.sums
    }
}
