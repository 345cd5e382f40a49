//! Coherent reorder.
//!
//! The coherent step copies agent data into cell-sorted order so that a
//! cell's members sit next to each other in memory, then copies the results
//! back to canonical order once the step is done.

use glam::Vec3;
use rayon::prelude::*;

/// `dst[k] = src[permutation[k]]` for every slot `k`.
pub fn gather(src: &[Vec3], permutation: &[u32], dst: &mut [Vec3], workgroup_size: usize) {
    dst.par_chunks_mut(workgroup_size)
        .zip(permutation.par_chunks(workgroup_size))
        .for_each(|(out, indices)| {
            for (slot, &index) in out.iter_mut().zip(indices) {
                *slot = src[index as usize];
            }
        });
}

/// Fill `inverse` so that `inverse[permutation[k]] == k`.
pub fn invert(permutation: &[u32], inverse: &mut [u32]) {
    debug_assert_eq!(permutation.len(), inverse.len());
    for (k, &index) in permutation.iter().enumerate() {
        inverse[index as usize] = k as u32;
    }
}

/// Undo [`gather`]: `dst[i] = src[inverse[i]]` where `inverse` comes from
/// [`invert`].
pub fn scatter_back(src: &[Vec3], inverse: &[u32], dst: &mut [Vec3], workgroup_size: usize) {
    gather(src, inverse, dst, workgroup_size);
}
