//! Logical track to (cylinder, head) mapping for multi-sided media.

use crate::format::Sidedness;

/// Map a logical track onto a `(cylinder, head)` pair.
///
/// Callers validate `sidedness` against the geometry when the preset is
/// loaded; this function has no error path.
pub fn physical_location(
    cylinders: usize,
    heads: usize,
    sidedness: Sidedness,
    logical: usize,
) -> (usize, usize) {
    match sidedness {
        Sidedness::Alternate => (logical / heads, logical % heads),
        Sidedness::OutBack => {
            if logical < cylinders {
                (logical, 0)
            } else {
                (2 * cylinders - (1 + logical), 1)
            }
        }
        Sidedness::OutOut => (logical % cylinders, logical / cylinders),
        // Nanowasp images store 40 cylinders per side, interleaved.
        Sidedness::Nanowasp => ((logical & 1) * 40 + logical / 2, 0),
    }
}
