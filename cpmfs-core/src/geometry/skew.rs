//! Logical to physical sector translation.

use super::Geometry;

/// Apple DOS 3.3 order, for CP/M cards reading DOS-ordered images.
const APPLE_DO: [usize; 16] = [0, 6, 12, 3, 9, 15, 14, 5, 11, 2, 8, 7, 13, 4, 10, 1];
/// Apple ProDOS order.
const APPLE_PO: [usize; 16] = [0, 9, 3, 12, 6, 15, 1, 10, 4, 13, 7, 8, 2, 11, 5, 14];

/// Physical sector number for every logical sector of a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkewTable {
    table: Vec<usize>,
}

impl SkewTable {
    /// Interleave `sectrk` sectors by `skew`, starting at physical
    /// `skewstart`.
    ///
    /// Slots already taken are skipped by probing forward, so the result
    /// is a permutation even when `skew` and `sectrk` share a factor.
    pub fn generate(sectrk: usize, skew: usize, skewstart: usize, datasect: usize) -> Self {
        let mut used = vec![false; sectrk];
        let mut table = Vec::with_capacity(sectrk);
        if sectrk == 0 {
            return SkewTable { table };
        }

        let mut j = (skewstart as isize - datasect as isize).rem_euclid(sectrk as isize) as usize;
        for _ in 0..sectrk {
            while used[j] {
                j = (j + 1) % sectrk;
            }
            used[j] = true;
            table.push(j + datasect);
            j = (j + skew) % sectrk;
        }
        SkewTable { table }
    }

    /// The table for a mounted format; the Apple formats use fixed orders.
    pub fn for_geometry(geometry: &Geometry) -> Self {
        let fixed = match geometry.name.as_str() {
            "apple-do" => Some(&APPLE_DO),
            "apple-po" => Some(&APPLE_PO),
            _ => None,
        };
        match fixed {
            Some(order) if geometry.sectrk == order.len() => SkewTable {
                table: order.iter().map(|s| s + geometry.datasect).collect(),
            },
            _ => Self::generate(
                geometry.sectrk,
                geometry.skew,
                geometry.skewstart,
                geometry.datasect,
            ),
        }
    }

    pub fn physical(&self, logical: usize) -> usize {
        self.table[logical]
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_permutation(table: &SkewTable, sectrk: usize, datasect: usize) -> bool {
        let mut sorted = table.as_slice().to_vec();
        sorted.sort_unstable();
        sorted == (datasect..datasect + sectrk).collect::<Vec<_>>()
    }

    #[test]
    fn test_ibm_3740_skew() {
        let table = SkewTable::generate(26, 6, 1, 1);
        assert_eq!(
            table.as_slice(),
            &[1, 7, 13, 19, 25, 5, 11, 17, 23, 3, 9, 15, 21, 2, 8, 14, 20, 26, 6, 12, 18, 24, 4, 10, 16, 22]
        );
    }

    #[test]
    fn test_always_a_permutation() {
        for sectrk in 1..=32 {
            for skew in 0..=sectrk {
                for datasect in 0..=1 {
                    let table = SkewTable::generate(sectrk, skew, 1, datasect);
                    assert!(
                        is_permutation(&table, sectrk, datasect),
                        "sectrk {sectrk} skew {skew} datasect {datasect}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_non_coprime_skew_steps_forward() {
        // gcd(2, 8) = 2: after 0,2,4,6 the next free slot is 1.
        let table = SkewTable::generate(8, 2, 0, 0);
        assert_eq!(table.as_slice(), &[0, 2, 4, 6, 1, 3, 5, 7]);
    }

    #[test]
    fn test_skewstart_below_datasect() {
        let table = SkewTable::generate(9, 1, 0, 1);
        assert!(is_permutation(&table, 9, 1));
        assert_eq!(table.physical(0), 9);
    }

    #[test]
    fn test_fixed_apple_tables_are_permutations() {
        let do_table = SkewTable { table: APPLE_DO.to_vec() };
        let po_table = SkewTable { table: APPLE_PO.to_vec() };
        assert!(is_permutation(&do_table, 16, 0));
        assert!(is_permutation(&po_table, 16, 0));
    }
}
