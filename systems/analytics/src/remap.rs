//! Reduction of arbitrarily sized statistics matrices onto the 5x5 report grid.
//!
//! Source matrices are row-major with `rows * columns` entries. Each output
//! bucket covers a contiguous block of source rows and columns; when a
//! dimension is not a multiple of five the remainder is spread symmetrically
//! over the output slots so that every source entry lands in exactly one
//! bucket. Only strictly positive values count toward a bucket: zero and
//! negative entries mean "not yet recorded".

use std::{collections::BTreeMap, ops::Range};

use beatshot_core::{AccuracyData, ACCURACY_GRID_DIMENSION};

const DIM: usize = ACCURACY_GRID_DIMENSION;

/// Numeric source values that can be bucketed.
pub trait BucketValue: Copy {
    /// Widens the value for summation.
    fn to_f64(self) -> f64;
}

macro_rules! bucket_value {
    ($($ty:ty),*) => {
        $(impl BucketValue for $ty {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

bucket_value!(i32, i64, u32, u64, f32, f64);

/// Which of the five output slots absorb one extra source row or column for
/// the given remainder (`size % 5`).
#[must_use]
pub const fn overflow_pattern(remainder: usize) -> [usize; DIM] {
    let outer = matches!(remainder, 2..=4) as usize;
    let inner = (remainder == 4) as usize;
    let middle = matches!(remainder, 1 | 3) as usize;
    [outer, inner, middle, inner, outer]
}

/// Source ranges covered by each of the five output slots along one axis.
#[must_use]
pub fn block_ranges(size: usize) -> [Range<usize>; DIM] {
    let floor = size / DIM;
    let pad = overflow_pattern(size % DIM);
    let mut start = 0;
    std::array::from_fn(|slot| {
        let end = start + floor + pad[slot];
        let range = start..end;
        start = end;
        range
    })
}

/// Sum and count of the strictly positive entries of one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Bucket {
    sum: f64,
    count: usize,
}

fn collect_buckets<T: BucketValue>(
    source: &[T],
    rows: usize,
    columns: usize,
) -> [[Bucket; DIM]; DIM] {
    let row_ranges = block_ranges(rows);
    let column_ranges = block_ranges(columns);
    let mut buckets = [[Bucket::default(); DIM]; DIM];

    for (i, row_range) in row_ranges.iter().enumerate() {
        for (j, column_range) in column_ranges.iter().enumerate() {
            let bucket = &mut buckets[i][j];
            for x in row_range.clone() {
                for y in column_range.clone() {
                    let Some(value) = source.get(x * columns + y) else {
                        continue;
                    };
                    let value = value.to_f64();
                    if value > 0.0 {
                        bucket.sum += value;
                        bucket.count += 1;
                    }
                }
            }
        }
    }
    buckets
}

/// Reduces `source` onto a 5x5 grid, averaging each bucket or returning the
/// raw sum. Buckets without a positive entry stay zero.
#[must_use]
pub fn average_into_5x5<T: BucketValue>(
    source: &[T],
    rows: usize,
    columns: usize,
    average: bool,
) -> [[f64; DIM]; DIM] {
    let buckets = collect_buckets(source, rows, columns);
    buckets.map(|row| {
        row.map(|bucket| match (bucket.count, average) {
            (0, _) => 0.0,
            (count, true) => bucket.sum / count as f64,
            (_, false) => bucket.sum,
        })
    })
}

/// Sums spawn and hit matrices into an [`AccuracyData`] report and computes
/// the hit ratio of every bucket that saw a spawn.
#[must_use]
pub fn accumulate_accuracy_5x5(
    total_spawns: &[i64],
    total_hits: &[i64],
    rows: usize,
    columns: usize,
) -> AccuracyData {
    let spawns = collect_buckets(total_spawns, rows, columns);
    let hits = collect_buckets(total_hits, rows, columns);
    let mut data = AccuracyData::empty();

    for (i, row) in data.rows.iter_mut().enumerate() {
        for j in 0..DIM {
            if spawns[i][j].count > 0 {
                row.total_spawns[j] = spawns[i][j].sum as i64;
            }
            if hits[i][j].count > 0 {
                row.total_hits[j] = hits[i][j].sum as i64;
            }
        }
    }
    data.calculate_accuracy();
    data
}

/// Maps every output bucket index (`row * 5 + column`) to the source indices
/// it covers.
#[must_use]
pub fn map_indices_to_5x5(rows: usize, columns: usize) -> BTreeMap<usize, Vec<usize>> {
    let row_ranges = block_ranges(rows);
    let column_ranges = block_ranges(columns);
    let mut mapping = BTreeMap::new();

    for (i, row_range) in row_ranges.iter().enumerate() {
        for (j, column_range) in column_ranges.iter().enumerate() {
            let sources = row_range
                .clone()
                .flat_map(|x| column_range.clone().map(move |y| x * columns + y))
                .collect();
            let _ = mapping.insert(i * DIM + j, sources);
        }
    }
    mapping
}
