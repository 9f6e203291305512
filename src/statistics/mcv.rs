// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Most-common-value lists
//!
//! Collected statistics often come in two parts: a list of the most common
//! values with their exact frequencies, and an equi-depth histogram of the
//! rest. The MCVs become singleton buckets and are spliced into the
//! histogram, splitting every histogram bucket that contains one of them.

use std::cmp::Ordering;

use super::bucket::Bucket;
use super::histogram::Histogram;
use crate::core::{Error, Point, Result, TypeCatalog};

/// Frequency share above which an MCV list wins over a histogram it cannot
/// be merged with
const MCV_PREFERENCE_THRESHOLD: f64 = 0.5;

/// Build a histogram of singleton buckets from an MCV list
///
/// Values are sorted; each becomes `[v, v]` with its frequency and one
/// distinct value.
pub fn transform_mcv(values: &[Point], frequencies: &[f64], cat: &dyn TypeCatalog) -> Result<Histogram> {
    if values.len() != frequencies.len() {
        return Err(Error::McvLengthMismatch {
            values: values.len(),
            frequencies: frequencies.len(),
        });
    }

    let mut pairs: Vec<(&Point, f64)> = values.iter().zip(frequencies.iter().copied()).collect();
    pairs.sort_by(|(a, _), (b, _)| {
        if a.less_than(b, cat) {
            Ordering::Less
        } else if b.less_than(a, cat) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });

    let buckets = pairs
        .into_iter()
        .map(|(point, freq)| Bucket::try_new(point.clone(), point.clone(), true, true, freq, 1.0, cat))
        .collect::<Result<Vec<_>>>()?;
    Histogram::try_from_buckets(buckets, 0.0, 0.0, 0.0, cat)
}

/// Merge an MCV histogram into the histogram of the remaining values
///
/// When the MCV type cannot be compared the side with more information is
/// returned unchanged: the MCVs if they cover more than half the rows, the
/// histogram otherwise.
pub fn merge_mcv_histogram(mcv: &Histogram, hist: &Histogram, cat: &dyn TypeCatalog) -> Histogram {
    let (Some(first_mcv), Some(first_hist)) = (mcv.buckets().first(), hist.buckets().first()) else {
        return if mcv.bucket_count() > 0 { mcv.clone() } else { hist.clone() };
    };

    let point = first_mcv.lower();
    if !point.is_comparable(point, cat) || !point.is_comparable(first_hist.lower(), cat) {
        let prefer_mcv = mcv.frequency() > MCV_PREFERENCE_THRESHOLD;
        tracing::trace!(
            mcv_frequency = mcv.frequency(),
            prefer_mcv,
            "MCV type not comparable with histogram, keeping one side"
        );
        return if prefer_mcv { mcv.clone() } else { hist.clone() };
    }

    let buckets = merge_buckets(mcv.buckets(), hist.buckets(), cat);
    Histogram::new(buckets).with_residual_mass(
        hist.null_freq(),
        hist.distinct_remain(),
        hist.freq_remain(),
    )
}

fn merge_buckets(mcvs: &[Bucket], hist: &[Bucket], cat: &dyn TypeCatalog) -> Vec<Bucket> {
    let mut merged = Vec::with_capacity(mcvs.len() + hist.len() * 2);
    let (mut i_mcv, mut i_hist) = (0, 0);

    while i_mcv < mcvs.len() && i_hist < hist.len() {
        let mcv = &mcvs[i_mcv];
        let bucket = &hist[i_hist];
        if mcv.is_before(bucket, cat) {
            merged.push(mcv.clone());
            i_mcv += 1;
        } else if mcv.is_after(bucket, cat) {
            merged.push(bucket.clone());
            i_hist += 1;
        } else {
            debug_assert!(bucket.subsumes(mcv, cat));
            let start = i_mcv;
            while i_mcv < mcvs.len() && bucket.subsumes(&mcvs[i_mcv], cat) {
                i_mcv += 1;
            }
            merged.extend(split_bucket(bucket, &mcvs[start..i_mcv], cat));
            i_hist += 1;
        }
    }

    merged.extend(mcvs[i_mcv..].iter().cloned());
    merged.extend(hist[i_hist..].iter().cloned());
    merged
}

/// Split a histogram bucket at the MCVs it contains
///
/// E.g. `[5, 10)` with MCVs 6 and 8 becomes `[5, 6) [6, 6] (6, 8) [8, 8] (8, 10)`.
/// The bucket's frequency and its distinct count minus the MCVs are spread
/// by width over the pieces between the MCVs.
fn split_bucket(bucket: &Bucket, mcvs: &[Bucket], cat: &dyn TypeCatalog) -> Vec<Bucket> {
    let mut pieces: Vec<Bucket> = Vec::with_capacity(mcvs.len() * 2 + 1);
    let mut is_mcv: Vec<bool> = Vec::with_capacity(mcvs.len() * 2 + 1);

    let mut lower = bucket.lower();
    let mut lower_closed = bucket.is_lower_closed();
    for mcv in mcvs {
        if let Some(piece) = valid_range(lower, mcv.lower(), lower_closed, false, cat) {
            pieces.push(piece);
            is_mcv.push(false);
        }
        pieces.push(mcv.clone());
        is_mcv.push(true);
        lower = mcv.lower();
        lower_closed = false;
    }
    if let Some(piece) = valid_range(lower, bucket.upper(), lower_closed, bucket.is_upper_closed(), cat) {
        pieces.push(piece);
        is_mcv.push(false);
    }

    let distinct_total = (bucket.distinct() - mcvs.len() as f64).max(1.0);
    let total_width: f64 = pieces
        .iter()
        .zip(&is_mcv)
        .filter(|(_, &mcv)| !mcv)
        .map(|(piece, _)| piece.width(cat))
        .sum();

    if total_width > 0.0 {
        for (piece, _) in pieces.iter_mut().zip(&is_mcv).filter(|(_, &mcv)| !mcv) {
            let share = piece.width(cat) / total_width;
            *piece = piece.with_stats(bucket.frequency() * share, distinct_total * share);
        }
    }
    pieces
}

/// Bucket between two points if the range holds at least one value
///
/// For integer-mapped types the open ends are subtracted from the distance,
/// so `(2, 3)` is rejected while `(2.0, 3.0)` is kept.
fn valid_range(
    lower: &Point,
    upper: &Point,
    lower_closed: bool,
    upper_closed: bool,
    cat: &dyn TypeCatalog,
) -> Option<Bucket> {
    if lower.greater_than(upper, cat) {
        return None;
    }
    if lower.equals(upper, cat) && !(lower_closed && upper_closed) {
        return None;
    }
    if cat.has_integer_mapping(lower.data_type()) {
        let mut span = upper.distance(lower, cat);
        if !lower_closed {
            span -= 1.0;
        }
        if !upper_closed {
            span -= 1.0;
        }
        if span < 0.0 {
            return None;
        }
    }
    Some(Bucket::new(
        lower.clone(),
        upper.clone(),
        lower_closed,
        upper_closed,
        0.0,
        0.0,
    ))
}
