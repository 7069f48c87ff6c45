//! Cross-Sample Collator (spec.md §4.K).
//!
//! Grounded in
//! `original_source/src/CrossSampleFeatureCollatorTurbo.h`: every sample's
//! features are projected onto the pivot's warped retention-time axis,
//! flattened, and walked in descending intensity order so the most
//! confident feature in any neighborhood claims its master feature first;
//! later, weaker features only ever join an existing master or seed a new
//! one, never displace an earlier join. Ties are broken by
//! `(|Δt_warped|, |Δmass|, sample_id)`, smallest first.

use crate::feature::Feature;
use crate::system::ppm_difference;
use crate::warp::TimeWarp;

/// One sample's collated features plus the warp that projects its
/// retention times onto the pivot's warped axis.
pub struct SampleFeatures {
    /// Stable identifier for this sample within the run.
    pub sample_id: usize,
    /// This sample's collated features (spec.md §4.I output).
    pub features: Vec<Feature>,
    /// The warp aligning this sample's retention times to the pivot's.
    pub warp: TimeWarp,
}

/// A feature observed consistently across one or more samples
/// (spec.md §3 "MasterFeature").
#[derive(Debug, Clone, PartialEq)]
pub struct MasterFeature {
    /// Neutral monoisotopic mass of the seeding feature, Da.
    pub mw_monoisotopic: f64,
    /// Apex retention time, in the pivot's warped coordinate frame.
    pub apex_rt_warped: f64,
    /// Intensity of the seeding (most intense) member feature.
    pub max_intensity: f64,
    /// `(sample_id, index into that sample's `features`)` pairs.
    pub members: Vec<(usize, usize)>,
}

struct FlatEntry {
    sample_id: usize,
    feature_index: usize,
    warped_rt: f64,
    mass: f64,
    intensity: f64,
}

/// Join every sample's features into master features (spec.md §4.K).
/// `ppm` and `max_time_tolerance_warped` gate whether two features are
/// considered the same underlying analyte; `dedupe_per_sample` drops a
/// sample's second-best match to a master feature that already has a
/// member from that sample.
pub fn collate_cross_sample(samples: &[SampleFeatures], ppm: f64, max_time_tolerance_warped: f64, dedupe_per_sample: bool) -> Vec<MasterFeature> {
    let mut entries: Vec<FlatEntry> = Vec::new();
    for sample in samples {
        for (index, feature) in sample.features.iter().enumerate() {
            let warped_rt = sample.warp.invert().warp(feature.apex_rt);
            entries.push(FlatEntry {
                sample_id: sample.sample_id,
                feature_index: index,
                warped_rt,
                mass: feature.mw_monoisotopic,
                intensity: feature.max_intensity,
            });
        }
    }
    entries.sort_by(|a, b| b.intensity.partial_cmp(&a.intensity).unwrap());

    let mut masters: Vec<MasterFeature> = Vec::new();
    for entry in entries {
        let mut best: Option<(usize, f64, f64, usize)> = None;
        for (master_index, master) in masters.iter().enumerate() {
            let dt = (entry.warped_rt - master.apex_rt_warped).abs();
            let dmass = ppm_difference(entry.mass, master.mw_monoisotopic);
            if dt > max_time_tolerance_warped || dmass > ppm {
                continue;
            }
            if dedupe_per_sample && master.members.iter().any(|(s, _)| *s == entry.sample_id) {
                continue;
            }
            let seed_sample_id = master.members.first().map_or(usize::MAX, |(s, _)| *s);
            let candidate = (master_index, dt, dmass, seed_sample_id);
            best = Some(match best {
                None => candidate,
                Some(current) => tie_break(current, candidate),
            });
        }

        match best {
            Some((master_index, _, _, _)) => {
                masters[master_index].members.push((entry.sample_id, entry.feature_index));
            }
            None => masters.push(MasterFeature {
                mw_monoisotopic: entry.mass,
                apex_rt_warped: entry.warped_rt,
                max_intensity: entry.intensity,
                members: vec![(entry.sample_id, entry.feature_index)],
            }),
        }
    }

    masters
}

/// Break a tie between two candidate master features by
/// `(|Δt_warped|, |Δmass|, seed sample_id)`, smallest first (spec.md §4.K).
fn tie_break(current: (usize, f64, f64, usize), candidate: (usize, f64, f64, usize)) -> (usize, f64, f64, usize) {
    let (_, cur_dt, cur_dmass, cur_sample) = current;
    let (_, cand_dt, cand_dmass, cand_sample) = candidate;
    match cand_dt.partial_cmp(&cur_dt).unwrap() {
        std::cmp::Ordering::Less => candidate,
        std::cmp::Ordering::Greater => current,
        std::cmp::Ordering::Equal => match cand_dmass.partial_cmp(&cur_dmass).unwrap() {
            std::cmp::Ordering::Less => candidate,
            std::cmp::Ordering::Greater => current,
            std::cmp::Ordering::Equal => {
                if cand_sample < cur_sample {
                    candidate
                } else {
                    current
                }
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(rt: f64, mw: f64, intensity: f64) -> Feature {
        Feature {
            xic_start_rt: rt - 0.1,
            xic_end_rt: rt + 0.1,
            apex_rt: rt,
            mw_monoisotopic: mw,
            max_corr: 0.95,
            max_intensity: intensity,
            ion_count: 5,
            charge_order: vec![2],
            max_isotope_count: 4,
        }
    }

    #[test]
    fn identical_features_across_samples_join_one_master() {
        let samples = vec![
            SampleFeatures {
                sample_id: 0,
                features: vec![feature(10.0, 1500.0, 2.0e7)],
                warp: TimeWarp::identity(),
            },
            SampleFeatures {
                sample_id: 1,
                features: vec![feature(10.02, 1500.0002, 1.8e7)],
                warp: TimeWarp::identity(),
            },
        ];
        let masters = collate_cross_sample(&samples, 15.0, 0.08, true);
        assert_eq!(masters.len(), 1);
        assert_eq!(masters[0].members.len(), 2);
    }

    #[test]
    fn distant_masses_never_join() {
        let samples = vec![
            SampleFeatures {
                sample_id: 0,
                features: vec![feature(10.0, 1500.0, 2.0e7)],
                warp: TimeWarp::identity(),
            },
            SampleFeatures {
                sample_id: 1,
                features: vec![feature(10.0, 1600.0, 1.8e7)],
                warp: TimeWarp::identity(),
            },
        ];
        let masters = collate_cross_sample(&samples, 15.0, 0.08, true);
        assert_eq!(masters.len(), 2);
    }

    #[test]
    fn dedupe_per_sample_keeps_first_joined_feature() {
        let samples = vec![
            SampleFeatures {
                sample_id: 0,
                features: vec![feature(10.0, 1500.0, 2.0e7)],
                warp: TimeWarp::identity(),
            },
            SampleFeatures {
                sample_id: 1,
                features: vec![feature(10.01, 1500.0001, 1.9e7), feature(10.015, 1500.0001, 1.85e7)],
                warp: TimeWarp::identity(),
            },
        ];
        let masters = collate_cross_sample(&samples, 15.0, 0.08, true);
        assert_eq!(masters.len(), 2);
        let joined_master = masters.iter().find(|m| m.members.len() == 2).unwrap();
        assert_eq!(joined_master.members.iter().filter(|(s, _)| *s == 1).count(), 1);
    }
}
