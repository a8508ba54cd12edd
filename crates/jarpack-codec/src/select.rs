//! Effort-driven codec selection.
//!
//! Given a band and its default codec, the selector test-encodes a set of
//! canonical candidates chosen from summary statistics and keeps whichever
//! saves the most bytes after specifier overhead, or the default when
//! nothing beats it.

use std::collections::HashMap;

use tracing::debug;

use crate::bhsd::BhsdCodec;
use crate::codec::Codec;
use crate::encoding::specifier;
use crate::error::Result;
use crate::families;
use crate::population::PopulationCodec;

/// Band sizes below these (indexed by effort) skip selection outright.
const EFFORT_THRESHOLDS: [usize; 10] = [0, 0, 1000, 100, 100, 100, 100, 100, 100, 0];

/// Near-minimal margin: defaults within `len + NEAR_MINIMAL - 2*effort`
/// bytes of one byte per value are kept without further search.
const NEAR_MINIMAL: i64 = 23;

const SMALL_DELTA_RATIO: f64 = 0.7;
const ASCENDING_RATIO: f64 = 0.95;
const CORRELATION_FACTOR: f64 = 3.1;
const DISTINCT_RATIO: f64 = 0.02;
const DISTINCT_RATIO_HIGH_EFFORT: f64 = 0.04;
const DISTINCT_LIMIT: usize = 100;
const FAVOURED_MIN_COUNT: usize = 2;

/// Sub-bands of a population use this name so they are never themselves
/// population-coded.
const POPULATION_BAND: &str = "POPULATION";

/// What the selector decided for one band.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecChoice {
    /// The band default; no specifier is emitted.
    Default,
    /// A better codec; the first specifier value is folded into the band,
    /// the rest belong in the band-headers sidecar.
    Better {
        /// The selected codec
        codec: Codec,
        /// Specifier values identifying it under the band default
        specifier: Vec<i32>,
    },
}

/// An encoded band plus the codec decision that produced it.
#[derive(Debug, Clone)]
pub struct BandEncoding {
    /// The band payload, excluding any specifier prefix
    pub bytes: Vec<u8>,
    /// The codec decision
    pub choice: CodecChoice,
}

struct Analysis {
    encoded: Vec<u8>,
    codec: Option<Codec>,
    specifier: Vec<i32>,
    saved: i64,
    tried: u32,
}

/// The codec selector for one packing run.
#[derive(Debug, Clone, Copy)]
pub struct CodecSelector {
    effort: u32,
}

impl CodecSelector {
    /// Build a selector for the given effort level (1..=9).
    pub const fn new(effort: u32) -> Self {
        let effort = if effort < 1 {
            1
        } else if effort > 9 {
            9
        } else {
            effort
        };
        Self { effort }
    }

    /// Encode `band`, possibly under a better codec than `default`.
    ///
    /// Empty bands yield empty output. Bands whose default is `BYTE1`
    /// are never recoded: with `l = 0` there is no byte value left to
    /// announce a specifier.
    pub fn encode_band(&self, name: &str, band: &[i32], default: &BhsdCodec) -> Result<BandEncoding> {
        if band.is_empty() {
            return Ok(BandEncoding { bytes: Vec::new(), choice: CodecChoice::Default });
        }
        if self.effort <= 1
            || *default == BhsdCodec::BYTE1
            || band.len() < EFFORT_THRESHOLDS[self.effort as usize]
        {
            return Ok(BandEncoding {
                bytes: default.encode_ints(band)?,
                choice: CodecChoice::Default,
            });
        }
        let analysis = self.analyse_band(name, band, default)?;
        match analysis.codec {
            None => Ok(BandEncoding { bytes: analysis.encoded, choice: CodecChoice::Default }),
            Some(codec) => {
                debug!(band = name, codec = %codec, saved = analysis.saved, "selected codec");
                Ok(BandEncoding {
                    bytes: analysis.encoded,
                    choice: CodecChoice::Better { codec, specifier: analysis.specifier },
                })
            }
        }
    }

    fn analyse_band(&self, name: &str, band: &[i32], default: &BhsdCodec) -> Result<Analysis> {
        let mut analysis = Analysis {
            encoded: default.encode_ints(band)?,
            codec: None,
            specifier: Vec::new(),
            saved: 0,
            tried: 0,
        };
        let default_len = analysis.encoded.len();

        // Keep defaults that are already close to one byte per value.
        let margin = band.len() as i64 + NEAR_MINIMAL - 2 * i64::from(self.effort);
        if default_len as i64 <= margin {
            return Ok(analysis);
        }

        let data = BandData::new(band, self.effort);

        // BYTE1 is a 1:1 mapping whenever the values allow it.
        if !data.any_negatives() && i64::from(data.largest) <= BhsdCodec::BYTE1.largest() {
            analysis.encoded = BhsdCodec::BYTE1.encode_ints(band)?;
            analysis.codec = Some(BhsdCodec::BYTE1.into());
            analysis.specifier = vec![1];
            analysis.saved = default_len as i64 - analysis.encoded.len() as i64 - 1;
            return Ok(analysis);
        }

        if self.effort > 3 && name != POPULATION_BAND {
            let distinct = data.distinct_count();
            let ratio = distinct as f64 / band.len() as f64;
            if distinct < DISTINCT_LIMIT
                || ratio < DISTINCT_RATIO
                || (self.effort > 6 && ratio < DISTINCT_RATIO_HIGH_EFFORT)
            {
                self.try_population(band, default, &data, default_len, &mut analysis)?;
                if self.time_to_stop(&analysis) {
                    return Ok(analysis);
                }
            }
        }

        let mut families_to_try: Vec<&[usize]> = Vec::new();
        if data.mainly_positive_deltas() && data.mainly_small_deltas() {
            families_to_try.push(families::DELTA_UNSIGNED_2);
        }
        if data.well_correlated() {
            if data.mainly_positive_deltas() {
                families_to_try.extend_from_slice(families::DELTA_UNSIGNED);
                families_to_try.extend_from_slice(families::NON_DELTA_UNSIGNED);
            } else {
                families_to_try.extend_from_slice(families::DELTA_SIGNED);
                families_to_try.extend_from_slice(families::NON_DELTA_SIGNED);
            }
        } else if data.any_negatives() {
            families_to_try.extend_from_slice(families::NON_DELTA_SIGNED);
            families_to_try.extend_from_slice(families::DELTA_SIGNED);
        } else {
            families_to_try.extend_from_slice(families::NON_DELTA_UNSIGNED);
            families_to_try.extend_from_slice(families::DELTA_UNSIGNED);
        }

        for family in families_to_try {
            self.try_family(band, default, &data, family, default_len, &mut analysis)?;
            if self.time_to_stop(&analysis) {
                break;
            }
        }
        Ok(analysis)
    }

    fn try_family(
        &self,
        band: &[i32],
        default: &BhsdCodec,
        data: &BandData,
        family: &[usize],
        default_len: usize,
        analysis: &mut Analysis,
    ) -> Result<()> {
        for candidate in families::members(family) {
            if candidate == default {
                // Wider codecs of the default's own family cannot win.
                return Ok(());
            }
            let in_range = if candidate.is_delta() {
                candidate.largest() >= data.largest_delta
                    && candidate.smallest() <= data.smallest_delta
                    && candidate.largest() >= i64::from(data.largest)
                    && candidate.smallest() <= i64::from(data.smallest)
            } else {
                candidate.largest() >= i64::from(data.largest)
                    && candidate.smallest() <= i64::from(data.smallest)
            };
            if in_range {
                let encoded = candidate.encode_ints(band)?;
                analysis.tried += 1;
                let spec = specifier(&(*candidate).into(), default)?;
                let overhead = default.encode_ints(&spec)?.len();
                let saved = default_len as i64 - encoded.len() as i64 - overhead as i64;
                if saved > analysis.saved {
                    analysis.saved = saved;
                    analysis.codec = Some((*candidate).into());
                    analysis.specifier = spec;
                    analysis.encoded = encoded;
                }
            }
            if self.time_to_stop(analysis) {
                return Ok(());
            }
        }
        Ok(())
    }

    fn try_population(
        &self,
        band: &[i32],
        default: &BhsdCodec,
        data: &BandData,
        default_len: usize,
        analysis: &mut Analysis,
    ) -> Result<()> {
        // Noticeably more effort than a single candidate.
        analysis.tried += 3;

        let Some(counts) = data.distinct.as_ref() else {
            return Ok(());
        };
        let keep_all = counts.len() < 256;
        let mut favoured: Vec<i32> = counts
            .iter()
            .filter(|&(_, &c)| keep_all || c > FAVOURED_MIN_COUNT)
            .map(|(&v, _)| v)
            .collect();
        if favoured.is_empty() {
            return Ok(());
        }
        // Most common first; value order breaks ties so runs are stable.
        favoured.sort_by(|a, b| counts[b].cmp(&counts[a]).then(a.cmp(b)));

        let favoured_index: HashMap<i32, usize> =
            favoured.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        let mut tokens = Vec::with_capacity(band.len());
        let mut unfavoured = Vec::new();
        for &v in band {
            match favoured_index.get(&v) {
                Some(&i) => tokens.push(i as i32 + 1),
                None => {
                    tokens.push(0);
                    unfavoured.push(v);
                }
            }
        }

        let k = favoured.len();
        let mut favoured_band = favoured;
        if let Some(&sentinel) = favoured_band.last() {
            favoured_band.push(sentinel);
        }

        let favoured_results = self.analyse_band(POPULATION_BAND, &favoured_band, default)?;
        let unfavoured_results = self.analyse_band(POPULATION_BAND, &unfavoured, default)?;
        let (token_codec, tokens_encoded) = if k < 256 {
            (BhsdCodec::BYTE1, BhsdCodec::BYTE1.encode_ints(&tokens)?)
        } else {
            let token_results = self.analyse_band(POPULATION_BAND, &tokens, default)?;
            let codec = token_results
                .codec
                .as_ref()
                .and_then(Codec::as_bhsd)
                .copied()
                .unwrap_or(*default);
            (codec, token_results.encoded)
        };

        let pick = |a: &Analysis| {
            a.codec.as_ref().and_then(Codec::as_bhsd).copied().unwrap_or(*default)
        };
        let population = PopulationCodec::new(
            pick(&favoured_results),
            token_codec,
            pick(&unfavoured_results),
        );
        let spec = specifier(&Codec::Population(population.clone()), default)?;
        let overhead = default.encode_ints(&spec)?.len();
        let total =
            favoured_results.encoded.len() + tokens_encoded.len() + unfavoured_results.encoded.len();
        let saved = default_len as i64 - total as i64 - overhead as i64;
        if saved > analysis.saved {
            let mut bytes = favoured_results.encoded;
            bytes.extend(tokens_encoded);
            bytes.extend(unfavoured_results.encoded);
            analysis.saved = saved;
            analysis.codec = Some(Codec::Population(population));
            analysis.specifier = spec;
            analysis.encoded = bytes;
        }
        Ok(())
    }

    fn time_to_stop(&self, analysis: &Analysis) -> bool {
        if self.effort > 6 {
            analysis.tried >= self.effort * 2
        } else {
            analysis.tried >= self.effort
        }
    }
}

/// Summary statistics steering family choice.
struct BandData {
    smallest: i32,
    largest: i32,
    smallest_delta: i64,
    largest_delta: i64,
    ascending: usize,
    small_delta_count: usize,
    avg_abs_delta: f64,
    avg_abs_value: f64,
    len: usize,
    distinct: Option<HashMap<i32, usize>>,
}

impl BandData {
    fn new(band: &[i32], effort: u32) -> Self {
        let mut data = Self {
            smallest: i32::MAX,
            largest: i32::MIN,
            smallest_delta: 0,
            largest_delta: 0,
            ascending: 0,
            small_delta_count: 0,
            avg_abs_delta: 0.0,
            avg_abs_value: 0.0,
            len: band.len(),
            distinct: (effort > 3).then(HashMap::new),
        };
        for (i, &v) in band.iter().enumerate() {
            data.smallest = data.smallest.min(v);
            data.largest = data.largest.max(v);
            if i == 0 {
                // The first value is coded plain, so it bounds the
                // delta range too.
                data.smallest_delta = i64::from(v);
                data.largest_delta = i64::from(v);
            } else {
                let delta = i64::from(v) - i64::from(band[i - 1]);
                data.smallest_delta = data.smallest_delta.min(delta);
                data.largest_delta = data.largest_delta.max(delta);
                if delta >= 0 {
                    data.ascending += 1;
                }
                data.avg_abs_delta += delta.abs() as f64 / (band.len() - 1) as f64;
                if delta.abs() < 256 {
                    data.small_delta_count += 1;
                }
            }
            data.avg_abs_value += f64::from(v.abs()) / band.len() as f64;
            if let Some(map) = data.distinct.as_mut() {
                *map.entry(v).or_insert(0) += 1;
            }
        }
        data
    }

    fn distinct_count(&self) -> usize {
        self.distinct.as_ref().map_or(0, HashMap::len)
    }

    fn mainly_small_deltas(&self) -> bool {
        self.small_delta_count as f64 / self.len as f64 > SMALL_DELTA_RATIO
    }

    fn well_correlated(&self) -> bool {
        self.avg_abs_delta * CORRELATION_FACTOR < self.avg_abs_value
    }

    fn mainly_positive_deltas(&self) -> bool {
        self.ascending as f64 / self.len as f64 > ASCENDING_RATIO
    }

    fn any_negatives(&self) -> bool {
        self.smallest < 0
    }
}
