//! Band instantiation and payload streaming for one attribute layout.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::bands::BandEmitter;
use crate::error::{PackError, Result};
use crate::layout::element::{
    codec_for_tag, ElemId, IntegralKind, LayoutArena, LayoutElement, UintType,
};
use crate::layout::parser::parse_layout;
use crate::offsets::OffsetMap;

/// Nesting limit for call dispatch, against cyclic layouts whose data
/// never terminates them.
const MAX_CALL_DEPTH: usize = 512;

/// How a not-yet-renumbered band value resolves.
#[derive(Debug, Clone, Copy)]
enum PendingLabel {
    /// An absolute byte offset, renumbered to an instruction index
    Absolute { band: usize, pos: usize, offset: u32 },
    /// A byte span from `base`, renumbered to an index difference
    Relative { band: usize, pos: usize, base: u32, target: u32 },
}

#[derive(Debug, Clone)]
struct LayoutBand {
    tag: String,
    values: Vec<i32>,
}

/// The bands of one custom attribute definition, filled instance by
/// instance as the shredder encounters the attribute.
#[derive(Debug)]
pub struct NewAttributeBands {
    attribute_name: String,
    arena: LayoutArena,
    bands: Vec<LayoutBand>,
    pending: Vec<PendingLabel>,
    backwards_counts: Vec<i32>,
}

/// Rollback snapshot of one [`NewAttributeBands`].
#[derive(Debug, Clone)]
pub(crate) struct LayoutSnapshot {
    band_lens: Vec<usize>,
    pending_len: usize,
    backwards_counts: Vec<i32>,
}

impl NewAttributeBands {
    /// Parse `layout` and set up its bands.
    pub fn new(attribute_name: &str, layout: &str) -> Result<Self> {
        let arena = parse_layout(layout)?;
        let mut bands = vec![
            LayoutBand { tag: String::new(), values: Vec::new() };
            arena.band_count
        ];
        // Band tags follow element declaration order
        for element in &arena.elements {
            match element {
                LayoutElement::Integral { tag, band, .. }
                | LayoutElement::Reference { tag, band, .. }
                | LayoutElement::Replication { tag, count_band: band, .. }
                | LayoutElement::Union { tag, tag_band: band, .. } => {
                    bands[*band].tag.clone_from(tag);
                }
                _ => {}
            }
        }
        let backwards_counts = vec![0; arena.backwards_callable_count()];
        Ok(Self {
            attribute_name: attribute_name.to_string(),
            arena,
            bands,
            pending: Vec::new(),
            backwards_counts,
        })
    }

    /// Number of backwards callables in the layout.
    pub fn backwards_callable_count(&self) -> usize {
        self.backwards_counts.len()
    }

    /// Accumulated backwards call counts, by backwards-callable index.
    pub fn backwards_counts(&self) -> &[i32] {
        &self.backwards_counts
    }

    /// Stream one attribute instance's payload into the bands.
    pub fn add_attribute(&mut self, payload: &[u8]) -> Result<()> {
        let mut reader = Cursor::new(payload);
        let mut state = EvalState { last_p: 0 };
        let entry: Vec<ElemId> = if !self.arena.top.is_empty()
            && self
                .arena
                .top
                .iter()
                .all(|&id| matches!(self.arena.elements[id], LayoutElement::Callable { .. }))
        {
            // Layouts made of callables enter through the first one
            match &self.arena.elements[self.arena.top[0]] {
                LayoutElement::Callable { body, .. } => body.clone(),
                _ => Vec::new(),
            }
        } else {
            self.arena.top.clone()
        };
        self.eval(&entry, &mut reader, &mut state, 0)?;
        if (reader.position() as usize) < payload.len() {
            return Err(PackError::MalformedClass {
                class: String::new(),
                reason: format!(
                    "attribute {} payload has {} unread bytes",
                    self.attribute_name,
                    payload.len() - reader.position() as usize
                ),
            });
        }
        Ok(())
    }

    fn eval(
        &mut self,
        body: &[ElemId],
        reader: &mut Cursor<&[u8]>,
        state: &mut EvalState,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_CALL_DEPTH {
            return Err(PackError::InvalidLayout {
                layout: self.attribute_name.clone(),
                reason: "call recursion too deep".to_string(),
            });
        }
        for &id in body {
            let element = self.arena.elements[id].clone();
            match element {
                LayoutElement::Integral { kind, uint, band, .. } => {
                    let raw = match kind {
                        IntegralKind::Signed | IntegralKind::SignedOffset => {
                            self.read_int(reader, uint)?
                        }
                        _ => self.read_uint(reader, uint)?,
                    };
                    if kind.is_label() {
                        let pos = self.bands[band].values.len();
                        self.bands[band].values.push(0);
                        if kind.is_relative() {
                            let base = state.last_p;
                            let target = (i64::from(base) + raw) as u32;
                            self.pending.push(PendingLabel::Relative {
                                band,
                                pos,
                                base,
                                target,
                            });
                            state.last_p = target;
                        } else {
                            let offset = raw as u32;
                            self.pending.push(PendingLabel::Absolute { band, pos, offset });
                            state.last_p = offset;
                        }
                    } else {
                        self.bands[band].values.push(raw as i32);
                    }
                }
                LayoutElement::Reference { band, .. } => {
                    // References always travel in the pre-resolved
                    // four-byte form
                    let v = self.read_uint(reader, UintType::I)?;
                    self.bands[band].values.push(v as i32);
                }
                LayoutElement::Replication { uint, count_band, body, .. } => {
                    let count = self.read_uint(reader, uint)?;
                    self.bands[count_band].values.push(count as i32);
                    for _ in 0..count {
                        self.eval(&body, reader, state, depth + 1)?;
                    }
                }
                LayoutElement::Union { signed, uint, tag_band, cases, default_body, .. } => {
                    let tag = if signed {
                        self.read_int(reader, uint)?
                    } else {
                        self.read_uint(reader, uint)?
                    };
                    self.bands[tag_band].values.push(tag as i32);
                    let body = cases
                        .iter()
                        .find(|case| case.values.contains(&(tag as i32)))
                        .map_or(&default_body, |case| &case.body);
                    self.eval(&body.clone(), reader, state, depth + 1)?;
                }
                LayoutElement::Call { target, index } => {
                    if index < 0
                        && let LayoutElement::Callable {
                            backwards_index: Some(b), ..
                        } = self.arena.elements[target]
                    {
                        self.backwards_counts[b] += 1;
                    }
                    let callable_body = match &self.arena.elements[target] {
                        LayoutElement::Callable { body, .. } => body.clone(),
                        _ => Vec::new(),
                    };
                    self.eval(&callable_body, reader, state, depth + 1)?;
                }
                LayoutElement::Callable { .. } => {
                    // Callables run through calls, never inline
                }
            }
        }
        Ok(())
    }

    fn read_uint(&self, reader: &mut Cursor<&[u8]>, uint: UintType) -> Result<i64> {
        let truncated = || PackError::TruncatedInput { entry: self.attribute_name.clone() };
        Ok(match uint {
            UintType::B => i64::from(reader.read_u8().map_err(|_| truncated())?),
            UintType::H => i64::from(reader.read_u16::<BigEndian>().map_err(|_| truncated())?),
            UintType::I => i64::from(reader.read_u32::<BigEndian>().map_err(|_| truncated())?),
            UintType::V => 0,
        })
    }

    fn read_int(&self, reader: &mut Cursor<&[u8]>, uint: UintType) -> Result<i64> {
        let truncated = || PackError::TruncatedInput { entry: self.attribute_name.clone() };
        Ok(match uint {
            UintType::B => i64::from(reader.read_i8().map_err(|_| truncated())?),
            UintType::H => i64::from(reader.read_i16::<BigEndian>().map_err(|_| truncated())?),
            UintType::I => i64::from(reader.read_i32::<BigEndian>().map_err(|_| truncated())?),
            UintType::V => 0,
        })
    }

    /// Renumber pending positions against a method's offset map. Used
    /// for code-context attributes at the end of each method.
    pub(crate) fn renumber(&mut self, map: &OffsetMap) -> Result<()> {
        let fail = |offset: u32| PackError::MalformedClass {
            class: String::new(),
            reason: format!(
                "attribute {} position {offset} is not an instruction boundary",
                self.attribute_name
            ),
        };
        for label in std::mem::take(&mut self.pending) {
            match label {
                PendingLabel::Absolute { band, pos, offset } => {
                    self.bands[band].values[pos] =
                        map.renumber(offset).ok_or_else(|| fail(offset))?;
                }
                PendingLabel::Relative { band, pos, base, target } => {
                    self.bands[band].values[pos] =
                        map.renumber_delta(base, target).ok_or_else(|| fail(target))?;
                }
            }
        }
        Ok(())
    }

    /// Resolve pending positions as raw byte values. Used for
    /// non-code contexts, where no instruction map exists.
    pub(crate) fn resolve_raw(&mut self) {
        for label in std::mem::take(&mut self.pending) {
            match label {
                PendingLabel::Absolute { band, pos, offset } => {
                    self.bands[band].values[pos] = offset as i32;
                }
                PendingLabel::Relative { band, pos, base, target } => {
                    self.bands[band].values[pos] = target as i32 - base as i32;
                }
            }
        }
    }

    pub(crate) fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            band_lens: self.bands.iter().map(|b| b.values.len()).collect(),
            pending_len: self.pending.len(),
            backwards_counts: self.backwards_counts.clone(),
        }
    }

    pub(crate) fn rollback(&mut self, snapshot: &LayoutSnapshot) {
        for (band, &len) in self.bands.iter_mut().zip(&snapshot.band_lens) {
            band.values.truncate(len);
        }
        self.pending.truncate(snapshot.pending_len);
        self.backwards_counts.clone_from(&snapshot.backwards_counts);
    }

    /// Emit every band in declaration order, each under the codec its
    /// tag implies.
    pub(crate) fn pack(&self, context: &str, emitter: &mut BandEmitter<'_>) -> Result<()> {
        for (i, band) in self.bands.iter().enumerate() {
            let name = format!("{context}_{}_{}{i}", self.attribute_name, band.tag);
            emitter.band(&name, &band.values, &codec_for_tag(&band.tag))?;
        }
        Ok(())
    }
}

struct EvalState {
    last_p: u32,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn band_values(bands: &NewAttributeBands, i: usize) -> &[i32] {
        &bands.bands[i].values
    }

    #[test]
    fn test_stream_replicated_integrals() {
        let mut bands = NewAttributeBands::new("Demo", "NH[HH]").expect("layout");
        // count=2, then pairs (1,2) and (3,4)
        bands
            .add_attribute(&[0, 2, 0, 1, 0, 2, 0, 3, 0, 4])
            .expect("stream");
        assert_eq!(band_values(&bands, 0), &[2]);
        assert_eq!(band_values(&bands, 1), &[1, 3]);
        assert_eq!(band_values(&bands, 2), &[2, 4]);
    }

    #[test]
    fn test_stream_signed_byte() {
        let mut bands = NewAttributeBands::new("Demo", "SB").expect("layout");
        bands.add_attribute(&[0xFF]).expect("stream");
        assert_eq!(band_values(&bands, 0), &[-1]);
    }

    #[test]
    fn test_stream_union_case_selection() {
        let mut bands = NewAttributeBands::new("Demo", "TB(1)[H](2)[B]()[]").expect("layout");
        bands.add_attribute(&[1, 0, 7]).expect("stream"); // case 1: H
        bands.add_attribute(&[2, 9]).expect("stream"); // case 2: B
        bands.add_attribute(&[5]).expect("stream"); // default: empty
        assert_eq!(band_values(&bands, 0), &[1, 2, 5]);
        assert_eq!(band_values(&bands, 1), &[7]);
        assert_eq!(band_values(&bands, 2), &[9]);
    }

    #[test]
    fn test_stream_reference_reads_four_bytes() {
        let mut bands = NewAttributeBands::new("Demo", "RUH").expect("layout");
        bands.add_attribute(&[0, 0, 0, 42]).expect("stream");
        assert_eq!(band_values(&bands, 0), &[42]);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bands = NewAttributeBands::new("Demo", "B").expect("layout");
        assert!(bands.add_attribute(&[1, 2]).is_err());
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut bands = NewAttributeBands::new("Demo", "I").expect("layout");
        assert!(matches!(
            bands.add_attribute(&[0, 0]),
            Err(PackError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_bci_renumbering() {
        let mut bands = NewAttributeBands::new("Demo", "PHOH").expect("layout");
        // P = byte offset 1, O = +5 bytes from there
        bands.add_attribute(&[0, 1, 0, 5]).expect("stream");

        let mut map = OffsetMap::new();
        map.add_instruction(0);
        map.add_instruction(1);
        map.add_instruction(4);
        map.set_code_end(6);
        bands.renumber(&map).expect("renumber");

        assert_eq!(band_values(&bands, 0), &[1], "offset 1 is instruction 1");
        assert_eq!(band_values(&bands, 1), &[2], "span 1..6 covers 2 instructions");
    }

    #[test]
    fn test_backwards_call_counting() {
        let mut bands =
            NewAttributeBands::new("Demo", "[NB[(1)]][B(-1)]").expect("layout");
        assert_eq!(bands.backwards_callable_count(), 1);
        // entry: first callable: count=1, call forward to second callable:
        // B then backwards call to first: count=0 stops recursion
        bands.add_attribute(&[1, 9, 0]).expect("stream");
        assert_eq!(bands.backwards_counts(), &[1]);
    }

    #[test]
    fn test_rollback_restores_bands() {
        let mut bands = NewAttributeBands::new("Demo", "BH").expect("layout");
        bands.add_attribute(&[1, 0, 2]).expect("stream");
        let snapshot = bands.snapshot();
        bands.add_attribute(&[3, 0, 4]).expect("stream");
        bands.rollback(&snapshot);
        assert_eq!(band_values(&bands, 0), &[1]);
        assert_eq!(band_values(&bands, 1), &[2]);
    }
}
