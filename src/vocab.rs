//! Two-level vocabulary index and the event-to-token decision logic.
//!
//! Built once from the entry list at load time, the index replaces the
//! per-event linear scan with `code -> partition` lookups: numeric partitions
//! keep their ranges sorted by `range_start` for binary search, categorical
//! partitions map each category value to its bin. The index is read-only
//! after construction and safe for concurrent reads from data-loader workers.

use rustc_hash::FxHashMap;

use crate::error::{EhrTokError, Result};
use crate::event::Event;
use crate::tokens::TokenEntry;

/// Outcome of matching one event against the vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum EventMatch {
    /// Exactly one entry matched; this is its textual token.
    Token(String),
    /// The code has no vocabulary entries at all. A value, never an error,
    /// so callers can map it to a designated UNK token.
    UnknownCode,
    /// The code has entries but none of its partitions matched the event's
    /// value/unit combination. The caller decides whether this is fatal.
    NoMatchingPartition,
}

/// One numeric bin within a unit partition; ranges are kept sorted by start.
#[derive(Debug, Clone)]
struct RangeSlot {
    start: f64,
    end: f64,
    token: String,
}

/// Per-code partition structure selected by the entry variants for that code.
#[derive(Debug, Clone)]
enum CodePartitions {
    /// Single plain-code entry; the token is precomputed.
    Plain(String),
    /// Numeric bins grouped by unit (`None` key matches unit-less events).
    Numeric(FxHashMap<Option<String>, Vec<RangeSlot>>),
    /// Category value to precomputed bin token.
    Categorical(FxHashMap<String, String>),
}

/// Read-only vocabulary index over a loaded entry list.
#[must_use]
#[derive(Debug, Clone)]
pub struct Vocabulary {
    codes: FxHashMap<String, CodePartitions>,
    token_strings: Vec<String>,
}

impl Vocabulary {
    /// Builds the index from an ordered entry list.
    ///
    /// Fails with [`EhrTokError::InvalidConfig`] when the entry list violates
    /// the partition invariants: more than one plain-code entry per code,
    /// mixed variant families for one code, overlapping numeric ranges within
    /// a unit, or duplicate categories within a code.
    pub fn from_entries(entries: &[TokenEntry]) -> Result<Self> {
        let mut codes: FxHashMap<String, CodePartitions> = FxHashMap::default();
        let mut token_strings = Vec::with_capacity(entries.len());

        for entry in entries {
            let token = entry.to_token();
            token_strings.push(token.clone());
            let code = entry.code();
            match entry {
                TokenEntry::Code { .. } => match codes.get(code) {
                    None => {
                        codes.insert(code.to_string(), CodePartitions::Plain(token));
                    }
                    Some(CodePartitions::Plain(_)) => {
                        return Err(EhrTokError::InvalidConfig(format!(
                            "duplicate plain-code entry for {code}"
                        )));
                    }
                    Some(_) => return Err(mixed_variants(code)),
                },
                TokenEntry::NumericalRange { tokenization, .. } => {
                    if tokenization.range_start.is_nan() || tokenization.range_end.is_nan() {
                        return Err(EhrTokError::InvalidConfig(format!(
                            "NaN range bound for {code}"
                        )));
                    }
                    let partitions = codes
                        .entry(code.to_string())
                        .or_insert_with(|| CodePartitions::Numeric(FxHashMap::default()));
                    let CodePartitions::Numeric(units) = partitions else {
                        return Err(mixed_variants(code));
                    };
                    units
                        .entry(tokenization.unit.clone())
                        .or_default()
                        .push(RangeSlot {
                            start: tokenization.range_start,
                            end: tokenization.range_end,
                            token,
                        });
                }
                TokenEntry::Categorical { tokenization, .. } => {
                    let partitions = codes
                        .entry(code.to_string())
                        .or_insert_with(|| CodePartitions::Categorical(FxHashMap::default()));
                    let CodePartitions::Categorical(by_category) = partitions else {
                        return Err(mixed_variants(code));
                    };
                    for category in &tokenization.categories {
                        if by_category
                            .insert(category.clone(), token.clone())
                            .is_some()
                        {
                            return Err(EhrTokError::InvalidConfig(format!(
                                "category {category:?} appears in multiple bins for {code}"
                            )));
                        }
                    }
                }
            }
        }

        for (code, partitions) in &mut codes {
            if let CodePartitions::Numeric(units) = partitions {
                for slots in units.values_mut() {
                    slots.sort_by(|a, b| a.start.total_cmp(&b.start));
                    for pair in slots.windows(2) {
                        if pair[1].start < pair[0].end {
                            return Err(EhrTokError::InvalidConfig(format!(
                                "overlapping numeric ranges for {code}: [{}, {}) and [{}, {})",
                                pair[0].start, pair[0].end, pair[1].start, pair[1].end
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            codes,
            token_strings,
        })
    }

    /// Returns the number of distinct codes in the vocabulary.
    #[must_use]
    pub fn num_codes(&self) -> usize {
        self.codes.len()
    }

    /// Returns whether the vocabulary has any entry for `code`.
    #[must_use]
    pub fn contains_code(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Returns every token string in original entry order, for callers that
    /// assign integer ids downstream.
    #[must_use]
    pub fn token_strings(&self) -> &[String] {
        &self.token_strings
    }

    /// Maps one event to its token string, an unknown-code marker, or a
    /// no-matching-partition marker.
    ///
    /// Numeric policy: a value equal to a bin's `range_start` belongs to that
    /// bin; values below every configured bin clamp to the lowest bin and
    /// values above every bin clamp to the highest, reproducing the
    /// vocabulary builder's open-ended sentinel bins even when the sentinels
    /// were pruned to finite bounds.
    #[must_use]
    pub fn match_event(&self, event: &Event) -> EventMatch {
        let Some(partitions) = self.codes.get(&event.code) else {
            return EventMatch::UnknownCode;
        };
        match partitions {
            CodePartitions::Plain(token) => EventMatch::Token(token.clone()),
            CodePartitions::Numeric(units) => {
                let Some(value) = event.numeric_value() else {
                    return EventMatch::NoMatchingPartition;
                };
                let Some(slots) = units.get(&event.unit) else {
                    return EventMatch::NoMatchingPartition;
                };
                match_numeric(slots, value)
            }
            CodePartitions::Categorical(by_category) => {
                let Some(value) = event.text_value() else {
                    return EventMatch::NoMatchingPartition;
                };
                match by_category.get(value) {
                    Some(token) => EventMatch::Token(token.clone()),
                    None => EventMatch::NoMatchingPartition,
                }
            }
        }
    }
}

fn mixed_variants(code: &str) -> EhrTokError {
    EhrTokError::InvalidConfig(format!(
        "code {code} mixes plain, numeric, and categorical entry variants"
    ))
}

/// Binary search over bins sorted by start; `slots` is non-empty by
/// construction.
fn match_numeric(slots: &[RangeSlot], value: f64) -> EventMatch {
    if value.is_nan() {
        return EventMatch::NoMatchingPartition;
    }
    // Index of the last bin whose start is <= value, or 0 when the value
    // falls below every bin (floor clamp).
    let idx = slots
        .partition_point(|slot| slot.start <= value)
        .saturating_sub(1);
    let slot = &slots[idx];
    if value < slot.end || idx == slots.len() - 1 {
        // In-range, or above every bin (ceiling clamp on the last bin).
        return EventMatch::Token(slot.token.clone());
    }
    // Value landed in a gap between non-contiguous bins.
    EventMatch::NoMatchingPartition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{CategorySet, NumericRange};

    fn numeric_entry(code: &str, unit: Option<&str>, start: f64, end: f64) -> TokenEntry {
        TokenEntry::NumericalRange {
            code: code.into(),
            description: None,
            tokenization: NumericRange {
                unit: unit.map(Into::into),
                range_start: start,
                range_end: end,
            },
            stats: Vec::new(),
        }
    }

    fn glucose_vocab() -> Vocabulary {
        Vocabulary::from_entries(&[
            numeric_entry("X", Some("mg/dL"), 0.0, 10.0),
            numeric_entry("X", Some("mg/dL"), 10.0, 20.0),
            numeric_entry("X", Some("mg/dL"), 20.0, f64::INFINITY),
        ])
        .expect("valid vocabulary")
    }

    #[test]
    fn plain_code_maps_to_itself() {
        let vocab = Vocabulary::from_entries(&[TokenEntry::Code {
            code: "SNOMED/3950001".into(),
            description: None,
            stats: Vec::new(),
        }])
        .expect("valid vocabulary");
        let event = Event::new("SNOMED/3950001");
        assert_eq!(
            vocab.match_event(&event),
            EventMatch::Token("SNOMED/3950001".into())
        );
    }

    #[test]
    fn boundary_value_belongs_to_the_range_it_starts() {
        let vocab = glucose_vocab();
        let event = Event::new("X").with_numeric(10.0).with_unit("mg/dL");
        assert_eq!(
            vocab.match_event(&event),
            EventMatch::Token("X || mg/dL || 10 - 20".into())
        );
    }

    #[test]
    fn below_all_ranges_clamps_to_the_lowest() {
        let vocab = glucose_vocab();
        let event = Event::new("X").with_numeric(-5.0).with_unit("mg/dL");
        assert_eq!(
            vocab.match_event(&event),
            EventMatch::Token("X || mg/dL || 0 - 10".into())
        );
    }

    #[test]
    fn above_all_ranges_clamps_to_the_highest() {
        let vocab = glucose_vocab();
        let event = Event::new("X").with_numeric(1e9).with_unit("mg/dL");
        assert_eq!(
            vocab.match_event(&event),
            EventMatch::Token("X || mg/dL || 20 - inf".into())
        );
    }

    #[test]
    fn unit_less_events_match_the_unit_less_partition() {
        let vocab = Vocabulary::from_entries(&[
            numeric_entry("Y", None, f64::NEG_INFINITY, 0.0),
            numeric_entry("Y", None, 0.0, f64::INFINITY),
        ])
        .expect("valid vocabulary");
        let event = Event::new("Y").with_numeric(-3.0);
        assert_eq!(
            vocab.match_event(&event),
            EventMatch::Token("Y || None || -inf - 0".into())
        );
    }

    #[test]
    fn unmatched_unit_reports_no_matching_partition() {
        let vocab = glucose_vocab();
        let event = Event::new("X").with_numeric(5.0).with_unit("mmol/L");
        assert_eq!(vocab.match_event(&event), EventMatch::NoMatchingPartition);
    }

    #[test]
    fn categorical_value_selects_its_bin() {
        let vocab = Vocabulary::from_entries(&[TokenEntry::Categorical {
            code: "Y".into(),
            description: None,
            tokenization: CategorySet {
                categories: vec!["A".into(), "B".into()],
            },
            stats: Vec::new(),
        }])
        .expect("valid vocabulary");
        let hit = Event::new("Y").with_text("A");
        assert_eq!(vocab.match_event(&hit), EventMatch::Token("Y || A,B".into()));
        let miss = Event::new("Y").with_text("C");
        assert_eq!(vocab.match_event(&miss), EventMatch::NoMatchingPartition);
    }

    #[test]
    fn unknown_code_is_a_value_not_an_error() {
        let vocab = glucose_vocab();
        let event = Event::new("ICD10/Z99.9");
        assert_eq!(vocab.match_event(&event), EventMatch::UnknownCode);
    }

    #[test]
    fn duplicate_plain_code_entries_are_rejected() {
        let plain = TokenEntry::Code {
            code: "Z".into(),
            description: None,
            stats: Vec::new(),
        };
        let err = Vocabulary::from_entries(&[plain.clone(), plain])
            .expect_err("duplicate plain entries must fail");
        assert!(matches!(err, EhrTokError::InvalidConfig(_)));
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let err = Vocabulary::from_entries(&[
            numeric_entry("X", None, 0.0, 10.0),
            numeric_entry("X", None, 5.0, 15.0),
        ])
        .expect_err("overlap must fail");
        assert!(matches!(err, EhrTokError::InvalidConfig(_)));
    }

    #[test]
    fn mixed_variant_families_are_rejected() {
        let err = Vocabulary::from_entries(&[
            TokenEntry::Code {
                code: "X".into(),
                description: None,
                stats: Vec::new(),
            },
            numeric_entry("X", None, 0.0, 1.0),
        ])
        .expect_err("mixed families must fail");
        assert!(matches!(err, EhrTokError::InvalidConfig(_)));
    }

    #[test]
    fn token_strings_preserve_entry_order() {
        let vocab = glucose_vocab();
        assert_eq!(
            vocab.token_strings(),
            &[
                "X || mg/dL || 0 - 10".to_string(),
                "X || mg/dL || 10 - 20".to_string(),
                "X || mg/dL || 20 - inf".to_string(),
            ]
        );
    }
}
