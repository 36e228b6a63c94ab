//! Vocabulary entry and statistic types backing the persisted tokenizer config.
//!
//! Each clinical code owns one or more [`TokenEntry`] values: a plain code
//! token, a set of numeric range bins (partitioned by unit), or a set of
//! categorical bins. Entries carry optional [`TokenStat`] records used by
//! vocabulary-curation tooling; stats never influence tokenization decisions.

use serde::{Deserialize, Serialize};

/// Auxiliary statistic attached to a vocabulary entry.
///
/// The serialized form carries an explicit `type` discriminator
/// (`count_occurrences`, `count_patients`, `ppl`); an unrecognised
/// discriminator is a fatal load error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenStat {
    /// Raw occurrence count of the token in a named data split/dataset.
    CountOccurrences {
        /// Split name, e.g. `"train"`.
        #[serde(default)]
        split: Option<String>,
        /// Dataset name the count was computed over.
        #[serde(default)]
        dataset: Option<String>,
        /// Number of occurrences.
        #[serde(default)]
        count: Option<u64>,
    },
    /// Distinct-patient occurrence count in a named data split/dataset.
    CountPatients {
        /// Split name, e.g. `"train"`.
        #[serde(default)]
        split: Option<String>,
        /// Dataset name the count was computed over.
        #[serde(default)]
        dataset: Option<String>,
        /// Number of distinct patients with at least one occurrence.
        #[serde(default)]
        count: Option<u64>,
    },
    /// Average model perplexity for the token under a named checkpoint.
    Ppl {
        /// Split name, e.g. `"val"`.
        #[serde(default)]
        split: Option<String>,
        /// Dataset name the perplexity was computed over.
        #[serde(default)]
        dataset: Option<String>,
        /// Model checkpoint identifier.
        #[serde(default)]
        model: Option<String>,
        /// Average perplexity.
        #[serde(default)]
        ppl: Option<f64>,
    },
}

/// Discriminator for [`TokenStat`] variants, used by [`TokenEntry::get_stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Matches [`TokenStat::CountOccurrences`].
    CountOccurrences,
    /// Matches [`TokenStat::CountPatients`].
    CountPatients,
    /// Matches [`TokenStat::Ppl`].
    Ppl,
}

/// Field filter applied by [`TokenEntry::get_stat`]; unset fields match anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatQuery<'a> {
    /// Required split name, if any.
    pub split: Option<&'a str>,
    /// Required dataset name, if any.
    pub dataset: Option<&'a str>,
    /// Required model checkpoint, if any (only meaningful for perplexity stats).
    pub model: Option<&'a str>,
}

impl TokenStat {
    /// Returns the variant discriminator of this stat.
    #[must_use]
    pub fn kind(&self) -> StatKind {
        match self {
            Self::CountOccurrences { .. } => StatKind::CountOccurrences,
            Self::CountPatients { .. } => StatKind::CountPatients,
            Self::Ppl { .. } => StatKind::Ppl,
        }
    }

    fn matches(&self, kind: StatKind, query: &StatQuery<'_>) -> bool {
        if self.kind() != kind {
            return false;
        }
        let (split, dataset, model) = match self {
            Self::CountOccurrences { split, dataset, .. }
            | Self::CountPatients { split, dataset, .. } => {
                (split.as_deref(), dataset.as_deref(), None)
            }
            Self::Ppl {
                split,
                dataset,
                model,
                ..
            } => (split.as_deref(), dataset.as_deref(), model.as_deref()),
        };
        let field_matches = |required: Option<&str>, actual: Option<&str>| match required {
            None => true,
            Some(want) => actual == Some(want),
        };
        field_matches(query.split, split)
            && field_matches(query.dataset, dataset)
            && field_matches(query.model, model)
    }
}

/// Numeric bin bounds for one unit of a lab value's distribution.
///
/// Bounds may be the ±infinity sentinels emitted by the vocabulary builder for
/// the open-ended first and last bins; those serialize as the strings
/// `"-inf"` / `"inf"` since JSON has no infinity literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    /// Measurement unit this bin applies to; `None` matches unit-less events.
    #[serde(default)]
    pub unit: Option<String>,
    /// Inclusive lower bound of the bin.
    #[serde(with = "bound")]
    pub range_start: f64,
    /// Exclusive upper bound of the bin.
    #[serde(with = "bound")]
    pub range_end: f64,
}

/// Category value-set for one categorical bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySet {
    /// Ordered category values belonging to this bin.
    pub categories: Vec<String>,
}

/// One vocabulary entry mapping a clinical code (plus optional value
/// partition) to a textual token.
///
/// The serialized form carries a `type` discriminator (`code`,
/// `numerical_range`, `categorical`) and, for the structured variants, a
/// nested `tokenization` object. Unknown discriminators fail the load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenEntry {
    /// The code itself is the token.
    Code {
        /// Raw clinical code, e.g. `"SNOMED/3950001"`.
        code: String,
        /// Human-readable description of the code.
        #[serde(default)]
        description: Option<String>,
        /// Curation statistics for this token.
        #[serde(default)]
        stats: Vec<TokenStat>,
    },
    /// One bin of a numeric lab value's distribution for a given unit.
    NumericalRange {
        /// Raw clinical code, e.g. `"LOINC/2236-8"`.
        code: String,
        /// Human-readable description of the code.
        #[serde(default)]
        description: Option<String>,
        /// Bin bounds and unit.
        tokenization: NumericRange,
        /// Curation statistics for this token.
        #[serde(default)]
        stats: Vec<TokenStat>,
    },
    /// One categorical value-set bin.
    Categorical {
        /// Raw clinical code.
        code: String,
        /// Human-readable description of the code.
        #[serde(default)]
        description: Option<String>,
        /// Categories belonging to this bin.
        tokenization: CategorySet,
        /// Curation statistics for this token.
        #[serde(default)]
        stats: Vec<TokenStat>,
    },
}

impl TokenEntry {
    /// Returns the raw clinical code this entry belongs to.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Code { code, .. }
            | Self::NumericalRange { code, .. }
            | Self::Categorical { code, .. } => code,
        }
    }

    /// Returns the optional human-readable description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Code { description, .. }
            | Self::NumericalRange { description, .. }
            | Self::Categorical { description, .. } => description.as_deref(),
        }
    }

    /// Returns the curation statistics attached to this entry.
    #[must_use]
    pub fn stats(&self) -> &[TokenStat] {
        match self {
            Self::Code { stats, .. }
            | Self::NumericalRange { stats, .. }
            | Self::Categorical { stats, .. } => stats,
        }
    }

    /// Returns the first stat matching `kind` whose fields satisfy every
    /// populated field of `query`, or `None` when nothing matches.
    #[must_use]
    pub fn get_stat(&self, kind: StatKind, query: &StatQuery<'_>) -> Option<&TokenStat> {
        self.stats().iter().find(|stat| stat.matches(kind, query))
    }

    /// Renders the textual token this entry maps to.
    ///
    /// Formats match the vocabulary-build convention:
    /// `"{code}"` for plain codes,
    /// `"{code} || {unit} || {start} - {end}"` for numeric bins (absent unit
    /// renders as `None`), and `"{code} || {cat1,cat2}"` for categorical bins.
    #[must_use]
    pub fn to_token(&self) -> String {
        match self {
            Self::Code { code, .. } => code.clone(),
            Self::NumericalRange {
                code, tokenization, ..
            } => {
                let unit = tokenization.unit.as_deref().unwrap_or("None");
                format!(
                    "{} || {} || {} - {}",
                    code, unit, tokenization.range_start, tokenization.range_end
                )
            }
            Self::Categorical {
                code, tokenization, ..
            } => format!("{} || {}", code, tokenization.categories.join(",")),
        }
    }
}

/// Serde helpers mapping ±infinity bounds to the `"-inf"` / `"inf"` sentinel
/// strings in JSON.
mod bound {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        struct BoundVisitor;

        impl Visitor<'_> for BoundVisitor {
            type Value = f64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or an infinity sentinel string")
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
                Ok(value)
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
                Ok(value as f64)
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
                Ok(value as f64)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
                match value {
                    "inf" | "+inf" | "Infinity" => Ok(f64::INFINITY),
                    "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                    other => Err(E::custom(format!("invalid range bound: {other:?}"))),
                }
            }
        }

        deserializer.deserialize_any(BoundVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glucose_bin() -> TokenEntry {
        TokenEntry::NumericalRange {
            code: "LOINC/2345-7".into(),
            description: Some("Glucose".into()),
            tokenization: NumericRange {
                unit: Some("mg/dL".into()),
                range_start: 0.0,
                range_end: 100.0,
            },
            stats: vec![
                TokenStat::CountOccurrences {
                    split: Some("train".into()),
                    dataset: Some("v8".into()),
                    count: Some(412),
                },
                TokenStat::Ppl {
                    split: Some("val".into()),
                    dataset: Some("v8".into()),
                    model: Some("gpt-base-512".into()),
                    ppl: Some(3.2),
                },
            ],
        }
    }

    #[test]
    fn plain_code_token_is_the_code() {
        let entry = TokenEntry::Code {
            code: "SNOMED/3950001".into(),
            description: None,
            stats: Vec::new(),
        };
        assert_eq!(entry.to_token(), "SNOMED/3950001");
    }

    #[test]
    fn numeric_token_renders_unit_and_bounds() {
        assert_eq!(glucose_bin().to_token(), "LOINC/2345-7 || mg/dL || 0 - 100");
    }

    #[test]
    fn numeric_token_renders_missing_unit_as_none() {
        let entry = TokenEntry::NumericalRange {
            code: "LOINC/2345-7".into(),
            description: None,
            tokenization: NumericRange {
                unit: None,
                range_start: f64::NEG_INFINITY,
                range_end: 10.0,
            },
            stats: Vec::new(),
        };
        assert_eq!(entry.to_token(), "LOINC/2345-7 || None || -inf - 10");
    }

    #[test]
    fn categorical_token_joins_categories_with_commas() {
        let entry = TokenEntry::Categorical {
            code: "LOINC/10834-0".into(),
            description: None,
            tokenization: CategorySet {
                categories: vec!["A".into(), "B".into()],
            },
            stats: Vec::new(),
        };
        assert_eq!(entry.to_token(), "LOINC/10834-0 || A,B");
    }

    #[test]
    fn get_stat_filters_by_kind_and_fields() {
        let entry = glucose_bin();
        let query = StatQuery {
            split: Some("train"),
            ..StatQuery::default()
        };
        let stat = entry
            .get_stat(StatKind::CountOccurrences, &query)
            .expect("train occurrence count present");
        assert!(matches!(
            stat,
            TokenStat::CountOccurrences {
                count: Some(412),
                ..
            }
        ));

        let mismatch = StatQuery {
            split: Some("test"),
            ..StatQuery::default()
        };
        assert!(entry
            .get_stat(StatKind::CountOccurrences, &mismatch)
            .is_none());
    }

    #[test]
    fn get_stat_matches_model_field_on_ppl() {
        let entry = glucose_bin();
        let query = StatQuery {
            model: Some("gpt-base-512"),
            ..StatQuery::default()
        };
        assert!(entry.get_stat(StatKind::Ppl, &query).is_some());
        let other_model = StatQuery {
            model: Some("mamba-tiny-1024"),
            ..StatQuery::default()
        };
        assert!(entry.get_stat(StatKind::Ppl, &other_model).is_none());
    }

    #[test]
    fn infinity_bounds_round_trip_as_sentinel_strings() {
        let range = NumericRange {
            unit: None,
            range_start: f64::NEG_INFINITY,
            range_end: f64::INFINITY,
        };
        let json = serde_json::to_string(&range).expect("serialize range");
        assert!(json.contains("\"-inf\""));
        assert!(json.contains("\"inf\""));
        let back: NumericRange = serde_json::from_str(&json).expect("deserialize range");
        assert_eq!(back, range);
    }

    #[test]
    fn unknown_stat_type_is_rejected() {
        let err = serde_json::from_str::<TokenStat>(r#"{"type": "entropy"}"#)
            .expect_err("unknown discriminator must fail");
        assert!(err.to_string().contains("entropy"));
    }

    #[test]
    fn unknown_entry_type_is_rejected() {
        let raw = r#"{"code": "X", "type": "embedding", "tokenization": {}}"#;
        assert!(serde_json::from_str::<TokenEntry>(raw).is_err());
    }
}
