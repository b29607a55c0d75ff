//! Serde helpers for `f64` values that may be non-finite.
//!
//! JSON has no spelling for NaN or infinity and `serde_json` writes them
//! as `null`, which would collapse NaN, `inf` and `-inf` into one value.
//! Finite values stay plain numbers; non-finite ones are written as the
//! strings `"NaN"`, `"inf"` and `"-inf"`. A `null` reads back as NaN.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(f64),
    Text(String),
    Null(()),
}

impl Repr {
    fn into_f64<E: de::Error>(self) -> Result<f64, E> {
        match self {
            Repr::Number(v) => Ok(v),
            Repr::Null(()) => Ok(f64::NAN),
            Repr::Text(s) => match s.as_str() {
                "NaN" | "nan" => Ok(f64::NAN),
                "inf" | "Infinity" => Ok(f64::INFINITY),
                "-inf" | "-Infinity" => Ok(f64::NEG_INFINITY),
                other => other
                    .parse::<f64>()
                    .map_err(|_| E::custom(format!("invalid float literal '{other}'"))),
            },
        }
    }
}

/// Text form of a non-finite value, `None` for finite ones.
pub(crate) fn non_finite_label(v: f64) -> Option<&'static str> {
    if v.is_nan() {
        Some("NaN")
    } else if v == f64::INFINITY {
        Some("inf")
    } else if v == f64::NEG_INFINITY {
        Some("-inf")
    } else {
        None
    }
}

pub fn serialize<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    match non_finite_label(*v) {
        Some(label) => serializer.serialize_str(label),
        None => serializer.serialize_f64(*v),
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Repr::deserialize(deserializer)?.into_f64()
}

/// Wrapper used when a single float sits inside another container.
struct Wrapped<'a>(&'a f64);

impl Serialize for Wrapped<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize(self.0, serializer)
    }
}

/// Same encoding for `BTreeMap<String, f64>` (per-metric weight maps).
pub mod map {
    use super::*;

    pub fn serialize<S: Serializer>(
        m: &BTreeMap<String, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(m.len()))?;
        for (k, v) in m {
            out.serialize_entry(k, &Wrapped(v))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        let raw = BTreeMap::<String, Repr>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| v.into_f64().map(|f| (k, f)))
            .collect()
    }
}
