//! Discriminated encoding for compound records.
//!
//! Every participant, item, and stats record is written with a `data_type`
//! field naming its kind, and decoded by dispatching on that field. An
//! unrecognized discriminator, or a record of the wrong kind in a given
//! position, is a decode error.
//!
//! Containers opt in with `#[serde(with = "record::one" | "record::seq" |
//! "record::map")]`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::item::Item;
use crate::participant::Participant;
use crate::stats::Stats;

/// Name of the discriminator field.
pub const DISCRIMINATOR: &str = "data_type";

/// The fixed set of record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A [`Participant`].
    Participant,
    /// An [`Item`].
    Item,
    /// The [`Stats`] counters.
    Stats,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Participant => write!(f, "participant"),
            RecordKind::Item => write!(f, "item"),
            RecordKind::Stats => write!(f, "stats"),
        }
    }
}

/// Borrowed record, used when encoding.
#[derive(Debug, Serialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum RecordRef<'a> {
    /// Borrowed participant.
    Participant(&'a Participant),
    /// Borrowed item.
    Item(&'a Item),
    /// Borrowed counters.
    Stats(&'a Stats),
}

/// Owned record, produced when decoding.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "data_type", rename_all = "snake_case")]
pub enum Record {
    /// Decoded participant.
    Participant(Participant),
    /// Decoded item.
    Item(Item),
    /// Decoded counters.
    Stats(Stats),
}

impl Record {
    /// The kind named by this record's discriminator.
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Participant(_) => RecordKind::Participant,
            Record::Item(_) => RecordKind::Item,
            Record::Stats(_) => RecordKind::Stats,
        }
    }
}

/// A record type with a fixed discriminator.
pub trait Tagged: Sized {
    /// This type's discriminator.
    const KIND: RecordKind;

    /// Borrow as an encodable record.
    fn as_record(&self) -> RecordRef<'_>;

    /// Take the value out of a decoded record of the matching kind.
    fn from_record(record: Record) -> Option<Self>;
}

impl Tagged for Participant {
    const KIND: RecordKind = RecordKind::Participant;

    fn as_record(&self) -> RecordRef<'_> {
        RecordRef::Participant(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Participant(p) => Some(p),
            _ => None,
        }
    }
}

impl Tagged for Item {
    const KIND: RecordKind = RecordKind::Item;

    fn as_record(&self) -> RecordRef<'_> {
        RecordRef::Item(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Item(i) => Some(i),
            _ => None,
        }
    }
}

impl Tagged for Stats {
    const KIND: RecordKind = RecordKind::Stats;

    fn as_record(&self) -> RecordRef<'_> {
        RecordRef::Stats(self)
    }

    fn from_record(record: Record) -> Option<Self> {
        match record {
            Record::Stats(s) => Some(s),
            _ => None,
        }
    }
}

fn expect_kind<T: Tagged, E: serde::de::Error>(record: Record) -> Result<T, E> {
    let found = record.kind();
    T::from_record(record)
        .ok_or_else(|| E::custom(format!("expected {} record, found {found}", T::KIND)))
}

/// A single tagged record.
pub mod one {
    use super::*;

    /// Encode one record.
    pub fn serialize<T: Tagged, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_record().serialize(serializer)
    }

    /// Decode one record of kind `T`.
    pub fn deserialize<'de, T: Tagged, D: Deserializer<'de>>(deserializer: D) -> Result<T, D::Error> {
        expect_kind(Record::deserialize(deserializer)?)
    }
}

/// An ordered list of tagged records.
pub mod seq {
    use super::*;

    /// Encode a list of records.
    pub fn serialize<T: Tagged, S: Serializer>(values: &[T], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(Tagged::as_record))
    }

    /// Decode a list; every entry must be of kind `T`.
    pub fn deserialize<'de, T: Tagged, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<T>, D::Error> {
        Vec::<Record>::deserialize(deserializer)?
            .into_iter()
            .map(expect_kind)
            .collect()
    }
}

/// A keyed map of tagged records.
pub mod map {
    use std::collections::BTreeMap;

    use super::*;

    /// Encode a map of records.
    pub fn serialize<K, T, S>(values: &BTreeMap<K, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        T: Tagged,
        S: Serializer,
    {
        serializer.collect_map(values.iter().map(|(k, v)| (k, v.as_record())))
    }

    /// Decode a map; every value must be of kind `T`.
    pub fn deserialize<'de, K, T, D>(deserializer: D) -> Result<BTreeMap<K, T>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        T: Tagged,
        D: Deserializer<'de>,
    {
        BTreeMap::<K, Record>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, record)| expect_kind(record).map(|v| (k, v)))
            .collect()
    }
}
