//! Typed shelter records produced by reassembly.
//!
//! A [`ShelterRecord`] is one logical directory entry. Its `coordinates` stay
//! `None` until a geocoder resolves the address, and may stay `None` forever.

use std::{borrow::Borrow, fmt};

/// A latitude/longitude pair in decimal degrees.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the valid degree ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Identifier derived from a record's name and assembled address.
///
/// Two records with the same name and address share an id. Lookups must
/// tolerate that.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShelterId(String);

impl ShelterId {
    #[must_use]
    pub fn from_parts(name: &str, address: &str) -> Self {
        Self(format!("{name}-{address}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ShelterId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShelterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parsed bed count.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedCount {
    Known(u32),
    /// Empty cell, a placeholder such as `-`, or text with no leading number.
    Unknown,
}

/// Bed capacity as listed, together with its parsed count.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedCapacity {
    raw: String,
    count: BedCount,
}

impl BedCapacity {
    /// Parses the leading run of ASCII digits; anything else is [`BedCount::Unknown`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let digits_end = raw
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(raw.len());
        let count = raw[..digits_end]
            .parse()
            .map_or(BedCount::Unknown, BedCount::Known);
        Self {
            raw: raw.to_string(),
            count,
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn count(&self) -> BedCount {
        self.count
    }

    /// Bed count used for ranking. Unknown capacity ranks as zero.
    #[must_use]
    pub fn beds(&self) -> u32 {
        match self.count {
            BedCount::Known(beds) => beds,
            BedCount::Unknown => 0,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.count == BedCount::Unknown
    }
}

impl Default for BedCapacity {
    fn default() -> Self {
        Self::parse("")
    }
}

/// Coarse classification of the free-text category tag.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShelterKind {
    TwentyFourHour,
    Youth,
    Seasonal,
    Lineup,
    Other,
}

impl ShelterKind {
    #[must_use]
    pub fn from_category(category: &str) -> Self {
        if category.contains("24 Hour") {
            Self::TwentyFourHour
        } else if category.contains("Youth") {
            Self::Youth
        } else if category.contains("Seasonal") {
            Self::Seasonal
        } else if category.contains("Lineup") {
            Self::Lineup
        } else {
            Self::Other
        }
    }
}

/// One logical directory entry, reassembled from a header row and its
/// continuation rows.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ShelterRecord {
    pub id: ShelterId,
    pub name: String,
    pub city: String,
    pub demographic_scope: String,
    pub age_range: String,
    pub bed_capacity: BedCapacity,
    pub category: String,
    /// Address continuation lines joined with `", "` in source order.
    pub address: String,
    /// Last phone-like continuation line of the block.
    pub phone: Option<String>,
    pub note: String,
    pub intake_info: String,
    pub services: String,
    pub coordinates: Option<Coordinates>,
}

impl ShelterRecord {
    /// Free text handed to a geocoder: `"{address}, {city}"`.
    #[must_use]
    pub fn geocode_query(&self) -> String {
        format!("{}, {}", self.address, self.city)
    }

    #[must_use]
    pub fn kind(&self) -> ShelterKind {
        ShelterKind::from_category(&self.category)
    }

    #[must_use]
    pub fn has_services(&self) -> bool {
        !self.services.is_empty() && !self.services.eq_ignore_ascii_case("none")
    }

    #[must_use]
    pub fn is_geocoded(&self) -> bool {
        self.coordinates.is_some()
    }
}

impl fmt::Display for ShelterRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.city)?;
        if !self.address.is_empty() {
            write!(f, " - {}", self.address)?;
        }
        if let Some(coordinates) = &self.coordinates {
            write!(f, " {coordinates}")?;
        }
        Ok(())
    }
}
