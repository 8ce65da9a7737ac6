// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Air Quality Index (AQI) mapping
//!
//! Maps a gas concentration, in parts per million, onto the 0-500 AQI scale
//! using a [`BreakpointTable`] of piecewise-linear [`Segment`]s.
//!
//! [`BreakpointTable::CO2`] is the table used by the air quality station.  A
//! custom table can be built with [`BreakpointTable::new`], which validates
//! it once, up front, so that [`BreakpointTable::map`] never has to.
//!
//! # Example
//! ```rust
//! use airsense_core::aqi::{map_to_aqi, AqiCategory};
//!
//! let aqi = map_to_aqi(200.0);
//! assert_eq!(aqi, 25.0);
//! assert_eq!(AqiCategory::from_aqi(aqi), AqiCategory::Good);
//! ```

use core::fmt;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

/// Lowest AQI value.  Returned for any non-positive concentration.
pub const AQI_MIN: f32 = 0.0;

/// Highest AQI value.  Returned for any concentration above the table.
pub const AQI_MAX: f32 = 500.0;

/// Largest permitted distance, in ppm, between the top of one segment and the
/// bottom of the next.  Tables are written with integer bounds (400, 401), so
/// adjacent segments are 1ppm apart.
pub const MAX_SEGMENT_GAP: f32 = 1.0;

// CO2 breakpoints.  Each row maps a ppm range onto an AQI range.
const CO2_SEGMENTS: [Segment; 6] = [
    Segment::new(0.0, 400.0, 0.0, 50.0),
    Segment::new(401.0, 1000.0, 51.0, 100.0),
    Segment::new(1001.0, 1500.0, 101.0, 150.0),
    Segment::new(1501.0, 2000.0, 151.0, 200.0),
    Segment::new(2001.0, 5000.0, 201.0, 300.0),
    Segment::new(5001.0, 10000.0, 301.0, 500.0),
];

// Each CO2 segment is one AQI category
const_assert_eq!(CO2_SEGMENTS.len(), AqiCategory::COUNT);

/// One row of a breakpoint table - a ppm interval and the AQI interval it
/// maps onto.  Both intervals are inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Lowest concentration covered by this segment
    pub ppm_low: f32,

    /// Highest concentration covered by this segment
    pub ppm_high: f32,

    /// AQI value at `ppm_low`
    pub aqi_low: f32,

    /// AQI value at `ppm_high`
    pub aqi_high: f32,
}

impl Segment {
    pub const fn new(ppm_low: f32, ppm_high: f32, aqi_low: f32, aqi_high: f32) -> Self {
        Self {
            ppm_low,
            ppm_high,
            aqi_low,
            aqi_high,
        }
    }

    /// Whether `ppm` lies within this segment's concentration interval.
    pub fn contains(&self, ppm: f32) -> bool {
        ppm >= self.ppm_low && ppm <= self.ppm_high
    }

    /// Linearly interpolates `ppm` onto this segment's AQI interval.  The
    /// caller is expected to have checked [`Self::contains`].
    pub fn interpolate(&self, ppm: f32) -> f32 {
        let aqi = (self.aqi_high - self.aqi_low) / (self.ppm_high - self.ppm_low)
            * (ppm - self.ppm_low)
            + self.aqi_low;

        // Rounding can land a fraction outside the interval at its ends
        aqi.max(self.aqi_low).min(self.aqi_high)
    }
}

/// Reasons a set of segments was rejected by [`BreakpointTable::new`].  The
/// `usize` is the index of the offending segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// No segments were supplied
    Empty,

    /// A segment's ppm interval is empty or inverted, its AQI interval is
    /// inverted, or a bound is NaN
    InvalidSegment(usize),

    /// An AQI bound lies outside [`AQI_MIN`]..=[`AQI_MAX`]
    OutOfRange(usize),

    /// A segment starts at or below the end of the previous segment
    Overlap(usize),

    /// A segment starts more than [`MAX_SEGMENT_GAP`] above the end of the
    /// previous segment
    Gap(usize),

    /// A segment's AQI interval starts below the end of the previous
    /// segment's
    Decreasing(usize),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::Empty => write!(f, "breakpoint table is empty"),
            TableError::InvalidSegment(ii) => write!(f, "segment {ii} is invalid"),
            TableError::OutOfRange(ii) => write!(f, "segment {ii} AQI is out of range"),
            TableError::Overlap(ii) => write!(f, "segment {ii} overlaps the previous segment"),
            TableError::Gap(ii) => write!(f, "segment {ii} leaves a gap after the previous segment"),
            TableError::Decreasing(ii) => {
                write!(f, "segment {ii} AQI is lower than the previous segment")
            }
        }
    }
}

/// An ordered, validated, list of [`Segment`]s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakpointTable<'a> {
    segments: &'a [Segment],
}

impl BreakpointTable<'static> {
    /// The CO2 table used by the air quality station.
    ///
    /// | ppm        | AQI     |
    /// |------------|---------|
    /// | 0-400      | 0-50    |
    /// | 401-1000   | 51-100  |
    /// | 1001-1500  | 101-150 |
    /// | 1501-2000  | 151-200 |
    /// | 2001-5000  | 201-300 |
    /// | 5001-10000 | 301-500 |
    pub const CO2: Self = Self {
        segments: &CO2_SEGMENTS,
    };
}

impl Default for BreakpointTable<'static> {
    fn default() -> Self {
        Self::CO2
    }
}

impl<'a> BreakpointTable<'a> {
    /// Builds a table from `segments`, which must be in ascending ppm order,
    /// non-overlapping, contiguous (see [`MAX_SEGMENT_GAP`]) and have
    /// non-decreasing AQI values within [`AQI_MIN`]..=[`AQI_MAX`].
    ///
    /// Returns:
    /// - `Ok(BreakpointTable)` if the segments are valid
    /// - `Err(TableError)` identifying the first invalid segment
    pub fn new(segments: &'a [Segment]) -> Result<Self, TableError> {
        if segments.is_empty() {
            return Err(TableError::Empty);
        }

        for (ii, segment) in segments.iter().enumerate() {
            // Negated comparisons so NaN bounds are rejected too
            if !(segment.ppm_low < segment.ppm_high) || !(segment.aqi_low <= segment.aqi_high) {
                return Err(TableError::InvalidSegment(ii));
            }
            if segment.aqi_low < AQI_MIN || segment.aqi_high > AQI_MAX {
                return Err(TableError::OutOfRange(ii));
            }

            if ii > 0 {
                let prev = &segments[ii - 1];
                if segment.ppm_low <= prev.ppm_high {
                    return Err(TableError::Overlap(ii));
                }
                if segment.ppm_low - prev.ppm_high > MAX_SEGMENT_GAP {
                    return Err(TableError::Gap(ii));
                }
                if segment.aqi_low < prev.aqi_high {
                    return Err(TableError::Decreasing(ii));
                }
            }
        }

        Ok(Self { segments })
    }

    /// The table's segments, in ascending ppm order.
    pub fn segments(&self) -> &'a [Segment] {
        self.segments
    }

    /// Maps a concentration onto the AQI scale.
    ///
    /// - Non-positive concentrations map to [`AQI_MIN`].
    /// - Concentrations within a segment are interpolated by the first
    ///   segment containing them.
    /// - Concentrations above the last segment, and NaN, map to [`AQI_MAX`].
    /// - Concentrations in the sub-ppm gap between two segments map to the
    ///   top of the lower segment.
    ///
    /// The result is always within [`AQI_MIN`]..=[`AQI_MAX`].
    pub fn map(&self, ppm: f32) -> f32 {
        if ppm <= 0.0 {
            return AQI_MIN;
        }

        // NaN is in no segment, so saturates along with out of range values
        if ppm.is_nan()
            || self
                .segments
                .last()
                .is_some_and(|last| ppm > last.ppm_high)
        {
            return AQI_MAX;
        }

        // Either within a segment, in the gap after one, or below the first
        let mut below = AQI_MIN;
        for segment in self.segments {
            if segment.contains(ppm) {
                return segment.interpolate(ppm);
            }
            if ppm < segment.ppm_low {
                break;
            }
            below = segment.aqi_high;
        }
        below
    }
}

/// Maps a concentration onto the AQI scale using [`BreakpointTable::CO2`].
pub fn map_to_aqi(ppm: f32) -> f32 {
    BreakpointTable::CO2.map(ppm)
}

/// The band an AQI value falls in.  Used for logging - the wire record
/// carries the raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Number of categories.
    pub const COUNT: usize = 6;

    /// Returns the category for `aqi`.  Values between two bands, such as
    /// 50.5, belong to the lower band.
    pub fn from_aqi(aqi: f32) -> Self {
        if aqi < 51.0 {
            Self::Good
        } else if aqi < 101.0 {
            Self::Moderate
        } else if aqi < 151.0 {
            Self::UnhealthySensitive
        } else if aqi < 201.0 {
            Self::Unhealthy
        } else if aqi < 301.0 {
            Self::VeryUnhealthy
        } else {
            Self::Hazardous
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiCategory::Good => write!(f, "good"),
            AqiCategory::Moderate => write!(f, "moderate"),
            AqiCategory::UnhealthySensitive => write!(f, "unhealthy for sensitive groups"),
            AqiCategory::Unhealthy => write!(f, "unhealthy"),
            AqiCategory::VeryUnhealthy => write!(f, "very unhealthy"),
            AqiCategory::Hazardous => write!(f, "hazardous"),
        }
    }
}
