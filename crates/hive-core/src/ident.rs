//! Application identifier parsing and version weights.
//!
//! Package identifiers have the shape `<name>[_<version>][_<build>]`, for
//! example `order-service_1.4.2_17`. The parser is a small state machine over
//! the number of `_`-separated segments and the class of the trailing
//! segments. It never fails: identifiers it cannot place fall back to the
//! raw id as the name, version `0.0.0` and build 0. Callers that want a hard
//! failure instead use [`AppIdentifier::parse_strict`].
//!
//! # Shapes
//!
//! | Segments | Trailing segments            | Result                                  |
//! |----------|------------------------------|-----------------------------------------|
//! | 1        | —                            | bare name                               |
//! | 2        | `x.y.z`                      | name + version                          |
//! | 2        | anything else                | fallback                                |
//! | ≥3       | `x.y.z`                      | name (rest joined by `_`) + version     |
//! | ≥3       | `x.y.z`, digits              | name + version + build                  |
//! | ≥3       | non-version, digits          | name (incl. the non-version) + build    |
//! | ≥3       | neither digits nor `x.y.z`   | fallback                                |

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Version assigned when an identifier carries none.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Radix of the weight encoding. Version components and build numbers must
/// stay below it for weights to order correctly.
pub const WEIGHT_RADIX: u64 = 1000;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("version pattern"));

static BUILD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("build pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("cannot determine version of app identifier `{0}`")]
    Ambiguous(String),
    #[error("app identifier `{raw}` has component {value} >= {WEIGHT_RADIX}, weight would collide")]
    WeightOverflow { raw: String, value: u64 },
}

/// Which branch of the parser produced the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// Single segment, the whole id is the name.
    Bare,
    /// `<name>_<version>`
    Versioned,
    /// `<name>_<version>_<build>`
    VersionedBuild,
    /// `<name>_<build>` where the segment before the build is not a version.
    BuildOnly,
    /// Nothing recognisable, the whole id is the name.
    Fallback,
}

/// A parsed application package identifier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentifier {
    raw_id: String,
    name: String,
    version: String,
    build_number: u64,
    weight: f64,
}

impl AppIdentifier {
    /// Parse an identifier, falling back to defaults for anything ambiguous.
    pub fn parse(raw: &str) -> Self {
        let (_, ident) = classify(raw);
        ident
    }

    /// Parse an identifier, rejecting fallbacks and weight collisions.
    pub fn parse_strict(raw: &str) -> Result<Self, IdentError> {
        let (shape, ident) = classify(raw);
        if matches!(shape, Shape::BuildOnly | Shape::Fallback) {
            return Err(IdentError::Ambiguous(raw.to_string()));
        }

        let components = ident
            .version
            .split('.')
            .filter_map(|part| part.parse::<u64>().ok())
            .chain(std::iter::once(ident.build_number));
        for value in components {
            if value >= WEIGHT_RADIX {
                return Err(IdentError::WeightOverflow {
                    raw: raw.to_string(),
                    value,
                });
            }
        }

        Ok(ident)
    }

    pub fn raw_id(&self) -> &str {
        &self.raw_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    /// Sort key combining version and build number.
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl PartialEq for AppIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.raw_id == other.raw_id
    }
}

impl Eq for AppIdentifier {}

impl PartialOrd for AppIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AppIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then_with(|| self.raw_id.cmp(&other.raw_id))
    }
}

impl fmt::Display for AppIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_id)
    }
}

/// Encode a version and build number into a single sortable number.
///
/// Version parts are packed in radix 1000 (patch, minor, major) and the
/// build number is added as a fraction. Parts that are not numbers count
/// as zero. Correct ordering requires every part and the build number to
/// be below [`WEIGHT_RADIX`]; larger values are not masked and can collide.
pub fn weight(version: &str, build_number: u64) -> f64 {
    let radix = WEIGHT_RADIX as f64;
    let version_weight: f64 = version
        .split('.')
        .rev()
        .enumerate()
        .map(|(i, part)| component(part) * radix.powi(i as i32))
        .sum();
    version_weight + build_number as f64 / radix
}

/// Whether `segment` is an `x.y.z` version.
pub fn is_version(segment: &str) -> bool {
    VERSION_RE.is_match(segment)
}

fn component(part: &str) -> f64 {
    match part.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// All-digit segments are build numbers; values past `u64::MAX` saturate.
fn build_number(segment: &str) -> Option<u64> {
    if BUILD_RE.is_match(segment) {
        Some(segment.parse().unwrap_or(u64::MAX))
    } else {
        None
    }
}

fn classify(raw: &str) -> (Shape, AppIdentifier) {
    let mut segments: Vec<&str> = raw.split('_').collect();

    let (shape, name, version, build) = match segments.len() {
        1 => (Shape::Bare, raw.to_string(), DEFAULT_VERSION, 0),
        2 if is_version(segments[1]) => (Shape::Versioned, segments[0].to_string(), segments[1], 0),
        2 => (Shape::Fallback, raw.to_string(), DEFAULT_VERSION, 0),
        _ => {
            // At least three segments, so two remain after popping the tail.
            let last = segments.pop().unwrap_or_default();
            match build_number(last) {
                None if is_version(last) => (Shape::Versioned, segments.join("_"), last, 0),
                None => (Shape::Fallback, raw.to_string(), DEFAULT_VERSION, 0),
                Some(build) => {
                    let candidate = segments.last().copied().unwrap_or_default();
                    if is_version(candidate) {
                        segments.pop();
                        (Shape::VersionedBuild, segments.join("_"), candidate, build)
                    } else {
                        (Shape::BuildOnly, segments.join("_"), DEFAULT_VERSION, build)
                    }
                }
            }
        }
    };

    let ident = AppIdentifier {
        raw_id: raw.to_string(),
        name,
        version: version.to_string(),
        build_number: build,
        weight: weight(version, build),
    };
    (shape, ident)
}
