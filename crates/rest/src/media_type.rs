//! Media types and quality values used for content negotiation.
//!
//! A [`MediaType`] is a `type/subtype` pair weighted by a [`Quality`]. Client media types
//! come from `Accept` and `Content-Type` headers, server media types are declared by
//! converters. Parsing is delegated to the [`mime`] crate; only the essence and the `q`
//! parameter are kept, any other parameter is dropped.
//!
//! # Ordering
//!
//! [`MediaType::cmp_preference`] orders by descending quality, then concrete subtype
//! before wildcard subtype, then concrete main type before wildcard main type. Types that
//! agree on all three keys have equal rank, which is why `MediaType` does not implement
//! [`Ord`].

use crate::error::MediaTypeError;
use mime::Mime;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An HTTP quality value (`qvalue`), stored exactly as thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u16);

impl Quality {
    /// `q=1`, the default weight.
    pub const MAX: Quality = Quality(1000);

    /// `q=0`, "not acceptable".
    pub const ZERO: Quality = Quality(0);

    pub const fn from_millis(millis: u16) -> Option<Self> {
        if millis <= 1000 { Some(Self(millis)) } else { None }
    }

    #[inline]
    pub const fn millis(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The product of two qualities in millionths, exact.
    #[inline]
    pub fn weight(self, other: Quality) -> u32 {
        u32::from(self.0) * u32::from(other.0)
    }

    /// Rounds a [`weight`](Self::weight) back to thousandths, never rounding a positive
    /// weight down to zero.
    pub(crate) fn from_weight(weight: u32) -> Self {
        if weight == 0 {
            return Self::ZERO;
        }
        let millis = weight.div_ceil(1000).min(1000);
        Self(u16::try_from(millis).unwrap_or(1000))
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MAX
    }
}

impl FromStr for Quality {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        if fraction.len() > 3 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MediaTypeError::invalid_quality(s));
        }

        let whole = match whole {
            "0" => 0,
            "1" => 1000,
            _ => return Err(MediaTypeError::invalid_quality(s)),
        };
        let fraction = fraction
            .bytes()
            .chain(std::iter::repeat(b'0'))
            .take(3)
            .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'));

        Self::from_millis(whole + fraction).ok_or_else(|| MediaTypeError::invalid_quality(s))
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1000 => f.write_str("1"),
            0 => f.write_str("0"),
            millis => {
                let digits = format!("{millis:03}");
                write!(f, "0.{}", digits.trim_end_matches('0'))
            }
        }
    }
}

/// An immutable `type/subtype;q=quality` value.
#[derive(Debug, Clone)]
pub struct MediaType {
    mime: Mime,
    quality: Quality,
}

impl MediaType {
    /// Creates a media type with quality 1. Parameters of `mime` are dropped.
    pub fn new(mime: Mime) -> Self {
        let mime = if mime.params().next().is_none() {
            mime
        } else {
            let essence = mime.essence_str().parse::<Mime>();
            essence.unwrap_or(mime)
        };
        Self { mime, quality: Quality::MAX }
    }

    /// `*/*`
    pub fn any() -> Self {
        Self::new(mime::STAR_STAR)
    }

    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Parses a single media type such as `text/plain` or `application/*;q=0.5`.
    ///
    /// # Errors
    ///
    /// [`MediaTypeError::Malformed`] when the value is not a `type/subtype` pair and
    /// [`MediaTypeError::InvalidQuality`] when `q` is not a qvalue in `0..=1`.
    pub fn parse(value: &str) -> Result<Self, MediaTypeError> {
        let mime = value.trim().parse::<Mime>().map_err(|e| MediaTypeError::malformed(value, e))?;
        let quality = match mime.get_param("q") {
            Some(q) => q.as_str().parse::<Quality>()?,
            None => Quality::MAX,
        };
        Ok(Self::new(mime).with_quality(quality))
    }

    #[inline]
    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    #[inline]
    pub fn main_type(&self) -> &str {
        self.mime.type_().as_str()
    }

    #[inline]
    pub fn sub_type(&self) -> &str {
        self.mime.subtype().as_str()
    }

    /// `type/subtype` without the quality.
    #[inline]
    pub fn essence(&self) -> &str {
        self.mime.essence_str()
    }

    #[inline]
    pub fn quality(&self) -> Quality {
        self.quality
    }

    #[inline]
    pub fn is_wildcard_main(&self) -> bool {
        self.mime.type_() == mime::STAR
    }

    #[inline]
    pub fn is_wildcard_sub(&self) -> bool {
        self.mime.subtype() == mime::STAR
    }

    /// True when neither part is a wildcard, so the type can label a body.
    #[inline]
    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_main() && !self.is_wildcard_sub()
    }

    /// 3 for `a/b`, 2 for `*/b`, 1 for `a/*`, 0 for `*/*`.
    pub fn specificity(&self) -> u8 {
        u8::from(!self.is_wildcard_sub()) * 2 + u8::from(!self.is_wildcard_main())
    }

    pub fn is_compatible(&self, other: &MediaType) -> bool {
        let main = self.is_wildcard_main() || other.is_wildcard_main() || self.main_type() == other.main_type();
        let sub = self.is_wildcard_sub() || other.is_wildcard_sub() || self.sub_type() == other.sub_type();
        main && sub
    }

    /// Preference order: `Less` means `self` is preferred over `other`.
    pub fn cmp_preference(&self, other: &MediaType) -> Ordering {
        other
            .quality
            .cmp(&self.quality)
            .then_with(|| self.is_wildcard_sub().cmp(&other.is_wildcard_sub()))
            .then_with(|| self.is_wildcard_main().cmp(&other.is_wildcard_main()))
    }

    /// The concrete type both sides agree on, taking each part from whichever side names
    /// it, `self` first. `None` when incompatible or when a part stays a wildcard.
    pub(crate) fn intersect(&self, other: &MediaType) -> Option<Mime> {
        if !self.is_compatible(other) {
            return None;
        }
        if self.is_concrete() {
            return Some(self.mime.clone());
        }
        if other.is_concrete() {
            return Some(other.mime.clone());
        }

        let main = if self.is_wildcard_main() { other.main_type() } else { self.main_type() };
        let sub = if self.is_wildcard_sub() { other.sub_type() } else { self.sub_type() };
        if main == "*" || sub == "*" {
            return None;
        }
        format!("{main}/{sub}").parse().ok()
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.quality == other.quality && self.mime.essence_str() == other.mime.essence_str()
    }
}

impl Eq for MediaType {}

impl Hash for MediaType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mime.essence_str().hash(state);
        self.quality.hash(state);
    }
}

impl From<Mime> for MediaType {
    fn from(mime: Mime) -> Self {
        MediaType::new(mime)
    }
}

impl FromStr for MediaType {
    type Err = MediaTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::parse(s)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.essence())?;
        if self.quality != Quality::MAX {
            write!(f, ";q={}", self.quality)?;
        }
        Ok(())
    }
}

/// Parses an `Accept` header value into media types in client preference order.
///
/// Entries are stably sorted with [`MediaType::cmp_preference`], so entries of equal rank
/// keep the order they had in the header. Empty entries are skipped; any malformed entry
/// fails the whole header.
pub fn parse_accept(value: &str) -> Result<Vec<MediaType>, MediaTypeError> {
    let mut media_types = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(MediaType::parse)
        .collect::<Result<Vec<_>, _>>()?;
    media_types.sort_by(MediaType::cmp_preference);
    Ok(media_types)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(s: &str) -> MediaType {
        MediaType::parse(s).unwrap()
    }

    #[test]
    fn test_parse_media_type() {
        let mt = media("application/json; q=0.8");
        assert_eq!(mt.main_type(), "application");
        assert_eq!(mt.sub_type(), "json");
        assert_eq!(mt.quality().millis(), 800);

        let mt = media("text/html; charset=utf-8");
        assert_eq!(mt.essence(), "text/html");
        assert_eq!(mt.quality(), Quality::MAX);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(MediaType::parse("text"), Err(MediaTypeError::Malformed { .. })));
        assert!(matches!(MediaType::parse(""), Err(MediaTypeError::Malformed { .. })));
        assert!(matches!(MediaType::parse("text/plain;q=abc"), Err(MediaTypeError::InvalidQuality { .. })));
        assert!(matches!(MediaType::parse("text/plain;q=1.5"), Err(MediaTypeError::InvalidQuality { .. })));
        assert!(matches!(MediaType::parse("text/plain;q=0.1234"), Err(MediaTypeError::InvalidQuality { .. })));
    }

    #[test]
    fn test_quality_parse_and_display() {
        assert_eq!("1".parse::<Quality>().unwrap(), Quality::MAX);
        assert_eq!("1.000".parse::<Quality>().unwrap(), Quality::MAX);
        assert_eq!("0".parse::<Quality>().unwrap(), Quality::ZERO);
        assert_eq!("0.05".parse::<Quality>().unwrap().millis(), 50);
        assert!("1.001".parse::<Quality>().is_err());
        assert!("2".parse::<Quality>().is_err());

        assert_eq!(Quality::from_millis(800).unwrap().to_string(), "0.8");
        assert_eq!(Quality::from_millis(125).unwrap().to_string(), "0.125");
        assert_eq!(Quality::from_millis(50).unwrap().to_string(), "0.05");
        assert_eq!(Quality::MAX.to_string(), "1");
    }

    #[test]
    fn test_quality_weight() {
        let a = Quality::from_millis(800).unwrap();
        let b = Quality::from_millis(900).unwrap();
        assert_eq!(a.weight(b), 720_000);
        assert_eq!(Quality::from_weight(a.weight(b)).millis(), 720);
        assert_eq!(Quality::from_weight(1).millis(), 1);
        assert_eq!(Quality::from_weight(0), Quality::ZERO);
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["text/plain", "text/plain;q=0.8", "application/*; q=0.125", "*/*;q=0", "Text/HTML;q=1.0"] {
            let parsed = media(s);
            assert_eq!(media(&parsed.to_string()), parsed, "{s}");
        }
        assert_eq!(media("text/plain;q=0.50").to_string(), "text/plain;q=0.5");
    }

    #[test]
    fn test_compatible() {
        let json = media("application/json");
        assert!(json.is_compatible(&media("*/*")));
        assert!(json.is_compatible(&media("application/*")));
        assert!(media("application/*").is_compatible(&json));
        assert!(json.is_compatible(&media("application/json")));
        assert!(!json.is_compatible(&media("text/html")));
        assert!(!json.is_compatible(&media("text/*")));
        assert!(!json.is_compatible(&media("application/xml")));
    }

    #[test]
    fn test_preference_order() {
        let mut types = vec![
            media("*/*"),
            media("text/*"),
            media("text/plain;q=0.5"),
            media("application/json;q=0.9"),
            media("text/html"),
        ];
        types.sort_by(MediaType::cmp_preference);
        let sorted = types.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(sorted, ["text/html", "text/*", "*/*", "application/json;q=0.9", "text/plain;q=0.5"]);
    }

    #[test]
    fn test_preference_is_strict_weak_ordering() {
        let types = [
            "*/*",
            "*/*;q=0.5",
            "text/*",
            "text/*;q=0.5",
            "text/plain",
            "text/html",
            "text/plain;q=0.5",
            "application/json;q=0.9",
        ]
        .map(media);

        for a in &types {
            assert_eq!(a.cmp_preference(a), Ordering::Equal);
            for b in &types {
                assert_eq!(a.cmp_preference(b), b.cmp_preference(a).reverse());
                for c in &types {
                    if a.cmp_preference(b) == Ordering::Less && b.cmp_preference(c) == Ordering::Less {
                        assert_eq!(a.cmp_preference(c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_accept() {
        let accept = parse_accept("text/plain, application/json;q=0.9, text/html, */*;q=0.1").unwrap();
        let essences = accept.iter().map(MediaType::essence).collect::<Vec<_>>();
        assert_eq!(essences, ["text/plain", "text/html", "application/json", "*/*"]);

        assert!(parse_accept("").unwrap().is_empty());
        assert_eq!(parse_accept(" , text/plain ,").unwrap().len(), 1);
        assert!(parse_accept("text/plain, nonsense").is_err());
    }

    #[test]
    fn test_intersect() {
        let declared = media("text/plain;q=0.8");
        assert_eq!(declared.intersect(&media("*/*")).unwrap(), mime::TEXT_PLAIN);
        assert_eq!(media("text/*").intersect(&media("text/html")).unwrap(), mime::TEXT_HTML);
        assert!(media("text/*").intersect(&media("*/*")).is_none());
        assert!(declared.intersect(&media("application/json")).is_none());
    }
}
