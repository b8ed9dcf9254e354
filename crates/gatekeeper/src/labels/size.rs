use std::fmt;

/// Pull request size tier, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SizeTier {
    Xs,
    S,
    M,
    L,
    Xl,
}

impl SizeTier {
    pub const ALL: [SizeTier; 5] = [Self::Xs, Self::S, Self::M, Self::L, Self::Xl];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xs => "XS",
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::Xl => "XL",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive `[start, end]` range of changed lines mapped to a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBand {
    pub tier: SizeTier,
    pub start: u64,
    pub end: u64,
    pub color: &'static str,
}

impl SizeBand {
    #[must_use]
    pub fn contains(&self, diff: u64) -> bool {
        (self.start..=self.end).contains(&diff)
    }
}

/// Size measurement of one pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrSize {
    pub additions: u64,
    pub deletions: u64,
    pub diff: u64,
    pub tier: SizeTier,
}

impl PrSize {
    /// Whether the change is large enough to warrant the oversized warning.
    #[must_use]
    pub fn is_too_big(&self) -> bool {
        self.tier == SizeTier::Xl
    }
}

/// Buckets `additions + deletions` into a [`SizeTier`].
#[derive(Debug, Clone)]
pub struct SizeClassifier {
    bands: Vec<SizeBand>,
}

impl SizeClassifier {
    /// The contiguous partition used in production:
    /// XS 0-50, S 51-100, M 101-500, L 501-1000, XL 1001 and up.
    #[must_use]
    pub fn standard() -> Self {
        Self::with_bands(vec![
            SizeBand { tier: SizeTier::Xs, start: 0, end: 50, color: "2cbe4e" },
            SizeBand { tier: SizeTier::S, start: 51, end: 100, color: "2cbe4e" },
            SizeBand { tier: SizeTier::M, start: 101, end: 500, color: "fe7d37" },
            SizeBand { tier: SizeTier::L, start: 501, end: 1000, color: "e05d44" },
            SizeBand { tier: SizeTier::Xl, start: 1001, end: u64::MAX, color: "ff0000" },
        ])
    }

    /// Build a classifier from explicit bands. Bands are scanned in tier order.
    #[must_use]
    pub fn with_bands(mut bands: Vec<SizeBand>) -> Self {
        bands.sort_by_key(|b| b.tier);
        Self { bands }
    }

    #[must_use]
    pub fn classify(&self, additions: u64, deletions: u64) -> PrSize {
        let diff = additions.saturating_add(deletions);
        let tier = self
            .bands
            .iter()
            .find(|band| band.contains(diff))
            .map_or(SizeTier::Xl, |band| band.tier);

        PrSize {
            additions,
            deletions,
            diff,
            tier,
        }
    }

    /// Label color for a tier; red when the tier has no band.
    #[must_use]
    pub fn color(&self, tier: SizeTier) -> &'static str {
        self.bands
            .iter()
            .find(|band| band.tier == tier)
            .map_or("ff0000", |band| band.color)
    }

    pub fn bands(&self) -> impl Iterator<Item = &SizeBand> {
        self.bands.iter()
    }
}
