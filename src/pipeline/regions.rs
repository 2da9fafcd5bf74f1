//! Region candidate generation.
//!
//! The orchestrator asks a [`RegionProposer`] which parts of an enhanced
//! page deserve a recognition attempt. The default [`WholePageProposer`]
//! treats the entire page as the single candidate — the honest answer when
//! no learned localizer is configured. The trait exists so a real detector
//! (layout model, bounding-box network) can slot in via
//! [`crate::config::ExtractionConfigBuilder::region_proposer`] without any
//! orchestrator change: the sweep already iterates however many regions a
//! proposer returns.

use crate::pipeline::enhance::EnhancedPage;
use image::DynamicImage;

/// One image area submitted to a recognition engine.
///
/// Transient by contract: a region (and any temp file materialised from it)
/// lives for exactly one recognition attempt.
pub struct Region {
    /// 0-based index of the page this region came from.
    pub page: usize,
    /// 0-based index of the region within its page.
    pub index: usize,
    pub image: DynamicImage,
}

/// Produces the ordered candidate regions for one page.
///
/// Contract: the returned list is non-empty and, for a fixed page and
/// policy, reproducible — same candidates, same order, every run.
pub trait RegionProposer: Send + Sync {
    fn propose(&self, page: &EnhancedPage) -> Vec<Region>;
}

/// The default policy: the whole page is the sole candidate (index 0).
pub struct WholePageProposer;

impl RegionProposer for WholePageProposer {
    fn propose(&self, page: &EnhancedPage) -> Vec<Region> {
        vec![Region {
            page: page.index,
            index: 0,
            image: page.image.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};

    fn page(index: usize) -> EnhancedPage {
        EnhancedPage {
            index,
            width_pts: 612.0,
            height_pts: 792.0,
            image: DynamicImage::ImageRgb8(RgbImage::new(20, 30)),
        }
    }

    #[test]
    fn whole_page_yields_one_region_at_index_zero() {
        let regions = WholePageProposer.propose(&page(3));
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].page, 3);
        assert_eq!(regions[0].index, 0);
        assert_eq!(regions[0].image.width(), 20);
        assert_eq!(regions[0].image.height(), 30);
    }

    #[test]
    fn proposals_are_reproducible() {
        let p = page(0);
        let a = WholePageProposer.propose(&p);
        let b = WholePageProposer.propose(&p);
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].image.as_bytes(), b[0].image.as_bytes());
    }
}
