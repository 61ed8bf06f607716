//! Viewport reconciliation for message buffer mutations
//!
//! The chat pane never scrolls directly when the buffer changes. Instead a
//! mutation arms a pending adjustment, and after the next render (when the
//! new content extent is known) the view resolves it into a concrete offset:
//!
//! - prepending older messages must keep the previously visible message at
//!   the same viewport position, so the offset grows by exactly the amount
//!   of content added above it;
//! - appends (sends, live pushes) pin the viewport to the bottom, smoothly
//!   for user-visible novelty and instantly for the very first page.
//!
//! For a backward load, the old extent and offset must be captured BEFORE
//! the fetch is issued, while the viewport still shows pre-mutation content.

/// A pending viewport correction, applied after the next render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAdjustment {
    /// Nothing pending
    #[default]
    Idle,
    /// Older content is being prepended; keep the anchor message in place
    PendingPreserve {
        /// Total content extent (rendered lines) captured before the fetch
        old_extent: usize,
        /// Scroll offset captured before the fetch
        old_offset: usize,
    },
    /// New activity at the tail; scroll to the maximum offset
    PendingBottom {
        /// Animate the scroll (new activity) or jump (first paint)
        smooth: bool,
    },
}

/// A resolved scroll position for the view to apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollTarget {
    /// First visible line, measured from the top of the content
    pub offset: usize,
    /// Whether the view should animate toward the offset
    pub smooth: bool,
}

impl ScrollAdjustment {
    /// Capture the pre-fetch viewport for a backward load
    pub fn capture_preserve(old_extent: usize, old_offset: usize) -> Self {
        Self::PendingPreserve {
            old_extent,
            old_offset,
        }
    }

    /// Request a scroll to the bottom after the next render
    pub fn pin_to_bottom(smooth: bool) -> Self {
        Self::PendingBottom { smooth }
    }

    /// Resolve the pending adjustment against the post-mutation content
    ///
    /// `new_extent` is the total content size after the buffer change and
    /// `viewport` the visible window size, in the same units. Returns `None`
    /// when nothing is pending. The caller transitions back to `Idle` by
    /// replacing the adjustment once the target has been applied.
    pub fn resolve(self, new_extent: usize, viewport: usize) -> Option<ScrollTarget> {
        let max_offset = new_extent.saturating_sub(viewport);
        match self {
            Self::Idle => None,
            Self::PendingPreserve {
                old_extent,
                old_offset,
            } => {
                // Same anchor position: offset shifts by the prepended extent.
                let grown = new_extent.saturating_sub(old_extent);
                Some(ScrollTarget {
                    offset: (old_offset + grown).min(max_offset),
                    smooth: false,
                })
            }
            Self::PendingBottom { smooth } => Some(ScrollTarget {
                offset: max_offset,
                smooth,
            }),
        }
    }

    /// Whether an adjustment is pending
    pub fn is_pending(&self) -> bool {
        *self != Self::Idle
    }
}
