//! Resolver statistics.

#![allow(clippy::cast_precision_loss)]

use crate::device::LodCounters;

/// Statistics of the last resolved frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResolverStats {
    /// Frames resolved since creation.
    pub frames: u64,
    /// Instances resident on the device.
    pub instances: u32,
    /// Workgroups dispatched per pass.
    pub workgroups: u32,
    /// Counters read back for the frame.
    pub counters: LodCounters,
    /// Indirect draws issued across all passes.
    pub draw_calls: u32,
    /// Full instance uploads since creation.
    pub full_uploads: u64,
    /// Instances re-uploaded through patches since creation.
    pub patched_instances: u64,
    /// Wall time spent in `resolve_frame`, in milliseconds.
    pub resolve_time_ms: f32,
}

impl ResolverStats {
    /// Instances drawn by the main pass.
    #[must_use]
    pub fn visible(&self) -> u32 {
        self.counters.main_total()
    }

    /// Instances rejected by the main pass.
    #[must_use]
    pub fn culled(&self) -> u32 {
        self.instances.saturating_sub(self.visible())
    }

    /// Fraction of resident instances drawn, `0` when empty.
    #[must_use]
    pub fn visible_ratio(&self) -> f32 {
        if self.instances > 0 {
            self.visible() as f32 / self.instances as f32
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_ratios() {
        let stats = ResolverStats {
            instances: 200,
            counters: LodCounters {
                main: [10, 20, 20, 0],
                shadow: [5, 0, 0, 0],
            },
            ..ResolverStats::default()
        };
        assert_eq!(stats.visible(), 50);
        assert_eq!(stats.culled(), 150);
        assert!((stats.visible_ratio() - 0.25).abs() < 1e-6);
        assert_eq!(ResolverStats::default().visible_ratio(), 0.0);
    }
}
