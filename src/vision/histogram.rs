//! Per-channel intensity histograms

use std::ops::Range;

use imageproc::stats::ChannelHistogram;

/// Number of bins per channel
pub const BINS: usize = 256;

/// Width of the window summed around a target value
pub const WINDOW_WIDTH: usize = 7;

/// Count of pixels at each of 256 levels, one array per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    channels: Vec<[u32; BINS]>,
}

impl Histogram {
    /// Create a histogram from raw per-channel bins
    pub fn from_channels(channels: Vec<[u32; BINS]>) -> Self {
        Self { channels }
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Bins for one channel
    pub fn channel(&self, index: usize) -> Option<&[u32; BINS]> {
        self.channels.get(index)
    }

    /// Iterate over all channels in order
    pub fn channels(&self) -> impl Iterator<Item = &[u32; BINS]> {
        self.channels.iter()
    }

    /// Sum of the 7 bins around `target` in the given channel.
    ///
    /// Near the ends of the range the window is shifted inward instead of
    /// truncated, so it always covers exactly [`WINDOW_WIDTH`] bins.
    pub fn window_sum(&self, channel: usize, target: u8) -> u64 {
        let Some(bins) = self.channels.get(channel) else {
            return 0;
        };
        bins[window_bounds(target)].iter().map(|&n| n as u64).sum()
    }

    /// Sum of `count(i) * (i mod 256)` across every bin of every channel.
    ///
    /// Multi-channel histograms are folded onto a single 0-255 scale.
    pub fn weighted_level_sum(&self) -> u64 {
        self.channels
            .iter()
            .flat_map(|bins| bins.iter().enumerate())
            .map(|(level, &count)| count as u64 * (level % BINS) as u64)
            .sum()
    }
}

impl From<ChannelHistogram> for Histogram {
    fn from(histogram: ChannelHistogram) -> Self {
        Self {
            channels: histogram.channels,
        }
    }
}

/// Bin range summed for a target value
pub fn window_bounds(target: u8) -> Range<usize> {
    let mut start = target as i32 - 3;
    let mut end = target as i32 + 4;

    let delta = if start < 0 {
        -start
    } else if end > BINS as i32 {
        BINS as i32 - end
    } else {
        0
    };

    start += delta;
    end += delta;
    start as usize..end as usize
}
