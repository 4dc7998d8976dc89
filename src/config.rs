//! Bridge configuration

use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

/// Bridge configuration options
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Root directory holding per-session dirs plus the `live/` and
    /// `combined/` publish targets
    pub output_root: PathBuf,

    /// Composite canvas width in pixels
    pub canvas_width: u32,

    /// Composite canvas height in pixels
    pub canvas_height: u32,

    /// Output frame rate (also used to normalize input rates)
    pub frame_rate: u32,

    /// Seconds between forced keyframes; GOP = frame_rate * this
    pub keyframe_interval_secs: u32,

    /// Target segment duration in seconds
    pub segment_duration_secs: u32,

    /// Number of segments kept in the rolling playlist
    pub playlist_window: u32,

    /// Publish loop tick interval (must stay below the segment duration)
    pub publish_interval: Duration,

    /// Per-producer publishing skips ticks when the source playlist is
    /// older than this
    pub publish_staleness: Duration,

    /// Readiness gate poll interval
    pub readiness_poll: Duration,

    /// Readiness gate overall timeout
    pub readiness_timeout: Duration,

    /// Delay before the single readiness retry
    pub readiness_retry_delay: Duration,

    /// Port range the RTP port pool allocates from (RTP ports are even,
    /// RTCP is RTP + 1)
    pub rtp_port_range: Range<u16>,

    /// Video encode bitrate in kbit/s
    pub video_bitrate_kbps: u32,

    /// Audio encode bitrate in kbit/s
    pub audio_bitrate_kbps: u32,

    /// Transcoder binary to invoke
    pub ffmpeg_path: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./streams"),
            canvas_width: 1280,
            canvas_height: 720,
            frame_rate: 30,
            keyframe_interval_secs: 2,
            segment_duration_secs: 2,
            playlist_window: 5,
            publish_interval: Duration::from_secs(1),
            publish_staleness: Duration::from_secs(8),
            readiness_poll: Duration::from_millis(250),
            readiness_timeout: Duration::from_secs(10),
            readiness_retry_delay: Duration::from_secs(3),
            rtp_port_range: 20000..20100,
            video_bitrate_kbps: 2500,
            audio_bitrate_kbps: 128,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create a config rooted at a custom output directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: root.into(),
            ..Default::default()
        }
    }

    /// Set the output root directory
    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Set the composite canvas size
    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Set the output frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps.max(1);
        self
    }

    /// Set the RTP port range
    pub fn rtp_port_range(mut self, range: Range<u16>) -> Self {
        self.rtp_port_range = range;
        self
    }

    /// Set the readiness gate timeout
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }

    /// Set the readiness gate poll interval
    pub fn readiness_poll(mut self, poll: Duration) -> Self {
        self.readiness_poll = poll;
        self
    }

    /// Set the publish loop interval
    pub fn publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// GOP length in frames (forced-keyframe cadence is GOP / fps seconds)
    pub fn gop_size(&self) -> u32 {
        self.frame_rate * self.keyframe_interval_secs
    }

    /// Forced-keyframe cadence as a duration
    pub fn keyframe_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.keyframe_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();

        assert_eq!(config.canvas_width, 1280);
        assert_eq!(config.canvas_height, 720);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.gop_size(), 60);
        assert!(config.publish_interval < Duration::from_secs(config.segment_duration_secs as u64));
    }

    #[test]
    fn test_with_root() {
        let config = BridgeConfig::with_root("/tmp/out");

        assert_eq!(config.output_root, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_builder_chaining() {
        let config = BridgeConfig::default()
            .canvas(1920, 1080)
            .frame_rate(25)
            .rtp_port_range(30000..30010)
            .readiness_timeout(Duration::from_secs(5));

        assert_eq!(config.canvas_width, 1920);
        assert_eq!(config.canvas_height, 1080);
        assert_eq!(config.frame_rate, 25);
        assert_eq!(config.rtp_port_range, 30000..30010);
        assert_eq!(config.readiness_timeout, Duration::from_secs(5));
        assert_eq!(config.gop_size(), 50);
    }

    #[test]
    fn test_frame_rate_floor() {
        let config = BridgeConfig::default().frame_rate(0);

        assert_eq!(config.frame_rate, 1);
    }
}
