//! Protocol descriptor (SDP) synthesis
//!
//! The transcoder learns how to receive each relayed stream from a small SDP
//! file: one session header, then one media block per stream. Field order is
//! fixed and lines end in `\r\n`, so regenerating a descriptor for the same
//! inputs is byte-identical.

use std::path::Path;

use crate::codec::CodecDescriptor;
use crate::error::Result;
use crate::ports::PortPair;

const CRLF: &str = "\r\n";

/// Builder for one descriptor file
///
/// ```
/// use hls_bridge::sdp::SdpWriter;
/// # use hls_bridge::codec::{CodecDescriptor, CodecParams, VideoCodecParams};
/// # use hls_bridge::ports::PortPair;
/// # use hls_bridge::router::MediaKind;
/// # let codec = CodecDescriptor {
/// #     kind: MediaKind::Video,
/// #     mime_subtype: "vp8".to_string(),
/// #     clock_rate: 90000,
/// #     channels: None,
/// #     payload_type: 101,
/// #     params: CodecParams::Video(VideoCodecParams::Vp8),
/// # };
/// let mut sdp = SdpWriter::new("bridge");
/// sdp.add_media(&codec, PortPair { rtp: 20000, rtcp: 20001 }, None);
/// let text = sdp.render();
/// assert!(text.starts_with("v=0\r\n"));
/// ```
#[derive(Debug)]
pub struct SdpWriter {
    session_name: String,
    media: Vec<String>,
}

impl SdpWriter {
    /// Start a descriptor with the given session name
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            media: Vec::new(),
        }
    }

    /// Append exactly one media block
    ///
    /// `framesize` adds an `a=framesize` annotation when the video
    /// resolution is already known; the readiness gate reads it back.
    pub fn add_media(
        &mut self,
        codec: &CodecDescriptor,
        ports: PortPair,
        framesize: Option<(u32, u32)>,
    ) {
        let mut block = String::new();

        block.push_str(&format!(
            "m={} {} RTP/AVP {}{}",
            codec.kind.as_str(),
            ports.rtp,
            codec.payload_type,
            CRLF
        ));

        let mut rtpmap = format!(
            "a=rtpmap:{} {}/{}",
            codec.payload_type,
            codec.sdp_codec_name(),
            codec.clock_rate
        );
        if let Some(channels) = codec.channels {
            rtpmap.push_str(&format!("/{}", channels));
        }
        block.push_str(&rtpmap);
        block.push_str(CRLF);

        let fmtp = codec.fmtp_pairs();
        if !fmtp.is_empty() {
            let rendered: Vec<String> =
                fmtp.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            block.push_str(&format!(
                "a=fmtp:{} {}{}",
                codec.payload_type,
                rendered.join(";"),
                CRLF
            ));
        }

        if let Some((width, height)) = framesize {
            block.push_str(&format!(
                "a=framesize:{} {}-{}{}",
                codec.payload_type, width, height, CRLF
            ));
        }

        block.push_str("a=sendonly");
        block.push_str(CRLF);
        block.push_str(&format!("a=rtcp:{}{}", ports.rtcp, CRLF));

        self.media.push(block);
    }

    /// Render the full descriptor text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("v=0");
        out.push_str(CRLF);
        out.push_str("o=- 0 0 IN IP4 127.0.0.1");
        out.push_str(CRLF);
        out.push_str(&format!("s={}{}", self.session_name, CRLF));
        out.push_str("c=IN IP4 127.0.0.1");
        out.push_str(CRLF);
        out.push_str("t=0 0");
        out.push_str(CRLF);
        for block in &self.media {
            out.push_str(block);
        }
        out
    }

    /// Write the descriptor to disk, fully replacing prior contents
    pub async fn write_to(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::codec::{AudioCodecParams, CodecParams, VideoCodecParams};
    use crate::router::MediaKind;

    fn h264_codec() -> CodecDescriptor {
        CodecDescriptor {
            kind: MediaKind::Video,
            mime_subtype: "h264".to_string(),
            clock_rate: 90000,
            channels: None,
            payload_type: 102,
            params: CodecParams::Video(VideoCodecParams::H264 {
                packetization_mode: Some(1),
                profile_level_id: Some("42e01f".to_string()),
            }),
        }
    }

    fn opus_codec() -> CodecDescriptor {
        CodecDescriptor {
            kind: MediaKind::Audio,
            mime_subtype: "opus".to_string(),
            clock_rate: 48000,
            channels: Some(2),
            payload_type: 100,
            params: CodecParams::Audio(AudioCodecParams::Opus),
        }
    }

    #[test]
    fn test_session_header_order() {
        let sdp = SdpWriter::new("bridge");
        let text = sdp.render();
        let lines: Vec<&str> = text.split(CRLF).collect();

        assert_eq!(lines[0], "v=0");
        assert_eq!(lines[1], "o=- 0 0 IN IP4 127.0.0.1");
        assert_eq!(lines[2], "s=bridge");
        assert_eq!(lines[3], "c=IN IP4 127.0.0.1");
        assert_eq!(lines[4], "t=0 0");
    }

    #[test]
    fn test_video_media_block() {
        let mut sdp = SdpWriter::new("bridge");
        sdp.add_media(
            &h264_codec(),
            PortPair {
                rtp: 20000,
                rtcp: 20001,
            },
            Some((640, 480)),
        );
        let text = sdp.render();

        assert!(text.contains("m=video 20000 RTP/AVP 102\r\n"));
        assert!(text.contains("a=rtpmap:102 H264/90000\r\n"));
        assert!(text.contains("a=fmtp:102 packetization-mode=1;profile-level-id=42e01f\r\n"));
        assert!(text.contains("a=framesize:102 640-480\r\n"));
        assert!(text.contains("a=sendonly\r\n"));
        assert!(text.contains("a=rtcp:20001\r\n"));
    }

    #[test]
    fn test_audio_rtpmap_includes_channels() {
        let mut sdp = SdpWriter::new("bridge");
        sdp.add_media(
            &opus_codec(),
            PortPair {
                rtp: 20002,
                rtcp: 20003,
            },
            None,
        );
        let text = sdp.render();

        assert!(text.contains("m=audio 20002 RTP/AVP 100\r\n"));
        assert!(text.contains("a=rtpmap:100 opus/48000/2\r\n"));
        // Opus has no negotiable fmtp parameters
        assert!(!text.contains("a=fmtp"));
    }

    #[test]
    fn test_round_trip_payload_type_and_clock() {
        let codec = h264_codec();
        let mut sdp = SdpWriter::new("bridge");
        sdp.add_media(
            &codec,
            PortPair {
                rtp: 20000,
                rtcp: 20001,
            },
            None,
        );
        let text = sdp.render();

        let rtpmap = text
            .lines()
            .find(|l| l.starts_with("a=rtpmap:"))
            .unwrap()
            .trim_end();
        let rest = rtpmap.strip_prefix("a=rtpmap:").unwrap();
        let (pt, mapping) = rest.split_once(' ').unwrap();
        let clock: u32 = mapping.split('/').nth(1).unwrap().parse().unwrap();

        assert_eq!(pt.parse::<u8>().unwrap(), codec.payload_type);
        assert_eq!(clock, codec.clock_rate);
    }

    #[test]
    fn test_generic_fallback_name_in_rtpmap() {
        let mut map = BTreeMap::new();
        map.insert("profile".to_string(), "0".to_string());
        let codec = CodecDescriptor {
            kind: MediaKind::Video,
            mime_subtype: "av1".to_string(),
            clock_rate: 90000,
            channels: None,
            payload_type: 104,
            params: CodecParams::Video(VideoCodecParams::Generic(map)),
        };

        let mut sdp = SdpWriter::new("bridge");
        sdp.add_media(
            &codec,
            PortPair {
                rtp: 20004,
                rtcp: 20005,
            },
            None,
        );
        let text = sdp.render();

        assert!(text.contains("a=rtpmap:104 AV1/90000\r\n"));
        assert!(text.contains("a=fmtp:104 profile=0\r\n"));
    }

    #[tokio::test]
    async fn test_write_fully_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.sdp");

        let mut sdp = SdpWriter::new("bridge");
        sdp.add_media(
            &h264_codec(),
            PortPair {
                rtp: 20000,
                rtcp: 20001,
            },
            None,
        );
        sdp.write_to(&path).await.unwrap();
        let first = tokio::fs::read_to_string(&path).await.unwrap();

        // Regenerate with fewer media lines; the file must shrink, not append
        let shorter = SdpWriter::new("bridge");
        shorter.write_to(&path).await.unwrap();
        let second = tokio::fs::read_to_string(&path).await.unwrap();

        assert!(second.len() < first.len());
        assert!(!second.contains("m=video"));
    }
}
