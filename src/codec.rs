//! Negotiated codec descriptors
//!
//! A [`CodecDescriptor`] is derived once from the producer's negotiated RTP
//! parameters and never mutated. Codec-family parameters are a tagged enum
//! per family, so fmtp construction is exhaustive instead of probing a loose
//! string map.

use std::collections::BTreeMap;

use crate::router::MediaKind;

/// Immutable description of one negotiated codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecDescriptor {
    /// Audio or video
    pub kind: MediaKind,

    /// MIME subtype as negotiated, e.g. "h264", "opus"
    pub mime_subtype: String,

    /// RTP clock rate
    pub clock_rate: u32,

    /// Channel count (audio only)
    pub channels: Option<u8>,

    /// Negotiated RTP payload type
    pub payload_type: u8,

    /// Codec-family parameters
    pub params: CodecParams,
}

/// Parameters split by media kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecParams {
    /// Video codec parameters
    Video(VideoCodecParams),
    /// Audio codec parameters
    Audio(AudioCodecParams),
}

/// Per-family video codec parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCodecParams {
    /// H.264: packetization mode and profile-level-id feed the fmtp line
    H264 {
        /// RTP packetization mode (0 or 1)
        packetization_mode: Option<u8>,
        /// Hex profile-level-id, e.g. "42e01f"
        profile_level_id: Option<String>,
    },
    /// VP8 carries no negotiable fmtp parameters
    Vp8,
    /// VP9 carries no negotiable fmtp parameters
    Vp9,
    /// Unrecognized codec; parameters pass through as-is
    Generic(BTreeMap<String, String>),
}

/// Per-family audio codec parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCodecParams {
    /// Opus carries no fmtp parameters the transcoder needs
    Opus,
    /// AAC: profile level feeds the fmtp line
    Aac {
        /// Profile-level-id as negotiated
        profile_level_id: Option<String>,
    },
    /// Unrecognized codec; parameters pass through as-is
    Generic(BTreeMap<String, String>),
}

impl CodecDescriptor {
    /// Ordered `key=value` pairs for the fmtp attribute
    ///
    /// Empty means the codec carries no negotiable parameters and no fmtp
    /// line is emitted. `Generic` maps iterate in key order, keeping the
    /// rendered descriptor deterministic.
    pub fn fmtp_pairs(&self) -> Vec<(String, String)> {
        match &self.params {
            CodecParams::Video(VideoCodecParams::H264 {
                packetization_mode,
                profile_level_id,
            }) => {
                let mut pairs = Vec::new();
                if let Some(mode) = packetization_mode {
                    pairs.push(("packetization-mode".to_string(), mode.to_string()));
                }
                if let Some(profile) = profile_level_id {
                    pairs.push(("profile-level-id".to_string(), profile.clone()));
                }
                pairs
            }
            CodecParams::Video(VideoCodecParams::Vp8)
            | CodecParams::Video(VideoCodecParams::Vp9)
            | CodecParams::Audio(AudioCodecParams::Opus) => Vec::new(),
            CodecParams::Audio(AudioCodecParams::Aac { profile_level_id }) => profile_level_id
                .iter()
                .map(|p| ("profile-level-id".to_string(), p.clone()))
                .collect(),
            CodecParams::Video(VideoCodecParams::Generic(map))
            | CodecParams::Audio(AudioCodecParams::Generic(map)) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
        }
    }

    /// Protocol codec name for the rtpmap attribute
    ///
    /// Fixed lookup from MIME subtype; unrecognized codecs fall back to the
    /// uppercased subtype. Some decoders match names case-sensitively, so
    /// the fallback casing must not change.
    pub fn sdp_codec_name(&self) -> String {
        match self.mime_subtype.to_ascii_lowercase().as_str() {
            "h264" => "H264".to_string(),
            "h265" => "H265".to_string(),
            "vp8" => "VP8".to_string(),
            "vp9" => "VP9".to_string(),
            "opus" => "opus".to_string(),
            "g722" => "G722".to_string(),
            "pcmu" => "PCMU".to_string(),
            "pcma" => "PCMA".to_string(),
            other => other.to_ascii_uppercase(),
        }
    }
}
