//! Transcoder argument construction
//!
//! Builds the full argv for one transcoder invocation: low-latency decode
//! hints, one SDP-described input per relayed stream, the composite filter
//! graph and stream mapping, encode parameters, and the segmented-output
//! flags. The vector is assembled deterministically from the config and the
//! ordered input lists so a rebuild with identical membership produces an
//! identical command line.

use std::path::{Path, PathBuf};

use crate::config::BridgeConfig;
use crate::layout;

/// A fully-built transcoder command line
#[derive(Debug, Clone)]
pub struct TranscoderCommand {
    program: String,
    args: Vec<String>,
}

impl TranscoderCommand {
    /// Build the argv for a session
    ///
    /// `video_inputs` become inputs `0..nv`, `audio_inputs` follow as
    /// `nv..nv+na`; the filter graph and mapping rely on that order.
    pub fn build(
        config: &BridgeConfig,
        session_dir: &Path,
        video_inputs: &[PathBuf],
        audio_inputs: &[PathBuf],
    ) -> Self {
        let nv = video_inputs.len();
        let na = audio_inputs.len();
        let mut args: Vec<String> = Vec::new();

        // Global low-latency decode hints
        args.extend(
            [
                "-hide_banner",
                "-loglevel",
                "warning",
                "-fflags",
                "nobuffer",
                "-flags",
                "low_delay",
                "-analyzeduration",
                "500000",
                "-probesize",
                "500000",
                "-y",
            ]
            .map(String::from),
        );

        // Inputs: protocol allowlist restricted to local file and RTP delivery
        for path in video_inputs.iter().chain(audio_inputs.iter()) {
            args.extend(
                ["-protocol_whitelist", "file,udp,rtp", "-f", "sdp", "-i"].map(String::from),
            );
            args.push(path.to_string_lossy().into_owned());
        }

        // Filter graph and explicit output-stream mapping
        if nv > 0 {
            let mut filter = layout::filter_graph(
                nv as u32,
                config.canvas_width,
                config.canvas_height,
                config.frame_rate,
            );
            if na > 1 {
                let refs: Vec<String> =
                    (nv..nv + na).map(|i| format!("[{}:a]", i)).collect();
                filter.push_str(&format!(";{}amix=inputs={}[a]", refs.join(""), na));
            }
            args.extend(["-filter_complex".to_string(), filter]);
            args.extend(["-map".to_string(), "[v]".to_string()]);
            match na {
                0 => {}
                1 => args.extend(["-map".to_string(), format!("{}:a", nv)]),
                _ => args.extend(["-map".to_string(), "[a]".to_string()]),
            }
        } else if na > 1 {
            let refs: Vec<String> = (0..na).map(|i| format!("[{}:a]", i)).collect();
            args.extend([
                "-filter_complex".to_string(),
                format!("{}amix=inputs={}[a]", refs.join(""), na),
            ]);
            args.extend(["-map".to_string(), "[a]".to_string()]);
        }

        // Encode parameters; GOP ties forced-keyframe cadence to the frame
        // rate (gop / fps seconds between keyframes)
        if nv > 0 {
            let bitrate = format!("{}k", config.video_bitrate_kbps);
            let bufsize = format!("{}k", config.video_bitrate_kbps * 2);
            let fps = config.frame_rate.to_string();
            let gop = config.gop_size().to_string();
            args.extend(
                [
                    "-c:v",
                    "libx264",
                    "-preset",
                    "veryfast",
                    "-tune",
                    "zerolatency",
                    "-pix_fmt",
                    "yuv420p",
                    "-b:v",
                    bitrate.as_str(),
                    "-maxrate",
                    bitrate.as_str(),
                    "-bufsize",
                    bufsize.as_str(),
                    "-r",
                    fps.as_str(),
                    "-g",
                    gop.as_str(),
                    "-keyint_min",
                    gop.as_str(),
                ]
                .map(String::from),
            );
        }
        if na > 0 {
            let bitrate = format!("{}k", config.audio_bitrate_kbps);
            args.extend(
                ["-c:a", "aac", "-b:a", bitrate.as_str(), "-ar", "48000"].map(String::from),
            );
        }

        // Segmented output: rolling playlist, stale segments deleted
        let segment_secs = config.segment_duration_secs.to_string();
        let window = config.playlist_window.to_string();
        args.extend(
            [
                "-f",
                "hls",
                "-hls_time",
                segment_secs.as_str(),
                "-hls_list_size",
                window.as_str(),
                "-hls_flags",
                "delete_segments",
                "-hls_segment_filename",
            ]
            .map(String::from),
        );
        args.push(
            session_dir
                .join("segment_%03d.ts")
                .to_string_lossy()
                .into_owned(),
        );
        args.push(session_dir.join("playlist.m3u8").to_string_lossy().into_owned());

        Self {
            program: config.ffmpeg_path.clone(),
            args,
        }
    }

    #[cfg(test)]
    pub(crate) fn raw(program: &str, args: Vec<String>) -> Self {
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// The binary to invoke
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
