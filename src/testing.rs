//! In-memory router stub shared across unit tests
//!
//! Records every router call in order, so tests can assert teardown side
//! effects precede allocation side effects.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::codec::{
    AudioCodecParams, CodecDescriptor, CodecParams, VideoCodecParams,
};
use crate::error::{Error, Result};
use crate::router::{ConsumerId, EndpointId, MediaKind, MediaRouter, ProducerId};

#[derive(Default)]
struct StubState {
    codecs: HashMap<ProducerId, CodecDescriptor>,
    dimensions: HashMap<ProducerId, Option<(u32, u32)>>,
    consumer_producer: HashMap<ConsumerId, ProducerId>,
}

/// Scriptable [`MediaRouter`] with an ordered side-effect log
pub struct StubRouter {
    state: Mutex<StubState>,
    events: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    keyframes: AtomicUsize,
    fail_consumer_close: std::sync::atomic::AtomicBool,
}

impl StubRouter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            events: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            keyframes: AtomicUsize::new(0),
            fail_consumer_close: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Register a video producer with a VP8 codec
    pub fn add_video_producer(&self, id: &ProducerId, dimensions: Option<(u32, u32)>) {
        let mut state = self.state.lock().unwrap();
        state.codecs.insert(
            id.clone(),
            CodecDescriptor {
                kind: MediaKind::Video,
                mime_subtype: "vp8".to_string(),
                clock_rate: 90000,
                channels: None,
                payload_type: 101,
                params: CodecParams::Video(VideoCodecParams::Vp8),
            },
        );
        state.dimensions.insert(id.clone(), dimensions);
    }

    /// Register an audio producer with an Opus codec
    pub fn add_audio_producer(&self, id: &ProducerId) {
        let mut state = self.state.lock().unwrap();
        state.codecs.insert(
            id.clone(),
            CodecDescriptor {
                kind: MediaKind::Audio,
                mime_subtype: "opus".to_string(),
                clock_rate: 48000,
                channels: Some(2),
                payload_type: 100,
                params: CodecParams::Audio(AudioCodecParams::Opus),
            },
        );
    }

    /// Register a producer for which negotiation produced nothing usable
    pub fn add_producer_without_codec(&self, id: &ProducerId) {
        let mut state = self.state.lock().unwrap();
        state.codecs.remove(id);
        state.dimensions.insert(id.clone(), None);
    }

    /// Make the producer's resolution known after the fact
    pub fn set_video_dimensions(&self, id: &ProducerId, dimensions: (u32, u32)) {
        let mut state = self.state.lock().unwrap();
        state.dimensions.insert(id.clone(), Some(dimensions));
    }

    /// Script consumer closes to fail
    pub fn fail_consumer_close(&self, fail: bool) {
        self.fail_consumer_close.store(fail, Ordering::Relaxed);
    }

    /// The ordered call log
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Total keyframe requests observed
    pub fn keyframe_requests(&self) -> usize {
        self.keyframes.load(Ordering::Relaxed)
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn fresh_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for StubRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaRouter for StubRouter {
    async fn create_endpoint(&self, rtp_port: u16, rtcp_port: u16) -> Result<EndpointId> {
        let id = EndpointId(format!("ep{}", self.fresh_id()));
        self.record(format!("create_endpoint {} {} {}", id, rtp_port, rtcp_port));
        Ok(id)
    }

    async fn connect_consumer(
        &self,
        endpoint: &EndpointId,
        producer: &ProducerId,
    ) -> Result<ConsumerId> {
        let id = ConsumerId(format!("c{}", self.fresh_id()));
        self.record(format!("connect_consumer {} {} {}", id, endpoint, producer));
        self.state
            .lock()
            .unwrap()
            .consumer_producer
            .insert(id.clone(), producer.clone());
        Ok(id)
    }

    async fn request_keyframe(&self, consumer: &ConsumerId) -> Result<()> {
        self.keyframes.fetch_add(1, Ordering::Relaxed);
        self.record(format!("request_keyframe {}", consumer));
        Ok(())
    }

    async fn close_consumer(&self, consumer: &ConsumerId) -> Result<()> {
        self.record(format!("close_consumer {}", consumer));
        if self.fail_consumer_close.load(Ordering::Relaxed) {
            return Err(Error::Router("scripted consumer close failure".to_string()));
        }
        Ok(())
    }

    async fn close_endpoint(&self, endpoint: &EndpointId) -> Result<()> {
        self.record(format!("close_endpoint {}", endpoint));
        Ok(())
    }

    async fn producer_codec(&self, producer: &ProducerId) -> Result<Option<CodecDescriptor>> {
        Ok(self.state.lock().unwrap().codecs.get(producer).cloned())
    }

    async fn video_dimensions(&self, producer: &ProducerId) -> Result<Option<(u32, u32)>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .dimensions
            .get(producer)
            .copied()
            .flatten())
    }
}
