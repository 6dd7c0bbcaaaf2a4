//! eegspec Engine - the analysis call boundary
//!
//! Callers hand the engine a [`RecordingStore`](eegspec_core::RecordingStore)
//! and a typed request; it returns an [`AnalysisResult`] carrying the numeric
//! payload, an optional PNG plot, the echoed parameters and any non-fatal
//! notes. Nothing is kept between calls, so independent requests may run on
//! separate threads against the same store.
//!
//! - [`request`] - [`AnalysisRequest`], [`AnalysisParams`] and [`ComparisonRequest`]
//! - [`engine`] - [`Engine::analyze`] and [`Engine::compare`]
//! - [`payload`] - Per-kind payload shapes
//! - [`render`] - Line, bar and heatmap figures rendered to PNG
//! - [`result`] - [`AnalysisResult`] and [`ResultError`]
//!
//! # Example
//!
//! ```rust
//! use eegspec_analysis::{PsdParams, SyntheticEeg};
//! use eegspec_core::RecordingStore;
//! use eegspec_engine::{AnalysisParams, AnalysisRequest, Engine, RenderOptions};
//!
//! let mut store = RecordingStore::new();
//! let id = store.insert(SyntheticEeg::default().generate().unwrap());
//!
//! let request = AnalysisRequest::new(
//!     id,
//!     AnalysisParams::Psd(PsdParams::default()),
//!     RenderOptions::disabled(),
//! );
//! let result = Engine::new().analyze(&store, &request);
//! assert!(result.success);
//! assert!(result.image.is_none());
//! ```

pub mod engine;
pub mod payload;
pub mod render;
pub mod request;
pub mod result;

pub use engine::Engine;
pub use payload::{
    BandPayload, ChannelSnr, ChannelSpectrogram, ChannelSpectrum, ComparisonPayload, PcaPayload,
    PsdPayload, SnrPayload, SpectrogramPayload, TraceIdentity,
};
pub use render::{
    BarGroup, Figure, Labels, MAX_SIDE, MIN_SIDE, RenderError, RenderOptions, Series, render_png,
};
pub use request::{AnalysisKind, AnalysisParams, AnalysisRequest, ComparisonRequest, EpochSpec};
pub use result::{AnalysisResult, ErrorKind, ResultError};
