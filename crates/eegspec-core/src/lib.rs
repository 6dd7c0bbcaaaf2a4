//! eegspec Core - recordings, windows and filter primitives
//!
//! This crate holds the data model every analysis in the workspace reads from.
//!
//! # Core Abstractions
//!
//! ## Recordings
//!
//! - [`Recording`] - Immutable decoded multichannel time series
//! - [`ChannelRead`] - Read interface shared by recordings and cropped views
//! - [`Annotation`] - Timed events with derived real-world timestamps
//! - [`SignalUnit`] - Sample unit resolved once at ingestion
//!
//! ## Windows
//!
//! - [`TimeWindow`] - Requested `[start, end)` in seconds
//! - [`crop`] / [`CroppedView`] - Zero-copy window over any [`ChannelRead`]
//! - [`AppliedWindow`] - The clamped range that was actually used
//!
//! ## Store
//!
//! - [`RecordingStore`] - Registry of recordings keyed by [`RecordingId`]
//!
//! ## Filters
//!
//! - [`Biquad`] - Second-order IIR section with RBJ cookbook coefficients
//! - [`Bandpass`] - Butterworth band-pass cascade with zero-phase `filtfilt`
//!
//! ## Utilities
//!
//! - [`power_to_db`], [`ratio_db`], [`trapezoid`], [`mean`], [`std_dev`]
//!
//! # Example
//!
//! ```rust
//! use eegspec_core::{ChannelRead, Recording, RecordingStore, TimeWindow, crop};
//!
//! let mut store = RecordingStore::new();
//! let id = store.insert(
//!     Recording::new(vec!["O1".into()], 100.0, vec![vec![0.0; 1000]]).unwrap(),
//! );
//!
//! let rec = store.get(id).unwrap();
//! let view = crop(rec.as_ref(), Some(TimeWindow::new(2.0, 7.0)));
//! assert_eq!(view.sample_count(), 500);
//! ```

pub mod biquad;
pub mod butterworth;
pub mod error;
pub mod math;
pub mod recording;
pub mod store;
pub mod window;

pub use biquad::{Biquad, highpass_coefficients, lowpass_coefficients};
pub use butterworth::Bandpass;
pub use error::{CoreError, Result};
pub use math::{DB_EPSILON, mean, power_to_db, ratio_db, std_dev, trapezoid};
pub use recording::{Annotation, ChannelRead, Recording, SignalUnit};
pub use store::{RecordingId, RecordingStore};
pub use window::{AppliedWindow, CroppedView, TimeWindow, crop};
