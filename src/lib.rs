//! # cyclemap-core
//!
//! Turns raw location fixes into durable, queryable data for a cycling map
//! app:
//! - continuous sampling from a platform location provider ([`sampler`])
//! - live track buffering and statistics ([`track`], [`geometry`])
//! - GPX read/write ([`parser`], [`writer`])
//! - persisted favourite places with thumbnails ([`favourites`])
//! - GeoJSON export for the map layer ([`converter`])

pub mod converter;
pub mod error;
pub mod favourites;
pub mod geocode;
pub mod geometry;
pub mod gpx_types;
pub mod options;
pub mod parser;
pub mod route;
pub mod sampler;
pub mod storage;
pub mod thumbnail;
pub mod track;
pub mod writer;

pub use error::{CycleMapError, Result};
pub use favourites::{Favourite, FavouritesCollection, FavouritesStore};
pub use gpx_types::{GpxDocument, GpxPoint, GpxSegment, GpxTrack};
pub use options::{ConvertOptions, CoreConfig, SamplingPolicy};
pub use parser::decode;
pub use route::RouteBuffer;
pub use sampler::{FixSender, GeoSampler, LocationProvider, RawLocation};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use track::{Fix, FixSink, Track, TrackBuffer, TrackStatistics};
pub use writer::encode;

/// Initialize logging. Safe to call more than once.
#[cfg(target_os = "android")]
pub fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("CycleMapCore"),
    );
}

/// Initialize logging from `RUST_LOG` (default `info`). Safe to call more
/// than once.
#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
