//! Gzip response compression

use melware_config::{CompressionConfig, CompressionLevel};
use tower_http::compression::CompressionLayer;

/// Map a configured level onto the compression layer's level
pub fn compression_level(level: CompressionLevel) -> tower_http::CompressionLevel {
    match level {
        CompressionLevel::Fastest => tower_http::CompressionLevel::Fastest,
        CompressionLevel::Best => tower_http::CompressionLevel::Best,
        CompressionLevel::Default => tower_http::CompressionLevel::Default,
        CompressionLevel::Precise(level) => tower_http::CompressionLevel::Precise(i32::from(level)),
    }
}

/// Gzip compression at the given level.
///
/// Honors `Accept-Encoding`, sets `Content-Encoding` and `Vary`, and uses the
/// layer's default predicate, which skips images, gRPC and small bodies.
pub fn gzip_layer(level: CompressionLevel) -> CompressionLayer {
    CompressionLayer::new().gzip(true).quality(compression_level(level))
}

/// [`gzip_layer`] when compression is enabled
pub fn gzip_layer_from_config(config: &CompressionConfig) -> Option<CompressionLayer> {
    config.enabled.then(|| gzip_layer(config.level))
}
