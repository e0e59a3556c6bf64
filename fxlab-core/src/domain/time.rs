//! Simulated time.

/// Nanoseconds since an arbitrary epoch.
///
/// The engine only ever computes differences; the absolute origin is
/// irrelevant. Values are signed so that deltas are closed under subtraction.
pub type TimestampNs = i64;

/// Sentinel meaning "no further events".
pub const NO_EVENT: TimestampNs = TimestampNs::MAX;

/// One microsecond in nanoseconds.
pub const MICROSECOND: TimestampNs = 1_000;
/// One millisecond in nanoseconds.
pub const MILLISECOND: TimestampNs = 1_000_000;
/// One second in nanoseconds.
pub const SECOND: TimestampNs = 1_000_000_000;
/// One minute in nanoseconds.
pub const MINUTE: TimestampNs = 60 * SECOND;
