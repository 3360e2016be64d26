use std::path::Path;
use std::time::Duration;

use cc_tunnel_core::prelude::LogPaths;
use itertools::{Either, Itertools};

use crate::event::{EventKind, LogEvent};
use crate::parse::parse;

/// Bytes assumed per logged packet.
pub const DEFAULT_PAYLOAD_SIZE: u64 = 1500;

/// The measurement window that throughput is averaged over.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSettings {
    pub payload_size: u64,
    /// Throughput is averaged over this fixed window, not over the time span of the log.
    pub window: Duration,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            payload_size: DEFAULT_PAYLOAD_SIZE,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Summary of one scheme's link log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemeMetrics {
    /// Uplink throughput in bits per second
    pub throughput_bps: f64,
    /// Mean of the paired ack and send timestamp differences, in milliseconds
    pub avg_rtt_ms: f64,
    /// Percentage of sent packets without an ack. Negative if there were more acks than sends.
    pub loss_rate_pct: f64,
    pub sent: usize,
    pub acked: usize,
}

impl SchemeMetrics {
    pub fn throughput_mbps(&self) -> f64 {
        self.throughput_bps / 1_000_000.0
    }
}

/// Derive [`SchemeMetrics`] from a scheme's link log events.
///
/// Returns `None` when there are no sent or no acked events, rather than a zero or NaN result.
///
/// The RTT pairs the i-th sent event with the i-th acked event. That is only a true per-packet
/// delay when packets are neither lost nor reordered.
pub fn aggregate(
    events: impl IntoIterator<Item = LogEvent>,
    settings: &AggregateSettings,
) -> Option<SchemeMetrics> {
    let (sent, acked): (Vec<u64>, Vec<u64>) =
        events.into_iter().partition_map(|event| match event.kind {
            EventKind::Sent => Either::Left(event.timestamp_ms),
            EventKind::Acked => Either::Right(event.timestamp_ms),
        });

    if sent.is_empty() || acked.is_empty() {
        return None;
    }

    let window_secs = settings.window.as_secs_f64();
    let throughput_bps = sent.len() as f64 * settings.payload_size as f64 * 8.0 / window_secs;

    let (rtt_sum, pairs) = sent
        .iter()
        .zip(acked.iter())
        .fold((0.0, 0usize), |(sum, n), (send, ack)| {
            (sum + (*ack as f64 - *send as f64), n + 1)
        });
    let avg_rtt_ms = rtt_sum / pairs as f64;

    let loss_rate_pct = 100.0 * (1.0 - acked.len() as f64 / sent.len() as f64);

    Some(SchemeMetrics {
        throughput_bps,
        avg_rtt_ms,
        loss_rate_pct,
        sent: sent.len(),
        acked: acked.len(),
    })
}

/// Summarise the uplink log of one run of a scheme.
///
/// A missing log is treated like an empty one.
pub fn summarise_scheme(
    data_dir: &Path,
    scheme: &str,
    run_id: u32,
    settings: &AggregateSettings,
) -> Option<SchemeMetrics> {
    let path = LogPaths::new(data_dir, scheme, run_id).mm_datalink;
    match parse(&path) {
        Ok(events) => {
            let metrics = aggregate(events, settings);
            if metrics.is_none() {
                log::warn!("No sent or no acked packets in {}", path.display());
            }
            metrics
        }
        Err(e) => {
            log::debug!("No data for {scheme}: {e}");
            None
        }
    }
}
