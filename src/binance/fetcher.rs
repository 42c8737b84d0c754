// =============================================================================
// Upstream fetcher — bounded batches and backward pagination
// =============================================================================
//
// Wraps a kline source with the upstream's paging rules: batches are capped
// at the page size, deep fetches walk backward through history by anchoring
// each request strictly before the oldest bucket already received, and
// consecutive upstream calls are separated by a fixed delay. The delay is a
// rate-limit courtesy, so it is skipped once the final batch is in.
// =============================================================================

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::merge::merge_series;
use crate::types::{Candle, Timeframe};

/// Transport seam for the klines endpoint. Implemented by the production
/// gateway and by instrumented sources in tests.
pub trait KlineSource: Send + Sync {
    fn fetch_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        end_time: Option<i64>,
    ) -> impl Future<Output = Result<Vec<Candle>>> + Send;
}

pub struct Fetcher<S: KlineSource> {
    source: S,
    page_size: usize,
    page_delay: Duration,
}

impl<S: KlineSource> Fetcher<S> {
    pub fn new(source: S, page_size: usize, page_delay: Duration) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, 1000),
            page_delay,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch one bounded batch: the most recent `count` buckets, or the
    /// `count` buckets ending strictly before `before_ts` when supplied.
    /// `count` is capped at the upstream page size.
    pub async fn fetch_batch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        before_ts: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let limit = count.clamp(1, self.page_size);
        self.source
            .fetch_klines(symbol, timeframe, limit, before_ts)
            .await
    }

    /// Fetch up to `total_points` buckets by paginating backward from now.
    ///
    /// Stops when the target is reached or a batch comes back empty (history
    /// exhausted). A failed batch stops pagination and keeps what has been
    /// accumulated, so the result is best-effort rather than all-or-nothing.
    /// Pages are merged, not concatenated, so a seam overlap cannot
    /// introduce duplicate buckets.
    pub async fn fetch_deep(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        total_points: usize,
    ) -> Vec<Candle> {
        let mut collected: Vec<Candle> = Vec::new();
        let mut before_ts: Option<i64> = None;

        while collected.len() < total_points {
            let remaining = total_points - collected.len();
            let batch = match self.fetch_batch(symbol, timeframe, remaining, before_ts).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        symbol,
                        timeframe = %timeframe,
                        collected = collected.len(),
                        error = %e,
                        "batch fetch failed, keeping what was accumulated"
                    );
                    break;
                }
            };

            if batch.is_empty() {
                info!(
                    symbol,
                    timeframe = %timeframe,
                    collected = collected.len(),
                    "no more history upstream"
                );
                break;
            }

            // Next page ends strictly before the oldest bucket we have seen.
            let oldest = batch.iter().map(|c| c.timestamp).min().unwrap_or(0);
            before_ts = Some(oldest - 1);

            collected = merge_series(collected, batch);

            if collected.len() >= total_points {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        info!(
            symbol,
            timeframe = %timeframe,
            points = collected.len(),
            target = total_points,
            "deep fetch complete"
        );
        collected
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    const DAY_MS: i64 = 86_400_000;
    const NEWEST: i64 = 1_700_000_000_000;

    /// Scripted source: pops pre-built pages in order and records every call.
    struct ScriptedSource {
        pages: Mutex<VecDeque<Result<Vec<Candle>>>>,
        calls: Mutex<Vec<(usize, Option<i64>)>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Vec<Candle>>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(usize, Option<i64>)> {
            self.calls.lock().clone()
        }
    }

    impl KlineSource for ScriptedSource {
        async fn fetch_klines(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            limit: usize,
            end_time: Option<i64>,
        ) -> Result<Vec<Candle>> {
            self.calls.lock().push((limit, end_time));
            self.pages
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Ascending daily page of `n` candles whose newest bucket is `newest`.
    fn page(newest: i64, n: usize) -> Vec<Candle> {
        (0..n)
            .rev()
            .map(|k| {
                let ts = newest - k as i64 * DAY_MS;
                Candle {
                    symbol: "BTC".into(),
                    timestamp: ts,
                    open: 1.0,
                    high: 2.0,
                    low: 0.5,
                    close: 1.5,
                    volume: 10.0,
                }
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn deep_fetch_tiles_backward_until_the_target() {
        let oldest_p1 = NEWEST - 999 * DAY_MS;
        let oldest_p2 = oldest_p1 - 1000 * DAY_MS;
        let source = ScriptedSource::new(vec![
            Ok(page(NEWEST, 1000)),
            Ok(page(oldest_p1 - DAY_MS, 1000)),
            Ok(page(oldest_p2 - DAY_MS, 500)),
        ]);

        let fetcher = Fetcher::new(source, 1000, Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        let series = fetcher.fetch_deep("BTC", Timeframe::Day1, 2500).await;

        assert_eq!(series.len(), 2500);
        // Strictly ascending, no duplicates, spanning oldest to newest.
        for pair in series.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        assert_eq!(series.last().map(|c| c.timestamp), Some(NEWEST));
        assert_eq!(
            series.first().map(|c| c.timestamp),
            Some(NEWEST - 2499 * DAY_MS)
        );

        // First call unanchored, later calls anchored just before the oldest
        // bucket of the previous page.
        let calls = fetcher.source.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], (1000, None));
        assert_eq!(calls[1], (1000, Some(oldest_p1 - 1)));
        assert_eq!(calls[2], (500, Some(oldest_p2 - 1)));

        // Two inter-page delays; none after the final batch.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn deep_fetch_stops_when_history_is_exhausted() {
        let source = ScriptedSource::new(vec![Ok(page(NEWEST, 600)), Ok(Vec::new())]);
        let fetcher = Fetcher::new(source, 1000, Duration::from_secs(1));

        let series = fetcher.fetch_deep("BTC", Timeframe::Day1, 2000).await;
        assert_eq!(series.len(), 600);
        assert_eq!(fetcher.source.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deep_fetch_keeps_accumulated_data_on_failure() {
        let source = ScriptedSource::new(vec![
            Ok(page(NEWEST, 1000)),
            Err(anyhow::anyhow!("connection reset")),
        ]);
        let fetcher = Fetcher::new(source, 1000, Duration::from_secs(1));

        let series = fetcher.fetch_deep("BTC", Timeframe::Day1, 2500).await;
        assert_eq!(series.len(), 1000);
    }

    #[tokio::test]
    async fn fetch_batch_caps_the_request_at_the_page_size() {
        let source = ScriptedSource::new(vec![Ok(page(NEWEST, 1000))]);
        let fetcher = Fetcher::new(source, 1000, Duration::ZERO);

        fetcher
            .fetch_batch("BTC", Timeframe::Hour1, 5000, None)
            .await
            .unwrap();
        assert_eq!(fetcher.source.calls(), vec![(1000, None)]);
    }

    #[tokio::test]
    async fn page_seam_overlap_does_not_duplicate_buckets() {
        // Second page repeats the first page's oldest bucket.
        let oldest_p1 = NEWEST - 4 * DAY_MS;
        let source = ScriptedSource::new(vec![
            Ok(page(NEWEST, 5)),
            Ok(page(oldest_p1, 5)),
            Ok(Vec::new()),
        ]);
        let fetcher = Fetcher::new(source, 1000, Duration::ZERO);

        let series = fetcher.fetch_deep("BTC", Timeframe::Day1, 20).await;
        assert_eq!(series.len(), 9);
        for pair in series.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
    }
}
