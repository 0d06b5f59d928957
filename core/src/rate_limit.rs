/*
    spotify-features-rs | Rust CLI tool to export track metadata and audio features.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Paces outgoing requests. Called once before every gated request.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn wait(&self);
}

/// Enforces a minimum interval between successive requests.
/// The first request passes straight through.
pub struct MinIntervalGate {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl MinIntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

#[async_trait]
impl RateGate for MinIntervalGate {
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_wait_is_immediate() {
        let gate = MinIntervalGate::new(Duration::from_millis(500));
        let start = Instant::now();
        gate.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successive_waits_are_spaced() {
        let gate = MinIntervalGate::new(Duration::from_millis(500));
        let start = Instant::now();

        gate.wait().await;
        gate.wait().await;
        gate.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_when_interval_already_passed() {
        let gate = MinIntervalGate::new(Duration::from_millis(200));
        gate.wait().await;
        tokio::time::advance(Duration::from_millis(300)).await;

        let before = Instant::now();
        gate.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_sleeps() {
        let gate = MinIntervalGate::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            gate.wait().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(gate.min_interval(), Duration::ZERO);
    }
}
