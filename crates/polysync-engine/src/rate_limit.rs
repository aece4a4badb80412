use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use polysync_protocol::ClientId;

#[derive(Clone, Copy, Debug)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Fixed one-second window per client.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    clients: HashMap<ClientId, Window>,
}

impl RateLimiter {
    pub fn per_second(max_per_window: u32) -> Self {
        Self {
            max_per_window,
            window: Duration::seconds(1),
            clients: HashMap::new(),
        }
    }

    /// Counts one submission and returns whether it is within budget.
    pub fn check(&mut self, client: &ClientId, now: DateTime<Utc>) -> bool {
        if !self.clients.contains_key(client) {
            self.prune(now);
        }
        let window = self.clients.entry(client.clone()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        // Reset if expired, or if the clock went backwards.
        if now - window.started_at >= self.window || now < window.started_at {
            window.started_at = now;
            window.count = 0;
        }

        window.count = window.count.saturating_add(1);
        window.count <= self.max_per_window
    }

    pub fn count(&self, client: &ClientId) -> u32 {
        self.clients.get(client).map_or(0, |w| w.count)
    }

    /// Clients with a live window.
    pub fn tracked(&self) -> usize {
        self.clients.len()
    }

    /// Drops windows that have expired by `now`.
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window;
        self.clients
            .retain(|_, w| now >= w.started_at && now - w.started_at < window);
    }
}
