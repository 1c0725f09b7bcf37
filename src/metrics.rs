//! Prometheus-compatible metrics endpoint
//!
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::state::GameState;

const TICK_HISTORY_LEN: usize = 1000;

/// Metrics registry for the game server
#[derive(Debug)]
pub struct Metrics {
    // World gauges
    pub players_total: AtomicU64,
    pub players_alive: AtomicU64,
    pub projectile_count: AtomicU64,
    pub pickup_count: AtomicU64,
    pub obstacle_count: AtomicU64,
    pub arena_extent: AtomicU64,

    // Tick timing (microseconds)
    pub tick_count: AtomicU64,
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub joins_rejected: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            players_total: AtomicU64::new(0),
            players_alive: AtomicU64::new(0),
            projectile_count: AtomicU64::new(0),
            pickup_count: AtomicU64::new(0),
            obstacle_count: AtomicU64::new(0),
            arena_extent: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            joins_rejected: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY_LEN)),
        }
    }

    /// Record a tick time and refresh percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let pick = |q: f32| sorted[((sorted.len() as f32 * q) as usize).min(sorted.len() - 1)];

            self.tick_time_p95_us.store(pick(0.95), Ordering::Relaxed);
            self.tick_time_p99_us.store(pick(0.99), Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Copy entity counts out of the world
    pub fn record_world(&self, state: &GameState) {
        self.players_total.store(state.player_count() as u64, Ordering::Relaxed);
        self.players_alive.store(state.alive_players().count() as u64, Ordering::Relaxed);
        self.projectile_count.store(state.projectiles.len() as u64, Ordering::Relaxed);
        self.pickup_count.store(state.pickups.len() as u64, Ordering::Relaxed);
        self.obstacle_count.store(state.obstacles.len() as u64, Ordering::Relaxed);
        self.arena_extent.store(state.arena.extent() as u64, Ordering::Relaxed);
    }

    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("arena_tanks_players_total", "Players in the arena", "gauge",
            self.players_total.load(Ordering::Relaxed));
        metric!("arena_tanks_players_alive", "Players currently alive", "gauge",
            self.players_alive.load(Ordering::Relaxed));
        metric!("arena_tanks_projectiles", "Shells in flight", "gauge",
            self.projectile_count.load(Ordering::Relaxed));
        metric!("arena_tanks_pickups", "Pick-ups on the ground", "gauge",
            self.pickup_count.load(Ordering::Relaxed));
        metric!("arena_tanks_obstacles", "Standing obstacles", "gauge",
            self.obstacle_count.load(Ordering::Relaxed));
        metric!("arena_tanks_arena_extent", "Published arena side length", "gauge",
            self.arena_extent.load(Ordering::Relaxed));

        metric!("arena_tanks_tick_time_microseconds", "Last tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("arena_tanks_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("arena_tanks_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("arena_tanks_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("arena_tanks_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("arena_tanks_connections_active", "Open WebTransport sessions", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("arena_tanks_messages_sent_total", "Messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("arena_tanks_messages_received_total", "Messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("arena_tanks_bytes_sent_total", "Bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("arena_tanks_bytes_received_total", "Bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("arena_tanks_joins_rejected_total", "Joins refused because the arena was full", "counter",
            self.joins_rejected.load(Ordering::Relaxed));
        metric!("arena_tanks_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view for direct API access
    pub fn to_json(&self) -> String {
        let value = serde_json::json!({
            "world": {
                "players": self.players_total.load(Ordering::Relaxed),
                "alive": self.players_alive.load(Ordering::Relaxed),
                "projectiles": self.projectile_count.load(Ordering::Relaxed),
                "pickups": self.pickup_count.load(Ordering::Relaxed),
                "obstacles": self.obstacle_count.load(Ordering::Relaxed),
                "arena_extent": self.arena_extent.load(Ordering::Relaxed),
            },
            "performance": {
                "tick_count": self.tick_count.load(Ordering::Relaxed),
                "tick_time_us": self.tick_time_us.load(Ordering::Relaxed),
                "tick_time_p95_us": self.tick_time_p95_us.load(Ordering::Relaxed),
                "tick_time_p99_us": self.tick_time_p99_us.load(Ordering::Relaxed),
                "tick_time_max_us": self.tick_time_max_us.load(Ordering::Relaxed),
            },
            "network": {
                "connections": self.connections_active.load(Ordering::Relaxed),
                "messages_sent": self.messages_sent.load(Ordering::Relaxed),
                "messages_received": self.messages_received.load(Ordering::Relaxed),
                "bytes_sent": self.bytes_sent.load(Ordering::Relaxed),
                "bytes_received": self.bytes_received.load(Ordering::Relaxed),
                "joins_rejected": self.joins_rejected.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    /// Short plain-text summary
    pub fn to_stats(&self) -> String {
        format!(
            "players: {} ({} alive)\nprojectiles: {}\npickups: {}\nobstacles: {}\narena: {}\ntick: {} (last {} us, p99 {} us)\nconnections: {}\nuptime: {} s\n",
            self.players_total.load(Ordering::Relaxed),
            self.players_alive.load(Ordering::Relaxed),
            self.projectile_count.load(Ordering::Relaxed),
            self.pickup_count.load(Ordering::Relaxed),
            self.obstacle_count.load(Ordering::Relaxed),
            self.arena_extent.load(Ordering::Relaxed),
            self.tick_count.load(Ordering::Relaxed),
            self.tick_time_us.load(Ordering::Relaxed),
            self.tick_time_p99_us.load(Ordering::Relaxed),
            self.connections_active.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }

    /// Pick the response for an HTTP request line
    fn route(&self, request: &str) -> (&'static str, &'static str, String) {
        let path = request
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("GET "))
            .and_then(|rest| rest.split_whitespace().next());

        match path {
            Some("/metrics") => ("200 OK", "text/plain; version=0.0.4", self.to_prometheus()),
            Some("/json") | Some("/metrics/json") => ("200 OK", "application/json", self.to_json()),
            Some("/stats") => ("200 OK", "text/plain", self.to_stats()),
            Some("/health") | Some("/") => ("200 OK", "text/plain", "OK".to_string()),
            _ => ("404 Not Found", "text/plain", String::new()),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let (status, content_type, body) = metrics.route(&request);
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        content_type,
                        body.len(),
                        body
                    );
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => debug!("Failed to read from metrics socket {}: {}", peer, e),
            }
        });
    }
}
