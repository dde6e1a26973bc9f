use std::net::SocketAddr;

use once_cell::sync::{Lazy, OnceCell};
use prometheus::{Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use warp::Filter;

use crate::pinger::Status;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// Only registered when latency history is enabled
static LATENCY_HIST: OnceCell<HistogramVec> = OnceCell::new();

static LATENCY_GAUGE: Lazy<GaugeVec> = Lazy::new(|| {
    let opts = Opts::new(
        "server_ping_latency_milliseconds_current",
        "Current server list ping round trip in milliseconds",
    );
    let gauge = GaugeVec::new(opts, &["server"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static PLAYERS_ONLINE: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("server_players_online", "Players online as reported by the server");
    let gauge = IntGaugeVec::new(opts, &["server"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static PLAYERS_MAX: Lazy<IntGaugeVec> = Lazy::new(|| {
    let opts = Opts::new("server_players_max", "Player slots as reported by the server");
    let gauge = IntGaugeVec::new(opts, &["server"]).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("server_ping_failures_total", "Total number of failed pings");
    let ctr = IntCounterVec::new(opts, &["server", "reason"]).unwrap();
    REGISTRY.register(Box::new(ctr.clone())).unwrap();
    ctr
});

pub fn initialize_metrics(enable_latency_history: bool) {
    if !enable_latency_history {
        return;
    }

    LATENCY_HIST.get_or_init(|| {
        let opts = Opts::new("server_ping_latency_milliseconds", "Server list ping round trip in milliseconds");
        let hist = HistogramVec::new(
            HistogramOpts {
                common_opts: opts,
                buckets: vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0],
            },
            &["server"],
        )
        .expect("creating histogram");
        REGISTRY.register(Box::new(hist.clone())).unwrap();
        hist
    });
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || {
        let (body, content_type) = render();
        warp::http::Response::builder()
            .header("Content-Type", content_type)
            .body(body)
            .unwrap()
    });

    warp::serve(metrics_route).run(addr).await;
}

fn render() -> (Vec<u8>, String) {
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&mf, &mut buf) {
        tracing::error!("Failed to encode metrics: {:?}", e);
    }
    (buf, encoder.format_type().to_string())
}

pub fn observe_status(server: &str, status: &Status) {
    let latency_ms = status.latency.as_secs_f64() * 1000.0;
    LATENCY_GAUGE.with_label_values(&[server]).set(latency_ms);
    if let Some(hist) = LATENCY_HIST.get() {
        hist.with_label_values(&[server]).observe(latency_ms);
    }

    let players = &status.response.players;
    PLAYERS_ONLINE.with_label_values(&[server]).set(players.online.unwrap_or(-1));
    PLAYERS_MAX.with_label_values(&[server]).set(players.max.unwrap_or(-1));
}

pub fn inc_failure(server: &str, reason: &str) {
    FAILURE_COUNTER.with_label_values(&[server, reason]).inc();
}
