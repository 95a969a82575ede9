//! A tiny HTTP server that instruments itself with `vitals` and pushes its
//! metrics out over UDP with `vitals-dogstatsd`.
//!
//! Illustrative only, not part of the library's contract: build an
//! exporter, instrument a loop, let it run.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

use vitals::label::{LabelSchema, LabelType, LabelValue};
use vitals::metric::labels;
use vitals::{default_registry, Metric, PeriodicTask};
use vitals_dogstatsd::DogStatsDPushBuilder;

const ADDR: &str = "127.0.0.1:8080";

fn main() {
    tracing_subscriber::fmt::init();

    let registry = default_registry();

    let uptime = Metric::gauge(0.0);
    registry.register(uptime.clone(), "uptime_seconds", false).expect("uptime_seconds name is valid");

    let schema = LabelSchema::new([
        ("route".to_owned(), LabelType::String),
        ("status".to_owned(), LabelType::Int64),
    ]);
    let requests = Metric::grouped_counter(schema);
    registry.register(requests.clone(), "http_requests_total", false).expect("http_requests_total name is valid");

    let uptime_ticker = uptime.clone();
    let uptime_task = PeriodicTask::spawn("uptime-ticker", Duration::from_secs(1), move || {
        uptime_ticker.gauge_cell(&vitals::LabelSet::empty()).inc(1.0);
    });

    let exporter = DogStatsDPushBuilder::new().build().expect("default DogStatsD backend is available");
    exporter.start();

    let listener = TcpListener::bind(ADDR).unwrap_or_else(|err| panic!("failed to bind {ADDR}: {err}"));
    tracing::info!(addr = ADDR, "uptime-server listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => handle_connection(stream, &requests),
            Err(err) => tracing::warn!(error = %err, "failed to accept connection"),
        }
    }

    // Unreached under normal operation (the accept loop above runs forever),
    // but kept so the demo shows the expected shutdown sequence.
    exporter.stop();
    uptime_task.stop().expect("uptime ticker thread panicked");
}

fn handle_connection(mut stream: TcpStream, requests: &Metric) {
    let mut reader = BufReader::new(stream.try_clone().expect("TCP stream clone failed"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");

    let (status, content_type, body) = if path == "/metrics" {
        (200, "text/plain; version=0.0.4", vitals::text::render(&default_registry()))
    } else {
        (404, "text/plain", "not found\n".to_owned())
    };

    requests
        .counter_cell(&labels([("route", LabelValue::from(path)), ("status", LabelValue::from(status as i64))]))
        .inc(1.0);

    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n{body}",
        reason = if status == 200 { "OK" } else { "Not Found" },
        len = body.len(),
    );
    if let Err(err) = stream.write_all(response.as_bytes()) {
        tracing::warn!(error = %err, "failed to write HTTP response");
    }
}
