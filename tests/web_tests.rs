//! Web responder tests over real loopback sockets

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use geiger_counter::web::RequestEnd;
use geiger_counter::{
    HealthState, ManualClock, Monitor, PulseCounter, ReportDispatcher, SamplingWindow,
    SchedulingPolicy, WebResponder,
};

/// Connect, send `request`, read until the server closes.
fn fetch(addr: SocketAddr, request: &'static [u8]) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(request).unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    })
}

#[test]
fn test_blocking_accept_serves_fresh_sample() {
    let counter = PulseCounter::new();
    let health = HealthState::new();
    let window = SamplingWindow::per_minute(10_000).unwrap();

    let web = WebResponder::bind("127.0.0.1:0", SchedulingPolicy::WebBlocksSampling).unwrap();
    let addr = web.local_addr().unwrap();
    let mut monitor =
        Monitor::new(ManualClock::starting_at(0), &counter, window, ReportDispatcher::new(&health)).with_web(web);

    for _ in 0..12 {
        counter.on_pulse_edge();
    }
    monitor.clock().set(10_001);

    let client = fetch(addr, b"\r\n");
    // Blocks until the client connects, then samples, then answers
    let outcome = monitor.step();

    assert_eq!(outcome.sample.unwrap().cpm, 72.0);
    assert_eq!(outcome.served, Some(RequestEnd::BlankLine));

    let body = client.join().unwrap();
    assert!(body.contains("<td>CPM</td><td>72</td>"), "body: {}", body);
    assert!(!body.starts_with("HTTP/"), "no status line is sent");
    assert_eq!(monitor.web().unwrap().served(), 1);
}

#[test]
fn test_zero_before_first_window() {
    let counter = PulseCounter::new();
    let health = HealthState::new();
    let window = SamplingWindow::per_minute(10_000).unwrap();

    let web = WebResponder::bind("127.0.0.1:0", SchedulingPolicy::WebBlocksSampling).unwrap();
    let addr = web.local_addr().unwrap();
    let mut monitor =
        Monitor::new(ManualClock::starting_at(0), &counter, window, ReportDispatcher::new(&health)).with_web(web);

    counter.on_pulse_edge();
    let client = fetch(addr, b"GET / HTTP/1.1\r\nHost: geiger.local\r\nAccept: */*\r\n\r\n");
    let outcome = monitor.step();

    assert!(outcome.sample.is_none());
    assert!(client.join().unwrap().contains("<td>CPM</td><td>0</td>"));
    // The pulse stays in the open window
    assert_eq!(counter.pending(), 1);
}

#[test]
fn test_client_closing_early_still_gets_page() {
    let counter = PulseCounter::new();
    let health = HealthState::new();
    let window = SamplingWindow::per_minute(10_000).unwrap();

    let web = WebResponder::bind("127.0.0.1:0", SchedulingPolicy::WebBlocksSampling).unwrap();
    let addr = web.local_addr().unwrap();
    let mut monitor =
        Monitor::new(ManualClock::starting_at(0), &counter, window, ReportDispatcher::new(&health)).with_web(web);

    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"GET / HTTP/1.1\r\nHost: x").unwrap();
        // Half-close: no blank line will ever come
        stream.shutdown(std::net::Shutdown::Write).unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    });

    let outcome = monitor.step();
    assert_eq!(outcome.served, Some(RequestEnd::Closed));
    assert!(client.join().unwrap().contains("<td>CPM</td><td>0</td>"));
}

#[test]
fn test_non_blocking_accept_keeps_sampling() {
    let counter = PulseCounter::new();
    let health = HealthState::new();
    let window = SamplingWindow::per_minute(10_000).unwrap();

    let web = WebResponder::bind("127.0.0.1:0", SchedulingPolicy::NonBlockingAccept).unwrap();
    let addr = web.local_addr().unwrap();
    let mut monitor =
        Monitor::new(ManualClock::starting_at(0), &counter, window, ReportDispatcher::new(&health)).with_web(web);

    // Nobody connected: the window still closes
    counter.on_pulse_edge();
    monitor.clock().set(10_001);
    let outcome = monitor.step();
    assert_eq!(outcome.sample.unwrap().cpm, 6.0);
    assert!(outcome.served.is_none());

    let client = fetch(addr, b"\n");

    // Poll until the connection shows up in the backlog
    let mut served = None;
    for _ in 0..200 {
        served = monitor.step().served;
        if served.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert_eq!(served, Some(RequestEnd::BlankLine));
    assert!(client.join().unwrap().contains("<td>CPM</td><td>6</td>"));
}
