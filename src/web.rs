//! Single-client HTTP responder.
//!
//! # Protocol
//!
//! ```text
//! accept ─▶ read lines until "" / "\r\n" / EOF ─▶ write page ─▶ close
//! ```
//!
//! The request line is never parsed: any request gets the page. There is
//! no status line and no headers. One connection is served at a time.
//!
//! # Scheduling
//!
//! With [`SchedulingPolicy::WebBlocksSampling`] accept blocks the loop
//! until a client shows up, so no window can close while waiting (and
//! none while a request is being read, under either policy). Accept has
//! no timeout.

use std::io::{self, BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::estimator::RateSample;

/// How the web responder shares the loop with sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulingPolicy {
    /// Accept blocks the loop thread until a client connects.
    #[default]
    WebBlocksSampling,
    /// Accept returns immediately when no client is waiting.
    NonBlockingAccept,
}

/// How the request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEnd {
    /// Blank line seen.
    BlankLine,
    /// Peer closed (or the read failed) before a blank line.
    Closed,
}

/// Render the status page.
pub fn render_page(cpm: i64) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Geiger Counter</title></head>\n\
         <body><h1>Geiger Counter</h1>\n\
         <table border=\"1\"><tr><th>Counter</th><th>Value</th></tr>\n\
         <tr><td>CPM</td><td>{}</td></tr></table></body></html>\n",
        cpm
    )
}

/// Discard request lines up to the first empty one.
///
/// Never buffers a whole line, so an endless header cannot exhaust memory.
/// Read errors end the request like EOF does.
pub fn read_request<R: BufRead>(reader: &mut R) -> RequestEnd {
    // Bytes in the current line, and whether that is a lone '\r'
    let mut line_len = 0usize;
    let mut lone_cr = false;

    loop {
        let (used, blank) = {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::debug!("request read failed: {}", e);
                    return RequestEnd::Closed;
                }
            };
            if buf.is_empty() {
                return RequestEnd::Closed;
            }

            let mut used = 0;
            let mut blank = false;
            for &byte in buf {
                used += 1;
                if byte == b'\n' {
                    if line_len == 0 || lone_cr {
                        blank = true;
                        break;
                    }
                    line_len = 0;
                    lone_cr = false;
                } else {
                    lone_cr = line_len == 0 && byte == b'\r';
                    line_len += 1;
                }
            }
            (used, blank)
        };

        reader.consume(used);
        if blank {
            return RequestEnd::BlankLine;
        }
    }
}

/// Read one request from `stream` and answer with the page for `cpm`.
pub fn serve_connection<S: Read + Write>(stream: &mut S, cpm: i64) -> io::Result<RequestEnd> {
    let end = {
        let mut reader = BufReader::new(&mut *stream);
        read_request(&mut reader)
    };
    if end == RequestEnd::Closed {
        log::debug!("request ended without blank line, answering anyway");
    }

    stream.write_all(render_page(cpm).as_bytes())?;
    stream.flush()?;
    Ok(end)
}

/// Listening socket plus the serve loop step.
pub struct WebResponder {
    listener: TcpListener,
    policy: SchedulingPolicy,
    served: u32,
}

impl WebResponder {
    /// Bind once at startup.
    pub fn bind<A: ToSocketAddrs>(addr: A, policy: SchedulingPolicy) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        if policy == SchedulingPolicy::NonBlockingAccept {
            listener.set_nonblocking(true)?;
        }
        log::info!("web responder listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            policy,
            served: 0,
        })
    }

    /// Wait for (or poll for) the next client.
    ///
    /// Returns `Ok(None)` only under the non-blocking policy when nobody
    /// is waiting.
    pub fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                // Per-request reads block under both policies
                stream.set_nonblocking(false)?;
                log::info!("Got a connection from {}", addr);
                Ok(Some((stream, addr)))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Answer `stream` with the latest sample (0 CPM before the first
    /// window closes) and close it.
    pub fn respond(&mut self, mut stream: TcpStream, latest: Option<RateSample>) -> io::Result<RequestEnd> {
        let cpm = latest.map(|s| s.whole_cpm()).unwrap_or(0);
        let result = serve_connection(&mut stream, cpm);
        let _ = stream.shutdown(Shutdown::Both);
        if result.is_ok() {
            self.served += 1;
        }
        result
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Requests answered since boot.
    pub fn served(&self) -> u32 {
        self.served
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex stream.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(request: &[u8]) -> Self {
            Self {
                input: Cursor::new(request.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_immediate_blank_line() {
        let mut stream = Duplex::new(b"\r\n");
        let end = serve_connection(&mut stream, 72).unwrap();

        assert_eq!(end, RequestEnd::BlankLine);
        let body = String::from_utf8(stream.output).unwrap();
        assert!(body.contains("<td>CPM</td><td>72</td>"));
        assert!(body.starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn test_headers_are_discarded() {
        let mut reader = Cursor::new(b"GET / HTTP/1.1\r\nHost: geiger\r\n\r\nleftover".to_vec());
        assert_eq!(read_request(&mut reader), RequestEnd::BlankLine);

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "leftover");
    }

    #[test]
    fn test_bare_lf_terminator() {
        let mut reader = Cursor::new(b"GET / HTTP/1.0\n\n".to_vec());
        assert_eq!(read_request(&mut reader), RequestEnd::BlankLine);
    }

    #[test]
    fn test_malformed_request_still_answered() {
        let mut stream = Duplex::new(b"garbage without any line end");
        let end = serve_connection(&mut stream, 0).unwrap();

        assert_eq!(end, RequestEnd::Closed);
        let body = String::from_utf8(stream.output).unwrap();
        assert!(body.contains("<td>CPM</td><td>0</td>"));
    }

    #[test]
    fn test_cr_inside_line_is_not_blank() {
        let mut reader = Cursor::new(b"\rX\r\n".to_vec());
        assert_eq!(read_request(&mut reader), RequestEnd::Closed);
    }

    #[test]
    fn test_page_layout() {
        let page = render_page(6);
        assert!(page.contains("<title>Geiger Counter</title>"));
        assert!(page.contains("<h1>Geiger Counter</h1>"));
        assert!(page.contains("<tr><th>Counter</th><th>Value</th></tr>"));
        assert!(page.contains("<tr><td>CPM</td><td>6</td></tr></table>"));
    }
}
