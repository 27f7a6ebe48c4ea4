//! Telnet control-stream codec.
//!
//! [`TelnetReader`] and [`TelnetWriter`] sit between a raw socket half and the
//! session logic, so that upper layers only ever see application bytes:
//!
//! - option negotiation (`IAC WILL/WONT/DO/DONT <opt>`) is swallowed without reply
//! - subnegotiation blocks (`IAC SB ... IAC SE`) are swallowed
//! - a literal `0xFF` travels as `IAC IAC` on the wire in both directions
//!
//! The decoder is lenient: an `IAC` followed by a byte it does not understand
//! stops the current read instead of failing the stream.

use log::trace;
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ErrorKind,
};

/// Interpret As Command.
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
/// Subnegotiation begin.
pub const SB: u8 = 250;
/// Subnegotiation end.
pub const SE: u8 = 240;

pub const OPT_ECHO: u8 = 1;
pub const OPT_TTYPE: u8 = 24;
pub const OPT_TSPEED: u8 = 32;
pub const OPT_XDISPLOC: u8 = 35;
pub const OPT_NEW_ENVIRON: u8 = 39;

/// Options requested when a Telnet session opens.
pub const DEFAULT_NEGOTIATION_OPTIONS: [u8; 4] =
    [OPT_TTYPE, OPT_TSPEED, OPT_XDISPLOC, OPT_NEW_ENVIRON];

/// Builds `IAC <verb> <opt>` for every option, in order.
pub fn negotiation_preamble(verb: u8, options: &[u8]) -> Vec<u8> {
    options.iter().flat_map(|&opt| [IAC, verb, opt]).collect()
}

/// Decoding half of the codec.
///
/// Reads go through an internal [`BufReader`] which provides the one byte of
/// lookahead needed to classify the byte following an `IAC`.
pub struct TelnetReader<R> {
    buffered: BufReader<R>,
}

impl<R: AsyncRead + Unpin> TelnetReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            buffered: BufReader::new(inner),
        }
    }

    /// Fills `buf` with decoded application bytes.
    ///
    /// Keeps reading until `buf` is full or the stream ends; swallowed control
    /// sequences never cause a short fill on their own.
    ///
    /// Returns
    /// - `Ok(n)` with `n > 0`: `n` application bytes were written to `buf`.
    /// - `Ok(0)`: end of stream (including a stream that ends inside a control
    ///   sequence).
    ///
    /// Errors
    /// - Any error from the underlying reader, unchanged.
    /// - [`ErrorKind::Interrupted`] when an unknown `IAC <byte>` stopped this call
    ///   before any byte was produced. The byte after `IAC` is left in the
    ///   stream and the next call picks up from there.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;

        while n < buf.len() {
            let byte = match self.next_byte().await? {
                Some(b) => b,
                None => return Ok(n),
            };

            if byte != IAC {
                buf[n] = byte;
                n += 1;
                continue;
            }

            let command = match self.peek_byte().await? {
                Some(c) => c,
                None => return Ok(n),
            };

            match command {
                WILL | WONT | DO | DONT => {
                    if !self.discard(2).await? {
                        return Ok(n);
                    }
                }
                IAC => {
                    self.buffered.consume(1);
                    buf[n] = IAC;
                    n += 1;
                }
                SB => {
                    self.buffered.consume(1);
                    if !self.skip_subnegotiation().await? {
                        return Ok(n);
                    }
                }
                SE => {
                    self.buffered.consume(1);
                }
                other => {
                    trace!("unexpected telnet command byte {:#04x} after IAC", other);
                    if n > 0 {
                        return Ok(n);
                    }
                    return Err(io::Error::new(
                        ErrorKind::Interrupted,
                        "malformed telnet command",
                    ));
                }
            }
        }

        Ok(n)
    }

    async fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = match self.buffered.fill_buf().await?.first() {
            Some(&b) => b,
            None => return Ok(None),
        };
        self.buffered.consume(1);
        Ok(Some(byte))
    }

    async fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.buffered.fill_buf().await?.first().copied())
    }

    /// Returns `false` if the stream ended before `count` bytes were skipped.
    async fn discard(&mut self, count: usize) -> io::Result<bool> {
        for _ in 0..count {
            if self.next_byte().await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Skips to just past the next `IAC SE`. An `IAC IAC` inside the block is
    /// an escaped data byte and never starts the terminator.
    async fn skip_subnegotiation(&mut self) -> io::Result<bool> {
        loop {
            match self.next_byte().await? {
                None => return Ok(false),
                Some(IAC) => {}
                Some(_) => continue,
            }

            match self.peek_byte().await? {
                None => return Ok(false),
                Some(IAC) => self.buffered.consume(1),
                Some(SE) => {
                    self.buffered.consume(1);
                    return Ok(true);
                }
                Some(_) => {}
            }
        }
    }
}

/// Encoding half of the codec.
pub struct TelnetWriter<W> {
    inner: W,
    /// Sink error hit after some bytes of a call were already accepted.
    pending_error: Option<io::Error>,
}

impl<W: AsyncWrite + Unpin> TelnetWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending_error: None,
        }
    }

    /// Writes application bytes, doubling every `0xFF`.
    ///
    /// Runs of ordinary bytes go out in one piece; partial writes of the
    /// underlying sink are retried until everything is accepted. Returns the
    /// number of application bytes accepted, which is `data.len()` on success.
    ///
    /// Like [`std::io::Write::write`], a sink error after some bytes went out
    /// is held back: this call reports the bytes accepted so far and the next
    /// call returns the error.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }

        let mut accepted = 0;
        match self.write_escaped(data, &mut accepted).await {
            Ok(()) => Ok(accepted),
            Err(e) if accepted > 0 => {
                trace!("sink failed after {} bytes: {}", accepted, e);
                self.pending_error = Some(e);
                Ok(accepted)
            }
            Err(e) => Err(e),
        }
    }

    async fn write_escaped(&mut self, data: &[u8], accepted: &mut usize) -> io::Result<()> {
        for run in data.split_inclusive(|&b| b == IAC) {
            let (plain, escaped) = match run.split_last() {
                Some((&IAC, plain)) => (plain, true),
                _ => (run, false),
            };

            let mut rest = plain;
            while !rest.is_empty() {
                let n = self.inner.write(rest).await?;
                if n == 0 {
                    return Err(io::Error::new(ErrorKind::WriteZero, "sink accepted no bytes"));
                }
                rest = &rest[n..];
                *accepted += n;
            }
            if escaped {
                self.inner.write_all(&[IAC, IAC]).await?;
                *accepted += 1;
            }
        }

        self.inner.flush().await
    }

    /// Writes raw control bytes without escaping.
    pub async fn send_command(&mut self, raw: &[u8]) -> io::Result<()> {
        self.inner.write_all(raw).await?;
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio_test::io::Builder;

    /// Accepts a single byte per write call.
    struct OneByteSink {
        written: Vec<u8>,
        calls: usize,
    }

    impl AsyncWrite for OneByteSink {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.calls += 1;
            match buf.first() {
                Some(&b) => {
                    self.written.push(b);
                    Poll::Ready(Ok(1))
                }
                None => Poll::Ready(Ok(0)),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn decode_all(raw: &[u8]) -> Vec<u8> {
        let mut reader = TelnetReader::new(raw);
        let mut out = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        out
    }

    #[tokio::test]
    async fn negotiation_is_swallowed_without_short_fill() {
        let raw = [b'a', IAC, WILL, 1, b'b', IAC, DO, OPT_TTYPE, b'c', b'd'];
        let mut reader = TelnetReader::new(&raw[..]);
        let mut buf = [0u8; 3];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf, b"abc");

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"d");
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wont_and_dont_are_swallowed() {
        let raw = [IAC, WONT, 3, b'x', IAC, DONT, 5];
        assert_eq!(decode_all(&raw).await, b"x");
    }

    #[tokio::test]
    async fn escaped_iac_is_literal() {
        let raw = [b'a', IAC, IAC, b'b', IAC, IAC];
        assert_eq!(decode_all(&raw).await, vec![b'a', 0xFF, b'b', 0xFF]);
    }

    #[tokio::test]
    async fn subnegotiation_with_embedded_escape_is_swallowed() {
        // The SE right after the embedded IAC IAC is data, not the terminator.
        let raw = [
            b'x', IAC, SB, OPT_TTYPE, 0, IAC, IAC, SE, b'q', IAC, SE, b'y',
        ];
        assert_eq!(decode_all(&raw).await, b"xy");
    }

    #[tokio::test]
    async fn stray_se_is_dropped() {
        let raw = [b'o', IAC, SE, b'k'];
        assert_eq!(decode_all(&raw).await, b"ok");
    }

    #[tokio::test]
    async fn unknown_command_stops_the_call_without_losing_data() {
        let raw = [b'a', IAC, 7, b'b'];
        let mut reader = TelnetReader::new(&raw[..]);
        let mut buf = [0u8; 4];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"a");

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[7, b'b']);
    }

    #[tokio::test]
    async fn unknown_command_first_reports_interrupted() {
        let raw = [IAC, b'z', b'k'];
        let mut reader = TelnetReader::new(&raw[..]);
        let mut buf = [0u8; 2];

        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"zk");
    }

    #[tokio::test]
    async fn stream_ending_mid_sequence_is_end_of_stream() {
        let raw = [b'a', IAC, DO];
        let mut reader = TelnetReader::new(&raw[..]);
        let mut buf = [0u8; 4];

        assert_eq!(reader.read(&mut buf).await.unwrap(), 1);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);

        let mut reader = TelnetReader::new(&[IAC, SB, 1, 2][..]);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn underlying_error_is_surfaced() {
        let mock = Builder::new()
            .read(b"ab")
            .read_error(io::Error::new(ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = TelnetReader::new(mock);
        let mut buf = [0u8; 4];

        let err = reader.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }

    #[tokio::test]
    async fn writer_doubles_iac() {
        let mut writer = TelnetWriter::new(Vec::new());
        let n = writer.write(&[b'a', 0xFF, b'b', 0xFF, 0xFF]).await.unwrap();

        assert_eq!(n, 5);
        assert_eq!(
            writer.inner,
            vec![b'a', IAC, IAC, b'b', IAC, IAC, IAC, IAC]
        );
    }

    #[tokio::test]
    async fn writer_handles_empty_input() {
        let mut writer = TelnetWriter::new(Vec::new());
        assert_eq!(writer.write(&[]).await.unwrap(), 0);
        assert!(writer.inner.is_empty());
    }

    #[tokio::test]
    async fn writer_retries_partial_writes() {
        let mut writer = TelnetWriter::new(OneByteSink {
            written: Vec::new(),
            calls: 0,
        });
        let n = writer.write(b"hi\xFFthere").await.unwrap();

        assert_eq!(n, 8);
        assert_eq!(writer.inner.written, b"hi\xFF\xFFthere");
        assert_eq!(writer.inner.calls, 9);
    }

    #[tokio::test]
    async fn writer_surfaces_sink_error() {
        let mock = Builder::new()
            .write_error(io::Error::new(ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut writer = TelnetWriter::new(mock);

        let err = writer.write(b"abc").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn failure_midway_reports_accepted_bytes_first() {
        let mock = Builder::new()
            .write(b"ab")
            .write_error(io::Error::new(ErrorKind::BrokenPipe, "gone"))
            .build();
        let mut writer = TelnetWriter::new(mock);

        assert_eq!(writer.write(b"abc").await.unwrap(), 2);
        let err = writer.write(b"c").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn commands_are_not_escaped() {
        let mut writer = TelnetWriter::new(Vec::new());
        let preamble = negotiation_preamble(DO, &[OPT_TTYPE, OPT_TSPEED]);
        writer.send_command(&preamble).await.unwrap();

        assert_eq!(writer.inner, vec![IAC, DO, OPT_TTYPE, IAC, DO, OPT_TSPEED]);
    }
}
