// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! NUL-delimited framing over a byte stream.
//!
//! One frame is the message bytes followed by a single NUL terminator.
//! Receiving tolerates arbitrary fragmentation: bytes are accumulated
//! until a terminator shows up, and blowing past the configured receive
//! limit without one is fatal for that receive.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Terminator between frames on the wire.
pub const FRAME_TERMINATOR: u8 = 0;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum FrameError {
    /// The peer closed the stream before completing a frame.
    #[error("stream closed before a frame terminator arrived")]
    Closed,

    /// More than `limit` bytes accumulated without a terminator.
    #[error("frame exceeded the {limit} byte receive limit")]
    TooLarge { limit: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Writes `payload` as one frame and flushes it.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(payload).await?;
    writer.write_all(&[FRAME_TERMINATOR]).await?;
    writer.flush().await
}

/// Accumulating frame reader over any async byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    buf: Vec<u8>,
    max_frame_len: usize,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        FrameReader {
            reader,
            buf: Vec::new(),
            max_frame_len,
        }
    }

    /// Reads until a full frame is available and returns its payload
    /// without the terminator. Bytes past the terminator stay buffered for
    /// the next call.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == FRAME_TERMINATOR) {
                let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
                frame.pop(); // drop the terminator
                return Ok(frame);
            }

            if self.buf.len() >= self.max_frame_len {
                return Err(FrameError::TooLarge {
                    limit: self.max_frame_len,
                });
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(FrameError::Closed);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 1024);

        write_frame(&mut client, b"{\"auth\":\"authenticated\"}")
            .await
            .unwrap();

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame, b"{\"auth\":\"authenticated\"}");
    }

    #[tokio::test]
    async fn fragments_are_reassembled() {
        let (mut client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 1024);

        let writer = tokio::spawn(async move {
            client.write_all(b"{\"auth\":\"authenti").await.unwrap();
            client.flush().await.unwrap();
            tokio::task::yield_now().await;
            client.write_all(b"cated\"}\0").await.unwrap();
            client.flush().await.unwrap();
        });

        let frame = reader.read_frame().await.unwrap();
        assert_eq!(frame, b"{\"auth\":\"authenticated\"}");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn back_to_back_frames_split_correctly() {
        let (mut client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 1024);

        client.write_all(b"first\0second\0").await.unwrap();
        client.flush().await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap(), b"first");
        assert_eq!(reader.read_frame().await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn oversized_frame_is_fatal() {
        let (mut client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 8);

        client.write_all(b"0123456789abcdef").await.unwrap();
        client.flush().await.unwrap();

        match reader.read_frame().await {
            Err(FrameError::TooLarge { limit: 8 }) => {}
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_stream_is_an_error() {
        let (client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 1024);
        drop(client);

        assert!(matches!(reader.read_frame().await, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn empty_frame_is_valid() {
        let (mut client, server) = duplex(256);
        let mut reader = FrameReader::new(server, 1024);

        client.write_all(b"\0").await.unwrap();
        client.flush().await.unwrap();

        assert_eq!(reader.read_frame().await.unwrap(), b"");
    }
}
