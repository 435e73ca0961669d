//! Streaming record source
//!
//! Reads the canonical input (a JSON array of conversation objects) one
//! element at a time. A blocking reader task drives `serde_json` over a
//! buffered file and hands each element to the consumer through a channel of
//! capacity 1, so at most one parsed record waits ahead of the importer and
//! the array is never held in memory.
//!
//! # Terminal signals
//! - [`SourceEvent::End`]: the closing `]` was reached
//! - [`SourceEvent::Closed`]: the reader went away without finishing
//! - [`SourceError::MalformedStream`]: parse failure, ends the sequence

use futures::Stream;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

const READ_BUFFER_BYTES: usize = 64 * 1024;

/// Record source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Couldn't open your file {path:?}, is the path valid? ({source})")]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Couldn't parse your file {path:?}, is the format valid? \
         The file must hold a top-level array of conversation objects ({reason})"
    )]
    MalformedStream { path: PathBuf, reason: String },
}

/// What the consumer sees on each pull
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// One raw conversation object
    Record(Value),
    /// Normal end of stream
    End,
    /// Stream closed before its end
    Closed,
}

/// Reader → consumer messages
#[derive(Debug)]
enum Feed {
    Record(Value),
    Malformed(String),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finished {
    Clean,
    Abrupt,
}

/// Lazy, finite, non-restartable sequence of raw conversation objects
#[derive(Debug)]
pub struct RecordSource {
    path: PathBuf,
    rx: mpsc::Receiver<Feed>,
    finished: Option<Finished>,
    pulled: usize,
}

impl RecordSource {
    /// Open `path` and start the reader task
    ///
    /// Unreadable paths fail here, before any record is produced.
    pub async fn open(path: &Path) -> Result<Self, SourceError> {
        let unreadable = |source| SourceError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let metadata = file.metadata().map_err(unreadable)?;
        if metadata.is_dir() {
            return Err(unreadable(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path is a directory",
            )));
        }

        tracing::debug!(path = %path.display(), bytes = metadata.len(), "Opened record source");

        let (tx, rx) = mpsc::channel(1);
        let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
        tokio::task::spawn_blocking(move || feed_array(reader, tx));

        Ok(Self {
            path: path.to_path_buf(),
            rx,
            finished: None,
            pulled: 0,
        })
    }

    /// Serve an already materialized record list through the same interface
    pub fn from_records(records: Vec<Value>) -> Self {
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            for record in records {
                if tx.send(Feed::Record(record)).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Feed::End).await;
        });

        Self {
            path: PathBuf::from("<memory>"),
            rx,
            finished: None,
            pulled: 0,
        }
    }

    /// Pull the next record or terminal signal
    ///
    /// Once a terminal signal has been returned, further pulls repeat it
    /// (a parse error repeats as [`SourceEvent::Closed`]).
    pub async fn next_event(&mut self) -> Result<SourceEvent, SourceError> {
        match self.finished {
            Some(Finished::Clean) => return Ok(SourceEvent::End),
            Some(Finished::Abrupt) => return Ok(SourceEvent::Closed),
            None => {}
        }

        match self.rx.recv().await {
            Some(Feed::Record(record)) => {
                self.pulled += 1;
                Ok(SourceEvent::Record(record))
            }
            Some(Feed::End) => {
                self.finished = Some(Finished::Clean);
                tracing::debug!(records = self.pulled, "Record source reached end of stream");
                Ok(SourceEvent::End)
            }
            Some(Feed::Malformed(reason)) => {
                self.finished = Some(Finished::Abrupt);
                Err(SourceError::MalformedStream {
                    path: self.path.clone(),
                    reason,
                })
            }
            None => {
                self.finished = Some(Finished::Abrupt);
                tracing::warn!(records = self.pulled, "Record source closed before end of stream");
                Ok(SourceEvent::Closed)
            }
        }
    }

    /// Records handed out so far
    pub fn pulled(&self) -> usize {
        self.pulled
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records as a stream; ends on either terminal signal, yields a final
    /// error on parse failure
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Value, SourceError>> {
        async_stream::stream! {
            loop {
                match self.next_event().await {
                    Ok(SourceEvent::Record(record)) => yield Ok(record),
                    Ok(SourceEvent::End) | Ok(SourceEvent::Closed) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}

/// Read every record of `path` into memory
///
/// Only for inputs that must be seen whole (batch grouping).
pub async fn read_all(path: &Path) -> Result<Vec<Value>, SourceError> {
    use futures::TryStreamExt;

    RecordSource::open(path).await?.into_stream().try_collect().await
}

/// Blocking reader: parse the array, forwarding each element
fn feed_array<R: Read>(reader: R, tx: mpsc::Sender<Feed>) {
    let mut de = serde_json::Deserializer::from_reader(reader);

    let result = (&mut de)
        .deserialize_seq(ArrayFeeder { tx: &tx })
        .and_then(|_| de.end());

    let last = match result {
        Ok(()) => Feed::End,
        Err(e) => Feed::Malformed(e.to_string()),
    };

    // Consumer may already be gone; nothing left to tell it then
    let _ = tx.blocking_send(last);
}

/// Visitor forwarding array elements as they are parsed
struct ArrayFeeder<'a> {
    tx: &'a mpsc::Sender<Feed>,
}

impl<'de, 'a> Visitor<'de> for ArrayFeeder<'a> {
    type Value = usize;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a top-level array of conversation objects")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut forwarded = 0;

        while let Some(record) = seq.next_element::<Map<String, Value>>()? {
            if self.tx.blocking_send(Feed::Record(Value::Object(record))).is_err() {
                return Err(de::Error::custom("record consumer closed"));
            }
            forwarded += 1;
        }

        Ok(forwarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_records_preserves_order() {
        let mut source = RecordSource::from_records(vec![json!({"id": 1}), json!({"id": 2})]);

        assert_eq!(source.next_event().await.unwrap(), SourceEvent::Record(json!({"id": 1})));
        assert_eq!(source.next_event().await.unwrap(), SourceEvent::Record(json!({"id": 2})));
        assert_eq!(source.next_event().await.unwrap(), SourceEvent::End);
        assert_eq!(source.pulled(), 2);
    }

    #[tokio::test]
    async fn test_terminal_signal_repeats() {
        let mut source = RecordSource::from_records(Vec::new());

        assert_eq!(source.next_event().await.unwrap(), SourceEvent::End);
        assert_eq!(source.next_event().await.unwrap(), SourceEvent::End);
    }

    #[tokio::test]
    async fn test_dropped_sender_reads_as_closed() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(Feed::Record(json!({"id": "a"}))).await.unwrap();
        drop(tx);

        let mut source = RecordSource {
            path: PathBuf::from("<test>"),
            rx,
            finished: None,
            pulled: 0,
        };

        assert!(matches!(source.next_event().await.unwrap(), SourceEvent::Record(_)));
        assert_eq!(source.next_event().await.unwrap(), SourceEvent::Closed);
        assert_eq!(source.next_event().await.unwrap(), SourceEvent::Closed);
    }
}
