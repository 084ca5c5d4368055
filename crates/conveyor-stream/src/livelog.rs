//! Live log buffers for in-flight steps.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc;

use conveyor_core::service::{Line, LogStream};
use conveyor_core::{Error, Result};

/// Upper bound on buffered lines per stream; the oldest lines are shed
/// first. Complete logs are archived separately on step teardown.
const LINE_LIMIT: usize = 5000;

const FOLLOWER_BUFFER: usize = 100;

struct Stream {
    lines: Vec<Line>,
    followers: Vec<mpsc::Sender<Line>>,
}

/// Append-only in-memory log streams, one per running step. A stream
/// exists from `create` until `delete` at step teardown.
#[derive(Default)]
pub struct LiveLogs {
    streams: Mutex<HashMap<i64, Stream>>,
}

impl LiveLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }
}

#[async_trait]
impl LogStream for LiveLogs {
    async fn create(&self, step_id: i64) -> Result<()> {
        self.streams.lock().insert(
            step_id,
            Stream {
                lines: Vec::new(),
                followers: Vec::new(),
            },
        );
        Ok(())
    }

    async fn write(&self, step_id: i64, line: &Line) -> Result<()> {
        let mut streams = self.streams.lock();
        let stream = streams
            .get_mut(&step_id)
            .ok_or_else(|| Error::NotFound(format!("log stream for step {step_id}")))?;
        stream.lines.push(line.clone());
        if stream.lines.len() > LINE_LIMIT {
            stream.lines.remove(0);
        }
        stream
            .followers
            .retain(|tx| tx.try_send(line.clone()).is_ok() || !tx.is_closed());
        Ok(())
    }

    async fn tail(&self, step_id: i64) -> Result<(Vec<Line>, mpsc::Receiver<Line>)> {
        let mut streams = self.streams.lock();
        let stream = streams
            .get_mut(&step_id)
            .ok_or_else(|| Error::NotFound(format!("log stream for step {step_id}")))?;
        let (tx, rx) = mpsc::channel(FOLLOWER_BUFFER);
        stream.followers.push(tx);
        Ok((stream.lines.clone(), rx))
    }

    async fn delete(&self, step_id: i64) -> Result<()> {
        self.streams
            .lock()
            .remove(&step_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("log stream for step {step_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(number: i64, message: &str) -> Line {
        Line {
            number,
            message: message.to_string(),
            timestamp: number,
        }
    }

    #[tokio::test]
    async fn test_write_requires_created_stream() {
        let logs = LiveLogs::new();
        let err = logs.write(1, &line(0, "hello")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_tail_replays_history_then_follows() {
        let logs = LiveLogs::new();
        logs.create(1).await.unwrap();
        logs.write(1, &line(0, "one")).await.unwrap();
        logs.write(1, &line(1, "two")).await.unwrap();

        let (history, mut rx) = logs.tail(1).await.unwrap();
        assert_eq!(history.len(), 2);

        logs.write(1, &line(2, "three")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().message, "three");
    }

    #[tokio::test]
    async fn test_delete_ends_followers() {
        let logs = LiveLogs::new();
        logs.create(1).await.unwrap();
        let (_, mut rx) = logs.tail(1).await.unwrap();

        logs.delete(1).await.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(logs.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_buffer_sheds_oldest_lines() {
        let logs = LiveLogs::new();
        logs.create(1).await.unwrap();
        for i in 0..(LINE_LIMIT as i64 + 10) {
            logs.write(1, &line(i, "x")).await.unwrap();
        }
        let (history, _rx) = logs.tail(1).await.unwrap();
        assert_eq!(history.len(), LINE_LIMIT);
        assert_eq!(history[0].number, 10);
    }
}
