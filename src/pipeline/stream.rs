//! Stream transport. `RedisBus` talks to Redis streams; `MemoryBus` keeps
//! the same semantics (ids, consumer groups, pending entries) in process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub type Fields = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub id: String,
    pub fields: Fields,
}

#[async_trait]
pub trait StreamBus: Send + Sync {
    async fn ping(&self) -> Result<()>;
    /// Create `group` on `stream` (creating the stream too). Existing groups are fine.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;
    async fn xadd(&self, stream: &str, fields: &Fields) -> Result<String>;
    /// New messages for `consumer`; they stay pending until acked.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>>;
    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()>;
    /// Messages after `last_id` without a group.
    async fn read_from(
        &self,
        stream: &str,
        last_id: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>>;
    fn name(&self) -> &'static str;
}

/// Redis treats `BLOCK 0` as "forever"; 0 here means "don't block".
fn with_block(opts: StreamReadOptions, block_ms: u64) -> StreamReadOptions {
    if block_ms == 0 {
        opts
    } else {
        opts.block(block_ms as usize)
    }
}

/// One multiplexed connection. Blocking reads hold it, so give readers
/// that block (consumer, dashboard) their own bus.
pub struct RedisBus {
    conn: MultiplexedConnection,
}

impl RedisBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .context("connecting to redis")?;
        Ok(Self { conn })
    }

    fn decode(reply: Option<StreamReadReply>) -> Vec<StreamMessage> {
        let Some(reply) = reply else {
            return Vec::new();
        };
        reply
            .keys
            .into_iter()
            .flat_map(|k| k.ids)
            .map(|sid| {
                let fields = sid
                    .map
                    .iter()
                    .filter_map(|(k, v)| {
                        redis::from_redis_value::<String>(v)
                            .ok()
                            .map(|s| (k.clone(), s))
                    })
                    .collect();
                StreamMessage { id: sid.id, fields }
            })
            .collect()
    }
}

#[async_trait]
impl StreamBus for RedisBus {
    async fn ping(&self) -> Result<()> {
        let mut c = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut c)
            .await
            .context("redis ping")?;
        Ok(())
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut c = self.conn.clone();
        let res: redis::RedisResult<()> = c.xgroup_create_mkstream(stream, group, "0").await;
        match res {
            Ok(()) => {
                tracing::info!(stream, group, "consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => {
                tracing::info!(stream, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(e).context("creating consumer group"),
        }
    }

    async fn xadd(&self, stream: &str, fields: &Fields) -> Result<String> {
        let mut c = self.conn.clone();
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let id: String = c.xadd(stream, "*", items.as_slice()).await.context("xadd")?;
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>> {
        let mut c = self.conn.clone();
        let opts = with_block(
            StreamReadOptions::default().group(group, consumer).count(count),
            block_ms,
        );
        let reply: Option<StreamReadReply> = c
            .xread_options(&[stream], &[">"], &opts)
            .await
            .context("xreadgroup")?;
        Ok(Self::decode(reply))
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut c = self.conn.clone();
        let _: i64 = c.xack(stream, group, &[id]).await.context("xack")?;
        Ok(())
    }

    async fn read_from(
        &self,
        stream: &str,
        last_id: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>> {
        let mut c = self.conn.clone();
        let opts = with_block(StreamReadOptions::default().count(count), block_ms);
        let reply: Option<StreamReadReply> = c
            .xread_options(&[stream], &[last_id], &opts)
            .await
            .context("xread")?;
        Ok(Self::decode(reply))
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[derive(Debug, Default)]
struct GroupState {
    /// Sequence of the last entry delivered to any consumer.
    last_delivered: u64,
    /// id -> consumer
    pending: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct StreamState {
    next_seq: u64,
    entries: Vec<(u64, Fields)>,
    groups: HashMap<String, GroupState>,
}

impl StreamState {
    fn after(&self, seq: u64, count: usize) -> Vec<StreamMessage> {
        self.entries
            .iter()
            .filter(|(s, _)| *s > seq)
            .take(count.max(1))
            .map(|(s, f)| StreamMessage {
                id: format_id(*s),
                fields: f.clone(),
            })
            .collect()
    }
}

fn format_id(seq: u64) -> String {
    format!("{seq}-0")
}

/// `"0"`, `"0-0"` and `"17-0"` style ids; the sequence part is ignored.
fn parse_seq(id: &str) -> Option<u64> {
    id.split('-').next()?.parse().ok()
}

/// In-process stream bus.
#[derive(Debug, Default)]
pub struct MemoryBus {
    streams: Mutex<HashMap<String, StreamState>>,
    notify: Notify,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, stream: &str) -> usize {
        self.streams
            .lock()
            .map(|m| m.get(stream).map_or(0, |s| s.entries.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    /// Delivered but not yet acked.
    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.streams
            .lock()
            .map(|m| {
                m.get(stream)
                    .and_then(|s| s.groups.get(group))
                    .map_or(0, |g| g.pending.len())
            })
            .unwrap_or(0)
    }

    pub fn entries(&self, stream: &str) -> Vec<StreamMessage> {
        self.streams
            .lock()
            .map(|m| m.get(stream).map(|s| s.after(0, usize::MAX)).unwrap_or_default())
            .unwrap_or_default()
    }

    fn with_streams<T>(&self, f: impl FnOnce(&mut HashMap<String, StreamState>) -> T) -> Result<T> {
        let mut guard = self
            .streams
            .lock()
            .map_err(|_| anyhow::anyhow!("memory bus lock poisoned"))?;
        Ok(f(&mut guard))
    }

    /// Poll `attempt` until it yields messages or `block_ms` elapses.
    async fn blocking<F>(&self, block_ms: u64, mut attempt: F) -> Result<Vec<StreamMessage>>
    where
        F: FnMut() -> Result<Vec<StreamMessage>> + Send,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(block_ms);
        loop {
            let notified = self.notify.notified();
            let got = attempt()?;
            if !got.is_empty() || block_ms == 0 {
                return Ok(got);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(got);
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }
}

#[async_trait]
impl StreamBus for MemoryBus {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        self.with_streams(|m| {
            m.entry(stream.to_string())
                .or_default()
                .groups
                .entry(group.to_string())
                .or_default();
        })
    }

    async fn xadd(&self, stream: &str, fields: &Fields) -> Result<String> {
        let id = self.with_streams(|m| {
            let s = m.entry(stream.to_string()).or_default();
            s.next_seq += 1;
            let seq = s.next_seq;
            s.entries.push((seq, fields.clone()));
            format_id(seq)
        })?;
        self.notify.notify_waiters();
        Ok(id)
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>> {
        self.blocking(block_ms, || {
            self.with_streams(|m| -> Result<Vec<StreamMessage>> {
                let s = m
                    .get_mut(stream)
                    .ok_or_else(|| anyhow::anyhow!("NOGROUP no such stream {stream}"))?;
                let from = s
                    .groups
                    .get(group)
                    .ok_or_else(|| anyhow::anyhow!("NOGROUP no such group {group}"))?
                    .last_delivered;
                let batch = s.after(from, count);
                if let Some(g) = s.groups.get_mut(group) {
                    for msg in &batch {
                        g.pending.insert(msg.id.clone(), consumer.to_string());
                        g.last_delivered = g.last_delivered.max(parse_seq(&msg.id).unwrap_or(0));
                    }
                }
                Ok(batch)
            })?
        })
        .await
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        self.with_streams(|m| {
            if let Some(g) = m.get_mut(stream).and_then(|s| s.groups.get_mut(group)) {
                g.pending.remove(id);
            }
        })
    }

    async fn read_from(
        &self,
        stream: &str,
        last_id: &str,
        count: usize,
        block_ms: u64,
    ) -> Result<Vec<StreamMessage>> {
        let seq = parse_seq(last_id).unwrap_or(0);
        self.blocking(block_ms, || {
            self.with_streams(|m| m.get(stream).map(|s| s.after(seq, count)).unwrap_or_default())
        })
        .await
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn fields(title: &str) -> Fields {
        Fields::from([("title".to_string(), title.to_string())])
    }

    #[tokio::test]
    async fn group_delivers_once_and_tracks_pending() {
        let bus = MemoryBus::new();
        bus.ensure_group("s", "g").await.unwrap();
        bus.ensure_group("s", "g").await.unwrap();
        let id1 = bus.xadd("s", &fields("a")).await.unwrap();
        bus.xadd("s", &fields("b")).await.unwrap();

        let first = bus.read_group("s", "g", "c1", 1, 0).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, id1);
        let second = bus.read_group("s", "g", "c2", 10, 0).await.unwrap();
        assert_eq!(second[0].fields["title"], "b");
        assert!(bus.read_group("s", "g", "c1", 10, 0).await.unwrap().is_empty());

        assert_eq!(bus.pending_count("s", "g"), 2);
        bus.ack("s", "g", &id1).await.unwrap();
        assert_eq!(bus.pending_count("s", "g"), 1);
    }

    #[tokio::test]
    async fn read_group_without_group_fails() {
        let bus = MemoryBus::new();
        bus.xadd("s", &fields("a")).await.unwrap();
        assert!(bus.read_group("s", "nope", "c", 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn read_from_follows_last_id() {
        let bus = MemoryBus::new();
        assert!(bus.read_from("r", "0", 10, 0).await.unwrap().is_empty());
        let a = bus.xadd("r", &fields("a")).await.unwrap();
        bus.xadd("r", &fields("b")).await.unwrap();
        let all = bus.read_from("r", "0", 10, 0).await.unwrap();
        assert_eq!(all.len(), 2);
        let rest = bus.read_from("r", &a, 10, 0).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].fields["title"], "b");
    }

    #[tokio::test]
    async fn blocking_read_wakes_on_xadd() {
        let bus = Arc::new(MemoryBus::new());
        let reader = {
            let bus = bus.clone();
            tokio::spawn(async move { bus.read_from("r", "0", 10, 2_000).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        bus.xadd("r", &fields("late")).await.unwrap();
        let got = reader.await.unwrap().unwrap();
        assert_eq!(got.len(), 1);
    }
}
