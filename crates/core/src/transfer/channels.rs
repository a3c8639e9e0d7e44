//! Bookkeeping of channels with unflushed batches.

use std::path::PathBuf;

use super::error::TransferError;
use super::types::ChannelKey;

/// A channel whose batch file may hold pending pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannel {
    pub key: ChannelKey,
    pub path: PathBuf,
    last_pair: Option<(String, String)>,
    failed_flush: bool,
}

impl OpenChannel {
    fn new(key: ChannelKey, path: PathBuf) -> Self {
        Self {
            key,
            path,
            last_pair: None,
            failed_flush: false,
        }
    }

    /// Whether the batch file holds pairs from an earlier failed submission.
    pub fn has_failed_flush(&self) -> bool {
        self.failed_flush
    }

    /// Whether `(original, copy)` is the pair most recently appended.
    pub fn is_last_pair(&self, original: &str, copy: &str) -> bool {
        matches!(&self.last_pair, Some((o, c)) if o == original && c == copy)
    }

    pub(crate) fn record_pair(&mut self, original: &str, copy: &str) {
        self.last_pair = Some((original.to_string(), copy.to_string()));
    }
}

/// Channels with pending batches, owned by one orchestration pass.
///
/// Insertion order is preserved so flushes happen in the order channels
/// were first used. Channels whose submission failed move to the retained
/// list: they are no longer open, but their batch file stays on disk. A
/// retained channel that is opened again carries the failure with it until
/// it flushes successfully.
#[derive(Debug, Default)]
pub struct OpenChannels {
    open: Vec<OpenChannel>,
    retained: Vec<OpenChannel>,
}

impl OpenChannels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel, or returns the existing registration.
    ///
    /// Registering a known key with a different batch path is an error.
    pub fn register(
        &mut self,
        key: ChannelKey,
        path: PathBuf,
    ) -> Result<&mut OpenChannel, TransferError> {
        match self.open.iter().position(|c| c.key == key) {
            Some(idx) => {
                if self.open[idx].path != path {
                    return Err(TransferError::channel_state(
                        &key,
                        format!(
                            "already registered with {} (not {})",
                            self.open[idx].path.display(),
                            path.display()
                        ),
                    ));
                }
                Ok(&mut self.open[idx])
            }
            None => {
                let failed_flush = self.retained.iter().any(|c| c.key == key);
                self.retained.retain(|c| c.key != key);
                let mut channel = OpenChannel::new(key, path);
                channel.failed_flush = failed_flush;
                self.open.push(channel);
                let last = self.open.len() - 1;
                Ok(&mut self.open[last])
            }
        }
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&OpenChannel> {
        self.open.iter().find(|c| &c.key == key)
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.get(key).is_some()
    }

    /// Unregisters a channel.
    pub fn remove(&mut self, key: &ChannelKey) -> Option<OpenChannel> {
        let idx = self.open.iter().position(|c| &c.key == key)?;
        Some(self.open.remove(idx))
    }

    /// Unregisters a channel but remembers it as kept for a later run.
    pub fn retain_for_retry(&mut self, key: &ChannelKey) {
        if let Some(mut channel) = self.remove(key) {
            channel.failed_flush = true;
            self.retained.push(channel);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenChannel> {
        self.open.iter()
    }

    /// Snapshot of open channels in insertion order.
    pub fn snapshot(&self) -> Vec<OpenChannel> {
        self.open.clone()
    }

    /// Channels kept on disk after a failed submission.
    pub fn retained(&self) -> &[OpenChannel] {
        &self.retained
    }

    /// Closes every open channel and returns those whose batch may be
    /// discarded. Channels with a failed flush move to the retained list.
    pub fn drain_discardable(&mut self) -> Vec<OpenChannel> {
        let (kept, discardable): (Vec<_>, Vec<_>) = std::mem::take(&mut self.open)
            .into_iter()
            .partition(|c| c.failed_flush);
        self.retained.extend(kept);
        discardable
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(src: &str) -> ChannelKey {
        ChannelKey::new(src, "dest.example.org")
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut channels = OpenChannels::new();
        channels
            .register(key("a"), PathBuf::from("/t/transfer.a-dest.txt"))
            .unwrap();
        channels
            .register(key("a"), PathBuf::from("/t/transfer.a-dest.txt"))
            .unwrap();
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn test_register_conflicting_path_fails() {
        let mut channels = OpenChannels::new();
        channels.register(key("a"), PathBuf::from("/t/one.txt")).unwrap();
        let err = channels
            .register(key("a"), PathBuf::from("/t/two.txt"))
            .unwrap_err();
        assert!(matches!(err, TransferError::ChannelState { .. }));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut channels = OpenChannels::new();
        for src in ["c", "a", "b"] {
            channels
                .register(key(src), PathBuf::from(format!("/t/{src}.txt")))
                .unwrap();
        }
        let order: Vec<_> = channels.iter().map(|c| c.key.source.clone()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_retain_for_retry() {
        let mut channels = OpenChannels::new();
        channels.register(key("a"), PathBuf::from("/t/a.txt")).unwrap();
        channels.retain_for_retry(&key("a"));
        assert!(channels.is_empty());
        assert_eq!(channels.retained().len(), 1);
        assert!(channels.retained()[0].has_failed_flush());

        // Reopening moves the channel back to the open set, failure included.
        channels.register(key("a"), PathBuf::from("/t/a.txt")).unwrap();
        assert!(channels.retained().is_empty());
        assert!(channels.get(&key("a")).unwrap().has_failed_flush());
    }

    #[test]
    fn test_drain_discardable_keeps_failed_channels() {
        let mut channels = OpenChannels::new();
        channels.register(key("a"), PathBuf::from("/t/a.txt")).unwrap();
        channels.retain_for_retry(&key("a"));
        channels.register(key("a"), PathBuf::from("/t/a.txt")).unwrap();
        channels.register(key("b"), PathBuf::from("/t/b.txt")).unwrap();

        let discardable = channels.drain_discardable();
        assert_eq!(discardable.len(), 1);
        assert_eq!(discardable[0].key, key("b"));
        assert!(channels.is_empty());
        assert_eq!(channels.retained().len(), 1);
        assert_eq!(channels.retained()[0].key, key("a"));
    }

    #[test]
    fn test_last_pair_tracking() {
        let mut channels = OpenChannels::new();
        let channel = channels.register(key("a"), PathBuf::from("/t/a.txt")).unwrap();
        assert!(!channel.is_last_pair("srm://a/1", "srm://b/1"));
        channel.record_pair("srm://a/1", "srm://b/1");
        assert!(channel.is_last_pair("srm://a/1", "srm://b/1"));
        assert!(!channel.is_last_pair("srm://a/2", "srm://b/2"));
    }
}
