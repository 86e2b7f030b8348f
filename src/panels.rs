//! The set of log panels the console shows, one per configured topic.

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::protocol::Topic;
use crate::ws_client::{LogPanel, PanelEvent, PanelSnapshot};

/// Capacity of the live event channel shared by all panels.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct PanelSet {
    panels: Vec<LogPanel>,
    events: broadcast::Sender<PanelEvent>,
}

impl PanelSet {
    /// A set without panels, for one-shot backend commands.
    pub fn empty() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            panels: Vec::new(),
            events,
        }
    }

    /// Create one panel per configured topic and connect them all.
    pub async fn spawn(config: &Config, events: broadcast::Sender<PanelEvent>) -> Result<Self> {
        let ws_base = config.backend.ws_base()?;
        let mut topics = config.panels.topics.clone();
        topics.sort();
        topics.dedup();

        let mut panels = Vec::with_capacity(topics.len());
        for topic in topics {
            let mut panel = LogPanel::new(topic, &ws_base, &config.panels, events.clone())?;
            info!(target: "panel", %topic, url = %panel.url(), "connecting");
            panel.connect().await;
            panels.push(panel);
        }

        Ok(Self { panels, events })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.panels.iter().map(LogPanel::topic).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn get(&self, topic: Topic) -> Option<&LogPanel> {
        self.panels.iter().find(|p| p.topic() == topic)
    }

    fn get_mut(&mut self, topic: Topic) -> Result<&mut LogPanel> {
        self.panels
            .iter_mut()
            .find(|p| p.topic() == topic)
            .ok_or_else(|| anyhow!("no {} panel is open", topic))
    }

    pub async fn reconnect(&mut self, topic: Topic) -> Result<()> {
        self.get_mut(topic)?.reconnect().await;
        Ok(())
    }

    pub fn clear(&mut self, topic: Topic) -> Result<()> {
        self.get_mut(topic)?.clear();
        Ok(())
    }

    pub async fn reconnect_all(&mut self) {
        for panel in &mut self.panels {
            panel.reconnect().await;
        }
    }

    pub fn clear_all(&self) {
        for panel in &self.panels {
            panel.clear();
        }
    }

    pub fn snapshot(&self, topic: Topic) -> Result<PanelSnapshot> {
        self.get(topic)
            .map(LogPanel::snapshot)
            .ok_or_else(|| anyhow!("no {} panel is open", topic))
    }

    pub fn snapshots(&self) -> Vec<PanelSnapshot> {
        self.panels.iter().map(LogPanel::snapshot).collect()
    }

    /// Close every connection and wait for the tasks to end.
    pub async fn shutdown(&mut self) {
        for panel in &mut self.panels {
            panel.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_rejects_topic_operations() {
        let mut set = PanelSet::empty();
        assert!(set.is_empty());
        assert!(set.clear(Topic::Camera).is_err());
        assert!(set.snapshot(Topic::Misc).is_err());
        assert!(set.snapshots().is_empty());
    }

    #[tokio::test]
    async fn spawn_deduplicates_topics() {
        let mut config = Config::default();
        // Nothing listens here; panels simply end up disconnected.
        config.backend.base_url = "http://127.0.0.1:1".into();
        config.panels.topics = vec![Topic::Misc, Topic::Camera, Topic::Misc];

        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let mut set = PanelSet::spawn(&config, tx).await.unwrap();
        assert_eq!(set.topics(), vec![Topic::Camera, Topic::Misc]);
        assert!(set.get(Topic::Imu).is_none());
        set.shutdown().await;
    }
}
