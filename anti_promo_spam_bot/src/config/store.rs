use std::sync::Arc;

use tokio::sync::watch;

use super::Config;

/// Holds the current [`Config`] snapshot.
///
/// Handlers grab an [`Arc`] of the current snapshot and use it for the whole
/// message, so a config change halfway through processing one doesn't affect it.
pub struct ConfigStore {
    sender: watch::Sender<Arc<Config>>,
}

impl ConfigStore {
    pub fn new(config: Config) -> Arc<Self> {
        let (sender, _) = watch::channel(Arc::new(config.with_version(0)));
        Arc::new(Self { sender })
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<Config> {
        self.sender.borrow().clone()
    }

    /// Build a new snapshot out of the current one and publish it.
    /// Returns the published snapshot.
    pub fn update(&self, change: impl FnOnce(&Config) -> Config) -> Arc<Config> {
        let mut published = None;
        self.sender.send_modify(|current| {
            let new = change(current).with_version(current.version() + 1);
            *current = Arc::new(new);
            published = Some(current.clone());
        });
        // send_modify always runs the closure.
        published.unwrap_or_else(|| self.current())
    }

    /// Publish a whole new config, for example one that was just reloaded from disk.
    pub fn replace(&self, config: Config) -> Arc<Config> {
        self.update(move |_| config)
    }

    /// A receiver that gets notified of every new snapshot, and errors out when
    /// the store is dropped.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::ChatId;

    use super::*;

    #[test]
    fn versions_go_up() {
        let store = ConfigStore::new(Config::default());
        let first = store.current();
        assert_eq!(first.version(), 0);

        let second = store.update(|c| c.with_allowed_group(ChatId(-42)));
        assert_eq!(second.version(), 1);
        assert!(second.is_group_allowed(ChatId(-42)));

        // Old snapshots stay as they were.
        assert!(!first.is_group_allowed(ChatId(-42)));

        let third = store.replace(Config::default());
        assert_eq!(third.version(), 2);
        assert!(!store.current().is_group_allowed(ChatId(-42)));
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let store = ConfigStore::new(Config::default());
        let mut receiver = store.subscribe();

        store.update(|c| c.with_allowed_group(ChatId(-7)));
        receiver.changed().await.unwrap();
        assert!(receiver.borrow().is_group_allowed(ChatId(-7)));

        drop(store);
        assert!(receiver.changed().await.is_err());
    }
}
