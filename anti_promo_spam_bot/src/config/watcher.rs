use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use notify::{RecursiveMode, Watcher};

use super::{Config, ConfigStore};

/// Watch the config file and publish a new snapshot into the store whenever it
/// changes. Runs until the store is dropped.
///
/// A file that fails to load is logged and ignored; the bot keeps running with
/// the config it had.
pub async fn watch_config_file(store: Arc<ConfigStore>, path: PathBuf) {
    let mut receiver = store.subscribe();
    let store = Arc::downgrade(&store);

    let Some(file_name) = path.file_name().map(ToOwned::to_owned) else {
        log::warn!("Config path {} has no file name, not watching it.", path.display());
        return;
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let update_notify = Arc::new(tokio::sync::Notify::new());
    let update_notify_watcher_clone = update_notify.clone();

    let watcher = notify::recommended_watcher(move |event: Result<notify::Event, notify::Error>| {
        let Ok(event) = event else {
            return;
        };
        let k = event.kind;
        if (k.is_create() || k.is_modify() || k.is_other())
            && event.paths.iter().any(|p| p.ends_with(&file_name))
        {
            update_notify_watcher_clone.notify_one();
        }
    });

    let mut watcher = match watcher {
        Ok(w) => w,
        Err(e) => {
            log::warn!("Failed to create a config file watcher: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(Path::new(&directory), RecursiveMode::NonRecursive) {
        log::warn!("Failed to watch {}: {e}", directory.display());
        return;
    }

    log::info!("Watching {} for changes.", path.display());

    loop {
        tokio::select! {
            _ = update_notify.notified() => {
                log::debug!("Notified of a config file change!");
                let Some(store) = store.upgrade() else {
                    break;
                };

                match Config::load_file(&path) {
                    Ok(config) => {
                        let published = store.replace(config);
                        log::info!("Reloaded config, now at version {}.", published.version());
                    }
                    Err(e) => log::warn!("Ignoring broken config file: {e}"),
                }
            },
            changed = receiver.changed() => {
                if changed.is_err() {
                    // The store was dropped.
                    break;
                }
            }
        };
    }
}
