//! Append-only conversation tapes: entries, anchors, queries, and the
//! manager that records chat turns.

mod backends;
mod context;
mod entry;
mod manager;
mod query;
mod store;

pub mod prelude {
    pub use crate::{
        AnchorSelector, HandoffHandler, HandoffPolicy, InMemoryTapeStore, RecordChat,
        SqliteTapeStore, TapeContext, TapeEntry, TapeEntryKind, TapeManager, TapeQuery,
        TapeStore, TapeStoreConfig, create_tape_store,
    };
}

pub use backends::memory::InMemoryTapeStore;
pub use backends::sqlite::SqliteTapeStore;
pub use context::{AnchorSelector, MessageSelector, TapeContext, default_messages};
pub use entry::{TapeEntry, TapeEntryKind};
pub use manager::{HandoffHandler, HandoffPolicy, RecordChat, TapeManager};
pub use query::TapeQuery;
pub use store::{TapeStore, TapeStoreConfig, create_tape_store};

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{TapeEntry, TapeEntryKind, TapeStore, TapeStoreConfig, create_tape_store};

    fn temp_dir(prefix: &str) -> std::path::PathBuf {
        let unique = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("rtape-{prefix}-{unique}"))
    }

    #[test]
    fn sqlite_store_persists_across_reopen() {
        let root = temp_dir("sqlite");
        let path = root.join("nested").join("tapes.sqlite3");

        {
            let store = create_tape_store(TapeStoreConfig::Sqlite { path: path.clone() })
                .expect("sqlite store should open");
            store
                .append("ops", TapeEntry::anchor("start", None))
                .expect("append should work");
            store
                .append("ops", TapeEntry::message(json!({"role": "user", "content": "hi"})))
                .expect("append should work");
        }

        let reopened = create_tape_store(TapeStoreConfig::Sqlite { path })
            .expect("sqlite store should reopen");
        let entries = reopened
            .read("ops")
            .expect("read should work")
            .expect("tape should exist");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, TapeEntryKind::Anchor);
        assert_eq!(entries[1].id, 2);

        let next = reopened
            .append("ops", TapeEntry::system("later"))
            .expect("append should work");
        assert_eq!(next.id, 3);

        std::fs::remove_dir_all(&root).expect("temporary directory should be removable");
    }

    #[test]
    fn default_config_is_in_memory() {
        let store = create_tape_store(TapeStoreConfig::default()).expect("store");
        assert!(store.list_tapes().expect("list").is_empty());
    }
}
