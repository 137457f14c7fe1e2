//! Chat-facing conveniences built on the command router.
//!
//! Cross-cutting by nature, but constructed from the individual handles
//! it needs rather than the whole supervisor.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::subsystem::commands::CommandRouter;
use crate::subsystem::localization::LocalizationService;
use crate::subsystem::strings::StringDecoder;

pub struct ChatFeatureSet {
    router: Arc<CommandRouter>,
    aliases: Vec<&'static str>,
}

impl ChatFeatureSet {
    pub fn new(
        router: Arc<CommandRouter>,
        localization: Arc<LocalizationService>,
        strings: Arc<StringDecoder>,
    ) -> Result<Self> {
        let loc = Arc::clone(&localization);
        router.register("echo", "Echo a message back to chat", move |args| {
            info!("{}: {}", loc.get("chat.echo"), args);
        })?;

        let decoder = Arc::clone(&strings);
        router.register(
            "say",
            "Send a string-table entry to chat (table index)",
            move |args| {
                let mut parts = args.split_whitespace();
                let (Some(table), Some(index)) = (parts.next(), parts.next()) else {
                    info!("usage: /say <table> <index>");
                    return;
                };
                match index.parse::<usize>().map_err(|e| e.to_string()) {
                    Ok(index) => match decoder.decode(table, index) {
                        Ok(text) => info!("{}", text),
                        Err(e) => info!("lookup failed: {}", e),
                    },
                    Err(e) => info!("bad index: {}", e),
                }
            },
        )?;

        debug!("Chat features installed");
        Ok(Self {
            router,
            aliases: vec!["echo", "say"],
        })
    }

    pub fn dispose(&mut self) {
        for alias in self.aliases.drain(..) {
            self.router.unregister(alias);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::assets::{DataAssets, write_table};
    use std::fs;

    fn fixture() -> (tempfile::TempDir, Arc<CommandRouter>, ChatFeatureSet) {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        fs::create_dir_all(&tables).unwrap();
        write_table(tables.join("ui.tbl"), &[b"hello".as_slice()]).unwrap();

        let router = Arc::new(CommandRouter::new());
        let loc = Arc::new(LocalizationService::new(dir.path(), Some("en")));
        let assets = Arc::new(DataAssets::new(dir.path(), "en").unwrap());
        let strings = Arc::new(StringDecoder::new(assets));
        let chat = ChatFeatureSet::new(Arc::clone(&router), loc, strings).unwrap();
        (dir, router, chat)
    }

    #[test]
    fn test_installs_chat_commands() {
        let (_dir, router, _chat) = fixture();
        assert!(router.dispatch("/echo hi"));
        assert!(router.dispatch("/say ui 0"));
    }

    #[test]
    fn test_dispose_removes_commands() {
        let (_dir, router, mut chat) = fixture();
        chat.dispose();
        assert!(!router.dispatch("/echo hi"));
        assert!(!router.dispatch("/say ui 0"));
    }
}
