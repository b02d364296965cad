use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::assemble::AssembledCall;
use crate::sync::CallWriter;

use super::markdown::{IndexEntry, call_to_markdown, client_folder, client_index, generate_filename};

/// Writes assembled calls as markdown files under
/// `<root>/transcripts/<client-slug>/`, one file per call, with a README
/// index per client.
pub struct LocalWriter {
    root: PathBuf,
    update_existing: bool,
    index: Mutex<HashMap<String, ClientIndex>>,
}

struct ClientIndex {
    client_name: String,
    entries: Vec<IndexEntry>,
}

impl LocalWriter {
    pub fn new(root: PathBuf, update_existing: bool) -> Self {
        Self {
            root,
            update_existing,
            index: Mutex::new(HashMap::new()),
        }
    }

    fn client_dir(&self, folder: &str) -> PathBuf {
        self.root.join("transcripts").join(folder)
    }
}

#[async_trait]
impl CallWriter for LocalWriter {
    async fn write_call(&self, call: &AssembledCall) -> Result<()> {
        let folder = client_folder(call);
        let dir = self.client_dir(&folder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {dir:?}"))?;

        let filename = generate_filename(call);
        let path = dir.join(&filename);

        // An existing file already counts as persisted; it still belongs in
        // the client index.
        if path.exists() && !self.update_existing {
            debug!("{folder}/{filename} exists, skipping");
        } else {
            fs::write(&path, call_to_markdown(call))
                .with_context(|| format!("Failed to write {path:?}"))?;
            info!("Wrote {folder}/{filename}");
        }

        let mut index = self.index.lock().await;
        index
            .entry(folder)
            .or_insert_with(|| ClientIndex {
                client_name: call.client_name.clone(),
                entries: Vec::new(),
            })
            .entries
            .push(IndexEntry::for_call(call));
        Ok(())
    }

    async fn finish(&self) -> Result<()> {
        let index = self.index.lock().await;
        for (folder, client) in index.iter() {
            let path = self.client_dir(folder).join("README.md");
            fs::write(&path, client_index(&client.client_name, &client.entries))
                .with_context(|| format!("Failed to write index {path:?}"))?;
        }
        Ok(())
    }
}
