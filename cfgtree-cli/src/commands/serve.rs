//! `cfgtree serve` — run an in-memory coordination tree for local use.

use std::net::TcpListener;

use anyhow::{Context, Result};
use clap::Args;

use cfgtree_sync::{server, MemoryTree};

/// Arguments for `cfgtree serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:2181")]
    pub listen: String,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.listen)
            .with_context(|| format!("cannot listen on {}", self.listen))?;
        println!("Serving an in-memory coordination tree on {}", self.listen);
        println!("The tree is discarded when this process exits.");
        let mut tree = MemoryTree::new();
        server::serve(&listener, &mut tree).context("coordination server stopped")?;
        Ok(())
    }
}
