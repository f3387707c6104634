//! Example demonstrating file watching and automatic hot-reload.
//!
//! This example shows how to:
//! - Decode a configuration file into a value the application owns
//! - Reload automatically when the file changes
//! - React to reloads with a callback, and swap that callback at runtime
//!
//! Run with: cargo run --example hot_reload
//!
//! While running, try editing demos/config/hot_reload.json. Fields you delete
//! from the file keep their previous values.

use hotload_config::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default, Serialize, Deserialize)]
struct AppConfig {
    server: ServerConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ServerConfig {
    port: u16,
    host: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DatabaseConfig {
    url: String,
    max_connections: u32,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Hot Reload Example ===\n");

    // Create an initial config file if it doesn't exist
    let config_path = std::path::Path::new("demos/config/hot_reload.json");
    if !config_path.exists() {
        std::fs::create_dir_all("demos/config")?;
        std::fs::write(
            config_path,
            r#"{
  "server": { "port": 8080, "host": "localhost" },
  "database": { "url": "postgres://localhost/mydb", "max_connections": 10 }
}
"#,
        )?;
        println!("Created {}", config_path.display());
    }

    let config = Arc::new(RwLock::new(AppConfig::default()));
    let session = Session::builder(config_path, Arc::clone(&config))
        .with_bounce_window(BounceWindow::new(
            Duration::from_millis(5),
            Duration::from_millis(250),
        )?)
        .build()?;

    // Track the number of reloads
    let reload_count = Arc::new(AtomicUsize::new(0));
    let (reader, count) = (Arc::clone(&config), Arc::clone(&reload_count));
    session.on_load(move || {
        let n = count.fetch_add(1, Ordering::SeqCst) + 1;
        let cfg = reader.read();
        println!(
            "[Event] Configuration loaded (#{}): {}:{}",
            n, cfg.server.host, cfg.server.port
        );
    });

    session.ready();
    println!("Watching: {}\n", config_path.display());

    println!("===> Try editing {} to see automatic reloads! <===", config_path.display());
    println!("     Example changes:");
    println!("     - Change port: 8080 -> 9090");
    println!("     - Remove the whole \"database\" object (values are kept)");
    println!("\nPress Ctrl+C to exit\n");

    let mut ticks = 0u32;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(5)) => {}
        }
        ticks += 1;

        let count = reload_count.load(Ordering::SeqCst);
        {
            let cfg = config.read();
            println!("[Status] Config check (reloads: {}):", count);
            println!("  Server: {}:{}", cfg.server.host, cfg.server.port);
            println!(
                "  Database: {} (max: {})\n",
                cfg.database.url, cfg.database.max_connections
            );
        }

        // After a minute, switch to a terser callback
        if ticks == 12 {
            let reader = Arc::clone(&config);
            session.on_load(move || println!("[Event] port is now {}", reader.read().server.port));
            println!("Swapped the reload callback\n");
        }
    }

    session.stop_watching();
    println!("Stopped watching, bye");
    Ok(())
}
