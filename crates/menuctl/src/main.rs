//! Menu Control - CLI client for the menud daemon.

mod client;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "menuctl")]
#[command(about = "WhatTheMenu - dish explanation client", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:7878", global = true)]
    server: String,

    /// Bearer token for the authenticated quota tier
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain a dish, from cache or freshly generated
    Explain {
        /// Dish name as printed on the menu
        dish: String,

        /// Display language (en, es, zh, fr)
        #[arg(long, default_value = "en")]
        language: String,

        /// Restaurant id, enables the same-restaurant match bonus
        #[arg(long)]
        restaurant_id: Option<String>,

        /// Restaurant name stored with a fresh explanation
        #[arg(long)]
        restaurant_name: Option<String>,
    },

    /// Search the explanation corpus
    Search {
        /// Query text
        query: String,

        /// Display language slice to search (en, es, zh, fr)
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Show daemon health and corpus size
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = client::MenuClient::new(cli.server, cli.token);

    match cli.command {
        Commands::Explain {
            dish,
            language,
            restaurant_id,
            restaurant_name,
        } => commands::explain(&client, dish, language, restaurant_id, restaurant_name).await,
        Commands::Search { query, language } => commands::search(&client, query, language).await,
        Commands::Health => commands::health(&client).await,
    }
}
