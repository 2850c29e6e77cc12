use crate::core::types::Surface;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatwarden")]
#[command(author, version, about = "Moderating LLM gateway for chat communities", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a single message through the gateway
    Ask {
        text: String,

        /// Identity the message is sent as
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        #[arg(short, long, default_value = "public")]
        surface: Surface,

        /// Free-form context label (channel name, room topic)
        #[arg(short, long, default_value = "")]
        context: String,
    },

    /// Start an interactive session; admin commands work when --user is the owner
    Interactive {
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        #[arg(short, long, default_value = "private")]
        surface: Surface,
    },

    /// Submit every line of a file concurrently
    Batch {
        file: String,

        #[arg(short, long, default_value = "cli-user")]
        user: String,

        #[arg(long, default_value = "5")]
        concurrency: usize,
    },

    /// Print the safety verdict for a piece of text
    Classify { text: String },
}
