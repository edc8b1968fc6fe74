use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubewatch")]
#[command(author, version, about = "Recurring yt-dlp subscriptions, managed from the browser", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server and the download scheduler
    Run {
        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides WEB_HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one download cycle over every subscription, then exit
    Sync,

    /// Print every subscription with its download stats
    Stats,

    /// Print the version of the configured yt-dlp binary
    YtdlpVersion,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
