use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::ConfigOverrides;

#[derive(Debug, Parser)]
#[command(name = "voicereport")]
#[command(version, about = "Talk to your reports", long_about = None)]
pub struct Cli {
    /// Report assistant backend base URL
    #[arg(long, global = true, env = "VOICEREPORT_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Web app origin serving /api/session
    #[arg(long, global = true, env = "VOICEREPORT_APP_URL")]
    pub app_url: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Input device id for this run (see `devices`)
    #[arg(long, global = true)]
    pub device: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend_url: self.backend_url.clone(),
            app_url: self.app_url.clone(),
            log_level: self.log_level.clone(),
            device: self.device.clone(),
        }
    }
}

/// Where a spoken reply goes.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReplyArgs {
    /// Write the reply here instead of the replies directory
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Open the reply with the system player
    #[arg(long)]
    pub play: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the web app session cookie
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored session cookie
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List your reports
    Reports,
    /// Download a report document
    Download {
        report_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upload a report file for analysis
    Upload { file: PathBuf },
    /// Show the conversation for a report
    History {
        #[arg(long)]
        report: Option<String>,
    },
    /// Ask a typed question about a report
    Ask {
        text: String,
        #[arg(long)]
        report: Option<String>,
        #[command(flatten)]
        reply: ReplyArgs,
    },
    /// Ask by voice; press Enter to stop recording
    Talk {
        #[arg(long)]
        report: Option<String>,
        #[command(flatten)]
        reply: ReplyArgs,
    },
    /// Try the assistant without an account
    Demo {
        #[command(subcommand)]
        action: DemoAction,
    },
    /// List reply languages, accents and voices
    Voices,
    /// List input devices, or pick one
    Devices {
        /// Remember this device for future runs
        #[arg(long, conflicts_with = "reset")]
        select: Option<String>,
        /// Go back to the system default device
        #[arg(long)]
        reset: bool,
    },
    /// Show config, log and data locations
    Paths,
}

#[derive(Debug, Subcommand)]
pub enum DemoAction {
    /// Have a sentence read back
    Ask {
        text: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        accent: Option<String>,
        #[arg(long)]
        voice: Option<String>,
        #[command(flatten)]
        reply: ReplyArgs,
    },
    /// Ask by voice; press Enter to stop recording
    Talk {
        #[command(flatten)]
        reply: ReplyArgs,
    },
}
