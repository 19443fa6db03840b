use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (falls back to $FINGERSPELL_CONFIG, then config.yaml)
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay every recorded session in session.input_dir (default)
    Replay,

    /// Write the AVERAGE entry for one sign into the corpus
    Average {
        /// RIGHT or LEFT
        hand: String,
        symbol: String,
    },

    /// Sample a recorded session into the next numbered capture of a sign
    Capture {
        /// Session file holding the held pose
        session: String,
        /// Symbol being captured
        symbol: String,
    },

    /// Write opposite-hand copies of every entry recorded with HAND
    Mirror {
        /// RIGHT or LEFT
        hand: String,
    },
}
