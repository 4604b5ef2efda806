use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notepocket")]
#[command(about = "Personal notes in a single local file", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Database file (defaults to the config value, then the platform data dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Legacy key-value file to migrate on startup
    #[arg(long, global = true, value_name = "PATH")]
    pub legacy: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a note
    #[command(alias = "n")]
    Add {
        title: String,

        /// Note body
        #[arg(required = false)]
        content: Option<String>,

        /// text, image or file (inferred from --attach when omitted)
        #[arg(long = "type", value_name = "TYPE")]
        note_type: Option<String>,

        /// Tag to add (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Folder id prefix or name
        #[arg(short, long)]
        folder: Option<String>,

        /// Mark as favorite
        #[arg(long)]
        favorite: bool,

        /// File to attach
        #[arg(long, value_name = "PATH")]
        attach: Option<PathBuf>,
    },

    /// List notes
    #[command(alias = "ls")]
    List {
        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Only notes in this folder (id prefix or name)
        #[arg(short, long, conflicts_with = "unfiled")]
        folder: Option<String>,

        /// Only notes without a folder
        #[arg(long)]
        unfiled: bool,

        /// Only favorites
        #[arg(long)]
        favorites: bool,

        /// Only notes carrying this tag (repeatable, all must match)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Only notes of this type
        #[arg(long = "type", value_name = "TYPE")]
        note_type: Option<String>,

        /// updated, title or type
        #[arg(long, default_value = "updated")]
        sort: String,
    },

    /// Show a note in full
    #[command(alias = "v")]
    Show { id: String },

    /// Change a note
    #[command(alias = "e")]
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        /// Replace tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Option<Vec<String>>,

        /// Move into folder (id prefix or name)
        #[arg(short, long, conflicts_with = "unfile")]
        folder: Option<String>,

        /// Remove from its folder
        #[arg(long)]
        unfile: bool,

        #[arg(long, conflicts_with = "unfavorite")]
        favorite: bool,

        #[arg(long)]
        unfavorite: bool,
    },

    /// Delete one or more notes
    Rm {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },

    /// Create a folder
    FolderAdd {
        name: String,

        #[arg(short, long, default_value = "#3b82f6")]
        color: String,
    },

    /// List folders
    Folders,

    /// Delete a folder (its notes become unfiled)
    FolderRm { folder: String },

    /// Search notes
    Search { term: String },

    /// Export everything as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Import a JSON export
    Import { path: PathBuf },

    /// Migrate data from a legacy key-value JSON file
    Migrate { legacy: PathBuf },

    /// Show which backend is active
    Status,
}
