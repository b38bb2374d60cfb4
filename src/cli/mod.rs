//! CLI module - Command-line interface for Rassegna
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rassegna - daily press digest archive
#[derive(Parser)]
#[command(name = "rassegna")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default search path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web API server
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage the digest archive
    Digest {
        #[command(subcommand)]
        command: DigestCommands,
    },

    /// Show the most recent digest views
    #[command(alias = "log")]
    Activity {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show usage statistics
    Stats {
        /// Trailing window in days
        #[arg(short, long, default_value = "30")]
        days: u32,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List all accounts
    #[command(alias = "ls")]
    List,
    /// Add an account
    Add {
        username: String,
        /// Initial password; generated when omitted
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete an account
    #[command(alias = "rm")]
    Delete { username: String },
    /// Reset an account's password
    Passwd {
        username: String,
        /// New password; generated when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Set or clear an account's e-mail address
    Email {
        username: String,
        /// Omit to clear
        email: Option<String>,
    },
    /// Persist the administrator account into an empty store
    Bootstrap {
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum DigestCommands {
    /// List digests, newest first
    #[command(alias = "ls")]
    List,
    /// Upload a PDF as the digest for a date
    Upload {
        /// YYYY-MM-DD
        date: String,
        file: PathBuf,
    },
    /// Delete the digest for a date
    #[command(alias = "rm")]
    Delete { date: String },
    /// Move a digest to another date
    #[command(alias = "mv")]
    Rename { from: String, to: String },
}

pub use commands::*;
