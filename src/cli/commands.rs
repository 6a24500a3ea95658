use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Initialize the server (create the database and optionally a manager account)
    Init {
        /// Data directory for the database and archives
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Create this user with the global manager role
        #[arg(long, requires = "password")]
        username: Option<String>,

        /// Password for --username
        #[arg(long)]
        password: Option<String>,
    },

    /// Create or replace a user
    UpdateUser {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        username: String,

        /// New password; the stored one is kept when omitted
        #[arg(long)]
        password: Option<String>,

        #[arg(long)]
        email: Option<String>,

        /// Global roles, comma separated (replaces the current set)
        #[arg(long)]
        roles: Option<String>,
    },

    /// Create a group and optionally set its global roles
    UpdateGroup {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        groupname: String,

        /// Global roles, comma separated (replaces the current set)
        #[arg(long)]
        roles: Option<String>,
    },

    /// Replace the groups a user belongs to
    SetGroups {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        username: String,

        groups: Vec<String>,
    },

    /// Replace the roles of a user or group, globally or on one distribution
    SetRoles {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        /// Distribution scope; global when omitted
        #[arg(long)]
        distro: Option<String>,

        #[arg(long, conflicts_with = "group", required_unless_present = "group")]
        user: Option<String>,

        #[arg(long)]
        group: Option<String>,

        /// Roles, comma separated; empty revokes everything in the scope
        #[arg(default_value = "")]
        roles: String,
    },

    /// Let anonymous clients read a distribution
    MakePublic {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        distro: String,
    },

    /// Register a distribution or update its metadata
    AddDistro {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        name: String,

        /// Owner recorded when the distribution is created
        #[arg(long, default_value = "admin")]
        owner: String,

        #[arg(long)]
        summary: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        home_page: Option<String>,

        #[arg(long)]
        version: Option<String>,
    },

    /// Store an archive file for a distribution
    AddFile {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        distro: String,

        path: PathBuf,
    },

    /// Pin a distribution version into a custom index
    AddPin {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        distro: String,

        index: String,

        /// Requirement of the form "name==version"
        requirement: String,
    },

    /// Remove a pin from a custom index
    RemovePin {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        distro: String,

        index: String,

        /// Target distribution name
        target: String,
    },

    /// Replace a custom index from a requirements file
    SetupIndex {
        #[arg(long, default_value = "./data")]
        data_dir: String,

        distro: String,

        index: String,

        /// File with one "name==version" per line; '#' starts a comment
        requirements: PathBuf,

        /// Replace the index if it already exists
        #[arg(long)]
        overwrite: bool,
    },
}
