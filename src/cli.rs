use std::path::PathBuf;
use structopt::StructOpt;

/// Provision Snowflake schemas, users and roles from YAML declarations
#[derive(Debug, StructOpt)]
pub struct Cli {
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Generate random password
    GenPass {
        /// The password length
        #[structopt(short, long, default_value = "32")]
        length: usize,
    },

    /// Apply changes
    Apply {
        /// The path to the file (or directory, with --all) to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,

        /// Dry run
        #[structopt(short, long)]
        dryrun: bool,

        /// Apply all config files in the directory
        #[structopt(short, long)]
        all: bool,
    },

    /// Validate target file
    Validate {
        /// The path to the file to read (optional)
        #[structopt(short, long, parse(from_os_str))]
        file: Option<PathBuf>,
    },

    /// Reset the password of the user of a config file and print the reset URL
    ResetPassword {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,
    },

    /// Make the user of a config file enroll into MFA again
    EnrollMfa {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,
    },

    /// Inspect the warehouse state for a config file
    Inspect {
        /// The path to the file to read
        #[structopt(short, long, parse(from_os_str))]
        file: PathBuf,
    },
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
