//! opmirror command-line tool
//!
//! `mirror` republishes the API surface of each registered operator under the
//! mirrors directory; `tag` records each mirrored version as a VCS tag.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use opmirror::{RewriteMode, DEFAULT_OPERATORS_FILE};
use output::StyledOutput;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opmirror")]
#[command(about = "Mirror operator API packages into standalone Go modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy, rewrite and tidy every registered operator's API surface
    Mirror {
        /// Operators registry
        #[arg(short, long, default_value = DEFAULT_OPERATORS_FILE)]
        config: PathBuf,
        /// Directory receiving one mirror per operator, relative to the hosting repository
        #[arg(short, long, default_value = "mirrors")]
        mirrors_path: PathBuf,
        /// Module path of the repository hosting the mirrors
        #[arg(short, long)]
        root_module: String,
        /// Only mirror the operator with this slug
        #[arg(short, long)]
        target: Option<String>,
        /// What to rewrite: imports or textual
        #[arg(long, default_value_t = RewriteMode::Imports)]
        rewrite: RewriteMode,
        /// Skip `go mod tidy`
        #[arg(long)]
        no_tidy: bool,
    },

    /// Create missing version tags for every registered operator
    Tag {
        /// Operators registry
        #[arg(short, long, default_value = DEFAULT_OPERATORS_FILE)]
        config: PathBuf,
        /// Directory holding the mirrors, relative to the repository
        #[arg(short, long, default_value = "mirrors")]
        mirrors_path: PathBuf,
        /// Repository to tag (defaults to the current directory)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let color_choice = output::resolve_color_choice(Some(&cli.color));

    let result = match cli.command {
        Commands::Mirror {
            config,
            mirrors_path,
            root_module,
            target,
            rewrite,
            no_tidy,
        } => commands::mirror::execute(commands::mirror::MirrorArgs {
            config,
            mirrors_path,
            root_module,
            target,
            rewrite,
            no_tidy,
            color: color_choice,
        }),

        Commands::Tag {
            config,
            mirrors_path,
            repo,
        } => commands::tag::execute(commands::tag::TagArgs {
            config,
            mirrors_path,
            repo,
            color: color_choice,
        }),
    };

    if let Err(e) = result {
        let mut out = StyledOutput::new(color_choice);
        out.stderr_error("error: ");
        out.stderr_plain(&format!("{}\n", error_message(&e)));
        std::process::exit(1);
    }
}

/// Library errors already spell out their causes in their own message, so
/// only the outermost message is printed.
fn error_message(err: &anyhow::Error) -> String {
    err.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opmirror::{MirrorSettings, OperatorConfig, SkipLock};
    use std::path::Path;

    #[test]
    fn test_wrapped_error_printed_once() {
        let op = OperatorConfig {
            slug: "widgets".to_string(),
            name: None,
            upstream: PathBuf::from("/opmirror/no/such/upstream"),
            version: "v1.0.0".to_string(),
            api_paths: vec!["api".to_string()],
            module: None,
        };
        let settings = MirrorSettings::new("mirrors", "example.com/mirror");
        let err = op.mirror(Path::new("."), &settings, &SkipLock).unwrap_err();

        let message = error_message(&anyhow::Error::from(err));

        assert_eq!(
            message,
            "operator widgets: Invalid configuration in /opmirror/no/such/upstream: upstream checkout is not a directory"
        );
    }
}
