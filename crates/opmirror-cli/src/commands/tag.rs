//! `opmirror tag`: create the version tag of every mirrored operator.

use crate::output::StyledOutput;
use opmirror::{GitCli, MirrorsDir, OperatorsFile};
use std::path::PathBuf;
use termcolor::ColorChoice;

/// Arguments for the tag command.
pub struct TagArgs {
    pub config: PathBuf,
    pub mirrors_path: PathBuf,
    pub repo: Option<PathBuf>,
    pub color: ColorChoice,
}

pub fn execute(args: TagArgs) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(args.color);

    let registry = OperatorsFile::from_file(&args.config)?;
    let mirrors = MirrorsDir::new(&args.mirrors_path);
    let (git, mirrors) = match &args.repo {
        Some(dir) => (GitCli::in_dir(dir), mirrors.in_repo(dir)),
        None => (GitCli::new(), mirrors),
    };

    let report = registry.tag(&mirrors, &git)?;

    for name in &report.present {
        out.dim(&format!("  exists  {}", name));
        out.newline();
    }
    for name in &report.created {
        out.success("  created ");
        out.plain(name);
        out.newline();
    }

    if report.created_count() == 0 {
        out.warning("No tags created");
        out.plain(": every operator version is already tagged");
        out.newline();
    } else {
        out.plain(&format!("Created {} tag(s). Push them with ", report.created_count()));
        out.bold("git push origin --tags");
        out.newline();
    }
    out.flush();

    Ok(())
}
