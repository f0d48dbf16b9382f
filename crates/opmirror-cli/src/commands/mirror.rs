//! `opmirror mirror`: republish each operator's API surface.

use crate::output::StyledOutput;
use opmirror::{DependencyLocker, GoModTidy, MirrorSettings, OperatorsFile, RewriteMode, SkipLock};
use std::path::PathBuf;
use termcolor::ColorChoice;

/// Arguments for the mirror command.
pub struct MirrorArgs {
    pub config: PathBuf,
    pub mirrors_path: PathBuf,
    pub root_module: String,
    pub target: Option<String>,
    pub rewrite: RewriteMode,
    pub no_tidy: bool,
    pub color: ColorChoice,
}

pub fn execute(args: MirrorArgs) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(args.color);

    let registry = OperatorsFile::from_file(&args.config)?;
    let settings =
        MirrorSettings::new(&args.mirrors_path, &args.root_module).with_rewrite(args.rewrite);

    let tidy = GoModTidy::new();
    let locker: &dyn DependencyLocker = if args.no_tidy { &SkipLock } else { &tidy };

    if registry.select(args.target.as_deref()).is_empty() {
        out.warning("Nothing to mirror");
        match &args.target {
            Some(target) => out.plain(&format!(": no operator with slug `{}`", target)),
            None => out.plain(&format!(": {} lists no operators", args.config.display())),
        }
        out.newline();
        return Ok(());
    }

    let reports = registry.process(&settings, args.target.as_deref(), locker)?;

    for report in &reports {
        out.success("Mirrored ");
        out.bold(&report.slug);
        out.plain(" -> ");
        out.info(&report.mirror_module);
        out.newline();
        out.dim(&format!(
            "  {} API files, {} internal packages, {} files rewritten ({})",
            report.api_files,
            report.packages.len(),
            report.rewritten.len(),
            report.mirror_dir.display()
        ));
        out.newline();
    }
    out.flush();

    Ok(())
}
