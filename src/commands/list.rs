use anyhow::{Context as _, Result};

use crate::Context;
use crate::cli::ListArgs;
use crate::commands::connect;
use crate::config::Config;
use crate::output;
use crate::ui;

pub fn run(ctx: &Context, args: ListArgs) -> Result<()> {
    let user = args.user.as_deref().unwrap_or_default().trim();
    if user.is_empty() {
        anyhow::bail!("--user is required and must not be empty");
    }

    let destination = args.output.output.as_deref();
    let format = args.output.format;
    let mut out = output::open(destination)?;

    let config = Config::load()?;
    let session = connect(ctx, &config)?;
    let sites = session
        .client
        .list_followed(&session.token, user, args.details)
        .with_context(|| format!("Could not list followed sites for {user}"))?;

    let unavailable = sites
        .iter()
        .filter(|s| s.description.is_unavailable())
        .count();
    if unavailable > 0 {
        log::warn!("Details unavailable for {unavailable} of {} sites", sites.len());
    }

    output::write_sites(&mut out, &sites, args.details, format)
        .context("Failed to write site list")?;
    drop(out);

    if !ctx.quiet && !output::is_machine_stdout(destination, format) {
        if let Some(path) = destination {
            ui::success(&format!(
                "Wrote {} to {}",
                ui::count(sites.len(), "site"),
                path.display()
            ));
        } else if sites.is_empty() {
            ui::info(&format!("{user} follows no sites"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{AuthArgs, OutputArgs, OutputFormat};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context {
            quiet: true,
            auth: AuthArgs::default(),
        }
    }

    fn args(user: Option<&str>, output: Option<PathBuf>) -> ListArgs {
        ListArgs {
            user: user.map(str::to_string),
            details: false,
            output: OutputArgs {
                format: OutputFormat::Json,
                output,
            },
        }
    }

    #[test]
    fn test_missing_user_is_rejected() {
        let err = run(&ctx(), args(None, None)).unwrap_err();
        assert!(err.to_string().contains("--user is required"));

        let err = run(&ctx(), args(Some("  "), None)).unwrap_err();
        assert!(err.to_string().contains("--user is required"));
    }

    #[test]
    fn test_bad_destination_fails_before_connecting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("sites.json");

        let err = run(&ctx(), args(Some("u1"), Some(path))).unwrap_err();
        assert!(format!("{err:#}").contains("Could not create output file"));
    }
}
