use anyhow::{Context as _, Result};
use colored::Colorize;
use graphkit::{
    ExactIdMatcher, LooseMatcher, Report, ResolveOptions, SiteMatcher, Summary, UserSource,
};

use crate::Context;
use crate::cli::FollowArgs;
use crate::commands::connect;
use crate::config::{Config, FollowConfig};
use crate::output;
use crate::progress::BarProgress;
use crate::ui;

pub fn run(ctx: &Context, args: FollowArgs) -> Result<()> {
    let sites: Vec<String> = args
        .sites
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    if sites.is_empty() {
        anyhow::bail!("No sites to follow: --site values are all empty");
    }

    let destination = args.output.output.as_deref();
    let format = args.output.format;
    let machine_stdout = output::is_machine_stdout(destination, format);
    let mut out = output::open(destination)?;

    let config = Config::load()?;
    let overrides = FollowConfig {
        max_attempts: args.max_attempts,
        retry_delay_ms: args.retry_delay_ms,
        pair_delay_ms: args.pair_delay_ms,
    };
    let options = config.follow.overlay(&overrides).to_options(args.dry_run);

    let source = user_source(&args);
    let session = connect(ctx, &config)?;
    let users = session.client.resolve_users(
        &session.token,
        &args.users,
        &source,
        &ResolveOptions {
            validate: args.validate_users,
        },
    )?;

    if !ctx.quiet && !machine_stdout {
        ui::header(if options.dry_run {
            "Checking Follows (dry run)"
        } else {
            "Following Sites"
        });
        ui::kv("Users", &users.len().to_string());
        ui::kv("Sites", &sites.len().to_string());
        ui::kv("Pairs", &(users.len() * sites.len()).to_string());
        ui::kv("Attempts per pair", &options.max_attempts.to_string());
        println!();
    }

    let matcher: &dyn SiteMatcher = if args.exact_match {
        &ExactIdMatcher
    } else {
        &LooseMatcher
    };
    let mut progress = BarProgress::new(ctx.quiet);
    let report = session.client.follow_all(
        &session.token,
        &users,
        &sites,
        &options,
        matcher,
        &mut progress,
    );

    output::write_outcomes(&mut out, report.outcomes(), format)
        .context("Failed to write follow report")?;
    drop(out);

    if !ctx.quiet && !machine_stdout {
        if let Some(path) = destination {
            ui::success(&format!(
                "Wrote {} to {}",
                ui::count(report.len(), "outcome"),
                path.display()
            ));
        }
        print_summary(&report, options.dry_run);
    }

    Ok(())
}

fn user_source(args: &FollowArgs) -> UserSource {
    if args.all_users {
        UserSource::AllUsers
    } else if let Some(group) = &args.group {
        UserSource::Group(group.clone())
    } else {
        UserSource::None
    }
}

fn print_summary(report: &Report, dry_run: bool) {
    let summary = report.summary();

    ui::header("Summary");
    ui::kv("Total", &summary.total.to_string());
    ui::kv("Already following", &summary.already_following.to_string());
    if !dry_run {
        ui::kv("Write accepted", &summary.succeeded.to_string());
        ui::kv("Failed", &summary.failed.to_string());
    }
    ui::kv("Verified", &summary.verified.to_string());

    print_verification(&summary, dry_run);
}

fn print_verification(summary: &Summary, dry_run: bool) {
    ui::section("Final verification");

    if summary.is_success() {
        ui::success(&format!(
            "All {} verified",
            ui::count(summary.total, "pair")
        ));
        return;
    }

    let label = if dry_run {
        "not yet following"
    } else {
        "not verified"
    };
    ui::warn(&format!(
        "{} {label}:",
        ui::count(summary.unverified.len(), "pair")
    ));
    for pair in &summary.unverified {
        println!("  {} {} -> {}", "•".yellow(), pair.user, pair.site);
    }
    if !dry_run && summary.accepted_unverified() > 0 {
        ui::dim(&format!(
            "{} accepted by the API but not yet visible; re-run later to confirm",
            summary.accepted_unverified()
        ));
    }
}
