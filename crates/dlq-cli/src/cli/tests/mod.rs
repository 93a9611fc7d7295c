//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_fetch_urls() {
    match parse(&["dlq", "fetch", "https://cdn.test/a.png", "https://cdn.test/b.png"]) {
        CliCommand::Fetch {
            urls,
            force,
            jobs,
            out,
            images,
        } => {
            assert_eq!(urls, vec!["https://cdn.test/a.png", "https://cdn.test/b.png"]);
            assert!(force.is_empty());
            assert!(jobs.is_none());
            assert!(out.is_none());
            assert!(!images);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_repeated_force() {
    match parse(&[
        "dlq",
        "fetch",
        "https://cdn.test/a.png",
        "--force",
        "https://cdn.test/b.png",
        "--force",
        "https://cdn.test/c.png",
    ]) {
        CliCommand::Fetch { urls, force, .. } => {
            assert_eq!(urls, vec!["https://cdn.test/a.png"]);
            assert_eq!(force, vec!["https://cdn.test/b.png", "https://cdn.test/c.png"]);
        }
        _ => panic!("expected Fetch with --force"),
    }
}

#[test]
fn cli_parse_fetch_force_only() {
    match parse(&["dlq", "fetch", "--force", "https://cdn.test/b.png"]) {
        CliCommand::Fetch { urls, force, .. } => {
            assert!(urls.is_empty());
            assert_eq!(force.len(), 1);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_jobs_out_images() {
    match parse(&[
        "dlq",
        "fetch",
        "https://cdn.test/a.png",
        "--jobs",
        "2",
        "--out",
        "/tmp/assets",
        "--images",
    ]) {
        CliCommand::Fetch {
            jobs, out, images, ..
        } => {
            assert_eq!(jobs.map(|n| n.get()), Some(2));
            assert_eq!(out.as_deref(), Some(Path::new("/tmp/assets")));
            assert!(images);
        }
        _ => panic!("expected Fetch with options"),
    }
}

#[test]
fn cli_parse_fetch_rejects_zero_jobs() {
    assert!(Cli::try_parse_from(["dlq", "fetch", "https://cdn.test/a.png", "--jobs", "0"]).is_err());
}

#[test]
fn cli_parse_fetch_requires_a_url() {
    assert!(Cli::try_parse_from(["dlq", "fetch"]).is_err());
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["dlq", "config"]), CliCommand::Config));
}
