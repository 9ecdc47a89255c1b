//! CLI command execution for the reference host. Each command returns the
//! text it prints so it can be asserted on directly.

use anyhow::Result;
use gitup_core::LogRotationPolicy;
use gitup_install::{
    ExtractedPackage, FsMover, InstallRoots, PostInstallRelocator, RelocationOutcome,
};
use gitup_update::{
    FetchDiagnosticRecord, FetchDiagnostics, FetcherConfig, GitHubTagFetcher, ResolutionReport,
    SourceKind, UpdateCollection, UpdateResolver,
};
use serde_json::json;

use crate::activation::{JsonActivationStore, ACTIVATION_STORE_FILE_NAME};
use crate::cli::{Cli, CliCheckScope, CliCommand};
use crate::hooks::{before_update_check, InstallHooks, UpdateHooks};
use crate::registry::FilesystemRegistry;

pub const FETCH_DIAGNOSTICS_FILE_NAME: &str = "fetch-diagnostics.jsonl";

pub fn execute_cli_command(cli: &Cli) -> Result<String> {
    match &cli.command {
        CliCommand::Check { kind, json } => execute_check_command(cli, *kind, *json),
        CliCommand::Relocate {
            kind,
            identifier,
            staging,
        } => {
            let extracted = ExtractedPackage {
                destination: staging.clone(),
            };
            let outcome = execute_relocate_command(cli, (*kind).into(), identifier, extracted)?;
            Ok(render_relocation((*kind).into(), identifier, &outcome))
        }
        CliCommand::Headers => Ok(execute_headers_command(cli)),
    }
}

pub fn fetcher_config(cli: &Cli) -> FetcherConfig {
    let mut config = FetcherConfig {
        web_host_prefix: format!("//{}/", cli.web_host.trim().trim_matches('/')),
        timeout_ms: cli.fetch_timeout_ms,
        accept_invalid_certs: cli.insecure_tls,
        ..FetcherConfig::default()
    };
    if let Some(api_base) = cli.api_base.as_deref() {
        config = config.with_api_base(api_base);
    }
    config
}

pub fn build_registry(cli: &Cli) -> FilesystemRegistry {
    let mut registry = FilesystemRegistry::new(&cli.plugins_root, &cli.themes_root);
    before_update_check(registry.recognized_headers_mut());
    registry
}

pub fn build_update_hooks(cli: &Cli) -> UpdateHooks<GitHubTagFetcher, FilesystemRegistry> {
    let diagnostics = FetchDiagnostics::with_journal(
        cli.state_dir.join(FETCH_DIAGNOSTICS_FILE_NAME),
        LogRotationPolicy::from_env(),
    );
    let resolver = UpdateResolver::new(GitHubTagFetcher::new(fetcher_config(cli)))
        .with_policy(cli.tag_policy.into())
        .with_diagnostics(diagnostics);
    UpdateHooks::new(resolver, build_registry(cli))
}

pub fn build_install_hooks(cli: &Cli) -> InstallHooks<FsMover, JsonActivationStore> {
    let roots = InstallRoots {
        plugins_root: cli.plugins_root.clone(),
        themes_root: cli.themes_root.clone(),
    };
    let store = JsonActivationStore::new(
        cli.state_dir.join(ACTIVATION_STORE_FILE_NAME),
        &cli.plugins_root,
    );
    InstallHooks::new(PostInstallRelocator::new(roots, FsMover, store))
}

struct KindCheck {
    kind: SourceKind,
    collection: UpdateCollection,
    report: ResolutionReport,
}

pub fn execute_check_command(cli: &Cli, scope: CliCheckScope, json: bool) -> Result<String> {
    let mut hooks = build_update_hooks(cli);
    let mut checks = Vec::new();
    for kind in scope.kinds() {
        let (collection, report) = match kind {
            SourceKind::Plugin => hooks.check_plugin_updates(UpdateCollection::new())?,
            SourceKind::Theme => hooks.check_theme_updates(UpdateCollection::new())?,
        };
        checks.push(KindCheck {
            kind: *kind,
            collection,
            report,
        });
    }

    if json {
        let mut payload = serde_json::Map::new();
        for check in &checks {
            payload.insert(
                format!("{}s", check.kind),
                json!({
                    "updates": check.collection.response,
                    "errors": check.report.errors,
                }),
            );
        }
        return Ok(serde_json::to_string_pretty(&payload)?);
    }

    let mut lines = Vec::new();
    for check in &checks {
        lines.push(format!(
            "update check: kind={} policy={} eligible={} fetched={} updates={} errors={}",
            check.kind,
            hooks.resolver().policy(),
            check.report.eligible,
            check.report.fetched,
            check.collection.len(),
            check.report.errors.len()
        ));
        for descriptor in check.collection.response.values() {
            lines.push(format!(
                "update: id={} new_version={} slug={} package={}",
                descriptor.component_identifier,
                descriptor.new_version,
                descriptor.canonical_slug,
                descriptor.package_url
            ));
        }
        lines.extend(check.report.errors.iter().map(render_fetch_error));
    }
    Ok(lines.join("\n"))
}

fn render_fetch_error(record: &FetchDiagnosticRecord) -> String {
    format!(
        "fetch error: id={} source={} status={} message={}",
        record.component_identifier,
        record.source_uri,
        record
            .status
            .map(|status| status.to_string())
            .unwrap_or_else(|| "none".to_string()),
        record.message
    )
}

/// Runs one install transaction for a package the host already extracted:
/// snapshot activation, release the old activation the way the host's
/// upgrade pipeline does, then relocate and reactivate.
pub fn execute_relocate_command(
    cli: &Cli,
    kind: SourceKind,
    identifier: &str,
    extracted: ExtractedPackage,
) -> Result<RelocationOutcome> {
    let hooks = build_install_hooks(cli);
    let transaction = hooks.before_install(kind, &[identifier.to_string()]);
    if kind == SourceKind::Plugin && transaction.was_active(identifier) {
        hooks.relocator().activation().deactivate(identifier)?;
    }
    Ok(hooks.after_install(transaction, Ok(extracted), identifier)?)
}

fn render_relocation(kind: SourceKind, identifier: &str, outcome: &RelocationOutcome) -> String {
    format!(
        "relocate: kind={} id={} destination={} moved={} reactivated={}",
        kind,
        identifier,
        outcome.destination.display(),
        outcome.moved,
        outcome
            .reactivated
            .map(|scope| scope.as_str())
            .unwrap_or("none")
    )
}

pub fn execute_headers_command(cli: &Cli) -> String {
    build_registry(cli).recognized_headers().join("\n")
}
