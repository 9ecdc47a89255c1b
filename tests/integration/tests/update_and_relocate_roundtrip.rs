use std::fs;
use std::path::Path;

use anyhow::Result;
use gitup_host::{InstallHooks, JsonActivationStore, UpdateHooks};
use gitup_install::{
    ActivationRegistry, ActivationScope, ExtractedPackage, FsMover, InstallRoots,
    PostInstallRelocator,
};
use gitup_update::{
    ComponentDescriptor, ComponentRegistry, FetcherConfig, GitHubTagFetcher, SourceKind,
    UpdateCollection, UpdateResolver,
};
use httpmock::prelude::*;

struct StaticRegistry {
    components: Vec<ComponentDescriptor>,
}

impl ComponentRegistry for StaticRegistry {
    fn list_components(&self, kind: SourceKind) -> Result<Vec<ComponentDescriptor>> {
        Ok(self
            .components
            .iter()
            .filter(|component| component.source_kind == kind)
            .cloned()
            .collect())
    }
}

fn plugin(identifier: &str, version: &str, source: Option<String>) -> ComponentDescriptor {
    ComponentDescriptor {
        identifier: identifier.to_string(),
        display_name: identifier.to_string(),
        current_version: version.to_string(),
        remote_source_uri: source,
        source_kind: SourceKind::Plugin,
    }
}

fn mock_fetcher(server: &MockServer) -> GitHubTagFetcher {
    GitHubTagFetcher::new(FetcherConfig {
        web_host_prefix: format!("//{}/", server.address()),
        ..FetcherConfig::default().with_api_base(&server.url("/repos"))
    })
}

fn source(server: &MockServer, repo: &str) -> Option<String> {
    Some(format!("http://{}/{repo}", server.address()))
}

#[test]
fn integration_widget_with_newer_tag_yields_descriptor_through_plugin_hook() {
    let server = MockServer::start();
    let tags = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widget/tags");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"name":"1.1.0","zipball_url":"https://codeload.example/acme/widget/1.1.0.zip","commit":{"url":"https://api.example/commits/abc"}}]"#);
    });
    let registry = StaticRegistry {
        components: vec![plugin("acme/widget", "1.0.0", source(&server, "acme/widget"))],
    };
    let mut hooks = UpdateHooks::new(UpdateResolver::new(mock_fetcher(&server)), registry);

    let (collection, report) = hooks
        .check_plugin_updates(UpdateCollection::new())
        .expect("plugin check");
    tags.assert();

    let descriptor = collection.descriptor("acme/widget").expect("descriptor");
    assert_eq!(descriptor.component_identifier, "acme/widget");
    assert_eq!(descriptor.new_version, "1.1.0");
    assert_eq!(
        descriptor.package_url,
        "https://codeload.example/acme/widget/1.1.0.zip"
    );
    assert_eq!(report.produced, vec!["acme/widget".to_string()]);
    assert!(collection.remote_checked);

    let (_, second) = hooks.check_plugin_updates(collection).expect("re-check");
    assert!(second.already_checked);
    tags.assert_calls(1);
}

#[test]
fn regression_not_found_repository_is_diagnosed_without_blocking_other_components() {
    let server = MockServer::start();
    let missing = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/gone/tags");
        then.status(404).body(r#"{"message":"Not Found"}"#);
    });
    let found = server.mock(|when, then| {
        when.method(GET).path("/repos/acme/widget/tags");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"name":"2.0.0","zipball_url":"https://x/2.0.0.zip"}]"#);
    });
    let registry = StaticRegistry {
        components: vec![
            plugin("acme/gone.php", "1.0.0", source(&server, "acme/gone")),
            plugin("acme/widget.php", "1.0.0", source(&server, "acme/widget")),
            plugin("local/only.php", "1.0.0", None),
        ],
    };
    let mut hooks = UpdateHooks::new(UpdateResolver::new(mock_fetcher(&server)), registry);

    let (collection, report) = hooks
        .check_plugin_updates(UpdateCollection::new())
        .expect("plugin check");
    missing.assert();
    found.assert();

    assert!(!collection.has_descriptor("acme/gone.php"));
    assert!(!collection.has_descriptor("local/only.php"));
    assert!(collection.has_descriptor("acme/widget.php"));
    assert_eq!(report.eligible, 2);
    let diagnostics = hooks.resolver().diagnostics().records();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].component_identifier, "acme/gone.php");
    assert_eq!(diagnostics[0].status, Some(404));
    assert_eq!(diagnostics[0].raw_response, r#"{"message":"Not Found"}"#);
}

#[tokio::test(flavor = "multi_thread")]
async fn integration_resolution_pass_runs_inside_an_async_host_runtime() {
    let server = MockServer::start_async().await;
    let tags = server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/widget/tags");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"name":"1.3.0","zipball_url":"https://x/1.3.0.zip"},{"name":"1.2.5","zipball_url":"https://x/1.2.5.zip"}]"#);
        })
        .await;
    let registry = StaticRegistry {
        components: vec![plugin(
            "acme/widget.php",
            "1.2.0",
            source(&server, "acme/widget"),
        )],
    };
    let mut hooks = UpdateHooks::new(UpdateResolver::new(mock_fetcher(&server)), registry);

    let (collection, _) = hooks
        .check_plugin_updates(UpdateCollection::new())
        .expect("plugin check");
    tags.assert_async().await;
    assert_eq!(
        collection
            .descriptor("acme/widget.php")
            .map(|descriptor| descriptor.new_version.as_str()),
        Some("1.3.0")
    );
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn integration_install_transaction_relocates_renamed_archive_and_restores_network_activation() {
    let temp = tempfile::tempdir().expect("tempdir");
    let plugins = temp.path().join("plugins");
    let roots = InstallRoots {
        plugins_root: plugins.clone(),
        themes_root: temp.path().join("themes"),
    };
    write(&plugins.join("widget/widget.php"), "<?php // 1.0.0");
    let store = JsonActivationStore::new(temp.path().join("state/active.json"), &plugins);
    store
        .activate("widget/widget.php", ActivationScope::Network)
        .expect("activate");
    let hooks = InstallHooks::new(PostInstallRelocator::new(roots, FsMover, store));

    let transaction = hooks.before_install(SourceKind::Plugin, &["widget/widget.php".to_string()]);
    // The host drops the activation while it replaces the package files.
    hooks
        .relocator()
        .activation()
        .deactivate("widget/widget.php")
        .expect("deactivate");
    let staging = plugins.join("acme-widget-3f9a0c2");
    write(&staging.join("widget.php"), "<?php // 1.1.0");

    let outcome = hooks
        .after_install(
            transaction,
            Ok(ExtractedPackage {
                destination: staging.clone(),
            }),
            "widget/widget.php",
        )
        .expect("after install");

    assert!(outcome.moved);
    assert_eq!(outcome.destination, plugins.join("widget"));
    assert_eq!(outcome.reactivated, Some(ActivationScope::Network));
    assert!(!staging.exists());
    assert_eq!(
        fs::read_to_string(plugins.join("widget/widget.php")).expect("read"),
        "<?php // 1.1.0"
    );
    assert!(hooks
        .relocator()
        .activation()
        .is_active_network_wide("widget/widget.php"));
}
