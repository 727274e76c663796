// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the compile-and-render pipeline.

mod common;

use std::fs;
use std::time::Duration;

use common::{outlet, Project, ScriptedBundler};
use serde_json::json;
use ssrkit::{BundlerOverrides, Delivery, RenderOverrides, Renderer, Title};

const HELLO: &str = r#"<template><div id="test">Hello, world!</div></template>"#;

const PARENT: &str = r#"<script>
import Child from './Child.vue'
</script>
<template><div id="parent"><p>Parent</p><Child /></div></template>"#;

const CHILD: &str = r#"<template><div id="child"><p>Child</p></div></template>"#;

#[tokio::test]
async fn renders_hello_world_into_the_shell() {
    let project = Project::new().view("Test.vue", HELLO);
    let bundler = ScriptedBundler::new();
    let renderer = project.renderer(false, bundler.clone());

    let html = renderer
        .template_engine("Test.vue", json!({}), &RenderOverrides::default(), Delivery::Respond)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outlet(&html), r#"<div id="test">Hello, world!</div>"#);
    assert!(html.contains("<title>Test.vue</title>"));
    assert!(html.contains("window.__INITIAL_STATE__ = {}"));
    assert!(html.contains("/public/ssr/"));
    assert_eq!(bundler.builds(), 1);
}

#[tokio::test]
async fn parents_render_before_children() {
    let project = Project::new()
        .view("Parent.vue", PARENT)
        .view("Child.vue", CHILD);
    let renderer = project.renderer(false, ScriptedBundler::new());

    let html = renderer
        .template_engine("Parent.vue", json!({}), &RenderOverrides::default(), Delivery::Respond)
        .await
        .unwrap()
        .unwrap();

    let markup = outlet(&html);
    let parent = markup.find("Parent").unwrap();
    let child = markup.find("Child").unwrap();
    assert!(parent < child);
    assert!(markup.starts_with(r#"<div id="parent">"#));
}

#[tokio::test]
async fn context_reaches_the_view_and_the_state_script() {
    let project = Project::new().view(
        "Greeting.vue",
        "<template><h1>Hi {{ name }}</h1></template>",
    );
    let renderer = project.renderer(false, ScriptedBundler::new());

    let html = renderer
        .template_engine(
            "Greeting.vue",
            json!({ "name": "Ada</script>" }),
            &RenderOverrides::titled("Welcome"),
            Delivery::Respond,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outlet(&html), "<h1>Hi Ada</script></h1>");
    assert!(html.contains(r#"window.__INITIAL_STATE__ = {"name":"Ada\u003c/script>"}"#));
    assert!(html.contains("<title>Welcome</title>"));
}

#[tokio::test]
async fn development_mode_rebuilds_every_render() {
    let project = Project::new().view("Test.vue", HELLO);
    let bundler = ScriptedBundler::new();
    let renderer = project.renderer(false, bundler.clone());
    let overrides = RenderOverrides::default();

    renderer
        .template_engine("Test.vue", json!({}), &overrides, Delivery::Respond)
        .await
        .unwrap();
    let stale = renderer.options().output_folder.join("Test/stale.txt");
    fs::write(&stale, "left over").unwrap();

    renderer
        .template_engine("Test.vue", json!({}), &overrides, Delivery::Respond)
        .await
        .unwrap();

    assert_eq!(bundler.builds(), 2);
    assert!(!stale.exists(), "development builds start from an empty folder");
}

#[tokio::test]
async fn production_mode_builds_once() {
    let project = Project::new().view("Test.vue", HELLO);
    let bundler = ScriptedBundler::new();
    let renderer = project.renderer(true, bundler.clone());
    let overrides = RenderOverrides::default();

    for _ in 0..3 {
        let html = renderer
            .template_engine("Test.vue", json!({}), &overrides, Delivery::Respond)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outlet(&html), r#"<div id="test">Hello, world!</div>"#);
    }

    assert_eq!(bundler.builds(), 1);
    let graphs = bundler.seen();
    assert_eq!(graphs[0].client["devtool"], false);
}

#[tokio::test]
async fn concurrent_renders_share_one_build() {
    let project = Project::new().view("Test.vue", HELLO);
    let bundler = ScriptedBundler::slow(Duration::from_millis(150));
    let renderer = project.renderer(false, bundler.clone());
    let overrides = RenderOverrides::default();

    let (first, second) = tokio::join!(
        renderer.template_engine("Test.vue", json!({}), &overrides, Delivery::Respond),
        renderer.template_engine("Test.vue", json!({}), &overrides, Delivery::Respond),
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(bundler.builds(), 1);
}

#[tokio::test]
async fn compile_only_builds_without_rendering() {
    let project = Project::new().view("nested/Page.vue", HELLO);
    let bundler = ScriptedBundler::new();
    let renderer = project.renderer(false, bundler.clone());

    let result = renderer
        .template_engine("nested/Page.vue", json!({}), &RenderOverrides::default(), Delivery::CompileOnly)
        .await
        .unwrap();

    assert!(result.is_none());
    let output = renderer.options().output_folder.join("nested/Page");
    assert!(output.join("manifest.json").is_file());
    assert!(output.join("index.html").is_file());
    assert!(output.join("app.js").is_file());
    assert_eq!(bundler.builds(), 1);
}

#[tokio::test]
async fn missing_input_never_reaches_the_bundler() {
    let project = Project::new();
    let bundler = ScriptedBundler::new();
    let renderer = project.renderer(false, bundler.clone());

    let err = renderer
        .template_engine("", json!({}), &RenderOverrides::default(), Delivery::Respond)
        .await
        .unwrap_err();
    assert!(err.is_configuration());

    let err = renderer
        .template_engine("Missing.vue", json!({}), &RenderOverrides::default(), Delivery::Respond)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert_eq!(bundler.builds(), 0);
}

#[tokio::test]
async fn compilation_errors_surface_as_build_errors() {
    let project = Project::new().view("Broken.vue", "<template><error></template>");
    let renderer = project.renderer(false, ScriptedBundler::new());

    let err = renderer
        .template_engine("Broken.vue", json!({}), &RenderOverrides::default(), Delivery::Respond)
        .await
        .unwrap_err();

    assert!(err.is_build());
    let message = err.to_string();
    assert!(message.contains("Syntax error"), "{}", message);
}

#[tokio::test]
async fn configured_titles_win_over_requested_ones() {
    let project = Project::new().view("Test.vue", HELLO);
    let mut options = project.options(false);
    options.html.title = Some(Title::generator(|requested| {
        format!("{} | Docs", requested.unwrap_or("Home"))
    }));
    let renderer = Renderer::new(Some(options), ScriptedBundler::new()).unwrap();

    let html = renderer
        .template_engine("Test.vue", json!({}), &RenderOverrides::titled("Guide"), Delivery::Respond)
        .await
        .unwrap()
        .unwrap();
    assert!(html.contains("<title>Guide | Docs</title>"));
}

#[tokio::test]
async fn merge_overrides_reach_the_bundler() {
    let project = Project::new().view("Test.vue", HELLO);
    let bundler = ScriptedBundler::new();
    let mut options = project.options(false);
    options.bundler_overrides = BundlerOverrides::merge(
        json!({ "resolve": { "extensions": [".vue", ".ts"] }, "devtool": "eval" }),
        json!({ "externals": ["lpeg"] }),
    );
    let renderer = Renderer::new(Some(options), bundler.clone()).unwrap();

    renderer
        .template_engine("Test.vue", json!({}), &RenderOverrides::default(), Delivery::CompileOnly)
        .await
        .unwrap();

    let graphs = &bundler.seen()[0];
    assert_eq!(graphs.client["devtool"], "eval");
    let extensions = graphs.client["resolve"]["extensions"].as_array().unwrap();
    assert!(extensions.contains(&json!(".ts")));
    assert_eq!(graphs.server["externals"], json!(["lpeg"]));
    assert!(graphs.client["entry"]
        .as_str()
        .unwrap()
        .ends_with("entry-client.js"));
    assert_eq!(
        graphs.server["output"]["path"],
        renderer.options().output_folder.join("Test").to_string_lossy().as_ref()
    );
}

#[tokio::test]
async fn renders_views_outside_the_views_folder() {
    let project = Project::new().file("handlers/About.vue", HELLO);
    let renderer = project.renderer(false, ScriptedBundler::new());
    let file = project.root().join("handlers/About.vue");

    let html = renderer
        .template_engine(
            &file.to_string_lossy(),
            json!({}),
            &RenderOverrides::default(),
            Delivery::Respond,
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outlet(&html), r#"<div id="test">Hello, world!</div>"#);
    assert!(renderer.options().output_folder.join("handlers/About").is_dir());
}
