use super::*;
use crate::cascade::{merge_config, resolve_index_config, CascadeContext, EffectiveConfig};
use crate::document::{emojize, parse_source};
use crate::html::{escape_markdown, revealjs_options, SlideRenderer};
use crate::links::{find_relative_targets, rewrite_locations};
use crate::preprocess::run_preprocess_script;
use std::collections::HashSet;
use crate::navtree::NavValidation;
use crate::resources::{url_type, AssetKind, AssetValue, Provenance, UrlType};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_file(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent directory");
    fs::write(path, content).expect("Failed to write file");
}

/// Minimal stand-in for the reveal.js and highlight.js bundle
fn create_fake_bundle(root: &Path) -> PathBuf {
    let bundle = root.join("bundle");
    write_file(&bundle.join("reveal.js/dist/reveal.css"), "/* reveal */");
    write_file(&bundle.join("reveal.js/dist/reveal.js"), "// reveal");
    write_file(&bundle.join("reveal.js/dist/theme/black.css"), "/* black */");
    write_file(&bundle.join("reveal.js/dist/theme/simple.css"), "/* simple */");
    write_file(&bundle.join("reveal.js/plugin/markdown/markdown.js"), "// markdown");
    write_file(&bundle.join("highlight.js/build/styles/monokai.css"), "/* monokai */");
    write_file(&bundle.join("highlight.js/build/styles/vs.css"), "/* vs */");
    bundle
}

fn create_resolver(temp: &TempDir) -> (AssetResolver, PathBuf) {
    let bundle = BundledAssets::discover(&create_fake_bundle(temp.path())).unwrap();
    let output = temp.path().join("site");
    fs::create_dir_all(&output).unwrap();
    (AssetResolver::new(bundle, &output), output)
}

fn frontmatter(yaml: &str) -> Mapping {
    serde_yaml::from_str(yaml).expect("Failed to parse test frontmatter")
}

fn empty_effective_config() -> EffectiveConfig {
    EffectiveConfig {
        title: None,
        theme: None,
        highlight_theme: None,
        favicon: None,
        template: None,
        separator: None,
        separator_vertical: None,
        separator_notes: None,
        charset: None,
        preprocess_script: None,
        revealjs: Mapping::new(),
        plugins: Vec::new(),
    }
}

fn test_document(source_path: PathBuf, relative_destination: &str, body: &str) -> Document {
    Document {
        relative_source: utils::path_to_slash(Path::new(source_path.file_name().unwrap())),
        source_path,
        destination_path: PathBuf::from("/site").join(relative_destination),
        relative_destination: relative_destination.to_string(),
        frontmatter: Mapping::new(),
        config: empty_effective_config(),
        body: body.to_string(),
    }
}

fn nav_document(relative_destination: &str) -> Document {
    let source = relative_destination.trim_end_matches(".html").to_string() + ".md";
    test_document(PathBuf::from("/slides").join(source), relative_destination, "")
}

// --- utils ---

#[test]
fn test_relative_href_at_every_depth() {
    let target = Path::new("/site/mdslides-assets/reveal-js/dist/theme/black.css");

    assert_eq!(
        utils::relative_href(Path::new("/site"), target),
        "mdslides-assets/reveal-js/dist/theme/black.css"
    );
    assert_eq!(
        utils::relative_href(Path::new("/site/a"), target),
        "../mdslides-assets/reveal-js/dist/theme/black.css"
    );
    assert_eq!(
        utils::relative_href(Path::new("/site/a/b/c"), target),
        "../../../mdslides-assets/reveal-js/dist/theme/black.css"
    );
    assert_eq!(utils::relative_href(Path::new("/site"), Path::new("/site")), ".");
}

#[test]
fn test_normalize_path() {
    assert_eq!(
        utils::normalize_path(Path::new("/a/b/../c/./d.css")),
        PathBuf::from("/a/c/d.css")
    );
    assert_eq!(utils::normalize_path(Path::new("../x")), PathBuf::from("../x"));
}

#[test]
fn test_markdown_suffix_helpers() {
    assert!(utils::has_markdown_suffix("deck.md"));
    assert!(utils::has_markdown_suffix("dir/Deck.MD"));
    assert!(!utils::has_markdown_suffix(".md"));
    assert!(!utils::has_markdown_suffix("deck.mdx"));

    assert_eq!(utils::replace_markdown_suffix("dir/deck.MD"), "dir/deck.html");
    assert_eq!(utils::replace_markdown_suffix("image.png"), "image.png");

    assert!(utils::is_markdown_file(Path::new("slides/intro.Md")));
    assert!(!utils::is_markdown_file(Path::new("slides/intro.txt")));
}

#[test]
fn test_encode_href() {
    assert_eq!(utils::encode_href("my deck/part #1.html"), "my%20deck/part%20%231.html");
    assert_eq!(utils::encode_href("plain/path.html"), "plain/path.html");
}

// --- resources ---

#[test]
fn test_url_type_classification() {
    assert_eq!(url_type("#intro"), UrlType::Anchor);
    assert_eq!(url_type("https://example.com/theme.css"), UrlType::Absolute);
    assert_eq!(url_type("mailto:someone@example.com"), UrlType::Absolute);
    assert_eq!(url_type("/static/theme.css"), UrlType::Absolute);
    assert_eq!(url_type("theme.css"), UrlType::Relative);
    assert_eq!(url_type("../themes/theme.css"), UrlType::Relative);
    assert_eq!(url_type("black"), UrlType::Relative);
}

#[test]
fn test_bundled_assets_catalogs() {
    let temp = TempDir::new().unwrap();
    let bundle = BundledAssets::discover(&create_fake_bundle(temp.path())).unwrap();

    assert!(bundle.themes().contains("black"));
    assert!(bundle.themes().contains("simple"));
    assert!(bundle.highlight_themes().contains("monokai"));
    assert!(bundle.is_builtin("vs.css"));
    assert!(!bundle.is_builtin("themes/black.css"));
    assert!(bundle.builtin(AssetKind::HighlightTheme, "black").is_none());
    assert!(bundle.builtin(AssetKind::Favicon, "black").is_none());
}

#[test]
fn test_missing_bundle_has_empty_catalogs() {
    let temp = TempDir::new().unwrap();
    let bundle = BundledAssets::discover(&temp.path().join("nowhere")).unwrap();
    assert!(bundle.themes().is_empty());
    assert!(!bundle.is_builtin("black"));
}

#[test]
fn test_builtin_theme_is_copied_and_linked_at_depth_zero_and_two() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let value = AssetValue::new("black", Provenance::FromGlobal(temp.path().to_path_buf()));

    let shallow = resolver
        .resolve(AssetKind::Theme, &value, &output.join("index.html"))
        .unwrap();
    assert_eq!(shallow.href, "mdslides-assets/reveal-js/dist/theme/black.css");

    let deep = resolver
        .resolve(AssetKind::Theme, &value, &output.join("a/b/deck.html"))
        .unwrap();
    assert_eq!(deep.href, "../../mdslides-assets/reveal-js/dist/theme/black.css");

    assert!(output
        .join("mdslides-assets/reveal-js/dist/theme/black.css")
        .is_file());
}

#[test]
fn test_builtin_highlight_theme_with_css_extension() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let value = AssetValue::new("monokai.css", Provenance::FromGlobal(temp.path().to_path_buf()));

    let resolved = resolver
        .resolve(AssetKind::HighlightTheme, &value, &output.join("sub/deck.html"))
        .unwrap();
    assert_eq!(resolved.href, "../mdslides-assets/highlight-js-themes/monokai.css");
    assert!(output.join("mdslides-assets/highlight-js-themes/monokai.css").is_file());
}

#[test]
fn test_absolute_and_anchor_references_are_unchanged() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let provenance = Provenance::FromGlobal(temp.path().to_path_buf());

    for reference in ["https://cdn.example.com/theme.css", "/theme.css", "#inline"] {
        let value = AssetValue::new(reference, provenance.clone());
        let resolved = resolver
            .resolve(AssetKind::Theme, &value, &output.join("deck.html"))
            .unwrap();
        assert_eq!(resolved.href, reference);
        assert!(resolved.source.is_none());
    }
}

#[test]
fn test_global_relative_asset_is_placed_relative_to_output_root() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let config_dir = temp.path().join("project");
    write_file(&config_dir.join("themes/corp.css"), "/* corp */");

    let value = AssetValue::new("themes/corp.css", Provenance::FromGlobal(config_dir));
    let resolved = resolver
        .resolve(AssetKind::Theme, &value, &output.join("sub/deck.html"))
        .unwrap();

    assert_eq!(resolved.href, "../themes/corp.css");
    assert!(output.join("themes/corp.css").is_file());
}

#[test]
fn test_frontmatter_relative_asset_is_placed_next_to_the_document() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let document_dir = temp.path().join("slides/sub");
    write_file(&document_dir.join("custom.css"), "/* custom */");

    let value = AssetValue::new("custom.css", Provenance::FromFrontmatter(document_dir));
    let resolved = resolver
        .resolve(AssetKind::Theme, &value, &output.join("sub/deck.html"))
        .unwrap();

    assert_eq!(resolved.href, "custom.css");
    assert!(output.join("sub/custom.css").is_file());
}

#[test]
fn test_missing_relative_asset_is_an_error() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let value = AssetValue::new(
        "missing.css",
        Provenance::FromGlobal(temp.path().to_path_buf()),
    );

    let result = resolver.resolve(AssetKind::Theme, &value, &output.join("deck.html"));
    assert!(matches!(result, Err(SlidesError::ResourceNotFound { .. })));
}

#[test]
fn test_asset_escaping_the_output_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let document_dir = temp.path().join("slides");
    write_file(&temp.path().join("outside.css"), "/* outside */");

    let value = AssetValue::new("../outside.css", Provenance::FromFrontmatter(document_dir));
    let result = resolver.resolve(AssetKind::Theme, &value, &output.join("deck.html"));
    assert!(matches!(result, Err(SlidesError::ResourceOutsideOutput { .. })));
}

#[test]
fn test_assets_are_copied_once_per_destination() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let source = temp.path().join("favicon.ico");
    write_file(&source, "icon");
    let destination = output.join("favicon.ico");

    assert!(resolver.copy_once(&source, &destination).unwrap());
    assert!(!resolver.copy_once(&source, &destination).unwrap());
}

#[test]
fn test_destination_written_from_two_sources_is_a_conflict() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let global = temp.path().join("custom.css");
    let local = temp.path().join("slides/custom.css");
    write_file(&global, "/* global */");
    write_file(&local, "/* local */");
    let destination = output.join("custom.css");

    assert!(resolver.copy_once(&global, &destination).unwrap());
    let result = resolver.copy_once(&local, &destination);

    assert!(matches!(result, Err(SlidesError::OutputConflict { ref first, .. }) if *first == global));
    assert_eq!(fs::read_to_string(&destination).unwrap(), "/* global */");
}

#[test]
fn test_template_is_resolved_but_not_copied() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let config_dir = temp.path().join("project");
    write_file(&config_dir.join("templates/deck.html"), "{{ markdown }}");

    let value = AssetValue::new("templates/deck.html", Provenance::FromGlobal(config_dir.clone()));
    let resolved = resolver
        .resolve(AssetKind::Template, &value, &output.join("deck.html"))
        .unwrap();

    assert_eq!(resolved.source, Some(config_dir.join("templates/deck.html")));
    assert!(!output.join("templates").exists());
}

#[test]
fn test_copy_framework_skips_theme_stylesheets() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);

    resolver.copy_framework().unwrap();

    let revealjs = output.join("mdslides-assets/reveal-js");
    assert!(revealjs.join("dist/reveal.js").is_file());
    assert!(revealjs.join("plugin/markdown/markdown.js").is_file());
    assert!(!revealjs.join("dist/theme/black.css").exists());
}

// --- config ---

#[test]
fn test_config_defaults() {
    let config = Config::from_yaml("").unwrap();

    assert_eq!(config, Config::default());
    assert_eq!(config.index.title, "Index");
    assert!(config.index.enable_footer);
    assert_eq!(config.slides.theme.as_deref(), Some("black"));
    assert_eq!(config.slides.highlight_theme.as_deref(), Some("monokai"));
    assert_eq!(config.revealjs.get("history"), Some(&Value::Bool(true)));
    assert_eq!(
        config.revealjs.get("slideNumber"),
        Some(&Value::String("c/t".to_string()))
    );
}

#[test]
fn test_config_merges_over_defaults() {
    let yaml = r#"
slides:
  theme: simple
revealjs:
  transition: fade
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.slides.theme.as_deref(), Some("simple"));
    assert_eq!(config.slides.highlight_theme.as_deref(), Some("monokai"));
    assert_eq!(config.revealjs.get("history"), Some(&Value::Bool(true)));
    assert_eq!(
        config.revealjs.get("transition"),
        Some(&Value::String("fade".to_string()))
    );
}

#[test]
fn test_config_rejects_unknown_slides_keys() {
    let result = Config::from_yaml("slides:\n  colour: red\n");
    assert!(result.is_err());
}

#[test]
fn test_config_plugin_accepts_single_script() {
    let yaml = r#"
plugins:
  - name: RevealMath.KaTeX
    extra_javascript: plugin/math/math.js
  - extra_css:
      - one.css
      - two.css
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.plugins.len(), 2);
    assert_eq!(config.plugins[0].name.as_deref(), Some("RevealMath.KaTeX"));
    assert_eq!(config.plugins[0].extra_javascript, vec!["plugin/math/math.js"]);
    assert_eq!(config.plugins[1].extra_css, vec!["one.css", "two.css"]);
}

#[test]
fn test_config_rejects_invalid_nav() {
    let result = Config::from_yaml("index:\n  nav: intro.md\n");
    assert!(matches!(result, Err(SlidesError::InvalidNavigationSpec(_))));
}

#[test]
fn test_config_load_missing_file() {
    let result = Config::load(Some(Path::new("/definitely/not/here/mdslides.yml")));
    assert!(matches!(result, Err(SlidesError::PathNotFoundError(_))));
}

#[test]
fn test_local_asset_paths_skip_builtins_and_urls() {
    let temp = TempDir::new().unwrap();
    let bundle = BundledAssets::discover(&create_fake_bundle(temp.path())).unwrap();
    write_file(&temp.path().join("favicon.ico"), "icon");

    let mut config = Config::default();
    config.slides.favicon = Some("favicon.ico".to_string());
    config.index.theme = Some("https://example.com/index.css".to_string());

    let paths = config.local_asset_paths(temp.path(), &bundle);
    assert_eq!(paths, vec![temp.path().join("favicon.ico")]);
}

// --- cascade ---

#[test]
fn test_cascade_frontmatter_overrides_allow_listed_keys() {
    let global = Config::default();
    let config_dir = Path::new("/project");
    let document_dir = Path::new("/project/slides/sub");
    let overrides = frontmatter(
        r#"
slides:
  theme: custom.css
  separator: "^---$"
"#,
    );

    let merged = merge_config(&global, &overrides, config_dir, document_dir).unwrap();

    let theme = merged.theme.unwrap();
    assert_eq!(theme.reference, "custom.css");
    assert_eq!(
        theme.provenance,
        Provenance::FromFrontmatter(document_dir.to_path_buf())
    );
    assert_eq!(merged.separator.as_deref(), Some("^---$"));

    let highlight = merged.highlight_theme.unwrap();
    assert_eq!(highlight.reference, "monokai");
    assert_eq!(
        highlight.provenance,
        Provenance::FromGlobal(config_dir.to_path_buf())
    );
}

#[test]
fn test_cascade_ignores_other_frontmatter_keys() {
    let global = Config::default();
    let overrides = frontmatter("theme: simple\nindex:\n  title: Nope\n");

    let merged = merge_config(&global, &overrides, Path::new("/p"), Path::new("/p/s")).unwrap();

    assert_eq!(merged.theme.unwrap().reference, "black");
    assert_eq!(merged.title, None);
}

#[test]
fn test_cascade_merges_revealjs_and_replaces_plugins() {
    let mut global = Config::default();
    global.plugins.push(config::Plugin {
        name: Some("GlobalPlugin".to_string()),
        ..config::Plugin::default()
    });
    let original = global.clone();

    let overrides = frontmatter(
        r#"
revealjs:
  history: false
  transition: zoom
plugins:
  - name: LocalPlugin
"#,
    );

    let merged = merge_config(&global, &overrides, Path::new("/p"), Path::new("/p/s")).unwrap();

    assert_eq!(merged.revealjs.get("history"), Some(&Value::Bool(false)));
    assert_eq!(
        merged.revealjs.get("slideNumber"),
        Some(&Value::String("c/t".to_string()))
    );
    assert_eq!(
        merged.revealjs.get("transition"),
        Some(&Value::String("zoom".to_string()))
    );
    assert_eq!(merged.plugins.len(), 1);
    assert_eq!(merged.plugins[0].name.as_deref(), Some("LocalPlugin"));

    // The global configuration is left untouched
    assert_eq!(global, original);
}

#[test]
fn test_effective_config_resolves_frontmatter_theme_beside_document() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let slides = temp.path().join("slides");
    write_file(&slides.join("custom.css"), "/* custom */");

    let global = Config::default();
    let overrides = frontmatter("slides:\n  theme: custom.css\n");
    let destination = output.join("a.html");

    let effective = build_effective_config(
        &global,
        &overrides,
        CascadeContext {
            config_dir: temp.path(),
            document_dir: &slides,
            destination: &destination,
        },
        &mut resolver,
    )
    .unwrap();

    assert_eq!(effective.theme.unwrap().href, "custom.css");
    assert_eq!(
        effective.highlight_theme.unwrap().href,
        "mdslides-assets/highlight-js-themes/monokai.css"
    );
    assert!(output.join("custom.css").is_file());
}

#[test]
fn test_effective_config_fails_on_missing_frontmatter_asset() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let slides = temp.path().join("slides");
    fs::create_dir_all(&slides).unwrap();

    let overrides = frontmatter("slides:\n  favicon: missing.ico\n");
    let destination = output.join("a.html");

    let result = build_effective_config(
        &Config::default(),
        &overrides,
        CascadeContext {
            config_dir: temp.path(),
            document_dir: &slides,
            destination: &destination,
        },
        &mut resolver,
    );
    assert!(matches!(result, Err(SlidesError::ResourceNotFound { .. })));
}

#[test]
fn test_index_config_resolves_against_output_root() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    write_file(&temp.path().join("img/logo.png"), "png");

    let mut global = Config::default();
    global.index.title = "Course".to_string();
    global.index.theme = Some("simple".to_string());
    global.index.favicon = Some("img/logo.png".to_string());

    let settings = resolve_index_config(
        &global,
        temp.path(),
        &output.join("index.html"),
        &mut resolver,
    )
    .unwrap();

    assert_eq!(settings.title, "Course");
    assert_eq!(
        settings.theme.unwrap().href,
        "mdslides-assets/reveal-js/dist/theme/simple.css"
    );
    assert_eq!(settings.favicon.unwrap().href, "img/logo.png");
    assert!(output.join("img/logo.png").is_file());
}

// --- document ---

#[test]
fn test_parse_source_splits_frontmatter() {
    let content = "---\ntitle: Hello\nslides:\n  theme: simple\n---\n# First slide\n";
    let parsed = parse_source(Path::new("deck.md"), content).unwrap();

    assert_eq!(
        parsed.frontmatter.get("title"),
        Some(&Value::String("Hello".to_string()))
    );
    assert!(parsed.body.contains("# First slide"));
    assert!(!parsed.body.contains("title: Hello"));
}

#[test]
fn test_parse_source_without_frontmatter() {
    let content = "# Only a slide\n";
    let parsed = parse_source(Path::new("deck.md"), content).unwrap();

    assert!(parsed.frontmatter.is_empty());
    assert!(parsed.body.contains("# Only a slide"));
}

#[test]
fn test_parse_source_strips_bom() {
    let content = "\u{feff}---\ntitle: Bom\n---\nBody\n";
    let parsed = parse_source(Path::new("deck.md"), content).unwrap();

    assert_eq!(
        parsed.frontmatter.get("title"),
        Some(&Value::String("Bom".to_string()))
    );
    assert!(!parsed.body.contains('\u{feff}'));
}

#[test]
fn test_parse_source_rejects_non_mapping_frontmatter() {
    let content = "---\n- one\n- two\n---\nBody\n";
    let result = parse_source(Path::new("deck.md"), content);
    assert!(matches!(result, Err(SlidesError::FrontmatterError { .. })));
}

#[test]
fn test_emojize_replaces_known_shortcodes() {
    assert_eq!(emojize("Launch :rocket:!"), "Launch 🚀!");
    assert_eq!(emojize("Keep :not_an_emoji_code: as is"), "Keep :not_an_emoji_code: as is");
    assert_eq!(emojize("Meet at 12:30:45"), "Meet at 12:30:45");
}

#[test]
fn test_document_title_precedence() {
    let mut document = test_document(PathBuf::from("/slides/intro.md"), "intro.html", "");
    assert_eq!(document.title(), "intro");

    document
        .frontmatter
        .insert(Value::from("title"), Value::from("From frontmatter"));
    assert_eq!(document.title(), "From frontmatter");

    document.config.title = Some("From slides config".to_string());
    assert_eq!(document.title(), "From slides config");
}

// --- navtree ---

#[test]
fn test_inferred_tree_from_documents() {
    let documents = vec![nav_document("category/b.html"), nav_document("a.html")];

    let tree = NavTree::from_documents(&documents).unwrap();

    let root_children: Vec<&str> = tree.children(tree.root()).map(|n| n.id.as_str()).collect();
    assert_eq!(root_children, vec!["a.html", "category"]);
    assert!(tree.is_leaf("a.html"));
    assert!(tree.is_leaf("category/b.html"));
    assert!(!tree.is_leaf("category"));

    let category = tree.get("category").unwrap();
    let children: Vec<&str> = tree.children(category).map(|n| n.id.as_str()).collect();
    assert_eq!(children, vec!["category/b.html"]);

    let items = tree.items();
    assert_eq!(items[0].href.as_deref(), Some("a.html"));
    assert_eq!(items[1].title, "category");
    assert!(items[1].href.is_none());
    assert_eq!(items[1].children[0].title, "b");
}

#[test]
fn test_inferred_tree_contains_every_document() {
    let documents = vec![
        nav_document("z.html"),
        nav_document("part1/intro.html"),
        nav_document("part1/deep/detail.html"),
        nav_document("part2/outro.html"),
    ];

    let tree = NavTree::from_documents(&documents).unwrap();

    let mut leaves = tree.leaves();
    leaves.sort();
    assert_eq!(
        leaves,
        vec![
            "part1/deep/detail.html",
            "part1/intro.html",
            "part2/outro.html",
            "z.html"
        ]
    );
}

fn declaration(yaml: &str) -> Vec<NavEntry> {
    let value: Value = serde_yaml::from_str(yaml).unwrap();
    NavEntry::parse_declaration(&value).unwrap()
}

#[test]
fn test_declared_tree_keeps_order_and_titles() {
    let entries = declaration(
        r#"
- zeta.md
- Custom title: alpha.md
- Part one:
    - part/two.md
    - part/one.md
"#,
    );

    let tree = NavTree::from_declaration(&entries).unwrap();

    assert_eq!(
        tree.leaves(),
        vec!["zeta.html", "alpha.html", "part/two.html", "part/one.html"]
    );
    let items = tree.items();
    assert_eq!(items[0].title, "zeta");
    assert_eq!(items[1].title, "Custom title");
    assert_eq!(items[2].title, "Part one");
    assert!(!items[2].is_leaf);
    assert_eq!(items[2].children.len(), 2);
}

#[test]
fn test_invalid_declarations_are_rejected() {
    let cases = [
        "intro.md",
        "- Empty: []",
        "- 42",
        "- {a: a.md, b: b.md}",
        "- Title: 3",
        "- 7: a.md",
        "- a.md\n- a.md",
        "- ../outside.md",
    ];
    for yaml in cases {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let result = NavEntry::parse_declaration(&value)
            .and_then(|entries| NavTree::from_declaration(&entries));
        assert!(
            matches!(result, Err(SlidesError::InvalidNavigationSpec(_))),
            "Declaration should be rejected: {}",
            yaml
        );
    }
}

#[test]
fn test_validation_reports_orphans_and_dangling_references() {
    let documents = vec![nav_document("a.html"), nav_document("b.html")];
    let tree = NavTree::from_declaration(&declaration("- a.md\n- c.md\n")).unwrap();

    let validation = tree.validate(&documents, false).unwrap();
    assert_eq!(
        validation,
        NavValidation {
            orphaned_pages: vec!["b.md".to_string()],
            dangling_references: vec!["c.md".to_string()],
        }
    );

    let strict = tree.validate(&documents, true);
    assert!(matches!(strict, Err(SlidesError::DanglingNavReference(ref path)) if path == "c.md"));
}

#[test]
fn test_validation_of_complete_declaration() {
    let documents = vec![nav_document("a.html"), nav_document("sub/b.html")];
    let tree = NavTree::from_declaration(&declaration("- Sub:\n    - sub/b.md\n- a.md\n")).unwrap();

    let validation = tree.validate(&documents, true).unwrap();
    assert_eq!(validation, NavValidation::default());
}

// --- links ---

fn link_fixture(temp: &TempDir, body: &str) -> Document {
    let slides = temp.path().join("slides");
    write_file(&slides.join("category/b.md"), "# B");
    write_file(&slides.join("b.md"), "# B");
    write_file(&slides.join("img/pic.png"), "png");
    write_file(&slides.join("my deck.md"), "# Deck");
    write_file(&slides.join("a.md"), body);
    test_document(slides.join("a.md"), "a.html", body)
}

#[test]
fn test_links_to_markdown_are_rewritten() {
    let temp = TempDir::new().unwrap();
    let mut document = link_fixture(&temp, "# A\n\n[B](./category/b.md)\n");

    let report = resolve_links(&mut document, true).unwrap();

    assert_eq!(document.body, "# A\n\n[B](./category/b.html)\n");
    assert_eq!(report.rewritten, vec!["./category/b.md"]);
    assert!(report.broken.is_empty());
}

#[test]
fn test_link_resolution_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let body = "[one](b.md#intro) ![pic](img/pic.png)\n\n<a href=\"category/b.md\">B</a>\n\n[ref]: my%20deck.md\n\nSee [deck][ref].\n";
    let mut document = link_fixture(&temp, body);

    resolve_links(&mut document, true).unwrap();
    let first = document.body.clone();
    let second_report = resolve_links(&mut document, true).unwrap();

    assert_eq!(document.body, first);
    assert!(second_report.rewritten.is_empty());
    assert!(second_report.broken.is_empty());
    assert!(first.contains("[one](b.html#intro)"));
    assert!(first.contains("![pic](img/pic.png)"));
    assert!(first.contains("<a href=\"category/b.html\">B</a>"));
    assert!(first.contains("[ref]: my%20deck.html"));
}

#[test]
fn test_broken_links_are_lenient_or_strict() {
    let temp = TempDir::new().unwrap();
    let body = "[gone](missing.md)\n";

    let mut lenient = link_fixture(&temp, body);
    let report = resolve_links(&mut lenient, false).unwrap();
    assert_eq!(report.broken, vec!["missing.md"]);
    assert_eq!(lenient.body, body);

    let mut strict = link_fixture(&temp, body);
    let result = resolve_links(&mut strict, true);
    assert!(matches!(
        result,
        Err(SlidesError::BrokenLink { ref link, .. }) if link == "missing.md"
    ));
}

#[test]
fn test_only_matching_locations_are_rewritten() {
    let temp = TempDir::new().unwrap();
    let mut document = link_fixture(&temp, "[one](b.md) and [two](sub/b.md)\n");

    let report = resolve_links(&mut document, false).unwrap();

    assert_eq!(document.body, "[one](b.html) and [two](sub/b.md)\n");
    assert_eq!(report.broken, vec!["sub/b.md"]);
}

#[test]
fn test_links_in_code_are_ignored() {
    let targets = find_relative_targets("`[x](missing.md)`\n\n```\n[y](other.md)\n```\n");
    assert!(targets.is_empty());
}

#[test]
fn test_code_examples_keep_their_markdown_links() {
    let temp = TempDir::new().unwrap();
    let body = "[B](b.md)\n\n```markdown\nSee [B](b.md) in markdown\n```\n\nInline `[B](b.md)` stays.\n\n    [B](b.md)\n";
    let mut document = link_fixture(&temp, body);

    resolve_links(&mut document, true).unwrap();

    assert_eq!(
        document.body,
        "[B](b.html)\n\n```markdown\nSee [B](b.md) in markdown\n```\n\nInline `[B](b.md)` stays.\n\n    [B](b.md)\n"
    );
}

#[test]
fn test_code_span_with_double_backticks_is_skipped() {
    let targets: HashSet<String> = ["b.md".to_string()].into_iter().collect();
    let body = "``[B](b.md) with ` inside`` and [B](b.md)\n";

    assert_eq!(
        rewrite_locations(body, &targets),
        "``[B](b.md) with ` inside`` and [B](b.html)\n"
    );
}

#[test]
fn test_escaped_destinations_are_rewritten() {
    let temp = TempDir::new().unwrap();
    write_file(&temp.path().join("slides/my_doc.md"), "# Doc");
    write_file(&temp.path().join("slides/café.md"), "# Café");
    let body = "[B](my\\_doc.md) and [C](caf&eacute;.md#top)\n";
    let mut document = link_fixture(&temp, body);

    let report = resolve_links(&mut document, true).unwrap();

    assert_eq!(
        document.body,
        "[B](my\\_doc.html) and [C](caf&eacute;.html#top)\n"
    );
    assert_eq!(report.rewritten.len(), 2);
}

#[test]
fn test_anchor_and_absolute_links_are_ignored() {
    let targets =
        find_relative_targets("[top](#top) [web](https://example.com/a.md) [root](/a.md)\n");
    assert!(targets.is_empty());
}

#[test]
fn test_background_images_in_comments_are_found() {
    let targets = find_relative_targets(
        "# Slide\n\n<!-- .slide: data-background-image=\"img/bg.png\" -->\n\nText\n",
    );
    assert!(targets.contains("img/bg.png"));
}

#[test]
fn test_images_and_sources_are_found() {
    let targets = find_relative_targets(
        "![pic](img/pic.png)\n\n<video><source src=\"media/clip.mp4\"></video>\n",
    );
    assert!(targets.contains("img/pic.png"));
    assert!(targets.contains("media/clip.mp4"));
}

// --- html ---

#[test]
fn test_escape_markdown() {
    assert_eq!(
        escape_markdown("<b>bold</b> & </textarea>"),
        "&lt;b&gt;bold&lt;/b&gt; &amp; &lt;/textarea&gt;"
    );
}

#[test]
fn test_revealjs_options_are_json() {
    let options = Config::default().revealjs;
    let rendered = revealjs_options(&options).unwrap();

    assert_eq!(rendered[0].key, "\"history\"");
    assert_eq!(rendered[0].value, "true");
    assert_eq!(rendered[1].key, "\"slideNumber\"");
    assert_eq!(rendered[1].value, "\"c/t\"");
}

#[test]
fn test_render_slideshow_default_template() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("site");
    let mut renderer = SlideRenderer::new(&output.join("mdslides-assets/reveal-js")).unwrap();

    let mut document = test_document(
        temp.path().join("slides/sub/deck.md"),
        "sub/deck.html",
        "# Hello <world>\n",
    );
    document.destination_path = output.join("sub/deck.html");
    document.config.separator = Some("^---$".to_string());
    document.config.revealjs = Config::default().revealjs;

    let markup = renderer.render_slideshow(&document).unwrap();

    assert!(markup.contains("<!DOCTYPE html>"));
    assert!(markup.contains("<title>deck</title>"));
    assert!(markup.contains("src=\"../mdslides-assets/reveal-js/dist/reveal.js\""));
    assert!(markup.contains("# Hello &lt;world&gt;"));
    assert!(markup.contains("data-separator=\"^---$\""));
    assert!(markup.contains("\"history\": true"));
}

#[test]
fn test_render_slideshow_custom_template() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("site");
    let template = temp.path().join("custom.html");
    write_file(&template, "{{ title }}|{{ revealjs_path }}");

    let mut renderer = SlideRenderer::new(&output.join("mdslides-assets/reveal-js")).unwrap();
    let mut document = test_document(temp.path().join("slides/deck.md"), "deck.html", "");
    document.destination_path = output.join("deck.html");
    document.config.template = Some(resources::ResolvedAsset {
        href: "custom.html".to_string(),
        source: Some(template),
    });

    let markup = renderer.render_slideshow(&document).unwrap();
    assert_eq!(markup, "deck|mdslides-assets/reveal-js");
}

#[test]
fn test_render_index() {
    let temp = TempDir::new().unwrap();
    let mut renderer = SlideRenderer::new(&temp.path().join("mdslides-assets/reveal-js")).unwrap();
    let tree = NavTree::from_documents(&[nav_document("a.html"), nav_document("part/b c.html")])
        .unwrap();
    let settings = cascade::IndexSettings {
        title: "Slides & more".to_string(),
        theme: None,
        favicon: None,
        template: None,
        enable_footer: false,
    };

    let markup = renderer.render_index(&settings, &tree).unwrap();

    assert!(markup.contains("<h1>Slides &amp; more</h1>"));
    assert!(markup.contains("<a href=\"a.html\">a</a>"));
    assert!(markup.contains("<a href=\"part/b%20c.html\">b c</a>"));
    assert!(!markup.contains("<footer>"));
}

#[test]
fn test_error_is_attributed_to_document_once() {
    let inner = SlidesError::ConfigError("bad".to_string());
    let wrapped = inner.in_document("/slides/a.md").in_document("/slides/b.md");

    match wrapped {
        SlidesError::DocumentError { document, .. } => {
            assert_eq!(document, PathBuf::from("/slides/a.md"))
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

// --- preprocess ---

#[cfg(unix)]
fn write_script(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    write_file(path, content);
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(unix)]
#[test]
fn test_preprocess_script_filters_markdown() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("upper.sh");
    write_script(&script, "#!/bin/sh\ntr 'a-z' 'A-Z'\n");

    let output = run_preprocess_script(&script, "# hello\n").unwrap();
    assert_eq!(output, "# HELLO\n");
}

#[cfg(unix)]
#[test]
fn test_failing_preprocess_script_is_an_error() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("fail.sh");
    write_script(&script, "#!/bin/sh\necho broken >&2\nexit 3\n");

    let result = run_preprocess_script(&script, "# hello\n");
    match result {
        Err(SlidesError::PreprocessError { message, .. }) => assert!(message.contains("broken")),
        other => panic!("Expected a preprocess error, got {:?}", other),
    }
}

#[test]
fn test_missing_preprocess_script_cannot_start() {
    let temp = TempDir::new().unwrap();
    let result = run_preprocess_script(&temp.path().join("nothing.sh"), "# hello\n");
    assert!(matches!(result, Err(SlidesError::PreprocessError { .. })));
}

#[test]
fn test_preprocess_script_resolves_beside_document() {
    let temp = TempDir::new().unwrap();
    let (mut resolver, output) = create_resolver(&temp);
    let slides = temp.path().join("slides");
    write_file(&slides.join("filter.sh"), "#!/bin/sh\ncat\n");

    let overrides = frontmatter("slides:\n  preprocess_script: filter.sh\n");
    let destination = output.join("a.html");
    let effective = build_effective_config(
        &Config::default(),
        &overrides,
        CascadeContext {
            config_dir: temp.path(),
            document_dir: &slides,
            destination: &destination,
        },
        &mut resolver,
    )
    .unwrap();

    let script = effective.preprocess_script.unwrap();
    assert_eq!(script.source, Some(slides.join("filter.sh")));
    assert!(!output.join("filter.sh").exists());
}
