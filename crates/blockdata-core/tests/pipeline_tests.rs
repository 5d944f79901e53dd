//! Pipeline integration tests
//!
//! End-to-end runs over the comment parser and fragment DOM from
//! `blockdata-test-utils`.

use blockdata_core::{
    BlockParser, BlockPipeline, CacheScope, CacheStore, Deployment, ExtractError, ExtractResult,
    InMemoryBlockTypeRegistry, InMemoryMetadataStore, MokaCacheStore, PipelineConfig,
};
use blockdata_model::{BlockNode, EnrichedBlock};
use blockdata_test_utils::{
    block, pipeline, pipeline_builder, BracketShortcodes, CommentBlockParser, CountingParser,
    FailingParser, FailingRenderer, TreeParser,
};
use mockall::mock;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

mock! {
    pub Parser {}

    impl BlockParser for Parser {
        fn parse(&self, content: &str) -> ExtractResult<Vec<BlockNode>>;
    }
}

fn counting() -> Arc<CountingParser<CommentBlockParser>> {
    Arc::new(CountingParser::new(CommentBlockParser::new()))
}

fn only(blocks: &[EnrichedBlock]) -> &EnrichedBlock {
    assert_eq!(blocks.len(), 1, "expected exactly one block: {blocks:#?}");
    &blocks[0]
}

#[test]
fn raw_attribute_wins_over_extraction() {
    let content = r#"<!-- block:core/paragraph {"content":"raw"} --><p>hi</p><!-- /block -->"#;
    let blocks = pipeline().process(content, 0).unwrap();

    let paragraph = only(&blocks);
    assert_eq!(paragraph.name, "core/paragraph");
    assert_eq!(paragraph.attrs["content"], json!("raw"));
    assert_eq!(paragraph.rendered, "<p>hi</p>");
}

#[test]
fn raw_null_attribute_is_kept() {
    let content = block("core/paragraph", &json!({ "content": null }), "<p>hi</p>");
    let blocks = pipeline().process(&content, 0).unwrap();

    let paragraph = only(&blocks);
    assert_eq!(paragraph.attrs.get("content"), Some(&Value::Null));
}

#[test]
fn missing_attribute_is_extracted_from_html() {
    let content = block("core/paragraph", &json!({}), "<p>hi</p>");
    let blocks = pipeline().process(&content, 0).unwrap();

    let paragraph = only(&blocks);
    assert_eq!(paragraph.attrs["content"], json!("hi"));
    assert_eq!(paragraph.inner_html, "<p>hi</p>");
    assert!(!paragraph.attrs.contains_key("anchor"));
}

#[test]
fn unregistered_block_keeps_raw_attributes() {
    let content = block("foo/bar", &json!({ "x": 1, "label": "kept" }), "  <div>body</div>\n");
    let blocks = pipeline().process(&content, 0).unwrap();

    let foo = only(&blocks);
    assert_eq!(foo.name, "foo/bar");
    assert_eq!(Value::Object(foo.attrs.clone()), json!({ "x": 1, "label": "kept" }));
    assert_eq!(foo.rendered, "<div>body</div>");
}

#[test]
fn unresolvable_sources_fall_back_without_dropping_siblings() {
    let mut registry = InMemoryBlockTypeRegistry::new();
    registry
        .register_json(
            "acme/x",
            r#"{ "attributes": {
                "title": { "type": "string", "source": "html", "selector": "h2" },
                "sub": { "type": "string", "source": "meta", "default": "d" },
                "items": { "source": "query", "selector": "li", "default": [] },
                "legacy": { "source": "children" }
            } }"#,
        )
        .unwrap();
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .registry(Arc::new(registry))
        .build()
        .unwrap();

    let blocks = pipeline
        .process(&block("acme/x", &json!({}), "<h2>T</h2>"), 7)
        .unwrap();

    let x = only(&blocks);
    assert_eq!(x.attrs["title"], json!("T"));
    assert_eq!(x.attrs["sub"], json!("d"));
    assert_eq!(x.attrs["items"], json!([]));
    assert_eq!(x.attrs["legacy"], Value::Null);
}

#[test]
fn anchor_support_reads_root_id() {
    let with_id = block(
        "core/image",
        &json!({}),
        "<figure id=\"hero\"><img src=\"x.png\" alt=\"X\"><figcaption>Cap <em>1</em></figcaption></figure>",
    );
    let without_id = block("core/image", &json!({}), "<figure><img src=\"y.png\"></figure>");
    let blocks = pipeline()
        .process(&format!("{with_id}\n\n{without_id}"), 0)
        .unwrap();

    assert_eq!(blocks.len(), 2);
    let first = Value::Object(blocks[0].attrs.clone());
    assert_eq!(
        first,
        json!({ "url": "x.png", "alt": "X", "caption": "Cap <em>1</em>", "anchor": "hero" })
    );

    let second = &blocks[1].attrs;
    assert_eq!(second["url"], json!("y.png"));
    assert_eq!(second["alt"], json!(""));
    assert_eq!(second["caption"], Value::Null);
    assert_eq!(second["anchor"], json!(""));
}

#[test]
fn gallery_query_yields_entry_per_image() {
    let content = block(
        "core/gallery",
        &json!({}),
        "<figure><img src=\"a.png\" alt=\"A\"><img src=\"b.png\"></figure>",
    );
    let blocks = pipeline().process(&content, 0).unwrap();

    assert_eq!(
        only(&blocks).attrs["images"],
        json!([{ "url": "a.png", "alt": "A" }, { "url": "b.png" }])
    );
}

#[test]
fn gallery_without_images_falls_back_to_default() {
    let content = block("core/gallery", &json!({}), "<figure></figure>");
    let blocks = pipeline().process(&content, 0).unwrap();
    assert_eq!(only(&blocks).attrs["images"], json!([]));
}

#[test]
fn query_depth_limit_leaves_default() {
    let content = block("core/gallery", &json!({}), "<img src=\"a.png\">");
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .config(PipelineConfig::new().with_max_query_depth(0))
        .build()
        .unwrap();

    let blocks = pipeline.process(&content, 0).unwrap();
    assert_eq!(only(&blocks).attrs["images"], json!([]));
}

#[test]
fn nested_blocks_resolve_against_own_markup() {
    let content = format!(
        "intro\n<!-- block:core/group --><section>\n{}\n{}\n</section><!-- /block -->\noutro",
        block("core/paragraph", &json!({}), "<p>one</p>"),
        block("core/paragraph", &json!({}), "<p>two</p>"),
    );
    let blocks = pipeline().process(&content, 0).unwrap();

    let group = only(&blocks);
    assert_eq!(group.name, "core/group");
    let contents: Vec<_> = group
        .inner_blocks
        .iter()
        .map(|child| child.attrs["content"].clone())
        .collect();
    assert_eq!(contents, [json!("one"), json!("two")]);
}

#[test]
fn freeform_children_are_compacted() {
    let tree = vec![
        BlockNode::freeform("\n"),
        BlockNode::new("core/group", "<div></div>")
            .with_child(BlockNode::freeform("  "))
            .with_child(BlockNode::new("core/paragraph", "<p>a</p>"))
            .with_child(BlockNode {
                name: Some(String::new()),
                ..BlockNode::default()
            })
            .with_child(BlockNode::new("core/paragraph", "<p>b</p>")),
    ];
    let blocks = pipeline_builder(Arc::new(TreeParser(tree)))
        .build()
        .unwrap()
        .process("", 0)
        .unwrap();

    let group = only(&blocks);
    assert_eq!(group.inner_blocks.len(), 2);
    assert_eq!(group.inner_blocks[1].attrs["content"], json!("b"));
}

#[test]
fn registered_schema_is_sanitized() {
    let mut registry = blockdata_test_utils::registry();
    registry
        .register_json(
            "acme/counter",
            r#"{"attributes":{"count":{"type":"integer","source":"text","selector":"span"}}}"#,
        )
        .unwrap();
    let pipeline = BlockPipeline::builder()
        .parser(Arc::new(CommentBlockParser::new()))
        .registry(Arc::new(registry))
        .renderer(Arc::new(blockdata_test_utils::EchoRenderer))
        .dom(Arc::new(blockdata_test_utils::FragmentDom))
        .build()
        .unwrap();

    let content = block("acme/counter", &json!({}), "<div><span>42</span></div>");
    let blocks = pipeline.process(&content, 0).unwrap();
    assert_eq!(only(&blocks).attrs["count"], json!(42));
}

#[test]
fn shortcodes_expand_after_render() {
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .shortcodes(Arc::new(BracketShortcodes::new()))
        .build()
        .unwrap();

    let content = block("core/paragraph", &json!({}), "<p>see [gallery]</p>");
    let blocks = pipeline.process(&content, 0).unwrap();

    let paragraph = only(&blocks);
    assert_eq!(paragraph.rendered, "<p>see <span class=\"sc-gallery\"></span></p>");
    assert_eq!(paragraph.inner_html, "<p>see [gallery]</p>");
}

#[test]
fn second_call_is_served_from_cache() {
    let mut parser = MockParser::new();
    parser
        .expect_parse()
        .times(1)
        .returning(|_| Ok(vec![BlockNode::new("core/paragraph", "<p>hi</p>")]));

    let pipeline = pipeline_builder(Arc::new(parser)).build().unwrap();
    let first = pipeline.process("anything", 0).unwrap();
    let second = pipeline.process("anything", 0).unwrap();

    assert_eq!(first, second);
    assert_eq!(only(&second).attrs["content"], json!("hi"));
}

#[test]
fn disabled_cache_parses_every_time() {
    let parser = counting();
    let pipeline = pipeline_builder(parser.clone())
        .config(PipelineConfig::new().with_cache_enabled(false))
        .build()
        .unwrap();

    let content = block("core/paragraph", &json!({}), "<p>hi</p>");
    pipeline.process(&content, 0).unwrap();
    pipeline.process(&content, 0).unwrap();
    assert_eq!(parser.calls(), 2);
}

#[test]
fn invalidate_forces_reparse() {
    let parser = counting();
    let pipeline = pipeline_builder(parser.clone()).build().unwrap();
    let content = block("core/paragraph", &json!({}), "<p>hi</p>");

    pipeline.process(&content, 0).unwrap();
    assert!(pipeline.invalidate(&content, 0).unwrap());
    pipeline.process(&content, 0).unwrap();
    assert_eq!(parser.calls(), 2);
}

#[test]
fn metadata_change_misses_cache() {
    let parser = counting();
    let store = Arc::new(InMemoryMetadataStore::new());
    store.set(7, "subtitle", "first");

    let pipeline = pipeline_builder(parser.clone())
        .metadata(store.clone())
        .build()
        .unwrap();
    let content = block("core/post-subtitle", &json!({}), "");

    let before = pipeline.process(&content, 7).unwrap();
    assert_eq!(only(&before).attrs["subtitle"], json!("first"));
    pipeline.process(&content, 7).unwrap();
    assert_eq!(parser.calls(), 1);

    store.set(7, "subtitle", "second");
    let after = pipeline.process(&content, 7).unwrap();
    assert_eq!(only(&after).attrs["subtitle"], json!("second"));
    assert_eq!(parser.calls(), 2);
}

#[test]
fn cache_key_depends_on_entity_metadata() {
    let store = Arc::new(InMemoryMetadataStore::new());
    store.set(7, "subtitle", "seven");
    store.set(8, "subtitle", "eight");
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .metadata(store)
        .build()
        .unwrap();

    let key = |entity| pipeline.fingerprint("same", entity).unwrap().cache_key();
    assert_ne!(key(7), key(8));
    assert_ne!(key(0), key(7));
    assert_eq!(key(7), key(7));

    // entity without metadata still hashes an (empty) metadata snapshot
    assert_ne!(key(0), key(9));

    let blocks = pipeline
        .process(&block("core/post-subtitle", &json!({}), ""), 0)
        .unwrap();
    assert_eq!(only(&blocks).attrs["subtitle"], json!("untitled"));
}

#[test]
fn invalid_cache_payloads_are_misses() {
    let parser = counting();
    let cache = Arc::new(MokaCacheStore::new(100));
    let pipeline = pipeline_builder(parser.clone())
        .cache(cache.clone())
        .build()
        .unwrap();

    let content = block("core/paragraph", &json!({}), "<p>hi</p>");
    let key = pipeline.fingerprint(&content, 0).unwrap().cache_key();

    for payload in [json!([]), json!({ "blocks": 1 }), json!([1, 2]), json!("text")] {
        cache.set(CacheScope::Global, &key, payload, None).unwrap();
        let blocks = pipeline.process(&content, 0).unwrap();
        assert_eq!(only(&blocks).attrs["content"], json!("hi"));
    }
    assert_eq!(parser.calls(), 4);

    pipeline.process(&content, 0).unwrap();
    assert_eq!(parser.calls(), 4);
}

#[test]
fn multisite_partitions_cache_by_site() {
    let cache = Arc::new(MokaCacheStore::new(100));
    let multisite = Deployment {
        multisite: true,
        site_id: 3,
    };
    let content = block("core/paragraph", &json!({}), "<p>hi</p>");

    let partitioned = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .cache(cache.clone())
        .config(PipelineConfig::new().with_deployment(multisite))
        .build()
        .unwrap();
    partitioned.process(&content, 0).unwrap();
    let key = partitioned.fingerprint(&content, 0).unwrap().cache_key();

    assert!(cache.get(CacheScope::Site(3), &key).unwrap().is_some());
    assert!(cache.get(CacheScope::Global, &key).unwrap().is_none());

    let shared = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .cache(cache.clone())
        .config(
            PipelineConfig::new()
                .with_deployment(multisite)
                .with_multi_tenant_cache(false),
        )
        .build()
        .unwrap();
    shared.process(&content, 0).unwrap();
    assert!(cache.get(CacheScope::Global, &key).unwrap().is_some());
}

#[test]
fn hooks_observe_cache_state() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);

    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .hooks(move |hooks| {
            hooks
                .on_pre_cache_write(|mut blocks, _| {
                    for block in &mut blocks {
                        block.attrs.insert("stamped".into(), json!(true));
                    }
                    blocks
                })
                .on_output(move |blocks, ctx| {
                    recorder.lock().push(ctx.was_cached);
                    blocks
                });
        })
        .build()
        .unwrap();

    let content = block("core/paragraph", &json!({}), "<p>hi</p>");
    let miss = pipeline.process(&content, 0).unwrap();
    let hit = pipeline.process(&content, 0).unwrap();

    assert_eq!(*seen.lock(), [false, true]);
    assert_eq!(only(&miss).attrs["stamped"], json!(true));
    assert_eq!(miss, hit);
}

#[test]
fn pre_cache_write_hook_skipped_without_cache() {
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .config(PipelineConfig::new().with_cache_enabled(false))
        .hooks(|hooks| {
            hooks.on_pre_cache_write(|_, _| Vec::new());
        })
        .build()
        .unwrap();

    let content = block("core/paragraph", &json!({}), "<p>hi</p>");
    assert_eq!(pipeline.process(&content, 0).unwrap().len(), 1);
}

#[test]
fn post_parse_hook_sees_raw_tree() {
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .hooks(|hooks| {
            hooks.on_post_parse(|tree, ctx| {
                assert!(!ctx.was_cached);
                tree.into_iter()
                    .filter(|node| node.block_name() != Some("core/group"))
                    .collect()
            });
        })
        .build()
        .unwrap();

    let content = format!(
        "{}{}",
        block("core/group", &json!({}), ""),
        block("core/paragraph", &json!({}), "<p>kept</p>")
    );
    let blocks = pipeline.process(&content, 0).unwrap();
    assert_eq!(only(&blocks).name, "core/paragraph");
}

#[test]
fn parser_failure_propagates_and_caches_nothing() {
    let cache = Arc::new(MokaCacheStore::new(10));
    let pipeline = pipeline_builder(Arc::new(FailingParser))
        .cache(cache.clone())
        .build()
        .unwrap();

    let err = pipeline.process("broken", 0).unwrap_err();
    assert!(matches!(err, ExtractError::Parse(_)));
    assert_eq!(cache.stats().entry_count, 0);
}

#[test]
fn nested_render_failure_propagates() {
    let tree = vec![BlockNode::new("core/group", "<div></div>")
        .with_child(BlockNode::new("core/image", "<img src=\"a.png\">"))];
    let pipeline = pipeline_builder(Arc::new(TreeParser(tree)))
        .renderer(Arc::new(FailingRenderer("core/image")))
        .build()
        .unwrap();

    let err = pipeline.process("", 0).unwrap_err();
    assert!(matches!(err, ExtractError::Render { ref block, .. } if block == "core/image"));
}

#[test]
fn config_loads_from_toml() {
    let config = PipelineConfig::from_toml_str(
        "cache_expiration_secs = 60\n[deployment]\nmultisite = true\nsite_id = 4\n",
    )
    .unwrap();
    let pipeline = pipeline_builder(Arc::new(CommentBlockParser::new()))
        .config(config)
        .build()
        .unwrap();

    assert_eq!(pipeline.config().cache_scope(), CacheScope::Site(4));
    assert_eq!(pipeline.config().cache_ttl(), Some(std::time::Duration::from_secs(60)));
}
