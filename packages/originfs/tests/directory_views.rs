use std::sync::Arc;
use std::time::Duration;

use originfs::{
    ChannelConfig, DirectoryView, EntryKind, HostContext, MemoryDirectory, OpenOptions, OriginFs,
    RootRef,
};
use originfs_core::MemoryStore;

fn fs_with(host: HostContext) -> OriginFs {
    OriginFs::new(
        MemoryDirectory::root(),
        Arc::new(MemoryStore::new()),
        ChannelConfig {
            timeout: Duration::from_secs(5),
            host,
            ..ChannelConfig::default()
        },
    )
}

fn threaded() -> OriginFs {
    fs_with(HostContext::default())
}

fn inline() -> OriginFs {
    fs_with(HostContext {
        workers_supported: true,
        delegated: true,
    })
}

/// Wait until `check` holds for the view, or fail after a few seconds.
async fn eventually(view: &DirectoryView, check: impl Fn(&DirectoryView) -> bool) {
    let mut changes = view.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check(view) {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "view never reached the expected state: {:?}", view.keys());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_view_follows_writes_and_removes() {
    let fs = threaded();
    fs.write_file(RootRef::Default, "/box/first.txt", "1").await.unwrap();

    let view = fs.open_directory(RootRef::Default, "/box", OpenOptions::default());
    view.ready().await;
    assert_eq!(view.keys(), vec!["first.txt"]);

    fs.write_file(RootRef::Default, "/box/second.txt", "2").await.unwrap();
    eventually(&view, |v| v.has("second.txt")).await;
    assert_eq!(view.get("second.txt").map(|h| h.kind()), Some(EntryKind::File));

    fs.remove(RootRef::Default, "/box/first.txt").await.unwrap();
    eventually(&view, |v| !v.has("first.txt")).await;
    assert_eq!(view.len(), 1);
}

#[tokio::test]
async fn test_view_follows_changes_inline() {
    let fs = inline();
    let view = fs.open_directory(RootRef::Default, "/", OpenOptions::default());
    view.ready().await;
    assert!(view.is_empty());

    fs.write_file(RootRef::Default, "/made.txt", "x").await.unwrap();
    eventually(&view, |v| v.has("made.txt")).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_views_of_same_directory_share_state() {
    let fs = threaded();
    let a = fs.open_directory(RootRef::Default, "/user/shared", OpenOptions { create: true });
    let b = fs.open_directory(RootRef::Default, "/shared/./", OpenOptions::default());
    assert_eq!(a.key(), b.key());
    assert!(a.listing().ptr_eq(b.listing()));
    assert_eq!(fs.cache().ref_count(a.key()), 2);

    a.ready().await;
    b.ready().await;
    fs.write_file(RootRef::Default, "/shared/x.md", "x").await.unwrap();
    eventually(&b, |v| v.has("x.md")).await;
    assert!(a.has("x.md"));

    let key = a.key().clone();
    a.dispose();
    a.dispose();
    assert_eq!(fs.cache().ref_count(&key), 1);
    drop(b);
    assert_eq!(fs.cache().ref_count(&key), 0);
    assert!(fs.cache().is_empty());
    assert!(fs.channel().observers().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_roots_do_not_share() {
    let fs = threaded();
    let docs = MemoryDirectory::root();
    fs.mount("docs", Arc::clone(&docs)).await;

    let origin_view = fs.open_directory(RootRef::Default, "/", OpenOptions::default());
    let docs_view = fs.open_directory("docs", "/", OpenOptions::default());
    assert_ne!(origin_view.key(), docs_view.key());
    assert_eq!(fs.cache().len(), 2);

    let by_handle = fs.open_directory(RootRef::Handle(docs), "/", OpenOptions::default());
    assert_eq!(by_handle.key(), docs_view.key());
    assert_eq!(fs.cache().len(), 2);
}

#[tokio::test]
async fn test_refresh_replaces_listing() {
    let fs = inline();
    let origin = Arc::clone(fs.registry().origin());
    let view = fs.open_directory(RootRef::Default, "/", OpenOptions::default());
    view.ready().await;

    // Changes made behind the facade's back are only seen after a refresh.
    origin.get_file("sneaky.txt", true).await.unwrap();
    assert!(!view.has("sneaky.txt"));
    assert!(view.refresh().await.unwrap());
    assert_eq!(view.keys(), vec!["sneaky.txt"]);

    origin.remove_entry("sneaky.txt", false).await.unwrap();
    assert!(view.refresh().await.unwrap());
    assert!(view.is_empty());
}

#[tokio::test]
async fn test_invoke_forwards_to_handle() {
    let fs = inline();
    fs.write_file(RootRef::Default, "/dir/a.txt", "a").await.unwrap();
    let view = fs.open_directory(RootRef::Default, "/dir", OpenOptions::default());

    let names = view
        .invoke(|dir| async move {
            dir.entries()
                .await
                .map(|entries| entries.into_iter().map(|(n, _)| n).collect::<Vec<_>>())
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(names, vec!["a.txt"]);

    let handle = view.handle().await.unwrap();
    assert_eq!(handle.name(), "dir");
}
