use driveindex_core::{
    CrawlConfig, CrawlOutcome, CrawlSession, CrawlStats, DirectoryNode, FileEntry,
    ListingFailurePolicy, NodeId, NodeStatus, RateLimitConfig,
};
use chrono::Utc;
use std::time::Duration;

fn folder(id: u64, name: &str, parent: Option<u64>) -> DirectoryNode {
    DirectoryNode::new(
        NodeId::new(id),
        format!("id-{id}"),
        format!("https://drive.google.com/drive/folders/id-{id}"),
        name,
        parent.map(NodeId::new),
    )
}

#[test]
fn test_node_id_operations() {
    let id1 = NodeId::new(42);
    let id2 = NodeId::new(42);

    assert_eq!(id1, id2);
    assert!(NodeId::new(1) < NodeId::new(2));
}

#[test]
fn test_directory_node_creation() {
    let node = folder(1, "photos", Some(0));

    assert!(!node.is_root());
    assert_eq!(node.name.as_str(), "photos");
    assert_eq!(node.provider_id.as_str(), "id-1");
    assert_eq!(node.status, NodeStatus::Pending);
    assert!(node.started_at.is_none());
    assert!(node.finished_at.is_none());
    assert!(node.listing_duration().is_none());
    assert_eq!(node.entry_count(), 0);
}

#[test]
fn test_canonical_order_folders_before_files() {
    let mut root = folder(0, "root", None);
    root.children.push(folder(1, "B", Some(0)));
    root.children.push(folder(2, "A", Some(0)));
    root.children.push(folder(3, "C", Some(0)));
    root.files.push(FileEntry::new("f1", "u1", "z.txt", Some(3)));
    root.files.push(FileEntry::new("f2", "u2", "a.txt", Some(4)));

    root.sort_canonical();

    assert_eq!(root.entry_names(), vec!["A", "B", "C", "a.txt", "z.txt"]);
    assert_eq!(root.entry_count(), 5);
}

#[test]
fn test_listing_duration() {
    let mut node = folder(0, "root", None);
    let start = Utc::now();
    node.started_at = Some(start);
    node.finished_at = Some(start + chrono::Duration::milliseconds(1500));

    assert_eq!(
        node.listing_duration(),
        Some(chrono::Duration::milliseconds(1500))
    );
}

#[test]
fn test_session_summary_and_serialization() {
    let mut root = folder(0, "root", None);
    root.status = NodeStatus::Complete;
    root.files.push(FileEntry::new("f1", "u1", "movie.mkv", Some(4096)));
    let mut sub = folder(1, "docs", Some(0));
    sub.status = NodeStatus::Complete;
    sub.files.push(FileEntry::new("f2", "u2", "Spreadsheet", None));
    root.children.push(sub);

    let now = Utc::now();
    let session = CrawlSession {
        root_url: root.url.clone(),
        root,
        started_at: now,
        finished_at: now,
        duration: Duration::from_secs(3),
        config: CrawlConfig::new("id-0"),
        stats: CrawlStats::new(),
        warnings: Vec::new(),
        outcome: CrawlOutcome::Completed,
    };

    let summary = session.summary();
    assert_eq!(summary.directories, 2);
    assert_eq!(summary.files, 2);
    assert_eq!(summary.total_bytes, 4096);
    assert_eq!(summary.unknown_sizes, 1);
    assert!(session.is_complete());
    assert!(!session.has_warnings());

    let json = serde_json::to_string(&session).unwrap();
    let restored: CrawlSession = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.root.children[0].name.as_str(), "docs");
    assert_eq!(restored.root.children[0].parent, Some(NodeId::new(0)));
    assert_eq!(restored.root.children[0].files[0].size, None);
}

#[test]
fn test_config_from_toml() {
    let text = r#"
        root = "0AFolder"
        directory_workers = 3

        [rate_limit]
        capacity = 100
        window_secs = 10

        [failure_policy]
        mode = "retry"
        max_attempts = 4
        backoff_ms = 500
    "#;

    let config: CrawlConfig = toml::from_str(text).unwrap();

    assert_eq!(config.root, "0AFolder");
    assert_eq!(config.directory_workers, 3);
    assert_eq!(config.size_workers, 10);
    assert_eq!(config.page_size, 1000);
    assert_eq!(config.rate_limit.capacity, 100);
    assert_eq!(config.rate_limit.fill_factor, 0.9);
    assert_eq!(config.rate_limit.window(), Duration::from_secs(10));
    assert_eq!(
        config.failure_policy,
        ListingFailurePolicy::Retry {
            max_attempts: 4,
            backoff_ms: 500
        }
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_rate_limit_config() {
    let limits = RateLimitConfig::new(900, Duration::from_secs(100), 0.9);
    assert_eq!(limits.permits_per_window(), 810);

    let tight = RateLimitConfig::new(10, Duration::from_secs(1), 0.5);
    assert_eq!(tight.permits_per_window(), 5);

    let burst: RateLimitConfig = toml::from_str("capacity = 20\nwindow_secs = 0.5").unwrap();
    assert_eq!(burst.window(), Duration::from_millis(500));
    assert_eq!(burst.permits_per_window(), 18);
}
