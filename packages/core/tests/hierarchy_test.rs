//! Hierarchy Materialization Tests
//!
//! Builds trees from nested node collections stored in libsql and checks
//! expansion, client-state preservation and the flattened display order.

#[cfg(test)]
mod hierarchy_tests {
    use anyhow::Result;
    use nodechain_core::config::HierarchyConfig;
    use nodechain_core::db::LibsqlStore;
    use nodechain_core::hierarchy::{Materializer, TreeArena};
    use nodechain_core::models::{MetadataPatch, Node, NodeCodec, Scope};
    use nodechain_core::ordering::CollectionDriver;
    use nodechain_core::services::NodeRepository;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        nodes: NodeRepository<LibsqlStore>,
        materializer: Materializer<LibsqlStore, NodeCodec>,
        _temp_dir: TempDir,
    }

    /// home
    /// ├── inbox (opened)
    /// │   ├── mail
    /// │   └── calls (opened)
    /// │       └── mom
    /// └── archive (closed)
    ///     └── old
    async fn fixture() -> Result<Fixture> {
        let temp_dir = TempDir::new()?;
        let store = LibsqlStore::new(temp_dir.path().join("test.db")).await?;
        let driver = Arc::new(CollectionDriver::new(Arc::new(store)));
        let nodes = NodeRepository::new(driver.clone(), Scope::unscoped());

        for node in [
            Node::with_id("inbox", "home", "Inbox").opened(),
            Node::with_id("archive", "home", "Archive"),
            Node::with_id("mail", "inbox", "Mail"),
            Node::with_id("calls", "inbox", "Calls").opened(),
            Node::with_id("mom", "calls", "Call mom"),
            Node::with_id("old", "archive", "Old stuff"),
        ] {
            nodes.insert(&node, None).await?;
        }

        let materializer = Materializer::new(driver, HierarchyConfig::default());
        Ok(Fixture {
            nodes,
            materializer,
            _temp_dir: temp_dir,
        })
    }

    fn outline(arena: &TreeArena) -> Vec<String> {
        arena
            .flatten()
            .into_iter()
            .map(|row| format!("{}{}", "  ".repeat(row.depth), row.id))
            .collect()
    }

    #[tokio::test]
    async fn test_materialize_from_virtual_root() -> Result<()> {
        let fx = fixture().await?;
        let tree = fx.materializer.materialize("home", true, None).await?;

        assert!(tree.root().map(|r| r.is_virtual()).unwrap_or(false));
        assert_eq!(
            outline(&tree),
            vec!["inbox", "  mail", "  calls", "    mom", "archive"]
        );
        assert!(!tree.contains("old"));
        Ok(())
    }

    #[tokio::test]
    async fn test_opening_a_branch_then_refreshing() -> Result<()> {
        let fx = fixture().await?;
        let held = fx.materializer.materialize("home", true, None).await?;

        fx.nodes
            .patch_metadata("archive", MetadataPatch::opened(true))
            .await?;
        let held = held
            .with_metadata("mail", MetadataPatch::edit_mode(true).into_entries())
            .ok_or_else(|| anyhow::anyhow!("mail missing from tree"))?;

        let fresh = fx.materializer.materialize("home", true, Some(&held)).await?;
        assert!(fresh.contains("old"));
        assert_eq!(
            fresh.get("mail").and_then(|n| n.metadata.get("isInEditMode")),
            Some(&serde_json::json!(true))
        );
        assert_eq!(outline(&fresh).last().map(String::as_str), Some("  old"));
        Ok(())
    }

    #[tokio::test]
    async fn test_subtree_and_reorder() -> Result<()> {
        let fx = fixture().await?;
        fx.nodes.move_after("calls", "inbox", None).await?;

        let subtree = fx.materializer.materialize("inbox", true, None).await?;
        assert_eq!(subtree.root().map(|r| r.content()), Some("Inbox"));
        assert_eq!(
            outline(&subtree),
            vec!["inbox", "  calls", "    mom", "  mail"]
        );

        let collapsed = subtree
            .toggle_opened("calls")
            .ok_or_else(|| anyhow::anyhow!("calls missing from tree"))?;
        assert_eq!(outline(&collapsed), vec!["inbox", "  calls", "  mail"]);
        Ok(())
    }
}
