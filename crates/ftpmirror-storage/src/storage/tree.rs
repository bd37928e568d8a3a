//! Directory tree implied by a batch of remote paths.
//!
//! Before a multi-file upload the parents of every destination are folded
//! into one tree, then reconciled against the server with one listing per
//! directory level instead of one existence check per file.

use crate::storage::endpoint::Endpoint;
use crate::storage::error::StorageResult;
use crate::storage::path::{base_name, parent_dir, segments};
use std::collections::{BTreeMap, VecDeque};

/// Nested map of directory segments, relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryTree {
    children: BTreeMap<String, DirectoryTree>,
}

impl DirectoryTree {
    /// Fold the parent directories of `remote_paths` into a tree. File names
    /// are not part of it.
    pub fn build<I, S>(remote_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Self::default();
        for path in remote_paths {
            let parent = parent_dir(path.as_ref());
            let mut node = &mut root;
            for seg in segments(&parent) {
                node = node.children.entry(seg.to_string()).or_default();
            }
        }
        root
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryTree> {
        self.children.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Create every directory of the tree missing on `endpoint`, below `base`.
    ///
    /// Breadth-first: each level with children is listed once, missing
    /// entries are created, then every child is visited whether it was just
    /// created or already there. Levels without children are not listed.
    pub async fn reconcile(&self, endpoint: &mut Endpoint, base: &str) -> StorageResult<()> {
        let mut queue: VecDeque<(String, &DirectoryTree)> = VecDeque::new();
        queue.push_back((with_trailing_slash(base), self));

        while let Some((dir, node)) = queue.pop_front() {
            if node.is_empty() {
                continue;
            }
            let listing = endpoint.list_dir(&dir).await?;
            for (name, child) in &node.children {
                let path = format!("{}{}", dir, name);
                if !listing.iter().any(|entry| base_name(entry) == name) {
                    endpoint.make_dir(&path).await?;
                }
                queue.push_back((format!("{}/", path), child));
            }
        }
        Ok(())
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::endpoint::EndpointConfig;
    use crate::storage::testing::{FakeNetwork, FakeOp};

    fn tree(entries: &[(&str, DirectoryTree)]) -> DirectoryTree {
        DirectoryTree {
            children: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn builds_nested_tree_without_file_names() {
        let built = DirectoryTree::build([
            "/foo/bar1.jpg",
            "/foo/bar2.jpg",
            "/foo/bar/baz.jpg",
            "/foobar/x.jpg",
        ]);
        let expected = tree(&[
            ("foo", tree(&[("bar", DirectoryTree::default())])),
            ("foobar", DirectoryTree::default()),
        ]);
        assert_eq!(built, expected);
        assert_eq!(built.names().collect::<Vec<_>>(), vec!["foo", "foobar"]);
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        assert!(DirectoryTree::build(Vec::<String>::new()).is_empty());
        assert!(DirectoryTree::build(["/top.jpg"]).is_empty());
    }

    #[test]
    fn duplicate_parents_collapse() {
        let built = DirectoryTree::build(["/a/b/1.jpg", "/a/b/2.jpg", "/a/3.jpg"]);
        let a = built.get("a").unwrap();
        assert_eq!(a.names().collect::<Vec<_>>(), vec!["b"]);
        assert!(a.get("b").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_creates_only_missing_directories() {
        let net = FakeNetwork::new();
        net.add("ftp1");
        net.seed_dir("ftp1", "/a/x");
        let mut ep = Endpoint::new(EndpointConfig::new("ftp1", "u", "p"), net.connector());
        ep.establish().await.unwrap();

        let built = DirectoryTree::build(["/a/x/1.jpg", "/a/y/2.jpg", "/b/c/d/3.jpg"]);
        built.reconcile(&mut ep, "/").await.unwrap();

        assert_eq!(net.mkdirs("ftp1"), vec!["/b", "/a/y", "/b/c", "/b/c/d"]);
        let listed: Vec<String> = net
            .ops("ftp1")
            .into_iter()
            .filter_map(|op| match op {
                FakeOp::Nlst(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(listed, vec!["/", "/a/", "/b/", "/b/c/"]);
        assert!(net.has_dir("ftp1", "/b/c/d"));
    }

    #[tokio::test]
    async fn test_reconcile_empty_tree_makes_no_calls() {
        let net = FakeNetwork::new();
        net.add("ftp1");
        let mut ep = Endpoint::new(EndpointConfig::new("ftp1", "u", "p"), net.connector());
        ep.establish().await.unwrap();
        let before = net.ops("ftp1").len();

        DirectoryTree::default().reconcile(&mut ep, "/").await.unwrap();
        assert_eq!(net.ops("ftp1").len(), before);
    }

    #[tokio::test]
    async fn test_reconcile_matches_full_path_listings() {
        let net = FakeNetwork::new();
        net.add("ftp1");
        net.seed_dir("ftp1", "/a/b");
        net.set_full_path_listing("ftp1", true);
        let mut ep = Endpoint::new(EndpointConfig::new("ftp1", "u", "p"), net.connector());
        ep.establish().await.unwrap();

        DirectoryTree::build(["/a/b/1.jpg"]).reconcile(&mut ep, "/").await.unwrap();
        assert!(net.mkdirs("ftp1").is_empty());
    }
}
