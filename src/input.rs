use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::types::Post;

/// Posts gathered from an input directory.
#[derive(Debug, Default)]
pub struct LoadedPosts {
    pub files: usize,
    pub skipped_files: usize,
    pub posts: Vec<Post>,
}

/// Read every `*.json` file in `dir`. Files that fail to read or parse are logged and skipped.
pub async fn load_posts(dir: &Path) -> Result<LoadedPosts> {
    let files = json_files(dir).await?;
    tracing::info!(count = files.len(), dir = %dir.display(), "found JSON files");

    let mut loaded = LoadedPosts { files: files.len(), ..Default::default() };
    for path in files {
        match read_document(&path).await {
            Ok(doc) => loaded.posts.extend(posts_from_document(&doc)),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unparseable file");
                loaded.skipped_files += 1;
            }
        }
    }
    Ok(loaded)
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.with_context(|| format!("reading input dir: {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") { continue; }
        if entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_document(path: &Path) -> Result<Value> {
    let raw = tokio::fs::read_to_string(path).await.with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Walk the three accepted envelopes: a listing (`data.children[].data`), a single
/// wrapped post (`data`), or an array mixing both.
pub fn posts_from_document(doc: &Value) -> Vec<Post> {
    let mut out = Vec::new();
    match doc {
        Value::Array(items) => {
            for item in items.iter().filter(|i| i.is_object()) {
                collect_wrapped(item, &mut out);
            }
        }
        Value::Object(_) => collect_wrapped(doc, &mut out),
        _ => {}
    }
    out
}

fn collect_wrapped(wrapper: &Value, out: &mut Vec<Post>) {
    let Some(data) = wrapper.get("data") else { return };
    match data.get("children") {
        Some(Value::Array(children)) => {
            for child in children {
                if let Some(post) = child.get("data") { push_post(post, out); }
            }
        }
        // a listing with a non-array `children` has nothing usable
        Some(_) => {}
        None => push_post(data, out),
    }
}

fn push_post(raw: &Value, out: &mut Vec<Post>) {
    match Post::deserialize(raw) {
        Ok(post) => out.push(post),
        Err(e) => {
            let id = raw.get("id").and_then(serde_json::Value::as_str).unwrap_or("unknown");
            tracing::warn!(id, error = %e, "skipping malformed post");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(posts: &[Post]) -> Vec<&str> { posts.iter().map(|p| p.post_id()).collect() }

    #[test]
    fn listing_envelope() {
        let doc = json!({"kind": "Listing", "data": {"children": [{"kind": "t3", "data": {"id": "a"}}, {"kind": "t3"}, {"data": {"id": "b"}}]}});
        assert_eq!(ids(&posts_from_document(&doc)), ["a", "b"]);
    }

    #[test]
    fn single_post_envelope() {
        let doc = json!({"data": {"id": "abc", "title": "Hi"}});
        assert_eq!(ids(&posts_from_document(&doc)), ["abc"]);
    }

    #[test]
    fn mixed_array_envelope() {
        let doc = json!([
            {"data": {"children": [{"data": {"id": "a"}}]}},
            {"data": {"id": "b"}},
            "noise",
            {"no_data": true}
        ]);
        assert_eq!(ids(&posts_from_document(&doc)), ["a", "b"]);
    }

    #[test]
    fn malformed_post_is_skipped() {
        let doc = json!({"data": {"children": [{"data": {"id": 5}}, {"data": {"id": "ok"}}]}});
        assert_eq!(ids(&posts_from_document(&doc)), ["ok"]);
    }

    #[test]
    fn scalars_yield_nothing() {
        assert!(posts_from_document(&json!(42)).is_empty());
        assert!(posts_from_document(&json!({"other": 1})).is_empty());
    }

    #[tokio::test]
    async fn load_skips_bad_files_and_non_json() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.json"), r#"{"data":{"id":"a"}}"#).unwrap();
        std::fs::write(tmp.path().join("b.json"), "{not json").unwrap();
        std::fs::write(tmp.path().join("c.txt"), r#"{"data":{"id":"c"}}"#).unwrap();
        std::fs::write(tmp.path().join("d.json"), r#"[{"data":{"id":"d"}}]"#).unwrap();

        let loaded = load_posts(tmp.path()).await.unwrap();
        assert_eq!(loaded.files, 3);
        assert_eq!(loaded.skipped_files, 1);
        assert_eq!(ids(&loaded.posts), ["a", "d"]);
    }

    #[tokio::test]
    async fn directories_named_like_json_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("nested.json")).unwrap();
        std::fs::write(tmp.path().join("a.json"), r#"{"data":{"id":"a"}}"#).unwrap();

        let loaded = load_posts(tmp.path()).await.unwrap();
        assert_eq!(loaded.files, 1);
        assert_eq!(ids(&loaded.posts), ["a"]);
    }

    #[tokio::test]
    async fn empty_dir_loads_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = load_posts(tmp.path()).await.unwrap();
        assert_eq!(loaded.files, 0);
        assert!(loaded.posts.is_empty());
    }
}
