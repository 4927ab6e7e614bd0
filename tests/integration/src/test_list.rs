//! Listing integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::TryStreamExt;
    use strato_client::{Bucket, ClientConfig, PutOptions};
    use strato_model::types::CannedAcl;

    use crate::{Harness, fast_attempts};

    const OBJECT_NAMES: [&str; 8] = [
        "index.html",
        "index2.html",
        "photos/2006/February/sample2.jpg",
        "photos/2006/February/sample3.jpg",
        "photos/2006/February/sample4.jpg",
        "photos/2006/January/sample.jpg",
        "test/bar",
        "test/foo",
    ];

    struct Case {
        prefix: &'static str,
        delimiter: &'static str,
        marker: &'static str,
        max_keys: u32,
        keys: &'static [&'static str],
        prefixes: &'static [&'static str],
        truncated: bool,
    }

    const CASES: &[Case] = &[
        Case {
            prefix: "",
            delimiter: "",
            marker: "",
            max_keys: 0,
            keys: &OBJECT_NAMES,
            prefixes: &[],
            truncated: false,
        },
        Case {
            prefix: "",
            delimiter: "",
            marker: "index.htmla",
            max_keys: 0,
            keys: &[
                "index2.html",
                "photos/2006/February/sample2.jpg",
                "photos/2006/February/sample3.jpg",
                "photos/2006/February/sample4.jpg",
                "photos/2006/January/sample.jpg",
                "test/bar",
                "test/foo",
            ],
            prefixes: &[],
            truncated: false,
        },
        Case {
            prefix: "",
            delimiter: "",
            marker: "z",
            max_keys: 0,
            keys: &[],
            prefixes: &[],
            truncated: false,
        },
        Case {
            prefix: "",
            delimiter: "",
            marker: "",
            max_keys: 2,
            keys: &["index.html", "index2.html"],
            prefixes: &[],
            truncated: true,
        },
        Case {
            prefix: "",
            delimiter: "",
            marker: "",
            max_keys: 1,
            keys: &["index.html"],
            prefixes: &[],
            truncated: true,
        },
        Case {
            prefix: "photos/2006/",
            delimiter: "/",
            marker: "",
            max_keys: 1,
            keys: &[],
            prefixes: &["photos/2006/February/"],
            truncated: true,
        },
        Case {
            prefix: "",
            delimiter: "/",
            marker: "",
            max_keys: 0,
            keys: &["index.html", "index2.html"],
            prefixes: &["photos/", "test/"],
            truncated: false,
        },
        Case {
            prefix: "photos/2006/",
            delimiter: "/",
            marker: "",
            max_keys: 0,
            keys: &[],
            prefixes: &["photos/2006/February/", "photos/2006/January/"],
            truncated: false,
        },
        Case {
            prefix: "t",
            delimiter: "/",
            marker: "",
            max_keys: 0,
            keys: &[],
            prefixes: &["test/"],
            truncated: false,
        },
        Case {
            prefix: "",
            delimiter: "/",
            marker: "photos/",
            max_keys: 1,
            keys: &[],
            prefixes: &["test/"],
            truncated: false,
        },
        Case {
            prefix: "",
            delimiter: "Feb",
            marker: "",
            max_keys: 0,
            keys: &[
                "index.html",
                "index2.html",
                "photos/2006/January/sample.jpg",
                "test/bar",
                "test/foo",
            ],
            prefixes: &["photos/2006/Feb"],
            truncated: false,
        },
    ];

    /// Store `OBJECT_NAMES`, the i-th holding `i` bytes.
    async fn populate(bucket: &Bucket) {
        for (i, name) in OBJECT_NAMES.iter().enumerate() {
            bucket
                .put(name, Bytes::from("a".repeat(i)), "text/plain", CannedAcl::Private, PutOptions::default())
                .await
                .unwrap();
        }
    }

    fn size_of(key: &str) -> u64 {
        OBJECT_NAMES.iter().position(|n| *n == key).unwrap() as u64
    }

    #[tokio::test]
    async fn test_should_list_fixture_pages() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("list").await;
        populate(&bucket).await;

        for case in CASES {
            let page = bucket
                .list(case.prefix, case.delimiter, case.marker, case.max_keys)
                .await
                .unwrap();
            let context = format!(
                "prefix={:?} delimiter={:?} marker={:?} max={}",
                case.prefix, case.delimiter, case.marker, case.max_keys
            );

            assert_eq!(page.name, bucket.name(), "{context}");
            assert_eq!(page.prefix, case.prefix, "{context}");
            assert_eq!(page.delimiter, case.delimiter, "{context}");
            assert_eq!(page.marker, case.marker, "{context}");
            assert_eq!(page.is_truncated, case.truncated, "{context}");
            let keys: Vec<&str> = page.contents.iter().map(|e| e.key.as_str()).collect();
            assert_eq!(keys, case.keys, "{context}");
            assert_eq!(page.common_prefixes, case.prefixes, "{context}");

            for entry in &page.contents {
                assert_eq!(entry.size, size_of(&entry.key), "{context}");
                assert!(entry.etag.starts_with('"'), "{context}");
                assert_eq!(entry.storage_class, "STANDARD", "{context}");
                assert!(entry.owner.is_some(), "{context}");
            }
        }
    }

    #[tokio::test]
    async fn test_should_merge_single_key_pages() {
        let config = ClientConfig::builder()
            .attempts(fast_attempts())
            .list_max_keys(1)
            .build();
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket("merge").await;
        populate(&bucket).await;

        let all = bucket.list_all("", "/").await.unwrap();
        let keys: Vec<&str> = all.contents.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["index.html", "index2.html"]);
        assert_eq!(all.common_prefixes, ["photos/", "test/"]);
        assert!(!all.is_truncated);
        assert!(all.next_marker.is_none());

        let all = bucket.list_all("", "").await.unwrap();
        let keys: Vec<&str> = all.contents.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, OBJECT_NAMES);
    }

    #[tokio::test]
    async fn test_should_stream_pages_in_order() {
        let config = ClientConfig::builder()
            .attempts(fast_attempts())
            .list_max_keys(3)
            .build();
        let harness = Harness::with_config(config);
        let bucket = harness.create_bucket("pages").await;
        populate(&bucket).await;

        let pages: Vec<_> = bucket.list_pages("", "").try_collect().await.unwrap();
        let sizes: Vec<usize> = pages.iter().map(|p| p.contents.len()).collect();
        assert_eq!(sizes, [3, 3, 2]);
        assert!(pages[..2].iter().all(|p| p.is_truncated));
        assert_eq!(pages[1].marker, "photos/2006/February/sample2.jpg");
        assert_eq!(pages[2].marker, "photos/2006/January/sample.jpg");
    }

    #[tokio::test]
    async fn test_should_list_empty_bucket() {
        let harness = Harness::new();
        let bucket = harness.create_bucket("empty").await;

        let all = bucket.list_all("", "/").await.unwrap();
        assert!(all.contents.is_empty());
        assert!(all.common_prefixes.is_empty());
    }
}
