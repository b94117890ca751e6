use attrstore_store::{
    AttrResult, FlatKeyValue, Host, KeyValueApi, MembershipSet, SetApi, StoreConfig,
    ValueEncoding,
};
use tempfile::tempdir;

#[tokio::test]
async fn key_value_set_get_del() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("kv.sqlite")).await?;
    let kv = FlatKeyValue::open(&host, "session").await?;
    assert_eq!(kv.table(), "session_kv");
    assert!(kv.is_empty().await?);

    kv.set("token", "abc").await?;
    kv.set("token", "def").await?;
    assert_eq!(kv.get("token").await?, "def");
    assert_eq!(kv.count().await?, 1);
    assert!(kv.has("token").await?);

    assert!(kv.set_check("token", "ghi").await?);
    assert!(!kv.set_check("other", "x").await?);
    let mut keys = kv.all().await?;
    keys.sort();
    assert_eq!(keys, vec!["other".to_string(), "token".to_string()]);

    kv.del("token").await?;
    kv.del("token").await?;
    assert!(kv.get("token").await.unwrap_err().is_not_found());
    assert!(!kv.has("token").await?);

    kv.clear().await?;
    assert_eq!(kv.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn key_value_preserves_awkward_values() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("kv.sqlite")).await?;
    let kv = FlatKeyValue::open(&host, "awkward").await?;
    let values = [
        "",
        "it's \"quoted\"",
        "semi; DROP TABLE awkward_kv; --",
        "a¤b",
        "nul\0inside",
        "ünïcødé ✓",
    ];
    for (idx, value) in values.iter().enumerate() {
        kv.set(&format!("k{idx}"), value).await?;
    }
    for (idx, value) in values.iter().enumerate() {
        assert_eq!(kv.get(&format!("k{idx}")).await?, *value);
    }
    let mut entries = kv.entries().await?;
    entries.sort();
    assert_eq!(entries.len(), values.len());
    assert_eq!(entries[3], ("k3".to_string(), "a¤b".to_string()));
    Ok(())
}

#[tokio::test]
async fn raw_encoding_round_trips_plain_text() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let mut config =
        StoreConfig::default_sqlite(dir.path().join("raw.sqlite").to_string_lossy());
    config.value_encoding = Some(ValueEncoding::Raw);
    let host = Host::connect(&config, dir.path()).await?;
    let kv = FlatKeyValue::open(&host, "plain").await?;
    kv.set("greeting", "hello ¤ world").await?;
    assert_eq!(kv.get("greeting").await?, "hello ¤ world");
    Ok(())
}

#[tokio::test]
async fn counters_increment_and_decrement() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("kv.sqlite")).await?;
    let kv = FlatKeyValue::open(&host, "counters").await?;

    assert_eq!(kv.inc("hits").await?, "1");
    assert_eq!(kv.inc("hits").await?, "2");
    assert_eq!(kv.dec("hits").await?, "1");
    assert_eq!(kv.dec("misses").await?, "-1");

    kv.set("garbage", "not a number").await?;
    assert_eq!(kv.inc("garbage").await?, "1");

    let tx = host.begin().await?;
    kv.inc_with(&tx, "hits").await?;
    kv.inc_with(&tx, "hits").await?;
    host.commit(tx).await?;
    assert_eq!(kv.get("hits").await?, "3");
    Ok(())
}

#[tokio::test]
async fn dropped_transaction_rolls_back() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("kv.sqlite")).await?;
    let kv = FlatKeyValue::open(&host, "rollback").await?;
    {
        let tx = host.begin().await?;
        kv.set_with(&tx, "pending", "value").await?;
    }
    assert!(!kv.has("pending").await?);
    Ok(())
}

#[tokio::test]
async fn set_deduplicates_members() -> AttrResult<()> {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("set.sqlite")).await?;
    let set = MembershipSet::open(&host, "tags").await?;
    assert_eq!(set.table(), "tags_set");

    set.add("red").await?;
    set.add("red").await?;
    set.add("blue").await?;
    assert_eq!(set.count().await?, 2);
    assert!(set.has("red").await?);
    assert!(!set.has("green").await?);

    let mut members = set.all().await?;
    members.sort();
    assert_eq!(members, vec!["blue".to_string(), "red".to_string()]);

    set.del("red").await?;
    set.del("red").await?;
    assert_eq!(set.all().await?, vec!["blue".to_string()]);

    set.clear().await?;
    assert_eq!(set.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn invalid_structure_names_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let host = Host::connect_sqlite(&dir.path().join("names.sqlite"))
        .await
        .expect("host");
    for name in ["", "   ", "bad¤name", "a\"b", "with space"] {
        let err = FlatKeyValue::open(&host, name).await.err().expect("error");
        assert!(matches!(err, attrstore_store::AttrError::Validation { .. }));
    }
    let long = "n".repeat(80);
    assert!(MembershipSet::open(&host, &long).await.is_err());
}
